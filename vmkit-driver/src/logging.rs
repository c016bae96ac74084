//! `log` backend for the CLI, shaped after `kernel/src/logging.rs` in the
//! teacher workspace: a `log::Log` impl backed by a lock, writing
//! `[LEVEL] message` lines. There the lock guards a framebuffer window;
//! here it guards nothing more exotic than stderr, since the driver runs
//! on a host, not bare metal.

use std::io::Write;
use std::sync::Mutex;

struct StderrLogger {
    // Only serializes interleaved writes from future multi-threaded use;
    // `std::io::stderr()` itself is already a fresh, line-buffered handle
    // on every call.
    lock: Mutex<()>,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _guard = self.lock.lock();
        let _ = writeln!(std::io::stderr(), "[{:5}] {}", record.level(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger {
    lock: Mutex::new(()),
};

/// Installs the stderr logger. `verbose` raises the max level to `Trace`;
/// otherwise it is `Info`, matching the default/debug split in
/// `kernel/src/logging.rs`.
pub fn init(verbose: bool) {
    log::set_logger(&LOGGER).expect("logger already installed");
    log::set_max_level(if verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    });
}
