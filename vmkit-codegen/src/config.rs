/// Configuration threaded explicitly through lowering (spec.md §9 "ambient
/// state" design note: no module-level singletons).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodegenConfig {
    /// PRNG seed for shuffling a package's test list (`buildTests` in the
    /// original `glang/pkg.go`, which reads `crypto/rand` with a
    /// `time.Now()` fallback — SPEC_FULL.md §5 turns that into an explicit
    /// configuration value instead). `None` means the caller (ordinarily
    /// `vmkit-driver`) did not request a particular seed; a package with
    /// tests but no seed gets a fixed default rather than silently reading
    /// ambient entropy inside this crate.
    pub test_shuffle_seed: Option<u64>,
}

/// The fallback seed used when a package has tests but the caller supplied
/// none, keeping this crate free of hidden randomness sources.
pub const DEFAULT_TEST_SHUFFLE_SEED: u64 = 0x5eed_0000_cafe_f00d;
