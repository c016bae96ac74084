/// Errors the linker can report while laying out and patching a program.
///
/// Link errors are always fatal: no partial image is ever emitted (spec.md
/// §4.7, §7). A duplicate package or a duplicate symbol within a package is
/// already caught earlier, by `Program::add_package`/`Package::declare`
/// panicking — there is no well-formed `Program` this crate could receive
/// that still carries one, so no variant for it appears here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    #[error("{pkg}.{func}: reference to undeclared symbol {target_pkg}.{target_name}")]
    UnresolvedSymbol {
        pkg: String,
        func: String,
        target_pkg: String,
        target_name: String,
    },

    #[error(
        "{pkg}.{func}: call to {target_pkg}.{target_name} displaces {disp} words, \
         outside the 26-bit signed range"
    )]
    DisplacementOverflow {
        pkg: String,
        func: String,
        target_pkg: String,
        target_name: String,
        disp: i64,
    },

    #[error(
        "{pkg}.{func}: instruction tagged {kind:?} has the wrong shape for that fixup kind"
    )]
    FixupShapeMismatch {
        pkg: String,
        func: String,
        kind: vmkit_core::FixupKind,
    },

    #[error("entry package {pkg:?} has no function named {func:?}")]
    MissingEntryFunction { pkg: String, func: String },

    #[error("entry package {0:?} is not part of the program")]
    UnknownEntryPackage(String),

    #[error(transparent)]
    Finalize(#[from] vmkit_ir::FinalizeError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
