/// Errors the generator can report while lowering a package (spec.md §7:
/// "compile errors carry a file position and a message").
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("package {pkg} has too many tests ({count}); the cap is {MAX_TESTS}")]
    TooManyTests { pkg: String, count: usize },

    #[error("{pkg}.{func}: call to undeclared function {name:?}")]
    UndefinedFunction {
        pkg: String,
        func: String,
        name: String,
    },

    #[error("{pkg}.{func}: reference to undeclared symbol {name:?}")]
    UndefinedSymbol {
        pkg: String,
        func: String,
        name: String,
    },

    #[error("{pkg}.{func}: {ty} has no field {field:?}")]
    NoSuchField {
        pkg: String,
        func: String,
        ty: String,
        field: String,
    },

    #[error("{pkg}.{func}: {name:?} is not a method call target")]
    NotAMethod {
        pkg: String,
        func: String,
        name: String,
    },

    #[error(transparent)]
    Finalize(#[from] vmkit_ir::FinalizeError),
}

/// `buildTests` in the original caps a package's test count at 100,000
/// (spec.md §4.6).
pub const MAX_TESTS: usize = 100_000;

pub type Result<T> = std::result::Result<T, CodegenError>;
