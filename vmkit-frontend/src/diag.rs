use std::fmt;

use crate::pos::Pos;

/// A single parse or semantic error, carrying the file position it was
/// found at (spec.md §7: "parse and semantic errors are accumulated into
/// a list rather than failing on the first").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub message: String,
}

impl Diagnostic {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// Accumulates diagnostics across a whole compilation unit instead of
/// bailing at the first one, matching `glang/parse`'s error list.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pos: Pos, message: impl Into<String>) {
        self.items.push(Diagnostic::new(pos, message));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.items.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}
