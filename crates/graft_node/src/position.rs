use core::fmt;

// -----------------------------------------------------------------------------
// Position

/// Location of a node in its source document.
///
/// Programmatically built trees carry [`Position::UNKNOWN`]; a parser
/// producing `Element`s should attach real line information so that binding
/// errors point at the offending input.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// One-based source line, `0` when unknown.
    pub line: u32,
    /// One-based source column, `0` when unknown.
    pub column: u32,
}

impl Position {
    /// A position for nodes that never came from a document.
    pub const UNKNOWN: Self = Self { line: 0, column: 0 };

    /// Creates a position from one-based line and column numbers.
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Whether this position carries real source information.
    #[inline]
    pub const fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "line {}, column {}", self.line, self.column)
        } else {
            f.write_str("unknown position")
        }
    }
}
