use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of a node in the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line. Zero when unknown.
    pub line: u32,
    /// 1-based column. Zero when unknown.
    pub column: u32,
    /// Length of the source span in characters.
    pub length: u32,
}

impl SourceLocation {
    pub const UNKNOWN: Self = SourceLocation {
        line: 0,
        column: 0,
        length: 0,
    };

    pub const fn new(line: u32, column: u32, length: u32) -> Self {
        SourceLocation {
            line,
            column,
            length,
        }
    }

    pub const fn is_unknown(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown location>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}
