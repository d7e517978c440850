use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseSensitivity {
    /// Double quoted identifier, e.g. `"Foo"`.
    Sensitive,
    /// Regular identifier, e.g. `foo`.
    Insensitive,
}

/// A single identifier part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub text: String,
    pub case: CaseSensitivity,
}

impl Symbol {
    pub fn regular(text: impl Into<String>) -> Self {
        Symbol {
            text: text.into(),
            case: CaseSensitivity::Insensitive,
        }
    }

    pub fn delimited(text: impl Into<String>) -> Self {
        Symbol {
            text: text.into(),
            case: CaseSensitivity::Sensitive,
        }
    }

    pub const fn is_case_sensitive(&self) -> bool {
        matches!(self.case, CaseSensitivity::Sensitive)
    }

    /// Check if this symbol refers to `name`, respecting case sensitivity.
    pub fn matches(&self, name: &str) -> bool {
        match self.case {
            CaseSensitivity::Sensitive => self.text == name,
            CaseSensitivity::Insensitive => self.text.eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.case {
            CaseSensitivity::Sensitive => write!(f, "\"{}\"", self.text),
            CaseSensitivity::Insensitive => write!(f, "{}", self.text),
        }
    }
}

/// A possibly qualified identifier, e.g. `a`, `a.b` or `"A".b`.
///
/// Always contains at least one part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    parts: Vec<Symbol>,
}

impl Identifier {
    pub fn new(first: Symbol) -> Self {
        Identifier { parts: vec![first] }
    }

    /// Create a qualified identifier. Returns None if `parts` is empty.
    pub fn qualified(parts: Vec<Symbol>) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        Some(Identifier { parts })
    }

    pub fn regular(text: impl Into<String>) -> Self {
        Self::new(Symbol::regular(text))
    }

    pub fn delimited(text: impl Into<String>) -> Self {
        Self::new(Symbol::delimited(text))
    }

    pub fn first(&self) -> &Symbol {
        &self.parts[0]
    }

    pub fn last(&self) -> &Symbol {
        &self.parts[self.parts.len() - 1]
    }

    pub fn parts(&self) -> &[Symbol] {
        &self.parts
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// Join the first `n` parts with a dot, used for looking up qualified
    /// names in a catalog.
    pub fn prefix_name(&self, n: usize) -> String {
        self.parts[..n]
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// If any of the first `n` parts is case sensitive.
    pub fn prefix_case_sensitive(&self, n: usize) -> bool {
        self.parts[..n].iter().any(|p| p.is_case_sensitive())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, part) in self.parts.iter().enumerate() {
            if idx > 0 {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_matching() {
        assert!(Symbol::regular("foo").matches("FOO"));
        assert!(!Symbol::delimited("foo").matches("FOO"));
        assert!(Symbol::delimited("Foo").matches("Foo"));
    }

    #[test]
    fn qualified_display_and_prefix() {
        let ident = Identifier::qualified(vec![
            Symbol::regular("db"),
            Symbol::delimited("Orders"),
            Symbol::regular("id"),
        ])
        .unwrap();

        assert_eq!("db.\"Orders\".id", ident.to_string());
        assert_eq!("db.Orders", ident.prefix_name(2));
        assert!(!ident.prefix_case_sensitive(1));
        assert!(ident.prefix_case_sensitive(2));
    }

    #[test]
    fn empty_qualified() {
        assert!(Identifier::qualified(Vec::new()).is_none());
    }
}
