//! Interface to global variables owned by the embedding application.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::StaticType;

/// Result of looking up a global variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlobalResolution {
    /// Found a variable with the given unique id.
    Found(String),
    Undefined,
}

/// Resolves global variables.
///
/// Implementations must be deterministic for a fixed catalog state. When a
/// case-insensitive name matches more than one entry, exactly one must be
/// returned.
pub trait VariableResolver: fmt::Debug {
    fn resolve(&self, name: &str, case_sensitive: bool) -> GlobalResolution;

    /// Static type of a previously resolved global.
    fn global_type(&self, _id: &str) -> StaticType {
        StaticType::Any
    }

    /// Names to consider when suggesting alternatives for an undefined
    /// variable.
    fn candidate_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Resolver with no globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl VariableResolver for EmptyResolver {
    fn resolve(&self, _name: &str, _case_sensitive: bool) -> GlobalResolution {
        GlobalResolution::Undefined
    }
}

/// In-memory resolver keyed by unique id.
///
/// Case-insensitive lookups matching multiple ids return the
/// lexicographically first id.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    globals: BTreeMap<String, StaticType>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, id: impl Into<String>, ty: StaticType) -> Self {
        self.insert(id, ty);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, ty: StaticType) {
        self.globals.insert(id.into(), ty);
    }
}

impl VariableResolver for MemoryResolver {
    fn resolve(&self, name: &str, case_sensitive: bool) -> GlobalResolution {
        let found = if case_sensitive {
            self.globals.get_key_value(name).map(|(k, _)| k)
        } else {
            self.globals.keys().find(|k| k.eq_ignore_ascii_case(name))
        };

        match found {
            Some(id) => GlobalResolution::Found(id.clone()),
            None => GlobalResolution::Undefined,
        }
    }

    fn global_type(&self, id: &str) -> StaticType {
        self.globals.get(id).cloned().unwrap_or(StaticType::Any)
    }

    fn candidate_names(&self) -> Vec<String> {
        self.globals.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_resolves_nothing() {
        assert_eq!(GlobalResolution::Undefined, EmptyResolver.resolve("a", false));
    }

    #[test]
    fn case_sensitive_exact() {
        let resolver = MemoryResolver::new().with_global("Orders", StaticType::Any);

        assert_eq!(GlobalResolution::Undefined, resolver.resolve("orders", true));
        assert_eq!(
            GlobalResolution::Found("Orders".to_string()),
            resolver.resolve("Orders", true)
        );
    }

    #[test]
    fn case_insensitive_ambiguity_picks_first() {
        let resolver = MemoryResolver::new()
            .with_global("orders", StaticType::Any)
            .with_global("ORDERS", StaticType::Int32)
            .with_global("Orders", StaticType::Any);

        // Upper case sorts first.
        let got = resolver.resolve("oRdErS", false);
        assert_eq!(GlobalResolution::Found("ORDERS".to_string()), got);
        // Stable across calls.
        assert_eq!(got, resolver.resolve("oRdErS", false));
        assert_eq!(StaticType::Int32, resolver.global_type("ORDERS"));
    }

    #[test]
    fn unknown_global_type_defaults_to_any() {
        let resolver = MemoryResolver::new();
        assert_eq!(StaticType::Any, resolver.global_type("missing"));
    }
}
