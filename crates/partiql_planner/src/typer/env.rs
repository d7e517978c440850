use partiql_ast::Symbol;

use crate::plan::Binding;

/// Where to look first when resolving an unqualified variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStrategy {
    /// Local bindings, then globals.
    Local,
    /// Globals, then local bindings. Used for FROM sources so that
    /// `FROM t` finds the table `t` even if a binding named `t` is in scope.
    Global,
}

/// Internal result of resolving the head of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolutionResult {
    GlobalVariable(String),
    LocalVariable { depth: usize, index: usize },
    Undefined,
}

/// Bindings visible to an expression.
///
/// Scopes form a chain, depth zero being `schema` and each `outer` adding
/// one to the depth.
#[derive(Debug, Clone, Copy)]
pub struct TypeEnv<'a> {
    pub schema: &'a [Binding],
    pub outer: Option<&'a TypeEnv<'a>>,
    pub strategy: ResolutionStrategy,
}

impl TypeEnv<'static> {
    /// Environment for the top of a plan, nothing is bound.
    pub const fn root() -> Self {
        TypeEnv {
            schema: &[],
            outer: None,
            strategy: ResolutionStrategy::Global,
        }
    }
}

impl<'a> TypeEnv<'a> {
    /// Create a new scope on top of this one.
    pub fn nested<'b>(&'b self, schema: &'b [Binding], strategy: ResolutionStrategy) -> TypeEnv<'b>
    where
        'a: 'b,
    {
        TypeEnv {
            schema,
            outer: Some(self),
            strategy,
        }
    }

    pub fn with_strategy(self, strategy: ResolutionStrategy) -> Self {
        TypeEnv { strategy, ..self }
    }

    pub fn binding(&self, depth: usize, index: usize) -> Option<&'a Binding> {
        let mut env = self;
        for _ in 0..depth {
            env = env.outer?;
        }
        env.schema.get(index)
    }

    /// Resolve a symbol against the local scopes.
    ///
    /// Each scope is checked for a binding with a matching name, then for a
    /// single binding whose closed struct type contains the name as a field,
    /// before moving outwards.
    ///
    /// The returned flag is true if the match was on a struct field.
    pub(crate) fn resolve_local(&self, symbol: &Symbol) -> Option<(ResolutionResult, bool)> {
        let mut env = Some(self);
        let mut depth = 0;

        while let Some(current) = env {
            if let Some(index) = current.schema.iter().position(|b| symbol.matches(&b.name)) {
                return Some((ResolutionResult::LocalVariable { depth, index }, false));
            }

            let mut owners = current.schema.iter().enumerate().filter(|(_, b)| {
                b.ty.as_closed_struct()
                    .is_some_and(|s| !s.lookup(&symbol.text, symbol.is_case_sensitive()).is_empty())
            });
            if let (Some((index, _)), None) = (owners.next(), owners.next()) {
                return Some((ResolutionResult::LocalVariable { depth, index }, true));
            }

            env = current.outer;
            depth += 1;
        }

        None
    }

    /// Positions of bindings in the innermost scope that might be structs,
    /// searched in order for dynamically resolved variables.
    pub fn dynamic_lookup_order(&self) -> Vec<usize> {
        self.schema
            .iter()
            .enumerate()
            .filter(|(_, b)| b.ty.is_struct() != Some(false))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Names of all bindings in scope, innermost first.
    pub fn binding_names(&self) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut env = Some(self);
        while let Some(current) = env {
            names.extend(current.schema.iter().map(|b| b.name.as_str()));
            env = current.outer;
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StaticType, StructField};

    #[test]
    fn nested_depths() {
        let outer_schema = vec![Binding::new("t", StaticType::Int32)];
        let inner_schema = vec![
            Binding::new("a", StaticType::String),
            Binding::new("b", StaticType::Bool),
        ];

        let root = TypeEnv::root();
        let outer = root.nested(&outer_schema, ResolutionStrategy::Local);
        let inner = outer.nested(&inner_schema, ResolutionStrategy::Local);

        assert_eq!(StaticType::Bool, inner.binding(0, 1).unwrap().ty);
        assert_eq!(StaticType::Int32, inner.binding(1, 0).unwrap().ty);
        assert!(inner.binding(0, 2).is_none());
        assert!(inner.binding(3, 0).is_none());
    }

    #[test]
    fn local_name_before_field() {
        let outer_schema = vec![Binding::new("x", StaticType::Int32)];
        let inner_schema = vec![Binding::new(
            "t",
            StaticType::closed_struct([StructField::new("x", StaticType::String)]),
        )];

        let root = TypeEnv::root();
        let outer = root.nested(&outer_schema, ResolutionStrategy::Local);
        let inner = outer.nested(&inner_schema, ResolutionStrategy::Local);

        // Field of the inner binding shadows the outer binding.
        assert_eq!(
            Some((ResolutionResult::LocalVariable { depth: 0, index: 0 }, true)),
            inner.resolve_local(&Symbol::regular("x"))
        );
        assert_eq!(
            Some((ResolutionResult::LocalVariable { depth: 0, index: 0 }, false)),
            inner.resolve_local(&Symbol::regular("T"))
        );
        assert_eq!(None, inner.resolve_local(&Symbol::delimited("T")));
    }

    #[test]
    fn ambiguous_field_not_qualified() {
        let schema = vec![
            Binding::new(
                "a",
                StaticType::closed_struct([StructField::new("id", StaticType::Int32)]),
            ),
            Binding::new(
                "b",
                StaticType::closed_struct([StructField::new("id", StaticType::Int64)]),
            ),
        ];
        let root = TypeEnv::root();
        let env = root.nested(&schema, ResolutionStrategy::Local);
        assert_eq!(None, env.resolve_local(&Symbol::regular("id")));
    }

    #[test]
    fn lookup_order_skips_scalars() {
        let schema = vec![
            Binding::new("a", StaticType::Int32),
            Binding::new("b", StaticType::Any),
            Binding::new("c", StaticType::open_struct()),
        ];
        let root = TypeEnv::root();
        let env = root.nested(&schema, ResolutionStrategy::Local);
        assert_eq!(vec![1, 2], env.dynamic_lookup_order());
    }
}
