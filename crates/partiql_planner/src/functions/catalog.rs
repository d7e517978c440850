use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use partiql_error::{PartiqlError, Result};
use tracing::trace;

use super::builtin::{builtin_aggregates, builtin_functions, builtin_operators};
use super::signature::{AggSignature, FunctionSignature, Signature};
use crate::types::{CastKind, DataTypeId, TypeLattice};

/// Prefix of synthesized cast function names.
pub const CAST_PREFIX: &str = "cast_";

/// Immutable set of every signature the resolver can pick from.
///
/// Each namespace maps a name to its overloads sorted by precedence: fewer
/// parameters first, then parameter types compared left to right using
/// [`DataTypeId`] order.
#[derive(Debug)]
pub struct FunctionCatalog {
    lattice: TypeLattice,
    operators: IndexMap<String, Vec<FunctionSignature>>,
    functions: IndexMap<String, Vec<FunctionSignature>>,
    aggregates: IndexMap<String, Vec<AggSignature>>,
    /// Cast signatures keyed by (from, to).
    casts: HashMap<(DataTypeId, DataTypeId), FunctionSignature>,
    /// Specific names of casts that may fail at run time.
    unsafe_casts: HashSet<String>,
}

impl FunctionCatalog {
    /// Catalog containing the builtin signatures.
    pub fn try_new() -> Result<Self> {
        Self::try_new_with(builtin_operators(), builtin_functions(), builtin_aggregates())
    }

    pub fn try_new_with(
        operators: Vec<FunctionSignature>,
        functions: Vec<FunctionSignature>,
        aggregates: Vec<AggSignature>,
    ) -> Result<Self> {
        let lattice = TypeLattice::try_new()?;

        for sig in operators.iter().chain(functions.iter()) {
            validate_name(sig)?;
        }
        for sig in &aggregates {
            validate_name(sig)?;
        }

        let mut casts = HashMap::new();
        let mut unsafe_casts = HashSet::new();
        let mut cast_sigs = Vec::new();

        for (from, to, kind) in lattice.edges() {
            let sig = FunctionSignature::new(format!("{CAST_PREFIX}{}", to.name()), vec![from], to)
                .with_missable(kind == CastKind::ExplicitLossy);
            if kind == CastKind::ExplicitLossy {
                unsafe_casts.insert(sig.specific.clone());
            }
            casts.insert((from, to), sig.clone());
            cast_sigs.push(sig);
        }

        let operators = build_namespace(operators);
        let functions = build_namespace(functions.into_iter().chain(cast_sigs));
        let aggregates = build_namespace(aggregates);

        Ok(FunctionCatalog {
            lattice,
            operators,
            functions,
            aggregates,
            casts,
            unsafe_casts,
        })
    }

    pub fn lattice(&self) -> &TypeLattice {
        &self.lattice
    }

    pub fn operators(&self, name: &str) -> &[FunctionSignature] {
        self.operators.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn functions(&self, name: &str) -> &[FunctionSignature] {
        self.functions.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn aggregates(&self, name: &str) -> &[AggSignature] {
        self.aggregates.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Cast signature to use when implicitly coercing `from` to `to`.
    ///
    /// Returns None if the lattice doesn't allow the coercion.
    pub fn coercion(&self, from: DataTypeId, to: DataTypeId) -> Option<&FunctionSignature> {
        if !self.lattice.can_coerce(from, to) {
            return None;
        }
        self.casts.get(&(from, to))
    }

    /// Cast signature for an explicit cast, regardless of classification.
    pub fn cast(&self, from: DataTypeId, to: DataTypeId) -> Option<&FunctionSignature> {
        self.casts.get(&(from, to))
    }

    pub fn is_unsafe_cast(&self, specific: &str) -> bool {
        self.unsafe_casts.contains(specific)
    }
}

fn validate_name<S: Signature>(sig: &S) -> Result<()> {
    if sig.name().is_empty() {
        return Err(PartiqlError::new("Function signature with empty name")
            .with_field("specific", sig.specific()));
    }
    if sig.name().starts_with(CAST_PREFIX) {
        return Err(
            PartiqlError::new("Function name uses reserved cast prefix").with_field("name", sig.name())
        );
    }
    Ok(())
}

fn build_namespace<S: Signature>(sigs: impl IntoIterator<Item = S>) -> IndexMap<String, Vec<S>> {
    let mut namespace: IndexMap<String, Vec<S>> = IndexMap::new();
    let mut seen = HashSet::new();

    for sig in sigs {
        if !seen.insert(sig.specific().to_string()) {
            trace!(specific = %sig.specific(), "skipping duplicate signature");
            continue;
        }
        namespace.entry(sig.name().to_string()).or_default().push(sig);
    }

    for overloads in namespace.values_mut() {
        overloads.sort_by(|a, b| {
            a.parameters()
                .len()
                .cmp(&b.parameters().len())
                .then_with(|| a.parameters().cmp(b.parameters()))
        });
    }

    namespace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloads_sorted_by_precedence() {
        let catalog = FunctionCatalog::try_new().unwrap();
        let plus = catalog.operators("plus");

        let first_params: Vec<_> = plus.iter().map(|s| s.parameters[0]).collect();
        let mut sorted = first_params.clone();
        sorted.sort();
        assert_eq!(sorted, first_params);
        assert_eq!(DataTypeId::Int8, plus[0].parameters[0]);
    }

    #[test]
    fn arity_sorted_first() {
        let catalog = FunctionCatalog::try_new().unwrap();
        let like = catalog.operators("like");
        assert_eq!(2, like[0].parameters.len());
        assert_eq!(3, like[1].parameters.len());
    }

    #[test]
    fn duplicate_specific_removed() {
        let sig = FunctionSignature::new("f", vec![DataTypeId::Int32], DataTypeId::Int32);
        let catalog =
            FunctionCatalog::try_new_with(Vec::new(), vec![sig.clone(), sig], Vec::new()).unwrap();
        assert_eq!(1, catalog.functions("f").len());
    }

    #[test]
    fn cast_signatures_synthesized() {
        let catalog = FunctionCatalog::try_new().unwrap();

        let to_int32 = catalog.functions("cast_int32");
        assert!(to_int32.iter().any(|s| s.parameters == [DataTypeId::String]));
        assert!(to_int32.iter().all(|s| s.returns == DataTypeId::Int32));

        let lossy = catalog.cast(DataTypeId::String, DataTypeId::Int32).unwrap();
        assert!(catalog.is_unsafe_cast(&lossy.specific));
        assert!(lossy.is_missable);

        let lossless = catalog.cast(DataTypeId::Int32, DataTypeId::String).unwrap();
        assert!(!catalog.is_unsafe_cast(&lossless.specific));
    }

    #[test]
    fn coercion_only_for_implicit() {
        let catalog = FunctionCatalog::try_new().unwrap();
        assert!(catalog.coercion(DataTypeId::Int32, DataTypeId::Int64).is_some());
        assert!(catalog.coercion(DataTypeId::Int32, DataTypeId::String).is_none());
        assert!(catalog.coercion(DataTypeId::Bag, DataTypeId::List).is_none());
    }

    #[test]
    fn reserved_cast_prefix() {
        let sig = FunctionSignature::new("cast_int32", vec![DataTypeId::Int32], DataTypeId::Int32);
        let result = FunctionCatalog::try_new_with(Vec::new(), vec![sig], Vec::new());
        assert!(result.is_err());
    }
}
