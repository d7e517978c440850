use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use tracing::trace;

use super::catalog::FunctionCatalog;
use super::signature::{AggSignature, FunctionSignature, Signature};
use crate::types::{DataTypeId, StaticType};

/// A signature along with the casts needed to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct FnMatchCandidate<S> {
    pub signature: S,
    /// Cast to apply to each argument, None if the argument can be passed as
    /// is.
    pub coercions: Vec<Option<FunctionSignature>>,
}

/// Result of resolving a call.
#[derive(Debug, Clone, PartialEq)]
pub enum FnMatch<S> {
    /// Exactly one overload applies.
    Static {
        candidate: FnMatchCandidate<S>,
        /// The call may produce MISSING even if the signature's return type
        /// doesn't say so.
        is_missable: bool,
    },
    /// Arguments have union types and different members select different
    /// overloads. Dispatch happens at run time.
    Dynamic {
        candidates: Vec<FnMatchCandidate<S>>,
        /// Every member combination of the arguments selects a candidate.
        exhaustive: bool,
        is_missable: bool,
    },
}

impl<S> FnMatch<S> {
    pub fn is_missable(&self) -> bool {
        match self {
            Self::Static { is_missable, .. } | Self::Dynamic { is_missable, .. } => *is_missable,
        }
    }
}

/// No overload accepts the given arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FnResolutionError {
    pub name: String,
    pub args: Vec<StaticType>,
    /// Display form of every overload that was considered.
    pub candidates: Vec<String>,
}

impl fmt::Display for FnResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No matching signature for {}(", self.name)?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

impl Error for FnResolutionError {}

/// Selects overloads for calls.
///
/// Candidates are tried in precedence order and the first one whose
/// parameters accept the arguments, possibly after implicit casts, wins.
/// There's no search for a "most specific" overload.
#[derive(Debug, Clone, Copy)]
pub struct FnResolver<'a> {
    catalog: &'a FunctionCatalog,
}

impl<'a> FnResolver<'a> {
    pub fn new(catalog: &'a FunctionCatalog) -> Self {
        FnResolver { catalog }
    }

    /// Resolve a scalar call.
    ///
    /// Operators (calls originating from syntax like `a + b`) and named
    /// functions live in separate namespaces.
    pub fn resolve(
        &self,
        name: &str,
        is_operator: bool,
        args: &[StaticType],
    ) -> Result<FnMatch<FunctionSignature>, FnResolutionError> {
        let candidates = if is_operator {
            self.catalog.operators(name)
        } else {
            self.catalog.functions(name)
        };
        self.resolve_candidates(name, candidates, args)
    }

    pub fn resolve_agg(
        &self,
        name: &str,
        args: &[StaticType],
    ) -> Result<FnMatch<AggSignature>, FnResolutionError> {
        self.resolve_candidates(name, self.catalog.aggregates(name), args)
    }

    fn resolve_candidates<S: Signature>(
        &self,
        name: &str,
        candidates: &[S],
        args: &[StaticType],
    ) -> Result<FnMatch<S>, FnResolutionError> {
        let permutations = argument_permutations(candidates, args);

        let mut matches: Vec<FnMatchCandidate<S>> = Vec::new();
        let mut exhaustive = true;
        for perm in &permutations {
            match self.match_first(candidates, perm) {
                Some(m) => {
                    if !matches.contains(&m) {
                        matches.push(m);
                    }
                }
                None => exhaustive = false,
            }
        }

        if matches.is_empty() {
            return Err(FnResolutionError {
                name: name.to_string(),
                args: args.to_vec(),
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            });
        }

        let args_missable = args.iter().any(|arg| arg.admits_missing());
        let sig_missable = |sig: &S| sig.is_missable() || self.catalog.is_unsafe_cast(sig.specific());

        if matches.len() == 1 {
            let candidate = matches.remove(0);
            let is_missable = args_missable || !exhaustive || sig_missable(&candidate.signature);
            trace!(%name, signature = %candidate.signature, is_missable, "resolved static call");
            return Ok(FnMatch::Static {
                candidate,
                is_missable,
            });
        }

        let is_missable = args_missable
            || !exhaustive
            || matches.iter().any(|m| sig_missable(&m.signature));
        trace!(%name, candidates = matches.len(), exhaustive, "resolved dynamic call");

        Ok(FnMatch::Dynamic {
            candidates: matches,
            exhaustive,
            is_missable,
        })
    }

    /// Find the first candidate accepting `args`.
    fn match_first<S: Signature>(
        &self,
        candidates: &[S],
        args: &[DataTypeId],
    ) -> Option<FnMatchCandidate<S>> {
        let mut buf = Vec::new();
        for sig in candidates {
            if self.compare_and_fill_casts(args, sig.parameters(), &mut buf) {
                return Some(FnMatchCandidate {
                    signature: sig.clone(),
                    coercions: std::mem::take(&mut buf),
                });
            }
        }
        None
    }

    /// Compare the types we have with the types we want, filling the buffer
    /// with the casts needed.
    ///
    /// Returns false if some argument can't be implicitly cast.
    fn compare_and_fill_casts(
        &self,
        have: &[DataTypeId],
        want: &[DataTypeId],
        buf: &mut Vec<Option<FunctionSignature>>,
    ) -> bool {
        if have.len() != want.len() {
            return false;
        }
        buf.clear();

        for (&have, &want) in have.iter().zip(want.iter()) {
            // NULL and MISSING are accepted anywhere, they propagate through
            // the call.
            if have == want
                || want == DataTypeId::Any
                || have == DataTypeId::Null
                || have == DataTypeId::Missing
            {
                buf.push(None);
                continue;
            }

            match self.catalog.coercion(have, want) {
                Some(cast) => buf.push(Some(cast.clone())),
                None => return false,
            }
        }

        true
    }
}

/// Expand union typed arguments into every combination of member types.
///
/// NULL and MISSING members are dropped unless that's all there is. An
/// argument typed ANY expands to the parameter types the candidates declare
/// at that position.
fn argument_permutations<S: Signature>(candidates: &[S], args: &[StaticType]) -> Vec<Vec<DataTypeId>> {
    let per_arg: Vec<Vec<DataTypeId>> = args
        .iter()
        .enumerate()
        .map(|(pos, arg)| expand_argument(candidates, args.len(), pos, arg))
        .collect();

    let mut perms: Vec<Vec<DataTypeId>> = vec![Vec::with_capacity(args.len())];
    for options in per_arg {
        let mut next = Vec::with_capacity(perms.len() * options.len());
        for perm in &perms {
            for &opt in &options {
                let mut p = perm.clone();
                p.push(opt);
                next.push(p);
            }
        }
        perms = next;
    }

    perms
}

fn expand_argument<S: Signature>(
    candidates: &[S],
    arity: usize,
    pos: usize,
    arg: &StaticType,
) -> Vec<DataTypeId> {
    let mut ids = BTreeSet::new();
    for member in arg.strip_absent().members() {
        match member {
            StaticType::Any => {
                let params: BTreeSet<_> = candidates
                    .iter()
                    .filter(|c| c.parameters().len() == arity)
                    .map(|c| c.parameters()[pos])
                    .collect();
                if params.is_empty() || params.contains(&DataTypeId::Any) {
                    ids.insert(DataTypeId::Any);
                } else {
                    ids.extend(params);
                }
            }
            other => {
                if let Some(id) = other.type_id() {
                    ids.insert(id);
                }
            }
        }
    }
    ids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FunctionCatalog {
        FunctionCatalog::try_new().unwrap()
    }

    fn static_sig<S: Clone + fmt::Debug>(m: &FnMatch<S>) -> S {
        match m {
            FnMatch::Static { candidate, .. } => candidate.signature.clone(),
            other => panic!("expected static match: {other:?}"),
        }
    }

    #[test]
    fn exact_match_no_casts() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("plus", true, &[StaticType::Int16, StaticType::Int16])
            .unwrap();
        let FnMatch::Static {
            candidate,
            is_missable,
        } = m
        else {
            panic!("expected static match");
        };
        assert_eq!("plus_int16_int16", candidate.signature.specific);
        assert_eq!(vec![None, None], candidate.coercions);
        assert!(!is_missable);
    }

    #[test]
    fn deterministic() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);
        let args = [StaticType::Int32, StaticType::Int64];

        let a = resolver.resolve("plus", true, &args).unwrap();
        let b = resolver.resolve("plus", true, &args).unwrap();
        assert_eq!(a, b);
        assert_eq!("plus_int64_int64", static_sig(&a).specific);
    }

    #[test]
    fn implicit_cast_inserted() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("plus", true, &[StaticType::Int32, StaticType::Int64])
            .unwrap();
        let FnMatch::Static { candidate, .. } = m else {
            panic!("expected static match");
        };
        let cast = candidate.coercions[0].as_ref().unwrap();
        assert_eq!("cast_int64", cast.name);
        assert_eq!(vec![DataTypeId::Int32], cast.parameters);
        assert_eq!(None, candidate.coercions[1]);
    }

    #[test]
    fn narrowest_preferred() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        // NULL matches every abs overload without coercion.
        let m = resolver.resolve("abs", false, &[StaticType::Null]).unwrap();
        assert_eq!("abs_int8", static_sig(&m).specific);
    }

    #[test]
    fn missable_argument() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let arg = StaticType::union([StaticType::Int32, StaticType::Missing]);
        let m = resolver
            .resolve("plus", true, &[arg, StaticType::Int32])
            .unwrap();

        assert!(m.is_missable());
        let sig = static_sig(&m);
        assert_eq!("plus_int32_int32", sig.specific);
        assert_eq!(DataTypeId::Int32, sig.returns);
    }

    #[test]
    fn missable_signature() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("divide", true, &[StaticType::Int32, StaticType::Int32])
            .unwrap();
        assert!(m.is_missable());
    }

    #[test]
    fn unsafe_cast_missable() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let lossy = resolver
            .resolve("cast_int32", false, &[StaticType::String])
            .unwrap();
        assert!(lossy.is_missable());

        let lossless = resolver
            .resolve("cast_string", false, &[StaticType::Int32])
            .unwrap();
        assert!(!lossless.is_missable());
    }

    #[test]
    fn missing_argument_matches_without_cast() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver.resolve("not", true, &[StaticType::Missing]).unwrap();
        assert_eq!("not_bool", static_sig(&m).specific);
        assert!(m.is_missable());
    }

    #[test]
    fn no_match_reports_candidates() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        // INT32 -> STRING is not implicit.
        let err = resolver
            .resolve("upper", false, &[StaticType::Int32])
            .unwrap_err();
        assert_eq!("upper", err.name);
        assert_eq!(vec![StaticType::Int32], err.args);
        assert_eq!(vec!["upper(STRING) -> STRING".to_string()], err.candidates);
    }

    #[test]
    fn operator_and_function_namespaces_separate() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        assert!(resolver.resolve("plus", false, &[StaticType::Int32, StaticType::Int32]).is_err());
        assert!(resolver.resolve("upper", true, &[StaticType::String]).is_err());
    }

    #[test]
    fn union_argument_dynamic() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let arg = StaticType::union([StaticType::Int32, StaticType::Float64]);
        let m = resolver.resolve("abs", false, &[arg]).unwrap();
        let FnMatch::Dynamic {
            candidates,
            exhaustive,
            ..
        } = m
        else {
            panic!("expected dynamic match");
        };
        assert!(exhaustive);
        let specifics: Vec<_> = candidates.iter().map(|c| c.signature.specific.as_str()).collect();
        assert_eq!(vec!["abs_int32", "abs_float64"], specifics);
    }

    #[test]
    fn partially_matching_union_is_missable() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let arg = StaticType::union([StaticType::String, StaticType::open_struct()]);
        let m = resolver.resolve("upper", false, &[arg]).unwrap();
        assert_eq!("upper_string", static_sig(&m).specific);
        assert!(m.is_missable());
    }

    #[test]
    fn any_argument_with_any_parameter_static() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("eq", true, &[StaticType::Any, StaticType::Int32])
            .unwrap();
        assert_eq!("eq_any_any", static_sig(&m).specific);
    }

    #[test]
    fn any_argument_expands_to_parameters() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("in_collection", true, &[StaticType::Int32, StaticType::Any])
            .unwrap();
        let FnMatch::Dynamic { candidates, .. } = m else {
            panic!("expected dynamic match");
        };
        assert_eq!(3, candidates.len());
    }

    /// Resolution picks the first candidate that matches in precedence order,
    /// even when a later candidate would need fewer casts.
    #[test]
    fn greedy_first_match_not_most_specific() {
        let functions = vec![
            FunctionSignature::new("f", vec![DataTypeId::Int16, DataTypeId::Float64], DataTypeId::Int16),
            FunctionSignature::new("f", vec![DataTypeId::Int64, DataTypeId::Int8], DataTypeId::Int64),
        ];
        let catalog = FunctionCatalog::try_new_with(Vec::new(), functions, Vec::new()).unwrap();
        let resolver = FnResolver::new(&catalog);

        let m = resolver
            .resolve("f", false, &[StaticType::Int8, StaticType::Int8])
            .unwrap();
        assert_eq!("f_int16_float64", static_sig(&m).specific);
    }

    #[test]
    fn resolve_aggregates() {
        let catalog = catalog();
        let resolver = FnResolver::new(&catalog);

        let m = resolver.resolve_agg("sum", &[StaticType::Int32]).unwrap();
        assert_eq!("sum_int32", static_sig(&m).specific);

        let m = resolver.resolve_agg("count_star", &[]).unwrap();
        assert_eq!(DataTypeId::Int64, static_sig(&m).returns);

        assert!(resolver.resolve_agg("sum", &[StaticType::String]).is_err());
    }
}
