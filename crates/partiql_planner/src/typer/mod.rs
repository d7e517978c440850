//! Variable resolution and static typing of logical plans.
//!
//! The typer rebuilds the plan bottom up. Every expression gets a static
//! type, every unresolved variable is bound to a local position or a global,
//! and every unresolved call is matched against the function catalog with
//! implicit casts inserted around its arguments. Nodes are folded as soon as
//! they're typed.

pub mod env;

use std::collections::HashMap;

use partiql_ast::{Identifier, JoinKind, SourceLocation, Symbol, VarScope};
use partiql_error::{OptionExt, PartiqlError, Result};
use tracing::trace;

use self::env::ResolutionResult;
pub use self::env::{ResolutionStrategy, TypeEnv};
use crate::catalog::{GlobalResolution, VariableResolver};
use crate::config::{PlannerConfig, UndefinedVariableBehavior};
use crate::diagnostics::{ProblemCollector, ProblemDetails};
use crate::functions::{AggSignature, FnMatch, FnResolver, FunctionCatalog, FunctionSignature};
use crate::optimizer::const_fold::ConstFold;
use crate::plan::{
    AggCall, Binding, Call, LogicalPlan, Rel, RelOp, Rex, RexCaseBranch, RexOp, RexStructField,
    SortSpec, SubqueryCoercion, VarRef,
};
use crate::types::{StaticType, StructField};

/// Minimum similarity for a binding to be suggested in place of an
/// undefined variable.
const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug)]
pub struct PlanTyper<'a> {
    catalog: &'a FunctionCatalog,
    resolver: &'a dyn VariableResolver,
    config: &'a PlannerConfig,
    problems: &'a mut ProblemCollector,
    /// Global lookups made so far, keyed by name and case sensitivity.
    cache: HashMap<(String, bool), GlobalResolution>,
}

impl<'a> PlanTyper<'a> {
    pub fn new(
        catalog: &'a FunctionCatalog,
        resolver: &'a dyn VariableResolver,
        config: &'a PlannerConfig,
        problems: &'a mut ProblemCollector,
    ) -> Self {
        PlanTyper {
            catalog,
            resolver,
            config,
            problems,
            cache: HashMap::new(),
        }
    }

    pub fn type_plan(&mut self, plan: LogicalPlan) -> Result<LogicalPlan> {
        let root = self.type_rex(plan.root, &TypeEnv::root())?;
        Ok(LogicalPlan { root })
    }

    pub fn type_rel(&mut self, rel: Rel, env: &TypeEnv<'_>) -> Result<Rel> {
        let Rel { op, schema } = rel;

        match op {
            RelOp::Scan { rex } => {
                let rex = self.type_rex(rex, &env.with_strategy(ResolutionStrategy::Global))?;
                let schema = vec![Binding::new(binding_name(&schema, 0)?, rex.ty.element_type())];
                Ok(Rel::new(RelOp::Scan { rex }, schema))
            }
            RelOp::ScanIndexed { rex } => {
                let rex = self.type_rex(rex, &env.with_strategy(ResolutionStrategy::Global))?;
                let schema = vec![
                    Binding::new(binding_name(&schema, 0)?, rex.ty.element_type()),
                    Binding::new(binding_name(&schema, 1)?, StaticType::Int64),
                ];
                Ok(Rel::new(RelOp::ScanIndexed { rex }, schema))
            }
            RelOp::Unpivot { rex } => {
                let rex = self.type_rex(rex, &env.with_strategy(ResolutionStrategy::Global))?;
                let value = match rex.ty.as_closed_struct() {
                    Some(s) => StaticType::union(s.fields.iter().map(|f| f.ty.clone())),
                    None => StaticType::Any,
                };
                let schema = vec![
                    Binding::new(binding_name(&schema, 0)?, value),
                    Binding::new(binding_name(&schema, 1)?, StaticType::String),
                ];
                Ok(Rel::new(RelOp::Unpivot { rex }, schema))
            }
            RelOp::Filter { input, predicate } => {
                let input = self.type_rel(*input, env)?;
                let predicate = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    self.type_rex(predicate, &inner)?
                };
                let schema = input.schema.clone();
                Ok(Rel::new(
                    RelOp::Filter {
                        input: Box::new(input),
                        predicate,
                    },
                    schema,
                ))
            }
            RelOp::Project { input, projections } => {
                let input = self.type_rel(*input, env)?;
                let projections = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    self.type_rexes(projections, &inner)?
                };
                let schema = named_schema(&schema, projections.iter().map(|p| p.ty.clone()).collect())?;
                Ok(Rel::new(
                    RelOp::Project {
                        input: Box::new(input),
                        projections,
                    },
                    schema,
                ))
            }
            RelOp::Join {
                lhs,
                rhs,
                condition,
                kind,
            } => {
                let lhs = self.type_rel(*lhs, env)?;
                // Right side is lateral, it can reference the left side.
                let rhs = {
                    let lateral = env.nested(&lhs.schema, ResolutionStrategy::Global);
                    self.type_rel(*rhs, &lateral)?
                };
                let schema = join_schema(kind, &lhs.schema, &rhs.schema);
                let condition = {
                    let inner = env.nested(&schema, ResolutionStrategy::Local);
                    self.type_rex(condition, &inner)?
                };
                Ok(Rel::new(
                    RelOp::Join {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        condition,
                        kind,
                    },
                    schema,
                ))
            }
            RelOp::Aggregate {
                input,
                calls,
                groups,
                strategy,
            } => {
                let input = self.type_rel(*input, env)?;
                let (calls, call_types, groups) = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    let mut typed = Vec::with_capacity(calls.len());
                    let mut types = Vec::with_capacity(calls.len());
                    for call in calls {
                        let (call, ty) = self.type_agg(call, &inner)?;
                        typed.push(call);
                        types.push(ty);
                    }
                    let groups = self.type_rexes(groups, &inner)?;
                    (typed, types, groups)
                };

                let mut types = call_types;
                types.extend(groups.iter().map(|g| g.ty.clone()));
                let schema = named_schema(&schema, types)?;

                Ok(Rel::new(
                    RelOp::Aggregate {
                        input: Box::new(input),
                        calls,
                        groups,
                        strategy,
                    },
                    schema,
                ))
            }
            RelOp::Sort { input, specs } => {
                let input = self.type_rel(*input, env)?;
                let specs = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    let mut typed = Vec::with_capacity(specs.len());
                    for spec in specs {
                        typed.push(SortSpec {
                            rex: self.type_rex(spec.rex, &inner)?,
                            order: spec.order,
                        });
                    }
                    typed
                };
                let schema = input.schema.clone();
                Ok(Rel::new(
                    RelOp::Sort {
                        input: Box::new(input),
                        specs,
                    },
                    schema,
                ))
            }
            RelOp::Limit { input, limit } => {
                let input = self.type_rel(*input, env)?;
                let limit = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    self.type_rex(limit, &inner)?
                };
                let schema = input.schema.clone();
                Ok(Rel::new(
                    RelOp::Limit {
                        input: Box::new(input),
                        limit,
                    },
                    schema,
                ))
            }
            RelOp::Offset { input, offset } => {
                let input = self.type_rel(*input, env)?;
                let offset = {
                    let inner = env.nested(&input.schema, ResolutionStrategy::Local);
                    self.type_rex(offset, &inner)?
                };
                let schema = input.schema.clone();
                Ok(Rel::new(
                    RelOp::Offset {
                        input: Box::new(input),
                        offset,
                    },
                    schema,
                ))
            }
            RelOp::Distinct { input } => {
                let input = self.type_rel(*input, env)?;
                let schema = input.schema.clone();
                Ok(Rel::new(
                    RelOp::Distinct {
                        input: Box::new(input),
                    },
                    schema,
                ))
            }
            RelOp::SetOp {
                op,
                quantifier,
                lhs,
                rhs,
            } => {
                let lhs = self.type_rel(*lhs, env)?;
                let rhs = self.type_rel(*rhs, env)?;
                if lhs.schema.len() != rhs.schema.len() {
                    return Err(PartiqlError::new("Set operation inputs have different widths")
                        .with_field("left", lhs.schema.len())
                        .with_field("right", rhs.schema.len()));
                }
                let schema = lhs
                    .schema
                    .iter()
                    .zip(&rhs.schema)
                    .map(|(l, r)| {
                        Binding::new(l.name.clone(), StaticType::union([l.ty.clone(), r.ty.clone()]))
                    })
                    .collect();
                Ok(Rel::new(
                    RelOp::SetOp {
                        op,
                        quantifier,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    schema,
                ))
            }
            RelOp::Exclude { input, .. } => {
                let input = self.type_rel(*input, env)?;
                self.problems.error(
                    SourceLocation::UNKNOWN,
                    ProblemDetails::UnimplementedFeature {
                        feature: "EXCLUDE".to_string(),
                    },
                );
                Ok(Rel::new(
                    RelOp::Err {
                        message: "EXCLUDE is not implemented".to_string(),
                    },
                    input.schema,
                ))
            }
            RelOp::Err { message } => Ok(Rel::new(RelOp::Err { message }, schema)),
        }
    }

    pub fn type_rex(&mut self, rex: Rex, env: &TypeEnv<'_>) -> Result<Rex> {
        let Rex { op, ty } = rex;

        match op {
            RexOp::Lit(value) => {
                let ty = value.static_type();
                Ok(Rex::with_type(RexOp::Lit(value), ty))
            }
            RexOp::Var(var) => self.type_var(var, env),
            RexOp::PathSymbol { root, symbol } => {
                let root = self.type_rex(*root, env)?;
                Ok(path_symbol(root, symbol))
            }
            RexOp::PathKey { root, key } => {
                let root = self.type_rex(*root, env)?;
                let key = self.type_rex(*key, env)?;
                let ty = match key.try_as_lit().and_then(|k| k.try_as_str()) {
                    Some(name) => field_type(&root.ty, name, true),
                    None => StaticType::Any,
                };
                let rex = Rex::with_type(
                    RexOp::PathKey {
                        root: Box::new(root),
                        key: Box::new(key),
                    },
                    ty,
                );
                Ok(ConstFold::fold_node(rex))
            }
            RexOp::PathIndex { root, index } => {
                let root = self.type_rex(*root, env)?;
                let index = self.type_rex(*index, env)?;
                let ty = index_type(&root.ty);
                Ok(Rex::with_type(
                    RexOp::PathIndex {
                        root: Box::new(root),
                        index: Box::new(index),
                    },
                    ty,
                ))
            }
            RexOp::PathWildcard { .. } => Ok(self.unimplemented("wildcard path step '[*]'")),
            RexOp::PathUnpivot { .. } => Ok(self.unimplemented("unpivot path step '.*'")),
            RexOp::Call(call) => self.type_call(call, env),
            RexOp::Case { branches, default } => {
                let mut typed = Vec::with_capacity(branches.len());
                for branch in branches {
                    typed.push(RexCaseBranch {
                        condition: self.type_rex(branch.condition, env)?,
                        result: self.type_rex(branch.result, env)?,
                    });
                }
                let default = self.type_rex(*default, env)?;

                let ty = StaticType::union(
                    typed
                        .iter()
                        .map(|b| b.result.ty.clone())
                        .chain([default.ty.clone()]),
                );
                let rex = Rex::with_type(
                    RexOp::Case {
                        branches: typed,
                        default: Box::new(default),
                    },
                    ty,
                );
                Ok(ConstFold::fold_node(rex))
            }
            RexOp::Collection { kind, values } => {
                let values = self.type_rexes(values, env)?;
                let element = if values.is_empty() {
                    StaticType::Any
                } else {
                    StaticType::union(values.iter().map(|v| v.ty.clone()))
                };
                let ty = match kind {
                    partiql_ast::CollectionKind::Bag => StaticType::bag(element),
                    partiql_ast::CollectionKind::List => StaticType::list(element),
                    partiql_ast::CollectionKind::Sexp => StaticType::sexp(element),
                };
                Ok(Rex::with_type(RexOp::Collection { kind, values }, ty))
            }
            RexOp::Struct { fields } => {
                let mut typed = Vec::with_capacity(fields.len());
                for field in fields {
                    typed.push(RexStructField {
                        key: self.type_rex(field.key, env)?,
                        value: self.type_rex(field.value, env)?,
                    });
                }
                let ty = struct_type(&typed);
                Ok(Rex::with_type(RexOp::Struct { fields: typed }, ty))
            }
            RexOp::TupleUnion { args } => {
                let args = self.type_rexes(args, env)?;
                let ty = tuple_union_type(&args);
                Ok(ConstFold::fold_node(Rex::with_type(
                    RexOp::TupleUnion { args },
                    ty,
                )))
            }
            RexOp::Select { constructor, rel } => {
                let rel = self.type_rel(*rel, env)?;
                let constructor = {
                    let inner = env.nested(&rel.schema, ResolutionStrategy::Local);
                    self.type_rex(*constructor, &inner)?
                };
                let ty = if rel.is_ordered() {
                    StaticType::list(constructor.ty.clone())
                } else {
                    StaticType::bag(constructor.ty.clone())
                };
                Ok(Rex::with_type(
                    RexOp::Select {
                        constructor: Box::new(constructor),
                        rel: Box::new(rel),
                    },
                    ty,
                ))
            }
            RexOp::Pivot { key, value, rel } => {
                let rel = self.type_rel(*rel, env)?;
                let (key, value) = {
                    let inner = env.nested(&rel.schema, ResolutionStrategy::Local);
                    (
                        self.type_rex(*key, &inner)?,
                        self.type_rex(*value, &inner)?,
                    )
                };
                Ok(Rex::with_type(
                    RexOp::Pivot {
                        key: Box::new(key),
                        value: Box::new(value),
                        rel: Box::new(rel),
                    },
                    StaticType::open_struct(),
                ))
            }
            RexOp::Subquery { select, coercion } => {
                let select = self.type_rex(*select, env)?;
                let ty = subquery_type(&select.ty, coercion);
                Ok(Rex::with_type(
                    RexOp::Subquery {
                        select: Box::new(select),
                        coercion,
                    },
                    ty,
                ))
            }
            RexOp::Err { message } => {
                trace!(%message, ?ty, "retyping error node");
                Ok(Rex::err(message))
            }
        }
    }

    fn type_rexes(&mut self, rexes: Vec<Rex>, env: &TypeEnv<'_>) -> Result<Vec<Rex>> {
        rexes.into_iter().map(|rex| self.type_rex(rex, env)).collect()
    }

    fn type_var(&mut self, var: VarRef, env: &TypeEnv<'_>) -> Result<Rex> {
        match var {
            VarRef::Local { depth, index } => {
                let binding = env.binding(depth, index).ok_or_else(|| {
                    PartiqlError::new("Local variable reference out of range")
                        .with_field("depth", depth)
                        .with_field("index", index)
                })?;
                Ok(Rex::with_type(
                    RexOp::Var(VarRef::Local { depth, index }),
                    binding.ty.clone(),
                ))
            }
            VarRef::Global { id } => {
                let ty = self.resolver.global_type(&id);
                Ok(Rex::with_type(RexOp::Var(VarRef::Global { id }), ty))
            }
            VarRef::Dynamic { .. } => Ok(Rex::new(RexOp::Var(var))),
            VarRef::Unresolved {
                identifier,
                scope,
                location,
            } => Ok(self.resolve_var(&identifier, scope, location, env)),
        }
    }

    fn resolve_var(
        &mut self,
        identifier: &Identifier,
        scope: VarScope,
        location: SourceLocation,
        env: &TypeEnv<'_>,
    ) -> Rex {
        let strategy = match scope {
            VarScope::Local => ResolutionStrategy::Local,
            VarScope::Default => env.strategy,
        };

        let (result, consumed) = match strategy {
            ResolutionStrategy::Local => {
                Self::resolve_local(identifier, env).or_else(|| self.resolve_global(identifier))
            }
            ResolutionStrategy::Global => {
                self.resolve_global(identifier).or_else(|| Self::resolve_local(identifier, env))
            }
        }
        .unwrap_or((ResolutionResult::Undefined, 0));

        let mut rex = match result {
            ResolutionResult::LocalVariable { depth, index } => {
                let ty = env
                    .binding(depth, index)
                    .map(|b| b.ty.clone())
                    .unwrap_or(StaticType::Any);
                Rex::with_type(RexOp::Var(VarRef::Local { depth, index }), ty)
            }
            ResolutionResult::GlobalVariable(id) => {
                let ty = self.resolver.global_type(&id);
                Rex::with_type(RexOp::Var(VarRef::Global { id }), ty)
            }
            ResolutionResult::Undefined => return self.undefined_variable(identifier, location, env),
        };

        for part in &identifier.parts()[consumed..] {
            rex = path_symbol(rex, part.clone());
        }
        rex
    }

    /// Resolve the head of an identifier against local bindings.
    ///
    /// Returns the resolution and the number of identifier parts it covers.
    /// Implicitly qualified names cover zero parts, the whole identifier
    /// becomes a path into the owning binding.
    fn resolve_local(identifier: &Identifier, env: &TypeEnv<'_>) -> Option<(ResolutionResult, usize)> {
        let (result, is_field) = env.resolve_local(identifier.first())?;
        Some((result, if is_field { 0 } else { 1 }))
    }

    /// Resolve the longest prefix of an identifier naming a global.
    fn resolve_global(&mut self, identifier: &Identifier) -> Option<(ResolutionResult, usize)> {
        for n in (1..=identifier.parts().len()).rev() {
            let name = identifier.prefix_name(n);
            let case_sensitive = identifier.prefix_case_sensitive(n);
            if let GlobalResolution::Found(id) = self.lookup_global(name, case_sensitive) {
                return Some((ResolutionResult::GlobalVariable(id), n));
            }
        }
        None
    }

    fn lookup_global(&mut self, name: String, case_sensitive: bool) -> GlobalResolution {
        let resolver = self.resolver;
        self.cache
            .entry((name, case_sensitive))
            .or_insert_with_key(|(name, case_sensitive)| {
                let resolution = resolver.resolve(name, *case_sensitive);
                trace!(%name, case_sensitive, ?resolution, "resolved global variable");
                resolution
            })
            .clone()
    }

    fn undefined_variable(
        &mut self,
        identifier: &Identifier,
        location: SourceLocation,
        env: &TypeEnv<'_>,
    ) -> Rex {
        let num_parts = identifier.parts().len();
        let name = identifier.prefix_name(num_parts);
        let case_sensitive = identifier.prefix_case_sensitive(num_parts);
        let suggestion = self.suggest(&identifier.first().text, env);

        let details = ProblemDetails::UndefinedVariable {
            name: name.clone(),
            case_sensitive,
            suggestion,
        };

        match self.config.undefined_variable_behavior {
            UndefinedVariableBehavior::Error => {
                self.problems.error(location, details);
                Rex::err(format!("undefined variable {name}"))
            }
            UndefinedVariableBehavior::Permissive => {
                self.problems.warning(location, details);
                let head = identifier.first();
                let mut rex = Rex::new(RexOp::Var(VarRef::Dynamic {
                    name: head.text.clone(),
                    case_sensitive: head.is_case_sensitive(),
                    lookup_order: env.dynamic_lookup_order(),
                }));
                for part in &identifier.parts()[1..] {
                    rex = path_symbol(rex, part.clone());
                }
                rex
            }
        }
    }

    /// Find the known name most similar to `name`.
    fn suggest(&self, name: &str, env: &TypeEnv<'_>) -> Option<String> {
        let candidates = env
            .binding_names()
            .into_iter()
            .map(|n| n.to_string())
            .chain(self.resolver.candidate_names());

        let mut best: Option<(f64, String)> = None;
        for candidate in candidates {
            let score = strsim::jaro(&candidate, name);
            if score > SIMILARITY_THRESHOLD && best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }

        best.map(|(_, candidate)| candidate)
    }

    fn type_call(&mut self, call: Call, env: &TypeEnv<'_>) -> Result<Rex> {
        match call {
            Call::Unresolved {
                name,
                args,
                is_operator,
                location,
            } => {
                let args = self.type_rexes(args, env)?;
                Ok(self.resolve_call(name, args, is_operator, location))
            }
            Call::Static {
                signature,
                args,
                is_missable,
            } => {
                let args = self.type_rexes(args, env)?;
                let ty = return_type(&signature, &args, is_missable);
                Ok(Rex::with_type(
                    RexOp::Call(Call::Static {
                        signature,
                        args,
                        is_missable,
                    }),
                    ty,
                ))
            }
            Call::Dynamic {
                candidates,
                args,
                exhaustive,
                is_missable,
            } => {
                let args = self.type_rexes(args, env)?;
                let ty = StaticType::union(
                    candidates
                        .iter()
                        .map(|c| return_type(&c.signature, &args, is_missable)),
                );
                Ok(Rex::with_type(
                    RexOp::Call(Call::Dynamic {
                        candidates,
                        args,
                        exhaustive,
                        is_missable,
                    }),
                    ty,
                ))
            }
        }
    }

    fn resolve_call(
        &mut self,
        name: String,
        args: Vec<Rex>,
        is_operator: bool,
        location: SourceLocation,
    ) -> Rex {
        let arg_types: Vec<_> = args.iter().map(|a| a.ty.clone()).collect();

        let rex = match FnResolver::new(self.catalog).resolve(&name, is_operator, &arg_types) {
            Ok(FnMatch::Static {
                candidate,
                is_missable,
            }) => {
                let args = coerce_args(args, candidate.coercions);
                let ty = self.checked_return_type(&candidate.signature, &args, is_missable, location);
                Rex::with_type(
                    RexOp::Call(Call::Static {
                        signature: candidate.signature,
                        args,
                        is_missable,
                    }),
                    ty,
                )
            }
            Ok(FnMatch::Dynamic {
                candidates,
                exhaustive,
                is_missable,
            }) => {
                let ty = StaticType::union(
                    candidates
                        .iter()
                        .map(|c| return_type(&c.signature, &args, is_missable)),
                );
                Rex::with_type(
                    RexOp::Call(Call::Dynamic {
                        candidates,
                        args,
                        exhaustive,
                        is_missable,
                    }),
                    ty,
                )
            }
            Err(err) => {
                self.problems.error(
                    location,
                    ProblemDetails::UnknownFunction {
                        identifier: err.name.clone(),
                        args: err.args.iter().map(|a| a.to_string()).collect(),
                        candidates: err.candidates.clone(),
                    },
                );
                return Rex::err(err.to_string());
            }
        };

        ConstFold::fold_node(rex)
    }

    /// Return type of a resolved call, warning if a MISSING argument makes
    /// the call always MISSING.
    fn checked_return_type(
        &mut self,
        signature: &FunctionSignature,
        args: &[Rex],
        is_missable: bool,
        location: SourceLocation,
    ) -> StaticType {
        let missing_arg = args.iter().find(|a| a.ty == StaticType::Missing);
        match missing_arg {
            Some(arg) if signature.is_missing_call => {
                // Errors in the argument have already been reported.
                if !arg.contains_err() {
                    self.problems.warning(
                        location,
                        ProblemDetails::ExpressionAlwaysReturnsMissing {
                            reason: format!("argument '{arg}' to '{}' is always MISSING", signature.name),
                        },
                    );
                }
                StaticType::Missing
            }
            _ => return_type(signature, args, is_missable),
        }
    }

    fn type_agg(&mut self, call: AggCall, env: &TypeEnv<'_>) -> Result<(AggCall, StaticType)> {
        Ok(match call {
            AggCall::Unresolved {
                name,
                args,
                quantifier,
                location,
            } => {
                let args = self.type_rexes(args, env)?;
                let arg_types: Vec<_> = args.iter().map(|a| a.ty.clone()).collect();

                match FnResolver::new(self.catalog).resolve_agg(&name, &arg_types) {
                    Ok(FnMatch::Static { candidate, .. }) => {
                        let ty = agg_return_type(&candidate.signature);
                        let args = coerce_args(args, candidate.coercions);
                        (
                            AggCall::Static {
                                signature: candidate.signature,
                                args,
                                quantifier,
                            },
                            ty,
                        )
                    }
                    Ok(FnMatch::Dynamic { candidates, .. }) => {
                        let ty = StaticType::union(candidates.iter().map(|c| agg_return_type(&c.signature)));
                        (
                            AggCall::Dynamic {
                                candidates,
                                args,
                                quantifier,
                            },
                            ty,
                        )
                    }
                    Err(err) => {
                        self.problems.error(
                            location,
                            ProblemDetails::UnknownFunction {
                                identifier: err.name.clone(),
                                args: err.args.iter().map(|a| a.to_string()).collect(),
                                candidates: err.candidates.clone(),
                            },
                        );
                        (
                            AggCall::Unresolved {
                                name,
                                args,
                                quantifier,
                                location,
                            },
                            StaticType::Missing,
                        )
                    }
                }
            }
            AggCall::Static {
                signature,
                args,
                quantifier,
            } => {
                let args = self.type_rexes(args, env)?;
                let ty = agg_return_type(&signature);
                (
                    AggCall::Static {
                        signature,
                        args,
                        quantifier,
                    },
                    ty,
                )
            }
            AggCall::Dynamic {
                candidates,
                args,
                quantifier,
            } => {
                let args = self.type_rexes(args, env)?;
                let ty = StaticType::union(candidates.iter().map(|c| agg_return_type(&c.signature)));
                (
                    AggCall::Dynamic {
                        candidates,
                        args,
                        quantifier,
                    },
                    ty,
                )
            }
        })
    }

    fn unimplemented(&mut self, feature: &str) -> Rex {
        self.problems.error(
            SourceLocation::UNKNOWN,
            ProblemDetails::UnimplementedFeature {
                feature: feature.to_string(),
            },
        );
        Rex::err(format!("{feature} is not implemented"))
    }
}

fn binding_name(schema: &[Binding], idx: usize) -> Result<String> {
    schema
        .get(idx)
        .map(|b| b.name.clone())
        .required("binding name for relation output")
}

/// Pair names from an untyped schema with computed types.
fn named_schema(schema: &[Binding], types: Vec<StaticType>) -> Result<Vec<Binding>> {
    if schema.len() != types.len() {
        return Err(PartiqlError::new("Schema width doesn't match number of outputs")
            .with_field("names", schema.len())
            .with_field("outputs", types.len()));
    }
    Ok(schema
        .iter()
        .zip(types)
        .map(|(b, ty)| Binding::new(b.name.clone(), ty))
        .collect())
}

fn join_schema(kind: JoinKind, lhs: &[Binding], rhs: &[Binding]) -> Vec<Binding> {
    let (lhs_nullable, rhs_nullable) = match kind {
        JoinKind::Inner => (false, false),
        JoinKind::Left => (false, true),
        JoinKind::Right => (true, false),
        JoinKind::Full => (true, true),
    };

    let side = |bindings: &[Binding], nullable: bool| -> Vec<Binding> {
        bindings
            .iter()
            .map(|b| {
                if nullable {
                    Binding::new(b.name.clone(), StaticType::union([b.ty.clone(), StaticType::Null]))
                } else {
                    b.clone()
                }
            })
            .collect()
    };

    let mut schema = side(lhs, lhs_nullable);
    schema.extend(side(rhs, rhs_nullable));
    schema
}

fn path_symbol(root: Rex, symbol: Symbol) -> Rex {
    let ty = field_type(&root.ty, &symbol.text, symbol.is_case_sensitive());
    ConstFold::fold_node(Rex::with_type(
        RexOp::PathSymbol {
            root: Box::new(root),
            symbol,
        },
        ty,
    ))
}

/// Type of looking up `name` in a value of type `ty`.
fn field_type(ty: &StaticType, name: &str, case_sensitive: bool) -> StaticType {
    match ty {
        StaticType::Any => StaticType::Any,
        StaticType::Struct(s) if !s.closed => StaticType::Any,
        StaticType::Struct(s) => {
            let matches = s.lookup(name, case_sensitive);
            if matches.is_empty() {
                StaticType::Missing
            } else {
                StaticType::union(matches.into_iter().map(|f| f.ty.clone()))
            }
        }
        StaticType::AnyOf(members) => {
            StaticType::union(members.iter().map(|m| field_type(m, name, case_sensitive)))
        }
        _ => StaticType::Missing,
    }
}

/// Type of indexing into a value of type `ty`. Out of range indexes produce
/// MISSING.
fn index_type(ty: &StaticType) -> StaticType {
    match ty {
        StaticType::Any => StaticType::Any,
        StaticType::List(e) | StaticType::Sexp(e) => {
            StaticType::union([e.as_ref().clone(), StaticType::Missing])
        }
        StaticType::AnyOf(members) => StaticType::union(members.iter().map(index_type)),
        _ => StaticType::Missing,
    }
}

fn struct_type(fields: &[RexStructField]) -> StaticType {
    let mut shape = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(name) = field.key.try_as_lit().and_then(|k| k.try_as_str()) else {
            return StaticType::open_struct();
        };
        // Fields with a MISSING value are left out at run time.
        if field.value.ty == StaticType::Missing {
            continue;
        }
        shape.push(StructField::new(name, field.value.ty.clone()));
    }
    StaticType::closed_struct(shape)
}

fn tuple_union_type(args: &[Rex]) -> StaticType {
    let mut fields = Vec::new();
    for arg in args {
        match arg.ty.as_closed_struct() {
            Some(s) => fields.extend(s.fields.iter().cloned()),
            None => return StaticType::open_struct(),
        }
    }
    StaticType::closed_struct(fields)
}

fn subquery_type(select: &StaticType, coercion: SubqueryCoercion) -> StaticType {
    let element = select.element_type();
    match coercion {
        SubqueryCoercion::Scalar => {
            let value = match element.as_struct() {
                Some(s) if s.closed && s.fields.len() == 1 => s.fields[0].ty.clone(),
                Some(_) => StaticType::Any,
                None => element,
            };
            // An empty result coerces to NULL.
            StaticType::union([value, StaticType::Null])
        }
        SubqueryCoercion::Row => match element.as_closed_struct() {
            Some(s) if !s.fields.is_empty() => {
                StaticType::list(StaticType::union(s.fields.iter().map(|f| f.ty.clone())))
            }
            _ => StaticType::list(StaticType::Any),
        },
    }
}

/// Wrap arguments in the casts selected during resolution.
fn coerce_args(args: Vec<Rex>, coercions: Vec<Option<FunctionSignature>>) -> Vec<Rex> {
    args.into_iter()
        .zip(coercions)
        .map(|(arg, cast)| match cast {
            None => arg,
            Some(cast) => {
                let is_missable = arg.ty.admits_missing();
                let ty = return_type(&cast, std::slice::from_ref(&arg), is_missable);
                Rex::with_type(
                    RexOp::Call(Call::Static {
                        signature: cast,
                        args: vec![arg],
                        is_missable,
                    }),
                    ty,
                )
            }
        })
        .collect()
}

fn return_type(signature: &FunctionSignature, args: &[Rex], is_missable: bool) -> StaticType {
    let mut members = vec![StaticType::from_type_id(signature.returns)];
    if signature.is_nullable || (signature.is_null_call && args.iter().any(|a| a.ty.admits_null())) {
        members.push(StaticType::Null);
    }
    if is_missable {
        members.push(StaticType::Missing);
    }
    StaticType::union(members)
}

fn agg_return_type(signature: &AggSignature) -> StaticType {
    let ty = StaticType::from_type_id(signature.returns);
    if signature.is_nullable {
        StaticType::union([ty, StaticType::Null])
    } else {
        ty
    }
}
