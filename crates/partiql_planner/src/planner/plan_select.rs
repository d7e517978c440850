use partiql_ast::{
    Expr, ExprKind, GroupBy, Identifier, NullsOrder, OrderDirection, Projection, Select,
    SetQuantifier, SourceLocation, VarScope,
};
use partiql_error::{OptionExt, PartiqlError, Result};

use super::PlanContext;
use super::plan_expr::ExprPlanner;
use super::plan_from::FromPlanner;
use crate::diagnostics::ProblemDetails;
use crate::plan::{AggCall, Binding, Rel, RelOp, Rex, RexOp, SortOrder, SortSpec};

/// Binding for constructed values when DISTINCT needs them materialized.
const VALUE_BINDING: &str = "$value";

/// Name of the binding holding the result of the `idx`th aggregate call.
fn agg_binding(idx: usize) -> String {
    format!("$agg_{idx}")
}

/// Case-sensitive local reference to a binding created during planning.
fn binding_ref(name: &str, expr: &Expr) -> Expr {
    Expr::new(ExprKind::Var {
        identifier: Identifier::delimited(name),
        scope: VarScope::Local,
    })
    .at(expr.location)
}

/// Replace expressions top down. `func` returns true if it replaced the
/// expression, in which case its children aren't visited.
fn replace_top_down<F>(expr: &mut Expr, func: &mut F)
where
    F: FnMut(&mut Expr) -> bool,
{
    if !func(expr) {
        expr.for_each_child_mut(&mut |child| replace_top_down(child, func));
    }
}

/// The constructor of a select, evaluated once per row of the relation.
enum Constructor {
    Value(Expr),
    Pivot { key: Expr, value: Expr },
    /// Already reported.
    Err,
}

impl Constructor {
    fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Self::Value(expr) => vec![expr],
            Self::Pivot { key, value } => vec![key, value],
            Self::Err => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct SelectPlanner;

impl SelectPlanner {
    pub fn plan(&self, ctx: &mut PlanContext<'_>, mut select: Select) -> Result<Rex> {
        let mut constructor = match std::mem::replace(&mut select.projection, Projection::Star) {
            Projection::Value(expr) => Constructor::Value(expr),
            Projection::Pivot { key, value } => Constructor::Pivot { key, value },
            Projection::Star if select.group_by.is_some() => {
                ctx.problems.error(
                    SourceLocation::UNKNOWN,
                    ProblemDetails::DisallowedFeature {
                        feature: "SELECT * with GROUP BY".to_string(),
                    },
                );
                Constructor::Err
            }
            Projection::Star | Projection::List(_) => {
                return Err(PartiqlError::new("Select list was not normalized"));
            }
        };

        // Handle FROM
        let mut plan = match select.from.take() {
            Some(from) => FromPlanner.plan(ctx, from)?,
            None => FromPlanner.plan_empty(),
        };

        // Handle LET
        if let Some(binding) = select.let_bindings.first() {
            ctx.problems.error(
                binding.expr.location,
                ProblemDetails::UnimplementedFeature {
                    feature: "LET".to_string(),
                },
            );
        }

        // Handle WHERE
        if let Some(filter) = select.where_clause.take() {
            let predicate = ExprPlanner.plan(ctx, filter)?;
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Filter {
                    input: Box::new(plan),
                    predicate,
                },
                schema,
            );
        }

        // Handle GROUP BY/aggregates
        let mut aggregates = Vec::new();
        {
            let mut extract = |expr: &mut Expr| {
                if !matches!(expr.kind, ExprKind::Agg { .. }) {
                    return false;
                }
                let replacement = binding_ref(&agg_binding(aggregates.len()), expr);
                aggregates.push(std::mem::replace(expr, replacement));
                true
            };
            for expr in constructor.exprs_mut() {
                replace_top_down(expr, &mut extract);
            }
            if let Some(having) = select.having.as_mut() {
                replace_top_down(having, &mut extract);
            }
            for spec in &mut select.order_by {
                replace_top_down(&mut spec.expr, &mut extract);
            }
        }

        if !aggregates.is_empty() || select.group_by.is_some() {
            let group_by = select.group_by.take();
            plan = self.plan_aggregate(
                ctx,
                plan,
                aggregates,
                group_by,
                &mut constructor,
                &mut select,
            )?;
        }

        // Handle HAVING
        if let Some(having) = select.having.take() {
            let predicate = ExprPlanner.plan(ctx, having)?;
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Filter {
                    input: Box::new(plan),
                    predicate,
                },
                schema,
            );
        }

        // Handle ORDER BY
        if !select.order_by.is_empty() {
            let mut specs = Vec::with_capacity(select.order_by.len());
            for spec in std::mem::take(&mut select.order_by) {
                let order = match (
                    spec.direction.unwrap_or(OrderDirection::Asc),
                    spec.nulls,
                ) {
                    (OrderDirection::Asc, Some(NullsOrder::First)) => SortOrder::AscNullsFirst,
                    (OrderDirection::Asc, _) => SortOrder::AscNullsLast,
                    (OrderDirection::Desc, Some(NullsOrder::Last)) => SortOrder::DescNullsLast,
                    (OrderDirection::Desc, _) => SortOrder::DescNullsFirst,
                };
                specs.push(SortSpec {
                    rex: ExprPlanner.plan(ctx, spec.expr)?,
                    order,
                });
            }
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Sort {
                    input: Box::new(plan),
                    specs,
                },
                schema,
            );
        }

        // Handle EXCLUDE
        if !select.exclude.is_empty() {
            let paths = ExprPlanner.plan_all(ctx, std::mem::take(&mut select.exclude))?;
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Exclude {
                    input: Box::new(plan),
                    paths,
                },
                schema,
            );
        }

        // Handle projection.
        let root = match constructor {
            Constructor::Pivot { key, value } => {
                let key = ExprPlanner.plan(ctx, key)?;
                let value = ExprPlanner.plan(ctx, value)?;
                let plan = self.plan_limit(ctx, plan, &mut select)?;
                return Ok(Rex::new(RexOp::Pivot {
                    key: Box::new(key),
                    value: Box::new(value),
                    rel: Box::new(plan),
                }));
            }
            Constructor::Value(expr) => ExprPlanner.plan(ctx, expr)?,
            Constructor::Err => Rex::err("invalid select list"),
        };

        // Handle DISTINCT. Constructed values are materialized so that
        // duplicates can be removed before LIMIT.
        let constructor = if select.quantifier == SetQuantifier::Distinct {
            plan = Rel::new(
                RelOp::Project {
                    input: Box::new(plan),
                    projections: vec![root],
                },
                vec![Binding::untyped(VALUE_BINDING)],
            );
            let schema = plan.schema.clone();
            plan = Rel::new(RelOp::Distinct { input: Box::new(plan) }, schema);
            Rex::local(0, 0)
        } else {
            root
        };

        let plan = self.plan_limit(ctx, plan, &mut select)?;

        Ok(Rex::new(RexOp::Select {
            constructor: Box::new(constructor),
            rel: Box::new(plan),
        }))
    }

    fn plan_aggregate(
        &self,
        ctx: &mut PlanContext<'_>,
        input: Rel,
        aggregates: Vec<Expr>,
        group_by: Option<GroupBy>,
        constructor: &mut Constructor,
        select: &mut Select,
    ) -> Result<Rel> {
        let mut schema: Vec<_> = (0..aggregates.len())
            .map(|idx| Binding::untyped(agg_binding(idx)))
            .collect();

        let mut calls = Vec::with_capacity(aggregates.len());
        for agg in aggregates {
            let location = agg.location;
            let ExprKind::Agg {
                name,
                args,
                quantifier,
            } = agg.kind
            else {
                return Err(PartiqlError::new("Expected aggregate expression"));
            };

            let mut name = name.to_ascii_lowercase();
            if name == "count" && args.is_empty() {
                name = "count_star".to_string();
            }

            calls.push(AggCall::Unresolved {
                name,
                args: ExprPlanner.plan_all(ctx, args)?,
                quantifier,
                location,
            });
        }

        let (strategy, keys) = match group_by {
            Some(group_by) => {
                if let Some(group_as) = &group_by.group_as {
                    ctx.problems.error(
                        SourceLocation::UNKNOWN,
                        ProblemDetails::UnimplementedFeature {
                            feature: format!("GROUP AS {group_as}"),
                        },
                    );
                }
                (group_by.strategy, group_by.keys)
            }
            None => (Default::default(), Vec::new()),
        };

        // References to group keys after aggregation refer to the key's
        // binding.
        let mut aliases = Vec::with_capacity(keys.len());
        let mut groups = Vec::with_capacity(keys.len());
        for key in keys {
            let alias = key.alias.required("GROUP BY key alias")?;
            aliases.push((key.expr.clone(), alias.clone()));
            schema.push(Binding::untyped(alias));
            groups.push(ExprPlanner.plan(ctx, key.expr)?);
        }

        if !aliases.is_empty() {
            let mut replace_keys = |expr: &mut Expr| {
                match aliases.iter().find(|(key, _)| *key == *expr) {
                    Some((_, alias)) => {
                        *expr = binding_ref(alias, expr);
                        true
                    }
                    None => false,
                }
            };
            for expr in constructor.exprs_mut() {
                replace_top_down(expr, &mut replace_keys);
            }
            if let Some(having) = select.having.as_mut() {
                replace_top_down(having, &mut replace_keys);
            }
            for spec in &mut select.order_by {
                replace_top_down(&mut spec.expr, &mut replace_keys);
            }
        }

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

    /// Wrap in OFFSET and LIMIT, offset applied first.
    fn plan_limit(&self, ctx: &mut PlanContext<'_>, mut plan: Rel, select: &mut Select) -> Result<Rel> {
        if let Some(offset) = select.offset.take() {
            let offset = ExprPlanner.plan(ctx, offset)?;
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Offset {
                    input: Box::new(plan),
                    offset,
                },
                schema,
            );
        }

        if let Some(limit) = select.limit.take() {
            let limit = ExprPlanner.plan(ctx, limit)?;
            let schema = plan.schema.clone();
            plan = Rel::new(
                RelOp::Limit {
                    input: Box::new(plan),
                    limit,
                },
                schema,
            );
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use partiql_ast::builder::*;
    use partiql_ast::{GroupKey, GroupingStrategy, SortSpec as AstSortSpec};

    use super::*;
    use crate::config::PlannerConfig;
    use crate::diagnostics::ProblemCollector;

    fn plan(select: Select) -> (Rex, ProblemCollector) {
        let config = PlannerConfig::default();
        let mut problems = ProblemCollector::new();
        let rex = {
            let mut ctx = PlanContext::new(&config, &mut problems);
            SelectPlanner.plan(&mut ctx, select).unwrap()
        };
        (rex, problems)
    }

    fn rel_of(rex: &Rex) -> &Rel {
        match &rex.op {
            RexOp::Select { rel, .. } | RexOp::Pivot { rel, .. } => rel,
            other => panic!("expected select: {other:?}"),
        }
    }

    /// Operator names from the top of the tree down, following the first
    /// input.
    fn op_chain(rel: &Rel) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut current = Some(rel);
        while let Some(rel) = current {
            let (name, next) = match &rel.op {
                RelOp::Scan { .. } => ("scan", None),
                RelOp::ScanIndexed { .. } => ("scan_indexed", None),
                RelOp::Unpivot { .. } => ("unpivot", None),
                RelOp::Filter { input, .. } => ("filter", Some(input.as_ref())),
                RelOp::Project { input, .. } => ("project", Some(input.as_ref())),
                RelOp::Join { lhs, .. } => ("join", Some(lhs.as_ref())),
                RelOp::Aggregate { input, .. } => ("aggregate", Some(input.as_ref())),
                RelOp::Sort { input, .. } => ("sort", Some(input.as_ref())),
                RelOp::Limit { input, .. } => ("limit", Some(input.as_ref())),
                RelOp::Offset { input, .. } => ("offset", Some(input.as_ref())),
                RelOp::Distinct { input } => ("distinct", Some(input.as_ref())),
                RelOp::SetOp { lhs, .. } => ("set_op", Some(lhs.as_ref())),
                RelOp::Exclude { input, .. } => ("exclude", Some(input.as_ref())),
                RelOp::Err { .. } => ("err", None),
            };
            out.push(name);
            current = next;
        }
        out
    }

    #[test]
    fn clause_order() {
        let mut select = select_value(var("x"), Some(scan(var("t"), Some("x"))));
        select.quantifier = SetQuantifier::Distinct;
        select.where_clause = Some(gt(dot(var("x"), "a"), lit_int(1)));
        select.order_by = vec![AstSortSpec {
            expr: dot(var("x"), "a"),
            direction: Some(OrderDirection::Desc),
            nulls: None,
        }];
        select.limit = Some(lit_int(10));
        select.offset = Some(lit_int(5));

        let (rex, problems) = plan(select);
        assert!(!problems.has_errors());

        let rel = rel_of(&rex);
        assert_eq!(
            vec!["limit", "offset", "distinct", "project", "sort", "filter", "scan"],
            op_chain(rel)
        );

        let RelOp::Limit { input, .. } = &rel.op else { unreachable!() };
        let RelOp::Offset { input, .. } = &input.op else { unreachable!() };
        let RelOp::Distinct { input } = &input.op else { unreachable!() };
        let RelOp::Project { input, .. } = &input.op else { unreachable!() };
        let RelOp::Sort { specs, .. } = &input.op else { unreachable!() };
        assert_eq!(SortOrder::DescNullsFirst, specs[0].order);
    }

    #[test]
    fn no_from_scans_single_row() {
        let (rex, _) = plan(select_value(lit_int(1), None));
        let rel = rel_of(&rex);
        let RelOp::Scan { rex: source } = &rel.op else {
            panic!("expected scan");
        };
        assert_eq!("<<{}>>", source.to_string());
    }

    #[test]
    fn aggregates_extracted() {
        // SELECT VALUE {'k': k, 'total': sum(t.v)} FROM t GROUP BY t.k AS k
        // HAVING count(*) > 1
        let mut select = select_value(
            struct_lit(vec![("k", dot(var("t"), "k")), ("total", agg("sum", vec![dot(var("t"), "v")]))]),
            Some(scan(var("t"), Some("t"))),
        );
        select.group_by = Some(GroupBy {
            strategy: GroupingStrategy::Full,
            keys: vec![GroupKey {
                expr: dot(var("t"), "k"),
                alias: Some("k".to_string()),
            }],
            group_as: None,
        });
        select.having = Some(gt(agg("count", Vec::new()), lit_int(1)));

        let (rex, problems) = plan(select);
        assert!(!problems.has_errors());

        let RexOp::Select { constructor, rel } = &rex.op else {
            panic!("expected select");
        };
        assert_eq!("{'k': \"k\", 'total': \"$agg_0\"}", constructor.to_string());

        let RelOp::Filter { input, predicate } = &rel.op else {
            panic!("expected having filter");
        };
        assert_eq!("gt(\"$agg_1\", 1)", predicate.to_string());

        let RelOp::Aggregate { calls, groups, .. } = &input.op else {
            panic!("expected aggregate");
        };
        assert_eq!(vec!["sum", "count_star"], calls.iter().map(|c| c.name()).collect::<Vec<_>>());
        assert_eq!(1, groups.len());
        assert_eq!(
            vec!["$agg_0", "$agg_1", "k"],
            input.schema.iter().map(|b| b.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn aggregate_without_group_by() {
        let select = select_value(agg("count", vec![var("x")]), Some(scan(var("t"), Some("x"))));
        let (rex, _) = plan(select);
        let RelOp::Aggregate { groups, .. } = &rel_of(&rex).op else {
            panic!("expected aggregate");
        };
        assert!(groups.is_empty());
    }

    #[test]
    fn star_with_group_by_disallowed() {
        let mut select = Select::new(Projection::Star);
        select.from = Some(scan(var("t"), Some("t")));
        select.group_by = Some(GroupBy {
            strategy: GroupingStrategy::Full,
            keys: vec![GroupKey {
                expr: var("a"),
                alias: Some("a".to_string()),
            }],
            group_as: None,
        });

        let (_, mut problems) = plan(select);
        let problems = problems.take();
        assert_eq!(1, problems.len());
        assert!(matches!(problems[0].details, ProblemDetails::DisallowedFeature { .. }));
    }

    #[test]
    fn let_unimplemented() {
        let mut select = select_value(var("y"), Some(scan(var("t"), Some("x"))));
        select.let_bindings = vec![partiql_ast::LetBinding {
            expr: dot(var("x"), "a"),
            alias: "y".to_string(),
        }];
        let (_, problems) = plan(select);
        assert_eq!(1, problems.error_count());
    }

    #[test]
    fn pivot() {
        let mut select = Select::new(Projection::Pivot {
            key: dot(var("x"), "k"),
            value: dot(var("x"), "v"),
        });
        select.from = Some(scan(var("t"), Some("x")));
        let (rex, _) = plan(select);
        assert!(matches!(rex.op, RexOp::Pivot { .. }));
    }
}
