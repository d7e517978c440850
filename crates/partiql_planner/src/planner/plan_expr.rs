use partiql_ast::{
    BinaryOperator, CollectionKind, Expr, ExprKind, Literal, PathStep, TypeName, UnaryOperator,
};
use partiql_error::Result;

use super::PlanContext;
use super::normalize::TUPLE_UNION;
use crate::diagnostics::ProblemDetails;
use crate::functions::catalog::CAST_PREFIX;
use crate::plan::{Call, Rex, RexCaseBranch, RexOp, RexStructField, SubqueryCoercion, VarRef};
use crate::planner::QueryPlanner;
use crate::types::DataTypeId;
use crate::value::ScalarValue;

/// Lowers AST expressions to unresolved, untyped plan expressions.
#[derive(Debug)]
pub struct ExprPlanner;

impl ExprPlanner {
    pub fn plan(&self, ctx: &mut PlanContext<'_>, expr: Expr) -> Result<Rex> {
        let location = expr.location;

        Ok(match expr.kind {
            ExprKind::Literal(lit) => {
                Rex::lit(ScalarValue::from_literal(&lit, ctx.config.default_timezone))
            }
            ExprKind::Var { identifier, scope } => Rex::new(RexOp::Var(VarRef::Unresolved {
                identifier,
                scope,
                location,
            })),
            ExprKind::Path { root, steps } => {
                let mut rex = self.plan(ctx, *root)?;
                for step in steps {
                    rex = self.plan_path_step(ctx, rex, step)?;
                }
                rex
            }
            ExprKind::Call { name, args } => {
                let args = self.plan_all(ctx, args)?;
                if name == TUPLE_UNION {
                    Rex::new(RexOp::TupleUnion { args })
                } else {
                    call_at(name.to_ascii_lowercase(), args, false, location)
                }
            }
            ExprKind::Agg { name, .. } => {
                ctx.problems.error(
                    location,
                    ProblemDetails::CompileError {
                        message: format!("Aggregate function '{name}' is not allowed here"),
                    },
                );
                Rex::err(format!("misplaced aggregate {name}"))
            }
            ExprKind::Unary { op, expr } => {
                let name = match op {
                    UnaryOperator::Pos => "pos",
                    UnaryOperator::Neg => "neg",
                    UnaryOperator::Not => "not",
                };
                let arg = self.plan_operand(ctx, *expr, false)?;
                call_at(name, vec![arg], true, location)
            }
            ExprKind::Binary { op, left, right } => {
                let name = match op {
                    BinaryOperator::Plus => "plus",
                    BinaryOperator::Minus => "minus",
                    BinaryOperator::Times => "times",
                    BinaryOperator::Divide => "divide",
                    BinaryOperator::Modulo => "modulo",
                    BinaryOperator::Concat => "concat",
                    BinaryOperator::Eq => "eq",
                    BinaryOperator::NotEq => "ne",
                    BinaryOperator::Lt => "lt",
                    BinaryOperator::LtEq => "lte",
                    BinaryOperator::Gt => "gt",
                    BinaryOperator::GtEq => "gte",
                    BinaryOperator::And => "and",
                    BinaryOperator::Or => "or",
                };
                // Comparing against a list constructor coerces a subquery to
                // a row rather than a single value.
                let left_is_list = is_list(&left);
                let right_is_list = is_list(&right);
                let left = self.plan_operand(ctx, *left, right_is_list)?;
                let right = self.plan_operand(ctx, *right, left_is_list)?;
                call_at(name, vec![left, right], true, location)
            }
            ExprKind::Case {
                operand,
                branches,
                default,
            } => {
                let operand = match operand {
                    Some(operand) => Some(self.plan(ctx, *operand)?),
                    None => None,
                };

                let mut planned = Vec::with_capacity(branches.len());
                for branch in branches {
                    let mut condition = self.plan(ctx, branch.condition)?;
                    if let Some(operand) = &operand {
                        condition = call_at("eq", vec![operand.clone(), condition], true, location);
                    }
                    planned.push(RexCaseBranch {
                        condition,
                        result: self.plan(ctx, branch.result)?,
                    });
                }

                let default = match default {
                    Some(default) => self.plan(ctx, *default)?,
                    None => Rex::lit(ScalarValue::Null),
                };

                Rex::new(RexOp::Case {
                    branches: planned,
                    default: Box::new(default),
                })
            }
            ExprKind::Struct(fields) => {
                let mut planned = Vec::with_capacity(fields.len());
                for field in fields {
                    planned.push(RexStructField {
                        key: self.plan(ctx, field.key)?,
                        value: self.plan(ctx, field.value)?,
                    });
                }
                Rex::new(RexOp::Struct { fields: planned })
            }
            ExprKind::Collection { kind, values } => Rex::new(RexOp::Collection {
                kind,
                values: self.plan_all(ctx, values)?,
            }),
            ExprKind::Subquery(query) => QueryPlanner.plan(ctx, *query)?,
            ExprKind::IsType { expr, ty, not } => {
                let arg = self.plan(ctx, *expr)?;
                let check = match type_id(ty) {
                    Some(id) => call_at(format!("is_{}", id.name()), vec![arg], true, location),
                    // Everything is of type ANY.
                    None => Rex::lit(true),
                };
                negate_if(check, not, location)
            }
            ExprKind::Cast { expr, ty } => {
                let arg = self.plan(ctx, *expr)?;
                match type_id(ty) {
                    Some(id) => call_at(format!("{CAST_PREFIX}{}", id.name()), vec![arg], false, location),
                    None => arg,
                }
            }
            ExprKind::Like {
                value,
                pattern,
                escape,
                not,
            } => {
                let mut args = vec![self.plan(ctx, *value)?, self.plan(ctx, *pattern)?];
                if let Some(escape) = escape {
                    args.push(self.plan(ctx, *escape)?);
                }
                negate_if(call_at("like", args, true, location), not, location)
            }
            ExprKind::Between {
                value,
                lower,
                upper,
                not,
            } => {
                let args = vec![
                    self.plan(ctx, *value)?,
                    self.plan(ctx, *lower)?,
                    self.plan(ctx, *upper)?,
                ];
                negate_if(call_at("between", args, true, location), not, location)
            }
            ExprKind::InCollection {
                value,
                collection,
                not,
            } => {
                let args = vec![self.plan(ctx, *value)?, self.plan(ctx, *collection)?];
                negate_if(call_at("in_collection", args, true, location), not, location)
            }
            ExprKind::NullIf { value, nullifier } => {
                // CASE WHEN value = nullifier THEN NULL ELSE value END
                let value = self.plan(ctx, *value)?;
                let nullifier = self.plan(ctx, *nullifier)?;
                Rex::new(RexOp::Case {
                    branches: vec![RexCaseBranch {
                        condition: call_at("eq", vec![value.clone(), nullifier], true, location),
                        result: Rex::lit(ScalarValue::Null),
                    }],
                    default: Box::new(value),
                })
            }
            ExprKind::Coalesce(args) => {
                // CASE WHEN a IS NOT NULL THEN a WHEN b IS NOT NULL THEN b ... ELSE NULL END
                let args = self.plan_all(ctx, args)?;
                let branches = args
                    .into_iter()
                    .map(|arg| RexCaseBranch {
                        condition: negate_if(
                            call_at("is_null", vec![arg.clone()], true, location),
                            true,
                            location,
                        ),
                        result: arg,
                    })
                    .collect();
                Rex::new(RexOp::Case {
                    branches,
                    default: Box::new(Rex::lit(ScalarValue::Null)),
                })
            }
        })
    }

    pub fn plan_all(&self, ctx: &mut PlanContext<'_>, exprs: Vec<Expr>) -> Result<Vec<Rex>> {
        exprs.into_iter().map(|expr| self.plan(ctx, expr)).collect()
    }

    /// Plan an operator operand, coercing subqueries to a single value (or a
    /// single row).
    fn plan_operand(&self, ctx: &mut PlanContext<'_>, expr: Expr, as_row: bool) -> Result<Rex> {
        let is_subquery = matches!(expr.kind, ExprKind::Subquery(_));
        let rex = self.plan(ctx, expr)?;
        if !is_subquery {
            return Ok(rex);
        }

        let coercion = if as_row {
            SubqueryCoercion::Row
        } else {
            SubqueryCoercion::Scalar
        };
        Ok(Rex::new(RexOp::Subquery {
            select: Box::new(rex),
            coercion,
        }))
    }

    fn plan_path_step(&self, ctx: &mut PlanContext<'_>, root: Rex, step: PathStep) -> Result<Rex> {
        let root = Box::new(root);
        Ok(match step {
            PathStep::Symbol(symbol) => Rex::new(RexOp::PathSymbol { root, symbol }),
            PathStep::Key(key) => match key.kind {
                ExprKind::Literal(Literal::Integer(idx)) => Rex::new(RexOp::PathIndex {
                    root,
                    index: Box::new(Rex::lit(idx)),
                }),
                _ => Rex::new(RexOp::PathKey {
                    root,
                    key: Box::new(self.plan(ctx, key)?),
                }),
            },
            PathStep::Wildcard => Rex::new(RexOp::PathWildcard { root }),
            PathStep::Unpivot => Rex::new(RexOp::PathUnpivot { root }),
        })
    }
}

fn call_at(
    name: impl Into<String>,
    args: Vec<Rex>,
    is_operator: bool,
    location: partiql_ast::SourceLocation,
) -> Rex {
    Rex::new(RexOp::Call(Call::Unresolved {
        name: name.into(),
        args,
        is_operator,
        location,
    }))
}

fn negate_if(rex: Rex, not: bool, location: partiql_ast::SourceLocation) -> Rex {
    if not {
        call_at("not", vec![rex], true, location)
    } else {
        rex
    }
}

fn is_list(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Collection {
            kind: CollectionKind::List,
            ..
        }
    )
}

/// Runtime type named by a type name, None for ANY.
pub fn type_id(ty: TypeName) -> Option<DataTypeId> {
    Some(match ty {
        TypeName::Any => return None,
        TypeName::Null => DataTypeId::Null,
        TypeName::Missing => DataTypeId::Missing,
        TypeName::Bool => DataTypeId::Bool,
        TypeName::Int8 => DataTypeId::Int8,
        TypeName::SmallInt | TypeName::Int16 => DataTypeId::Int16,
        TypeName::Int32 => DataTypeId::Int32,
        TypeName::Int64 => DataTypeId::Int64,
        TypeName::Int => DataTypeId::Int,
        TypeName::Decimal => DataTypeId::Decimal,
        TypeName::Float32 => DataTypeId::Float32,
        TypeName::Float64 => DataTypeId::Float64,
        TypeName::Char => DataTypeId::Char,
        TypeName::String => DataTypeId::String,
        TypeName::Symbol => DataTypeId::Symbol,
        TypeName::Binary => DataTypeId::Binary,
        TypeName::Byte => DataTypeId::Byte,
        TypeName::Blob => DataTypeId::Blob,
        TypeName::Clob => DataTypeId::Clob,
        TypeName::Date => DataTypeId::Date,
        TypeName::Time => DataTypeId::Time,
        TypeName::Timestamp => DataTypeId::Timestamp,
        TypeName::Interval => DataTypeId::Interval,
        TypeName::List => DataTypeId::List,
        TypeName::Bag => DataTypeId::Bag,
        TypeName::Sexp => DataTypeId::Sexp,
        TypeName::Struct => DataTypeId::Struct,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveTime};
    use partiql_ast::builder::*;
    use partiql_ast::{Query, SourceLocation};

    use super::*;
    use crate::config::PlannerConfig;
    use crate::diagnostics::ProblemCollector;

    fn plan_with(config: &PlannerConfig, expr: Expr) -> (Rex, ProblemCollector) {
        let mut problems = ProblemCollector::new();
        let rex = {
            let mut ctx = PlanContext::new(config, &mut problems);
            ExprPlanner.plan(&mut ctx, expr).unwrap()
        };
        (rex, problems)
    }

    fn plan(expr: Expr) -> Rex {
        let (rex, problems) = plan_with(&PlannerConfig::default(), expr);
        assert!(!problems.has_errors(), "{:?}", problems.problems());
        rex
    }

    #[test]
    fn operators_become_calls() {
        let rex = plan(binary(BinaryOperator::NotEq, var("a"), lit_int(1)));
        assert_eq!("ne(a, 1)", rex.to_string());
        assert!(matches!(
            rex.as_call(),
            Some(Call::Unresolved {
                is_operator: true,
                ..
            })
        ));
    }

    #[test]
    fn function_names_lowercased() {
        let rex = plan(call("UPPER", vec![lit_str("a")]));
        let Some(Call::Unresolved {
            name, is_operator, ..
        }) = rex.as_call()
        else {
            panic!("expected call");
        };
        assert_eq!("upper", name);
        assert!(!is_operator);
    }

    #[test]
    fn cast_and_type_checks() {
        assert_eq!("cast_int16(x)", plan(cast(var("x"), TypeName::SmallInt)).to_string());
        assert_eq!("x", plan(cast(var("x"), TypeName::Any)).to_string());
        assert_eq!("is_string(x)", plan(is_type(var("x"), TypeName::String)).to_string());

        let not_null = Expr::new(ExprKind::IsType {
            expr: Box::new(var("x")),
            ty: TypeName::Null,
            not: true,
        });
        assert_eq!("not(is_null(x))", plan(not_null).to_string());
    }

    #[test]
    fn path_steps() {
        let expr = path(
            var("t"),
            vec![
                PathStep::Symbol(partiql_ast::Symbol::regular("a")),
                PathStep::Key(lit_int(0)),
                PathStep::Key(lit_str("b")),
            ],
        );
        let rex = plan(expr);
        assert_eq!("t.a[0]['b']", rex.to_string());
        assert!(matches!(rex.op, RexOp::PathKey { .. }));
    }

    #[test]
    fn nullif_and_coalesce() {
        let nullif = Expr::new(ExprKind::NullIf {
            value: Box::new(var("a")),
            nullifier: Box::new(lit_int(0)),
        });
        assert_eq!("CASE WHEN eq(a, 0) THEN NULL ELSE a END", plan(nullif).to_string());

        let coalesce = Expr::new(ExprKind::Coalesce(vec![var("a"), var("b")]));
        assert_eq!(
            "CASE WHEN not(is_null(a)) THEN a WHEN not(is_null(b)) THEN b ELSE NULL END",
            plan(coalesce).to_string()
        );
    }

    #[test]
    fn subquery_operands_coerced() {
        let query = || Query::select(select_value(var("x"), Some(scan(var("t"), Some("x")))));

        let rex = plan(eq(var("a"), subquery(query())));
        let args = rex.as_call().unwrap().args();
        assert!(matches!(
            args[1].op,
            RexOp::Subquery {
                coercion: SubqueryCoercion::Scalar,
                ..
            }
        ));

        let rex = plan(eq(list(vec![var("a"), var("b")]), subquery(query())));
        let args = rex.as_call().unwrap().args();
        assert!(matches!(
            args[1].op,
            RexOp::Subquery {
                coercion: SubqueryCoercion::Row,
                ..
            }
        ));

        // Not an operand, stays a collection.
        let rex = plan(call("size", vec![subquery(query())]));
        assert!(matches!(rex.as_call().unwrap().args()[0].op, RexOp::Select { .. }));
    }

    #[test]
    fn time_literal_gets_default_offset() {
        let mut config = PlannerConfig::default();
        config.set_from_str("default_timezone", "+02:00").unwrap();

        let time = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        let (rex, _) = plan_with(&config, lit(Literal::Time { time, offset: None }));
        assert_eq!(
            Some(&ScalarValue::Time {
                time,
                offset: FixedOffset::east_opt(2 * 3600).unwrap(),
            }),
            rex.try_as_lit()
        );
    }

    #[test]
    fn misplaced_aggregate() {
        let (rex, problems) = plan_with(
            &PlannerConfig::default(),
            agg("sum", vec![var("x")]).at(SourceLocation::new(2, 3, 6)),
        );
        assert!(matches!(rex.op, RexOp::Err { .. }));
        assert_eq!(1, problems.error_count());
        assert_eq!(SourceLocation::new(2, 3, 6), problems.problems()[0].location);
    }
}
