//! Lowering of normalized ASTs to logical plans.
//!
//! Plans produced here are unresolved: variables refer to names, calls refer
//! to function names, and every node is typed `Any`. Resolution happens in
//! the typer.

pub mod normalize;
pub mod plan_expr;
pub mod plan_from;
pub mod plan_select;

use partiql_ast::{Ddl, DdlOperation, Dml, DmlOperation, ExprKind, Query, QueryBody, Statement};
use partiql_error::Result;
use plan_select::SelectPlanner;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::diagnostics::{ProblemCollector, ProblemDetails};
use crate::plan::{Binding, LogicalPlan, Rel, RelOp, Rex, RexOp};

/// Binding for each side of a set operation.
const SET_OP_BINDING: &str = "$value";

/// State shared while lowering a single statement.
#[derive(Debug)]
pub struct PlanContext<'a> {
    pub config: &'a PlannerConfig,
    pub problems: &'a mut ProblemCollector,
}

impl<'a> PlanContext<'a> {
    pub fn new(config: &'a PlannerConfig, problems: &'a mut ProblemCollector) -> Self {
        PlanContext { config, problems }
    }
}

#[derive(Debug)]
pub struct StatementPlanner;

impl StatementPlanner {
    pub fn plan(&self, ctx: &mut PlanContext<'_>, statement: Statement) -> Result<LogicalPlan> {
        let root = match statement {
            Statement::Query(query) => QueryPlanner.plan(ctx, query)?,
            Statement::Dml(dml) => {
                self.plan_dml(ctx, dml);
                Rex::err("DML")
            }
            Statement::Ddl(ddl) => {
                self.plan_ddl(ctx, ddl);
                Rex::err("DDL")
            }
        };

        Ok(LogicalPlan { root })
    }

    /// Report why a DML statement can't be planned.
    fn plan_dml(&self, ctx: &mut PlanContext<'_>, dml: Dml) {
        let operation = match &dml.operation {
            DmlOperation::Insert { .. } => "INSERT",
            DmlOperation::Delete => "DELETE",
            DmlOperation::Remove => "REMOVE",
            DmlOperation::Set { .. } => "SET",
        };

        if !matches!(dml.target.kind, ExprKind::Var { .. }) {
            ctx.problems.error(
                dml.target.location,
                ProblemDetails::InvalidDmlTarget {
                    target: target_description(&dml.target.kind).to_string(),
                },
            );
            return;
        }

        if dml.on_conflict.is_some() && !matches!(dml.operation, DmlOperation::Insert { .. }) {
            ctx.problems.error(
                dml.location,
                ProblemDetails::InvalidUseOfMutationClause {
                    clause: "ON CONFLICT".to_string(),
                    operation: operation.to_string(),
                },
            );
            return;
        }

        debug!(%operation, "rejecting DML statement");
        ctx.problems.error(
            dml.location,
            ProblemDetails::UnimplementedFeature {
                feature: operation.to_string(),
            },
        );
    }

    fn plan_ddl(&self, ctx: &mut PlanContext<'_>, ddl: Ddl) {
        let operation = match ddl.operation {
            DdlOperation::CreateTable { .. } => "CREATE TABLE",
            DdlOperation::DropTable { .. } => "DROP TABLE",
            DdlOperation::CreateIndex { .. } => "CREATE INDEX",
            DdlOperation::DropIndex { .. } => "DROP INDEX",
        };
        ctx.problems.error(
            ddl.location,
            ProblemDetails::DdlUnsupported {
                operation: operation.to_string(),
            },
        );
    }
}

fn target_description(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Literal(_) => "literal",
        ExprKind::Var { .. } => "variable",
        ExprKind::Path { .. } => "path",
        ExprKind::Call { .. } | ExprKind::Agg { .. } => "function call",
        ExprKind::Subquery(_) => "subquery",
        ExprKind::Struct(_) | ExprKind::Collection { .. } => "constructor",
        _ => "expression",
    }
}

#[derive(Debug)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn plan(&self, ctx: &mut PlanContext<'_>, query: Query) -> Result<Rex> {
        match query.body {
            QueryBody::Select(select) => SelectPlanner.plan(ctx, *select),
            QueryBody::SetOp {
                op,
                quantifier,
                lhs,
                rhs,
            } => {
                let lhs = Self::into_rel(self.plan(ctx, *lhs)?);
                let rhs = Self::into_rel(self.plan(ctx, *rhs)?);

                let rel = Rel::new(
                    RelOp::SetOp {
                        op,
                        quantifier,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    vec![Binding::untyped(SET_OP_BINDING)],
                );

                Ok(Rex::new(RexOp::Select {
                    constructor: Box::new(Rex::local(0, 0)),
                    rel: Box::new(rel),
                }))
            }
        }
    }

    /// Turn one side of a set operation into a relation producing a single
    /// binding.
    fn into_rel(rex: Rex) -> Rel {
        let schema = vec![Binding::untyped(SET_OP_BINDING)];
        match rex.op {
            RexOp::Select { constructor, rel } => Rel::new(
                RelOp::Project {
                    input: rel,
                    projections: vec![*constructor],
                },
                schema,
            ),
            op => Rel::new(RelOp::Scan { rex: Rex::new(op) }, schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use partiql_ast::builder::*;
    use partiql_ast::{OnConflict, OnConflictAction, SetOperator, SetQuantifier, SourceLocation};

    use super::*;

    fn plan(statement: Statement) -> (LogicalPlan, ProblemCollector) {
        let config = PlannerConfig::default();
        let mut problems = ProblemCollector::new();
        let plan = {
            let mut ctx = PlanContext::new(&config, &mut problems);
            StatementPlanner.plan(&mut ctx, statement).unwrap()
        };
        (plan, problems)
    }

    fn dml(operation: DmlOperation, target: partiql_ast::Expr) -> Dml {
        Dml {
            operation,
            target,
            where_clause: None,
            on_conflict: None,
            location: SourceLocation::new(1, 1, 6),
        }
    }

    fn only_problem(mut problems: ProblemCollector) -> ProblemDetails {
        let mut problems = problems.take();
        assert_eq!(1, problems.len(), "{problems:?}");
        problems.remove(0).details
    }

    #[test]
    fn set_op_wraps_sides() {
        let lhs = Query::select(select_value(var("x"), Some(scan(var("a"), Some("x")))));
        let rhs = Query::select(select_value(var("y"), Some(scan(var("b"), Some("y")))));
        let query = Query::new(QueryBody::SetOp {
            op: SetOperator::Union,
            quantifier: SetQuantifier::All,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });

        let (plan, problems) = plan(Statement::Query(query));
        assert!(problems.problems().is_empty());
        assert_eq!("SELECT($0.0)", plan.root.to_string());

        let RexOp::Select { rel, .. } = &plan.root.op else {
            panic!("expected select");
        };
        let RelOp::SetOp { lhs, rhs, .. } = &rel.op else {
            panic!("expected set op");
        };
        assert!(matches!(lhs.op, RelOp::Project { .. }));
        assert!(matches!(rhs.op, RelOp::Project { .. }));
        assert_eq!("$value", lhs.schema[0].name);
    }

    #[test]
    fn invalid_dml_target() {
        let statement = Statement::Dml(dml(DmlOperation::Delete, lit_int(1)));
        let (plan, problems) = plan(statement);
        assert!(matches!(plan.root.op, RexOp::Err { .. }));
        assert_eq!(
            ProblemDetails::InvalidDmlTarget {
                target: "literal".to_string()
            },
            only_problem(problems)
        );
    }

    #[test]
    fn on_conflict_requires_insert() {
        let mut remove = dml(DmlOperation::Remove, var("t"));
        remove.on_conflict = Some(OnConflict {
            condition: None,
            action: OnConflictAction::DoNothing,
        });

        let (_, problems) = plan(Statement::Dml(remove));
        assert_eq!(
            ProblemDetails::InvalidUseOfMutationClause {
                clause: "ON CONFLICT".to_string(),
                operation: "REMOVE".to_string(),
            },
            only_problem(problems)
        );
    }

    #[test]
    fn insert_unimplemented() {
        let insert = dml(
            DmlOperation::Insert {
                value: struct_lit(vec![("a", lit_int(1))]),
            },
            var("t"),
        );
        let (_, problems) = plan(Statement::Dml(insert));
        assert!(matches!(
            only_problem(problems),
            ProblemDetails::UnimplementedFeature { .. }
        ));
    }

    #[test]
    fn ddl_unsupported() {
        let ddl = Ddl {
            operation: DdlOperation::DropTable {
                name: partiql_ast::Identifier::regular("t"),
            },
            location: SourceLocation::UNKNOWN,
        };
        let (_, problems) = plan(Statement::Ddl(ddl));
        assert_eq!(
            ProblemDetails::DdlUnsupported {
                operation: "DROP TABLE".to_string()
            },
            only_problem(problems)
        );
    }
}
