use partiql_ast::{CollectionKind, FromClause, FromSource, FromSourceKind};
use partiql_error::{OptionExt, Result};

use super::PlanContext;
use super::plan_expr::ExprPlanner;
use crate::plan::{Binding, Rel, RelOp, Rex, RexOp};

/// Binding for the single row produced by a select without a FROM clause.
const EMPTY_ROW_BINDING: &str = "$row";

#[derive(Debug)]
pub struct FromPlanner;

impl FromPlanner {
    pub fn plan(&self, ctx: &mut PlanContext<'_>, from: FromClause) -> Result<Rel> {
        match from {
            FromClause::Source(source) => self.plan_source(ctx, source),
            FromClause::Join {
                kind,
                lhs,
                rhs,
                condition,
            } => {
                let lhs = self.plan(ctx, *lhs)?;
                let rhs = self.plan(ctx, *rhs)?;
                let condition = match condition {
                    Some(condition) => ExprPlanner.plan(ctx, condition)?,
                    None => Rex::lit(true),
                };

                let mut schema = lhs.schema.clone();
                schema.extend(rhs.schema.iter().cloned());

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
        }
    }

    /// Source for a select without a FROM clause, `<<{}>>`.
    pub fn plan_empty(&self) -> Rel {
        let row = Rex::new(RexOp::Struct { fields: Vec::new() });
        let rex = Rex::new(RexOp::Collection {
            kind: CollectionKind::Bag,
            values: vec![row],
        });
        Rel::new(RelOp::Scan { rex }, vec![Binding::untyped(EMPTY_ROW_BINDING)])
    }

    fn plan_source(&self, ctx: &mut PlanContext<'_>, source: FromSource) -> Result<Rel> {
        let as_alias = source.as_alias.required("FROM source alias")?;
        let rex = ExprPlanner.plan(ctx, source.expr)?;

        Ok(match (source.kind, source.at_alias) {
            (FromSourceKind::Scan, None) => Rel::new(RelOp::Scan { rex }, vec![Binding::untyped(as_alias)]),
            (FromSourceKind::Scan, Some(at_alias)) => Rel::new(
                RelOp::ScanIndexed { rex },
                vec![Binding::untyped(as_alias), Binding::untyped(at_alias)],
            ),
            (FromSourceKind::Unpivot, at_alias) => {
                let at_alias = at_alias.required("UNPIVOT AT alias")?;
                Rel::new(
                    RelOp::Unpivot { rex },
                    vec![Binding::untyped(as_alias), Binding::untyped(at_alias)],
                )
            }
        })
    }
}
