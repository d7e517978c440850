use partiql_ast::{JoinKind, SetOperator, SetQuantifier};
use partiql_error::Result;

use super::{OperatorPlanState, PhysicalOperator, PlannedOperator};
use crate::plan::{Rel, Rex};
use crate::types::StaticType;

impl OperatorPlanState {
    /// Joins are always nested loop joins since the right side may reference
    /// the left.
    pub(super) fn plan_join(
        &mut self,
        lhs: Rel,
        rhs: Rel,
        condition: Rex,
        kind: JoinKind,
        output_types: Vec<StaticType>,
    ) -> Result<PlannedOperator> {
        let left = self.plan(lhs)?;
        let right = self.plan(rhs)?;
        let condition = self.plan_expr(condition)?;

        Ok(PlannedOperator {
            id: self.id_gen.next_id(),
            operator: PhysicalOperator::NestedLoopJoin { kind, condition },
            output_types,
            children: vec![left, right],
        })
    }

    pub(super) fn plan_set_operation(
        &mut self,
        op: SetOperator,
        quantifier: SetQuantifier,
        lhs: Rel,
        rhs: Rel,
        output_types: Vec<StaticType>,
    ) -> Result<PlannedOperator> {
        let left = self.plan(lhs)?;
        let right = self.plan(rhs)?;

        Ok(PlannedOperator {
            id: self.id_gen.next_id(),
            operator: PhysicalOperator::SetOp { op, quantifier },
            output_types,
            children: vec![left, right],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::physical::{OperatorPlanner, PhysicalExprKind};
    use crate::plan::{Binding, LogicalPlan, RelOp, RexOp, VarRef};

    fn scan(id: &str) -> Rel {
        Rel::new(
            RelOp::Scan {
                rex: Rex::new(RexOp::Var(VarRef::Global { id: id.to_string() })),
            },
            vec![Binding::untyped(id)],
        )
    }

    #[test]
    fn join_is_nested_loop() {
        let join = Rel::new(
            RelOp::Join {
                lhs: Box::new(scan("a")),
                rhs: Box::new(scan("b")),
                condition: Rex::lit(true),
                kind: JoinKind::Left,
            },
            vec![Binding::untyped("a"), Binding::untyped("b")],
        );
        let plan = LogicalPlan {
            root: Rex::new(RexOp::Select {
                constructor: Box::new(Rex::local(0, 1)),
                rel: Box::new(join),
            }),
        };

        let plan = OperatorPlanner::new(&PlannerConfig::default()).plan(plan).unwrap();
        let PhysicalExprKind::Select { input, .. } = &plan.root.kind else {
            panic!("expected select");
        };
        assert!(matches!(
            input.operator,
            PhysicalOperator::NestedLoopJoin {
                kind: JoinKind::Left,
                ..
            }
        ));
        assert_eq!(2, input.children.len());
        assert_eq!(2, input.output_types.len());
    }
}
