use partiql_ast::{GroupingStrategy, SetQuantifier};
use partiql_error::{PartiqlError, Result};

use super::{AggFunction, OperatorPlanState, PhysicalAggregate, PhysicalOperator, PlannedOperator};
use crate::plan::{AggCall, Rel, Rex};
use crate::types::StaticType;

impl OperatorPlanState {
    pub(super) fn plan_aggregate(
        &mut self,
        input: Rel,
        calls: Vec<AggCall>,
        groups: Vec<Rex>,
        strategy: GroupingStrategy,
        output_types: Vec<StaticType>,
    ) -> Result<PlannedOperator> {
        let child = self.plan(input)?;

        let mut aggregates = Vec::with_capacity(calls.len());
        for call in calls {
            aggregates.push(self.plan_agg_call(call)?);
        }

        // Aggregate outputs are ordered first, followed by the group values.
        let operator = if groups.is_empty() {
            PhysicalOperator::UngroupedAggregate { aggregates }
        } else {
            PhysicalOperator::HashAggregate {
                groups: self.plan_exprs(groups)?,
                aggregates,
                strategy,
            }
        };

        Ok(PlannedOperator {
            id: self.id_gen.next_id(),
            operator,
            output_types,
            children: vec![child],
        })
    }

    fn plan_agg_call(&mut self, call: AggCall) -> Result<PhysicalAggregate> {
        let (function, args, quantifier) = match call {
            AggCall::Static {
                signature,
                args,
                quantifier,
            } => (AggFunction::Static(signature), args, quantifier),
            AggCall::Dynamic {
                candidates,
                args,
                quantifier,
            } => (AggFunction::Dynamic(candidates), args, quantifier),
            AggCall::Unresolved { name, .. } => {
                return Err(PartiqlError::new("Unresolved aggregate reached physical planning")
                    .with_field("aggregate", name));
            }
        };

        Ok(PhysicalAggregate {
            function,
            args: self.plan_exprs(args)?,
            distinct: quantifier == SetQuantifier::Distinct,
        })
    }
}
