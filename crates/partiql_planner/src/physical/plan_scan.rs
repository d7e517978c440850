use partiql_error::Result;

use super::{OperatorPlanState, PhysicalOperator, PlannedOperator};
use crate::plan::Rex;
use crate::types::StaticType;

impl OperatorPlanState {
    pub(super) fn plan_scan(&mut self, rex: Rex, output_types: Vec<StaticType>) -> Result<PlannedOperator> {
        let operator = PhysicalOperator::Scan {
            source: self.plan_expr(rex)?,
            mode: self.scan_mode,
        };
        Ok(self.plan_source(operator, output_types))
    }

    pub(super) fn plan_scan_indexed(
        &mut self,
        rex: Rex,
        output_types: Vec<StaticType>,
    ) -> Result<PlannedOperator> {
        let operator = PhysicalOperator::ScanIndexed {
            source: self.plan_expr(rex)?,
            mode: self.scan_mode,
        };
        Ok(self.plan_source(operator, output_types))
    }

    pub(super) fn plan_unpivot(&mut self, rex: Rex, output_types: Vec<StaticType>) -> Result<PlannedOperator> {
        let operator = PhysicalOperator::Unpivot {
            source: self.plan_expr(rex)?,
            mode: self.scan_mode,
        };
        Ok(self.plan_source(operator, output_types))
    }

    fn plan_source(&mut self, operator: PhysicalOperator, output_types: Vec<StaticType>) -> PlannedOperator {
        PlannedOperator {
            id: self.id_gen.next_id(),
            operator,
            output_types,
            children: Vec::new(),
        }
    }
}
