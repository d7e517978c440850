//! Tree representations of logical and physical plans.
//!
//! Used for trace logging and for asserting on plan shapes in tests.

mod explainable;

use serde::{Deserialize, Serialize};

pub use self::explainable::{ExplainConfig, ExplainEntry, ExplainValue, Explainable};
use crate::physical::{PhysicalExpr, PhysicalExprKind, PhysicalPlan, PlannedOperator};
use crate::plan::{LogicalPlan, Rel, Rex, RexOp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainNode {
    pub entry: ExplainEntry,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new_from_logical(config: ExplainConfig, plan: &LogicalPlan) -> Self {
        Self::walk_logical_rex(config, &plan.root)
    }

    pub fn new_from_physical(config: ExplainConfig, plan: &PhysicalPlan) -> Self {
        Self::walk_physical_expr(config, &plan.root)
    }

    /// Render the tree with two spaces of indentation per level.
    pub fn to_indented_string(&self) -> String {
        let mut out = String::new();
        self.write_indented(&mut out, 0);
        out
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.entry.to_string());
        out.push('\n');
        for child in &self.children {
            child.write_indented(out, depth + 1);
        }
    }

    fn walk_logical_rex(config: ExplainConfig, rex: &Rex) -> Self {
        match &rex.op {
            RexOp::Select { constructor, rel } => {
                let mut entry = ExplainEntry::new("Select").with_value("constructor", constructor);
                if config.verbose {
                    entry = entry.with_value("type", &rex.ty);
                }
                ExplainNode {
                    entry,
                    children: vec![Self::walk_logical(config, rel)],
                }
            }
            RexOp::Pivot { key, value, rel } => ExplainNode {
                entry: ExplainEntry::new("Pivot")
                    .with_value("key", key)
                    .with_value("value", value),
                children: vec![Self::walk_logical(config, rel)],
            },
            _ => ExplainNode {
                entry: ExplainEntry::new("Expression").with_value("expr", rex),
                children: Vec::new(),
            },
        }
    }

    fn walk_logical(config: ExplainConfig, rel: &Rel) -> Self {
        let entry = rel.explain_entry(config);
        let children = rel
            .children()
            .into_iter()
            .map(|child| Self::walk_logical(config, child))
            .collect();

        ExplainNode { entry, children }
    }

    fn walk_physical_expr(config: ExplainConfig, expr: &PhysicalExpr) -> Self {
        match &expr.kind {
            PhysicalExprKind::Select { constructor, input } => {
                let mut entry = ExplainEntry::new("Select").with_value("constructor", constructor);
                if config.verbose {
                    entry = entry.with_value("type", &expr.ty);
                }
                ExplainNode {
                    entry,
                    children: vec![Self::walk_physical(config, input)],
                }
            }
            PhysicalExprKind::Pivot { key, value, input } => ExplainNode {
                entry: ExplainEntry::new("Pivot")
                    .with_value("key", key)
                    .with_value("value", value),
                children: vec![Self::walk_physical(config, input)],
            },
            _ => ExplainNode {
                entry: ExplainEntry::new("Expression").with_value("expr", expr),
                children: Vec::new(),
            },
        }
    }

    fn walk_physical(config: ExplainConfig, plan: &PlannedOperator) -> Self {
        let entry = plan.explain_entry(config);
        let children = plan
            .children
            .iter()
            .map(|child| Self::walk_physical(config, child))
            .collect();

        ExplainNode { entry, children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::physical::OperatorPlanner;
    use crate::plan::{Binding, RelOp, VarRef};
    use crate::types::StaticType;

    fn plan() -> LogicalPlan {
        let scan = Rel::new(
            RelOp::Scan {
                rex: Rex::new(RexOp::Var(VarRef::Global {
                    id: "orders".to_string(),
                })),
            },
            vec![Binding::new("o", StaticType::Any)],
        );
        let filter = Rel::new(
            RelOp::Filter {
                input: Box::new(scan),
                predicate: Rex::lit(true),
            },
            vec![Binding::new("o", StaticType::Any)],
        );
        LogicalPlan {
            root: Rex::new(RexOp::Select {
                constructor: Box::new(Rex::local(0, 0)),
                rel: Box::new(filter),
            }),
        }
    }

    #[test]
    fn logical_tree() {
        let node = ExplainNode::new_from_logical(ExplainConfig::default(), &plan());
        assert_eq!(
            "Select (constructor = $0.0)\n  Filter (predicate = true)\n    Scan (source = global(orders))\n",
            node.to_indented_string()
        );
    }

    #[test]
    fn physical_tree_roundtrips_through_json() {
        let physical = OperatorPlanner::new(&PlannerConfig::default())
            .plan(plan())
            .unwrap();
        let node = ExplainNode::new_from_physical(ExplainConfig::default(), &physical);
        assert_eq!("Scan", node.children[0].children[0].entry.name);

        let json = serde_json::to_string(&node).unwrap();
        let parsed: ExplainNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, parsed);
    }
}
