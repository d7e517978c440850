use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::physical::{PhysicalOperator, PlannedOperator};
use crate::plan::{Binding, Rel, RelOp};

/// An entry in an output for explaining a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainEntry {
    /// Name of the node.
    pub name: String,
    /// Items to display in the explain entry.
    ///
    /// Using a btree to ensure consistent ordering.
    pub items: BTreeMap<String, ExplainValue>,
}

impl ExplainEntry {
    pub fn new(name: impl Into<String>) -> Self {
        ExplainEntry {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.items
            .insert(key.into(), ExplainValue::Value(value.to_string()));
        self
    }

    pub fn with_values<S: fmt::Display>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let vals = ExplainValue::Values(values.into_iter().map(|s| s.to_string()).collect());
        self.items.insert(key.into(), vals);
        self
    }

    /// Add the output bindings of a logical operator.
    fn with_schema(self, conf: ExplainConfig, schema: &[Binding]) -> Self {
        if !conf.verbose {
            return self;
        }
        self.with_values(
            "schema",
            schema.iter().map(|b| format!("{}: {}", b.name, b.ty)),
        )
    }
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.items.is_empty() {
            write!(f, " (")?;
            for (idx, (k, v)) in self.items.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k} = {v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Values(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

/// Configuration for producing an ExplainEntry for a node in a plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainConfig {
    /// Include types.
    pub verbose: bool,
}

/// Trait for explaining a single node in the plan tree.
pub trait Explainable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}

impl Explainable for Rel {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let entry = match &self.op {
            RelOp::Scan { rex } => ExplainEntry::new("Scan").with_value("source", rex),
            RelOp::ScanIndexed { rex } => ExplainEntry::new("ScanIndexed").with_value("source", rex),
            RelOp::Unpivot { rex } => ExplainEntry::new("Unpivot").with_value("source", rex),
            RelOp::Filter { predicate, .. } => {
                ExplainEntry::new("Filter").with_value("predicate", predicate)
            }
            RelOp::Project { projections, .. } => {
                ExplainEntry::new("Project").with_values("projections", projections)
            }
            RelOp::Join {
                condition, kind, ..
            } => ExplainEntry::new("Join")
                .with_value("kind", format!("{kind:?}"))
                .with_value("condition", condition),
            RelOp::Aggregate {
                calls,
                groups,
                strategy,
                ..
            } => ExplainEntry::new("Aggregate")
                .with_values("aggregates", calls)
                .with_values("groups", groups)
                .with_value("strategy", format!("{strategy:?}")),
            RelOp::Sort { specs, .. } => ExplainEntry::new("Sort").with_values(
                "specs",
                specs.iter().map(|s| format!("{} {}", s.rex, s.order)),
            ),
            RelOp::Limit { limit, .. } => ExplainEntry::new("Limit").with_value("limit", limit),
            RelOp::Offset { offset, .. } => ExplainEntry::new("Offset").with_value("offset", offset),
            RelOp::Distinct { .. } => ExplainEntry::new("Distinct"),
            RelOp::SetOp { op, quantifier, .. } => ExplainEntry::new("SetOp")
                .with_value("op", format!("{op:?}"))
                .with_value("quantifier", format!("{quantifier:?}")),
            RelOp::Exclude { paths, .. } => ExplainEntry::new("Exclude").with_values("paths", paths),
            RelOp::Err { message } => ExplainEntry::new("Err").with_value("message", message),
        };
        entry.with_schema(conf, &self.schema)
    }
}

impl Explainable for PlannedOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let entry = ExplainEntry::new(self.operator.name());
        let entry = match &self.operator {
            PhysicalOperator::Scan { source, mode }
            | PhysicalOperator::ScanIndexed { source, mode }
            | PhysicalOperator::Unpivot { source, mode } => {
                entry.with_value("source", source).with_value("mode", mode)
            }
            PhysicalOperator::Filter { predicate } => entry.with_value("predicate", predicate),
            PhysicalOperator::Project { projections } => entry.with_values("projections", projections),
            PhysicalOperator::NestedLoopJoin { kind, condition } => entry
                .with_value("kind", format!("{kind:?}"))
                .with_value("condition", condition),
            PhysicalOperator::HashAggregate {
                groups,
                aggregates,
                strategy,
            } => entry
                .with_values("aggregates", aggregates)
                .with_values("groups", groups)
                .with_value("strategy", format!("{strategy:?}")),
            PhysicalOperator::UngroupedAggregate { aggregates } => {
                entry.with_values("aggregates", aggregates)
            }
            PhysicalOperator::Sort { specs } => entry.with_values(
                "specs",
                specs.iter().map(|s| format!("{} {}", s.expr, s.order)),
            ),
            PhysicalOperator::Limit { limit } => entry.with_value("limit", limit),
            PhysicalOperator::Offset { offset } => entry.with_value("offset", offset),
            PhysicalOperator::Distinct => entry,
            PhysicalOperator::SetOp { op, quantifier } => entry
                .with_value("op", format!("{op:?}"))
                .with_value("quantifier", format!("{quantifier:?}")),
            PhysicalOperator::Exclude { paths } => entry.with_values("paths", paths),
        };

        if conf.verbose {
            entry
                .with_value("id", self.id)
                .with_values("types", &self.output_types)
        } else {
            entry
        }
    }
}
