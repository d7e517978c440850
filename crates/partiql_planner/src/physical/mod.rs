//! Lowering of typed logical plans to physical plans.
//!
//! Physical plans are what an evaluator executes. Every variable is a
//! register or a global, every call has a concrete signature (or a list of
//! candidates for run time dispatch), and every operator has an id unique
//! within the plan.

mod plan_aggregate;
mod plan_join;
mod plan_scan;

pub mod expr;

use std::fmt;

use partiql_ast::{GroupingStrategy, JoinKind, SetOperator, SetQuantifier};
use partiql_error::{PartiqlError, Result};
use tracing::debug;

pub use self::expr::{PhysicalExpr, PhysicalExprKind, Register};
use crate::config::{PlannerConfig, TypingMode};
use crate::functions::{AggSignature, FnMatchCandidate};
use crate::plan::{LogicalPlan, Rel, RelOp, SortOrder};
use crate::types::StaticType;

/// How scans handle inputs that aren't collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanMode {
    /// Scanning a non-collection is an error.
    Strict,
    /// A non-collection is treated as a bag containing only that value.
    Permissive,
}

impl From<TypingMode> for ScanMode {
    fn from(mode: TypingMode) -> Self {
        match mode {
            TypingMode::Strict => ScanMode::Strict,
            TypingMode::Permissive => ScanMode::Permissive,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

/// Identifier for an operator within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(pub(crate) usize);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct OperatorIdGen {
    next: usize,
}

impl OperatorIdGen {
    fn next_id(&mut self) -> OperatorId {
        let id = OperatorId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalAggregate {
    pub function: AggFunction,
    pub args: Vec<PhysicalExpr>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggFunction {
    Static(AggSignature),
    Dynamic(Vec<FnMatchCandidate<AggSignature>>),
}

impl fmt::Display for PhysicalAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            AggFunction::Static(sig) => write!(f, "{}(", sig.specific)?,
            AggFunction::Dynamic(candidates) => {
                let name = candidates
                    .first()
                    .map(|c| c.signature.name.as_str())
                    .unwrap_or("");
                write!(f, "dynamic {name}(")?
            }
        }
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalSortSpec {
    pub expr: PhysicalExpr,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalOperator {
    Scan {
        source: PhysicalExpr,
        mode: ScanMode,
    },
    ScanIndexed {
        source: PhysicalExpr,
        mode: ScanMode,
    },
    Unpivot {
        source: PhysicalExpr,
        mode: ScanMode,
    },
    Filter {
        predicate: PhysicalExpr,
    },
    Project {
        projections: Vec<PhysicalExpr>,
    },
    /// Right side is evaluated once per row of the left side.
    NestedLoopJoin {
        kind: JoinKind,
        condition: PhysicalExpr,
    },
    HashAggregate {
        groups: Vec<PhysicalExpr>,
        aggregates: Vec<PhysicalAggregate>,
        strategy: GroupingStrategy,
    },
    /// Aggregate without groups, always produces exactly one row.
    UngroupedAggregate {
        aggregates: Vec<PhysicalAggregate>,
    },
    Sort {
        specs: Vec<PhysicalSortSpec>,
    },
    Limit {
        limit: PhysicalExpr,
    },
    Offset {
        offset: PhysicalExpr,
    },
    Distinct,
    SetOp {
        op: SetOperator,
        quantifier: SetQuantifier,
    },
    Exclude {
        paths: Vec<PhysicalExpr>,
    },
}

impl PhysicalOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "Scan",
            Self::ScanIndexed { .. } => "ScanIndexed",
            Self::Unpivot { .. } => "Unpivot",
            Self::Filter { .. } => "Filter",
            Self::Project { .. } => "Project",
            Self::NestedLoopJoin { .. } => "NestedLoopJoin",
            Self::HashAggregate { .. } => "HashAggregate",
            Self::UngroupedAggregate { .. } => "UngroupedAggregate",
            Self::Sort { .. } => "Sort",
            Self::Limit { .. } => "Limit",
            Self::Offset { .. } => "Offset",
            Self::Distinct => "Distinct",
            Self::SetOp { .. } => "SetOp",
            Self::Exclude { .. } => "Exclude",
        }
    }
}

/// A physical operator along with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperator {
    pub id: OperatorId,
    pub operator: PhysicalOperator,
    /// Types of the registers this operator produces.
    pub output_types: Vec<StaticType>,
    pub children: Vec<PlannedOperator>,
}

/// Output of physical planning. The root is the expression producing the
/// query's result.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalPlan {
    pub root: PhysicalExpr,
}

/// Planner for turning a typed logical plan into a physical plan.
#[derive(Debug)]
pub struct OperatorPlanner {
    scan_mode: ScanMode,
}

impl OperatorPlanner {
    pub fn new(config: &PlannerConfig) -> Self {
        OperatorPlanner {
            scan_mode: config.typing_mode.into(),
        }
    }

    pub fn plan(&self, plan: LogicalPlan) -> Result<PhysicalPlan> {
        let mut state = OperatorPlanState {
            scan_mode: self.scan_mode,
            id_gen: OperatorIdGen { next: 0 },
        };
        let root = state.plan_expr(plan.root)?;
        debug!(operators = state.id_gen.next, "planned physical operators");

        Ok(PhysicalPlan { root })
    }
}

#[derive(Debug)]
struct OperatorPlanState {
    scan_mode: ScanMode,
    /// Generate unique ids for all operators.
    id_gen: OperatorIdGen,
}

impl OperatorPlanState {
    fn plan(&mut self, rel: Rel) -> Result<PlannedOperator> {
        let Rel { op, schema } = rel;
        let output_types: Vec<_> = schema.into_iter().map(|b| b.ty).collect();

        match op {
            RelOp::Scan { rex } => self.plan_scan(rex, output_types),
            RelOp::ScanIndexed { rex } => self.plan_scan_indexed(rex, output_types),
            RelOp::Unpivot { rex } => self.plan_unpivot(rex, output_types),
            RelOp::Join {
                lhs,
                rhs,
                condition,
                kind,
            } => self.plan_join(*lhs, *rhs, condition, kind, output_types),
            RelOp::Aggregate {
                input,
                calls,
                groups,
                strategy,
            } => self.plan_aggregate(*input, calls, groups, strategy, output_types),
            RelOp::SetOp {
                op,
                quantifier,
                lhs,
                rhs,
            } => self.plan_set_operation(op, quantifier, *lhs, *rhs, output_types),
            RelOp::Filter { input, predicate } => {
                let operator = PhysicalOperator::Filter {
                    predicate: self.plan_expr(predicate)?,
                };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Project { input, projections } => {
                let operator = PhysicalOperator::Project {
                    projections: self.plan_exprs(projections)?,
                };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Sort { input, specs } => {
                let mut planned = Vec::with_capacity(specs.len());
                for spec in specs {
                    planned.push(PhysicalSortSpec {
                        expr: self.plan_expr(spec.rex)?,
                        order: spec.order,
                    });
                }
                let operator = PhysicalOperator::Sort { specs: planned };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Limit { input, limit } => {
                let operator = PhysicalOperator::Limit {
                    limit: self.plan_expr(limit)?,
                };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Offset { input, offset } => {
                let operator = PhysicalOperator::Offset {
                    offset: self.plan_expr(offset)?,
                };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Distinct { input } => {
                self.plan_unary(*input, PhysicalOperator::Distinct, output_types)
            }
            RelOp::Exclude { input, paths } => {
                let operator = PhysicalOperator::Exclude {
                    paths: self.plan_exprs(paths)?,
                };
                self.plan_unary(*input, operator, output_types)
            }
            RelOp::Err { message } => Err(PartiqlError::new(
                "Error relation reached physical planning",
            )
            .with_field("message", message)),
        }
    }

    /// Plan an operator with a single input.
    fn plan_unary(
        &mut self,
        input: Rel,
        operator: PhysicalOperator,
        output_types: Vec<StaticType>,
    ) -> Result<PlannedOperator> {
        let child = self.plan(input)?;
        Ok(PlannedOperator {
            id: self.id_gen.next_id(),
            operator,
            output_types,
            children: vec![child],
        })
    }
}

#[cfg(test)]
mod tests {
    use partiql_ast::Symbol;

    use super::*;
    use crate::plan::{Binding, Rex, RexOp, SortSpec};

    fn scan(ty: StaticType) -> Rel {
        Rel::new(
            RelOp::Scan {
                rex: Rex::with_type(
                    RexOp::Var(crate::plan::VarRef::Global { id: "t".to_string() }),
                    StaticType::bag(ty.clone()),
                ),
            },
            vec![Binding::new("t", ty)],
        )
    }

    fn select(rel: Rel) -> LogicalPlan {
        LogicalPlan {
            root: Rex::new(RexOp::Select {
                constructor: Box::new(Rex::with_type(
                    RexOp::Var(crate::plan::VarRef::Local { depth: 0, index: 0 }),
                    StaticType::Any,
                )),
                rel: Box::new(rel),
            }),
        }
    }

    fn input_of(plan: &PhysicalPlan) -> &PlannedOperator {
        match &plan.root.kind {
            PhysicalExprKind::Select { input, .. } => input,
            other => panic!("expected select: {other:?}"),
        }
    }

    #[test]
    fn scan_mode_from_config() {
        let mut config = PlannerConfig::default();
        config.typing_mode = TypingMode::Strict;

        let plan = OperatorPlanner::new(&config)
            .plan(select(scan(StaticType::Int64)))
            .unwrap();
        let root = input_of(&plan);
        assert!(matches!(
            root.operator,
            PhysicalOperator::Scan {
                mode: ScanMode::Strict,
                ..
            }
        ));
        assert_eq!(vec![StaticType::Int64], root.output_types);
        assert_eq!("SELECT(#0.0)", plan.root.to_string());
    }

    #[test]
    fn unique_operator_ids() {
        let sort = Rel::new(
            RelOp::Sort {
                input: Box::new(scan(StaticType::Any)),
                specs: vec![SortSpec {
                    rex: Rex::new(RexOp::PathSymbol {
                        root: Box::new(Rex::local(0, 0)),
                        symbol: Symbol::regular("a"),
                    }),
                    order: SortOrder::AscNullsLast,
                }],
            },
            vec![Binding::untyped("t")],
        );

        let plan = OperatorPlanner::new(&PlannerConfig::default())
            .plan(select(sort))
            .unwrap();
        let root = input_of(&plan);
        assert_eq!("Sort", root.operator.name());
        assert_ne!(root.id, root.children[0].id);
    }

    #[test]
    fn unresolved_is_internal_error() {
        let filter = Rel::new(
            RelOp::Filter {
                input: Box::new(scan(StaticType::Any)),
                predicate: Rex::unresolved_call("eq", vec![Rex::lit(1_i64), Rex::lit(1_i64)], true),
            },
            vec![Binding::untyped("t")],
        );

        let err = OperatorPlanner::new(&PlannerConfig::default())
            .plan(select(filter))
            .unwrap_err();
        assert_eq!("Unresolved call reached physical planning", err.get_msg());
    }

    #[test]
    fn err_node_is_internal_error() {
        let plan = LogicalPlan {
            root: Rex::err("undefined variable x"),
        };
        assert!(OperatorPlanner::new(&PlannerConfig::default()).plan(plan).is_err());
    }
}
