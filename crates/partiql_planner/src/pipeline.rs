//! Orchestration of the planning stages.
//!
//! A statement goes through normalization, lowering to a logical plan,
//! typing, lowering to a physical plan, then any caller provided passes.
//! Problems are collected across stages and planning halts after the first
//! stage that reported an error.

use std::fmt;
use std::sync::Arc;

use partiql_ast::Statement;
use partiql_error::Result;
use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::{EmptyResolver, VariableResolver};
use crate::config::PlannerConfig;
use crate::diagnostics::{Problem, ProblemCollector};
use crate::explain::{ExplainConfig, ExplainNode};
use crate::functions::FunctionCatalog;
use crate::optimizer::const_fold::ConstFold;
use crate::optimizer::rewrite_plan;
use crate::physical::{OperatorPlanner, PhysicalPlan};
use crate::planner::normalize::Normalizer;
use crate::planner::{PlanContext, StatementPlanner};
use crate::typer::PlanTyper;

/// Stage of the pipeline, reported on failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PlanStage {
    Normalize,
    Logical,
    Typing,
    Physical,
    /// A caller provided pass.
    Pass { name: String },
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalize => write!(f, "normalize"),
            Self::Logical => write!(f, "logical"),
            Self::Typing => write!(f, "typing"),
            Self::Physical => write!(f, "physical"),
            Self::Pass { name } => write!(f, "pass '{name}'"),
        }
    }
}

#[derive(Debug)]
pub enum PlannerOutput {
    Success {
        plan: PhysicalPlan,
        /// Warnings reported by any stage.
        warnings: Vec<Problem>,
    },
    Failure {
        /// Stage that reported the first error.
        stage: PlanStage,
        /// Every problem reported up to and including that stage.
        problems: Vec<Problem>,
    },
}

impl PlannerOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Problems reported regardless of outcome.
    pub fn problems(&self) -> &[Problem] {
        match self {
            Self::Success { warnings, .. } => warnings,
            Self::Failure { problems, .. } => problems,
        }
    }
}

/// A pass run over the physical plan after the built in stages.
///
/// Passes run in the order they were registered. A pass reports user facing
/// problems through the collector; returning an error means the pass itself
/// is broken.
pub trait PlannerPass: fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, plan: PhysicalPlan, problems: &mut ProblemCollector) -> Result<PhysicalPlan>;
}

#[derive(Debug)]
pub struct PlannerBuilder {
    config: PlannerConfig,
    resolver: Arc<dyn VariableResolver>,
    passes: Vec<Box<dyn PlannerPass>>,
}

impl Default for PlannerBuilder {
    fn default() -> Self {
        PlannerBuilder {
            config: PlannerConfig::default(),
            resolver: Arc::new(EmptyResolver),
            passes: Vec::new(),
        }
    }
}

impl PlannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn VariableResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_pass(mut self, pass: impl PlannerPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn build(self) -> Result<Planner> {
        Ok(Planner {
            catalog: FunctionCatalog::try_new()?,
            config: self.config,
            resolver: self.resolver,
            passes: self.passes,
        })
    }
}

#[derive(Debug)]
pub struct Planner {
    config: PlannerConfig,
    catalog: FunctionCatalog,
    resolver: Arc<dyn VariableResolver>,
    passes: Vec<Box<dyn PlannerPass>>,
}

impl Planner {
    pub fn builder() -> PlannerBuilder {
        PlannerBuilder::new()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a statement.
    ///
    /// An `Err` is only returned if the planner hit an internal bug. Problems
    /// with the statement itself are returned in the output.
    pub fn plan(&self, statement: &Statement) -> Result<PlannerOutput> {
        let mut problems = ProblemCollector::new();

        debug!("normalizing statement");
        let statement = Normalizer::new(&mut problems).normalize_statement(statement.clone());
        if let Some(failure) = Self::check_stage(PlanStage::Normalize, &mut problems) {
            return Ok(failure);
        }

        debug!("planning logical");
        let plan = {
            let mut ctx = PlanContext::new(&self.config, &mut problems);
            StatementPlanner.plan(&mut ctx, statement)?
        };
        if let Some(failure) = Self::check_stage(PlanStage::Logical, &mut problems) {
            return Ok(failure);
        }

        debug!("typing logical plan");
        let plan = PlanTyper::new(
            &self.catalog,
            self.resolver.as_ref(),
            &self.config,
            &mut problems,
        )
        .type_plan(plan)?;
        let plan = rewrite_plan::<ConstFold>(plan)?;
        if let Some(failure) = Self::check_stage(PlanStage::Typing, &mut problems) {
            return Ok(failure);
        }
        trace!(
            plan = %ExplainNode::new_from_logical(ExplainConfig { verbose: true }, &plan).to_indented_string(),
            "typed logical plan"
        );

        debug!("planning physical");
        let mut plan = OperatorPlanner::new(&self.config).plan(plan)?;
        if let Some(failure) = Self::check_stage(PlanStage::Physical, &mut problems) {
            return Ok(failure);
        }

        for pass in &self.passes {
            debug!(pass = %pass.name(), "running planner pass");
            plan = pass.apply(plan, &mut problems)?;
            let stage = PlanStage::Pass {
                name: pass.name().to_string(),
            };
            if let Some(failure) = Self::check_stage(stage, &mut problems) {
                return Ok(failure);
            }
        }

        Ok(PlannerOutput::Success {
            plan,
            warnings: problems.take(),
        })
    }

    fn check_stage(stage: PlanStage, problems: &mut ProblemCollector) -> Option<PlannerOutput> {
        if !problems.has_errors() {
            return None;
        }
        debug!(%stage, errors = problems.error_count(), "planning halted");
        Some(PlannerOutput::Failure {
            stage,
            problems: problems.take(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use partiql_ast::builder::*;
    use partiql_ast::{Ddl, DdlOperation, Identifier, Query, SourceLocation};

    use super::*;
    use crate::catalog::MemoryResolver;
    use crate::config::UndefinedVariableBehavior;
    use crate::diagnostics::ProblemDetails;
    use crate::types::StaticType;

    #[derive(Debug)]
    struct CountingPass {
        calls: Rc<Cell<usize>>,
        report_error: bool,
    }

    impl PlannerPass for CountingPass {
        fn name(&self) -> &str {
            "counting"
        }

        fn apply(&self, plan: PhysicalPlan, problems: &mut ProblemCollector) -> Result<PhysicalPlan> {
            self.calls.set(self.calls.get() + 1);
            if self.report_error {
                problems.error(
                    SourceLocation::UNKNOWN,
                    ProblemDetails::DisallowedFeature {
                        feature: "anything".to_string(),
                    },
                );
            }
            Ok(plan)
        }
    }

    fn select_from(table: &str) -> Statement {
        Statement::Query(Query::select(select_value(
            dot(var("x"), "a"),
            Some(scan(var(table), Some("x"))),
        )))
    }

    fn resolver() -> Arc<dyn VariableResolver> {
        Arc::new(MemoryResolver::new().with_global("orders", StaticType::bag(StaticType::Any)))
    }

    #[test]
    fn success_runs_passes() {
        let calls = Rc::new(Cell::new(0));
        let planner = Planner::builder()
            .with_resolver(resolver())
            .with_pass(CountingPass {
                calls: calls.clone(),
                report_error: false,
            })
            .build()
            .unwrap();

        let out = planner.plan(&select_from("orders")).unwrap();
        assert!(out.is_success(), "{out:?}");
        assert_eq!(1, calls.get());
    }

    #[test]
    fn typing_failure_short_circuits() {
        let calls = Rc::new(Cell::new(0));
        let planner = Planner::builder()
            .with_resolver(resolver())
            .with_pass(CountingPass {
                calls: calls.clone(),
                report_error: false,
            })
            .build()
            .unwrap();

        let out = planner.plan(&select_from("missing_table")).unwrap();
        let PlannerOutput::Failure { stage, problems } = out else {
            panic!("expected failure");
        };
        assert_eq!(PlanStage::Typing, stage);
        assert_eq!(1, problems.len());
        assert!(matches!(
            problems[0].details,
            ProblemDetails::UndefinedVariable { .. }
        ));
        assert_eq!(0, calls.get());
    }

    #[test]
    fn permissive_warnings_carried() {
        let mut config = PlannerConfig::default();
        config.undefined_variable_behavior = UndefinedVariableBehavior::Permissive;
        let planner = Planner::builder().with_config(config).build().unwrap();

        let out = planner.plan(&select_from("missing_table")).unwrap();
        let PlannerOutput::Success { warnings, .. } = out else {
            panic!("expected success");
        };
        assert_eq!(1, warnings.len());
        assert!(!warnings[0].is_error());
    }

    #[test]
    fn ddl_fails_in_logical_stage() {
        let planner = Planner::builder().build().unwrap();
        let ddl = Statement::Ddl(Ddl {
            operation: DdlOperation::CreateTable {
                name: Identifier::regular("t"),
            },
            location: SourceLocation::new(1, 1, 12),
        });

        let out = planner.plan(&ddl).unwrap();
        let PlannerOutput::Failure { stage, .. } = out else {
            panic!("expected failure");
        };
        assert_eq!(PlanStage::Logical, stage);
    }

    #[test]
    fn pass_errors_reported_with_pass_stage() {
        let calls = Rc::new(Cell::new(0));
        let planner = Planner::builder()
            .with_resolver(resolver())
            .with_pass(CountingPass {
                calls: calls.clone(),
                report_error: true,
            })
            .with_pass(CountingPass {
                calls: calls.clone(),
                report_error: false,
            })
            .build()
            .unwrap();

        let out = planner.plan(&select_from("orders")).unwrap();
        let PlannerOutput::Failure { stage, .. } = out else {
            panic!("expected failure");
        };
        assert_eq!(
            PlanStage::Pass {
                name: "counting".to_string()
            },
            stage
        );
        assert_eq!(1, calls.get());
    }

    #[test]
    fn stage_serializes_with_tag() {
        let json = serde_json::to_string(&PlanStage::Pass {
            name: "p".to_string(),
        })
        .unwrap();
        assert_eq!(r#"{"stage":"pass","name":"p"}"#, json);
    }
}
