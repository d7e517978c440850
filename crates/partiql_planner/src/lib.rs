pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod explain;
pub mod functions;
pub mod optimizer;
pub mod physical;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod typer;
pub mod types;
pub mod value;

pub use pipeline::{PlanStage, Planner, PlannerBuilder, PlannerOutput, PlannerPass};
