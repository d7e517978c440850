//! Logical plan trees.
//!
//! A plan is a tree of scalar expressions ([`Rex`]) and relational operators
//! ([`Rel`]). The root of a query plan is always a scalar expression, usually
//! a `Select` wrapping the relational part.

pub mod rel;
pub mod rex;

pub use rel::{AggCall, Binding, Rel, RelOp, SortOrder, SortSpec};
pub use rex::{Call, Rex, RexCaseBranch, RexOp, RexStructField, SubqueryCoercion, VarRef};

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub root: Rex,
}
