//! Abstract syntax tree consumed by the planner.
//!
//! Producing this tree from query text is the job of a parser living outside
//! of this workspace. The [`builder`] module offers constructors for building
//! trees directly.

pub mod builder;
pub mod expr;
pub mod identifier;
pub mod location;
pub mod query;
pub mod statement;

pub use expr::*;
pub use identifier::*;
pub use location::*;
pub use query::*;
pub use statement::*;
