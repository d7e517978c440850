pub mod builtin;
pub mod catalog;
pub mod resolver;
pub mod signature;

pub use catalog::FunctionCatalog;
pub use resolver::{FnMatch, FnMatchCandidate, FnResolutionError, FnResolver};
pub use signature::{AggSignature, FunctionSignature, Signature};
