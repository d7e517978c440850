//! Problems reported against the user's query.
//!
//! Problems are collected rather than returned as errors so that a single
//! pass can report everything it finds. The pipeline decides whether to keep
//! going based on the severities collected after each stage.

use std::fmt;

use partiql_ast::SourceLocation;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemSeverity {
    Error,
    Warning,
}

impl fmt::Display for ProblemSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ProblemDetails {
    /// Passed through from the parser.
    ParseError { message: String },
    /// Semantic error that doesn't fit any other category.
    CompileError { message: String },
    UndefinedVariable {
        name: String,
        case_sensitive: bool,
        /// Closest known binding, if any.
        suggestion: Option<String>,
    },
    VariablePreviouslyDefined { name: String },
    /// The planner doesn't support this yet.
    UnimplementedFeature { feature: String },
    /// The planner deliberately rejects this.
    DisallowedFeature { feature: String },
    InvalidDmlTarget { target: String },
    InvalidUseOfMutationClause { clause: String, operation: String },
    DdlUnsupported { operation: String },
    /// No overload of a function or operator accepts the argument types.
    UnknownFunction {
        identifier: String,
        args: Vec<String>,
        candidates: Vec<String>,
    },
    ExpressionAlwaysReturnsMissing { reason: String },
}

impl ProblemDetails {
    pub fn message(&self) -> String {
        match self {
            Self::ParseError { message } => format!("Parse error: {message}"),
            Self::CompileError { message } => message.clone(),
            Self::UndefinedVariable {
                name,
                case_sensitive,
                suggestion,
            } => {
                let mut msg = format!("Variable {name} does not exist");
                if *case_sensitive {
                    msg.push_str(
                        ". Hint: did you intend to use single-quotes (') here? \
                         Remember that double-quotes (\") denote quoted identifiers \
                         and single-quotes denote strings",
                    );
                }
                if let Some(suggestion) = suggestion {
                    msg.push_str(&format!(". Did you mean '{suggestion}'?"));
                }
                msg
            }
            Self::VariablePreviouslyDefined { name } => {
                format!("The variable '{name}' was previously defined")
            }
            Self::UnimplementedFeature { feature } => {
                format!("The following feature is not implemented yet: {feature}")
            }
            Self::DisallowedFeature { feature } => {
                format!("The following feature is not allowed: {feature}")
            }
            Self::InvalidDmlTarget { target } => {
                format!("Expression '{target}' is not a valid DML target")
            }
            Self::InvalidUseOfMutationClause { clause, operation } => {
                format!("Invalid use of {clause} with {operation}")
            }
            Self::DdlUnsupported { operation } => {
                format!("DDL operations are not supported: {operation}")
            }
            Self::UnknownFunction {
                identifier,
                args,
                candidates,
            } => {
                let mut msg = format!("No function matches {identifier}({})", args.join(", "));
                if !candidates.is_empty() {
                    msg.push_str(&format!(". Candidates: {}", candidates.join("; ")));
                }
                msg
            }
            Self::ExpressionAlwaysReturnsMissing { reason } => {
                format!("Expression always returns MISSING: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub location: SourceLocation,
    pub details: ProblemDetails,
    pub severity: ProblemSeverity,
}

impl Problem {
    pub fn error(location: SourceLocation, details: ProblemDetails) -> Self {
        Problem {
            location,
            details,
            severity: ProblemSeverity::Error,
        }
    }

    pub fn warning(location: SourceLocation, details: ProblemDetails) -> Self {
        Problem {
            location,
            details,
            severity: ProblemSeverity::Warning,
        }
    }

    /// Wrap a parser failure so it can be returned through the same channel.
    pub fn parse_error(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::error(
            location,
            ProblemDetails::ParseError {
                message: message.into(),
            },
        )
    }

    pub fn is_error(&self) -> bool {
        self.severity == ProblemSeverity::Error
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.location.is_unknown() {
            write!(f, "{}: ", self.location)?;
        }
        write!(f, "{}: {}", self.severity, self.details.message())
    }
}

/// Accumulates problems for a single planning invocation.
#[derive(Debug, Default)]
pub struct ProblemCollector {
    problems: Vec<Problem>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, problem: Problem) {
        debug!(severity = %problem.severity, problem = %problem, "problem reported");
        self.problems.push(problem);
    }

    pub fn error(&mut self, location: SourceLocation, details: ProblemDetails) {
        self.report(Problem::error(location, details))
    }

    pub fn warning(&mut self, location: SourceLocation, details: ProblemDetails) {
        self.report(Problem::warning(location, details))
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.problems.iter().filter(|p| p.is_error()).count()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Take all problems collected so far, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Problem> {
        std::mem::take(&mut self.problems)
    }
}
