//! Error type shared by all planner crates.
//!
//! A `PartiqlError` represents a failure of the planner itself (a broken
//! invariant, a malformed catalog, a feature gap hit through an internal code
//! path). Problems with the user's query are never reported through this type,
//! they're collected as diagnostics instead.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = PartiqlError> = std::result::Result<T, E>;

/// Return a "not implemented" error from the current function.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {{
        let msg = std::format!($($arg)+);
        return Err($crate::PartiqlError::new(std::format!("Not yet implemented: {msg}")));
    }};
}

#[derive(Debug)]
pub struct PartiqlError {
    inner: Box<PartiqlErrorInner>,
}

#[derive(Debug)]
struct PartiqlErrorInner {
    /// Message for the error.
    msg: String,
    /// Source of the error.
    source: Option<Box<dyn Error + Send + Sync>>,
    /// Additional key/value pairs describing the error.
    fields: Vec<(String, String)>,
    /// Captured backtrace.
    ///
    /// Only captured if RUST_BACKTRACE is set.
    backtrace: Backtrace,
}

impl PartiqlError {
    pub fn new(msg: impl Into<String>) -> Self {
        PartiqlError {
            inner: Box::new(PartiqlErrorInner {
                msg: msg.into(),
                source: None,
                fields: Vec::new(),
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach an additional field to the error.
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    pub fn get_fields(&self) -> &[(String, String)] {
        &self.inner.fields
    }

    pub fn get_backtrace(&self) -> Option<&Backtrace> {
        match self.inner.backtrace.status() {
            BacktraceStatus::Captured => Some(&self.inner.backtrace),
            _ => None,
        }
    }
}

impl fmt::Display for PartiqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        if let Some(backtrace) = self.get_backtrace() {
            write!(f, "\nBacktrace: {backtrace}")?;
        }
        Ok(())
    }
}

impl Error for PartiqlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<fmt::Error> for PartiqlError {
    fn from(value: fmt::Error) -> Self {
        PartiqlError::with_source("Format error", Box::new(value))
    }
}

/// Extension for attaching context to errors in results.
pub trait ResultExt<T, E> {
    /// Wrap the error with a message.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap the error with a lazily produced message.
    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(PartiqlError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(PartiqlError::with_source(f(), Box::new(e))),
        }
    }
}

/// Extension for turning `None` into an error.
pub trait OptionExt<T> {
    /// Return an error indicating the value is required.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(PartiqlError::new(format!("Missing required value: {msg}"))),
        }
    }
}
