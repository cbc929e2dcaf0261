//! Diagnostics sink shared by every pipeline stage.
//!
//! The core never prints.  Non‑fatal findings (unknown characters, overlong
//! argument lists) are pushed into a [`Reporter`] as they occur; fatal ones
//! come back as `Err` and the caller decides whether to report them too.

use std::fmt;

use serde::Serialize;

use crate::error::SprigError;
use crate::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Option<Position>,
}

impl Diagnostic {
    pub fn warning<S: Into<String>>(position: Position, message: S) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn error<S: Into<String>>(position: Option<Position>, message: S) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            position,
        }
    }
}

impl From<&SprigError> for Diagnostic {
    fn from(err: &SprigError) -> Self {
        Diagnostic::error(err.position(), err.message())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "[line {}] {}: {}", pos, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Anything that accepts diagnostics.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Keeps every diagnostic in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.message.as_str()).collect()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
