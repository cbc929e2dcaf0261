//! Drives one source unit through the whole pipeline.
//!
//! A [`Session`] owns a single interpreter, so every unit it runs shares the
//! same global environment.  That is what gives the REPL its memory.

use std::io::Write;

use log::{debug, info};

use crate::diagnostics::{Diagnostic, Reporter};
use crate::interpreter::Interpreter;
use crate::parser::{self, Parser};
use crate::resolver;
use crate::scanner;

/// How far a unit got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every statement ran.
    Ok,
    /// Scan, parse or resolve failed; nothing was executed.
    StaticError,
    /// Execution stopped part way through.
    RuntimeError,
}

pub struct Session {
    interpreter: Interpreter,
    recover: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
            recover: false,
        }
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_output(output),
            recover: false,
        }
    }

    /// Keep parsing after a syntax error so every one of them is reported.
    /// The unit is still not executed.
    pub fn recovering(mut self) -> Self {
        self.recover = true;
        self
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Scan, parse, resolve and execute `source`.  Every problem found is
    /// sent to `reporter`.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> Outcome {
        info!("Running unit of {} bytes", source.len());

        let tokens = match scanner::scan(source, reporter) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!("Scan failed: {}", e);
                reporter.report(Diagnostic::from(&e));
                return Outcome::StaticError;
            }
        };

        let statements = if self.recover {
            let mut parser = Parser::new(&tokens);
            let result = parser.parse_with_recovery();

            for warning in parser.take_warnings() {
                reporter.report(warning);
            }

            match result {
                Ok(statements) => statements,
                Err(errors) => {
                    debug!("Parse failed with {} error(s)", errors.len());
                    for e in &errors {
                        reporter.report(Diagnostic::from(e));
                    }
                    return Outcome::StaticError;
                }
            }
        } else {
            match parser::parse(&tokens, reporter) {
                Ok(statements) => statements,
                Err(e) => {
                    debug!("Parse failed: {}", e);
                    reporter.report(Diagnostic::from(&e));
                    return Outcome::StaticError;
                }
            }
        };

        let locals = match resolver::resolve(&statements) {
            Ok(locals) => locals,
            Err(e) => {
                debug!("Resolve failed: {}", e);
                reporter.report(Diagnostic::from(&e));
                return Outcome::StaticError;
            }
        };

        match self.interpreter.interpret(&statements, locals) {
            Ok(()) => Outcome::Ok,
            Err(e) => {
                debug!("Runtime failure: {}", e);
                reporter.report(Diagnostic::from(&e));
                Outcome::RuntimeError
            }
        }
    }
}
