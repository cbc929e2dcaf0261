//! Centralised error hierarchy for the **Sprig interpreter**.
//!
//! All stages (scanner, parser, resolver, runtime) convert their internal
//! failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate, while the binary wraps
//! I/O and setup failures with `anyhow`.
//!
//! The module **does not** print diagnostics itself; see
//! [`crate::diagnostics`] for the reporting sink.
//!
//! Control transfer for `return` is deliberately *not* modelled here: it
//! travels through [`crate::interpreter::Flow`] instead.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Position;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SprigError {
    /// Fatal lexical error (unterminated string, malformed number).
    #[error("[line {line}:{column}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,

        /// 1‑based column of the offending lexeme.
        column: usize,
    },

    /// A byte the scanner does not recognise.  Non‑fatal: the scanner skips
    /// it and keeps going.
    #[error("[line {line}:{column}] Error: Unexpected character: {character}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}:{column}] Error: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}:{column}] Error: {message}")]
    Resolve {
        message: String,
        line: usize,
        column: usize,
    },

    /// Runtime evaluation error.
    #[error("[line {line}:{column}] Runtime error: {message}")]
    Runtime {
        message: String,
        line: usize,
        column: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl SprigError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(position: Position, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: {}, msg={}", position, message);

        SprigError::Lex {
            message,
            line: position.line,
            column: position.column,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(position: Position, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: {}, msg={}", position, message);

        SprigError::Parse {
            message,
            line: position.line,
            column: position.column,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(position: Position, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: {}, msg={}", position, message);

        SprigError::Resolve {
            message,
            line: position.line,
            column: position.column,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(position: Position, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: {}, msg={}", position, message);

        SprigError::Runtime {
            message,
            line: position.line,
            column: position.column,
        }
    }

    /// Source position of the error, when it has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            SprigError::Lex { line, column, .. }
            | SprigError::UnexpectedCharacter { line, column, .. }
            | SprigError::Parse { line, column, .. }
            | SprigError::Resolve { line, column, .. }
            | SprigError::Runtime { line, column, .. } => Some(Position::new(*line, *column)),
            SprigError::Io(_) | SprigError::Utf8(_) => None,
        }
    }

    /// Message without the position prefix.
    pub fn message(&self) -> String {
        match self {
            SprigError::Lex { message, .. }
            | SprigError::Parse { message, .. }
            | SprigError::Resolve { message, .. }
            | SprigError::Runtime { message, .. } => message.clone(),
            SprigError::UnexpectedCharacter { character, .. } => {
                format!("Unexpected character: {}", character)
            }
            SprigError::Io(e) => e.to_string(),
            SprigError::Utf8(e) => e.to_string(),
        }
    }

    /// Only unknown characters let a phase carry on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SprigError::UnexpectedCharacter { .. })
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, SprigError::Runtime { .. })
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, SprigError>;
