//! Error kinds and the diagnostic sink (§4.5, §7 of the language reference).
//!
//! Three kinds of failure are distinguished: scanner errors (malformed
//! characters, unterminated strings — reported by line only), static errors
//! (parser/resolver violations — reported with an optional token), and
//! runtime errors (evaluation faults — always carry an optional token for
//! location). None of the three are Rust panics; control-flow signals
//! (`return`/`break`/`continue`) are modeled separately in
//! [`crate::interpreter::Signal`] and must never reach here.

use std::fmt;

use thiserror::Error;

use crate::token::{Token, TokenKind};

/// The error variant [`crate::Result`] carries out of the driver.
#[derive(Debug, Error)]
pub enum InterpretationError {
    /// The scan/parse/resolve pass reported at least one static error.
    #[error("static analysis failed")]
    StaticError,
    /// Evaluation raised an unhandled runtime error.
    #[error("runtime error")]
    RuntimeError,
}

/// A fault raised while evaluating a resolved program. Carries the token
/// nearest the fault, when one is available, so the sink can print a
/// location; some faults (e.g. division by zero deep inside a native call)
/// may not have one.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub token: Option<Token>,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Option<Token>, message: impl Into<String>) -> Self {
        RuntimeError {
            token,
            message: message.into(),
        }
    }

    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::new(Some(token.clone()), message)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// The error-reporting sink (§4.5): a capability the parser, resolver, and
/// interpreter invoke. Owns the two process-wide flags the driver consults
/// to pick an exit code; resetting them between REPL lines is the driver's
/// responsibility (see [`ErrorSink::reset`]).
#[derive(Debug, Default)]
pub struct ErrorSink {
    had_static_error: bool,
    had_runtime_error: bool,
}

impl ErrorSink {
    pub fn new() -> Self {
        ErrorSink::default()
    }

    pub fn had_static_error(&self) -> bool {
        self.had_static_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Reset both flags. Called by the driver at each REPL line boundary.
    pub fn reset(&mut self) {
        self.had_static_error = false;
        self.had_runtime_error = false;
    }

    /// A scanner fault: malformed character, unterminated string. Reported
    /// with the line only; the scan continues past it.
    pub fn scanner_error(&mut self, line: usize, message: &str) {
        self.had_static_error = true;
        eprintln!("[line {line}] Error: {message}");
    }

    /// A parser or resolver fault, anchored to a token when one is available.
    pub fn static_error(&mut self, token: Option<&Token>, message: &str) {
        self.had_static_error = true;
        self.report(token, message);
    }

    pub fn runtime_error(&mut self, err: &RuntimeError) {
        self.had_runtime_error = true;
        self.report(err.token.as_ref(), &err.message);
    }

    fn report(&mut self, token: Option<&Token>, message: &str) {
        match token {
            None => eprintln!("Error: {message}"),
            Some(tok) if tok.kind == TokenKind::Eos => {
                eprintln!("[line {}] Error at end: {message}", tok.line)
            }
            Some(tok) => eprintln!(
                "[line {}] Error at '{}': {message}",
                tok.line, tok.lexeme
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_start_clear_and_reset() {
        let mut sink = ErrorSink::new();
        assert!(!sink.had_static_error());
        sink.scanner_error(1, "bad char");
        assert!(sink.had_static_error());
        sink.reset();
        assert!(!sink.had_static_error());
        assert!(!sink.had_runtime_error());
    }

    #[test]
    fn runtime_error_sets_only_runtime_flag() {
        let mut sink = ErrorSink::new();
        let tok = Token::new(TokenKind::Minus, "-", crate::value::Value::Nil, 3);
        sink.runtime_error(&RuntimeError::at(&tok, "bad operand"));
        assert!(sink.had_runtime_error());
        assert!(!sink.had_static_error());
    }
}
