//! The one piece of mutable state shared by every phase: a sink for
//! diagnostics plus the two sticky flags the driver consults to pick an
//! exit code. Threaded by reference into the scanner, parser, resolver
//! and interpreter instead of living behind statics.

use std::cell::{Cell, RefCell};
use std::io::Write;

/// Reports compile-time and runtime errors and remembers whether any were
/// seen. A `Session` is built once per `run` (file or REPL line) and
/// discarded afterwards; the REPL resets its flags between lines by
/// constructing a fresh one.
pub struct Session {
    had_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
    output: RefCell<Box<dyn Write>>,
}

impl Session {
    pub fn new<W: Write + 'static>(output: W) -> Self {
        Self {
            had_error: Cell::new(false),
            had_runtime_error: Cell::new(false),
            output: RefCell::new(Box::new(output)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// Report a scanner-level error: no token context, just a line number.
    pub fn error(&self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    /// Report a parser/resolver error anchored on a token.
    pub fn error_at(&self, token: &crate::scanner::Token, message: &str) {
        let location = if token.kind == crate::scanner::TokenKind::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.report_located(token.line, &location, message);
    }

    fn report(&self, line: u32, location: &str, message: &str) {
        self.report_located(line, location, message);
    }

    fn report_located(&self, line: u32, location: &str, message: &str) {
        let _ = writeln!(self.output.borrow_mut(), "[line {line}] Error{location}: {message}");
        self.had_error.set(true);
    }

    /// Report a runtime error raised by the evaluator.
    pub fn runtime_error(&self, error: &crate::interpreter::RuntimeError) {
        let _ = writeln!(self.output.borrow_mut(), "{}\n[line {}]", error.message, error.line);
        self.had_runtime_error.set(true);
    }

    pub fn reset(&self) {
        self.had_error.set(false);
        self.had_runtime_error.set(false);
    }
}
