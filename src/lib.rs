mod interpreter;
mod parser;
mod repl;
mod resolver;
mod scanner;
mod session;

pub use interpreter::{Interpreter, RuntimeError};
pub use repl::repl;
pub use session::Session;

use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;
use std::io::Write;

/// Scans, parses, resolves and interprets one unit of source, writing
/// printed output to `output`. Returns once the session's sticky flags
/// (`had_error` / `had_runtime_error`) reflect whatever went wrong, so the
/// caller (CLI or REPL) can pick an exit code without inspecting internals.
pub fn run<W: Write + 'static>(source: &str, output: W, session: &Session) {
    log::debug!("scanning {} bytes of source", source.len());
    let tokens = Scanner::new(source, session).scan_tokens();
    log::trace!("scanned {} tokens", tokens.len());

    let mut parser = Parser::new(tokens, session);
    let statements = parser.parse();
    log::debug!("parsed {} top-level statements", statements.len());

    if session.had_error() {
        return;
    }

    let locals = Resolver::new(session).resolve(&statements);
    log::debug!("resolver recorded {} local bindings", locals.len());

    if session.had_error() {
        return;
    }

    let _ = Interpreter::new(output, locals, session).interpret(&statements);
}
