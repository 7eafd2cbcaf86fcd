use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Resolver, ResolvedLocals};
use crate::scanner::Scanner;
use crate::session::Session;
use std::io::{stdout, Write};

/// Read-print-evaluation loop.
///
/// One `Session` and one `Interpreter` live for the whole loop, so
/// variables, functions and classes declared on one line stay visible to
/// later lines — only the session's error flags are reset between lines.
/// Expression ids keep counting up across lines (via
/// `Parser::starting_at`) instead of restarting at zero, since the
/// interpreter's side-table accumulates rather than being discarded per
/// line.
pub fn repl() -> Result<(), std::io::Error> {
    log::info!("starting REPL");
    let session = Session::stderr();
    let mut interpreter = Interpreter::new(stdout(), ResolvedLocals::new(), &session);
    let mut next_id = 0;

    loop {
        print!("> ");
        stdout().flush()?;
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break Ok(());
        }
        let input = input.trim();
        if input.is_empty() {
            break Ok(());
        }

        session.reset();
        let tokens = Scanner::new(input, &session).scan_tokens();
        let mut parser = Parser::starting_at(tokens, &session, next_id);
        let statements = parser.parse();
        next_id = parser.next_id();
        if session.had_error() {
            continue;
        }

        let locals = Resolver::new(&session).resolve(&statements);
        if session.had_error() {
            continue;
        }

        interpreter.merge_locals(locals);
        let _ = interpreter.interpret(&statements);
    }
}
