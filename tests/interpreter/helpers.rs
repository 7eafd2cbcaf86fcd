use jlox::{run, Session};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

struct Sink(Rc<RefCell<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Execute the provided Lox source code, returning what it printed to
/// stdout. Compile and runtime errors are discarded; use
/// [`execute_with_flags`] when a test needs to assert on them.
pub fn execute(source: &str) -> String {
    execute_with_flags(source).0
}

/// Like [`execute`], but also returns `(had_compile_error,
/// had_runtime_error)` so tests can assert on failure without parsing
/// stderr text.
pub fn execute_with_flags(source: &str) -> (String, bool, bool) {
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let session = Session::new(Vec::new());
    run(source, Sink(Rc::clone(&buffer)), &session);
    let output = String::from_utf8(buffer.borrow().clone()).unwrap();
    (output, session.had_error(), session.had_runtime_error())
}
