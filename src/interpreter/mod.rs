//! Tree-walking evaluator. Structured like the teacher's `tree_walker.rs`:
//! one `Interpreter` owning the global environment and an output sink,
//! walking the `Stmt`/`Expr` enums with a `match` per node kind. New here
//! (absent from the teacher): the resolver's side-table, and the
//! `Expr::Call`/`Get`/`Set`/`This`/`Super` arms needed for functions and
//! classes, grounded on the `other_examples` `LoxFunction`/`LoxClass`
//! pair cited in `classes.rs`/`functions.rs`.

pub mod classes;
pub mod environment;
pub mod functions;
pub mod value;

use crate::parser::ast::{Expr, ExprId, ExprKind, LiteralValue, Stmt};
use crate::resolver::ResolvedLocals;
use crate::scanner::{Token, TokenKind};
use crate::session::Session;
use classes::{LoxClass, LoxInstance};
use environment::Environment;
use functions::LoxFunction;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use value::{Callable, Value};

/// A runtime error raised by the evaluator. Carries the faulting line so
/// the session can report it the same way a `thiserror` variant would,
/// without pulling `Token` (and its lifetime) through every call site.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

impl RuntimeError {
    fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: token.line,
        }
    }
}

/// What executing a statement produced, besides its side effects: either
/// nothing notable, or a `return` unwinding toward the nearest call
/// boundary. Kept as an explicit value instead of threading an exception
/// type through `execute`, per the evaluator's control-flow contract.
#[derive(Debug, Clone)]
pub enum Signal {
    None,
    Return(Value),
}

pub struct Interpreter<'sess> {
    globals: Environment,
    environment: Environment,
    locals: ResolvedLocals,
    output: Box<dyn Write>,
    session: &'sess Session,
}

struct NativeClock;

impl Callable for NativeClock {
    fn arity(&self) -> usize {
        0
    }

    fn call(&self, _interpreter: &mut Interpreter<'_>, _arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as f64;
        Ok(Value::Number(millis))
    }
}

impl fmt::Display for NativeClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl<'sess> Interpreter<'sess> {
    pub fn new<W: Write + 'static>(output: W, locals: ResolvedLocals, session: &'sess Session) -> Self {
        let globals = Environment::global();
        globals.define("clock", Value::Callable(Rc::new(NativeClock)));
        Self {
            environment: globals.clone(),
            globals,
            locals,
            output: Box::new(output),
            session,
        }
    }

    /// Folds in another batch of resolver output. Used by the REPL, which
    /// resolves and interprets one line at a time but keeps a single
    /// `Interpreter` (and its globals) alive across the whole session.
    pub fn merge_locals(&mut self, locals: ResolvedLocals) {
        self.locals.extend(locals);
    }

    /// Runs a fully resolved program. Stops at the first `RuntimeError`
    /// and reports it through the session, matching the spec's "a runtime
    /// error terminates the current top-level statement stream" rule.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            if let Err(err) = self.execute(statement) {
                self.session.runtime_error(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    // ---- statements ------------------------------------------------

    fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::Block(statements) => {
                let block_env = Environment::with_enclosing(&self.environment);
                self.execute_block(statements, block_env)
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                log::debug!("defining class '{}' with {} methods", name.lexeme, methods.len());
                self.execute_class(name, superclass.as_ref(), methods)
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::None)
            }
            Stmt::Function(decl) => {
                log::debug!("defining function '{}'", decl.name.lexeme);
                let function = LoxFunction::new(Rc::clone(decl), self.environment.clone(), false);
                self.environment
                    .define(&decl.name.lexeme, Value::Callable(Rc::new(function)));
                Ok(Signal::None)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::None)
                }
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.output, "{value}");
                Ok(Signal::None)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Signal::None)
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::None => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::None)
            }
        }
    }

    /// Runs `statements` in `block_env`, restoring the caller's environment
    /// on every exit path — the early `?` returns included, since `self`
    /// is set back before they propagate.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        block_env: Environment,
    ) -> Result<Signal, RuntimeError> {
        log::trace!("entering block of {} statements", statements.len());
        let previous = std::mem::replace(&mut self.environment, block_env);
        let result = (|| {
            for statement in statements {
                match self.execute(statement)? {
                    Signal::None => {}
                    signal @ Signal::Return(_) => return Ok(signal),
                }
            }
            Ok(Signal::None)
        })();
        self.environment = previous;
        log::trace!("left block");
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: Option<&Expr>,
        methods: &[Rc<crate::parser::ast::FunctionDecl>],
    ) -> Result<Signal, RuntimeError> {
        let superclass = match superclass_expr {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        let token = superclass_name_token(expr);
                        return Err(RuntimeError::new(token, "Superclass must be a class."));
                    }
                }
            }
            None => None,
        };

        self.environment.define(&name.lexeme, Value::Nil);

        let method_env = if let Some(superclass) = &superclass {
            let env = Environment::with_enclosing(&self.environment);
            env.define("super", Value::Class(Rc::clone(superclass)));
            env
        } else {
            self.environment.clone()
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function = LoxFunction::new(Rc::clone(method), method_env.clone(), is_initializer);
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass, method_table);
        self.environment.assign(&name.lexeme, Value::Class(Rc::new(class)));
        Ok(Signal::None)
    }

    // ---- expressions -------------------------------------------------

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(expr.id, name, value.clone())?;
                Ok(value)
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),
            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => instance
                        .borrow()
                        .get(&name.lexeme, Value::Instance(Rc::clone(&instance)))
                        .ok_or_else(|| {
                            RuntimeError::new(name, format!("Undefined property '{}'.", name.lexeme))
                        }),
                    _ => Err(RuntimeError::new(name, "Only instances have properties.")),
                }
            }
            ExprKind::Grouping { inner } => self.evaluate(inner),
            ExprKind::Literal(value) => Ok(literal_value(value)),
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                if operator.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(&name.lexeme, value.clone());
                        Ok(value)
                    }
                    _ => Err(RuntimeError::new(name, "Only instances have fields.")),
                }
            }
            ExprKind::Super { keyword, method } => self.evaluate_super(expr.id, keyword, method),
            ExprKind::This { keyword } => self.lookup_variable(expr.id, keyword),
            ExprKind::Unary { operator, right } => self.evaluate_unary(operator, right),
            ExprKind::Variable { name } => self.lookup_variable(expr.id, name),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Minus => Ok(Value::Number(number(operator, &left)? - number(operator, &right)?)),
            TokenKind::Slash => Ok(Value::Number(number(operator, &left)? / number(operator, &right)?)),
            TokenKind::Star => Ok(Value::Number(number(operator, &left)? * number(operator, &right)?)),
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenKind::Greater => Ok(Value::Bool(number(operator, &left)? > number(operator, &right)?)),
            TokenKind::GreaterEqual => Ok(Value::Bool(number(operator, &left)? >= number(operator, &right)?)),
            TokenKind::Less => Ok(Value::Bool(number(operator, &left)? < number(operator, &right)?)),
            TokenKind::LessEqual => Ok(Value::Bool(number(operator, &left)? <= number(operator, &right)?)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            _ => unreachable!("parser only produces binary operators from this set"),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Minus => Ok(Value::Number(-number(operator, &right)?)),
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only produces unary operators from this set"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, RuntimeError> {
        let callee_value = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match callee_value {
            Value::Callable(callable) => {
                check_arity(paren, callable.arity(), args.len())?;
                callable.call(self, args)
            }
            Value::Class(class) => {
                check_arity(paren, class.arity(), args.len())?;
                let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&class))));
                if let Some(initializer) = class.find_method("init") {
                    let bound = initializer.bind(Value::Instance(Rc::clone(&instance)));
                    bound.call(self, args)?;
                }
                Ok(Value::Instance(instance))
            }
            _ => Err(RuntimeError::new(paren, "Can only call functions and classes.")),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let depth = *self
            .locals
            .get(&id)
            .expect("resolver always records a depth for 'super'");
        let superclass = match self.environment.get_at(depth, "super") {
            Some(Value::Class(class)) => class,
            _ => unreachable!("resolver only admits 'super' inside a class with a superclass"),
        };
        let this = self
            .environment
            .get_at(depth - 1, "this")
            .expect("'this' is always one frame closer than 'super'");
        superclass
            .find_method(&method.lexeme)
            .map(|m| Value::Callable(Rc::new(m.bind(this))))
            .ok_or_else(|| RuntimeError::new(method, format!("Undefined property '{}'.", method.lexeme)))
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&depth) => Ok(self
                .environment
                .get_at(depth, &name.lexeme)
                .expect("resolver-recorded depth must point at a defined binding")),
            None => self
                .globals
                .get(&name.lexeme)
                .ok_or_else(|| RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))),
        }
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<(), RuntimeError> {
        match self.locals.get(&id) {
            Some(&depth) => {
                self.environment.assign_at(depth, &name.lexeme, value);
                Ok(())
            }
            None => {
                if self.globals.assign(&name.lexeme, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme)))
                }
            }
        }
    }
}

fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Nil => Value::Nil,
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::string(s.clone()),
    }
}

fn number(operator: &Token, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
    }
}

fn check_arity(paren: &Token, expected: usize, got: usize) -> Result<(), RuntimeError> {
    if expected != got {
        Err(RuntimeError::new(
            paren,
            format!("Expected {expected} arguments but got {got}."),
        ))
    } else {
        Ok(())
    }
}

fn superclass_name_token(expr: &Expr) -> &Token {
    match &expr.kind {
        ExprKind::Variable { name } => name,
        _ => unreachable!("the parser only ever parses a superclass as a bare Variable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> (String, bool, bool) {
        let session = Session::new(Vec::new());
        let tokens = Scanner::new(source, &session).scan_tokens();
        let statements = Parser::new(tokens, &session).parse();
        let locals = Resolver::new(&session).resolve(&statements);
        let output: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        struct Sink(Rc<RefCell<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut interpreter = Interpreter::new(Sink(Rc::clone(&output)), locals, &session);
        let had_runtime_error = interpreter.interpret(&statements).is_err();
        let text = String::from_utf8(output.borrow().clone()).unwrap();
        (text, session.had_error(), had_runtime_error)
    }

    #[test]
    fn arithmetic_and_print() {
        let (out, _, _) = run("print 1 + 2 * 3;");
        assert_eq!(out, "7\n");
    }

    #[test]
    fn string_concatenation() {
        let (out, _, _) = run(r#"print "a" + "b";"#);
        assert_eq!(out, "ab\n");
    }

    #[test]
    fn adding_a_number_to_a_string_is_a_runtime_error() {
        let (_, _, had_runtime_error) = run(r#"print 1 + "x";"#);
        assert!(had_runtime_error);
    }

    #[test]
    fn closures_capture_their_defining_frame() {
        let (out, _, _) = run(
            "fun makeCounter() { var i = 0; fun counter() { i = i + 1; print i; } return counter; } \
             var c = makeCounter(); c(); c();",
        );
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn classes_support_init_fields_and_methods() {
        let (out, _, _) = run(
            "class Cake { init(flavor) { this.flavor = flavor; } describe() { print this.flavor; } } \
             var c = Cake(\"chocolate\"); c.describe();",
        );
        assert_eq!(out, "chocolate\n");
    }

    #[test]
    fn inheritance_resolves_super_methods() {
        let (out, _, _) = run(
            "class A { greet() { print \"hi from A\"; } } \
             class B < A { greet() { super.greet(); print \"hi from B\"; } } \
             B().greet();",
        );
        assert_eq!(out, "hi from A\nhi from B\n");
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let (_, _, had_runtime_error) = run("var x = 1; x();");
        assert!(had_runtime_error);
    }
}
