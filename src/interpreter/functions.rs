//! User-defined functions and methods. Grounded on
//! `other_examples/b22f216f_alyrajwani-lox-ast__src-lox_function.rs.rs`:
//! a function is its declaration plus the environment it closed over, and
//! `bind` produces a fresh function whose closure adds one frame defining
//! `this`.

use super::environment::Environment;
use super::value::{Callable, Value};
use super::{Interpreter, RuntimeError, Signal};
use crate::parser::ast::FunctionDecl;
use std::fmt;
use std::rc::Rc;

pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Environment, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Returns a new function whose closure is one frame deeper, with
    /// `this` bound to `instance` in that frame — the mechanism by which
    /// `object.method` yields a callable that already knows its receiver.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        let environment = Environment::with_enclosing(&self.closure);
        environment.define("this", instance);
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = Environment::with_enclosing(&self.closure);
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let signal = interpreter.execute_block(&self.declaration.body, environment)?;

        if self.is_initializer {
            return Ok(self
                .closure
                .get_at(0, "this")
                .expect("an initializer's closure always binds this"));
        }

        match signal {
            Signal::Return(value) => Ok(value),
            Signal::None => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}
