//! Classes and instances. Grounded on the same corpus as `functions.rs`
//! (the `lox_class` / `lox_instance` siblings of
//! `b22f216f_alyrajwani-lox-ast__src-lox_function.rs.rs`): a class is a
//! name, an optional superclass, and a method table; an instance is a
//! class pointer plus its own field map, with fields shadowing methods.

use super::functions::LoxFunction;
use super::value::{Callable, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Looks a method up on this class, then its superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods
            .get(name)
            .cloned()
            .or_else(|| self.superclass.as_ref().and_then(|s| s.find_method(name)))
    }

    /// A class's arity is its initializer's, or zero if it has none —
    /// used by `Interpreter::call` before constructing an instance.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// Fields shadow methods: checked first, falling back to a bound
    /// method from the instance's class.
    pub fn get(&self, name: &str, this: Value) -> Option<Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value.clone());
        }
        self.class
            .find_method(name)
            .map(|method| Value::Callable(Rc::new(method.bind(this))))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}
