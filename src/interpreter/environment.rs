//! Lexical environments as a linked chain of frames. Each frame is shared
//! through an `Rc<RefCell<_>>` so a closure can keep its defining frame
//! alive after the call that created it returns — a flat scope stack
//! cannot support that, hence the departure from the teacher's original
//! `interpreter/environment.rs`.

use super::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
struct EnvironmentInner {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// A cheap-to-clone handle onto one lexical frame.
#[derive(Debug, Clone)]
pub struct Environment(Rc<RefCell<EnvironmentInner>>);

impl Environment {
    pub fn global() -> Self {
        Self(Rc::new(RefCell::new(EnvironmentInner {
            values: HashMap::new(),
            enclosing: None,
        })))
    }

    pub fn with_enclosing(enclosing: &Environment) -> Self {
        Self(Rc::new(RefCell::new(EnvironmentInner {
            values: HashMap::new(),
            enclosing: Some(enclosing.clone()),
        })))
    }

    /// Binds `name` in this frame, shadowing any binding of the same name
    /// in an enclosing frame. Re-declaring an existing local is allowed,
    /// matching `var`'s redeclaration rule at global scope.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    /// Looks a name up starting in this frame and walking outward. Used
    /// only for names the resolver left unresolved (globals, including
    /// forward references resolved dynamically).
    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.0.borrow();
        if let Some(value) = inner.values.get(name) {
            return Some(value.clone());
        }
        inner.enclosing.as_ref().and_then(|e| e.get(name))
    }

    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.values.contains_key(name) {
            inner.values.insert(name.to_string(), value);
            return true;
        }
        match &inner.enclosing {
            Some(enclosing) => enclosing.assign(name, value),
            None => false,
        }
    }

    /// Looks up `name` exactly `depth` frames out, as computed by the
    /// resolver's side-table.
    pub fn get_at(&self, depth: usize, name: &str) -> Option<Value> {
        self.ancestor(depth).0.borrow().values.get(name).cloned()
    }

    pub fn assign_at(&self, depth: usize, name: &str, value: Value) {
        self.ancestor(depth)
            .0
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }

    fn ancestor(&self, depth: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..depth {
            let next = env
                .0
                .borrow()
                .enclosing
                .clone()
                .expect("resolver-computed depth must stay within the enclosing chain");
            env = next;
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_child_frame_can_read_and_shadow_its_parent() {
        let global = Environment::global();
        global.define("a", Value::Number(1.0));
        let child = Environment::with_enclosing(&global);
        assert_eq!(child.get("a"), Some(Value::Number(1.0)));
        child.define("a", Value::Number(2.0));
        assert_eq!(child.get("a"), Some(Value::Number(2.0)));
        assert_eq!(global.get("a"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_walks_out_to_the_frame_that_declared_the_name() {
        let global = Environment::global();
        global.define("a", Value::Number(1.0));
        let child = Environment::with_enclosing(&global);
        assert!(child.assign("a", Value::Number(9.0)));
        assert_eq!(global.get("a"), Some(Value::Number(9.0)));
    }

    #[test]
    fn assigning_an_undeclared_name_fails() {
        let global = Environment::global();
        assert!(!global.assign("missing", Value::Nil));
    }

    #[test]
    fn a_cloned_environment_shares_the_same_frame() {
        let global = Environment::global();
        let handle = global.clone();
        handle.define("a", Value::Number(1.0));
        assert_eq!(global.get("a"), Some(Value::Number(1.0)));
    }
}
