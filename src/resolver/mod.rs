//! Static pre-pass over the parsed AST. For every `Variable`, `Assign`,
//! `This` and `Super` expression it computes the number of enclosing
//! scopes between the use and its binding and records it in a side-table
//! keyed by the expression's [`ExprId`] — the tree itself is never
//! rewritten, only annotated out-of-band, per the interpreter's lookup
//! contract (`Environment::get_at` / `assign_at`).

use crate::parser::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::scanner::Token;
use crate::session::Session;
use drop_bomb::DropBomb;
use std::collections::HashMap;

/// Lexical distance from a variable use to the scope that declares it.
/// Absence from the side-table means "resolve dynamically against the
/// global environment".
pub type ResolvedLocals = HashMap<ExprId, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'sess> {
    session: &'sess Session,
    scopes: Vec<HashMap<String, bool>>,
    locals: ResolvedLocals,
    current_function: FunctionKind,
    current_class: ClassKind,
}

/// Ensures every `begin_scope` is matched by an `end_scope`, the same
/// discipline the environment's own scope stack enforces with a drop bomb.
#[must_use = "a resolver scope must be closed with end_scope"]
struct ScopeGuard(DropBomb);

impl<'sess> Resolver<'sess> {
    pub fn new(session: &'sess Session) -> Self {
        Self {
            session,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> ResolvedLocals {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                let guard = self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope(guard);
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Function(decl) => {
                // Declared and defined immediately so the body can call it recursively.
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.session
                        .error_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionKind::Initializer {
                        self.session
                            .error_at(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = std::mem::replace(&mut self.current_class, ClassKind::Class);
        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let ExprKind::Variable { name: super_name } = &superclass_expr.kind {
                if super_name.lexeme == name.lexeme {
                    self.session
                        .error_at(super_name, "A class can't inherit from itself.");
                }
            }
            self.current_class = ClassKind::Subclass;
            self.resolve_expr(superclass_expr);
        }

        let super_guard = superclass.map(|_| {
            let guard = self.begin_scope();
            self.scopes
                .last_mut()
                .unwrap()
                .insert("super".to_string(), true);
            guard
        });

        let this_guard = self.begin_scope();
        self.scopes
            .last_mut()
            .unwrap()
            .insert("this".to_string(), true);

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope(this_guard);
        if let Some(guard) = super_guard {
            self.end_scope(guard);
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) {
        let enclosing_function = std::mem::replace(&mut self.current_function, kind);
        let guard = self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&decl.body);
        self.end_scope(guard);
        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, &name.lexeme);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            ExprKind::Get { object, .. } => self.resolve_expr(object),
            ExprKind::Grouping { inner } => self.resolve_expr(inner),
            ExprKind::Literal(_) => {}
            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassKind::None => self
                        .session
                        .error_at(keyword, "Can't use 'super' outside of a class."),
                    ClassKind::Class => self.session.error_at(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ),
                    ClassKind::Subclass => {}
                }
                self.resolve_local(expr.id, "super");
            }
            ExprKind::This { keyword } => {
                if self.current_class == ClassKind::None {
                    self.session
                        .error_at(keyword, "Can't use 'this' outside of a class.");
                }
                self.resolve_local(expr.id, "this");
            }
            ExprKind::Unary { right, .. } => self.resolve_expr(right),
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.session.error_at(
                            name,
                            "Can't read local variable in its own initializer.",
                        );
                    }
                }
                self.resolve_local(expr.id, &name.lexeme);
            }
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth_from_top, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.locals.insert(id, depth_from_top);
                return;
            }
        }
        // Not found in any scope: resolved dynamically against the globals.
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.session
                    .error_at(name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn begin_scope(&mut self) -> ScopeGuard {
        self.scopes.push(HashMap::new());
        log::trace!("resolver entered scope (depth {})", self.scopes.len());
        ScopeGuard(DropBomb::new("a resolver scope was never closed"))
    }

    fn end_scope(&mut self, mut guard: ScopeGuard) {
        guard.0.defuse();
        self.scopes.pop();
        log::trace!("resolver left scope (depth {})", self.scopes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (ResolvedLocals, bool) {
        let session = Session::new(Vec::new());
        let tokens = Scanner::new(source, &session).scan_tokens();
        let statements = Parser::new(tokens, &session).parse();
        let locals = Resolver::new(&session).resolve(&statements);
        (locals, session.had_error())
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        let (_, had_error) = resolve("{ var a = a; }");
        assert!(had_error);
    }

    #[test]
    fn redeclaring_a_local_in_the_same_scope_is_an_error() {
        let (_, had_error) = resolve("{ var a = 1; var a = 2; }");
        assert!(had_error);
    }

    #[test]
    fn redeclaring_a_global_is_allowed() {
        let (_, had_error) = resolve("var a = 1; var a = 2;");
        assert!(!had_error);
    }

    #[test]
    fn return_outside_a_function_is_an_error() {
        let (_, had_error) = resolve("return 1;");
        assert!(had_error);
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        let (_, had_error) = resolve("print this;");
        assert!(had_error);
    }

    #[test]
    fn a_class_inheriting_from_itself_is_an_error() {
        let (_, had_error) = resolve("class Oops < Oops {}");
        assert!(had_error);
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let session = Session::new(Vec::new());
        let source = "fun outer() { var x = 1; fun inner() { return x; } return inner; }";
        let tokens = Scanner::new(source, &session).scan_tokens();
        let statements = Parser::new(tokens, &session).parse();
        let first = Resolver::new(&session).resolve(&statements);
        let second = Resolver::new(&session).resolve(&statements);
        assert_eq!(first, second);
    }
}
