pub mod ast;

use crate::scanner::{Literal, Token, TokenKind};
use crate::session::Session;
use ast::{Expr, ExprId, ExprKind, FunctionDecl, LiteralValue, Stmt};
use std::rc::Rc;

/// Sentinel thrown internally to unwind out of the current declaration when
/// a production fails to match. Carries no data — the failure was already
/// reported through the [`Session`] by the time this is raised.
struct ParseError;

/// A recursive-descent, Pratt-style parser over a fixed token slice.
///
/// Precedence ladder, lowest to highest: `expression -> assignment -> or ->
/// and -> equality -> comparison -> term -> factor -> unary -> call ->
/// primary`.
pub struct Parser<'sess> {
    tokens: Vec<Token>,
    current: usize,
    next_expr_id: u32,
    session: &'sess Session,
}

impl<'sess> Parser<'sess> {
    pub fn new(tokens: Vec<Token>, session: &'sess Session) -> Self {
        Self::starting_at(tokens, session, 0)
    }

    /// Like [`Parser::new`], but the expression-id counter starts at
    /// `start_id` instead of zero. The REPL uses this to keep ids unique
    /// across lines, since its resolver side-table accumulates into one
    /// long-lived `Interpreter` instead of being discarded per line.
    pub fn starting_at(tokens: Vec<Token>, session: &'sess Session, start_id: u32) -> Self {
        Self {
            tokens,
            current: 0,
            next_expr_id: start_id,
            session,
        }
    }

    /// The first expression id not yet handed out. Feed this back into the
    /// next `Parser::starting_at` call to keep ids unique across a run of
    /// parsers sharing one side-table.
    pub fn next_id(&self) -> u32 {
        self.next_expr_id
    }

    /// Parse a full program. Declarations that fail to parse are skipped
    /// (after synchronizing); the caller should check `session.had_error()`
    /// before trusting the returned statements are complete.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    // ---- declarations ----------------------------------------------

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.matches(&[TokenKind::Class]) {
            self.class_declaration()
        } else if self.matches(&[TokenKind::Fun]) {
            self.function("function").map(|f| Stmt::Function(Rc::new(f)))
        } else if self.matches(&[TokenKind::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "Expect class name.")?;
        let superclass = if self.matches(&[TokenKind::Less]) {
            self.expect(TokenKind::Identifier, "Expect superclass name.")?;
            let name = self.previous().clone();
            Some(self.make_expr(ExprKind::Variable { name }))
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }
        self.expect(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// Parses a function or method declaration. `kind` ("function" /
    /// "method") is only used to phrase error messages.
    fn function(&mut self, kind: &str) -> Result<FunctionDecl, ParseError> {
        let name = self.expect(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.expect(
            TokenKind::LeftParen,
            &format!("Expect '(' after {kind} name."),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                params.push(self.expect(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.expect(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ---- statements --------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.matches(&[TokenKind::For]) {
            self.for_statement()
        } else if self.matches(&[TokenKind::If]) {
            self.if_statement()
        } else if self.matches(&[TokenKind::Print]) {
            self.print_statement()
        } else if self.matches(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.matches(&[TokenKind::While]) {
            self.while_statement()
        } else if self.matches(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    /// Desugars `for` entirely into a `while`, per the classic Lox parser.
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.check(TokenKind::Var) {
            self.advance();
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };
        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after loop condition.")?;
        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| self.make_expr(ExprKind::Literal(LiteralValue::Bool(true))));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, ParseError> {
        let value = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.expect(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ---------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    /// Right-associative. Parses the left side at `or` precedence, then
    /// reinterprets it as an assignment target if `=` follows: a `Variable`
    /// becomes `Assign`, a `Get` becomes `Set`. Any other shape is reported
    /// but does not abort parsing.
    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return match expr.kind {
                ExprKind::Variable { name } => {
                    Ok(self.make_expr(ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    }))
                }
                ExprKind::Get { object, name } => Ok(self.make_expr(ExprKind::Set {
                    object,
                    name,
                    value: Box::new(value),
                })),
                _ => {
                    self.session.error_at(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.matches(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_left_assoc(
            &[TokenKind::BangEqual, TokenKind::EqualEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_left_assoc(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_left_assoc(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.binary_left_assoc(&[TokenKind::Slash, TokenKind::Star], Self::unary)
    }

    fn binary_left_assoc(
        &mut self,
        operators: &[TokenKind],
        mut operand: impl FnMut(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut expr = operand(self)?;
        while self.matches(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.make_expr(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let name = self.expect(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = self.make_expr(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.error_at_current("Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.expect(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(self.make_expr(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.matches(&[TokenKind::False]) {
            return Ok(self.make_expr(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.matches(&[TokenKind::True]) {
            return Ok(self.make_expr(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.matches(&[TokenKind::Nil]) {
            return Ok(self.make_expr(ExprKind::Literal(LiteralValue::Nil)));
        }
        if self.matches(&[TokenKind::Number]) {
            let value = match &self.previous().literal {
                Literal::Num(n) => *n,
                _ => unreachable!("scanner guarantees Number tokens carry a numeric literal"),
            };
            return Ok(self.make_expr(ExprKind::Literal(LiteralValue::Number(value))));
        }
        if self.matches(&[TokenKind::String]) {
            let value = match &self.previous().literal {
                Literal::Str(s) => s.clone(),
                _ => unreachable!("scanner guarantees String tokens carry a string literal"),
            };
            return Ok(self.make_expr(ExprKind::Literal(LiteralValue::String(value))));
        }
        if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.expect(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self.expect(TokenKind::Identifier, "Expect superclass method name.")?;
            return Ok(self.make_expr(ExprKind::Super { keyword, method }));
        }
        if self.matches(&[TokenKind::This]) {
            let keyword = self.previous().clone();
            return Ok(self.make_expr(ExprKind::This { keyword }));
        }
        if self.matches(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            return Ok(self.make_expr(ExprKind::Variable { name }));
        }
        if self.matches(&[TokenKind::LeftParen]) {
            let inner = self.expression()?;
            self.expect(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.make_expr(ExprKind::Grouping {
                inner: Box::new(inner),
            }));
        }
        self.error_at_current("Expect expression.");
        Err(ParseError)
    }

    // ---- token-stream primitives ----------------------------------------

    fn make_expr(&mut self, kind: ExprKind) -> Expr {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;
        Expr { id, kind }
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        self.error_at_current(message);
        Err(ParseError)
    }

    fn error_at_current(&self, message: &str) {
        self.session.error_at(self.peek(), message);
    }

    /// Discard tokens until we're past a `;` or right before a token that
    /// starts a new statement, so the next `declaration()` call has a fresh
    /// chance at a well-formed production.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.tokens[self.current - 1].kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, bool) {
        let session = Session::new(Vec::new());
        let tokens = Scanner::new(source, &session).scan_tokens();
        let statements = Parser::new(tokens, &session).parse();
        (statements, session.had_error())
    }

    #[test]
    fn binary_operators_respect_precedence() {
        let (statements, had_error) = parse("12.65 + 2 * 3;");
        assert!(!had_error);
        match &statements[..] {
            [Stmt::Expression(Expr {
                kind: ExprKind::Binary { left, operator, right },
                ..
            })] => {
                assert!(matches!(left.kind, ExprKind::Literal(LiteralValue::Number(n)) if n == 12.65));
                assert_eq!(operator.kind, TokenKind::Plus);
                assert!(matches!(right.kind, ExprKind::Binary { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn parenthesized_groups_win_over_precedence() {
        let (statements, _) = parse("(12.65 + 2) * 3;");
        match &statements[..] {
            [Stmt::Expression(Expr {
                kind: ExprKind::Binary { left, operator, .. },
                ..
            })] => {
                assert!(matches!(left.kind, ExprKind::Grouping { .. }));
                assert_eq!(operator.kind, TokenKind::Star);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative_and_reinterprets_the_left_side() {
        let (statements, had_error) = parse("a = b = 3;");
        assert!(!had_error);
        match &statements[..] {
            [Stmt::Expression(Expr {
                kind: ExprKind::Assign { name, value },
                ..
            })] => {
                assert_eq!(name.lexeme, "a");
                assert!(matches!(value.kind, ExprKind::Assign { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn a_non_lvalue_on_the_left_of_equal_is_reported_but_parsing_continues() {
        let (statements, had_error) = parse("1 = 2; print 3;");
        assert!(had_error);
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn a_property_assignment_parses_as_set() {
        let (statements, _) = parse("a.b = 1;");
        match &statements[..] {
            [Stmt::Expression(Expr {
                kind: ExprKind::Set { name, .. },
                ..
            })] => assert_eq!(name.lexeme, "b"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn calls_and_property_access_chain_left_associatively() {
        let (statements, _) = parse("a.b().c;");
        match &statements[..] {
            [Stmt::Expression(Expr {
                kind: ExprKind::Get { object, name },
                ..
            })] => {
                assert_eq!(name.lexeme, "c");
                assert!(matches!(object.kind, ExprKind::Call { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn for_loops_desugar_into_a_block_wrapping_a_while() {
        let (statements, had_error) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!had_error);
        match &statements[..] {
            [Stmt::Block(inner)] => match &inner[..] {
                [Stmt::Var { .. }, Stmt::While { condition, body }] => {
                    assert!(matches!(condition.kind, ExprKind::Binary { .. }));
                    match body.as_ref() {
                        Stmt::Block(body_stmts) => assert_eq!(body_stmts.len(), 2),
                        other => panic!("expected the increment appended as a block: {other:?}"),
                    }
                }
                other => panic!("unexpected desugaring: {other:?}"),
            },
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn a_for_loop_with_no_condition_defaults_to_true() {
        let (statements, _) = parse("for (;;) print 1;");
        match &statements[..] {
            [Stmt::While { condition, .. }] => {
                assert!(matches!(condition.kind, ExprKind::Literal(LiteralValue::Bool(true))));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn class_declarations_capture_an_optional_superclass() {
        let (statements, had_error) = parse("class B < A { init() {} greet() {} }");
        assert!(!had_error);
        match &statements[..] {
            [Stmt::Class { name, superclass, methods }] => {
                assert_eq!(name.lexeme, "B");
                assert!(matches!(
                    superclass.as_ref().map(|e| &e.kind),
                    Some(ExprKind::Variable { name }) if name.lexeme == "A"
                ));
                assert_eq!(methods.len(), 2);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn function_declarations_collect_their_parameters() {
        let (statements, _) = parse("fun add(a, b) { return a + b; }");
        match &statements[..] {
            [Stmt::Function(decl)] => {
                assert_eq!(decl.name.lexeme, "add");
                assert_eq!(decl.params.iter().map(|p| p.lexeme.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn more_than_255_arguments_is_reported_but_does_not_abort_parsing() {
        let args = (0..260).map(|n| n.to_string()).collect::<Vec<_>>().join(", ");
        let source = format!("f({args});");
        let (statements, had_error) = parse(&source);
        assert!(had_error);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn expression_ids_are_unique_across_a_parse() {
        let (statements, _) = parse("1 + 2; 3 + 4;");
        let mut ids = Vec::new();
        for stmt in &statements {
            if let Stmt::Expression(Expr { id, kind: ExprKind::Binary { left, right, .. } }) = stmt {
                ids.push(*id);
                ids.push(left.id);
                ids.push(right.id);
            }
        }
        let mut sorted = ids.clone();
        sorted.sort_by_key(|id| id.0);
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len(), "expression ids must be unique: {ids:?}");
    }
}
