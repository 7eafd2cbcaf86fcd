//! Turns source text into a stream of [`Token`]s, terminated by one
//! `Eof` token. Built on `itertools`'s multi-character lookahead the same
//! way the rest of this pack leans on `itertools::multipeek` for
//! hand-rolled lexers.

use crate::session::Session;
use itertools::{Itertools, MultiPeek};
use std::collections::HashMap;
use std::str::{Chars, FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TokenKind {
    // Single-character punctuation.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character operators.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}

/// The `literal` field of a token: absent for punctuation/identifiers,
/// a string for string literals, a number for number literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Str(String),
    Num(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Literal,
    pub line: u32,
}

impl Token {
    pub fn eof(line: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            literal: Literal::None,
            line,
        }
    }
}

pub struct Scanner<'a, 'sess> {
    source: MultiPeek<Chars<'a>>,
    line: u32,
    keywords: HashMap<&'static str, TokenKind>,
    session: &'sess Session,
}

impl<'a, 'sess> Scanner<'a, 'sess> {
    pub fn new(source: &'a str, session: &'sess Session) -> Self {
        let keywords = HashMap::from_iter([
            ("and", TokenKind::And),
            ("class", TokenKind::Class),
            ("else", TokenKind::Else),
            ("false", TokenKind::False),
            ("for", TokenKind::For),
            ("fun", TokenKind::Fun),
            ("if", TokenKind::If),
            ("nil", TokenKind::Nil),
            ("or", TokenKind::Or),
            ("print", TokenKind::Print),
            ("return", TokenKind::Return),
            ("super", TokenKind::Super),
            ("this", TokenKind::This),
            ("true", TokenKind::True),
            ("var", TokenKind::Var),
            ("while", TokenKind::While),
        ]);
        Self {
            source: source.chars().multipeek(),
            line: 1,
            keywords,
            session,
        }
    }

    /// Scan the whole source into a vector of tokens, always ending in one
    /// `Eof` token.
    pub fn scan_tokens(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.scan_token() {
            tokens.push(token);
        }
        tokens.push(Token::eof(self.line));
        tokens
    }

    /// Scan and return the next meaningful token, skipping whitespace and
    /// comments, or `None` once the source is exhausted.
    fn scan_token(&mut self) -> Option<Token> {
        loop {
            self.skip_trivia();
            let line = self.line;
            let c = self.advance()?;
            let token = match c {
                '(' => self.simple(TokenKind::LeftParen, c, line),
                ')' => self.simple(TokenKind::RightParen, c, line),
                '{' => self.simple(TokenKind::LeftBrace, c, line),
                '}' => self.simple(TokenKind::RightBrace, c, line),
                ',' => self.simple(TokenKind::Comma, c, line),
                '.' => self.simple(TokenKind::Dot, c, line),
                '-' => self.simple(TokenKind::Minus, c, line),
                '+' => self.simple(TokenKind::Plus, c, line),
                ';' => self.simple(TokenKind::Semicolon, c, line),
                '*' => self.simple(TokenKind::Star, c, line),
                '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::BangEqual, c, line),
                '=' => self.one_or_two('=', TokenKind::Equal, TokenKind::EqualEqual, c, line),
                '<' => self.one_or_two('=', TokenKind::Less, TokenKind::LessEqual, c, line),
                '>' => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEqual, c, line),
                '/' => {
                    if self.advance_if_eq('/') {
                        self.advance_while(|c| c != '\n');
                        continue;
                    }
                    self.simple(TokenKind::Slash, c, line)
                }
                '"' => self.scan_string(line),
                d if d.is_ascii_digit() => self.scan_number(d, line),
                c if is_alpha(c) => self.scan_identifier(c, line),
                other => {
                    self.session
                        .error(line, &format!("Unexpected character '{other}'."));
                    continue;
                }
            };
            log::trace!("scanned {:?} {:?} at line {}", token.kind, token.lexeme, line);
            return Some(token);
        }
    }

    fn skip_trivia(&mut self) {
        self.advance_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    }

    fn scan_string(&mut self, start_line: u32) -> Token {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.session.error(start_line, "Unterminated string.");
                    self.reset_peek();
                    break;
                }
                Some('"') => {
                    self.reset_peek();
                    self.advance();
                    break;
                }
                Some(c) => {
                    self.reset_peek();
                    self.advance();
                    value.push(c);
                }
            }
        }
        Token {
            kind: TokenKind::String,
            lexeme: format!("\"{value}\""),
            literal: Literal::Str(value),
            line: start_line,
        }
    }

    fn scan_number(&mut self, first: char, line: u32) -> Token {
        let mut lexeme = String::from(first);
        self.consume_digits(&mut lexeme);
        if self.peek() == Some('.') && self.peek_nth_is_digit() {
            self.reset_peek();
            lexeme.push('.');
            self.advance();
            self.consume_digits(&mut lexeme);
        } else {
            self.reset_peek();
        }
        let value =
            f64::from_str(&lexeme).expect("scanner only collects digits and at most one dot");
        Token {
            kind: TokenKind::Number,
            lexeme,
            literal: Literal::Num(value),
            line,
        }
    }

    /// With the `.` still pending in the peek buffer, check whether the
    /// character right after it is a digit — a trailing dot must not be
    /// consumed.
    fn peek_nth_is_digit(&mut self) -> bool {
        matches!(self.source.peek(), Some(c) if c.is_ascii_digit())
    }

    fn consume_digits(&mut self, lexeme: &mut String) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.reset_peek();
            lexeme.push(self.advance().unwrap());
        }
        self.reset_peek();
    }

    fn scan_identifier(&mut self, first: char, line: u32) -> Token {
        let mut lexeme = String::from(first);
        while matches!(self.peek(), Some(c) if is_alpha(c) || c.is_ascii_digit()) {
            self.reset_peek();
            lexeme.push(self.advance().unwrap());
        }
        self.reset_peek();
        let kind = self
            .keywords
            .get(lexeme.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            literal: Literal::None,
            line,
        }
    }

    fn simple(&mut self, kind: TokenKind, c: char, line: u32) -> Token {
        Token {
            kind,
            lexeme: c.to_string(),
            literal: Literal::None,
            line,
        }
    }

    fn one_or_two(
        &mut self,
        second: char,
        one_char: TokenKind,
        two_char: TokenKind,
        first: char,
        line: u32,
    ) -> Token {
        if self.advance_if_eq(second) {
            Token {
                kind: two_char,
                lexeme: format!("{first}{second}"),
                literal: Literal::None,
                line,
            }
        } else {
            self.simple(one_char, first, line)
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.source.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn advance_if_eq(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.reset_peek();
            self.advance();
            true
        } else {
            self.reset_peek();
            false
        }
    }

    fn advance_while<F>(&mut self, f: F)
    where
        F: Fn(char) -> bool,
    {
        loop {
            match self.peek() {
                Some(c) if f(c) => {
                    self.reset_peek();
                    self.advance();
                }
                _ => {
                    self.reset_peek();
                    break;
                }
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.source.peek().copied()
    }

    fn reset_peek(&mut self) {
        self.source.reset_peek();
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
