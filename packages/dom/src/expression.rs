//! Binding expressions: `{{ expr }}` (escaped output) and `{!! expr !!}`
//! (raw output).
//!
//! An [`Expression`] keeps the original source fragment and compiles it on
//! first evaluation into a sequence of literal and binding segments.
//! Compilation is pure, so the compiled form is cached and safely shared
//! across any number of evaluations.

use logos::Logos;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unrecognized input at offset {pos} in expression '{expression}'")]
    Lex { pos: usize, expression: String },

    #[error("unexpected end of expression '{expression}'")]
    UnexpectedEnd { expression: String },

    #[error("unexpected {found} at offset {pos} in expression '{expression}'")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expression: String,
    },
}

/// Token types for the expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token<'src> {
    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r"'([^'\\]|\\.)*'", |lex| lex.slice())]
    String(&'src str),

    #[token("|")]
    Pipe,

    #[token(".")]
    Dot,

    #[token(",")]
    Comma,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("!")]
    Bang,

    #[token("-")]
    Minus,

    #[token("+")]
    Plus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    Lte,

    #[token("<")]
    Lt,

    #[token(">=")]
    Gte,

    #[token(">")]
    Gt,

    #[token("&&")]
    And,

    #[token("||")]
    Or,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::String(s) => write!(f, "string {}", s),
            Token::Pipe => write!(f, "|"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Bang => write!(f, "!"),
            Token::Minus => write!(f, "-"),
            Token::Plus => write!(f, "+"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lte => write!(f, "<="),
            Token::Lt => write!(f, "<"),
            Token::Gte => write!(f, ">="),
            Token::Gt => write!(f, ">"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
        }
    }
}

/// Tokenize one binding body (the text between delimiters).
pub fn tokenize(source: &str) -> ExprResult<Vec<(Token, std::ops::Range<usize>)>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(ExprError::Lex {
                    pos: span.start,
                    expression: source.to_string(),
                })
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

/// Compiled expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    /// Field access chain; the head segment is resolved through the scope
    /// chain, the rest through object field lookup.
    Path(Vec<String>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Pipe through a named filter: `expr | name arg1 arg2`.
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

/// One segment of a compiled expression source: literal text or a binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    Binding { expr: Expr, raw: bool },
}

/// Locate the next binding delimiter pair in `text` starting at `from`.
///
/// Returns the byte range of the whole delimited fragment plus whether it
/// uses the raw (`{!! !!}`) form. The innermost closing delimiter wins.
pub fn find_binding(text: &str, from: usize) -> Option<(usize, usize, bool)> {
    let escaped = text[from..].find("{{").map(|i| from + i);
    let raw = text[from..].find("{!!").map(|i| from + i);

    let (start, is_raw, open_len, close) = match (escaped, raw) {
        (Some(e), Some(r)) if r < e => (r, true, 3, "!!}"),
        (Some(e), _) => (e, false, 2, "}}"),
        (None, Some(r)) => (r, true, 3, "!!}"),
        (None, None) => return None,
    };

    let body_start = start + open_len;
    let end = text[body_start..].find(close)? + body_start + close.len();
    Some((start, end, is_raw))
}

/// Compile a source fragment into segments, parsing each delimited binding.
fn compile(source: &str) -> ExprResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some((start, end, raw)) = find_binding(source, pos) {
        if start > pos {
            segments.push(Segment::Literal(source[pos..start].to_string()));
        }
        let body = if raw {
            &source[start + 3..end - 3]
        } else {
            &source[start + 2..end - 2]
        };
        let expr = parse_body(body.trim())?;
        segments.push(Segment::Binding { expr, raw });
        pos = end;
    }

    if pos < source.len() {
        segments.push(Segment::Literal(source[pos..].to_string()));
    }
    Ok(segments)
}

/// Parse one binding body into an [`Expr`].
pub fn parse_body(body: &str) -> ExprResult<Expr> {
    let tokens = tokenize(body)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        source: body,
    };
    let expr = parser.parse_pipeline()?;
    if let Some((token, span)) = parser.peek_spanned() {
        return Err(ExprError::UnexpectedToken {
            found: token.to_string(),
            pos: span.start,
            expression: body.to_string(),
        });
    }
    Ok(expr)
}

struct ExprParser<'src> {
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
    source: &'src str,
}

impl<'src> ExprParser<'src> {
    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_spanned(&self) -> Option<(&Token<'src>, &std::ops::Range<usize>)> {
        self.tokens.get(self.pos).map(|(t, s)| (t, s))
    }

    fn match_token(&mut self, token: Token<'src>) -> bool {
        if self.peek() == Some(&token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ExprError {
        match self.peek_spanned() {
            Some((token, span)) => ExprError::UnexpectedToken {
                found: token.to_string(),
                pos: span.start,
                expression: self.source.to_string(),
            },
            None => ExprError::UnexpectedEnd {
                expression: self.source.to_string(),
            },
        }
    }

    fn expect_ident(&mut self) -> ExprResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Top tier: filter pipes. `expr | name arg… | name2 …`
    fn parse_pipeline(&mut self) -> ExprResult<Expr> {
        let mut expr = self.parse_or()?;
        while self.match_token(Token::Pipe) {
            let name = self.expect_ident()?;
            let mut args = Vec::new();
            while self.starts_primary() {
                args.push(self.parse_primary()?);
                self.match_token(Token::Comma);
            }
            expr = Expr::Filter {
                input: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_and()?;
        while self.match_token(Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.match_token(Token::And) {
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_sum()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Lte) => BinaryOp::Lte,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gte) => BinaryOp::Gte,
                Some(Token::Gt) => BinaryOp::Gt,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_sum()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_sum(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_product()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        if self.match_token(Token::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.match_token(Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn starts_primary(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Ident(_)
                    | Token::Number(_)
                    | Token::String(_)
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::LParen
            )
        )
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n.parse().unwrap_or(0.0)))
            }
            Some(Token::String(s)) => {
                self.pos += 1;
                Ok(Expr::String(unquote(s)))
            }
            Some(Token::True) => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Some(Token::Null) => {
                self.pos += 1;
                Ok(Expr::Null)
            }
            Some(Token::Ident(head)) => {
                let mut path = vec![head.to_string()];
                self.pos += 1;
                while self.match_token(Token::Dot) {
                    path.push(self.expect_ident()?);
                }
                Ok(Expr::Path(path))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_pipeline()?;
                if !self.match_token(Token::RParen) {
                    return Err(self.unexpected());
                }
                Ok(expr)
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn unquote(s: &str) -> String {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// One data-binding expression, compiled lazily on first evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    source: String,
    #[serde(skip)]
    compiled: OnceCell<ExprResult<Vec<Segment>>>,
}

impl Expression {
    /// Wrap a raw source fragment (delimiters included).
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceCell::new(),
        }
    }

    /// Whether `text` is binding syntax: any `{` marks an expression.
    pub fn is_binding(text: &str) -> bool {
        text.contains('{')
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether this is a raw-output (`{!! !!}`) fragment.
    pub fn is_raw(&self) -> bool {
        self.source.trim_start().starts_with("{!!")
    }

    /// Compiled segments; compiled once, cached for the expression's
    /// lifetime (compilation is referentially transparent).
    pub fn compiled(&self) -> ExprResult<&[Segment]> {
        self.compiled
            .get_or_init(|| compile(&self.source))
            .as_ref()
            .map(|segments| segments.as_slice())
            .map_err(Clone::clone)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
