use std::fmt;

use crate::common::{Error, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    Number,
    Ident,
    Eof,

    // keywords
    And,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    True,
    Var,
    While,

    // symbols
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Semicolon,
    Bang,

    // binary operators
    Equal,
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,

    Lesser,
    Greater,
    LesserEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
}

impl TokenKind {
    pub fn from_keyword_str(name: &str) -> Option<TokenKind> {
        match name {
            "and" => Some(TokenKind::And),
            "else" => Some(TokenKind::Else),
            "false" => Some(TokenKind::False),
            "for" => Some(TokenKind::For),
            "fun" => Some(TokenKind::Fun),
            "if" => Some(TokenKind::If),
            "nil" => Some(TokenKind::Nil),
            "or" => Some(TokenKind::Or),
            "print" => Some(TokenKind::Print),
            "return" => Some(TokenKind::Return),
            "true" => Some(TokenKind::True),
            "var" => Some(TokenKind::Var),
            "while" => Some(TokenKind::While),
            _ => None,
        }
    }

    /// Keywords the parser may resume at after a syntax error.
    pub fn begins_statement(&self) -> bool {
        matches!(
            *self,
            Self::Fun | Self::Var | Self::For | Self::If | Self::While | Self::Print | Self::Return
        )
    }

    pub fn is_arithmetic_op(&self) -> bool {
        matches!(
            *self,
            Self::Plus | Self::Minus | Self::Star | Self::Slash | Self::Ampersand
        )
    }
}

/// The parsed value carried by number and string tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(number) => write!(f, "{}", number),
            Literal::String(string) => write!(f, "{}", string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub span: Span,
}

impl Token {
    pub fn error_at(&self, message: &str) -> Error {
        Error {
            message: message.into(),
            line: self.line,
            location: if self.kind == TokenKind::Eof {
                " at end".into()
            } else {
                format!(" at '{}'", self.lexeme)
            },
            span: self.span.clone(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "{:?} {} {}", self.kind, self.lexeme, literal),
            None => write!(f, "{:?} {}", self.kind, self.lexeme),
        }
    }
}
