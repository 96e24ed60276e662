use crate::{
    common::{Diagnostics, Error, Span},
    token::{Literal, Token, TokenKind},
};

use tracing::debug;
use unicode_xid::UnicodeXID;

#[derive(Debug, Clone)]
pub struct Lexer {
    pub source: Vec<char>,

    start: usize,
    current: usize,
    line: usize,
}

impl Lexer {
    pub fn from_str(source: &str) -> Self {
        Self::from_chars(source.chars().collect())
    }

    pub fn from_chars(chars: Vec<char>) -> Self {
        Lexer {
            source: chars,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.source.get(self.current).copied();
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn next_is(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn get_span(&self) -> Span {
        self.start..self.current
    }

    fn lexeme(&self) -> String {
        self.source[self.get_span()].iter().collect()
    }

    fn create_token(&self, kind: TokenKind) -> Token {
        self.create_literal_token(kind, None)
    }

    fn create_literal_token(&self, kind: TokenKind, literal: Option<Literal>) -> Token {
        Token {
            kind,
            lexeme: self.lexeme(),
            literal,
            line: self.line,
            span: self.get_span(),
        }
    }

    fn error(&self, message: String) -> Error {
        Error {
            message,
            line: self.line,
            location: String::new(),
            span: self.get_span(),
        }
    }

    fn lex_string(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let mut value = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    diagnostics.report(self.error("Unterminated string.".into()));
                    return None;
                }
                Some('"') => break,
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        // leave the newline or end of input to the unterminated check
                        None | Some('\n') => {
                            value.push('\\');
                            continue;
                        }
                        Some(other) => {
                            diagnostics.report(
                                self.error(format!("Unrecognized escape sequence '\\{}'.", other)),
                            );
                            value.push('\\');
                            value.push(other);
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.advance(); // the closing '"'
        Some(self.create_literal_token(TokenKind::String, Some(Literal::String(value))))
    }

    fn lex_number(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        match self.lexeme().parse::<f64>() {
            Ok(number) => {
                Some(self.create_literal_token(TokenKind::Number, Some(Literal::Number(number))))
            }
            Err(err) => {
                diagnostics.report(self.error(format!("Invalid number literal: {}.", err)));
                None
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        while self.peek().is_some_and(|c| c == '_' || c.is_xid_continue()) {
            self.advance();
        }

        let keyword_str = self.lexeme();
        self.create_token(TokenKind::from_keyword_str(&keyword_str).unwrap_or(TokenKind::Ident))
    }

    /// Scans the whole source. Errors are reported to `diagnostics` and the
    /// scan carries on past them; the result always ends with an `Eof` token.
    pub fn lex(&mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(c) = self.advance() {
            let token = match c {
                '(' => Some(self.create_token(TokenKind::LeftParen)),
                ')' => Some(self.create_token(TokenKind::RightParen)),
                '{' => Some(self.create_token(TokenKind::LeftBrace)),
                '}' => Some(self.create_token(TokenKind::RightBrace)),
                ',' => Some(self.create_token(TokenKind::Comma)),
                '.' => Some(self.create_token(TokenKind::Dot)),
                '-' => Some(self.create_token(TokenKind::Minus)),
                '+' => Some(self.create_token(TokenKind::Plus)),
                ';' => Some(self.create_token(TokenKind::Semicolon)),
                '*' => Some(self.create_token(TokenKind::Star)),
                '&' => Some(self.create_token(TokenKind::Ampersand)),
                '!' => {
                    let kind = if self.next_is('=') {
                        TokenKind::BangEqual
                    } else {
                        TokenKind::Bang
                    };
                    Some(self.create_token(kind))
                }
                '=' => {
                    let kind = if self.next_is('=') {
                        TokenKind::EqualEqual
                    } else {
                        TokenKind::Equal
                    };
                    Some(self.create_token(kind))
                }
                '<' => {
                    let kind = if self.next_is('=') {
                        TokenKind::LesserEqual
                    } else {
                        TokenKind::Lesser
                    };
                    Some(self.create_token(kind))
                }
                '>' => {
                    let kind = if self.next_is('=') {
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    };
                    Some(self.create_token(kind))
                }
                '/' => {
                    if self.next_is('/') {
                        while self.peek().is_some_and(|c| c != '\n') {
                            self.advance();
                        }
                        None
                    } else {
                        Some(self.create_token(TokenKind::Slash))
                    }
                }

                '"' => self.lex_string(diagnostics),

                '\n' => {
                    self.line += 1;
                    None
                }
                ' ' | '\t' | '\r' => None,

                _ if c.is_ascii_digit() => self.lex_number(diagnostics),
                _ if c == '_' || c.is_xid_start() => Some(self.lex_ident()),
                _ => {
                    diagnostics.report(self.error(format!("Unexpected character '{}'.", c)));
                    None
                }
            };

            if let Some(token) = token {
                tokens.push(token);
            }
            self.start = self.current;
        }

        self.start = self.current.min(self.source.len());
        self.current = self.start;
        tokens.push(self.create_token(TokenKind::Eof));

        debug!(tokens = tokens.len(), lines = self.line, "scanned source");
        tokens
    }
}

pub fn lex(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    Lexer::from_str(source).lex(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(source, &mut diagnostics);
        assert!(!diagnostics.had_error(), "{:?}", diagnostics.errors());
        tokens.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn empty_source_yields_eof() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("", &mut diagnostics);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].line, 1);
    }

    #[test]
    fn one_and_two_character_operators() {
        assert_eq!(
            kinds("! != = == < <= > >= & / * - +"),
            vec![
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Lesser,
                TokenKind::LesserEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Ampersand,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("// a comment\nvar x;\n// another", &mut diagnostics);
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].line, 2);
        let eof = tokens.last().map(|token| token.line);
        assert_eq!(eof, Some(3));
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("var fun return nil variable _under 変数"),
            vec![
                TokenKind::Var,
                TokenKind::Fun,
                TokenKind::Return,
                TokenKind::Nil,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_carry_parsed_values() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("12 3.25 7.", &mut diagnostics);
        assert_eq!(tokens[0].literal, Some(Literal::Number(12.0)));
        assert_eq!(tokens[1].literal, Some(Literal::Number(3.25)));
        assert_eq!(tokens[2].literal, Some(Literal::Number(7.0)));
        assert_eq!(tokens[3].kind, TokenKind::Dot);
    }

    #[test]
    fn string_escapes_are_translated() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(r#""a\"b\\c\nd\te""#, &mut diagnostics);
        assert!(!diagnostics.had_error());
        assert_eq!(
            tokens[0].literal,
            Some(Literal::String("a\"b\\c\nd\te".into()))
        );
        assert_eq!(tokens[0].lexeme, r#""a\"b\\c\nd\te""#);
    }

    #[test]
    fn unknown_escape_is_reported_and_kept() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(r#""a\qb""#, &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 1);
        assert_eq!(tokens[0].literal, Some(Literal::String("a\\qb".into())));
    }

    #[test]
    fn unterminated_strings_are_reported() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("\"abc", &mut diagnostics);
        assert_eq!(diagnostics.errors()[0].message, "Unterminated string.");
        assert_eq!(tokens.len(), 1);

        let mut diagnostics = Diagnostics::new();
        let tokens = lex("\"abc\nprint 1;", &mut diagnostics);
        assert!(diagnostics.had_error());
        assert_eq!(tokens[0].kind, TokenKind::Print);
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn unexpected_characters_do_not_stop_the_scan() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("1 # 2 $ 3", &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 2);
        assert_eq!(diagnostics.errors()[0].message, "Unexpected character '#'.");
        let numbers = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Number)
            .count();
        assert_eq!(numbers, 3);
    }
}
