mod error;

pub use error::{LexicalError, LexicalErrorKind};

use compact_str::CompactString;
use log::debug;

use crate::token::{Literal, Span, Token, TokenKind, KEYWORDS};

/// Single forward pass over the source with two cursors: `start` marks the
/// origin of the token being scanned, `current` the read head. Lexemes are
/// byte ranges into the source; the scanner itself never allocates except
/// for string literal payloads.
#[derive(Debug)]
pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn get_lexeme(&self, span: &Span) -> &'src str {
        &self.source[span.range()]
    }

    /// Scans the entire source, splitting tokens from errors. The token
    /// vector always ends with `Eof`, whatever errors occurred.
    pub fn scan(mut self) -> (Vec<Token>, Vec<LexicalError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(token) => {
                    let done = matches!(token.kind, TokenKind::Eof);
                    tokens.push(token);
                    if done {
                        break;
                    }
                }
                Err(error) => errors.push(error),
            }
        }
        debug!(
            "scanned {} tokens with {} errors",
            tokens.len(),
            errors.len()
        );
        (tokens, errors)
    }

    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        self.skip_whitespace();
        self.start = self.current;

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let token = match c {
            b'(' => self.make_token(TokenKind::LeftParenthesis),
            b')' => self.make_token(TokenKind::RightParenthesis),
            b'{' => self.make_token(TokenKind::LeftBrace),
            b'}' => self.make_token(TokenKind::RightBrace),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b'-' => self.make_token(TokenKind::Minus),
            b'+' => self.make_token(TokenKind::Plus),
            b';' => self.make_token(TokenKind::Semicolon),
            b'*' => self.make_token(TokenKind::Star),
            b'/' => self.make_token(TokenKind::Slash),
            b'!' => {
                let kind = if self.eat(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.eat(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.eat(b'=') {
                    TokenKind::LessThanEqual
                } else {
                    TokenKind::LessThan
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.eat(b'=') {
                    TokenKind::GreaterThanEqual
                } else {
                    TokenKind::GreaterThan
                };
                self.make_token(kind)
            }
            b'"' => return self.scan_string(),
            b'0'..=b'9' => self.scan_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_ident_or_keyword(),
            _ => {
                return Err(LexicalError {
                    kind: LexicalErrorKind::UnexpectedCharacter,
                    line: self.line,
                });
            }
        };
        Ok(token)
    }
}

impl<'src> Lexer<'src> {
    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.current).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.as_bytes().get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.current += 1;
        Some(c)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                // A line comment runs to the end of the line.
                b'/' if self.peek_next() == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.current += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            span: self.span(),
            literal: None,
            line: self.line,
        }
    }

    fn span(&self) -> Span {
        Span {
            start: self.start as u32,
            length: (self.current - self.start) as u32,
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexicalError> {
        let opening_line = self.line;
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\n') => self.line += 1,
                Some(_) => {}
                None => {
                    return Err(LexicalError {
                        kind: LexicalErrorKind::UnterminatedString,
                        line: opening_line,
                    });
                }
            }
        }
        // Trim the surrounding quotes.
        let value = &self.source[self.start + 1..self.current - 1];
        Ok(Token {
            kind: TokenKind::StringLiteral,
            span: self.span(),
            literal: Some(Literal::String(CompactString::from(value))),
            line: opening_line,
        })
    }

    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
        }
        // A fractional part needs a digit after the dot; a trailing dot is
        // left for the next token.
        if self.peek() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.current += 1;
            }
        }
        let value: f64 = self.source[self.start..self.current]
            .parse()
            .expect("Numeric lexemes are valid `f64`.");
        Token {
            kind: TokenKind::NumericLiteral,
            span: self.span(),
            literal: Some(Literal::Number(value)),
            line: self.line,
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.current += 1;
        }
        let lexeme = &self.source[self.start..self.current];
        let kind = KEYWORDS.get(lexeme).copied().unwrap_or(TokenKind::Ident);
        self.make_token(kind)
    }
}
