use std::{iter::Peekable, str::Chars};

use crate::token::{Pos, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, collecting every token up to (and including)
/// the first [`TokenKind::Eof`].
pub fn lex(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() + 1));
    tokens.extend(Lexer::new(src));
    tokens
}

/// The pug lexer.
///
/// Tokens are produced on demand through [`Lexer::next_token`]. Once the input
/// is exhausted, every further call produces an [`TokenKind::Eof`] token.
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    line: u32,
    column: u32,
    current: Pos,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            line: 1,
            column: 1,
            current: Pos::default(),
            finished: false,
        }
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        use TokenKind::*;

        self.skip_trivia();
        self.current = Pos::new(self.line, self.column, self.cursor);

        let kind = match self.advance() {
            '\0' => return self.produce(Eof, ""),
            '=' => match self.peek() {
                '=' => self.advance_with(Eq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LtEq),
                _ => Lt,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GtEq),
                _ => Gt,
            },
            '-' => match self.peek() {
                '>' => self.advance_with(Arrow),
                _ => Minus,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(And),
                _ => Illegal,
            },
            '|' => match self.peek() {
                '|' => self.advance_with(Or),
                _ => Illegal,
            },
            '+' => Plus,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            ',' => Comma,
            ';' => Semicolon,
            ':' => Colon,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            '"' => {
                let literal = self.string();
                return self.produce(String, literal);
            }
            c if is_identifier_start(c) => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            _ => Illegal,
        };

        let literal = self.substr().to_owned();
        self.produce(kind, literal)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\n' | '\r' => {
                    self.advance();
                }
                '/' if self.peek_second() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Lexes the body of a string literal, returning its unescaped contents.
    /// The opening quote must have been consumed already.
    ///
    /// An unterminated string ends silently at the end of the input.
    fn string(&mut self) -> String {
        let mut buf = String::new();
        loop {
            match self.advance() {
                '\0' | '"' => break,
                '\\' => match self.advance() {
                    '\0' => break,
                    'n' => buf.push('\n'),
                    't' => buf.push('\t'),
                    'r' => buf.push('\r'),
                    '\\' => buf.push('\\'),
                    '"' => buf.push('"'),
                    other => {
                        buf.push('\\');
                        buf.push(other);
                    }
                },
                c => buf.push(c),
            }
        }
        buf
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Ident)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        // A dot only continues a number when a digit follows it.
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            return TokenKind::Float;
        }
        TokenKind::Int
    }
}

impl<'src> Lexer<'src> {
    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one without advancing.
    fn peek_second(&self) -> char {
        let mut rest = self.src[self.cursor..].chars();
        rest.next();
        rest.next().unwrap_or('\0')
    }

    /// Returns the source text of the token being scanned.
    fn substr(&self) -> &'src str {
        &self.src[self.current.offset..self.cursor]
    }

    fn produce(&mut self, kind: TokenKind, literal: impl Into<String>) -> Token {
        Token::new(kind, literal, self.current)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields every token up to and including the first end-of-file token.
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        self.finished = token.is_eof();
        Some(token)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
