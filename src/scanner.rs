//! Lexical analyzer

use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;

use crate::ctx::Context;
use crate::diag::{CompileError, Position, SyntaxError};
use crate::token::Token;

/// Turn a source string into a sequence of tokens.
pub struct Scanner<'s> {
    input: Peekable<Chars<'s>>,
    line: Position,
    ctx: Rc<Context>,

    // A number followed by a lone '.' scans one token too far; the extra
    // token is parked here until the next request.
    pending: Option<Token>,

    // Buffer used when scanning longer tokens.  Allocated here to reuse memory.
    buf: String,
}

impl<'s> Scanner<'s> {
    /// Creates a new scanner operating on `input`.
    pub fn new(input: &'s str, ctx: Rc<Context>) -> Scanner<'s> {
        Scanner {
            input: input.chars().peekable(),
            line: 1,
            ctx,
            pending: None,
            buf: String::new(),
        }
    }

    /// Scan next token and return it together with its line.
    ///
    /// On error the offending characters have been consumed, so scanning can
    /// simply be resumed by calling this again.
    pub fn get_token(&mut self) -> Result<(Position, Token), CompileError> {
        self.get_raw_token().map(|token| (self.line, token))
    }

    fn get_raw_token(&mut self) -> Result<Token, CompileError> {
        if let Some(token) = self.pending.take() {
            return Ok(token);
        }
        loop {
            match self.input.next() {
                None => return Ok(Token::Eof),
                Some(ch) => match ch {
                    '\n' => self.line += 1,
                    ' ' | '\t' | '\r' => (),
                    '+' => return Ok(Token::Plus),
                    '-' => return Ok(Token::Minus),
                    '*' => return Ok(Token::Star),
                    '/' => {
                        if let Some('/') = self.input.peek() {
                            self.skip_comment();
                        } else {
                            return Ok(Token::Slash);
                        }
                    }
                    '(' => return Ok(Token::LeftParen),
                    ')' => return Ok(Token::RightParen),
                    '{' => return Ok(Token::LeftCurly),
                    '}' => return Ok(Token::RightCurly),
                    ';' => return Ok(Token::Semicolon),
                    ',' => return Ok(Token::Comma),
                    '.' => return Ok(Token::Dot),
                    '?' => return Ok(Token::Question),
                    ':' => return Ok(Token::Colon),
                    '=' => return Ok(self.with_eq(Token::EqualEqual, Token::Equal)),
                    '!' => return Ok(self.with_eq(Token::BangEqual, Token::Bang)),
                    '<' => return Ok(self.with_eq(Token::LessEqual, Token::Less)),
                    '>' => return Ok(self.with_eq(Token::GreaterEqual, Token::Greater)),
                    '"' => return self.scan_string(),
                    '0'..='9' => return self.scan_number(ch),
                    'a'..='z' | 'A'..='Z' | '_' => return Ok(self.scan_identifier(ch)),
                    _ => {
                        return Err(CompileError::lexical(
                            self.line,
                            SyntaxError::UnexpectedChar(ch),
                        ));
                    }
                },
            };
        }
    }

    /// Select the one or two character token depending on whether the next
    /// character is '='.
    fn with_eq(&mut self, two: Token, one: Token) -> Token {
        if let Some('=') = self.input.peek() {
            self.input.next();
            two
        } else {
            one
        }
    }

    fn scan_number(&mut self, first_digit: char) -> Result<Token, CompileError> {
        self.buf.clear();
        self.buf.push(first_digit);
        self.push_digits();
        if let Some('.') = self.input.peek() {
            self.input.next();
            if matches!(self.input.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.buf.push('.');
                self.push_digits();
            } else {
                // A dot with no fractional digit belongs to the next token.
                self.pending = Some(Token::Dot);
            }
        }

        let n = self.buf.parse::<f64>().map_err(|_| {
            CompileError::lexical(self.line, SyntaxError::BadNumberLiteral(self.buf.clone()))
        })?;
        Ok(Token::Number(n))
    }

    fn push_digits(&mut self) {
        while let Some(ch) = self.input.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.buf.push(*ch);
            self.input.next();
        }
    }

    fn scan_string(&mut self) -> Result<Token, CompileError> {
        let start = self.line;
        self.buf.clear();
        loop {
            match self.input.next() {
                None => {
                    return Err(CompileError::lexical(start, SyntaxError::UnterminatedString));
                }
                Some('"') => break,
                Some(ch) => {
                    if ch == '\n' {
                        self.line += 1;
                    }
                    self.buf.push(ch);
                }
            }
        }
        Ok(Token::Str(Rc::from(self.buf.as_str())))
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.input.peek() {
            if *ch == '\n' {
                break;
            }
            self.input.next();
        }
    }

    fn scan_identifier(&mut self, first_char: char) -> Token {
        self.buf.clear();
        self.buf.push(first_char);
        while let Some(ch) = self.input.peek() {
            if !(ch.is_ascii_alphanumeric() || *ch == '_') {
                break;
            }
            self.buf.push(*ch);
            self.input.next();
        }

        let sym = self.ctx.symbol(&self.buf);
        if let Some(token) = self.ctx.keyword(&sym) {
            token
        } else {
            Token::Identifier(sym)
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_token() {
            Ok((_, Token::Eof)) => None,
            Ok((_, t)) => Some(Ok(t)),
            Err(e) => Some(Err(e)),
        }
    }
}
