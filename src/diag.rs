//! Compile-time diagnostics.
//!
//! Lexical and syntactic errors share one representation so a single pass
//! over a source fragment can report both kinds together.

use std::error::Error;
use std::fmt;

/// Line number (starting at one).
pub type Position = u32;

/// A lex or parse error anchored to a source line.
#[derive(Debug, PartialEq, Clone)]
pub struct CompileError {
    pub pos: Position,
    pub context: ErrorContext,
    pub error: SyntaxError,
}

/// What the front end was looking at when the error was raised.
#[derive(Debug, PartialEq, Clone)]
pub enum ErrorContext {
    /// Raised by the scanner, before a token existed.
    Lexical,
    /// Raised at a concrete token, identified by its lexeme.
    Token(String),
    /// Raised at end of input.
    Eof,
}

impl CompileError {
    pub fn lexical(pos: Position, error: SyntaxError) -> CompileError {
        CompileError {
            pos,
            context: ErrorContext::Lexical,
            error,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            ErrorContext::Lexical => write!(f, "[line {}] Error: {}", self.pos, self.error),
            ErrorContext::Token(lexeme) => {
                write!(f, "[line {}] Error at '{}': {}", self.pos, lexeme, self.error)
            }
            ErrorContext::Eof => write!(f, "[line {}] Error at end: {}", self.pos, self.error),
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SyntaxError {
    UnexpectedChar(char),
    UnterminatedString,
    BadNumberLiteral(String),
    Expected(&'static str),
    ExpectedExpression,
    InvalidAssignmentTarget,
    MissingLeftOperand,
    TooManyParameters,
    TooManyArguments,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::UnexpectedChar(ch) => {
                write!(f, "Unexpected character '{}'.", ch)
            }
            SyntaxError::UnterminatedString => write!(f, "Unterminated string."),
            SyntaxError::BadNumberLiteral(lit) => {
                write!(f, "Cannot parse number literal '{}'.", lit)
            }
            SyntaxError::Expected(what) => write!(f, "Expect {}.", what),
            SyntaxError::ExpectedExpression => write!(f, "Expect expression."),
            SyntaxError::InvalidAssignmentTarget => write!(f, "Invalid assignment target."),
            SyntaxError::MissingLeftOperand => write!(f, "Missing left-hand operand."),
            SyntaxError::TooManyParameters => {
                write!(f, "Can't have more than 255 parameters.")
            }
            SyntaxError::TooManyArguments => {
                write!(f, "Can't have more than 255 arguments.")
            }
        }
    }
}
