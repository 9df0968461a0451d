//! A tree-walk interpreter for the Lumo scripting language.
//!
//! Lumo is a small dynamically-typed language with first-class functions,
//! closures and lexical scoping.  Source text is scanned to tokens, parsed
//! to an abstract syntax tree and evaluated directly.
//!
//! # Examples
//!
//! See [`crate::interpreter::Interpreter`].

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod diag;
pub mod interpreter;

mod ast;
mod ctx;
mod eval;
mod parser;
mod scanner;
mod token;

pub use eval::{RuntimeError, RuntimeErrorKind};
