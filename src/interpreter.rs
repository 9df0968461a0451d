//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io::prelude::*;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ctx::Context;
use crate::diag::CompileError;
use crate::eval::{Evaluator, RuntimeError, RuntimeErrorKind, Value};
use crate::parser::Parser;

/// Tree-walk interpreter.
///
/// Global state persists between `run` calls, so one invocation can define a
/// function and later ones call it:
///
/// ```
/// # use lumo::interpreter::{Interpreter, LumoError};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     fun max(x, y) {
///         if (x > y) {
///             return x;
///         } else {
///             return y;
///         }
///     }
/// "#;
/// interp.run(func_def)?;
///
/// interp.run("print max(10, 20);").expect("interpreter error");
/// interp.run("print max(5, 4);").expect("interpreter error");
///
/// assert_eq!(output, b"20\n5\n");
/// # Ok::<(), LumoError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    evaluator: Evaluator<'t, W>,
}

/// Errors the interpreter can raise.
#[derive(Debug)]
pub enum LumoError {
    /// Errors found during lexical or syntactic analysis.  Synchronization
    /// lets one run report several of them.
    Compile(Vec<CompileError>),

    /// Error occurring during evaluation.
    Runtime(RuntimeError),
}

impl fmt::Display for LumoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LumoError::Compile(errors) => {
                let mut first = true;
                for e in errors {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                    first = false;
                }
                Ok(())
            }
            LumoError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl Error for LumoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LumoError::Compile(_) => None,
            LumoError::Runtime(e) => Some(e),
        }
    }
}

impl From<RuntimeError> for LumoError {
    fn from(e: RuntimeError) -> LumoError {
        LumoError::Runtime(e)
    }
}

impl From<Vec<CompileError>> for LumoError {
    fn from(errors: Vec<CompileError>) -> LumoError {
        LumoError::Compile(errors)
    }
}

impl<'t, W: Write> Interpreter<'t, W> {
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        let ctx = Context::new();
        let evaluator = Evaluator::new(output);
        evaluator.define_native(&ctx.symbol("clock"), 0, native_clock);
        Interpreter { ctx, evaluator }
    }

    /// When set, bare expression statements print their value.  The REPL
    /// turns this on; file execution leaves it off.
    pub fn set_print_exprs(&mut self, on: bool) {
        self.evaluator.set_print_exprs(on);
    }

    /// Run one source fragment: scan, parse, then evaluate against the
    /// persistent global environment.  Any compile error blocks evaluation.
    pub fn run(&mut self, source: &str) -> Result<(), LumoError> {
        let mut parser = Parser::new(source, self.ctx.clone());
        let prg = parser.parse_program()?;
        self.evaluator.eval_stmts_in_global_env(&prg)?;
        Ok(())
    }
}

/// Host clock: seconds since the Unix epoch.
fn native_clock(_args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    Ok(Value::Number(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("error when getting current time")
            .as_secs_f64(),
    ))
}
