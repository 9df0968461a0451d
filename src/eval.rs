//! Evaluation of parsed programs.
//!
//! The evaluator walks the AST with an explicit environment chain.  Blocks
//! and calls build child frames and pass them down, so the caller's frame is
//! untouched on every exit path, including unwinds.  `return` and `break`
//! are not errors: they travel as `Exec` outcomes until a call frame or a
//! loop absorbs them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use crate::ast::{BinOp, Expr, FunDef, Literal, LogicalOp, Stmt, UnaryOp};
use crate::diag::Position;
use crate::ctx::Symbol;

#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Function(Function),
}

impl Value {
    /// Only `nil` and `false` are falsey.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

/// The canonical textual rendering used by `print` and string coercion.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            // Integer-valued doubles render without a decimal point.
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Function(func) => write!(f, "{}", func),
        }
    }
}

/// A first-class callable: either a user function with its captured
/// environment or a host-supplied native.
#[derive(Clone)]
pub struct Function {
    name: Option<Symbol>,
    arity: usize,
    body: FunctionBody,
}

/// Signature of host-supplied functions.  Natives have no source line; the
/// call site anchors any error they raise.
pub type NativeFn = fn(&[Value]) -> Result<Value, RuntimeErrorKind>;

#[derive(Clone)]
enum FunctionBody {
    Native(NativeFn),
    User(Rc<FunDef>, Rc<Env>),
}

impl Function {
    fn user(def: &Rc<FunDef>, closure: &Rc<Env>) -> Function {
        Function {
            name: def.name.clone(),
            arity: def.params.len(),
            body: FunctionBody::User(def.clone(), closure.clone()),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Functions compare by identity, not structure.
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (&self.body, &other.body) {
            (FunctionBody::Native(l), FunctionBody::Native(r)) => l == r,
            (FunctionBody::User(ld, le), FunctionBody::User(rd, re)) => {
                Rc::ptr_eq(ld, rd) && Rc::ptr_eq(le, re)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.body, &self.name) {
            (FunctionBody::Native(_), _) => write!(f, "<native fn>"),
            (FunctionBody::User(..), Some(name)) => write!(f, "<fn {}>", name),
            (FunctionBody::User(..), None) => write!(f, "<fn>"),
        }
    }
}

/// An evaluation error anchored to the line of the operator or keyword that
/// raised it.
#[derive(Debug)]
pub struct RuntimeError {
    pub pos: Position,
    pub kind: RuntimeErrorKind,
}

#[derive(Debug)]
pub enum RuntimeErrorKind {
    OperandMustBeNumber,
    OperandsMustBeNumbers,
    AddOperandsMismatch,
    DivisionByZero,
    NotCallable,
    WrongArity { expected: usize, got: usize },
    UndefinedVariable(String),
    UninitializedVariable(String),
    BreakOutsideLoop,
    TopLevelReturn,
    Io(io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            // I/O failures have no source anchor.
            RuntimeErrorKind::Io(_) => write!(f, "{}", self.kind),
            kind => write!(f, "{}\n[line {}]", kind, self.pos),
        }
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeErrorKind::OperandMustBeNumber => write!(f, "Operand must be a number."),
            RuntimeErrorKind::OperandsMustBeNumbers => write!(f, "Operands must be numbers."),
            RuntimeErrorKind::AddOperandsMismatch => {
                write!(f, "Operands must be two numbers or two strings.")
            }
            RuntimeErrorKind::DivisionByZero => write!(f, "Division by zero error."),
            RuntimeErrorKind::NotCallable => write!(f, "Can only call functions and classes."),
            RuntimeErrorKind::WrongArity { expected, got } => {
                write!(f, "Expected {} arguments but got {}.", expected, got)
            }
            RuntimeErrorKind::UndefinedVariable(name) => {
                write!(f, "Undefined variable '{}'.", name)
            }
            RuntimeErrorKind::UninitializedVariable(name) => {
                write!(f, "Accessing uninitialized variable '{}'.", name)
            }
            RuntimeErrorKind::BreakOutsideLoop => {
                write!(f, "Usage of keyword 'break' outside of loop context.")
            }
            RuntimeErrorKind::TopLevelReturn => {
                write!(f, "Can't return from top-level code.")
            }
            RuntimeErrorKind::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            RuntimeErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError {
            pos: 0,
            kind: RuntimeErrorKind::Io(e),
        }
    }
}

/// Outcome of executing a statement: fall through to the next one, or unwind
/// towards the boundary that knows how to absorb the signal.
#[derive(Debug)]
enum Exec {
    Normal,
    Return(Position, Value),
    Break(Position),
}

#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    globals: Rc<Env>,
    print_exprs: bool,
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W) -> Evaluator<'t, W> {
        Evaluator {
            output,
            globals: Env::new(),
            print_exprs: false,
        }
    }

    /// When set, expression statements print their value (REPL behavior).
    pub fn set_print_exprs(&mut self, on: bool) {
        self.print_exprs = on;
    }

    /// Register a host function in the global scope.
    pub fn define_native(&self, name: &Symbol, arity: usize, body: NativeFn) {
        self.globals.define(
            name,
            Value::Function(Function {
                name: Some(name.clone()),
                arity,
                body: FunctionBody::Native(body),
            }),
            true,
        );
    }

    pub fn eval_stmts_in_global_env(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = self.globals.clone();
        match self.eval_stmts(stmts, &globals)? {
            Exec::Normal => Ok(()),
            Exec::Break(pos) => Err(RuntimeError {
                pos,
                kind: RuntimeErrorKind::BreakOutsideLoop,
            }),
            Exec::Return(pos, _) => Err(RuntimeError {
                pos,
                kind: RuntimeErrorKind::TopLevelReturn,
            }),
        }
    }

    fn eval_stmts(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Result<Exec, RuntimeError> {
        for stmt in stmts {
            match self.eval_stmt(stmt, env)? {
                Exec::Normal => (),
                flow => return Ok(flow),
            }
        }
        Ok(Exec::Normal)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Exec, RuntimeError> {
        match stmt {
            Stmt::Expr(e) => {
                let v = self.eval_expr(e, env)?;
                if self.print_exprs {
                    writeln!(self.output, "{}", v)?;
                }
            }
            Stmt::Print(e) => {
                let v = self.eval_expr(e, env)?;
                writeln!(self.output, "{}", v)?;
            }
            Stmt::VarDecl(sym, init) => match init {
                Some(e) => {
                    let v = self.eval_expr(e, env)?;
                    env.define(sym, v, true);
                }
                None => env.define(sym, Value::Nil, false),
            },
            Stmt::FunDecl(def) => {
                let func = Value::Function(Function::user(def, env));
                if let Some(name) = &def.name {
                    env.define(name, func, true);
                }
            }
            Stmt::Block(stmts) => {
                return self.eval_stmts(stmts, &Env::with_parent(Some(env.clone())));
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    return self.eval_stmt(then_branch, env);
                } else if let Some(else_branch) = else_branch {
                    return self.eval_stmt(else_branch, env);
                }
            }
            Stmt::While(cond, body) => {
                while self.eval_expr(cond, env)?.is_truthy() {
                    match self.eval_stmt(body, env)? {
                        Exec::Normal => (),
                        Exec::Break(_) => break,
                        ret @ Exec::Return(..) => return Ok(ret),
                    }
                }
            }
            Stmt::Return(pos, value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Nil,
                };
                return Ok(Exec::Return(*pos, v));
            }
            Stmt::Break(pos) => return Ok(Exec::Break(*pos)),
        };
        Ok(Exec::Normal)
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Group(e) => self.eval_expr(e, env),
            Expr::Var(sym, pos) => env
                .get(sym)
                .map_err(|kind| RuntimeError { pos: *pos, kind }),
            Expr::Assign(sym, pos, rhs) => {
                let v = self.eval_expr(rhs, env)?;
                env.assign(sym, v.clone())
                    .map_err(|kind| RuntimeError { pos: *pos, kind })?;
                Ok(v)
            }
            Expr::Unary(op, pos, operand) => {
                let v = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => match v {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError {
                            pos: *pos,
                            kind: RuntimeErrorKind::OperandMustBeNumber,
                        }),
                    },
                }
            }
            Expr::Logical(lhs, op, rhs) => {
                let l = self.eval_expr(lhs, env)?;
                let decided = match op {
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::And => !l.is_truthy(),
                };
                // The deciding operand is the result, uncoerced.
                if decided {
                    Ok(l)
                } else {
                    self.eval_expr(rhs, env)
                }
            }
            Expr::Ternary(cond, then_branch, else_branch) => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.eval_expr(then_branch, env)
                } else {
                    self.eval_expr(else_branch, env)
                }
            }
            Expr::Binary(lhs, op, pos, rhs) => self.eval_binary(lhs, *op, *pos, rhs, env),
            Expr::Call(callee, pos, args) => self.eval_call(callee, *pos, args, env),
            Expr::Lambda(def) => Ok(Value::Function(Function::user(def, env))),
        }
    }

    fn eval_binary(
        &mut self,
        lhs: &Expr,
        op: BinOp,
        pos: Position,
        rhs: &Expr,
        env: &Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinOp::Comma => {
                self.eval_expr(lhs, env)?;
                self.eval_expr(rhs, env)
            }
            BinOp::Equal => {
                let l = self.eval_expr(lhs, env)?;
                let r = self.eval_expr(rhs, env)?;
                Ok(Value::Bool(l == r))
            }
            BinOp::NotEqual => {
                let l = self.eval_expr(lhs, env)?;
                let r = self.eval_expr(rhs, env)?;
                Ok(Value::Bool(l != r))
            }
            BinOp::Add => {
                let l = self.eval_expr(lhs, env)?;
                let r = self.eval_expr(rhs, env)?;
                match (&l, &r) {
                    (Value::Number(ln), Value::Number(rn)) => Ok(Value::Number(ln + rn)),
                    // One string operand turns `+` into concatenation.
                    (Value::Str(_), _) | (_, Value::Str(_)) => {
                        Ok(Value::Str(Rc::from(format!("{}{}", l, r))))
                    }
                    _ => Err(RuntimeError {
                        pos,
                        kind: RuntimeErrorKind::AddOperandsMismatch,
                    }),
                }
            }
            BinOp::Sub => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Number(l - r))
            }
            BinOp::Mul => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Number(l * r))
            }
            BinOp::Div => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                if r == 0.0 {
                    Err(RuntimeError {
                        pos,
                        kind: RuntimeErrorKind::DivisionByZero,
                    })
                } else {
                    Ok(Value::Number(l / r))
                }
            }
            BinOp::Less => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Bool(l < r))
            }
            BinOp::LessEqual => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Bool(l <= r))
            }
            BinOp::Greater => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Bool(l > r))
            }
            BinOp::GreaterEqual => {
                let (l, r) = self.eval_numeric_operands(lhs, rhs, pos, env)?;
                Ok(Value::Bool(l >= r))
            }
        }
    }

    fn eval_numeric_operands(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        pos: Position,
        env: &Rc<Env>,
    ) -> Result<(f64, f64), RuntimeError> {
        match (self.eval_expr(lhs, env)?, self.eval_expr(rhs, env)?) {
            (Value::Number(l), Value::Number(r)) => Ok((l, r)),
            _ => Err(RuntimeError {
                pos,
                kind: RuntimeErrorKind::OperandsMustBeNumbers,
            }),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        pos: Position,
        args: &[Expr],
        env: &Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        let callee = self.eval_expr(callee, env)?;
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval_expr(arg, env)?);
        }

        let func = match callee {
            Value::Function(f) => f,
            _ => {
                return Err(RuntimeError {
                    pos,
                    kind: RuntimeErrorKind::NotCallable,
                });
            }
        };
        if evaluated.len() != func.arity {
            return Err(RuntimeError {
                pos,
                kind: RuntimeErrorKind::WrongArity {
                    expected: func.arity,
                    got: evaluated.len(),
                },
            });
        }

        match &func.body {
            FunctionBody::Native(native) => {
                native(&evaluated).map_err(|kind| RuntimeError { pos, kind })
            }
            FunctionBody::User(def, closure) => {
                // Parameters live in a frame whose parent is the environment
                // captured at definition, not the caller's.
                let frame = Env::with_parent(Some(closure.clone()));
                for (param, value) in def.params.iter().zip(evaluated) {
                    frame.define(param, value, true);
                }
                match self.eval_stmts(&def.body, &frame)? {
                    Exec::Return(_, v) => Ok(v),
                    Exec::Normal => Ok(Value::Nil),
                    Exec::Break(break_pos) => Err(RuntimeError {
                        pos: break_pos,
                        kind: RuntimeErrorKind::BreakOutsideLoop,
                    }),
                }
            }
        }
    }
}

/// A single lexical scope frame linked to its enclosing frame.
#[derive(Debug)]
struct Env {
    parent: Option<Rc<Env>>,
    bindings: RefCell<HashMap<Symbol, Binding>>,
}

#[derive(Debug)]
struct Binding {
    value: Value,
    initialized: bool,
}

impl Env {
    fn new() -> Rc<Env> {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Rc<Env>>) -> Rc<Env> {
        Rc::new(Env {
            parent,
            bindings: RefCell::new(HashMap::new()),
        })
    }

    /// Unconditionally (re)bind `sym` in this frame.
    fn define(&self, sym: &Symbol, value: Value, initialized: bool) {
        self.bindings
            .borrow_mut()
            .insert(sym.clone(), Binding { value, initialized });
    }

    /// Walk outward to the owning frame and overwrite the binding there.
    fn assign(&self, sym: &Symbol, value: Value) -> Result<(), RuntimeErrorKind> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(sym) {
            binding.value = value;
            binding.initialized = true;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(sym, value),
            None => Err(RuntimeErrorKind::UndefinedVariable(sym.name().to_owned())),
        }
    }

    /// Walk outward and read the binding.  Reading a declared-but-unassigned
    /// name is an error, unless the stored value is a function so that
    /// forward function references resolve.
    fn get(&self, sym: &Symbol) -> Result<Value, RuntimeErrorKind> {
        if let Some(binding) = self.bindings.borrow().get(sym) {
            if !binding.initialized && !matches!(binding.value, Value::Function(_)) {
                return Err(RuntimeErrorKind::UninitializedVariable(
                    sym.name().to_owned(),
                ));
            }
            return Ok(binding.value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(sym),
            None => Err(RuntimeErrorKind::UndefinedVariable(sym.name().to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Context;

    fn eval_expr(expr: &Expr) -> Result<Value, RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        let mut evaluator = Evaluator::new(&mut out);
        let globals = evaluator.globals.clone();
        let val = evaluator.eval_expr(expr, &globals)?;
        assert!(out.is_empty());
        Ok(val)
    }

    fn eval_prg(prg: &[Stmt]) -> Result<String, RuntimeError> {
        let ctx = Context::new();
        eval_prg_with_ctx(ctx, prg)
    }

    fn eval_prg_with_ctx(ctx: Rc<Context>, prg: &[Stmt]) -> Result<String, RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        let mut e = Evaluator::new(&mut out);
        e.define_native(&ctx.symbol("__test_ultimate_answer__"), 0, |_| {
            Ok(Value::Number(42.0))
        });
        e.define_native(&ctx.symbol("__test_min__"), 2, |args| {
            match (&args[0], &args[1]) {
                (Value::Number(l), Value::Number(r)) => {
                    Ok(Value::Number(if *l <= *r { *l } else { *r }))
                }
                _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
            }
        });
        e.eval_stmts_in_global_env(prg)?;
        Ok(String::from_utf8(out).expect("error while converting output"))
    }

    fn number(n: f64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Number(n)))
    }

    fn boolean(b: bool) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Bool(b)))
    }

    fn string(s: &str) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Str(Rc::from(s))))
    }

    #[test]
    fn number_literal() -> Result<(), RuntimeError> {
        assert_eq!(eval_expr(&Expr::Literal(Literal::Number(1.0)))?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn unary_minus() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Unary(UnaryOp::Neg, 1, number(1.0)))?,
            Value::Number(-1.0)
        );
        Ok(())
    }

    #[test]
    fn logical_not_uses_truthiness() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Unary(UnaryOp::Not, 1, boolean(true)))?,
            Value::Bool(false)
        );
        assert_eq!(
            eval_expr(&Expr::Unary(
                UnaryOp::Not,
                1,
                Box::new(Expr::Literal(Literal::Nil))
            ))?,
            Value::Bool(true)
        );
        // Zero and the empty string are truthy.
        assert_eq!(
            eval_expr(&Expr::Unary(UnaryOp::Not, 1, number(0.0)))?,
            Value::Bool(false)
        );
        assert_eq!(
            eval_expr(&Expr::Unary(UnaryOp::Not, 1, string("")))?,
            Value::Bool(false)
        );
        Ok(())
    }

    #[test]
    fn unary_minus_on_bool() {
        match eval_expr(&Expr::Unary(UnaryOp::Neg, 7, boolean(true))) {
            Err(RuntimeError {
                pos: 7,
                kind: RuntimeErrorKind::OperandMustBeNumber,
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn arithmetic() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(number(1.0), BinOp::Sub, 1, number(3.0)))?,
            Value::Number(-2.0)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(number(6.0), BinOp::Div, 1, number(2.0)))?,
            Value::Number(3.0)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(
                number(1.0),
                BinOp::Add,
                1,
                Box::new(Expr::Binary(number(2.0), BinOp::Mul, 1, number(3.0)))
            ))?,
            Value::Number(7.0)
        );
        Ok(())
    }

    #[test]
    fn division_by_zero() {
        match eval_expr(&Expr::Binary(number(6.0), BinOp::Div, 2, number(0.0))) {
            Err(RuntimeError {
                pos: 2,
                kind: RuntimeErrorKind::DivisionByZero,
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn arithmetic_on_strings_fails() {
        match eval_expr(&Expr::Binary(number(1.0), BinOp::Sub, 1, string("a"))) {
            Err(RuntimeError {
                kind: RuntimeErrorKind::OperandsMustBeNumbers,
                ..
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn string_concatenation_coerces() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(string("a"), BinOp::Add, 1, number(1.0)))?,
            Value::Str(Rc::from("a1"))
        );
        assert_eq!(
            eval_expr(&Expr::Binary(number(2.0), BinOp::Add, 1, string("b")))?,
            Value::Str(Rc::from("2b"))
        );
        assert_eq!(
            eval_expr(&Expr::Binary(
                string("a"),
                BinOp::Add,
                1,
                Box::new(Expr::Literal(Literal::Nil))
            ))?,
            Value::Str(Rc::from("anil"))
        );
        Ok(())
    }

    #[test]
    fn mixed_addition_without_string_fails() {
        match eval_expr(&Expr::Binary(number(1.0), BinOp::Add, 1, boolean(true))) {
            Err(RuntimeError {
                kind: RuntimeErrorKind::AddOperandsMismatch,
                ..
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn equality_is_structural_by_tag() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(number(2.0), BinOp::Equal, 1, number(2.0)))?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(string("a"), BinOp::Equal, 1, string("a")))?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(
                Box::new(Expr::Literal(Literal::Nil)),
                BinOp::Equal,
                1,
                Box::new(Expr::Literal(Literal::Nil))
            ))?,
            Value::Bool(true)
        );
        // Different tags never compare equal.
        assert_eq!(
            eval_expr(&Expr::Binary(boolean(true), BinOp::Equal, 1, number(1.0)))?,
            Value::Bool(false)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(
                Box::new(Expr::Literal(Literal::Nil)),
                BinOp::Equal,
                1,
                boolean(false)
            ))?,
            Value::Bool(false)
        );
        Ok(())
    }

    #[test]
    fn nan_is_not_equal_to_itself() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(
                number(f64::NAN),
                BinOp::Equal,
                1,
                number(f64::NAN)
            ))?,
            Value::Bool(false)
        );
        Ok(())
    }

    #[test]
    fn comparisons() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(number(1.0), BinOp::Less, 1, number(2.0)))?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(number(2.0), BinOp::LessEqual, 1, number(2.0)))?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(number(3.0), BinOp::Greater, 1, number(2.0)))?,
            Value::Bool(true)
        );
        assert_eq!(
            eval_expr(&Expr::Binary(
                number(1.0),
                BinOp::GreaterEqual,
                1,
                number(2.0)
            ))?,
            Value::Bool(false)
        );
        Ok(())
    }

    #[test]
    fn grouping_is_transparent() -> Result<(), RuntimeError> {
        let inner = Expr::Binary(number(1.0), BinOp::Add, 1, number(2.0));
        let grouped = Expr::Group(Box::new(inner.clone()));
        assert_eq!(
            eval_expr(&inner)?.to_string(),
            eval_expr(&grouped)?.to_string()
        );
        Ok(())
    }

    #[test]
    fn comma_returns_right_operand() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Binary(number(1.0), BinOp::Comma, 1, number(2.0)))?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn logical_operators_return_deciding_operand() -> Result<(), RuntimeError> {
        assert_eq!(
            eval_expr(&Expr::Logical(
                Box::new(Expr::Literal(Literal::Nil)),
                LogicalOp::Or,
                string("fallback")
            ))?,
            Value::Str(Rc::from("fallback"))
        );
        assert_eq!(
            eval_expr(&Expr::Logical(number(1.0), LogicalOp::Or, number(2.0)))?,
            Value::Number(1.0)
        );
        assert_eq!(
            eval_expr(&Expr::Logical(
                Box::new(Expr::Literal(Literal::Nil)),
                LogicalOp::And,
                number(2.0)
            ))?,
            Value::Nil
        );
        assert_eq!(
            eval_expr(&Expr::Logical(number(1.0), LogicalOp::And, number(2.0)))?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn ternary_evaluates_single_branch() -> Result<(), RuntimeError> {
        // The untaken branch would raise if evaluated.
        let div_by_zero = Expr::Binary(number(1.0), BinOp::Div, 1, number(0.0));
        assert_eq!(
            eval_expr(&Expr::Ternary(
                boolean(true),
                number(1.0),
                Box::new(div_by_zero.clone())
            ))?,
            Value::Number(1.0)
        );
        assert_eq!(
            eval_expr(&Expr::Ternary(
                boolean(false),
                Box::new(div_by_zero),
                number(2.0)
            ))?,
            Value::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn stringify_values() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(
            Value::Number(9007199254740992.0).to_string(),
            "9007199254740992"
        );
        assert_eq!(Value::Str(Rc::from("hi")).to_string(), "hi");
    }

    #[test]
    fn print_stmt() -> Result<(), RuntimeError> {
        assert_eq!(eval_prg(&[Stmt::Print(number(42.0))])?, "42\n");
        Ok(())
    }

    #[test]
    fn expr_stmt_is_silent_by_default() -> Result<(), RuntimeError> {
        assert_eq!(eval_prg(&[Stmt::Expr(number(42.0))])?, "");
        Ok(())
    }

    #[test]
    fn expr_stmt_prints_in_repl_mode() -> Result<(), RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        let mut e = Evaluator::new(&mut out);
        e.set_print_exprs(true);
        e.eval_stmts_in_global_env(&[Stmt::Expr(number(42.0))])?;
        assert_eq!(out, b"42\n");
        Ok(())
    }

    #[test]
    fn set_and_get_var() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        assert_eq!(
            eval_prg_with_ctx(
                ctx.clone(),
                &[
                    Stmt::VarDecl(ctx.symbol("foo"), Some(number(42.0))),
                    Stmt::Print(Box::new(Expr::Var(ctx.symbol("foo"), 1)))
                ]
            )?,
            "42\n"
        );
        Ok(())
    }

    #[test]
    fn redeclaring_a_var_overwrites() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        let foo = ctx.symbol("foo");
        assert_eq!(
            eval_prg_with_ctx(
                ctx,
                &[
                    Stmt::VarDecl(foo.clone(), Some(number(42.0))),
                    Stmt::VarDecl(foo.clone(), Some(number(24.0))),
                    Stmt::Print(Box::new(Expr::Var(foo, 1))),
                ]
            )?,
            "24\n"
        );
        Ok(())
    }

    #[test]
    fn reading_uninitialized_var_fails() {
        let ctx = Context::new();
        let foo = ctx.symbol("foo");
        match eval_prg_with_ctx(
            ctx,
            &[
                Stmt::VarDecl(foo.clone(), None),
                Stmt::Print(Box::new(Expr::Var(foo.clone(), 2))),
            ],
        ) {
            Err(RuntimeError {
                pos: 2,
                kind: RuntimeErrorKind::UninitializedVariable(name),
            }) if name == foo.name() => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn assignment_initializes() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        let foo = ctx.symbol("foo");
        assert_eq!(
            eval_prg_with_ctx(
                ctx,
                &[
                    Stmt::VarDecl(foo.clone(), None),
                    Stmt::Expr(Box::new(Expr::Assign(foo.clone(), 1, number(3.0)))),
                    Stmt::Print(Box::new(Expr::Var(foo, 1))),
                ]
            )?,
            "3\n"
        );
        Ok(())
    }

    #[test]
    fn set_unknown_var() {
        let ctx = Context::new();
        let foo = ctx.symbol("foo");
        match eval_prg_with_ctx(
            ctx,
            &[Stmt::Expr(Box::new(Expr::Assign(foo.clone(), 1, number(42.0))))],
        ) {
            Err(RuntimeError {
                kind: RuntimeErrorKind::UndefinedVariable(name),
                ..
            }) if name == foo.name() => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn break_aborts_nearest_loop() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        let i = ctx.symbol("i");
        // var i = 0; while (true) { i = i + 1; if (i > 2) break; } print i;
        let prg = [
            Stmt::VarDecl(i.clone(), Some(number(0.0))),
            Stmt::While(
                boolean(true),
                Box::new(Stmt::Block(vec![
                    Stmt::Expr(Box::new(Expr::Assign(
                        i.clone(),
                        2,
                        Box::new(Expr::Binary(
                            Box::new(Expr::Var(i.clone(), 2)),
                            BinOp::Add,
                            2,
                            number(1.0),
                        )),
                    ))),
                    Stmt::If(
                        Box::new(Expr::Binary(
                            Box::new(Expr::Var(i.clone(), 3)),
                            BinOp::Greater,
                            3,
                            number(2.0),
                        )),
                        Box::new(Stmt::Break(3)),
                        None,
                    ),
                ])),
            ),
            Stmt::Print(Box::new(Expr::Var(i, 4))),
        ];
        assert_eq!(eval_prg_with_ctx(ctx, &prg)?, "3\n");
        Ok(())
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        match eval_prg(&[Stmt::Break(5)]) {
            Err(RuntimeError {
                pos: 5,
                kind: RuntimeErrorKind::BreakOutsideLoop,
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn top_level_return_is_an_error() {
        match eval_prg(&[Stmt::Return(4, None)]) {
            Err(RuntimeError {
                pos: 4,
                kind: RuntimeErrorKind::TopLevelReturn,
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn call_builtin_function_without_arg() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        let ultimate_answer = ctx.symbol("__test_ultimate_answer__");
        assert_eq!(
            eval_prg_with_ctx(
                ctx,
                &[Stmt::Print(Box::new(Expr::Call(
                    Box::new(Expr::Var(ultimate_answer, 1)),
                    1,
                    vec![]
                )))],
            )?,
            "42\n"
        );
        Ok(())
    }

    #[test]
    fn call_function_with_bad_number_of_arguments() {
        let ctx = Context::new();
        let ultimate_answer = ctx.symbol("__test_ultimate_answer__");
        match eval_prg_with_ctx(
            ctx,
            &[Stmt::Print(Box::new(Expr::Call(
                Box::new(Expr::Var(ultimate_answer, 1)),
                1,
                vec![Expr::Literal(Literal::Bool(true))],
            )))],
        ) {
            Err(RuntimeError {
                kind:
                    RuntimeErrorKind::WrongArity {
                        expected: 0,
                        got: 1,
                    },
                ..
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn call_builtin_function_with_several_args() -> Result<(), RuntimeError> {
        let ctx = Context::new();
        let min = ctx.symbol("__test_min__");
        assert_eq!(
            eval_prg_with_ctx(
                ctx,
                &[Stmt::Print(Box::new(Expr::Call(
                    Box::new(Expr::Var(min, 1)),
                    1,
                    vec![
                        Expr::Literal(Literal::Number(2.0)),
                        Expr::Literal(Literal::Number(1.0))
                    ]
                )))],
            )?,
            "1\n"
        );
        Ok(())
    }

    #[test]
    fn calling_a_number_fails() {
        match eval_prg(&[Stmt::Expr(Box::new(Expr::Call(number(1.0), 9, vec![])))]) {
            Err(RuntimeError {
                pos: 9,
                kind: RuntimeErrorKind::NotCallable,
            }) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn function_display_forms() {
        let ctx = Context::new();
        let def = Rc::new(FunDef {
            name: Some(ctx.symbol("foo")),
            params: vec![],
            body: vec![],
        });
        let anon = Rc::new(FunDef {
            name: None,
            params: vec![],
            body: vec![],
        });
        let env = Env::new();
        assert_eq!(
            Value::Function(Function::user(&def, &env)).to_string(),
            "<fn foo>"
        );
        assert_eq!(Value::Function(Function::user(&anon, &env)).to_string(), "<fn>");

        let mut out: Vec<u8> = Vec::new();
        let e = Evaluator::new(&mut out);
        e.define_native(&ctx.symbol("n"), 0, |_| Ok(Value::Nil));
        let native = e.globals.get(&ctx.symbol("n")).expect("native defined");
        assert_eq!(native.to_string(), "<native fn>");
    }
}
