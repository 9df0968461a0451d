//! Recursive-descent parser.
//!
//! The parser pulls tokens straight off the scanner with two tokens of
//! lookahead (the second one decides between function declarations and
//! lambda expressions).  Errors do not stop the parse: each bad declaration
//! is reported, the token stream is synchronized to the next statement
//! boundary and parsing resumes, so one pass can report several errors.

use std::mem;
use std::rc::Rc;

use crate::ast::{BinOp, Expr, FunDef, Literal, LogicalOp, Stmt, UnaryOp};
use crate::ctx::{Context, Symbol};
use crate::diag::{CompileError, ErrorContext, Position, SyntaxError};
use crate::scanner::Scanner;
use crate::token::Token;

pub struct Parser<'s> {
    scanner: Scanner<'s>,
    current_token: Token,
    current_pos: Position,
    next_token: Token,
    next_pos: Position,
    errors: Vec<CompileError>,
}

impl<'s> Parser<'s> {
    pub fn new(input: &'s str, ctx: Rc<Context>) -> Parser<'s> {
        Parser {
            scanner: Scanner::new(input, ctx),
            current_token: Token::Eof, // we haven't scanned anything yet
            current_pos: 1,
            next_token: Token::Eof,
            next_pos: 1,
            errors: Vec::new(),
        }
    }

    /// Parse a whole program.
    ///
    /// Returns the statement list only when no lexical or syntactic error
    /// was recorded; otherwise all recorded errors are returned.
    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, Vec<CompileError>> {
        // Two advances to fill both lookahead slots.
        self.advance();
        self.advance();

        let mut prg = vec![];
        while self.current_token != Token::Eof {
            if let Some(stmt) = self.declaration() {
                prg.push(stmt);
            }
        }

        if self.errors.is_empty() {
            Ok(prg)
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    /// Parse a single expression.  Test scaffolding.
    #[allow(dead_code)]
    fn parse_expression(&mut self) -> Result<Expr, Vec<CompileError>> {
        self.advance();
        self.advance();
        match self.expression() {
            Ok(expr) if self.errors.is_empty() => Ok(expr),
            Ok(_) => Err(mem::take(&mut self.errors)),
            Err(e) => {
                self.errors.push(e);
                Err(mem::take(&mut self.errors))
            }
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = match (&self.current_token, &self.next_token) {
            (Token::Var, _) => self.var_decl(),
            (Token::Fun, Token::Identifier(_)) => self.fun_decl(),
            _ => self.statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    /// Parse variable declaration.
    /// Current token is Token::Var.
    fn var_decl(&mut self) -> Result<Stmt, CompileError> {
        self.advance();
        let name = self.identifier("variable name")?;
        let init = if self.current_token == Token::Equal {
            self.advance();
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.consume(Token::Semicolon, "';' after variable declaration")?;
        Ok(Stmt::VarDecl(name, init))
    }

    /// Parse function declaration.
    /// Current token is Token::Fun, next is the function name.
    fn fun_decl(&mut self) -> Result<Stmt, CompileError> {
        self.advance();
        let name = self.identifier("function name")?;
        self.consume(Token::LeftParen, "'(' after function name")?;
        let (params, body) = self.finish_function()?;
        Ok(Stmt::FunDecl(Rc::new(FunDef {
            name: Some(name),
            params,
            body,
        })))
    }

    /// Parse the parameter list and body common to declarations and lambdas.
    /// The opening '(' has been consumed.
    fn finish_function(&mut self) -> Result<(Vec<Symbol>, Vec<Stmt>), CompileError> {
        let mut params = vec![];
        if self.current_token != Token::RightParen {
            loop {
                if params.len() >= 255 {
                    let e = self.error_here(SyntaxError::TooManyParameters);
                    self.errors.push(e);
                }
                params.push(self.identifier("parameter name")?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.consume(Token::RightParen, "')' after parameters")?;
        self.consume(Token::LeftCurly, "'{' before function body")?;
        let body = self.block_body()?;
        Ok((params, body))
    }

    fn identifier(&mut self, what: &'static str) -> Result<Symbol, CompileError> {
        if let Token::Identifier(id) = self.current_token.clone() {
            self.advance();
            Ok(id)
        } else {
            Err(self.error_here(SyntaxError::Expected(what)))
        }
    }

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        match self.current_token {
            Token::Print => {
                self.advance();
                let expr = Box::new(self.expression()?);
                self.consume(Token::Semicolon, "';' after value")?;
                Ok(Stmt::Print(expr))
            }
            Token::LeftCurly => {
                self.advance();
                Ok(Stmt::Block(self.block_body()?))
            }
            Token::If => {
                self.advance();
                self.consume(Token::LeftParen, "'(' after 'if'")?;
                let cond = Box::new(self.expression()?);
                self.consume(Token::RightParen, "')' after if condition")?;
                let then_branch = Box::new(self.statement()?);
                let else_branch = if self.current_token == Token::Else {
                    self.advance();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then_branch, else_branch))
            }
            Token::While => {
                self.advance();
                self.consume(Token::LeftParen, "'(' after 'while'")?;
                let cond = Box::new(self.expression()?);
                self.consume(Token::RightParen, "')' after condition")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While(cond, body))
            }
            Token::For => self.for_stmt(),
            Token::Return => {
                let pos = self.current_pos;
                self.advance();
                let value = if self.current_token == Token::Semicolon {
                    None
                } else {
                    Some(Box::new(self.expression()?))
                };
                self.consume(Token::Semicolon, "';' after return value")?;
                Ok(Stmt::Return(pos, value))
            }
            Token::Break => {
                let pos = self.current_pos;
                self.advance();
                self.consume(Token::Semicolon, "';' after 'break'")?;
                Ok(Stmt::Break(pos))
            }
            _ => {
                let expr = Box::new(self.expression()?);
                self.consume(Token::Semicolon, "';' after value")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Lower `for (init; cond; incr) body` to its while-loop equivalent.
    /// Current token is Token::For.
    fn for_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.advance();
        self.consume(Token::LeftParen, "'(' after 'for'")?;

        let initializer = match self.current_token {
            Token::Semicolon => {
                self.advance();
                None
            }
            Token::Var => Some(self.var_decl()?),
            _ => {
                let expr = Box::new(self.expression()?);
                self.consume(Token::Semicolon, "';' after loop initializer")?;
                Some(Stmt::Expr(expr))
            }
        };

        let condition = if self.current_token == Token::Semicolon {
            Box::new(Expr::Literal(Literal::Bool(true)))
        } else {
            Box::new(self.expression()?)
        };
        self.consume(Token::Semicolon, "';' after loop condition")?;

        let increment = if self.current_token == Token::RightParen {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(Token::RightParen, "')' after for clauses")?;

        let mut body = self.statement()?;
        if let Some(incr) = increment {
            body = Stmt::Block(vec![body, Stmt::Expr(Box::new(incr))]);
        }
        body = Stmt::While(condition, Box::new(body));
        if let Some(init) = initializer {
            body = Stmt::Block(vec![init, body]);
        }
        Ok(body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = vec![];
        while self.current_token != Token::RightCurly && self.current_token != Token::Eof {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.consume(Token::RightCurly, "'}' after block")?;
        Ok(stmts)
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        self.comma()
    }

    fn comma(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.assignment()?;
        while self.current_token == Token::Comma {
            let pos = self.current_pos;
            self.advance();
            expr = Expr::Binary(
                Box::new(expr),
                BinOp::Comma,
                pos,
                Box::new(self.assignment()?),
            );
        }
        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.ternary()?;
        if self.current_token == Token::Equal {
            let pos = self.current_pos;
            self.advance();
            let rhs = self.assignment()?;
            return match lhs {
                Expr::Var(var, _) => Ok(Expr::Assign(var, pos, Box::new(rhs))),
                // The right-hand side has been consumed; only the target is
                // bad, so report and hand back the left side.
                lhs => {
                    self.errors.push(CompileError {
                        pos,
                        context: ErrorContext::Token(Token::Equal.to_string()),
                        error: SyntaxError::InvalidAssignmentTarget,
                    });
                    Ok(lhs)
                }
            };
        }
        Ok(lhs)
    }

    fn ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.logic_or()?;
        if self.current_token == Token::Question {
            self.advance();
            let then_branch = Box::new(self.expression()?);
            self.consume(
                Token::Colon,
                "':' after then branch of conditional expression",
            )?;
            let else_branch = Box::new(self.ternary()?);
            return Ok(Expr::Ternary(Box::new(cond), then_branch, else_branch));
        }
        Ok(cond)
    }

    fn logic_or(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.logic_and()?;
        while self.current_token == Token::Or {
            self.advance();
            expr = Expr::Logical(Box::new(expr), LogicalOp::Or, Box::new(self.logic_and()?));
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.equality()?;
        while self.current_token == Token::And {
            self.advance();
            expr = Expr::Logical(Box::new(expr), LogicalOp::And, Box::new(self.equality()?));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.comparison()?;
        loop {
            let op = match self.current_token {
                Token::EqualEqual => BinOp::Equal,
                Token::BangEqual => BinOp::NotEqual,
                _ => break,
            };
            let pos = self.current_pos;
            self.advance();
            expr = Expr::Binary(Box::new(expr), op, pos, Box::new(self.comparison()?));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.term()?;
        loop {
            let op = match self.current_token {
                Token::Less => BinOp::Less,
                Token::LessEqual => BinOp::LessEqual,
                Token::Greater => BinOp::Greater,
                Token::GreaterEqual => BinOp::GreaterEqual,
                _ => break,
            };
            let pos = self.current_pos;
            self.advance();
            expr = Expr::Binary(Box::new(expr), op, pos, Box::new(self.term()?));
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.current_pos;
            self.advance();
            expr = Expr::Binary(Box::new(expr), op, pos, Box::new(self.factor()?));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.current_token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            let pos = self.current_pos;
            self.advance();
            expr = Expr::Binary(Box::new(expr), op, pos, Box::new(self.unary()?));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.current_token {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.call(),
        };
        let pos = self.current_pos;
        self.advance();
        Ok(Expr::Unary(op, pos, Box::new(self.unary()?)))
    }

    fn call(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        while self.current_token == Token::LeftParen {
            let pos = self.current_pos;
            self.advance();
            let mut args = vec![];
            if self.current_token != Token::RightParen {
                loop {
                    if args.len() >= 255 {
                        let e = self.error_here(SyntaxError::TooManyArguments);
                        self.errors.push(e);
                    }
                    // Arguments sit above the comma operator so ',' separates
                    // them instead of sequencing.
                    args.push(self.assignment()?);
                    if self.current_token != Token::Comma {
                        break;
                    }
                    self.advance();
                }
            }
            self.consume(Token::RightParen, "')' after arguments")?;
            expr = Expr::Call(Box::new(expr), pos, args);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        match self.current_token.clone() {
            Token::Identifier(sym) => {
                let pos = self.current_pos;
                self.advance();
                Ok(Expr::Var(sym, pos))
            }
            Token::Nil => {
                self.advance();
                Ok(Expr::Literal(Literal::Nil))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(Token::RightParen, "')' after expression")?;
                Ok(Expr::Group(Box::new(expr)))
            }
            Token::Fun => {
                self.advance();
                self.consume(Token::LeftParen, "'(' after 'fun'")?;
                let (params, body) = self.finish_function()?;
                Ok(Expr::Lambda(Rc::new(FunDef {
                    name: None,
                    params,
                    body,
                })))
            }
            // Error productions: a binary operator with no left operand.
            Token::EqualEqual | Token::BangEqual => self.missing_left_operand(Self::equality),
            Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => {
                self.missing_left_operand(Self::comparison)
            }
            Token::Plus => self.missing_left_operand(Self::term),
            Token::Star | Token::Slash => self.missing_left_operand(Self::factor),
            _ => Err(self.error_here(SyntaxError::ExpectedExpression)),
        }
    }

    /// Report the operator under the cursor as lacking a left operand, then
    /// consume its right side at the operator's own precedence.  The
    /// placeholder node is never evaluated because the error blocks that.
    fn missing_left_operand(
        &mut self,
        rest: fn(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        let e = self.error_here(SyntaxError::MissingLeftOperand);
        self.errors.push(e);
        self.advance();
        rest(self)?;
        Ok(Expr::Literal(Literal::Nil))
    }

    fn advance(&mut self) -> &Token {
        self.current_token = mem::replace(&mut self.next_token, Token::Eof);
        self.current_pos = self.next_pos;
        loop {
            match self.scanner.get_token() {
                Ok((pos, token)) => {
                    self.next_pos = pos;
                    self.next_token = token;
                    break;
                }
                // The scanner consumed the offending characters; record the
                // error and keep pulling.
                Err(e) => self.errors.push(e),
            }
        }
        &self.current_token
    }

    fn consume(&mut self, expected: Token, what: &'static str) -> Result<(), CompileError> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(SyntaxError::Expected(what)))
        }
    }

    fn error_here(&self, error: SyntaxError) -> CompileError {
        let context = match &self.current_token {
            Token::Eof => ErrorContext::Eof,
            t => ErrorContext::Token(t.to_string()),
        };
        CompileError {
            pos: self.current_pos,
            context,
            error,
        }
    }

    /// Discard tokens until just past a ';' or just before a token that can
    /// begin a declaration, so parsing can resume after an error.
    fn synchronize(&mut self) {
        loop {
            match self.current_token {
                Token::Eof => return,
                Token::Semicolon => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            };
            match self.current_token {
                Token::Class
                | Token::Fun
                | Token::Var
                | Token::For
                | Token::If
                | Token::While
                | Token::Print
                | Token::Return => return,
                _ => (),
            }
        }
    }
}
