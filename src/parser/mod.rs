//! Recursive-descent parser turning a token stream into a `Vec<Stmt>`.
//!
//! Precedence, low to high: `or` → `and` → `not` → comparison → `+`/`-` →
//! `*`/`/` → unary minus → postfix (`.prop`, `[index]`) → primary.
//!
//! `x is 5` is ambiguous between "assign 5 to x" and "is x equal to 5",
//! since `is` alone doubles as both the assignment and the equality
//! operator. Statement parsing resolves this the same way the lexer
//! resolves `times`: speculatively, with a saved position it rewinds to if
//! the guess doesn't pan out (see `parse_assignment_or_expr_stmt`).

use crate::ast::*;
use crate::error::GopaError;
use crate::token::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, GopaError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, GopaError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(GopaError::parse(format!(
                "expected {:?}, found {:?} at line {}",
                kind,
                self.peek_kind(),
                self.peek().line
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, GopaError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(GopaError::parse(format!(
                "expected an identifier, found {:?} at line {}",
                other,
                self.peek().line
            ))),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::End | TokenKind::Otherwise
        )
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, GopaError> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(stmts)
    }

    /// Parses statements until one of `terminators` is seen (without
    /// consuming it).
    fn parse_block_until(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, GopaError> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !terminators.iter().any(|t| self.check(t)) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, GopaError> {
        match self.peek_kind().clone() {
            TokenKind::Say => self.parse_say(),
            TokenKind::Print => self.parse_print(),
            TokenKind::Clear => self.parse_clear_screen(),
            TokenKind::Show => self.parse_show_table(),
            TokenKind::Ask => self.parse_ask(),
            TokenKind::If => self.parse_if(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::Do => self.parse_do_until(),
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            TokenKind::Stop => self.parse_stop_or_stop_job(),
            TokenKind::Define => self.parse_function_def(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Add => self.parse_list_add(),
            TokenKind::Remove => self.parse_list_remove(),
            TokenKind::Sort => self.parse_list_unary(Stmt::ListSort),
            TokenKind::Reverse => self.parse_list_unary(Stmt::ListReverse),
            TokenKind::Shuffle => self.parse_list_unary(Stmt::ListShuffle),
            TokenKind::Write => self.parse_write_file(),
            TokenKind::Draw => self.parse_draw(),
            TokenKind::When => self.parse_when_mouse_clicks(),
            TokenKind::Wait => self.parse_wait(),
            TokenKind::After => self.parse_after(),
            TokenKind::Every => self.parse_every(),
            TokenKind::Use => self.parse_use(),
            TokenKind::Install => self.parse_install(),
            TokenKind::Server => self.parse_server(),
            TokenKind::Job => self.parse_job(),
            TokenKind::Cron => self.parse_cron(),
            TokenKind::Increase | TokenKind::Decrease => self.parse_mutation(),
            _ => self.parse_assignment_or_expr_stmt(),
        }
    }

    // ---- simple statements ----

    fn parse_say(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let mut parts = vec![self.parse_expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            parts.push(self.parse_expression()?);
        }
        Ok(Stmt::Say(parts))
    }

    fn parse_print(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        Ok(Stmt::Print(self.parse_expression()?))
    }

    fn parse_clear_screen(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        self.expect(TokenKind::Screen)?;
        Ok(Stmt::ClearScreen)
    }

    fn parse_show_table(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        self.expect(TokenKind::Table)?;
        self.expect(TokenKind::Headers)?;
        let headers = self.parse_arithmetic()?;
        self.expect(TokenKind::Data)?;
        let rows = self.parse_arithmetic()?;
        Ok(Stmt::ShowTable { headers, rows })
    }

    fn parse_ask(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let prompt = if self.check(&TokenKind::For) {
            None
        } else {
            Some(self.parse_arithmetic()?)
        };
        self.expect(TokenKind::For)?;
        let var_name = self.expect_identifier()?;
        let ask_type = if self.check(&TokenKind::NumberType) {
            self.advance();
            AskType::Number
        } else {
            AskType::Text
        };
        Ok(Stmt::Ask {
            prompt,
            var_name,
            ask_type,
        })
    }

    fn parse_stop_or_stop_job(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        if self.check(&TokenKind::Job) {
            self.advance();
            let name = self.expect_identifier()?;
            Ok(Stmt::StopJob(name))
        } else {
            Ok(Stmt::Stop)
        }
    }

    // ---- control flow ----

    fn parse_if(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then)?;
        let then_block = self.parse_block_until(&[TokenKind::Otherwise, TokenKind::End])?;
        let else_block = if self.check(&TokenKind::Otherwise) {
            self.advance();
            Some(self.parse_block_until(&[TokenKind::End])?)
        } else {
            None
        };
        self.expect(TokenKind::End)?;
        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_repeat(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        if self.check(&TokenKind::Forever) {
            self.advance();
            let body = self.parse_block_until(&[TokenKind::End])?;
            self.expect(TokenKind::End)?;
            return Ok(Stmt::RepeatForever(body));
        }
        if self.check(&TokenKind::Until) {
            self.advance();
            let condition = self.parse_expression()?;
            let body = self.parse_block_until(&[TokenKind::End])?;
            self.expect(TokenKind::End)?;
            return Ok(Stmt::RepeatUntil { condition, body });
        }
        let count = self.parse_expression()?;
        self.expect(TokenKind::Times)?;
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::RepeatTimes { count, body })
    }

    fn parse_do_until(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let body = self.parse_block_until(&[TokenKind::Until])?;
        self.expect(TokenKind::Until)?;
        let condition = self.parse_expression()?;
        Ok(Stmt::DoUntil { body, condition })
    }

    fn parse_function_def(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let name = self.expect_identifier()?;
        let mut params = Vec::new();
        if self.check(&TokenKind::With) {
            self.advance();
            params.push(self.expect_identifier()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                params.push(self.expect_identifier()?);
            }
        }
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::FunctionDef { name, params, body })
    }

    fn parse_return(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        if self.at_statement_end() {
            Ok(Stmt::Return(None))
        } else {
            Ok(Stmt::Return(Some(self.parse_expression()?)))
        }
    }

    fn parse_match(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let expr = self.parse_expression()?;
        self.skip_newlines();
        let mut cases = Vec::new();
        while self.check(&TokenKind::When) {
            self.advance();
            let start = self.parse_arithmetic()?;
            let end = if self.check(&TokenKind::To) {
                self.advance();
                Some(self.parse_arithmetic()?)
            } else {
                None
            };
            let body = self.parse_block_until(&[TokenKind::When, TokenKind::End])?;
            cases.push(MatchCase { start, end, body });
        }
        self.expect(TokenKind::End)?;
        Ok(Stmt::Match { expr, cases })
    }

    // ---- assignment / mutation ----

    fn parse_mutation(&mut self) -> Result<Stmt, GopaError> {
        let op = if self.check(&TokenKind::Increase) {
            MutationOp::Increase
        } else {
            MutationOp::Decrease
        };
        self.advance();
        let target = self.parse_target()?;
        let value = if self.check(&TokenKind::By) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::Mutation { target, op, value })
    }

    /// A leading identifier that isn't an assignment/mutation is always a
    /// bare function call at statement scope, with possibly zero arguments
    /// (the only way to invoke a no-parameter function). This mirrors
    /// `original_source/gopa_lang/parser.py`'s `parse_assignment_or_mutation`,
    /// which falls through to `FunctionCall(name, args)` unconditionally
    /// rather than ever producing a bare identifier-reference statement.
    fn parse_assignment_or_expr_stmt(&mut self) -> Result<Stmt, GopaError> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let target = self.parse_target()?;
            if self.check(&TokenKind::Is) || self.check(&TokenKind::Becomes) {
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Stmt::Assignment { target, value });
            }
            let mut args = Vec::new();
            while !self.at_bare_call_terminator() {
                if self.at_bare_call_argument() || self.check(&TokenKind::LBracket) {
                    args.push(self.parse_expression()?);
                } else {
                    break;
                }
            }
            return Ok(Stmt::Expr(Expr::FunctionCall { name, args }));
        }
        Ok(Stmt::Expr(self.parse_expression()?))
    }

    /// An identifier with an optional chain of `.prop`/`[index]` postfixes,
    /// suitable as an assignment or mutation target. Deliberately stops
    /// short of binary operators.
    fn parse_target(&mut self) -> Result<Expr, GopaError> {
        let name = self.expect_identifier()?;
        self.parse_postfix(Expr::Identifier(name))
    }

    fn parse_postfix(&mut self, mut base: Expr) -> Result<Expr, GopaError> {
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let property = self.expect_identifier()?;
                base = Expr::PropertyAccess {
                    object: Box::new(base),
                    property,
                };
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                base = Expr::IndexAccess {
                    object: Box::new(base),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(base)
    }

    // ---- list operations ----

    fn parse_list_add(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let value = self.parse_arithmetic()?;
        self.expect(TokenKind::To)?;
        let list = self.parse_target()?;
        Ok(Stmt::ListAdd { list, value })
    }

    fn parse_list_remove(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        if self.check(&TokenKind::At) {
            self.advance();
            let index = self.parse_arithmetic()?;
            self.expect(TokenKind::From)?;
            let list = self.parse_target()?;
            Ok(Stmt::ListRemove {
                list,
                value: None,
                index: Some(index),
            })
        } else {
            let value = self.parse_arithmetic()?;
            self.expect(TokenKind::From)?;
            let list = self.parse_target()?;
            Ok(Stmt::ListRemove {
                list,
                value: Some(value),
                index: None,
            })
        }
    }

    fn parse_list_unary(&mut self, build: impl Fn(Expr) -> Stmt) -> Result<Stmt, GopaError> {
        self.advance();
        let list = self.parse_target()?;
        Ok(build(list))
    }

    // ---- file I/O ----

    fn parse_write_file(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let content = self.parse_arithmetic()?;
        self.expect(TokenKind::To)?;
        self.expect(TokenKind::File)?;
        let filename = self.parse_arithmetic()?;
        Ok(Stmt::WriteFile { content, filename })
    }

    // ---- graphics ----

    fn parse_draw(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        match self.peek_kind().clone() {
            TokenKind::Circle => {
                self.advance();
                self.expect(TokenKind::At)?;
                let x = self.parse_arithmetic()?;
                self.expect(TokenKind::Comma)?;
                let y = self.parse_arithmetic()?;
                self.expect(TokenKind::Size)?;
                let size = self.parse_arithmetic()?;
                self.expect(TokenKind::Color)?;
                let color = self.parse_arithmetic()?;
                Ok(Stmt::DrawCircle { x, y, size, color })
            }
            TokenKind::Rectangle => {
                self.advance();
                let (x1, y1, x2, y2) = self.parse_from_to_corners()?;
                self.expect(TokenKind::Color)?;
                let color = self.parse_arithmetic()?;
                Ok(Stmt::DrawRectangle {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                })
            }
            TokenKind::Line => {
                self.advance();
                let (x1, y1, x2, y2) = self.parse_from_to_corners()?;
                self.expect(TokenKind::Color)?;
                let color = self.parse_arithmetic()?;
                Ok(Stmt::DrawLine {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                })
            }
            TokenKind::Text => {
                self.advance();
                let text = self.parse_arithmetic()?;
                self.expect(TokenKind::At)?;
                let x = self.parse_arithmetic()?;
                self.expect(TokenKind::Comma)?;
                let y = self.parse_arithmetic()?;
                self.expect(TokenKind::Size)?;
                let size = self.parse_arithmetic()?;
                self.expect(TokenKind::Color)?;
                let color = self.parse_arithmetic()?;
                Ok(Stmt::DrawText {
                    text,
                    x,
                    y,
                    size,
                    color,
                })
            }
            other => Err(GopaError::parse(format!(
                "expected circle, rectangle, line, or text after 'draw', found {other:?}"
            ))),
        }
    }

    fn parse_from_to_corners(&mut self) -> Result<(Expr, Expr, Expr, Expr), GopaError> {
        self.expect(TokenKind::From)?;
        let x1 = self.parse_arithmetic()?;
        self.expect(TokenKind::Comma)?;
        let y1 = self.parse_arithmetic()?;
        self.expect(TokenKind::To)?;
        let x2 = self.parse_arithmetic()?;
        self.expect(TokenKind::Comma)?;
        let y2 = self.parse_arithmetic()?;
        Ok((x1, y1, x2, y2))
    }

    fn parse_when_mouse_clicks(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        self.expect(TokenKind::Mouse)?;
        self.expect(TokenKind::Clicks)?;
        self.expect(TokenKind::On)?;
        let canvas = self.parse_arithmetic()?;
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::WhenMouseClicks { canvas, body })
    }

    // ---- timing ----

    fn parse_wait(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let seconds = self.parse_arithmetic()?;
        self.expect(TokenKind::Seconds)?;
        Ok(Stmt::Wait(seconds))
    }

    fn parse_after(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let seconds = self.parse_arithmetic()?;
        self.expect(TokenKind::Seconds)?;
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::After { seconds, body })
    }

    fn parse_every(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let seconds = self.parse_arithmetic()?;
        self.expect(TokenKind::Seconds)?;
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::Every { seconds, body })
    }

    fn parse_job(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Every)?;
        let seconds = self.parse_arithmetic()?;
        self.expect(TokenKind::Seconds)?;
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::Job {
            name,
            seconds,
            body,
        })
    }

    fn parse_cron(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let schedule = match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                s
            }
            other => {
                return Err(GopaError::parse(format!(
                    "expected a cron schedule string, found {other:?}"
                )))
            }
        };
        let body = self.parse_block_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::Cron { schedule, body })
    }

    // ---- packages / FFI ----

    fn parse_use(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        if self.check(&TokenKind::Python) {
            self.advance();
            let module = self.expect_identifier()?;
            self.expect(TokenKind::To)?;
            let alias = self.expect_identifier()?;
            Ok(Stmt::UsePython { module, alias })
        } else {
            let name = self.expect_identifier()?;
            Ok(Stmt::Use(name))
        }
    }

    fn parse_install(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        let name = self.expect_identifier()?;
        Ok(Stmt::Install(name))
    }

    fn parse_server(&mut self) -> Result<Stmt, GopaError> {
        self.advance();
        self.expect(TokenKind::On)?;
        self.expect(TokenKind::Port)?;
        let port = self.parse_arithmetic()?;
        self.skip_newlines();
        let mut handlers = Vec::new();
        while self.check(&TokenKind::When) {
            self.advance();
            let method = self.expect_identifier()?;
            let path = match self.peek_kind().clone() {
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                other => {
                    return Err(GopaError::parse(format!(
                        "expected a route path string, found {other:?}"
                    )))
                }
            };
            let body = self.parse_block_until(&[TokenKind::End])?;
            self.expect(TokenKind::End)?;
            handlers.push(ServerHandler { method, path, body });
            self.skip_newlines();
        }
        self.expect(TokenKind::End)?;
        Ok(Stmt::Server { port, handlers })
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> Result<Expr, GopaError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, GopaError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, GopaError> {
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, GopaError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, GopaError> {
        let mut left = self.parse_arithmetic()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Is | TokenKind::Equals => BinaryOperator::Equals,
                TokenKind::DoesNotEqual => BinaryOperator::DoesNotEqual,
                TokenKind::IsGreaterThan => BinaryOperator::IsGreaterThan,
                TokenKind::IsLessThan => BinaryOperator::IsLessThan,
                TokenKind::IsAtLeast => BinaryOperator::IsAtLeast,
                TokenKind::IsAtMost => BinaryOperator::IsAtMost,
                _ => break,
            };
            self.advance();
            let right = self.parse_arithmetic()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_arithmetic(&mut self) -> Result<Expr, GopaError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Plus,
                TokenKind::Minus => BinaryOperator::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, GopaError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::TimesOp => BinaryOperator::Times,
                TokenKind::Divided => BinaryOperator::DividedBy,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, GopaError> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, GopaError> {
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, GopaError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Yes | TokenKind::True => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            TokenKind::No | TokenKind::False => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            TokenKind::Nothing => {
                self.advance();
                Ok(Expr::Nothing)
            }
            TokenKind::Pi => {
                self.advance();
                Ok(Expr::Pi)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.at_bare_call_argument() {
                    self.parse_bare_call(name)
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::Dictionary => self.parse_dictionary_literal(),
            TokenKind::Object => self.parse_object_literal(),
            TokenKind::Find => self.parse_find_or_string_find(),
            TokenKind::Filter => self.parse_filter(),
            TokenKind::Map => self.parse_map(),
            TokenKind::Split => self.parse_string_split(),
            TokenKind::Join => self.parse_string_join(),
            TokenKind::Replace => self.parse_string_replace(),
            TokenKind::Get => self.parse_get_request(),
            TokenKind::Read => self.parse_read_file(),
            TokenKind::Create => self.parse_create_canvas(),
            TokenKind::Python => self.parse_python_call(),
            other => Err(GopaError::parse(format!(
                "unexpected token {other:?} at line {}",
                self.peek().line
            ))),
        }
    }

    fn parse_list_literal(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            items.push(self.parse_expression()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                items.push(self.parse_expression()?);
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::ListLiteral(items))
    }

    fn parse_dictionary_literal(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        self.expect(TokenKind::LBracket)?;
        let mut pairs = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            pairs.push(self.parse_dict_pair()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                pairs.push(self.parse_dict_pair()?);
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::DictionaryLiteral(pairs))
    }

    fn parse_dict_pair(&mut self) -> Result<(Expr, Expr), GopaError> {
        let key = self.parse_arithmetic()?;
        self.expect(TokenKind::To)?;
        let value = self.parse_arithmetic()?;
        Ok((key, value))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        self.expect(TokenKind::LBracket)?;
        let mut props = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            props.push(self.parse_object_prop()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                props.push(self.parse_object_prop()?);
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::ObjectLiteral(props))
    }

    fn parse_object_prop(&mut self) -> Result<(String, Expr), GopaError> {
        let name = self.expect_identifier()?;
        self.expect(TokenKind::To)?;
        let value = self.parse_arithmetic()?;
        Ok((name, value))
    }

    /// True when the current token can open a call argument under the
    /// call-without-parens heuristic: `greet "world"` parses as
    /// `greet("world")`. Matches `original_source/gopa_lang/parser.py`'s
    /// `parse_factor`, which checks this set only after ruling out `.`/`[`/
    /// `at` postfix forms on the identifier just consumed.
    fn at_bare_call_argument(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Identifier(_)
                | TokenKind::Yes
                | TokenKind::True
                | TokenKind::No
                | TokenKind::False
                | TokenKind::Nothing
                | TokenKind::Pi
                | TokenKind::Not
        )
    }

    /// True when the current token ends a bare call's argument list.
    fn at_bare_call_terminator(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::End
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Then
                | TokenKind::Otherwise
                | TokenKind::Until
                | TokenKind::Times
                | TokenKind::Do
                | TokenKind::From
                | TokenKind::At
                | TokenKind::To
                | TokenKind::Where
                | TokenKind::Using
                | TokenKind::By
                | TokenKind::With
        )
    }

    /// `name` followed by a greedy run of argument expressions, stopping at
    /// the first terminator token. `greet "world", 5` parses as
    /// `greet("world", 5)` with no comma required between arguments either.
    fn parse_bare_call(&mut self, name: String) -> Result<Expr, GopaError> {
        let mut args = Vec::new();
        while !self.at_bare_call_terminator() {
            if self.at_bare_call_argument() {
                args.push(self.parse_expression()?);
            } else {
                break;
            }
        }
        Ok(Expr::FunctionCall { name, args })
    }

    fn parse_find_or_string_find(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let value = self.parse_factor_like()?;
        self.expect(TokenKind::In)?;
        if self.check(&TokenKind::Text) {
            self.advance();
            let string = self.parse_factor_like()?;
            Ok(Expr::StringFind {
                string: Box::new(string),
                pattern: Box::new(value),
            })
        } else {
            let in_expr = self.parse_factor_like()?;
            Ok(Expr::Find {
                value: Box::new(value),
                in_expr: Box::new(in_expr),
            })
        }
    }

    fn parse_filter(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let list = self.parse_factor_like()?;
        self.expect(TokenKind::Where)?;
        let condition = self.parse_expression()?;
        Ok(Expr::Filter {
            list: Box::new(list),
            condition: Box::new(condition),
        })
    }

    fn parse_map(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let list = self.parse_factor_like()?;
        self.expect(TokenKind::Using)?;
        let transform = self.parse_expression()?;
        Ok(Expr::Map {
            list: Box::new(list),
            transform: Box::new(transform),
        })
    }

    fn parse_string_split(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let string = self.parse_factor_like()?;
        self.expect(TokenKind::By)?;
        let delimiter = self.parse_factor_like()?;
        Ok(Expr::StringSplit {
            string: Box::new(string),
            delimiter: Box::new(delimiter),
        })
    }

    fn parse_string_join(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let list = self.parse_factor_like()?;
        self.expect(TokenKind::With)?;
        let delimiter = self.parse_factor_like()?;
        Ok(Expr::StringJoin {
            list: Box::new(list),
            delimiter: Box::new(delimiter),
        })
    }

    fn parse_string_replace(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let old = self.parse_factor_like()?;
        self.expect(TokenKind::With)?;
        let new = self.parse_factor_like()?;
        self.expect(TokenKind::In)?;
        let string = self.parse_factor_like()?;
        Ok(Expr::StringReplace {
            string: Box::new(string),
            old: Box::new(old),
            new: Box::new(new),
        })
    }

    fn parse_get_request(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        let url = self.parse_factor_like()?;
        let params = if self.check(&TokenKind::Using) {
            self.advance();
            Some(Box::new(self.parse_factor_like()?))
        } else {
            None
        };
        Ok(Expr::GetRequest {
            url: Box::new(url),
            params,
        })
    }

    fn parse_read_file(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        self.expect(TokenKind::File)?;
        let filename = self.parse_factor_like()?;
        Ok(Expr::ReadFile {
            filename: Box::new(filename),
        })
    }

    fn parse_create_canvas(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        self.expect(TokenKind::Canvas)?;
        let width = self.parse_factor_like()?;
        self.expect(TokenKind::By)?;
        let height = self.parse_factor_like()?;
        Ok(Expr::CreateCanvas {
            width: Box::new(width),
            height: Box::new(height),
        })
    }

    fn parse_python_call(&mut self) -> Result<Expr, GopaError> {
        self.advance();
        self.expect(TokenKind::Call)?;
        let mut module_attr = self.expect_identifier()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            module_attr.push('.');
            module_attr.push_str(&self.expect_identifier()?);
        }
        let mut args = Vec::new();
        if self.check(&TokenKind::With) {
            self.advance();
            args.push(self.parse_arithmetic()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_arithmetic()?);
            }
        }
        Ok(Expr::PythonCall { module_attr, args })
    }

    /// A postfix-extended primary, used as the operand of constructs like
    /// `filter LIST where ...` that bind tighter than full expressions but
    /// still need `.prop`/`[index]` support.
    fn parse_factor_like(&mut self) -> Result<Expr, GopaError> {
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(src: &str) -> Vec<Stmt> {
        let tokens = Lexer::tokenize(src).unwrap();
        parse(tokens).unwrap()
    }

    #[test]
    fn parses_assignment_not_comparison() {
        let stmts = parse_source("x is 5\n");
        assert!(matches!(stmts[0], Stmt::Assignment { .. }));
    }

    #[test]
    fn parses_equality_inside_condition() {
        let stmts = parse_source("if x is 5 then\nsay \"hi\"\nend\n");
        match &stmts[0] {
            Stmt::If { condition, .. } => {
                assert!(matches!(
                    condition,
                    Expr::BinaryOp {
                        op: BinaryOperator::Equals,
                        ..
                    }
                ));
            }
            _ => panic!("expected an if statement"),
        }
    }

    #[test]
    fn parses_repeat_times_loop() {
        let stmts = parse_source("repeat 3 times\nsay \"hi\"\nend\n");
        assert!(matches!(stmts[0], Stmt::RepeatTimes { .. }));
    }

    #[test]
    fn parses_function_def_and_bare_call() {
        let stmts = parse_source("define greet with name\nsay name\nend\ngreet \"world\"\n");
        assert!(matches!(stmts[0], Stmt::FunctionDef { .. }));
        match &stmts[1] {
            Stmt::Expr(Expr::FunctionCall { name, args }) => {
                assert_eq!(name, "greet");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected a bare function call, got {other:?}"),
        }
    }

    #[test]
    fn bare_call_stops_at_terminator_and_takes_multiple_args() {
        let stmts = parse_source("x is add_two 3 4\n");
        match &stmts[0] {
            Stmt::Assignment { value, .. } => match value {
                Expr::FunctionCall { name, args } => {
                    assert_eq!(name, "add_two");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected a function call, got {other:?}"),
            },
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn bare_identifier_statement_is_a_zero_arg_call() {
        let stmts = parse_source("tick\n");
        match &stmts[0] {
            Stmt::Expr(Expr::FunctionCall { name, args }) => {
                assert_eq!(name, "tick");
                assert!(args.is_empty());
            }
            other => panic!("expected a zero-arg function call, got {other:?}"),
        }
    }

    #[test]
    fn identifier_not_followed_by_a_value_is_not_a_call() {
        let stmts = parse_source("x is 5\ny is x\n");
        match &stmts[1] {
            Stmt::Assignment { value, .. } => {
                assert!(matches!(value, Expr::Identifier(name) if name == "x"));
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn parses_list_literal_and_index_access() {
        let stmts = parse_source("x is [1, 2, 3]\ny is x[0]\n");
        assert!(matches!(stmts[0], Stmt::Assignment { .. }));
        match &stmts[1] {
            Stmt::Assignment { value, .. } => {
                assert!(matches!(value, Expr::IndexAccess { .. }));
            }
            _ => panic!("expected an assignment"),
        }
    }
}
