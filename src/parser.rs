use std::rc::Rc;

use tracing::debug;

use crate::{
    ast,
    common::{Diagnostics, Error},
    token::{Literal, Token, TokenKind},
};

const MAX_ARGS: usize = 255;

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    diagnostics: &'a mut Diagnostics,
    function_depth: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must not be empty.
    fn new(tokens: &'a [Token], diagnostics: &'a mut Diagnostics) -> Self {
        Parser {
            tokens,
            current: 0,
            diagnostics,
            function_depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_end() && self.peek().kind == kind
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|kind| self.check(*kind)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<&Token, Error> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.peek().error_at(message))
        }
    }

    /// Discards tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.at_end() {
            if self.previous().kind == TokenKind::Semicolon || self.peek().kind.begins_statement()
            {
                return;
            }
            self.advance();
        }
    }

    fn declaration(&mut self) -> Option<ast::Stmt> {
        let result = if self.matches(&[TokenKind::Fun]) {
            self.parse_function()
        } else if self.matches(&[TokenKind::Var]) {
            self.parse_var_decl()
        } else {
            self.parse_statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.diagnostics.report(error);
                self.synchronize();
                None
            }
        }
    }

    fn parse_function(&mut self) -> Result<ast::Stmt, Error> {
        let ident = self
            .expect(TokenKind::Ident, "Expect function name.")?
            .clone();
        self.expect(TokenKind::LeftParen, "Expect '(' after function name.")?;

        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if parameters.len() >= MAX_ARGS {
                    let error = self.peek().error_at("Can't have more than 255 parameters.");
                    self.diagnostics.report(error);
                }
                parameters.push(
                    self.expect(TokenKind::Ident, "Expect parameter name.")?
                        .clone(),
                );
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.expect(TokenKind::LeftBrace, "Expect '{' before function body.")?;

        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;

        Ok(Rc::new(ast::FunDecl {
            ident,
            parameters,
            body: body?,
        })
        .into())
    }

    fn parse_var_decl(&mut self) -> Result<ast::Stmt, Error> {
        let message = if self.peek().kind == TokenKind::Number {
            "Expected a variable name. Variable name cannot be a number."
        } else {
            "Expected a variable name."
        };
        let ident = self.expect(TokenKind::Ident, message)?.clone();

        if self.check(TokenKind::String) {
            return Err(self.peek().error_at("Expected '=' after variable name."));
        }

        let init = if self.matches(&[TokenKind::Equal]) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let message = match init {
            Some(_) => "Expected a ';' after variable declaration.".to_string(),
            None => format!(
                "Expected initialiser after declaration of variable '{}' but got '{}'.",
                ident.lexeme,
                self.peek().lexeme
            ),
        };
        self.expect(TokenKind::Semicolon, &message)?;

        Ok(ast::VarDecl { ident, init }.into())
    }

    fn parse_statement(&mut self) -> Result<ast::Stmt, Error> {
        if self.matches(&[TokenKind::For]) {
            return self.parse_for();
        }
        if self.matches(&[TokenKind::If]) {
            return self.parse_if();
        }
        if self.matches(&[TokenKind::Print]) {
            let keyword = self.previous().clone();
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "Expected ';' at the end of the line.")?;
            return Ok(ast::PrintStmt { keyword, expr }.into());
        }
        if self.matches(&[TokenKind::Return]) {
            return self.parse_return();
        }
        if self.matches(&[TokenKind::While]) {
            return self.parse_while();
        }
        if self.matches(&[TokenKind::LeftBrace]) {
            return Ok(ast::Block {
                stmts: self.parse_block()?,
            }
            .into());
        }

        self.parse_expr_stmt()
    }

    fn parse_expr_stmt(&mut self) -> Result<ast::Stmt, Error> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(ast::ExprStmt { expr }.into())
    }

    /// Parses the statements of a block whose `{` was already consumed.
    fn parse_block(&mut self) -> Result<Vec<ast::Stmt>, Error> {
        let mut stmts = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }

        self.expect(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<ast::Stmt, Error> {
        self.expect(TokenKind::LeftParen, "'(' after the 'if' is expected.")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RightParen, "')' after if condition is expected.")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(ast::IfStmt {
            condition,
            then_branch,
            else_branch,
        }
        .into())
    }

    fn parse_while(&mut self) -> Result<ast::Stmt, Error> {
        self.expect(TokenKind::LeftParen, "'(' after 'while' is expected")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RightParen, "')' after condition is expected")?;
        let body = Box::new(self.parse_statement()?);

        Ok(ast::WhileStmt { condition, body }.into())
    }

    /// `for` has no node of its own: it becomes a `while` inside a block.
    fn parse_for(&mut self) -> Result<ast::Stmt, Error> {
        self.expect(TokenKind::LeftParen, "'(' after 'for' is expected")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.parse_var_decl()?)
        } else {
            Some(self.parse_expr_stmt()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';' after loop condition is expected")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.parse_statement()?;

        if let Some(increment) = increment {
            body = ast::Block {
                stmts: vec![body, ast::ExprStmt { expr: increment }.into()],
            }
            .into();
        }

        body = ast::WhileStmt {
            condition: condition.unwrap_or_else(|| {
                ast::Lit {
                    value: ast::LitValue::Bool(true),
                }
                .into()
            }),
            body: Box::new(body),
        }
        .into();

        if let Some(initializer) = initializer {
            body = ast::Block {
                stmts: vec![initializer, body],
            }
            .into();
        }

        Ok(body)
    }

    fn parse_return(&mut self) -> Result<ast::Stmt, Error> {
        let keyword = self.previous().clone();
        if self.function_depth == 0 {
            self.diagnostics
                .report(keyword.error_at("Can't return from top-level code."));
        }

        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after return value.")?;

        Ok(ast::ReturnStmt { keyword, value }.into())
    }

    fn parse_expr(&mut self) -> Result<ast::Expr, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<ast::Expr, Error> {
        let expr = self.parse_or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.parse_assignment()?;

            return match expr {
                ast::Expr::Var(var_expr) => Ok(ast::AssignExpr {
                    ident: var_expr.ident,
                    value: Box::new(value),
                }
                .into()),
                target => {
                    // reported, but parsing carries on with the left-hand side
                    self.diagnostics
                        .report(equals.error_at("Invalid assignment target."));
                    Ok(target)
                }
            };
        }

        Ok(expr)
    }

    fn parse_logical(
        &mut self,
        kind: TokenKind,
        operand: fn(&mut Self) -> Result<ast::Expr, Error>,
    ) -> Result<ast::Expr, Error> {
        let mut expr = operand(self)?;

        while self.matches(&[kind]) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = ast::LogicalExpr {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            }
            .into();
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<ast::Expr, Error> {
        self.parse_logical(TokenKind::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<ast::Expr, Error> {
        self.parse_logical(TokenKind::And, Self::parse_equality)
    }

    /// One left-associative binary precedence level.
    fn parse_binary(
        &mut self,
        kinds: &[TokenKind],
        operand: fn(&mut Self) -> Result<ast::Expr, Error>,
    ) -> Result<ast::Expr, Error> {
        let mut expr = operand(self)?;

        while self.matches(kinds) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = ast::BinaryExpr {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            }
            .into();
        }

        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<ast::Expr, Error> {
        self.parse_binary(
            &[TokenKind::BangEqual, TokenKind::EqualEqual],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<ast::Expr, Error> {
        self.parse_binary(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Lesser,
                TokenKind::LesserEqual,
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<ast::Expr, Error> {
        self.parse_binary(
            &[TokenKind::Minus, TokenKind::Plus, TokenKind::Ampersand],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<ast::Expr, Error> {
        self.parse_binary(&[TokenKind::Slash, TokenKind::Star], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<ast::Expr, Error> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let expr = self.parse_unary()?;
            return Ok(ast::UnaryExpr {
                op,
                expr: Box::new(expr),
            }
            .into());
        }

        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<ast::Expr, Error> {
        let mut expr = self.parse_primary()?;

        while self.matches(&[TokenKind::LeftParen]) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    if args.len() >= MAX_ARGS {
                        let error = self.peek().error_at("Can't have more than 255 arguments.");
                        self.diagnostics.report(error);
                    }
                    args.push(self.parse_expr()?);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
            }

            let paren = self
                .expect(TokenKind::RightParen, "Expect ')' after arguments.")?
                .clone();

            expr = ast::CallExpr {
                callee: Box::new(expr),
                paren,
                args,
            }
            .into();
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ast::Expr, Error> {
        let token = self.peek().clone();

        let value = match token.kind {
            TokenKind::False => ast::LitValue::Bool(false),
            TokenKind::True => ast::LitValue::Bool(true),
            TokenKind::Nil => ast::LitValue::Nil,
            TokenKind::Number | TokenKind::String => match token.literal {
                Some(Literal::Number(number)) => ast::LitValue::Number(number),
                Some(Literal::String(string)) => ast::LitValue::String(string),
                None => ast::LitValue::Nil,
            },
            TokenKind::Ident => {
                self.advance();
                return Ok(ast::VarExpr { ident: token }.into());
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RightParen, "Expect ')' after expression.")?;
                return Ok(ast::GroupingExpr {
                    expr: Box::new(expr),
                }
                .into());
            }
            _ => return Err(self.expected_expression()),
        };

        self.advance();
        Ok(ast::Lit { value }.into())
    }

    /// Builds an "expected expression" error worded after the token before it.
    fn expected_expression(&self) -> Error {
        let current = self.peek();

        let message = if self.current == 0 {
            format!(
                "Expected expression at start of line but found '{}'",
                current.lexeme
            )
        } else {
            let previous = self.previous();
            match previous.kind {
                kind if kind.is_arithmetic_op() => {
                    format!("Expected expression after operator '{}'", previous.lexeme)
                }
                TokenKind::LeftParen => "Expected expression after '('".to_string(),
                _ => format!("Expected expression before '{}'", current.lexeme),
            }
        };

        current.error_at(&message)
    }
}

/// Parses a whole program. Syntax errors are reported to `diagnostics`; the
/// declaration that failed is dropped and parsing resumes after it.
pub fn parse(tokens: &[Token], diagnostics: &mut Diagnostics) -> Vec<ast::Stmt> {
    let mut stmts = Vec::new();

    if !tokens.is_empty() {
        let mut parser = Parser::new(tokens, diagnostics);
        while !parser.at_end() {
            if let Some(stmt) = parser.declaration() {
                stmts.push(stmt);
            }
        }
    }

    debug!(statements = stmts.len(), "parsed program");
    stmts
}

/// Parses exactly one expression; trailing tokens are an error.
pub fn parse_expression(tokens: &[Token], diagnostics: &mut Diagnostics) -> Option<ast::Expr> {
    if tokens.is_empty() {
        return None;
    }

    let mut parser = Parser::new(tokens, diagnostics);
    let result = match parser.parse_expr() {
        Ok(expr) if parser.at_end() => Ok(expr),
        Ok(_) => Err(parser.peek().error_at(&format!(
            "Unexpected characters after expression '{}'.",
            parser.previous().lexeme
        ))),
        Err(error) => Err(error),
    };

    match result {
        Ok(expr) => Some(expr),
        Err(error) => {
            parser.diagnostics.report(error);
            None
        }
    }
}
