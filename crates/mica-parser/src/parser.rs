//! Recursive-descent parser from tokens to the Mica AST.

use mica_syntax::ast::*;
use mica_syntax::error::{error_at, Result};
use mica_syntax::token::{Token, TokenKind};

/// Parser over a token sequence produced by the lexer. Consumes the tokens
/// and yields an owned [`Program`] tree; the grammar is assumed to end with
/// an `Eof` token.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The grammar relies on a trailing Eof; restore it if a caller hands
        // over a bare stream.
        if tokens.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line: 1,
                col: 1,
            });
        }
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tk = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tk
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().kind == *kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            let tk = self.current();
            error_at(tk.line, tk.col, format!("Expected {}", what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => {
                let tk = self.current();
                error_at(tk.line, tk.col, format!("Expected {}", what))
            }
        }
    }

    /// Parse the whole token stream into a program.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::new();
        while !self.check(&TokenKind::Eof) {
            items.push(self.parse_declaration()?);
        }
        Ok(Program { items })
    }

    /// Top level admits only variable and function declarations.
    fn parse_declaration(&mut self) -> Result<Item> {
        match self.current().kind {
            TokenKind::Int | TokenKind::Void => {
                // `int name (` / `void name (` opens a function; any other
                // continuation is a variable declaration.
                let is_function = matches!(self.peek(1).kind, TokenKind::Ident(_))
                    && self.peek(2).kind == TokenKind::LParen;
                if is_function {
                    return Ok(Item::Function(self.parse_func_decl()?));
                }
                if self.current().kind != TokenKind::Int {
                    let tk = self.current();
                    return error_at(tk.line, tk.col, "Only int variables can be declared");
                }
                Ok(Item::Stmt(self.parse_var_decl()?))
            }
            _ => {
                let tk = self.current();
                error_at(tk.line, tk.col, "Expected declaration")
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Int, "'int'")?;
        let name = self.expect_ident("variable name")?;
        self.expect(TokenKind::Assign, "'=' (declarations require an initializer)")?;
        let init = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::VarDecl { name, init })
    }

    fn parse_func_decl(&mut self) -> Result<Function> {
        let return_type = match self.advance().kind {
            TokenKind::Void => ReturnType::Void,
            _ => ReturnType::Int,
        };
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        self.expect(TokenKind::RParen, "')' (functions take no parameters)")?;
        let body = self.parse_block()?;
        Ok(Function {
            name,
            return_type,
            body,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.current().kind {
            TokenKind::Int => self.parse_var_decl(),
            TokenKind::Asm => self.parse_asm_block(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Print => self.parse_print_statement(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_asm_block(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Asm, "'asm'")?;
        match &self.current().kind {
            TokenKind::AsmBody(text) => {
                let text = text.clone();
                self.advance();
                Ok(Stmt::Asm(text))
            }
            _ => {
                let tk = self.current();
                error_at(tk.line, tk.col, "Expected asm block body")
            }
        }
    }

    /// Single-statement bodies become implicit one-statement blocks, so the
    /// compiler sees a uniform shape.
    fn wrap_block(stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::Block(stmts) => stmts,
            other => vec![other],
        }
    }

    fn parse_if_statement(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::If, "'if'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_block = Self::wrap_block(self.parse_statement()?);
        let else_block = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Self::wrap_block(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::While, "'while'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Self::wrap_block(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Return, "'return'")?;
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Return(value))
    }

    fn parse_print_statement(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Print, "'print'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Print(expr))
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Expr(expr))
    }

    /// Parse a single expression. Public for tests and tooling.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let left = self.parse_equality()?;

        if self.check(&TokenKind::Assign) {
            let name = match left {
                Expr::Ident(name) => name,
                _ => {
                    let tk = self.current();
                    return error_at(tk.line, tk.col, "Invalid assignment target");
                }
            };
            self.advance();
            // Right-associative: a = b = c
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                name,
                value: Box::new(value),
            });
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEq => BinOp::Le,
                TokenKind::Greater => BinOp::Gt,
                TokenKind::GreaterEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            // No negate opcode: unary minus lowers to 0 - operand.
            return Ok(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Number(0)),
                rhs: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    return self.finish_call(name);
                }
                Ok(Expr::Ident(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => {
                let tk = self.current();
                error_at(tk.line, tk.col, "Unexpected token in expression")
            }
        }
    }

    fn finish_call(&mut self, name: String) -> Result<Expr> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Expr::Call { name, args })
    }
}
