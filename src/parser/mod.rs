pub mod ast;
mod error;

pub use error::{ErrorLocation, ParserError, ParserErrorKind};

use compact_str::CompactString;

use crate::token::{Literal, Token, TokenKind};
use ast::{
    Ast, BinaryOperator, ClassDecl, Expr, ExprId, FunctionDecl, Ident, LiteralValue,
    LogicalOperator, Stmt, StmtId, UnaryOperator, VariableDecl,
};

const MAX_CALL_ARGUMENTS: usize = 255;

#[derive(Debug, Clone, Copy)]
enum FunctionKind {
    Function,
    Method,
}

/// Recursive-descent parser over the scanned token stream, one token of
/// lookahead. Precedence is encoded as the call chain from `assignment`
/// down to `primary`. Errors synchronize to the next statement boundary so
/// the rest of the program still gets parsed and reported.
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    current: usize,
    ast: Ast,
    errors: Vec<ParserError>,
}

impl<'src> Parser<'src> {
    /// `tokens` must end with an `Eof` token, as produced by `Lexer::scan`.
    pub fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            current: 0,
            ast: Ast::new(),
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Ast, Vec<ParserError>) {
        let mut top_level = Vec::new();
        while !self.at_end() {
            if let Some(stmt) = self.declaration() {
                top_level.push(stmt);
            }
        }
        self.ast.set_top_level(top_level);
        (self.ast, self.errors)
    }
}

// Statements
impl<'src> Parser<'src> {
    fn declaration(&mut self) -> Option<StmtId> {
        let result = match self.peek().kind {
            TokenKind::KeywordVar => self.variable_declaration(),
            TokenKind::KeywordFun => self.function_declaration(),
            TokenKind::KeywordClass => self.class_declaration(),
            _ => self.statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn variable_declaration(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        let name = self.expect_ident("Expect variable name.")?;
        let initializer = if self.eat_if(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(self
            .ast
            .push_stmt(Stmt::VariableDecl(VariableDecl { name, initializer })))
    }

    fn function_declaration(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        let decl = self.function(FunctionKind::Function)?;
        Ok(self.ast.push_stmt(Stmt::FunctionDecl(decl)))
    }

    fn class_declaration(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        let name = self.expect_ident("Expect class name.")?;
        self.expect(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            methods.push(self.function(FunctionKind::Method)?);
        }
        self.expect(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(self.ast.push_stmt(Stmt::ClassDecl(ClassDecl { name, methods })))
    }

    fn function(&mut self, kind: FunctionKind) -> Result<FunctionDecl, ParserError> {
        let (name_msg, paren_msg, body_msg) = match kind {
            FunctionKind::Function => (
                "Expect function name.",
                "Expect '(' after function name.",
                "Expect '{' before function body.",
            ),
            FunctionKind::Method => (
                "Expect method name.",
                "Expect '(' after method name.",
                "Expect '{' before method body.",
            ),
        };
        let name = self.expect_ident(name_msg)?;
        self.expect(TokenKind::LeftParenthesis, paren_msg)?;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                if parameters.len() >= MAX_CALL_ARGUMENTS {
                    self.report_at_peek(ParserErrorKind::TooManyParameters);
                }
                parameters.push(self.expect_ident("Expect parameter name.")?);
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParenthesis, "Expect ')' after parameters.")?;
        self.expect(TokenKind::LeftBrace, body_msg)?;
        let body = self.block_statements()?;
        Ok(FunctionDecl {
            name,
            parameters,
            body,
        })
    }

    fn statement(&mut self) -> Result<StmtId, ParserError> {
        match self.peek().kind {
            TokenKind::KeywordPrint => self.print_statement(),
            TokenKind::LeftBrace => {
                self.advance();
                let statements = self.block_statements()?;
                Ok(self.ast.push_stmt(Stmt::Block { statements }))
            }
            TokenKind::KeywordIf => self.if_statement(),
            TokenKind::KeywordWhile => self.while_statement(),
            TokenKind::KeywordFor => self.for_statement(),
            TokenKind::KeywordReturn => self.return_statement(),
            TokenKind::KeywordBreak => self.break_statement(),
            _ => self.expression_statement(),
        }
    }

    /// Statements up to the closing brace. The opening brace has already
    /// been consumed.
    fn block_statements(&mut self) -> Result<Vec<StmtId>, ParserError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.expect(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn print_statement(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(self.ast.push_stmt(Stmt::Print { expr }))
    }

    fn if_statement(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        self.expect(TokenKind::LeftParenthesis, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParenthesis, "Expect ')' after if condition.")?;
        let then_branch = self.statement()?;
        let else_branch = if self.eat_if(TokenKind::KeywordElse) {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(self.ast.push_stmt(Stmt::If {
            condition,
            then_branch,
            else_branch,
        }))
    }

    fn while_statement(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        self.expect(TokenKind::LeftParenthesis, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParenthesis, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(self.ast.push_stmt(Stmt::While { condition, body }))
    }

    /// `for` has no AST node of its own; it desugars into the equivalent
    /// block-and-while shape here.
    fn for_statement(&mut self) -> Result<StmtId, ParserError> {
        self.advance();
        self.expect(TokenKind::LeftParenthesis, "Expect '(' after 'for'.")?;

        let initializer = if self.eat_if(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::KeywordVar) {
            Some(self.variable_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParenthesis) {
            Some(self.expression()?)
        } else {
            None
        };
        let paren = self.expect(TokenKind::RightParenthesis, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            let increment = self.ast.push_stmt(Stmt::Expression { expr: increment });
            body = self.ast.push_stmt(Stmt::Block {
                statements: vec![body, increment],
            });
        }
        let condition = condition.unwrap_or_else(|| {
            self.ast.push_expr(Expr::Literal {
                value: LiteralValue::Bool(true),
                line: paren.line,
            })
        });
        body = self.ast.push_stmt(Stmt::While { condition, body });
        if let Some(initializer) = initializer {
            body = self.ast.push_stmt(Stmt::Block {
                statements: vec![initializer, body],
            });
        }
        Ok(body)
    }

    fn return_statement(&mut self) -> Result<StmtId, ParserError> {
        let line = self.advance().line;
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(self.ast.push_stmt(Stmt::Return { line, value }))
    }

    fn break_statement(&mut self) -> Result<StmtId, ParserError> {
        let line = self.advance().line;
        self.expect(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
        Ok(self.ast.push_stmt(Stmt::Break { line }))
    }

    fn expression_statement(&mut self) -> Result<StmtId, ParserError> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(self.ast.push_stmt(Stmt::Expression { expr }))
    }
}

// Expressions, lowest precedence first
impl<'src> Parser<'src> {
    fn expression(&mut self) -> Result<ExprId, ParserError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprId, ParserError> {
        let expr = self.logic_or()?;
        if self.check(TokenKind::Equal) {
            let equals = self.advance().clone();
            let value = self.assignment()?;
            // Rewrite the parsed l-value; anything else is reported without
            // abandoning the expression.
            match self.ast.expr(expr) {
                Expr::Variable { name } => {
                    let name = name.clone();
                    return Ok(self.ast.push_expr(Expr::Assignment { name, value }));
                }
                Expr::Get { object, name } => {
                    let (object, name) = (*object, name.clone());
                    return Ok(self.ast.push_expr(Expr::Set {
                        object,
                        name,
                        value,
                    }));
                }
                _ => self.report(&equals, ParserErrorKind::InvalidAssignmentTarget),
            }
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.logic_and()?;
        while self.eat_if(TokenKind::KeywordOr) {
            let right = self.logic_and()?;
            left = self.ast.push_expr(Expr::Logical {
                operator: LogicalOperator::Or,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn logic_and(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.equality()?;
        while self.eat_if(TokenKind::KeywordAnd) {
            let right = self.equality()?;
            left = self.ast.push_expr(Expr::Logical {
                operator: LogicalOperator::And,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.comparison()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOperator::EqualEqual,
                TokenKind::BangEqual => BinaryOperator::BangEqual,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.comparison()?;
            left = self.ast.push_expr(Expr::Binary {
                operator,
                line,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.term()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessThanEqual => BinaryOperator::LessThanEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.term()?;
            left = self.ast.push_expr(Expr::Binary {
                operator,
                line,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.factor()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.factor()?;
            left = self.ast.push_expr(Expr::Binary {
                operator,
                line,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<ExprId, ParserError> {
        let mut left = self.unary()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.unary()?;
            left = self.ast.push_expr(Expr::Binary {
                operator,
                line,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<ExprId, ParserError> {
        let operator = match self.peek().kind {
            TokenKind::Bang => UnaryOperator::Bang,
            TokenKind::Minus => UnaryOperator::Minus,
            _ => return self.call(),
        };
        let line = self.advance().line;
        let operand = self.unary()?;
        Ok(self.ast.push_expr(Expr::Unary {
            operator,
            line,
            operand,
        }))
    }

    fn call(&mut self) -> Result<ExprId, ParserError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_if(TokenKind::LeftParenthesis) {
                expr = self.finish_call(expr)?;
            } else if self.eat_if(TokenKind::Dot) {
                let name = self.expect_ident("Expect property name after '.'.")?;
                expr = self.ast.push_expr(Expr::Get { object: expr, name });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: ExprId) -> Result<ExprId, ParserError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                if arguments.len() >= MAX_CALL_ARGUMENTS {
                    self.report_at_peek(ParserErrorKind::TooManyArguments);
                }
                arguments.push(self.expression()?);
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren = self.expect(TokenKind::RightParenthesis, "Expect ')' after arguments.")?;
        Ok(self.ast.push_expr(Expr::Call {
            callee,
            line: paren.line,
            arguments,
        }))
    }

    fn primary(&mut self) -> Result<ExprId, ParserError> {
        let token = self.advance().clone();
        let expr = match token.kind {
            TokenKind::KeywordNil => Expr::Literal {
                value: LiteralValue::Nil,
                line: token.line,
            },
            TokenKind::KeywordTrue => Expr::Literal {
                value: LiteralValue::Bool(true),
                line: token.line,
            },
            TokenKind::KeywordFalse => Expr::Literal {
                value: LiteralValue::Bool(false),
                line: token.line,
            },
            TokenKind::NumericLiteral => {
                let Some(Literal::Number(value)) = token.literal else {
                    panic!("Numeric literal tokens carry their parsed value.");
                };
                Expr::Literal {
                    value: LiteralValue::Number(value),
                    line: token.line,
                }
            }
            TokenKind::StringLiteral => {
                let Some(Literal::String(value)) = token.literal else {
                    panic!("String literal tokens carry their parsed value.");
                };
                Expr::Literal {
                    value: LiteralValue::String(value),
                    line: token.line,
                }
            }
            TokenKind::Ident => Expr::Variable {
                name: self.ident_from(&token),
            },
            TokenKind::KeywordThis => Expr::This { line: token.line },
            TokenKind::LeftParenthesis => {
                let inner = self.expression()?;
                self.expect(TokenKind::RightParenthesis, "Expect ')' after expression.")?;
                return Ok(inner);
            }
            _ => return Err(self.error_at(&token, ParserErrorKind::ExpectedExpression)),
        };
        Ok(self.ast.push_expr(expr))
    }
}

// Token-stream plumbing
impl<'src> Parser<'src> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .expect("The token stream ends with `Eof` and the cursor never passes it.")
    }

    fn previous(&self) -> &Token {
        self.tokens
            .get(self.current - 1)
            .expect("At least one token has been consumed before `previous` is asked for.")
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Consumes and returns the next token; at the end of the stream it
    /// yields the `Eof` token without moving, so errors anchor to it.
    fn advance(&mut self) -> &Token {
        if self.at_end() {
            return self.peek();
        }
        self.current += 1;
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat_if(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &'static str) -> Result<Token, ParserError> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(&token, ParserErrorKind::ExpectedSyntax(message)))
        }
    }

    fn expect_ident(&mut self, message: &'static str) -> Result<Ident, ParserError> {
        let token = self.expect(TokenKind::Ident, message)?;
        Ok(self.ident_from(&token))
    }

    fn ident_from(&self, token: &Token) -> Ident {
        Ident {
            name: CompactString::from(self.lexeme(token)),
            line: token.line,
        }
    }

    fn lexeme(&self, token: &Token) -> &'src str {
        &self.source[token.span.range()]
    }

    fn error_at(&self, token: &Token, kind: ParserErrorKind) -> ParserError {
        let location = if matches!(token.kind, TokenKind::Eof) {
            ErrorLocation::Eof
        } else {
            ErrorLocation::Lexeme(CompactString::from(self.lexeme(token)))
        };
        ParserError {
            kind,
            line: token.line,
            location,
        }
    }

    fn report(&mut self, token: &Token, kind: ParserErrorKind) {
        let error = self.error_at(token, kind);
        self.errors.push(error);
    }

    fn report_at_peek(&mut self, kind: ParserErrorKind) {
        let token = self.peek().clone();
        self.report(&token, kind);
    }

    /// Panic-mode recovery: discard tokens until just past a semicolon or
    /// just before a statement-starting keyword.
    fn synchronize(&mut self) {
        self.advance();
        while !self.at_end() {
            if matches!(self.previous().kind, TokenKind::Semicolon) {
                return;
            }
            match self.peek().kind {
                TokenKind::KeywordClass
                | TokenKind::KeywordFun
                | TokenKind::KeywordVar
                | TokenKind::KeywordFor
                | TokenKind::KeywordIf
                | TokenKind::KeywordWhile
                | TokenKind::KeywordPrint
                | TokenKind::KeywordReturn => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
