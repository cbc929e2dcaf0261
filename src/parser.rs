/*!
Recursive‑descent parser for Sprig.

Time & Space
------------
* **n** = number of tokens (including the sole EOF).

Every token is consumed once via `advance()`, so a parse is **Θ(n)**; the
tree is O(n) and the call stack grows with syntactic nesting only.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths (`consume`, etc.)| `debug`| Context before returning structured error.|

--------------------------------------------------------------------------------
Grammar
-------

```text
program     → declaration* EOF ;
declaration → varDecl | funcDecl | statement ;
varDecl     → "let" IDENT ( "=" expression )? ";" ;
funcDecl    → "func" IDENT "(" parameters? ")" block ;
statement   → exprStmt | printStmt | block | ifStmt
            | whileStmt | forStmt | returnStmt ;
block       → "{" declaration* "}" ;
ifStmt      → "if" "(" expression ")" statement ( "else" statement )? ;
whileStmt   → "while" "(" expression ")" block ;
forStmt     → "for" "(" ( varDecl | exprStmt | ";" )
              expression? ";" expression? ")" statement ;
returnStmt  → "return" expression? ";" ;
expression  → assignment ;
assignment  → IDENT ( "=" | "+=" | "-=" | "*=" | "/=" ) assignment | logic_or ;
logic_or    → logic_and ( "or" logic_and )* ;
logic_and   → equality ( "and" equality )* ;
equality    → comparison ( ( "!=" | "==" ) comparison )* ;
comparison  → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term        → factor ( ( "-" | "+" ) factor )* ;
factor      → unary ( ( "/" | "*" ) unary )* ;
unary       → ( "not" | "-" ) unary | call ;
call        → primary ( "(" arguments? ")" )* ;
primary     → NUMBER | STRING | "true" | "false" | "nil"
            | IDENT | "(" expression ")" ;
```

`for` has no node of its own; it is rewritten into a `Block` holding the
initializer and a `While` whose body carries the increment.
*/

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprId, FunctionDecl, Ident, Literal, LogicalOp, Stmt, UnaryOp};
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Result, SprigError};
use crate::token::{Position, Token, TokenType};

use log::{debug, info};

/// Longest argument or parameter list accepted without a warning.
pub const MAX_ARGS: usize = 255;

/// Deepest nesting of statements and sub‑expressions the parser descends
/// into before giving up with an error.
pub const MAX_NESTING: usize = 200;

static EOF_TOKEN: Token<'static> = Token {
    token_type: TokenType::EOF,
    lexeme: "",
    line: 0,
    column: 0,
};

/// Top‑level parser over an immutable slice of tokens.
pub struct Parser<'t, 'src> {
    tokens: &'t [Token<'src>],
    current: usize,
    depth: usize,
    warnings: Vec<Diagnostic>,
}

impl<'t, 'src> Parser<'t, 'src> {
    /// Construct a new parser.  The slice is expected to end with `EOF`;
    /// running off the end is treated the same way.
    pub fn new(tokens: &'t [Token<'src>]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            depth: 0,
            warnings: Vec::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program, stopping at the first error.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        info!("Parsed {} top-level statements", statements.len());

        Ok(statements)
    }

    /// Parse an entire program, skipping to the next statement boundary after
    /// each error so that every syntax error in the unit is collected.
    pub fn parse_with_recovery(&mut self) -> std::result::Result<Vec<Stmt>, Vec<SprigError>> {
        info!("Beginning parse phase (recovering)");

        let mut statements: Vec<Stmt> = Vec::new();
        let mut errors: Vec<SprigError> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    debug!("Recovering from parse error: {}", e);
                    errors.push(e);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(statements)
        } else {
            Err(errors)
        }
    }

    /// Non‑fatal findings collected so far.
    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.warnings)
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        self.nested(Self::any_declaration)
    }

    fn any_declaration(&mut self) -> Result<Stmt> {
        debug!("Entering declaration at {}", self.peek().position());

        if self.matches(TokenType::FUNC) {
            self.function()
        } else if self.matches(TokenType::LET) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn function(&mut self) -> Result<Stmt> {
        let name: Ident = self.identifier("Expected function name")?;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after function name")?;

        let mut params: Vec<Ident> = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() == MAX_ARGS {
                    self.warn(
                        self.peek().position(),
                        format!("Can't have more than {} parameters.", MAX_ARGS),
                    );
                }

                params.push(self.identifier("Expected parameter name")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters")?;

        self.consume(TokenType::LEFT_BRACE, "Expected '{' before function body")?;
        let body: Vec<Stmt> = self.block()?;

        debug!(
            "Parsed function '{}' with {} parameters",
            name.name,
            params.len()
        );

        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Ident = self.identifier("Expected variable name")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        self.nested(Self::any_statement)
    }

    fn any_statement(&mut self) -> Result<Stmt> {
        debug!("Entering statement at {}", self.peek().position());

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// `for (init; cond; incr) body` becomes
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::LET) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses")?;

        let user_body: Stmt = self.statement()?;

        let mut body: Vec<Stmt> = vec![user_body];
        if let Some(increment) = increment {
            body.push(Stmt::Expression(increment));
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(Literal::Bool(true)));

        let mut block: Vec<Stmt> = Vec::with_capacity(2);
        if let Some(initializer) = initializer {
            block.push(initializer);
        }
        block.push(Stmt::While { condition, body });

        debug!("Desugared for loop into block of {} statements", block.len());

        Ok(Stmt::Block(block))
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after value")?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition")?;
        self.consume(TokenType::LEFT_BRACE, "Expected '{' before loop body")?;
        let body: Vec<Stmt> = self.block()?;

        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Position = self.previous().position();
        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    /// Statements up to and including the closing `}`; the `{` has already
    /// been consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block")?;
        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        let compound: Option<BinaryOp> = if self.matches(TokenType::EQUAL) {
            None
        } else if self.matches(TokenType::PLUS_EQUAL) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenType::MINUS_EQUAL) {
            Some(BinaryOp::Subtract)
        } else if self.matches(TokenType::STAR_EQUAL) {
            Some(BinaryOp::Multiply)
        } else if self.matches(TokenType::SLASH_EQUAL) {
            Some(BinaryOp::Divide)
        } else {
            return Ok(expr);
        };

        let equals: Position = self.previous().position();
        let value: Expr = self.nested(Self::assignment)?;

        match expr {
            Expr::Variable { name, .. } => {
                // `x op= e` reads `x` through its own node so the resolver
                // gives the read and the write separate entries.
                let value: Expr = match compound {
                    None => value,
                    Some(operator) => Expr::Binary {
                        left: Box::new(Expr::Variable {
                            id: ExprId::fresh(),
                            name: name.clone(),
                        }),
                        operator,
                        position: equals,
                        right: Box::new(value),
                    },
                };

                Ok(Expr::Assign {
                    id: ExprId::fresh(),
                    name,
                    value: Box::new(value),
                })
            }

            _ => {
                debug!("Rejecting assignment to non-variable at {}", equals);
                Err(SprigError::parse(equals, "Invalid assignment target."))
            }
        }
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comparison()?;

        loop {
            let operator: BinaryOp = if self.matches(TokenType::BANG_EQUAL) {
                BinaryOp::NotEqual
            } else if self.matches(TokenType::EQUAL_EQUAL) {
                BinaryOp::Equal
            } else {
                break;
            };

            let position: Position = self.previous().position();
            let right: Expr = self.comparison()?;
            expr = Self::binary(expr, operator, position, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.term()?;

        loop {
            let operator: BinaryOp = if self.matches(TokenType::GREATER) {
                BinaryOp::Greater
            } else if self.matches(TokenType::GREATER_EQUAL) {
                BinaryOp::GreaterEqual
            } else if self.matches(TokenType::LESS) {
                BinaryOp::Less
            } else if self.matches(TokenType::LESS_EQUAL) {
                BinaryOp::LessEqual
            } else {
                break;
            };

            let position: Position = self.previous().position();
            let right: Expr = self.term()?;
            expr = Self::binary(expr, operator, position, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.factor()?;

        loop {
            let operator: BinaryOp = if self.matches(TokenType::MINUS) {
                BinaryOp::Subtract
            } else if self.matches(TokenType::PLUS) {
                BinaryOp::Add
            } else {
                break;
            };

            let position: Position = self.previous().position();
            let right: Expr = self.factor()?;
            expr = Self::binary(expr, operator, position, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.unary()?;

        loop {
            let operator: BinaryOp = if self.matches(TokenType::STAR) {
                BinaryOp::Multiply
            } else if self.matches(TokenType::SLASH) {
                BinaryOp::Divide
            } else {
                break;
            };

            let position: Position = self.previous().position();
            let right: Expr = self.unary()?;
            expr = Self::binary(expr, operator, position, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        let operator: UnaryOp = if self.matches(TokenType::NOT) {
            UnaryOp::Not
        } else if self.matches(TokenType::MINUS) {
            UnaryOp::Negate
        } else {
            return self.call();
        };

        let position: Position = self.previous().position();
        let right: Expr = self.nested(Self::unary)?;

        Ok(Expr::Unary {
            operator,
            position,
            right: Box::new(right),
        })
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        while self.matches(TokenType::LEFT_PAREN) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() == MAX_ARGS {
                    self.warn(
                        self.peek().position(),
                        format!("Can't have more than {} arguments.", MAX_ARGS),
                    );
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: Position = self
            .consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments")?
            .position();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token: &'t Token<'src> = self.peek();

        let expr: Expr = match &token.token_type {
            TokenType::FALSE => Expr::Literal(Literal::Bool(false)),
            TokenType::TRUE => Expr::Literal(Literal::Bool(true)),
            TokenType::NIL => Expr::Literal(Literal::Nil),
            TokenType::NUMBER(n) => Expr::Literal(Literal::Number(*n)),
            TokenType::STRING(s) => Expr::Literal(Literal::Str(Rc::from(s.as_str()))),
            TokenType::IDENTIFIER => Expr::Variable {
                id: ExprId::fresh(),
                name: Ident::new(token.lexeme, token.position()),
            },
            TokenType::LEFT_PAREN => {
                self.advance();
                let expr: Expr = self.expression()?;

                self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression")?;

                return Ok(Expr::Grouping(Box::new(expr)));
            }
            _ => return Err(self.error_at(token, "Expected expression")),
        };

        self.advance();

        Ok(expr)
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline]
    fn binary(left: Expr, operator: BinaryOp, position: Position, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            operator,
            position,
            right: Box::new(right),
        }
    }

    /// Run `rule` one level deeper, refusing to go past [`MAX_NESTING`].
    fn nested<T>(&mut self, rule: fn(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at(self.peek(), "Too much nesting"));
        }

        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;

        result
    }

    fn identifier(&mut self, message: &str) -> Result<Ident> {
        let token: &Token<'src> = self.consume(TokenType::IDENTIFIER, message)?;

        Ok(Ident::new(token.lexeme, token.position()))
    }

    fn warn(&mut self, position: Position, message: String) {
        debug!("Parse warning at {}: {}", position, message);

        self.warnings.push(Diagnostic::warning(position, message));
    }

    fn error_at(&self, token: &Token<'_>, message: &str) -> SprigError {
        let message = if token.token_type == TokenType::EOF {
            format!("{} at end", message)
        } else {
            format!("{} at '{}'", message, token.lexeme)
        };

        debug!("Parse error: {}", message);

        SprigError::parse(token.position(), message)
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'t Token<'src>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(self.error_at(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &'t Token<'src> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'t Token<'src> {
        self.tokens.get(self.current).unwrap_or(&EOF_TOKEN)
    }

    #[inline(always)]
    fn previous(&self) -> &'t Token<'src> {
        match self.current.checked_sub(1) {
            Some(i) => self.tokens.get(i).unwrap_or(&EOF_TOKEN),
            None => &EOF_TOKEN,
        }
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::FUNC
                | TokenType::LET
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}

/// Parse a scanned unit, forwarding warnings to `reporter`.  The first syntax
/// error aborts the whole parse.
pub fn parse(tokens: &[Token<'_>], reporter: &mut dyn Reporter) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokens);
    let result = parser.parse();

    for warning in parser.take_warnings() {
        reporter.report(warning);
    }

    result
}
