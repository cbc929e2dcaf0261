//! Static resolver pass for the **Sprig** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<name, bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, stray `return`).
//! 3. Record, for *each* variable occurrence, how many scopes separate it from
//!    its declaration.  Names found in no scope are left out of the table and
//!    treated as globals by the interpreter.
//!
//! The scope stack mirrors the environments the interpreter creates: one per
//! block, one per function call (parameters and body share it), and one per
//! `while` iteration.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, Ident, Stmt};
use crate::error::{Result, SprigError};
use log::{debug, info};

/// Resolution table: expression identity → scope distance.
pub type Locals = HashMap<ExprId, usize>;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

pub struct Resolver {
    scopes: Vec<HashMap<Rc<str>, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    locals: Locals,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            locals: Locals::new(),
        }
    }

    /// Walk all top‑level statements and hand back the distances found.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Locals> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements)?;

        info!("Resolved {} local reference(s)", self.locals.len());

        Ok(self.locals)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmts(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                let result = self.resolve_stmts(statements);
                self.end_scope();
                result?;
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // the name is bound before the body so it can recurse
                self.declare(&decl.name)?;
                self.define(&decl.name);
                self.resolve_function(decl)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                // condition runs in the loop's scope, the body in a fresh
                // per‑iteration one
                self.resolve_expr(condition)?;
                self.begin_scope();
                let result = self.resolve_stmts(body);
                self.end_scope();
                result?;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(SprigError::resolve(
                        *keyword,
                        "Can't return from top-level code.",
                    ));
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&*name.name) == Some(&false) {
                        return Err(SprigError::resolve(
                            name.position,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// One fresh scope holds the parameters and the body's declarations.
    fn resolve_function(&mut self, decl: &FunctionDecl) -> Result<()> {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();
        let result = self.resolve_params_and_body(decl);
        self.end_scope();

        self.current_function = enclosing;
        result
    }

    fn resolve_params_and_body(&mut self, decl: &FunctionDecl) -> Result<()> {
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }
        self.resolve_stmts(&decl.body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Globals are not tracked; redeclaring one is allowed.
    fn declare(&mut self, name: &Ident) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&*name.name) {
                return Err(SprigError::resolve(
                    name.position,
                    format!("Already a variable named '{}' in this scope.", name.name),
                ));
            }
            scope.insert(Rc::clone(&name.name), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &Ident) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(Rc::clone(&name.name), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of
    /// the table if no enclosing scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Ident) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&*name.name) {
                debug!("Resolved '{}' at depth {}", name.name, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.name);
    }
}

/// Resolve a parsed unit with a fresh resolver.
pub fn resolve(statements: &[Stmt]) -> Result<Locals> {
    Resolver::new().resolve(statements)
}
