//! Abstract syntax tree for Sprig.
//!
//! Both node sets are closed enums; every later stage dispatches over them
//! with an exhaustive `match`.  The tree owns its data so that function
//! declarations can outlive the token buffer they were parsed from (a REPL
//! line, for instance), and is never mutated after parsing.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Position;

/// Identity of a variable‑referencing expression node.
///
/// The resolver keys its table by this id and the interpreter looks it up
/// again at run time.  Ids are unique for the life of the process, so
/// tables produced for separate source units never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A name as it appeared in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: Rc<str>,
    pub position: Position,
}

impl Ident {
    pub fn new(name: &str, position: Position) -> Self {
        Self {
            name: Rc::from(name),
            position,
        }
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "not",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        })
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        })
    }
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(Literal),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix operator: `-x`, `not x`.
    Unary {
        operator: UnaryOp,
        position: Position,
        right: Box<Expr>,
    },

    /// Arithmetic, comparison and equality operators.
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        position: Position,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
    },

    /// Variable access.
    Variable { id: ExprId, name: Ident },

    /// `name = value`
    Assign {
        id: ExprId,
        name: Ident,
        value: Box<Expr>,
    },

    /// `callee(arguments…)`
    Call {
        callee: Box<Expr>,
        /// Position of the closing `)`, for error reporting.
        paren: Position,
        arguments: Vec<Expr>,
    },
}

impl Expr {
    /// Best position to blame for an error in this expression.
    pub fn position(&self) -> Option<Position> {
        match self {
            Expr::Literal(_) => None,
            Expr::Grouping(inner) => inner.position(),
            Expr::Unary { position, .. } | Expr::Binary { position, .. } => Some(*position),
            Expr::Logical { left, .. } => left.position(),
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => Some(name.position),
            Expr::Call { paren, .. } => Some(*paren),
        }
    }
}

/// `func name(params…) { body }`, shared between the tree and every
/// function value created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Vec<Stmt>,
}

/// Statement nodes.  A program is a `Vec<Stmt>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print expr;`
    Print(Expr),

    /// `let name (= initializer)?;`
    Var {
        name: Ident,
        initializer: Option<Expr>,
    },

    /// Braced scope.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while (cond) { body }`.  The body runs in a fresh scope on every
    /// iteration; `for` loops desugar into this node.
    While { condition: Expr, body: Vec<Stmt> },

    Function(Rc<FunctionDecl>),

    Return {
        keyword: Position,
        value: Option<Expr>,
    },
}
