//! Tree‑walking evaluator.
//!
//! Statements return [`Flow`]: either they completed, or a `return` is
//! unwinding towards the nearest function call.  Every routine that runs
//! sub‑statements checks the flow after each one and hands a `Return`
//! upward untouched.  Runtime errors travel separately, as `Err`.

use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{BinaryOp, Expr, ExprId, Ident, Literal, LogicalOp, Stmt, UnaryOp};
use crate::callable::{Callable, Function, NativeFunction};
use crate::environment::{EnvRef, Environment};
use crate::error::{Result, SprigError};
use crate::resolver::Locals;
use crate::token::Position;
use crate::value::Value;

/// Deepest chain of nested calls before a program is stopped with a
/// runtime error instead of exhausting the host stack.
pub const MAX_CALL_DEPTH: usize = 256;

/// Outcome of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    output: Box<dyn Write>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter whose `print` output goes to `output`.  Native
    /// functions such as `clock` are defined in the global scope.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(std::cell::RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            output,
            depth: 0,
        };

        debug!("Defining native function 'clock'");
        interpreter.define_native(NativeFunction::clock());

        interpreter
    }

    pub fn define_native(&mut self, native: NativeFunction) {
        let name: Rc<str> = Rc::from(native.name());
        self.globals
            .borrow_mut()
            .define(name, Value::Callable(Rc::new(native)));
    }

    /// Run a resolved program.  The resolution table is kept, so functions
    /// declared here can still be called by later units.  A runtime error
    /// stops the remaining statements; earlier effects stay.
    pub fn interpret(&mut self, statements: &[Stmt], locals: Locals) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        // Entries are kept for the whole session: closures from earlier
        // units still look their references up here.
        self.locals.extend(locals);

        let result = self.run(statements);
        let flushed = self.output.flush();

        result?;
        flushed?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    fn run(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Flow::Return(_) = self.execute(stmt)? {
                // The resolver rejects this; reaching it means the
                // statements were never resolved.
                let position = match stmt {
                    Stmt::Return { keyword, .. } => *keyword,
                    _ => Position::default(),
                };
                return Err(SprigError::runtime(
                    position,
                    "Can't return from top-level code.",
                ));
            }
        }
        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                writeln!(self.output, "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {:?}", name.name, value);
                self.environment
                    .borrow_mut()
                    .define(Rc::clone(&name.name), value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope: EnvRef = Environment::child_of(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");
                while self.evaluate(condition)?.is_truthy() {
                    let scope: EnvRef = Environment::child_of(&self.environment);
                    if let Flow::Return(value) = self.execute_block(body, scope)? {
                        return Ok(Flow::Return(value));
                    }
                }
                debug!("Exited while loop");
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.name);
                // Captures the scope the declaration runs in, which is also
                // where the name lands, so the body can see itself.
                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment));
                self.environment
                    .borrow_mut()
                    .define(Rc::clone(&decl.name.name), Value::Callable(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {:?}", value);
                Ok(Flow::Return(value))
            }
        }
    }

    /// Run `statements` with `environment` as the current scope, restoring
    /// the previous scope afterwards whatever the outcome.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> Result<Flow> {
        let previous: EnvRef = mem::replace(&mut self.environment, environment);

        let result = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::String(Rc::clone(s)),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                position,
                right,
            } => {
                let right: Value = self.evaluate(right)?;
                match operator {
                    UnaryOp::Negate => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(SprigError::runtime(*position, "Operand must be a number.")),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
                }
            }

            Expr::Binary {
                left,
                operator,
                position,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                binary(*operator, left, right, *position)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let short_circuit: bool = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.name,
                        value.clone(),
                        name.position,
                    )?,
                    None => self.globals.borrow_mut().assign(
                        &name.name,
                        value.clone(),
                        name.position,
                    )?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call(callee, values, *paren)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Ident) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, &name.name, name.position)
            }
            None => self.globals.borrow().get(&name.name, name.position),
        }
    }

    /// Invokes a callable (native or user-defined function).
    fn call(&mut self, callee: Value, arguments: Vec<Value>, paren: Position) -> Result<Value> {
        let Value::Callable(callable) = callee else {
            return Err(SprigError::runtime(
                paren,
                "Can only call functions.",
            ));
        };

        if arguments.len() != callable.arity() {
            return Err(SprigError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            debug!("Call depth limit hit calling '{}'", callable.name());
            return Err(SprigError::runtime(paren, "Stack overflow."));
        }

        debug!("Calling '{}' with {} argument(s)", callable.name(), arguments.len());

        self.depth += 1;
        let result = callable.call(self, arguments, paren);
        self.depth -= 1;

        let result: Value = result?;

        debug!("'{}' returned {:?}", callable.name(), result);

        Ok(result)
    }
}

fn binary(operator: BinaryOp, left: Value, right: Value, position: Position) -> Result<Value> {
    use Value::{Bool, Number};

    match (operator, left, right) {
        (BinaryOp::Equal, l, r) => Ok(Bool(l == r)),
        (BinaryOp::NotEqual, l, r) => Ok(Bool(l != r)),

        (BinaryOp::Add, Number(a), Number(b)) => Ok(Number(a + b)),
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            let mut joined: String = String::with_capacity(a.len() + b.len());
            joined.push_str(&a);
            joined.push_str(&b);
            Ok(Value::String(Rc::from(joined)))
        }
        (BinaryOp::Add, _, _) => Err(SprigError::runtime(
            position,
            "Operands must be two numbers or two strings.",
        )),

        (BinaryOp::Divide, Number(_), Number(b)) if b == 0.0 => {
            Err(SprigError::runtime(position, "Division by zero."))
        }

        (op, Number(a), Number(b)) => Ok(match op {
            BinaryOp::Subtract => Number(a - b),
            BinaryOp::Multiply => Number(a * b),
            BinaryOp::Divide => Number(a / b),
            BinaryOp::Less => Bool(a < b),
            BinaryOp::LessEqual => Bool(a <= b),
            BinaryOp::Greater => Bool(a > b),
            BinaryOp::GreaterEqual => Bool(a >= b),
            BinaryOp::Add | BinaryOp::Equal | BinaryOp::NotEqual => {
                unreachable!("handled above")
            }
        }),

        (_, _, _) => Err(SprigError::runtime(position, "Operands must be numbers.")),
    }
}
