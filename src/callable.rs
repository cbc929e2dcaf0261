use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{Result, SprigError};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Position;
use crate::value::Value;

/// Uniform invocation contract for user functions and host natives.
///
/// The interpreter checks the argument count against [`Callable::arity`]
/// before calling, so implementations can index `arguments` freely.
pub trait Callable {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        call_site: Position,
    ) -> Result<Value>;

    /// How the value prints.
    fn describe(&self) -> String {
        format!("<fn {}>", self.name())
    }
}

impl fmt::Debug for dyn Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A user function: its declaration plus the scope that was current when
/// the `func` statement ran.
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef) -> Self {
        Self {
            declaration,
            closure,
        }
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        &self.declaration.name.name
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        _call_site: Position,
    ) -> Result<Value> {
        // Parent is the captured scope, never the caller's.
        let environment: EnvRef = Environment::child_of(&self.closure);

        {
            let mut scope = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                debug!("Binding parameter '{}' to {:?}", param.name, argument);
                scope.define(Rc::clone(&param.name), argument);
            }
        }

        match interpreter.execute_block(&self.declaration.body, environment)? {
            Flow::Normal => Ok(Value::Nil),
            Flow::Return(value) => Ok(value),
        }
    }
}

// The closure may contain this very function, so only the name is printed.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

pub type NativeFn = Box<dyn Fn(&[Value]) -> std::result::Result<Value, String>>;

/// A host‑provided function living in the global scope.
pub struct NativeFunction {
    name: String,
    arity: usize,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, arity: usize, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }

    /// `clock()`: seconds elapsed on a monotonic clock since creation.
    pub fn clock() -> Self {
        let start: Instant = Instant::now();

        Self::new(
            "clock",
            0,
            Box::new(move |_args: &[Value]| Ok(Value::Number(start.elapsed().as_secs_f64()))),
        )
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        call_site: Position,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|message| SprigError::runtime(call_site, message))
    }

    fn describe(&self) -> String {
        format!("<native fn {}>", self.name)
    }
}
