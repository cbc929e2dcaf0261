//! Lexical scope chain.
//!
//! Each scope is shared as `Rc<RefCell<Environment>>`: the interpreter's
//! current frame holds one reference, and every function value created in
//! that scope holds another, so a scope lives exactly as long as its last
//! holder.  Parent links only point outward, so the chain never cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{Result, SprigError};
use crate::token::Position;
use crate::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Default)]
pub struct Environment {
    values: HashMap<Rc<str>, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A root (global) scope.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh child of `parent` ready for sharing.
    pub fn child_of(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(parent))))
    }

    /// Insert or overwrite in this scope only.
    pub fn define(&mut self, name: impl Into<Rc<str>>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Search outward from this scope.
    pub fn get(&self, name: &str, position: Position) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, position)
        } else {
            Err(undefined(name, position))
        }
    }

    /// Overwrite the nearest existing binding; never creates one.
    pub fn assign(&mut self, name: &str, value: Value, position: Position) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, position)
        } else {
            Err(undefined(name, position))
        }
    }

    /// The scope exactly `distance` parent links above `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let parent: EnvRef = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// Read `name` from the scope `distance` links up, without searching.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str, position: Position) -> Result<Value> {
        debug!("get_at distance={} name={}", distance, name);

        let scope: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name, position))?;
        let value = scope.borrow().values.get(name).cloned();

        value.ok_or_else(|| undefined(name, position))
    }

    /// Write `name` in the scope `distance` links up, without searching.
    pub fn assign_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        value: Value,
        position: Position,
    ) -> Result<()> {
        debug!("assign_at distance={} name={}", distance, name);

        let scope: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name, position))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name, position)),
        }
    }
}

fn undefined(name: &str, position: Position) -> SprigError {
    SprigError::runtime(position, format!("Undefined variable '{}'.", name))
}
