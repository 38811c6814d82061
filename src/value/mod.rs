mod error;

pub use error::{RuntimeError, RuntimeErrorKind};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use compact_str::{CompactString, CompactStringExt};

use crate::interpreter::environment::Environment;
use crate::parser::ast::{Ident, StmtId};
use crate::resolver::ResolvedAst;

/// Host-provided callable, injected into the global frame before execution.
pub trait NativeFunction: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> usize;
    fn call(&self, arguments: &[LoxValue]) -> Result<LoxValue, RuntimeErrorKind>;
}

/// A user function value: the declaration's pieces plus the environment
/// captured at its declaration site. The shared program handle keeps the
/// body's AST alive for as long as the closure is reachable.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub parameters: Vec<Ident>,
    pub body: Vec<StmtId>,
    pub program: Arc<ResolvedAst>,
    pub closure: Option<Environment>,
    pub is_initializer: bool,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Binds the method to an instance: a fresh frame holding `this` at
    /// slot 0, parented on the original closure. The resolver lays out
    /// `this` to match.
    pub fn bind(&self, instance: &Arc<Instance>) -> Function {
        let frame = Environment::new(self.closure.clone());
        frame.define("this", LoxValue::Instance(instance.clone()));
        Function {
            closure: Some(frame),
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: Ident,
    pub methods: HashMap<CompactString, Arc<Function>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<&Arc<Function>> {
        self.methods.get(name)
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Arc<Class>,
    pub fields: Mutex<HashMap<CompactString, LoxValue>>,
}

#[derive(Debug, Clone)]
pub enum LoxValue {
    Nil,
    Bool(bool),
    Number(f64),
    String(CompactString),
    NativeFunction(Arc<dyn NativeFunction>),
    Function(Arc<Function>),
    Class(Arc<Class>),
    Instance(Arc<Instance>),
}

impl std::fmt::Display for LoxValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(v) => write!(f, "{v}"),
            // Integral doubles print without a fraction.
            Self::Number(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::NativeFunction(_) => write!(f, "<native fn>"),
            Self::Function(function) => write!(f, "<fn {}>", function.name),
            Self::Class(class) => write!(f, "{}", class.name),
            Self::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

impl LoxValue {
    /// `nil` and `false` are falsey, a number is falsey when zero,
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            LoxValue::Nil | LoxValue::Bool(false) => false,
            LoxValue::Number(v) => *v != 0.0,
            _ => true,
        }
    }

    pub fn logical_not(&self) -> bool {
        !self.is_truthy()
    }

    pub fn numeric_negate(&self) -> Result<LoxValue, RuntimeErrorKind> {
        match self {
            LoxValue::Number(v) => Ok(LoxValue::Number(-v)),
            _ => Err(RuntimeErrorKind::NonNumericOperand),
        }
    }
}

// Arithmetic and comparison
impl LoxValue {
    /// Numbers add, strings concatenate, anything else is a type error.
    pub fn add(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Number(lhs + rhs)),
            (LoxValue::String(lhs), LoxValue::String(rhs)) => {
                Ok(LoxValue::String([lhs, rhs].concat_compact()))
            }
            _ => Err(RuntimeErrorKind::IncompatibleOperands),
        }
    }

    pub fn subtract(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Number(lhs - rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    pub fn multiply(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Number(lhs * rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Division by zero follows IEEE-754; only the operand types can fail.
    pub fn divide(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Number(lhs / rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    pub fn less_than(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Bool(lhs < rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    pub fn less_than_or_equal(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Bool(lhs <= rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    pub fn greater_than(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Bool(lhs > rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    pub fn greater_than_or_equal(&self, other: &LoxValue) -> Result<LoxValue, RuntimeErrorKind> {
        match (self, other) {
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => Ok(LoxValue::Bool(lhs >= rhs)),
            _ => Err(RuntimeErrorKind::NonNumericOperands),
        }
    }

    /// Structural equality for atoms, identity for callables and instances.
    /// Differently-tagged values never compare equal.
    pub fn is_equal(&self, other: &LoxValue) -> bool {
        match (self, other) {
            (LoxValue::Nil, LoxValue::Nil) => true,
            (LoxValue::Bool(lhs), LoxValue::Bool(rhs)) => lhs == rhs,
            (LoxValue::Number(lhs), LoxValue::Number(rhs)) => lhs == rhs,
            (LoxValue::String(lhs), LoxValue::String(rhs)) => lhs == rhs,
            (LoxValue::NativeFunction(lhs), LoxValue::NativeFunction(rhs)) => {
                Arc::ptr_eq(lhs, rhs)
            }
            (LoxValue::Function(lhs), LoxValue::Function(rhs)) => Arc::ptr_eq(lhs, rhs),
            (LoxValue::Class(lhs), LoxValue::Class(rhs)) => Arc::ptr_eq(lhs, rhs),
            (LoxValue::Instance(lhs), LoxValue::Instance(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}
