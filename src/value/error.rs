use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    NonNumericOperand,
    #[error("Operands must be numbers.")]
    NonNumericOperands,
    #[error("Binary operator values not compatible")]
    IncompatibleOperands,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(CompactString),
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {actual}.")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Only instances have properties")]
    NonInstanceProperty,
    #[error("Only instances have fields")]
    NonInstanceField,
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(CompactString),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: u32,
}
