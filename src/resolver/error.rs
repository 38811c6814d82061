use thiserror::Error;

use crate::parser::ErrorLocation;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionErrorKind {
    #[error("Already a variable with this name in this scope.")]
    DuplicateDeclaration,
    #[error("Can't read local variable in its own initializer.")]
    SelfReferentialInitializer,
    #[error("Unused variable")]
    UnusedVariable,
    #[error("Can't return from top-level code.")]
    TopLevelReturn,
    #[error("Can't return a value from an initializer.")]
    ReturnValueInInitializer,
    #[error("Can't use 'break' outside of loop")]
    BreakOutsideLoop,
    #[error("Can't use 'this' outside of a class.")]
    ThisOutsideClass,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}")]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub line: u32,
    pub location: ErrorLocation,
}
