use compact_str::CompactString;
use thiserror::Error;

/// Where a token-anchored diagnostic points: the end of the token stream or
/// a concrete lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    Eof,
    Lexeme(CompactString),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParserErrorKind {
    /// Missing punctuation or keyword; the payload is the full message.
    #[error("{0}")]
    ExpectedSyntax(&'static str),
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}")]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub line: u32,
    pub location: ErrorLocation,
}
