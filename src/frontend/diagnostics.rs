//! Diagnostics for the Osprey front end.
//!
//! A [`CompileError`] is one fatal diagnostic: the error kind plus the source
//! line it was detected on. The parser is fail-fast, so a compilation carries
//! at most one of these to the user; the lexer may record several (it always
//! keeps producing tokens) and the first recorded one wins.

use thiserror::Error;

use crate::frontend::types::ValueType;

/// Every diagnostic the front end can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Lexical
    #[error("unrecognized token '{0}'")]
    UnrecognizedToken(String),
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("missing terminating '\"' character")]
    UnterminatedString,
    #[error("too many decimal points in number")]
    ExtraDecimalPoint,
    #[error("{0} exceeds the maximum token length")]
    TokenTooLong(String),

    // Syntactic
    #[error("expected '{expected}', found '{found}'")]
    ExpectedToken { expected: String, found: String },
    #[error("expected {expected}, found '{found}'")]
    Expected { expected: String, found: String },
    #[error("nesting too deep")]
    NestingTooDeep,

    // Semantic
    #[error("duplicate declaration of '{0}'")]
    DuplicateDeclaration(String),
    #[error("undeclared symbol '{0}'")]
    UndeclaredSymbol(String),
    #[error("'{0}' is not a variable and cannot be assigned to")]
    NotAVariable(String),
    #[error("'{0}' is not an array")]
    NotAnArray(String),
    #[error("'{0}' is not a procedure")]
    NotAProcedure(String),
    #[error("procedure '{name}' takes exactly {expected} argument(s)")]
    WrongArgumentCount { name: String, expected: usize },
    #[error("argument {position} of '{name}' must be {expected}, found {found}")]
    InvalidArgumentType {
        name: String,
        position: usize,
        expected: ValueType,
        found: ValueType,
    },
    #[error("invalid operand of type {operand} for operator '{op}'")]
    InvalidOperandType { op: String, operand: ValueType },
    #[error("operator '{op}' cannot combine {lhs} and {rhs}")]
    IncompatibleOperands {
        op: String,
        lhs: ValueType,
        rhs: ValueType,
    },
    #[error("cannot assign {found} to a location of type {expected}")]
    IncompatibleAssignment { expected: ValueType, found: ValueType },
    #[error("condition must be BOOL")]
    NonBoolCondition,
    #[error("array length must be an integer literal of at least 1")]
    IllegalArrayLength,
    #[error("array index must be INTEGER")]
    IllegalArrayIndex,
    #[error("RETURN is only legal inside a procedure body")]
    ReturnOutsideProcedure,
    #[error("cannot convert return value of type {found} to {expected}")]
    IncompatibleReturnType { expected: ValueType, found: ValueType },
}

impl ErrorKind {
    /// Coarse class of the diagnostic, for log filtering.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::UnrecognizedToken(_)
            | ErrorKind::UnterminatedComment
            | ErrorKind::UnterminatedString
            | ErrorKind::ExtraDecimalPoint
            | ErrorKind::TokenTooLong(_) => ErrorClass::Lexical,
            ErrorKind::ExpectedToken { .. } | ErrorKind::Expected { .. } | ErrorKind::NestingTooDeep => {
                ErrorClass::Syntactic
            }
            _ => ErrorClass::Semantic,
        }
    }
}

/// Lexical / syntactic / semantic, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Lexical,
    Syntactic,
    Semantic,
}

/// A fatal front-end diagnostic with its source line.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: error: {kind}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub line: u32,
}

impl CompileError {
    pub fn new(kind: ErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// Render a diagnostic with the file it came from, `file:line: error: ...`.
pub fn format_error(file_name: &str, error: &CompileError) -> String {
    format!("{}:{}: error: {}", file_name, error.line, error.kind)
}
