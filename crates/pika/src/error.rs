//! Error types for Pika evaluation

use thiserror::Error;

/// Main error type for Pika operations.
///
/// The `Display` text of an error is the user-visible message and also the
/// payload recovered by the `try` native. Identifier and value payloads are
/// stored pre-escaped (see [`crate::conv::escape`]) so the message reads the
/// way the value would be written in source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The parser cannot proceed; carries the specific message
    /// (e.g. `Missing ')'`, `Unterminated string`).
    #[error("{0}")]
    Syntax(String),

    /// A value was not exactly `true` or `false`.
    #[error("Invalid boolean: {0}")]
    InvalidBoolean(String),

    /// A value could not be parsed as a number (or integer) in full.
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Symbol lookup missed without a fallback hit.
    #[error("Undefined: {0}")]
    Undefined(String),

    /// The variable space refused an assignment.
    #[error("Cannot modify: {0}")]
    CannotModify(String),

    /// A reference prefix named a frame not on the caller chain.
    #[error("Frame does not exist: {0}")]
    FrameDoesNotExist(String),

    /// Malformed reference syntax (e.g. an unterminated frame label).
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A call was performed on a value that is not a function body,
    /// lambda or native literal.
    #[error("Illegal call on: {0}")]
    IllegalCall(String),

    /// A native object was invoked that does not support calling.
    #[error("Not callable")]
    NotCallable,

    /// A `<identifier>` call named a native that is not registered.
    #[error("Unknown native function: {0}")]
    UnknownNative(String),

    /// An lvalue-requiring context received a computed rvalue.
    #[error("Invalid lvalue")]
    InvalidLValue,

    /// `else` encountered outside an `if` position.
    #[error("Unexpected 'else' (preceded by ';'?)")]
    UnexpectedElse,

    /// `char` received a code outside the representable range.
    #[error("Illegal character code: {0}")]
    IllegalCharacterCode(String),

    /// A method-dispatch helper was applied to a `$callee` without a `.`.
    #[error("Non-method call")]
    NonMethodCall,

    /// Integer division (`\`) by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// The configured maximum call depth was exceeded.
    #[error("Stack overflow: call depth exceeds {max}")]
    StackOverflow {
        /// The configured limit.
        max: usize,
    },

    /// Raised by the `throw` native; carries the user payload verbatim.
    #[error("{0}")]
    Thrown(String),
}

/// Result type alias for Pika operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::Syntax`] with a fixed message.
    pub(crate) fn syntax(message: &str) -> Error {
        Error::Syntax(message.to_string())
    }
}
