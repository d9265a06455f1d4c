//! Structured outer-interpreter / compile-time failures (§7).
//!
//! These never abort the VM: the outer interpreter reports one diagnostic line
//! through the `Msg` sink and abandons the current input line. Runtime faults
//! inside the inner interpreter (division by zero, stack underflow, out-of-range
//! memory access) are deliberately *not* represented here — §4.4 defines them as
//! silent degenerate outcomes, never errors.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The arena, a stack, the word table, or the control stack is full.
    CapacityExhausted(&'static str),
    /// A token is neither a number nor a known word.
    UnknownToken(String),
    /// A directive was used where the compiler state forbids it (e.g. `THEN`
    /// with no matching `IF`, or a structured-flow word outside a definition).
    BadDirectiveContext(&'static str),
    /// A `."` string literal ran off the end of the line before its closing `"`.
    UnterminatedString,
    /// The on-disk image failed magic/version/bounds validation.
    ImageFormat(&'static str),
    /// The host filesystem refused a read or write.
    Io(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::CapacityExhausted(what) => write!(f, "{what} capacity exhausted"),
            CoreError::UnknownToken(tok) => write!(f, "? {tok}"),
            CoreError::BadDirectiveContext(word) => write!(f, "{word} used in the wrong context"),
            CoreError::UnterminatedString => write!(f, "unterminated string literal"),
            CoreError::ImageFormat(why) => write!(f, "image format error: {why}"),
            CoreError::Io(why) => write!(f, "I/O error: {why}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;
