//=============================================
// joss/interpreter/errors.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime error and control-transfer types
// Objective: Separate fatal runtime errors, catchable throws and the
//            return/break/continue signals that unwind execution
//=============================================

use std::fmt;

use thiserror::Error;

use super::value::Value;
use crate::parser::ParseErrors;

//=============================================
//            Section 1: Runtime Errors
//=============================================

/// Fatal runtime failures. `try`/`catch` can still intercept them and bind
/// their message; otherwise they abort `execute`.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("type mismatch: ${name} is declared as {expected} but got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("method '{method}' not found on class {class}")]
    UndefinedMethod { class: String, method: String },
    #[error("class '{0}' is not defined")]
    UndefinedClass(String),
    #[error("value of type {0} is not callable")]
    NotCallable(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("index error: {0}")]
    IndexError(String),
    #[error("{class}::{method}: {message}")]
    NativeArgument {
        class: String,
        method: String,
        message: String,
    },
    #[error("no native handler registered for {0}")]
    MissingService(String),
    #[error("inheritance cycle detected at class {0}")]
    InheritanceCycle(String),
    #[error("send on closed channel")]
    ChannelClosed,
    #[error("import of '{path}' failed: {message}")]
    Import { path: String, message: String },
    #[error("maximum call depth of {0} exceeded")]
    StackOverflow(usize),
    #[error("async task failed: {0}")]
    TaskFailed(String),
    #[error("uncaught exception: {0}")]
    Uncaught(String),
    #[error("io error: {0}")]
    Io(String),
}

impl RuntimeError {
    pub fn native_argument(
        class: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RuntimeError::NativeArgument {
            class: class.into(),
            method: method.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(value: std::io::Error) -> Self {
        RuntimeError::Io(value.to_string())
    }
}

//=============================================/*
//  Error variants name the failing construct; messages are user facing.
//============================================*/
//=============================================
//            Section 2: Control Signals
//=============================================

/// Result-or-signal channel threaded through statement execution.
#[derive(Debug, Clone)]
pub enum Signal {
    Return(Value),
    Break,
    Continue,
    Throw(Value),
    Error(RuntimeError),
}

pub type Exec<T> = Result<T, Signal>;

impl From<RuntimeError> for Signal {
    fn from(value: RuntimeError) -> Self {
        Signal::Error(value)
    }
}

impl Signal {
    /// Return, break and continue pass through `catch` untouched.
    pub fn is_control_transfer(&self) -> bool {
        matches!(self, Signal::Return(_) | Signal::Break | Signal::Continue)
    }

    /// Collapse a signal that escaped every handler into a runtime error.
    pub fn into_runtime_error(self) -> RuntimeError {
        match self {
            Signal::Error(error) => error,
            Signal::Throw(value) => RuntimeError::Uncaught(value.to_string()),
            Signal::Return(_) => RuntimeError::InvalidOperation("return outside of a call".into()),
            Signal::Break => RuntimeError::InvalidOperation("break outside of a loop".into()),
            Signal::Continue => {
                RuntimeError::InvalidOperation("continue outside of a loop".into())
            }
        }
    }
}

//=============================================
//            Section 3: Host-facing Script Errors
//=============================================

/// Stable code a host can match on; displays as `E001` through `E005`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    Syntax = 1,
    ModuleResolution = 2,
    TypeMismatch = 3,
    InvalidOperation = 4,
    RuntimePanic = 5,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}", *self as u8)
    }
}

impl RuntimeError {
    /// Host-facing category of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::Import { .. } => ErrorCode::ModuleResolution,
            RuntimeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            RuntimeError::InvalidOperation(_)
            | RuntimeError::NotCallable(_)
            | RuntimeError::DivisionByZero
            | RuntimeError::IndexError(_)
            | RuntimeError::UndefinedFunction(_)
            | RuntimeError::UndefinedMethod { .. }
            | RuntimeError::UndefinedClass(_) => ErrorCode::InvalidOperation,
            _ => ErrorCode::RuntimePanic,
        }
    }
}

/// Parse or runtime failure as reported across the embedding boundary.
#[derive(Debug, Clone, Error)]
#[error("error[{code}]: {message}")]
pub struct ScriptError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<ParseErrors> for ScriptError {
    fn from(errors: ParseErrors) -> Self {
        ScriptError {
            code: ErrorCode::Syntax,
            message: errors.to_string(),
        }
    }
}

impl From<RuntimeError> for ScriptError {
    fn from(error: RuntimeError) -> Self {
        ScriptError {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_with_three_digits() {
        assert_eq!(ErrorCode::Syntax.to_string(), "E001");
        assert_eq!(ErrorCode::RuntimePanic.to_string(), "E005");
    }

    #[test]
    fn runtime_errors_map_to_host_codes() {
        let err = ScriptError::from(RuntimeError::DivisionByZero);
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert_eq!(err.to_string(), "error[E004]: division by zero");
        assert_eq!(RuntimeError::StackOverflow(8).code(), ErrorCode::RuntimePanic);
    }
}
