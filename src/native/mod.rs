//==================================================
// File: native/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Native Bridge between scripts and host services
// Objective: Name the native classes, hold per-class handlers and provide the
//            argument helpers every handler shares
//==================================================

mod collections;
mod system;
mod web;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{InstanceRef, Value};
use crate::interpreter::Interpreter;

pub(crate) use self::web::{redirect_response, REQUEST_GLOBAL, SESSION_GLOBAL};

//==================================================
// Section 1.0 - Native Class Names
//==================================================

/// Classes backed by a host handler rather than script bodies.
pub const NATIVE_CLASSES: &[&str] = &[
    "Stack",
    "Queue",
    "GranMySQL",
    "GranDB",
    "Auth",
    "System",
    "SmtpClient",
    "Cron",
    "Task",
    "View",
    "Router",
    "Request",
    "Response",
    "RedirectResponse",
    "Redirect",
    "Session",
    "Security",
    "Server",
    "Log",
    "WebSocket",
    "Redis",
    "Cache",
    "Math",
    "Schema",
    "Blueprint",
    "Migration",
];

static NATIVE_CLASS_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NATIVE_CLASSES.iter().copied().collect());

pub fn is_native_class(name: &str) -> bool {
    NATIVE_CLASS_SET.contains(name)
}

//==================================================
// Section 2.0 - Handler Registry
//==================================================

/// Host-side implementation of one native class. Constructors arrive as the
/// method name `constructor`.
pub trait NativeHandler: Send + Sync {
    fn call(
        &self,
        interp: &mut Interpreter,
        instance: &InstanceRef,
        method: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError>;
}

impl<F> NativeHandler for F
where
    F: Fn(&mut Interpreter, &InstanceRef, &str, &[Value]) -> Result<Value, RuntimeError>
        + Send
        + Sync,
{
    fn call(
        &self,
        interp: &mut Interpreter,
        instance: &InstanceRef,
        method: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        self(interp, instance, method, args)
    }
}

#[derive(Clone, Default)]
pub struct NativeRegistry {
    handlers: HashMap<String, Arc<dyn NativeHandler>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the handlers this crate ships. Database, mail,
    /// cache and the other service classes are left to the host.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register("Stack", collections::stack);
        registry.register("Queue", collections::queue);
        registry.register("Math", collections::math);
        registry.register("System", system::system);
        registry.register("Log", system::log);
        registry.register("Request", web::request);
        registry.register("Session", web::session);
        registry.register("Response", web::response);
        registry.register("Redirect", web::redirect);
        registry.register("RedirectResponse", web::redirect_instance);
        registry.register("Router", web::router);
        registry
    }

    pub fn register(&mut self, class: &str, handler: impl NativeHandler + 'static) {
        self.handlers.insert(class.to_string(), Arc::new(handler));
    }

    pub fn get(&self, class: &str) -> Option<Arc<dyn NativeHandler>> {
        self.handlers.get(class).cloned()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.handlers.contains_key(class)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}

//==================================================
// Section 3.0 - Argument Helpers
//==================================================

pub(crate) fn arg<'a>(
    class: &str,
    method: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Value, RuntimeError> {
    args.get(index).ok_or_else(|| {
        RuntimeError::native_argument(class, method, format!("missing argument {}", index + 1))
    })
}

pub(crate) fn string_arg(
    class: &str,
    method: &str,
    args: &[Value],
    index: usize,
) -> Result<String, RuntimeError> {
    match arg(class, method, args, index)? {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        other => Err(RuntimeError::native_argument(
            class,
            method,
            format!("argument {} must be a string, got {}", index + 1, other.type_name()),
        )),
    }
}

pub(crate) fn number_arg(
    class: &str,
    method: &str,
    args: &[Value],
    index: usize,
) -> Result<Value, RuntimeError> {
    match arg(class, method, args, index)? {
        number @ (Value::Int(_) | Value::Float(_)) => Ok(number.clone()),
        other => Err(RuntimeError::native_argument(
            class,
            method,
            format!("argument {} must be a number, got {}", index + 1, other.type_name()),
        )),
    }
}

pub(crate) fn map_arg(
    class: &str,
    method: &str,
    args: &[Value],
    index: usize,
) -> Result<BTreeMap<String, Value>, RuntimeError> {
    match args.get(index) {
        None | Some(Value::Nil) => Ok(BTreeMap::new()),
        Some(Value::Map(entries)) => Ok(entries.clone()),
        Some(Value::Instance(instance)) => Ok(instance.fields()),
        Some(other) => Err(RuntimeError::native_argument(
            class,
            method,
            format!("argument {} must be a map, got {}", index + 1, other.type_name()),
        )),
    }
}

pub(crate) fn unknown_method(class: &str, method: &str) -> RuntimeError {
    RuntimeError::UndefinedMethod {
        class: class.to_string(),
        method: method.to_string(),
    }
}
