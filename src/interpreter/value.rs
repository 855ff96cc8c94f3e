//=============================================
// joss/interpreter/value.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Dynamic value model
// Objective: Runtime values, shared instances, truthiness, display and
//            declared-type tags
//=============================================

//=============================================
//            Section 1: Values
//=============================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::concurrency::{Channel, FutureHandle};
use crate::ast::FunctionDecl;

/// Runtime value types
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Instance(InstanceRef),
    /// A class named in expression position, the receiver of `Class::method`.
    Class(String),
    Function(Arc<FunctionDecl>),
    BoundMethod(Arc<BoundMethod>),
    Builtin(String),
    Future(FutureHandle),
    Channel(Channel),
    Stream(Stream),
}

/// Standard stream sugar for `cout << v` and `cin >> $v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    In,
}

/// A method closed over its receiver. A bodiless method dispatches to the
/// native handler of the receiver's class.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub method: Arc<FunctionDecl>,
    pub receiver: InstanceRef,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Instance(_) => "object",
            Value::Class(_) => "class",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::BoundMethod(_) => "method",
            Value::Future(_) => "future",
            Value::Channel(_) => "channel",
            Value::Stream(_) => "stream",
        }
    }

    //Function: is_truthy
    //Purpose: Apply language truthiness rules
    //Inputs: &self
    //Returns: bool (nil, false, "", "0", 0 and [] are falsy)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::BoundMethod(_) | Value::Builtin(_)
        )
    }

    /// Loose equality: numbers by value, instances by identity, nil only
    /// equals nil, everything else by display form.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Nil, _) | (_, Value::Nil) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => a.to_number() == b.to_number(),
            (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
            (Value::Channel(a), Value::Channel(b)) => a.ptr_eq(b),
            (a, b) => a.to_string() == b.to_string(),
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Nil => write!(f, "nil"),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.fmt_nested(f)?;
                }
                write!(f, "}}")
            }
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class_name()),
            Value::Class(name) => write!(f, "<class {}>", name),
            Value::Function(decl) => write!(f, "<function {}>", decl.name),
            Value::Builtin(name) => write!(f, "<builtin {}>", name),
            Value::BoundMethod(bound) => write!(
                f,
                "<method {}::{}>",
                bound.receiver.class_name(),
                bound.method.name
            ),
            Value::Future(_) => write!(f, "<future>"),
            Value::Channel(_) => write!(f, "<channel>"),
            Value::Stream(Stream::Out) => write!(f, "cout"),
            Value::Stream(Stream::In) => write!(f, "cin"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(n) => write!(f, "Float({:?})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f.debug_map().entries(entries).finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

//=============================================/*
//  Collections have value semantics; instances, channels and futures are
//  handles shared by reference.
//============================================*/
//=============================================
//            Section 2: Instances
//=============================================

#[derive(Debug, Clone)]
pub struct Instance {
    pub class: String,
    pub fields: BTreeMap<String, Value>,
}

/// Shared handle to an object instance.
#[derive(Clone)]
pub struct InstanceRef(Arc<RwLock<Instance>>);

impl InstanceRef {
    pub fn new(class: impl Into<String>) -> Self {
        Self::with_fields(class, BTreeMap::new())
    }

    pub fn with_fields(class: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        InstanceRef(Arc::new(RwLock::new(Instance {
            class: class.into(),
            fields,
        })))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Instance> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Instance> {
        self.0.write()
    }

    pub fn class_name(&self) -> String {
        self.0.read().class.clone()
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.0.read().fields.get(name).cloned()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.0.read().fields.contains_key(name)
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.0.write().fields.insert(name.into(), value);
    }

    pub fn remove_field(&self, name: &str) -> Option<Value> {
        self.0.write().fields.remove(name)
    }

    pub fn fields(&self) -> BTreeMap<String, Value> {
        self.0.read().fields.clone()
    }

    pub fn ptr_eq(&self, other: &InstanceRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class_name())
    }
}

//=============================================
//            Section 3: Declared Type Tags
//=============================================

/// Primitive tag categories; any other tag names a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Mixed,
    Int,
    Float,
    Str,
    Bool,
    Array,
    Map,
    Channel,
    Object,
    Class(String),
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Mixed => f.write_str("mixed"),
            TypeTag::Int => f.write_str("int"),
            TypeTag::Float => f.write_str("float"),
            TypeTag::Str => f.write_str("string"),
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Array => f.write_str("array"),
            TypeTag::Map => f.write_str("map"),
            TypeTag::Channel => f.write_str("channel"),
            TypeTag::Object => f.write_str("object"),
            TypeTag::Class(name) => f.write_str(name),
        }
    }
}

impl TypeTag {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "" | "mixed" | "var" | "let" | "any" => TypeTag::Mixed,
            "int" | "integer" => TypeTag::Int,
            "float" | "double" => TypeTag::Float,
            "string" => TypeTag::Str,
            "bool" | "boolean" => TypeTag::Bool,
            "array" | "list" => TypeTag::Array,
            "map" => TypeTag::Map,
            "channel" => TypeTag::Channel,
            "object" => TypeTag::Object,
            other => TypeTag::Class(other.to_string()),
        }
    }

    /// Zero value for a declaration without initializer.
    pub fn zero_value(&self) -> Value {
        match self {
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Str => Value::Str(String::new()),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Array => Value::Array(Vec::new()),
            TypeTag::Map => Value::Map(BTreeMap::new()),
            _ => Value::Nil,
        }
    }

    /// Kind check for everything except class ancestry, which needs the
    /// class table. Returns `None` for class tags holding an instance.
    pub fn accepts_kind(&self, value: &Value) -> Option<bool> {
        let accepted = match self {
            TypeTag::Mixed => true,
            TypeTag::Int => matches!(value, Value::Int(_)),
            TypeTag::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            TypeTag::Str => matches!(value, Value::Str(_)),
            TypeTag::Bool => matches!(value, Value::Bool(_)),
            TypeTag::Array => matches!(value, Value::Array(_)),
            TypeTag::Map => matches!(value, Value::Map(_)),
            TypeTag::Channel => matches!(value, Value::Channel(_)),
            TypeTag::Object => matches!(value, Value::Instance(_) | Value::Nil),
            TypeTag::Class(_) => match value {
                Value::Nil => true,
                Value::Instance(_) => return None,
                _ => false,
            },
        };
        Some(accepted)
    }

    /// Convert console text into the tagged type, used by `cin >>`.
    pub fn coerce_input(&self, text: &str) -> Value {
        let trimmed = text.trim();
        if trimmed.is_empty() && matches!(self, TypeTag::Int | TypeTag::Float) {
            return self.zero_value();
        }
        match self {
            TypeTag::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Str(text.to_string())),
            TypeTag::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Str(text.to_string())),
            TypeTag::Bool => match trimmed {
                "true" | "1" => Value::Bool(true),
                "false" | "0" | "" => Value::Bool(false),
                _ => Value::Str(text.to_string()),
            },
            _ => Value::Str(text.to_string()),
        }
    }
}
