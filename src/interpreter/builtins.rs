//=============================================
// joss/interpreter/builtins.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Builtin function table
// Objective: Register the global builtins (output, collections, JSON, files,
//            conversions, futures and channels) with their arity contracts
//=============================================

//=============================================
//            Section 1: Registry
//=============================================

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use tracing::debug;

use super::concurrency::{Channel, FutureHandle};
use super::errors::{Exec, RuntimeError, Signal};
use super::json::{json_to_value, value_to_json};
use super::value::Value;
use super::Interpreter;

type BuiltinFn = fn(&mut Interpreter, Vec<Value>) -> Exec<Value>;

/// Accepted argument counts for a builtin.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Exact(usize),
    Range { min: usize, max: Option<usize> },
}

impl Arity {
    fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => *n == count,
            Arity::Range { min, max } => count >= *min && max.is_none_or(|max| count <= max),
        }
    }

    fn describe(&self) -> String {
        match self {
            Arity::Exact(n) => format!("{}", n),
            Arity::Range { min, max: Some(max) } => format!("{} to {}", min, max),
            Arity::Range { min, max: None } => format!("at least {}", min),
        }
    }
}

struct Builtin {
    arity: Arity,
    func: BuiltinFn,
}

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let variadic = Arity::Range { min: 0, max: None };

    register_builtin(&mut table, "print", variadic, builtin_print);
    register_builtin(&mut table, "echo", variadic, builtin_print);
    register_builtin(&mut table, "printf", Arity::Range { min: 1, max: None }, builtin_printf);
    register_builtin(&mut table, "env", Arity::Range { min: 1, max: Some(2) }, builtin_env);
    register_builtin(&mut table, "len", Arity::Exact(1), builtin_len);
    register_builtin(&mut table, "count", Arity::Exact(1), builtin_len);
    register_builtin(&mut table, "keys", Arity::Exact(1), builtin_keys);
    register_builtin(&mut table, "values", Arity::Exact(1), builtin_values);
    register_builtin(&mut table, "explode", Arity::Exact(2), builtin_explode);
    register_builtin(&mut table, "implode", Arity::Exact(2), builtin_implode);
    register_builtin(&mut table, "end", Arity::Exact(1), builtin_end);
    register_builtin(&mut table, "append", Arity::Range { min: 1, max: None }, builtin_append);
    register_builtin(&mut table, "merge", Arity::Exact(2), builtin_merge);
    register_builtin(&mut table, "json_encode", Arity::Exact(1), builtin_json_encode);
    register_builtin(&mut table, "json_decode", Arity::Exact(1), builtin_json_decode);
    register_builtin(&mut table, "json_verify", Arity::Exact(1), builtin_json_verify);
    register_builtin(&mut table, "file_get_contents", Arity::Exact(1), builtin_file_get_contents);
    register_builtin(&mut table, "str", Arity::Exact(1), builtin_str);
    register_builtin(&mut table, "int", Arity::Exact(1), builtin_int);
    register_builtin(&mut table, "float", Arity::Exact(1), builtin_float);
    register_builtin(&mut table, "typeof", Arity::Exact(1), builtin_typeof);
    register_builtin(&mut table, "async", Arity::Exact(1), builtin_async);
    register_builtin(&mut table, "await", Arity::Exact(1), builtin_await);
    register_builtin(&mut table, "make_chan", Arity::Range { min: 0, max: Some(1) }, builtin_make_chan);
    register_builtin(&mut table, "send", Arity::Exact(2), builtin_send);
    register_builtin(&mut table, "recv", Arity::Exact(1), builtin_recv);
    register_builtin(&mut table, "close", Arity::Exact(1), builtin_close);
    table
});

fn register_builtin(
    table: &mut HashMap<&'static str, Builtin>,
    name: &'static str,
    arity: Arity,
    func: BuiltinFn,
) {
    table.insert(name, Builtin { arity, func });
}

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

impl Interpreter {
    pub(crate) fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Exec<Value> {
        let builtin = BUILTINS
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))?;
        if !builtin.arity.accepts(args.len()) {
            return Err(RuntimeError::InvalidOperation(format!(
                "{} expects {} argument(s), got {}",
                name,
                builtin.arity.describe(),
                args.len()
            ))
            .into());
        }
        (builtin.func)(self, args)
    }
}

fn expect_string(value: &Value, context: &str) -> Result<String, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(RuntimeError::InvalidOperation(format!(
            "{} expects string, got {}",
            context,
            other.type_name()
        ))),
    }
}

fn expect_channel<'a>(value: &'a Value, context: &str) -> Result<&'a Channel, RuntimeError> {
    match value {
        Value::Channel(channel) => Ok(channel),
        other => Err(RuntimeError::InvalidOperation(format!(
            "{} expects channel, got {}",
            context,
            other.type_name()
        ))),
    }
}

//=============================================/*
//  Builtins receive owned, already evaluated arguments whose count has been
//  checked against the registered arity.
//============================================*/
//=============================================
//            Section 2: Output
//=============================================

fn builtin_print(interp: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    for arg in &args {
        interp
            .shared
            .output
            .write_line(&arg.to_string())
            .map_err(RuntimeError::from)?;
    }
    Ok(Value::Nil)
}

fn builtin_printf(interp: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let format = expect_string(&args[0], "printf format")?;
    let rendered = format_printf(&format, &args[1..]);
    interp.shared.output.write_str(&rendered).map_err(RuntimeError::from)?;
    Ok(Value::Nil)
}

/// Render `%s %d %f %v %%`, with an optional precision for `%f` (`%.2f`).
pub(crate) fn format_printf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }

        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('v') => {
                if let Some(arg) = args.next() {
                    out.push_str(&arg.to_string());
                }
            }
            Some('d') => {
                if let Some(arg) = args.next() {
                    match arg {
                        Value::Float(n) => out.push_str(&(n.trunc() as i64).to_string()),
                        other => out.push_str(&other.to_string()),
                    }
                }
            }
            Some('f') => {
                if let Some(arg) = args.next() {
                    let number = arg.to_number().unwrap_or(0.0);
                    out.push_str(&format!("{:.*}", precision.unwrap_or(6), number));
                }
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

//=============================================
//            Section 3: Environment & Files
//=============================================

fn builtin_env(interp: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let key = expect_string(&args[0], "env key")?;
    match interp.env_var(&key) {
        Some(value) => Ok(Value::Str(value)),
        None => Ok(args.get(1).cloned().unwrap_or_else(|| Value::Str(String::new()))),
    }
}

fn builtin_file_get_contents(interp: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let path = PathBuf::from(expect_string(&args[0], "file_get_contents path")?);
    let resolved = match interp.script_dir() {
        Some(dir) if path.is_relative() && dir.join(&path).is_file() => dir.join(&path),
        _ => path,
    };
    debug!(path = %resolved.display(), "reading file");
    let contents = fs::read_to_string(&resolved).map_err(RuntimeError::from)?;
    Ok(Value::Str(contents))
}

//=============================================
//            Section 4: Collections
//=============================================

fn builtin_len(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let len = match &args[0] {
        Value::Array(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Str(s) => s.chars().count(),
        Value::Instance(instance) => instance.fields().len(),
        Value::Channel(channel) => channel.len(),
        _ => 0,
    };
    Ok(Value::Int(len as i64))
}

fn builtin_keys(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    match &args[0] {
        Value::Map(entries) => Ok(Value::Array(
            entries.keys().cloned().map(Value::Str).collect(),
        )),
        Value::Array(items) => Ok(Value::Array(
            (0..items.len() as i64).map(Value::Int).collect(),
        )),
        other => Err(RuntimeError::InvalidOperation(format!(
            "keys expects map or array, got {}",
            other.type_name()
        ))
        .into()),
    }
}

fn builtin_values(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    match args.into_iter().next() {
        Some(Value::Map(entries)) => Ok(Value::Array(entries.into_values().collect())),
        Some(array @ Value::Array(_)) => Ok(array),
        Some(other) => Err(RuntimeError::InvalidOperation(format!(
            "values expects map or array, got {}",
            other.type_name()
        ))
        .into()),
        None => Ok(Value::Nil),
    }
}

fn builtin_explode(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let delimiter = expect_string(&args[0], "explode delimiter")?;
    let text = expect_string(&args[1], "explode string")?;
    if delimiter.is_empty() {
        return Err(RuntimeError::InvalidOperation("explode delimiter is empty".into()).into());
    }
    Ok(Value::Array(
        text.split(delimiter.as_str())
            .map(|part| Value::Str(part.to_string()))
            .collect(),
    ))
}

fn builtin_implode(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let (glue, items) = match (&args[0], &args[1]) {
        (Value::Str(glue), Value::Array(items)) | (Value::Array(items), Value::Str(glue)) => {
            (glue, items)
        }
        _ => {
            return Err(RuntimeError::InvalidOperation(
                "implode expects a string glue and an array".into(),
            )
            .into())
        }
    };
    let joined = items
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(glue.as_str());
    Ok(Value::Str(joined))
}

fn builtin_end(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    match &args[0] {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Nil)),
        Value::Map(entries) => Ok(entries.values().last().cloned().unwrap_or(Value::Nil)),
        _ => Ok(Value::Nil),
    }
}

fn builtin_append(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let mut args = args.into_iter();
    let mut items = match args.next() {
        Some(Value::Array(items)) => items,
        Some(Value::Nil) | None => Vec::new(),
        Some(other) => {
            return Err(RuntimeError::InvalidOperation(format!(
                "append expects array, got {}",
                other.type_name()
            ))
            .into())
        }
    };
    items.extend(args);
    Ok(Value::Array(items))
}

fn builtin_merge(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Value::Array(mut left)), Some(Value::Array(right))) => {
            left.extend(right);
            Ok(Value::Array(left))
        }
        (Some(Value::Map(mut left)), Some(Value::Map(right))) => {
            left.extend(right);
            Ok(Value::Map(left))
        }
        (Some(left), Some(right)) => Err(RuntimeError::InvalidOperation(format!(
            "merge expects two arrays or two maps, got {} and {}",
            left.type_name(),
            right.type_name()
        ))
        .into()),
        _ => Ok(Value::Nil),
    }
}

//=============================================
//            Section 5: JSON & Conversions
//=============================================

fn builtin_json_encode(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let encoded = serde_json::to_string(&value_to_json(&args[0]))
        .map_err(|error| RuntimeError::InvalidOperation(error.to_string()))?;
    Ok(Value::Str(encoded))
}

fn builtin_json_decode(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let text = expect_string(&args[0], "json_decode")?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(json_to_value(&json)),
        Err(error) => {
            debug!(%error, "json_decode failed");
            Ok(Value::Nil)
        }
    }
}

fn builtin_json_verify(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let valid = match &args[0] {
        Value::Str(text) => serde_json::from_str::<serde_json::Value>(text).is_ok(),
        _ => false,
    };
    Ok(Value::Bool(valid))
}

fn builtin_str(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Str(args[0].to_string()))
}

fn builtin_int(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let converted = match &args[0] {
        Value::Int(n) => *n,
        Value::Float(n) => n.trunc() as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .or_else(|_| trimmed.parse::<f64>().map(|n| n.trunc() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    };
    Ok(Value::Int(converted))
}

fn builtin_float(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let converted = match &args[0] {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(Value::Float(converted))
}

fn builtin_typeof(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let name = match &args[0] {
        Value::Instance(instance) => instance.class_name(),
        other => other.type_name().to_string(),
    };
    Ok(Value::Str(name))
}

//=============================================
//            Section 6: Futures & Channels
//=============================================

/// `async` called as a value: callables run on a task, anything else is
/// already resolved.
fn builtin_async(interp: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let Some(value) = args.into_iter().next() else {
        return Ok(Value::Nil);
    };
    if !value.is_callable() {
        return Ok(Value::Future(FutureHandle::ready(Ok(value))));
    }
    let mut worker = interp.fork();
    let future = super::concurrency::spawn_task(move || worker.call_value(value, Vec::new()))?;
    Ok(Value::Future(future))
}

fn builtin_await(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    match &args[0] {
        Value::Future(future) => match future.wait() {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Break) | Err(Signal::Continue) => Ok(Value::Nil),
            Err(signal) => Err(signal),
        },
        other => Ok(other.clone()),
    }
}

fn builtin_make_chan(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let capacity = match args.first() {
        Some(Value::Int(n)) if *n >= 0 => *n as usize,
        Some(Value::Int(n)) => {
            return Err(RuntimeError::InvalidOperation(format!(
                "channel capacity must be non-negative, got {}",
                n
            ))
            .into())
        }
        Some(other) => {
            return Err(RuntimeError::InvalidOperation(format!(
                "make_chan expects int capacity, got {}",
                other.type_name()
            ))
            .into())
        }
        None => 0,
    };
    Ok(Value::Channel(Channel::new(capacity)))
}

fn builtin_send(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let channel = expect_channel(&args[0], "send")?;
    channel.send(args[1].clone())?;
    Ok(Value::Nil)
}

fn builtin_recv(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let channel = expect_channel(&args[0], "recv")?;
    Ok(channel.recv().unwrap_or(Value::Nil))
}

fn builtin_close(_: &mut Interpreter, args: Vec<Value>) -> Exec<Value> {
    let channel = expect_channel(&args[0], "close")?;
    channel.close()?;
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn printf_renders_verbs_and_precision() {
        let rendered = format_printf(
            "%s has %d items costing %.2f (%v) 100%%",
            &[
                Value::Str("cart".into()),
                Value::Int(3),
                Value::Float(9.5),
                Value::Bool(true),
            ],
        );
        assert_eq!(rendered, "cart has 3 items costing 9.50 (true) 100%");
    }

    #[test]
    fn arity_ranges_bound_argument_counts() {
        let env = Arity::Range {
            min: 1,
            max: Some(2),
        };
        assert!(!env.accepts(0));
        assert!(env.accepts(2));
        assert!(!env.accepts(3));
        assert!(Arity::Range { min: 0, max: None }.accepts(10));
    }

    #[test]
    fn builtin_table_covers_channel_primitives() {
        for name in ["make_chan", "send", "recv", "close", "await", "async"] {
            assert!(is_builtin(name), "{name} should be registered");
        }
        assert!(!is_builtin("undefined_helper"));
    }

    #[test]
    fn merge_prefers_right_hand_keys() {
        let mut interp = Interpreter::new();
        let left = Value::Map(BTreeMap::from([("a".to_string(), Value::Int(1))]));
        let right = Value::Map(BTreeMap::from([("a".to_string(), Value::Int(2))]));
        let merged = builtin_merge(&mut interp, vec![left, right]).expect("merge");
        assert_eq!(merged.to_string(), "{a: 2}");
    }
}
