//==================================================
// File: native/collections.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Stack, Queue and Math native classes
// Objective: Keep container state in the instance `_data` field and expose
//            integer-aware math helpers
//==================================================

use rand::Rng;

use super::{arg, number_arg, unknown_method};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{InstanceRef, Value};
use crate::interpreter::Interpreter;

const DATA_FIELD: &str = "_data";

//==================================================
// Section 1.0 - Stack & Queue
//==================================================

fn data_of(instance: &InstanceRef) -> Vec<Value> {
    match instance.get_field(DATA_FIELD) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn store_data(instance: &InstanceRef, data: Vec<Value>) {
    instance.set_field(DATA_FIELD, Value::Array(data));
}

pub(super) fn stack(
    _: &mut Interpreter,
    instance: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let mut data = data_of(instance);
    match method {
        "constructor" => {
            store_data(instance, data);
            Ok(Value::Nil)
        }
        "push" => {
            data.push(arg("Stack", method, args, 0)?.clone());
            store_data(instance, data);
            Ok(Value::Nil)
        }
        "pop" => {
            let top = data.pop();
            store_data(instance, data);
            Ok(top.unwrap_or(Value::Nil))
        }
        "peek" => Ok(data.last().cloned().unwrap_or(Value::Nil)),
        "size" => Ok(Value::Int(data.len() as i64)),
        "isEmpty" => Ok(Value::Bool(data.is_empty())),
        other => Err(unknown_method("Stack", other)),
    }
}

pub(super) fn queue(
    _: &mut Interpreter,
    instance: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let mut data = data_of(instance);
    match method {
        "constructor" => {
            store_data(instance, data);
            Ok(Value::Nil)
        }
        "enqueue" => {
            data.push(arg("Queue", method, args, 0)?.clone());
            store_data(instance, data);
            Ok(Value::Nil)
        }
        "dequeue" => {
            if data.is_empty() {
                return Ok(Value::Nil);
            }
            let front = data.remove(0);
            store_data(instance, data);
            Ok(front)
        }
        "peek" => Ok(data.first().cloned().unwrap_or(Value::Nil)),
        "size" => Ok(Value::Int(data.len() as i64)),
        "isEmpty" => Ok(Value::Bool(data.is_empty())),
        other => Err(unknown_method("Queue", other)),
    }
}

//==================================================
// Section 2.0 - Math
//==================================================

pub(super) fn math(
    _: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match method {
        "constructor" => Ok(Value::Nil),
        "random" => {
            let (min, max) = match (
                number_arg("Math", method, args, 0)?,
                number_arg("Math", method, args, 1)?,
            ) {
                (Value::Int(min), Value::Int(max)) => (min, max),
                _ => {
                    return Err(RuntimeError::native_argument(
                        "Math",
                        method,
                        "bounds must be integers",
                    ))
                }
            };
            if min > max {
                return Err(RuntimeError::native_argument(
                    "Math",
                    method,
                    format!("min {} is greater than max {}", min, max),
                ));
            }
            Ok(Value::Int(rand::thread_rng().gen_range(min..=max)))
        }
        "floor" => round_with(method, args, f64::floor),
        "ceil" => round_with(method, args, f64::ceil),
        "round" => round_with(method, args, f64::round),
        "abs" => match number_arg("Math", method, args, 0)? {
            Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
            Value::Float(n) => Ok(Value::Float(n.abs())),
            _ => Ok(Value::Nil),
        },
        "max" | "min" => extreme(method, args),
        other => Err(unknown_method("Math", other)),
    }
}

/// Integers pass through unchanged; floats are rounded and stay floats.
fn round_with(method: &str, args: &[Value], op: fn(f64) -> f64) -> Result<Value, RuntimeError> {
    match number_arg("Math", method, args, 0)? {
        Value::Float(n) => Ok(Value::Float(op(n))),
        other => Ok(other),
    }
}

fn extreme(method: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    let candidates: Vec<Value> = match args {
        [Value::Array(items)] => items.clone(),
        _ => args.to_vec(),
    };
    if candidates.is_empty() {
        return Err(RuntimeError::native_argument(
            "Math",
            method,
            "expects at least one number",
        ));
    }

    let mut best: Option<Value> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let number = number_arg("Math", method, &candidates, index)?;
        let replace = match &best {
            None => true,
            Some(current) => {
                let (a, b) = (
                    number.to_number().unwrap_or(0.0),
                    current.to_number().unwrap_or(0.0),
                );
                if method == "max" { a > b } else { a < b }
            }
        };
        if replace {
            best = Some(candidate.clone());
        }
    }
    Ok(best.unwrap_or(Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_is_lifo_and_queue_is_fifo() {
        let mut interp = Interpreter::new();
        let s = InstanceRef::new("Stack");
        let q = InstanceRef::new("Queue");
        for n in 1..=3 {
            stack(&mut interp, &s, "push", &[Value::Int(n)]).expect("push");
            queue(&mut interp, &q, "enqueue", &[Value::Int(n)]).expect("enqueue");
        }
        let popped = stack(&mut interp, &s, "pop", &[]).expect("pop");
        let dequeued = queue(&mut interp, &q, "dequeue", &[]).expect("dequeue");
        assert_eq!(popped.as_int(), Some(3));
        assert_eq!(dequeued.as_int(), Some(1));
        let size = stack(&mut interp, &s, "size", &[]).expect("size");
        assert_eq!(size.as_int(), Some(2));
    }

    #[test]
    fn empty_pop_yields_nil() {
        let mut interp = Interpreter::new();
        let s = InstanceRef::new("Stack");
        assert!(stack(&mut interp, &s, "pop", &[]).expect("pop").is_nil());
        let empty = stack(&mut interp, &s, "isEmpty", &[]).expect("isEmpty");
        assert!(empty.is_truthy());
    }

    #[test]
    fn random_stays_within_inclusive_bounds() {
        let mut interp = Interpreter::new();
        let m = InstanceRef::new("Math");
        for _ in 0..50 {
            let n = math(&mut interp, &m, "random", &[Value::Int(1), Value::Int(3)])
                .expect("random")
                .as_int()
                .expect("int");
            assert!((1..=3).contains(&n));
        }
        assert!(math(&mut interp, &m, "random", &[Value::Int(5), Value::Int(1)]).is_err());
    }

    #[test]
    fn floor_keeps_integers_and_max_picks_largest() {
        let mut interp = Interpreter::new();
        let m = InstanceRef::new("Math");
        let floored = math(&mut interp, &m, "floor", &[Value::Int(4)]).expect("floor");
        assert!(matches!(floored, Value::Int(4)));
        let largest = math(
            &mut interp,
            &m,
            "max",
            &[Value::Int(2), Value::Float(7.5), Value::Int(3)],
        )
        .expect("max");
        assert!(matches!(largest, Value::Float(n) if n == 7.5));
    }
}
