//=============================================
// joss/interpreter/eval.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Expression evaluation
// Objective: Evaluate expression nodes, apply numeric and comparison rules and
//            write assignments back through variables, fields and indexes
//=============================================

//=============================================
//            Section 1: Imports
//=============================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::builtins;
use super::errors::{Exec, RuntimeError};
use super::value::{BoundMethod, InstanceRef, Stream, Value};
use super::Interpreter;
use crate::ast::{Expr, InfixOp, MemberAccess, PostfixOp, PrefixOp};

impl Interpreter {
    //=============================================
    //            Section 2: Expression Dispatch
    //=============================================

    pub(crate) fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Integer(n) => Ok(Value::Int(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Nil => Ok(Value::Nil),
            Expr::Identifier(name) => Ok(self.lookup_identifier(name)),
            Expr::This => Ok(self.scope.this().unwrap_or(Value::Nil)),
            Expr::Call {
                function,
                arguments,
            } => self.eval_call(function, arguments),
            Expr::New { class, arguments } => {
                let args = self.eval_arguments(arguments)?;
                self.instantiate(class, args)
            }
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object)?;
                self.read_member(object, property)
            }
            Expr::Index { target, index } => {
                let Some(index) = index else {
                    return Err(RuntimeError::InvalidOperation(
                        "cannot read from an empty index []".to_string(),
                    )
                    .into());
                };
                let container = self.eval(target)?;
                let index = self.eval(index)?;
                Ok(read_index(&container, &index)?)
            }
            Expr::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::Ternary {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval(condition)?;
                if condition.is_truthy() {
                    match consequence {
                        Some(block) => self.exec_block(block),
                        None => Ok(condition),
                    }
                } else {
                    self.exec_block(alternative)
                }
            }
            Expr::Infix {
                left,
                operator,
                right,
            } => self.eval_infix(left, *operator, right),
            Expr::Prefix { operator, operand } => {
                let operand = self.eval(operand)?;
                match (operator, operand) {
                    (PrefixOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
                    (PrefixOp::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                    (PrefixOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
                    (PrefixOp::Negate, other) => Err(RuntimeError::InvalidOperation(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))
                    .into()),
                }
            }
            Expr::Postfix { operand, operator } => {
                let current = self.eval(operand)?;
                let step = match operator {
                    PostfixOp::Increment => 1,
                    PostfixOp::Decrement => -1,
                };
                let updated = match &current {
                    Value::Int(n) => Value::Int(n.wrapping_add(step)),
                    Value::Float(n) => Value::Float(n + step as f64),
                    Value::Nil => Value::Int(step),
                    other => {
                        return Err(RuntimeError::InvalidOperation(format!(
                            "cannot apply {} to {}",
                            if step > 0 { "++" } else { "--" },
                            other.type_name()
                        ))
                        .into())
                    }
                };
                self.assign(operand, updated)?;
                Ok(current)
            }
            Expr::Array(elements) => Ok(Value::Array(self.eval_arguments(elements)?)),
            Expr::Map(pairs) => {
                let mut entries = BTreeMap::new();
                for (key, value) in pairs {
                    let key = self.eval(key)?.to_string();
                    let value = self.eval(value)?;
                    entries.insert(key, value);
                }
                Ok(Value::Map(entries))
            }
            Expr::Block(block) => self.exec_block(block),
            Expr::Function(decl) => Ok(Value::Function(decl.clone())),
            Expr::Isset(arguments) => {
                for argument in arguments {
                    if !self.isset(argument)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Empty(operand) => {
                let value = match operand.as_ref() {
                    Expr::Identifier(_) | Expr::This | Expr::Index { .. } | Expr::Member { .. } => {
                        self.existing_value(operand)?
                    }
                    other => Some(self.eval(other)?),
                };
                Ok(Value::Bool(value.is_none_or(|value| !value.is_truthy())))
            }
        }
    }

    pub(crate) fn eval_arguments(&mut self, arguments: &[Expr]) -> Exec<Vec<Value>> {
        arguments.iter().map(|argument| self.eval(argument)).collect()
    }

    //Function: lookup_identifier
    //Purpose: Resolve a bare name in expression position
    //Inputs: name: &str
    //Returns: Value (variable, function, class, stream, builtin, else nil)
    fn lookup_identifier(&self, name: &str) -> Value {
        if let Some(value) = self.scope.get(name) {
            return value;
        }
        if let Some(decl) = self.shared.functions.read().get(name) {
            return Value::Function(decl.clone());
        }
        if self.shared.classes.read().contains(name) {
            return Value::Class(name.to_string());
        }
        match name {
            "cout" => Value::Stream(Stream::Out),
            "cin" => Value::Stream(Stream::In),
            _ if builtins::is_builtin(name) => Value::Builtin(name.to_string()),
            _ => {
                debug!(name, "undefined identifier evaluates to nil");
                Value::Nil
            }
        }
    }

    //=============================================
    //            Section 3: Members & isset
    //=============================================

    fn read_member(&mut self, object: Value, property: &str) -> Exec<Value> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.get_field(property) {
                    return Ok(value);
                }
                let class = instance.class_name();
                match self.resolve_method(&class, property) {
                    Some(method) => Ok(Value::BoundMethod(Arc::new(BoundMethod {
                        method,
                        receiver: instance,
                    }))),
                    None => {
                        debug!(class = %class, property, "missing field reads as nil");
                        Ok(Value::Nil)
                    }
                }
            }
            Value::Class(class) => {
                let receiver = self.bare_instance(&class)?;
                match self.resolve_method(&class, property) {
                    Some(method) => Ok(Value::BoundMethod(Arc::new(BoundMethod {
                        method,
                        receiver,
                    }))),
                    None => Err(RuntimeError::UndefinedMethod {
                        class,
                        method: property.to_string(),
                    }
                    .into()),
                }
            }
            Value::Map(entries) => Ok(entries.get(property).cloned().unwrap_or(Value::Nil)),
            Value::Nil => {
                debug!(property, "member access on nil");
                Ok(Value::Nil)
            }
            other => Err(RuntimeError::InvalidOperation(format!(
                "cannot read member '{}' of {}",
                property,
                other.type_name()
            ))
            .into()),
        }
    }

    /// Presence test used by `isset`; member presence counts fields only.
    fn isset(&mut self, expr: &Expr) -> Exec<bool> {
        Ok(self.existing_value(expr)?.is_some())
    }

    //Function: existing_value
    //Purpose: Look up the value an lvalue names, if it exists
    //Inputs: expr: &Expr
    //Returns: Option<Value> (None for missing bindings, keys, fields and non-lvalues)
    fn existing_value(&mut self, expr: &Expr) -> Exec<Option<Value>> {
        match expr {
            Expr::Identifier(name) => Ok(self.scope.get(name)),
            Expr::This => Ok(self.scope.this()),
            Expr::Index {
                target,
                index: Some(index),
            } => {
                let Some(container) = self.existing_value(target)? else {
                    return Ok(None);
                };
                let index = self.eval(index)?;
                Ok(match (&container, &index) {
                    (Value::Array(items), Value::Int(i)) => usize::try_from(*i)
                        .ok()
                        .and_then(|i| items.get(i).cloned()),
                    (Value::Map(entries), key) => entries.get(&key.to_string()).cloned(),
                    (Value::Instance(instance), key) => instance.get_field(&key.to_string()),
                    (Value::Str(s), Value::Int(i)) => usize::try_from(*i)
                        .ok()
                        .and_then(|i| s.chars().nth(i))
                        .map(|c| Value::Str(c.to_string())),
                    _ => None,
                })
            }
            Expr::Member {
                object, property, ..
            } => {
                let Some(target) = self.existing_value(object)? else {
                    return Ok(None);
                };
                Ok(match target {
                    Value::Instance(instance) => instance.get_field(property),
                    Value::Map(entries) => entries.get(property).cloned(),
                    _ => None,
                })
            }
            _ => Ok(None),
        }
    }

    //=============================================
    //            Section 4: Infix Operators
    //=============================================

    fn eval_infix(&mut self, left: &Expr, operator: InfixOp, right: &Expr) -> Exec<Value> {
        match operator {
            InfixOp::And => {
                let left = self.eval(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }
            InfixOp::Or => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.is_truthy()))
            }
            InfixOp::NullCoalesce => {
                let left = self.eval(left)?;
                if left.is_nil() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            InfixOp::Pipe => {
                let input = self.eval(left)?;
                self.eval_pipe(input, right)
            }
            InfixOp::ShiftRight => {
                let left_value = self.eval(left)?;
                if let Value::Stream(Stream::In) = left_value {
                    self.read_console_into(right)?;
                    return Ok(left_value);
                }
                let right_value = self.eval(right)?;
                Ok(apply_binary(operator, &left_value, &right_value)?)
            }
            InfixOp::ShiftLeft => {
                let left_value = self.eval(left)?;
                let right_value = self.eval(right)?;
                match &left_value {
                    Value::Stream(Stream::Out) => {
                        self.shared
                            .output
                            .write_str(&right_value.to_string())
                            .map_err(RuntimeError::from)?;
                        Ok(left_value)
                    }
                    Value::Channel(channel) => {
                        channel.send(right_value)?;
                        Ok(left_value)
                    }
                    _ => Ok(apply_binary(operator, &left_value, &right_value)?),
                }
            }
            _ => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(apply_binary(operator, &left, &right)?)
            }
        }
    }

    /// `cin >> target`: read a line, coerce it to the target's declared tag
    /// and assign it.
    fn read_console_into(&mut self, target: &Expr) -> Exec<()> {
        let text = if self.non_interactive() {
            debug!("console input skipped in non-interactive mode");
            String::new()
        } else {
            self.shared
                .input
                .read_line()
                .map_err(RuntimeError::from)?
                .unwrap_or_default()
        };
        let value = match target {
            Expr::Identifier(name) => match self.scope.type_of(name) {
                Some(tag) => tag.coerce_input(&text),
                None => Value::Str(text),
            },
            _ => Value::Str(text),
        };
        self.assign(target, value)
    }

    //Function: eval_pipe
    //Purpose: Call the right-hand side of `|>` with `input` as first argument
    //Inputs: input: Value, right: &Expr
    //Returns: Exec<Value>
    fn eval_pipe(&mut self, input: Value, right: &Expr) -> Exec<Value> {
        match right {
            Expr::Identifier(name) => self.call_named(name, vec![input]),
            Expr::Call {
                function,
                arguments,
            } => {
                let mut args = Vec::with_capacity(arguments.len() + 1);
                args.push(input);
                args.extend(self.eval_arguments(arguments)?);
                match function.as_ref() {
                    Expr::Identifier(name) => self.call_named(name, args),
                    other => {
                        let callee = self.eval(other)?;
                        self.call_value(callee, args)
                    }
                }
            }
            other => {
                let callee = self.eval(other)?;
                self.call_value(callee, vec![input])
            }
        }
    }

    //=============================================
    //            Section 5: Assignment Targets
    //=============================================

    //Function: assign
    //Purpose: Store `value` into an assignable expression
    //Inputs: target: &Expr, value: Value
    //Returns: Exec<()> (collections are written back into their owner)
    pub(crate) fn assign(&mut self, target: &Expr, value: Value) -> Exec<()> {
        match target {
            Expr::Identifier(name) => Ok(self.assign_variable(name, value)?),
            Expr::Member {
                object,
                property,
                access,
            } => {
                let container = self.eval(object)?;
                match container {
                    Value::Instance(instance) => {
                        instance.set_field(property.as_str(), value);
                        Ok(())
                    }
                    Value::Map(mut entries) if *access != MemberAccess::Static => {
                        entries.insert(property.clone(), value);
                        self.assign(object, Value::Map(entries))
                    }
                    Value::Nil if *access != MemberAccess::Static => {
                        let mut entries = BTreeMap::new();
                        entries.insert(property.clone(), value);
                        self.assign(object, Value::Map(entries))
                    }
                    other => Err(RuntimeError::InvalidOperation(format!(
                        "cannot assign member '{}' on {}",
                        property,
                        other.type_name()
                    ))
                    .into()),
                }
            }
            Expr::Index { target, index } => {
                let key = match index {
                    Some(index) => Some(self.eval(index)?),
                    None => None,
                };
                if let Expr::Identifier(name) = target.as_ref() {
                    if !self.scope.contains(name) {
                        self.assign_variable(name, Value::Nil)?;
                    }
                    if let Some(slot) = self.scope.get_mut(name) {
                        return Ok(store_index(slot, key, value)?);
                    }
                }
                let mut container = self.eval(target)?;
                store_index(&mut container, key, value)?;
                if matches!(container, Value::Instance(_)) {
                    return Ok(());
                }
                self.assign(target, container)
            }
            _ => Err(RuntimeError::InvalidOperation("invalid assignment target".to_string()).into()),
        }
    }

    pub(crate) fn bare_instance(&mut self, class: &str) -> Exec<InstanceRef> {
        if !self.shared.classes.read().contains(class) {
            return Err(RuntimeError::UndefinedClass(class.to_string()).into());
        }
        let instance = InstanceRef::new(class);
        self.initialize_fields(&instance)?;
        Ok(instance)
    }
}

//=============================================/*
//  Arrays and maps are values: index writes go through get_mut on a variable
//  or are written back into the owning field or variable.
//============================================*/
//=============================================
//            Section 6: Value Operations
//=============================================

fn read_index(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (container, index) {
        (Value::Array(items), Value::Int(i)) => {
            let found = usize::try_from(*i).ok().and_then(|i| items.get(i)).cloned();
            if found.is_none() {
                debug!(index = *i, len = items.len(), "array index out of range");
            }
            Ok(found.unwrap_or(Value::Nil))
        }
        (Value::Map(entries), key) => {
            let key = key.to_string();
            let found = entries.get(&key).cloned();
            if found.is_none() {
                debug!(key = %key, "missing map key");
            }
            Ok(found.unwrap_or(Value::Nil))
        }
        (Value::Instance(instance), key) => {
            Ok(instance.get_field(&key.to_string()).unwrap_or(Value::Nil))
        }
        (Value::Str(s), Value::Int(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or(Value::Nil)),
        (Value::Nil, _) => Ok(Value::Nil),
        (container, index) => Err(RuntimeError::IndexError(format!(
            "cannot index {} with {}",
            container.type_name(),
            index.type_name()
        ))),
    }
}

/// Write `value` at `key` inside `container`; `None` appends.
fn store_index(container: &mut Value, key: Option<Value>, value: Value) -> Result<(), RuntimeError> {
    if container.is_nil() {
        *container = match key {
            None | Some(Value::Int(_)) => Value::Array(Vec::new()),
            Some(_) => Value::Map(BTreeMap::new()),
        };
    }

    match container {
        Value::Array(items) => match key {
            None => {
                items.push(value);
                Ok(())
            }
            Some(Value::Int(i)) => {
                let len = items.len();
                match usize::try_from(i) {
                    Ok(i) if i < len => {
                        items[i] = value;
                        Ok(())
                    }
                    Ok(i) if i == len => {
                        items.push(value);
                        Ok(())
                    }
                    _ => Err(RuntimeError::IndexError(format!(
                        "index {} out of range for array of length {}",
                        i, len
                    ))),
                }
            }
            Some(other) => Err(RuntimeError::IndexError(format!(
                "array index must be int, got {}",
                other.type_name()
            ))),
        },
        Value::Map(entries) => match key {
            Some(key) => {
                entries.insert(key.to_string(), value);
                Ok(())
            }
            None => Err(RuntimeError::InvalidOperation(
                "cannot append to a map without a key".to_string(),
            )),
        },
        Value::Instance(instance) => match key {
            Some(key) => {
                instance.set_field(key.to_string(), value);
                Ok(())
            }
            None => Err(RuntimeError::InvalidOperation(
                "cannot append to an object".to_string(),
            )),
        },
        other => Err(RuntimeError::InvalidOperation(format!(
            "cannot index-assign into {}",
            other.type_name()
        ))),
    }
}

//Function: apply_binary
//Purpose: Arithmetic, comparison and concatenation for evaluated operands
//Inputs: operator, left, right
//Returns: Result<Value, RuntimeError>
pub(crate) fn apply_binary(
    operator: InfixOp,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    match operator {
        InfixOp::Equal => return Ok(Value::Bool(left.loose_eq(right))),
        InfixOp::NotEqual => return Ok(Value::Bool(!left.loose_eq(right))),
        InfixOp::Less | InfixOp::Greater | InfixOp::LessEqual | InfixOp::GreaterEqual => {
            let ordering = compare(left, right).ok_or_else(|| {
                RuntimeError::InvalidOperation(format!(
                    "cannot compare {} {} {}",
                    left.type_name(),
                    operator,
                    right.type_name()
                ))
            })?;
            let result = match operator {
                InfixOp::Less => ordering == Ordering::Less,
                InfixOp::Greater => ordering == Ordering::Greater,
                InfixOp::LessEqual => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    if operator == InfixOp::Add && !(left.is_numeric() && right.is_numeric()) {
        return Ok(Value::Str(format!("{}{}", left, right)));
    }

    let mismatch = || {
        RuntimeError::InvalidOperation(format!(
            "unsupported operands for {}: {} and {}",
            operator,
            left.type_name(),
            right.type_name()
        ))
    };

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => match operator {
            InfixOp::Add => Ok(Value::Int(a.wrapping_add(*b))),
            InfixOp::Subtract => Ok(Value::Int(a.wrapping_sub(*b))),
            InfixOp::Multiply => Ok(Value::Int(a.wrapping_mul(*b))),
            InfixOp::Divide => divide(*a as f64, *b as f64),
            InfixOp::Modulo => modulo(*a, *b),
            InfixOp::ShiftLeft => Ok(Value::Int(a.wrapping_shl(*b as u32))),
            InfixOp::ShiftRight => Ok(Value::Int(a.wrapping_shr(*b as u32))),
            _ => Err(mismatch()),
        },
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let (x, y) = (a.to_number().unwrap_or(0.0), b.to_number().unwrap_or(0.0));
            match operator {
                InfixOp::Add => Ok(Value::Float(x + y)),
                InfixOp::Subtract => Ok(Value::Float(x - y)),
                InfixOp::Multiply => Ok(Value::Float(x * y)),
                InfixOp::Divide => divide(x, y),
                InfixOp::Modulo => modulo(x as i64, y as i64),
                _ => Err(mismatch()),
            }
        }
        _ => Err(mismatch()),
    }
}

fn divide(x: f64, y: f64) -> Result<Value, RuntimeError> {
    if y == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::Float(x / y))
}

fn modulo(x: i64, y: i64) -> Result<Value, RuntimeError> {
    if y == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::Int(x.wrapping_rem(y)))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            a.to_number()?.partial_cmp(&b.to_number()?)
        }
        _ => None,
    }
}
