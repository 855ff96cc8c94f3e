//=============================================
// joss/interpreter/call.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Calls, methods and object construction
// Objective: Resolve call targets, bind parameters into fresh frames, route
//            bodiless methods through the native bridge and spawn async tasks
//=============================================

//=============================================
//            Section 1: Imports
//=============================================

use std::sync::Arc;

use tracing::{debug, trace};

use super::builtins;
use super::concurrency::spawn_task;
use super::errors::{Exec, RuntimeError, Signal};
use super::value::{InstanceRef, TypeTag, Value};
use super::Interpreter;
use crate::ast::{Expr, FunctionDecl};

impl Interpreter {
    //=============================================
    //            Section 2: Call Resolution
    //=============================================

    pub(crate) fn eval_call(&mut self, function: &Expr, arguments: &[Expr]) -> Exec<Value> {
        match function {
            Expr::Identifier(name) if name == "async" && !self.scope.contains(name) => {
                self.spawn_async(arguments)
            }
            Expr::Identifier(name) => {
                let args = self.eval_arguments(arguments)?;
                self.call_named(name, args)
            }
            Expr::Member {
                object, property, ..
            } => {
                let receiver = self.eval(object)?;
                let args = self.eval_arguments(arguments)?;
                self.call_member(receiver, property, args)
            }
            other => {
                let callee = self.eval(other)?;
                let args = self.eval_arguments(arguments)?;
                self.call_value(callee, args)
            }
        }
    }

    //Function: call_named
    //Purpose: Call by name: user function, then builtin, then callable variable
    //Inputs: name: &str, args: Vec<Value>
    //Returns: Exec<Value>
    pub(crate) fn call_named(&mut self, name: &str, args: Vec<Value>) -> Exec<Value> {
        let function = self.shared.functions.read().get(name).cloned();
        if let Some(decl) = function {
            return self.invoke_function(&decl, args, None);
        }
        if builtins::is_builtin(name) {
            return self.call_builtin(name, args);
        }
        match self.scope.get(name) {
            Some(value) if value.is_callable() => self.call_value(value, args),
            Some(value) => Err(RuntimeError::NotCallable(value.type_name().to_string()).into()),
            None => Err(RuntimeError::UndefinedFunction(name.to_string()).into()),
        }
    }

    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Exec<Value> {
        match callee {
            Value::Function(decl) => {
                let this = self.scope.this();
                self.invoke_function(&decl, args, this)
            }
            Value::BoundMethod(bound) => self.call_method(&bound.method, &bound.receiver, args),
            Value::Builtin(name) => self.call_builtin(&name, args),
            other => Err(RuntimeError::NotCallable(other.type_name().to_string()).into()),
        }
    }

    fn call_member(&mut self, receiver: Value, property: &str, args: Vec<Value>) -> Exec<Value> {
        match receiver {
            Value::Instance(instance) => {
                if let Some(field) = instance.get_field(property) {
                    if field.is_callable() {
                        return self.call_value(field, args);
                    }
                }
                let class = instance.class_name();
                let method = self.resolve_method(&class, property).ok_or_else(|| {
                    RuntimeError::UndefinedMethod {
                        class: class.clone(),
                        method: property.to_string(),
                    }
                })?;
                self.call_method(&method, &instance, args)
            }
            Value::Class(class) => {
                let method = self.resolve_method(&class, property).ok_or_else(|| {
                    RuntimeError::UndefinedMethod {
                        class: class.clone(),
                        method: property.to_string(),
                    }
                })?;
                let receiver = self.bare_instance(&class)?;
                self.call_method(&method, &receiver, args)
            }
            Value::Map(entries) => match entries.get(property) {
                Some(value) if value.is_callable() => self.call_value(value.clone(), args),
                _ => Err(RuntimeError::UndefinedMethod {
                    class: "map".to_string(),
                    method: property.to_string(),
                }
                .into()),
            },
            Value::Nil => Err(RuntimeError::InvalidOperation(format!(
                "call to method '{}' on nil",
                property
            ))
            .into()),
            other => Err(RuntimeError::UndefinedMethod {
                class: other.type_name().to_string(),
                method: property.to_string(),
            }
            .into()),
        }
    }

    //=============================================
    //            Section 3: Methods & Native Bridge
    //=============================================

    /// User method up the class chain; failing that, a bodiless stub when
    /// the class descends from a native class.
    pub(crate) fn resolve_method(&self, class: &str, method: &str) -> Option<Arc<FunctionDecl>> {
        let classes = self.shared.classes.read();
        if let Some(found) = classes.find_method(class, method) {
            return Some(found);
        }
        classes
            .native_ancestor(class)
            .map(|_| Arc::new(FunctionDecl::native(method)))
    }

    //Function: call_method
    //Purpose: Run a resolved method against its receiver
    //Inputs: method, receiver, args
    //Returns: Exec<Value> (native stubs go through the registered handler)
    pub(crate) fn call_method(
        &mut self,
        method: &Arc<FunctionDecl>,
        receiver: &InstanceRef,
        args: Vec<Value>,
    ) -> Exec<Value> {
        if !method.is_native() {
            return self.invoke_function(method, args, Some(Value::Instance(receiver.clone())));
        }

        let class = receiver.class_name();
        let native_class = self
            .shared
            .classes
            .read()
            .native_ancestor(&class)
            .ok_or_else(|| RuntimeError::UndefinedMethod {
                class: class.clone(),
                method: method.name.clone(),
            })?;
        let handler = self
            .shared
            .natives
            .read()
            .get(&native_class)
            .ok_or_else(|| RuntimeError::MissingService(native_class.clone()))?;

        trace!(class = %native_class, method = %method.name, "native dispatch");
        Ok(handler.call(self, receiver, &method.name, &args)?)
    }

    //Function: invoke_function
    //Purpose: Execute a declared body in a new frame
    //Inputs: decl, args, this receiver
    //Returns: Exec<Value> (explicit return value, else the last statement's value)
    pub(crate) fn invoke_function(
        &mut self,
        decl: &Arc<FunctionDecl>,
        args: Vec<Value>,
        this: Option<Value>,
    ) -> Exec<Value> {
        let Some(body) = &decl.body else {
            return Err(RuntimeError::InvalidOperation(format!(
                "'{}' has no body to execute",
                decl.name
            ))
            .into());
        };
        let limit = self.shared.options.max_call_depth;
        if self.call_depth >= limit {
            return Err(RuntimeError::StackOverflow(limit).into());
        }

        self.scope.push_frame(this);
        self.call_depth += 1;
        let outcome = self
            .bind_parameters(decl, args)
            .and_then(|()| self.exec_block(body));
        self.call_depth -= 1;
        self.scope.pop_frame();

        match outcome {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(signal @ (Signal::Break | Signal::Continue)) => {
                Err(signal.into_runtime_error().into())
            }
            Err(signal) => Err(signal),
        }
    }

    fn bind_parameters(&mut self, decl: &FunctionDecl, args: Vec<Value>) -> Exec<()> {
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = args.next();
            let tag = param.type_name.as_deref().map(TypeTag::parse);
            match (value, tag) {
                (Some(value), Some(tag)) => {
                    self.check_type(&param.name, &tag, &value)?;
                    self.scope.declare(&param.name, value, Some(tag));
                }
                (Some(value), None) => self.scope.declare(&param.name, value, None),
                (None, tag) => self.scope.declare(&param.name, Value::Nil, tag),
            }
        }
        Ok(())
    }

    //=============================================
    //            Section 4: Object Construction
    //=============================================

    //Function: instantiate
    //Purpose: Evaluate `new Class(args)`
    //Inputs: class: &str, args: Vec<Value>
    //Returns: Exec<Value> (the new instance)
    pub(crate) fn instantiate(&mut self, class: &str, args: Vec<Value>) -> Exec<Value> {
        let instance = self.bare_instance(class)?;

        let constructor = self.shared.classes.read().find_method(class, "constructor");
        if let Some(constructor) = constructor {
            self.call_method(&constructor, &instance, args)?;
            return Ok(Value::Instance(instance));
        }

        let native = self.shared.classes.read().native_ancestor(class);
        if let Some(native_class) = native {
            let handler = self.shared.natives.read().get(&native_class);
            match handler {
                Some(handler) => {
                    handler.call(self, &instance, "constructor", &args)?;
                }
                None => debug!(class = %native_class, "native class has no handler; skipping constructor"),
            }
        }
        Ok(Value::Instance(instance))
    }

    /// Run property initializers parent-first so subclasses override.
    pub(crate) fn initialize_fields(&mut self, instance: &InstanceRef) -> Exec<()> {
        let class = instance.class_name();
        let chain: Vec<_> = self
            .shared
            .classes
            .read()
            .chain(&class)
            .into_iter()
            .map(|entry| Arc::clone(&entry.decl))
            .collect();

        for decl in chain.iter().rev() {
            for property in &decl.properties {
                let value = match (&property.default, &property.type_name) {
                    (Some(expr), _) => self.eval(expr)?,
                    (None, Some(type_name)) => TypeTag::parse(type_name).zero_value(),
                    (None, None) => Value::Nil,
                };
                instance.set_field(property.name.as_str(), value);
            }
        }
        Ok(())
    }

    //=============================================
    //            Section 5: Async Tasks
    //=============================================

    //Function: spawn_async
    //Purpose: Evaluate the argument of `async(...)` on a forked interpreter
    //Inputs: arguments: &[Expr] (exactly one)
    //Returns: Exec<Value> (a Future, before the task has run)
    fn spawn_async(&mut self, arguments: &[Expr]) -> Exec<Value> {
        let [expr] = arguments else {
            return Err(RuntimeError::InvalidOperation(format!(
                "async expects 1 argument, got {}",
                arguments.len()
            ))
            .into());
        };
        let expr = expr.clone();
        let mut worker = self.fork();
        debug!("spawning async task");
        let future = spawn_task(move || {
            let value = worker.eval(&expr)?;
            if value.is_callable() {
                worker.call_value(value, Vec::new())
            } else {
                Ok(value)
            }
        })?;
        Ok(Value::Future(future))
    }
}

//=============================================/*
//  A call frame owns its parameters, locals and `this`; writes to existing
//  globals are visible to the caller.
//============================================*/
