//=============================================
// joss/interpreter/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tree-walking evaluator for Joss programs
// Objective: Own the shared runtime state, register declarations, execute
//            statements and expose the host embedding surface
//=============================================

//=============================================
//            Section 1: Imports
//=============================================

mod builtins;
mod call;
pub mod classes;
pub mod concurrency;
pub mod errors;
mod eval;
pub mod io;
mod json;
pub mod scope;
pub mod value;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::ast::{ClassDecl, Expr, FunctionDecl, Program, Stmt};
use crate::config::{self, ConfigError, RuntimeOptions};
use crate::dispatch::RouteTable;
use crate::native::{self, NativeHandler, NativeRegistry};
use crate::parser::parse_source;

use self::classes::ClassTable;
use self::concurrency::on_script_stack;
use self::errors::{Exec, RuntimeError, ScriptError, Signal};
use self::io::{InputSource, OutputSink};
use self::scope::Scope;
use self::value::{TypeTag, Value};

pub use self::json::{json_to_value, value_to_json};

//=============================================
//            Section 2: Shared Runtime State
//=============================================

/// State visible to every task forked from one interpreter.
pub(crate) struct Shared {
    pub(crate) classes: RwLock<ClassTable>,
    pub(crate) functions: RwLock<HashMap<String, Arc<FunctionDecl>>>,
    pub(crate) natives: RwLock<NativeRegistry>,
    pub(crate) routes: RwLock<RouteTable>,
    pub(crate) env: RwLock<HashMap<String, String>>,
    imported: RwLock<HashSet<PathBuf>>,
    pub(crate) output: OutputSink,
    pub(crate) input: InputSource,
    pub(crate) options: RuntimeOptions,
}

pub struct Interpreter {
    pub(crate) shared: Arc<Shared>,
    pub(crate) scope: Scope,
    pub(crate) call_depth: usize,
    script_dir: Option<PathBuf>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        Self::with_io(options, OutputSink::stdout(), InputSource::stdin())
    }

    //Function: with_io
    //Purpose: Build an interpreter with explicit console streams
    //Inputs: options, output sink, input source
    //Returns: Interpreter with native classes and built-in handlers installed
    pub fn with_io(options: RuntimeOptions, output: OutputSink, input: InputSource) -> Self {
        let mut classes = ClassTable::new();
        for name in native::NATIVE_CLASSES {
            classes.register_native(name);
        }

        let script_dir = options.base_dir.clone();
        let shared = Shared {
            classes: RwLock::new(classes),
            functions: RwLock::new(HashMap::new()),
            natives: RwLock::new(NativeRegistry::with_builtin_handlers()),
            routes: RwLock::new(RouteTable::new()),
            env: RwLock::new(HashMap::new()),
            imported: RwLock::new(HashSet::new()),
            output,
            input,
            options,
        };

        Self {
            shared: Arc::new(shared),
            scope: Scope::new(),
            call_depth: 0,
            script_dir,
        }
    }

    /// Copy of this interpreter for a spawned task: shared registries, own
    /// frame stack seeded with the currently visible bindings.
    pub(crate) fn fork(&self) -> Self {
        let (vars, types) = self.scope.visible();
        Self {
            shared: Arc::clone(&self.shared),
            scope: Scope::with_globals(vars, types, self.scope.this()),
            call_depth: 0,
            script_dir: self.script_dir.clone(),
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.shared.options
    }

    pub fn output(&self) -> &OutputSink {
        &self.shared.output
    }

    pub fn script_dir(&self) -> Option<&Path> {
        self.script_dir.as_deref()
    }

    pub fn set_script_dir(&mut self, dir: impl Into<PathBuf>) {
        self.script_dir = Some(dir.into());
    }

    //=============================================
    //            Section 3: Host Embedding Surface
    //=============================================

    /// Install a handler for a native class, registering the class name if
    /// it is not one of the built-in ones.
    pub fn register_native(&self, class: &str, handler: impl NativeHandler + 'static) {
        self.shared.classes.write().register_native(class);
        self.shared.natives.write().register(class, handler);
        debug!(class, "registered native handler");
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.shared.env.write().insert(key.into(), value.into());
    }

    pub fn env_var(&self, key: &str) -> Option<String> {
        self.shared.env.read().get(key).cloned()
    }

    /// Merge an `env.joss` style file into the script environment.
    pub fn load_env_file(&self, path: &Path) -> Result<usize, ConfigError> {
        let entries = config::load_env_file(path)?;
        let count = entries.len();
        self.shared.env.write().extend(entries);
        debug!(path = %path.display(), count, "loaded environment file");
        Ok(count)
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.scope.get_global(name)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.scope.set_global(name, value);
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.shared.classes.read().contains(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.shared.functions.read().contains_key(name)
    }

    pub fn route_count(&self) -> usize {
        self.shared.routes.read().len()
    }

    /// Call any callable value from host or native code.
    pub fn invoke(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self.call_value(callee, args) {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(signal) => Err(signal.into_runtime_error()),
        }
    }

    /// True when console reads must not block.
    pub(crate) fn non_interactive(&self) -> bool {
        self.shared.options.non_interactive
            || self
                .env_var("NON_INTERACTIVE")
                .is_some_and(|value| config::is_truthy_flag(&value))
    }

    pub(crate) fn system_run_allowed(&self) -> bool {
        self.shared.options.allow_system_run
            || self
                .env_var("ALLOW_SYSTEM_RUN")
                .is_some_and(|value| config::is_truthy_flag(&value))
    }

    //=============================================
    //            Section 4: Program Execution
    //=============================================

    //Function: execute
    //Purpose: Register declarations, run top-level statements, then `Main::main`,
    //         all on a script thread with a fixed stack size
    //Inputs: program: &Program
    //Returns: Result<Value, RuntimeError> (value of the last statement executed)
    pub fn execute(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        on_script_stack(|| self.execute_on_current_thread(program))?
    }

    fn execute_on_current_thread(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        self.register_declarations(&program.statements)?;
        let (last, stopped) = self.run_top_level(&program.statements)?;
        if stopped {
            return Ok(last);
        }
        match self.run_main()? {
            Some(value) => Ok(value),
            None => Ok(last),
        }
    }

    /// Parse and execute source text, mapping failures to coded script errors.
    pub fn run_source(&mut self, source: &str) -> Result<Value, ScriptError> {
        let program = parse_source(source)?;
        Ok(self.execute(&program)?)
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Value, ScriptError> {
        let source = fs::read_to_string(path).map_err(|error| {
            ScriptError::from(RuntimeError::Import {
                path: path.display().to_string(),
                message: error.to_string(),
            })
        })?;
        if let Some(dir) = path.parent() {
            self.script_dir = Some(dir.to_path_buf());
        }
        info!(script = %path.display(), "running script");
        self.run_source(&source)
    }

    fn register_declarations(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            match stmt {
                Stmt::Class(decl) => self.register_class(decl)?,
                Stmt::Function(decl) => self.register_function(decl),
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn register_class(&self, decl: &Arc<ClassDecl>) -> Result<(), RuntimeError> {
        self.shared.classes.write().register(Arc::clone(decl))?;
        debug!(
            class = %decl.name,
            parent = decl.parent.as_deref().unwrap_or("-"),
            methods = decl.methods.len(),
            "registered class"
        );
        Ok(())
    }

    fn register_function(&self, decl: &Arc<FunctionDecl>) {
        self.shared
            .functions
            .write()
            .insert(decl.name.clone(), Arc::clone(decl));
        debug!(function = %decl.name, params = decl.params.len(), "registered function");
    }

    /// Run top-level statements. The flag reports a top-level `return`.
    fn run_top_level(&mut self, statements: &[Stmt]) -> Result<(Value, bool), RuntimeError> {
        let mut last = Value::Nil;
        for stmt in statements {
            if matches!(stmt, Stmt::Class(_) | Stmt::Function(_)) {
                continue;
            }
            match self.exec_stmt(stmt) {
                Ok(value) => last = value,
                Err(Signal::Return(value)) => return Ok((value, true)),
                Err(Signal::Break) | Err(Signal::Continue) => {
                    debug!("ignoring loop control outside of a loop");
                }
                Err(signal) => return Err(signal.into_runtime_error()),
            }
        }
        Ok((last, false))
    }

    fn run_main(&mut self) -> Result<Option<Value>, RuntimeError> {
        let entry = self
            .shared
            .classes
            .read()
            .find_method("Main", "main")
            .filter(|method| method.is_init);
        let Some(entry) = entry else {
            return Ok(None);
        };

        debug!("invoking Main::main");
        let outcome = self.instantiate("Main", Vec::new()).and_then(|main| match main {
            Value::Instance(receiver) => self.call_method(&entry, &receiver, Vec::new()),
            other => Ok(other),
        });
        match outcome {
            Ok(value) | Err(Signal::Return(value)) => Ok(Some(value)),
            Err(signal) => Err(signal.into_runtime_error()),
        }
    }

    //=============================================
    //            Section 5: Statements
    //=============================================

    pub(crate) fn exec_block(&mut self, block: &[Stmt]) -> Exec<Value> {
        let mut last = Value::Nil;
        for stmt in block {
            last = self.exec_stmt(stmt)?;
        }
        Ok(last)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<Value> {
        match stmt {
            Stmt::Let {
                type_name,
                name,
                value,
            } => {
                let tag = TypeTag::parse(type_name);
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => tag.zero_value(),
                };
                self.check_type(name, &tag, &value)?;
                self.scope.declare(name, value.clone(), Some(tag));
                Ok(value)
            }
            Stmt::Class(decl) => {
                self.register_class(decl)?;
                Ok(Value::Nil)
            }
            Stmt::Function(decl) => {
                self.register_function(decl);
                Ok(Value::Nil)
            }
            Stmt::Foreach {
                iterable,
                key,
                value,
                body,
            } => self.exec_foreach(iterable, key.as_deref(), value, body),
            Stmt::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    match self.exec_block(body) {
                        Ok(_) | Err(Signal::Continue) => {}
                        Err(Signal::Break) => break,
                        Err(signal) => return Err(signal),
                    }
                }
                Ok(Value::Nil)
            }
            Stmt::DoWhile { body, condition } => {
                loop {
                    match self.exec_block(body) {
                        Ok(_) | Err(Signal::Continue) => {}
                        Err(Signal::Break) => break,
                        Err(signal) => return Err(signal),
                    }
                    if !self.eval(condition)?.is_truthy() {
                        break;
                    }
                }
                Ok(Value::Nil)
            }
            Stmt::TryCatch {
                body,
                catch_var,
                handler,
            } => match self.exec_block(body) {
                Ok(value) => Ok(value),
                Err(signal) if signal.is_control_transfer() => Err(signal),
                Err(Signal::Throw(thrown)) => {
                    self.scope.declare(catch_var, thrown, None);
                    self.exec_block(handler)
                }
                Err(Signal::Error(error)) => {
                    debug!(%error, "caught runtime error");
                    self.scope.declare(catch_var, Value::Str(error.to_string()), None);
                    self.exec_block(handler)
                }
                Err(signal) => Err(signal),
            },
            Stmt::If {
                condition,
                consequence,
                alternative,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.exec_block(consequence)
                } else if let Some(alternative) = alternative {
                    self.exec_block(alternative)
                } else {
                    Ok(Value::Nil)
                }
            }
            Stmt::Switch {
                subject,
                cases,
                default,
            } => {
                let subject = self.eval(subject)?;
                let mut selected = None;
                for case in cases {
                    if self.eval(&case.value)?.loose_eq(&subject) {
                        selected = Some(&case.body);
                        break;
                    }
                }
                let Some(body) = selected.or(default.as_ref()) else {
                    return Ok(Value::Nil);
                };
                match self.exec_block(body) {
                    Err(Signal::Break) => Ok(Value::Nil),
                    other => other,
                }
            }
            Stmt::Throw(expr) => {
                let value = self.eval(expr)?;
                Err(Signal::Throw(value))
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Break => Err(Signal::Break),
            Stmt::Continue => Err(Signal::Continue),
            Stmt::Import(path) => {
                self.import(path)?;
                Ok(Value::Nil)
            }
            Stmt::Namespace(name) => {
                debug!(namespace = %name, "namespace declaration");
                Ok(Value::Nil)
            }
            Stmt::Echo(expr) => {
                let value = self.eval(expr)?;
                self.shared.output.write_line(&value.to_string()).map_err(RuntimeError::from)?;
                Ok(Value::Nil)
            }
            Stmt::Expression(expr) => self.eval(expr),
        }
    }

    fn exec_foreach(
        &mut self,
        iterable: &Expr,
        key: Option<&str>,
        value: &str,
        body: &[Stmt],
    ) -> Exec<Value> {
        let source = self.eval(iterable)?;

        if let Value::Channel(channel) = &source {
            let mut index = 0i64;
            while let Some(item) = channel.recv() {
                if !self.foreach_step(key, Value::Int(index), value, item, body)? {
                    break;
                }
                index += 1;
            }
            return Ok(Value::Nil);
        }

        let entries: Vec<(Value, Value)> = match source {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::Int(index as i64), item))
                .collect(),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| (Value::Str(key), item))
                .collect(),
            Value::Instance(instance) => instance
                .fields()
                .into_iter()
                .map(|(key, item)| (Value::Str(key), item))
                .collect(),
            Value::Nil => Vec::new(),
            other => {
                return Err(RuntimeError::InvalidOperation(format!(
                    "cannot iterate over {}",
                    other.type_name()
                ))
                .into())
            }
        };

        for (entry_key, item) in entries {
            if !self.foreach_step(key, entry_key, value, item, body)? {
                break;
            }
        }
        Ok(Value::Nil)
    }

    /// Bind one iteration and run the body; `false` means the loop broke.
    fn foreach_step(
        &mut self,
        key: Option<&str>,
        entry_key: Value,
        value: &str,
        item: Value,
        body: &[Stmt],
    ) -> Exec<bool> {
        if let Some(key) = key {
            self.assign_variable(key, entry_key)?;
        }
        self.assign_variable(value, item)?;
        match self.exec_block(body) {
            Ok(_) | Err(Signal::Continue) => Ok(true),
            Err(Signal::Break) => Ok(false),
            Err(signal) => Err(signal),
        }
    }

    //=============================================
    //            Section 6: Variables & Type Tags
    //=============================================

    /// Assign through the scope rules, enforcing any declared tag.
    pub(crate) fn assign_variable(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if let Some(tag) = self.scope.type_of(name).cloned() {
            self.check_type(name, &tag, &value)?;
        }
        self.scope.set(name, value);
        Ok(())
    }

    pub(crate) fn check_type(
        &self,
        name: &str,
        tag: &TypeTag,
        value: &Value,
    ) -> Result<(), RuntimeError> {
        let accepted = match tag.accepts_kind(value) {
            Some(accepted) => accepted,
            None => match (tag, value) {
                (TypeTag::Class(expected), Value::Instance(instance)) => self
                    .shared
                    .classes
                    .read()
                    .is_a(&instance.class_name(), expected),
                _ => false,
            },
        };
        if accepted {
            return Ok(());
        }
        let found = match value {
            Value::Instance(instance) => instance.class_name(),
            other => other.type_name().to_string(),
        };
        Err(RuntimeError::TypeMismatch {
            name: name.to_string(),
            expected: tag.to_string(),
            found,
        })
    }

    //=============================================
    //            Section 7: Imports
    //=============================================

    //Function: import
    //Purpose: Load another script into this interpreter
    //Inputs: path: &str ("global" maps to config/global.joss)
    //Returns: Result<(), RuntimeError>
    fn import(&mut self, path: &str) -> Result<(), RuntimeError> {
        let resolved = self.resolve_import(path).ok_or_else(|| RuntimeError::Import {
            path: path.to_string(),
            message: "file not found".to_string(),
        })?;
        let canonical = fs::canonicalize(&resolved).unwrap_or_else(|_| resolved.clone());
        if !self.shared.imported.write().insert(canonical.clone()) {
            debug!(path = %canonical.display(), "skipping already imported script");
            return Ok(());
        }

        let source = fs::read_to_string(&canonical).map_err(|error| RuntimeError::Import {
            path: path.to_string(),
            message: error.to_string(),
        })?;
        let program = parse_source(&source).map_err(|errors| RuntimeError::Import {
            path: path.to_string(),
            message: errors.to_string(),
        })?;
        info!(path = %canonical.display(), statements = program.statements.len(), "importing script");

        let previous_dir = self.script_dir.clone();
        self.script_dir = canonical.parent().map(Path::to_path_buf);
        let result = self
            .register_declarations(&program.statements)
            .and_then(|()| self.run_top_level(&program.statements).map(|_| ()));
        self.script_dir = previous_dir;
        result
    }

    fn resolve_import(&self, path: &str) -> Option<PathBuf> {
        if path == "global" {
            return self.find_global_config();
        }

        let mut names = vec![PathBuf::from(path)];
        if Path::new(path).extension().is_none() {
            names.push(PathBuf::from(format!("{}.joss", path)));
        }

        let mut bases = Vec::new();
        if let Some(dir) = &self.script_dir {
            bases.push(dir.clone());
        }
        if let Ok(cwd) = std::env::current_dir() {
            bases.push(cwd);
        }

        for base in &bases {
            for name in &names {
                let candidate = base.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        warn!(path, "import target not found");
        None
    }

    /// Search upward from the script directory for `config/global.joss`.
    fn find_global_config(&self) -> Option<PathBuf> {
        let start = self
            .script_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())?;
        start
            .ancestors()
            .map(|dir| dir.join("config").join("global.joss"))
            .find(|candidate| candidate.is_file())
    }
}

//=============================================/*
//  Declarations are hoisted per file; statements then run in order, and the
//  Main entry point runs last unless top-level code returned early.
//============================================*/
