//==================================================
// File: native/system.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: System and Log native classes
// Objective: Environment lookup, gated process execution and script logging
//            routed through tracing
//==================================================

use std::process::Command;

use tracing::{debug, error, info, warn};

use super::{arg, string_arg, unknown_method};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{InstanceRef, Value};
use crate::interpreter::Interpreter;

//==================================================
// Section 1.0 - System
//==================================================

pub(super) fn system(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match method {
        "constructor" => Ok(Value::Nil),
        "env" => {
            let key = string_arg("System", method, args, 0)?;
            match interp.env_var(&key) {
                Some(value) => Ok(Value::Str(value)),
                None => Ok(args.get(1).cloned().unwrap_or_else(|| Value::Str(String::new()))),
            }
        }
        "log" => {
            let message = arg("System", method, args, 0)?.to_string();
            info!(target: "joss::script", "{}", message);
            interp.output().write_line(&format!("[System Log] {}", message))?;
            Ok(Value::Nil)
        }
        "Run" => run_command(interp, args),
        other => Err(unknown_method("System", other)),
    }
}

//Function: run_command
//Purpose: Execute `System::Run(cmd, [args])` when ALLOW_SYSTEM_RUN is set
//Inputs: interp, args (command name, optional argument array)
//Returns: combined stdout/stderr text, or "" when blocked or failed
fn run_command(interp: &Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    let program = string_arg("System", "Run", args, 0)?;
    if !interp.system_run_allowed() {
        warn!(command = %program, "System::Run blocked; set ALLOW_SYSTEM_RUN=true to enable");
        return Ok(Value::Str(String::new()));
    }

    let command_args: Vec<String> = match args.get(1) {
        Some(Value::Array(items)) => items.iter().map(Value::to_string).collect(),
        Some(Value::Nil) | None => Vec::new(),
        Some(other) => {
            return Err(RuntimeError::native_argument(
                "System",
                "Run",
                format!("arguments must be an array, got {}", other.type_name()),
            ))
        }
    };

    debug!(command = %program, args = ?command_args, "running system command");
    match Command::new(&program).args(&command_args).output() {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            if !output.status.success() {
                warn!(command = %program, status = ?output.status.code(), "system command failed");
            }
            Ok(Value::Str(combined))
        }
        Err(err) => {
            warn!(command = %program, %err, "system command could not start");
            Ok(Value::Str(String::new()))
        }
    }
}

//==================================================
// Section 2.0 - Log
//==================================================

pub(super) fn log(
    _: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    if method == "constructor" {
        return Ok(Value::Nil);
    }
    let message = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    match method {
        "info" => info!(target: "joss::script", "{}", message),
        "warning" | "warn" => warn!(target: "joss::script", "{}", message),
        "error" => error!(target: "joss::script", "{}", message),
        "debug" => debug!(target: "joss::script", "{}", message),
        other => return Err(unknown_method("Log", other)),
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::interpreter::io::{InputSource, OutputSink};

    #[test]
    fn env_falls_back_to_default_then_empty() {
        let mut interp = Interpreter::new();
        interp.set_env("APP_NAME", "demo");
        let receiver = InstanceRef::new("System");
        let found = system(&mut interp, &receiver, "env", &[Value::from("APP_NAME")]).expect("env");
        assert_eq!(found.as_str(), Some("demo"));
        let fallback = system(
            &mut interp,
            &receiver,
            "env",
            &[Value::from("MISSING"), Value::from("x")],
        )
        .expect("env");
        assert_eq!(fallback.as_str(), Some("x"));
        let empty = system(&mut interp, &receiver, "env", &[Value::from("MISSING")]).expect("env");
        assert_eq!(empty.as_str(), Some(""));
    }

    #[test]
    fn run_is_blocked_without_permission() {
        let (output, _captured) = OutputSink::buffer();
        let mut interp = Interpreter::with_io(
            RuntimeOptions::default(),
            output,
            InputSource::from_text(""),
        );
        let receiver = InstanceRef::new("System");
        let result = system(&mut interp, &receiver, "Run", &[Value::from("echo")]).expect("run");
        assert_eq!(result.as_str(), Some(""));
    }

    #[test]
    fn log_rejects_unknown_levels() {
        let mut interp = Interpreter::new();
        let receiver = InstanceRef::new("Log");
        assert!(log(&mut interp, &receiver, "info", &[Value::from("hi")]).is_ok());
        assert!(log(&mut interp, &receiver, "shout", &[]).is_err());
    }
}
