//==============================================
// File: tests/util.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Shared helpers for integration tests
// Objective: Run Joss source against a captured output sink
//==============================================
#![allow(dead_code)]

use joss::{
    CapturedOutput, InputSource, Interpreter, OutputSink, RuntimeOptions, ScriptError, Value,
};

pub struct Harness {
    pub interp: Interpreter,
    pub output: CapturedOutput,
}

impl Harness {
    pub fn run(&mut self, source: &str) -> Result<Value, ScriptError> {
        self.interp.run_source(source)
    }

    pub fn lines(&self) -> Vec<String> {
        self.output.lines()
    }
}

pub fn harness() -> Harness {
    harness_with(RuntimeOptions::default(), "")
}

pub fn harness_with(options: RuntimeOptions, input: &str) -> Harness {
    let (sink, output) = OutputSink::buffer();
    let interp = Interpreter::with_io(options, sink, InputSource::from_text(input));
    Harness { interp, output }
}

/// Run `source` and return its output lines, panicking on any script error.
pub fn run_lines(source: &str) -> Vec<String> {
    let mut harness = harness();
    if let Err(err) = harness.run(source) {
        panic!("script failed: {err}\noutput so far: {:?}", harness.lines());
    }
    harness.lines()
}

pub fn run_value(source: &str) -> Value {
    harness()
        .run(source)
        .unwrap_or_else(|err| panic!("script failed: {err}"))
}

pub fn run_err(source: &str) -> ScriptError {
    match harness().run(source) {
        Ok(value) => panic!("expected an error, script returned {value:?}"),
        Err(err) => err,
    }
}
