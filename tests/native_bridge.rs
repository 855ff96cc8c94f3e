//==============================================
// File: tests/native_bridge.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Native Bridge coverage
// Objective: Drive built-in and host-registered native classes from scripts
//==============================================

mod util;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use joss::{ErrorCode, InstanceRef, Interpreter, RuntimeError, RuntimeOptions, Value};
use util::{harness, harness_with, run_err, run_lines};

//==============================================
// Section 1.0 - Built-in handlers
//==============================================

#[test]
fn stack_and_queue_keep_state_per_instance() {
    let lines = run_lines(
        r#"
$s = new Stack()
$s->push(1)
$s->push(2)
echo $s->peek()
echo $s->pop()
echo $s->size()
$s->pop()
echo $s->pop() ?? "empty"
echo $s->isEmpty()

$q = new Queue()
$q->enqueue("a")
$q->enqueue("b")
$other = new Queue()
echo $q->dequeue()
echo $q->size()
echo $other->size()
"#,
    );
    assert_eq!(
        lines,
        vec!["2", "2", "1", "empty", "true", "a", "1", "0"]
    );
}

#[test]
fn math_static_calls() {
    let lines = run_lines(
        r#"
echo Math::floor(2.7)
echo Math::ceil(2.1)
echo Math::round(2.5)
echo Math::abs(-4)
echo Math::max(3, 9, 4)
echo Math::min([5, 2, 8])
$r = Math::random(1, 3)
echo $r >= 1 && $r <= 3
"#,
    );
    assert_eq!(lines, vec!["2", "3", "3", "4", "9", "2", "true"]);
}

#[test]
fn math_random_rejects_inverted_bounds() {
    let err = run_err("Math::random(5, 1)");
    assert!(err.message.starts_with("Math::random"), "{}", err.message);
}

#[test]
fn script_classes_can_extend_native_classes() {
    let lines = run_lines(
        r#"
class History extends Stack {
    function last() { return $this->peek() }
}
$h = new History()
$h->push("home")
$h->push("about")
echo $h->last()
echo $h->size()
"#,
    );
    assert_eq!(lines, vec!["about", "2"]);
}

#[test]
fn unknown_native_method_is_reported() {
    let err = run_err("$s = new Stack()\n$s->shuffle()");
    assert_eq!(err.code, ErrorCode::InvalidOperation);
    assert!(err.message.contains("shuffle"), "{}", err.message);
}

#[test]
fn native_class_without_handler_is_missing_service() {
    let err = run_err("$db = new GranDB()\n$db->query(\"select 1\")");
    assert!(err.message.contains("GranDB"), "{}", err.message);
}

#[test]
fn system_log_writes_to_output_and_run_is_gated() {
    let lines = run_lines(
        r#"
System::log("booting")
Log::info("quiet")
echo "[" + System::Run("echo", ["hi"]) + "]"
echo System::env("JOSS_UNSET_VARIABLE", "none")
"#,
    );
    assert_eq!(lines, vec!["[System Log] booting", "[]", "none"]);
}

#[cfg(unix)]
#[test]
fn system_run_executes_when_allowed() {
    let mut h = harness_with(RuntimeOptions::default().with_allow_system_run(true), "");
    h.run("echo System::Run(\"echo\", [\"hi\"])").expect("run");
    assert_eq!(h.lines(), vec!["hi", ""]);
}

//==============================================
// Section 2.0 - Host-registered handlers
//==============================================

#[test]
fn host_closure_handles_a_new_class() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut h = harness();
    h.interp.register_native(
        "Greeter",
        move |_: &mut Interpreter,
              instance: &InstanceRef,
              method: &str,
              args: &[Value]|
              -> Result<Value, RuntimeError> {
            seen.fetch_add(1, Ordering::SeqCst);
            match method {
                "constructor" => {
                    let name = args.first().cloned().unwrap_or(Value::from("world"));
                    instance.set_field("name", name);
                    Ok(Value::Nil)
                }
                "hello" => {
                    let name = instance.get_field("name").unwrap_or(Value::Nil);
                    Ok(Value::from(format!("hello {}", name)))
                }
                other => Err(RuntimeError::native_argument(
                    "Greeter",
                    other,
                    "unsupported method",
                )),
            }
        },
    );

    h.run("$g = new Greeter(\"joss\")\necho $g->hello()\necho $g->name")
        .expect("run");
    assert_eq!(h.lines(), vec!["hello joss", "joss"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(h.interp.has_class("Greeter"));
}

#[test]
fn host_handler_can_replace_a_builtin_class() {
    let mut h = harness();
    h.interp.register_native(
        "Math",
        |_: &mut Interpreter, _: &InstanceRef, method: &str, _: &[Value]| -> Result<Value, RuntimeError> {
            Ok(Value::from(format!("stub {}", method)))
        },
    );
    h.run("echo Math::floor(1.5)").expect("run");
    assert_eq!(h.lines(), vec!["stub floor"]);
}
