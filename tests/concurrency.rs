//==============================================
// File: tests/concurrency.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Async task and channel coverage
// Objective: Exercise async/await futures and channel FIFO semantics from scripts
//==============================================

mod util;

use joss::{Channel, FutureHandle, Value};
use util::{run_err, run_lines};

#[test]
fn await_returns_task_value() {
    let lines = run_lines("$f = async(5 + 5)\necho await($f)\necho await(3)");
    assert_eq!(lines, vec!["10", "3"]);
}

#[test]
fn async_callable_runs_with_captured_bindings() {
    let lines = run_lines(
        r#"
$base = 40
$task = async(function() { return $base + 2 })
echo await($task)
echo await($task)
"#,
    );
    assert_eq!(lines, vec!["42", "42"]);
}

#[test]
fn task_faults_surface_only_at_await() {
    let lines = run_lines(
        r#"
$f = async(1 / 0)
echo "spawned"
try {
    await($f)
} catch ($e) {
    echo "failed: " + $e
}
"#,
    );
    assert_eq!(lines, vec!["spawned", "failed: division by zero"]);
}

#[test]
fn channels_are_fifo_and_drain_after_close() {
    let lines = run_lines(
        r#"
$c = make_chan(4)
send($c, 1)
send($c, 2)
$c << 3
close($c)
echo recv($c)
foreach ($c as $i => $v) {
    echo $i + ":" + $v
}
echo recv($c) ?? "drained"
"#,
    );
    assert_eq!(lines, vec!["1", "0:2", "1:3", "drained"]);
}

#[test]
fn producer_task_feeds_consumer_loop() {
    let lines = run_lines(
        r#"
$jobs = make_chan(2)
$producer = async(function() {
    foreach ([1, 2, 3, 4, 5] as $n) {
        send($jobs, $n * 10)
    }
    close($jobs)
    return "done"
})
$total = 0
foreach ($jobs as $value) {
    $total = $total + $value
}
echo $total
echo await($producer)
"#,
    );
    assert_eq!(lines, vec!["150", "done"]);
}

#[test]
fn send_on_closed_channel_is_fatal() {
    let err = run_err("$c = make_chan(1)\nclose($c)\nsend($c, 1)");
    assert!(err.message.contains("send on closed channel"), "{}", err.message);
    let err = run_err("make_chan(-1)");
    assert!(err.message.contains("non-negative"), "{}", err.message);
}

#[test]
fn host_side_channel_and_future_handles() {
    let channel = Channel::new(1);
    channel.send(Value::Int(7)).expect("send");
    channel.close().expect("close");
    assert!(matches!(channel.recv(), Some(Value::Int(7))));
    assert!(channel.recv().is_none());

    let ready = FutureHandle::ready(Ok(Value::from("now")));
    assert!(ready.is_ready());
    assert!(matches!(ready.wait(), Ok(Value::Str(s)) if s == "now"));
}
