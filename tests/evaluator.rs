//==============================================
// File: tests/evaluator.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Evaluator regression suite
// Objective: Run small Joss programs end to end and check their console output
//==============================================

mod util;

use std::fs;
use std::thread;

use joss::config::DEFAULT_MAX_CALL_DEPTH;
use joss::{ErrorCode, RuntimeOptions, Value};
use util::{harness, harness_with, run_err, run_lines, run_value};

//==============================================
// Section 1.0 - Values, types and operators
//==============================================

#[test]
fn arithmetic_and_concatenation() {
    let lines = run_lines(
        r#"
echo 1 + 2 * 3
echo 7 / 2
echo 6 / 2
echo 7 % 4
echo "n=" + 4
echo 2.5 * 2
"#,
    );
    assert_eq!(lines, vec!["7", "3.5", "3", "3", "n=4", "5"]);
}

#[test]
fn typed_declaration_rejects_wrong_kind() {
    let err = run_err(r#"int $count = "three""#);
    assert_eq!(err.code, ErrorCode::TypeMismatch);
    assert!(err.message.contains("$count"), "{}", err.message);

    let err = run_err("int $count = 1\n$count = \"two\"");
    assert_eq!(err.code, ErrorCode::TypeMismatch);
}

#[test]
fn typed_declaration_without_initializer_uses_zero_value() {
    let lines = run_lines("int $n\nstring $s\nfloat $f = 2\necho $n + 1\necho \"[\" + $s + \"]\"\necho $f");
    assert_eq!(lines, vec!["1", "[]", "2"]);
}

#[test]
fn typed_parameters_are_checked() {
    let err = run_err("function twice(int $n) { return $n * 2 }\ntwice(\"x\")");
    assert_eq!(err.code, ErrorCode::TypeMismatch);
}

#[test]
fn isset_and_empty() {
    let lines = run_lines(
        r#"
$a = 1
$zero = 0
$m = {name: "joss"}
echo isset($a)
echo isset($missing)
echo isset($a, $missing)
echo isset($m["name"])
echo isset($m["age"])
echo empty($zero)
echo empty($missing)
echo empty($a)

$list = [1, 2, 3]
echo isset($list[2])
echo isset($list[3])
echo isset($list[-1])

class Animal {
    string $name = "rex"
    function speak() { return "woof" }
}
class Dog extends Animal {
    function fetch() { return "ball" }
}
$d = new Dog()
echo isset($d->name)
echo isset($d->speak)
echo isset($d->fetch)
echo $d->speak()
"#,
    );
    assert_eq!(
        lines,
        vec![
            "true", "false", "false", "true", "false", "true", "true", "false", "true", "false",
            "false", "true", "false", "false", "woof"
        ]
    );
}

#[test]
fn isset_and_empty_evaluate_operands_once() {
    let lines = run_lines(
        r#"
$n = 0
function bump() {
    $n = $n + 1
    return 5
}
echo empty(bump())
echo $n
echo isset(bump())
echo $n
$list = [0, 7]
echo empty($list[bump() - 4])
echo $n
"#,
    );
    assert_eq!(lines, vec!["false", "1", "false", "1", "false", "2"]);
}

#[test]
fn truthiness_of_scalars_and_collections() {
    let lines = run_lines(
        r#"
echo empty("")
echo empty("0")
echo empty(0.0)
echo empty([])
echo empty({})
echo empty("false")
if (0.0) { echo "truthy" } else { echo "falsy" }
"#,
    );
    assert_eq!(
        lines,
        vec!["true", "true", "false", "true", "false", "false", "truthy"]
    );
}

#[test]
fn collections_and_append_slot() {
    let lines = run_lines(
        r#"
$list = []
$list[] = 1
$list[] = 2
$list[0] = 10
echo $list
echo count($list)
$m = {b: 1}
$m["a"] = 2
echo $m
$m->c = 3
echo len($m)
"#,
    );
    assert_eq!(lines, vec!["[10, 2]", "2", "{a: 2, b: 1}", "3"]);
}

#[test]
fn nested_strings_are_quoted_inside_collections() {
    let lines = run_lines("echo [1, \"a\", null]");
    assert_eq!(lines, vec![r#"[1, "a", nil]"#]);
}

#[test]
fn null_coalesce_ternary_and_postfix() {
    let lines = run_lines(
        r#"
echo $missing ?? "fallback"
$x = 5
echo $x > 3 ? { "big" } : { "small" }
echo "" ?: "short"
$i = 0
$i++
$i++
$i--
echo $i
"#,
    );
    assert_eq!(lines, vec!["fallback", "big", "short", "1"]);
}

#[test]
fn pipes_pass_left_value_as_first_argument() {
    let lines = run_lines(
        r#"
function double($x) { return $x * 2 }
function add($a, $b) { return $a + $b }
echo 3 |> double |> add(1)
"#,
    );
    assert_eq!(lines, vec!["7"]);
}

#[test]
fn function_literals_are_values() {
    let lines = run_lines(
        r#"
$square = function($x) { return $x * $x }
echo $square(4)
$ops = {inc: function($n) { return $n + 1 }}
echo $ops->inc(9)
"#,
    );
    assert_eq!(lines, vec!["16", "10"]);
}

#[test]
fn json_builtins() {
    let mut h = harness();
    h.interp.set_global("payload", Value::from(r#"{"id": 7}"#));
    h.run(
        r#"
echo json_encode({a: 1, b: [true, null]})
$decoded = json_decode($payload)
echo $decoded["id"] + 1
echo json_verify("{oops")
echo json_decode("{oops") ?? "invalid"
"#,
    )
    .expect("run");
    assert_eq!(
        h.lines(),
        vec![r#"{"a":1,"b":[true,null]}"#, "8", "false", "invalid"]
    );
}

//==============================================
// Section 2.0 - Control flow
//==============================================

#[test]
fn loops_and_switch() {
    let lines = run_lines(
        r#"
$i = 0
while ($i < 3) { $i++ }
echo $i
$j = 10
do { $j++ } while ($j < 5)
echo $j
$x = 2
switch ($x) {
    case 1:
        echo "one"
        break
    case 2:
        echo "two"
        break
    default:
        echo "other"
}
switch ("z") {
    case "a":
        echo "a"
    default:
        echo "default"
}
"#,
    );
    assert_eq!(lines, vec!["3", "11", "two", "default"]);
}

#[test]
fn foreach_binds_keys_and_values() {
    let lines = run_lines(
        r#"
foreach (["a", "b"] as $k => $v) { echo $k + ":" + $v }
foreach ({x: 1, y: 2} as $k => $v) {
    if ($k == "x") { continue }
    echo $k + "=" + $v
}
"#,
    );
    assert_eq!(lines, vec!["0:a", "1:b", "y=2"]);
}

#[test]
fn break_inside_try_leaves_the_loop() {
    let lines = run_lines(
        r#"
$out = []
foreach ([1, 2, 3, 4] as $n) {
    try {
        if ($n == 3) { break }
        $out[] = $n
    } catch ($e) {
        echo "caught"
    }
}
echo $out
"#,
    );
    assert_eq!(lines, vec!["[1, 2]"]);
}

#[test]
fn try_catch_handles_throws_and_fatal_errors() {
    let lines = run_lines(
        r#"
try { throw "boom" } catch ($e) { echo "caught " + $e }
try { $y = 1 / 0 } catch ($e) { echo $e }
try { nope() } catch ($e) { echo $e }
"#,
    );
    assert_eq!(
        lines,
        vec!["caught boom", "division by zero", "undefined function 'nope'"]
    );
}

#[test]
fn uncaught_throw_is_a_runtime_error() {
    let err = run_err("throw \"lost\"");
    assert_eq!(err.code, ErrorCode::RuntimePanic);
    assert!(err.message.contains("lost"));
    assert_eq!(run_err("missing()").code, ErrorCode::InvalidOperation);
}

#[test]
fn top_level_return_stops_execution() {
    let mut h = harness();
    let value = h.run("echo \"before\"\nreturn 5\necho \"after\"").expect("run");
    assert!(matches!(value, Value::Int(5)));
    assert_eq!(h.lines(), vec!["before"]);
}

#[test]
fn recursion_depth_is_bounded() {
    let mut h = harness_with(RuntimeOptions::default().with_max_call_depth(16), "");
    let err = h
        .run("function down($n) { return down($n + 1) }\ndown(0)")
        .expect_err("depth limit");
    assert!(err.message.contains("maximum call depth of 16"), "{}", err.message);
}

#[test]
fn default_depth_limit_holds_on_small_host_threads() {
    let near_limit = DEFAULT_MAX_CALL_DEPTH - 10;
    let worker = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || {
            let lines = run_lines(&format!(
                "function down($n) {{\n    if ($n == 0) {{ return 0 }}\n    return down($n - 1) + 1\n}}\necho down({near_limit})"
            ));
            let err = run_err("function spin($n) { return spin($n + 1) }\nspin(0)");
            (lines, err)
        })
        .expect("spawn host thread");

    let (lines, err) = worker.join().expect("host thread survives");
    assert_eq!(lines, vec![near_limit.to_string()]);
    assert_eq!(err.code, ErrorCode::RuntimePanic);
    assert!(err.message.contains("maximum call depth"), "{}", err.message);
}

//==============================================
// Section 3.0 - Functions, scope and classes
//==============================================

#[test]
fn function_frames_do_not_leak_locals() {
    let lines = run_lines(
        r#"
$count = 0
function bump() {
    $count = $count + 1
    $local = "x"
}
bump()
bump()
echo $count
echo isset($local)
"#,
    );
    assert_eq!(lines, vec!["2", "false"]);
}

#[test]
fn inheritance_and_field_defaults() {
    let lines = run_lines(
        r#"
class Animal {
    string $sound = "..."
    int $legs = 4
    function speak() { return $this->sound }
    function name() { return "animal" }
}
class Bird extends Animal {
    string $sound = "tweet"
    int $legs = 2
    function name() { return "bird" }
}
$b = new Bird()
echo $b->speak()
echo $b->name()
echo $b->legs
echo isset($b->legs)
echo isset($b->wings)
"#,
    );
    assert_eq!(lines, vec!["tweet", "bird", "2", "true", "false"]);
}

#[test]
fn constructors_receive_arguments() {
    let lines = run_lines(
        r#"
class Point {
    int $x
    int $y
    Init constructor($x, $y) {
        $this->x = $x
        $this->y = $y
    }
    function sum() { return $this->x + $this->y }
}
$p = new Point(3, 4)
echo $p->sum()
"#,
    );
    assert_eq!(lines, vec!["7"]);
}

#[test]
fn class_typed_variables_accept_subclasses() {
    let lines = run_lines(
        r#"
class Shape {}
class Square extends Shape {}
Shape $s = new Square()
echo typeof($s)
"#,
    );
    assert_eq!(lines, vec!["Square"]);
    let err = run_err("class Shape {}\nclass Other {}\nShape $s = new Other()");
    assert_eq!(err.code, ErrorCode::TypeMismatch);
}

#[test]
fn inheritance_cycles_are_rejected() {
    let err = run_err("class A extends B {}\nclass B extends A {}");
    assert!(err.message.contains("inheritance cycle"), "{}", err.message);
}

#[test]
fn main_entry_point_runs_after_top_level() {
    let lines = run_lines(
        r#"
class Main {
    Init main() {
        echo "started"
    }
}
echo "top"
"#,
    );
    assert_eq!(lines, vec!["top", "started"]);
}

//==============================================
// Section 4.0 - Imports, environment and console
//==============================================

#[test]
fn imports_resolve_relative_to_script_dir_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("greet.joss"),
        "echo \"loaded\"\nfunction greet($n) { return \"hi \" + $n }",
    )
    .expect("write module");

    let mut h = harness();
    h.interp.set_script_dir(dir.path());
    h.run("import \"greet\"\nImport \"greet.joss\"\necho greet(\"bo\")")
        .expect("run");
    assert_eq!(h.lines(), vec!["loaded", "hi bo"]);
}

#[test]
fn missing_import_reports_module_resolution() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness();
    h.interp.set_script_dir(dir.path());
    let err = h.run("import \"absent\"").expect_err("missing module");
    assert_eq!(err.code, ErrorCode::ModuleResolution);
    assert_eq!(err.code.to_string(), "E002");
}

#[test]
fn global_import_walks_up_to_config_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config");
    let nested = dir.path().join("app").join("controllers");
    fs::create_dir_all(&config).expect("config dir");
    fs::create_dir_all(&nested).expect("nested dir");
    fs::write(config.join("global.joss"), "$APP = \"joss\"").expect("write global");

    let mut h = harness();
    h.interp.set_script_dir(&nested);
    h.run("import \"global\"\necho $APP").expect("run");
    assert_eq!(h.lines(), vec!["joss"]);
}

#[test]
fn env_file_feeds_env_builtin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("env.joss");
    fs::write(&path, "# app\nAPP_NAME=\"Joss\"\nPORT=8080\n").expect("write env");

    let mut h = harness();
    assert_eq!(h.interp.load_env_file(&path).expect("load env"), 2);
    h.run("echo env(\"APP_NAME\")\necho env(\"PORT\")\necho env(\"MISSING\", \"dflt\")")
        .expect("run");
    assert_eq!(h.lines(), vec!["Joss", "8080", "dflt"]);
}

#[test]
fn file_get_contents_reads_beside_the_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("note.txt"), "hello file").expect("write note");
    let mut h = harness();
    h.interp.set_script_dir(dir.path());
    h.run("echo file_get_contents(\"note.txt\")").expect("run");
    assert_eq!(h.lines(), vec!["hello file"]);
}

#[test]
fn console_streams_read_and_write() {
    let mut h = harness_with(RuntimeOptions::default(), "41\nAda\n");
    h.run(
        r#"
int $n
string $name
cin >> $n
cin >> $name
cout << "n=" << ($n + 1)
echo ";" + $name
"#,
    )
    .expect("run");
    assert_eq!(h.output.contents(), "n=42;Ada\n");
}

#[test]
fn non_interactive_mode_skips_console_reads() {
    let options = RuntimeOptions::default().with_non_interactive(true);
    let mut h = harness_with(options, "ignored\n");
    h.run("string $s = \"x\"\ncin >> $s\necho \"[\" + $s + \"]\"")
        .expect("run");
    assert_eq!(h.lines(), vec!["[]"]);

    let mut h = harness_with(RuntimeOptions::default(), "ignored\n");
    h.interp.set_env("NON_INTERACTIVE", "true");
    h.run("$s = \"x\"\ncin >> $s\necho \"[\" + $s + \"]\"").expect("run");
    assert_eq!(h.lines(), vec!["[]"]);
}

#[test]
fn run_value_reports_last_statement() {
    assert!(matches!(run_value("$a = 2\n$a * 21"), Value::Int(42)));
}
