//==============================================
// File: tests/dispatch.rs
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: HTTP dispatch coverage
// Objective: Register routes from scripts and serve requests through the host API
//==============================================

mod util;

use std::collections::BTreeMap;
use std::thread;

use joss::Value;
use util::{Harness, harness};

const APP: &str = r#"
class UserController {
    function show($id) {
        return Response::json({id: $id, name: Request::input("name", "anon")})
    }
    function login() {
        Session::put("user_id", 7)
        Session::put("user_role", "admin")
        return Redirect::to("/dashboard")->with("status", "welcome")
    }
    function logout() {
        Session::forget("user_id")
        return Response::raw("bye")
    }
}

Router::get("/users/{id}", "UserController@show")
Router::post("/login", "UserController@login")
Router::middleware("auth")
Router::get("/dashboard", function() {
    return "hello " + Session::get("user_id")
})
Router::post("/logout", "UserController@logout")
Router::end()
Router::group("admin", function() {
    Router::get("/admin", function() { return "secret" })
})
"#;

fn app() -> Harness {
    let mut h = harness();
    h.run(APP).expect("app script");
    h
}

fn field(value: &Value, key: &str) -> Value {
    match value {
        Value::Map(entries) => entries.get(key).cloned().unwrap_or(Value::Nil),
        Value::Instance(instance) => instance.get_field(key).unwrap_or(Value::Nil),
        other => panic!("expected map or instance, got {other:?}"),
    }
}

fn request(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::from(*value)))
        .collect()
}

#[test]
fn scripts_register_routes() {
    let h = app();
    assert_eq!(h.interp.route_count(), 5);
}

#[test]
fn controller_action_receives_path_params_and_request() {
    let mut h = app();
    let mut session = BTreeMap::new();
    let response = h
        .interp
        .dispatch("GET", "/users/42", request(&[("name", "ada")]), &mut session)
        .expect("dispatch");

    assert_eq!(field(&response, "_type").as_str(), Some("JSON"));
    assert_eq!(field(&response, "status_code").as_int(), Some(200));
    let data = field(&response, "data");
    assert_eq!(field(&data, "id").as_str(), Some("42"));
    assert_eq!(field(&data, "name").as_str(), Some("ada"));
}

#[test]
fn session_writes_flow_back_to_the_host() {
    let mut h = app();
    let mut session = BTreeMap::new();
    let response = h
        .interp
        .dispatch("post", "/login", BTreeMap::new(), &mut session)
        .expect("dispatch");

    assert!(matches!(&response, Value::Instance(r) if r.class_name() == "RedirectResponse"));
    assert_eq!(field(&response, "url").as_str(), Some("/dashboard"));
    assert_eq!(
        field(&field(&response, "flash"), "status").as_str(),
        Some("welcome")
    );
    assert!(matches!(session.get("user_id"), Some(Value::Int(7))));

    let response = h
        .interp
        .dispatch("GET", "/dashboard", BTreeMap::new(), &mut session)
        .expect("dispatch");
    assert_eq!(response.as_str(), Some("hello 7"));

    let response = h
        .interp
        .dispatch("POST", "/logout", BTreeMap::new(), &mut session)
        .expect("dispatch");
    assert_eq!(field(&response, "_type").as_str(), Some("RAW"));
    assert!(!session.contains_key("user_id"));
}

#[test]
fn auth_middleware_redirects_guests_to_login() {
    let mut h = app();
    let mut session = BTreeMap::new();
    let response = h
        .interp
        .dispatch("GET", "/dashboard", BTreeMap::new(), &mut session)
        .expect("dispatch");

    let Value::Instance(redirect) = &response else {
        panic!("expected redirect, got {response:?}");
    };
    assert_eq!(redirect.class_name(), "RedirectResponse");
    assert_eq!(field(&response, "url").as_str(), Some("/login"));
    assert_eq!(
        field(&field(&response, "flash"), "error").as_str(),
        Some("Please log in to continue.")
    );
}

#[test]
fn group_middleware_applies_to_nested_routes() {
    let mut h = app();
    let mut session = BTreeMap::from([("user_role".to_string(), Value::from("editor"))]);
    let response = h
        .interp
        .dispatch("GET", "/admin", BTreeMap::new(), &mut session)
        .expect("dispatch");
    assert_eq!(field(&response, "url").as_str(), Some("/"));

    session.insert("user_role".to_string(), Value::from("admin"));
    let response = h
        .interp
        .dispatch("GET", "/admin", BTreeMap::new(), &mut session)
        .expect("dispatch");
    assert_eq!(response.as_str(), Some("secret"));
}

#[test]
fn unknown_route_is_an_error() {
    let mut h = app();
    let mut session = BTreeMap::new();
    let err = h
        .interp
        .dispatch("DELETE", "/users/1", BTreeMap::new(), &mut session)
        .expect_err("no such route");
    assert!(err.to_string().contains("route not found: DELETE /users/1"), "{err}");
}

#[test]
fn handlers_see_request_and_session_bags() {
    let mut h = harness();
    h.run(
        r#"
Router::get("/echo", function() {
    return Request::all()
})
Router::get("/back", function() {
    return Response::back()
})
"#,
    )
    .expect("script");

    let mut session = BTreeMap::new();
    let all = h
        .interp
        .dispatch("GET", "/echo", request(&[("q", "joss")]), &mut session)
        .expect("dispatch");
    assert_eq!(field(&all, "q").as_str(), Some("joss"));

    let back = h
        .interp
        .dispatch("GET", "/back", request(&[("_referer", "/form")]), &mut session)
        .expect("dispatch");
    assert_eq!(field(&back, "url").as_str(), Some("/form"));

    let injected = h.interp.get_global("__request");
    assert!(matches!(injected, Some(Value::Instance(ref r)) if r.class_name() == "Request"));
}

#[test]
fn deep_handlers_run_from_small_host_threads() {
    let worker = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let mut h = harness();
            h.run(
                r#"
function depth($n) {
    if ($n == 0) { return 0 }
    return depth($n - 1) + 1
}
Router::get("/deep/{n}", function($n) { return depth(int($n)) })
"#,
            )
            .expect("script");
            let mut session = BTreeMap::new();
            h.interp
                .dispatch("GET", "/deep/180", BTreeMap::new(), &mut session)
                .expect("dispatch")
        })
        .expect("spawn host thread");

    let depth = worker.join().expect("host thread survives");
    assert_eq!(depth.as_int(), Some(180));
}
