//=============================================
// joss/dispatch.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: HTTP-facing dispatch over script-registered routes
// Objective: Store routes recorded by the Router native class, match incoming
//            method/path pairs and run the controller behind middleware checks
//=============================================

//=============================================
//            Section 1: Route Table
//=============================================

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::interpreter::concurrency::on_script_stack;
use crate::interpreter::errors::{RuntimeError, Signal};
use crate::interpreter::value::{InstanceRef, Value};
use crate::interpreter::Interpreter;
use crate::native::{redirect_response, REQUEST_GLOBAL, SESSION_GLOBAL};

#[derive(Debug, Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    /// `"Controller@method"` string or a callable value.
    pub handler: Value,
    pub middleware: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    middleware_stack: Vec<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a route under the middleware currently open; a second
    /// registration of the same method and path replaces the first.
    pub fn add(&mut self, method: &str, path: &str, handler: Value) {
        let route = Route {
            method: method.to_ascii_uppercase(),
            path: normalize(path),
            handler,
            middleware: self.middleware_stack.clone(),
        };
        match self
            .routes
            .iter_mut()
            .find(|existing| existing.method == route.method && existing.path == route.path)
        {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    pub fn push_middleware(&mut self, name: impl Into<String>) {
        self.middleware_stack.push(name.into());
    }

    pub fn pop_middleware(&mut self) -> Option<String> {
        self.middleware_stack.pop()
    }

    pub fn current_middleware(&self) -> &[String] {
        &self.middleware_stack
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    //Function: find
    //Purpose: Match a request against exact routes, then `{param}` patterns
    //Inputs: method, path
    //Returns: Option<(&Route, Vec<String>)> (captured segments in order)
    pub fn find(&self, method: &str, path: &str) -> Option<(&Route, Vec<String>)> {
        let method = method.to_ascii_uppercase();
        let path = normalize(path);
        let same_method = |route: &&Route| route.method == method;

        if let Some(route) = self
            .routes
            .iter()
            .filter(same_method)
            .find(|route| route.path == path)
        {
            return Some((route, Vec::new()));
        }
        self.routes
            .iter()
            .filter(same_method)
            .find_map(|route| match_pattern(&route.path, &path).map(|params| (route, params)))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn match_pattern(pattern: &str, path: &str) -> Option<Vec<String>> {
    let expected: Vec<&str> = pattern.split('/').collect();
    let actual: Vec<&str> = path.split('/').collect();
    if expected.len() != actual.len() {
        return None;
    }

    let mut params = Vec::new();
    for (want, got) in expected.iter().zip(actual.iter()) {
        if want.starts_with('{') && want.ends_with('}') {
            if got.is_empty() {
                return None;
            }
            params.push((*got).to_string());
        } else if want != got {
            return None;
        }
    }
    Some(params)
}

//=============================================/*
//  Patterns only capture whole segments; there is no wildcard or optional
//  parameter syntax.
//============================================*/
//=============================================
//            Section 2: Middleware
//=============================================

fn session_has(session: &InstanceRef, key: &str) -> bool {
    session
        .get_field(key)
        .is_some_and(|value| !value.is_nil())
}

/// Redirect produced by the first failing middleware, if any.
fn check_middleware(names: &[String], session: &InstanceRef) -> Option<Value> {
    for name in names {
        let (allowed, target, message) = match name.as_str() {
            "auth" => (
                session_has(session, "user_id"),
                "/login",
                Some("Please log in to continue."),
            ),
            "guest" => (!session_has(session, "user_id"), "/dashboard", None),
            "admin" => (
                session
                    .get_field("user_role")
                    .is_some_and(|role| role.as_str() == Some("admin")),
                "/",
                Some("Administrator access required."),
            ),
            other => {
                debug!(middleware = other, "unknown middleware ignored");
                continue;
            }
        };
        if !allowed {
            info!(middleware = %name, redirect = target, "middleware rejected request");
            let flash = message
                .map(|text| BTreeMap::from([("error".to_string(), Value::from(text))]))
                .unwrap_or_default();
            return Some(redirect_response(target, flash));
        }
    }
    None
}

//=============================================
//            Section 3: Dispatch
//=============================================

fn settle(outcome: Result<Value, Signal>) -> Result<Value, RuntimeError> {
    match outcome {
        Ok(value) | Err(Signal::Return(value)) => Ok(value),
        Err(signal) => Err(signal.into_runtime_error()),
    }
}

impl Interpreter {
    //Function: dispatch
    //Purpose: Serve one request against the routes the scripts registered
    //Inputs: method, path, request fields, session bag (updated in place)
    //Returns: Result<Value, RuntimeError> (handler value or middleware redirect)
    pub fn dispatch(
        &mut self,
        method: &str,
        path: &str,
        request: BTreeMap<String, Value>,
        session: &mut BTreeMap<String, Value>,
    ) -> Result<Value, RuntimeError> {
        on_script_stack(|| self.serve(method, path, request, session))?
    }

    fn serve(
        &mut self,
        method: &str,
        path: &str,
        request: BTreeMap<String, Value>,
        session: &mut BTreeMap<String, Value>,
    ) -> Result<Value, RuntimeError> {
        let (route, params) = {
            let routes = self.shared.routes.read();
            let (route, params) = routes.find(method, path).ok_or_else(|| {
                RuntimeError::InvalidOperation(format!(
                    "route not found: {} {}",
                    method.to_ascii_uppercase(),
                    path
                ))
            })?;
            (route.clone(), params)
        };
        debug!(method, path, route = %route.path, "dispatching");

        let request = InstanceRef::with_fields("Request", request);
        let session_ref = InstanceRef::with_fields("Session", session.clone());
        self.set_global(REQUEST_GLOBAL, Value::Instance(request));
        self.set_global(SESSION_GLOBAL, Value::Instance(session_ref.clone()));

        let outcome = match check_middleware(&route.middleware, &session_ref) {
            Some(redirect) => Ok(redirect),
            None => self.run_handler(&route.handler, params),
        };

        *session = session_ref.fields();
        outcome
    }

    fn run_handler(&mut self, handler: &Value, params: Vec<String>) -> Result<Value, RuntimeError> {
        let args: Vec<Value> = params.into_iter().map(Value::Str).collect();
        match handler {
            Value::Str(target) => {
                let (controller, action) = target.split_once('@').ok_or_else(|| {
                    RuntimeError::InvalidOperation(format!("malformed route handler '{}'", target))
                })?;
                let instance = match settle(self.instantiate(controller, Vec::new()))? {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(RuntimeError::InvalidOperation(format!(
                            "controller '{}' produced {}",
                            controller,
                            other.type_name()
                        )))
                    }
                };
                let method = self.resolve_method(controller, action).ok_or_else(|| {
                    RuntimeError::UndefinedMethod {
                        class: controller.to_string(),
                        method: action.to_string(),
                    }
                })?;
                settle(self.call_method(&method, &instance, args))
            }
            callable if callable.is_callable() => settle(self.call_value(callable.clone(), args)),
            other => Err(RuntimeError::NotCallable(other.type_name().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table.add("GET", "/users/{id}", Value::from("UserController@show"));
        table.add("GET", "/users/me", Value::from("UserController@me"));
        table.push_middleware("auth");
        table.add("post", "/posts/{post}/comments/{comment}", Value::from("C@store"));
        table.pop_middleware();
        table
    }

    #[test]
    fn exact_routes_win_over_patterns() {
        let table = table();
        let (route, params) = table.find("GET", "/users/me").expect("route");
        assert_eq!(route.handler.as_str(), Some("UserController@me"));
        assert!(params.is_empty());

        let (route, params) = table.find("GET", "/users/42/").expect("route");
        assert_eq!(route.handler.as_str(), Some("UserController@show"));
        assert_eq!(params, vec!["42".to_string()]);
    }

    #[test]
    fn patterns_capture_in_order_and_keep_middleware() {
        let table = table();
        let (route, params) = table.find("POST", "/posts/7/comments/9").expect("route");
        assert_eq!(params, vec!["7".to_string(), "9".to_string()]);
        assert_eq!(route.middleware, vec!["auth".to_string()]);
        assert!(table.find("GET", "/posts/7/comments/9").is_none());
        assert!(table.current_middleware().is_empty());
    }

    #[test]
    fn re_registration_replaces_route() {
        let mut table = table();
        let before = table.len();
        table.add("GET", "users/me", Value::from("ProfileController@show"));
        assert_eq!(table.len(), before);
        let (route, _) = table.find("GET", "/users/me").expect("route");
        assert_eq!(route.handler.as_str(), Some("ProfileController@show"));
    }

    #[test]
    fn admin_middleware_checks_role() {
        let session = InstanceRef::with_fields(
            "Session",
            BTreeMap::from([
                ("user_id".to_string(), Value::Int(1)),
                ("user_role".to_string(), Value::from("editor")),
            ]),
        );
        let names = vec!["auth".to_string(), "admin".to_string()];
        let Some(Value::Instance(redirect)) = check_middleware(&names, &session) else {
            panic!("admin check should redirect");
        };
        assert_eq!(
            redirect.get_field("url").and_then(|url| url.as_str().map(str::to_string)),
            Some("/".to_string())
        );
        session.set_field("user_role", Value::from("admin"));
        assert!(check_middleware(&names, &session).is_none());
    }
}
