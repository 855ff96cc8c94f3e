//==================================================
// File: native/web.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Request, Session, Response, Redirect and Router native classes
// Objective: Read the injected request, mutate the injected session, build
//            response descriptors and record routes for dispatch
//==================================================

use std::collections::BTreeMap;

use tracing::debug;

use super::{arg, map_arg, string_arg, unknown_method};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{InstanceRef, Value};
use crate::interpreter::Interpreter;

pub(crate) const REQUEST_GLOBAL: &str = "__request";
pub(crate) const SESSION_GLOBAL: &str = "__session";

//==================================================
// Section 1.0 - Request & Session
//==================================================

fn injected(interp: &Interpreter, name: &str) -> Option<InstanceRef> {
    match interp.get_global(name) {
        Some(Value::Instance(instance)) => Some(instance),
        _ => None,
    }
}

pub(super) fn request(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    if method == "constructor" {
        return Ok(Value::Nil);
    }
    let current = injected(interp, REQUEST_GLOBAL);
    match method {
        "input" => {
            let key = string_arg("Request", method, args, 0)?;
            let fallback = args.get(1).cloned().unwrap_or(Value::Nil);
            Ok(current
                .and_then(|request| request.get_field(&key))
                .unwrap_or(fallback))
        }
        "has" => {
            let key = string_arg("Request", method, args, 0)?;
            Ok(Value::Bool(
                current.is_some_and(|request| request.has_field(&key)),
            ))
        }
        "all" => Ok(Value::Map(
            current.map(|request| request.fields()).unwrap_or_default(),
        )),
        other => Err(unknown_method("Request", other)),
    }
}

pub(super) fn session(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    if method == "constructor" {
        return Ok(Value::Nil);
    }
    let Some(current) = injected(interp, SESSION_GLOBAL) else {
        debug!(method, "session accessed outside of dispatch");
        return Ok(match method {
            "all" => Value::Map(BTreeMap::new()),
            "has" => Value::Bool(false),
            _ => Value::Nil,
        });
    };
    match method {
        "get" => {
            let key = string_arg("Session", method, args, 0)?;
            let fallback = args.get(1).cloned().unwrap_or(Value::Nil);
            Ok(current.get_field(&key).unwrap_or(fallback))
        }
        "put" => {
            let key = string_arg("Session", method, args, 0)?;
            let value = arg("Session", method, args, 1)?.clone();
            current.set_field(key, value);
            Ok(Value::Nil)
        }
        "has" => {
            let key = string_arg("Session", method, args, 0)?;
            Ok(Value::Bool(current.has_field(&key)))
        }
        "forget" => {
            let key = string_arg("Session", method, args, 0)?;
            current.remove_field(&key);
            Ok(Value::Nil)
        }
        "all" => Ok(Value::Map(current.fields())),
        other => Err(unknown_method("Session", other)),
    }
}

//==================================================
// Section 2.0 - Responses & Redirects
//==================================================

/// `RedirectResponse` instance as returned by `Response::redirect` and the
/// dispatch middleware.
pub(crate) fn redirect_response(url: &str, flash: BTreeMap<String, Value>) -> Value {
    let fields = BTreeMap::from([
        ("_type".to_string(), Value::from("REDIRECT")),
        ("url".to_string(), Value::from(url)),
        ("flash".to_string(), Value::Map(flash)),
        ("cookies".to_string(), Value::Map(BTreeMap::new())),
    ]);
    Value::Instance(InstanceRef::with_fields("RedirectResponse", fields))
}

fn referer(interp: &Interpreter) -> String {
    injected(interp, REQUEST_GLOBAL)
        .and_then(|request| request.get_field("_referer"))
        .and_then(|value| value.as_str().map(str::to_string))
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| "/".to_string())
}

pub(super) fn response(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match method {
        "constructor" => Ok(Value::Nil),
        "json" => {
            let data = arg("Response", method, args, 0)?.clone();
            let status = args.get(1).cloned().unwrap_or(Value::Int(200));
            Ok(Value::Map(BTreeMap::from([
                ("_type".to_string(), Value::from("JSON")),
                ("data".to_string(), data),
                ("status_code".to_string(), status),
            ])))
        }
        "raw" => {
            let data = arg("Response", method, args, 0)?.clone();
            let mut descriptor = BTreeMap::from([
                ("_type".to_string(), Value::from("RAW")),
                ("data".to_string(), data),
                (
                    "status_code".to_string(),
                    args.get(1).cloned().unwrap_or(Value::Int(200)),
                ),
                (
                    "content_type".to_string(),
                    args.get(2).cloned().unwrap_or_else(|| Value::from("text/plain")),
                ),
            ]);
            if args.len() > 3 {
                descriptor.insert(
                    "headers".to_string(),
                    Value::Map(map_arg("Response", method, args, 3)?),
                );
            }
            Ok(Value::Map(descriptor))
        }
        "redirect" => {
            let url = string_arg("Response", method, args, 0)?;
            Ok(redirect_response(&url, BTreeMap::new()))
        }
        "back" => Ok(redirect_response(&referer(interp), BTreeMap::new())),
        other => Err(unknown_method("Response", other)),
    }
}

pub(super) fn redirect(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match method {
        "constructor" => Ok(Value::Nil),
        "to" => {
            let url = string_arg("Redirect", method, args, 0)?;
            Ok(redirect_response(&url, BTreeMap::new()))
        }
        "back" => Ok(redirect_response(&referer(interp), BTreeMap::new())),
        other => Err(unknown_method("Redirect", other)),
    }
}

/// `with` and `withCookie` mutate the receiver and return it for chaining.
pub(super) fn redirect_instance(
    _: &mut Interpreter,
    instance: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let bucket = match method {
        "constructor" => return Ok(Value::Nil),
        "with" => "flash",
        "withCookie" => "cookies",
        other => return Err(unknown_method("RedirectResponse", other)),
    };
    let key = string_arg("RedirectResponse", method, args, 0)?;
    let value = arg("RedirectResponse", method, args, 1)?.clone();

    let mut entries = match instance.get_field(bucket) {
        Some(Value::Map(entries)) => entries,
        _ => BTreeMap::new(),
    };
    entries.insert(key, value);
    instance.set_field(bucket, Value::Map(entries));
    Ok(Value::Instance(instance.clone()))
}

//==================================================
// Section 3.0 - Router
//==================================================

fn route_handler(method: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    match arg("Router", method, args, 1)? {
        handler @ Value::Str(spec) if spec.contains('@') => Ok(handler.clone()),
        handler if handler.is_callable() => Ok(handler.clone()),
        other => Err(RuntimeError::native_argument(
            "Router",
            method,
            format!(
                "handler must be \"Controller@method\" or a function, got {}",
                other
            ),
        )),
    }
}

fn add_route(interp: &Interpreter, verb: &str, path: &str, handler: Value) {
    debug!(method = verb, path, "route registered");
    interp.shared.routes.write().add(verb, path, handler);
}

//Function: router
//Purpose: Record routes and middleware groups for later dispatch
//Inputs: interp, method name, args (path, handler) or middleware names
//Returns: Result<Value, RuntimeError> (nil)
pub(super) fn router(
    interp: &mut Interpreter,
    _: &InstanceRef,
    method: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match method {
        "constructor" => {}
        "get" | "post" | "put" | "delete" => {
            let path = string_arg("Router", method, args, 0)?;
            let handler = route_handler(method, args)?;
            add_route(interp, &method.to_ascii_uppercase(), &path, handler);
        }
        "api" => {
            let path = string_arg("Router", method, args, 0)?;
            let handler = route_handler(method, args)?;
            add_route(interp, "GET", &path, handler.clone());
            add_route(interp, "POST", &path, handler);
        }
        "match" => {
            let verbs = string_arg("Router", method, args, 0)?;
            let path = string_arg("Router", method, args, 1)?;
            let handler = string_arg("Router", method, args, 2)?;
            let parts: Vec<&str> = handler.split('@').collect();
            let verbs = verbs
                .split('|')
                .map(|verb| verb.trim().to_ascii_uppercase())
                .filter(|verb| !verb.is_empty());
            match parts.as_slice() {
                [_, _] => {
                    for verb in verbs {
                        add_route(interp, &verb, &path, Value::from(handler.as_str()));
                    }
                }
                [controller, actions @ ..] if actions.len() > 1 => {
                    for (verb, action) in verbs.zip(actions.iter()) {
                        let target = format!("{}@{}", controller, action);
                        add_route(interp, &verb, &path, Value::Str(target));
                    }
                }
                _ => {
                    return Err(RuntimeError::native_argument(
                        "Router",
                        method,
                        format!("handler '{}' must contain '@'", handler),
                    ))
                }
            }
        }
        "middleware" => {
            let name = string_arg("Router", method, args, 0)?;
            interp.shared.routes.write().push_middleware(name);
        }
        "end" => {
            interp.shared.routes.write().pop_middleware();
        }
        "group" => {
            let name = string_arg("Router", method, args, 0)?;
            let callback = arg("Router", method, args, 1)?.clone();
            if !callback.is_callable() {
                return Err(RuntimeError::native_argument(
                    "Router",
                    method,
                    format!("group body must be a function, got {}", callback.type_name()),
                ));
            }
            interp.shared.routes.write().push_middleware(name);
            let outcome = interp.invoke(callback, Vec::new());
            interp.shared.routes.write().pop_middleware();
            outcome?;
        }
        other => return Err(unknown_method("Router", other)),
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_with_chains_into_flash() {
        let mut interp = Interpreter::new();
        let Value::Instance(target) = redirect_response("/home", BTreeMap::new()) else {
            panic!("redirect response should be an instance");
        };
        let returned = redirect_instance(
            &mut interp,
            &target,
            "with",
            &[Value::from("status"), Value::from("saved")],
        )
        .expect("with");
        assert!(matches!(returned, Value::Instance(ref same) if same.ptr_eq(&target)));
        let Some(Value::Map(flash)) = target.get_field("flash") else {
            panic!("flash should be a map");
        };
        assert_eq!(flash.get("status").and_then(Value::as_str), Some("saved"));
    }

    #[test]
    fn match_maps_verbs_to_actions_in_order() {
        let mut interp = Interpreter::new();
        let receiver = InstanceRef::new("Router");
        router(
            &mut interp,
            &receiver,
            "match",
            &[
                Value::from("GET|POST"),
                Value::from("/contact"),
                Value::from("ContactController@show@store"),
            ],
        )
        .expect("match");
        let routes = interp.shared.routes.read();
        let (get, _) = routes.find("GET", "/contact").expect("GET route");
        assert_eq!(get.handler.as_str(), Some("ContactController@show"));
        let (post, _) = routes.find("POST", "/contact").expect("POST route");
        assert_eq!(post.handler.as_str(), Some("ContactController@store"));
    }

    #[test]
    fn back_uses_the_request_referer() {
        let mut interp = Interpreter::new();
        let request = InstanceRef::with_fields(
            "Request",
            BTreeMap::from([("_referer".to_string(), Value::from("/form"))]),
        );
        interp.set_global(REQUEST_GLOBAL, Value::Instance(request));
        let receiver = InstanceRef::new("Response");
        let Value::Instance(target) =
            response(&mut interp, &receiver, "back", &[]).expect("back")
        else {
            panic!("back should return an instance");
        };
        assert_eq!(
            target.get_field("url").and_then(|url| url.as_str().map(str::to_string)),
            Some("/form".to_string())
        );
    }
}
