//=============================================
// joss/lib.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss language crate root
// Objective: Expose the lexer, parser, tree-walking interpreter, Native Bridge
//            and HTTP dispatch surface to hosts
//=============================================

pub mod ast;
pub mod config;
pub mod dispatch;
pub mod interpreter;
pub mod logging;
pub mod native;
pub mod parser;
pub mod tokenizer;

pub use ast::Program;
pub use config::RuntimeOptions;
pub use dispatch::{Route, RouteTable};
pub use interpreter::Interpreter;
pub use interpreter::concurrency::{Channel, FutureHandle};
pub use interpreter::errors::{ErrorCode, RuntimeError, ScriptError};
pub use interpreter::io::{CapturedOutput, InputSource, OutputSink};
pub use interpreter::value::{InstanceRef, TypeTag, Value};
pub use native::{NativeHandler, NativeRegistry};
pub use parser::{ParseError, ParseErrors, parse_source};
pub use tokenizer::{Token, TokenKind, Tokenizer};
