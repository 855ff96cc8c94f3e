//=============================================
// joss/ast/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss abstract syntax tree
// Objective: Define the statement and expression node set produced by the parser
//            and walked by the interpreter
//=============================================

//=============================================
//            Section 1: Program & Statements
//=============================================

use std::fmt;
use std::sync::Arc;

/// A sequence of statements executed in order.
pub type Block = Vec<Stmt>;

/// Root node of a parsed source file.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `TYPE $name [= expr]`
    Let {
        type_name: String,
        name: String,
        value: Option<Expr>,
    },
    Class(Arc<ClassDecl>),
    /// Named `function`, or an `Init` outside a class body.
    Function(Arc<FunctionDecl>),
    Foreach {
        iterable: Expr,
        key: Option<String>,
        value: String,
        body: Block,
    },
    While {
        condition: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        condition: Expr,
    },
    TryCatch {
        body: Block,
        catch_var: String,
        handler: Block,
    },
    If {
        condition: Expr,
        consequence: Block,
        alternative: Option<Block>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
    },
    Throw(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    Import(String),
    Namespace(String),
    Echo(Expr),
    Expression(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}

//=============================================
//            Section 2: Declarations
//=============================================

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
}

/// Callable declaration shared by methods, `Init` initializers, named functions
/// and function literals. A `None` body marks a native method stub.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Option<Block>,
    pub is_init: bool,
}

impl FunctionDecl {
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            body: None,
            is_init: false,
        }
    }

    pub fn is_native(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<Arc<FunctionDecl>>,
}

impl ClassDecl {
    /// Empty declaration used to pre-register native classes.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Arc<FunctionDecl>> {
        self.methods.iter().find(|method| method.name == name)
    }
}

//=============================================/*
//  Classes own their members; callables are reference counted so bound
//  methods and function values can share them across tasks.
//============================================*/
//=============================================
//            Section 3: Expressions
//=============================================

#[derive(Debug, Clone)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Nil,
    Identifier(String),
    This,
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },
    New {
        class: String,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
        access: MemberAccess,
    },
    /// `target[index]`; a missing index is the append slot in `$list[] = v`.
    Index {
        target: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `cond ? a : b`. A missing consequence is the `cond ?: b` short form.
    Ternary {
        condition: Box<Expr>,
        consequence: Option<Block>,
        alternative: Block,
    },
    Infix {
        left: Box<Expr>,
        operator: InfixOp,
        right: Box<Expr>,
    },
    Prefix {
        operator: PrefixOp,
        operand: Box<Expr>,
    },
    Postfix {
        operand: Box<Expr>,
        operator: PostfixOp,
    },
    Array(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Block(Block),
    Function(Arc<FunctionDecl>),
    Isset(Vec<Expr>),
    Empty(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAccess {
    Dot,
    Arrow,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    NullCoalesce,
    ShiftLeft,
    ShiftRight,
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            InfixOp::Add => "+",
            InfixOp::Subtract => "-",
            InfixOp::Multiply => "*",
            InfixOp::Divide => "/",
            InfixOp::Modulo => "%",
            InfixOp::Equal => "==",
            InfixOp::NotEqual => "!=",
            InfixOp::Less => "<",
            InfixOp::Greater => ">",
            InfixOp::LessEqual => "<=",
            InfixOp::GreaterEqual => ">=",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
            InfixOp::NullCoalesce => "??",
            InfixOp::ShiftLeft => "<<",
            InfixOp::ShiftRight => ">>",
            InfixOp::Pipe => "|>",
        };
        f.write_str(symbol)
    }
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Not => f.write_str("!"),
            PrefixOp::Negate => f.write_str("-"),
        }
    }
}

impl Expr {
    /// Name of a plain identifier expression, if this is one.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

//=============================================/*
//  Expression nodes mirror the Pratt parser's prefix/infix table one to one.
//============================================*/
