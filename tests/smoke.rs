// Joss smoke tests for tokenizer and parser
// Covers: precedence, brace resolution, declarations, statements and diagnostics

use joss::ast::{Expr, InfixOp, MemberAccess, Stmt};
use joss::{ErrorCode, ScriptError, TokenKind, Tokenizer, parse_source};

fn parse(source: &str) -> Vec<Stmt> {
    match parse_source(source) {
        Ok(program) => program.statements,
        Err(errors) => panic!("parse failed: {errors}"),
    }
}

fn assigned_value(stmt: &Stmt) -> &Expr {
    match stmt {
        Stmt::Expression(Expr::Assign { value, .. }) => value,
        other => panic!("expected assignment, found {other:?}"),
    }
}

#[test]
fn test_multiplication_binds_tighter() {
    let statements = parse("1 + 2 * 3");
    match &statements[0] {
        Stmt::Expression(Expr::Infix {
            operator: InfixOp::Add,
            right,
            ..
        }) => assert!(matches!(
            right.as_ref(),
            Expr::Infix {
                operator: InfixOp::Multiply,
                ..
            }
        )),
        other => panic!("expected addition at the root, found {other:?}"),
    }
}

#[test]
fn test_brace_resolution() {
    let statements = parse("$a = {}\n$b = {x: 1}\n$c = { return 1 }");
    assert!(matches!(assigned_value(&statements[0]), Expr::Map(pairs) if pairs.is_empty()));
    match assigned_value(&statements[1]) {
        Expr::Map(pairs) => {
            assert_eq!(pairs.len(), 1);
            assert!(matches!(&pairs[0].0, Expr::Str(key) if key == "x"));
        }
        other => panic!("expected map literal, found {other:?}"),
    }
    assert!(matches!(
        assigned_value(&statements[2]),
        Expr::Block(block) if matches!(block.as_slice(), [Stmt::Return(Some(_))])
    ));
}

#[test]
fn test_typed_declaration_and_class() {
    let source = r#"
class Admin extends User {
    string $role = "admin"
    public function greet($name) {
        return "hi " + $name
    }
}
int $count = 3
"#;
    let statements = parse(source);
    match &statements[0] {
        Stmt::Class(decl) => {
            assert_eq!(decl.name, "Admin");
            assert_eq!(decl.parent.as_deref(), Some("User"));
            assert_eq!(decl.properties[0].type_name.as_deref(), Some("string"));
            assert_eq!(decl.methods[0].name, "greet");
        }
        other => panic!("expected class, found {other:?}"),
    }
    assert!(matches!(
        &statements[1],
        Stmt::Let { type_name, name, value: Some(_) } if type_name == "int" && name == "count"
    ));
}

#[test]
fn test_member_access_kinds() {
    let statements = parse("$user->name\nMath::floor(2.5)");
    assert!(matches!(
        &statements[0],
        Stmt::Expression(Expr::Member {
            access: MemberAccess::Arrow,
            ..
        })
    ));
    match &statements[1] {
        Stmt::Expression(Expr::Call { function, .. }) => assert!(matches!(
            function.as_ref(),
            Expr::Member {
                access: MemberAccess::Static,
                ..
            }
        )),
        other => panic!("expected static call, found {other:?}"),
    }
}

#[test]
fn test_control_statements() {
    let source = r#"
foreach ($items as $key => $item) {
    if ($item > 2) { break } else { continue }
}
try { throw "boom" } catch ($e) { echo $e }
switch ($x) {
    case 1:
        echo "one"
        break
    default:
        echo "other"
}
"#;
    let statements = parse(source);
    assert!(matches!(&statements[0], Stmt::Foreach { key: Some(k), value, .. } if k == "key" && value == "item"));
    assert!(matches!(&statements[1], Stmt::TryCatch { catch_var, .. } if catch_var == "e"));
    assert!(matches!(&statements[2], Stmt::Switch { cases, default: Some(_), .. } if cases.len() == 1));
}

#[test]
fn test_tokenizer_positions() {
    let tokens = Tokenizer::new("int $x = 10\necho $x").tokenize();
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind.clone()).collect();
    assert_eq!(kinds[0], TokenKind::Identifier("int".into()));
    assert_eq!(kinds[1], TokenKind::Var);
    assert_eq!(kinds[4], TokenKind::Integer(10));
    let echo = tokens
        .iter()
        .find(|token| token.kind == TokenKind::Echo)
        .expect("echo token");
    assert_eq!(echo.line(), 2);
    assert_eq!(kinds.last(), Some(&TokenKind::Eof));
}

#[test]
fn test_parse_errors_block_execution() {
    let errors = parse_source("$x = (1 + \n$y = 2").expect_err("unbalanced parenthesis");
    assert!(!errors.is_empty());
    let script_err: ScriptError = errors.into();
    assert_eq!(script_err.code, ErrorCode::Syntax);
    assert_eq!(script_err.code.to_string(), "E001");
}
