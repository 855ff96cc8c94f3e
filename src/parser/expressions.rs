//=============================================
// joss/parser/expressions.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss expression parsing
// Objective: Pratt-style precedence climbing plus the brace resolver that
//            decides between map literals and block expressions
//=============================================

use std::sync::Arc;

use super::{MAX_EXPRESSION_DEPTH, ParseError, Parser};
use crate::ast::{Block, Expr, FunctionDecl, InfixOp, MemberAccess, PostfixOp, PrefixOp, Stmt};
use crate::tokenizer::TokenKind;

//=============================================
//            Section 1: Precedence Table
//=============================================

/// Binding power of infix/postfix tokens, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Assign,
    Ternary,
    NullCoalesce,
    Logical,
    Equality,
    Relational,
    Pipe,
    Additive,
    Shift,
    Multiplicative,
    Modulo,
    Prefix,
    Call,
    Member,
}

impl Precedence {
    pub fn of(kind: &TokenKind) -> Self {
        match kind {
            TokenKind::Assign => Precedence::Assign,
            TokenKind::Question => Precedence::Ternary,
            TokenKind::NullCoalesce => Precedence::NullCoalesce,
            TokenKind::And | TokenKind::Or => Precedence::Logical,
            TokenKind::Equal | TokenKind::NotEqual => Precedence::Equality,
            TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEqual
            | TokenKind::GreaterEqual => Precedence::Relational,
            TokenKind::Pipe => Precedence::Pipe,
            TokenKind::Plus | TokenKind::Minus => Precedence::Additive,
            TokenKind::ShiftLeft | TokenKind::ShiftRight => Precedence::Shift,
            TokenKind::Star | TokenKind::Slash => Precedence::Multiplicative,
            TokenKind::Percent => Precedence::Modulo,
            TokenKind::LeftParen | TokenKind::Increment | TokenKind::Decrement => {
                Precedence::Call
            }
            TokenKind::LeftBracket | TokenKind::Dot | TokenKind::Arrow | TokenKind::DoubleColon => {
                Precedence::Member
            }
            _ => Precedence::Lowest,
        }
    }
}

fn infix_operator(kind: &TokenKind) -> Option<InfixOp> {
    let op = match kind {
        TokenKind::Plus => InfixOp::Add,
        TokenKind::Minus => InfixOp::Subtract,
        TokenKind::Star => InfixOp::Multiply,
        TokenKind::Slash => InfixOp::Divide,
        TokenKind::Percent => InfixOp::Modulo,
        TokenKind::Equal => InfixOp::Equal,
        TokenKind::NotEqual => InfixOp::NotEqual,
        TokenKind::Less => InfixOp::Less,
        TokenKind::Greater => InfixOp::Greater,
        TokenKind::LessEqual => InfixOp::LessEqual,
        TokenKind::GreaterEqual => InfixOp::GreaterEqual,
        TokenKind::And => InfixOp::And,
        TokenKind::Or => InfixOp::Or,
        TokenKind::NullCoalesce => InfixOp::NullCoalesce,
        TokenKind::ShiftLeft => InfixOp::ShiftLeft,
        TokenKind::ShiftRight => InfixOp::ShiftRight,
        TokenKind::Pipe => InfixOp::Pipe,
        _ => return None,
    };
    Some(op)
}

//=============================================/*
//  Order mirrors the language reference: assignment binds loosest,
//  member access tightest.
//============================================*/
//=============================================
//            Section 2: Expression Entry
//=============================================

impl Parser {
    //Function: parse_expression
    //Purpose: Parse an expression whose operators bind tighter than `precedence`
    //Inputs: precedence: Precedence
    //Returns: Result<Expr, ParseError>
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> Result<Expr, ParseError> {
        if self.expr_depth >= MAX_EXPRESSION_DEPTH {
            return Err(ParseError::InvalidSyntax {
                message: "expression nesting too deep".to_string(),
                position: self.current_position(),
            });
        }
        self.expr_depth += 1;
        let result = self.parse_precedence(precedence);
        self.expr_depth -= 1;
        result
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;
        while precedence < Precedence::of(&self.peek().kind) {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    //=============================================
    //            Section 3: Prefix Parselets
    //=============================================
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        if matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) {
            return Err(self.no_prefix_parse());
        }

        let token = self.advance();
        match token.kind {
            TokenKind::Integer(value) => Ok(Expr::Integer(value)),
            TokenKind::Float(value) => Ok(Expr::Float(value)),
            TokenKind::String(value) => Ok(Expr::Str(value)),
            TokenKind::True => Ok(Expr::Boolean(true)),
            TokenKind::False => Ok(Expr::Boolean(false)),
            TokenKind::Nil => Ok(Expr::Nil),
            TokenKind::Identifier(name) => Ok(Expr::Identifier(name)),
            TokenKind::This => Ok(Expr::This),
            TokenKind::Echo => Ok(Expr::Identifier("echo".into())),
            TokenKind::Print => Ok(Expr::Identifier("print".into())),
            TokenKind::Var => self.parse_variable(),
            TokenKind::Bang => self.parse_prefix_operator(PrefixOp::Not),
            TokenKind::Minus => self.parse_prefix_operator(PrefixOp::Negate),
            TokenKind::LeftParen => {
                self.skip_newlines();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.skip_newlines();
                self.consume(TokenKind::RightParen, ")")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_brace_expression(),
            TokenKind::New => self.parse_new_expression(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::Isset => {
                let arguments = self.parse_call_arguments()?;
                Ok(Expr::Isset(arguments))
            }
            TokenKind::Empty => {
                self.consume(TokenKind::LeftParen, "(")?;
                let operand = self.parse_expression(Precedence::Lowest)?;
                self.consume(TokenKind::RightParen, ")")?;
                Ok(Expr::Empty(Box::new(operand)))
            }
            found => Err(ParseError::NoPrefixParse {
                found,
                position: token.position,
            }),
        }
    }

    fn no_prefix_parse(&self) -> ParseError {
        let token = self.peek();
        ParseError::NoPrefixParse {
            found: token.kind.clone(),
            position: token.position,
        }
    }

    /// Glue `$` and the following name into one identifier.
    fn parse_variable(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::This) {
            self.advance();
            return Ok(Expr::This);
        }
        let name = self.consume_name("variable name after $")?;
        Ok(Expr::Identifier(name))
    }

    fn parse_prefix_operator(&mut self, operator: PrefixOp) -> Result<Expr, ParseError> {
        let operand = self.parse_expression(Precedence::Prefix)?;
        Ok(Expr::Prefix {
            operator,
            operand: Box::new(operand),
        })
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RightBracket) {
                self.advance();
                return Ok(Expr::Array(elements));
            }
            elements.push(self.parse_expression(Precedence::Lowest)?);
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RightBracket) {
                return Err(self.unexpected(", or ]"));
            }
        }
    }

    fn parse_new_expression(&mut self) -> Result<Expr, ParseError> {
        let class = self.consume_name("class name after new")?;
        let arguments = if self.check(&TokenKind::LeftParen) {
            self.parse_call_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New { class, arguments })
    }

    fn parse_function_literal(&mut self) -> Result<Expr, ParseError> {
        let name = match self.peek().kind {
            TokenKind::Identifier(_) => self.consume_name("function name")?,
            _ => "<anonymous>".to_string(),
        };
        let params = self.parse_parameters()?;
        let body = self.parse_block()?;
        Ok(Expr::Function(Arc::new(FunctionDecl {
            name,
            params,
            body: Some(body),
            is_init: false,
        })))
    }

    /// Parse `(a, b, ...)`; newlines are allowed between arguments.
    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.consume(TokenKind::LeftParen, "(")?;
        let mut arguments = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RightParen) {
                self.advance();
                return Ok(arguments);
            }
            arguments.push(self.parse_expression(Precedence::Lowest)?);
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RightParen) {
                return Err(self.unexpected(", or )"));
            }
        }
    }

    //=============================================
    //            Section 4: Brace Resolution
    //=============================================
    //Function: parse_brace_expression
    //Purpose: Decide whether `{` opens a map literal or a block expression
    //Inputs: &mut self (opening brace already consumed)
    //Returns: Result<Expr, ParseError> (Expr::Map or Expr::Block)
    pub(crate) fn parse_brace_expression(&mut self) -> Result<Expr, ParseError> {
        self.skip_newlines();
        if self.check(&TokenKind::RightBrace) {
            self.advance();
            return Ok(Expr::Map(Vec::new()));
        }

        let bare_key = matches!(self.peek().kind, TokenKind::Identifier(_));
        let first = self.parse_statement_body()?;
        let first = match first {
            Stmt::Expression(expr) if self.check(&TokenKind::Colon) => {
                return self.parse_map_rest(map_key(expr, bare_key));
            }
            other => other,
        };

        self.finish_statement(&first)?;
        let statements = self.parse_block_rest(vec![first])?;
        Ok(Expr::Block(statements))
    }

    /// Continue a map literal whose first key is already parsed.
    fn parse_map_rest(&mut self, first_key: Expr) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();
        let mut key = first_key;
        loop {
            self.consume(TokenKind::Colon, ":")?;
            self.skip_newlines();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            }
            if self.check(&TokenKind::RightBrace) {
                self.advance();
                return Ok(Expr::Map(pairs));
            }
            if self.is_at_end() {
                return Err(self.unexpected("}"));
            }

            let bare_key = matches!(self.peek().kind, TokenKind::Identifier(_));
            let parsed = self.parse_expression(Precedence::Lowest)?;
            key = map_key(parsed, bare_key);
        }
    }

    //=============================================
    //            Section 5: Infix Parselets
    //=============================================
    fn parse_infix(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Assign => {
                ensure_assignable(&left, &token.position, "assignment")?;
                self.skip_newlines();
                let value = self.parse_expression(Precedence::Lowest)?;
                Ok(Expr::Assign {
                    target: Box::new(left),
                    value: Box::new(value),
                })
            }
            TokenKind::Question => self.parse_ternary(left),
            TokenKind::LeftParen => {
                self.current -= 1;
                let arguments = self.parse_call_arguments()?;
                Ok(Expr::Call {
                    function: Box::new(left),
                    arguments,
                })
            }
            TokenKind::LeftBracket => {
                self.skip_newlines();
                let index = if self.check(&TokenKind::RightBracket) {
                    None
                } else {
                    Some(Box::new(self.parse_expression(Precedence::Lowest)?))
                };
                self.skip_newlines();
                self.consume(TokenKind::RightBracket, "]")?;
                Ok(Expr::Index {
                    target: Box::new(left),
                    index,
                })
            }
            TokenKind::Dot | TokenKind::Arrow | TokenKind::DoubleColon => {
                let access = match token.kind {
                    TokenKind::Dot => MemberAccess::Dot,
                    TokenKind::Arrow => MemberAccess::Arrow,
                    _ => MemberAccess::Static,
                };
                let property = self.consume_name("member name")?;
                Ok(Expr::Member {
                    object: Box::new(left),
                    property,
                    access,
                })
            }
            TokenKind::Increment | TokenKind::Decrement => {
                ensure_assignable(&left, &token.position, "postfix operator")?;
                let operator = if token.kind == TokenKind::Increment {
                    PostfixOp::Increment
                } else {
                    PostfixOp::Decrement
                };
                Ok(Expr::Postfix {
                    operand: Box::new(left),
                    operator,
                })
            }
            kind => {
                let Some(operator) = infix_operator(kind) else {
                    return Err(ParseError::UnexpectedToken {
                        expected: "operator".to_string(),
                        found: token.kind.clone(),
                        position: token.position,
                    });
                };
                let precedence = Precedence::of(kind);
                self.skip_newlines();
                let right = self.parse_expression(precedence)?;
                Ok(Expr::Infix {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            }
        }
    }

    /// `cond ? a : b`, `cond ? { ... } : { ... }` and `cond ?: b`
    fn parse_ternary(&mut self, condition: Expr) -> Result<Expr, ParseError> {
        let consequence = if self.check(&TokenKind::Colon) {
            None
        } else {
            let branch = self.parse_ternary_branch()?;
            self.skip_newlines();
            Some(branch)
        };
        self.consume(TokenKind::Colon, ":")?;
        let alternative = self.parse_ternary_branch()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_ternary_branch(&mut self) -> Result<Block, ParseError> {
        self.skip_newlines();
        if self.check(&TokenKind::LeftBrace) {
            self.advance();
            return match self.parse_brace_expression()? {
                Expr::Block(statements) => Ok(statements),
                other => Ok(vec![Stmt::Expression(other)]),
            };
        }
        let expr = self.parse_expression(Precedence::Lowest)?;
        Ok(vec![Stmt::Expression(expr)])
    }
}

/// A bare identifier used as a map key names itself.
fn map_key(expr: Expr, bare: bool) -> Expr {
    match expr {
        Expr::Identifier(name) if bare => Expr::Str(name),
        other => other,
    }
}

fn ensure_assignable(
    target: &Expr,
    position: &crate::tokenizer::Position,
    context: &str,
) -> Result<(), ParseError> {
    match target {
        Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. } => Ok(()),
        _ => Err(ParseError::InvalidSyntax {
            message: format!("invalid target for {}", context),
            position: *position,
        }),
    }
}

//=============================================/*
//  `{}` is an empty map, `{k: v}` a map, anything else a block expression.
//============================================*/

#[cfg(test)]
mod tests {
    use super::super::parse_source;
    use crate::ast::{Expr, InfixOp, Stmt};

    fn single_expression(source: &str) -> Expr {
        let program = parse_source(source).expect("parses");
        match program.statements.into_iter().next() {
            Some(Stmt::Expression(expr)) => expr,
            other => panic!("expected expression statement, found {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match single_expression("1 + 2 * 3") {
            Expr::Infix {
                operator: InfixOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Infix {
                    operator: InfixOp::Multiply,
                    ..
                }
            )),
            other => panic!("expected addition at root, found {other:?}"),
        }
    }

    #[test]
    fn modulo_binds_tighter_than_multiplication() {
        match single_expression("4 * 5 % 3") {
            Expr::Infix {
                operator: InfixOp::Multiply,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Infix {
                    operator: InfixOp::Modulo,
                    ..
                }
            )),
            other => panic!("expected multiplication at root, found {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        match single_expression("$a = $b = 3") {
            Expr::Assign { value, .. } => assert!(matches!(*value, Expr::Assign { .. })),
            other => panic!("expected assignment, found {other:?}"),
        }
    }

    #[test]
    fn append_slot_has_no_index() {
        match single_expression("$list[] = 4") {
            Expr::Assign { target, .. } => {
                assert!(matches!(*target, Expr::Index { index: None, .. }))
            }
            other => panic!("expected assignment, found {other:?}"),
        }
    }

    #[test]
    fn elvis_form_has_no_consequence() {
        match single_expression("$name ?: \"guest\"") {
            Expr::Ternary { consequence, .. } => assert!(consequence.is_none()),
            other => panic!("expected ternary, found {other:?}"),
        }
    }
}
