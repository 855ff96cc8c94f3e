//=============================================
// joss/parser/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss statement parser
// Objective: Transform token streams into AST nodes consumed by the interpreter,
//            collecting diagnostics instead of stopping at the first one
// Formatting: Zobie.format (.solvraformat)
//=============================================

//=============================================
//            Section 1: Imports
//=============================================

mod expressions;

use std::fmt;
use std::sync::Arc;

use crate::ast::{
    Block, ClassDecl, Expr, FunctionDecl, Parameter, Program, PropertyDecl, Stmt, SwitchCase,
};
use crate::tokenizer::{Position, Token, TokenKind, Tokenizer};

pub use expressions::Precedence;

//=============================================
//            Section 2: Parse Errors
//=============================================

/// Parser error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },
    UnexpectedEndOfInput {
        expected: String,
        position: Position,
    },
    NoPrefixParse {
        found: TokenKind,
        position: Position,
    },
    InvalidSyntax {
        message: String,
        position: Position,
    },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEndOfInput { position, .. }
            | ParseError::NoPrefixParse { position, .. }
            | ParseError::InvalidSyntax { position, .. } => *position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                position,
            } => write!(
                f,
                "expected next token to be {}, got {} instead at line {}, column {}",
                expected, found, position.line, position.column
            ),
            ParseError::UnexpectedEndOfInput { expected, position } => write!(
                f,
                "unexpected end of input, expected {} at line {}, column {}",
                expected, position.line, position.column
            ),
            ParseError::NoPrefixParse { found, position } => write!(
                f,
                "no prefix parse function for {} found at line {}, column {}",
                found, position.line, position.column
            ),
            ParseError::InvalidSyntax { message, position } => write!(
                f,
                "invalid syntax: {} at line {}, column {}",
                message, position.line, position.column
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Every diagnostic collected while parsing one source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

//=============================================/*
//  Diagnostics carry token positions; a program with any of them is never run.
//============================================*/
//=============================================
//            Section 3: Parser State
//=============================================

/// Single-pass, error-collecting parser for Joss
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    expr_depth: usize,
    errors: Vec<ParseError>,
}

const MAX_EXPRESSION_DEPTH: usize = 512;

/// Tokenize and parse `source`, returning the program or every collected error.
pub fn parse_source(source: &str) -> Result<Program, ParseErrors> {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(ParseErrors(parser.errors))
    }
}

impl Parser {
    //Function: new
    //Purpose: Initialize parser with token stream and reset cursor
    //Inputs: tokens: Vec<Token>
    //Returns: Self
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, position));
        }
        Self {
            tokens,
            current: 0,
            expr_depth: 0,
            errors: Vec::new(),
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Tokenizer::new(source).tokenize())
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    //=============================================
    //            Section 4: Token Navigation
    //=============================================
    fn peek(&self) -> &Token {
        let index = self.current.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn peek_next(&self) -> &Token {
        let index = (self.current + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn current_position(&self) -> Position {
        self.peek().position
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        Err(self.unexpected(expected))
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if matches!(token.kind, TokenKind::Eof) {
            ParseError::UnexpectedEndOfInput {
                expected: expected.to_string(),
                position: token.position,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.clone(),
                position: token.position,
            }
        }
    }

    /// Accept an identifier, or a keyword spelled where a name is expected
    /// (`$class`, `$obj.new`, `Router::match`).
    fn consume_name(&mut self, expected: &str) -> Result<String, ParseError> {
        let name = match &self.peek().kind {
            TokenKind::Identifier(name) => name.clone(),
            other => match other.keyword_text() {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected(expected)),
            },
        };
        self.advance();
        Ok(name)
    }

    /// `$name`
    fn consume_variable(&mut self, expected: &str) -> Result<String, ParseError> {
        self.consume(TokenKind::Var, expected)?;
        self.consume_name(expected)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn consume_statement_terminator(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Semicolon | TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::RightBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn finish_statement(&mut self, stmt: &Stmt) -> Result<(), ParseError> {
        if is_simple_statement(stmt) {
            self.consume_statement_terminator()
        } else {
            if self.check(&TokenKind::Semicolon) {
                self.advance();
            }
            Ok(())
        }
    }

    /// Skip to the next statement boundary after a diagnostic.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            let token = self.advance();
            if matches!(token.kind, TokenKind::Newline | TokenKind::Semicolon) {
                return;
            }
        }
    }

    //=============================================
    //            Section 5: Statement Parsing
    //=============================================
    //Function: parse_program
    //Purpose: Consume every token, collecting statements and diagnostics
    //Inputs: &mut self
    //Returns: Program (check errors() before executing it)
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        Program::new(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_statement_body()?;
        self.finish_statement(&stmt)?;
        Ok(stmt)
    }

    /// Parse one statement without its terminator, so the brace resolver can
    /// look at the token that follows a bare expression.
    fn parse_statement_body(&mut self) -> Result<Stmt, ParseError> {
        match &self.peek().kind {
            TokenKind::Class => self.parse_class_statement(),
            TokenKind::Init => {
                let decl = self.parse_function_declaration()?;
                Ok(Stmt::Function(Arc::new(decl)))
            }
            TokenKind::Function
                if matches!(self.peek_next().kind, TokenKind::Identifier(_)) =>
            {
                let decl = self.parse_function_declaration()?;
                Ok(Stmt::Function(Arc::new(decl)))
            }
            TokenKind::Foreach => self.parse_foreach_statement(),
            TokenKind::Import => self.parse_import_statement(),
            TokenKind::Namespace => self.parse_namespace_statement(),
            TokenKind::Echo | TokenKind::Print
                if !matches!(self.peek_next().kind, TokenKind::LeftParen) =>
            {
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                Ok(Stmt::Echo(value))
            }
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                Ok(Stmt::Throw(value))
            }
            TokenKind::Return => {
                self.advance();
                if self.at_statement_end() {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.parse_expression(Precedence::Lowest)?)))
                }
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            TokenKind::Identifier(_) if matches!(self.peek_next().kind, TokenKind::Var) => {
                self.parse_let_statement()
            }
            _ => Ok(Stmt::Expression(self.parse_expression(Precedence::Lowest)?)),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        )
    }

    /// Parse a typed declaration: `TYPE $name [= expr]`
    fn parse_let_statement(&mut self) -> Result<Stmt, ParseError> {
        let type_name = self.consume_name("type name")?;
        let name = self.consume_variable("variable name")?;
        let value = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression(Precedence::Lowest)?)
        } else {
            None
        };
        Ok(Stmt::Let {
            type_name,
            name,
            value,
        })
    }

    /// Parse `{ statements }`
    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.skip_newlines();
        self.consume(TokenKind::LeftBrace, "{")?;
        self.parse_block_rest(Vec::new())
    }

    /// Parse statements up to and including the closing brace.
    fn parse_block_rest(&mut self, mut statements: Block) -> Result<Block, ParseError> {
        loop {
            self.skip_separators();
            match self.peek().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    return Ok(statements);
                }
                TokenKind::Eof => return Err(self.unexpected("}")),
                _ => statements.push(self.parse_statement()?),
            }
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr, ParseError> {
        self.consume(TokenKind::LeftParen, "(")?;
        self.skip_newlines();
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.skip_newlines();
        self.consume(TokenKind::RightParen, ")")?;
        Ok(expr)
    }

    //=============================================
    //            Section 6: Declarations
    //=============================================
    /// Parse `class Name [extends Parent] { members }`
    fn parse_class_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Class, "class")?;
        let name = self.consume_name("class name")?;
        let parent = if self.check(&TokenKind::Extends) {
            self.advance();
            Some(self.consume_name("superclass name")?)
        } else {
            None
        };

        self.skip_newlines();
        self.consume(TokenKind::LeftBrace, "{")?;

        let mut decl = ClassDecl {
            name,
            parent,
            properties: Vec::new(),
            methods: Vec::new(),
        };

        loop {
            self.skip_separators();
            match &self.peek().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => return Err(self.unexpected("}")),
                TokenKind::Function | TokenKind::Init => {
                    let method = self.parse_function_declaration()?;
                    decl.methods.push(Arc::new(method));
                }
                TokenKind::Identifier(word) if is_member_modifier(word) => {
                    self.advance();
                }
                TokenKind::Identifier(_) if matches!(self.peek_next().kind, TokenKind::Var) => {
                    let type_name = self.consume_name("type name")?;
                    let property = self.parse_property(Some(type_name))?;
                    decl.properties.push(property);
                }
                TokenKind::Var => {
                    let property = self.parse_property(None)?;
                    decl.properties.push(property);
                }
                _ => return Err(self.unexpected("method, Init or property declaration")),
            }
        }

        Ok(Stmt::Class(Arc::new(decl)))
    }

    fn parse_property(&mut self, type_name: Option<String>) -> Result<PropertyDecl, ParseError> {
        let name = self.consume_variable("property name")?;
        let default = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression(Precedence::Lowest)?)
        } else {
            None
        };
        self.consume_statement_terminator()?;
        Ok(PropertyDecl {
            name,
            type_name,
            default,
        })
    }

    //Function: parse_function_declaration
    //Purpose: Parse `function name(params) {}` or `Init name(params) {}`
    //Inputs: &mut self (positioned on `function` or `Init`)
    //Returns: Result<FunctionDecl, ParseError>
    fn parse_function_declaration(&mut self) -> Result<FunctionDecl, ParseError> {
        let is_init = self.check(&TokenKind::Init);
        self.advance();

        let name = if is_init && self.check(&TokenKind::LeftParen) {
            "constructor".to_string()
        } else {
            self.consume_name("function name")?
        };

        let params = self.parse_parameters()?;
        let body = self.parse_block()?;

        Ok(FunctionDecl {
            name,
            params,
            body: Some(body),
            is_init,
        })
    }

    /// Parse `($a, int $b)`
    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, ParseError> {
        self.consume(TokenKind::LeftParen, "(")?;
        let mut params = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RightParen) {
                self.advance();
                return Ok(params);
            }
            if !params.is_empty() {
                self.consume(TokenKind::Comma, ",")?;
                self.skip_newlines();
            }
            let type_name = match self.peek().kind {
                TokenKind::Identifier(_) => Some(self.consume_name("parameter type")?),
                _ => None,
            };
            let name = self.consume_variable("parameter name")?;
            params.push(Parameter { name, type_name });
        }
    }

    //=============================================
    //            Section 7: Control Statements
    //=============================================
    /// Parse `foreach (expr as $v)` or `foreach (expr as $k => $v)`
    fn parse_foreach_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Foreach, "foreach")?;
        self.consume(TokenKind::LeftParen, "(")?;
        let iterable = self.parse_expression(Precedence::Lowest)?;
        self.consume(TokenKind::As, "as")?;
        let first = self.consume_variable("loop variable")?;
        let (key, value) = if self.check(&TokenKind::FatArrow) {
            self.advance();
            let value = self.consume_variable("loop value variable")?;
            (Some(first), value)
        } else {
            (None, first)
        };
        self.consume(TokenKind::RightParen, ")")?;
        let body = self.parse_block()?;
        Ok(Stmt::Foreach {
            iterable,
            key,
            value,
            body,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::While, "while")?;
        let condition = self.parse_parenthesized()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Do, "do")?;
        let body = self.parse_block()?;
        self.skip_newlines();
        self.consume(TokenKind::While, "while")?;
        let condition = self.parse_parenthesized()?;
        Ok(Stmt::DoWhile { body, condition })
    }

    /// Parse `try {} catch ($e) {}`
    fn parse_try_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Try, "try")?;
        let body = self.parse_block()?;
        self.skip_newlines();
        self.consume(TokenKind::Catch, "catch")?;
        self.consume(TokenKind::LeftParen, "(")?;
        if self.check(&TokenKind::Var) {
            self.advance();
        }
        let catch_var = self.consume_name("catch variable")?;
        self.consume(TokenKind::RightParen, ")")?;
        let handler = self.parse_block()?;
        Ok(Stmt::TryCatch {
            body,
            catch_var,
            handler,
        })
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::If, "if")?;
        let condition = self.parse_parenthesized()?;
        let consequence = self.parse_block()?;

        let checkpoint = self.current;
        self.skip_newlines();
        let alternative = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                Some(vec![self.parse_if_statement()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            self.current = checkpoint;
            None
        };

        Ok(Stmt::If {
            condition,
            consequence,
            alternative,
        })
    }

    /// Parse `switch (expr) { case v: ... default: ... }`
    fn parse_switch_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Switch, "switch")?;
        let subject = self.parse_parenthesized()?;
        self.skip_newlines();
        self.consume(TokenKind::LeftBrace, "{")?;

        let mut cases = Vec::new();
        let mut default = None;
        loop {
            self.skip_separators();
            match self.peek().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Case => {
                    self.advance();
                    let value = self.parse_expression(Precedence::Lowest)?;
                    self.consume(TokenKind::Colon, ":")?;
                    let body = self.parse_case_body()?;
                    cases.push(SwitchCase { value, body });
                }
                TokenKind::Default => {
                    self.advance();
                    self.consume(TokenKind::Colon, ":")?;
                    default = Some(self.parse_case_body()?);
                }
                _ => return Err(self.unexpected("case, default or }")),
            }
        }

        Ok(Stmt::Switch {
            subject,
            cases,
            default,
        })
    }

    fn parse_case_body(&mut self) -> Result<Block, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            match self.peek().kind {
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace => return Ok(body),
                TokenKind::Eof => return Err(self.unexpected("}")),
                _ => body.push(self.parse_statement()?),
            }
        }
    }

    /// Parse `Import "path"`
    fn parse_import_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Import, "Import")?;
        match self.peek().kind.clone() {
            TokenKind::String(path) => {
                self.advance();
                Ok(Stmt::Import(path))
            }
            _ => Err(self.unexpected("import path string")),
        }
    }

    fn parse_namespace_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::Namespace, "Namespace")?;
        let mut name = String::new();
        while !self.at_statement_end() {
            name.push_str(&self.advance().kind.to_string());
        }
        Ok(Stmt::Namespace(name))
    }
}

fn is_simple_statement(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Let { .. }
            | Stmt::Throw(_)
            | Stmt::Return(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Import(_)
            | Stmt::Namespace(_)
            | Stmt::Echo(_)
            | Stmt::Expression(_)
            | Stmt::DoWhile { .. }
    )
}

fn is_member_modifier(word: &str) -> bool {
    matches!(word, "public" | "private" | "protected" | "static")
}

//=============================================/*
//  Statements dispatch on their leading keyword; expression parsing and the
//  brace resolver live in expressions.rs.
//============================================*/
