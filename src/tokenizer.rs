//=============================================
// joss/tokenizer.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss lexical analysis
// Objective: Turn Joss source text into an on-demand stream of positioned tokens
//=============================================

//=============================================
//            Section 1: Token Types
//=============================================

use std::collections::HashMap;
use std::fmt;

/// Represents the position of a token in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

/// All token types produced by the Joss lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Illegal(String),

    // Keywords
    True,
    False,
    Nil,
    Return,
    Class,
    Init,
    Namespace,
    Import,
    New,
    Foreach,
    As,
    Function,
    This,
    Echo,
    Print,
    Isset,
    Empty,
    While,
    Do,
    Try,
    Catch,
    Throw,
    Extends,
    Break,
    Continue,
    If,
    Else,
    Switch,
    Case,
    Default,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    DoubleColon,
    Arrow,
    FatArrow,
    And,
    Or,
    NullCoalesce,
    Pipe,
    Increment,
    Decrement,
    Dot,
    Question,

    // Delimiters
    Comma,
    Semicolon,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Special
    Var,
    Newline,
    Eof,
}

impl TokenKind {
    /// Source spelling of keyword tokens, used when a keyword appears after `$`.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::Return => "return",
            TokenKind::Class => "class",
            TokenKind::Init => "Init",
            TokenKind::Namespace => "Namespace",
            TokenKind::Import => "import",
            TokenKind::New => "new",
            TokenKind::Foreach => "foreach",
            TokenKind::As => "as",
            TokenKind::Function => "function",
            TokenKind::This => "this",
            TokenKind::Echo => "echo",
            TokenKind::Print => "print",
            TokenKind::Isset => "isset",
            TokenKind::Empty => "empty",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Throw => "throw",
            TokenKind::Extends => "extends",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "{}", text);
        }
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Illegal(s) => write!(f, "ILLEGAL({})", s),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Less => write!(f, "<"),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::Equal => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::ShiftLeft => write!(f, "<<"),
            TokenKind::ShiftRight => write!(f, ">>"),
            TokenKind::DoubleColon => write!(f, "::"),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::FatArrow => write!(f, "=>"),
            TokenKind::And => write!(f, "&&"),
            TokenKind::Or => write!(f, "||"),
            TokenKind::NullCoalesce => write!(f, "??"),
            TokenKind::Pipe => write!(f, "|>"),
            TokenKind::Increment => write!(f, "++"),
            TokenKind::Decrement => write!(f, "--"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Question => write!(f, "?"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Var => write!(f, "$"),
            TokenKind::Newline => write!(f, "NEWLINE"),
            TokenKind::Eof => write!(f, "EOF"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// A token with its kind and position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn line(&self) -> usize {
        self.position.line
    }
}

//=============================================/*
//  Token vocabulary shared by the lexer and the parser.
//============================================*/
//=============================================
//            Section 2: Tokenizer
//=============================================

/// On-demand lexer for Joss source text
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    keywords: HashMap<&'static str, TokenKind>,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("true", TokenKind::True);
        keywords.insert("false", TokenKind::False);
        keywords.insert("nil", TokenKind::Nil);
        keywords.insert("null", TokenKind::Nil);
        keywords.insert("return", TokenKind::Return);
        keywords.insert("class", TokenKind::Class);
        keywords.insert("Init", TokenKind::Init);
        keywords.insert("Namespace", TokenKind::Namespace);
        keywords.insert("Import", TokenKind::Import);
        keywords.insert("import", TokenKind::Import);
        keywords.insert("@import", TokenKind::Import);
        keywords.insert("new", TokenKind::New);
        keywords.insert("foreach", TokenKind::Foreach);
        keywords.insert("as", TokenKind::As);
        keywords.insert("function", TokenKind::Function);
        keywords.insert("func", TokenKind::Function);
        keywords.insert("this", TokenKind::This);
        keywords.insert("echo", TokenKind::Echo);
        keywords.insert("print", TokenKind::Print);
        keywords.insert("isset", TokenKind::Isset);
        keywords.insert("empty", TokenKind::Empty);
        keywords.insert("while", TokenKind::While);
        keywords.insert("do", TokenKind::Do);
        keywords.insert("try", TokenKind::Try);
        keywords.insert("catch", TokenKind::Catch);
        keywords.insert("throw", TokenKind::Throw);
        keywords.insert("extends", TokenKind::Extends);
        keywords.insert("break", TokenKind::Break);
        keywords.insert("continue", TokenKind::Continue);
        keywords.insert("if", TokenKind::If);
        keywords.insert("else", TokenKind::Else);
        keywords.insert("switch", TokenKind::Switch);
        keywords.insert("case", TokenKind::Case);
        keywords.insert("default", TokenKind::Default);

        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            keywords,
        }
    }

    /// Drain the whole input, ending with a single `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    //Function: next_token
    //Purpose: Scan and return the next token, advancing cursor and line counter
    //Inputs: &mut self
    //Returns: Token (Eof forever once input is exhausted)
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let start = self.current_position();

        if self.is_at_end() {
            return Token::new(TokenKind::Eof, start);
        }

        let ch = self.current_char();
        if ch == '\n' {
            self.advance();
            return Token::new(TokenKind::Newline, start);
        }
        if ch == '"' {
            return Token::new(self.read_string(), start);
        }
        if ch.is_ascii_digit() {
            return Token::new(self.read_number(), start);
        }
        if is_letter(ch) {
            return Token::new(self.read_identifier(), start);
        }

        Token::new(self.read_operator(), start)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.current_char();
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.position)
    }

    //=============================================
    //            Section 3: Scanners
    //=============================================
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char() {
                ' ' | '\t' | '\r' if !self.is_at_end() => {
                    self.advance();
                }
                '/' if self.peek_char() == Some('/') => self.skip_line_comment(),
                '#' if !self.is_at_end() => self.skip_line_comment(),
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn read_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut value = String::new();
        while !self.is_at_end() && self.current_char() != '"' {
            value.push(self.advance());
        }
        if !self.is_at_end() {
            self.advance(); // closing quote
        }
        TokenKind::String(value)
    }

    fn read_number(&mut self) -> TokenKind {
        let mut text = String::new();
        while self.current_char().is_ascii_digit() {
            text.push(self.advance());
        }

        let is_float = self.current_char() == '.'
            && self.peek_char().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            text.push(self.advance());
            while self.current_char().is_ascii_digit() {
                text.push(self.advance());
            }
            return match text.parse::<f64>() {
                Ok(value) => TokenKind::Float(value),
                Err(_) => TokenKind::Illegal(text),
            };
        }

        match text.parse::<i64>() {
            Ok(value) => TokenKind::Integer(value),
            Err(_) => TokenKind::Illegal(text),
        }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let mut text = String::new();
        while !self.is_at_end() {
            let ch = self.current_char();
            if is_letter(ch) || (!text.is_empty() && ch.is_ascii_digit()) {
                text.push(self.advance());
            } else {
                break;
            }
        }
        match self.keywords.get(text.as_str()) {
            Some(kind) => kind.clone(),
            None => TokenKind::Identifier(text),
        }
    }

    fn read_operator(&mut self) -> TokenKind {
        let ch = self.advance();
        let next = if self.is_at_end() {
            None
        } else {
            Some(self.current_char())
        };

        let paired = match (ch, next) {
            ('=', Some('=')) => Some(TokenKind::Equal),
            ('=', Some('>')) => Some(TokenKind::FatArrow),
            ('!', Some('=')) => Some(TokenKind::NotEqual),
            ('<', Some('=')) => Some(TokenKind::LessEqual),
            ('>', Some('=')) => Some(TokenKind::GreaterEqual),
            ('<', Some('<')) => Some(TokenKind::ShiftLeft),
            ('>', Some('>')) => Some(TokenKind::ShiftRight),
            (':', Some(':')) => Some(TokenKind::DoubleColon),
            ('-', Some('>')) => Some(TokenKind::Arrow),
            ('&', Some('&')) => Some(TokenKind::And),
            ('|', Some('|')) => Some(TokenKind::Or),
            ('|', Some('>')) => Some(TokenKind::Pipe),
            ('?', Some('?')) => Some(TokenKind::NullCoalesce),
            ('+', Some('+')) => Some(TokenKind::Increment),
            ('-', Some('-')) => Some(TokenKind::Decrement),
            _ => None,
        };
        if let Some(kind) = paired {
            self.advance();
            return kind;
        }

        match ch {
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Bang,
            '<' => TokenKind::Less,
            '>' => TokenKind::Greater,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '$' => TokenKind::Var,
            other => TokenKind::Illegal(other.to_string()),
        }
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '@'
}

//=============================================/*
//  Lexer never fails: unknown characters surface as Illegal tokens
//  and the parser turns them into diagnostics.
//============================================*/

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Tokenizer::new(source)
            .tokenize()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn splits_variable_sigil_from_name() {
        assert_eq!(
            kinds("$count = 10"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("count".into()),
                TokenKind::Assign,
                TokenKind::Integer(10),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_two_character_operators() {
        assert_eq!(
            kinds("== != <= >= << >> :: -> |> ?? && || ++"),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::DoubleColon,
                TokenKind::Arrow,
                TokenKind::Pipe,
                TokenKind::NullCoalesce,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Increment,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn promotes_digits_followed_by_fraction_to_float() {
        assert_eq!(
            kinds("3.25 7 8."),
            vec![
                TokenKind::Float(3.25),
                TokenKind::Integer(7),
                TokenKind::Integer(8),
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_have_no_escapes_and_may_run_to_eof() {
        assert_eq!(
            kinds(r#""a\n" "open"#),
            vec![
                TokenKind::String("a\\n".into()),
                TokenKind::String("open".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newlines_are_tokens_and_bump_line_counter() {
        let tokens = Tokenizer::new("echo 1 // note\necho 2").tokenize();
        let newline = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Newline)
            .expect("newline token");
        assert_eq!(newline.line(), 1);
        let last_echo = tokens
            .iter()
            .rev()
            .find(|token| token.kind == TokenKind::Echo)
            .expect("echo token");
        assert_eq!(last_echo.line(), 2);
    }

    #[test]
    fn import_spellings_share_one_keyword() {
        assert_eq!(
            kinds("Import import @import"),
            vec![
                TokenKind::Import,
                TokenKind::Import,
                TokenKind::Import,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unknown_characters_become_illegal() {
        assert_eq!(
            kinds("^"),
            vec![TokenKind::Illegal("^".into()), TokenKind::Eof]
        );
    }
}
