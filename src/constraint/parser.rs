//! Lexer and recursive-descent parser for schema fragments.
//!
//! A fragment is an optional `package <name>` clause followed by a sequence
//! of declarations. The file root is an open struct; struct literals inside
//! the file are closed unless they contain a `...` ellipsis.

use std::collections::BTreeMap;

use super::unify::unify;
use super::value::{Attribute, Field, ListVal, StructVal, TypeKind, Value};
use super::ConstraintError;

/// A parsed fragment file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Build-unit name from the `package` clause, if any.
    pub package: Option<String>,
    /// Top-level declarations, as an open struct.
    pub root: StructVal,
}

/// Parse one fragment file.
pub fn parse_fragment(src: &str) -> Result<SourceFile, ConstraintError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_file()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Pipe,
    Question,
    Ellipsis,
    Attr(String, String),
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("`{name}`"),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Int(_) | Tok::Float(_) => "number literal".to_string(),
            Tok::LBrace => "`{`".to_string(),
            Tok::RBrace => "`}`".to_string(),
            Tok::LBracket => "`[`".to_string(),
            Tok::RBracket => "`]`".to_string(),
            Tok::Colon => "`:`".to_string(),
            Tok::Comma => "`,`".to_string(),
            Tok::Pipe => "`|`".to_string(),
            Tok::Question => "`?`".to_string(),
            Tok::Ellipsis => "`...`".to_string(),
            Tok::Attr(name, _) => format!("`@{name}(...)`"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

fn lex(src: &str) -> Result<Vec<Token>, ConstraintError> {
    let mut lexer = Lexer {
        src: src.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn error(&self, message: impl Into<String>) -> ConstraintError {
        ConstraintError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ConstraintError> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') => {
                    if self.src.get(self.pos + 1) != Some(&b'/') {
                        return Err(self.error("unexpected character `/`"));
                    }
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ConstraintError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let Some(b) = self.peek() else {
            return Ok(None);
        };
        let tok = match b {
            b'{' => {
                self.bump();
                Tok::LBrace
            }
            b'}' => {
                self.bump();
                Tok::RBrace
            }
            b'[' => {
                self.bump();
                Tok::LBracket
            }
            b']' => {
                self.bump();
                Tok::RBracket
            }
            b':' => {
                self.bump();
                Tok::Colon
            }
            b',' => {
                self.bump();
                Tok::Comma
            }
            b'|' => {
                self.bump();
                Tok::Pipe
            }
            b'?' => {
                self.bump();
                Tok::Question
            }
            b'.' => {
                self.bump();
                for _ in 0..2 {
                    if self.peek() != Some(b'.') {
                        return Err(self.error("expected `...`"));
                    }
                    self.bump();
                }
                Tok::Ellipsis
            }
            b'"' => self.lex_string()?,
            b'@' => self.lex_attribute()?,
            b'-' | b'0'..=b'9' => self.lex_number()?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'#' => self.lex_ident(),
            other => return Err(self.error(format!("unexpected character `{}`", other as char))),
        };
        Ok(Some(Token { tok, line, column }))
    }

    fn lex_ident(&mut self) -> Tok {
        let start = self.pos;
        if self.peek() == Some(b'#') {
            self.bump();
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        Tok::Ident(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn lex_number(&mut self) -> Result<Tok, ConstraintError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    self.bump();
                }
                b'.' if self.src.get(self.pos + 1).is_some_and(u8::is_ascii_digit) => {
                    is_float = true;
                    self.bump();
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]);
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("invalid number `{text}`")))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.error(format!("invalid number `{text}`")))
        }
    }

    fn lex_string(&mut self) -> Result<Tok, ConstraintError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => return Err(self.error("unterminated string literal")),
                Some(b'"') => return Ok(Tok::Str(out)),
                Some(b'\\') => match self.bump() {
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'/') => out.push('/'),
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    other => {
                        let shown = other.map(|b| b as char).unwrap_or(' ');
                        return Err(self.error(format!("unsupported escape `\\{shown}`")));
                    }
                },
                Some(other) => out.push(other as char),
            }
        }
    }

    fn lex_attribute(&mut self) -> Result<Tok, ConstraintError> {
        self.bump(); // `@`
        let Tok::Ident(name) = self.lex_ident() else {
            unreachable!("lex_ident always returns Tok::Ident")
        };
        if name.is_empty() || name.starts_with('#') {
            return Err(self.error("expected attribute name after `@`"));
        }
        if self.peek() != Some(b'(') {
            return Err(self.error(format!("expected `(` after `@{name}`")));
        }
        self.bump();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b')' {
                let body = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.bump();
                return Ok(Tok::Attr(name, body));
            }
            self.bump();
        }
        Err(self.error(format!("unterminated attribute `@{name}(`")))
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek().map(|t| &t.tok) == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ConstraintError {
        let (line, column) = self
            .peek()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        ConstraintError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn parse_file(&mut self) -> Result<SourceFile, ConstraintError> {
        let package = self.parse_package_clause();
        let mut root = StructVal::open();
        while self.peek().is_some() {
            self.parse_decl_into(&mut root)?;
        }
        Ok(SourceFile { package, root })
    }

    /// `package <ident>` at the top of the file. `package: ...` is an
    /// ordinary declaration, so a following `:` disqualifies the clause.
    fn parse_package_clause(&mut self) -> Option<String> {
        let [first, second] = [self.tokens.first()?, self.tokens.get(1)?];
        if first.tok != Tok::Ident("package".to_string()) {
            return None;
        }
        match &second.tok {
            Tok::Ident(name) if !name.starts_with('#') => {
                let name = name.clone();
                self.pos += 2;
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_decl_into(&mut self, target: &mut StructVal) -> Result<(), ConstraintError> {
        let label = match self.bump() {
            Some(Token {
                tok: Tok::Ident(name),
                line,
                column,
            }) => {
                if name == "_" || name == "#" {
                    return Err(ConstraintError::Syntax {
                        line,
                        column,
                        message: format!("`{name}` is not a valid label"),
                    });
                }
                name
            }
            Some(Token {
                tok: Tok::Str(name),
                ..
            }) => name,
            Some(token) => {
                return Err(ConstraintError::Syntax {
                    line: token.line,
                    column: token.column,
                    message: format!("expected field label, found {}", token.tok.describe()),
                })
            }
            None => return Err(self.error_here("expected field label")),
        };
        let optional = self.eat(&Tok::Question);
        if !self.eat(&Tok::Colon) {
            return Err(self.error_here(format!("expected `:` after label `{label}`")));
        }
        let value = self.parse_expr()?;
        let mut attributes = Vec::new();
        while let Some(Token {
            tok: Tok::Attr(..), ..
        }) = self.peek()
        {
            if let Some(Token {
                tok: Tok::Attr(name, body),
                ..
            }) = self.bump()
            {
                attributes.push(Attribute { name, body });
            }
        }
        self.eat(&Tok::Comma);

        let definition = label.starts_with('#');
        let hidden = !definition && label.starts_with('_');
        let field = Field {
            value,
            optional,
            hidden,
            definition,
            attributes,
        };
        insert_field(&mut target.fields, label, field)
    }

    fn parse_expr(&mut self) -> Result<Value, ConstraintError> {
        let first = self.parse_term()?;
        if self.peek().map(|t| &t.tok) != Some(&Tok::Pipe) {
            return Ok(first);
        }
        let mut alternatives = vec![first];
        while self.eat(&Tok::Pipe) {
            alternatives.push(self.parse_term()?);
        }
        Ok(Value::Disjunction(alternatives))
    }

    fn parse_term(&mut self) -> Result<Value, ConstraintError> {
        let Some(token) = self.bump() else {
            return Err(self.error_here("expected expression"));
        };
        match token.tok {
            Tok::Str(s) => Ok(Value::String(s)),
            Tok::Int(i) => Ok(Value::Int(i)),
            Tok::Float(f) => Ok(Value::Float(f)),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                "_" => Ok(Value::Top),
                "string" => Ok(Value::Type(TypeKind::String)),
                "number" => Ok(Value::Type(TypeKind::Number)),
                "int" => Ok(Value::Type(TypeKind::Int)),
                "float" => Ok(Value::Type(TypeKind::Float)),
                "bool" => Ok(Value::Type(TypeKind::Bool)),
                _ if name.starts_with('#') && name.len() > 1 => Ok(Value::Reference(name)),
                _ => Err(ConstraintError::Syntax {
                    line: token.line,
                    column: token.column,
                    message: format!("unexpected identifier `{name}` in expression"),
                }),
            },
            Tok::LBrace => self.parse_struct_body(),
            Tok::LBracket => self.parse_list_body(),
            other => Err(ConstraintError::Syntax {
                line: token.line,
                column: token.column,
                message: format!("expected expression, found {}", other.describe()),
            }),
        }
    }

    fn parse_struct_body(&mut self) -> Result<Value, ConstraintError> {
        let mut result = StructVal::closed();
        loop {
            if self.eat(&Tok::RBrace) {
                return Ok(Value::Struct(result));
            }
            if self.eat(&Tok::Ellipsis) {
                result.open = true;
                self.eat(&Tok::Comma);
                continue;
            }
            if self.peek().is_none() {
                return Err(self.error_here("unterminated struct literal, expected `}`"));
            }
            self.parse_decl_into(&mut result)?;
        }
    }

    fn parse_list_body(&mut self) -> Result<Value, ConstraintError> {
        let mut list = ListVal {
            elems: Vec::new(),
            rest: None,
        };
        loop {
            if self.eat(&Tok::RBracket) {
                return Ok(Value::List(list));
            }
            if self.eat(&Tok::Ellipsis) {
                let rest = match self.peek().map(|t| &t.tok) {
                    Some(Tok::RBracket) | Some(Tok::Comma) => Value::Top,
                    _ => self.parse_expr()?,
                };
                list.rest = Some(Box::new(rest));
                self.eat(&Tok::Comma);
                if !self.eat(&Tok::RBracket) {
                    return Err(self.error_here("expected `]` after `...` element"));
                }
                return Ok(Value::List(list));
            }
            if self.peek().is_none() {
                return Err(self.error_here("unterminated list literal, expected `]`"));
            }
            list.elems.push(self.parse_expr()?);
            self.eat(&Tok::Comma);
        }
    }
}

/// Insert a declaration, unifying with an earlier declaration of the same
/// label the way package-level merging does.
fn insert_field(
    fields: &mut BTreeMap<String, Field>,
    label: String,
    field: Field,
) -> Result<(), ConstraintError> {
    match fields.remove(&label) {
        None => {
            fields.insert(label, field);
        }
        Some(existing) => {
            let value = unify(&existing.value, &field.value)?;
            let mut attributes = existing.attributes;
            attributes.extend(field.attributes);
            fields.insert(
                label,
                Field {
                    value,
                    optional: existing.optional && field.optional,
                    hidden: existing.hidden,
                    definition: existing.definition,
                    attributes,
                },
            );
        }
    }
    Ok(())
}
