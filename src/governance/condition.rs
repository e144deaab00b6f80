//! Boolean condition expressions evaluated over tool call arguments.
//!
//! ```text
//! path starts with "src/" and not (path contains "..")
//! depth <= 3 or recursive == false
//! name matches "^[A-Z][A-Za-z]*Test$"
//! ```
//!
//! Identifiers resolve against the call's arguments (dotted names walk
//! nested objects). Unknown identifiers evaluate to null, and any
//! comparison with null is false except `!=`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use crate::error::AgentError;

/// A parsed condition.
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, AgentError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        if let Some(token) = parser.peek() {
            return Err(syntax(source, &format!("unexpected {token}")));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against the arguments of a call.
    pub fn evaluate(&self, scope: &Value) -> bool {
        truthy(&self.expr.eval(scope))
    }
}

impl FromStr for Condition {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn syntax(source: &str, message: &str) -> AgentError {
    AgentError::Configuration(format!("invalid condition '{source}': {message}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
    Matches,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::Contains => "contains",
            Self::Matches => "matches",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        /// Precompiled pattern when the right side of `matches` is a literal.
        pattern: Option<Regex>,
    },
}

impl Expr {
    fn eval(&self, scope: &Value) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Var(name) => lookup(scope, name),
            Self::Not(inner) => Value::Bool(!truthy(&inner.eval(scope))),
            Self::And(lhs, rhs) => Value::Bool(truthy(&lhs.eval(scope)) && truthy(&rhs.eval(scope))),
            Self::Or(lhs, rhs) => Value::Bool(truthy(&lhs.eval(scope)) || truthy(&rhs.eval(scope))),
            Self::Compare { op, lhs, rhs, pattern } => {
                let left = lhs.eval(scope);
                let right = rhs.eval(scope);
                Value::Bool(compare(*op, &left, &right, pattern.as_ref()))
            }
        }
    }
}

fn lookup(scope: &Value, name: &str) -> Value {
    let mut current = scope;
    for segment in name.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            as_text(left) == as_text(right)
        }
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::String(s), Value::Number(n)) => s.trim().parse::<f64>().ok()?.partial_cmp(&n.as_f64()?),
        (Value::Number(n), Value::String(s)) => n.as_f64()?.partial_cmp(&s.trim().parse::<f64>().ok()?),
        _ => None,
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value, pattern: Option<&Regex>) -> bool {
    if left.is_null() || right.is_null() {
        return op == CompareOp::Ne && left != right;
    }
    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::StartsWith => text_pair(left, right).is_some_and(|(l, r)| l.starts_with(&r)),
        CompareOp::EndsWith => text_pair(left, right).is_some_and(|(l, r)| l.ends_with(&r)),
        CompareOp::Contains => match left {
            Value::Array(items) => items.iter().any(|item| loose_eq(item, right)),
            _ => text_pair(left, right).is_some_and(|(l, r)| l.contains(&r)),
        },
        CompareOp::Matches => {
            let Some(text) = as_text(left) else {
                return false;
            };
            match pattern {
                Some(regex) => regex.is_match(&text),
                None => as_text(right)
                    .and_then(|p| Regex::new(&p).ok())
                    .is_some_and(|regex| regex.is_match(&text)),
            }
        }
    }
}

fn text_pair(left: &Value, right: &Value) -> Option<(String, String)> {
    Some((as_text(left)?, as_text(right)?))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Literal(value) => write!(f, "literal {value}"),
            Self::Op(op) => write!(f, "operator '{op}'"),
            Self::And => f.write_str("'and'"),
            Self::Or => f.write_str("'or'"),
            Self::Not => f.write_str("'not'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, AgentError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let (text, next) = read_string(&chars, i, source)?;
                tokens.push(Token::Literal(Value::String(text)));
                i = next;
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('=', Some('=')) => (Token::Op(CompareOp::Eq), 2),
                    ('!', Some('=')) => (Token::Op(CompareOp::Ne), 2),
                    ('<', Some('=')) => (Token::Op(CompareOp::Le), 2),
                    ('>', Some('=')) => (Token::Op(CompareOp::Ge), 2),
                    ('&', Some('&')) => (Token::And, 2),
                    ('|', Some('|')) => (Token::Or, 2),
                    ('<', _) => (Token::Op(CompareOp::Lt), 1),
                    ('>', _) => (Token::Op(CompareOp::Gt), 1),
                    ('!', _) => (Token::Not, 1),
                    _ => return Err(syntax(source, &format!("unexpected '{c}' at {i}"))),
                };
                tokens.push(token);
                i += width;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = if let Ok(int) = text.parse::<i64>() {
                    Value::from(int)
                } else {
                    let float = text
                        .parse::<f64>()
                        .map_err(|_| syntax(source, &format!("bad number '{text}'")))?;
                    Value::from(float)
                };
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let (word, next) = read_word(&chars, i);
                i = next;
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    "contains" => Token::Op(CompareOp::Contains),
                    "matches" => Token::Op(CompareOp::Matches),
                    "startswith" | "starts_with" => Token::Op(CompareOp::StartsWith),
                    "endswith" | "ends_with" => Token::Op(CompareOp::EndsWith),
                    lower @ ("starts" | "ends") => {
                        let mut j = i;
                        while j < chars.len() && chars[j].is_whitespace() {
                            j += 1;
                        }
                        let (follow, after) = read_word(&chars, j);
                        if follow.eq_ignore_ascii_case("with") {
                            i = after;
                            if lower == "starts" {
                                Token::Op(CompareOp::StartsWith)
                            } else {
                                Token::Op(CompareOp::EndsWith)
                            }
                        } else {
                            Token::Ident(word)
                        }
                    }
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            _ => return Err(syntax(source, &format!("unexpected '{c}' at {i}"))),
        }
    }

    Ok(tokens)
}

fn read_word(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == '.') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn read_string(chars: &[char], start: usize, source: &str) -> Result<(String, usize), AgentError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(syntax(source, "unterminated string"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: &str) -> AgentError {
        AgentError::Configuration(format!("invalid condition: {message}"))
    }

    fn or_expr(&mut self) -> Result<Expr, AgentError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, AgentError> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, AgentError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, AgentError> {
        let lhs = self.primary()?;
        let Some(Token::Op(op)) = self.peek().cloned() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.primary()?;
        let pattern = match (&op, &rhs) {
            (CompareOp::Matches, Expr::Literal(Value::String(p))) => Some(
                Regex::new(p).map_err(|e| self.error(&format!("bad pattern '{p}': {e}")))?,
            ),
            _ => None,
        };
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            pattern,
        })
    }

    fn primary(&mut self) -> Result<Expr, AgentError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing ')'")),
                }
            }
            Some(token) => Err(self.error(&format!("unexpected {token}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, scope: Value) -> bool {
        Condition::parse(source).unwrap().evaluate(&scope)
    }

    #[test]
    fn starts_with_guards_paths() {
        let cond = "path starts with \"src/\"";
        assert!(eval(cond, json!({"path": "src/Foo.java"})));
        assert!(!eval(cond, json!({"path": "../etc/passwd"})));
    }

    #[test]
    fn boolean_connectives_and_grouping() {
        let cond = "path starts with 'src/' and not (path contains '..' or force == true)";
        assert!(eval(cond, json!({"path": "src/a.rs", "force": false})));
        assert!(!eval(cond, json!({"path": "src/../x", "force": false})));
        assert!(!eval(cond, json!({"path": "src/a.rs", "force": true})));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(eval("depth <= 3", json!({"depth": 3})));
        assert!(!eval("depth > 3", json!({"depth": 2})));
        assert!(eval("depth >= -1", json!({"depth": 0})));
    }

    #[test]
    fn missing_variables_are_null() {
        assert!(!eval("path starts with 'src/'", json!({})));
        assert!(eval("path != 'x'", json!({})));
        assert!(!eval("path == null", json!({})));
    }

    #[test]
    fn regex_match() {
        assert!(eval("name matches '^[A-Z]\\\\w*Test$'", json!({"name": "FooTest"})));
        assert!(!eval("name matches '^[A-Z]\\\\w*Test$'", json!({"name": "foo"})));
    }

    #[test]
    fn dotted_names_walk_objects() {
        assert!(eval("opts.mode == 'read'", json!({"opts": {"mode": "read"}})));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(Condition::parse("path starts with").is_err());
        assert!(Condition::parse("(a == 1").is_err());
        assert!(Condition::parse("a = 1").is_err());
        assert!(Condition::parse("name matches '('").is_err());
    }
}
