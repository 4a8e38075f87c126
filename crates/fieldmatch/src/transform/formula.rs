//! Restricted arithmetic formulas.
//!
//! A formula is a plain arithmetic expression over numeric literals and
//! `{field}` placeholders, e.g. `{sea_freight} + {thc} * 1.05`. Only digits,
//! whitespace, `+ - * / ( ) .` and placeholders are accepted; everything else
//! is rejected at tokenization, before any evaluation happens.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | NUMBER | '{' IDENT '}' | '(' expr ')'
//! ```

use crate::value::FieldMap;

use super::error::TransformError;

/// Maximum nesting of parentheses and unary operators.
const MAX_DEPTH: usize = 64;

/// Maximum formula length in bytes.
const MAX_FORMULA_LEN: usize = 4096;

/// Maximum number of tokens. Binary chains nest one level per operator, so
/// this bounds the expression tree depth as well.
const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Placeholder(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Placeholder(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A parsed formula, ready to be evaluated against a document's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    placeholders: Vec<String>,
}

impl Formula {
    /// Tokenizes and parses `source`.
    pub fn parse(source: &str) -> Result<Self, TransformError> {
        if source.trim().is_empty() {
            return Err(TransformError::InvalidParams {
                transform_type: "FORMULA",
                reason: "formula is empty".to_string(),
            });
        }

        let tokens = tokenize(source)?;
        let mut placeholders: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Placeholder(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        placeholders.sort();
        placeholders.dedup();

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(TransformError::formula(format!(
                "unexpected token {} after end of expression",
                describe(token)
            )));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
            placeholders,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the formula, sorted and deduplicated.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Evaluates the formula. Missing or null inputs count as 0.
    pub fn evaluate(&self, context: &FieldMap) -> Result<f64, TransformError> {
        let result = eval(&self.expr, context)?;
        if !result.is_finite() {
            return Err(TransformError::formula(format!(
                "'{}' did not produce a finite number",
                self.source
            )));
        }
        Ok(result)
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, TransformError> {
    if source.len() > MAX_FORMULA_LEN {
        return Err(TransformError::formula(format!(
            "formula is longer than {} bytes",
            MAX_FORMULA_LEN
        )));
    }

    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal.parse::<f64>().map_err(|_| {
                    TransformError::formula(format!("invalid number literal '{}'", literal))
                })?;
                tokens.push(Token::Number(number));
            }
            '{' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '}')
                    .map(|offset| start + offset)
                    .ok_or_else(|| {
                        TransformError::formula(format!("unclosed placeholder at position {}", i))
                    })?;
                let name: String = chars[start..end].iter().collect();
                if !is_identifier(&name) {
                    return Err(TransformError::formula(format!(
                        "invalid placeholder name '{{{}}}'",
                        name
                    )));
                }
                tokens.push(Token::Placeholder(name));
                i = end + 1;
            }
            other => {
                return Err(TransformError::formula(format!(
                    "disallowed character '{}' at position {}",
                    other, i
                )));
            }
        }
        if tokens.len() > MAX_TOKENS {
            return Err(TransformError::formula(format!(
                "formula has more than {} tokens",
                MAX_TOKENS
            )));
        }
    }

    Ok(tokens)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("'{}'", n),
        Token::Placeholder(name) => format!("'{{{}}}'", name),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), TransformError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(TransformError::formula(format!(
                "expression nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, TransformError> {
        let token = self
            .next()
            .cloned()
            .ok_or_else(|| TransformError::formula("unexpected end of expression"))?;

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Placeholder(name) => Ok(Expr::Placeholder(name)),
            Token::Plus | Token::Minus => {
                self.descend()?;
                let operand = self.factor()?;
                self.depth -= 1;
                Ok(if token == Token::Minus {
                    Expr::Negate(Box::new(operand))
                } else {
                    operand
                })
            }
            Token::LParen => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(TransformError::formula("missing closing parenthesis")),
                }
            }
            other => Err(TransformError::formula(format!(
                "unexpected token {}",
                describe(&other)
            ))),
        }
    }
}

fn eval(expr: &Expr, context: &FieldMap) -> Result<f64, TransformError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Placeholder(name) => match context.get(name) {
            None | Some(None) => Ok(0.0),
            Some(Some(value)) if value.is_blank() => Ok(0.0),
            Some(Some(value)) => value.as_number().ok_or_else(|| {
                TransformError::formula(format!(
                    "input '{}' is not numeric: '{}'",
                    name,
                    value.as_text()
                ))
            }),
        },
        Expr::Negate(inner) => Ok(-eval(inner, context)?),
        Expr::Binary { op, lhs, rhs } => {
            let a = eval(lhs, context)?;
            let b = eval(rhs, context)?;
            match op {
                BinaryOp::Add => Ok(a + b),
                BinaryOp::Sub => Ok(a - b),
                BinaryOp::Mul => Ok(a * b),
                BinaryOp::Div => {
                    if b == 0.0 {
                        Err(TransformError::formula("division by zero"))
                    } else {
                        Ok(a / b)
                    }
                }
            }
        }
    }
}
