//! Tokenizer and parameter binding for query clauses.

use crate::error::{StorageError, StorageResult};
use std::fmt;
use wikidb_codec::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Operator text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Keyword or dotted column path.
    Ident(String),
    Text(String),
    Integer(i64),
    Float(f64),
    /// `?` before binding.
    Placeholder,
    /// Bound parameter, after binding.
    Param(usize),
    LParen,
    RParen,
    Comma,
    Op(CompareOp),
}

impl Token {
    /// Whether this is the keyword `word` (case-insensitive).
    pub(crate) fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Self::Ident(ident) if ident.eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => f.write_str(ident),
            Self::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Placeholder | Self::Param(_) => f.write_str("?"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Op(op) => f.write_str(op.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) offset: usize,
}

/// A lexing or parsing failure at a byte offset of the clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl ParseError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

pub(crate) fn tokenize(clause: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = clause.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                pos += 1;
                continue;
            }
            b'(' => {
                pos += 1;
                Token::LParen
            }
            b')' => {
                pos += 1;
                Token::RParen
            }
            b',' => {
                pos += 1;
                Token::Comma
            }
            b'?' => {
                pos += 1;
                Token::Placeholder
            }
            b'=' => {
                pos += 1;
                Token::Op(CompareOp::Eq)
            }
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::Op(CompareOp::Ne)
            }
            b'<' => match bytes.get(pos + 1) {
                Some(b'>') => {
                    pos += 2;
                    Token::Op(CompareOp::Ne)
                }
                Some(b'=') => {
                    pos += 2;
                    Token::Op(CompareOp::Le)
                }
                _ => {
                    pos += 1;
                    Token::Op(CompareOp::Lt)
                }
            },
            b'>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    Token::Op(CompareOp::Ge)
                } else {
                    pos += 1;
                    Token::Op(CompareOp::Gt)
                }
            }
            b'\'' => {
                let (text, next) = lex_text(clause, pos)?;
                pos = next;
                Token::Text(text)
            }
            b'0'..=b'9' => {
                let (token, next) = lex_number(clause, pos)?;
                pos = next;
                token
            }
            b'-' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let (token, next) = lex_number(clause, pos)?;
                pos = next;
                token
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
                {
                    pos += 1;
                }
                Token::Ident(clause[start..pos].to_string())
            }
            _ => {
                let ch = clause[pos..].chars().next().unwrap_or('?');
                return Err(ParseError::new(pos, format!("unexpected character `{ch}`")));
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }
    Ok(tokens)
}

fn lex_text(clause: &str, start: usize) -> Result<(String, usize), ParseError> {
    let bytes = clause.as_bytes();
    let mut pos = start + 1;
    let mut segment = pos;
    let mut text = String::new();

    while pos < bytes.len() {
        if bytes[pos] == b'\'' {
            text.push_str(&clause[segment..pos]);
            if bytes.get(pos + 1) == Some(&b'\'') {
                text.push('\'');
                pos += 2;
                segment = pos;
                continue;
            }
            return Ok((text, pos + 1));
        }
        pos += 1;
    }
    Err(ParseError::new(start, "unterminated string literal"))
}

fn lex_number(clause: &str, start: usize) -> Result<(Token, usize), ParseError> {
    let bytes = clause.as_bytes();
    let mut pos = start + 1;
    let mut is_float = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'0'..=b'9' => pos += 1,
            b'.' if !is_float && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                is_float = true;
                pos += 1;
            }
            _ => break,
        }
    }

    let text = &clause[start..pos];
    let token = if is_float {
        text.parse()
            .map(Token::Float)
            .map_err(|_| ParseError::new(start, format!("invalid number `{text}`")))?
    } else {
        text.parse()
            .map(Token::Integer)
            .map_err(|_| ParseError::new(start, format!("integer `{text}` out of range")))?
    };
    Ok((token, pos))
}

/// A clause with every value lifted into the parameter list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoundClause {
    pub(crate) tokens: Vec<Spanned>,
    pub(crate) values: Vec<Value>,
}

/// Binds caller parameters to `?` and lifts inline literals to parameters.
///
/// Caller parameters bind to placeholders in textual order. After binding
/// every value operand is a [`Token::Param`] indexing `values`, whatever
/// convention the caller used.
pub(crate) fn bind(clause: &str, params: &[Value]) -> StorageResult<BoundClause> {
    let tokens = tokenize(clause)
        .map_err(|e| StorageError::malformed_query(clause, params.len(), e.to_string()))?;

    let placeholders = tokens
        .iter()
        .filter(|t| t.token == Token::Placeholder)
        .count();
    if placeholders != params.len() {
        return Err(StorageError::ParameterMismatch {
            clause: clause.to_string(),
            expected: placeholders,
            actual: params.len(),
        });
    }

    let mut caller = params.iter();
    let mut values = Vec::new();
    let mut bound = Vec::with_capacity(tokens.len());
    for Spanned { token, offset } in tokens {
        let value = match &token {
            Token::Placeholder => caller.next().cloned(),
            Token::Text(text) => Some(Value::Text(text.clone())),
            Token::Integer(i) => Some(Value::Integer(*i)),
            Token::Float(x) => Some(Value::Float(*x)),
            t if t.is_keyword("true") => Some(Value::Bool(true)),
            t if t.is_keyword("false") => Some(Value::Bool(false)),
            _ => None,
        };
        let token = match value {
            Some(value) => {
                values.push(value);
                Token::Param(values.len() - 1)
            }
            None => token,
        };
        bound.push(Spanned { token, offset });
    }

    Ok(BoundClause {
        tokens: bound,
        values,
    })
}

/// Rewrites a clause so that every literal becomes a `?` parameter.
///
/// Returns the parameterised clause and the values in placeholder order.
/// Executing the result with those values is equivalent to executing the
/// original clause with `params`.
///
/// # Errors
///
/// Returns a malformed query error if the clause does not tokenize, or a
/// parameter mismatch if `params` does not match its placeholders.
pub fn normalize_clause(clause: &str, params: &[Value]) -> StorageResult<(String, Vec<Value>)> {
    let bound = bind(clause, params)?;
    let text = bound
        .tokens
        .iter()
        .map(|t| t.token.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    Ok((text, bound.values))
}
