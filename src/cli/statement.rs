//! Statement grammar: tokenization and validation of `insert` and
//! `select` lines. Parse failures are recoverable — the REPL prints the
//! message and reads the next line.

use std::fmt;

use crate::records::{Row, EMAIL_MAX_LEN, USERNAME_MAX_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    NegativeId,
    StringTooLong,
    SyntaxError,
    Unrecognized(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NegativeId => write!(f, "ID must be positive."),
            ParseError::StringTooLong => write!(f, "String is too long."),
            ParseError::SyntaxError => write!(f, "Syntax error. Could not parse statement."),
            ParseError::Unrecognized(line) => {
                write!(f, "Unrecognized keyword at start of '{}'.", line)
            }
        }
    }
}

/// Parses one input line into a statement.
///
/// `select` must be the whole line; `insert` takes exactly three
/// arguments and ignores anything after them.
pub fn prepare(line: &str) -> Result<Statement, ParseError> {
    if line == "select" {
        return Ok(Statement::Select);
    }

    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("insert") => prepare_insert(tokens),
        _ => Err(ParseError::Unrecognized(line.to_string())),
    }
}

fn prepare_insert<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Result<Statement, ParseError> {
    let id_token = tokens.next().ok_or(ParseError::SyntaxError)?;
    let username = tokens.next().ok_or(ParseError::SyntaxError)?;
    let email = tokens.next().ok_or(ParseError::SyntaxError)?;

    let id: i64 = id_token.parse().map_err(|_| ParseError::SyntaxError)?;
    if id < 0 {
        return Err(ParseError::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| ParseError::SyntaxError)?;

    if username.len() > USERNAME_MAX_LEN || email.len() > EMAIL_MAX_LEN {
        return Err(ParseError::StringTooLong);
    }

    Ok(Statement::Insert(Row {
        id,
        username: username.to_string(),
        email: email.to_string(),
    }))
}
