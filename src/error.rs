use thiserror::Error;

use crate::tokenizer::Token;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("lexical error at {line}:{column}: unexpected character {character:?}")]
    Lexical {
        line: usize,
        column: usize,
        character: char,
    },
    #[error("lexical error at {line}:{column}: integer literal {literal} is out of range")]
    NumberOutOfRange {
        line: usize,
        column: usize,
        literal: String,
    },
    #[error("syntax error at {line}:{column}: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn syntax_error<T>(expected: &str, found: &Token) -> Result<T> {
    Err(Error::Syntax {
        expected: expected.to_string(),
        found: found.token_type.to_string(),
        line: found.line,
        column: found.column,
    })
}

pub fn runtime_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Runtime {
        message: message.into(),
    })
}
