use log::debug;
use std::fmt::{self, Display, Formatter};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    LeftParen,
    RightParen,

    Comma,
    Colon,

    Plus,
    Minus,
    Star,
    Slash,

    Equal,
    Greater,
    Less,

    NotEqual,
    GreaterEqual,
    LessEqual,

    Identifier(char),
    String(String),
    Number(i64),
    Rem(String),

    Let,
    Print,
    Input,
    If,
    Then,
    Goto,
    Gosub,
    Return,
    End,

    NewLine,
    EOF,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::Comma => write!(f, ","),
            TokenType::Colon => write!(f, ":"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Equal => write!(f, "="),
            TokenType::Greater => write!(f, ">"),
            TokenType::Less => write!(f, "<"),
            TokenType::NotEqual => write!(f, "<>"),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::Identifier(c) => write!(f, "{}", c),
            TokenType::String(s) => write!(f, "\"{}\"", s),
            TokenType::Number(n) => write!(f, "{}", n),
            TokenType::Rem(text) if text.is_empty() => write!(f, "REM"),
            TokenType::Rem(text) => write!(f, "REM {}", text),
            TokenType::Let => write!(f, "LET"),
            TokenType::Print => write!(f, "PRINT"),
            TokenType::Input => write!(f, "INPUT"),
            TokenType::If => write!(f, "IF"),
            TokenType::Then => write!(f, "THEN"),
            TokenType::Goto => write!(f, "GOTO"),
            TokenType::Gosub => write!(f, "GOSUB"),
            TokenType::Return => write!(f, "RETURN"),
            TokenType::End => write!(f, "END"),
            TokenType::NewLine => write!(f, "newline"),
            TokenType::EOF => write!(f, "end of input"),
        }
    }
}

/// A lexeme together with the position it started at. Lines count from 1,
/// columns are byte offsets from the start of the line and count from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}:{:<3} {:?}", self.line, self.column, self.token_type)
    }
}

// Tried in order after numbers; a keyword wins over a single-letter
// identifier even when letters follow it.
static KEYWORDS: &[(&[u8], TokenType)] = &[
    (b"LET", TokenType::Let),
    (b"PRINT", TokenType::Print),
    (b"INPUT", TokenType::Input),
    (b"IF", TokenType::If),
    (b"THEN", TokenType::Then),
    (b"GOTO", TokenType::Goto),
    (b"GOSUB", TokenType::Gosub),
    (b"RETURN", TokenType::Return),
    (b"END", TokenType::End),
];

enum Scan {
    Token(usize, TokenType),
    Skip(usize),
    Mismatch,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let n = bytes.len();
    let mut cursor = 0;
    let mut line_number = 1;
    let mut line_start = 0;
    let mut tokens = Vec::new();

    while cursor < n {
        let column = cursor - line_start;

        match next_token(&bytes[cursor..]) {
            Scan::Skip(bytes_read) => {
                cursor += bytes_read;
            }
            Scan::Token(bytes_read, TokenType::Number(_)) => {
                let literal = &source[cursor..cursor + bytes_read];
                let value = literal.parse::<i64>().map_err(|_| {
                    debug!("integer literal {} overflows on line {}", literal, line_number);
                    Error::NumberOutOfRange {
                        line: line_number,
                        column,
                        literal: literal.to_string(),
                    }
                })?;

                tokens.push(Token {
                    token_type: TokenType::Number(value),
                    line: line_number,
                    column,
                });
                cursor += bytes_read;
            }
            Scan::Token(bytes_read, TokenType::NewLine) => {
                tokens.push(Token {
                    token_type: TokenType::NewLine,
                    line: line_number,
                    column,
                });
                cursor += bytes_read;
                line_number += 1;
                line_start = cursor;
            }
            Scan::Token(bytes_read, token_type) => {
                tokens.push(Token {
                    token_type,
                    line: line_number,
                    column,
                });
                cursor += bytes_read;
            }
            Scan::Mismatch => {
                let character = source[cursor..].chars().next().unwrap_or('\0');
                debug!(
                    "unexpected character {:?} on line {}, column {}",
                    character, line_number, column
                );
                return Err(Error::Lexical {
                    line: line_number,
                    column,
                    character,
                });
            }
        }
    }

    tokens.push(Token {
        token_type: TokenType::EOF,
        line: line_number,
        column: cursor - line_start,
    });

    Ok(tokens)
}

fn next_token(bytes: &[u8]) -> Scan {
    let n = bytes.len();

    if bytes[0].is_ascii_digit() {
        let end_byte = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        // The value is filled in by `tokenize`, which owns the position needed
        // for an out-of-range diagnostic.
        return Scan::Token(end_byte, TokenType::Number(0));
    }

    for (keyword, token_type) in KEYWORDS {
        if bytes.starts_with(keyword) {
            return Scan::Token(keyword.len(), token_type.clone());
        }
    }

    if bytes.starts_with(b"REM") {
        let end_byte = bytes.iter().position(|&b| b == b'\n').unwrap_or(n);
        let text = String::from_utf8_lossy(&bytes[3..end_byte]).trim().to_string();
        return Scan::Token(end_byte, TokenType::Rem(text));
    }

    if bytes[0].is_ascii_uppercase() {
        return Scan::Token(1, TokenType::Identifier(bytes[0] as char));
    }

    if bytes[0] == b'"' {
        let start_byte = 1;
        let mut end_byte = 1;

        while end_byte < n && bytes[end_byte] != b'"' && bytes[end_byte] != b'\n' {
            end_byte += 1;
        }

        if end_byte >= n || bytes[end_byte] != b'"' {
            return Scan::Mismatch;
        }

        return Scan::Token(
            end_byte + 1,
            TokenType::String(String::from_utf8_lossy(&bytes[start_byte..end_byte]).into_owned()),
        );
    }

    if n >= 2 {
        let token = match &bytes[..2] {
            b">=" => Some(TokenType::GreaterEqual),
            b"<=" => Some(TokenType::LessEqual),
            b"<>" => Some(TokenType::NotEqual),
            _ => None,
        };

        if let Some(token) = token {
            return Scan::Token(2, token);
        }
    }

    let token = match bytes[0] {
        b'>' => Some(TokenType::Greater),
        b'<' => Some(TokenType::Less),
        b'=' => Some(TokenType::Equal),
        b'+' => Some(TokenType::Plus),
        b'-' => Some(TokenType::Minus),
        b'*' => Some(TokenType::Star),
        b'/' => Some(TokenType::Slash),
        b'(' => Some(TokenType::LeftParen),
        b')' => Some(TokenType::RightParen),
        b',' => Some(TokenType::Comma),
        b':' => Some(TokenType::Colon),
        b'\n' => Some(TokenType::NewLine),
        _ => None,
    };

    if let Some(token) = token {
        return Scan::Token(1, token);
    }

    let skipped = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r'))
        .count();

    if skipped > 0 {
        Scan::Skip(skipped)
    } else {
        Scan::Mismatch
    }
}
