//! Davfile tokenizer
//!
//! Splits input into whitespace-separated tokens, remembering the line each
//! token started on. Double quotes group text containing whitespace
//! (with `\"` and `\\` escapes) and `#` at the start of a token comments out
//! the rest of the line.

use crate::error::{Error, Result};

/// A single Davfile token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: usize,
    pub quoted: bool,
}

impl Token {
    /// `{` written bare, not inside quotes
    pub fn is_open_brace(&self) -> bool {
        !self.quoted && self.text == "{"
    }

    /// `}` written bare, not inside quotes
    pub fn is_close_brace(&self) -> bool {
        !self.quoted && self.text == "}"
    }
}

/// Tokenize a Davfile
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '#' {
            while let Some(&c) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }

        let start_line = line;
        let mut text = String::new();

        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.peek() {
                        Some(&next @ ('"' | '\\')) => {
                            text.push(next);
                            chars.next();
                        }
                        _ => text.push('\\'),
                    },
                    '\n' => {
                        line += 1;
                        text.push('\n');
                    }
                    _ => text.push(c),
                }
            }
            if !closed {
                return Err(Error::syntax(start_line, "unterminated quoted string"));
            }
            tokens.push(Token {
                text,
                line: start_line,
                quoted: true,
            });
            continue;
        }

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            text.push(c);
            chars.next();
        }
        tokens.push(Token {
            text,
            line: start_line,
            quoted: false,
        });
    }

    Ok(tokens)
}
