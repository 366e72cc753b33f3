//! Token cursor for the Davfile parser

use super::lexer::Token;
use crate::error::{Error, Result};

/// Walks a token stream directive by directive.
///
/// Arguments are the tokens following a directive on the same line; a block
/// is a `{` on the directive's line up to the matching `}`.
pub struct Dispenser {
    tokens: Vec<Token>,
    /// Index of the current token, `None` before the first call to `next`
    cursor: Option<usize>,
    in_block: bool,
}

impl Dispenser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: None,
            in_block: false,
        }
    }

    fn current(&self) -> Option<&Token> {
        self.cursor.and_then(|i| self.tokens.get(i))
    }

    fn peek(&self) -> Option<&Token> {
        let next = self.cursor.map_or(0, |i| i + 1);
        self.tokens.get(next)
    }

    fn advance(&mut self) {
        self.cursor = Some(self.cursor.map_or(0, |i| i + 1));
    }

    /// Move to the next token, wherever it is
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.peek().is_some() {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Text of the current token
    pub fn val(&self) -> &str {
        self.current().map(|t| t.text.as_str()).unwrap_or("")
    }

    /// Line of the current token (or of the last token once exhausted)
    pub fn line(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    /// Next token on the same line that is not a brace
    fn peek_arg(&self) -> Option<&Token> {
        let line = self.current()?.line;
        self.peek()
            .filter(|t| t.line == line && !t.is_open_brace() && !t.is_close_brace())
    }

    /// Move to the next argument of the current directive, if any
    pub fn next_arg(&mut self) -> bool {
        if self.peek_arg().is_some() {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume every remaining argument on the current line
    pub fn remaining_args(&mut self) -> Vec<String> {
        let mut args = Vec::new();
        while self.next_arg() {
            args.push(self.val().to_string());
        }
        args
    }

    /// Consume exactly one argument
    pub fn required_arg(&mut self) -> Result<String> {
        if !self.next_arg() {
            return Err(self.arg_err());
        }
        Ok(self.val().to_string())
    }

    /// Fail if the current directive has any arguments left
    pub fn expect_line_end(&mut self) -> Result<()> {
        if self.next_arg() {
            return Err(self.err(format!("unexpected argument '{}'", self.val())));
        }
        Ok(())
    }

    /// Step through the directives inside the current directive's block.
    ///
    /// Returns `Ok(false)` when there is no block or its closing brace has
    /// been reached. Nested blocks are rejected.
    pub fn next_block(&mut self) -> Result<bool> {
        if !self.in_block {
            let line = match self.current() {
                Some(t) => t.line,
                None => return Ok(false),
            };
            match self.peek() {
                Some(t) if t.is_open_brace() && t.line == line => {
                    self.advance();
                    self.in_block = true;
                }
                _ => return Ok(false),
            }
        }

        if !self.next() {
            return Err(self.err("unexpected end of file, expected '}'"));
        }

        let token = self.current().map(|t| (t.is_open_brace(), t.is_close_brace()));
        match token {
            Some((_, true)) => {
                self.in_block = false;
                Ok(false)
            }
            Some((true, _)) => Err(self.err("unexpected '{'")),
            _ => Ok(true),
        }
    }

    /// Syntax error at the current line
    pub fn err(&self, message: impl Into<String>) -> Error {
        Error::syntax(self.line(), message)
    }

    /// Wrong argument count for the current directive
    pub fn arg_err(&self) -> Error {
        self.err(format!(
            "wrong argument count or unexpected line ending after '{}'",
            self.val()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::lexer::tokenize;

    fn dispenser(input: &str) -> Dispenser {
        Dispenser::new(tokenize(input).unwrap())
    }

    #[test]
    fn test_args_stop_at_line_end() {
        let mut d = dispenser("webdav /a /b\nscope /srv");
        assert!(d.next());
        assert_eq!(d.remaining_args(), vec!["/a", "/b"]);
        assert!(d.next());
        assert_eq!(d.val(), "scope");
        assert_eq!(d.required_arg().unwrap(), "/srv");
        assert!(!d.next_arg());
    }

    #[test]
    fn test_args_stop_at_brace() {
        let mut d = dispenser("webdav /a {\n}");
        assert!(d.next());
        assert_eq!(d.remaining_args(), vec!["/a"]);
        assert!(!d.next_block().unwrap());
        assert!(!d.next());
    }

    #[test]
    fn test_block_iteration() {
        let mut d = dispenser("webdav {\n  scope /srv\n  modify\n}\nwebdav");
        assert!(d.next());
        let mut seen = Vec::new();
        while d.next_block().unwrap() {
            seen.push(d.val().to_string());
            d.remaining_args();
        }
        assert_eq!(seen, vec!["scope", "modify"]);
        assert!(d.next());
        assert_eq!(d.val(), "webdav");
        assert!(!d.next_block().unwrap());
    }

    #[test]
    fn test_brace_on_next_line_is_not_a_block() {
        let mut d = dispenser("webdav\n{\n}");
        assert!(d.next());
        assert!(!d.next_block().unwrap());
    }

    #[test]
    fn test_unclosed_block() {
        let mut d = dispenser("webdav {\n  scope /srv");
        assert!(d.next());
        assert!(d.next_block().unwrap());
        d.remaining_args();
        assert!(matches!(d.next_block(), Err(Error::Syntax { line: 2, .. })));
    }

    #[test]
    fn test_missing_required_arg() {
        let mut d = dispenser("scope\nmodify");
        assert!(d.next());
        let err = d.required_arg().unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }
}
