//! Davfile Directive Language
//!
//! Parses the block-structured configuration that declares mounts, their
//! default users, and per-principal overrides.

mod dispenser;
mod lexer;
mod parser;

pub use lexer::{tokenize, Token};
pub use parser::{parse_davfile, DIRECTIVE};
