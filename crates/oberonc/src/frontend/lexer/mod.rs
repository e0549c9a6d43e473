//! Oberon lexer module

mod scanner;
mod token;

pub use scanner::OberonLexer;
pub use token::{Token, TokenKind};
