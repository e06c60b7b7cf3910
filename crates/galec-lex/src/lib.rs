//! galec-lex - Lexical analysis for gale source code.
//!
//! Turns a source file into a stream of position-tracked tokens with
//! automatic semicolon insertion, delivered over a bounded channel from a
//! producer thread (see [`lexer`]).

pub mod lexer;
pub mod token;

pub use lexer::{lex, TokenStream, TOKEN_CHANNEL_CAPACITY};
pub use token::{keyword_from_ident, Token, TokenKind};
