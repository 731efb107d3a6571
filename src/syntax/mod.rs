//! Ruby syntax
//!
//! This module provides the lexical and structural view of Ruby source
//! used for:
//! - Token streams for highlighting
//! - Definition boundaries for extraction
//! - Parameter signatures

mod analyzer;
mod lexer;
mod params;
mod tokens;

pub use analyzer::{definitions, Analyzer};
pub use lexer::{tokenize, Lexer};
pub use params::Signature;
pub use tokens::{Definition, Event, Position, Role, TokenEvent, TokenKind};
