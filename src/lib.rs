//! rbpeek - styled Ruby source snippets for the terminal
//!
//! The crate pairs a styled-text model and escape-sequence codec with a
//! Ruby lexer and analyzer, and uses them to print single method
//! definitions with syntax highlighting, their parameter signatures and
//! column listings.

pub mod ansi;
pub mod config;
pub mod error;
pub mod layout;
pub mod source;
pub mod syntax;
pub mod terminal;

pub use ansi::{Style, StyledText};
pub use config::{Config, Palette};
pub use error::{Error, Result};
pub use source::{Extractor, SignatureCache, SourceFile, Strategy};
pub use syntax::Signature;
