//! Source reconstruction
//!
//! This module turns Ruby source files into styled snippets:
//! - File access by line
//! - Token collection by position
//! - Single-definition extraction
//! - Cached parameter signatures

mod collector;
mod extractor;
mod file;
mod signature;

pub use collector::{Fragment, TokenCollector};
pub use extractor::{Extractor, Strategy};
pub use file::SourceFile;
pub use signature::SignatureCache;
