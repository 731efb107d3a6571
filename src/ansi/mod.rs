//! Terminal styling
//!
//! This module provides the styled-text model used for everything rbpeek
//! prints:
//! - Rendition parameters and symbolic style names
//! - Per-character styled text
//! - Serialization to and from escape sequences

mod codec;
mod style;
mod styled;

pub use codec::{decode_sequence, encode_name, format_sequence, leading_sequence, ESC, RESET};
pub use style::{Color, Params, Style};
pub use styled::{Lines, StyledText};
