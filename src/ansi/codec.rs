//! Rendition codec
//!
//! Maps symbolic style names such as `bright_red_on_blue`, `rgb345` or
//! `on_grey13` to rendition parameters, and converts parameters to and
//! from `ESC [ ... m` sequences.

use std::sync::LazyLock;

use regex::Regex;

use super::style::{Color, Params, Style};
use crate::error::{Error, Result};

/// Escape character that opens every sequence
pub const ESC: char = '\x1b';

/// Sequence that returns the terminal to its default rendition
pub const RESET: &str = "\x1b[0m";

/// Named renditions
///
/// Multi-word names are matched before their components, so
/// `on_bright_red` wins over `on` + `bright` + `red`.
const RENDITIONS: &[(&str, &[u8])] = &[
    ("normal", &[0]),
    ("reset", &[0]),
    ("bright", &[1]),
    ("bold", &[1]),
    ("italic", &[3]),
    ("italics", &[3]),
    ("underline", &[4]),
    ("underlined", &[4]),
    ("blink", &[5]),
    ("blinking", &[5]),
    ("on_bright", &[5]),
    ("inverse", &[7]),
    ("inverted", &[7]),
    ("negative", &[7]),
    ("non_bright", &[22]),
    ("dim", &[22]),
    ("no_underline", &[24]),
    ("non_underlined", &[24]),
    ("no_blink", &[25]),
    ("non_blinking", &[25]),
    ("non_on_bright", &[25]),
    ("on_dim", &[25]),
    ("no_inverse", &[27]),
    ("non_inverted", &[27]),
    ("positive", &[27]),
];

/// Longest named token, in words (`non_on_bright`, `on_bright_red`)
const MAX_TOKEN_WORDS: usize = 3;

/// A complete sequence anchored at the start of the input
static LEADING_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x1b\[([0-9;]*)m").expect("sequence pattern is valid"));

/// `rgbXYZ` / `greyNN` with an optional `on_` prefix
static PALETTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(on_)?(?:rgb([0-5])([0-5])([0-5])|grey([0-9]{1,2}))$")
        .expect("palette pattern is valid")
});

/// Parse a compound symbolic style name
///
/// Words are separated by `_` (spaces and `-` are accepted too). Unknown
/// words are skipped; a name in which nothing is recognized at all is an
/// [`Error::InvalidStyleName`].
pub fn encode_name(name: &str) -> Result<Style> {
    let lowered = name.to_ascii_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();

    let mut params = Params::new();
    let mut recognized = false;
    let mut pos = 0;

    while pos < words.len() {
        match longest_token(&words[pos..]) {
            Some((consumed, codes)) => {
                params.extend(codes);
                recognized = true;
                pos += consumed;
            }
            None => {
                tracing::trace!(word = words[pos], name, "skipping unknown style word");
                pos += 1;
            }
        }
    }

    if !recognized {
        return Err(Error::InvalidStyleName(name.to_string()));
    }
    Ok(Style::from_params(params))
}

/// Match the longest known token at the start of `words`
fn longest_token(words: &[&str]) -> Option<(usize, Params)> {
    (1..=words.len().min(MAX_TOKEN_WORDS))
        .rev()
        .find_map(|take| lookup_token(&words[..take].join("_")).map(|codes| (take, codes)))
}

/// Resolve a single token to its parameters
fn lookup_token(token: &str) -> Option<Params> {
    if let Some((_, codes)) = RENDITIONS.iter().find(|(name, _)| *name == token) {
        return Some(codes.iter().copied().collect());
    }

    let (bright, color) = match token.strip_prefix("on_bright_") {
        Some(rest) => (true, rest),
        None => match token.strip_prefix("on_") {
            Some(rest) => (false, rest),
            None => {
                return base_color(token)
                    .map(|color| Style::fg(color).params().iter().copied().collect())
                    .or_else(|| palette_color(token));
            }
        },
    };

    match base_color(color) {
        // on_bright_<color> is blink + background
        Some(color) if bright => Some(Style::bg(color).with_blink().params().iter().copied().collect()),
        Some(color) => Some(Style::bg(color).params().iter().copied().collect()),
        None => palette_color(token),
    }
}

fn base_color(name: &str) -> Option<Color> {
    Color::BASE.into_iter().find(|c| c.name() == Some(name))
}

/// `rgbXYZ`, `greyNN` and their `on_` forms
fn palette_color(token: &str) -> Option<Params> {
    let caps = PALETTE_NAME.captures(token)?;
    let digit = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u8>().ok());

    let color = match (digit(2), digit(3), digit(4), digit(5)) {
        (Some(r), Some(g), Some(b), _) => Color::rgb(r, g, b),
        (_, _, _, Some(level)) if level <= 23 => Color::grey(level),
        _ => return None,
    };

    let style = if caps.get(1).is_some() {
        Style::bg(color)
    } else {
        Style::fg(color)
    };
    Some(style.params().iter().copied().collect())
}

/// Parse a sequence at the start of `text`
///
/// Returns the style and the number of bytes consumed. A parameter that
/// does not fit a `u8` makes the whole sequence malformed.
pub fn leading_sequence(text: &str) -> Option<(Style, usize)> {
    let caps = LEADING_SEQUENCE.captures(text)?;
    let whole = caps.get(0)?;
    let mut params = Params::new();
    for param in caps.get(1).map_or("", |m| m.as_str()).split(';') {
        if !param.is_empty() {
            params.push(param.parse::<u8>().ok()?);
        }
    }
    Some((Style::from_params(params), whole.end()))
}

/// Parse exactly one escape sequence
pub fn decode_sequence(text: &str) -> Result<Style> {
    match leading_sequence(text) {
        Some((style, consumed)) if consumed == text.len() => Ok(style),
        _ => Err(Error::MalformedEscapeSequence(text.to_string())),
    }
}

/// Wrap parameters in the `ESC [ ... m` envelope
pub fn format_sequence(params: &[u8]) -> String {
    let joined: Vec<String> = params.iter().map(u8::to_string).collect();
    format!("{ESC}[{}m", joined.join(";"))
}
