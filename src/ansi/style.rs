//! Style types for text rendering
//!
//! A [`Style`] is a normalized list of SGR rendition parameters. It is
//! the per-character attribute carried by [`StyledText`](super::StyledText).

use std::fmt;

use smallvec::{smallvec, SmallVec};

use super::codec;

/// Inline storage for rendition parameters
pub type Params = SmallVec<[u8; 8]>;

/// Terminal colors (ANSI 8-color palette plus the 256-color cube)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    /// Index into the 256-color palette
    Ansi256(u8),
}

impl Color {
    /// All eight base colors in SGR order
    pub const BASE: [Color; 8] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
    ];

    /// Color from the 6x6x6 cube, components clamped to 0..=5
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Ansi256(16 + 36 * r.min(5) + 6 * g.min(5) + b.min(5))
    }

    /// Color from the 24-step greyscale ramp, clamped to 0..=23
    pub fn grey(level: u8) -> Self {
        Color::Ansi256(232 + level.min(23))
    }

    /// Lowercase name of a base color
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Color::Black => Some("black"),
            Color::Red => Some("red"),
            Color::Green => Some("green"),
            Color::Yellow => Some("yellow"),
            Color::Blue => Some("blue"),
            Color::Magenta => Some("magenta"),
            Color::Cyan => Some("cyan"),
            Color::White => Some("white"),
            Color::Ansi256(_) => None,
        }
    }

    /// Offset of a base color within the 30-37 / 40-47 ranges
    fn offset(self) -> u8 {
        Color::BASE.iter().position(|c| *c == self).unwrap_or(0) as u8
    }

    /// Parameters selecting this color, `base` being 30 (fg) or 40 (bg)
    fn params(self, base: u8) -> Params {
        match self {
            // 38;5;N for foreground, 48;5;N for background
            Color::Ansi256(index) => smallvec![base + 8, 5, index],
            color => smallvec![base + color.offset()],
        }
    }
}

/// Text style: a normalized sequence of rendition parameters
///
/// Normalization sorts the parameters so that equivalent styles compare
/// equal. Extended-color groups (`38;5;N`, `48;5;N`, `38;2;R;G;B`,
/// `48;2;R;G;B`) are sorted as single units and keep their internal
/// order. A style with no parameters, or only zeros, is the reset style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Style {
    params: Params,
}

impl Default for Style {
    fn default() -> Self {
        Self::reset()
    }
}

impl Style {
    /// The reset style (`ESC[0m`)
    pub fn reset() -> Self {
        Self {
            params: smallvec![0],
        }
    }

    /// Create a style from raw parameters, normalizing them
    pub fn from_params<I: IntoIterator<Item = u8>>(params: I) -> Self {
        let raw: Params = params.into_iter().collect();
        Self {
            params: normalize(&raw),
        }
    }

    /// Create a style with just a foreground color
    pub fn fg(color: Color) -> Self {
        Self::from_params(color.params(30))
    }

    /// Create a style with just a background color
    pub fn bg(color: Color) -> Self {
        Self::from_params(color.params(40))
    }

    /// The normalized parameters
    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Check if this is the reset style
    pub fn is_reset(&self) -> bool {
        self.params.iter().all(|&p| p == 0)
    }

    /// Combine two styles, parameters of `other` following ours
    pub fn merge(&self, other: &Style) -> Self {
        let mut raw = self.params.clone();
        if self.is_reset() && !other.is_reset() {
            raw.clear();
        }
        raw.extend(other.params.iter().copied());
        Self::from_params(raw)
    }

    /// Builder: set foreground color
    pub fn with_fg(self, color: Color) -> Self {
        self.with(color.params(30))
    }

    /// Builder: set background color
    pub fn with_bg(self, color: Color) -> Self {
        self.with(color.params(40))
    }

    /// Builder: set bold
    pub fn with_bold(self) -> Self {
        self.with([1])
    }

    /// Builder: set italic
    pub fn with_italic(self) -> Self {
        self.with([3])
    }

    /// Builder: set underline
    pub fn with_underline(self) -> Self {
        self.with([4])
    }

    /// Builder: set blink
    pub fn with_blink(self) -> Self {
        self.with([5])
    }

    /// Builder: set reverse
    pub fn with_reverse(self) -> Self {
        self.with([7])
    }

    fn with<I: IntoIterator<Item = u8>>(self, extra: I) -> Self {
        self.merge(&Style::from_params(extra))
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::format_sequence(&self.params))
    }
}

/// Sort parameters by unit, keeping extended-color groups intact
fn normalize(raw: &[u8]) -> Params {
    if raw.iter().all(|&p| p == 0) {
        return smallvec![0];
    }

    let mut units: SmallVec<[&[u8]; 8]> = SmallVec::new();
    let mut pos = 0;
    while pos < raw.len() {
        let width = match raw[pos..] {
            [38 | 48, 5, _, ..] => 3,
            [38 | 48, 2, _, _, _, ..] => 5,
            _ => 1,
        };
        units.push(&raw[pos..pos + width]);
        pos += width;
    }
    units.sort();

    units.iter().flat_map(|unit| unit.iter().copied()).collect()
}
