//! Styled text
//!
//! [`StyledText`] pairs every character of a string with a [`Style`].
//! Slicing, padding and concatenation keep the two in lock-step, and the
//! whole value serializes to (and decodes from) text with embedded escape
//! sequences. Equality, ordering and hashing only look at the characters.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Bound, RangeBounds};

use unicode_width::UnicodeWidthChar;

use super::codec::{self, ESC, RESET};
use super::style::Style;

/// Text with a style for every character
#[derive(Debug, Clone, Default)]
pub struct StyledText {
    chars: Vec<char>,
    styles: Vec<Style>,
}

impl StyledText {
    /// Create unstyled text; every character gets the reset style
    pub fn new(text: &str) -> Self {
        Self::with_style(text, &Style::reset())
    }

    /// Create text with one style for every character
    pub fn with_style(text: &str, style: &Style) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let styles = vec![style.clone(); chars.len()];
        Self { chars, styles }
    }

    /// Create text from a per-character style list
    ///
    /// Missing entries are reset; a short list is padded with reset and
    /// extra entries are ignored.
    pub fn with_styles<I>(text: &str, styles: I) -> Self
    where
        I: IntoIterator<Item = Option<Style>>,
    {
        let chars: Vec<char> = text.chars().collect();
        let mut styles: Vec<Style> = styles
            .into_iter()
            .take(chars.len())
            .map(Option::unwrap_or_default)
            .collect();
        styles.resize(chars.len(), Style::reset());
        Self { chars, styles }
    }

    /// Decode text containing escape sequences
    ///
    /// Each well-formed sequence sets the style of the characters that
    /// follow it. Anything else that starts with an escape character is
    /// kept in the text verbatim and leaves the current style alone.
    pub fn decode(raw: &str) -> Self {
        let mut text = Self::default();
        let mut current = Style::reset();
        let mut rest = raw;

        while let Some(esc) = rest.find(ESC) {
            text.push_styled(&rest[..esc], &current);
            let tail = &rest[esc..];
            match codec::leading_sequence(tail) {
                Some((style, consumed)) => {
                    current = style;
                    rest = &tail[consumed..];
                }
                None => {
                    tracing::trace!(at = raw.len() - tail.len(), "keeping malformed escape sequence");
                    text.push_styled(&tail[..ESC.len_utf8()], &current);
                    rest = &tail[ESC.len_utf8()..];
                }
            }
        }
        text.push_styled(rest, &current);

        text
    }

    /// Number of characters
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Check if there are no characters
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The characters
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The per-character styles
    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    /// Style of the character at `index`
    pub fn style_at(&self, index: usize) -> Option<&Style> {
        self.styles.get(index)
    }

    /// The characters as a plain string
    pub fn plain(&self) -> String {
        self.chars.iter().collect()
    }

    /// Terminal column width of the characters
    pub fn display_width(&self) -> usize {
        self.chars.iter().map(|&c| c.width().unwrap_or(0)).sum()
    }

    /// Copy out a range of characters; out-of-range bounds are clamped
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);

        Self {
            chars: self.chars[start..end].to_vec(),
            styles: self.styles[start..end].to_vec(),
        }
    }

    /// Append another styled text
    pub fn concat(&mut self, other: &StyledText) -> &mut Self {
        self.chars.extend_from_slice(&other.chars);
        self.styles.extend_from_slice(&other.styles);
        self
    }

    /// Append plain text with the reset style
    pub fn push_str(&mut self, text: &str) -> &mut Self {
        self.push_styled(text, &Style::reset())
    }

    /// Append text with one style
    pub fn push_styled(&mut self, text: &str, style: &Style) -> &mut Self {
        for c in text.chars() {
            self.chars.push(c);
            self.styles.push(style.clone());
        }
        self
    }

    /// Pad with `pad` characters to at least `n` characters
    pub fn ljust(&self, n: usize, pad: char, pad_style: &Style) -> Self {
        let mut padded = self.clone();
        while padded.len() < n {
            padded.chars.push(pad);
            padded.styles.push(pad_style.clone());
        }
        padded
    }

    /// Exactly `n` characters: truncated, or padded with styled spaces
    pub fn left_fixed(&self, n: usize, pad_style: &Style) -> Self {
        if n > self.len() {
            self.ljust(n, ' ', pad_style)
        } else {
            self.slice(..n)
        }
    }

    /// Exactly `n` terminal columns: cut before the first character that
    /// would overflow, then padded with styled spaces
    pub fn fit_width(&self, n: usize, pad_style: &Style) -> Self {
        let mut used = 0;
        let keep = self
            .chars
            .iter()
            .take_while(|&&c| {
                let width = c.width().unwrap_or(0);
                if used + width > n {
                    return false;
                }
                used += width;
                true
            })
            .count();
        self.slice(..keep).left_fixed(keep + (n - used), pad_style)
    }

    /// Drop up to `n` leading whitespace characters
    pub fn trim_indent(&self, n: usize) -> Self {
        let strip = self
            .chars
            .iter()
            .take(n)
            .take_while(|c| **c == ' ' || **c == '\t')
            .count();
        self.slice(strip..)
    }

    /// Width of the leading run of spaces and tabs
    pub fn indent_width(&self) -> usize {
        self.chars
            .iter()
            .take_while(|c| **c == ' ' || **c == '\t')
            .count()
    }

    /// Check if the text holds nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.chars.iter().all(|c| c.is_whitespace())
    }

    /// Split into lines, each keeping its line terminator
    pub fn lines(&self) -> Lines<'_> {
        Lines { text: self, pos: 0 }
    }

    /// Render as text with escape sequences
    ///
    /// Each maximal run of one style is preceded by its sequence. A
    /// trailing reset is added unless the last run already is the reset
    /// style.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.chars.len() * 2);
        let mut pos = 0;
        let mut last: Option<&Style> = None;

        for run in self.styles.chunk_by(|a, b| a == b) {
            let style = &run[0];
            out.push_str(&codec::format_sequence(style.params()));
            out.extend(&self.chars[pos..pos + run.len()]);
            pos += run.len();
            last = Some(style);
        }

        if last.is_some_and(|style| !style.is_reset()) {
            out.push_str(RESET);
        }
        out
    }
}

/// Iterator over the lines of a [`StyledText`]
pub struct Lines<'a> {
    text: &'a StyledText,
    pos: usize,
}

impl Iterator for Lines<'_> {
    type Item = StyledText;

    fn next(&mut self) -> Option<StyledText> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;
        let end = self.text.chars[start..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.text.len(), |i| start + i + 1);
        self.pos = end;
        Some(self.text.slice(start..end))
    }
}

impl fmt::Display for StyledText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl From<&str> for StyledText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for StyledText {
    fn from(text: String) -> Self {
        Self::new(&text)
    }
}

impl PartialEq for StyledText {
    fn eq(&self, other: &Self) -> bool {
        self.chars == other.chars
    }
}

impl Eq for StyledText {}

impl PartialEq<str> for StyledText {
    fn eq(&self, other: &str) -> bool {
        self.chars.iter().copied().eq(other.chars())
    }
}

impl PartialEq<&str> for StyledText {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialOrd for StyledText {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StyledText {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chars.cmp(&other.chars)
    }
}

impl Hash for StyledText {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chars.hash(state);
    }
}

impl Add<&StyledText> for StyledText {
    type Output = StyledText;

    fn add(mut self, rhs: &StyledText) -> StyledText {
        self.concat(rhs);
        self
    }
}

impl Add<&str> for StyledText {
    type Output = StyledText;

    fn add(mut self, rhs: &str) -> StyledText {
        self.push_str(rhs);
        self
    }
}

impl AddAssign<&StyledText> for StyledText {
    fn add_assign(&mut self, rhs: &StyledText) {
        self.concat(rhs);
    }
}

impl AddAssign<&str> for StyledText {
    fn add_assign(&mut self, rhs: &str) {
        self.push_str(rhs);
    }
}

impl Extend<StyledText> for StyledText {
    fn extend<I: IntoIterator<Item = StyledText>>(&mut self, iter: I) {
        for text in iter {
            self.concat(&text);
        }
    }
}

impl FromIterator<StyledText> for StyledText {
    fn from_iter<I: IntoIterator<Item = StyledText>>(iter: I) -> Self {
        let mut joined = StyledText::default();
        joined.extend(iter);
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::style::Color;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn red() -> Style {
        Style::fg(Color::Red)
    }

    #[test]
    fn test_new_is_reset() {
        let text = StyledText::new("abc");
        assert_eq!(text.len(), 3);
        assert!(text.styles().iter().all(Style::is_reset));
        assert_eq!(text.serialize(), "\x1b[0mabc");
    }

    #[test]
    fn test_with_styles_pads_and_coerces() {
        let text = StyledText::with_styles("abcd", vec![Some(red()), None]);
        assert_eq!(text.styles().len(), 4);
        assert_eq!(text.style_at(0), Some(&red()));
        assert!(text.style_at(1).is_some_and(Style::is_reset));
        assert!(text.style_at(3).is_some_and(Style::is_reset));

        let text = StyledText::with_styles("ab", vec![Some(red()); 5]);
        assert_eq!(text.styles().len(), 2);
    }

    #[test]
    fn test_decode() {
        let text = StyledText::decode("ab\x1b[31mcd\x1b[0me");
        assert_eq!(text.plain(), "abcde");
        assert!(text.style_at(1).is_some_and(Style::is_reset));
        assert_eq!(text.style_at(2), Some(&red()));
        assert_eq!(text.style_at(3), Some(&red()));
        assert!(text.style_at(4).is_some_and(Style::is_reset));
    }

    #[test]
    fn test_decode_keeps_malformed_sequences() {
        let text = StyledText::decode("\x1b[31mab\x1b[3xc\x1b[");
        assert_eq!(text.plain(), "ab\x1b[3xc\x1b[");
        assert!(text.styles().iter().all(|s| *s == red()));
    }

    #[test]
    fn test_decode_keeps_out_of_range_sequences() {
        let text = StyledText::decode("a\x1b[38;5;300mb\x1b[31mc");
        assert_eq!(text.plain(), "a\x1b[38;5;300mbc");
        assert!(text.styles()[..text.len() - 1].iter().all(Style::is_reset));
        assert_eq!(text.style_at(text.len() - 1), Some(&red()));
    }

    #[test]
    fn test_slice() {
        let text = StyledText::with_style("hello", &red()) + "world";
        let part = text.slice(3..7);
        assert_eq!(part, "lowo");
        assert_eq!(part.style_at(1), Some(&red()));
        assert!(part.style_at(2).is_some_and(Style::is_reset));
        assert_eq!(text.slice(8..100), "ld");
        assert!(text.slice(20..).is_empty());
    }

    #[test]
    fn test_concat_plain_text() {
        let mut text = StyledText::with_style("ab", &red());
        text.push_str("cd");
        assert_eq!(text.len(), 4);
        assert_eq!(text.styles().len(), 4);
        assert!(text.style_at(3).is_some_and(Style::is_reset));
    }

    #[test]
    fn test_left_fixed() {
        let text = StyledText::with_style("abc", &red());
        let padded = text.left_fixed(5, &Style::bg(Color::Blue));
        assert_eq!(padded, "abc  ");
        assert_eq!(padded.style_at(4), Some(&Style::bg(Color::Blue)));

        let cut = text.left_fixed(2, &Style::reset());
        assert_eq!(cut, "ab");
        assert_eq!(text.left_fixed(0, &Style::reset()).len(), 0);
    }

    #[test]
    fn test_serialize_runs() {
        let text = StyledText::with_style("ab", &red()) + &StyledText::with_style("cd", &Style::fg(Color::Blue));
        assert_eq!(text.serialize(), "\x1b[31mab\x1b[34mcd\x1b[0m");

        let text = StyledText::with_style("ab", &red()) + "cd";
        assert_eq!(text.serialize(), "\x1b[31mab\x1b[0mcd");

        assert_eq!(StyledText::default().serialize(), "");
    }

    #[test]
    fn test_equality_ignores_style() {
        let plain = StyledText::new("same");
        let red = StyledText::with_style("same", &red());
        assert_eq!(plain, red);
        assert!(StyledText::new("a") < StyledText::with_style("b", &Style::reset()));
    }

    #[test]
    fn test_lines() {
        let text = StyledText::new("one\ntwo\n\nthree");
        let lines: Vec<String> = text.lines().map(|l| l.plain()).collect();
        assert_eq!(lines, vec!["one\n", "two\n", "\n", "three"]);
    }

    #[test]
    fn test_indent_helpers() {
        let line = StyledText::new("    x = 1\n");
        assert_eq!(line.indent_width(), 4);
        assert_eq!(line.trim_indent(2), "  x = 1\n");
        assert_eq!(StyledText::new("\n").trim_indent(4), "\n");
        assert!(StyledText::new("  \n").is_blank());
    }

    #[test]
    fn test_display_width() {
        assert_eq!(StyledText::new("日本").display_width(), 4);
        assert_eq!(StyledText::new("ab").display_width(), 2);
    }

    #[test]
    fn test_fit_width() {
        let text = StyledText::with_style("日本語", &red());
        let cut = text.fit_width(5, &Style::reset());
        assert_eq!(cut, "日本 ");
        assert_eq!(cut.display_width(), 5);
        assert_eq!(cut.style_at(1), Some(&red()));
        assert!(cut.style_at(2).is_some_and(Style::is_reset));

        assert_eq!(StyledText::new("ab").fit_width(4, &Style::reset()), "ab  ");
        assert_eq!(StyledText::new("abc").fit_width(2, &Style::reset()), "ab");
    }

    fn style_strategy() -> impl Strategy<Value = Style> {
        prop_oneof![
            Just(Style::reset()),
            Just(Style::fg(Color::Red)),
            Just(Style::fg(Color::Green).with_bold()),
            Just(Style::bg(Color::grey(4))),
            Just(Style::fg(Color::rgb(1, 2, 3)).with_bg(Color::Blue)),
        ]
    }

    fn styled_strategy() -> impl Strategy<Value = StyledText> {
        prop::collection::vec(("[a-z \n日]", style_strategy()), 0..40).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(s, style)| StyledText::with_style(&s, &style))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn serialize_round_trips(text in styled_strategy()) {
            let decoded = StyledText::decode(&text.serialize());
            prop_assert_eq!(decoded.chars(), text.chars());
            prop_assert_eq!(decoded.styles(), text.styles());
        }

        #[test]
        fn left_fixed_has_exact_width(text in styled_strategy(), n in 0usize..60) {
            prop_assert_eq!(text.left_fixed(n, &Style::reset()).len(), n);
        }

        #[test]
        fn fit_width_has_exact_display_width(text in styled_strategy(), n in 0usize..60) {
            prop_assert_eq!(text.fit_width(n, &Style::reset()).display_width(), n);
        }

        #[test]
        fn reserialize_is_stable(text in styled_strategy()) {
            let once = text.serialize();
            let twice = StyledText::decode(&once).serialize();
            prop_assert_eq!(once, twice);
        }
    }
}
