//! Token-position collector
//!
//! Buffers `(position, fragment)` pairs while a token stream is replayed,
//! styling each token through a [`Palette`]. Literal bodies carry no kind
//! of their own, so the collector keeps a stack of the openers of the
//! literals it is inside and colors bodies with the innermost one.

use crate::ansi::StyledText;
use crate::config::Palette;
use crate::syntax::{Position, TokenEvent, TokenKind};

/// One styled token at its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub position: Position,
    pub text: StyledText,
}

/// Buffer of styled tokens for one extraction
#[derive(Debug)]
pub struct TokenCollector<'a> {
    palette: &'a Palette,
    fragments: Vec<Fragment>,
    literals: Vec<TokenKind>,
    last: Option<TokenKind>,
}

impl<'a> TokenCollector<'a> {
    pub fn new(palette: &'a Palette) -> Self {
        Self {
            palette,
            fragments: Vec::new(),
            literals: Vec::new(),
            last: None,
        }
    }

    /// Kind whose style a token is drawn with
    fn styled_kind(&self, kind: TokenKind) -> TokenKind {
        // The name after a bare `:` belongs to the symbol
        if self.last == Some(TokenKind::SymBeg) {
            return TokenKind::SymBeg;
        }
        match self.literals.last() {
            Some(&host) if kind.is_literal_body() => host,
            _ => kind,
        }
    }

    pub fn push(&mut self, token: TokenEvent) {
        let style = self.palette.style_for(self.styled_kind(token.kind));
        if token.kind.opens_literal() {
            self.literals.push(token.kind);
        }
        self.last = Some(token.kind);
        self.fragments.push(Fragment {
            position: token.position,
            text: StyledText::with_style(&token.text, &style),
        });
    }

    /// The literal opened by the innermost opener is complete
    pub fn close_literal(&mut self) {
        self.literals.pop();
    }

    #[cfg(test)]
    fn literal_depth(&self) -> usize {
        self.literals.len()
    }

    /// Fragments sorted by position, same-line neighbours merged
    ///
    /// The sort is stable, so tokens reported at the same position keep
    /// the order they were pushed in.
    pub fn finish(mut self) -> Vec<Fragment> {
        self.fragments.sort_by_key(|f| f.position);

        let mut merged: Vec<Fragment> = Vec::with_capacity(self.fragments.len());
        for fragment in self.fragments {
            match merged.last_mut() {
                Some(last) if last.position.line == fragment.position.line => {
                    last.text += &fragment.text;
                }
                _ => merged.push(fragment),
            }
        }
        merged
    }
}
