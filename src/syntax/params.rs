//! Parameter signatures
//!
//! A [`Signature`] is the shape of one definition's formal parameter list,
//! classified from the header tokens the analyzer collects between the
//! method name and the end of the parameter list.

use std::fmt;

use super::tokens::{TokenEvent, TokenKind};

/// Parameter list of one definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Method name, including any `?`, `!` or `=` suffix
    pub identifier: String,
    /// Explicit receiver (`self`, `Foo`) of a singleton definition
    pub receiver: Option<String>,
    /// Line of the `def` keyword
    pub line: usize,
    pub required_leading: Vec<String>,
    pub optional: Vec<String>,
    /// `*name`; an anonymous splat is the empty string, forwarding is `...`
    pub rest: Option<String>,
    pub required_trailing: Vec<String>,
    pub keyword_required: Vec<String>,
    pub keyword_optional: Vec<String>,
    /// `**name`; anonymous is the empty string
    pub keyword_rest: Option<String>,
    /// `&name`; anonymous is the empty string
    pub block: Option<String>,
}

impl Signature {
    /// Classify the tokens of a parameter list
    ///
    /// `tokens` is everything between the parentheses (or, without
    /// parentheses, up to the end of the header line).
    pub fn from_tokens(
        identifier: impl Into<String>,
        receiver: Option<String>,
        line: usize,
        tokens: &[TokenEvent],
    ) -> Self {
        let mut signature = Signature {
            identifier: identifier.into(),
            receiver,
            line,
            ..Default::default()
        };

        let mut past_optional = false;
        for segment in split_segments(tokens) {
            signature.classify(segment, &mut past_optional);
        }
        signature
    }

    fn classify(&mut self, segment: &[TokenEvent], past_optional: &mut bool) {
        let significant: Vec<&TokenEvent> =
            segment.iter().filter(|t| !t.kind.is_trivia()).collect();
        let Some(first) = significant.first() else {
            return;
        };
        let name_after = || {
            significant
                .get(1)
                .filter(|t| t.kind == TokenKind::Ident)
                .map_or_else(String::new, |t| t.text.clone())
        };

        match (first.kind, first.text.as_str()) {
            (TokenKind::Op, "*") => {
                self.rest = Some(name_after());
                *past_optional = true;
            }
            (TokenKind::Op, "...") => {
                self.rest = Some("...".to_string());
                *past_optional = true;
            }
            (TokenKind::Op, "**") => {
                let nil = significant
                    .get(1)
                    .is_some_and(|t| t.kind == TokenKind::Keyword && t.text == "nil");
                if !nil {
                    self.keyword_rest = Some(name_after());
                }
            }
            (TokenKind::Op, "&") => self.block = Some(name_after()),
            (TokenKind::Label, label) => {
                let name = label.trim_end_matches(':').to_string();
                if significant.len() > 1 {
                    self.keyword_optional.push(name);
                } else {
                    self.keyword_required.push(name);
                }
            }
            (TokenKind::Ident, name) => {
                let defaulted = significant
                    .get(1)
                    .is_some_and(|t| t.kind == TokenKind::Op && t.text == "=");
                if defaulted {
                    self.optional.push(name.to_string());
                    *past_optional = true;
                } else {
                    self.push_required(name.to_string(), *past_optional);
                }
            }
            (TokenKind::LParen, _) => {
                let text: String = segment.iter().map(|t| t.text.as_str()).collect();
                self.push_required(text.trim().to_string(), *past_optional);
            }
            _ => {}
        }
    }

    fn push_required(&mut self, name: String, trailing: bool) {
        if trailing {
            self.required_trailing.push(name);
        } else {
            self.required_leading.push(name);
        }
    }

    /// Every named parameter in declaration order
    pub fn params(&self) -> Vec<&str> {
        fn named(name: &Option<String>) -> Option<&str> {
            name.as_deref().filter(|n| !n.is_empty() && *n != "...")
        }

        self.required_leading
            .iter()
            .chain(&self.optional)
            .map(String::as_str)
            .chain(named(&self.rest))
            .chain(self.required_trailing.iter().map(String::as_str))
            .chain(self.keyword_required.iter().map(String::as_str))
            .chain(self.keyword_optional.iter().map(String::as_str))
            .chain(named(&self.keyword_rest))
            .chain(named(&self.block))
            .collect()
    }

    /// Method arity as the language reports it
    ///
    /// Negative when the method takes a variable number of arguments:
    /// `-(required + 1)`.
    pub fn arity(&self) -> isize {
        let mut required = self.required_leading.len() + self.required_trailing.len();
        if !self.keyword_required.is_empty() {
            required += 1;
        }

        let optional_keywords = self.keyword_required.is_empty()
            && (!self.keyword_optional.is_empty() || self.keyword_rest.is_some());
        let variable = !self.optional.is_empty() || self.rest.is_some() || optional_keywords;

        let required = required as isize;
        if variable {
            -(required + 1)
        } else {
            required
        }
    }

    /// Compact rendering: `a,b=?,*rest,c,k:,o:?,**kw,&blk`
    pub fn pretty(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.required_leading.iter().cloned());
        parts.extend(self.optional.iter().map(|n| format!("{n}=?")));
        if let Some(rest) = &self.rest {
            parts.push(match rest.as_str() {
                "..." => "...".to_string(),
                name => format!("*{name}"),
            });
        }
        parts.extend(self.required_trailing.iter().cloned());
        parts.extend(self.keyword_required.iter().map(|n| format!("{n}:")));
        parts.extend(self.keyword_optional.iter().map(|n| format!("{n}:?")));
        if let Some(kw) = &self.keyword_rest {
            parts.push(format!("**{kw}"));
        }
        if let Some(block) = &self.block {
            parts.push(format!("&{block}"));
        }
        parts.join(",")
    }

    /// Name with receiver: `Foo.bar` or `bar`
    pub fn qualified_name(&self) -> String {
        match &self.receiver {
            Some(receiver) => format!("{receiver}.{}", self.identifier),
            None => self.identifier.clone(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.qualified_name(), self.pretty())
    }
}

/// Split at commas that are not nested in brackets
fn split_segments(tokens: &[TokenEvent]) -> Vec<&[TokenEvent]> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Comma if depth == 0 => {
                segments.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&tokens[start..]);
    segments
}
