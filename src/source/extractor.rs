//! Definition extraction
//!
//! Replays the token stream of a source file from a starting line, stops
//! once exactly one definition is complete and assembles the collected
//! tokens into one [`StyledText`] with the common indentation removed.

use std::path::Path;

use super::collector::{Fragment, TokenCollector};
use super::file::SourceFile;
use crate::ansi::StyledText;
use crate::config::Palette;
use crate::error::{Error, Result};
use crate::syntax::{Analyzer, Event, Lexer, TokenKind};

/// Keywords the delimiter-balance strategy counts as openers
const BALANCE_OPENERS: &[&str] = &[
    "do", "begin", "def", "class", "module", "if", "unless", "while", "until",
];

/// How the end of a definition is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Definition events from the analyzer
    #[default]
    Structural,
    /// Counting opener keywords against `end`
    DelimiterBalance,
}

/// Extracts single definitions as styled text
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    palette: Palette,
    strategy: Strategy,
}

impl Extractor {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            strategy: Strategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Extract the definition starting at `path:line`
    pub fn extract_at(&self, path: impl AsRef<Path>, line: usize) -> Result<StyledText> {
        let file = SourceFile::open(path)?;
        self.extract(&file, line)
    }

    /// Extract the definition at `path:line` together with its doc comment
    pub fn extract_method(&self, path: impl AsRef<Path>, line: usize) -> Result<StyledText> {
        let file = SourceFile::open(path)?;
        let start = file.comment_start(line);
        self.extract(&file, start)
    }

    /// Extract the first definition at or after `line`
    pub fn extract(&self, file: &SourceFile, line: usize) -> Result<StyledText> {
        let source = file.from_line(line)?;
        self.extract_str(source, line)
    }

    /// Extract from source text whose first line is `first_line`
    pub fn extract_str(&self, source: &str, first_line: usize) -> Result<StyledText> {
        let fragments = match self.strategy {
            Strategy::Structural => self.structural(source, first_line)?,
            Strategy::DelimiterBalance => self.balanced(source, first_line)?,
        };
        Ok(assemble(fragments))
    }

    fn structural(&self, source: &str, first_line: usize) -> Result<Vec<Fragment>> {
        let mut collector = TokenCollector::new(&self.palette);
        let mut events = Analyzer::starting_at_line(source, first_line);
        let mut target = None;

        while let Some(event) = events.next() {
            match event {
                Event::Token(token) => collector.push(token),
                Event::LiteralEnd(_) => collector.close_literal(),
                Event::DefBegin(definition) if target.is_none() => {
                    tracing::debug!(
                        name = %definition.signature.qualified_name(),
                        line = definition.position.line,
                        "definition begins"
                    );
                    target = Some(definition);
                }
                Event::DefBegin(_) => {}
                Event::DefEnd { depth, line } => {
                    if target.as_ref().is_some_and(|d| d.depth == depth) {
                        tracing::debug!(line, "definition ends");
                        collect_trailing(&mut collector, &mut events, line);
                        return Ok(collector.finish());
                    }
                }
            }
        }

        match target {
            Some(definition) => Err(Error::UnterminatedConstruct {
                line: definition.position.line,
            }),
            None => Err(Error::DefinitionNotFound { line: first_line }),
        }
    }

    fn balanced(&self, source: &str, first_line: usize) -> Result<Vec<Fragment>> {
        let mut collector = TokenCollector::new(&self.palette);
        let mut events = Lexer::starting_at_line(source, first_line);
        let mut depth = 0usize;
        let mut opened_at = None;

        while let Some(event) = events.next() {
            let token = match event {
                Event::Token(token) => token,
                Event::LiteralEnd(_) => {
                    collector.close_literal();
                    continue;
                }
                _ => continue,
            };

            let keyword = (token.kind == TokenKind::Keyword).then(|| token.text.clone());
            let line = token.position.line;
            collector.push(token);

            match keyword.as_deref() {
                Some(word) if BALANCE_OPENERS.contains(&word) => {
                    depth += 1;
                    opened_at.get_or_insert(line);
                }
                Some("end") if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        tracing::debug!(line, "construct balanced");
                        collect_trailing(&mut collector, &mut events, line);
                        return Ok(collector.finish());
                    }
                }
                _ => {}
            }
        }

        match opened_at {
            Some(line) => Err(Error::UnterminatedConstruct { line }),
            None => Err(Error::DefinitionNotFound { line: first_line }),
        }
    }
}

/// Keep spaces, a comment and the newline that follow the closing token
fn collect_trailing(
    collector: &mut TokenCollector<'_>,
    events: impl Iterator<Item = Event>,
    line: usize,
) {
    for event in events {
        let Event::Token(token) = event else {
            break;
        };
        if token.position.line != line {
            break;
        }
        match token.kind {
            TokenKind::Space | TokenKind::Comment => collector.push(token),
            TokenKind::Newline | TokenKind::IgnoredNewline => {
                collector.push(token);
                break;
            }
            _ => break,
        }
    }
}

/// Join fragments and strip the indentation common to all non-blank lines
fn assemble(fragments: Vec<Fragment>) -> StyledText {
    let text: StyledText = fragments.into_iter().map(|f| f.text).collect();
    let lines: Vec<StyledText> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|line| !line.is_blank())
        .map(StyledText::indent_width)
        .min()
        .unwrap_or(0);

    lines.iter().map(|line| line.trim_indent(indent)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::encode_name;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const ALPHA_BETA: &str = "def alpha(a, b=1)\n  if a > b\n    a\n  end\nend\ndef beta\nend\n";

    fn plain(strategy: Strategy, source: &str, line: usize) -> Result<String> {
        let file = SourceFile::from_string(source);
        Extractor::new(Palette::plain())
            .with_strategy(strategy)
            .extract(&file, line)
            .map(|text| text.plain())
    }

    #[test]
    fn test_extraction_boundary() {
        for strategy in [Strategy::Structural, Strategy::DelimiterBalance] {
            let text = plain(strategy, ALPHA_BETA, 1).unwrap();
            assert_eq!(text, "def alpha(a, b=1)\n  if a > b\n    a\n  end\nend\n");
            assert_eq!(text.lines().count(), 5);
        }
        assert_eq!(plain(Strategy::Structural, ALPHA_BETA, 6).unwrap(), "def beta\nend\n");
    }

    #[test]
    fn test_common_indent_is_removed() {
        let source = "class Foo\n  def bar\n    if x\n\n      y\n    end\n  end # bar\n\n  def baz; end\nend\n";
        assert_eq!(
            plain(Strategy::Structural, source, 2).unwrap(),
            "def bar\n  if x\n\n    y\n  end\nend # bar\n"
        );
    }

    #[test]
    fn test_starts_at_or_after_line() {
        let source = "x = 1\n\ndef later(y)\n  y\nend\n";
        assert_eq!(
            plain(Strategy::Structural, source, 2).unwrap(),
            "\ndef later(y)\n  y\nend\n"
        );
    }

    #[test]
    fn test_endless_definition() {
        let source = "  def twice(x) = x * 2\n  def other; end\n";
        assert_eq!(
            plain(Strategy::Structural, source, 1).unwrap(),
            "def twice(x) = x * 2\n"
        );
    }

    #[test]
    fn test_modifier_if_under_structural_strategy() {
        let source = "def a(x)\n  return 1 if x\n  2\nend\ndef b\nend\n";
        assert_eq!(
            plain(Strategy::Structural, source, 1).unwrap(),
            "def a(x)\n  return 1 if x\n  2\nend\n"
        );
    }

    #[test]
    fn test_local_variable_operands() {
        let half = "def half(a)\n  a /2\nend\ndef other\nend\n";
        let push = "def push(list, line)\n  list <<line\n  list\nend\n";
        for strategy in [Strategy::Structural, Strategy::DelimiterBalance] {
            assert_eq!(plain(strategy, half, 1).unwrap(), "def half(a)\n  a /2\nend\n");
            assert_eq!(plain(strategy, push, 1).unwrap(), push);
        }
    }

    #[test]
    fn test_not_found() {
        assert!(matches!(
            plain(Strategy::Structural, "x = 1\ny = 2\n", 1),
            Err(Error::DefinitionNotFound { line: 1 })
        ));
        assert!(matches!(
            plain(Strategy::DelimiterBalance, "x = 1\n", 1),
            Err(Error::DefinitionNotFound { line: 1 })
        ));
    }

    #[test]
    fn test_unterminated() {
        let source = "def open(a)\n  if a\n    1\n  end\n";
        assert!(matches!(
            plain(Strategy::Structural, source, 1),
            Err(Error::UnterminatedConstruct { line: 1 })
        ));
        assert!(matches!(
            plain(Strategy::DelimiterBalance, source, 1),
            Err(Error::UnterminatedConstruct { line: 1 })
        ));
    }

    #[test]
    fn test_line_out_of_range() {
        assert!(matches!(
            plain(Strategy::Structural, ALPHA_BETA, 40),
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_styles_survive_assembly() {
        let file = SourceFile::from_string("  def go\n    :ok\n  end\n");
        let text = Extractor::new(Palette::default()).extract(&file, 1).unwrap();
        assert_eq!(text.plain(), "def go\n  :ok\nend\n");
        assert_eq!(text.style_at(0), Some(&encode_name("bright_magenta").unwrap()));
        let ok = text.plain().find("ok").unwrap();
        assert_eq!(text.style_at(ok), Some(&encode_name("bright_cyan").unwrap()));

        let round_trip = StyledText::decode(&text.serialize());
        assert_eq!(round_trip.styles(), text.styles());
    }

    #[test]
    fn test_extract_method_includes_doc_comment() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            "x = 1\n\n  # Greets.\n  #\n  def hello(name)\n    puts name\n  end\n"
        )
        .unwrap();
        let extractor = Extractor::new(Palette::plain());

        let with_docs = extractor.extract_method(tmp.path(), 5).unwrap();
        assert_eq!(
            with_docs.plain(),
            "# Greets.\n#\ndef hello(name)\n  puts name\nend\n"
        );

        let bare = extractor.extract_at(tmp.path(), 5).unwrap();
        assert_eq!(bare.plain(), "def hello(name)\n  puts name\nend\n");

        assert!(matches!(
            extractor.extract_at(tmp.path().join("gone.rb"), 1),
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
