//! Structural analysis
//!
//! The analyzer passes the lexer's events through unchanged and adds
//! [`Event::DefBegin`] once a definition header (receiver, name and
//! parameter list) has been read, and [`Event::DefEnd`] once the
//! definition's closing `end` (or, for an endless definition, the end of
//! its statement) has been seen. Block nesting is tracked with a stack of
//! openers, with modifier `if`/`unless`/`while`/`until` and loop `do`
//! recognized so they do not open blocks.

use std::collections::VecDeque;

use super::lexer::Lexer;
use super::params::Signature;
use super::tokens::{Definition, Event, Position, TokenEvent, TokenKind};

/// Keywords after which an expression is complete
const VALUE_KEYWORDS: &[&str] = &[
    "end", "return", "break", "next", "redo", "retry", "self", "nil", "true", "false", "super",
    "yield", "__FILE__", "__LINE__", "__ENCODING__",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Def { endless: bool },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Name,
    AfterName,
    Params { parenthesized: bool },
    AfterParams,
}

/// A definition header being read
#[derive(Debug, Clone)]
struct Header {
    position: Position,
    depth: usize,
    stage: Stage,
    name: String,
    name_end: Position,
    receiver: Option<String>,
    params: Vec<TokenEvent>,
    nesting: usize,
}

impl Header {
    fn new(position: Position, depth: usize) -> Self {
        Self {
            position,
            depth,
            stage: Stage::Name,
            name: String::new(),
            name_end: position,
            receiver: None,
            params: Vec::new(),
            nesting: 0,
        }
    }

    fn extend_name(&mut self, token: &TokenEvent) {
        self.name.push_str(&token.text);
        self.name_end = Position::new(
            token.position.line,
            token.position.column + token.text.chars().count(),
        );
    }

    fn adjacent(&self, token: &TokenEvent) -> bool {
        token.position == self.name_end
    }
}

/// Outcome of feeding one token to a header
enum Step {
    Continue,
    /// Header complete; `reprocess` when the token belongs to the body
    Complete { endless: bool, reprocess: bool },
}

/// Lexer plus definition boundary events
pub struct Analyzer {
    lexer: Lexer,
    queue: VecDeque<Event>,
    blocks: Vec<Block>,
    header: Option<Header>,
    previous: Option<(TokenKind, String)>,
    loop_pending: bool,
}

impl Analyzer {
    pub fn new(source: &str) -> Self {
        Self::from_lexer(Lexer::new(source))
    }

    /// Analyze `source` whose first line is line `first_line` of a file
    pub fn starting_at_line(source: &str, first_line: usize) -> Self {
        Self::from_lexer(Lexer::starting_at_line(source, first_line))
    }

    fn from_lexer(lexer: Lexer) -> Self {
        Self {
            lexer,
            queue: VecDeque::new(),
            blocks: Vec::new(),
            header: None,
            previous: None,
            loop_pending: false,
        }
    }

    fn observe(&mut self, token: &TokenEvent) {
        let significant = !token.kind.is_trivia() || token.kind == TokenKind::Newline;

        if let Some(mut header) = self.header.take() {
            match Self::advance_header(&mut header, token) {
                Step::Continue => {
                    self.header = Some(header);
                    if significant {
                        self.remember(token);
                    }
                    return;
                }
                Step::Complete { endless, reprocess } => {
                    self.complete_header(header, endless);
                    if !reprocess {
                        if significant {
                            self.remember(token);
                        }
                        return;
                    }
                }
            }
        }

        if !significant {
            return;
        }
        self.track_blocks(token);
        self.remember(token);
    }

    fn remember(&mut self, token: &TokenEvent) {
        self.previous = Some((token.kind, token.text.clone()));
    }

    /// The previous token ends an expression, so a keyword here is a modifier
    fn after_value(&self) -> bool {
        use TokenKind::*;

        match &self.previous {
            Some((Keyword, text)) => VALUE_KEYWORDS.contains(&text.as_str()),
            Some((kind, _)) => matches!(
                kind,
                Ident
                    | Const
                    | Ivar
                    | Cvar
                    | Gvar
                    | Backref
                    | Int
                    | Float
                    | Char
                    | RParen
                    | RBracket
                    | RBrace
                    | StringEnd
                    | RegexpEnd
                    | HeredocBeg
            ),
            None => false,
        }
    }

    fn track_blocks(&mut self, token: &TokenEvent) {
        match token.kind {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.loop_pending = false;
                if self.blocks.last() == Some(&Block::Def { endless: true }) {
                    self.end_definition(token.position.line);
                }
                return;
            }
            TokenKind::Keyword => {}
            _ => return,
        }

        match token.text.as_str() {
            "def" => {
                self.blocks.push(Block::Def { endless: false });
                self.header = Some(Header::new(token.position, self.blocks.len()));
            }
            "class" | "module" | "begin" | "case" => self.blocks.push(Block::Other),
            "for" => {
                self.blocks.push(Block::Other);
                self.loop_pending = true;
            }
            "while" | "until" if !self.after_value() => {
                self.blocks.push(Block::Other);
                self.loop_pending = true;
            }
            "if" | "unless" if !self.after_value() => self.blocks.push(Block::Other),
            "do" if self.loop_pending => self.loop_pending = false,
            "do" => self.blocks.push(Block::Other),
            "end" => match self.blocks.last() {
                Some(Block::Def { .. }) => self.end_definition(token.position.line),
                Some(Block::Other) => {
                    self.blocks.pop();
                }
                None => tracing::trace!(line = token.position.line, "unmatched end"),
            },
            _ => {}
        }
    }

    fn end_definition(&mut self, line: usize) {
        let depth = self.blocks.len();
        self.blocks.pop();
        self.queue.push_back(Event::DefEnd { depth, line });
    }

    fn advance_header(header: &mut Header, token: &TokenEvent) -> Step {
        use TokenKind::*;

        let trivia = token.kind.is_trivia() && token.kind != Newline;

        match header.stage {
            Stage::Name => {
                if trivia {
                    return Step::Continue;
                }
                match token.kind {
                    LBracket if header.name.is_empty() => header.extend_name(token),
                    RBracket if header.name == "[" => {
                        header.extend_name(token);
                        header.stage = Stage::AfterName;
                    }
                    Newline | Semicolon => {
                        return Step::Complete {
                            endless: false,
                            reprocess: true,
                        }
                    }
                    _ => {
                        header.extend_name(token);
                        header.stage = Stage::AfterName;
                    }
                }
                Step::Continue
            }
            Stage::AfterName => {
                if trivia {
                    return Step::Continue;
                }
                match (token.kind, token.text.as_str()) {
                    (Period, _) => {
                        header.receiver = Some(std::mem::take(&mut header.name));
                        header.stage = Stage::Name;
                    }
                    // Setters and unary operators: `foo=`, `[]=`, `+@`
                    (Op, "=" | "@") if header.adjacent(token) => header.extend_name(token),
                    (LParen, _) => {
                        header.nesting = 1;
                        header.stage = Stage::Params {
                            parenthesized: true,
                        };
                    }
                    (Op, "=") => {
                        return Step::Complete {
                            endless: true,
                            reprocess: false,
                        }
                    }
                    (Newline | Semicolon, _) => {
                        return Step::Complete {
                            endless: false,
                            reprocess: true,
                        }
                    }
                    _ => {
                        header.params.push(token.clone());
                        header.stage = Stage::Params {
                            parenthesized: false,
                        };
                    }
                }
                Step::Continue
            }
            Stage::Params {
                parenthesized: true,
            } => {
                match token.kind {
                    LParen | LBracket | LBrace => header.nesting += 1,
                    RParen | RBracket | RBrace => {
                        header.nesting = header.nesting.saturating_sub(1);
                        if header.nesting == 0 {
                            header.stage = Stage::AfterParams;
                            return Step::Continue;
                        }
                    }
                    _ => {}
                }
                header.params.push(token.clone());
                Step::Continue
            }
            Stage::Params {
                parenthesized: false,
            } => match token.kind {
                Newline | Semicolon => Step::Complete {
                    endless: false,
                    reprocess: true,
                },
                _ => {
                    header.params.push(token.clone());
                    Step::Continue
                }
            },
            Stage::AfterParams => {
                if trivia {
                    return Step::Continue;
                }
                if token.kind == Op && token.text == "=" {
                    Step::Complete {
                        endless: true,
                        reprocess: false,
                    }
                } else {
                    Step::Complete {
                        endless: false,
                        reprocess: true,
                    }
                }
            }
        }
    }

    fn complete_header(&mut self, header: Header, endless: bool) {
        if endless {
            if let Some(block) = self.blocks.get_mut(header.depth - 1) {
                *block = Block::Def { endless: true };
            }
        }

        let signature = Signature::from_tokens(
            header.name,
            header.receiver,
            header.position.line,
            &header.params,
        );
        tracing::trace!(
            name = %signature.qualified_name(),
            line = header.position.line,
            depth = header.depth,
            endless,
            "definition header"
        );
        self.queue.push_back(Event::DefBegin(Definition {
            position: header.position,
            depth: header.depth,
            signature,
        }));
    }
}

impl Iterator for Analyzer {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            match self.lexer.next()? {
                Event::Token(token) => {
                    self.observe(&token);
                    // Boundary events follow the token that triggered them
                    self.queue.push_front(Event::Token(token));
                }
                other => self.queue.push_back(other),
            }
        }
    }
}

/// Every definition in `source`, in order of appearance
pub fn definitions(source: &str) -> Vec<Definition> {
    Analyzer::new(source)
        .filter_map(|event| match event {
            Event::DefBegin(definition) => Some(definition),
            _ => None,
        })
        .collect()
}
