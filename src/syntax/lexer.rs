//! Ruby lexer
//!
//! Produces a flat stream of [`Event::Token`]s in source order, plus an
//! [`Event::LiteralEnd`] after the closing token of every string-like
//! literal. Nothing is dropped: concatenating the token texts gives back
//! the input.
//!
//! The lexer keeps a stack of modes. Code is lexed token by token; string
//! bodies, word lists, regexps and heredocs are lexed as content chunks
//! (split at line ends and interpolations). `#{` pushes a code mode and
//! its matching `}` pops it, so interpolation nests to any depth.

use std::collections::{HashSet, VecDeque};

use super::tokens::{Event, Position, TokenEvent, TokenKind};

/// Reserved words
const KEYWORDS: &[&str] = &[
    "BEGIN", "END", "__ENCODING__", "__FILE__", "__LINE__", "alias", "and", "begin", "break",
    "case", "class", "def", "defined?", "do", "else", "elsif", "end", "ensure", "false", "for",
    "if", "in", "module", "next", "nil", "not", "or", "redo", "rescue", "retry", "return", "self",
    "super", "then", "true", "undef", "unless", "until", "when", "while", "yield",
];

/// Keywords that end an expression (an operator may follow them)
const VALUE_KEYWORDS: &[&str] = &[
    "end", "self", "nil", "true", "false", "__FILE__", "__LINE__", "__ENCODING__", "redo",
    "retry",
];

/// Operators, longest first
const OPERATORS: &[&str] = &[
    "**=", "<=>", "===", "<<=", ">>=", "&&=", "||=", "==", "!=", ">=", "<=", "&&", "||", "<<",
    ">>", "**", "=~", "!~", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "=>", "::", "&.",
    "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", "~", "?", ":",
];

/// Operators that assign to the name before them
const ASSIGNMENTS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "||=", "&&=", "|=", "&=", "^=", "<<=", ">>=",
];

/// Operator method names usable as symbols (`:<=>`), longest first
const SYMBOL_OPERATORS: &[&str] = &[
    "[]=", "<=>", "===", "[]", "==", "=~", "!=", "!~", "**", "+@", "-@", "<<", ">>", "<=", ">=",
    "+", "-", "*", "/", "%", "<", ">", "!", "~", "&", "|", "^", "`",
];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || (!c.is_ascii() && !c.is_whitespace())
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Closing delimiter for a percent-literal or quote opener
fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

/// A string-like literal being lexed
#[derive(Debug, Clone)]
struct Literal {
    opener: TokenKind,
    open: char,
    close: char,
    depth: usize,
    interpolate: bool,
    words: bool,
}

impl Literal {
    fn new(opener: TokenKind, open: char, interpolate: bool) -> Self {
        Self {
            opener,
            open,
            close: closing_delimiter(open),
            depth: 0,
            interpolate,
            words: matches!(opener, TokenKind::WordsBeg | TokenKind::QWordsBeg),
        }
    }

    fn nests(&self) -> bool {
        self.open != self.close
    }
}

/// A heredoc whose body is being (or will be) lexed
#[derive(Debug, Clone)]
struct Heredoc {
    id: String,
    indented_end: bool,
    interpolate: bool,
    line_start: bool,
}

#[derive(Debug, Clone)]
enum Mode {
    Code { braces: usize, parens: usize },
    Literal(Literal),
    Heredoc(Heredoc),
}

/// Ruby lexer over an in-memory source
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    modes: Vec<Mode>,
    pending_heredocs: Vec<Heredoc>,
    queue: VecDeque<Event>,
    last_kind: Option<TokenKind>,
    last_text: String,
    prev_kind: Option<TokenKind>,
    prev_text: String,
    space_before: bool,
    /// Local variables of the innermost `def` seen so far
    locals: HashSet<String>,
    in_def_header: bool,
    in_block_params: bool,
    done: bool,
}

impl Lexer {
    /// Lex `source`, numbering lines from 1
    pub fn new(source: &str) -> Self {
        Self::starting_at_line(source, 1)
    }

    /// Lex `source` whose first line is line `first_line` of a file
    pub fn starting_at_line(source: &str, first_line: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: first_line,
            column: 0,
            modes: vec![Mode::Code {
                braces: 0,
                parens: 0,
            }],
            pending_heredocs: Vec::new(),
            queue: VecDeque::new(),
            last_kind: None,
            last_text: String::new(),
            prev_kind: None,
            prev_text: String::new(),
            space_before: true,
            locals: HashSet::new(),
            in_def_header: false,
            in_block_params: false,
            done: false,
        }
    }

    // === Cursor ===

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn mark(&self) -> (usize, Position) {
        (self.pos, Position::new(self.line, self.column))
    }

    // === Emission ===

    /// Emit the text consumed since `start` as one token
    fn finish(&mut self, start: (usize, Position), kind: TokenKind) {
        let (from, position) = start;
        if from == self.pos {
            return;
        }
        let text: String = self.chars[from..self.pos].iter().collect();
        if matches!(self.modes.last(), Some(Mode::Code { .. })) {
            self.track(kind, &text);
        }
        self.queue
            .push_back(Event::Token(TokenEvent::new(position, kind, text)));
    }

    fn track(&mut self, kind: TokenKind, text: &str) {
        let trivia = matches!(
            kind,
            TokenKind::Space
                | TokenKind::Comment
                | TokenKind::EmbDocBeg
                | TokenKind::EmbDoc
                | TokenKind::EmbDocEnd
        );
        if !trivia {
            self.scope_locals(kind, text);
        }
        self.space_before = kind == TokenKind::Space;
        if !trivia {
            self.prev_kind = self.last_kind.replace(kind);
            std::mem::swap(&mut self.prev_text, &mut self.last_text);
            self.last_text.clear();
            self.last_text.push_str(text);
        }
    }

    /// Record parameters, block parameters and assignment targets
    ///
    /// Runs before `kind` becomes the last token.
    fn scope_locals(&mut self, kind: TokenKind, text: &str) {
        use TokenKind::*;

        match kind {
            Keyword if text == "def" => {
                self.locals.clear();
                self.in_def_header = true;
            }
            Newline | Semicolon => self.in_def_header = false,
            Ident if self.introduces_parameter() => {
                self.locals.insert(text.to_string());
            }
            Label if self.in_def_header && matches!(self.last_kind, Some(LParen | Comma)) => {
                self.locals.insert(text.trim_end_matches(':').to_string());
            }
            Op if text == "|" => {
                if self.in_block_params {
                    self.in_block_params = false;
                } else if self.last_kind == Some(LBrace) || self.last_is(Keyword, "do") {
                    self.in_block_params = true;
                }
            }
            Op if ASSIGNMENTS.contains(&text) && self.assigns_local() => {
                self.locals.insert(self.last_text.clone());
            }
            _ => {}
        }
    }

    /// An identifier at the cursor names a parameter
    fn introduces_parameter(&self) -> bool {
        let after_separator = matches!(
            self.last_kind,
            Some(TokenKind::LParen | TokenKind::Comma)
        ) || (self.last_kind == Some(TokenKind::Op)
            && matches!(self.last_text.as_str(), "*" | "**" | "&"));

        if self.in_block_params {
            return after_separator || self.last_is(TokenKind::Op, "|");
        }
        // `def greet name, greeting`
        let bare_first = self.last_kind == Some(TokenKind::Ident) && self.space_before;
        self.in_def_header && (after_separator || bare_first)
    }

    /// The last token is a plain name being assigned, not a method call
    fn assigns_local(&self) -> bool {
        self.last_kind == Some(TokenKind::Ident)
            && !matches!(self.prev_kind, Some(TokenKind::Period))
            && !self.prev_is(TokenKind::Op, "&.")
            && !self.prev_is(TokenKind::Op, "::")
            && !self.prev_is(TokenKind::Keyword, "def")
    }

    fn prev_is(&self, kind: TokenKind, text: &str) -> bool {
        self.prev_kind == Some(kind) && self.prev_text == text
    }

    /// The last token is a local variable read, so an operator follows
    fn last_is_local(&self) -> bool {
        self.last_kind == Some(TokenKind::Ident)
            && self.prev_kind != Some(TokenKind::Period)
            && !self.prev_is(TokenKind::Op, "&.")
            && self.locals.contains(&self.last_text)
    }

    fn last_is(&self, kind: TokenKind, text: &str) -> bool {
        self.last_kind == Some(kind) && self.last_text == text
    }

    /// True where an operand, not an operator, is expected
    fn value_expected(&self) -> bool {
        use TokenKind::*;

        match self.last_kind {
            None => true,
            // `def /(other)`, `def %(x)`: an operator method name follows
            Some(Keyword) if self.last_text == "def" => false,
            Some(Keyword) => !VALUE_KEYWORDS.contains(&self.last_text.as_str()),
            Some(Op) => !self.last_text.ends_with("::"),
            Some(
                Newline | IgnoredNewline | Semicolon | Comma | LParen | LBracket | LBrace
                | EmbExprBeg | Lambda | Label,
            ) => true,
            _ => false,
        }
    }

    /// `foo /re/`: a method name, a space, then no space after the operator
    fn argument_start(&self, operator_len: usize) -> bool {
        self.last_kind == Some(TokenKind::Ident)
            && !self.last_is_local()
            && self.space_before
            && self
                .peek_at(operator_len)
                .is_some_and(|c| !c.is_whitespace() && c != '=')
    }

    /// Method name position: after `def`, `.` or `&.`
    fn method_name_expected(&self) -> bool {
        self.last_is(TokenKind::Keyword, "def")
            || self.last_kind == Some(TokenKind::Period)
            || self.last_is(TokenKind::Op, "&.")
    }

    fn code_counters(&mut self) -> Option<(&mut usize, &mut usize)> {
        match self.modes.last_mut() {
            Some(Mode::Code { braces, parens }) => Some((braces, parens)),
            _ => None,
        }
    }

    // === Driver ===

    fn step(&mut self) {
        if self.at_eof() {
            self.done = true;
            return;
        }
        match self.modes.last() {
            Some(Mode::Literal(_)) => self.lex_literal(),
            Some(Mode::Heredoc(_)) => self.lex_heredoc(),
            _ => self.lex_code(),
        }
    }

    // === Code ===

    fn lex_code(&mut self) {
        if self.column == 0 && self.lex_line_start() {
            return;
        }

        let start = self.mark();
        let Some(c) = self.peek() else {
            return;
        };

        match c {
            '\n' => {
                let kind = if self.continues_expression() {
                    TokenKind::IgnoredNewline
                } else {
                    TokenKind::Newline
                };
                self.bump();
                self.finish(start, kind);
                self.begin_heredoc_bodies();
            }
            ' ' | '\t' | '\r' | '\x0c' => {
                self.lex_space();
                self.finish(start, TokenKind::Space);
            }
            '\\' if self.peek_at(1) == Some('\n') => {
                self.lex_space();
                self.finish(start, TokenKind::Space);
            }
            '#' => {
                self.bump_while(|c| c != '\n');
                self.finish(start, TokenKind::Comment);
            }
            c if c.is_ascii_digit() => {
                let kind = self.lex_number();
                self.finish(start, kind);
            }
            c if is_ident_start(c) => {
                let kind = self.lex_word();
                self.finish(start, kind);
            }
            '@' => {
                let kind = self.lex_instance_var();
                self.finish(start, kind);
            }
            '$' => {
                let kind = self.lex_global_var();
                self.finish(start, kind);
            }
            '"' => self.open_literal(start, TokenKind::StringBeg, 1, '"', true),
            '\'' => self.open_literal(start, TokenKind::StringBeg, 1, '\'', false),
            '`' if self.method_name_expected() => {
                self.bump();
                self.finish(start, TokenKind::Op);
            }
            '`' => self.open_literal(start, TokenKind::XStringBeg, 1, '`', true),
            ':' => self.lex_colon(start),
            '?' => self.lex_question(start),
            '%' => self.lex_percent(start),
            '/' => self.lex_slash(start),
            '<' => {
                if !self.lex_heredoc_start(start) {
                    self.lex_operator(start);
                }
            }
            '{' => {
                if let Some((braces, _)) = self.code_counters() {
                    *braces += 1;
                }
                self.bump();
                self.finish(start, TokenKind::LBrace);
            }
            '}' => self.lex_close_brace(start),
            '(' | '[' => {
                if let Some((_, parens)) = self.code_counters() {
                    *parens += 1;
                }
                self.bump();
                let kind = if c == '(' {
                    TokenKind::LParen
                } else {
                    TokenKind::LBracket
                };
                self.finish(start, kind);
            }
            ')' | ']' => {
                if let Some((_, parens)) = self.code_counters() {
                    *parens = parens.saturating_sub(1);
                }
                self.bump();
                let kind = if c == ')' {
                    TokenKind::RParen
                } else {
                    TokenKind::RBracket
                };
                self.finish(start, kind);
            }
            ',' => {
                self.bump();
                self.finish(start, TokenKind::Comma);
            }
            ';' => {
                self.bump();
                self.finish(start, TokenKind::Semicolon);
            }
            '.' => {
                if self.starts_with("...") {
                    self.bump_n(3);
                    self.finish(start, TokenKind::Op);
                } else if self.starts_with("..") {
                    self.bump_n(2);
                    self.finish(start, TokenKind::Op);
                } else {
                    self.bump();
                    self.finish(start, TokenKind::Period);
                }
            }
            '-' if self.peek_at(1) == Some('>') => {
                self.bump_n(2);
                self.finish(start, TokenKind::Lambda);
            }
            _ => self.lex_operator(start),
        }
    }

    /// Longest operator at the cursor; unknown characters are one-char operators
    fn lex_operator(&mut self, start: (usize, Position)) {
        let len = OPERATORS
            .iter()
            .find(|op| self.starts_with(op))
            .map_or(1, |op| op.chars().count());
        self.bump_n(len);
        self.finish(start, TokenKind::Op);
    }

    /// `=begin` blocks and `__END__` are only recognized at column 0
    fn lex_line_start(&mut self) -> bool {
        let line_is = |lexer: &Self, word: &str| {
            lexer.starts_with(word)
                && lexer
                    .peek_at(word.chars().count())
                    .map_or(true, |c| c.is_whitespace())
        };

        if line_is(self, "__END__") {
            let start = self.mark();
            self.bump_n(self.chars.len() - self.pos);
            self.finish(start, TokenKind::DataEnd);
            return true;
        }

        if !line_is(self, "=begin") {
            return false;
        }

        let start = self.mark();
        self.bump_line();
        self.finish(start, TokenKind::EmbDocBeg);
        while !self.at_eof() {
            let start = self.mark();
            let closing = line_is(self, "=end");
            self.bump_line();
            if closing {
                self.finish(start, TokenKind::EmbDocEnd);
                break;
            }
            self.finish(start, TokenKind::EmbDoc);
        }
        true
    }

    /// Consume through the end of the current line, newline included
    fn bump_line(&mut self) {
        self.bump_while(|c| c != '\n');
        self.bump();
    }

    fn lex_space(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\x0c') => {
                    self.bump();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.bump_n(2);
                }
                _ => break,
            }
        }
    }

    /// Whether a newline at the cursor continues the current expression
    fn continues_expression(&self) -> bool {
        if let Some(Mode::Code { parens, .. }) = self.modes.last() {
            if *parens > 0 {
                return true;
            }
        }

        // Leading-dot method chains continue on the next line
        let mut ahead = 1;
        while matches!(self.peek_at(ahead), Some(' ' | '\t')) {
            ahead += 1;
        }
        let leading_dot = self.peek_at(ahead) == Some('.') && self.peek_at(ahead + 1) != Some('.');
        let leading_safe_nav = self.peek_at(ahead) == Some('&') && self.peek_at(ahead + 1) == Some('.');
        if leading_dot || leading_safe_nav {
            return true;
        }

        match self.last_kind {
            Some(TokenKind::Op) => self.last_text != "|",
            Some(TokenKind::Comma | TokenKind::Period | TokenKind::Lambda) => true,
            Some(TokenKind::Keyword) => matches!(self.last_text.as_str(), "and" | "or" | "not"),
            _ => false,
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut kind = TokenKind::Int;

        if self.peek() == Some('0')
            && self
                .peek_at(1)
                .is_some_and(|c| matches!(c, 'x' | 'X' | 'b' | 'B' | 'o' | 'O' | 'd' | 'D'))
        {
            self.bump_n(2);
            self.bump_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.bump_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::Float;
                self.bump();
                self.bump_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let exponent = match self.peek_at(1) {
                    Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                    Some(c) => c.is_ascii_digit(),
                    None => false,
                };
                if exponent {
                    kind = TokenKind::Float;
                    self.bump_n(2);
                    self.bump_while(|c| c.is_ascii_digit());
                }
            }
        }

        // Rational and imaginary suffixes
        if matches!(self.peek(), Some('r' | 'i')) && !self.peek_at(1).is_some_and(is_ident_char) {
            self.bump();
        }
        kind
    }

    fn lex_word(&mut self) -> TokenKind {
        let from = self.pos;
        self.bump_while(is_ident_char);
        if matches!(self.peek(), Some('?' | '!'))
            && (self.peek_at(1) != Some('=') || self.peek_at(2) == Some('='))
        {
            self.bump();
        }
        let word: String = self.chars[from..self.pos].iter().collect();

        let after_dot = self.last_kind == Some(TokenKind::Period) || self.last_is(TokenKind::Op, "&.");
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') && !after_dot {
            self.bump();
            return TokenKind::Label;
        }

        if KEYWORDS.contains(&word.as_str()) && !self.method_name_expected() {
            TokenKind::Keyword
        } else if word.starts_with(|c: char| c.is_uppercase()) {
            TokenKind::Const
        } else {
            TokenKind::Ident
        }
    }

    fn lex_instance_var(&mut self) -> TokenKind {
        if self.peek_at(1) == Some('@') && self.peek_at(2).is_some_and(is_ident_start) {
            self.bump_n(2);
            self.bump_while(is_ident_char);
            TokenKind::Cvar
        } else if self.peek_at(1).is_some_and(is_ident_start) {
            self.bump();
            self.bump_while(is_ident_char);
            TokenKind::Ivar
        } else {
            self.bump();
            TokenKind::Op
        }
    }

    fn lex_global_var(&mut self) -> TokenKind {
        self.bump();
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.bump_while(is_ident_char);
                TokenKind::Gvar
            }
            Some(c) if c.is_ascii_digit() => {
                self.bump_while(|c| c.is_ascii_digit());
                TokenKind::Backref
            }
            Some('&' | '`' | '\'' | '+') => {
                self.bump();
                TokenKind::Backref
            }
            Some('-') if self.peek_at(1).is_some_and(is_ident_char) => {
                self.bump_n(2);
                TokenKind::Gvar
            }
            Some(c) if "~*$?!@/\\;,.=:<>\"0_".contains(c) => {
                self.bump();
                TokenKind::Gvar
            }
            _ => TokenKind::Op,
        }
    }

    // === Literals in code ===

    /// Emit an opening delimiter of `len` chars and enter the literal
    fn open_literal(
        &mut self,
        start: (usize, Position),
        opener: TokenKind,
        len: usize,
        open: char,
        interpolate: bool,
    ) {
        self.bump_n(len);
        self.finish(start, opener);
        self.modes
            .push(Mode::Literal(Literal::new(opener, open, interpolate)));
    }

    fn lex_colon(&mut self, start: (usize, Position)) {
        if self.peek_at(1) == Some(':') {
            self.bump_n(2);
            self.finish(start, TokenKind::Op);
            return;
        }

        let symbol_context = self.value_expected() || self.space_before;
        match self.peek_at(1) {
            Some('"') if symbol_context => {
                self.open_literal(start, TokenKind::SymBeg, 2, '"', true);
            }
            Some('\'') if symbol_context => {
                self.open_literal(start, TokenKind::SymBeg, 2, '\'', false);
            }
            Some(c) if symbol_context && (is_ident_start(c) || c == '@' || c == '$') => {
                self.bump();
                self.finish(start, TokenKind::SymBeg);
                let name = self.mark();
                let kind = match c {
                    '@' => self.lex_instance_var(),
                    '$' => self.lex_global_var(),
                    _ => self.lex_symbol_word(),
                };
                self.finish(name, kind);
                self.queue.push_back(Event::LiteralEnd(TokenKind::SymBeg));
            }
            Some(_) if symbol_context && self.symbol_operator_len() > 0 => {
                let len = self.symbol_operator_len();
                self.bump();
                self.finish(start, TokenKind::SymBeg);
                let name = self.mark();
                self.bump_n(len);
                self.finish(name, TokenKind::Op);
                self.queue.push_back(Event::LiteralEnd(TokenKind::SymBeg));
            }
            _ => {
                self.bump();
                self.finish(start, TokenKind::Op);
            }
        }
    }

    /// Name of a bare symbol: `foo`, `foo?`, `foo=`, `Foo`
    fn lex_symbol_word(&mut self) -> TokenKind {
        let from = self.pos;
        self.bump_while(is_ident_char);
        match self.peek() {
            Some('?' | '!') => {
                self.bump();
            }
            Some('=') if !matches!(self.peek_at(1), Some('=' | '~' | '>')) => {
                self.bump();
            }
            _ => {}
        }
        if self.chars[from].is_uppercase() {
            TokenKind::Const
        } else {
            TokenKind::Ident
        }
    }

    /// Length of an operator method name after a `:`
    fn symbol_operator_len(&self) -> usize {
        SYMBOL_OPERATORS
            .iter()
            .find(|op| op.chars().enumerate().all(|(i, c)| self.peek_at(1 + i) == Some(c)))
            .map_or(0, |op| op.chars().count())
    }

    fn lex_question(&mut self, start: (usize, Position)) {
        let char_literal = self.value_expected()
            && match self.peek_at(1) {
                Some('\\') => self.peek_at(2).is_some(),
                Some(c) => !c.is_whitespace() && !self.peek_at(2).is_some_and(is_ident_char),
                None => false,
            };

        if char_literal {
            self.bump();
            if self.bump() == Some('\\') {
                self.bump();
            }
            self.finish(start, TokenKind::Char);
        } else {
            self.bump();
            self.finish(start, TokenKind::Op);
        }
    }

    fn lex_percent(&mut self, start: (usize, Position)) {
        let literal_context = self.value_expected() || self.argument_start(1);
        let is_delimiter = |c: char| !c.is_alphanumeric() && !c.is_whitespace();
        let opening = match (self.peek_at(1), self.peek_at(2)) {
            (Some(t), Some(d)) if "qQwWiIrxs".contains(t) && is_delimiter(d) => Some((Some(t), d)),
            (Some(d), _) if is_delimiter(d) && d != '=' => Some((None, d)),
            _ => None,
        };

        let Some((kind_char, delimiter)) = opening.filter(|_| literal_context) else {
            let len = if self.peek_at(1) == Some('=') { 2 } else { 1 };
            self.bump_n(len);
            self.finish(start, TokenKind::Op);
            return;
        };

        let len = if kind_char.is_some() { 3 } else { 2 };
        let (opener, interpolate) = match kind_char {
            Some('q') => (TokenKind::StringBeg, false),
            Some('w' | 'i') => (TokenKind::QWordsBeg, false),
            Some('W' | 'I') => (TokenKind::WordsBeg, true),
            Some('r') => (TokenKind::RegexpBeg, true),
            Some('x') => (TokenKind::XStringBeg, true),
            Some('s') => (TokenKind::SymBeg, false),
            _ => (TokenKind::StringBeg, true),
        };
        self.open_literal(start, opener, len, delimiter, interpolate);
    }

    fn lex_slash(&mut self, start: (usize, Position)) {
        if self.value_expected() || self.argument_start(1) {
            self.open_literal(start, TokenKind::RegexpBeg, 1, '/', true);
            return;
        }
        let len = if self.peek_at(1) == Some('=') { 2 } else { 1 };
        self.bump_n(len);
        self.finish(start, TokenKind::Op);
    }

    /// `<<~ID`, `<<-ID`, `<<ID`, `<<~'ID'`, `<<~"ID"`
    fn lex_heredoc_start(&mut self, start: (usize, Position)) -> bool {
        if !self.starts_with("<<") {
            return false;
        }
        if !(self.value_expected() || self.argument_start(2)) {
            return false;
        }

        let mut offset = 2;
        let indented_end = matches!(self.peek_at(offset), Some('~' | '-'));
        if indented_end {
            offset += 1;
        }

        let quote = match self.peek_at(offset) {
            Some(q @ ('\'' | '"' | '`')) => Some(q),
            _ => None,
        };
        let name_from = offset + usize::from(quote.is_some());
        let mut name_to = name_from;
        while self.peek_at(name_to).is_some_and(|c| match quote {
            Some(q) => c != q && c != '\n',
            None => is_ident_char(c),
        }) {
            name_to += 1;
        }
        if name_to == name_from {
            return false;
        }
        if let Some(q) = quote {
            if self.peek_at(name_to) != Some(q) {
                return false;
            }
        }

        let id: String = (name_from..name_to).filter_map(|i| self.peek_at(i)).collect();
        let total = name_to + usize::from(quote.is_some());
        self.bump_n(total);
        self.finish(start, TokenKind::HeredocBeg);
        self.pending_heredocs.push(Heredoc {
            id,
            indented_end,
            interpolate: quote != Some('\''),
            line_start: true,
        });
        true
    }

    /// After a newline, read the bodies of heredocs started on that line
    fn begin_heredoc_bodies(&mut self) {
        for heredoc in self.pending_heredocs.drain(..).rev() {
            self.modes.push(Mode::Heredoc(heredoc));
        }
    }

    fn lex_close_brace(&mut self, start: (usize, Position)) {
        let in_interpolation = self.modes.len() > 1;
        let closes_interpolation = match self.modes.last_mut() {
            Some(Mode::Code { braces, .. }) if *braces > 0 => {
                *braces -= 1;
                false
            }
            Some(Mode::Code { .. }) => in_interpolation,
            _ => false,
        };

        self.bump();
        if closes_interpolation {
            self.finish(start, TokenKind::EmbExprEnd);
            self.modes.pop();
        } else {
            self.finish(start, TokenKind::RBrace);
        }
    }

    // === Literal bodies ===

    fn lex_literal(&mut self) {
        let Some(Mode::Literal(mut literal)) = self.modes.last().cloned() else {
            return;
        };
        let start = self.mark();
        let Some(c) = self.peek() else {
            return;
        };

        if c == literal.close && literal.depth == 0 {
            self.bump();
            let closer = if literal.opener == TokenKind::RegexpBeg {
                self.bump_while(|c| c.is_ascii_alphabetic());
                TokenKind::RegexpEnd
            } else {
                TokenKind::StringEnd
            };
            self.modes.pop();
            self.finish(start, closer);
            self.queue.push_back(Event::LiteralEnd(literal.opener));
            return;
        }

        if literal.interpolate && self.lex_interpolation(start) {
            return;
        }

        if literal.words && c.is_whitespace() {
            self.bump_while(char::is_whitespace);
            self.finish(start, TokenKind::WordsSep);
            return;
        }

        while let Some(c) = self.peek() {
            if c == literal.close && literal.depth == 0 {
                break;
            }
            if literal.words && c.is_whitespace() {
                break;
            }
            if literal.interpolate && self.interpolation_ahead() {
                break;
            }
            self.bump();
            match c {
                '\\' => {
                    if self.bump() == Some('\n') {
                        break;
                    }
                }
                '\n' => break,
                c if literal.nests() && c == literal.open => literal.depth += 1,
                c if literal.nests() && c == literal.close => literal.depth -= 1,
                _ => {}
            }
        }

        if let Some(Mode::Literal(current)) = self.modes.last_mut() {
            current.depth = literal.depth;
        }
        self.finish(start, TokenKind::StringContent);
    }

    fn interpolation_ahead(&self) -> bool {
        self.peek() == Some('#')
            && match self.peek_at(1) {
                Some('{') => true,
                Some('@') => self
                    .peek_at(2)
                    .is_some_and(|c| is_ident_start(c) || c == '@'),
                Some('$') => self.peek_at(2).is_some_and(is_ident_start),
                _ => false,
            }
    }

    /// `#{` enters code; `#@var` and `#$var` are lexed in place
    fn lex_interpolation(&mut self, start: (usize, Position)) -> bool {
        if !self.interpolation_ahead() {
            return false;
        }

        if self.peek_at(1) == Some('{') {
            self.bump_n(2);
            self.finish(start, TokenKind::EmbExprBeg);
            self.modes.push(Mode::Code {
                braces: 0,
                parens: 0,
            });
            self.track(TokenKind::EmbExprBeg, "#{");
            return true;
        }

        self.bump();
        self.finish(start, TokenKind::EmbVar);
        let var = self.mark();
        let kind = if self.peek() == Some('@') {
            self.lex_instance_var()
        } else {
            self.lex_global_var()
        };
        self.finish(var, kind);
        true
    }

    fn lex_heredoc(&mut self) {
        let Some(Mode::Heredoc(heredoc)) = self.modes.last().cloned() else {
            return;
        };
        let start = self.mark();

        if heredoc.line_start {
            let line_end = self.chars[self.pos..]
                .iter()
                .position(|&c| c == '\n')
                .map_or(self.chars.len(), |i| self.pos + i);
            let line: String = self.chars[self.pos..line_end].iter().collect();
            let line = line.trim_end_matches('\r');
            let candidate = if heredoc.indented_end {
                line.trim_start()
            } else {
                line
            };

            if candidate == heredoc.id {
                self.bump_line();
                self.finish(start, TokenKind::HeredocEnd);
                self.modes.pop();
                self.queue.push_back(Event::LiteralEnd(TokenKind::HeredocBeg));
                // Code resumes at the start of a statement
                self.track(TokenKind::Newline, "\n");
                return;
            }
            self.set_heredoc_line_start(false);
        }

        if heredoc.interpolate && self.lex_interpolation(start) {
            return;
        }

        while let Some(c) = self.peek() {
            if heredoc.interpolate && self.interpolation_ahead() {
                break;
            }
            self.bump();
            if c == '\\' {
                if self.bump() == Some('\n') {
                    self.set_heredoc_line_start(true);
                    break;
                }
            } else if c == '\n' {
                self.set_heredoc_line_start(true);
                break;
            }
        }
        self.finish(start, TokenKind::StringContent);
    }

    fn set_heredoc_line_start(&mut self, value: bool) {
        if let Some(Mode::Heredoc(heredoc)) = self.modes.last_mut() {
            heredoc.line_start = value;
        }
    }
}

impl Iterator for Lexer {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            self.step();
        }
    }
}

/// Lex a whole source into tokens, dropping literal-end markers
pub fn tokenize(source: &str) -> Vec<TokenEvent> {
    Lexer::new(source)
        .filter_map(|event| match event {
            Event::Token(token) => Some(token),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Space)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn kind_of(source: &str, text: &str) -> TokenKind {
        tokenize(source)
            .into_iter()
            .find(|t| t.text == text)
            .map(|t| t.kind)
            .unwrap_or_else(|| panic!("no token {text:?} in {source:?}"))
    }

    #[test]
    fn test_simple_definition() {
        use TokenKind::*;
        let tokens = kinds("def alpha(a, b=1)\n  a\nend\n");
        let expected: Vec<(TokenKind, String)> = vec![
            (Keyword, "def"),
            (Ident, "alpha"),
            (LParen, "("),
            (Ident, "a"),
            (Comma, ","),
            (Ident, "b"),
            (Op, "="),
            (Int, "1"),
            (RParen, ")"),
            (Newline, "\n"),
            (Ident, "a"),
            (Newline, "\n"),
            (Keyword, "end"),
            (Newline, "\n"),
        ]
        .into_iter()
        .map(|(k, t)| (k, t.to_string()))
        .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("x = 1\n  y\n");
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(y.position, Position::new(2, 2));

        let tokens: Vec<TokenEvent> = Lexer::starting_at_line("z\n", 40)
            .filter_map(|e| match e {
                Event::Token(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tokens[0].position, Position::new(40, 0));
    }

    #[test]
    fn test_names_and_variables() {
        assert_eq!(kind_of("Foo::Bar", "Foo"), TokenKind::Const);
        assert_eq!(kind_of("@count += 1", "@count"), TokenKind::Ivar);
        assert_eq!(kind_of("@@all", "@@all"), TokenKind::Cvar);
        assert_eq!(kind_of("$stdout.puts", "$stdout"), TokenKind::Gvar);
        assert_eq!(kind_of("$1", "$1"), TokenKind::Backref);
        assert_eq!(kind_of("empty? x", "empty?"), TokenKind::Ident);
        assert_eq!(kind_of("foo(key: 1)", "key:"), TokenKind::Label);
        assert_eq!(kind_of("self.class", "class"), TokenKind::Ident);
        assert_eq!(kind_of("defined?(x)", "defined?"), TokenKind::Keyword);
        assert_eq!(kind_of("a != b", "!="), TokenKind::Op);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kind_of("x = 1_000", "1_000"), TokenKind::Int);
        assert_eq!(kind_of("x = 0xff", "0xff"), TokenKind::Int);
        assert_eq!(kind_of("x = 3.25", "3.25"), TokenKind::Float);
        assert_eq!(kind_of("x = 1e-3", "1e-3"), TokenKind::Float);
        assert_eq!(kind_of("1..2", "1"), TokenKind::Int);
        assert_eq!(kind_of("1..2", ".."), TokenKind::Op);
    }

    #[test]
    fn test_string_with_interpolation() {
        use TokenKind::*;
        let events: Vec<Event> = Lexer::new(r#""a#{b}c""#).collect();
        let expected = vec![
            Event::Token(TokenEvent::new(Position::new(1, 0), StringBeg, "\"")),
            Event::Token(TokenEvent::new(Position::new(1, 1), StringContent, "a")),
            Event::Token(TokenEvent::new(Position::new(1, 2), EmbExprBeg, "#{")),
            Event::Token(TokenEvent::new(Position::new(1, 4), Ident, "b")),
            Event::Token(TokenEvent::new(Position::new(1, 5), EmbExprEnd, "}")),
            Event::Token(TokenEvent::new(Position::new(1, 6), StringContent, "c")),
            Event::Token(TokenEvent::new(Position::new(1, 7), StringEnd, "\"")),
            Event::LiteralEnd(StringBeg),
        ];
        assert_eq!(events, expected);
    }

    #[test]
    fn test_nested_interpolation() {
        let source = r#""x #{y + "z #{w.map { |v| v }}"} done""#;
        let tokens = tokenize(source);
        let text: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, source);
        assert_eq!(kind_of(source, "w"), TokenKind::Ident);
        assert_eq!(kind_of(source, " done"), TokenKind::StringContent);
        let literal_ends = Lexer::new(source)
            .filter(|e| matches!(e, Event::LiteralEnd(_)))
            .count();
        assert_eq!(literal_ends, 2);
    }

    #[test]
    fn test_single_quotes_do_not_interpolate() {
        let tokens = kinds("'#{x}'");
        assert_eq!(tokens[1], (TokenKind::StringContent, "#{x}".to_string()));
    }

    #[test]
    fn test_symbols() {
        use TokenKind::*;
        let events: Vec<Event> = Lexer::new(":foo").collect();
        assert_eq!(
            events,
            vec![
                Event::Token(TokenEvent::new(Position::new(1, 0), SymBeg, ":")),
                Event::Token(TokenEvent::new(Position::new(1, 1), Ident, "foo")),
                Event::LiteralEnd(SymBeg),
            ]
        );
        assert_eq!(kind_of("x = :<=>", "<=>"), Op);
        assert_eq!(kind_of(r#"x = :"dyn""#, ":\""), SymBeg);
        assert_eq!(kind_of("a ? b : c", ":"), Op);
        assert_eq!(kind_of("send :name=, 1", "name="), Ident);
    }

    #[test]
    fn test_regexp_versus_division() {
        assert_eq!(kind_of("x = a / b", "/"), TokenKind::Op);
        assert_eq!(kind_of("x =~ /ab+c/i", "/"), TokenKind::RegexpBeg);
        assert_eq!(kind_of("x =~ /ab+c/i", "/i"), TokenKind::RegexpEnd);
        assert_eq!(kind_of("split /,/", "/"), TokenKind::RegexpBeg);
        assert_eq!(kind_of("x = a /2", "/"), TokenKind::RegexpBeg);
    }

    #[test]
    fn test_locals_are_operands() {
        use TokenKind::*;
        assert_eq!(kind_of("def half(a)\n  a /2\nend\n", "/"), Op);
        assert_eq!(kind_of("def push(list, line)\n  list <<line\nend\n", "<<"), Op);
        assert_eq!(kind_of("def half a\n  a /2\nend\n", "/"), Op);
        assert_eq!(kind_of("def f(k: 1)\n  k %2\nend\n", "%"), Op);
        assert_eq!(kind_of("def f\n  n = 4\n  n /2\nend\n", "/"), Op);
        assert_eq!(kind_of("def f\n  n ||= 4\n  n <<x\nend\n", "<<"), Op);
        assert_eq!(kind_of("list.each { |v| v /2 }", "/"), Op);
        assert_eq!(kind_of("list.each do |a, *b| b /2 end", "/"), Op);
    }

    #[test]
    fn test_method_calls_still_take_literal_arguments() {
        use TokenKind::*;
        // Not a local: a method call with a regexp argument
        assert_eq!(kind_of("def f(a)\n  split /,/\nend\n", "/"), RegexpBeg);
        // Attribute writes do not declare locals
        assert_eq!(kind_of("def f\n  self.n = 1\n  n /x/\nend\n", "/"), RegexpBeg);
        // A new definition starts a new scope
        assert_eq!(kind_of("def f(a)\nend\ndef g\n  a /x/\nend\n", "/"), RegexpBeg);
        assert_eq!(kind_of("def f(a)\n  x.a /2\nend\n", "/"), RegexpBeg);
    }

    #[test]
    fn test_percent_literals() {
        use TokenKind::*;
        let tokens = kinds("%w[a b]");
        assert_eq!(
            tokens,
            vec![
                (QWordsBeg, "%w[".to_string()),
                (StringContent, "a".to_string()),
                (WordsSep, " ".to_string()),
                (StringContent, "b".to_string()),
                (StringEnd, "]".to_string()),
            ]
        );
        assert_eq!(kind_of("x = %q(a (b) c)", ")"), StringEnd);
        assert_eq!(kind_of("x = %r{a}i", "%r{"), RegexpBeg);
        assert_eq!(kind_of("x = 10 % 3", "%"), Op);
    }

    #[test]
    fn test_heredoc() {
        use TokenKind::*;
        let source = "x = <<~EOS.strip\n  hello #{name}\nEOS\ny\n";
        let tokens = tokenize(source);
        let text: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, source);
        assert_eq!(kind_of(source, "<<~EOS"), HeredocBeg);
        assert_eq!(kind_of(source, "strip"), Ident);
        assert_eq!(kind_of(source, "  hello "), StringContent);
        assert_eq!(kind_of(source, "name"), Ident);
        assert_eq!(kind_of(source, "EOS\n"), HeredocEnd);
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(y.position, Position::new(4, 0));
    }

    #[test]
    fn test_shift_is_not_heredoc() {
        assert_eq!(kind_of("a << b", "<<"), TokenKind::Op);
        assert_eq!(kind_of("class << self", "<<"), TokenKind::Op);
    }

    #[test]
    fn test_comments_and_embdoc() {
        use TokenKind::*;
        assert_eq!(kind_of("x # note", "# note"), Comment);
        let tokens = kinds("=begin\ndocs\n=end\nx\n");
        assert_eq!(tokens[0].0, EmbDocBeg);
        assert_eq!(tokens[1], (EmbDoc, "docs\n".to_string()));
        assert_eq!(tokens[2], (EmbDocEnd, "=end\n".to_string()));
        assert_eq!(tokens[3], (Ident, "x".to_string()));
    }

    #[test]
    fn test_data_end() {
        let tokens = kinds("x\n__END__\nnot code\n");
        assert_eq!(tokens.last().unwrap(), &(TokenKind::DataEnd, "__END__\nnot code\n".to_string()));
    }

    #[test]
    fn test_ignored_newlines() {
        use TokenKind::*;
        assert_eq!(kind_of("a +\nb", "\n"), IgnoredNewline);
        assert_eq!(kind_of("foo(a,\nb)", "\n"), IgnoredNewline);
        assert_eq!(kind_of("a\n  .b", "\n"), IgnoredNewline);
        assert_eq!(kind_of("a\nb", "\n"), Newline);
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(kind_of("x = ?a", "?a"), TokenKind::Char);
        assert_eq!(kind_of("a ? b : c", "?"), TokenKind::Op);
    }

    proptest! {
        #[test]
        fn tokens_cover_the_source(source in r##"[a-z0-9 :@$'"#{}()\[\]/%<~\n.=+?,-]{0,60}"##) {
            let text: String = tokenize(&source).iter().map(|t| t.text.as_str()).collect();
            prop_assert_eq!(text, source);
        }
    }
}
