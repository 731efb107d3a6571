//! Token types for Ruby source
//!
//! This module defines the lexical token kinds reported by the lexer,
//! the semantic roles they are colored by, and the events the lexer and
//! analyzer hand to their consumers.

use super::params::Signature;

/// Lexical token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Local names and method names (`foo`, `empty?`)
    Ident,
    /// Capitalized names (`Foo`)
    Const,
    /// Reserved words (`def`, `end`, `if`)
    Keyword,
    /// Hash keys and keyword parameters (`name:`)
    Label,
    /// `@name`
    Ivar,
    /// `@@name`
    Cvar,
    /// `$name`, `$!`
    Gvar,
    /// `$1`, `$&`
    Backref,
    /// Integer literals
    Int,
    /// Float literals
    Float,
    /// Operators (`+`, `==`, `&&`, `::`)
    Op,
    /// `.`
    Period,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `->`
    Lambda,
    /// `"`, `'`, `%q(`, `%Q(`
    StringBeg,
    /// Literal body text
    StringContent,
    /// Closing delimiter of strings, symbols and word lists
    StringEnd,
    /// Backtick or `%x(`
    XStringBeg,
    /// `/` or `%r{`
    RegexpBeg,
    /// Closing delimiter and flags of a regexp
    RegexpEnd,
    /// `:` of a symbol, `:"` of a quoted symbol, `%s(`
    SymBeg,
    /// `%W(`, `%I(`
    WordsBeg,
    /// `%w(`, `%i(`
    QWordsBeg,
    /// Whitespace between words of a word list
    WordsSep,
    /// `<<~EOS`
    HeredocBeg,
    /// Terminating line of a heredoc
    HeredocEnd,
    /// `#{`
    EmbExprBeg,
    /// `}` closing an interpolation
    EmbExprEnd,
    /// `#` of `#@var` interpolation
    EmbVar,
    /// `?a`
    Char,
    /// `# ...`
    Comment,
    /// `=begin`
    EmbDocBeg,
    /// Line inside `=begin` / `=end`
    EmbDoc,
    /// `=end`
    EmbDocEnd,
    /// Spaces, tabs and escaped newlines
    Space,
    /// Newline that ends a statement
    Newline,
    /// Newline inside an expression
    IgnoredNewline,
    /// `__END__` and everything after it
    DataEnd,
}

impl TokenKind {
    /// Semantic role used for coloring, if any
    pub fn role(&self) -> Option<Role> {
        use TokenKind::*;

        match self {
            Char | StringBeg | StringContent | StringEnd | XStringBeg | WordsBeg | QWordsBeg
            | WordsSep | HeredocBeg | HeredocEnd => Some(Role::String),
            RegexpBeg | RegexpEnd => Some(Role::Regexp),
            SymBeg => Some(Role::Symbol),
            Int | Float => Some(Role::Number),
            Const => Some(Role::Constant),
            Comment | EmbDocBeg | EmbDoc | EmbDocEnd | DataEnd => Some(Role::Comment),
            Ident | Label => Some(Role::Identifier),
            Keyword => Some(Role::Keyword),
            Ivar | Cvar | Gvar | EmbVar => Some(Role::Variable),
            Space | Newline | IgnoredNewline => Some(Role::Whitespace),
            Op | Period | Lambda => Some(Role::Operator),
            Comma | Semicolon | LParen | RParen | LBracket | RBracket | LBrace | RBrace
            | EmbExprBeg | EmbExprEnd => Some(Role::Punctuation),
            Backref => None,
        }
    }

    /// Opening delimiter of a literal whose body takes its color
    pub fn opens_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::StringBeg
                | TokenKind::XStringBeg
                | TokenKind::RegexpBeg
                | TokenKind::SymBeg
                | TokenKind::WordsBeg
                | TokenKind::QWordsBeg
                | TokenKind::HeredocBeg
        )
    }

    /// Body or closing token that carries no color of its own
    pub fn is_literal_body(&self) -> bool {
        matches!(
            self,
            TokenKind::StringContent
                | TokenKind::StringEnd
                | TokenKind::RegexpEnd
                | TokenKind::HeredocEnd
                | TokenKind::WordsSep
        )
    }

    /// Whitespace, newlines and comments
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Space
                | TokenKind::Newline
                | TokenKind::IgnoredNewline
                | TokenKind::Comment
                | TokenKind::EmbDocBeg
                | TokenKind::EmbDoc
                | TokenKind::EmbDocEnd
        )
    }

    /// Either kind of newline
    pub fn is_newline(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::IgnoredNewline)
    }
}

/// Coloring roles a palette assigns styles to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    String,
    Regexp,
    Symbol,
    Number,
    Constant,
    Comment,
    Identifier,
    Keyword,
    Variable,
    Whitespace,
    Operator,
    Punctuation,
}

impl Role {
    /// Every role, in configuration order
    pub const ALL: [Role; 12] = [
        Role::String,
        Role::Regexp,
        Role::Symbol,
        Role::Number,
        Role::Constant,
        Role::Comment,
        Role::Identifier,
        Role::Keyword,
        Role::Variable,
        Role::Whitespace,
        Role::Operator,
        Role::Punctuation,
    ];

    /// Default symbolic style name for this role
    pub fn default_style_name(&self) -> &'static str {
        match self {
            Role::String => "green",
            Role::Regexp => "red",
            Role::Symbol => "bright_cyan",
            Role::Number => "cyan",
            Role::Constant => "bright_yellow",
            Role::Comment => "italic_grey12",
            Role::Identifier => "white",
            Role::Keyword => "bright_magenta",
            Role::Variable => "bright_blue",
            Role::Whitespace => "normal",
            Role::Operator => "bright_white",
            Role::Punctuation => "normal",
        }
    }

    /// Name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Role::String => "string",
            Role::Regexp => "regexp",
            Role::Symbol => "symbol",
            Role::Number => "number",
            Role::Constant => "constant",
            Role::Comment => "comment",
            Role::Identifier => "identifier",
            Role::Keyword => "keyword",
            Role::Variable => "variable",
            Role::Whitespace => "whitespace",
            Role::Operator => "operator",
            Role::Punctuation => "punctuation",
        }
    }

    /// Parse a role from its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.name() == name)
    }
}

/// Source position: 1-based line, 0-based character column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEvent {
    pub position: Position,
    pub kind: TokenKind,
    pub text: String,
}

impl TokenEvent {
    pub fn new(position: Position, kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            position,
            kind,
            text: text.into(),
        }
    }
}

/// A definition reported by the analyzer when its header is complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Position of the `def` keyword
    pub position: Position,
    /// Number of blocks enclosing the definition, itself included
    pub depth: usize,
    pub signature: Signature,
}

/// Events produced while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A token, in source order
    Token(TokenEvent),
    /// The literal opened by a token of the given kind is complete
    LiteralEnd(TokenKind),
    /// A `def` header was parsed
    DefBegin(Definition),
    /// The definition at `depth` is closed; `line` holds its last token
    DefEnd { depth: usize, line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_valid_default() {
        for role in Role::ALL {
            assert!(
                crate::ansi::encode_name(role.default_style_name()).is_ok(),
                "{role:?}"
            );
        }
    }

    #[test]
    fn test_from_name_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.name()), Some(role));
        }
        assert_eq!(Role::from_name("InvalidRole"), None);
        assert_eq!(Role::from_name(""), None);
    }

    #[test]
    fn test_literal_classification() {
        assert!(TokenKind::StringBeg.opens_literal());
        assert!(TokenKind::HeredocBeg.opens_literal());
        assert!(!TokenKind::StringContent.opens_literal());
        assert!(TokenKind::StringContent.is_literal_body());
        assert!(!TokenKind::Ident.is_literal_body());
        assert_eq!(TokenKind::RegexpEnd.role(), Some(Role::Regexp));
        assert_eq!(TokenKind::Backref.role(), None);
    }

    #[test]
    fn test_positions_order_by_line_then_column() {
        assert!(Position::new(1, 40) < Position::new(2, 0));
        assert!(Position::new(3, 1) < Position::new(3, 2));
    }
}
