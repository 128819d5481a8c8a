/// Token types produced by the method-source lexer.
use crate::span::Span;

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal, e.g. `42`, `-7`.
    Integer(i64),
    /// Floating-point literal, e.g. `3.14`. Also produced when an integer
    /// literal overflows `i64`.
    Float(f64),
    /// String literal (contents without quotes, `''` unescaped), e.g. `'hi'`.
    String(std::string::String),
    /// Symbol literal (without the `#`), e.g. `#foo`, `#at:put:`, `#+`.
    Symbol(std::string::String),
    /// Character literal (without the `$`), e.g. `$a`.
    Char(char),

    /// An identifier, e.g. `factorial`, `x`, `Object`.
    Identifier(std::string::String),
    /// A keyword (identifier + colon), e.g. `at:`, `ifTrue:`.
    Keyword(std::string::String),
    /// A block argument name (colon + identifier), e.g. `:value`.
    ArgName(std::string::String),

    /// A binary selector composed of op-chars, e.g. `+`, `<=`, `<<`.
    Operator(std::string::String),
    /// Assignment arrow `<-`.
    Assign,

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `#(` — literal array opener.
    HashParen,
    /// `|` — temporary list delimiter and block header separator.
    Pipe,
    /// `.` — statement separator.
    Dot,
    /// `;` — cascade separator.
    Semicolon,
    /// `^` — return.
    Caret,

    /// End of input.
    Eof,
    /// An unrecognized character or malformed token.
    Error(std::string::String),
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Char(_) => "character",
            Self::Identifier(_) => "identifier",
            Self::Keyword(_) => "keyword",
            Self::ArgName(_) => "argument name",
            Self::Operator(_) => "binary selector",
            Self::Assign => "`<-`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::HashParen => "`#(`",
            Self::Pipe => "`|`",
            Self::Dot => "`.`",
            Self::Semicolon => "`;`",
            Self::Caret => "`^`",
            Self::Eof => "end of input",
            Self::Error(_) => "error",
        }
    }

    /// True for tokens that can end an expression. The lexer uses this to
    /// tell a numeric sign (`by: -1`) from a binary selector (`3-4`).
    pub fn ends_expression(&self) -> bool {
        matches!(
            self,
            Self::Integer(_)
                | Self::Float(_)
                | Self::String(_)
                | Self::Symbol(_)
                | Self::Char(_)
                | Self::Identifier(_)
                | Self::RParen
                | Self::RBracket
        )
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// The original source text of this token.
    pub lexeme: std::string::String,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        span: Span,
        lexeme: impl Into<std::string::String>,
    ) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
