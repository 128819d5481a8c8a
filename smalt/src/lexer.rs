/// Lexer for method source text.
///
/// The [`Lexer`] scans an in-memory source string byte by byte and
/// implements [`Iterator`] over [`Token`]s, tracking byte offset, line,
/// and column for every token it produces. It never fails: malformed
/// input becomes a [`TokenKind::Error`] token that the parser reports
/// with its span.
///
/// Dialect notes:
///
/// | Syntax      | Meaning                                     |
/// |-------------|---------------------------------------------|
/// | `"…"`       | Comment (skipped, may span lines)           |
/// | `'…'`       | String, `''` escapes a quote                |
/// | `#foo`      | Symbol (also `#at:put:`, `#+`, `#(` array)  |
/// | `$a`        | Character literal                           |
/// | `<-`        | Assignment arrow                            |
/// | `:name`     | Block argument name                         |
///
/// A `+`/`-` immediately followed by a digit starts a numeric literal
/// only when the previous token cannot end an expression, so `3-4` is a
/// binary send while `by: -1` carries a negative literal.
use crate::span::{Pos, Span};
use crate::token::{Token, TokenKind};

// ═══════════════════════════════════════════════════════════════════
// Character classes
// ═══════════════════════════════════════════════════════════════════

/// Characters that may appear in binary selectors.
///
/// `|` is always the temp-list pipe, `^` the return caret, `!` and `_`
/// are not part of the grammar at all. `<` and `-` are included, which
/// makes `<-` scan as one run; the lexer then turns that exact run into
/// [`TokenKind::Assign`].
fn is_op_char(b: u8) -> bool {
    matches!(
        b,
        b'+' | b'-'
            | b'*'
            | b'/'
            | b'<'
            | b'>'
            | b'='
            | b'&'
            | b'@'
            | b'%'
            | b'~'
            | b','
            | b'?'
    )
}

fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

// ═══════════════════════════════════════════════════════════════════
// Lexer
// ═══════════════════════════════════════════════════════════════════

/// A lexer over method source text.
///
/// ```rust,ignore
/// use smalt::Lexer;
///
/// for token in Lexer::new("x <- 2. ^x") {
///     println!("{:?}", token.kind);
/// }
/// ```
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    offset: usize,
    line: usize,
    column: usize,
    /// Whether the previously emitted token can end an expression.
    prev_ends_expr: bool,
    emitted_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source,
            bytes: source.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            prev_ends_expr: false,
            emitted_eof: false,
        }
    }

    /// Current source position.
    fn pos(&self) -> Pos {
        Pos::new(self.offset, self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.offset + n).copied()
    }

    /// Consume one byte, updating position tracking.
    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    /// Consume one full UTF-8 character.
    fn advance_char(&mut self) -> Option<char> {
        let ch = self.src[self.offset..].chars().next()?;
        for _ in 0..ch.len_utf8() {
            self.advance();
        }
        Some(ch)
    }

    /// Finish a token whose text started at `start`.
    fn token(&mut self, start: Pos, kind: TokenKind) -> Token {
        self.prev_ends_expr = kind.ends_expression();
        let lexeme = &self.src[start.offset..self.offset];
        Token::new(kind, Span::new(start, self.pos()), lexeme)
    }

    fn error(&mut self, start: Pos, message: impl Into<String>) -> Token {
        self.token(start, TokenKind::Error(message.into()))
    }

    // ───────────────────────────────────────────────────────────
    //  Whitespace and comments
    // ───────────────────────────────────────────────────────────

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Skip a `"…"` comment. Returns an error token if it never closes.
    fn skip_comment(&mut self) -> Option<Token> {
        let start = self.pos();
        self.advance(); // opening quote
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.advance();
                    return None;
                }
                Some(_) => {
                    self.advance_char();
                }
                None => {
                    return Some(self.error(start, "unterminated comment"));
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Token scanners
    // ───────────────────────────────────────────────────────────

    fn lex_identifier(&mut self, start: Pos) -> Token {
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        let name = self.src[start.offset..self.offset].to_string();
        // An immediately following colon makes this a keyword part.
        if self.peek() == Some(b':') {
            self.advance();
            let mut kw = name;
            kw.push(':');
            return self.token(start, TokenKind::Keyword(kw));
        }
        self.token(start, TokenKind::Identifier(name))
    }

    fn lex_number(&mut self, start: Pos) -> Token {
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.advance();
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.')
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.src[start.offset..self.offset];
        if is_float {
            return match text.parse::<f64>() {
                Ok(f) => self.token(start, TokenKind::Float(f)),
                Err(e) => self.error(start, format!("invalid float: {e}")),
            };
        }
        match text.parse::<i64>() {
            Ok(n) => self.token(start, TokenKind::Integer(n)),
            // integers beyond i64 degrade to floats rather than failing
            Err(_) => match text.parse::<f64>() {
                Ok(f) => self.token(start, TokenKind::Float(f)),
                Err(e) => self.error(start, format!("invalid number: {e}")),
            },
        }
    }

    fn lex_string(&mut self, start: Pos) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(b'\'') => {
                    self.advance();
                    if self.peek() == Some(b'\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        return self.token(start, TokenKind::String(value));
                    }
                }
                Some(_) => {
                    if let Some(ch) = self.advance_char() {
                        value.push(ch);
                    }
                }
                None => return self.error(start, "unterminated string"),
            }
        }
    }

    fn lex_hash(&mut self, start: Pos) -> Token {
        self.advance(); // `#`
        match self.peek() {
            Some(b'(') => {
                self.advance();
                self.token(start, TokenKind::HashParen)
            }
            Some(b) if is_letter(b) => {
                let mut name = String::new();
                loop {
                    while let Some(c) = self.peek() {
                        if !is_ident_char(c) {
                            break;
                        }
                        self.advance();
                        name.push(c as char);
                    }
                    if self.peek() == Some(b':') {
                        self.advance();
                        name.push(':');
                        if !self.peek().is_some_and(is_letter) {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                self.token(start, TokenKind::Symbol(name))
            }
            Some(b) if is_op_char(b) => {
                while self.peek().is_some_and(is_op_char) {
                    self.advance();
                }
                let name = self.src[start.offset + 1..self.offset].to_string();
                self.token(start, TokenKind::Symbol(name))
            }
            _ => self.error(start, "expected symbol after `#`"),
        }
    }

    fn lex_char(&mut self, start: Pos) -> Token {
        self.advance(); // `$`
        match self.advance_char() {
            Some(ch) => self.token(start, TokenKind::Char(ch)),
            None => self.error(start, "expected character after `$`"),
        }
    }

    fn lex_arg_name(&mut self, start: Pos) -> Token {
        self.advance(); // `:`
        if !self.peek().is_some_and(is_letter) {
            return self.error(start, "expected identifier after `:`");
        }
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        let name = self.src[start.offset + 1..self.offset].to_string();
        self.token(start, TokenKind::ArgName(name))
    }

    fn lex_operator(&mut self, start: Pos) -> Token {
        while self.peek().is_some_and(is_op_char) {
            self.advance();
        }
        let text = &self.src[start.offset..self.offset];
        if text == "<-" {
            self.token(start, TokenKind::Assign)
        } else {
            let op = text.to_string();
            self.token(start, TokenKind::Operator(op))
        }
    }

    /// True when the bytes at the cursor begin a signed numeric literal.
    fn at_signed_number(&self) -> bool {
        matches!(self.peek(), Some(b'+') | Some(b'-'))
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
            && !self.prev_ends_expr
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'"') {
                if let Some(err) = self.skip_comment() {
                    return err;
                }
                continue;
            }
            break;
        }

        let start = self.pos();
        let Some(b) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::point(start), "");
        };

        match b {
            b'(' => {
                self.advance();
                self.token(start, TokenKind::LParen)
            }
            b')' => {
                self.advance();
                self.token(start, TokenKind::RParen)
            }
            b'[' => {
                self.advance();
                self.token(start, TokenKind::LBracket)
            }
            b']' => {
                self.advance();
                self.token(start, TokenKind::RBracket)
            }
            b'|' => {
                self.advance();
                self.token(start, TokenKind::Pipe)
            }
            b'.' => {
                self.advance();
                self.token(start, TokenKind::Dot)
            }
            b';' => {
                self.advance();
                self.token(start, TokenKind::Semicolon)
            }
            b'^' => {
                self.advance();
                self.token(start, TokenKind::Caret)
            }
            b'\'' => self.lex_string(start),
            b'#' => self.lex_hash(start),
            b'$' => self.lex_char(start),
            b':' => self.lex_arg_name(start),
            b'0'..=b'9' => self.lex_number(start),
            b'+' | b'-' if self.at_signed_number() => self.lex_number(start),
            b if is_letter(b) => self.lex_identifier(start),
            b if is_op_char(b) => self.lex_operator(start),
            _ => {
                let ch = self.advance_char().unwrap_or('\u{FFFD}');
                self.error(start, format!("unexpected character `{ch}`"))
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.is_eof() {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

/// Tokenize a whole source string, including the trailing `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}
