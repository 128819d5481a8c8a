/// Recursive-descent parser for method source.
///
/// Builds the [`Node`] tree the compiler consumes. Precedence is the
/// classic three-level scheme: unary sends bind tightest, then binary
/// sends, then keyword sends; cascades attach to the receiver of the
/// first message; assignment is lowest and right-associative.
use crate::ast::{CascadeMessage, Node, NodeKind, Number};
use crate::error::CompileError;
use crate::lexer::tokenize;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parse a whole method: selector pattern, optional `| temps |`, body.
pub fn parse_method(source: &str) -> Result<Node, CompileError> {
    let mut parser = Parser::new(source);
    let start = parser.peek().span;

    let (selector, arguments) = parser.parse_pattern()?;
    let temporaries = parser.parse_temp_list()?;
    let statements = parser.parse_statements(&TokenKind::Eof)?;
    parser.expect(&TokenKind::Eof)?;

    let span = start.merge(parser.last_span);
    Ok(Node::new(
        NodeKind::Method {
            selector,
            arguments,
            temporaries,
            statements,
            source: source.to_string(),
        },
        span,
    ))
}

/// Parse a single expression (with optional trailing `.`).
pub fn parse_expression(source: &str) -> Result<Node, CompileError> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expression()?;
    if parser.check(&TokenKind::Dot) {
        parser.advance()?;
    }
    parser.expect(&TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    last_span: Span,
}

impl Parser {
    fn new(source: &str) -> Self {
        let tokens = tokenize(source);
        let last_span = tokens[0].span;
        Self {
            tokens,
            pos: 0,
            last_span,
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Token plumbing
    // ───────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        // `tokenize` always terminates the stream with an Eof token.
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    /// Consume one token. Error tokens from the lexer fail here, so
    /// malformed lexemes surface wherever they would be consumed.
    fn advance(&mut self) -> Result<Token, CompileError> {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        self.last_span = token.span;
        if let TokenKind::Error(message) = &token.kind {
            return Err(CompileError::new(message.clone(), token.span)
                .with_token(token.lexeme.clone()));
        }
        Ok(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind)
            == std::mem::discriminant(kind)
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<Token, CompileError> {
        let token = self.advance()?;
        if std::mem::discriminant(&token.kind)
            == std::mem::discriminant(expected)
        {
            Ok(token)
        } else {
            Err(CompileError::new(
                format!(
                    "expected {}, found {}",
                    expected.name(),
                    token.kind.name()
                ),
                token.span,
            )
            .with_token(token.lexeme))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, CompileError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(CompileError::new(
                format!("expected identifier, found {}", other.name()),
                token.span,
            )
            .with_token(token.lexeme)),
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Method shape
    // ───────────────────────────────────────────────────────────

    /// Selector pattern: `name`, `+ arg`, or `key: arg key: arg …`.
    fn parse_pattern(
        &mut self,
    ) -> Result<(String, Vec<String>), CompileError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Identifier(name) => Ok((name, Vec::new())),
            TokenKind::Operator(op) => {
                let arg = self.expect_identifier()?;
                Ok((op, vec![arg]))
            }
            TokenKind::Keyword(first) => {
                let mut selector = first;
                let mut arguments = vec![self.expect_identifier()?];
                while self.check(&TokenKind::Keyword(String::new())) {
                    let token = self.advance()?;
                    if let TokenKind::Keyword(kw) = token.kind {
                        selector.push_str(&kw);
                    }
                    arguments.push(self.expect_identifier()?);
                }
                Ok((selector, arguments))
            }
            other => Err(CompileError::new(
                format!("expected method pattern, found {}", other.name()),
                token.span,
            )
            .with_token(token.lexeme)),
        }
    }

    /// `| a b c |` — shared by method headers and block bodies.
    fn parse_temp_list(&mut self) -> Result<Vec<String>, CompileError> {
        if !self.check(&TokenKind::Pipe) {
            return Ok(Vec::new());
        }
        self.advance()?;
        let mut names = Vec::new();
        while self.check(&TokenKind::Identifier(String::new())) {
            names.push(self.expect_identifier()?);
        }
        self.expect(&TokenKind::Pipe)?;
        Ok(names)
    }

    fn parse_statements(
        &mut self,
        end: &TokenKind,
    ) -> Result<Vec<Node>, CompileError> {
        let mut statements = Vec::new();
        loop {
            if self.check(end) {
                break;
            }
            statements.push(self.parse_statement()?);
            if self.check(&TokenKind::Dot) {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Node, CompileError> {
        if self.check(&TokenKind::Caret) {
            let caret = self.advance()?;
            let value = self.parse_expression()?;
            let span = caret.span.merge(value.span);
            return Ok(Node::new(NodeKind::Return(Box::new(value)), span));
        }
        self.parse_expression()
    }

    // ───────────────────────────────────────────────────────────
    //  Expressions
    // ───────────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Node, CompileError> {
        // Assignment: identifier directly followed by `<-`.
        if matches!(self.peek().kind, TokenKind::Identifier(_))
            && matches!(self.peek_at(1).kind, TokenKind::Assign)
        {
            let token = self.advance()?;
            let name = match token.kind {
                TokenKind::Identifier(name) => name,
                _ => unreachable!("peeked identifier"),
            };
            let target =
                Node::new(NodeKind::Variable(name), token.span);
            self.advance()?; // the arrow
            let value = self.parse_expression()?;
            let span = target.span.merge(value.span);
            return Ok(Node::new(
                NodeKind::Assignment {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                span,
            ));
        }
        self.parse_cascade_level()
    }

    fn parse_cascade_level(&mut self) -> Result<Node, CompileError> {
        let expr = self.parse_keyword_level()?;
        if !self.check(&TokenKind::Semicolon) {
            return Ok(expr);
        }
        // The cascade receiver is the receiver of the first message.
        let span = expr.span;
        let (receiver, selector, arguments) = match expr.kind {
            NodeKind::Send {
                receiver,
                selector,
                arguments,
            } => (receiver, selector, arguments),
            _ => {
                return Err(CompileError::new(
                    "cascade requires a message send",
                    span,
                ));
            }
        };
        let mut messages = vec![CascadeMessage {
            selector,
            arguments,
            span,
        }];
        while self.check(&TokenKind::Semicolon) {
            self.advance()?;
            messages.push(self.parse_cascade_message()?);
        }
        let last_span = messages
            .last()
            .map(|m| m.span)
            .unwrap_or(span);
        Ok(Node::new(
            NodeKind::Cascade { receiver, messages },
            span.merge(last_span),
        ))
    }

    /// One cascaded continuation: a single unary, binary, or keyword
    /// message without its receiver.
    fn parse_cascade_message(
        &mut self,
    ) -> Result<CascadeMessage, CompileError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Identifier(selector) => Ok(CascadeMessage {
                selector,
                arguments: Vec::new(),
                span: token.span,
            }),
            TokenKind::Operator(selector) => {
                let arg = self.parse_unary_level()?;
                let span = token.span.merge(arg.span);
                Ok(CascadeMessage {
                    selector,
                    arguments: vec![arg],
                    span,
                })
            }
            TokenKind::Keyword(first) => {
                let mut selector = first;
                let mut arguments = vec![self.parse_binary_level()?];
                while self.check(&TokenKind::Keyword(String::new())) {
                    let kw = self.advance()?;
                    if let TokenKind::Keyword(part) = kw.kind {
                        selector.push_str(&part);
                    }
                    arguments.push(self.parse_binary_level()?);
                }
                let span = token.span.merge(self.last_span);
                Ok(CascadeMessage {
                    selector,
                    arguments,
                    span,
                })
            }
            other => Err(CompileError::new(
                format!("expected cascade message, found {}", other.name()),
                token.span,
            )
            .with_token(token.lexeme)),
        }
    }

    fn parse_keyword_level(&mut self) -> Result<Node, CompileError> {
        let receiver = self.parse_binary_level()?;
        if !self.check(&TokenKind::Keyword(String::new())) {
            return Ok(receiver);
        }
        let mut selector = String::new();
        let mut arguments = Vec::new();
        while self.check(&TokenKind::Keyword(String::new())) {
            let token = self.advance()?;
            if let TokenKind::Keyword(part) = token.kind {
                selector.push_str(&part);
            }
            arguments.push(self.parse_binary_level()?);
        }
        let span = receiver.span.merge(self.last_span);
        Ok(Node::new(
            NodeKind::Send {
                receiver: Box::new(receiver),
                selector,
                arguments,
            },
            span,
        ))
    }

    fn parse_binary_level(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_unary_level()?;
        while matches!(self.peek().kind, TokenKind::Operator(_)) {
            let token = self.advance()?;
            let selector = match token.kind {
                TokenKind::Operator(op) => op,
                _ => unreachable!("peeked operator"),
            };
            let right = self.parse_unary_level()?;
            let span = left.span.merge(right.span);
            left = Node::new(
                NodeKind::Send {
                    receiver: Box::new(left),
                    selector,
                    arguments: vec![right],
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary_level(&mut self) -> Result<Node, CompileError> {
        let mut receiver = self.parse_primary()?;
        while matches!(self.peek().kind, TokenKind::Identifier(_)) {
            let token = self.advance()?;
            let selector = match token.kind {
                TokenKind::Identifier(name) => name,
                _ => unreachable!("peeked identifier"),
            };
            let span = receiver.span.merge(token.span);
            receiver = Node::new(
                NodeKind::Send {
                    receiver: Box::new(receiver),
                    selector,
                    arguments: Vec::new(),
                },
                span,
            );
        }
        Ok(receiver)
    }

    // ───────────────────────────────────────────────────────────
    //  Primaries
    // ───────────────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Result<Node, CompileError> {
        // A lone `<` in primary position opens a primitive call.
        if let TokenKind::Operator(op) = &self.peek().kind {
            if op == "<" {
                return self.parse_primitive();
            }
        }
        let token = self.advance()?;
        let span = token.span;
        match token.kind {
            TokenKind::Integer(n) => {
                Ok(Node::new(NodeKind::Number(Number::Integer(n)), span))
            }
            TokenKind::Float(f) => {
                Ok(Node::new(NodeKind::Number(Number::Float(f)), span))
            }
            TokenKind::String(s) => Ok(Node::new(NodeKind::String(s), span)),
            TokenKind::Symbol(s) => Ok(Node::new(NodeKind::Symbol(s), span)),
            TokenKind::Char(c) => Ok(Node::new(NodeKind::Char(c), span)),
            TokenKind::Identifier(name) => Ok(Node::new(
                match name.as_str() {
                    "true" => NodeKind::Bool(true),
                    "false" => NodeKind::Bool(false),
                    _ if name.starts_with(char::is_uppercase) => {
                        NodeKind::ClassReference(name)
                    }
                    _ => NodeKind::Variable(name),
                },
                span,
            )),
            TokenKind::HashParen => self.parse_literal_array(span),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_block(span),
            other => Err(CompileError::new(
                format!("expected expression, found {}", other.name()),
                span,
            )
            .with_token(token.lexeme)),
        }
    }

    /// `[:a :b | | temps | statements]`
    fn parse_block(&mut self, start: Span) -> Result<Node, CompileError> {
        let mut arguments = Vec::new();
        while matches!(self.peek().kind, TokenKind::ArgName(_)) {
            let token = self.advance()?;
            if let TokenKind::ArgName(name) = token.kind {
                arguments.push(name);
            }
        }
        if !arguments.is_empty() {
            self.expect(&TokenKind::Pipe)?;
        }
        let temporaries = self.parse_temp_list()?;
        let statements = self.parse_statements(&TokenKind::RBracket)?;
        let end = self.expect(&TokenKind::RBracket)?;
        Ok(Node::new(
            NodeKind::Block {
                arguments,
                temporaries,
                statements,
            },
            start.merge(end.span),
        ))
    }

    /// `<N arg …>` — N and each argument is a single primary.
    fn parse_primitive(&mut self) -> Result<Node, CompileError> {
        let open = self.advance()?;
        let number_token = self.advance()?;
        let number = match number_token.kind {
            TokenKind::Integer(n) => n,
            other => {
                return Err(CompileError::new(
                    format!(
                        "expected primitive number, found {}",
                        other.name()
                    ),
                    number_token.span,
                )
                .with_token(number_token.lexeme));
            }
        };
        let mut arguments = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Operator(op) if op == ">" => {
                    let close = self.advance()?;
                    let span = open.span.merge(close.span);
                    return Ok(Node::new(
                        NodeKind::Primitive { number, arguments },
                        span,
                    ));
                }
                TokenKind::Eof => {
                    return Err(CompileError::new(
                        "unterminated primitive call",
                        open.span.merge(self.last_span),
                    ));
                }
                _ => arguments.push(self.parse_primary()?),
            }
        }
    }

    /// Elements of `#( … )`: numbers, strings, characters, symbols
    /// (bare identifiers and keyword runs included), nested arrays.
    fn parse_literal_array(
        &mut self,
        start: Span,
    ) -> Result<Node, CompileError> {
        let mut elements = Vec::new();
        loop {
            if self.check(&TokenKind::RParen) {
                let end = self.advance()?;
                return Ok(Node::new(
                    NodeKind::LiteralArray(elements),
                    start.merge(end.span),
                ));
            }
            let token = self.advance()?;
            let span = token.span;
            let element = match token.kind {
                TokenKind::Integer(n) => {
                    Node::new(NodeKind::Number(Number::Integer(n)), span)
                }
                TokenKind::Float(f) => {
                    Node::new(NodeKind::Number(Number::Float(f)), span)
                }
                TokenKind::String(s) => Node::new(NodeKind::String(s), span),
                TokenKind::Char(c) => Node::new(NodeKind::Char(c), span),
                TokenKind::Symbol(s) => Node::new(NodeKind::Symbol(s), span),
                TokenKind::Identifier(name) => {
                    Node::new(NodeKind::Symbol(name), span)
                }
                TokenKind::Keyword(first) => {
                    // A bare keyword run inside an array is one symbol.
                    let mut name = first;
                    let mut end = span;
                    while self.check(&TokenKind::Keyword(String::new())) {
                        let token = self.advance()?;
                        if let TokenKind::Keyword(part) = token.kind {
                            name.push_str(&part);
                        }
                        end = token.span;
                    }
                    Node::new(NodeKind::Symbol(name), span.merge(end))
                }
                TokenKind::Operator(op) => {
                    Node::new(NodeKind::Symbol(op), span)
                }
                TokenKind::LParen | TokenKind::HashParen => {
                    self.parse_literal_array(span)?
                }
                TokenKind::Eof => {
                    return Err(CompileError::new(
                        "unterminated literal array",
                        start.merge(self.last_span),
                    ));
                }
                other => {
                    return Err(CompileError::new(
                        format!(
                            "expected literal, found {}",
                            other.name()
                        ),
                        span,
                    )
                    .with_token(token.lexeme));
                }
            };
            elements.push(element);
        }
    }
}
