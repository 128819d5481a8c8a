/// AST for method source.
///
/// Nodes are immutable once built and own their children outright; the
/// tree has no back-edges. Every node carries the span of the source
/// text it was parsed from, which is what compile errors point at.
use crate::span::Span;

/// A numeric literal. Integers that overflow `i64` arrive as floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

/// One message of a cascade: selector plus argument nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeMessage {
    pub selector: String,
    pub arguments: Vec<Node>,
    pub span: Span,
}

/// A syntax node: kind plus source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True for a literal block that declares no arguments — the shape
    /// control-flow inlining accepts.
    pub fn is_argless_block(&self) -> bool {
        matches!(
            &self.kind,
            NodeKind::Block { arguments, .. } if arguments.is_empty()
        )
    }

    /// True for `super` written as a bare receiver.
    pub fn is_super(&self) -> bool {
        matches!(&self.kind, NodeKind::Variable(name) if name == "super")
    }

    /// True if this statement is an explicit `^` return.
    pub fn is_return(&self) -> bool {
        matches!(self.kind, NodeKind::Return(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A whole method: selector pattern, arguments, temporaries, body.
    Method {
        selector: String,
        arguments: Vec<String>,
        temporaries: Vec<String>,
        statements: Vec<Node>,
        /// The method's source text, kept on the compiled unit.
        source: String,
    },
    /// A block literal `[:a | …]`.
    Block {
        arguments: Vec<String>,
        temporaries: Vec<String>,
        statements: Vec<Node>,
    },
    /// `^ expression`.
    Return(Box<Node>),
    /// A message send of any arity.
    Send {
        receiver: Box<Node>,
        selector: String,
        arguments: Vec<Node>,
    },
    /// `receiver msg; msg2; …` — every message goes to the same receiver.
    Cascade {
        receiver: Box<Node>,
        messages: Vec<CascadeMessage>,
    },
    /// `name <- expression`.
    Assignment {
        target: Box<Node>,
        value: Box<Node>,
    },
    /// `<N arg …>` — a direct virtual-machine operation.
    Primitive {
        number: i64,
        arguments: Vec<Node>,
    },
    /// A capitalized identifier referencing a class by name.
    ClassReference(String),
    /// A lowercase identifier, including `self`/`super`/`nil`.
    Variable(String),
    Number(Number),
    String(String),
    Symbol(String),
    Char(char),
    /// `#( … )`, elements restricted to literal nodes.
    LiteralArray(Vec<Node>),
    /// `true` / `false`.
    Bool(bool),
}
