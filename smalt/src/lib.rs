//! Compiler for a small Smalltalk dialect plus its bootstrap image
//! builder.
//!
//! The pipeline: the lexer turns method source into tokens, the parser
//! builds the syntax tree, the compiler walks the tree and drives the
//! bytecode encoder into a [`CompiledMethod`], and the image module
//! reads declarative image source and assembles the resolved class
//! table with every method compiled and attached.
//!
//! ```
//! let method = smalt::compile_method_source("double: x ^x + x", &[])?;
//! assert_eq!(method.selector, "double:");
//! # Ok::<(), smalt::CompileError>(())
//! ```

mod ast;
mod bytecode;
mod compiler;
mod error;
mod image;
mod lexer;
mod parser;
mod span;
mod token;

pub use ast::{CascadeMessage, Node, NodeKind, Number};
pub use bytecode::{
    Constant, Decoder, EncodeError, Encoder, Instruction, Label, Literal,
    LiteralPool, Op, Special,
};
pub use compiler::{CompiledMethod, compile_method, compile_method_source};
pub use error::CompileError;
pub use image::{
    Class, ClassId, ClassTable, Declaration, compile_image,
    read_declarations,
};
pub use lexer::{Lexer, tokenize};
pub use parser::{parse_expression, parse_method};
pub use span::{Pos, Span};
pub use token::{Token, TokenKind};
