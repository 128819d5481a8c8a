//! Method and block compiler.
//!
//! Walks the parsed tree and drives the [`Encoder`], resolving names
//! against the scope chain and inlining the conditional and loop
//! control-flow selectors. One method compilation owns one literal
//! pool; every non-inlined block body gets its own encoder whose
//! fragment is embedded into the parent stream.

use crate::ast::{CascadeMessage, Node, NodeKind, Number};
use crate::bytecode::{
    Constant, EncodeError, Encoder, Literal, LiteralPool,
};
use crate::error::CompileError;
use crate::parser;
use crate::span::Span;

/// A fully compiled method, ready to attach to a class.
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    pub selector: String,
    pub arguments: Vec<String>,
    pub temporaries: Vec<String>,
    pub literals: Vec<Literal>,
    pub bytecode: Vec<u8>,
    pub max_stack: usize,
    pub source: String,
}

/// Parse and compile one method source.
pub fn compile_method_source(
    source: &str,
    instance_variables: &[String],
) -> Result<CompiledMethod, CompileError> {
    let node = parser::parse_method(source)?;
    compile_method(&node, instance_variables)
}

/// Compile a parsed method against the instance variables visible to
/// its class (inherited chain first, own variables last).
pub fn compile_method(
    node: &Node,
    instance_variables: &[String],
) -> Result<CompiledMethod, CompileError> {
    let NodeKind::Method {
        selector,
        arguments,
        temporaries,
        statements,
        source,
    } = &node.kind
    else {
        return Err(CompileError::new("expected a method node", node.span));
    };

    if instance_variables.len() > 256 {
        return Err(CompileError::new(
            "Too many instance variables",
            node.span,
        ));
    }
    if arguments.len() > 255 {
        return Err(CompileError::new("Too many arguments", node.span));
    }
    if temporaries.len() > 256 {
        return Err(CompileError::new("Too many temporaries", node.span));
    }
    check_duplicates(
        arguments.iter().chain(temporaries.iter()),
        node.span,
    )?;

    let mut pool = LiteralPool::new();
    let mut body = BodyCompiler {
        pool: &mut pool,
        instance_variables,
        arguments,
        temporaries: temporaries.clone(),
        encoder: Encoder::new(),
        in_block: false,
    };
    body.compile_method_statements(statements)?;
    let encoder = body.encoder;
    let (bytecode, max_stack) = encoder
        .finish()
        .map_err(|e| encode_error(e, node.span))?;

    log::debug!(
        "compiled #{selector}: {} bytes, {} literals, max stack {max_stack}",
        bytecode.len(),
        pool.len(),
    );

    Ok(CompiledMethod {
        selector: selector.clone(),
        arguments: arguments.clone(),
        temporaries: temporaries.clone(),
        literals: pool.into_literals(),
        bytecode,
        max_stack,
        source: source.clone(),
    })
}

fn check_duplicates<'a>(
    names: impl Iterator<Item = &'a String>,
    span: Span,
) -> Result<(), CompileError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if seen.contains(&name.as_str()) {
            return Err(CompileError::new(
                format!("Variable with name \"{name}\" already defined"),
                span,
            )
            .with_token(name.clone()));
        }
        seen.push(name);
    }
    Ok(())
}

fn encode_error(error: EncodeError, span: Span) -> CompileError {
    CompileError::new(error.to_string(), span)
}

/// Where a name lives, in resolution order.
enum Binding {
    SelfRef,
    Super,
    True,
    False,
    Nil,
    Instance(u8),
    Argument(u8),
    Temporary(u8),
}

/// Compiles the statements of one method or block body.
///
/// Inlined control flow keeps writing through the same compiler so the
/// encoder's live stack counter carries across; a non-inlined block
/// gets a fresh compiler with a fresh encoder, an extended flat temp
/// list, and the shared literal pool.
struct BodyCompiler<'a> {
    pool: &'a mut LiteralPool,
    instance_variables: &'a [String],
    arguments: &'a [String],
    /// Flat temp list: method temps, then any enclosing blocks' args
    /// and temps in declaration order.
    temporaries: Vec<String>,
    encoder: Encoder,
    in_block: bool,
}

impl BodyCompiler<'_> {
    // ───────────────────────────────────────────────────────────
    //  Statement sequencing
    // ───────────────────────────────────────────────────────────

    /// Method bodies discard every statement's value and fall back to
    /// returning the receiver.
    fn compile_method_statements(
        &mut self,
        statements: &[Node],
    ) -> Result<(), CompileError> {
        for statement in statements {
            self.compile_node(statement)?;
            if !statement.is_return() {
                self.encoder.pop();
            }
        }
        if !statements.last().is_some_and(Node::is_return) {
            self.encoder.self_return();
        }
        Ok(())
    }

    /// Non-inlined block bodies return their last statement's value.
    fn compile_block_statements(
        &mut self,
        statements: &[Node],
    ) -> Result<(), CompileError> {
        let Some((last, rest)) = statements.split_last() else {
            self.encoder.push_constant(Constant::Nil);
            self.encoder.stack_return();
            return Ok(());
        };
        for statement in rest {
            self.compile_node(statement)?;
            if !statement.is_return() {
                self.encoder.pop();
            }
        }
        self.compile_node(last)?;
        if !last.is_return() {
            self.encoder.stack_return();
        }
        Ok(())
    }

    /// Inlined bodies leave their last statement's value on the stack
    /// and emit no return of their own.
    fn compile_inline_statements(
        &mut self,
        statements: &[Node],
    ) -> Result<(), CompileError> {
        let Some((last, rest)) = statements.split_last() else {
            self.encoder.push_constant(Constant::Nil);
            return Ok(());
        };
        for statement in rest {
            self.compile_node(statement)?;
            if !statement.is_return() {
                self.encoder.pop();
            }
        }
        self.compile_node(last)
    }

    // ───────────────────────────────────────────────────────────
    //  Node dispatch
    // ───────────────────────────────────────────────────────────

    fn compile_node(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::Number(Number::Integer(n)) => {
                if (0..=9).contains(n) {
                    self.encoder.push_constant(Constant::Integer(*n as u8));
                } else {
                    self.push_literal(Literal::Integer(*n), node.span)?;
                }
            }
            NodeKind::Number(Number::Float(x)) => {
                self.push_literal(Literal::Float(*x), node.span)?;
            }
            NodeKind::String(s) => {
                self.push_literal(Literal::String(s.clone()), node.span)?;
            }
            NodeKind::Symbol(s) => {
                self.push_literal(Literal::Symbol(s.clone()), node.span)?;
            }
            NodeKind::Char(c) => {
                self.push_literal(Literal::Char(*c), node.span)?;
            }
            NodeKind::Bool(true) => {
                self.encoder.push_constant(Constant::True);
            }
            NodeKind::Bool(false) => {
                self.encoder.push_constant(Constant::False);
            }
            NodeKind::LiteralArray(elements) => {
                let literal = array_literal(elements)?;
                self.push_literal(literal, node.span)?;
            }
            NodeKind::ClassReference(name) => {
                self.push_literal(Literal::Class(name.clone()), node.span)?;
            }
            NodeKind::Variable(name) => {
                self.compile_variable(name, node.span)?;
            }
            NodeKind::Assignment { target, value } => {
                self.compile_assignment(target, value)?;
            }
            NodeKind::Send {
                receiver,
                selector,
                arguments,
            } => {
                self.compile_send(node.span, receiver, selector, arguments)?;
            }
            NodeKind::Cascade { receiver, messages } => {
                self.compile_cascade(receiver, messages)?;
            }
            NodeKind::Return(value) => {
                self.compile_return(value)?;
            }
            NodeKind::Primitive { number, arguments } => {
                self.compile_primitive(node.span, *number, arguments)?;
            }
            NodeKind::Block {
                arguments,
                temporaries,
                statements,
            } => {
                self.compile_standalone_block(
                    node.span,
                    arguments,
                    temporaries,
                    statements,
                )?;
            }
            NodeKind::Method { .. } => {
                return Err(CompileError::new(
                    "method definition in expression position",
                    node.span,
                ));
            }
        }
        Ok(())
    }

    fn push_literal(
        &mut self,
        literal: Literal,
        span: Span,
    ) -> Result<(), CompileError> {
        let index = self
            .pool
            .add(literal)
            .map_err(|e| encode_error(e, span))?;
        self.encoder.push_literal(index);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    //  Names
    // ───────────────────────────────────────────────────────────

    fn resolve(&self, name: &str) -> Option<Binding> {
        match name {
            "self" => return Some(Binding::SelfRef),
            "super" => return Some(Binding::Super),
            "true" => return Some(Binding::True),
            "false" => return Some(Binding::False),
            "nil" => return Some(Binding::Nil),
            _ => {}
        }
        if let Some(i) =
            self.instance_variables.iter().position(|v| v == name)
        {
            return Some(Binding::Instance(i as u8));
        }
        if let Some(i) = self.arguments.iter().position(|a| a == name) {
            // slot 0 holds the receiver
            return Some(Binding::Argument(i as u8 + 1));
        }
        if let Some(i) = self.temporaries.iter().position(|t| t == name) {
            return Some(Binding::Temporary(i as u8));
        }
        None
    }

    fn compile_variable(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<(), CompileError> {
        match self.resolve(name) {
            Some(Binding::SelfRef | Binding::Super) => {
                self.encoder.push_argument(0);
            }
            Some(Binding::True) => {
                self.encoder.push_constant(Constant::True);
            }
            Some(Binding::False) => {
                self.encoder.push_constant(Constant::False);
            }
            Some(Binding::Nil) => {
                self.encoder.push_constant(Constant::Nil);
            }
            Some(Binding::Instance(i)) => self.encoder.push_instance(i),
            Some(Binding::Argument(i)) => self.encoder.push_argument(i),
            Some(Binding::Temporary(i)) => self.encoder.push_temporary(i),
            None => {
                return Err(CompileError::new(
                    format!("Unknown variable \"{name}\""),
                    span,
                )
                .with_token(name.to_string()));
            }
        }
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        target: &Node,
        value: &Node,
    ) -> Result<(), CompileError> {
        let NodeKind::Variable(name) = &target.kind else {
            return Err(CompileError::new(
                "invalid assignment target",
                target.span,
            ));
        };
        // validate the slot before compiling the right-hand side
        let binding = match self.resolve(name) {
            Some(binding @ (Binding::Instance(_) | Binding::Temporary(_))) => {
                binding
            }
            Some(Binding::Argument(_)) => {
                return Err(CompileError::new(
                    format!("Cannot assign to argument \"{name}\""),
                    target.span,
                )
                .with_token(name.clone()));
            }
            Some(_) => {
                return Err(CompileError::new(
                    format!("Cannot assign to pseudo variable \"{name}\""),
                    target.span,
                )
                .with_token(name.clone()));
            }
            None => {
                return Err(CompileError::new(
                    format!("Unknown variable \"{name}\""),
                    target.span,
                )
                .with_token(name.clone()));
            }
        };
        self.compile_node(value)?;
        match binding {
            Binding::Instance(i) => self.encoder.assign_instance(i),
            Binding::Temporary(i) => self.encoder.assign_temporary(i),
            _ => unreachable!("validated above"),
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    //  Sends
    // ───────────────────────────────────────────────────────────

    fn compile_send(
        &mut self,
        span: Span,
        receiver: &Node,
        selector: &str,
        arguments: &[Node],
    ) -> Result<(), CompileError> {
        if self.try_inline_send(receiver, selector, arguments)? {
            return Ok(());
        }
        if arguments.len() + 1 > 255 {
            return Err(CompileError::new("Too many arguments", span));
        }
        self.compile_node(receiver)?;
        for argument in arguments {
            self.compile_node(argument)?;
        }
        self.encoder.mark_arguments(arguments.len() as u8 + 1);
        let index = self
            .pool
            .selector(selector)
            .map_err(|e| encode_error(e, span))?;
        if receiver.is_super() {
            self.encoder.send_to_super(index);
        } else {
            self.encoder.send(arguments.len() as u8, index);
        }
        Ok(())
    }

    fn compile_cascade(
        &mut self,
        receiver: &Node,
        messages: &[CascadeMessage],
    ) -> Result<(), CompileError> {
        self.compile_node(receiver)?;
        for (i, message) in messages.iter().enumerate() {
            let last = i + 1 == messages.len();
            if !last {
                self.encoder.duplicate();
            }
            if message.arguments.len() + 1 > 255 {
                return Err(CompileError::new(
                    "Too many arguments",
                    message.span,
                ));
            }
            for argument in &message.arguments {
                self.compile_node(argument)?;
            }
            self.encoder
                .mark_arguments(message.arguments.len() as u8 + 1);
            let index = self
                .pool
                .selector(&message.selector)
                .map_err(|e| encode_error(e, message.span))?;
            self.encoder.send(message.arguments.len() as u8, index);
            if !last {
                self.encoder.pop();
            }
        }
        Ok(())
    }

    fn compile_return(&mut self, value: &Node) -> Result<(), CompileError> {
        if self.in_block {
            // escape return: the value rides the stack out of the
            // enclosing method
            self.compile_node(value)?;
            self.encoder.block_return();
        } else if matches!(&value.kind, NodeKind::Variable(n) if n == "self")
        {
            self.encoder.self_return();
        } else {
            self.compile_node(value)?;
            self.encoder.stack_return();
        }
        Ok(())
    }

    fn compile_primitive(
        &mut self,
        span: Span,
        number: i64,
        arguments: &[Node],
    ) -> Result<(), CompileError> {
        if !(0..=255).contains(&number) {
            return Err(CompileError::new(
                "primitive number out of range",
                span,
            ));
        }
        if arguments.len() > 255 {
            return Err(CompileError::new("Too many arguments", span));
        }
        for argument in arguments {
            self.compile_node(argument)?;
        }
        self.encoder
            .call_primitive(number as u8, arguments.len() as u8);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    //  Blocks and control-flow inlining
    // ───────────────────────────────────────────────────────────

    /// Extend the flat temp list with a block's arguments and temps.
    /// Returns the length to truncate back to when the block's scope
    /// closes.
    fn enter_block_scope(
        &mut self,
        span: Span,
        arguments: &[String],
        temporaries: &[String],
    ) -> Result<usize, CompileError> {
        let saved = self.temporaries.len();
        for name in arguments.iter().chain(temporaries.iter()) {
            // method arguments stay visible inside blocks, so a block
            // naming one would be unreachable
            if self.temporaries.contains(name)
                || self.arguments.contains(name)
            {
                return Err(CompileError::new(
                    format!(
                        "Variable with name \"{name}\" already defined"
                    ),
                    span,
                )
                .with_token(name.clone()));
            }
            self.temporaries.push(name.clone());
        }
        if self.temporaries.len() >= 255 {
            return Err(CompileError::new("Too many temporaries", span));
        }
        Ok(saved)
    }

    fn compile_standalone_block(
        &mut self,
        span: Span,
        arguments: &[String],
        temporaries: &[String],
        statements: &[Node],
    ) -> Result<(), CompileError> {
        let arg_offset = self.temporaries.len();
        let saved = self.enter_block_scope(span, arguments, temporaries)?;
        let body = {
            let mut child = BodyCompiler {
                pool: &mut *self.pool,
                instance_variables: self.instance_variables,
                arguments: self.arguments,
                temporaries: std::mem::take(&mut self.temporaries),
                encoder: Encoder::new(),
                in_block: true,
            };
            child.compile_block_statements(statements)?;
            self.temporaries = child.temporaries;
            child.encoder
        };
        self.temporaries.truncate(saved);
        self.encoder
            .embed_block(arguments.len() as u8, arg_offset as u8, body)
            .map_err(|e| encode_error(e, span))?;
        Ok(())
    }

    /// Compile a block's body straight into the current encoder. Only
    /// argument-less literal blocks reach this path.
    fn compile_inline_block(
        &mut self,
        block: &Node,
    ) -> Result<(), CompileError> {
        let NodeKind::Block {
            arguments,
            temporaries,
            statements,
        } = &block.kind
        else {
            unreachable!("inline target is a literal block");
        };
        let saved =
            self.enter_block_scope(block.span, arguments, temporaries)?;
        self.compile_inline_statements(statements)?;
        self.temporaries.truncate(saved);
        Ok(())
    }

    /// Lower the conditional and loop selector families to branches
    /// when their operands are literal argument-less blocks. Returns
    /// `false` when the send doesn't qualify, leaving it to ordinary
    /// dispatch.
    fn try_inline_send(
        &mut self,
        receiver: &Node,
        selector: &str,
        arguments: &[Node],
    ) -> Result<bool, CompileError> {
        match selector {
            "ifTrue:" | "ifFalse:"
                if arguments.len() == 1
                    && arguments[0].is_argless_block() =>
            {
                self.compile_node(receiver)?;
                let miss = if selector == "ifTrue:" {
                    self.encoder.branch_if_false()
                } else {
                    self.encoder.branch_if_true()
                };
                self.compile_inline_block(&arguments[0])?;
                // converge on nil when the arm is skipped
                let done = self.encoder.branch();
                self.encoder.bind(miss);
                self.encoder.push_constant(Constant::Nil);
                self.encoder.bind(done);
                Ok(true)
            }
            "ifTrue:ifFalse:" | "ifFalse:ifTrue:"
                if arguments.len() == 2
                    && arguments.iter().all(Node::is_argless_block) =>
            {
                self.compile_node(receiver)?;
                let miss = if selector == "ifTrue:ifFalse:" {
                    self.encoder.branch_if_false()
                } else {
                    self.encoder.branch_if_true()
                };
                self.compile_inline_block(&arguments[0])?;
                let done = self.encoder.branch();
                self.encoder.bind(miss);
                self.compile_inline_block(&arguments[1])?;
                self.encoder.bind(done);
                Ok(true)
            }
            "whileTrue:" | "whileFalse:"
                if receiver.is_argless_block()
                    && arguments.len() == 1
                    && arguments[0].is_argless_block() =>
            {
                let loop_start = self.encoder.len();
                self.compile_inline_block(receiver)?;
                let exit = if selector == "whileTrue:" {
                    self.encoder.branch_if_false()
                } else {
                    self.encoder.branch_if_true()
                };
                self.compile_inline_block(&arguments[0])?;
                // per-iteration results are discarded
                self.encoder.pop();
                self.encoder.branch_back(loop_start);
                self.encoder.bind(exit);
                self.encoder.push_constant(Constant::Nil);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Fold a literal-array node into one pool value.
fn array_literal(elements: &[Node]) -> Result<Literal, CompileError> {
    let mut values = Vec::with_capacity(elements.len());
    for element in elements {
        let value = match &element.kind {
            NodeKind::Number(Number::Integer(n)) => Literal::Integer(*n),
            NodeKind::Number(Number::Float(x)) => Literal::Float(*x),
            NodeKind::String(s) => Literal::String(s.clone()),
            NodeKind::Symbol(s) => Literal::Symbol(s.clone()),
            NodeKind::Char(c) => Literal::Char(*c),
            NodeKind::LiteralArray(nested) => array_literal(nested)?,
            _ => {
                return Err(CompileError::new(
                    "expected a literal array element",
                    element.span,
                ));
            }
        };
        values.push(value);
    }
    Ok(Literal::Array(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> CompiledMethod {
        match compile_method_source(source, &[]) {
            Ok(method) => method,
            Err(e) => panic!("compile failed for {source:?}: {e}"),
        }
    }

    fn compile_with(source: &str, vars: &[&str]) -> CompiledMethod {
        let vars: Vec<String> =
            vars.iter().map(|s| s.to_string()).collect();
        match compile_method_source(source, &vars) {
            Ok(method) => method,
            Err(e) => panic!("compile failed for {source:?}: {e}"),
        }
    }

    fn error(source: &str) -> CompileError {
        match compile_method_source(source, &[]) {
            Ok(_) => panic!("expected {source:?} to fail"),
            Err(e) => e,
        }
    }

    // ── goldens ────────────────────────────────────────────────

    #[test]
    fn assignment_statement_is_stored_then_popped() {
        let method = compile("test |x| x <- 2.");
        assert_eq!(method.bytecode, vec![82, 112, 245, 241]);
        assert_eq!(method.temporaries, vec!["x".to_string()]);
        assert_eq!(method.max_stack, 1);
        assert!(method.literals.is_empty());
    }

    #[test]
    fn empty_method_returns_self() {
        assert_eq!(compile("test").bytecode, vec![241]);
        assert_eq!(compile("test ^self").bytecode, vec![241]);
    }

    #[test]
    fn nil_return_uses_the_constant_fast_path() {
        let method = compile("test ^nil");
        assert_eq!(method.bytecode, vec![90, 242]);
        assert_eq!(method.max_stack, 1);
    }

    #[test]
    fn two_armed_conditionals_branch_around_their_arms() {
        let method =
            compile("test |x| x <- 3 > 4 ifTrue: [3] ifFalse: [4].");
        assert_eq!(
            method.bytecode,
            vec![83, 84, 130, 145, 0, 248, 10, 83, 246, 11, 84, 112, 245, 241]
        );
        assert_eq!(method.literals, vec![Literal::Symbol(">".into())]);
        assert_eq!(method.max_stack, 2);
    }

    #[test]
    fn single_armed_conditionals_converge_on_nil() {
        let method = compile("test self ifTrue: [1].");
        assert_eq!(
            method.bytecode,
            vec![32, 248, 6, 81, 246, 7, 90, 245, 241]
        );
        let method = compile("test self ifFalse: [1].");
        assert_eq!(
            method.bytecode,
            vec![32, 247, 6, 81, 246, 7, 90, 245, 241]
        );
    }

    #[test]
    fn empty_inline_arms_push_nil() {
        let method = compile("test self ifTrue: [].");
        assert_eq!(
            method.bytecode,
            vec![32, 248, 6, 90, 246, 7, 90, 245, 241]
        );
    }

    #[test]
    fn while_loop_branches_back_to_the_condition() {
        let method = compile("test ^[false] whileTrue: [true]");
        assert_eq!(
            method.bytecode,
            vec![92, 248, 7, 91, 245, 246, 0, 90, 242]
        );
        assert!(method.literals.is_empty());
    }

    #[test]
    fn while_false_inverts_the_exit_branch() {
        let method = compile("test ^[true] whileFalse: [false]");
        assert_eq!(
            method.bytecode,
            vec![91, 247, 7, 92, 245, 246, 0, 90, 242]
        );
    }

    #[test]
    fn primitives_consume_arguments_directly() {
        let method =
            compile("in: object at: index <24 object index>. self primitiveFailed");
        assert_eq!(
            method.bytecode,
            vec![33, 34, 13, 24, 245, 32, 129, 144, 0, 245, 241]
        );
        assert_eq!(
            method.literals,
            vec![Literal::Symbol("primitiveFailed".into())]
        );
    }

    #[test]
    fn block_arguments_live_in_the_flat_temp_space() {
        let method = compile("test ^[:c | c]");
        assert_eq!(method.bytecode, vec![193, 0, 2, 48, 242, 242]);
        assert!(method.temporaries.is_empty());
    }

    #[test]
    fn block_returns_escape_the_enclosing_method() {
        let method = compile("test ^[^3]");
        assert_eq!(method.bytecode, vec![192, 2, 83, 243, 242]);
    }

    #[test]
    fn cascades_duplicate_for_all_but_the_last_message() {
        let method = compile("test self a; b.");
        assert_eq!(
            method.bytecode,
            vec![32, 244, 129, 144, 0, 245, 129, 144, 1, 245, 241]
        );
        assert_eq!(
            method.literals,
            vec![
                Literal::Symbol("a".into()),
                Literal::Symbol("b".into())
            ]
        );
        assert_eq!(method.max_stack, 2);
    }

    #[test]
    fn super_sends_use_the_dedicated_opcode() {
        let method = compile("test super foo.");
        assert_eq!(method.bytecode, vec![32, 129, 251, 0, 245, 241]);
        assert_eq!(method.literals, vec![Literal::Symbol("foo".into())]);
    }

    // ── literals and pooling ───────────────────────────────────

    #[test]
    fn selectors_are_shared_but_pushed_literals_are_not() {
        let method = compile("test self foo. self foo.");
        assert_eq!(method.literals, vec![Literal::Symbol("foo".into())]);

        let method = compile("test 100 max: 100.");
        assert_eq!(
            method.literals,
            vec![
                Literal::Integer(100),
                Literal::Integer(100),
                Literal::Symbol("max:".into())
            ]
        );
        assert_eq!(
            method.bytecode,
            vec![64, 65, 130, 145, 2, 245, 241]
        );
    }

    #[test]
    fn literal_arrays_fold_into_one_pool_entry() {
        let method = compile("test ^#(1 foo 'hi' $a (2 3))");
        assert_eq!(method.bytecode, vec![64, 242]);
        assert_eq!(
            method.literals,
            vec![Literal::Array(vec![
                Literal::Integer(1),
                Literal::Symbol("foo".into()),
                Literal::String("hi".into()),
                Literal::Char('a'),
                Literal::Array(vec![
                    Literal::Integer(2),
                    Literal::Integer(3)
                ]),
            ])]
        );
    }

    #[test]
    fn class_references_pool_a_named_entry() {
        let method = compile("test ^Object");
        assert_eq!(method.bytecode, vec![64, 242]);
        assert_eq!(
            method.literals,
            vec![Literal::Class("Object".into())]
        );
    }

    #[test]
    fn small_integers_skip_the_pool() {
        let method = compile("test ^7");
        assert_eq!(method.bytecode, vec![87, 242]);
        assert!(method.literals.is_empty());
        let method = compile("test ^300");
        assert_eq!(method.bytecode, vec![64, 242]);
        assert_eq!(method.literals, vec![Literal::Integer(300)]);
    }

    // ── name resolution ────────────────────────────────────────

    #[test]
    fn instance_variables_resolve_by_chain_position() {
        let method = compile_with("test ^count", &["count"]);
        assert_eq!(method.bytecode, vec![16, 242]);
        let method = compile_with("test count <- 5", &["count"]);
        assert_eq!(method.bytecode, vec![85, 96, 245, 241]);
    }

    #[test]
    fn instance_variables_shadow_locals() {
        let method = compile_with("test |x| ^x", &["x"]);
        assert_eq!(method.bytecode, vec![16, 242]);
    }

    #[test]
    fn arguments_are_one_based_after_the_receiver_slot() {
        let method = compile("foo: a ^a");
        assert_eq!(method.bytecode, vec![33, 242]);
    }

    // ── inline fallback ────────────────────────────────────────

    #[test]
    fn conditionals_without_literal_blocks_stay_ordinary_sends() {
        let method = compile("test self ifTrue: self.");
        assert_eq!(method.bytecode, vec![32, 32, 130, 145, 0, 245, 241]);
        assert_eq!(
            method.literals,
            vec![Literal::Symbol("ifTrue:".into())]
        );
    }

    #[test]
    fn loops_without_a_block_receiver_stay_ordinary_sends() {
        let method = compile("test self whileTrue: [self].");
        assert_eq!(
            method.bytecode,
            vec![32, 192, 2, 32, 242, 130, 145, 0, 245, 241]
        );
        assert_eq!(
            method.literals,
            vec![Literal::Symbol("whileTrue:".into())]
        );
    }

    // ── errors ─────────────────────────────────────────────────

    #[test]
    fn duplicate_declarations_name_the_variable() {
        let e = error("from: a to: b | a b c | ^nil");
        assert_eq!(
            e.message,
            "Variable with name \"a\" already defined"
        );
        assert_eq!(e.token.as_deref(), Some("a"));
    }

    #[test]
    fn duplicate_block_variables_see_the_enclosing_scope() {
        let e = error("test |x| ^[:x | x]");
        assert_eq!(
            e.message,
            "Variable with name \"x\" already defined"
        );
        let e = error("foo: a ^[:a | a]");
        assert_eq!(
            e.message,
            "Variable with name \"a\" already defined"
        );
    }

    #[test]
    fn unknown_variables_are_reported_with_their_name() {
        let e = error("test ^y");
        assert_eq!(e.message, "Unknown variable \"y\"");
        assert_eq!(e.token.as_deref(), Some("y"));
    }

    #[test]
    fn assignments_to_arguments_and_pseudos_fail() {
        let e = error("foo: a a <- 3");
        assert_eq!(e.message, "Cannot assign to argument \"a\"");
        let e = error("test self <- 3");
        assert_eq!(e.message, "Cannot assign to pseudo variable \"self\"");
        let e = error("test nil <- 3");
        assert_eq!(e.message, "Cannot assign to pseudo variable \"nil\"");
    }

    #[test]
    fn primitive_numbers_are_byte_sized() {
        let e = error("test <300 self>");
        assert_eq!(e.message, "primitive number out of range");
    }

    // ── capacity limits ────────────────────────────────────────

    fn method_with_temps(count: usize) -> String {
        let mut source = String::from("test |");
        for i in 0..count {
            source.push_str(&format!("t{i} "));
        }
        source.push('|');
        source
    }

    #[test]
    fn methods_allow_up_to_256_temporaries() {
        assert!(
            compile_method_source(&method_with_temps(256), &[]).is_ok()
        );
        let e = error(&method_with_temps(257));
        assert_eq!(e.message, "Too many temporaries");
    }

    #[test]
    fn block_scopes_cap_the_cumulative_temp_count() {
        let mut ok = method_with_temps(250);
        ok.push_str(" [ |b0 b1 b2 b3| nil ].");
        assert!(compile_method_source(&ok, &[]).is_ok());

        let mut too_many = method_with_temps(250);
        too_many.push_str(" [ |b0 b1 b2 b3 b4| nil ].");
        let e = match compile_method_source(&too_many, &[]) {
            Ok(_) => panic!("expected the block scope to overflow"),
            Err(e) => e,
        };
        assert_eq!(e.message, "Too many temporaries");
    }

    #[test]
    fn methods_cap_the_argument_count() {
        let mut source = String::new();
        for i in 0..256 {
            source.push_str(&format!("k{i}: a{i} "));
        }
        source.push_str("^nil");
        let e = match compile_method_source(&source, &[]) {
            Ok(_) => panic!("expected too many arguments"),
            Err(e) => e,
        };
        assert_eq!(e.message, "Too many arguments");
    }

    #[test]
    fn methods_cannot_exceed_256_bytes() {
        let mut source = String::from("test ");
        for _ in 0..130 {
            source.push_str("1. ");
        }
        let e = match compile_method_source(&source, &[]) {
            Ok(_) => panic!("expected method too large"),
            Err(e) => e,
        };
        assert_eq!(e.message, "method too large");
    }

    #[test]
    fn the_literal_pool_is_capped() {
        let mut source = String::from("test ");
        for i in 0..257 {
            source.push_str(&format!("{}. ", 1000 + i));
        }
        let e = match compile_method_source(&source, &[]) {
            Ok(_) => panic!("expected too many literals"),
            Err(e) => e,
        };
        assert_eq!(e.message, "too many literals");
    }

    // ── properties ─────────────────────────────────────────────

    #[test]
    fn compilation_is_deterministic() {
        let source = "from: a to: b |acc| acc <- a. ^acc max: b";
        let first = compile(source);
        let second = compile(source);
        assert_eq!(first.bytecode, second.bytecode);
        assert_eq!(first.literals, second.literals);
        assert_eq!(first.max_stack, second.max_stack);
    }

    #[test]
    fn keyword_sends_report_their_peak_stack() {
        let method = compile("test self foo: 1 bar: 2.");
        assert_eq!(method.max_stack, 3);
        assert_eq!(
            method.literals,
            vec![Literal::Symbol("foo:bar:".into())]
        );
    }
}
