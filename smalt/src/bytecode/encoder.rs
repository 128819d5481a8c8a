use crate::bytecode::op::{Constant, Op, Special};

/// One slot in the growing code buffer: a finished byte or a branch
/// operand whose target is still symbolic.
#[derive(Debug, Clone, Copy)]
enum CodeByte {
    Byte(u8),
    /// Relative distance from the byte after this operand to the
    /// branch target. Zero marks an unbound label.
    Pending(i32),
}

/// A forward branch whose target has not been bound yet.
///
/// Created by [`Encoder::branch`], [`Encoder::branch_if_true`], and
/// [`Encoder::branch_if_false`]. Resolve it with [`Encoder::bind`].
#[derive(Debug)]
pub struct Label {
    /// Index of the operand placeholder in the code buffer.
    pos: usize,
}

/// Capacity failures raised while encoding one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    MethodTooLarge,
    BlockTooLarge,
    TooManyLiterals,
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EncodeError::MethodTooLarge => write!(f, "method too large"),
            EncodeError::BlockTooLarge => {
                write!(f, "block bytecode too large")
            }
            EncodeError::TooManyLiterals => write!(f, "too many literals"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Emits packed instructions while tracking stack depth.
///
/// A method body and every non-inlined block body each own an encoder;
/// inlined control flow keeps writing into the enclosing encoder so
/// the live stack counter carries across. Branch operands stay
/// symbolic (relative) until [`finish`](Encoder::finish) converts them
/// to absolute positions, so a block fragment can be spliced into its
/// parent without re-pointing anything.
#[derive(Debug, Default)]
pub struct Encoder {
    code: Vec<CodeByte>,
    stack: usize,
    max_stack: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position in the code buffer, in final bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    // ───────────────────────────────────────────────────────────
    //  Emission plumbing
    // ───────────────────────────────────────────────────────────

    fn raw(&mut self, byte: u8) {
        self.code.push(CodeByte::Byte(byte));
    }

    fn emit(&mut self, op: Op, operand: u8) {
        if operand < 16 {
            self.raw((op as u8) << 4 | operand);
        } else {
            self.raw(op as u8);
            self.raw(operand);
        }
    }

    fn special(&mut self, special: Special) {
        self.emit(Op::Special, special as u8);
    }

    fn pushed(&mut self) {
        self.stack += 1;
        self.max_stack = self.max_stack.max(self.stack);
    }

    fn popped(&mut self, count: usize) {
        assert!(self.stack >= count, "stack underflow while encoding");
        self.stack -= count;
    }

    // ───────────────────────────────────────────────────────────
    //  Pushes and assignments
    // ───────────────────────────────────────────────────────────

    pub fn push_instance(&mut self, index: u8) {
        self.emit(Op::PushInstance, index);
        self.pushed();
    }

    pub fn push_argument(&mut self, index: u8) {
        self.emit(Op::PushArgument, index);
        self.pushed();
    }

    pub fn push_temporary(&mut self, index: u8) {
        self.emit(Op::PushTemporary, index);
        self.pushed();
    }

    pub fn push_literal(&mut self, index: u8) {
        self.emit(Op::PushLiteral, index);
        self.pushed();
    }

    pub fn push_constant(&mut self, constant: Constant) {
        self.emit(Op::PushConstant, constant.operand());
        self.pushed();
    }

    /// Store the top of stack into an instance variable; the value
    /// stays on the stack as the expression result.
    pub fn assign_instance(&mut self, index: u8) {
        self.emit(Op::AssignInstance, index);
    }

    /// Store the top of stack into a temporary; the value stays on
    /// the stack as the expression result.
    pub fn assign_temporary(&mut self, index: u8) {
        self.emit(Op::AssignTemporary, index);
    }

    // ───────────────────────────────────────────────────────────
    //  Sends and primitives
    // ───────────────────────────────────────────────────────────

    /// Collapse receiver plus arguments into one frame slot.
    pub fn mark_arguments(&mut self, count: u8) {
        self.emit(Op::MarkArguments, count);
        self.popped(count as usize);
        self.pushed();
    }

    /// Send to the marked frame. Consumes the frame, leaves the result.
    pub fn send(&mut self, argc: u8, selector: u8) {
        self.emit(Op::Send, argc);
        self.raw(selector);
        self.popped(1);
        self.pushed();
    }

    /// Like [`send`](Self::send), but dispatches starting at the
    /// superclass of the defining class.
    pub fn send_to_super(&mut self, selector: u8) {
        self.special(Special::SendToSuper);
        self.raw(selector);
        self.popped(1);
        self.pushed();
    }

    /// Call a primitive. Arguments are consumed directly, without an
    /// argument frame.
    pub fn call_primitive(&mut self, number: u8, argc: u8) {
        self.emit(Op::CallPrimitive, number);
        self.popped(argc as usize);
        self.pushed();
    }

    // ───────────────────────────────────────────────────────────
    //  Stack shuffling and returns
    // ───────────────────────────────────────────────────────────

    pub fn duplicate(&mut self) {
        self.special(Special::Duplicate);
        self.pushed();
    }

    pub fn pop(&mut self) {
        self.special(Special::Pop);
        self.popped(1);
    }

    pub fn self_return(&mut self) {
        self.special(Special::SelfReturn);
    }

    pub fn stack_return(&mut self) {
        self.special(Special::StackReturn);
    }

    pub fn block_return(&mut self) {
        self.special(Special::BlockReturn);
    }

    // ───────────────────────────────────────────────────────────
    //  Branches
    // ───────────────────────────────────────────────────────────

    fn branch_placeholder(&mut self, special: Special) -> Label {
        self.special(special);
        let pos = self.code.len();
        self.code.push(CodeByte::Pending(0));
        Label { pos }
    }

    /// Emit an unconditional forward branch.
    pub fn branch(&mut self) -> Label {
        self.branch_placeholder(Special::Branch)
    }

    /// Emit a forward branch taken when the top of stack is `true`.
    /// The condition is consumed either way.
    pub fn branch_if_true(&mut self) -> Label {
        self.popped(1);
        self.branch_placeholder(Special::BranchIfTrue)
    }

    /// Emit a forward branch taken when the top of stack is `false`.
    /// The condition is consumed either way.
    pub fn branch_if_false(&mut self) -> Label {
        self.popped(1);
        self.branch_placeholder(Special::BranchIfFalse)
    }

    /// Bind a forward branch to the current position.
    pub fn bind(&mut self, label: Label) {
        let relative = self.code.len() as i32 - label.pos as i32 - 1;
        assert!(relative != 0, "zero-length branch");
        self.code[label.pos] = CodeByte::Pending(relative);
    }

    /// Emit an unconditional branch back to `target`, a position
    /// captured earlier with [`len`](Self::len).
    pub fn branch_back(&mut self, target: usize) {
        self.special(Special::Branch);
        let relative = target as i32 - self.code.len() as i32 - 1;
        assert!(relative != 0, "zero-length branch");
        self.code.push(CodeByte::Pending(relative));
    }

    // ───────────────────────────────────────────────────────────
    //  Blocks and finishing
    // ───────────────────────────────────────────────────────────

    /// Splice a separately encoded block body after its header. The
    /// body's pending branch operands stay valid because they are
    /// relative. The parent's maximum stack depth absorbs the body's,
    /// since both run on the same physical stack at different times.
    pub fn embed_block(
        &mut self,
        argc: u8,
        arg_offset: u8,
        body: Encoder,
    ) -> Result<(), EncodeError> {
        if body.code.len() > 255 {
            return Err(EncodeError::BlockTooLarge);
        }
        self.emit(Op::PushBlock, argc);
        if argc > 0 {
            self.raw(arg_offset);
        }
        self.raw(body.code.len() as u8);
        self.code.extend(body.code);
        self.max_stack = self.max_stack.max(body.max_stack);
        self.pushed();
        Ok(())
    }

    /// Resolve every pending branch to an absolute position and return
    /// the final bytes together with the maximum stack depth reached.
    pub fn finish(self) -> Result<(Vec<u8>, usize), EncodeError> {
        if self.code.len() > 256 {
            return Err(EncodeError::MethodTooLarge);
        }
        let mut bytes = Vec::with_capacity(self.code.len());
        for (index, slot) in self.code.iter().enumerate() {
            let byte = match *slot {
                CodeByte::Byte(b) => b,
                CodeByte::Pending(relative) => {
                    assert!(relative != 0, "unbound branch target");
                    let absolute = index as i32 + relative + 1;
                    if !(0..=255).contains(&absolute) {
                        return Err(EncodeError::MethodTooLarge);
                    }
                    absolute as u8
                }
            };
            bytes.push(byte);
        }
        Ok((bytes, self.max_stack))
    }
}
