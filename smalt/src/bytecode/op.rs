/// Bytecode opcodes.
///
/// Every instruction is one byte: a 4-bit category in the high nibble
/// and a 4-bit operand in the low nibble. Operands of 16 or more use
/// the extended form: the category value alone (high nibble zero),
/// followed by the operand as a raw byte.
///
/// [`Send`](Op::Send), [`Op::PushBlock`] and the
/// [`SendToSuper`](Special::SendToSuper) special are followed by raw
/// operand bytes outside the nibble scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Push an instance variable. Operand: index into the inherited
    /// variable list.
    PushInstance = 1,

    /// Push an argument. Operand: slot index; slot 0 is the receiver.
    PushArgument = 2,

    /// Push a temporary. Operand: flat index into the temp list.
    PushTemporary = 3,

    /// Push a literal pool entry. Operand: pool index.
    PushLiteral = 4,

    /// Push a well-known constant (see [`Constant`]).
    PushConstant = 5,

    /// Store the top of stack into an instance variable. The value
    /// stays on the stack.
    AssignInstance = 6,

    /// Store the top of stack into a temporary. The value stays on
    /// the stack.
    AssignTemporary = 7,

    /// Collapse the top N stack slots into an argument frame.
    /// Operand: N, counting the receiver.
    MarkArguments = 8,

    /// Send a message to the top argument frame. Operand: argument
    /// count; a raw selector pool index byte follows.
    Send = 9,

    /// Push a block object. Operand: argument count; raw bytes follow
    /// for the argument slot offset (only when the count is non-zero)
    /// and the fragment length, then the fragment itself.
    PushBlock = 12,

    /// Call a primitive by number. Operand: primitive number. The
    /// primitive consumes its arguments directly off the stack.
    CallPrimitive = 13,

    /// Miscellaneous operations selected by a [`Special`] operand.
    Special = 15,
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            1 => Ok(Op::PushInstance),
            2 => Ok(Op::PushArgument),
            3 => Ok(Op::PushTemporary),
            4 => Ok(Op::PushLiteral),
            5 => Ok(Op::PushConstant),
            6 => Ok(Op::AssignInstance),
            7 => Ok(Op::AssignTemporary),
            8 => Ok(Op::MarkArguments),
            9 => Ok(Op::Send),
            12 => Ok(Op::PushBlock),
            13 => Ok(Op::CallPrimitive),
            15 => Ok(Op::Special),
            other => Err(other),
        }
    }
}

/// Operand values for [`Op::Special`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Special {
    /// Return the receiver from the current method.
    SelfReturn = 1,

    /// Return the top of stack from the current method.
    StackReturn = 2,

    /// Return the top of stack from the method enclosing the current
    /// block.
    BlockReturn = 3,

    /// Duplicate the top of stack.
    Duplicate = 4,

    /// Discard the top of stack.
    Pop = 5,

    /// Unconditional branch. A raw absolute target byte follows.
    Branch = 6,

    /// Branch if the top of stack is `true`, consuming it. A raw
    /// absolute target byte follows.
    BranchIfTrue = 7,

    /// Branch if the top of stack is `false`, consuming it. A raw
    /// absolute target byte follows.
    BranchIfFalse = 8,

    /// Send to the superclass of the defining class. A raw selector
    /// pool index byte follows.
    SendToSuper = 11,
}

impl TryFrom<u8> for Special {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            1 => Ok(Special::SelfReturn),
            2 => Ok(Special::StackReturn),
            3 => Ok(Special::BlockReturn),
            4 => Ok(Special::Duplicate),
            5 => Ok(Special::Pop),
            6 => Ok(Special::Branch),
            7 => Ok(Special::BranchIfTrue),
            8 => Ok(Special::BranchIfFalse),
            11 => Ok(Special::SendToSuper),
            other => Err(other),
        }
    }
}

/// Operand values for [`Op::PushConstant`].
///
/// The integers 0 through 9 have dedicated encodings; everything else
/// goes through the literal pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Integer(u8),
    Nil,
    True,
    False,
}

impl Constant {
    pub fn operand(self) -> u8 {
        match self {
            Constant::Integer(n) => n,
            Constant::Nil => 10,
            Constant::True => 11,
            Constant::False => 12,
        }
    }

    pub fn from_operand(operand: u8) -> Option<Constant> {
        match operand {
            0..=9 => Some(Constant::Integer(operand)),
            10 => Some(Constant::Nil),
            11 => Some(Constant::True),
            12 => Some(Constant::False),
            _ => None,
        }
    }
}

impl core::fmt::Display for Constant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Constant::Integer(n) => write!(f, "{n}"),
            Constant::Nil => write!(f, "nil"),
            Constant::True => write!(f, "true"),
            Constant::False => write!(f, "false"),
        }
    }
}
