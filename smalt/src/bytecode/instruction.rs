use core::fmt;

use crate::bytecode::op::Constant;

/// A decoded instruction with its raw operand bytes resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PushInstance { index: u8 },
    PushArgument { index: u8 },
    PushTemporary { index: u8 },
    PushLiteral { index: u8 },
    PushConstant { constant: Constant },
    AssignInstance { index: u8 },
    AssignTemporary { index: u8 },
    MarkArguments { count: u8 },
    Send { argc: u8, selector: u8 },
    SendToSuper { selector: u8 },
    PushBlock { argc: u8, arg_offset: u8, length: u8 },
    CallPrimitive { number: u8 },
    SelfReturn,
    StackReturn,
    BlockReturn,
    Duplicate,
    Pop,
    Branch { target: u8 },
    BranchIfTrue { target: u8 },
    BranchIfFalse { target: u8 },
    /// A byte that does not decode to a known instruction.
    Invalid { byte: u8 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushInstance { index } => write!(f, "PushInstance {index}"),
            Self::PushArgument { index } => write!(f, "PushArgument {index}"),
            Self::PushTemporary { index } => {
                write!(f, "PushTemporary {index}")
            }
            Self::PushLiteral { index } => write!(f, "PushLiteral #{index}"),
            Self::PushConstant { constant } => {
                write!(f, "PushConstant {constant}")
            }
            Self::AssignInstance { index } => {
                write!(f, "AssignInstance {index}")
            }
            Self::AssignTemporary { index } => {
                write!(f, "AssignTemporary {index}")
            }
            Self::MarkArguments { count } => {
                write!(f, "MarkArguments {count}")
            }
            Self::Send { argc, selector } => {
                write!(f, "Send #{selector} {argc}")
            }
            Self::SendToSuper { selector } => {
                write!(f, "SendToSuper #{selector}")
            }
            Self::PushBlock {
                argc,
                arg_offset,
                length,
            } => {
                if *argc == 0 {
                    write!(f, "PushBlock 0 len {length}")
                } else {
                    write!(f, "PushBlock {argc} @{arg_offset} len {length}")
                }
            }
            Self::CallPrimitive { number } => {
                write!(f, "CallPrimitive {number}")
            }
            Self::SelfReturn => write!(f, "SelfReturn"),
            Self::StackReturn => write!(f, "StackReturn"),
            Self::BlockReturn => write!(f, "BlockReturn"),
            Self::Duplicate => write!(f, "Duplicate"),
            Self::Pop => write!(f, "Pop"),
            Self::Branch { target } => write!(f, "Branch @{target}"),
            Self::BranchIfTrue { target } => {
                write!(f, "BranchIfTrue @{target}")
            }
            Self::BranchIfFalse { target } => {
                write!(f, "BranchIfFalse @{target}")
            }
            Self::Invalid { byte } => write!(f, "Invalid 0x{byte:02x}"),
        }
    }
}
