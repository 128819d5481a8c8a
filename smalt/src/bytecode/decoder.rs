use crate::bytecode::instruction::Instruction;
use crate::bytecode::op::{Constant, Op, Special};

/// Decodes compiled bytecode back into [`Instruction`]s.
///
/// Block bodies are stored inline after their header, so a
/// [`PushBlock`](Instruction::PushBlock) is simply followed by the
/// block's own instructions.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset in the stream.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn read(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    /// A malformed byte yields [`Instruction::Invalid`] and stops the
    /// decoder there; later bytes can't be trusted after a bad one.
    pub fn decode_next(&mut self) -> Option<Instruction> {
        let first = self.read()?;
        let (op, operand) = if first < 16 {
            // Extended form: the category byte stands alone and the
            // operand follows raw.
            let Ok(op) = Op::try_from(first) else {
                return Some(self.invalid(first));
            };
            let Some(operand) = self.read() else {
                return Some(self.invalid(first));
            };
            (op, operand)
        } else {
            let Ok(op) = Op::try_from(first >> 4) else {
                return Some(self.invalid(first));
            };
            (op, first & 0x0f)
        };

        Some(match op {
            Op::PushInstance => Instruction::PushInstance { index: operand },
            Op::PushArgument => Instruction::PushArgument { index: operand },
            Op::PushTemporary => {
                Instruction::PushTemporary { index: operand }
            }
            Op::PushLiteral => Instruction::PushLiteral { index: operand },
            Op::PushConstant => match Constant::from_operand(operand) {
                Some(constant) => Instruction::PushConstant { constant },
                None => self.invalid(first),
            },
            Op::AssignInstance => {
                Instruction::AssignInstance { index: operand }
            }
            Op::AssignTemporary => {
                Instruction::AssignTemporary { index: operand }
            }
            Op::MarkArguments => {
                Instruction::MarkArguments { count: operand }
            }
            Op::Send => match self.read() {
                Some(selector) => Instruction::Send {
                    argc: operand,
                    selector,
                },
                None => self.invalid(first),
            },
            Op::PushBlock => self.decode_block(first, operand),
            Op::CallPrimitive => {
                Instruction::CallPrimitive { number: operand }
            }
            Op::Special => self.decode_special(first, operand),
        })
    }

    fn decode_block(&mut self, first: u8, argc: u8) -> Instruction {
        let arg_offset = if argc > 0 {
            match self.read() {
                Some(byte) => byte,
                None => return self.invalid(first),
            }
        } else {
            0
        };
        match self.read() {
            Some(length) => Instruction::PushBlock {
                argc,
                arg_offset,
                length,
            },
            None => self.invalid(first),
        }
    }

    fn decode_special(&mut self, first: u8, operand: u8) -> Instruction {
        let Ok(special) = Special::try_from(operand) else {
            return self.invalid(first);
        };
        match special {
            Special::SelfReturn => Instruction::SelfReturn,
            Special::StackReturn => Instruction::StackReturn,
            Special::BlockReturn => Instruction::BlockReturn,
            Special::Duplicate => Instruction::Duplicate,
            Special::Pop => Instruction::Pop,
            Special::Branch
            | Special::BranchIfTrue
            | Special::BranchIfFalse => {
                let Some(target) = self.read() else {
                    return self.invalid(first);
                };
                match special {
                    Special::Branch => Instruction::Branch { target },
                    Special::BranchIfTrue => {
                        Instruction::BranchIfTrue { target }
                    }
                    _ => Instruction::BranchIfFalse { target },
                }
            }
            Special::SendToSuper => match self.read() {
                Some(selector) => Instruction::SendToSuper { selector },
                None => self.invalid(first),
            },
        }
    }

    fn invalid(&mut self, byte: u8) -> Instruction {
        self.pos = self.bytes.len();
        Instruction::Invalid { byte }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        self.decode_next()
    }
}
