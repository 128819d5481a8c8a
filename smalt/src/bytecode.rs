mod decoder;
mod encoder;
mod instruction;
mod literal;
mod op;

pub use decoder::Decoder;
pub use encoder::{EncodeError, Encoder, Label};
pub use instruction::Instruction;
pub use literal::{Literal, LiteralPool};
pub use op::{Constant, Op, Special};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_control_flow_decodes_back() {
        // condition, branch over the arm, arm, jump over the nil push
        let mut enc = Encoder::new();
        enc.push_temporary(0);
        let miss = enc.branch_if_false();
        enc.push_constant(Constant::Integer(1));
        let done = enc.branch();
        enc.bind(miss);
        enc.push_constant(Constant::Nil);
        enc.bind(done);
        enc.pop();
        enc.self_return();
        let (bytes, _) = enc.finish().unwrap();

        assert_eq!(
            Decoder::new(&bytes).collect::<Vec<_>>(),
            vec![
                Instruction::PushTemporary { index: 0 },
                Instruction::BranchIfFalse { target: 6 },
                Instruction::PushConstant {
                    constant: Constant::Integer(1)
                },
                Instruction::Branch { target: 7 },
                Instruction::PushConstant {
                    constant: Constant::Nil
                },
                Instruction::Pop,
                Instruction::SelfReturn,
            ]
        );
    }
}
