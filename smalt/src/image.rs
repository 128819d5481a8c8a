//! Bootstrap image construction: declaration reading plus class-table
//! building. [`compile_image`] runs the whole pipeline over one source
//! text.

mod source;
mod table;

pub use source::{Declaration, read_declarations};
pub use table::{Class, ClassId, ClassTable, compile_image};

#[cfg(test)]
mod tests {
    use super::compile_image;
    use crate::bytecode::{Decoder, Instruction};

    #[test]
    fn a_compiled_image_decodes_back_to_instructions() {
        let table = compile_image(
            "\
RAWCLASS Object MetaObject nil
RAWCLASS Class      MetaClass Object      name parentClass methods size variables children
RAWCLASS MetaObject Class     Class
RAWCLASS MetaClass  Class     MetaObject
CLASS Point Object x y
METHOD Point
x
\t^x
!
",
        )
        .unwrap();
        let method = &table.class("Point").unwrap().methods["x"];
        let decoded: Vec<_> =
            Decoder::new(&method.bytecode).collect();
        assert_eq!(
            decoded,
            vec![
                Instruction::PushInstance { index: 0 },
                Instruction::StackReturn,
            ]
        );
    }
}
