//! Line-oriented reader for bootstrap image source.
//!
//! An image file is a flat sequence of declarations:
//!
//! ```text
//! RAWCLASS Object MetaObject nil
//! RAWCLASS Class  MetaClass  Object  name parentClass methods size variables children
//! CLASS Undefined Object
//! METHOD Object
//! isNil
//!     ^false
//! !
//! COMMENT anything after the keyword is ignored
//! ```
//!
//! `RAWCLASS` names its metaclass explicitly (the bootstrap cycle needs
//! that); `CLASS` gets one synthesized by the table builder. A `METHOD`
//! chunk runs until a line holding only `!`, and its body is kept
//! verbatim for the method compiler, which reports errors with spans
//! relative to the chunk.

use crate::error::CompileError;
use crate::span::{Pos, Span};

/// One parsed declaration, in file order.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    RawClass {
        name: String,
        metaclass: String,
        parent: Option<String>,
        variables: Vec<String>,
        span: Span,
    },
    Class {
        name: String,
        parent: Option<String>,
        variables: Vec<String>,
        span: Span,
    },
    Method {
        class_name: String,
        source: String,
        span: Span,
    },
}

impl Declaration {
    /// The span of the declaration's keyword line.
    pub fn span(&self) -> Span {
        match self {
            Declaration::RawClass { span, .. }
            | Declaration::Class { span, .. }
            | Declaration::Method { span, .. } => *span,
        }
    }
}

/// A source line with its location, line endings stripped.
struct Line<'a> {
    text: &'a str,
    span: Span,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (index, raw) in source.split('\n').enumerate() {
        let text = raw.strip_suffix('\r').unwrap_or(raw);
        let start = Pos::new(offset, index + 1, 1);
        let end = Pos::new(offset + text.len(), index + 1, text.len() + 1);
        lines.push(Line {
            text,
            span: Span::new(start, end),
        });
        offset += raw.len() + 1;
    }
    lines
}

/// Parse image source into its declaration list.
pub fn read_declarations(
    source: &str,
) -> Result<Vec<Declaration>, CompileError> {
    let lines = split_lines(source);
    let mut declarations = Vec::new();
    let mut cursor = 0;
    while cursor < lines.len() {
        let line = &lines[cursor];
        cursor += 1;
        let mut words = line.text.split_whitespace();
        let Some(keyword) = words.next() else {
            continue;
        };
        match keyword {
            "COMMENT" => {}
            "RAWCLASS" => {
                let name = class_word(words.next(), "name", line)?;
                let metaclass = class_word(words.next(), "metaclass", line)?;
                let parent = parent_word(words.next(), line)?;
                declarations.push(Declaration::RawClass {
                    name,
                    metaclass,
                    parent,
                    variables: words.map(str::to_string).collect(),
                    span: line.span,
                });
            }
            "CLASS" => {
                let name = class_word(words.next(), "name", line)?;
                let parent = parent_word(words.next(), line)?;
                declarations.push(Declaration::Class {
                    name,
                    parent,
                    variables: words.map(str::to_string).collect(),
                    span: line.span,
                });
            }
            "METHOD" => {
                let class_name = class_word(words.next(), "class", line)?;
                if let Some(extra) = words.next() {
                    return Err(CompileError::new(
                        "METHOD takes a single class name",
                        line.span,
                    )
                    .with_token(extra.to_string()));
                }
                let mut body = String::new();
                loop {
                    let Some(chunk_line) = lines.get(cursor) else {
                        return Err(CompileError::new(
                            format!(
                                "unterminated METHOD for class {class_name}"
                            ),
                            line.span,
                        )
                        .with_token(class_name));
                    };
                    cursor += 1;
                    if chunk_line.text.trim() == "!" {
                        break;
                    }
                    body.push_str(chunk_line.text);
                    body.push('\n');
                }
                declarations.push(Declaration::Method {
                    class_name,
                    source: body,
                    span: line.span,
                });
            }
            _ => {
                return Err(CompileError::new(
                    format!("unknown declaration keyword {keyword}"),
                    line.span,
                )
                .with_token(keyword.to_string()));
            }
        }
    }
    Ok(declarations)
}

fn class_word(
    word: Option<&str>,
    what: &str,
    line: &Line<'_>,
) -> Result<String, CompileError> {
    match word {
        Some(word) => Ok(word.to_string()),
        None => Err(CompileError::new(
            format!("declaration is missing its {what}"),
            line.span,
        )),
    }
}

/// A parent written `nil` means the class is a hierarchy root.
fn parent_word(
    word: Option<&str>,
    line: &Line<'_>,
) -> Result<Option<String>, CompileError> {
    match class_word(word, "parent", line)? {
        name if name == "nil" => Ok(None),
        name => Ok(Some(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOTSTRAP: &str = "\
RAWCLASS Object MetaObject nil
RAWCLASS Class      MetaClass Object      name parentClass methods size variables children
RAWCLASS MetaObject Class     Class
RAWCLASS MetaClass  Class     MetaObject
";

    #[test]
    fn reads_the_bootstrap_declarations() {
        let decls = read_declarations(BOOTSTRAP).unwrap();
        assert_eq!(decls.len(), 4);
        let Declaration::RawClass {
            name,
            metaclass,
            parent,
            variables,
            ..
        } = &decls[0]
        else {
            panic!("expected a rawclass");
        };
        assert_eq!(name, "Object");
        assert_eq!(metaclass, "MetaObject");
        assert_eq!(*parent, None);
        assert!(variables.is_empty());
        let Declaration::RawClass {
            parent, variables, ..
        } = &decls[1]
        else {
            panic!("expected a rawclass");
        };
        assert_eq!(parent.as_deref(), Some("Object"));
        assert_eq!(variables.len(), 6);
        assert_eq!(variables[0], "name");
        assert_eq!(variables[5], "children");
    }

    #[test]
    fn class_declarations_carry_parent_and_variables() {
        let decls = read_declarations(
            "CLASS Context Object method arguments temporaries\n",
        )
        .unwrap();
        assert_eq!(
            decls,
            vec![Declaration::Class {
                name: "Context".into(),
                parent: Some("Object".into()),
                variables: vec![
                    "method".into(),
                    "arguments".into(),
                    "temporaries".into()
                ],
                span: decls[0].span(),
            }]
        );
    }

    #[test]
    fn method_chunks_run_until_the_bang_line() {
        let decls = read_declarations(
            "METHOD Object\nisNil\n\t^false\n!\nCLASS Undefined Object\n",
        )
        .unwrap();
        assert_eq!(decls.len(), 2);
        let Declaration::Method {
            class_name, source, ..
        } = &decls[0]
        else {
            panic!("expected a method");
        };
        assert_eq!(class_name, "Object");
        assert_eq!(source, "isNil\n\t^false\n");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let decls = read_declarations(
            "\nCOMMENT bootstrap world\n\nCLASS Undefined Object\n\n",
        )
        .unwrap();
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn unknown_keywords_are_rejected() {
        let e = read_declarations("FROB x\n").unwrap_err();
        assert_eq!(e.message, "unknown declaration keyword FROB");
        assert_eq!(e.token.as_deref(), Some("FROB"));
        assert_eq!(e.span.start.line, 1);
    }

    #[test]
    fn unterminated_method_chunks_fail() {
        let e =
            read_declarations("METHOD Object\nisNil\n\t^false\n").unwrap_err();
        assert_eq!(e.message, "unterminated METHOD for class Object");
    }

    #[test]
    fn truncated_class_lines_fail() {
        let e = read_declarations("CLASS Lonely\n").unwrap_err();
        assert_eq!(e.message, "declaration is missing its parent");
        let e = read_declarations("RAWCLASS Foo\n").unwrap_err();
        assert_eq!(e.message, "declaration is missing its metaclass");
    }

    #[test]
    fn declaration_spans_point_at_their_line() {
        let decls =
            read_declarations("COMMENT one\nCLASS Undefined Object\n")
                .unwrap();
        assert_eq!(decls[0].span().start.line, 2);
    }
}
