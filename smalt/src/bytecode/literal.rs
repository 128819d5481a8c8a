use crate::bytecode::encoder::EncodeError;

/// Pool indices are a single byte.
const MAX_LITERALS: usize = 256;

/// A value in a compiled method's literal pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Symbol(String),
    Char(char),
    Array(Vec<Literal>),
    /// A global class reference, resolved when the image is built.
    Class(String),
}

impl core::fmt::Display for Literal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Symbol(s) => write!(f, "#{s}"),
            Literal::Char(c) => write!(f, "${c}"),
            Literal::Array(items) => {
                write!(f, "#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Literal::Class(name) => write!(f, "{name}"),
        }
    }
}

/// Ordered literal pool of one compiled method.
///
/// Pushed literals always append; only send selectors are looked up
/// by value and reused.
#[derive(Debug, Clone, Default)]
pub struct LiteralPool {
    entries: Vec<Literal>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a literal and return its pool index.
    pub fn add(&mut self, literal: Literal) -> Result<u8, EncodeError> {
        if self.entries.len() >= MAX_LITERALS {
            return Err(EncodeError::TooManyLiterals);
        }
        self.entries.push(literal);
        Ok((self.entries.len() - 1) as u8)
    }

    /// Pool index of a send selector, appending it when absent.
    pub fn selector(&mut self, name: &str) -> Result<u8, EncodeError> {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Literal::Symbol(existing) = entry {
                if existing == name {
                    return Ok(index as u8);
                }
            }
        }
        self.add(Literal::Symbol(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<&Literal> {
        self.entries.get(index as usize)
    }

    pub fn into_literals(self) -> Vec<Literal> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_interned() {
        let mut pool = LiteralPool::new();
        let a = pool.selector("at:put:").unwrap();
        let b = pool.selector("printString").unwrap();
        let c = pool.selector("at:put:").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(c, a);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pushed_literals_always_append() {
        let mut pool = LiteralPool::new();
        let a = pool.add(Literal::Integer(10)).unwrap();
        let b = pool.add(Literal::Integer(10)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pool_is_capped_at_a_byte_of_indices() {
        let mut pool = LiteralPool::new();
        for i in 0..256 {
            pool.add(Literal::Integer(i)).unwrap();
        }
        assert!(matches!(
            pool.add(Literal::Integer(256)),
            Err(EncodeError::TooManyLiterals)
        ));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Literal::Symbol("foo".into()).to_string(), "#foo");
        assert_eq!(Literal::String("hi".into()).to_string(), "'hi'");
        assert_eq!(Literal::Char('x').to_string(), "$x");
        assert_eq!(
            Literal::Array(vec![
                Literal::Integer(1),
                Literal::Symbol("a".into())
            ])
            .to_string(),
            "#(1 #a)"
        );
    }
}
