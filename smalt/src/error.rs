/// Compile-time error values.
use crate::span::Span;

/// An error raised anywhere in the pipeline: lexing/parsing method
/// source, encoding bytecode, or building the class table.
///
/// Carries a human-readable message, the offending source location, and
/// optionally the token the message is about (a duplicate name, an
/// unresolved class, an unexpected lexeme). Raised at the point of
/// detection and propagated unchanged; nothing downstream retries.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub token: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            token: None,
        }
    }

    /// Attach the offending token text.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Pos;

    #[test]
    fn display_includes_location() {
        let err = CompileError::new(
            "Unknown variable \"y\"",
            Span::point(Pos::new(4, 2, 3)),
        )
        .with_token("y");
        assert_eq!(err.to_string(), "Unknown variable \"y\" at 2:3");
        assert_eq!(err.token.as_deref(), Some("y"));
    }
}
