use std::fmt;

use serde::Serialize;

/// A script failure from any pipeline stage, tied to a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Validate,
    Runtime,
}

impl ScriptError {
    pub fn lex(message: impl Into<String>, line: usize) -> Self {
        Self {
            line,
            message: message.into(),
            kind: ErrorKind::Lex,
        }
    }

    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Self {
            line,
            message: message.into(),
            kind: ErrorKind::Parse,
        }
    }

    pub fn validate(message: impl Into<String>, line: usize) -> Self {
        Self {
            line,
            message: message.into(),
            kind: ErrorKind::Validate,
        }
    }

    pub fn runtime(message: impl Into<String>, line: usize) -> Self {
        Self {
            line,
            message: message.into(),
            kind: ErrorKind::Runtime,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self.kind {
            ErrorKind::Lex => "lexer",
            ErrorKind::Parse => "parser",
            ErrorKind::Validate => "validation",
            ErrorKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "At line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

impl Serialize for ScriptError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_line() {
        let e = ScriptError::lex("invalid character '@'", 3);
        assert_eq!(e.to_string(), "At line 3: invalid character '@'");
    }

    #[test]
    fn stage_names() {
        assert_eq!(ScriptError::parse("x", 1).stage(), "parser");
        assert_eq!(ScriptError::runtime("x", 1).stage(), "runtime");
    }
}
