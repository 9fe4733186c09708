// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors shared by every parser and by the UTF-8 codec.
///
/// Any error returned from a `next` call is terminal: the parser keeps it and
/// reports it again on every following call until it is reset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Allocation or other environment failure.
    #[error("system error")]
    System,
    /// The parser was driven from a state it cannot continue from.
    #[error("parser state is invalid")]
    State,
    /// The input violates the grammar at the current position.
    #[error("invalid syntax")]
    Syntax,
    /// A bounded token grew past its configured maximum.
    #[error("size of value exceeded maximum allowed")]
    Size,
    /// Nesting went past the fixed stack capacity.
    #[error("stack size exceeded")]
    Stack,
    /// Malformed backslash escape.
    #[error("invalid escape sequence")]
    Escape,
    /// Code point is out of range.
    #[error("invalid code point")]
    Codepoint,
    /// Byte sequence is not valid UTF-8.
    #[error("invalid encoding")]
    Encoding,
    /// Surrogate escape without a matching partner.
    #[error("invalid surrogate pair")]
    Surrogate,
    /// More bytes are required to decide.
    #[error("sequence is too short")]
    TooShort,
}

impl ParseError {
    /// Small negative code for this error, stable across releases.
    pub const fn code(self) -> i32 {
        match self {
            ParseError::System => -1,
            ParseError::State => -2,
            ParseError::Syntax => -3,
            ParseError::Size => -4,
            ParseError::Stack => -5,
            ParseError::Escape => -6,
            ParseError::Codepoint => -7,
            ParseError::Encoding => -8,
            ParseError::Surrogate => -9,
            ParseError::TooShort => -10,
        }
    }

    /// Inverse of [`ParseError::code`].
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => ParseError::System,
            -2 => ParseError::State,
            -3 => ParseError::Syntax,
            -4 => ParseError::Size,
            -5 => ParseError::Stack,
            -6 => ParseError::Escape,
            -7 => ParseError::Codepoint,
            -8 => ParseError::Encoding,
            -9 => ParseError::Surrogate,
            -10 => ParseError::TooShort,
            _ => return None,
        })
    }

    /// Static message for this error.
    pub const fn as_str(self) -> &'static str {
        match self {
            ParseError::System => "system error",
            ParseError::State => "parser state is invalid",
            ParseError::Syntax => "invalid syntax",
            ParseError::Size => "size of value exceeded maximum allowed",
            ParseError::Stack => "stack size exceeded",
            ParseError::Escape => "invalid escape sequence",
            ParseError::Codepoint => "invalid code point",
            ParseError::Encoding => "invalid encoding",
            ParseError::Surrogate => "invalid surrogate pair",
            ParseError::TooShort => "sequence is too short",
        }
    }
}

/// Renders a negative error code as a message.
pub fn strerror(code: i32) -> &'static str {
    match ParseError::from_code(code) {
        Some(err) => err.as_str(),
        None => "unknown error",
    }
}
