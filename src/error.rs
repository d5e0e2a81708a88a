//! Errors surfaced by the scanner, the parser and the byte decoder.

use thiserror::Error;

use crate::mark::{Mark, Span};

/// An error found while tokenizing the input.
///
/// Carries the position of the offending character and the span of the most
/// recently scanned token for diagnostics.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{info} at {mark}")]
pub struct ScanError {
    mark: Mark,
    token_span: Span,
    info: String,
}

impl ScanError {
    /// Create a new `ScanError` at the given position.
    #[must_use]
    pub fn new(mark: Mark, token_span: Span, info: impl Into<String>) -> Self {
        Self {
            mark,
            token_span,
            info: info.into(),
        }
    }

    /// The position of the character that could not be scanned.
    #[must_use]
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// The span of the most recent token before the failure.
    #[must_use]
    pub fn token_span(&self) -> Span {
        self.token_span
    }

    /// The error message, without position information.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }
}

/// An error found while interpreting the token stream.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{info} at {mark}")]
pub struct ParseError {
    mark: Mark,
    token_span: Span,
    info: String,
}

impl ParseError {
    /// Create a new `ParseError` anchored at the offending token.
    #[must_use]
    pub fn new(mark: Mark, token_span: Span, info: impl Into<String>) -> Self {
        Self {
            mark,
            token_span,
            info: info.into(),
        }
    }

    /// The position of the token the parser could not accept.
    #[must_use]
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// The span of the offending token.
    #[must_use]
    pub fn token_span(&self) -> Span {
        self.token_span
    }

    /// The error message, without position information.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }
}

/// Any error terminating the event stream.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    /// The lexer could not tokenize the input.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// The parser could not accept a token.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// The position of the offending character or token.
    #[must_use]
    pub fn mark(&self) -> Mark {
        match self {
            Error::Scan(e) => e.mark(),
            Error::Parse(e) => e.mark(),
        }
    }

    /// The error message, without position information.
    #[must_use]
    pub fn info(&self) -> &str {
        match self {
            Error::Scan(e) => e.info(),
            Error::Parse(e) => e.info(),
        }
    }
}

/// An error decoding a byte source into UTF-8.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading from the underlying source failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The input contained a byte sequence invalid for its encoding.
    #[error("invalid character sequence at byte {offset}: {sequence:?}")]
    Malformed {
        /// Byte offset of the malformed sequence.
        offset: usize,
        /// The offending bytes.
        sequence: Vec<u8>,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_includes_position() {
        let err = ScanError::new(
            Mark::new(26, 4, 4),
            Span::default(),
            "mapping values are not allowed in this context",
        );
        assert_eq!(
            err.to_string(),
            "mapping values are not allowed in this context at byte 26 line 4 column 4"
        );
    }

    #[test]
    fn union_preserves_info() {
        let err: Error = ParseError::new(Mark::default(), Span::default(), "boom").into();
        assert_eq!(err.info(), "boom");
    }
}
