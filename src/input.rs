//! Character sources feeding the scanner.
//!
//! The scanner consumes characters one at a time but frequently needs a few
//! characters of lookahead (document markers need 4, escape sequences need
//! incremental peeking). Hiding the source behind [`Input`] lets in-memory
//! strings serve characters without copying while buffered byte streams pay
//! for a small ring buffer only.

pub mod buffered;
pub mod str;

#[allow(clippy::module_name_repetitions)]
pub use buffered::BufferedInput;
#[allow(clippy::module_name_repetitions)]
pub use self::str::StrInput;

use crate::char_traits::{is_any_break, is_blank, is_blank_or_breakz, is_breakz, is_z};

/// Interface for a source of characters.
///
/// When the source is exhausted, all reads return `'\0'`; the scanner treats
/// the nil character as end of input everywhere.
pub trait Input {
    /// Make sure at least `count` characters are available for peeking.
    ///
    /// Characters must not be consumed. Implementations for fully-loaded
    /// sources may make this a no-op.
    fn lookahead(&mut self, count: usize);

    /// Return the next character without consuming it.
    ///
    /// A prior [`Input::lookahead`] of at least 1 must have been issued.
    #[must_use]
    fn peek(&self) -> char;

    /// Return the `n`-th character (0-based) without consuming it.
    ///
    /// A prior [`Input::lookahead`] of at least `n + 1` must have been issued.
    #[must_use]
    fn peek_nth(&self, n: usize) -> char;

    /// Consume the next character.
    fn skip(&mut self);

    /// Consume the next `count` characters.
    fn skip_n(&mut self, count: usize) {
        for _ in 0..count {
            self.skip();
        }
    }

    /// Look one character ahead and return it without consuming it.
    #[inline]
    #[must_use]
    fn look_ch(&mut self) -> char {
        self.lookahead(1);
        self.peek()
    }

    /// Whether the next character equals `c`. Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_char_is(&self, c: char) -> bool {
        self.peek() == c
    }

    /// Whether the next two characters match. Assumes `lookahead(2)`.
    #[inline]
    #[must_use]
    fn next_2_are(&self, c1: char, c2: char) -> bool {
        self.peek() == c1 && self.peek_nth(1) == c2
    }

    /// Whether the next three characters match. Assumes `lookahead(3)`.
    #[inline]
    #[must_use]
    fn next_3_are(&self, c1: char, c2: char, c3: char) -> bool {
        self.peek() == c1 && self.peek_nth(1) == c2 && self.peek_nth(2) == c3
    }

    /// Whether the next characters form `---` followed by a blank, a break or
    /// the end of input. Assumes `lookahead(4)`.
    #[inline]
    #[must_use]
    fn next_is_document_start(&self) -> bool {
        self.next_3_are('-', '-', '-') && is_blank_or_breakz(self.peek_nth(3))
    }

    /// Whether the next characters form `...` followed by a blank, a break or
    /// the end of input. Assumes `lookahead(4)`.
    #[inline]
    #[must_use]
    fn next_is_document_end(&self) -> bool {
        self.next_3_are('.', '.', '.') && is_blank_or_breakz(self.peek_nth(3))
    }

    /// Whether the next characters form either document marker.
    /// Assumes `lookahead(4)`.
    #[inline]
    #[must_use]
    fn next_is_document_indicator(&self) -> bool {
        self.next_is_document_start() || self.next_is_document_end()
    }

    /// Whether the next character is a blank. Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_is_blank(&self) -> bool {
        is_blank(self.peek())
    }

    /// Whether the next character is a line break. Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_is_break(&self) -> bool {
        is_any_break(self.peek())
    }

    /// Whether the next character is a break or end of input.
    /// Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_is_breakz(&self) -> bool {
        is_breakz(self.peek())
    }

    /// Whether the next character is a blank, a break or end of input.
    /// Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_is_blank_or_breakz(&self) -> bool {
        is_blank_or_breakz(self.peek())
    }

    /// Whether the source is at end of input. Assumes a prior lookahead.
    #[inline]
    #[must_use]
    fn next_is_z(&self) -> bool {
        is_z(self.peek())
    }
}
