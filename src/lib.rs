// Copyright 2025, the citrine-parser authors.
// See the LICENSE file at the top-level directory of this distribution.

//! YAML 1.3-draft pull parser in pure Rust.
//!
//! **This crate contains only the parser.** It turns a stream of characters
//! into a stream of structural [`Event`]s (documents, mappings, sequences,
//! scalars, aliases, annotations), each carrying its input [`Span`]. Loading
//! to a document tree, schema resolution and emission are left to layers
//! above.
//!
//! # Usage
//!
//! ```
//! use citrine_parser::{Event, EventKind, Parser};
//!
//! let mut parser = Parser::new_from_str("greeting: hello");
//! let events: Vec<Event> = parser.collect::<Result<_, _>>().unwrap();
//! assert!(matches!(events[0].kind, EventKind::StreamStart));
//! ```
//!
//! Byte sources in UTF-8, UTF-16 or UTF-32 can be transcoded first:
//!
//! ```
//! use citrine_parser::{decode_bytes, Parser};
//!
//! let text = decode_bytes(b"\xff\xfea\x00:\x00 \x001\x00").unwrap();
//! let parser = Parser::new_from_str(&text);
//! assert_eq!(parser.count(), 8);
//! ```
//!
//! # Features
//!
//! #### `debug_prints`
//! Enables scanner and parser trace prints on stderr. Meant for working on
//! this crate, not for consuming it; it noticeably degrades performance.

#![warn(missing_docs, clippy::pedantic)]
#![allow(
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

mod char_traits;
#[macro_use]
mod debug;
pub mod encoding;
mod error;
pub mod input;
mod interner;
mod mark;
mod parser;
mod scanner;

pub use crate::encoding::{decode_bytes, decode_reader, read_file, StreamEncoding};
pub use crate::error::{DecodeError, Error, ParseError, ScanError};
pub use crate::input::{buffered::BufferedInput, str::StrInput, Input};
pub use crate::interner::{IStr, Interner};
pub use crate::mark::{Mark, Span};
pub use crate::parser::{
    CollectionStyle, Event, EventKind, EventReceiver, NodeProperties, Parser, ScalarStyle,
};
pub use crate::scanner::{Regime, Scanner, Token, TokenKind};
