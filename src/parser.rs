//! The parser: a state-stack event producer on top of the scanner.
//!
//! Each [`Parser::next_event`] call runs the state function at the top of a
//! stack of `(state, indentation)` levels until one of them emits an event.
//! States peek at most one token (under the regime they choose), so the
//! scanner never runs ahead of what the parser has committed to.

use crate::error::{Error, ParseError};
use crate::input::{BufferedInput, Input, StrInput};
use crate::interner::{IStr, Interner};
use crate::mark::{Mark, Span};
use crate::scanner::{Regime, Scanner, Token, TokenKind};

/// The maximum number of nested levels before parsing aborts, unless
/// overridden with [`Parser::set_max_nesting_depth`].
const DEFAULT_MAX_NESTING_DEPTH: usize = 1024;

/// The longest an implicit mapping key may be, in bytes.
const MAX_IMPLICIT_KEY_LEN: usize = 1024;

/// The anchor and tag attached to a node, both optional.
///
/// The tag is fully resolved: handles have been combined with the active
/// `%TAG` directives at lex time.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NodeProperties {
    /// The `&name` anchor, if any.
    pub anchor: Option<IStr>,
    /// The resolved tag, if any.
    pub tag: Option<IStr>,
}

impl NodeProperties {
    /// Whether neither an anchor nor a tag is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.tag.is_none()
    }
}

/// The presentation style of a scalar.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScalarStyle {
    /// An unquoted scalar.
    Plain,
    /// `'…'`.
    SingleQuoted,
    /// `"…"`.
    DoubleQuoted,
    /// `|`.
    Literal,
    /// `>`.
    Folded,
}

/// The presentation style of a collection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CollectionStyle {
    /// Indentation-structured.
    Block,
    /// `[…]` / `{…}`.
    Flow,
}

/// What an event is.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventKind {
    /// The first event of every stream.
    StreamStart,
    /// The last event of every stream; returned idempotently afterwards.
    StreamEnd,
    /// A document begins. `explicit` is true for documents opened with `---`.
    DocumentStart {
        /// Whether the document was opened with `---`.
        explicit: bool,
        /// The `%YAML` version, when one was declared.
        version: Option<(u32, u32)>,
    },
    /// A document ends. `implicit` is false for documents closed with `...`.
    DocumentEnd {
        /// Whether the document ended without an explicit `...`.
        implicit: bool,
    },
    /// A reference to an anchored node.
    Alias {
        /// The referenced anchor name.
        anchor: IStr,
        /// Properties attached before the alias.
        properties: NodeProperties,
    },
    /// A scalar node.
    Scalar {
        /// The scalar content, after unescaping and folding.
        value: IStr,
        /// How the scalar was written.
        style: ScalarStyle,
        /// The node's anchor and tag.
        properties: NodeProperties,
    },
    /// A sequence begins.
    SequenceStart {
        /// How the sequence is written.
        style: CollectionStyle,
        /// The node's anchor and tag.
        properties: NodeProperties,
    },
    /// The matching end of a [`EventKind::SequenceStart`].
    SequenceEnd,
    /// A mapping begins. Its children alternate key, value.
    MappingStart {
        /// How the mapping is written.
        style: CollectionStyle,
        /// The node's anchor and tag.
        properties: NodeProperties,
    },
    /// The matching end of a [`EventKind::MappingStart`].
    MappingEnd,
    /// An `@name` annotation begins; its parameters follow as flow items.
    AnnotationStart {
        /// The annotation name.
        name: IStr,
    },
    /// The matching end of an [`EventKind::AnnotationStart`].
    AnnotationEnd,
}

/// An event: a kind and the input span it covers.
///
/// Events are emitted once and owned by the consumer; interned payloads keep
/// their backing allocation alive after the parser is gone.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Event {
    /// What the event is.
    pub kind: EventKind,
    /// Where it starts and ends.
    pub span: Span,
}

impl Event {
    fn new(kind: EventKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A sink driven by [`Parser::load`].
pub trait EventReceiver {
    /// Called once per event, in stream order.
    fn on_event(&mut self, event: Event);
}

/// The syntactic position a node is parsed in; decides implicit-key and
/// single-pair-mapping synthesis.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NodeCtx {
    /// The root node of a document.
    Root,
    /// A block mapping value.
    Value,
    /// A block mapping key of an already-open mapping; `: ` must follow.
    ImplicitKey,
    /// An explicit `?` key node.
    ExplicitKey,
    /// A block sequence entry.
    SeqEntry,
    /// A flow sequence entry or annotation parameter; `a: b` synthesizes a
    /// single-pair mapping.
    FlowEntry,
    /// A flow mapping key or value.
    Flow,
}

impl NodeCtx {
    fn is_flow(self) -> bool {
        matches!(self, NodeCtx::FlowEntry | NodeCtx::Flow)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    StreamStart,
    BeforeDocument,
    DocumentContent,
    BeforeDocumentEnd,
    Node(NodeCtx),
    BlockSequence,
    BlockMappingKey,
    BlockMappingValue,
    /// Emit the cached key of a just-synthesized block mapping.
    BlockMappingCachedKey,
    FlowSequence { first: bool },
    FlowMappingKey { first: bool },
    FlowMappingValue,
    /// Emit the cached key of a just-synthesized single-pair mapping.
    FlowPairKey,
    FlowPairValue,
    FlowPairEnd,
    AnnotationBody { in_flow: bool },
    AnnotationParams { first: bool },
    End,
}

/// One entry of the parser's level stack.
#[derive(Clone, Copy, Debug)]
struct Level {
    state: State,
    /// Block indentation column (0-based); `-1` in flow context, `-2` for
    /// the implicit root.
    indent: i32,
    /// The line the level was established on, for same-line rules.
    line: usize,
}

/// Node properties read but not yet attached to a node.
#[derive(Default)]
struct PendingProps {
    anchor: Option<IStr>,
    tag: Option<IStr>,
    /// Line of the last property token, for deciding whether properties
    /// belong to a synthesized mapping or to its first key.
    last_line: usize,
}

impl PendingProps {
    fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.tag.is_none()
    }
}

/// A YAML pull parser producing [`Event`]s.
pub struct Parser<I: Input> {
    scanner: Scanner<I>,
    interner: Interner,
    levels: Vec<Level>,
    /// The peeked, unconsumed token.
    token: Option<Token>,
    /// Indentation of the current line, from the scanner's indentation
    /// tokens.
    line_indent: i32,
    /// The line `line_indent` was measured on.
    line_indent_line: usize,
    props: PendingProps,
    /// The key node of a synthesized mapping, emitted by the cached-key
    /// states.
    cached: Option<Event>,
    /// `%YAML` version seen before the next `---`.
    pending_version: Option<(u32, u32)>,
    /// Whether any directive was seen since the last document boundary.
    directives_seen: bool,
    max_nesting_depth: usize,
    /// Set once stream-end has been emitted; `next_event` then returns it
    /// forever.
    end_event: Option<Event>,
    /// Whether the iterator has yielded stream-end or an error.
    iter_done: bool,
}

impl<'a> Parser<StrInput<'a>> {
    /// Create a parser over a string.
    #[must_use]
    pub fn new_from_str(input: &'a str) -> Self {
        Self::new(StrInput::new(input))
    }
}

impl<T: Iterator<Item = char>> Parser<BufferedInput<T>> {
    /// Create a parser over a character iterator.
    pub fn new_from_iter(iter: T) -> Self {
        Self::new(BufferedInput::new(iter))
    }
}

impl<I: Input> Parser<I> {
    /// Create a parser over the given input source.
    pub fn new(input: I) -> Self {
        let interner = Interner::new();
        Self {
            scanner: Scanner::new(input, interner.clone()),
            interner,
            levels: vec![Level {
                state: State::StreamStart,
                indent: -2,
                line: 1,
            }],
            token: None,
            line_indent: 0,
            line_indent_line: 1,
            props: PendingProps::default(),
            cached: None,
            pending_version: None,
            directives_seen: false,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            end_event: None,
            iter_done: false,
        }
    }

    /// Override the maximum nesting depth (default 1024).
    pub fn set_max_nesting_depth(&mut self, depth: usize) {
        self.max_nesting_depth = depth.max(4);
    }

    /// The position of the next unconsumed input character, for diagnostics.
    #[must_use]
    pub fn current_mark(&self) -> Mark {
        self.scanner.mark()
    }

    /// The span of the most recently scanned token, for diagnostics.
    #[must_use]
    pub fn recent_token_span(&self) -> Span {
        self.scanner.recent_token_span()
    }

    /// Produce the next event.
    ///
    /// Once stream-end has been emitted, every further call returns it again
    /// without consuming input.
    ///
    /// # Errors
    /// Returns the first [`Error`] encountered; the event stream is
    /// terminated by it.
    pub fn next_event(&mut self) -> Result<Event, Error> {
        if let Some(event) = &self.end_event {
            return Ok(event.clone());
        }
        loop {
            if let Some(event) = self.step()? {
                debug_print!("parser: emit {:?}", event.kind);
                if matches!(event.kind, EventKind::StreamEnd) {
                    self.end_event = Some(event.clone());
                }
                return Ok(event);
            }
        }
    }

    /// Drive the whole stream into `receiver`.
    ///
    /// # Errors
    /// Returns the first [`Error`] encountered.
    pub fn load<R: EventReceiver>(&mut self, receiver: &mut R) -> Result<(), Error> {
        loop {
            let event = self.next_event()?;
            let done = matches!(event.kind, EventKind::StreamEnd);
            receiver.on_event(event);
            if done {
                return Ok(());
            }
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek_token(&mut self, regime: Regime) -> Result<Token, Error> {
        while self.token.is_none() {
            let token = self.scanner.next_token(regime).map_err(Error::Scan)?;
            if let TokenKind::Indentation(n) = token.kind {
                self.line_indent = n as i32;
                self.line_indent_line = token.span.start.line();
                continue;
            }
            self.token = Some(token);
        }
        Ok(self.token.clone().unwrap_or_else(|| unreachable!()))
    }

    fn consume_token(&mut self) {
        self.token = None;
    }

    /// Whether `token` is the first content of a measured line.
    fn on_fresh_line(&self, token: &Token) -> bool {
        token.span.start.line() == self.line_indent_line
            && token.span.start.col() as i32 - 1 == self.line_indent
    }

    fn parse_error(&self, mark: Mark, info: &str) -> Error {
        Error::Parse(ParseError::new(mark, self.scanner.recent_token_span(), info))
    }

    fn top(&self) -> Level {
        *self.levels.last().unwrap_or_else(|| unreachable!())
    }

    fn set_state(&mut self, state: State) {
        if let Some(level) = self.levels.last_mut() {
            level.state = state;
        }
    }

    fn replace_top(&mut self, level: Level) {
        if let Some(top) = self.levels.last_mut() {
            *top = level;
        }
    }

    fn push_level(&mut self, state: State, indent: i32, line: usize, at: Mark) -> Result<(), Error> {
        if self.levels.len() >= self.max_nesting_depth {
            return Err(self.parse_error(at, "exceeded the maximum nesting depth while parsing"));
        }
        self.levels.push(Level {
            state,
            indent,
            line,
        });
        Ok(())
    }

    fn pop_level(&mut self) {
        self.levels.pop();
    }

    fn take_props(&mut self) -> NodeProperties {
        NodeProperties {
            anchor: self.props.anchor.take(),
            tag: self.props.tag.take(),
        }
    }

    fn empty_scalar(&self, properties: NodeProperties, at: Mark) -> Event {
        Event::new(
            EventKind::Scalar {
                value: self.interner.empty(),
                style: ScalarStyle::Plain,
                properties,
            },
            Span::empty(at),
        )
    }

    // ------------------------------------------------------------------
    // State dispatch
    // ------------------------------------------------------------------

    fn step(&mut self) -> Result<Option<Event>, Error> {
        let level = self.top();
        debug_print!("parser: step {:?}", level);
        match level.state {
            State::StreamStart => self.step_stream_start(),
            State::BeforeDocument => self.step_before_document(),
            State::DocumentContent => self.step_document_content(),
            State::BeforeDocumentEnd => self.step_before_document_end(),
            State::Node(ctx) => self.step_node(ctx, level),
            State::BlockSequence => self.step_block_sequence(level),
            State::BlockMappingKey => self.step_block_mapping_key(level),
            State::BlockMappingValue => self.step_block_mapping_value(level),
            State::BlockMappingCachedKey => {
                self.set_state(State::BlockMappingValue);
                Ok(self.cached.take())
            }
            State::FlowSequence { first } => self.step_flow_sequence(first),
            State::FlowMappingKey { first } => self.step_flow_mapping_key(first),
            State::FlowMappingValue => self.step_flow_mapping_value(),
            State::FlowPairKey => {
                self.set_state(State::FlowPairValue);
                Ok(self.cached.take())
            }
            State::FlowPairValue => self.step_flow_pair_value(),
            State::FlowPairEnd => {
                let token = self.peek_token(Regime::Flow)?;
                self.pop_level();
                Ok(Some(Event::new(
                    EventKind::MappingEnd,
                    Span::empty(token.span.start),
                )))
            }
            State::AnnotationBody { in_flow } => self.step_annotation_body(in_flow, level),
            State::AnnotationParams { first } => self.step_annotation_params(first),
            State::End => {
                let mark = self.scanner.mark();
                Ok(Some(Event::new(EventKind::StreamEnd, Span::empty(mark))))
            }
        }
    }

    fn step_stream_start(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Document)?;
        match token.kind {
            TokenKind::StreamStart => {
                self.consume_token();
                self.set_state(State::BeforeDocument);
                Ok(Some(Event::new(EventKind::StreamStart, token.span)))
            }
            _ => Err(self.parse_error(token.span.start, "did not find expected stream start")),
        }
    }

    fn step_before_document(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Document)?;
        match token.kind {
            TokenKind::ByteOrderMark | TokenKind::ReservedDirective(_) => {
                self.consume_token();
                Ok(None)
            }
            TokenKind::YamlDirective(major, minor) => {
                if self.pending_version.is_some() {
                    return Err(
                        self.parse_error(token.span.start, "found duplicate %YAML directive")
                    );
                }
                self.pending_version = Some((major, minor));
                self.directives_seen = true;
                self.consume_token();
                Ok(None)
            }
            TokenKind::TagDirective { .. } => {
                // The scanner recorded the binding; nothing to interpret.
                self.directives_seen = true;
                self.consume_token();
                Ok(None)
            }
            TokenKind::StreamEnd => {
                self.consume_token();
                self.set_state(State::End);
                Ok(Some(Event::new(EventKind::StreamEnd, token.span)))
            }
            TokenKind::DirectivesEnd => {
                self.consume_token();
                let version = self.pending_version.take();
                self.directives_seen = false;
                self.set_state(State::BeforeDocumentEnd);
                self.push_level(
                    State::DocumentContent,
                    -2,
                    token.span.start.line(),
                    token.span.start,
                )?;
                Ok(Some(Event::new(
                    EventKind::DocumentStart {
                        explicit: true,
                        version,
                    },
                    token.span,
                )))
            }
            _ => {
                if self.directives_seen {
                    return Err(self.parse_error(
                        token.span.start,
                        "expected '---' after the directives",
                    ));
                }
                self.set_state(State::BeforeDocumentEnd);
                self.push_level(
                    State::DocumentContent,
                    -2,
                    token.span.start.line(),
                    token.span.start,
                )?;
                Ok(Some(Event::new(
                    EventKind::DocumentStart {
                        explicit: false,
                        version: None,
                    },
                    Span::empty(token.span.start),
                )))
            }
        }
    }

    fn step_document_content(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Document)?;
        match token.kind {
            TokenKind::DirectivesEnd
            | TokenKind::DocumentEnd
            | TokenKind::StreamEnd
            | TokenKind::YamlDirective(..)
            | TokenKind::TagDirective { .. }
            | TokenKind::ReservedDirective(_) => {
                // Empty document.
                self.pop_level();
                let properties = self.take_props();
                Ok(Some(self.empty_scalar(properties, token.span.start)))
            }
            _ => {
                self.set_state(State::Node(NodeCtx::Root));
                Ok(None)
            }
        }
    }

    fn step_before_document_end(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Document)?;
        match token.kind {
            TokenKind::DocumentEnd => {
                self.consume_token();
                self.pending_version = None;
                self.directives_seen = false;
                self.set_state(State::BeforeDocument);
                Ok(Some(Event::new(
                    EventKind::DocumentEnd { implicit: false },
                    token.span,
                )))
            }
            TokenKind::StreamEnd
            | TokenKind::DirectivesEnd
            | TokenKind::ByteOrderMark
            | TokenKind::YamlDirective(..)
            | TokenKind::TagDirective { .. }
            | TokenKind::ReservedDirective(_) => {
                self.set_state(State::BeforeDocument);
                Ok(Some(Event::new(
                    EventKind::DocumentEnd { implicit: true },
                    Span::empty(token.span.start),
                )))
            }
            TokenKind::BlockMapValue => Err(self.parse_error(
                token.span.start,
                "mapping values are not allowed in this context",
            )),
            _ => Err(self.parse_error(
                token.span.start,
                "unexpected content after the document root node",
            )),
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    fn node_regime(ctx: NodeCtx, indent: i32) -> Regime {
        if ctx.is_flow() {
            Regime::Flow
        } else {
            Regime::Block { indent }
        }
    }

    fn step_node(&mut self, ctx: NodeCtx, level: Level) -> Result<Option<Event>, Error> {
        let regime = Self::node_regime(ctx, level.indent);
        let token = self.peek_token(regime)?;

        match token.kind {
            TokenKind::StreamEnd | TokenKind::DirectivesEnd | TokenKind::DocumentEnd => {
                return self.finish_empty_node(token.span.start);
            }
            _ => {}
        }

        // A node less indented than its parent is missing; the token belongs
        // to an outer level.
        if !ctx.is_flow()
            && ctx != NodeCtx::ImplicitKey
            && self.on_fresh_line(&token)
            && self.line_indent <= level.indent
        {
            let indentless_entry = ctx == NodeCtx::Value
                && token.kind == TokenKind::BlockEntry
                && token.span.start.col() as i32 - 1 == level.indent;
            if !indentless_entry {
                return self.finish_empty_node(token.span.start);
            }
        }

        match token.kind {
            TokenKind::Anchor(ref name) => {
                if self.props.anchor.is_some() {
                    return Err(self.parse_error(
                        token.span.start,
                        "while parsing a node, found duplicate anchor property",
                    ));
                }
                self.props.anchor = Some(name.clone());
                self.props.last_line = token.span.start.line();
                self.consume_token();
                Ok(None)
            }
            TokenKind::VerbatimTag(ref uri) => {
                if self.props.tag.is_some() {
                    return Err(self.parse_error(
                        token.span.start,
                        "while parsing a node, found duplicate tag property",
                    ));
                }
                self.props.tag = Some(uri.clone());
                self.props.last_line = token.span.start.line();
                self.consume_token();
                Ok(None)
            }
            TokenKind::TagHandle(ref prefix) => {
                if self.props.tag.is_some() {
                    return Err(self.parse_error(
                        token.span.start,
                        "while parsing a node, found duplicate tag property",
                    ));
                }
                let prefix = prefix.clone();
                self.consume_token();
                let suffix_token = self.peek_token(regime)?;
                let TokenKind::TagSuffix(ref suffix) = suffix_token.kind else {
                    return Err(self.parse_error(
                        suffix_token.span.start,
                        "while parsing a node, did not find expected tag suffix",
                    ));
                };
                let mut tag = String::with_capacity(prefix.len() + suffix.len());
                tag.push_str(&prefix);
                tag.push_str(suffix);
                self.props.tag = Some(self.interner.intern_owned(tag));
                self.props.last_line = suffix_token.span.start.line();
                self.consume_token();
                Ok(None)
            }
            TokenKind::AnnotationStart(ref name) => {
                if !self.props.is_empty() {
                    return Err(self.parse_error(
                        token.span.start,
                        "annotations are not allowed after node properties",
                    ));
                }
                let name = name.clone();
                self.consume_token();
                self.push_level(
                    State::AnnotationBody {
                        in_flow: ctx.is_flow(),
                    },
                    level.indent,
                    token.span.start.line(),
                    token.span.start,
                )?;
                Ok(Some(Event::new(
                    EventKind::AnnotationStart { name },
                    token.span,
                )))
            }
            TokenKind::Alias(ref anchor) => {
                let anchor = anchor.clone();
                self.consume_token();
                let properties = self.take_props();
                self.finish_node(
                    EventKind::Alias { anchor, properties },
                    token.span,
                    ctx,
                    level,
                    regime,
                )
            }
            TokenKind::PlainScalar(_)
            | TokenKind::SingleQuotedScalar(_)
            | TokenKind::DoubleQuotedScalar(_)
            | TokenKind::LiteralScalar(_)
            | TokenKind::FoldedScalar(_) => {
                let (value, style) = match token.kind {
                    TokenKind::PlainScalar(ref v) => (v.clone(), ScalarStyle::Plain),
                    TokenKind::SingleQuotedScalar(ref v) => (v.clone(), ScalarStyle::SingleQuoted),
                    TokenKind::DoubleQuotedScalar(ref v) => (v.clone(), ScalarStyle::DoubleQuoted),
                    TokenKind::LiteralScalar(ref v) => (v.clone(), ScalarStyle::Literal),
                    TokenKind::FoldedScalar(ref v) => (v.clone(), ScalarStyle::Folded),
                    _ => unreachable!(),
                };
                self.consume_token();
                let properties = self.take_props();
                self.finish_node(
                    EventKind::Scalar {
                        value,
                        style,
                        properties,
                    },
                    token.span,
                    ctx,
                    level,
                    regime,
                )
            }
            TokenKind::FlowSeqStart => {
                self.consume_token();
                let properties = self.take_props();
                self.replace_top(Level {
                    state: State::FlowSequence { first: true },
                    indent: -1,
                    line: token.span.start.line(),
                });
                Ok(Some(Event::new(
                    EventKind::SequenceStart {
                        style: CollectionStyle::Flow,
                        properties,
                    },
                    token.span,
                )))
            }
            TokenKind::FlowMapStart => {
                self.consume_token();
                let properties = self.take_props();
                self.replace_top(Level {
                    state: State::FlowMappingKey { first: true },
                    indent: -1,
                    line: token.span.start.line(),
                });
                Ok(Some(Event::new(
                    EventKind::MappingStart {
                        style: CollectionStyle::Flow,
                        properties,
                    },
                    token.span,
                )))
            }
            TokenKind::BlockEntry => {
                if matches!(ctx, NodeCtx::Value | NodeCtx::ImplicitKey)
                    && token.span.start.line() == level.line
                {
                    return Err(self.parse_error(
                        token.span.start,
                        "block sequence entries are not allowed in this context",
                    ));
                }
                let seq_indent = token.span.start.col() as i32 - 1;
                if seq_indent < level.indent
                    || (seq_indent == level.indent && ctx != NodeCtx::Value)
                {
                    return Err(self.parse_error(
                        token.span.start,
                        "found badly indented sequence entry",
                    ));
                }
                let line = token.span.start.line();
                self.consume_token();
                let properties = self.take_props();
                self.replace_top(Level {
                    state: State::BlockSequence,
                    indent: seq_indent,
                    line,
                });
                self.push_level(State::Node(NodeCtx::SeqEntry), seq_indent, line, token.span.start)?;
                Ok(Some(Event::new(
                    EventKind::SequenceStart {
                        style: CollectionStyle::Block,
                        properties,
                    },
                    token.span,
                )))
            }
            TokenKind::BlockMapKey if ctx == NodeCtx::FlowEntry => {
                // `[? a: b]`: an explicit key opens a single-pair mapping.
                let line = token.span.start.line();
                self.consume_token();
                let properties = self.take_props();
                self.replace_top(Level {
                    state: State::FlowPairValue,
                    indent: -1,
                    line,
                });
                self.push_level(State::Node(NodeCtx::Flow), -1, line, token.span.start)?;
                Ok(Some(Event::new(
                    EventKind::MappingStart {
                        style: CollectionStyle::Flow,
                        properties,
                    },
                    token.span,
                )))
            }
            TokenKind::BlockMapKey if ctx == NodeCtx::Flow => Err(self.parse_error(
                token.span.start,
                "while parsing a node, did not find expected node content",
            )),
            TokenKind::BlockMapKey => {
                if matches!(ctx, NodeCtx::Value | NodeCtx::ImplicitKey)
                    && token.span.start.line() == level.line
                {
                    return Err(self.parse_error(
                        token.span.start,
                        "explicit mapping keys are not allowed in this context",
                    ));
                }
                let map_indent = token.span.start.col() as i32 - 1;
                if map_indent <= level.indent {
                    return Err(self.parse_error(
                        token.span.start,
                        "found badly indented mapping key",
                    ));
                }
                let line = token.span.start.line();
                self.consume_token();
                let properties = self.take_props();
                self.replace_top(Level {
                    state: State::BlockMappingValue,
                    indent: map_indent,
                    line,
                });
                self.push_level(
                    State::Node(NodeCtx::ExplicitKey),
                    map_indent,
                    line,
                    token.span.start,
                )?;
                Ok(Some(Event::new(
                    EventKind::MappingStart {
                        style: CollectionStyle::Block,
                        properties,
                    },
                    token.span,
                )))
            }
            TokenKind::BlockMapValue => match ctx {
                NodeCtx::ImplicitKey | NodeCtx::Flow => self.finish_empty_node(token.span.start),
                NodeCtx::FlowEntry => {
                    // `[: b]`: a single-pair mapping with an empty key.
                    let properties = self.take_props();
                    self.cached = Some(self.empty_scalar(NodeProperties::default(), token.span.start));
                    self.replace_top(Level {
                        state: State::FlowPairKey,
                        indent: -1,
                        line: token.span.start.line(),
                    });
                    Ok(Some(Event::new(
                        EventKind::MappingStart {
                            style: CollectionStyle::Flow,
                            properties,
                        },
                        Span::empty(token.span.start),
                    )))
                }
                _ => {
                    if ctx == NodeCtx::Value && token.span.start.line() == level.line {
                        return Err(self.parse_error(
                            token.span.start,
                            "mapping values are not allowed in this context",
                        ));
                    }
                    // `: b`: a mapping whose first key is empty.
                    let map_indent = token.span.start.col() as i32 - 1;
                    if map_indent <= level.indent {
                        return Err(self.parse_error(
                            token.span.start,
                            "found badly indented mapping entry",
                        ));
                    }
                    let properties = self.take_props();
                    self.cached =
                        Some(self.empty_scalar(NodeProperties::default(), token.span.start));
                    self.replace_top(Level {
                        state: State::BlockMappingCachedKey,
                        indent: map_indent,
                        line: token.span.start.line(),
                    });
                    Ok(Some(Event::new(
                        EventKind::MappingStart {
                            style: CollectionStyle::Block,
                            properties,
                        },
                        Span::empty(token.span.start),
                    )))
                }
            },
            TokenKind::FlowSeqEnd
            | TokenKind::FlowMapEnd
            | TokenKind::FlowSeparator
            | TokenKind::AnnotationParamsEnd
                if ctx.is_flow() =>
            {
                self.finish_empty_node(token.span.start)
            }
            TokenKind::YamlDirective(..)
            | TokenKind::TagDirective { .. }
            | TokenKind::ReservedDirective(_) => Err(self.parse_error(
                token.span.start,
                "directives are only allowed before the start of a document",
            )),
            _ => Err(self.parse_error(
                token.span.start,
                "while parsing a node, did not find expected node content",
            )),
        }
    }

    /// Pop the node level and emit an empty scalar carrying any pending
    /// properties.
    fn finish_empty_node(&mut self, at: Mark) -> Result<Option<Event>, Error> {
        self.pop_level();
        let properties = self.take_props();
        Ok(Some(self.empty_scalar(properties, at)))
    }

    /// Emit a completed scalar-like node, or synthesize a mapping around it
    /// when it turns out to be an implicit key.
    fn finish_node(
        &mut self,
        kind: EventKind,
        span: Span,
        ctx: NodeCtx,
        level: Level,
        regime: Regime,
    ) -> Result<Option<Event>, Error> {
        match ctx {
            NodeCtx::Root | NodeCtx::Value | NodeCtx::SeqEntry | NodeCtx::ExplicitKey => {
                let next = self.peek_token(regime)?;
                let same_line_colon = next.kind == TokenKind::BlockMapValue
                    && next.span.start.line() == span.start.line();
                let synth_allowed =
                    !(ctx == NodeCtx::Value && span.start.line() == level.line);
                if same_line_colon && synth_allowed {
                    if span.start.line() != span.end.line() {
                        return Err(self.parse_error(
                            next.span.start,
                            "mapping values are not allowed in this context",
                        ));
                    }
                    if span.len() > MAX_IMPLICIT_KEY_LEN {
                        return Err(self.parse_error(
                            span.start,
                            "implicit mapping key is longer than 1024 characters",
                        ));
                    }
                    let map_indent = span.start.col() as i32 - 1;
                    if map_indent <= level.indent {
                        return Err(self.parse_error(
                            span.start,
                            "found badly indented mapping entry",
                        ));
                    }
                    let (map_props, kind) = self.split_props_for_mapping(span.start.line(), kind);
                    self.cached = Some(Event::new(kind, span));
                    self.replace_top(Level {
                        state: State::BlockMappingCachedKey,
                        indent: map_indent,
                        line: span.start.line(),
                    });
                    return Ok(Some(Event::new(
                        EventKind::MappingStart {
                            style: CollectionStyle::Block,
                            properties: map_props,
                        },
                        Span::empty(span.start),
                    )));
                }
                if same_line_colon && !synth_allowed {
                    return Err(self.parse_error(
                        next.span.start,
                        "mapping values are not allowed in this context",
                    ));
                }
                self.pop_level();
                Ok(Some(Event::new(kind, span)))
            }
            NodeCtx::ImplicitKey => {
                let next = self.peek_token(regime)?;
                if next.kind == TokenKind::BlockMapValue
                    && next.span.start.line() == span.start.line()
                    && span.start.line() == span.end.line()
                {
                    if span.len() > MAX_IMPLICIT_KEY_LEN {
                        return Err(self.parse_error(
                            span.start,
                            "implicit mapping key is longer than 1024 characters",
                        ));
                    }
                    self.pop_level();
                    return Ok(Some(Event::new(kind, span)));
                }
                if next.kind == TokenKind::BlockMapValue {
                    return Err(self.parse_error(
                        next.span.start,
                        "mapping values are not allowed in this context",
                    ));
                }
                Err(self.parse_error(
                    next.span.start,
                    "while parsing a block mapping, could not find expected ':'",
                ))
            }
            NodeCtx::FlowEntry => {
                let next = self.peek_token(Regime::Flow)?;
                if next.kind == TokenKind::BlockMapValue {
                    let (map_props, kind) = self.split_props_for_mapping(span.start.line(), kind);
                    self.cached = Some(Event::new(kind, span));
                    self.replace_top(Level {
                        state: State::FlowPairKey,
                        indent: -1,
                        line: span.start.line(),
                    });
                    return Ok(Some(Event::new(
                        EventKind::MappingStart {
                            style: CollectionStyle::Flow,
                            properties: map_props,
                        },
                        Span::empty(span.start),
                    )));
                }
                self.pop_level();
                Ok(Some(Event::new(kind, span)))
            }
            NodeCtx::Flow => {
                self.pop_level();
                Ok(Some(Event::new(kind, span)))
            }
        }
    }

    /// Decide whether the properties of a synthesized mapping's first key
    /// belong to the mapping instead: properties written on an earlier line
    /// than the key annotate the mapping, same-line properties annotate the
    /// key. The node event already carries them; move them out if needed.
    fn split_props_for_mapping(
        &self,
        key_line: usize,
        mut kind: EventKind,
    ) -> (NodeProperties, EventKind) {
        let mut map_props = NodeProperties::default();
        if let EventKind::Scalar { properties, .. } | EventKind::Alias { properties, .. } =
            &mut kind
        {
            if !properties.is_empty()
                && self.props.last_line != 0
                && self.props.last_line < key_line
            {
                map_props = std::mem::take(properties);
            }
        }
        (map_props, kind)
    }

    // ------------------------------------------------------------------
    // Block collections
    // ------------------------------------------------------------------

    fn step_block_sequence(&mut self, level: Level) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Block {
            indent: level.indent,
        })?;
        match token.kind {
            TokenKind::StreamEnd | TokenKind::DirectivesEnd | TokenKind::DocumentEnd => {
                self.pop_level();
                return Ok(Some(Event::new(
                    EventKind::SequenceEnd,
                    Span::empty(token.span.start),
                )));
            }
            _ => {}
        }
        if token.kind == TokenKind::BlockEntry {
            let col = token.span.start.col() as i32 - 1;
            if col == level.indent {
                let line = token.span.start.line();
                self.consume_token();
                self.push_level(
                    State::Node(NodeCtx::SeqEntry),
                    level.indent,
                    line,
                    token.span.start,
                )?;
                return Ok(None);
            }
            if col < level.indent {
                self.pop_level();
                return Ok(Some(Event::new(
                    EventKind::SequenceEnd,
                    Span::empty(token.span.start),
                )));
            }
            return Err(self.parse_error(
                token.span.start,
                "while parsing a block sequence, found badly indented entry",
            ));
        }
        if self.on_fresh_line(&token) && self.line_indent <= level.indent {
            self.pop_level();
            return Ok(Some(Event::new(
                EventKind::SequenceEnd,
                Span::empty(token.span.start),
            )));
        }
        Err(self.parse_error(
            token.span.start,
            "while parsing a block sequence, did not find expected '-' indicator",
        ))
    }

    fn step_block_mapping_key(&mut self, level: Level) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Block {
            indent: level.indent,
        })?;
        match token.kind {
            TokenKind::StreamEnd | TokenKind::DirectivesEnd | TokenKind::DocumentEnd => {
                self.pop_level();
                return Ok(Some(Event::new(
                    EventKind::MappingEnd,
                    Span::empty(token.span.start),
                )));
            }
            _ => {}
        }
        if self.on_fresh_line(&token) && self.line_indent < level.indent {
            self.pop_level();
            return Ok(Some(Event::new(
                EventKind::MappingEnd,
                Span::empty(token.span.start),
            )));
        }
        match token.kind {
            TokenKind::BlockMapValue => {
                if self.on_fresh_line(&token)
                    && token.span.start.col() as i32 - 1 == level.indent
                {
                    // An entry with an omitted key.
                    self.set_state(State::BlockMappingValue);
                    Ok(Some(
                        self.empty_scalar(NodeProperties::default(), token.span.start),
                    ))
                } else {
                    Err(self.parse_error(
                        token.span.start,
                        "mapping values are not allowed in this context",
                    ))
                }
            }
            TokenKind::BlockMapKey
                if token.span.start.col() as i32 - 1 == level.indent =>
            {
                let line = token.span.start.line();
                self.consume_token();
                self.set_state(State::BlockMappingValue);
                self.push_level(
                    State::Node(NodeCtx::ExplicitKey),
                    level.indent,
                    line,
                    token.span.start,
                )?;
                Ok(None)
            }
            _ => {
                if self.on_fresh_line(&token) && self.line_indent > level.indent {
                    return Err(self.parse_error(
                        token.span.start,
                        "while parsing a block mapping, did not find expected key",
                    ));
                }
                if self.on_fresh_line(&token) && self.line_indent == level.indent {
                    self.set_state(State::BlockMappingValue);
                    self.push_level(
                        State::Node(NodeCtx::ImplicitKey),
                        level.indent,
                        token.span.start.line(),
                        token.span.start,
                    )?;
                    return Ok(None);
                }
                Err(self.parse_error(
                    token.span.start,
                    "while parsing a block mapping, did not find expected key",
                ))
            }
        }
    }

    fn step_block_mapping_value(&mut self, level: Level) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Block {
            indent: level.indent,
        })?;
        if token.kind == TokenKind::BlockMapValue {
            let line = token.span.start.line();
            self.consume_token();
            self.set_state(State::BlockMappingKey);
            self.push_level(
                State::Node(NodeCtx::Value),
                level.indent,
                line,
                token.span.start,
            )?;
            Ok(None)
        } else {
            // An explicit key without a value.
            self.set_state(State::BlockMappingKey);
            Ok(Some(
                self.empty_scalar(NodeProperties::default(), token.span.start),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Flow collections
    // ------------------------------------------------------------------

    fn step_flow_sequence(&mut self, first: bool) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Flow)?;
        match token.kind {
            TokenKind::FlowSeqEnd => {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::SequenceEnd, token.span)));
            }
            TokenKind::StreamEnd => {
                return Err(self.parse_error(
                    token.span.start,
                    "while parsing a flow sequence, found unexpected end of stream",
                ))
            }
            TokenKind::DirectivesEnd | TokenKind::DocumentEnd => {
                return Err(self.parse_error(
                    token.span.start,
                    "document indicators are not allowed inside flow collections",
                ))
            }
            _ => {}
        }
        if first {
            self.set_state(State::FlowSequence { first: false });
            self.push_level(State::Node(NodeCtx::FlowEntry), -1, token.span.start.line(), token.span.start)?;
            return Ok(None);
        }
        if token.kind == TokenKind::FlowSeparator {
            self.consume_token();
            let next = self.peek_token(Regime::Flow)?;
            if next.kind == TokenKind::FlowSeqEnd {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::SequenceEnd, next.span)));
            }
            self.push_level(State::Node(NodeCtx::FlowEntry), -1, next.span.start.line(), next.span.start)?;
            return Ok(None);
        }
        Err(self.parse_error(
            token.span.start,
            "while parsing a flow sequence, did not find expected ',' or ']'",
        ))
    }

    fn step_flow_mapping_key(&mut self, first: bool) -> Result<Option<Event>, Error> {
        let mut token = self.peek_token(Regime::Flow)?;
        match token.kind {
            TokenKind::FlowMapEnd => {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::MappingEnd, token.span)));
            }
            TokenKind::StreamEnd => {
                return Err(self.parse_error(
                    token.span.start,
                    "while parsing a flow mapping, found unexpected end of stream",
                ))
            }
            TokenKind::DirectivesEnd | TokenKind::DocumentEnd => {
                return Err(self.parse_error(
                    token.span.start,
                    "document indicators are not allowed inside flow collections",
                ))
            }
            _ => {}
        }
        if !first {
            if token.kind != TokenKind::FlowSeparator {
                return Err(self.parse_error(
                    token.span.start,
                    "while parsing a flow mapping, did not find expected ',' or '}'",
                ));
            }
            while self.peek_token(Regime::Flow)?.kind == TokenKind::FlowSeparator {
                self.consume_token();
            }
            token = self.peek_token(Regime::Flow)?;
            if token.kind == TokenKind::FlowMapEnd {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::MappingEnd, token.span)));
            }
        }
        self.set_state(State::FlowMappingValue);
        if token.kind == TokenKind::BlockMapKey {
            // Explicit key marker; the key node follows.
            self.consume_token();
        }
        self.push_level(State::Node(NodeCtx::Flow), -1, token.span.start.line(), token.span.start)?;
        Ok(None)
    }

    fn step_flow_mapping_value(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Flow)?;
        if token.kind == TokenKind::BlockMapValue {
            let line = token.span.start.line();
            self.consume_token();
            self.set_state(State::FlowMappingKey { first: false });
            self.push_level(State::Node(NodeCtx::Flow), -1, line, token.span.start)?;
            Ok(None)
        } else {
            // `{a}`: a key without a value.
            self.set_state(State::FlowMappingKey { first: false });
            Ok(Some(
                self.empty_scalar(NodeProperties::default(), token.span.start),
            ))
        }
    }

    fn step_flow_pair_value(&mut self) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Flow)?;
        if token.kind == TokenKind::BlockMapValue {
            let line = token.span.start.line();
            self.consume_token();
            self.set_state(State::FlowPairEnd);
            self.push_level(State::Node(NodeCtx::Flow), -1, line, token.span.start)?;
            Ok(None)
        } else {
            // An explicit key without a value, e.g. `[? a]`.
            self.set_state(State::FlowPairEnd);
            Ok(Some(
                self.empty_scalar(NodeProperties::default(), token.span.start),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Annotations
    // ------------------------------------------------------------------

    fn step_annotation_body(&mut self, in_flow: bool, level: Level) -> Result<Option<Event>, Error> {
        let regime = if in_flow {
            Regime::Flow
        } else {
            Regime::Block {
                indent: level.indent,
            }
        };
        let token = self.peek_token(regime)?;
        if token.kind == TokenKind::AnnotationParamsStart {
            self.consume_token();
            self.set_state(State::AnnotationParams { first: true });
            Ok(None)
        } else {
            self.pop_level();
            Ok(Some(Event::new(
                EventKind::AnnotationEnd,
                Span::empty(token.span.start),
            )))
        }
    }

    fn step_annotation_params(&mut self, first: bool) -> Result<Option<Event>, Error> {
        let token = self.peek_token(Regime::Flow)?;
        match token.kind {
            TokenKind::AnnotationParamsEnd => {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::AnnotationEnd, token.span)));
            }
            TokenKind::StreamEnd => {
                return Err(self.parse_error(
                    token.span.start,
                    "while parsing annotation parameters, found unexpected end of stream",
                ))
            }
            _ => {}
        }
        if first {
            self.set_state(State::AnnotationParams { first: false });
            self.push_level(State::Node(NodeCtx::FlowEntry), -1, token.span.start.line(), token.span.start)?;
            return Ok(None);
        }
        if token.kind == TokenKind::FlowSeparator {
            self.consume_token();
            let next = self.peek_token(Regime::Flow)?;
            if next.kind == TokenKind::AnnotationParamsEnd {
                self.consume_token();
                self.pop_level();
                return Ok(Some(Event::new(EventKind::AnnotationEnd, next.span)));
            }
            self.push_level(State::Node(NodeCtx::FlowEntry), -1, next.span.start.line(), next.span.start)?;
            return Ok(None);
        }
        Err(self.parse_error(
            token.span.start,
            "while parsing annotation parameters, did not find expected ',' or ')'",
        ))
    }
}

impl<I: Input> Iterator for Parser<I> {
    type Item = Result<Event, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_done {
            return None;
        }
        match self.next_event() {
            Ok(event) => {
                if matches!(event.kind, EventKind::StreamEnd) {
                    self.iter_done = true;
                }
                Some(Ok(event))
            }
            Err(e) => {
                self.iter_done = true;
                Some(Err(e))
            }
        }
    }
}
