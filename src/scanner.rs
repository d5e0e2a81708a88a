//! The lexer: turns characters into tokens under parser-driven regimes.
//!
//! YAML cannot be tokenized without knowing what the parser expects: `:` is a
//! mapping indicator in one context and scalar content in another, and
//! indentation only matters in block context. Rather than buffering tokens
//! and guessing, the parser passes a [`Regime`] to every [`Scanner::next_token`]
//! call and the scanner switches its rules accordingly. The scanner never
//! looks past the current logical token.

use hashlink::LinkedHashMap;

use crate::char_traits::{
    is_alpha, is_anchor_char, is_any_break, is_blank, is_blank_or_breakz, is_breakz, is_flow,
    is_hex, is_tag_char, is_uri_char, is_word_char, is_z,
};
use crate::error::ScanError;
use crate::input::Input;
use crate::interner::{IStr, Interner};
use crate::mark::{Mark, Span};

/// The family of tokens the parser expects next.
///
/// This is the feedback channel of the pipeline: the scanner does not track
/// which collection it is inside, the parser tells it on every call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Regime {
    /// Between documents: directives, document markers, a byte-order mark or
    /// the first token of a root node.
    Document,
    /// Block context, with the enclosing collection's indentation column
    /// (0-based; `-1` for the document root). Indentation tokens are
    /// synthesized whenever a line boundary is crossed.
    Block {
        /// The enclosing block collection's indentation.
        indent: i32,
    },
    /// Inside a flow collection or an annotation parameter list. Indentation
    /// is inactive and `,`/`]`/`}`/`)` are indicators.
    Flow,
}

impl Regime {
    fn is_flow(self) -> bool {
        matches!(self, Regime::Flow)
    }

    /// The enclosing block indentation, `-1` when none applies.
    fn block_indent(self) -> i32 {
        match self {
            Regime::Block { indent } => indent,
            Regime::Document | Regime::Flow => -1,
        }
    }
}

/// What a token is, along with its interned payload where it has one.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// The start of the stream, before any input.
    StreamStart,
    /// The end of the stream. Returned idempotently once reached.
    StreamEnd,
    /// `---` at column 1.
    DirectivesEnd,
    /// `...` at column 1.
    DocumentEnd,
    /// U+FEFF between documents.
    ByteOrderMark,
    /// The indentation of a fresh content line, in columns (0-based).
    Indentation(u32),
    /// `-` introducing a block sequence entry.
    BlockEntry,
    /// `?` introducing an explicit mapping key.
    BlockMapKey,
    /// `:` introducing a mapping value.
    BlockMapValue,
    /// `{`.
    FlowMapStart,
    /// `}`.
    FlowMapEnd,
    /// `[`.
    FlowSeqStart,
    /// `]`.
    FlowSeqEnd,
    /// `,` between flow entries.
    FlowSeparator,
    /// `&name`.
    Anchor(IStr),
    /// `*name`.
    Alias(IStr),
    /// The resolved prefix of a tag property. Always immediately followed by
    /// a [`TokenKind::TagSuffix`] token.
    TagHandle(IStr),
    /// The percent-decoded suffix of a tag property.
    TagSuffix(IStr),
    /// `!<uri>`, stored as written.
    VerbatimTag(IStr),
    /// A plain scalar, with folded content.
    PlainScalar(IStr),
    /// A single-quoted scalar, with folded and unescaped content.
    SingleQuotedScalar(IStr),
    /// A double-quoted scalar, with folded and unescaped content.
    DoubleQuotedScalar(IStr),
    /// A `|` block scalar, with chomped content.
    LiteralScalar(IStr),
    /// A `>` block scalar, with folded and chomped content.
    FoldedScalar(IStr),
    /// `@name`.
    AnnotationStart(IStr),
    /// `(` immediately following an annotation name.
    AnnotationParamsStart,
    /// `)` closing an annotation parameter list.
    AnnotationParamsEnd,
    /// `%YAML major.minor`.
    YamlDirective(u32, u32),
    /// `%TAG handle prefix`; the binding is also recorded in the scanner's
    /// directive table for lex-time tag resolution.
    TagDirective {
        /// The handle being declared, e.g. `!e!`.
        handle: IStr,
        /// The prefix it expands to.
        prefix: IStr,
    },
    /// Any other `%NAME` directive; skipped to end of line.
    ReservedDirective(IStr),
}

/// A token: a kind and the input span it covers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Where it starts and ends.
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, start: Mark, end: Mark) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Block scalar chomping: what happens to trailing line breaks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Strip,
    Clip,
    Keep,
}

const PRIMARY_TAG_HANDLE: &str = "!";
const SECONDARY_TAG_HANDLE: &str = "!!";
const SECONDARY_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// The YAML lexer.
///
/// Produces one [`Token`] per [`Scanner::next_token`] call, under the regime
/// the parser passes in. Dropping the scanner releases the input and all
/// internal buffers.
pub struct Scanner<I: Input> {
    input: I,
    interner: Interner,
    /// Position of the next unconsumed character.
    mark: Mark,
    /// Span of the most recently returned token.
    recent_span: Span,
    /// A token scanned as a byproduct of the previous one (a tag suffix, or
    /// the `(` opening an annotation parameter list).
    pending: Option<Token>,
    stream_start_produced: bool,
    stream_end_produced: bool,
    /// Depth of `[`/`{` nesting, tracked for error reporting on `-`.
    flow_level: u32,
    /// Depth of annotation parameter lists; makes `)` an indicator.
    annotation_level: u32,
    /// Set whenever a line break is consumed; drained by `next_token` to
    /// decide whether an indentation token is due.
    line_crossed: bool,
    /// Byte index right after a token that allows an adjacent `:` (quoted
    /// scalars and flow collection ends, for `"key":value`).
    adjacent_value_allowed_at: usize,
    /// `%TAG` bindings of the current document, in declaration order.
    tag_directives: LinkedHashMap<String, IStr>,
    /// Whether node content has been scanned since the last document
    /// boundary; a directive or `---` after content starts a new directive
    /// section and resets the table.
    document_has_content: bool,
}

impl<I: Input> Scanner<I> {
    /// Create a scanner over the given input, interning payloads through
    /// `interner`.
    pub fn new(input: I, interner: Interner) -> Self {
        Self {
            input,
            interner,
            mark: Mark::default(),
            recent_span: Span::default(),
            pending: None,
            stream_start_produced: false,
            stream_end_produced: false,
            flow_level: 0,
            annotation_level: 0,
            // The first line counts as freshly entered so that its
            // indentation is measured like any other line's.
            line_crossed: true,
            adjacent_value_allowed_at: usize::MAX,
            tag_directives: LinkedHashMap::new(),
            document_has_content: false,
        }
    }

    /// The position of the next unconsumed character.
    #[must_use]
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// The span of the most recently returned token.
    #[must_use]
    pub fn recent_token_span(&self) -> Span {
        self.recent_span
    }

    /// Scan and return the next token under the given regime.
    ///
    /// # Errors
    /// Returns a [`ScanError`] on the first malformed construct; the scanner
    /// must not be used further afterwards.
    pub fn next_token(&mut self, regime: Regime) -> Result<Token, ScanError> {
        let token = self.fetch_token(regime)?;
        debug_print!("scanner: {:?} -> {:?}", regime, token.kind);
        self.recent_span = token.span;
        match token.kind {
            TokenKind::StreamStart
            | TokenKind::StreamEnd
            | TokenKind::DirectivesEnd
            | TokenKind::DocumentEnd
            | TokenKind::ByteOrderMark
            | TokenKind::Indentation(_)
            | TokenKind::YamlDirective(..)
            | TokenKind::TagDirective { .. }
            | TokenKind::ReservedDirective(_) => {}
            _ => self.document_has_content = true,
        }
        Ok(token)
    }

    fn fetch_token(&mut self, regime: Regime) -> Result<Token, ScanError> {
        if !self.stream_start_produced {
            self.stream_start_produced = true;
            return Ok(Token::new(TokenKind::StreamStart, self.mark, self.mark));
        }
        if let Some(token) = self.pending.take() {
            return Ok(token);
        }
        if self.stream_end_produced {
            return Ok(Token::new(TokenKind::StreamEnd, self.mark, self.mark));
        }

        self.skip_separation(regime)?;
        let crossed = std::mem::take(&mut self.line_crossed);

        if self.input.look_ch() == '\0' {
            self.stream_end_produced = true;
            return Ok(Token::new(TokenKind::StreamEnd, self.mark, self.mark));
        }

        if crossed && !regime.is_flow() {
            let col = u32::try_from(self.mark.col() - 1).unwrap_or(u32::MAX);
            let start = Mark::new(
                self.mark.index() - (self.mark.col() - 1),
                self.mark.line(),
                1,
            );
            return Ok(Token::new(TokenKind::Indentation(col), start, self.mark));
        }

        self.input.lookahead(4);
        let c = self.input.peek();
        let at_line_start = self.mark.col() == 1;

        if crate::char_traits::is_bom(c) {
            return self.fetch_bom(regime);
        }
        if at_line_start && c == '%' {
            return self.scan_directive();
        }
        if at_line_start && self.input.next_is_document_start() {
            return Ok(self.fetch_directives_end());
        }
        if at_line_start && self.input.next_is_document_end() {
            return self.fetch_document_end();
        }

        let nc = self.input.peek_nth(1);
        match c {
            '[' => Ok(self.fetch_flow_start(TokenKind::FlowSeqStart)),
            '{' => Ok(self.fetch_flow_start(TokenKind::FlowMapStart)),
            ']' => Ok(self.fetch_flow_end(TokenKind::FlowSeqEnd)),
            '}' => Ok(self.fetch_flow_end(TokenKind::FlowMapEnd)),
            ',' if regime.is_flow() => Ok(self.fetch_single(TokenKind::FlowSeparator)),
            ')' if regime.is_flow() && self.annotation_level > 0 => {
                self.annotation_level -= 1;
                Ok(self.fetch_single(TokenKind::AnnotationParamsEnd))
            }
            '-' if is_blank_or_breakz(nc) => {
                if regime.is_flow() || self.flow_level > 0 {
                    Err(self.error(
                        self.mark,
                        "block sequence entries are not allowed in this context",
                    ))
                } else {
                    Ok(self.fetch_single(TokenKind::BlockEntry))
                }
            }
            '?' if is_blank_or_breakz(nc) || (regime.is_flow() && is_flow(nc)) => {
                Ok(self.fetch_single(TokenKind::BlockMapKey))
            }
            ':' if is_blank_or_breakz(nc)
                || (regime.is_flow()
                    && (is_flow(nc) || self.adjacent_value_allowed_at == self.mark.index())) =>
            {
                Ok(self.fetch_single(TokenKind::BlockMapValue))
            }
            '&' => self.scan_anchor(false),
            '*' => self.scan_anchor(true),
            '!' => self.scan_tag(),
            '|' if !regime.is_flow() => self.scan_block_scalar(true, regime.block_indent()),
            '>' if !regime.is_flow() => self.scan_block_scalar(false, regime.block_indent()),
            '|' | '>' => Err(self.error(
                self.mark,
                "block scalars are not allowed in flow context",
            )),
            '\'' => self.scan_quoted_scalar(false),
            '"' => self.scan_quoted_scalar(true),
            '@' => self.scan_annotation(),
            '`' => Err(self.error(
                self.mark,
                "found character '`' that cannot start any token",
            )),
            _ => self.scan_plain_scalar(regime),
        }
    }

    fn error(&self, mark: Mark, info: &str) -> ScanError {
        ScanError::new(mark, self.recent_span, info)
    }

    /// The next character; a prior lookahead must have been issued.
    fn ch(&self) -> char {
        self.input.peek()
    }

    /// Consume one character that is not a line break.
    fn skip_non_break(&mut self) {
        let c = self.input.peek();
        self.input.skip();
        self.mark.advance(c);
    }

    /// Consume one logical line break (CR+LF counts as one).
    fn skip_break(&mut self) {
        self.input.lookahead(2);
        let c = self.input.peek();
        if c == '\r' && self.input.peek_nth(1) == '\n' {
            self.input.skip_n(2);
            self.mark = Mark::new(self.mark.index() + 2, self.mark.line() + 1, 1);
        } else {
            self.input.skip();
            self.mark.advance_line(c);
        }
        self.line_crossed = true;
    }

    /// Consume a line break, pushing its normalized form onto `out`.
    fn read_break(&mut self, out: &mut String) {
        out.push('\n');
        self.skip_break();
    }

    /// Skip whitespace, comments and line breaks between tokens.
    ///
    /// Tabs are rejected when they would count as indentation: at the start
    /// of a content line in a non-flow regime.
    fn skip_separation(&mut self, regime: Regime) -> Result<(), ScanError> {
        let mut ws_before = self.mark.col() == 1;
        let mut tab_mark: Option<Mark> = None;
        loop {
            let c = self.input.look_ch();
            match c {
                ' ' => {
                    ws_before = true;
                    self.skip_non_break();
                }
                '\t' => {
                    if !regime.is_flow() && (self.line_crossed || self.mark.col() == 1) {
                        tab_mark.get_or_insert(self.mark);
                    }
                    ws_before = true;
                    self.skip_non_break();
                }
                '#' => {
                    if !ws_before && self.mark.index() > self.recent_span.end.index() {
                        // Whitespace was consumed as part of the previous
                        // token's trailing separation.
                        ws_before = true;
                    }
                    if !ws_before {
                        return Err(self.error(
                            self.mark,
                            "comments must be separated from other tokens by whitespace",
                        ));
                    }
                    while !is_breakz(self.input.look_ch()) {
                        self.skip_non_break();
                    }
                }
                _ if is_any_break(c) => {
                    self.skip_break();
                    ws_before = true;
                    tab_mark = None;
                }
                _ => break,
            }
        }
        if let Some(mark) = tab_mark {
            if !self.input.next_is_breakz() {
                return Err(self.error(
                    mark,
                    "found a tab character where an indentation space is expected",
                ));
            }
        }
        Ok(())
    }

    fn fetch_single(&mut self, kind: TokenKind) -> Token {
        let start = self.mark;
        self.skip_non_break();
        Token::new(kind, start, self.mark)
    }

    fn fetch_flow_start(&mut self, kind: TokenKind) -> Token {
        self.flow_level = self.flow_level.saturating_add(1);
        self.fetch_single(kind)
    }

    fn fetch_flow_end(&mut self, kind: TokenKind) -> Token {
        self.flow_level = self.flow_level.saturating_sub(1);
        let token = self.fetch_single(kind);
        self.adjacent_value_allowed_at = self.mark.index();
        token
    }

    fn fetch_bom(&mut self, regime: Regime) -> Result<Token, ScanError> {
        if regime != Regime::Document {
            return Err(self.error(self.mark, "found a byte-order mark inside a document"));
        }
        let start = self.mark;
        let c = self.input.peek();
        self.input.skip();
        self.mark.advance_index(c);
        Ok(Token::new(TokenKind::ByteOrderMark, start, self.mark))
    }

    fn fetch_directives_end(&mut self) -> Token {
        if self.document_has_content {
            self.tag_directives.clear();
            self.document_has_content = false;
        }
        let start = self.mark;
        self.skip_non_break();
        self.skip_non_break();
        self.skip_non_break();
        Token::new(TokenKind::DirectivesEnd, start, self.mark)
    }

    fn fetch_document_end(&mut self) -> Result<Token, ScanError> {
        self.tag_directives.clear();
        self.document_has_content = false;
        let start = self.mark;
        self.skip_non_break();
        self.skip_non_break();
        self.skip_non_break();
        let token = Token::new(TokenKind::DocumentEnd, start, self.mark);
        // Only separation and comments may follow on the marker's line.
        while self.input.look_ch() == ' ' || self.input.look_ch() == '\t' {
            self.skip_non_break();
        }
        if !is_breakz(self.input.look_ch()) && self.input.look_ch() != '#' {
            return Err(self.error(
                self.mark,
                "invalid content after document end marker",
            ));
        }
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    fn scan_directive(&mut self) -> Result<Token, ScanError> {
        if self.document_has_content {
            self.tag_directives.clear();
            self.document_has_content = false;
        }
        let start = self.mark;
        self.skip_non_break(); // '%'
        let mut name = String::new();
        while is_alpha(self.input.look_ch()) {
            name.push(self.ch());
            self.skip_non_break();
        }
        if name.is_empty() {
            return Err(self.error(
                start,
                "while scanning a directive, could not find expected directive name",
            ));
        }
        match name.as_str() {
            "YAML" => self.scan_yaml_directive(start),
            "TAG" => self.scan_tag_directive(start),
            _ => {
                // Reserved directive: note the name, skip the rest.
                while !is_breakz(self.input.look_ch()) {
                    self.skip_non_break();
                }
                Ok(Token::new(
                    TokenKind::ReservedDirective(self.interner.intern(&name)),
                    start,
                    self.mark,
                ))
            }
        }
    }

    fn scan_yaml_directive(&mut self, start: Mark) -> Result<Token, ScanError> {
        if !is_blank(self.input.look_ch()) {
            return Err(self.error(
                self.mark,
                "while scanning a directive, did not find expected whitespace",
            ));
        }
        self.skip_directive_blanks();
        let major = self.scan_version_number()?;
        if self.input.look_ch() != '.' {
            return Err(self.error(
                self.mark,
                "while scanning a directive, did not find expected digit or '.'",
            ));
        }
        self.skip_non_break();
        let minor = self.scan_version_number()?;
        if major != 1 {
            return Err(self.error(
                start,
                "found incompatible YAML document version",
            ));
        }
        self.require_eol_or_comment()?;
        Ok(Token::new(
            TokenKind::YamlDirective(major, minor),
            start,
            self.mark,
        ))
    }

    fn scan_version_number(&mut self) -> Result<u32, ScanError> {
        let mut value: u32 = 0;
        let mut digits = 0usize;
        while self.input.look_ch().is_ascii_digit() {
            if digits >= 9 {
                return Err(self.error(
                    self.mark,
                    "while scanning a directive, found extremely long version number",
                ));
            }
            value = value * 10 + (self.ch() as u32 - '0' as u32);
            digits += 1;
            self.skip_non_break();
        }
        if digits == 0 {
            return Err(self.error(
                self.mark,
                "while scanning a directive, did not find expected version number",
            ));
        }
        Ok(value)
    }

    fn scan_tag_directive(&mut self, start: Mark) -> Result<Token, ScanError> {
        if !is_blank(self.input.look_ch()) {
            return Err(self.error(
                self.mark,
                "while scanning a directive, did not find expected whitespace",
            ));
        }
        self.skip_directive_blanks();
        let handle = self.scan_directive_tag_handle()?;
        if !is_blank(self.input.look_ch()) {
            return Err(self.error(
                self.mark,
                "while scanning a %TAG directive, did not find expected whitespace",
            ));
        }
        self.skip_directive_blanks();
        let prefix = self.scan_tag_uri(String::new(), true, start)?;
        if prefix.is_empty() {
            return Err(self.error(
                self.mark,
                "while scanning a %TAG directive, did not find expected tag prefix",
            ));
        }
        self.require_eol_or_comment()?;
        if self.tag_directives.contains_key(&handle) {
            return Err(self.error(start, "found duplicate %TAG directive"));
        }
        let prefix = self.interner.intern_owned(prefix);
        self.tag_directives.insert(handle.clone(), prefix.clone());
        Ok(Token::new(
            TokenKind::TagDirective {
                handle: self.interner.intern_owned(handle),
                prefix,
            },
            start,
            self.mark,
        ))
    }

    fn scan_directive_tag_handle(&mut self) -> Result<String, ScanError> {
        let start = self.mark;
        if self.input.look_ch() != '!' {
            return Err(self.error(
                start,
                "while scanning a %TAG directive, did not find expected '!'",
            ));
        }
        let mut handle = String::from('!');
        self.skip_non_break();
        while is_word_char(self.input.look_ch()) {
            handle.push(self.ch());
            self.skip_non_break();
        }
        if self.input.look_ch() == '!' {
            handle.push('!');
            self.skip_non_break();
        } else if handle.len() > 1 {
            // A named handle must be closed with '!'.
            return Err(self.error(
                start,
                "while scanning a %TAG directive, did not find expected '!'",
            ));
        }
        Ok(handle)
    }

    fn skip_directive_blanks(&mut self) {
        while is_blank(self.input.look_ch()) {
            self.skip_non_break();
        }
    }

    fn require_eol_or_comment(&mut self) -> Result<(), ScanError> {
        self.skip_directive_blanks();
        if self.input.look_ch() == '#' {
            while !is_breakz(self.input.look_ch()) {
                self.skip_non_break();
            }
        }
        if !is_breakz(self.input.look_ch()) {
            return Err(self.error(
                self.mark,
                "while scanning a directive, did not find expected comment or line break",
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node properties
    // ------------------------------------------------------------------

    fn scan_anchor(&mut self, alias: bool) -> Result<Token, ScanError> {
        let start = self.mark;
        self.skip_non_break(); // '&' or '*'
        let mut name = String::new();
        loop {
            self.input.lookahead(2);
            let c = self.ch();
            if !is_anchor_char(c) {
                break;
            }
            // Stop before a value indicator so `*a: b` reads as alias 'a'.
            if c == ':' && is_blank_or_breakz(self.input.peek_nth(1)) {
                break;
            }
            name.push(c);
            self.skip_non_break();
        }
        if name.is_empty() {
            return Err(self.error(
                start,
                "while scanning an anchor or alias, did not find expected name character",
            ));
        }
        let name = self.interner.intern_owned(name);
        let kind = if alias {
            TokenKind::Alias(name)
        } else {
            TokenKind::Anchor(name)
        };
        Ok(Token::new(kind, start, self.mark))
    }

    fn scan_tag(&mut self) -> Result<Token, ScanError> {
        let start = self.mark;
        self.skip_non_break(); // '!'
        if self.input.look_ch() == '<' {
            self.skip_non_break();
            let uri = self.scan_tag_uri(String::new(), true, start)?;
            if self.input.look_ch() != '>' {
                return Err(self.error(
                    self.mark,
                    "while scanning a verbatim tag, did not find expected '>'",
                ));
            }
            if uri.is_empty() {
                return Err(self.error(start, "found empty verbatim tag"));
            }
            self.skip_non_break();
            return Ok(Token::new(
                TokenKind::VerbatimTag(self.interner.intern_owned(uri)),
                start,
                self.mark,
            ));
        }

        // Either "!suffix", "!!suffix" or "!name!suffix": scan a word run
        // first, then decide whether it was a handle name.
        let mut head = String::new();
        while is_word_char(self.input.look_ch()) {
            head.push(self.ch());
            self.skip_non_break();
        }
        let (handle, head) = if self.input.look_ch() == '!' {
            self.skip_non_break();
            (format!("!{head}!"), String::new())
        } else {
            (String::from('!'), head)
        };
        let handle_end = self.mark;
        let suffix = self.scan_tag_uri(head, false, start)?;

        let prefix = match handle.as_str() {
            PRIMARY_TAG_HANDLE => self
                .tag_directives
                .get(PRIMARY_TAG_HANDLE)
                .cloned()
                .unwrap_or_else(|| self.interner.intern(PRIMARY_TAG_HANDLE)),
            SECONDARY_TAG_HANDLE => self
                .tag_directives
                .get(SECONDARY_TAG_HANDLE)
                .cloned()
                .unwrap_or_else(|| self.interner.intern(SECONDARY_TAG_PREFIX)),
            named => match self.tag_directives.get(named) {
                Some(prefix) => prefix.clone(),
                None => {
                    return Err(self.error(
                        start,
                        "while scanning a tag, found undefined tag handle",
                    ))
                }
            },
        };

        self.pending = Some(Token::new(
            TokenKind::TagSuffix(self.interner.intern_owned(suffix)),
            handle_end,
            self.mark,
        ));
        Ok(Token::new(TokenKind::TagHandle(prefix), start, handle_end))
    }

    /// Scan a run of tag/URI characters starting with the already-consumed
    /// `head`, decoding `%XX` escapes.
    fn scan_tag_uri(
        &mut self,
        head: String,
        uri_chars: bool,
        start: Mark,
    ) -> Result<String, ScanError> {
        let mut bytes: Vec<u8> = head.into_bytes();
        loop {
            let c = self.input.look_ch();
            let valid = if uri_chars {
                is_uri_char(c)
            } else {
                is_tag_char(c)
            };
            if !valid {
                break;
            }
            if c == '%' {
                self.skip_non_break();
                let hi = self.scan_hex_digit(start)?;
                let lo = self.scan_hex_digit(start)?;
                bytes.push((hi * 16 + lo) as u8);
            } else {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                self.skip_non_break();
            }
        }
        String::from_utf8(bytes).map_err(|_| {
            self.error(
                start,
                "while scanning a tag, found invalid UTF-8 in percent-escaped octets",
            )
        })
    }

    fn scan_hex_digit(&mut self, start: Mark) -> Result<u32, ScanError> {
        let c = self.input.look_ch();
        if !is_hex(c) {
            return Err(self.error(
                start,
                "while scanning a tag, did not find expected hexadecimal digit after '%'",
            ));
        }
        self.skip_non_break();
        Ok(crate::char_traits::as_hex(c))
    }

    fn scan_annotation(&mut self) -> Result<Token, ScanError> {
        let start = self.mark;
        self.skip_non_break(); // '@'
        let mut name = String::new();
        while is_alpha(self.input.look_ch()) {
            name.push(self.ch());
            self.skip_non_break();
        }
        if name.is_empty() {
            return Err(self.error(
                start,
                "while scanning an annotation, did not find expected name character",
            ));
        }
        let token = Token::new(
            TokenKind::AnnotationStart(self.interner.intern_owned(name)),
            start,
            self.mark,
        );
        // A parameter list must open immediately after the name.
        if self.input.look_ch() == '(' {
            let pstart = self.mark;
            self.skip_non_break();
            self.annotation_level += 1;
            self.pending = Some(Token::new(
                TokenKind::AnnotationParamsStart,
                pstart,
                self.mark,
            ));
        }
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// Fold accumulated breaks and whitespace into `string` before the next
    /// content character. A lone break folds to a space; extra breaks are
    /// kept as newlines; intra-line blanks are kept verbatim.
    fn flush_folded(
        string: &mut String,
        leading_break: &mut String,
        trailing_breaks: &mut String,
        whitespaces: &mut String,
        leading_blanks: &mut bool,
    ) {
        if *leading_blanks {
            if !leading_break.is_empty() {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                } else {
                    string.push_str(trailing_breaks);
                }
            }
            leading_break.clear();
            trailing_breaks.clear();
            *leading_blanks = false;
        } else if !whitespaces.is_empty() {
            string.push_str(whitespaces);
            whitespaces.clear();
        }
    }

    fn scan_plain_scalar(&mut self, regime: Regime) -> Result<Token, ScanError> {
        let in_flow = regime.is_flow();
        // Continuation lines must be indented past the enclosing block level.
        let indent = regime.block_indent() + 1;
        let start = self.mark;
        let mut end = self.mark;

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        'outer: loop {
            self.input.lookahead(4);
            if self.mark.col() == 1 && self.input.next_is_document_indicator() {
                break;
            }
            if self.ch() == '#' {
                break;
            }
            loop {
                self.input.lookahead(2);
                let c = self.ch();
                if is_blank_or_breakz(c) {
                    break;
                }
                let nc = self.input.peek_nth(1);
                if c == ':' && (is_blank_or_breakz(nc) || (in_flow && is_flow(nc))) {
                    break 'outer;
                }
                if in_flow && (is_flow(c) || (self.annotation_level > 0 && c == ')')) {
                    break 'outer;
                }
                Self::flush_folded(
                    &mut string,
                    &mut leading_break,
                    &mut trailing_breaks,
                    &mut whitespaces,
                    &mut leading_blanks,
                );
                string.push(c);
                self.skip_non_break();
                end = self.mark;
            }
            if !self.input.next_is_blank() && !self.input.next_is_break() {
                break;
            }
            while self.input.next_is_blank() || self.input.next_is_break() {
                if self.input.next_is_blank() {
                    if leading_blanks
                        && (self.mark.col() as i32 - 1) < indent
                        && self.ch() == '\t'
                    {
                        return Err(self.error(
                            self.mark,
                            "while scanning a plain scalar, found a tab",
                        ));
                    }
                    if leading_blanks {
                        self.skip_non_break();
                    } else {
                        whitespaces.push(self.ch());
                        self.skip_non_break();
                    }
                } else if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
                self.input.lookahead(1);
            }
            if !in_flow && (self.mark.col() as i32 - 1) < indent {
                break;
            }
        }

        if end.line() == self.mark.line() && end.index() > start.index() {
            // The scalar ended mid-line (at a `: ` or ` #`); the next token
            // is not the first content of this line.
            self.line_crossed = false;
        }
        Ok(Token::new(
            TokenKind::PlainScalar(self.interner.intern_owned(string)),
            start,
            end,
        ))
    }

    fn scan_quoted_scalar(&mut self, double: bool) -> Result<Token, ScanError> {
        let start = self.mark;
        self.skip_non_break(); // opening quote

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        loop {
            self.input.lookahead(2);
            if self.mark.col() == 1 {
                self.input.lookahead(4);
                if self.input.next_is_document_indicator() {
                    return Err(self.error(
                        start,
                        "while scanning a quoted scalar, found unexpected document indicator",
                    ));
                }
            }
            let c = self.ch();
            if is_z(c) {
                return Err(self.error(
                    start,
                    "while scanning a quoted scalar, found unexpected end of stream",
                ));
            }
            if is_any_break(c) {
                if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
                continue;
            }
            if is_blank(c) {
                if leading_blanks {
                    self.skip_non_break();
                } else {
                    whitespaces.push(c);
                    self.skip_non_break();
                }
                continue;
            }
            if !double && c == '\'' && self.input.peek_nth(1) == '\'' {
                Self::flush_folded(
                    &mut string,
                    &mut leading_break,
                    &mut trailing_breaks,
                    &mut whitespaces,
                    &mut leading_blanks,
                );
                string.push('\'');
                self.skip_non_break();
                self.skip_non_break();
                continue;
            }
            if (!double && c == '\'') || (double && c == '"') {
                self.skip_non_break();
                break;
            }
            if double && c == '\\' {
                let nc = self.input.peek_nth(1);
                if is_any_break(nc) {
                    // Escaped line break: the break is elided, no fold space
                    // is inserted, and whitespace around it is stripped.
                    self.skip_non_break();
                    self.skip_break();
                    while is_blank(self.input.look_ch()) {
                        self.skip_non_break();
                    }
                    whitespaces.clear();
                    continue;
                }
                Self::flush_folded(
                    &mut string,
                    &mut leading_break,
                    &mut trailing_breaks,
                    &mut whitespaces,
                    &mut leading_blanks,
                );
                self.scan_escape(&mut string, start)?;
                continue;
            }
            Self::flush_folded(
                &mut string,
                &mut leading_break,
                &mut trailing_breaks,
                &mut whitespaces,
                &mut leading_blanks,
            );
            string.push(c);
            self.skip_non_break();
        }

        self.adjacent_value_allowed_at = self.mark.index();
        // The token ends where its content ends; breaks consumed inside it
        // do not leave the scanner at a fresh line.
        self.line_crossed = false;
        let kind = if double {
            TokenKind::DoubleQuotedScalar(self.interner.intern_owned(string))
        } else {
            TokenKind::SingleQuotedScalar(self.interner.intern_owned(string))
        };
        Ok(Token::new(kind, start, self.mark))
    }

    fn scan_escape(&mut self, string: &mut String, start: Mark) -> Result<(), ScanError> {
        self.skip_non_break(); // '\\'
        let c = self.input.look_ch();
        let simple = match c {
            '0' => Some('\0'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            't' | '\t' => Some('\t'),
            'n' => Some('\n'),
            'v' => Some('\x0b'),
            'f' => Some('\x0c'),
            'r' => Some('\r'),
            'e' => Some('\x1b'),
            ' ' => Some(' '),
            '"' => Some('"'),
            '/' => Some('/'),
            '\\' => Some('\\'),
            'N' => Some('\u{0085}'),
            '_' => Some('\u{00a0}'),
            'L' => Some('\u{2028}'),
            'P' => Some('\u{2029}'),
            _ => None,
        };
        if let Some(decoded) = simple {
            string.push(decoded);
            self.skip_non_break();
            return Ok(());
        }
        let width = match c {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            _ => {
                return Err(self.error(
                    start,
                    "while parsing a quoted scalar, found unknown escape character",
                ))
            }
        };
        self.skip_non_break();
        let mut value: u32 = 0;
        for _ in 0..width {
            let c = self.input.look_ch();
            if !is_hex(c) {
                return Err(self.error(
                    start,
                    "while parsing a quoted scalar, did not find expected hexadecimal number",
                ));
            }
            value = value * 16 + crate::char_traits::as_hex(c);
            self.skip_non_break();
        }
        match char::from_u32(value) {
            Some(decoded) => {
                string.push(decoded);
                Ok(())
            }
            None => Err(self.error(
                start,
                "while parsing a quoted scalar, found invalid Unicode character escape code",
            )),
        }
    }

    fn scan_block_scalar(&mut self, literal: bool, block_indent: i32) -> Result<Token, ScanError> {
        let start = self.mark;
        self.skip_non_break(); // '|' or '>'

        let mut chomping = Chomping::Clip;
        let mut increment: i32 = 0;
        let c = self.input.look_ch();
        if c == '+' || c == '-' {
            chomping = if c == '+' {
                Chomping::Keep
            } else {
                Chomping::Strip
            };
            self.skip_non_break();
            if self.input.look_ch().is_ascii_digit() {
                increment = self.scan_indentation_indicator(start)?;
            }
        } else if c.is_ascii_digit() {
            increment = self.scan_indentation_indicator(start)?;
            let c = self.input.look_ch();
            if c == '+' || c == '-' {
                chomping = if c == '+' {
                    Chomping::Keep
                } else {
                    Chomping::Strip
                };
                self.skip_non_break();
            }
        }
        self.require_eol_or_comment()?;
        if !self.input.next_is_z() {
            self.skip_break();
        }

        let base = block_indent.max(-1);
        let mut indent: i32 = if increment > 0 { base + increment } else { -1 };

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        // Whether the previous content line started with a blank; such lines
        // are "more indented" and do not take part in folding.
        let mut prev_blank = false;

        self.skip_block_scalar_breaks(&mut indent, base, &mut trailing_breaks)?;

        while (self.mark.col() as i32 - 1) == indent && !self.input.next_is_z() {
            self.input.lookahead(4);
            if self.mark.col() == 1 && self.input.next_is_document_indicator() {
                break;
            }
            let line_blank = is_blank(self.ch());
            if !literal && !leading_break.is_empty() && !prev_blank && !line_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                } else {
                    string.push_str(&trailing_breaks);
                }
            } else {
                string.push_str(&leading_break);
                string.push_str(&trailing_breaks);
            }
            leading_break.clear();
            trailing_breaks.clear();
            prev_blank = line_blank;

            while !self.input.next_is_breakz() {
                string.push(self.ch());
                self.skip_non_break();
                self.input.lookahead(1);
            }
            if self.input.next_is_z() {
                // The stream ends without a final break; chomping has
                // nothing to clip.
                break;
            }
            self.read_break(&mut leading_break);
            self.skip_block_scalar_breaks(&mut indent, base, &mut trailing_breaks)?;
        }

        match chomping {
            Chomping::Strip => {}
            Chomping::Clip => string.push_str(&leading_break),
            Chomping::Keep => {
                string.push_str(&leading_break);
                string.push_str(&trailing_breaks);
            }
        }

        let kind = if literal {
            TokenKind::LiteralScalar(self.interner.intern_owned(string))
        } else {
            TokenKind::FoldedScalar(self.interner.intern_owned(string))
        };
        Ok(Token::new(kind, start, self.mark))
    }

    fn scan_indentation_indicator(&mut self, start: Mark) -> Result<i32, ScanError> {
        let c = self.input.look_ch();
        if c == '0' {
            return Err(self.error(
                start,
                "while scanning a block scalar, found an indentation indicator equal to 0",
            ));
        }
        self.skip_non_break();
        Ok(c as i32 - '0' as i32)
    }

    /// Consume empty lines and the indentation of the next content line.
    ///
    /// When `*indent` is negative, detect it from the first non-empty line
    /// (at least one column past the enclosing block level).
    fn skip_block_scalar_breaks(
        &mut self,
        indent: &mut i32,
        base: i32,
        breaks: &mut String,
    ) -> Result<(), ScanError> {
        let mut max_indent: i32 = 0;
        loop {
            while (*indent < 0 || (self.mark.col() as i32 - 1) < *indent)
                && self.input.look_ch() == ' '
            {
                self.skip_non_break();
            }
            max_indent = max_indent.max(self.mark.col() as i32 - 1);
            if (*indent < 0 || (self.mark.col() as i32 - 1) < *indent)
                && self.input.look_ch() == '\t'
            {
                return Err(self.error(
                    self.mark,
                    "while scanning a block scalar, found a tab character where an indentation space is expected",
                ));
            }
            if !self.input.next_is_break() {
                break;
            }
            self.read_break(breaks);
        }
        if *indent < 0 && !self.input.next_is_z() {
            *indent = max_indent.max(base + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Regime, Scanner, TokenKind};
    use crate::input::StrInput;
    use crate::interner::Interner;

    fn scanner(input: &str) -> Scanner<StrInput<'_>> {
        Scanner::new(StrInput::new(input), Interner::new())
    }

    fn kinds(input: &str, regime: Regime) -> Vec<TokenKind> {
        let mut scanner = scanner(input);
        let mut out = vec![];
        loop {
            let token = scanner.next_token(regime).unwrap();
            let done = token.kind == TokenKind::StreamEnd;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    fn next_content(s: &mut Scanner<StrInput<'_>>, regime: Regime) -> TokenKind {
        loop {
            let token = s.next_token(regime).unwrap();
            if !matches!(token.kind, TokenKind::Indentation(_)) {
                return token.kind;
            }
        }
    }

    #[test]
    fn tokenizes_a_block_mapping_line() {
        let toks = kinds("a: 1", Regime::Block { indent: -1 });
        assert_eq!(toks.len(), 6);
        assert_eq!(toks[0], TokenKind::StreamStart);
        assert_eq!(toks[1], TokenKind::Indentation(0));
        assert!(matches!(&toks[2], TokenKind::PlainScalar(s) if s == "a"));
        assert_eq!(toks[3], TokenKind::BlockMapValue);
        assert!(matches!(&toks[4], TokenKind::PlainScalar(s) if s == "1"));
        assert_eq!(toks[5], TokenKind::StreamEnd);
    }

    #[test]
    fn emits_indentation_tokens_on_fresh_lines() {
        let toks = kinds("a:\n  b", Regime::Block { indent: -1 });
        assert!(toks.contains(&TokenKind::Indentation(2)));
    }

    #[test]
    fn resolves_secondary_tag_handle() {
        let mut s = scanner("!!str x");
        s.next_token(Regime::Document).unwrap(); // stream start
        let handle = next_content(&mut s, Regime::Document);
        assert!(matches!(&handle, TokenKind::TagHandle(p) if p == "tag:yaml.org,2002:"));
        let suffix = next_content(&mut s, Regime::Document);
        assert!(matches!(&suffix, TokenKind::TagSuffix(sfx) if sfx == "str"));
    }

    fn error_of(s: &mut Scanner<StrInput<'_>>, regime: Regime) -> crate::error::ScanError {
        loop {
            match s.next_token(regime) {
                Ok(token) => assert_ne!(token.kind, TokenKind::StreamEnd, "no error produced"),
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn tag_directive_declares_handle() {
        let mut s = scanner("%TAG !e! tag:example.com,2000:app/\n--- !e!foo x");
        s.next_token(Regime::Document).unwrap(); // stream start
        let dir = next_content(&mut s, Regime::Document);
        assert!(matches!(dir, TokenKind::TagDirective { .. }));
        loop {
            if next_content(&mut s, Regime::Document) == TokenKind::DirectivesEnd {
                break;
            }
        }
        let handle = next_content(&mut s, Regime::Document);
        assert!(matches!(&handle, TokenKind::TagHandle(p) if p == "tag:example.com,2000:app/"));
        let suffix = next_content(&mut s, Regime::Document);
        assert!(matches!(&suffix, TokenKind::TagSuffix(sfx) if sfx == "foo"));
    }

    #[test]
    fn undefined_named_handle_errors() {
        let mut s = scanner("!x!foo bar");
        s.next_token(Regime::Document).unwrap();
        let err = error_of(&mut s, Regime::Document);
        assert!(err.info().contains("undefined tag handle"));
    }

    #[test]
    fn plain_scalar_folds_lines() {
        let mut s = scanner("one\ntwo\n\nthree");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::PlainScalar(v) if v == "one two\nthree"));
    }

    #[test]
    fn literal_scalar_keeps_breaks() {
        let mut s = scanner("|\n a\n b\n");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::LiteralScalar(v) if v == "a\nb\n"));
    }

    #[test]
    fn folded_scalar_folds_and_clips() {
        let mut s = scanner(">\n a\n b\n\n c\n");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::FoldedScalar(v) if v == "a b\nc\n"));
    }

    #[test]
    fn literal_scalar_chomping() {
        let mut s = scanner("|-\n a\n b\n\n\n");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::LiteralScalar(v) if v == "a\nb"));

        let mut s = scanner("|+\n a\n\n\n");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::LiteralScalar(v) if v == "a\n\n\n"));
    }

    #[test]
    fn double_quoted_escapes() {
        let mut s = scanner(r#""a\tb\u0041\x20c""#);
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::DoubleQuotedScalar(v) if v == "a\tbA c"));
    }

    #[test]
    fn single_quoted_doubles_apostrophes() {
        let mut s = scanner("'it''s'");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::SingleQuotedScalar(v) if v == "it's"));
    }

    #[test]
    fn quoted_scalar_folds_lines() {
        let mut s = scanner("\"a\n b\n\n c\"");
        s.next_token(Regime::Document).unwrap();
        let tok = next_content(&mut s, Regime::Block { indent: -1 });
        assert!(matches!(&tok, TokenKind::DoubleQuotedScalar(v) if v == "a b\nc"));
    }

    #[test]
    fn unknown_escape_errors() {
        let mut s = scanner(r#""\q""#);
        s.next_token(Regime::Document).unwrap();
        let err = error_of(&mut s, Regime::Block { indent: -1 });
        assert!(err.info().contains("unknown escape character"));
    }

    #[test]
    fn unterminated_quoted_scalar_errors() {
        let mut s = scanner("'open");
        s.next_token(Regime::Document).unwrap();
        let err = error_of(&mut s, Regime::Block { indent: -1 });
        assert!(err.info().contains("unexpected end of stream"));
    }

    #[test]
    fn tab_indentation_errors() {
        let mut s = scanner("a:\n\tb: 1");
        let err = error_of(&mut s, Regime::Block { indent: -1 });
        assert!(err.info().contains("tab"));
    }

    #[test]
    fn stream_end_is_idempotent() {
        let mut s = scanner("");
        s.next_token(Regime::Document).unwrap();
        for _ in 0..3 {
            let t = s.next_token(Regime::Document).unwrap();
            assert_eq!(t.kind, TokenKind::StreamEnd);
        }
    }

    #[test]
    fn incompatible_version_errors() {
        let mut s = scanner("%YAML 2.0\n--- x");
        s.next_token(Regime::Document).unwrap();
        let err = error_of(&mut s, Regime::Document);
        assert!(err.info().contains("incompatible YAML document version"));
    }

    #[test]
    fn annotation_with_params() {
        let mut s = scanner("@deprecated(since)");
        s.next_token(Regime::Document).unwrap();
        let ann = next_content(&mut s, Regime::Document);
        assert!(matches!(&ann, TokenKind::AnnotationStart(n) if n == "deprecated"));
        let open = next_content(&mut s, Regime::Flow);
        assert_eq!(open, TokenKind::AnnotationParamsStart);
        let param = next_content(&mut s, Regime::Flow);
        assert!(matches!(&param, TokenKind::PlainScalar(v) if v == "since"));
        let close = next_content(&mut s, Regime::Flow);
        assert_eq!(close, TokenKind::AnnotationParamsEnd);
    }

    #[test]
    fn bom_token_between_documents() {
        let toks = kinds("\u{FEFF}x", Regime::Document);
        assert_eq!(toks[1], TokenKind::Indentation(0));
        assert_eq!(toks[2], TokenKind::ByteOrderMark);
        assert!(matches!(&toks[3], TokenKind::PlainScalar(v) if v == "x"));
    }
}
