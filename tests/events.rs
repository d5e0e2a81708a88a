#![allow(clippy::bool_assert_comparison)]

use citrine_parser::{
    CollectionStyle, Error, Event, EventKind, Interner, NodeProperties, Parser, ScalarStyle,
};

/// Run the parser through the string with both input backends.
///
/// # Returns
/// The events if parsing succeeds, the error the parser returned otherwise.
///
/// # Panics
/// Panics if the two input backends disagree.
fn run_parser(input: &str) -> Result<Vec<Event>, Error> {
    let mut str_events = vec![];
    let mut str_error = None;
    let mut iter_events = vec![];
    let mut iter_error = None;

    for x in Parser::new_from_str(input) {
        match x {
            Ok(event) => str_events.push(event),
            Err(e) => {
                str_error = Some(e);
                break;
            }
        }
    }
    for x in Parser::new_from_iter(input.chars()) {
        match x {
            Ok(event) => iter_events.push(event),
            Err(e) => {
                iter_error = Some(e);
                break;
            }
        }
    }

    assert_eq!(str_events, iter_events);
    assert_eq!(str_error, iter_error);

    if let Some(err) = str_error {
        Err(err)
    } else {
        Ok(str_events)
    }
}

fn kinds(input: &str) -> Vec<EventKind> {
    run_parser(input)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect()
}

fn plain(value: &str) -> EventKind {
    EventKind::Scalar {
        value: Interner::new().intern(value),
        style: ScalarStyle::Plain,
        properties: NodeProperties::default(),
    }
}

fn scalar(value: &str, style: ScalarStyle) -> EventKind {
    EventKind::Scalar {
        value: Interner::new().intern(value),
        style,
        properties: NodeProperties::default(),
    }
}

fn anchored(value: &str, anchor: &str) -> EventKind {
    let interner = Interner::new();
    EventKind::Scalar {
        value: interner.intern(value),
        style: ScalarStyle::Plain,
        properties: NodeProperties {
            anchor: Some(interner.intern(anchor)),
            tag: None,
        },
    }
}

fn doc_start(explicit: bool) -> EventKind {
    EventKind::DocumentStart {
        explicit,
        version: None,
    }
}

fn doc_end(implicit: bool) -> EventKind {
    EventKind::DocumentEnd { implicit }
}

fn map_start(style: CollectionStyle) -> EventKind {
    EventKind::MappingStart {
        style,
        properties: NodeProperties::default(),
    }
}

fn seq_start(style: CollectionStyle) -> EventKind {
    EventKind::SequenceStart {
        style,
        properties: NodeProperties::default(),
    }
}

#[test]
fn empty_stream() {
    assert_eq!(kinds(""), [EventKind::StreamStart, EventKind::StreamEnd]);
}

#[test]
fn bare_document_start() {
    assert_eq!(
        kinds("---"),
        [
            EventKind::StreamStart,
            doc_start(true),
            plain(""),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn single_scalar_document() {
    assert_eq!(
        kinds("hello"),
        [
            EventKind::StreamStart,
            doc_start(false),
            plain("hello"),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn simple_block_mapping() {
    assert_eq!(
        kinds("a: 1\nb: 2\n"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            plain("1"),
            plain("b"),
            plain("2"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn utf8_content() {
    assert_eq!(
        kinds("a: 你好"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            plain("你好"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn comments_are_skipped() {
    let s = "
# This is a comment
a: b # This is another comment
##
  #
";
    assert_eq!(
        kinds(s),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            plain("b"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn scalar_styles_in_a_sequence() {
    let s = "
- plain
- 'squote'
- \"dquote\"
";
    assert_eq!(
        kinds(s),
        [
            EventKind::StreamStart,
            doc_start(false),
            seq_start(CollectionStyle::Block),
            plain("plain"),
            scalar("squote", ScalarStyle::SingleQuoted),
            scalar("dquote", ScalarStyle::DoubleQuoted),
            EventKind::SequenceEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn nested_block_mapping() {
    assert_eq!(
        kinds("a:\n b: 1\nc: 2"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            map_start(CollectionStyle::Block),
            plain("b"),
            plain("1"),
            EventKind::MappingEnd,
            plain("c"),
            plain("2"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn misindented_key_fails() {
    let err = run_parser("a:\n  b: 1\n d: 2").unwrap_err();
    assert_eq!(err.mark().line(), 3);
}

#[test]
fn anchors_and_aliases() {
    let interner = Interner::new();
    assert_eq!(
        kinds("- &a foo\n- *a"),
        [
            EventKind::StreamStart,
            doc_start(false),
            seq_start(CollectionStyle::Block),
            anchored("foo", "a"),
            EventKind::Alias {
                anchor: interner.intern("a"),
                properties: NodeProperties::default(),
            },
            EventKind::SequenceEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn anchor_on_empty_node() {
    // A property with no node after it is an empty scalar carrying it.
    assert_eq!(
        kinds("&a"),
        [
            EventKind::StreamStart,
            doc_start(false),
            anchored("", "a"),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn alias_as_mapping_key() {
    let interner = Interner::new();
    assert_eq!(
        kinds("- &k foo\n- *k : 1"),
        [
            EventKind::StreamStart,
            doc_start(false),
            seq_start(CollectionStyle::Block),
            anchored("foo", "k"),
            map_start(CollectionStyle::Block),
            EventKind::Alias {
                anchor: interner.intern("k"),
                properties: NodeProperties::default(),
            },
            plain("1"),
            EventKind::MappingEnd,
            EventKind::SequenceEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn indentless_sequence_as_mapping_value() {
    assert_eq!(
        kinds("a:\n- 1\n- 2\nb: 3"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            seq_start(CollectionStyle::Block),
            plain("1"),
            plain("2"),
            EventKind::SequenceEnd,
            plain("b"),
            plain("3"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn explicit_key_and_missing_value() {
    assert_eq!(
        kinds("? a\n: 1\n? b"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            plain("1"),
            plain("b"),
            plain(""),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn empty_values_in_block_mapping() {
    assert_eq!(
        kinds("a:\nb: 1"),
        [
            EventKind::StreamStart,
            doc_start(false),
            map_start(CollectionStyle::Block),
            plain("a"),
            plain(""),
            plain("b"),
            plain("1"),
            EventKind::MappingEnd,
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn mapping_value_after_multiline_scalar_fails() {
    let s = "
# syntax error
scalar
key: [1, 2]]
key1:a2
";
    let Err(error) = run_parser(s) else { panic!() };
    assert_eq!(
        error.info(),
        "mapping values are not allowed in this context"
    );
    assert_eq!(
        error.to_string(),
        "mapping values are not allowed in this context at byte 26 line 4 column 4"
    );
}

#[test]
fn trailing_content_after_quoted_scalar_fails() {
    assert!(run_parser(r#""foo" l"#).is_err());
}

#[test]
fn hyphen_inside_flow_mapping_fails() {
    assert!(run_parser("{-").is_err());
}

#[test]
fn double_dash_is_a_plain_scalar() {
    assert_eq!(
        kinds("----"),
        [
            EventKind::StreamStart,
            doc_start(false),
            plain("----"),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
    assert_eq!(
        kinds("---- #comment"),
        [
            EventKind::StreamStart,
            doc_start(false),
            plain("----"),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
    run_parser("---This used to cause an infinite loop").unwrap();
}

#[test]
fn document_start_with_comment() {
    assert_eq!(
        kinds("--- #comment"),
        [
            EventKind::StreamStart,
            doc_start(true),
            plain(""),
            doc_end(true),
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn indentation_width_does_not_matter() {
    let four = kinds("hash:\n    with:\n        indentations");
    let two = kinds("hash:\n  with:\n    indentations");
    let one = kinds("hash:\n with:\n  indentations");
    let mixed = kinds("hash:\n     with:\n               indentations");
    assert_eq!(four, two);
    assert_eq!(four, one);
    assert_eq!(four, mixed);
}

#[test]
fn recursion_depth_is_bounded_for_mappings() {
    let s = "{a:".repeat(10_000) + &"}".repeat(10_000);
    assert!(run_parser(&s).is_err());
}

#[test]
fn recursion_depth_is_bounded_for_sequences() {
    let s = "[".repeat(10_000) + &"]".repeat(10_000);
    assert!(run_parser(&s).is_err());
}

#[test]
fn key_without_colon_fails() {
    assert!(run_parser("a: 1\nb\n").is_err());
}

#[test]
fn properties_on_own_line_attach_to_mapping() {
    let interner = Interner::new();
    let events = kinds("&m\na: 1");
    assert_eq!(
        events[2],
        EventKind::MappingStart {
            style: CollectionStyle::Block,
            properties: NodeProperties {
                anchor: Some(interner.intern("m")),
                tag: None,
            },
        }
    );
    assert_eq!(events[3], plain("a"));
}

#[test]
fn properties_on_key_line_attach_to_key() {
    let interner = Interner::new();
    let events = kinds("&k a: 1");
    assert_eq!(events[2], map_start(CollectionStyle::Block));
    assert_eq!(
        events[3],
        EventKind::Scalar {
            value: interner.intern("a"),
            style: ScalarStyle::Plain,
            properties: NodeProperties {
                anchor: Some(interner.intern("k")),
                tag: None,
            },
        }
    );
}
