use citrine_parser::{
    CollectionStyle, Error, Event, EventKind, Interner, NodeProperties, Parser, ScalarStyle,
};

fn run_parser(input: &str) -> Result<Vec<Event>, Error> {
    Parser::new_from_str(input).collect()
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

fn flow_seq() -> EventKind {
    EventKind::SequenceStart {
        style: CollectionStyle::Flow,
        properties: NodeProperties::default(),
    }
}

fn flow_map() -> EventKind {
    EventKind::MappingStart {
        style: CollectionStyle::Flow,
        properties: NodeProperties::default(),
    }
}

#[test]
fn flow_sequence_at_document_root() {
    assert_eq!(
        kinds("[1, 2, 3]"),
        [
            EventKind::StreamStart,
            EventKind::DocumentStart {
                explicit: false,
                version: None,
            },
            flow_seq(),
            plain("1"),
            plain("2"),
            plain("3"),
            EventKind::SequenceEnd,
            EventKind::DocumentEnd { implicit: true },
            EventKind::StreamEnd,
        ]
    );
}

#[test]
fn empty_flow_collections() {
    let events = kinds("[]");
    assert_eq!(events[2], flow_seq());
    assert_eq!(events[3], EventKind::SequenceEnd);

    let events = kinds("{}");
    assert_eq!(events[2], flow_map());
    assert_eq!(events[3], EventKind::MappingEnd);
}

#[test]
fn flow_mapping_entries() {
    assert_eq!(
        &kinds("{a: 1, b: 2}")[2..8],
        [
            flow_map(),
            plain("a"),
            plain("1"),
            plain("b"),
            plain("2"),
            EventKind::MappingEnd,
        ]
    );
}

#[test]
fn trailing_commas_are_tolerated() {
    assert_eq!(kinds("[a, b,]").len(), kinds("[a, b]").len());
    assert_eq!(kinds("{a: 1,}").len(), kinds("{a: 1}").len());
}

#[test]
fn empty_flow_sequence_entries_become_empty_scalars() {
    assert_eq!(
        &kinds("[a, , b]")[2..8],
        [
            flow_seq(),
            plain("a"),
            plain(""),
            plain("b"),
            EventKind::SequenceEnd,
            EventKind::DocumentEnd { implicit: true },
        ]
    );
}

#[test]
fn key_without_value_in_flow_mapping() {
    assert_eq!(
        &kinds("{a, b: 1}")[2..9],
        [
            flow_map(),
            plain("a"),
            plain(""),
            plain("b"),
            plain("1"),
            EventKind::MappingEnd,
            EventKind::DocumentEnd { implicit: true },
        ]
    );
}

#[test]
fn single_pair_mapping_inside_flow_sequence() {
    assert_eq!(
        &kinds("[a: b]")[2..8],
        [
            flow_seq(),
            flow_map(),
            plain("a"),
            plain("b"),
            EventKind::MappingEnd,
            EventKind::SequenceEnd,
        ]
    );
}

#[test]
fn single_pair_mapping_with_empty_key() {
    assert_eq!(
        &kinds("[: b]")[2..8],
        [
            flow_seq(),
            flow_map(),
            plain(""),
            plain("b"),
            EventKind::MappingEnd,
            EventKind::SequenceEnd,
        ]
    );
}

#[test]
fn explicit_single_pair_in_flow_sequence() {
    assert_eq!(
        &kinds("[? a: b]")[2..8],
        [
            flow_seq(),
            flow_map(),
            plain("a"),
            plain("b"),
            EventKind::MappingEnd,
            EventKind::SequenceEnd,
        ]
    );
}

#[test]
fn adjacent_value_after_quoted_key() {
    assert_eq!(
        &kinds("{\"a\":1}")[2..6],
        [
            flow_map(),
            EventKind::Scalar {
                value: Interner::new().intern("a"),
                style: ScalarStyle::DoubleQuoted,
                properties: NodeProperties::default(),
            },
            plain("1"),
            EventKind::MappingEnd,
        ]
    );
}

#[test]
fn plain_scalar_with_unspaced_colon_stays_one_scalar() {
    assert_eq!(
        &kinds("[a:b]")[2..5],
        [flow_seq(), plain("a:b"), EventKind::SequenceEnd]
    );
}

#[test]
fn nested_flow_collections() {
    assert_eq!(
        &kinds("[{x: 1}, [2]]")[2..11],
        [
            flow_seq(),
            flow_map(),
            plain("x"),
            plain("1"),
            EventKind::MappingEnd,
            flow_seq(),
            plain("2"),
            EventKind::SequenceEnd,
            EventKind::SequenceEnd,
        ]
    );
}

#[test]
fn flow_collections_span_lines() {
    assert_eq!(
        kinds("[one,\n two,\n three]").len(),
        kinds("[one, two, three]").len()
    );
}

#[test]
fn flow_collection_as_mapping_value() {
    assert_eq!(
        &kinds("key: [1, 2]")[2..9],
        [
            EventKind::MappingStart {
                style: CollectionStyle::Block,
                properties: NodeProperties::default(),
            },
            plain("key"),
            flow_seq(),
            plain("1"),
            plain("2"),
            EventKind::SequenceEnd,
            EventKind::MappingEnd,
        ]
    );
}

#[test]
fn unterminated_flow_collections_fail() {
    assert!(run_parser("[a, b").is_err());
    assert!(run_parser("{a: 1").is_err());
    assert!(run_parser("[a, b}").is_err());
}

#[test]
fn block_scalars_are_rejected_in_flow() {
    assert!(run_parser("[|\n x\n]").is_err());
}

#[test]
fn missing_separator_fails() {
    assert!(run_parser(r#"["a" "b"]"#).is_err());
}
