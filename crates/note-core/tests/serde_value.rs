use notes_editor_core::{
    Attrs, ContentError, Document, Editor, MarkType, Marks, Node, NoteValue, PluginRegistry,
    document_from_json, sanitize,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

fn normalized(children: Vec<Node>) -> Document {
    Editor::with_document(Document::new(children), PluginRegistry::notes())
        .unwrap()
        .doc()
        .clone()
}

fn rich_paragraph() -> Node {
    Node::element(
        "paragraph",
        Attrs::from([("align".to_string(), Value::from("center"))]),
        vec![
            Node::text("plain "),
            Node::marked(
                "styled",
                Marks::default()
                    .with(MarkType::Bold, None)
                    .with(MarkType::BackgroundColor, Some("yellow".into())),
            ),
            Node::hard_break(),
            Node::marked(
                "link",
                Marks::default().with(MarkType::Link, Some("https://a.test".into())),
            ),
        ],
    )
}

fn nested_list() -> Node {
    Node::element(
        "ordered_list",
        Attrs::from([("order".to_string(), Value::from(3))]),
        vec![Node::element(
            "list_item",
            Attrs::new(),
            vec![
                Node::paragraph("three"),
                Node::element(
                    "bullet_list",
                    Attrs::new(),
                    vec![Node::element("list_item", Attrs::new(), vec![Node::paragraph("")])],
                ),
            ],
        )],
    )
}

#[rstest]
#[case::empty(vec![Node::paragraph("")])]
#[case::heading(vec![Node::heading(4, "Title")])]
#[case::marks(vec![rich_paragraph()])]
#[case::lists(vec![nested_list()])]
#[case::quote_and_code(vec![
    Node::element("blockquote", Attrs::new(), vec![Node::paragraph("q")]),
    Node::element("code_block", Attrs::new(), vec![Node::text("fn main() {}")]),
])]
fn serialized_documents_round_trip(#[case] children: Vec<Node>) {
    let registry = PluginRegistry::notes();
    let doc = normalized(children);
    let json = doc.to_json();

    let parsed = document_from_json(&json, registry.schema()).unwrap();
    let reparsed = Editor::with_document(parsed, PluginRegistry::notes()).unwrap();

    assert_eq!(sanitize(&reparsed.doc().to_json()), sanitize(&json));
    assert_eq!(reparsed.doc(), &doc);
}

#[test]
fn empty_text_is_omitted_from_json() {
    let doc = normalized(vec![Node::paragraph("")]);

    assert_eq!(
        doc.to_json(),
        json!({
            "type": "doc",
            "content": [{"type": "paragraph", "attrs": {"align": "left"}}]
        })
    );
}

#[test]
fn marks_serialize_with_their_attrs() {
    let doc = normalized(vec![rich_paragraph()]);

    let json = doc.to_json();

    assert_eq!(
        json["content"][0]["content"][1],
        json!({
            "type": "text",
            "text": "styled",
            "marks": [
                {"type": "bold"},
                {"type": "backgroundColor", "attrs": {"color": "yellow"}},
            ]
        })
    );
    assert_eq!(json["content"][0]["content"][2], json!({"type": "hard_break"}));
}

#[test]
fn non_doc_root_becomes_the_only_child() {
    let registry = PluginRegistry::notes();
    let json = json!({
        "type": "heading",
        "attrs": {"level": 2},
        "content": [{"type": "text", "text": "Solo"}]
    });

    let doc = document_from_json(&json, registry.schema()).unwrap();

    assert_eq!(doc.children.len(), 1);
    let heading = doc.children[0].as_element().unwrap();
    assert_eq!(heading.kind, "heading");
    assert_eq!(heading.attr_u64("level"), Some(2));
}

#[test]
fn grammar_violations_are_reported() {
    let registry = PluginRegistry::notes();
    let json = json!({
        "type": "doc",
        "content": [{"type": "list_item", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "x"}]}
        ]}]
    });

    let err = document_from_json(&json, registry.schema()).unwrap_err();
    assert!(matches!(err, ContentError::Schema(_)));
}

#[test]
fn unknown_marks_and_missing_mark_attrs_are_reported() {
    let registry = PluginRegistry::notes();
    let unknown = json!({"type": "doc", "content": [{"type": "paragraph", "content": [
        {"type": "text", "text": "x", "marks": [{"type": "sparkle"}]}
    ]}]});
    let missing = json!({"type": "doc", "content": [{"type": "paragraph", "content": [
        {"type": "text", "text": "x", "marks": [{"type": "link"}]}
    ]}]});

    assert!(matches!(
        document_from_json(&unknown, registry.schema()),
        Err(ContentError::Schema(_))
    ));
    assert!(matches!(
        document_from_json(&missing, registry.schema()),
        Err(ContentError::MissingMarkAttr { attr: "href", .. })
    ));
    assert!(matches!(
        document_from_json(&json!({"content": []}), registry.schema()),
        Err(ContentError::Json(_))
    ));
}

#[test]
fn sanitized_input_with_empty_text_parses() {
    let registry = PluginRegistry::notes();
    let raw = json!({
        "type": "doc",
        "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": ""}]},
            {"type": "paragraph", "content": [{"type": "text", "text": "kept"}]},
        ]
    });

    let doc = document_from_json(&sanitize(&raw), registry.schema()).unwrap();

    assert_eq!(doc.children.len(), 2);
    assert_eq!(doc.text_content(), "kept");
}

#[test]
fn note_value_envelope() {
    let registry = PluginRegistry::notes();
    let doc = normalized(vec![Node::paragraph("hi")]);

    let text = NoteValue::from_document(&doc).to_json_pretty().unwrap();
    let value = NoteValue::from_json_str(&text).unwrap();

    assert_eq!(value.schema, "notes-editor");
    assert_eq!(value.version, 1);
    assert_eq!(value.into_document(registry.schema()).unwrap(), doc);

    let defaulted = NoteValue::from_json_str(r#"{"document": {"type": "doc"}}"#).unwrap();
    assert_eq!(defaulted.version, 1);
}
