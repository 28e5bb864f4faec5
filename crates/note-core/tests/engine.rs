use notes_editor_core::{
    ApplyError, AttrPatch, Attrs, Document, Editor, NormalizePass, NotePlugin, Node, Op,
    PluginRegistry, Point, Selection, Transaction,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn list(items: Vec<Node>) -> Node {
    Node::element("bullet_list", Attrs::new(), items)
}

fn item(children: Vec<Node>) -> Node {
    Node::element("list_item", Attrs::new(), children)
}

fn child<'a>(node: &'a Node, ix: usize) -> &'a Node {
    let Node::Element(el) = node else {
        panic!("expected element, got {node:?}");
    };
    &el.children[ix]
}

#[test]
fn empty_document_is_normalized_to_one_paragraph() {
    let editor = Editor::with_document(Document::new(Vec::new()), PluginRegistry::notes()).unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    let Node::Element(paragraph) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(paragraph.kind, "paragraph");
    assert_eq!(paragraph.attr_str("align"), Some("left"));
    assert_eq!(paragraph.children, vec![Node::text("")]);
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 0)));
}

#[test]
fn transaction_violating_the_grammar_is_rejected() {
    let mut editor = Editor::with_document(
        Document::new(vec![Node::paragraph("keep")]),
        PluginRegistry::notes(),
    )
    .unwrap();
    let before = editor.doc().clone();

    let tx = Transaction::new(vec![Op::InsertNode {
        path: vec![1],
        node: item(vec![Node::paragraph("stray")]),
    }]);
    let err = editor.apply(tx).unwrap_err();

    assert!(matches!(err, ApplyError::Schema(_)));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn list_item_keeps_a_leading_paragraph() {
    let doc = Document::new(vec![list(vec![item(vec![
        Node::paragraph("parent"),
        list(vec![item(vec![Node::paragraph("child")])]),
    ])])]);
    let mut editor = Editor::with_document(doc, PluginRegistry::notes()).unwrap();

    editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![0, 0, 0],
        }]))
        .unwrap();

    let list_item = child(&editor.doc().children[0], 0);
    assert_eq!(child(list_item, 0).kind(), "paragraph");
    assert_eq!(child(list_item, 1).kind(), "bullet_list");
}

#[test]
fn emptied_containers_are_removed() {
    let doc = Document::new(vec![
        Node::paragraph("a"),
        list(vec![item(vec![Node::paragraph("only")])]),
    ]);
    let mut editor = Editor::with_document(doc, PluginRegistry::notes()).unwrap();

    editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![1, 0],
        }]))
        .unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(editor.doc().children[0].kind(), "paragraph");
}

#[test]
fn inverse_ops_restore_the_document() {
    let mut editor = Editor::with_document(
        Document::new(vec![Node::paragraph("hello")]),
        PluginRegistry::notes(),
    )
    .unwrap();
    let before = editor.doc().clone();

    let outcome = editor
        .apply(Transaction::new(vec![
            Op::InsertText {
                path: vec![0, 0],
                offset: 5,
                text: " world".to_string(),
            },
            Op::SetNodeAttrs {
                path: vec![0],
                patch: AttrPatch::set("align", Value::from("center")),
            },
        ]))
        .unwrap();
    assert!(outcome.doc_changed);
    assert_eq!(editor.doc().plain_text(editor.schema()), "hello world");

    editor.apply(Transaction::new(outcome.inverse_ops)).unwrap();
    assert_eq!(editor.doc(), &before);
}

#[test]
fn selection_only_transaction_does_not_change_the_document() {
    let mut editor = Editor::with_document(
        Document::new(vec![Node::paragraph("hello")]),
        PluginRegistry::notes(),
    )
    .unwrap();

    let outcome = editor
        .apply(
            Transaction::new(Vec::new())
                .selection_after(Selection::collapsed(Point::new(vec![0, 0], 3))),
        )
        .unwrap();

    assert!(!outcome.doc_changed);
    assert!(outcome.selection_changed);
    assert_eq!(editor.selection_range(), (4, 4));
}

#[test]
fn out_of_range_attrs_are_clamped() {
    let doc = Document::new(vec![
        Node::element(
            "heading",
            Attrs::from([("level".to_string(), Value::from(9))]),
            vec![Node::text("big")],
        ),
        Node::element(
            "paragraph",
            Attrs::from([("align".to_string(), Value::from("sideways"))]),
            vec![Node::text("p")],
        ),
        Node::element(
            "ordered_list",
            Attrs::from([("order".to_string(), Value::from(0))]),
            vec![item(vec![Node::paragraph("one")])],
        ),
    ]);
    let editor = Editor::with_document(doc, PluginRegistry::notes()).unwrap();

    let attr = |ix: usize, name: &str| editor.doc().children[ix].attrs().and_then(|a| a.get(name)).cloned();
    assert_eq!(attr(0, "level"), Some(Value::from(6)));
    assert_eq!(attr(1, "align"), Some(Value::from("left")));
    assert_eq!(attr(2, "order"), Some(Value::from(1)));
}

struct FlipAlign;

impl NormalizePass for FlipAlign {
    fn id(&self) -> &'static str {
        "test.flip_align"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let next = match doc.children[0].attrs().and_then(|a| a.get("align")) {
            Some(Value::String(align)) if align == "center" => "right",
            _ => "center",
        };
        vec![Op::SetNodeAttrs {
            path: vec![0],
            patch: AttrPatch::set("align", Value::from(next)),
        }]
    }
}

struct FlipAlignPlugin;

impl NotePlugin for FlipAlignPlugin {
    fn id(&self) -> &'static str {
        "test.flip_align"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(FlipAlign)]
    }
}

#[test]
fn normalization_that_never_settles_is_an_error() {
    let mut plugins = PluginRegistry::note_plugins(false);
    plugins.push(Box::new(FlipAlignPlugin));
    let registry = PluginRegistry::new(plugins).unwrap();

    let result = Editor::with_document(Document::new(vec![Node::paragraph("x")]), registry);
    assert!(matches!(result, Err(ApplyError::NormalizeDidNotConverge)));
}

#[test]
fn positions_round_trip_through_points() {
    let editor = Editor::with_document(
        Document::new(vec![
            Node::paragraph("ab"),
            Node::element("blockquote", Attrs::new(), vec![Node::paragraph("cd")]),
        ]),
        PluginRegistry::notes(),
    )
    .unwrap();
    let doc = editor.doc();

    // p(ab) spans 0..4, blockquote opens at 4 and its paragraph at 5.
    let point = doc.point_at_pos(editor.schema(), 7).unwrap();
    assert_eq!(point, Point::new(vec![1, 0, 0], 1));
    assert_eq!(doc.pos_of_point(&point), Some(7));

    // Positions between blocks snap forward to the next textblock.
    let snapped = doc.point_at_pos(editor.schema(), 4).unwrap();
    assert_eq!(snapped, Point::new(vec![1, 0, 0], 0));
}
