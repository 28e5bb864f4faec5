use notes_editor_core::{
    Attrs, Document, Editor, MarkType, Marks, Node, NoPrompt, PluginRegistry, Point, Selection,
    DispatchOutcome, FormatCommand, dispatch,
};
use pretty_assertions::assert_eq;

fn editor(children: Vec<Node>) -> Editor {
    Editor::with_document(Document::new(children), PluginRegistry::notes()).unwrap()
}

fn inline(editor: &Editor, path: &[usize]) -> Vec<Node> {
    let Some(Node::Element(el)) = editor.doc().node(path) else {
        panic!("expected element at {path:?}");
    };
    el.children.clone()
}

fn bold() -> Marks {
    Marks::default().with(MarkType::Bold, None)
}

fn link() -> Marks {
    Marks::default().with(MarkType::Link, Some("https://docs.test".to_string()))
}

#[test]
fn typing_into_an_empty_paragraph() {
    let mut editor = Editor::empty(PluginRegistry::notes()).unwrap();

    let outcome = editor.insert_text("hello").unwrap();

    assert!(outcome.doc_changed);
    assert_eq!(inline(&editor, &[0]), vec![Node::text("hello")]);
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 5)));
}

#[test]
fn typing_after_a_link_does_not_extend_it() {
    let mut editor = editor(vec![Node::element(
        "paragraph",
        Attrs::new(),
        vec![Node::text("see "), Node::marked("docs", link())],
    )]);
    editor.set_selection_range(9, 9);

    editor.insert_text("!").unwrap();

    assert_eq!(
        inline(&editor, &[0]),
        vec![Node::text("see "), Node::marked("docs", link()), Node::text("!")]
    );
    assert_eq!(editor.selection_range(), (10, 10));
}

#[test]
fn typing_inside_bold_text_stays_bold() {
    let mut editor = editor(vec![Node::element(
        "paragraph",
        Attrs::new(),
        vec![Node::marked("strong", bold())],
    )]);
    editor.set_selection_range(7, 7);

    editor.insert_text("er").unwrap();

    assert_eq!(inline(&editor, &[0]), vec![Node::marked("stronger", bold())]);
}

#[test]
fn collapsed_bold_toggle_applies_to_typed_text() {
    let mut editor = Editor::empty(PluginRegistry::notes()).unwrap();

    let outcome = dispatch(&mut editor, &FormatCommand::Bold, &mut NoPrompt);
    assert_eq!(outcome, DispatchOutcome::Applied { doc_changed: false });
    assert_eq!(editor.stored_marks(), Some(&bold()));
    assert_eq!(editor.active_marks(), bold());

    editor.insert_text("hi").unwrap();

    assert_eq!(inline(&editor, &[0]), vec![Node::marked("hi", bold())]);
    assert_eq!(editor.stored_marks(), None);
    assert_eq!(editor.active_marks(), bold());
}

#[test]
fn moving_the_caret_drops_stored_marks() {
    let mut editor = editor(vec![Node::paragraph("abc")]);
    dispatch(&mut editor, &FormatCommand::Italic, &mut NoPrompt);
    assert!(editor.stored_marks().is_some());

    editor.set_selection_range(2, 2);

    assert_eq!(editor.stored_marks(), None);
}

#[test]
fn typing_replaces_a_multi_block_selection() {
    let mut editor = editor(vec![Node::paragraph("ab"), Node::paragraph("cd")]);
    editor.select_all();
    assert!(editor.is_full_selection());
    assert_eq!(editor.selected_text(), "ab\ncd");

    editor.insert_text("x").unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(editor.doc().plain_text(editor.schema()), "x");
}

#[test]
fn delete_backward_removes_one_character() {
    let mut editor = editor(vec![Node::paragraph("héllo")]);
    // "h" is one byte and "é" two, so the caret after "é" sits at 1 + 3.
    editor.set_selection_range(4, 4);

    editor.delete_backward().unwrap();

    assert_eq!(editor.doc().plain_text(editor.schema()), "hllo");
    assert_eq!(editor.selection_range(), (2, 2));
}

#[test]
fn delete_backward_at_block_start_joins_blocks() {
    let mut editor = editor(vec![Node::paragraph("ab"), Node::heading(2, "cd")]);
    editor.set_selection_range(5, 5);

    editor.delete_backward().unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(editor.doc().children[0].kind(), "paragraph");
    assert_eq!(inline(&editor, &[0]), vec![Node::text("abcd")]);
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 2)));
}

#[test]
fn delete_backward_at_document_start_is_a_no_op() {
    let mut editor = editor(vec![Node::paragraph("ab")]);
    editor.set_selection_range(1, 1);

    let outcome = editor.delete_backward().unwrap();

    assert!(!outcome.doc_changed);
    assert_eq!(editor.doc().plain_text(editor.schema()), "ab");
}

#[test]
fn deleting_out_of_a_list_removes_the_emptied_list() {
    let mut editor = editor(vec![
        Node::paragraph("ab"),
        Node::element(
            "bullet_list",
            Attrs::new(),
            vec![Node::element("list_item", Attrs::new(), vec![Node::paragraph("cd")])],
        ),
    ]);
    // p(ab) = 0..4, list opens at 4, item at 5, paragraph at 6; "c" starts at 7.
    editor.set_selection_range(2, 8);

    editor.delete_selection().unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(inline(&editor, &[0]), vec![Node::text("ad")]);
}

#[test]
fn enter_splits_a_paragraph() {
    let mut editor = editor(vec![Node::paragraph("abcd")]);
    editor.set_selection_range(3, 3);

    editor.split_block().unwrap();

    assert_eq!(editor.doc().plain_text(editor.schema()), "ab\ncd");
    assert_eq!(editor.doc().children[1].kind(), "paragraph");
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![1, 0], 0)));
}

#[test]
fn enter_at_the_end_of_a_heading_starts_a_paragraph() {
    let mut editor = editor(vec![Node::heading(2, "Title")]);
    editor.set_selection_range(6, 6);

    editor.split_block().unwrap();

    assert_eq!(editor.doc().children[0].kind(), "heading");
    assert_eq!(editor.doc().children[1].kind(), "paragraph");
}

#[test]
fn enter_in_the_middle_of_a_heading_keeps_the_level() {
    let mut editor = editor(vec![Node::heading(3, "Title")]);
    editor.set_selection_range(3, 3);

    editor.split_block().unwrap();

    let second = editor.doc().children[1].as_element().unwrap();
    assert_eq!(second.kind, "heading");
    assert_eq!(second.attr_u64("level"), Some(3));
}

#[test]
fn enter_in_a_list_item_creates_a_new_item() {
    let mut editor = editor(vec![Node::element(
        "bullet_list",
        Attrs::new(),
        vec![Node::element("list_item", Attrs::new(), vec![Node::paragraph("one")])],
    )]);
    editor.set_selection_range(6, 6);

    editor.split_block().unwrap();
    editor.insert_text("two").unwrap();

    let list = editor.doc().children[0].as_element().unwrap();
    assert_eq!(list.children.len(), 2);
    assert_eq!(editor.doc().plain_text(editor.schema()), "one\ntwo");
    assert_eq!(editor.selection().focus.path, vec![0, 1, 0, 0]);
}

#[test]
fn enter_in_a_code_block_inserts_a_newline() {
    let mut editor = editor(vec![Node::element(
        "code_block",
        Attrs::new(),
        vec![Node::text("let x;")],
    )]);
    editor.set_selection_range(7, 7);

    editor.split_block().unwrap();
    editor.insert_text("let y;").unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(inline(&editor, &[0]), vec![Node::text("let x;\nlet y;")]);
}

#[test]
fn shift_enter_inserts_a_hard_break() {
    let mut editor = editor(vec![Node::paragraph("ab")]);
    editor.set_selection_range(2, 2);

    editor.insert_hard_break().unwrap();

    assert_eq!(
        inline(&editor, &[0]),
        vec![Node::text("a"), Node::hard_break(), Node::text("b")]
    );
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 2], 0)));
    assert_eq!(editor.doc().plain_text(editor.schema()), "a\nb");
}
