mod common;

use notes_block_editor::{
    Block, BlockAdapter, BlockContent, BlockType, ChangePatch, EditorEvent, LocalEdit,
};
use notes_editor_core::{FormatCommand, NoPrompt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{host_with, id, ms, start, view};

fn feed(adapter: &mut BlockAdapter, events: Vec<(notes_block_editor::BlockId, EditorEvent)>) -> usize {
    events
        .iter()
        .filter(|(block, event)| *block == adapter.block().id && adapter.apply_event(event))
        .count()
}

#[test]
fn typed_heading_marker_retags_the_stored_block() {
    let mut host = host_with("a", "");
    let mut adapter = BlockAdapter::new(Block::new("a", BlockType::Text, Value::Null));
    let editor = host.editor(&id("a")).unwrap();

    editor.borrow_mut().handle_input(LocalEdit::InsertText("## ".into()));
    editor.borrow_mut().handle_input(LocalEdit::InsertText("Title".into()));
    let applied = feed(&mut adapter, host.drain_events());

    assert_eq!(applied, 3);
    assert_eq!(adapter.revision(), 3);
    let block = adapter.block();
    assert_eq!(block.block_type, BlockType::Heading(2));
    assert_eq!(block.metadata.get("level"), Some(&json!(2)));
    assert_eq!(
        block.content,
        json!({"type": "doc", "content": [{
            "type": "heading",
            "attrs": {"level": 2},
            "content": [{"type": "text", "text": "Title"}]
        }]})
    );
}

#[test]
fn list_markers_set_the_list_type() {
    let mut host = host_with("a", "");
    let mut adapter = BlockAdapter::new(Block::new("a", BlockType::Heading(1), Value::Null));
    adapter.apply_change(
        json!({"type": "doc"}),
        Some(&ChangePatch::BlockTypeChanged {
            new_block_type: BlockType::Heading(1),
        }),
    );
    assert_eq!(adapter.block().metadata.get("level"), Some(&json!(1)));

    host.editor(&id("a"))
        .unwrap()
        .borrow_mut()
        .handle_input(LocalEdit::InsertText("1. ".into()));
    feed(&mut adapter, host.drain_events());

    let block = adapter.block();
    assert_eq!(block.block_type, BlockType::Numbered);
    assert_eq!(block.metadata.get("list_type"), Some(&json!("numbered")));
    assert_eq!(block.metadata.get("level"), None);
}

#[test]
fn format_changes_are_recorded_in_metadata() {
    let mut host = host_with("a", "alpha");
    let mut adapter = BlockAdapter::new(Block::new("a", BlockType::Text, json!("alpha")));
    host.editor(&id("a")).unwrap().borrow_mut().set_selection_range(1, 6);

    host.format_focused(&FormatCommand::BackgroundColor("yellow".into()), &mut NoPrompt);
    let applied = feed(&mut adapter, host.drain_events());

    assert_eq!(applied, 1);
    assert_eq!(
        adapter.block().metadata.get("format"),
        Some(&json!({"command": "backgroundColor", "value": "yellow"}))
    );
    assert_eq!(adapter.block().block_type, BlockType::Text);
}

#[test]
fn selection_events_leave_the_block_alone() {
    let mut host = host_with("a", "alpha");
    let now = start();
    let mut adapter = BlockAdapter::new(Block::new("a", BlockType::Text, json!("alpha")));
    host.editor(&id("a")).unwrap().borrow_mut().set_selection_range(1, 4);
    host.pointer_up(now);
    host.run_due(now + ms(10));

    assert_eq!(feed(&mut adapter, host.drain_events()), 0);
    assert_eq!(adapter.block().content, json!("alpha"));
    assert_eq!(adapter.revision(), 0);
}

#[test]
fn stored_blocks_deserialize_into_editor_props() {
    let block: Block = serde_json::from_value(json!({
        "id": "b7",
        "type": "heading2",
        "content": "Agenda",
    }))
    .unwrap();

    assert_eq!(block.block_type, BlockType::Heading(2));
    assert!(block.metadata.is_empty());
    let props = block.editor_props(true);
    assert_eq!(props.content, BlockContent::Text("Agenda".into()));
    assert!(props.read_only);

    let stored = serde_json::to_value(&block).unwrap();
    assert_eq!(stored["type"], "heading2");
    assert_eq!(stored["id"], "b7");
}

#[test]
fn blocks_round_trip_through_a_mounted_editor() {
    let mut host = host_with("a", "");
    let stored = Block::new("n1", BlockType::Quote, Value::Null);
    let editor = host.mount(&stored, view());

    let json = editor.borrow().to_json().unwrap();
    let reopened = Block::new("n2", BlockType::Text, json.clone());
    let again = host.mount(&reopened, view());

    assert_eq!(again.borrow().to_json(), Some(json));
    assert_eq!(again.borrow().plain_text(), "");
}
