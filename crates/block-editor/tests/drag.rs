mod common;

use notes_block_editor::{BridgeState, CrossBlockDrag, EditorHost, PointerButton, PointerTarget};
use pretty_assertions::assert_eq;

use common::{host_with, id, ms, start, text_block, view};

fn three_blocks() -> EditorHost {
    let mut host = host_with("a", "alpha");
    host.mount(&text_block("b", "beta"), view());
    host.mount(&text_block("c", "gamma"), view());
    host
}

fn drag_to(target: &str) -> Option<CrossBlockDrag> {
    Some(CrossBlockDrag {
        origin: id("a"),
        target: id(target),
    })
}

#[test]
fn each_new_target_is_reported_once() {
    let mut host = three_blocks();
    let now = start();
    host.pointer_down(PointerTarget::Block(id("a")), PointerButton::Primary);

    let path = [
        (0, Some("a")),
        (5, Some("b")),
        (20, Some("b")),
        (40, Some("b")),
        (150, Some("b")),
        (160, Some("c")),
        (170, None),
        (180, Some("b")),
    ];
    let reported: Vec<_> = path
        .into_iter()
        .map(|(at, hovered)| host.pointer_move(now + ms(at), hovered.map(id).as_ref()))
        .collect();

    assert_eq!(
        reported,
        vec![None, drag_to("b"), None, None, None, drag_to("c"), None, drag_to("b")]
    );
    assert_eq!(
        host.context().bridge.state(),
        &BridgeState::CrossBlockDragging {
            origin: id("a"),
            target: id("b")
        }
    );
}

#[test]
fn releasing_returns_focus_to_the_origin() {
    let mut host = three_blocks();
    let now = start();
    host.pointer_down(PointerTarget::Block(id("a")), PointerButton::Primary);
    host.pointer_move(now, Some(&id("c")));

    host.pointer_up(now + ms(30));

    assert!(!host.context().drag.is_active());
    assert_eq!(
        host.context().bridge.state(),
        &BridgeState::EngineFocused { block: id("a") }
    );
    assert_eq!(host.context().scheduler.len(), 1);
    assert_eq!(host.pointer_move(now + ms(40), Some(&id("b"))), None);
}

#[test]
fn only_primary_presses_start_a_drag() {
    let mut host = three_blocks();
    let now = start();

    host.pointer_down(PointerTarget::Block(id("a")), PointerButton::Secondary);

    assert_eq!(host.pointer_move(now, Some(&id("b"))), None);
    assert_eq!(
        host.context().bridge.state(),
        &BridgeState::EngineFocused { block: id("a") }
    );
}
