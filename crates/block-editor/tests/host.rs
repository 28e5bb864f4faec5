mod common;

use std::rc::Rc;

use notes_block_editor::{
    BlockId, ChangePatch, EditorEvent, EditorHost, FocusRegistry, FormatFn, Lifecycle,
};
use notes_editor_core::{DispatchOutcome, FormatCommand, NoPrompt, SkipReason};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{events_for, host_with, id, ms, start, text_block, view};

fn skip_with(reason: SkipReason) -> FormatFn {
    Rc::new(move |_: &FormatCommand, _: &mut dyn notes_editor_core::LinkPrompt| {
        DispatchOutcome::Skipped(reason)
    })
}

#[test]
fn registry_tracks_handlers_and_focus() {
    let mut registry = FocusRegistry::new();
    registry.register(id("a"), skip_with(SkipReason::Cancelled));
    registry.register(id("b"), skip_with(SkipReason::Rejected));

    assert_eq!(registry.len(), 2);
    assert!(registry.focused_handler().is_none());

    registry.set_focused(&id("b"));
    let (block, handler) = registry.focused_handler().unwrap();
    assert_eq!(block, id("b"));
    assert_eq!(
        handler(&FormatCommand::Bold, &mut NoPrompt),
        DispatchOutcome::Skipped(SkipReason::Rejected)
    );

    assert!(!registry.clear_focused_if_matches(&id("a")));
    assert_eq!(registry.focused(), Some(&id("b")));
    assert!(registry.clear_focused_if_matches(&id("b")));
    assert_eq!(registry.focused(), None);

    assert!(registry.unregister(&id("a")));
    assert!(!registry.unregister(&id("a")));
    assert!(!registry.is_registered(&id("a")));
}

#[test]
fn toolbar_formats_only_the_focused_block() {
    let mut host = host_with("a", "alpha");
    host.mount(&text_block("b", "beta"), view());
    host.focus(&id("b"));
    host.editor(&id("b")).unwrap().borrow_mut().set_selection_range(1, 5);

    let outcome = host.format_focused(&FormatCommand::Underline, &mut NoPrompt);

    assert_eq!(outcome, DispatchOutcome::Applied { doc_changed: true });
    let events = host.drain_events();
    assert!(events.iter().all(|(block, _)| *block == id("b")));
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0].1,
        EditorEvent::Change {
            patch: Some(ChangePatch::FormatChanged { .. }),
            ..
        }
    ));
    assert_eq!(
        events[1].1,
        EditorEvent::FormatChange {
            command: "underline".into(),
            value: None
        }
    );
    let a = host.editor(&id("a")).unwrap();
    assert_eq!(a.borrow().plain_text(), "alpha");
    assert_eq!(
        a.borrow().to_json().unwrap()["content"][0]["content"][0],
        json!({"type": "text", "text": "alpha"})
    );
}

#[test]
fn formatting_without_focus_is_skipped() {
    let mut host = EditorHost::default();
    host.mount(&text_block("a", "alpha"), view());

    assert_eq!(
        host.format_focused(&FormatCommand::Bold, &mut NoPrompt),
        DispatchOutcome::Skipped(SkipReason::NoEditor)
    );
    assert!(host.drain_events().is_empty());
}

#[test]
fn valued_marks_report_their_value() {
    let mut host = host_with("a", "alpha");
    host.editor(&id("a")).unwrap().borrow_mut().set_selection_range(1, 6);

    let outcome = host.format_focused(&FormatCommand::FontSize("18px".into()), &mut NoPrompt);

    assert_eq!(outcome, DispatchOutcome::Applied { doc_changed: true });
    let events = events_for(&mut host, "a");
    assert_eq!(
        events.last(),
        Some(&EditorEvent::FormatChange {
            command: "fontSize".into(),
            value: Some(json!("18px"))
        })
    );
}

#[test]
fn links_use_the_prompt_and_honor_cancellation() {
    let mut host = host_with("a", "alpha");
    host.editor(&id("a")).unwrap().borrow_mut().set_selection_range(1, 6);

    let mut cancel = || -> Option<String> { None };
    assert_eq!(
        host.format_focused(&FormatCommand::Link(None), &mut cancel),
        DispatchOutcome::Skipped(SkipReason::Cancelled)
    );

    let mut answer = || Some("https://example.test".to_string());
    assert_eq!(
        host.format_focused(&FormatCommand::Link(None), &mut answer),
        DispatchOutcome::Applied { doc_changed: true }
    );
    let json = host.editor(&id("a")).unwrap().borrow().to_json().unwrap();
    assert_eq!(
        json["content"][0]["content"][0]["marks"],
        json!([{"type": "link", "attrs": {"href": "https://example.test"}}])
    );
}

#[test]
fn unmounting_unregisters_and_cancels_deferred_work() {
    let mut host = host_with("a", "alpha");
    let now = start();
    host.pointer_up(now);
    let stale = host.context().registry.handler(&id("a")).unwrap();
    assert_eq!(host.context().scheduler.len(), 1);

    assert!(host.unmount(&id("a")));
    assert!(!host.unmount(&id("a")));

    assert!(!host.context().registry.is_registered(&id("a")));
    assert_eq!(host.context().registry.focused(), None);
    assert_eq!(host.run_due(now + ms(50)), 0);
    assert_eq!(
        stale(&FormatCommand::Bold, &mut NoPrompt),
        DispatchOutcome::Skipped(SkipReason::NoEditor)
    );
    assert_eq!(
        host.format_focused(&FormatCommand::Bold, &mut NoPrompt),
        DispatchOutcome::Skipped(SkipReason::NoEditor)
    );
}

#[test]
fn a_kept_editor_handle_is_torn_down_on_unmount() {
    let mut host = host_with("a", "alpha");
    let kept = host.editor(&id("a")).unwrap();

    host.unmount(&id("a"));

    assert_eq!(kept.borrow().lifecycle(), Lifecycle::Destroyed);
    assert_eq!(kept.borrow().to_json(), None);
}

#[test]
fn remounting_replaces_the_editor() {
    let mut host = host_with("a", "alpha");
    let first = host.editor(&id("a")).unwrap();

    host.mount(&text_block("a", "again"), view());

    assert_eq!(first.borrow().lifecycle(), Lifecycle::Destroyed);
    let second = host.editor(&id("a")).unwrap();
    assert_eq!(second.borrow().plain_text(), "again");
    assert!(host.context().registry.is_registered(&id("a")));
    assert_eq!(host.block_ids().collect::<Vec<&BlockId>>(), vec![&id("a")]);
}

#[test]
fn read_only_mode_applies_to_every_editor() {
    let mut host = host_with("a", "alpha");
    host.mount(&text_block("b", "beta"), view());

    host.set_read_only(true);

    for block in ["a", "b"] {
        let editor = host.editor(&id(block)).unwrap();
        assert!(editor.borrow().is_read_only());
        assert_eq!(editor.borrow().rebuild_count(), 1);
    }
    assert_eq!(
        host.format_focused(&FormatCommand::Bold, &mut NoPrompt),
        DispatchOutcome::Skipped(SkipReason::ReadOnly)
    );

    host.mount(&text_block("c", "gamma"), view());
    assert!(host.editor(&id("c")).unwrap().borrow().is_read_only());
}
