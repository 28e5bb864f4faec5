//! Selection bridge: the toolbar snapshot and the state machine relating the
//! engine selection, the floating toolbar and cross-block drags.

use serde::Serialize;
use tracing::{debug, trace};

use crate::{BlockId, CrossBlockDrag, EngineView, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub from: usize,
    pub to: usize,
}

impl TextRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// UI-facing projection of a selection that positions the floating toolbar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolbarSelection {
    pub block: BlockId,
    pub text: String,
    pub rect: Rect,
    pub range: TextRange,
    /// The range covers the whole document.
    pub full: bool,
}

impl ToolbarSelection {
    /// Derives the snapshot for `range`, or `None` when nothing is selected.
    ///
    /// A full selection anchors to the top center of the block box; anything
    /// else spans the boxes of its first and last character boundaries.
    pub fn derive(
        block: &BlockId,
        view: &dyn EngineView,
        range: TextRange,
        full: bool,
        text: String,
    ) -> Option<Self> {
        if range.is_empty() {
            return None;
        }
        let block_rect = view.block_rect();
        let rect = if full {
            block_rect.top_center()
        } else {
            match (view.coords_at_pos(range.from), view.coords_at_pos(range.to)) {
                (Some(start), Some(end)) => start.union(&end),
                _ => {
                    debug!(block_id = %block, "selection not laid out; anchoring to block");
                    block_rect.top_center()
                }
            }
        };
        Some(Self {
            block: block.clone(),
            text,
            rect,
            range,
            full,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeState {
    Idle,
    EngineFocused { block: BlockId },
    ToolbarVisible { block: BlockId, snapshot: ToolbarSelection },
    CrossBlockDragging { origin: BlockId, target: BlockId },
}

/// Host-wide selection state machine.
///
/// Also owns the format guard: toolbar interaction marks a format as in
/// flight, and each start bumps an epoch so deferred blur handling can tell
/// whether a format began while it waited.
#[derive(Debug)]
pub struct SelectionBridge {
    state: BridgeState,
    format_in_progress: bool,
    format_epoch: u64,
}

impl Default for SelectionBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionBridge {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Idle,
            format_in_progress: false,
            format_epoch: 0,
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn toolbar(&self) -> Option<&ToolbarSelection> {
        match &self.state {
            BridgeState::ToolbarVisible { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    /// Block the state currently refers to.
    pub fn active_block(&self) -> Option<&BlockId> {
        match &self.state {
            BridgeState::Idle => None,
            BridgeState::EngineFocused { block } | BridgeState::ToolbarVisible { block, .. } => {
                Some(block)
            }
            BridgeState::CrossBlockDragging { origin, .. } => Some(origin),
        }
    }

    pub fn focus(&mut self, block: &BlockId) {
        match &self.state {
            BridgeState::ToolbarVisible { block: shown, .. } if shown == block => {}
            BridgeState::CrossBlockDragging { .. } => {}
            _ => self.transition(BridgeState::EngineFocused {
                block: block.clone(),
            }),
        }
    }

    /// Shows the toolbar for `snapshot`; an empty range hides it instead.
    pub fn show_toolbar(&mut self, snapshot: ToolbarSelection) {
        if snapshot.range.is_empty() {
            let block = snapshot.block;
            self.hide_toolbar(&block);
            return;
        }
        self.transition(BridgeState::ToolbarVisible {
            block: snapshot.block.clone(),
            snapshot,
        });
    }

    pub fn hide_toolbar(&mut self, block: &BlockId) {
        if matches!(&self.state, BridgeState::ToolbarVisible { block: shown, .. } if shown == block)
        {
            self.transition(BridgeState::EngineFocused {
                block: block.clone(),
            });
        }
    }

    pub fn cross_block(&mut self, drag: &CrossBlockDrag) {
        self.transition(BridgeState::CrossBlockDragging {
            origin: drag.origin.clone(),
            target: drag.target.clone(),
        });
    }

    /// Ends a cross-block drag; focus stays with the origin block.
    pub fn end_drag(&mut self) {
        if let BridgeState::CrossBlockDragging { origin, .. } = &self.state {
            let block = origin.clone();
            self.transition(BridgeState::EngineFocused { block });
        }
    }

    /// Returns to `Idle` if the state refers to `block`.
    pub fn release(&mut self, block: &BlockId) {
        let refers = match &self.state {
            BridgeState::Idle => false,
            BridgeState::EngineFocused { block: b } | BridgeState::ToolbarVisible { block: b, .. } => {
                b == block
            }
            BridgeState::CrossBlockDragging { origin, target } => origin == block || target == block,
        };
        if refers {
            self.transition(BridgeState::Idle);
        }
    }

    pub fn clear(&mut self) {
        self.transition(BridgeState::Idle);
    }

    pub fn begin_format(&mut self) {
        self.format_in_progress = true;
        self.format_epoch += 1;
        trace!(epoch = self.format_epoch, "format started");
    }

    pub fn end_format(&mut self) {
        self.format_in_progress = false;
    }

    pub fn format_in_progress(&self) -> bool {
        self.format_in_progress
    }

    pub fn format_epoch(&self) -> u64 {
        self.format_epoch
    }

    /// Whether a format is in flight or started after `epoch` was read.
    pub fn format_started_since(&self, epoch: u64) -> bool {
        self.format_in_progress || self.format_epoch != epoch
    }

    fn transition(&mut self, next: BridgeState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "selection bridge transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl EngineView for Fixed {
        fn coords_at_pos(&self, pos: usize) -> Option<Rect> {
            (pos < 100).then(|| Rect::new(pos as f32 * 8.0, 10.0, 1.0, 16.0))
        }

        fn block_rect(&self) -> Rect {
            Rect::new(0.0, 0.0, 800.0, 40.0)
        }
    }

    fn snapshot(from: usize, to: usize, full: bool) -> Option<ToolbarSelection> {
        ToolbarSelection::derive(
            &BlockId::from("a"),
            &Fixed,
            TextRange::new(from, to),
            full,
            String::new(),
        )
    }

    #[test]
    fn derive_rules() {
        assert_eq!(snapshot(3, 3, false), None);
        assert_eq!(
            snapshot(2, 5, false).map(|s| s.rect),
            Some(Rect::new(16.0, 10.0, 25.0, 16.0))
        );
        assert_eq!(
            snapshot(1, 6, true).map(|s| s.rect),
            Some(Rect::new(400.0, 0.0, 0.0, 0.0))
        );
        assert_eq!(
            snapshot(1, 200, false).map(|s| s.rect),
            Some(Rect::new(400.0, 0.0, 0.0, 0.0))
        );
    }

    #[test]
    fn format_epoch_detects_formats_started_during_a_wait() {
        let mut bridge = SelectionBridge::new();
        let epoch = bridge.format_epoch();
        assert!(!bridge.format_started_since(epoch));

        bridge.begin_format();
        assert!(bridge.format_started_since(epoch));
        bridge.end_format();
        assert!(bridge.format_started_since(epoch));
        assert!(!bridge.format_started_since(bridge.format_epoch()));
    }
}
