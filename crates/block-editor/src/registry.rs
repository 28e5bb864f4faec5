use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use notes_editor_core::{DispatchOutcome, FormatCommand, LinkPrompt};
use tracing::{debug, warn};

use crate::BlockId;

/// Format entry point a mounted block registers.
pub type FormatFn = Rc<dyn Fn(&FormatCommand, &mut dyn LinkPrompt) -> DispatchOutcome>;

/// Maps mounted blocks to their format entry points and tracks which block
/// has focus, so a shared toolbar can format "the focused block" without
/// holding a reference to it.
///
/// One registry lives in each host; entries exist only while blocks are mounted.
#[derive(Default)]
pub struct FocusRegistry {
    handlers: BTreeMap<BlockId, FormatFn>,
    focused: Option<BlockId>,
}

impl fmt::Debug for FocusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusRegistry")
            .field("blocks", &self.handlers.keys().collect::<Vec<_>>())
            .field("focused", &self.focused)
            .finish()
    }
}

impl FocusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, block: BlockId, handler: FormatFn) {
        debug!(block_id = %block, "format handler registered");
        self.handlers.insert(block, handler);
    }

    pub fn unregister(&mut self, block: &BlockId) -> bool {
        self.handlers.remove(block).is_some()
    }

    pub fn is_registered(&self, block: &BlockId) -> bool {
        self.handlers.contains_key(block)
    }

    pub fn handler(&self, block: &BlockId) -> Option<FormatFn> {
        self.handlers.get(block).cloned()
    }

    pub fn set_focused(&mut self, block: &BlockId) {
        if !self.is_registered(block) {
            warn!(block_id = %block, "focusing a block without a format handler");
        }
        self.focused = Some(block.clone());
    }

    pub fn focused(&self) -> Option<&BlockId> {
        self.focused.as_ref()
    }

    /// Clears the focused pointer only if it still points at `block`.
    pub fn clear_focused_if_matches(&mut self, block: &BlockId) -> bool {
        if self.focused.as_ref() == Some(block) {
            self.focused = None;
            return true;
        }
        false
    }

    /// Handler of the focused block.
    pub fn focused_handler(&self) -> Option<(BlockId, FormatFn)> {
        let block = self.focused.as_ref()?;
        Some((block.clone(), self.handler(block)?))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
