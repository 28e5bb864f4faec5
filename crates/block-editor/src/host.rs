use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

use notes_editor_core::{DispatchOutcome, FormatCommand, LinkPrompt, SkipReason};
use tracing::{debug, trace, warn};

use crate::{
    Block, BlockEditor, BlockId, BridgeConfig, CrossBlockDrag, DragDetector, EditorEvent,
    EngineView, FocusRegistry, FormatFn, PointerButton, PointerTarget, Scheduler,
    SelectionBridge,
};

/// Services shared by the block editors of one note.
#[derive(Debug)]
pub struct EditorContext {
    pub config: BridgeConfig,
    pub registry: FocusRegistry,
    pub bridge: SelectionBridge,
    pub scheduler: Scheduler,
    pub drag: DragDetector,
}

impl EditorContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            drag: DragDetector::new(config.drag_throttle()),
            config,
            registry: FocusRegistry::new(),
            bridge: SelectionBridge::new(),
            scheduler: Scheduler::new(),
        }
    }
}

impl Default for EditorContext {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

/// Owns the block editors of one note and routes host events to them.
pub struct EditorHost {
    ctx: EditorContext,
    editors: BTreeMap<BlockId, Rc<RefCell<BlockEditor>>>,
    read_only: bool,
}

impl Default for EditorHost {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl EditorHost {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            ctx: EditorContext::new(config),
            editors: BTreeMap::new(),
            read_only: false,
        }
    }

    pub fn context(&self) -> &EditorContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EditorContext {
        &mut self.ctx
    }

    pub fn editor(&self, block: &BlockId) -> Option<Rc<RefCell<BlockEditor>>> {
        self.editors.get(block).cloned()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = &BlockId> {
        self.editors.keys()
    }

    /// Creates the editor for `block` and registers its format handler.
    /// A block mounted twice replaces its previous editor.
    pub fn mount(&mut self, block: &Block, view: Box<dyn EngineView>) -> Rc<RefCell<BlockEditor>> {
        self.unmount(&block.id);

        let editor = Rc::new(RefCell::new(BlockEditor::new(
            block.id.clone(),
            block.editor_props(self.read_only),
            view,
        )));
        let weak = Rc::downgrade(&editor);
        let handler: FormatFn = Rc::new(move |command: &FormatCommand, prompt: &mut dyn LinkPrompt| {
            let Some(editor) = weak.upgrade() else {
                return DispatchOutcome::Skipped(SkipReason::NoEditor);
            };
            let Ok(mut editor) = editor.try_borrow_mut() else {
                warn!(command = command.name(), "editor busy; dropping format command");
                return DispatchOutcome::Skipped(SkipReason::NoEditor);
            };
            editor.apply_format(command, prompt)
        });
        self.ctx.registry.register(block.id.clone(), handler);
        self.editors.insert(block.id.clone(), editor.clone());
        editor
    }

    pub fn unmount(&mut self, block: &BlockId) -> bool {
        let Some(editor) = self.editors.remove(block) else {
            return false;
        };
        editor.borrow_mut().destroy(&mut self.ctx);
        true
    }

    /// Rebuilds every editor for the new mode.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        for editor in self.editors.values() {
            editor.borrow_mut().set_read_only(read_only);
        }
    }

    pub fn focus(&mut self, block: &BlockId) {
        self.with_editor(block, |editor, ctx| editor.focus(ctx));
    }

    pub fn blur(&mut self, block: &BlockId, target: crate::BlurTarget, now: Instant) {
        self.with_editor(block, |editor, ctx| editor.blur(target, now, ctx));
    }

    /// Document-level pointer-down. Every editor the pointer is outside of
    /// drops its selection and focus, unless the pointer is on the toolbar,
    /// which instead marks a format as in flight. Any other press ends a
    /// toolbar interaction that applied nothing. A primary press inside a
    /// block starts drag tracking.
    pub fn pointer_down(&mut self, target: PointerTarget, button: PointerButton) {
        if target == PointerTarget::Toolbar {
            self.ctx.bridge.begin_format();
            return;
        }
        if self.ctx.bridge.format_in_progress() {
            debug!("toolbar interaction ended without a format");
            self.ctx.bridge.end_format();
        }

        let inside = match &target {
            PointerTarget::Block(block) => Some(block.clone()),
            _ => None,
        };
        for (id, editor) in &self.editors {
            if Some(id) != inside.as_ref() {
                editor.borrow_mut().clear_selection(&mut self.ctx);
            }
        }
        if inside.is_none() {
            self.ctx.bridge.clear();
        }

        match inside {
            Some(block) if button == PointerButton::Primary => self.ctx.drag.begin(block),
            _ => {}
        }
    }

    /// Pointer-move during a drag; `hovered` is the block under the pointer.
    pub fn pointer_move(&mut self, now: Instant, hovered: Option<&BlockId>) -> Option<CrossBlockDrag> {
        let drag = self.ctx.drag.sample(now, hovered)?;
        self.ctx.bridge.cross_block(&drag);
        Some(drag)
    }

    /// Keyboard selection extension in `block`.
    pub fn extend_selection(&mut self, block: &BlockId, anchor: usize, focus: usize, now: Instant) {
        self.with_editor(block, |editor, ctx| editor.extend_selection(anchor, focus, now, ctx));
    }

    /// Ends any drag and schedules a selection read in the block it started in,
    /// or in the focused block.
    pub fn pointer_up(&mut self, now: Instant) {
        let origin = self.ctx.drag.end();
        self.ctx.bridge.end_drag();
        let block = origin.or_else(|| self.ctx.registry.focused().cloned());
        if let Some(block) = block {
            self.with_editor(&block, |editor, ctx| editor.pointer_up(now, ctx));
        }
    }

    /// Formats whichever block holds the focused pointer.
    pub fn format_focused(&mut self, command: &FormatCommand, prompt: &mut dyn LinkPrompt) -> DispatchOutcome {
        let outcome = match self.ctx.registry.focused_handler() {
            Some((block, handler)) => {
                debug!(block_id = %block, command = command.name(), "formatting focused block");
                handler(command, prompt)
            }
            None => {
                debug!(command = command.name(), "no focused block to format");
                DispatchOutcome::Skipped(SkipReason::NoEditor)
            }
        };
        self.ctx.bridge.end_format();
        outcome
    }

    /// Runs the deferred tasks due at `now`. Returns how many ran.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let tasks = self.ctx.scheduler.run_due(now);
        let mut ran = 0;
        for task in tasks {
            let Some(editor) = self.editors.get(task.block()).cloned() else {
                trace!(?task, "task for an unmounted block");
                continue;
            };
            editor.borrow_mut().run_task(task, &mut self.ctx);
            ran += 1;
        }
        ran
    }

    /// Collects pending notifications from every editor.
    pub fn drain_events(&mut self) -> Vec<(BlockId, EditorEvent)> {
        self.editors
            .iter()
            .flat_map(|(id, editor)| {
                editor
                    .borrow_mut()
                    .take_events()
                    .into_iter()
                    .map(|event| (id.clone(), event))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn with_editor(&mut self, block: &BlockId, f: impl FnOnce(&mut BlockEditor, &mut EditorContext)) {
        match self.editors.get(block) {
            Some(editor) => f(&mut editor.borrow_mut(), &mut self.ctx),
            None => debug!(block_id = %block, "event for an unmounted block"),
        }
    }
}
