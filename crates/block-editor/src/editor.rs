//! One rich-text editor per text-bearing block, and its lifecycle:
//! `Uninitialized -> Ready -> Destroyed`.

use std::time::Instant;

use notes_editor_core::{
    ApplyError, DispatchOutcome, Editor, FormatCommand, LinkPrompt, Marks, PluginRegistry,
    SkipReason, TransactionOutcome, dispatch,
};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::content::empty_document;
use crate::{
    BlockContent, BlockId, BlockType, BlurTarget, CancellationToken, ChangePatch, DeferredTask,
    EditorContext, EngineView, TaskId, TextRange, ToolbarSelection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Destroyed,
}

/// Inputs the block list passes to an editor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorProps {
    pub content: BlockContent,
    /// Only picks the shape of an empty document.
    pub block_type: BlockType,
    pub read_only: bool,
}

impl Default for EditorProps {
    fn default() -> Self {
        Self {
            content: BlockContent::Empty,
            block_type: BlockType::Text,
            read_only: false,
        }
    }
}

/// Notifications for the owning block.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The document changed or was persisted on blur.
    Change {
        json: Value,
        patch: Option<ChangePatch>,
    },
    /// New toolbar snapshot; `None` hides the toolbar.
    SelectionChange(Option<ToolbarSelection>),
    FormatChange {
        command: String,
        value: Option<Value>,
    },
}

/// A local input for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEdit {
    InsertText(String),
    DeleteBackward,
    DeleteSelection,
    SplitBlock,
    HardBreak,
}

pub struct BlockEditor {
    id: BlockId,
    lifecycle: Lifecycle,
    engine: Option<Editor>,
    block_type: BlockType,
    read_only: bool,
    view: Box<dyn EngineView>,
    lifetime: CancellationToken,
    engine_selection: Option<TextRange>,
    toolbar: Option<ToolbarSelection>,
    format_state: Option<Marks>,
    blur_tasks: Vec<TaskId>,
    events: Vec<EditorEvent>,
    rebuilds: usize,
}

impl BlockEditor {
    pub fn new(id: BlockId, props: EditorProps, view: Box<dyn EngineView>) -> Self {
        let mut editor = Self {
            id,
            lifecycle: Lifecycle::Uninitialized,
            engine: None,
            block_type: props.block_type.clone(),
            read_only: props.read_only,
            view,
            lifetime: CancellationToken::new(),
            engine_selection: None,
            toolbar: None,
            format_state: None,
            blur_tasks: Vec::new(),
            events: Vec::new(),
            rebuilds: 0,
        };
        editor.engine = editor.build_engine(&props.content);
        if editor.engine.is_some() {
            editor.lifecycle = Lifecycle::Ready;
        }
        editor
    }

    /// Parses `content` into a fresh engine. Content that does not fit falls
    /// back to an empty paragraph; only a failing fallback leaves no engine.
    fn build_engine(&self, content: &BlockContent) -> Option<Editor> {
        let registry = PluginRegistry::for_mode(self.read_only);
        let doc = content.to_document(&self.block_type, registry.schema());
        match Editor::with_document(doc, registry) {
            Ok(engine) => Some(engine),
            Err(error) => {
                warn!(block_id = %self.id, %error, "initial document rejected; starting empty");
                self.fallback_engine()
            }
        }
    }

    fn fallback_engine(&self) -> Option<Editor> {
        let registry = PluginRegistry::for_mode(self.read_only);
        Editor::with_document(empty_document(), registry)
            .inspect_err(|error| error!(block_id = %self.id, %error, "editor failed to initialize"))
            .ok()
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    pub fn engine(&self) -> Option<&Editor> {
        self.engine.as_ref()
    }

    pub fn block_type(&self) -> &BlockType {
        &self.block_type
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// How many times engine state was rebuilt after initialization.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn engine_selection(&self) -> Option<TextRange> {
        self.engine_selection
    }

    pub fn toolbar_selection(&self) -> Option<&ToolbarSelection> {
        self.toolbar.as_ref()
    }

    /// Marks active at the selection, as last shown by the toolbar.
    pub fn format_state(&self) -> Option<&Marks> {
        self.format_state.as_ref()
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_json(&self) -> Option<Value> {
        self.engine.as_ref().map(|engine| engine.doc().to_json())
    }

    pub fn plain_text(&self) -> String {
        self.engine
            .as_ref()
            .map(|engine| engine.doc().plain_text(engine.schema()))
            .unwrap_or_default()
    }

    /// Changes the type hint; existing content is not reformatted.
    pub fn set_block_type(&mut self, block_type: BlockType) {
        self.block_type = block_type;
    }

    /// Applies a local input and reports the change to the block.
    pub fn handle_input(&mut self, edit: LocalEdit) -> bool {
        if self.read_only {
            debug!(block_id = %self.id, ?edit, "ignoring input in read-only editor");
            return false;
        }
        let Some(engine) = self.live_engine_mut() else {
            return false;
        };
        let result = match &edit {
            LocalEdit::InsertText(text) => engine.insert_text(text),
            LocalEdit::DeleteBackward => engine.delete_backward(),
            LocalEdit::DeleteSelection => engine.delete_selection(),
            LocalEdit::SplitBlock => engine.split_block(),
            LocalEdit::HardBreak => engine.insert_hard_break(),
        };
        self.after_transaction(result)
    }

    /// Moves the engine selection to the flat range `anchor..focus`.
    pub fn set_selection_range(&mut self, anchor: usize, focus: usize) {
        let Some(engine) = self.live_engine_mut() else {
            return;
        };
        engine.set_selection_range(anchor, focus);
        self.sync_engine_selection();
    }

    fn after_transaction(&mut self, result: Result<TransactionOutcome, ApplyError>) -> bool {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(block_id = %self.id, %error, "transaction rejected");
                return false;
            }
        };
        if outcome.selection_changed {
            self.sync_engine_selection();
        }
        if !outcome.doc_changed {
            return false;
        }
        self.emit_change(None);
        self.check_block_type();
        true
    }

    /// Reports a first child that no longer matches the block's type, so the
    /// block can retag itself.
    fn check_block_type(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let current = BlockType::of_document(engine.doc());
        if current == self.block_type.signature() {
            return;
        }
        debug!(block_id = %self.id, from = %self.block_type, to = %current, "block type changed");
        self.block_type = current.clone();
        self.emit_change(Some(ChangePatch::BlockTypeChanged {
            new_block_type: current,
        }));
    }

    fn emit_change(&mut self, patch: Option<ChangePatch>) {
        if let Some(json) = self.to_json() {
            self.events.push(EditorEvent::Change { json, patch });
        }
    }

    fn sync_engine_selection(&mut self) {
        self.engine_selection = self.engine.as_ref().map(|engine| {
            let (from, to) = engine.selection_range();
            TextRange::new(from, to)
        });
    }

    fn live_engine_mut(&mut self) -> Option<&mut Editor> {
        if self.lifecycle != Lifecycle::Ready {
            trace!(block_id = %self.id, lifecycle = ?self.lifecycle, "editor not live");
            return None;
        }
        self.engine.as_mut()
    }

    /// Applies a toolbar format command to the current selection.
    pub fn apply_format(&mut self, command: &FormatCommand, prompt: &mut dyn LinkPrompt) -> DispatchOutcome {
        if self.read_only {
            return DispatchOutcome::Skipped(SkipReason::ReadOnly);
        }
        let Some(engine) = self.live_engine_mut() else {
            return DispatchOutcome::Skipped(SkipReason::NoEditor);
        };
        let outcome = dispatch(engine, command, prompt);
        let DispatchOutcome::Applied { doc_changed } = outcome else {
            return outcome;
        };

        self.sync_engine_selection();
        self.format_state = self.engine.as_ref().map(Editor::active_marks);
        if doc_changed {
            self.emit_change(Some(ChangePatch::FormatChanged {
                new_format: command.clone(),
            }));
        }
        self.events.push(EditorEvent::FormatChange {
            command: command.name().to_string(),
            value: command.value(),
        });
        outcome
    }

    /// Replaces the content from outside. The engine is rebuilt only when the
    /// incoming text differs from the current text, so echoes of our own
    /// changes keep the caret. Returns whether a rebuild happened.
    pub fn update_content(&mut self, content: &BlockContent) -> bool {
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };
        if self.lifecycle != Lifecycle::Ready {
            return false;
        }
        let schema = engine.schema();
        if content.plain_text(schema) == engine.doc().plain_text(schema) {
            trace!(block_id = %self.id, "external content matches; keeping engine state");
            return false;
        }
        self.rebuild(content);
        true
    }

    /// Switching modes rebuilds the engine with the mode's plugins.
    pub fn set_read_only(&mut self, read_only: bool) {
        if self.read_only == read_only {
            return;
        }
        self.read_only = read_only;
        let Some(engine) = self.engine.take() else {
            return;
        };
        let registry = PluginRegistry::for_mode(read_only);
        self.engine = match Editor::new(engine.doc().clone(), engine.selection().clone(), registry) {
            Ok(engine) => Some(engine),
            Err(error) => {
                warn!(block_id = %self.id, %error, "document rejected after mode switch; starting empty");
                self.fallback_engine()
            }
        };
        self.rebuilds += 1;
        if self.engine.is_none() {
            self.lifecycle = Lifecycle::Uninitialized;
        }
    }

    fn rebuild(&mut self, content: &BlockContent) {
        debug!(block_id = %self.id, "rebuilding engine from external content");
        self.engine = self.build_engine(content);
        self.rebuilds += 1;
        self.engine_selection = None;
        self.format_state = None;
        if self.toolbar.take().is_some() {
            self.events.push(EditorEvent::SelectionChange(None));
        }
        if self.engine.is_none() {
            self.lifecycle = Lifecycle::Uninitialized;
        }
    }

    pub fn focus(&mut self, ctx: &mut EditorContext) {
        if !self.is_live() {
            return;
        }
        for task in self.blur_tasks.drain(..) {
            ctx.scheduler.cancel(task);
        }
        ctx.registry.set_focused(&self.id);
        ctx.bridge.focus(&self.id);
        self.sync_engine_selection();
    }

    /// Focus left the engine view. Losing focus to the toolbar, or while a
    /// format is in flight, keeps everything. Otherwise the content is
    /// persisted now and the selection cleared after the grace delay.
    pub fn blur(&mut self, target: BlurTarget, now: Instant, ctx: &mut EditorContext) {
        if !self.is_live() {
            return;
        }
        if target == BlurTarget::Toolbar {
            trace!(block_id = %self.id, "blur onto toolbar");
            return;
        }
        if ctx.bridge.format_in_progress() {
            debug!(block_id = %self.id, "blur during format; keeping selection");
            return;
        }

        self.emit_change(None);

        let grace = DeferredTask::BlurGrace {
            block: self.id.clone(),
            format_epoch: ctx.bridge.format_epoch(),
        };
        let release = DeferredTask::ReleaseFocus {
            block: self.id.clone(),
        };
        let config = &ctx.config;
        let grace = ctx.scheduler.schedule(now, config.blur_grace(), &self.lifetime, grace);
        let release = ctx
            .scheduler
            .schedule(now, config.focus_release(), &self.lifetime, release);
        self.blur_tasks.extend([grace, release]);
    }

    /// Pointer released in this editor: read the selection once it settles.
    pub fn pointer_up(&mut self, now: Instant, ctx: &mut EditorContext) {
        self.schedule_settle(now, ctx);
    }

    /// Keyboard selection extension (shift with arrows or home/end). The
    /// toolbar follows once the selection settles.
    pub fn extend_selection(&mut self, anchor: usize, focus: usize, now: Instant, ctx: &mut EditorContext) {
        if !self.is_live() {
            return;
        }
        self.set_selection_range(anchor, focus);
        self.schedule_settle(now, ctx);
    }

    pub fn select_all(&mut self, now: Instant, ctx: &mut EditorContext) {
        let Some(engine) = self.live_engine_mut() else {
            return;
        };
        engine.select_all();
        self.sync_engine_selection();
        self.schedule_settle(now, ctx);
    }

    fn schedule_settle(&mut self, now: Instant, ctx: &mut EditorContext) {
        if !self.is_live() {
            return;
        }
        let task = DeferredTask::SettleSelection {
            block: self.id.clone(),
        };
        ctx.scheduler
            .schedule(now, ctx.config.selection_settle(), &self.lifetime, task);
    }

    /// Pointer-down outside this editor and the toolbar. The editor also
    /// stops being the toolbar's focused block.
    pub fn clear_selection(&mut self, ctx: &mut EditorContext) {
        ctx.registry.clear_focused_if_matches(&self.id);
        let Some(engine) = self.live_engine_mut() else {
            return;
        };
        let start = engine.doc().first_text_pos(engine.schema()).unwrap_or(0);
        if engine.selection_range() != (start, start) {
            engine.set_selection_range(start, start);
        }
        self.engine_selection = None;
        self.format_state = None;
        if self.toolbar.take().is_some() {
            self.events.push(EditorEvent::SelectionChange(None));
        }
        ctx.bridge.release(&self.id);
    }

    /// Runs a deferred task. Tasks reaching a destroyed editor do nothing.
    pub fn run_task(&mut self, task: DeferredTask, ctx: &mut EditorContext) {
        if !self.is_live() {
            trace!(block_id = %self.id, ?task, "deferred task after teardown");
            return;
        }
        match task {
            DeferredTask::SettleSelection { .. } => self.settle_selection(ctx),
            DeferredTask::BlurGrace { format_epoch, .. } => self.finish_blur(format_epoch, ctx),
            DeferredTask::ReleaseFocus { .. } => {
                ctx.registry.clear_focused_if_matches(&self.id);
            }
        }
    }

    fn settle_selection(&mut self, ctx: &mut EditorContext) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let (from, to) = engine.selection_range();
        let range = TextRange::new(from, to);
        self.engine_selection = Some(range);
        self.format_state = Some(engine.active_marks());

        let snapshot = ToolbarSelection::derive(
            &self.id,
            self.view.as_ref(),
            range,
            engine.is_full_selection(),
            engine.selected_text(),
        );
        if snapshot == self.toolbar {
            return;
        }
        match &snapshot {
            Some(snapshot) => ctx.bridge.show_toolbar(snapshot.clone()),
            None => ctx.bridge.hide_toolbar(&self.id),
        }
        self.toolbar = snapshot.clone();
        self.events.push(EditorEvent::SelectionChange(snapshot));
    }

    fn finish_blur(&mut self, format_epoch: u64, ctx: &mut EditorContext) {
        self.blur_tasks.clear();
        if ctx.bridge.format_started_since(format_epoch) {
            debug!(block_id = %self.id, "format started during blur grace; keeping selection");
            return;
        }
        self.engine_selection = None;
        self.format_state = None;
        ctx.bridge.release(&self.id);
    }

    /// Tears the editor down: cancels deferred work and leaves the registry
    /// and bridge. Safe to call repeatedly, and after a failed initialization.
    pub fn destroy(&mut self, ctx: &mut EditorContext) -> bool {
        if self.lifecycle == Lifecycle::Destroyed {
            return false;
        }
        self.lifetime.cancel();
        for task in self.blur_tasks.drain(..) {
            ctx.scheduler.cancel(task);
        }
        ctx.registry.unregister(&self.id);
        ctx.registry.clear_focused_if_matches(&self.id);
        ctx.bridge.release(&self.id);
        self.engine = None;
        self.engine_selection = None;
        self.toolbar = None;
        self.format_state = None;
        self.lifecycle = Lifecycle::Destroyed;
        debug!(block_id = %self.id, "editor destroyed");
        true
    }
}

