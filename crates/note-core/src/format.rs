//! Toolbar format commands.
//!
//! [`reduce`] turns a command into a transaction without touching the editor;
//! [`dispatch`] applies it only when the document would actually change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{AttrPatch, Editor, Marks};
use crate::marks::{mark_range_transaction, range_has_mark};
use crate::ops::{Op, Transaction};
use crate::schema::MarkType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("unknown format command `{0}`")]
    UnknownCommand(String),
    #[error("format command `{command}` needs a string value")]
    MissingValue { command: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "camelCase")]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    /// `None` asks the user for the address.
    Link(Option<String>),
    Color(String),
    BackgroundColor(String),
    FontSize(String),
    FontFamily(String),
    Align(Alignment),
    Undo,
    Redo,
}

impl FormatCommand {
    /// Parses the toolbar's command name and optional value.
    pub fn from_name(name: &str, value: Option<&Value>) -> Result<Self, FormatError> {
        let string_value = || {
            value
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| FormatError::MissingValue {
                    command: name.to_string(),
                })
        };
        Ok(match name {
            "bold" => FormatCommand::Bold,
            "italic" => FormatCommand::Italic,
            "underline" => FormatCommand::Underline,
            "strikethrough" => FormatCommand::Strikethrough,
            "code" => FormatCommand::Code,
            "link" => FormatCommand::Link(
                value
                    .and_then(Value::as_str)
                    .filter(|href| !href.is_empty())
                    .map(str::to_string),
            ),
            "color" => FormatCommand::Color(string_value()?),
            "backgroundColor" => FormatCommand::BackgroundColor(string_value()?),
            "fontSize" => FormatCommand::FontSize(string_value()?),
            "fontFamily" => FormatCommand::FontFamily(string_value()?),
            "alignLeft" => FormatCommand::Align(Alignment::Left),
            "alignCenter" => FormatCommand::Align(Alignment::Center),
            "alignRight" => FormatCommand::Align(Alignment::Right),
            "alignJustify" => FormatCommand::Align(Alignment::Justify),
            "undo" => FormatCommand::Undo,
            "redo" => FormatCommand::Redo,
            other => return Err(FormatError::UnknownCommand(other.to_string())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatCommand::Bold => "bold",
            FormatCommand::Italic => "italic",
            FormatCommand::Underline => "underline",
            FormatCommand::Strikethrough => "strikethrough",
            FormatCommand::Code => "code",
            FormatCommand::Link(_) => "link",
            FormatCommand::Color(_) => "color",
            FormatCommand::BackgroundColor(_) => "backgroundColor",
            FormatCommand::FontSize(_) => "fontSize",
            FormatCommand::FontFamily(_) => "fontFamily",
            FormatCommand::Align(Alignment::Left) => "alignLeft",
            FormatCommand::Align(Alignment::Center) => "alignCenter",
            FormatCommand::Align(Alignment::Right) => "alignRight",
            FormatCommand::Align(Alignment::Justify) => "alignJustify",
            FormatCommand::Undo => "undo",
            FormatCommand::Redo => "redo",
        }
    }

    pub fn value(&self) -> Option<Value> {
        match self {
            FormatCommand::Link(href) => href.clone().map(Value::String),
            FormatCommand::Color(v)
            | FormatCommand::BackgroundColor(v)
            | FormatCommand::FontSize(v)
            | FormatCommand::FontFamily(v) => Some(Value::String(v.clone())),
            _ => None,
        }
    }

    /// Mark the command writes, if any.
    pub fn mark_type(&self) -> Option<MarkType> {
        Some(match self {
            FormatCommand::Bold => MarkType::Bold,
            FormatCommand::Italic => MarkType::Italic,
            FormatCommand::Underline => MarkType::Underline,
            FormatCommand::Strikethrough => MarkType::Strikethrough,
            FormatCommand::Code => MarkType::Code,
            FormatCommand::Link(_) => MarkType::Link,
            FormatCommand::Color(_) => MarkType::TextColor,
            FormatCommand::BackgroundColor(_) => MarkType::BackgroundColor,
            FormatCommand::FontSize(_) => MarkType::FontSize,
            FormatCommand::FontFamily(_) => MarkType::FontFamily,
            FormatCommand::Align(_) | FormatCommand::Undo | FormatCommand::Redo => return None,
        })
    }

    /// Undo and redo belong to the history owner, not the editor.
    pub fn is_history(&self) -> bool {
        matches!(self, FormatCommand::Undo | FormatCommand::Redo)
    }

    fn toggles(&self) -> bool {
        matches!(
            self,
            FormatCommand::Bold
                | FormatCommand::Italic
                | FormatCommand::Underline
                | FormatCommand::Strikethrough
        )
    }

    fn mark_value(&self) -> Option<String> {
        match self.value() {
            Some(Value::String(value)) => Some(value),
            _ => None,
        }
    }
}

/// Source of link addresses when a `link` command carries none.
pub trait LinkPrompt {
    /// `None` means the user cancelled.
    fn prompt_href(&mut self) -> Option<String>;
}

impl<F> LinkPrompt for F
where
    F: FnMut() -> Option<String>,
{
    fn prompt_href(&mut self) -> Option<String> {
        self()
    }
}

/// Prompt that always cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl LinkPrompt for NoPrompt {
    fn prompt_href(&mut self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Undo/redo, handled by the history owner.
    Delegated,
    UnknownCommand,
    MissingMark,
    Cancelled,
    ReadOnly,
    Rejected,
    /// No live editor to receive the command.
    NoEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// A transaction was committed; `doc_changed` is false for caret mark toggles.
    Applied { doc_changed: bool },
    /// The command would not change anything.
    Unchanged,
    Skipped(SkipReason),
}

impl DispatchOutcome {
    pub fn doc_changed(&self) -> bool {
        matches!(self, DispatchOutcome::Applied { doc_changed: true })
    }
}

/// Transaction for `command` over the current selection, or `None` when it has
/// no effect. History commands always reduce to `None`.
pub fn reduce(editor: &Editor, command: &FormatCommand) -> Option<Transaction> {
    if let FormatCommand::Align(alignment) = command {
        return align_transaction(editor, *alignment);
    }
    let mark = command.mark_type()?;
    if !editor.schema().has_mark(mark) {
        return None;
    }
    let value = command.mark_value();
    if mark.attr_name().is_some() && value.is_none() {
        return None;
    }

    let (from, to) = editor.selection_range();
    if from == to {
        return caret_mark_transaction(editor, command, mark, value);
    }

    let remove = command.toggles() && range_has_mark(editor.doc(), editor.schema(), from, to, mark);
    let apply = move |marks: Marks| {
        if remove {
            marks.without(mark)
        } else {
            marks.with(mark, value.clone())
        }
    };
    mark_range_transaction(editor, from, to, &apply)
}

/// Collapsed selection: the mark is stored for the next typed text.
fn caret_mark_transaction(
    editor: &Editor,
    command: &FormatCommand,
    mark: MarkType,
    value: Option<String>,
) -> Option<Transaction> {
    let focus = &editor.selection().focus;
    let (_, block_path) = focus.path.split_last()?;
    let block = editor.doc().textblock_at(editor.schema(), block_path)?;
    if !editor.schema().allows_marks(&block.el.kind) {
        return None;
    }

    let current = editor.active_marks();
    let next = if command.toggles() && current.has(mark) {
        current.clone().without(mark)
    } else {
        current.clone().with(mark, value)
    };
    if next == current && editor.stored_marks().is_some() {
        return None;
    }
    Some(
        Transaction::new(Vec::new())
            .stored_marks(next)
            .source("format:stored_marks"),
    )
}

fn align_transaction(editor: &Editor, alignment: Alignment) -> Option<Transaction> {
    let (from, to) = editor.selection_range();
    let schema = editor.schema();
    let ops: Vec<Op> = editor
        .doc()
        .textblocks(schema)
        .into_iter()
        .filter(|block| block.start <= to && block.end >= from)
        .filter(|block| schema.node(&block.el.kind).is_some_and(|spec| spec.has_attr("align")))
        .filter(|block| block.el.attr_str("align") != Some(alignment.as_str()))
        .map(|block| Op::SetNodeAttrs {
            path: block.path,
            patch: AttrPatch::set("align", Value::from(alignment.as_str())),
        })
        .collect();
    if ops.is_empty() {
        return None;
    }
    Some(Transaction::new(ops).source("format:align"))
}

/// Applies `command` to the editor. Never fails: every refusal is logged and
/// reported through the outcome.
pub fn dispatch(
    editor: &mut Editor,
    command: &FormatCommand,
    prompt: &mut dyn LinkPrompt,
) -> DispatchOutcome {
    if command.is_history() {
        debug!(command = command.name(), "history command left to the history owner");
        return DispatchOutcome::Skipped(SkipReason::Delegated);
    }
    match command.mark_type() {
        Some(mark) if !editor.schema().has_mark(mark) => {
            warn!(command = command.name(), mark = mark.name(), "schema lacks mark; ignoring");
            return DispatchOutcome::Skipped(SkipReason::MissingMark);
        }
        _ => {}
    }

    let resolved;
    let command = match command {
        FormatCommand::Link(None) => match prompt.prompt_href().filter(|href| !href.trim().is_empty()) {
            Some(href) => {
                resolved = FormatCommand::Link(Some(href));
                &resolved
            }
            None => {
                debug!("link prompt cancelled");
                return DispatchOutcome::Skipped(SkipReason::Cancelled);
            }
        },
        other => other,
    };

    let Some(tx) = reduce(editor, command) else {
        return DispatchOutcome::Unchanged;
    };
    let stores_marks = tx.stored_marks.is_some();
    match editor.preview_transaction(&tx) {
        Ok(preview) if preview.doc == *editor.doc() && !stores_marks => {
            return DispatchOutcome::Unchanged;
        }
        Ok(_) => {}
        Err(error) => {
            warn!(command = command.name(), %error, "format transaction rejected");
            return DispatchOutcome::Skipped(SkipReason::Rejected);
        }
    }

    match editor.apply(tx) {
        Ok(outcome) => DispatchOutcome::Applied {
            doc_changed: outcome.doc_changed,
        },
        Err(error) => {
            warn!(command = command.name(), %error, "format transaction rejected");
            DispatchOutcome::Skipped(SkipReason::Rejected)
        }
    }
}

/// Parses and dispatches a named command; unknown names are logged and ignored.
pub fn dispatch_named(
    editor: &mut Editor,
    name: &str,
    value: Option<&Value>,
    prompt: &mut dyn LinkPrompt,
) -> DispatchOutcome {
    match FormatCommand::from_name(name, value) {
        Ok(command) => dispatch(editor, &command, prompt),
        Err(error) => {
            warn!(command = name, %error, "ignoring format command");
            DispatchOutcome::Skipped(SkipReason::UnknownCommand)
        }
    }
}
