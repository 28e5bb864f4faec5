use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::ops::{Op, Path, Transaction};
use crate::plugin::{PluginRegistry, TransactionPreview};
use crate::schema::{MarkType, Schema, SchemaError};

pub type Attrs = BTreeMap<String, Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_at_path(self, path)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::plain(text))
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn element(kind: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children,
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element("paragraph", Attrs::default(), vec![Node::text(text)])
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        Node::element(
            "heading",
            Attrs::from([("level".to_string(), Value::from(level))]),
            vec![Node::text(text)],
        )
    }

    pub fn hard_break() -> Self {
        Node::Void(VoidNode {
            kind: "hard_break".to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Node::Element(el) => &el.kind,
            Node::Void(v) => &v.kind,
            Node::Text(_) => crate::schema::TEXT_NODE,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Element(el) => Some(&el.attrs),
            Node::Void(v) => Some(&v.attrs),
            Node::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attrs.get(name).and_then(Value::as_u64)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    /// Text a leaf contributes to plain-text projections.
    pub fn leaf_text(&self) -> &'static str {
        match self.kind.as_str() {
            "hard_break" => "\n",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        self.types().next().is_none()
    }

    pub fn has(&self, mark: MarkType) -> bool {
        match mark {
            MarkType::Bold => self.bold,
            MarkType::Italic => self.italic,
            MarkType::Underline => self.underline,
            MarkType::Strikethrough => self.strikethrough,
            MarkType::Code => self.code,
            _ => self.attr(mark).is_some(),
        }
    }

    pub fn attr(&self, mark: MarkType) -> Option<&str> {
        let slot = match mark {
            MarkType::Link => &self.link,
            MarkType::TextColor => &self.text_color,
            MarkType::BackgroundColor => &self.background_color,
            MarkType::FontSize => &self.font_size,
            MarkType::FontFamily => &self.font_family,
            _ => return None,
        };
        slot.as_deref()
    }

    /// Sets `mark`; attributed marks take `value` (empty when absent).
    pub fn set(&mut self, mark: MarkType, value: Option<String>) {
        let value = value.unwrap_or_default();
        match mark {
            MarkType::Bold => self.bold = true,
            MarkType::Italic => self.italic = true,
            MarkType::Underline => self.underline = true,
            MarkType::Strikethrough => self.strikethrough = true,
            MarkType::Code => self.code = true,
            MarkType::Link => self.link = Some(value),
            MarkType::TextColor => self.text_color = Some(value),
            MarkType::BackgroundColor => self.background_color = Some(value),
            MarkType::FontSize => self.font_size = Some(value),
            MarkType::FontFamily => self.font_family = Some(value),
        }
    }

    pub fn unset(&mut self, mark: MarkType) {
        match mark {
            MarkType::Bold => self.bold = false,
            MarkType::Italic => self.italic = false,
            MarkType::Underline => self.underline = false,
            MarkType::Strikethrough => self.strikethrough = false,
            MarkType::Code => self.code = false,
            MarkType::Link => self.link = None,
            MarkType::TextColor => self.text_color = None,
            MarkType::BackgroundColor => self.background_color = None,
            MarkType::FontSize => self.font_size = None,
            MarkType::FontFamily => self.font_family = None,
        }
    }

    pub fn with(mut self, mark: MarkType, value: Option<String>) -> Self {
        self.set(mark, value);
        self
    }

    pub fn without(mut self, mark: MarkType) -> Self {
        self.unset(mark);
        self
    }

    /// Present marks, in rank order.
    pub fn types(&self) -> impl Iterator<Item = MarkType> + '_ {
        MarkType::ALL.into_iter().filter(|mark| self.has(*mark))
    }

    /// Whether `other` carries `mark` with the same attribute.
    pub fn same_mark(&self, other: &Marks, mark: MarkType) -> bool {
        self.has(mark) && other.has(mark) && self.attr(mark) == other.attr(mark)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub max_normalize_iterations: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_normalize_iterations: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
    #[error("transaction would produce an invalid document: {0}")]
    Schema(#[from] SchemaError),
}

/// Result of a committed transaction.
///
/// The core keeps no history; `inverse_ops` lets an external owner build one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionOutcome {
    pub doc_changed: bool,
    pub selection_changed: bool,
    pub inverse_ops: Vec<Op>,
}

impl TransactionOutcome {
    /// Folds a transaction committed after `self` into one outcome.
    pub fn then(mut self, later: TransactionOutcome) -> Self {
        let mut inverse_ops = later.inverse_ops;
        inverse_ops.append(&mut self.inverse_ops);
        Self {
            doc_changed: self.doc_changed || later.doc_changed,
            selection_changed: self.selection_changed || later.selection_changed,
            inverse_ops,
        }
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    stored_marks: Option<Marks>,
    registry: PluginRegistry,
    config: EditorConfig,
}

impl Editor {
    /// Normalizes and validates `doc`; an invalid tree is rejected.
    pub fn new(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
    ) -> Result<Self, ApplyError> {
        let mut editor = Self {
            doc,
            selection,
            stored_marks: None,
            registry,
            config: EditorConfig::default(),
        };
        editor.normalize_in_place()?;
        editor.registry.schema().check_document(&editor.doc)?;
        Ok(editor)
    }

    pub fn with_document(doc: Document, registry: PluginRegistry) -> Result<Self, ApplyError> {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn empty(registry: PluginRegistry) -> Result<Self, ApplyError> {
        Self::with_document(Document::new(vec![Node::paragraph("")]), registry)
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.stored_marks = None;
        self.normalize_selection_in_place();
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &Schema {
        self.registry.schema()
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<TransactionOutcome, ApplyError> {
        let tx = self.transform_transaction(tx);
        let preview = self.preview_transaction(&tx)?;

        let doc_changed = preview.doc != self.doc;
        let selection_changed = preview.selection != self.selection;
        trace!(
            source = tx.meta.source.as_deref().unwrap_or(""),
            ops = preview.ops.len(),
            doc_changed,
            "transaction committed"
        );

        self.doc = preview.doc;
        self.selection = preview.selection;
        match tx.stored_marks {
            Some(marks) => self.stored_marks = Some(marks),
            None if doc_changed || selection_changed => self.stored_marks = None,
            None => {}
        }

        Ok(TransactionOutcome {
            doc_changed,
            selection_changed,
            inverse_ops: preview.inverse_ops,
        })
    }

    fn transform_transaction(&self, mut tx: Transaction) -> Transaction {
        for transform in self.registry.transaction_transforms() {
            if let Some(next) = transform.transform(self, &tx) {
                trace!(transform = transform.id(), "transaction rewritten");
                tx = next;
            }
        }
        tx
    }

    /// Applies `tx` to a scratch copy: ops, then normalization, then validation.
    pub fn preview_transaction(&self, tx: &Transaction) -> Result<TransactionPreview, ApplyError> {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        let mut ops: Vec<Op> = Vec::new();
        let mut inverse_ops: Vec<Op> = Vec::new();

        for op in tx.ops.iter().cloned() {
            inverse_ops.push(apply_op_to(&mut doc, &mut selection, op.clone())?);
            ops.push(op);
        }

        if let Some(sel) = &tx.selection_after {
            selection = sel.clone();
        }

        let mut converged = false;
        for _ in 0..self.config.max_normalize_iterations {
            let pass_ops = self.registry.normalize(&doc);
            if pass_ops.is_empty() {
                converged = true;
                break;
            }
            for op in pass_ops {
                inverse_ops.push(apply_op_to(&mut doc, &mut selection, op.clone())?);
                ops.push(op);
            }
        }
        if !converged {
            return Err(ApplyError::NormalizeDidNotConverge);
        }

        self.registry.schema().check_document(&doc)?;
        selection = self.registry.normalize_selection(&doc, &selection);
        inverse_ops.reverse();

        Ok(TransactionPreview {
            doc,
            selection,
            ops,
            inverse_ops,
        })
    }

    fn normalize_in_place(&mut self) -> Result<(), ApplyError> {
        let preview = self.preview_transaction(&Transaction::default())?;
        self.doc = preview.doc;
        self.selection = preview.selection;
        Ok(())
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(&mut doc.children, &path)? {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Void(v) => patch_apply(&mut v.attrs, &patch),
                Node::Text(_) => {
                    return Err(ApplyError::InvalidPath("text nodes have no attrs".into()));
                }
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() > depth
            && point.path.starts_with(parent_path)
            && point.path[depth] >= *index
        {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();

    // A removed text leaf that was just merged into its left sibling keeps the caret.
    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at_path(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= depth || !point.path.starts_with(parent_path) {
            continue;
        }
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        point.path.truncate(depth + 1);
        match (merge_prefix_len, removed) {
            (Some(prefix), Node::Text(removed_text)) => {
                point.path[depth] = index - 1;
                point.offset = prefix + point.offset.min(removed_text.text.len());
            }
            _ => {
                point.path[depth] = index.saturating_sub(1);
                point.offset = 0;
            }
        }
    }
}

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn element_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a ElementNode> {
    node_at_path(doc, path).and_then(Node::as_element)
}

/// Children of the node at `path`; the empty path addresses the document.
pub fn children_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a [Node]> {
    if path.is_empty() {
        return Some(&doc.children);
    }
    element_at_path(doc, path).map(|el| el.children.as_slice())
}

fn node_mut<'a>(children: &'a mut [Node], path: &[usize]) -> Result<&'a mut Node, ApplyError> {
    let (first, rest) = path
        .split_first()
        .ok_or_else(|| ApplyError::InvalidPath("empty path".into()))?;
    let len = children.len();
    let node = children.get_mut(*first).ok_or_else(|| {
        ApplyError::InvalidPath(format!("index {first} out of bounds ({len} children)"))
    })?;
    if rest.is_empty() {
        return Ok(node);
    }
    match node {
        Node::Element(el) => node_mut(&mut el.children, rest),
        Node::Void(_) | Node::Text(_) => {
            Err(ApplyError::InvalidPath("path descends into a leaf".into()))
        }
    }
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, ApplyError> {
    match node_mut(&mut doc.children, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(ApplyError::InvalidPath("expected a text node".into())),
    }
}

fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, ApplyError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(&mut doc.children, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Void(_) | Node::Text(_) => {
            Err(ApplyError::InvalidPath("parent is not a container".into()))
        }
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), ApplyError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| ApplyError::InvalidPath("empty insert path".into()))?;
    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(ApplyError::InvalidPath(format!(
            "insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, ApplyError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| ApplyError::InvalidPath("empty remove path".into()))?;
    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(ApplyError::InvalidPath(format!(
            "remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(name: impl Into<String>, value: Value) -> Self {
        Self {
            set: Attrs::from([(name.into(), value)]),
            remove: Vec::new(),
        }
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}
