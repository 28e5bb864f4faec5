use crate::core::{Document, Editor, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary};
use crate::ops::{Op, Transaction, replace_children_ops};
use crate::position::{TextblockRef, content_size, inline_offset, point_in_block};
use crate::schema::{MarkType, Schema};

/// Marks a caret at inline offset `local` continues with.
///
/// Inside a text leaf the caret takes that leaf's marks. At a boundary it takes the
/// marks of the node before it (or after it at the block start), dropping
/// non-inclusive marks the other side does not share.
pub fn marks_at(schema: &Schema, children: &[Node], local: usize) -> Marks {
    let mut before: Option<&Node> = None;
    let mut after: Option<&Node> = None;
    let mut cursor = 0usize;
    for child in children {
        let size = child.node_size();
        if size == 0 {
            continue;
        }
        if local > cursor && local < cursor + size {
            return child.as_text().map(|t| t.marks.clone()).unwrap_or_default();
        }
        if cursor + size == local {
            before = Some(child);
        }
        if cursor == local && after.is_none() {
            after = Some(child);
        }
        cursor += size;
    }

    let (main, other) = match before {
        Some(node) => (Some(node), after),
        None => (after, None),
    };
    let mut marks = main
        .and_then(Node::as_text)
        .map(|t| t.marks.clone())
        .unwrap_or_default();
    let other = other.and_then(Node::as_text).map(|t| &t.marks);
    for mark in marks.clone().types() {
        if !schema.is_inclusive(mark) && !other.is_some_and(|o| marks.same_mark(o, mark)) {
            marks.unset(mark);
        }
    }
    marks
}

pub(crate) fn apply_marks_in_block(
    children: &[Node],
    start: usize,
    end: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start >= end {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let node_start = cursor;
        cursor += node.node_size();
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        let node_end = cursor;

        if end <= node_start || start >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end.saturating_sub(node_start));

        if sel_start == 0 && sel_end == t.text.len() {
            let mut next = t.clone();
            next.marks = apply(next.marks);
            out.push(Node::Text(next));
            continue;
        }

        let pieces = [
            (&t.text[..sel_start], t.marks.clone()),
            (&t.text[sel_start..sel_end], apply(t.marks.clone())),
            (&t.text[sel_end..], t.marks.clone()),
        ];
        for (text, marks) in pieces {
            if !text.is_empty() {
                out.push(Node::Text(TextNode {
                    text: text.to_string(),
                    marks,
                }));
            }
        }
    }

    if out.is_empty() {
        out.push(Node::Text(TextNode::plain("")));
    }

    out
}

fn mark_bearing_blocks<'a>(
    doc: &'a Document,
    schema: &Schema,
    from: usize,
    to: usize,
) -> impl Iterator<Item = TextblockRef<'a>> {
    doc.textblocks(schema)
        .into_iter()
        .filter(move |block| block.end > from && block.start < to)
        .filter(move |block| schema.allows_marks(&block.el.kind))
}

fn text_leaves_in_range<'a>(
    doc: &'a Document,
    schema: &Schema,
    from: usize,
    to: usize,
) -> Vec<&'a TextNode> {
    let mut out = Vec::new();
    for block in mark_bearing_blocks(doc, schema, from, to) {
        let (a, b) = (block.local(from), block.local(to));
        let mut cursor = 0usize;
        for child in &block.el.children {
            let start = cursor;
            cursor += child.node_size();
            match child {
                Node::Text(t) if start < b && cursor > a => out.push(t),
                _ => {}
            }
        }
    }
    out
}

/// Whether every text leaf in `[from, to)` carries `mark`; false when there is no text.
pub fn range_has_mark(doc: &Document, schema: &Schema, from: usize, to: usize, mark: MarkType) -> bool {
    let leaves = text_leaves_in_range(doc, schema, from, to);
    !leaves.is_empty() && leaves.iter().all(|t| t.marks.has(mark))
}

/// Rewrites the marks of every text leaf in `[from, to)`.
///
/// Blocks that disallow marks are skipped. Returns `None` when nothing changes.
pub fn mark_range_transaction(
    editor: &Editor,
    from: usize,
    to: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Option<Transaction> {
    let mut ops: Vec<Op> = Vec::new();
    let mut anchor = editor.selection().anchor.clone();
    let mut focus = editor.selection().focus.clone();

    for block in mark_bearing_blocks(editor.doc(), editor.schema(), from, to) {
        let children = block.el.children.as_slice();
        let (a, b) = (block.local(from), block.local(to));
        let next = apply_marks_in_block(children, a, b, apply);
        if next == children {
            continue;
        }

        for point in [&mut anchor, &mut focus] {
            if let Some(mapped) = remap_point(point, &block.path, children, &next) {
                *point = mapped;
            }
        }
        ops.extend(replace_children_ops(&block.path, children.len(), next));
    }

    if ops.is_empty() {
        return None;
    }
    Some(
        Transaction::new(ops)
            .selection_after(Selection { anchor, focus })
            .source("format:marks"),
    )
}

fn remap_point(point: &Point, block_path: &[usize], old: &[Node], new: &[Node]) -> Option<Point> {
    let (child_ix, parent) = point.path.split_last()?;
    if parent != block_path {
        return None;
    }
    let local = inline_offset(old, *child_ix, point.offset);
    point_in_block(block_path, new, local)
}

impl Editor {
    /// Marks the toolbar shows as active: stored marks, the caret's marks, or the
    /// marks shared by all text in the selection.
    pub fn active_marks(&self) -> Marks {
        if let Some(marks) = self.stored_marks() {
            return marks.clone();
        }
        let (from, to) = self.selection_range();
        if from == to {
            return self.caret_marks();
        }

        let leaves = text_leaves_in_range(self.doc(), self.schema(), from, to);
        let Some(first) = leaves.first() else {
            return Marks::default();
        };
        let mut marks = first.marks.clone();
        for leaf in &leaves[1..] {
            for mark in marks.clone().types() {
                if !marks.same_mark(&leaf.marks, mark) {
                    marks.unset(mark);
                }
            }
        }
        marks
    }

    /// Marks typed text would carry at the focus, ignoring stored marks.
    pub(crate) fn caret_marks(&self) -> Marks {
        let focus = &self.selection().focus;
        let Some((child_ix, block_path)) = focus.path.split_last() else {
            return Marks::default();
        };
        let Some(block) = self.doc().textblock_at(self.schema(), block_path) else {
            return Marks::default();
        };
        if !self.schema().allows_marks(&block.el.kind) || content_size(&block.el.children) == 0 {
            return Marks::default();
        }
        let local = inline_offset(&block.el.children, *child_ix, focus.offset);
        marks_at(self.schema(), &block.el.children, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginRegistry;

    #[test]
    fn link_is_not_continued_at_its_end() {
        let registry = PluginRegistry::notes();
        let link = Marks::default().with(MarkType::Link, Some("https://a.test".into()));
        let children = vec![Node::text("see "), Node::marked("docs", link.clone())];

        assert_eq!(marks_at(registry.schema(), &children, 8), Marks::default());
        assert_eq!(marks_at(registry.schema(), &children, 6), link);
    }

    #[test]
    fn bold_is_continued_at_its_end() {
        let registry = PluginRegistry::notes();
        let bold = Marks::default().with(MarkType::Bold, None);
        let children = vec![Node::marked("strong", bold.clone()), Node::text(" tail")];

        assert_eq!(marks_at(registry.schema(), &children, 6), bold);
        assert_eq!(marks_at(registry.schema(), &children, 0), bold);
    }
}
