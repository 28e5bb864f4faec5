//! Text-input transactions: typing, deletion, Enter and Shift+Enter.

use crate::core::{
    ApplyError, Attrs, Editor, Marks, Node, Point, Selection, TransactionOutcome, element_at_path,
    node_at_path,
};
use crate::marks::marks_at;
use crate::ops::{Op, Transaction, replace_children_ops};
use crate::position::{TextblockRef, content_size, point_in_block, slice_inline};
use crate::schema::Schema;

pub const INSERT_TEXT_SOURCE: &str = "input:insert_text";
pub const DELETE_SOURCE: &str = "input:delete";
pub const SPLIT_BLOCK_SOURCE: &str = "input:split_block";
pub const HARD_BREAK_SOURCE: &str = "input:hard_break";

/// Flattens inline content to one unmarked text leaf; hard breaks become newlines.
pub(crate) fn plain_inline(children: &[Node]) -> Vec<Node> {
    let mut text = String::new();
    for child in children {
        match child {
            Node::Text(t) => text.push_str(&t.text),
            Node::Void(v) => text.push_str(v.leaf_text()),
            Node::Element(_) => {}
        }
    }
    vec![Node::text(text)]
}

/// Inline content moved into `kind`, stripped down when the block is plain text only.
fn coerce_inline(schema: &Schema, kind: &str, children: Vec<Node>) -> Vec<Node> {
    if schema.allows_marks(kind) {
        children
    } else {
        plain_inline(&children)
    }
}

/// Size of the character or leaf ending at `local`.
fn previous_unit_len(children: &[Node], local: usize) -> usize {
    let mut cursor = 0usize;
    for child in children {
        let size = child.node_size();
        if local > cursor && local <= cursor + size {
            return match child {
                Node::Text(t) => t.text[..local - cursor]
                    .chars()
                    .next_back()
                    .map(char::len_utf8)
                    .unwrap_or(1),
                _ => size,
            };
        }
        cursor += size;
    }
    1
}

fn with_leading_text(mut children: Vec<Node>) -> Vec<Node> {
    if !matches!(children.first(), Some(Node::Text(_))) {
        children.insert(0, Node::text(""));
    }
    children
}

fn path_with(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

impl Editor {
    fn caret_block(&self) -> Option<(TextblockRef<'_>, usize)> {
        let (pos, _) = self.selection_range();
        let block = self
            .doc()
            .textblocks(self.schema())
            .into_iter()
            .find(|block| block.contains(pos))?;
        let local = block.local(pos);
        Some((block, local))
    }

    /// Types `text` over the selection.
    pub fn insert_text(&mut self, text: &str) -> Result<TransactionOutcome, ApplyError> {
        if text.is_empty() {
            return Ok(TransactionOutcome::default());
        }
        let stored = self.stored_marks().cloned();
        let mut outcome = TransactionOutcome::default();
        if !self.selection().is_collapsed() {
            outcome = self.delete_selection()?;
        }
        let Some(tx) = self.insert_text_transaction(text, stored) else {
            return Ok(outcome);
        };
        Ok(outcome.then(self.apply(tx)?))
    }

    fn insert_text_transaction(&self, text: &str, stored: Option<Marks>) -> Option<Transaction> {
        let (block, local) = self.caret_block()?;
        let schema = self.schema();
        let children = &block.el.children;
        let marks = if schema.allows_marks(&block.el.kind) {
            stored.unwrap_or_else(|| marks_at(schema, children, local))
        } else {
            Marks::default()
        };

        let focus = &self.selection().focus;
        let tx = match node_at_path(self.doc(), &focus.path) {
            Some(Node::Text(leaf)) if leaf.marks == marks => {
                let caret = Point::new(focus.path.clone(), focus.offset + text.len());
                Transaction::new(vec![Op::InsertText {
                    path: focus.path.clone(),
                    offset: focus.offset,
                    text: text.to_string(),
                }])
                .selection_after(Selection::collapsed(caret))
            }
            _ => {
                let mut next = slice_inline(children, 0, local);
                next.push(Node::marked(text, marks));
                next.extend(slice_inline(children, local, content_size(children)));
                let caret = point_in_block(&block.path, &next, local + text.len())?;
                Transaction::new(replace_children_ops(&block.path, children.len(), next))
                    .selection_after(Selection::collapsed(caret))
            }
        };
        Some(tx.source(INSERT_TEXT_SOURCE))
    }

    pub fn delete_selection(&mut self) -> Result<TransactionOutcome, ApplyError> {
        let (from, to) = self.selection_range();
        match self.delete_range_transaction(from, to) {
            Some(tx) => self.apply(tx),
            None => Ok(TransactionOutcome::default()),
        }
    }

    /// Backspace: deletes the selection, the previous character, or joins the
    /// caret's block into the previous textblock.
    pub fn delete_backward(&mut self) -> Result<TransactionOutcome, ApplyError> {
        if !self.selection().is_collapsed() {
            return self.delete_selection();
        }
        let (pos, _) = self.selection_range();
        let blocks = self.doc().textblocks(self.schema());
        let Some(ix) = blocks.iter().position(|block| block.contains(pos)) else {
            return Ok(TransactionOutcome::default());
        };

        let local = blocks[ix].local(pos);
        let from = if local > 0 {
            pos - previous_unit_len(&blocks[ix].el.children, local)
        } else {
            match ix.checked_sub(1) {
                Some(prev) => blocks[prev].end,
                None => return Ok(TransactionOutcome::default()),
            }
        };

        match self.delete_range_transaction(from, pos) {
            Some(tx) => self.apply(tx),
            None => Ok(TransactionOutcome::default()),
        }
    }

    /// Removes `[from, to)`. Across blocks, the tail of the last block joins the
    /// first one and every textblock in between is removed; containers left empty
    /// are cleaned up by normalization.
    fn delete_range_transaction(&self, from: usize, to: usize) -> Option<Transaction> {
        if from >= to {
            return None;
        }
        let schema = self.schema();
        let blocks = self.doc().textblocks(schema);
        let start_ix = blocks.iter().position(|block| from <= block.end)?;
        let end_ix = blocks.iter().rposition(|block| block.start <= to)?;
        if end_ix < start_ix {
            return None;
        }

        let first = &blocks[start_ix];
        let last = &blocks[end_ix];
        let local_from = first.local(from);
        let local_to = last.local(to);

        let mut merged = slice_inline(&first.el.children, 0, local_from);
        let tail = slice_inline(&last.el.children, local_to, content_size(&last.el.children));
        if start_ix == end_ix {
            merged.extend(tail);
        } else {
            merged.extend(coerce_inline(schema, &first.el.kind, tail));
        }
        if merged.is_empty() {
            merged.push(Node::text(""));
        }

        let caret = point_in_block(&first.path, &merged, local_from)?;
        let mut ops = replace_children_ops(&first.path, first.el.children.len(), merged);
        for block in blocks[start_ix + 1..=end_ix].iter().rev() {
            ops.push(Op::RemoveNode {
                path: block.path.clone(),
            });
        }

        Some(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(caret))
                .source(DELETE_SOURCE),
        )
    }

    /// Enter.
    pub fn split_block(&mut self) -> Result<TransactionOutcome, ApplyError> {
        let mut outcome = TransactionOutcome::default();
        if !self.selection().is_collapsed() {
            outcome = self.delete_selection()?;
        }
        let Some(tx) = self.split_block_transaction() else {
            return Ok(outcome);
        };
        Ok(outcome.then(self.apply(tx)?))
    }

    fn split_block_transaction(&self) -> Option<Transaction> {
        let (block, local) = self.caret_block()?;
        let schema = self.schema();
        if !schema.allows_child(&block.el.kind, "hard_break") {
            return self.insert_newline_transaction(SPLIT_BLOCK_SOURCE);
        }

        let children = &block.el.children;
        let end = content_size(children);
        let mut left = slice_inline(children, 0, local);
        if left.is_empty() {
            left.push(Node::text(""));
        }
        let right = with_leading_text(slice_inline(children, local, end));

        let (parent_path, block_ix) = match block.path.split_last() {
            Some((ix, parent)) => (parent.to_vec(), *ix),
            None => return None,
        };
        let in_list_item = block_ix == 0
            && element_at_path(self.doc(), &parent_path).is_some_and(|el| el.kind == "list_item");

        let mut ops = replace_children_ops(&block.path, children.len(), left);
        let caret = if in_list_item {
            let (item_ix, list_path) = parent_path.split_last()?;
            let item_path = path_with(list_path, item_ix + 1);
            let paragraph = Node::element(block.el.kind.clone(), block.el.attrs.clone(), right);
            ops.push(Op::InsertNode {
                path: item_path.clone(),
                node: Node::element("list_item", Attrs::default(), vec![paragraph]),
            });
            let mut caret = item_path;
            caret.extend([0, 0]);
            caret
        } else {
            let (kind, attrs) = if block.el.kind == "heading" && local == end {
                ("paragraph".to_string(), Attrs::default())
            } else {
                (block.el.kind.clone(), block.el.attrs.clone())
            };
            let new_path = path_with(&parent_path, block_ix + 1);
            ops.push(Op::InsertNode {
                path: new_path.clone(),
                node: Node::element(kind, attrs, right),
            });
            path_with(&new_path, 0)
        };

        Some(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(Point::new(caret, 0)))
                .source(SPLIT_BLOCK_SOURCE),
        )
    }

    /// Shift+Enter.
    pub fn insert_hard_break(&mut self) -> Result<TransactionOutcome, ApplyError> {
        let mut outcome = TransactionOutcome::default();
        if !self.selection().is_collapsed() {
            outcome = self.delete_selection()?;
        }
        let Some(tx) = self.hard_break_transaction() else {
            return Ok(outcome);
        };
        Ok(outcome.then(self.apply(tx)?))
    }

    fn hard_break_transaction(&self) -> Option<Transaction> {
        let (block, local) = self.caret_block()?;
        if !self.schema().allows_child(&block.el.kind, "hard_break") {
            return self.insert_newline_transaction(HARD_BREAK_SOURCE);
        }

        let children = &block.el.children;
        let mut next = slice_inline(children, 0, local);
        next.push(Node::hard_break());
        next.extend(with_leading_text(slice_inline(
            children,
            local,
            content_size(children),
        )));
        let caret = point_in_block(&block.path, &next, local + 1)?;
        Some(
            Transaction::new(replace_children_ops(&block.path, children.len(), next))
                .selection_after(Selection::collapsed(caret))
                .source(HARD_BREAK_SOURCE),
        )
    }

    fn insert_newline_transaction(&self, source: &str) -> Option<Transaction> {
        let focus = self.selection().focus.clone();
        if !matches!(node_at_path(self.doc(), &focus.path), Some(Node::Text(_))) {
            return None;
        }
        let caret = Point::new(focus.path.clone(), focus.offset + 1);
        Some(
            Transaction::new(vec![Op::InsertText {
                path: focus.path,
                offset: focus.offset,
                text: "\n".to_string(),
            }])
            .selection_after(Selection::collapsed(caret))
            .source(source),
        )
    }
}
