//! Flat positions over the document tree.
//!
//! Every element contributes an opening and a closing token, inline leaves count
//! one and text counts its UTF-8 bytes. Position `0` is before the first top-level
//! node, so the first character of a leading paragraph sits at `1`.

use crate::core::{ElementNode, Node, Point, Selection, clamp_to_char_boundary};
use crate::core::{Document, Editor};
use crate::ops::Path;
use crate::schema::Schema;

impl Node {
    pub fn node_size(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Void(_) => 1,
            Node::Element(el) => 2 + content_size(&el.children),
        }
    }
}

pub fn content_size(children: &[Node]) -> usize {
    children.iter().map(Node::node_size).sum()
}

#[derive(Debug, Clone)]
pub struct TextblockRef<'a> {
    pub path: Path,
    /// Position of the first inline slot.
    pub start: usize,
    /// Position after the last inline slot.
    pub end: usize,
    pub el: &'a ElementNode,
}

impl TextblockRef<'_> {
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Offset of `pos` inside the block's inline content, clamped to it.
    pub fn local(&self, pos: usize) -> usize {
        pos.clamp(self.start, self.end) - self.start
    }
}

impl Document {
    pub fn content_size(&self) -> usize {
        content_size(&self.children)
    }

    /// Textblocks in document order.
    pub fn textblocks(&self, schema: &Schema) -> Vec<TextblockRef<'_>> {
        fn walk<'a>(
            nodes: &'a [Node],
            path: &mut Path,
            mut pos: usize,
            schema: &Schema,
            out: &mut Vec<TextblockRef<'a>>,
        ) {
            for (ix, node) in nodes.iter().enumerate() {
                let size = node.node_size();
                if let Node::Element(el) = node {
                    path.push(ix);
                    if schema.is_textblock(&el.kind) {
                        out.push(TextblockRef {
                            path: path.clone(),
                            start: pos + 1,
                            end: pos + size - 1,
                            el,
                        });
                    } else {
                        walk(&el.children, path, pos + 1, schema, out);
                    }
                    path.pop();
                }
                pos += size;
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), 0, schema, &mut out);
        out
    }

    pub fn textblock_at<'a>(&'a self, schema: &Schema, block_path: &[usize]) -> Option<TextblockRef<'a>> {
        self.textblocks(schema)
            .into_iter()
            .find(|block| block.path == block_path)
    }

    pub fn pos_of_point(&self, point: &Point) -> Option<usize> {
        let mut pos = 0usize;
        let mut children: &[Node] = &self.children;
        for (depth, &ix) in point.path.iter().enumerate() {
            let node = children.get(ix)?;
            pos += content_size(&children[..ix]);
            let last = depth + 1 == point.path.len();
            match node {
                Node::Text(t) if last => {
                    return Some(pos + clamp_to_char_boundary(&t.text, point.offset));
                }
                Node::Void(_) if last => return Some(pos + point.offset.min(1)),
                Node::Element(el) if last => {
                    return Some(pos + 1 + point.offset.min(content_size(&el.children)));
                }
                Node::Element(el) => {
                    pos += 1;
                    children = &el.children;
                }
                Node::Text(_) | Node::Void(_) => return None,
            }
        }
        None
    }

    /// Resolves `pos` to a text point, snapping positions between blocks forward.
    pub fn point_at_pos(&self, schema: &Schema, pos: usize) -> Option<Point> {
        let blocks = self.textblocks(schema);
        let block = blocks
            .iter()
            .find(|block| pos <= block.end)
            .or_else(|| blocks.last())?;
        point_in_block(&block.path, &block.el.children, block.local(pos))
    }

    pub fn first_text_pos(&self, schema: &Schema) -> Option<usize> {
        self.textblocks(schema).first().map(|block| block.start)
    }

    pub fn last_text_pos(&self, schema: &Schema) -> Option<usize> {
        self.textblocks(schema).last().map(|block| block.end)
    }

    /// Text in `[from, to)`, with `block_separator` between textblocks.
    pub fn text_between(&self, schema: &Schema, from: usize, to: usize, block_separator: &str) -> String {
        let mut out = String::new();
        let mut first = true;
        for block in self.textblocks(schema) {
            if block.start - 1 >= to || block.end + 1 <= from {
                continue;
            }
            if !first {
                out.push_str(block_separator);
            }
            first = false;

            let mut cursor = block.start;
            for child in &block.el.children {
                let size = child.node_size();
                match child {
                    Node::Text(t) => {
                        let start = from.max(cursor);
                        let end = to.min(cursor + size);
                        if start < end {
                            let a = clamp_to_char_boundary(&t.text, start - cursor);
                            let b = clamp_to_char_boundary(&t.text, end - cursor);
                            out.push_str(&t.text[a..b]);
                        }
                    }
                    Node::Void(v) => {
                        if cursor >= from && cursor + 1 <= to {
                            out.push_str(v.leaf_text());
                        }
                    }
                    Node::Element(_) => {}
                }
                cursor += size;
            }
        }
        out
    }

    /// Concatenated text of the whole tree, without separators.
    pub fn text_content(&self) -> String {
        fn walk(nodes: &[Node], out: &mut String) {
            for node in nodes {
                match node {
                    Node::Text(t) => out.push_str(&t.text),
                    Node::Void(v) => out.push_str(v.leaf_text()),
                    Node::Element(el) => walk(&el.children, out),
                }
            }
        }
        let mut out = String::new();
        walk(&self.children, &mut out);
        out
    }

    /// Textblocks joined by newlines.
    pub fn plain_text(&self, schema: &Schema) -> String {
        self.text_between(schema, 0, self.content_size(), "\n")
    }
}

/// Maps an inline offset inside a block to a text point. Between two text
/// leaves the point lands at the start of the later one, so merging the leaves
/// keeps it in place.
pub fn point_in_block(block_path: &[usize], children: &[Node], local: usize) -> Option<Point> {
    let at = |ix: usize, offset: usize| {
        let mut path = block_path.to_vec();
        path.push(ix);
        Point::new(path, offset)
    };

    let mut remaining = local;
    let mut last_text: Option<(usize, usize)> = None;
    for (ix, child) in children.iter().enumerate() {
        match child {
            Node::Text(t) => {
                let next_is_text = matches!(children.get(ix + 1), Some(Node::Text(_)));
                if remaining < t.text.len() || (remaining == t.text.len() && !next_is_text) {
                    return Some(at(ix, clamp_to_char_boundary(&t.text, remaining)));
                }
                remaining -= t.text.len();
                last_text = Some((ix, t.text.len()));
            }
            other => remaining = remaining.saturating_sub(other.node_size()),
        }
    }
    last_text.map(|(ix, len)| at(ix, len))
}

/// Inline offset of `offset` inside child `child_ix`.
pub fn inline_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let before = content_size(&children[..child_ix.min(children.len())]);
    match children.get(child_ix) {
        Some(Node::Text(t)) => before + clamp_to_char_boundary(&t.text, offset),
        Some(other) => before + offset.min(other.node_size()),
        None => before,
    }
}

/// Copies the inline content in `[from, to)`, splitting text leaves at the edges.
pub fn slice_inline(children: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for child in children {
        let start = cursor;
        let end = cursor + child.node_size();
        cursor = end;
        if end <= from || start >= to {
            continue;
        }
        match child {
            Node::Text(t) => {
                let a = clamp_to_char_boundary(&t.text, from.saturating_sub(start));
                let b = clamp_to_char_boundary(&t.text, to - start);
                if a < b {
                    let mut piece = t.clone();
                    piece.text = t.text[a..b].to_string();
                    out.push(Node::Text(piece));
                }
            }
            other => {
                if start >= from && end <= to {
                    out.push(other.clone());
                }
            }
        }
    }
    out
}

impl Editor {
    /// Ordered `(from, to)` of the current selection.
    pub fn selection_range(&self) -> (usize, usize) {
        let anchor = self.doc().pos_of_point(&self.selection().anchor).unwrap_or(0);
        let focus = self.doc().pos_of_point(&self.selection().focus).unwrap_or(anchor);
        (anchor.min(focus), anchor.max(focus))
    }

    pub fn set_selection_range(&mut self, anchor: usize, focus: usize) {
        let doc = self.doc();
        let schema = self.schema();
        let Some(anchor) = doc.point_at_pos(schema, anchor) else {
            return;
        };
        let focus = doc.point_at_pos(schema, focus).unwrap_or_else(|| anchor.clone());
        self.set_selection(Selection { anchor, focus });
    }

    pub fn select_all(&mut self) {
        let from = self.doc().first_text_pos(self.schema()).unwrap_or(0);
        let to = self.doc().last_text_pos(self.schema()).unwrap_or(from);
        self.set_selection_range(from, to);
    }

    /// Whether the selection covers every textblock of the document.
    pub fn is_full_selection(&self) -> bool {
        let (from, to) = self.selection_range();
        let doc = self.doc();
        match (doc.first_text_pos(self.schema()), doc.last_text_pos(self.schema())) {
            (Some(first), Some(last)) => from < to && from <= first && to >= last,
            _ => false,
        }
    }

    pub fn selected_text(&self) -> String {
        let (from, to) = self.selection_range();
        self.doc().text_between(self.schema(), from, to, "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Attrs;
    use crate::plugin::PluginRegistry;

    fn doc() -> Document {
        Document::new(vec![
            Node::paragraph("ab"),
            Node::element(
                "bullet_list",
                Attrs::default(),
                vec![Node::element(
                    "list_item",
                    Attrs::default(),
                    vec![Node::paragraph("cd")],
                )],
            ),
        ])
    }

    #[test]
    fn positions_count_tokens_and_bytes() {
        let registry = PluginRegistry::notes();
        let doc = doc();
        // p(ab) = 4, bullet_list(list_item(p(cd))) = 2 + 2 + 4
        assert_eq!(doc.content_size(), 12);

        let blocks = doc.textblocks(registry.schema());
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start, blocks[0].end), (1, 3));
        assert_eq!((blocks[1].start, blocks[1].end), (7, 9));

        let point = doc.point_at_pos(registry.schema(), 8).unwrap();
        assert_eq!(point, Point::new(vec![1, 0, 0, 0], 1));
        assert_eq!(doc.pos_of_point(&point), Some(8));
    }

    #[test]
    fn text_between_separates_blocks() {
        let registry = PluginRegistry::notes();
        let doc = doc();
        assert_eq!(doc.text_between(registry.schema(), 2, 8, "|"), "b|c");
        assert_eq!(doc.plain_text(registry.schema()), "ab\ncd");
        assert_eq!(doc.text_content(), "abcd");
    }

    #[test]
    fn slice_inline_splits_text_leaves() {
        let children = vec![Node::text("hello"), Node::hard_break(), Node::text("world")];
        let sliced = slice_inline(&children, 3, 8);
        assert_eq!(sliced, vec![Node::text("lo"), Node::hard_break(), Node::text("wo")]);
    }
}
