use serde_json::Value;

use crate::core::{Attrs, Editor, Node, Point, Selection};
use crate::editing::{INSERT_TEXT_SOURCE, plain_inline};
use crate::ops::{Transaction, replace_node_ops};
use crate::plugin::TransactionTransform;
use crate::position::{content_size, inline_offset, slice_inline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputRule {
    Heading(u64),
    BulletList,
    OrderedList(u64),
    Blockquote,
    CodeBlock,
}

impl InputRule {
    /// Matches the text between the block start and the caret.
    fn match_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "- " | "* " => return Some(InputRule::BulletList),
            "> " => return Some(InputRule::Blockquote),
            "```" => return Some(InputRule::CodeBlock),
            _ => {}
        }

        let marker = prefix.strip_suffix(' ')?;
        if !marker.is_empty() && marker.len() <= 6 && marker.bytes().all(|b| b == b'#') {
            return Some(InputRule::Heading(marker.len() as u64));
        }

        let digits = marker.strip_suffix('.')?;
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let order = digits.parse::<u64>().unwrap_or(1).max(1);
            return Some(InputRule::OrderedList(order));
        }
        None
    }

    /// Replacement block for a paragraph, plus the caret path inside it.
    fn build(self, paragraph_attrs: &Attrs, rest: Vec<Node>) -> (Node, Vec<usize>) {
        let rest = if rest.is_empty() {
            vec![Node::text("")]
        } else {
            rest
        };
        let paragraph = || Node::element("paragraph", paragraph_attrs.clone(), rest.clone());
        let list = |kind: &str, attrs: Attrs| {
            Node::element(
                kind,
                attrs,
                vec![Node::element("list_item", Attrs::default(), vec![paragraph()])],
            )
        };

        match self {
            InputRule::Heading(level) => (
                Node::element(
                    "heading",
                    Attrs::from([("level".to_string(), Value::from(level))]),
                    rest.clone(),
                ),
                vec![0],
            ),
            InputRule::BulletList => (list("bullet_list", Attrs::default()), vec![0, 0, 0]),
            InputRule::OrderedList(order) => (
                list(
                    "ordered_list",
                    Attrs::from([("order".to_string(), Value::from(order))]),
                ),
                vec![0, 0, 0],
            ),
            InputRule::Blockquote => (
                Node::element("blockquote", Attrs::default(), vec![paragraph()]),
                vec![0, 0],
            ),
            InputRule::CodeBlock => (
                Node::element("code_block", Attrs::default(), plain_inline(&rest)),
                vec![0],
            ),
        }
    }
}

/// Markdown-like block shortcuts typed at the start of a top-level paragraph.
pub(crate) struct AutoformatInputRules;

impl TransactionTransform for AutoformatInputRules {
    fn id(&self) -> &'static str {
        "autoformat.input_rules"
    }

    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction> {
        if !tx.has_source(INSERT_TEXT_SOURCE) {
            return None;
        }

        let preview = editor.preview_transaction(tx).ok()?;
        if !preview.selection.is_collapsed() {
            return None;
        }
        let focus = &preview.selection.focus;
        let (child_ix, block_path) = focus.path.split_last()?;
        if block_path.len() != 1 {
            return None;
        }
        let block = preview.doc.textblock_at(editor.schema(), block_path)?;
        if block.el.kind != "paragraph" {
            return None;
        }

        let children = &block.el.children;
        let caret = inline_offset(children, *child_ix, focus.offset);
        let mut prefix = String::new();
        for node in slice_inline(children, 0, caret) {
            prefix.push_str(&node.as_text()?.text);
        }
        let rule = InputRule::match_prefix(&prefix)?;

        let rest = slice_inline(children, caret, content_size(children));
        let (node, caret_path) = rule.build(&block.el.attrs, rest);
        tracing::debug!(?rule, "autoformat input rule matched");

        let mut caret = block_path.to_vec();
        caret.extend(caret_path);

        let mut ops = preview.ops;
        ops.extend(replace_node_ops(block_path, node));

        let mut out = Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret, 0)));
        out.meta = tx.meta.clone();
        out.stored_marks = tx.stored_marks.clone();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_map_to_rules() {
        assert_eq!(InputRule::match_prefix("## "), Some(InputRule::Heading(2)));
        assert_eq!(InputRule::match_prefix("####### "), None);
        assert_eq!(InputRule::match_prefix("* "), Some(InputRule::BulletList));
        assert_eq!(InputRule::match_prefix("12. "), Some(InputRule::OrderedList(12)));
        assert_eq!(InputRule::match_prefix("0. "), Some(InputRule::OrderedList(1)));
        assert_eq!(InputRule::match_prefix("> "), Some(InputRule::Blockquote));
        assert_eq!(InputRule::match_prefix("```"), Some(InputRule::CodeBlock));
        assert_eq!(InputRule::match_prefix("#"), None);
        assert_eq!(InputRule::match_prefix("a. "), None);
    }
}
