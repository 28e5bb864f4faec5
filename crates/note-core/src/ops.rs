use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{AttrPatch, Marks, Node, Selection};

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    SetNodeAttrs {
        #[serde(default)]
        path: Path,
        patch: AttrPatch,
    },
    SetTextMarks {
        #[serde(default)]
        path: Path,
        marks: Marks,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    /// Marks applied to the next typed text at a collapsed caret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_marks: Option<Marks>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            ..Self::default()
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn stored_marks(mut self, marks: Marks) -> Self {
        self.stored_marks = Some(marks);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.meta.source.as_deref() == Some(source)
    }
}

/// Ops replacing every child of the container at `parent_path`.
pub fn replace_children_ops(parent_path: &[usize], old_len: usize, children: Vec<Node>) -> Vec<Op> {
    let mut ops = Vec::with_capacity(old_len + children.len());
    for ix in (0..old_len).rev() {
        let mut path = parent_path.to_vec();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    for (ix, node) in children.into_iter().enumerate() {
        let mut path = parent_path.to_vec();
        path.push(ix);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}

pub fn replace_node_ops(path: &[usize], node: Node) -> Vec<Op> {
    vec![
        Op::RemoveNode {
            path: path.to_vec(),
        },
        Op::InsertNode {
            path: path.to_vec(),
            node,
        },
    ]
}
