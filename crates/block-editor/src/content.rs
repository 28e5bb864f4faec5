use notes_editor_core::{Attrs, Document, Node, Schema, document_from_json, parse_markup, sanitize};
use serde_json::Value;
use tracing::warn;

use crate::BlockType;

/// Incoming `content` of a block: nothing, markup text, or a serialized tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Empty,
    Text(String),
    Document(Value),
}

impl BlockContent {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => BlockContent::Empty,
            Value::String(text) if text.trim().is_empty() => BlockContent::Empty,
            Value::String(text) => BlockContent::Text(text.clone()),
            Value::Object(_) => BlockContent::Document(value.clone()),
            other => BlockContent::Text(other.to_string()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            BlockContent::Empty
        } else {
            BlockContent::Text(text)
        }
    }

    /// Initial document for an editor. Content that fails to parse degrades to
    /// a single empty paragraph; empty content takes the block type's shape.
    pub fn to_document(&self, block_type: &BlockType, schema: &Schema) -> Document {
        match self {
            BlockContent::Empty => default_document(block_type),
            BlockContent::Document(value) => document_from_json(&sanitize(value), schema)
                .unwrap_or_else(|error| {
                    warn!(%error, "stored content does not fit the schema; starting empty");
                    empty_document()
                }),
            BlockContent::Text(text) => parse_markup(text, schema).unwrap_or_else(|error| {
                warn!(%error, "markup content does not fit the schema; starting empty");
                empty_document()
            }),
        }
    }

    /// Text projection used to tell real external updates from echoes.
    pub fn plain_text(&self, schema: &Schema) -> String {
        match self {
            BlockContent::Empty => String::new(),
            BlockContent::Document(value) => document_from_json(&sanitize(value), schema)
                .map(|doc| doc.plain_text(schema))
                .unwrap_or_default(),
            BlockContent::Text(text) => parse_markup(text, schema)
                .map(|doc| doc.plain_text(schema))
                .unwrap_or_else(|_| text.clone()),
        }
    }
}

impl From<Value> for BlockContent {
    fn from(value: Value) -> Self {
        BlockContent::from_value(&value)
    }
}

pub fn empty_document() -> Document {
    Document::new(vec![Node::paragraph("")])
}

/// Empty document shaped like `block_type`.
pub fn default_document(block_type: &BlockType) -> Document {
    let item = || Node::element("list_item", Attrs::new(), vec![Node::paragraph("")]);
    let child = match block_type.signature() {
        BlockType::Heading(level) => Node::heading(u64::from(level), ""),
        BlockType::Quote => Node::element("blockquote", Attrs::new(), vec![Node::paragraph("")]),
        BlockType::Code => Node::element("code_block", Attrs::new(), vec![Node::text("")]),
        BlockType::Bullet => Node::element("bullet_list", Attrs::new(), vec![item()]),
        BlockType::Numbered => Node::element("ordered_list", Attrs::new(), vec![item()]),
        BlockType::Text | BlockType::Other(_) => Node::paragraph(""),
    };
    Document::new(vec![child])
}
