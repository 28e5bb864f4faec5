use std::fmt;
use std::str::FromStr;

use notes_editor_core::{Document, FormatCommand, Node};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{BlockContent, BlockId, EditorEvent, EditorProps};

/// Block type tag as the block list spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockType {
    Text,
    Heading(u8),
    Quote,
    Code,
    Bullet,
    Numbered,
    /// A block type without its own rich-text shape; edited as paragraphs.
    Other(String),
}

impl BlockType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "" | "text" | "paragraph" => BlockType::Text,
            "heading" => BlockType::Heading(1),
            "quote" | "blockquote" => BlockType::Quote,
            "code" | "code_block" => BlockType::Code,
            "bullet" | "bullet_list" | "bulletList" => BlockType::Bullet,
            "numbered" | "ordered" | "ordered_list" | "numberedList" => BlockType::Numbered,
            other => match other.strip_prefix("heading").and_then(|n| n.parse::<u8>().ok()) {
                Some(level) if (1..=6).contains(&level) => BlockType::Heading(level),
                _ => BlockType::Other(other.to_string()),
            },
        }
    }

    pub fn as_tag(&self) -> String {
        match self {
            BlockType::Text => "text".to_string(),
            BlockType::Heading(level) => format!("heading{level}"),
            BlockType::Quote => "quote".to_string(),
            BlockType::Code => "code".to_string(),
            BlockType::Bullet => "bullet".to_string(),
            BlockType::Numbered => "numbered".to_string(),
            BlockType::Other(tag) => tag.clone(),
        }
    }

    /// Shape the editor content takes for this type: `Other` edits as text.
    pub fn signature(&self) -> BlockType {
        match self {
            BlockType::Other(_) => BlockType::Text,
            other => other.clone(),
        }
    }

    /// Type implied by the document's first child.
    pub fn of_document(doc: &Document) -> BlockType {
        let Some(Node::Element(first)) = doc.first_child() else {
            return BlockType::Text;
        };
        match first.kind.as_str() {
            "heading" => {
                let level = first.attr_u64("level").unwrap_or(1).clamp(1, 6);
                BlockType::Heading(level as u8)
            }
            "blockquote" => BlockType::Quote,
            "code_block" => BlockType::Code,
            "bullet_list" => BlockType::Bullet,
            "ordered_list" => BlockType::Numbered,
            _ => BlockType::Text,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_tag())
    }
}

impl FromStr for BlockType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BlockType::parse(s))
    }
}

impl Serialize for BlockType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_tag())
    }
}

impl<'de> Deserialize<'de> for BlockType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(BlockType::parse(&tag))
    }
}

/// Side channel attached to a change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePatch {
    /// The first child no longer matches the block's type.
    BlockTypeChanged { new_block_type: BlockType },
    /// A toolbar format command changed the content.
    FormatChanged { new_format: FormatCommand },
}

impl ChangePatch {
    /// Wire shape: `{blockTypeChanged, newBlockType}` or `{formatChanged, newFormat}`.
    pub fn to_json(&self) -> Value {
        match self {
            ChangePatch::BlockTypeChanged { new_block_type } => json!({
                "blockTypeChanged": true,
                "newBlockType": new_block_type.as_tag(),
            }),
            ChangePatch::FormatChanged { new_format } => json!({
                "formatChanged": true,
                "newFormat": new_format,
            }),
        }
    }
}

/// A block as the block list stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, block_type: BlockType, content: Value) -> Self {
        Self {
            id: id.into(),
            block_type,
            content,
            metadata: Map::new(),
        }
    }

    pub fn editor_props(&self, read_only: bool) -> EditorProps {
        EditorProps {
            content: BlockContent::from_value(&self.content),
            block_type: self.block_type.clone(),
            read_only,
        }
    }
}

/// Funnels editor change notifications into a block's content and metadata.
#[derive(Debug, Clone)]
pub struct BlockAdapter {
    block: Block,
    revision: u64,
}

impl BlockAdapter {
    pub fn new(block: Block) -> Self {
        Self { block, revision: 0 }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }

    /// Number of content updates applied.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn apply_change(&mut self, json: Value, patch: Option<&ChangePatch>) {
        self.block.content = json;
        self.revision += 1;

        match patch {
            Some(ChangePatch::BlockTypeChanged { new_block_type }) => self.retag(new_block_type),
            Some(ChangePatch::FormatChanged { new_format }) => {
                let format = serde_json::to_value(new_format).unwrap_or(Value::Null);
                self.block.metadata.insert("format".to_string(), format);
            }
            None => {}
        }
    }

    /// Applies a `Change` event; other events are ignored. Returns whether the
    /// block was updated.
    pub fn apply_event(&mut self, event: &EditorEvent) -> bool {
        match event {
            EditorEvent::Change { json, patch } => {
                self.apply_change(json.clone(), patch.as_ref());
                true
            }
            EditorEvent::SelectionChange(_) | EditorEvent::FormatChange { .. } => false,
        }
    }

    fn retag(&mut self, block_type: &BlockType) {
        debug!(
            block_id = %self.block.id,
            from = %self.block.block_type,
            to = %block_type,
            "retagging block"
        );
        let metadata = &mut self.block.metadata;
        metadata.remove("level");
        metadata.remove("list_type");
        match block_type {
            BlockType::Heading(level) => {
                metadata.insert("level".to_string(), Value::from(*level));
            }
            BlockType::Bullet => {
                metadata.insert("list_type".to_string(), Value::from("bullet"));
            }
            BlockType::Numbered => {
                metadata.insert("list_type".to_string(), Value::from("numbered"));
            }
            _ => {}
        }
        self.block.block_type = block_type.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_tags() {
        assert_eq!(BlockType::parse("heading3"), BlockType::Heading(3));
        assert_eq!(BlockType::parse("heading"), BlockType::Heading(1));
        assert_eq!(BlockType::parse("heading9"), BlockType::Other("heading9".into()));
        assert_eq!(BlockType::parse("ordered"), BlockType::Numbered);
        assert_eq!(BlockType::parse("kanban"), BlockType::Other("kanban".into()));
        assert_eq!(BlockType::parse("kanban").signature(), BlockType::Text);
    }

    #[test]
    fn tags_round_trip() {
        for tag in ["text", "heading2", "quote", "code", "bullet", "numbered", "poll"] {
            assert_eq!(BlockType::parse(tag).as_tag(), tag);
        }
    }
}
