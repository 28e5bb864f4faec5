//! JSON interchange: the `{type, attrs?, content?, text?, marks?}` tree persisted
//! by the host, plus the versioned [`NoteValue`] envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::{Attrs, Document, Marks, Node};
use crate::schema::{DOC_NODE, MarkType, Schema, SchemaError, TEXT_NODE};

const DEFAULT_SCHEMA: &str = "notes-editor";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("malformed document json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("mark `{mark}` is missing its `{attr}` attribute")]
    MissingMarkAttr { mark: String, attr: &'static str },
    #[error("text node cannot have children")]
    TextWithContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<SerializedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<SerializedMark>>,
}

impl SerializedNode {
    fn from_node(node: &Node) -> Option<Self> {
        Some(match node {
            Node::Text(t) if t.text.is_empty() => return None,
            Node::Text(t) => SerializedNode {
                kind: TEXT_NODE.to_string(),
                attrs: None,
                content: None,
                text: Some(t.text.clone()),
                marks: serialize_marks(&t.marks),
            },
            Node::Void(v) => SerializedNode {
                kind: v.kind.clone(),
                attrs: (!v.attrs.is_empty()).then(|| v.attrs.clone()),
                content: None,
                text: None,
                marks: None,
            },
            Node::Element(el) => SerializedNode {
                kind: el.kind.clone(),
                attrs: (!el.attrs.is_empty()).then(|| el.attrs.clone()),
                content: serialize_children(&el.children),
                text: None,
                marks: None,
            },
        })
    }
}

fn serialize_children(children: &[Node]) -> Option<Vec<SerializedNode>> {
    let content: Vec<SerializedNode> = children.iter().filter_map(SerializedNode::from_node).collect();
    (!content.is_empty()).then_some(content)
}

fn serialize_marks(marks: &Marks) -> Option<Vec<SerializedMark>> {
    let out: Vec<SerializedMark> = marks
        .types()
        .map(|mark| SerializedMark {
            kind: mark.name().to_string(),
            attrs: mark.attr_name().map(|attr| {
                Attrs::from([(
                    attr.to_string(),
                    Value::from(marks.attr(mark).unwrap_or_default()),
                )])
            }),
        })
        .collect();
    (!out.is_empty()).then_some(out)
}

impl Document {
    pub fn to_serialized(&self) -> SerializedNode {
        SerializedNode {
            kind: DOC_NODE.to_string(),
            attrs: None,
            content: serialize_children(&self.children),
            text: None,
            marks: None,
        }
    }

    /// The interchange JSON. Empty text leaves are omitted, as are empty `content` arrays.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.to_serialized()).unwrap_or(Value::Null)
    }
}

/// Recursively strips text nodes with empty or missing `text`, then drops
/// `content` arrays left empty.
pub fn sanitize(value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };
    let mut out = Map::with_capacity(object.len());
    for (key, field) in object {
        if key != "content" {
            out.insert(key.clone(), field.clone());
            continue;
        }
        let Value::Array(children) = field else {
            out.insert(key.clone(), field.clone());
            continue;
        };
        let kept: Vec<Value> = children
            .iter()
            .filter(|child| !is_empty_text(child))
            .map(sanitize)
            .collect();
        if !kept.is_empty() {
            out.insert(key.clone(), Value::Array(kept));
        }
    }
    Value::Object(out)
}

fn is_empty_text(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some(TEXT_NODE)
        && value
            .get("text")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty)
}

/// Parses interchange JSON into a checked document. A non-`doc` root is taken as
/// the document's single child.
pub fn document_from_json(value: &Value, schema: &Schema) -> Result<Document, ContentError> {
    let root: SerializedNode = serde_json::from_value(value.clone())?;
    document_from_serialized(root, schema)
}

pub fn document_from_serialized(root: SerializedNode, schema: &Schema) -> Result<Document, ContentError> {
    let children = if root.kind == DOC_NODE {
        children_from_serialized(root.content.unwrap_or_default(), schema)?
    } else {
        node_from_serialized(root, schema)?.into_iter().collect()
    };
    let doc = Document::new(children);
    schema.check_document(&doc)?;
    Ok(doc)
}

fn children_from_serialized(
    content: Vec<SerializedNode>,
    schema: &Schema,
) -> Result<Vec<Node>, ContentError> {
    let mut out = Vec::with_capacity(content.len());
    for child in content {
        out.extend(node_from_serialized(child, schema)?);
    }
    Ok(out)
}

fn node_from_serialized(node: SerializedNode, schema: &Schema) -> Result<Option<Node>, ContentError> {
    if node.kind == TEXT_NODE {
        if node.content.as_ref().is_some_and(|c| !c.is_empty()) {
            return Err(ContentError::TextWithContent);
        }
        let text = node.text.unwrap_or_default();
        if text.is_empty() {
            return Ok(None);
        }
        let marks = marks_from_serialized(node.marks.unwrap_or_default())?;
        return Ok(Some(schema.text(text, marks)?));
    }

    let children = children_from_serialized(node.content.unwrap_or_default(), schema)?;
    let attrs = node.attrs.unwrap_or_default();
    Ok(Some(schema.element(&node.kind, &attrs, children)?))
}

fn marks_from_serialized(marks: Vec<SerializedMark>) -> Result<Marks, ContentError> {
    let mut out = Marks::default();
    for mark in marks {
        let kind = MarkType::from_name(&mark.kind)
            .ok_or_else(|| SchemaError::UnknownMark(mark.kind.clone()))?;
        let value = match kind.attr_name() {
            None => None,
            Some(attr) => {
                let value = mark
                    .attrs
                    .as_ref()
                    .and_then(|attrs| attrs.get(attr))
                    .and_then(Value::as_str)
                    .ok_or(ContentError::MissingMarkAttr {
                        mark: mark.kind.clone(),
                        attr,
                    })?;
                Some(value.to_string())
            }
        };
        out.set(kind, value);
    }
    Ok(out)
}

/// Versioned envelope around a serialized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: SerializedNode,
}

impl NoteValue {
    pub fn from_document(document: &Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document: document.to_serialized(),
        }
    }

    pub fn into_document(self, schema: &Schema) -> Result<Document, ContentError> {
        document_from_serialized(self.document, schema)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
