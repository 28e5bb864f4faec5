use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{Attrs, Document, ElementNode, Marks, Node, TextNode, VoidNode};
use crate::markup::DomElement;

pub const DOC_NODE: &str = "doc";
pub const TEXT_NODE: &str = "text";
const DOC_CONTENT: &str = "block+";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),
    #[error("mark `{0}` is not defined in the schema")]
    UnknownMark(String),
    #[error("invalid content expression `{0}`")]
    InvalidContentExpr(String),
    #[error("content expression of `{kind}` references unknown node or group `{name}`")]
    UnknownContentTarget { kind: String, name: String },
    #[error("duplicate node type `{0}`")]
    DuplicateNode(String),
    #[error("duplicate mark `{0}`")]
    DuplicateMark(String),
    #[error("invalid content for `{kind}`: expected `{expected}`, found [{found}]")]
    InvalidContent {
        kind: String,
        expected: String,
        found: String,
    },
    #[error("node `{kind}` is missing required attribute `{attr}`")]
    MissingAttr { kind: String, attr: String },
    #[error("node `{0}` does not allow marks")]
    MarksNotAllowed(String),
    #[error("`{0}` is a leaf node and cannot hold content")]
    LeafWithContent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Link,
    TextColor,
    BackgroundColor,
    FontSize,
    FontFamily,
}

impl MarkType {
    /// Rank order, which is also the serialization order.
    pub const ALL: [MarkType; 10] = [
        MarkType::Bold,
        MarkType::Italic,
        MarkType::Underline,
        MarkType::Strikethrough,
        MarkType::Code,
        MarkType::Link,
        MarkType::TextColor,
        MarkType::BackgroundColor,
        MarkType::FontSize,
        MarkType::FontFamily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarkType::Bold => "bold",
            MarkType::Italic => "italic",
            MarkType::Underline => "underline",
            MarkType::Strikethrough => "strikethrough",
            MarkType::Code => "code",
            MarkType::Link => "link",
            MarkType::TextColor => "textColor",
            MarkType::BackgroundColor => "backgroundColor",
            MarkType::FontSize => "fontSize",
            MarkType::FontFamily => "fontFamily",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mark| mark.name() == name)
    }

    /// Name of the single attribute carried by attributed marks.
    pub fn attr_name(self) -> Option<&'static str> {
        match self {
            MarkType::Link => Some("href"),
            MarkType::TextColor | MarkType::BackgroundColor => Some("color"),
            MarkType::FontSize => Some("size"),
            MarkType::FontFamily => Some("family"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeGroup {
    Block,
    Inline,
}

impl NodeGroup {
    pub fn name(self) -> &'static str {
        match self {
            NodeGroup::Block => "block",
            NodeGroup::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    Once,
    Optional,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentTerm {
    target: String,
    repeat: Repeat,
}

impl ContentTerm {
    fn accepts(&self, kind: &str, group: Option<NodeGroup>) -> bool {
        self.target == kind || group.is_some_and(|group| self.target == group.name())
    }
}

/// Compiled content expression such as `"paragraph block*"`.
///
/// `+` compiles to a required term followed by a repeated one, so matching only
/// has to deal with single, optional and repeated terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentExpr {
    source: String,
    terms: Vec<ContentTerm>,
}

impl ContentExpr {
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let mut terms = Vec::new();
        for token in source.split_whitespace() {
            let (name, suffix) = match token.chars().last() {
                Some(c @ ('*' | '+' | '?')) => (&token[..token.len() - 1], Some(c)),
                _ => (token, None),
            };
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(SchemaError::InvalidContentExpr(source.to_string()));
            }
            let term = |repeat| ContentTerm {
                target: name.to_string(),
                repeat,
            };
            match suffix {
                None => terms.push(term(Repeat::Once)),
                Some('?') => terms.push(term(Repeat::Optional)),
                Some('*') => terms.push(term(Repeat::Many)),
                Some(_) => {
                    terms.push(term(Repeat::Once));
                    terms.push(term(Repeat::Many));
                }
            }
        }
        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn empty() -> Self {
        Self {
            source: String::new(),
            terms: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn accepts_inline(&self) -> bool {
        self.terms
            .iter()
            .any(|t| t.target == NodeGroup::Inline.name() || t.target == TEXT_NODE)
    }

    /// Whether some term of the expression admits this child.
    pub fn allows(&self, kind: &str, group: Option<NodeGroup>) -> bool {
        self.terms.iter().any(|term| term.accepts(kind, group))
    }

    fn targets(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.target.as_str())
    }

    pub fn matches<'a>(
        &self,
        children: impl IntoIterator<Item = (&'a str, Option<NodeGroup>)>,
    ) -> bool {
        let len = self.terms.len();
        let mut states = vec![false; len + 1];
        states[0] = true;
        self.close(&mut states);

        for (kind, group) in children {
            let mut next = vec![false; len + 1];
            for (ix, term) in self.terms.iter().enumerate() {
                if !states[ix] || !term.accepts(kind, group) {
                    continue;
                }
                match term.repeat {
                    Repeat::Once | Repeat::Optional => next[ix + 1] = true,
                    Repeat::Many => next[ix] = true,
                }
            }
            self.close(&mut next);
            if !next.iter().any(|s| *s) {
                return false;
            }
            states = next;
        }

        states[len]
    }

    fn close(&self, states: &mut [bool]) {
        for (ix, term) in self.terms.iter().enumerate() {
            if states[ix] && term.repeat != Repeat::Once {
                states[ix + 1] = true;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub name: &'static str,
    /// `None` marks the attribute as required.
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ParseRule {
    pub tag: &'static str,
    /// Returns `None` when the element should not be parsed by this rule.
    pub get_attrs: fn(&DomElement) -> Option<Attrs>,
}

impl ParseRule {
    pub fn tag(tag: &'static str) -> Self {
        Self {
            tag,
            get_attrs: |_| Some(Attrs::new()),
        }
    }

    pub fn with_attrs(tag: &'static str, get_attrs: fn(&DomElement) -> Option<Attrs>) -> Self {
        Self { tag, get_attrs }
    }
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub kind: String,
    /// `None` for nodes that only appear where they are named explicitly.
    pub group: Option<NodeGroup>,
    pub content: String,
    pub attrs: Vec<AttrSpec>,
    pub leaf: bool,
    pub marks_allowed: bool,
    pub parse_rules: Vec<ParseRule>,
    pub to_dom: fn(&Attrs) -> DomElement,
}

impl NodeSpec {
    pub fn new(kind: impl Into<String>, group: NodeGroup, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            group: Some(group),
            content: content.into(),
            attrs: Vec::new(),
            leaf: false,
            marks_allowed: true,
            parse_rules: Vec::new(),
            to_dom: |_| DomElement::new("div"),
        }
    }

    pub fn ungrouped(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            group: None,
            ..Self::new(kind, NodeGroup::Block, content)
        }
    }

    pub fn leaf(kind: impl Into<String>, group: NodeGroup) -> Self {
        Self {
            leaf: true,
            ..Self::new(kind, group, "")
        }
    }

    pub fn attr(mut self, name: &'static str, default: Option<Value>) -> Self {
        self.attrs.push(AttrSpec { name, default });
        self
    }

    pub fn no_marks(mut self) -> Self {
        self.marks_allowed = false;
        self
    }

    pub fn parse(mut self, rule: ParseRule) -> Self {
        self.parse_rules.push(rule);
        self
    }

    pub fn to_dom(mut self, to_dom: fn(&Attrs) -> DomElement) -> Self {
        self.to_dom = to_dom;
        self
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum MarkParseRule {
    Tag {
        tag: &'static str,
        /// `None` = no match, `Some(None)` = mark without attribute.
        get_attr: fn(&DomElement) -> Option<Option<String>>,
    },
    Style {
        property: &'static str,
        get_attr: fn(&str) -> Option<Option<String>>,
    },
}

#[derive(Debug, Clone)]
pub struct MarkSpec {
    pub mark: MarkType,
    /// Whether typing at the end of the mark continues it.
    pub inclusive: bool,
    pub parse_rules: Vec<MarkParseRule>,
    pub to_dom: fn(Option<&str>) -> DomElement,
}

impl MarkSpec {
    pub fn new(mark: MarkType, to_dom: fn(Option<&str>) -> DomElement) -> Self {
        Self {
            mark,
            inclusive: true,
            parse_rules: Vec::new(),
            to_dom,
        }
    }

    pub fn non_inclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn parse_tag(
        mut self,
        tag: &'static str,
        get_attr: fn(&DomElement) -> Option<Option<String>>,
    ) -> Self {
        self.parse_rules.push(MarkParseRule::Tag { tag, get_attr });
        self
    }

    pub fn parse_style(
        mut self,
        property: &'static str,
        get_attr: fn(&str) -> Option<Option<String>>,
    ) -> Self {
        self.parse_rules
            .push(MarkParseRule::Style { property, get_attr });
        self
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<NodeSpec>,
    content: HashMap<String, ContentExpr>,
    marks: Vec<MarkSpec>,
    doc_content: ContentExpr,
}

impl Schema {
    pub fn new(nodes: Vec<NodeSpec>, mut marks: Vec<MarkSpec>) -> Result<Self, SchemaError> {
        let mut content: HashMap<String, ContentExpr> = HashMap::new();
        for spec in &nodes {
            if spec.kind == DOC_NODE || spec.kind == TEXT_NODE || content.contains_key(&spec.kind) {
                return Err(SchemaError::DuplicateNode(spec.kind.clone()));
            }
            let expr = if spec.leaf {
                ContentExpr::empty()
            } else {
                ContentExpr::parse(&spec.content)?
            };
            content.insert(spec.kind.clone(), expr);
        }

        let doc_content = ContentExpr::parse(DOC_CONTENT)?;
        let is_known_target = |name: &str| {
            name == TEXT_NODE
                || name == NodeGroup::Block.name()
                || name == NodeGroup::Inline.name()
                || content.contains_key(name)
        };
        for (kind, expr) in &content {
            if let Some(name) = expr.targets().find(|name| !is_known_target(name)) {
                return Err(SchemaError::UnknownContentTarget {
                    kind: kind.clone(),
                    name: name.to_string(),
                });
            }
        }

        marks.sort_by_key(|m| m.mark);
        for pair in marks.windows(2) {
            if pair[0].mark == pair[1].mark {
                return Err(SchemaError::DuplicateMark(pair[0].mark.name().to_string()));
            }
        }

        Ok(Self {
            nodes,
            content,
            marks,
            doc_content,
        })
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, kind: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|spec| spec.kind == kind)
    }

    pub fn marks(&self) -> &[MarkSpec] {
        &self.marks
    }

    pub fn mark(&self, mark: MarkType) -> Option<&MarkSpec> {
        self.marks.iter().find(|spec| spec.mark == mark)
    }

    pub fn has_mark(&self, mark: MarkType) -> bool {
        self.mark(mark).is_some()
    }

    pub fn is_inclusive(&self, mark: MarkType) -> bool {
        self.mark(mark).map(|spec| spec.inclusive).unwrap_or(true)
    }

    pub fn content_expr(&self, kind: &str) -> Option<&ContentExpr> {
        if kind == DOC_NODE {
            return Some(&self.doc_content);
        }
        self.content.get(kind)
    }

    pub fn is_textblock(&self, kind: &str) -> bool {
        self.node(kind)
            .filter(|spec| !spec.leaf && spec.group == Some(NodeGroup::Block))
            .and_then(|spec| self.content.get(&spec.kind))
            .is_some_and(|expr| expr.accepts_inline())
    }

    /// Whether the node `kind` may contain a `child` node.
    pub fn allows_child(&self, kind: &str, child: &str) -> bool {
        let group = if child == TEXT_NODE {
            Some(NodeGroup::Inline)
        } else {
            self.node(child).and_then(|spec| spec.group)
        };
        self.content_expr(kind)
            .is_some_and(|expr| expr.allows(child, group))
    }

    pub fn allows_marks(&self, kind: &str) -> bool {
        self.node(kind).is_some_and(|spec| spec.marks_allowed)
    }

    /// Fills attribute defaults and drops undeclared attributes.
    pub fn resolve_attrs(&self, kind: &str, attrs: &Attrs) -> Result<Attrs, SchemaError> {
        let spec = self
            .node(kind)
            .ok_or_else(|| SchemaError::UnknownNodeType(kind.to_string()))?;
        let mut out = Attrs::new();
        for attr in &spec.attrs {
            match attrs.get(attr.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    out.insert(attr.name.to_string(), value.clone());
                }
                None => match &attr.default {
                    Some(default) => {
                        out.insert(attr.name.to_string(), default.clone());
                    }
                    None => {
                        return Err(SchemaError::MissingAttr {
                            kind: kind.to_string(),
                            attr: attr.name.to_string(),
                        });
                    }
                },
            }
        }
        Ok(out)
    }

    /// Builds a checked element (or leaf) node. Invalid content is rejected, never coerced.
    pub fn element(
        &self,
        kind: &str,
        attrs: &Attrs,
        children: Vec<Node>,
    ) -> Result<Node, SchemaError> {
        let spec = self
            .node(kind)
            .ok_or_else(|| SchemaError::UnknownNodeType(kind.to_string()))?;
        let attrs = self.resolve_attrs(kind, attrs)?;
        let node = if spec.leaf {
            if !children.is_empty() {
                return Err(SchemaError::LeafWithContent(kind.to_string()));
            }
            Node::Void(VoidNode {
                kind: kind.to_string(),
                attrs,
            })
        } else {
            Node::Element(ElementNode {
                kind: kind.to_string(),
                attrs,
                children,
            })
        };
        self.check_node(&node)?;
        Ok(node)
    }

    pub fn text(&self, text: impl Into<String>, marks: Marks) -> Result<Node, SchemaError> {
        self.check_marks(&marks)?;
        Ok(Node::Text(TextNode {
            text: text.into(),
            marks,
        }))
    }

    pub fn check_document(&self, doc: &Document) -> Result<(), SchemaError> {
        self.check_children(DOC_NODE, &self.doc_content, true, &doc.children)
    }

    pub fn check_node(&self, node: &Node) -> Result<(), SchemaError> {
        match node {
            Node::Text(text) => self.check_marks(&text.marks),
            Node::Void(void) => {
                let spec = self
                    .node(&void.kind)
                    .filter(|spec| spec.leaf)
                    .ok_or_else(|| SchemaError::UnknownNodeType(void.kind.clone()))?;
                self.check_required_attrs(spec, &void.attrs)
            }
            Node::Element(el) => {
                let spec = self
                    .node(&el.kind)
                    .ok_or_else(|| SchemaError::UnknownNodeType(el.kind.clone()))?;
                if spec.leaf {
                    return Err(SchemaError::LeafWithContent(el.kind.clone()));
                }
                self.check_required_attrs(spec, &el.attrs)?;
                let expr = self
                    .content
                    .get(&el.kind)
                    .ok_or_else(|| SchemaError::UnknownNodeType(el.kind.clone()))?;
                self.check_children(&el.kind, expr, spec.marks_allowed, &el.children)
            }
        }
    }

    fn check_children(
        &self,
        kind: &str,
        expr: &ContentExpr,
        marks_allowed: bool,
        children: &[Node],
    ) -> Result<(), SchemaError> {
        let mut signature: Vec<(&str, Option<NodeGroup>)> = Vec::with_capacity(children.len());
        for child in children {
            signature.push(self.child_signature(child)?);
            let marked = matches!(child, Node::Text(text) if text.marks != Marks::default());
            if marked && !marks_allowed {
                return Err(SchemaError::MarksNotAllowed(kind.to_string()));
            }
        }

        if !expr.matches(signature.iter().copied()) {
            return Err(SchemaError::InvalidContent {
                kind: kind.to_string(),
                expected: expr.source().to_string(),
                found: signature
                    .iter()
                    .map(|(kind, _)| *kind)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        for child in children {
            self.check_node(child)?;
        }
        Ok(())
    }

    fn child_signature<'a>(
        &self,
        node: &'a Node,
    ) -> Result<(&'a str, Option<NodeGroup>), SchemaError> {
        match node {
            Node::Text(_) => Ok((TEXT_NODE, Some(NodeGroup::Inline))),
            Node::Element(ElementNode { kind, .. }) | Node::Void(VoidNode { kind, .. }) => {
                let spec = self
                    .node(kind)
                    .ok_or_else(|| SchemaError::UnknownNodeType(kind.clone()))?;
                Ok((kind.as_str(), spec.group))
            }
        }
    }

    fn check_required_attrs(&self, spec: &NodeSpec, attrs: &Attrs) -> Result<(), SchemaError> {
        for attr in spec.attrs.iter().filter(|a| a.default.is_none()) {
            if attrs.get(attr.name).is_none_or(|v| v.is_null()) {
                return Err(SchemaError::MissingAttr {
                    kind: spec.kind.clone(),
                    attr: attr.name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_marks(&self, marks: &Marks) -> Result<(), SchemaError> {
        match marks.types().find(|mark| !self.has_mark(*mark)) {
            Some(mark) => Err(SchemaError::UnknownMark(mark.name().to_string())),
            None => Ok(()),
        }
    }
}
