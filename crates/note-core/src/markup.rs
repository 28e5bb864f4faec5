//! DOM-like markup codec.
//!
//! The tokenizer is lenient: unknown tags are transparent, unclosed tags close
//! at their parent's end, and stray closing tags are ignored. Parsing is driven
//! by the schema's parse rules; serialization by each spec's `to_dom`.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::{Document, Marks, Node};
use crate::schema::{MarkParseRule, NodeGroup, NodeSpec, Schema, SchemaError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarkupError {
    #[error("markup does not fit the schema: {0}")]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(DomElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<DomNode>,
}

impl DomElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Appends `property: value` to the inline style.
    pub fn with_style(mut self, property: &str, value: impl AsRef<str>) -> Self {
        let decl = format!("{property}: {}", value.as_ref());
        let style = match self.attrs.remove("style") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}; {decl}", existing.trim().trim_end_matches(';'))
            }
            _ => decl,
        };
        self.attrs.insert("style".to_string(), style);
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Value of an inline style property; the last declaration wins.
    pub fn style(&self, property: &str) -> Option<String> {
        self.styles()
            .filter(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value.to_string())
            .last()
    }

    fn styles(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attr("style")
            .unwrap_or_default()
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, value)| !name.is_empty() && !value.is_empty())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(text) => out.push_str(text),
            DomNode::Element(el) if el.tag == "br" => out.push('\n'),
            DomNode::Element(el) => collect_text(&el.children, out),
        }
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "title"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "body", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "header", "hr", "html", "main", "nav", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr",
];

/// Tokenizes `input` into a forest of DOM nodes.
pub fn parse_dom(input: &str) -> Vec<DomNode> {
    let mut stack: Vec<DomElement> = vec![DomElement::new("#root")];
    let mut text = String::new();
    let mut rest = input;

    fn flush_text(stack: &mut [DomElement], text: &mut String) {
        if text.is_empty() {
            return;
        }
        let decoded = html_escape::decode_html_entities(text.as_str()).into_owned();
        if let Some(top) = stack.last_mut() {
            top.children.push(DomNode::Text(decoded));
        }
        text.clear();
    }

    fn close_top(stack: &mut Vec<DomElement>) {
        if stack.len() < 2 {
            return;
        }
        let Some(el) = stack.pop() else {
            return;
        };
        if let Some(parent) = stack.last_mut() {
            parent.children.push(DomNode::Element(el));
        }
    }

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            flush_text(&mut stack, &mut text);
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }
        let next = rest[1..].chars().next();
        match next {
            Some('!') | Some('?') => {
                flush_text(&mut stack, &mut text);
                rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
            }
            Some('/') => {
                flush_text(&mut stack, &mut text);
                let end = rest.find('>').unwrap_or(rest.len());
                let name = rest[2..end].trim().to_ascii_lowercase();
                rest = rest.get(end + 1..).unwrap_or("");
                if let Some(depth) = stack.iter().skip(1).rposition(|el| el.tag == name) {
                    while stack.len() > depth + 1 {
                        close_top(&mut stack);
                    }
                }
            }
            Some(c) if c.is_ascii_alphabetic() => {
                flush_text(&mut stack, &mut text);
                let (el, self_closing, remaining) = read_open_tag(&rest[1..]);
                rest = remaining;
                if SKIPPED_TAGS.contains(&el.tag.as_str()) {
                    let close = format!("</{}", el.tag);
                    rest = find_ascii_ci(rest, &close)
                        .and_then(|ix| rest[ix..].find('>').map(|end| &rest[ix + end + 1..]))
                        .unwrap_or("");
                    continue;
                }
                if self_closing || VOID_TAGS.contains(&el.tag.as_str()) {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(DomNode::Element(el));
                    }
                } else {
                    stack.push(el);
                }
            }
            _ => {
                text.push('<');
                rest = &rest[1..];
            }
        }
    }
    text.push_str(rest);
    flush_text(&mut stack, &mut text);
    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Reads `name attr="v" ...>` and returns the element, whether it self-closed,
/// and the input after `>`.
fn read_open_tag(input: &str) -> (DomElement, bool, &str) {
    let name_end = input
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(input.len());
    let mut el = DomElement::new(input[..name_end].to_ascii_lowercase());
    let mut rest = &input[name_end..];

    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("/>") {
            return (el, true, after);
        }
        if let Some(after) = rest.strip_prefix('>') {
            return (el, false, after);
        }
        if rest.is_empty() {
            return (el, false, rest);
        }
        if let Some(after) = rest.strip_prefix('/') {
            rest = after;
            continue;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                let (raw, remaining) = read_attr_value(after);
                rest = remaining;
                html_escape::decode_html_entities(raw).into_owned()
            }
            None => String::new(),
        };
        if !name.is_empty() {
            el.attrs.entry(name).or_insert(value);
        } else if !rest.is_empty() {
            // Unparseable byte; skip it.
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = &rest[skip..];
        }
    }
}

fn read_attr_value(input: &str) -> (&str, &str) {
    for quote in ['"', '\''] {
        if let Some(after) = input.strip_prefix(quote) {
            return match after.find(quote) {
                Some(end) => (&after[..end], &after[end + 1..]),
                None => (after, ""),
            };
        }
    }
    let end = input
        .find(|c: char| c.is_whitespace() || c == '>')
        .unwrap_or(input.len());
    (&input[..end], &input[end..])
}

/// Whether `text` contains anything that looks like a tag.
fn looks_like_markup(text: &str) -> bool {
    text.match_indices('<').any(|(ix, _)| {
        text[ix + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
    })
}

/// Parses markup into a checked document. Text without tags becomes one
/// paragraph per line.
pub fn parse_markup(text: &str, schema: &Schema) -> Result<Document, MarkupError> {
    if !looks_like_markup(text) {
        return plain_text_document(text, schema);
    }

    let dom = parse_dom(text);
    let parser = MarkupParser { schema };
    let mut blocks = BlockBuilder::default();
    parser.parse_blocks(&dom, &Marks::default(), &mut blocks)?;
    let mut children = parser.finish_blocks(blocks)?;
    if children.is_empty() {
        children.push(schema.element("paragraph", &Default::default(), vec![Node::text("")])?);
    }
    let doc = Document::new(children);
    schema.check_document(&doc)?;
    Ok(doc)
}

fn plain_text_document(text: &str, schema: &Schema) -> Result<Document, MarkupError> {
    let children = text
        .split('\n')
        .map(|line| {
            schema.element(
                "paragraph",
                &Default::default(),
                vec![Node::text(line.strip_suffix('\r').unwrap_or(line))],
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Document::new(children))
}

/// Block-level output plus the inline run waiting for a paragraph.
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Node>,
    inline: InlineBuilder,
}

#[derive(Default)]
struct InlineBuilder {
    nodes: Vec<Node>,
}

impl InlineBuilder {
    fn push_text(&mut self, text: &str, marks: &Marks) {
        let mut text = collapse_whitespace(text);
        let at_line_start = match self.nodes.last() {
            None => true,
            Some(Node::Text(t)) => t.text.ends_with(' '),
            Some(Node::Void(v)) => v.kind == "hard_break",
            Some(Node::Element(_)) => false,
        };
        if at_line_start {
            text = text.trim_start().to_string();
        }
        if text.is_empty() {
            return;
        }
        match self.nodes.last_mut() {
            Some(Node::Text(last)) if last.marks == *marks => last.text.push_str(&text),
            _ => self.nodes.push(Node::marked(text, marks.clone())),
        }
    }

    fn push_leaf(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn is_blank(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finished inline content: trailing whitespace trimmed, never empty.
    fn finish(mut self) -> Vec<Node> {
        if let Some(Node::Text(last)) = self.nodes.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
        self.nodes.retain(|n| !matches!(n, Node::Text(t) if t.text.is_empty()));
        if self.nodes.is_empty() {
            self.nodes.push(Node::text(""));
        }
        self.nodes
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

enum TagMatch<'s> {
    Node(&'s NodeSpec, crate::core::Attrs),
    Mark(Marks),
    Transparent(Marks),
}

struct MarkupParser<'s> {
    schema: &'s Schema,
}

impl<'s> MarkupParser<'s> {
    fn match_tag(&self, el: &DomElement, marks: &Marks) -> TagMatch<'s> {
        for spec in self.schema.nodes() {
            for rule in spec.parse_rules.iter().filter(|r| r.tag == el.tag) {
                if let Some(attrs) = (rule.get_attrs)(el) {
                    return TagMatch::Node(spec, attrs);
                }
            }
        }

        let mut next = marks.clone();
        let mut matched = false;
        for spec in self.schema.marks() {
            for rule in &spec.parse_rules {
                let value = match rule {
                    MarkParseRule::Tag { tag, get_attr } if *tag == el.tag => get_attr(el),
                    MarkParseRule::Style { property, get_attr } => {
                        el.style(property).and_then(|value| get_attr(&value))
                    }
                    MarkParseRule::Tag { .. } => None,
                };
                if let Some(value) = value {
                    next.set(spec.mark, value);
                    matched = true;
                    break;
                }
            }
        }
        if matched {
            TagMatch::Mark(next)
        } else {
            TagMatch::Transparent(next)
        }
    }

    fn parse_blocks(&self, nodes: &[DomNode], marks: &Marks, out: &mut BlockBuilder) -> Result<(), MarkupError> {
        for node in nodes {
            let el = match node {
                DomNode::Text(text) => {
                    if !(out.inline.is_blank() && text.trim().is_empty()) {
                        out.inline.push_text(text, marks);
                    }
                    continue;
                }
                DomNode::Element(el) => el,
            };

            match self.match_tag(el, marks) {
                TagMatch::Node(spec, attrs) if spec.group == Some(NodeGroup::Inline) => {
                    out.inline.push_leaf(self.schema.element(&spec.kind, &attrs, Vec::new())?);
                }
                TagMatch::Node(spec, attrs) => {
                    self.flush_paragraph(out)?;
                    if let Some(block) = self.parse_block(spec, &attrs, el, marks)? {
                        out.blocks.push(block);
                    }
                }
                TagMatch::Mark(next) => self.parse_blocks(&el.children, &next, out)?,
                TagMatch::Transparent(next) => {
                    let is_block = BLOCK_TAGS.contains(&el.tag.as_str());
                    if is_block {
                        self.flush_paragraph(out)?;
                    }
                    self.parse_blocks(&el.children, &next, out)?;
                    if is_block {
                        self.flush_paragraph(out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn flush_paragraph(&self, out: &mut BlockBuilder) -> Result<(), MarkupError> {
        let inline = std::mem::take(&mut out.inline);
        if inline.is_blank() {
            return Ok(());
        }
        let paragraph = self
            .schema
            .element("paragraph", &Default::default(), inline.finish())?;
        out.blocks.push(paragraph);
        Ok(())
    }

    fn finish_blocks(&self, mut out: BlockBuilder) -> Result<Vec<Node>, MarkupError> {
        self.flush_paragraph(&mut out)?;
        Ok(wrap_stray_list_items(out.blocks))
    }

    fn parse_block(
        &self,
        spec: &NodeSpec,
        attrs: &crate::core::Attrs,
        el: &DomElement,
        marks: &Marks,
    ) -> Result<Option<Node>, MarkupError> {
        if spec.leaf {
            return Ok(Some(self.schema.element(&spec.kind, attrs, Vec::new())?));
        }

        if self.schema.is_textblock(&spec.kind) {
            let children = if spec.marks_allowed {
                let mut inline = InlineBuilder::default();
                self.parse_inline(&el.children, marks, &mut inline)?;
                inline.finish()
            } else {
                let text = el.text_content();
                vec![Node::text(text.strip_suffix('\n').unwrap_or(&text))]
            };
            return Ok(Some(self.schema.element(&spec.kind, attrs, children)?));
        }

        let mut inner = BlockBuilder::default();
        self.parse_blocks(&el.children, marks, &mut inner)?;
        let children = self.fit_container(&spec.kind, self.finish_blocks(inner)?)?;
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.schema.element(&spec.kind, attrs, children)?))
    }

    /// Shapes parsed children to the container's grammar: list items get a
    /// leading paragraph, lists wrap stray blocks into items, quotes are never empty.
    fn fit_container(&self, kind: &str, children: Vec<Node>) -> Result<Vec<Node>, MarkupError> {
        let empty_paragraph =
            || self.schema.element("paragraph", &Default::default(), vec![Node::text("")]);

        if kind == "list_item" {
            let mut children = children;
            if !matches!(children.first(), Some(Node::Element(el)) if el.kind == "paragraph") {
                children.insert(0, empty_paragraph()?);
            }
            return Ok(children);
        }

        let holds_items =
            self.schema.allows_child(kind, "list_item") && !self.schema.allows_child(kind, "paragraph");
        if holds_items {
            let mut items = Vec::with_capacity(children.len());
            for child in children {
                let is_item = matches!(&child, Node::Element(el) if el.kind == "list_item");
                if is_item {
                    items.push(child);
                } else {
                    let body = self.fit_container("list_item", vec![child])?;
                    items.push(Node::element("list_item", Default::default(), body));
                }
            }
            return Ok(items);
        }

        let accepts_empty = self
            .schema
            .content_expr(kind)
            .is_some_and(|expr| expr.matches(std::iter::empty()));
        if children.is_empty() && !accepts_empty {
            return Ok(vec![empty_paragraph()?]);
        }
        Ok(children)
    }

    fn parse_inline(&self, nodes: &[DomNode], marks: &Marks, out: &mut InlineBuilder) -> Result<(), MarkupError> {
        for node in nodes {
            let el = match node {
                DomNode::Text(text) => {
                    out.push_text(text, marks);
                    continue;
                }
                DomNode::Element(el) => el,
            };
            match self.match_tag(el, marks) {
                TagMatch::Node(spec, attrs) if spec.leaf && spec.group == Some(NodeGroup::Inline) => {
                    out.push_leaf(self.schema.element(&spec.kind, &attrs, Vec::new())?);
                }
                TagMatch::Node(..) => self.parse_inline(&el.children, marks, out)?,
                TagMatch::Mark(next) | TagMatch::Transparent(next) => {
                    self.parse_inline(&el.children, &next, out)?
                }
            }
        }
        Ok(())
    }
}

/// Consecutive list items outside a list are grouped into a bullet list.
fn wrap_stray_list_items(blocks: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(blocks.len());
    let mut pending: Vec<Node> = Vec::new();
    for block in blocks {
        if matches!(&block, Node::Element(el) if el.kind == "list_item") {
            pending.push(block);
            continue;
        }
        if !pending.is_empty() {
            out.push(Node::element("bullet_list", Default::default(), std::mem::take(&mut pending)));
        }
        out.push(block);
    }
    if !pending.is_empty() {
        out.push(Node::element("bullet_list", Default::default(), pending));
    }
    out
}

/// Serializes `doc` through each spec's `to_dom`, escaping text and attributes.
pub fn to_markup(doc: &Document, schema: &Schema) -> String {
    let mut out = String::new();
    for node in &doc.children {
        write_node(node, schema, &mut out);
    }
    out
}

fn write_node(node: &Node, schema: &Schema, out: &mut String) {
    match node {
        Node::Text(text) => write_text(&text.text, &text.marks, schema, out),
        Node::Void(void) => {
            if let Some(spec) = schema.node(&void.kind) {
                write_open(&(spec.to_dom)(&void.attrs), out);
            }
        }
        Node::Element(el) => match schema.node(&el.kind) {
            Some(spec) => {
                let dom = (spec.to_dom)(&el.attrs);
                write_open(&dom, out);
                for child in &el.children {
                    write_node(child, schema, out);
                }
                out.push_str(&format!("</{}>", dom.tag));
            }
            None => {
                for child in &el.children {
                    write_node(child, schema, out);
                }
            }
        },
    }
}

fn write_text(text: &str, marks: &Marks, schema: &Schema, out: &mut String) {
    if text.is_empty() {
        return;
    }
    let wrappers: Vec<DomElement> = marks
        .types()
        .filter_map(|mark| schema.mark(mark).map(|spec| (spec.to_dom)(marks.attr(mark))))
        .collect();
    for dom in &wrappers {
        write_open(dom, out);
    }
    out.push_str(&html_escape::encode_text(text));
    for dom in wrappers.iter().rev() {
        out.push_str(&format!("</{}>", dom.tag));
    }
}

fn write_open(dom: &DomElement, out: &mut String) {
    out.push('<');
    out.push_str(&dom.tag);
    for (name, value) in &dom.attrs {
        out.push_str(&format!(
            " {name}=\"{}\"",
            html_escape::encode_double_quoted_attribute(value)
        ));
    }
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(nodes: &[DomNode], ix: usize) -> &DomElement {
        match &nodes[ix] {
            DomNode::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn tokenizer_closes_unclosed_tags_and_skips_comments() {
        let dom = parse_dom("<p>a <b>bold<!-- note --></p><p>b</p>");
        assert_eq!(dom.len(), 2);
        let first = element(&dom, 0);
        assert_eq!(first.tag, "p");
        assert_eq!(first.text_content(), "a bold");
        assert_eq!(element(&dom, 1).text_content(), "b");
    }

    #[test]
    fn tokenizer_decodes_entities_and_reads_attrs() {
        let dom = parse_dom(r#"<a href='x?a=1&amp;b=2' data-x=plain>1 &lt; 2</a><br/>"#);
        let a = element(&dom, 0);
        assert_eq!(a.attr("href"), Some("x?a=1&b=2"));
        assert_eq!(a.attr("data-x"), Some("plain"));
        assert_eq!(a.text_content(), "1 < 2");
        assert_eq!(element(&dom, 1).tag, "br");
    }

    #[test]
    fn style_lookup_takes_last_declaration() {
        let el = DomElement::new("span")
            .with_style("color", "red")
            .with_style("color", "blue");
        assert_eq!(el.style("color").as_deref(), Some("blue"));
        assert_eq!(el.style("font-size"), None);
    }

    #[test]
    fn markup_detection() {
        assert!(looks_like_markup("<p>x</p>"));
        assert!(!looks_like_markup("1 < 2 and 3 > 2"));
    }
}
