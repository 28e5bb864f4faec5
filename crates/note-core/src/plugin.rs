use serde_json::Value;

use crate::autoformat::AutoformatInputRules;
use crate::core::{AttrPatch, Attrs, Document, Editor, ElementNode, Node, Point, Selection, TextNode};
use crate::markup::DomElement;
use crate::ops::{Op, Transaction};
use crate::schema::{MarkSpec, MarkType, NodeGroup, NodeSpec, ParseRule, Schema, SchemaError};

pub const ALIGNMENTS: [&str; 4] = ["left", "center", "right", "justify"];

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

#[derive(Debug, Clone)]
pub struct TransactionPreview {
    pub doc: Document,
    pub selection: Selection,
    /// Ops as applied, normalization included.
    pub ops: Vec<Op>,
    pub inverse_ops: Vec<Op>,
}

pub trait TransactionTransform: Send + Sync {
    fn id(&self) -> &'static str;
    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction>;
}

pub trait NotePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn mark_specs(&self) -> Vec<MarkSpec> {
        Vec::new()
    }
    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
}

pub struct PluginRegistry {
    schema: Schema,
    plugin_ids: Vec<&'static str>,
    transaction_transforms: Vec<Box<dyn TransactionTransform>>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn NotePlugin>>) -> Result<Self, SchemaError> {
        let mut plugin_ids = Vec::new();
        let mut node_specs = Vec::new();
        let mut mark_specs = Vec::new();
        let mut transaction_transforms = Vec::new();
        let mut normalize_passes = Vec::new();

        for plugin in plugins {
            plugin_ids.push(plugin.id());
            node_specs.extend(plugin.node_specs());
            mark_specs.extend(plugin.mark_specs());
            transaction_transforms.extend(plugin.transaction_transforms());
            normalize_passes.extend(plugin.normalize_passes());
        }

        Ok(Self {
            schema: Schema::new(node_specs, mark_specs)?,
            plugin_ids,
            transaction_transforms,
            normalize_passes,
        })
    }

    /// The note grammar's plugins, optionally with the markdown-like input rules.
    pub fn note_plugins(input_rules: bool) -> Vec<Box<dyn NotePlugin>> {
        let mut plugins: Vec<Box<dyn NotePlugin>> = vec![
            Box::new(CorePlugin),
            Box::new(HeadingPlugin),
            Box::new(BlockquotePlugin),
            Box::new(CodeBlockPlugin),
            Box::new(ListPlugin),
            Box::new(InlineLeavesPlugin),
            Box::new(BasicMarksPlugin),
            Box::new(TextStyleMarksPlugin),
        ];
        if input_rules {
            plugins.push(Box::new(AutoformatPlugin));
        }
        plugins
    }

    /// Full note grammar with input rules.
    pub fn notes() -> Self {
        Self::new(Self::note_plugins(true)).expect("notes registry must be valid")
    }

    /// Same grammar without input rules.
    pub fn read_only() -> Self {
        Self::new(Self::note_plugins(false)).expect("read-only registry must be valid")
    }

    /// Registry for the given mode.
    pub fn for_mode(read_only: bool) -> Self {
        if read_only {
            Self::read_only()
        } else {
            Self::notes()
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn transaction_transforms(&self) -> &[Box<dyn TransactionTransform>] {
        &self.transaction_transforms
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    /// Ops of the first pass with work to do; the engine reruns until none has.
    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(doc, self);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize");
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point::new(path.clone(), 0)),
            Node::Element(el) => first_text_descendant(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_descendant(&doc.children, &mut Vec::new())
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: crate::core::clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => {
                // Leaves hold no caret; prefer a text sibling.
                resolved_path.pop();
                return first_text_descendant(children, &mut resolved_path);
            }
        }
    }

    match crate::core::node_at_path(doc, &resolved_path)? {
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Text(_) | Node::Void(_) => None,
    }
}

fn path_with(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Pre-order walk over elements, handing each its path.
fn walk_elements<'a>(
    nodes: &'a [Node],
    path: &mut Vec<usize>,
    visit: &mut dyn FnMut(&'a ElementNode, &[usize]),
) {
    for (ix, node) in nodes.iter().enumerate() {
        if let Node::Element(el) = node {
            path.push(ix);
            visit(el, path);
            walk_elements(&el.children, path, visit);
            path.pop();
        }
    }
}

fn align_attrs(dom: &DomElement) -> Option<Attrs> {
    let mut attrs = Attrs::new();
    if let Some(align) = dom.style("text-align").filter(|a| ALIGNMENTS.contains(&a.as_str())) {
        attrs.insert("align".to_string(), Value::String(align));
    }
    Some(attrs)
}

struct CorePlugin;

impl NotePlugin for CorePlugin {
    fn id(&self) -> &'static str {
        "core"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("paragraph", NodeGroup::Block, "inline*")
                .attr("align", Some(Value::from("left")))
                .parse(ParseRule::with_attrs("p", align_attrs))
                .to_dom(|attrs| {
                    let dom = DomElement::new("p");
                    match attrs.get("align").and_then(Value::as_str) {
                        Some(align) if align != "left" => dom.with_style("text-align", align),
                        _ => dom,
                    }
                }),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(RemoveEmptyContainers),
            Box::new(EnsureTextblockHasTextLeaf),
            Box::new(PruneEmptyTextLeaves),
            Box::new(MergeAdjacentTextLeaves),
            Box::new(FillDefaultAttrs),
            Box::new(NormalizeAlignAttrs),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Drops containers (lists, items, quotes) left without children.
struct RemoveEmptyContainers;

impl NormalizePass for RemoveEmptyContainers {
    fn id(&self) -> &'static str {
        "core.remove_empty_containers"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let schema = registry.schema();
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !el.children.is_empty() || schema.is_textblock(&el.kind) {
                return;
            }
            let requires_content = schema
                .content_expr(&el.kind)
                .is_some_and(|expr| !expr.is_empty() && !expr.matches(std::iter::empty()));
            if requires_content {
                ops.push(Op::RemoveNode {
                    path: path.to_vec(),
                });
            }
        });
        ops.reverse();
        ops
    }
}

struct EnsureTextblockHasTextLeaf;

impl NormalizePass for EnsureTextblockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_textblock_has_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            let has_text = el.children.iter().any(|child| matches!(child, Node::Text(_)));
            if !has_text && registry.schema().is_textblock(&el.kind) {
                ops.push(Op::InsertNode {
                    path: path_with(path, el.children.len()),
                    node: Node::Text(TextNode::plain("")),
                });
            }
        });
        ops
    }
}

/// Removes empty text leaves sitting next to non-empty text.
struct PruneEmptyTextLeaves;

impl NormalizePass for PruneEmptyTextLeaves {
    fn id(&self) -> &'static str {
        "core.prune_empty_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !registry.schema().is_textblock(&el.kind) {
                return;
            }
            let non_empty_text =
                |ix: Option<usize>| matches!(ix.and_then(|ix| el.children.get(ix)), Some(Node::Text(t)) if !t.text.is_empty());
            for (ix, child) in el.children.iter().enumerate().rev() {
                let Node::Text(t) = child else {
                    continue;
                };
                if t.text.is_empty() && (non_empty_text(ix.checked_sub(1)) || non_empty_text(Some(ix + 1))) {
                    ops.push(Op::RemoveNode {
                        path: path_with(path, ix),
                    });
                }
            }
        });
        ops.reverse();
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if !registry.schema().is_textblock(&el.kind) || el.children.len() < 2 {
                return;
            }
            let mut ix = el.children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &el.children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = el.children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }
                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = el.children.get(start) else {
                    continue;
                };
                let appended: String = el.children[start + 1..=ix]
                    .iter()
                    .filter_map(Node::as_text)
                    .map(|t| t.text.as_str())
                    .collect();

                if !appended.is_empty() {
                    ops.push(Op::InsertText {
                        path: path_with(path, start),
                        offset: first.text.len(),
                        text: appended,
                    });
                }
                for remove_ix in (start + 1..=ix).rev() {
                    ops.push(Op::RemoveNode {
                        path: path_with(path, remove_ix),
                    });
                }
                ix = start;
            }
        });
        ops
    }
}

/// Fills declared attribute defaults and drops undeclared attributes.
struct FillDefaultAttrs;

impl NormalizePass for FillDefaultAttrs {
    fn id(&self) -> &'static str {
        "core.fill_default_attrs"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        fn patch_for(schema: &Schema, kind: &str, attrs: &Attrs) -> Option<AttrPatch> {
            let resolved = schema.resolve_attrs(kind, attrs).ok()?;
            if &resolved == attrs {
                return None;
            }
            let set: Attrs = resolved
                .iter()
                .filter(|(k, v)| attrs.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let remove = attrs
                .keys()
                .filter(|k| !resolved.contains_key(*k))
                .cloned()
                .collect();
            Some(AttrPatch { set, remove })
        }

        fn walk(nodes: &[Node], path: &mut Vec<usize>, schema: &Schema, ops: &mut Vec<Op>) {
            for (ix, node) in nodes.iter().enumerate() {
                path.push(ix);
                let patch = match node {
                    Node::Element(el) => patch_for(schema, &el.kind, &el.attrs),
                    Node::Void(v) => patch_for(schema, &v.kind, &v.attrs),
                    Node::Text(_) => None,
                };
                if let Some(patch) = patch {
                    ops.push(Op::SetNodeAttrs {
                        path: path.clone(),
                        patch,
                    });
                }
                if let Node::Element(el) = node {
                    walk(&el.children, path, schema, ops);
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), registry.schema(), &mut ops);
        ops
    }
}

/// Resets unknown `align` values to `left`.
struct NormalizeAlignAttrs;

impl NormalizePass for NormalizeAlignAttrs {
    fn id(&self) -> &'static str {
        "core.normalize_align_attrs"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            let declared = registry
                .schema()
                .node(&el.kind)
                .is_some_and(|spec| spec.has_attr("align"));
            if !declared {
                return;
            }
            let valid = el
                .attr_str("align")
                .is_some_and(|align| ALIGNMENTS.contains(&align));
            if !valid {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("align", Value::from("left")),
                });
            }
        });
        ops
    }
}

struct HeadingPlugin;

impl NotePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        fn level_rule(tag: &'static str) -> ParseRule {
            ParseRule::with_attrs(tag, |dom| {
                let level: u64 = dom.tag[1..].parse().ok()?;
                Some(Attrs::from([("level".to_string(), Value::from(level))]))
            })
        }

        let mut spec = NodeSpec::new("heading", NodeGroup::Block, "inline*")
            .attr("level", Some(Value::from(1)))
            .to_dom(|attrs| {
                let level = attrs
                    .get("level")
                    .and_then(Value::as_u64)
                    .unwrap_or(1)
                    .clamp(1, 6);
                DomElement::new(format!("h{level}"))
            });
        for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            spec = spec.parse(level_rule(tag));
        }
        vec![spec]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if el.kind != "heading" {
                return;
            }
            let current = el.attr_u64("level");
            let level = current.unwrap_or(1).clamp(1, 6);
            if current != Some(level) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("level", Value::from(level)),
                });
            }
        });
        ops
    }
}

struct BlockquotePlugin;

impl NotePlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("blockquote", NodeGroup::Block, "block+")
                .parse(ParseRule::tag("blockquote"))
                .to_dom(|_| DomElement::new("blockquote")),
        ]
    }
}

struct CodeBlockPlugin;

impl NotePlugin for CodeBlockPlugin {
    fn id(&self) -> &'static str {
        "code_block"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("code_block", NodeGroup::Block, "text*")
                .no_marks()
                .parse(ParseRule::tag("pre"))
                .to_dom(|_| DomElement::new("pre")),
        ]
    }
}

struct ListPlugin;

impl NotePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("bullet_list", NodeGroup::Block, "list_item+")
                .parse(ParseRule::tag("ul"))
                .to_dom(|_| DomElement::new("ul")),
            NodeSpec::new("ordered_list", NodeGroup::Block, "list_item+")
                .attr("order", Some(Value::from(1)))
                .parse(ParseRule::with_attrs("ol", |dom| {
                    let order = dom
                        .attr("start")
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(1);
                    Some(Attrs::from([("order".to_string(), Value::from(order))]))
                }))
                .to_dom(|attrs| {
                    let dom = DomElement::new("ol");
                    match attrs.get("order").and_then(Value::as_u64) {
                        Some(order) if order != 1 => dom.with_attr("start", order.to_string()),
                        _ => dom,
                    }
                }),
            NodeSpec::ungrouped("list_item", "paragraph block*")
                .parse(ParseRule::tag("li"))
                .to_dom(|_| DomElement::new("li")),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureListItemLeadingParagraph),
            Box::new(NormalizeOrderedListOrder),
        ]
    }
}

struct EnsureListItemLeadingParagraph;

impl NormalizePass for EnsureListItemLeadingParagraph {
    fn id(&self) -> &'static str {
        "list.ensure_leading_paragraph"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            let leads_with_paragraph = el
                .children
                .first()
                .is_some_and(|first| first.kind() == "paragraph");
            if el.kind == "list_item" && !el.children.is_empty() && !leads_with_paragraph {
                ops.push(Op::InsertNode {
                    path: path_with(path, 0),
                    node: Node::paragraph(""),
                });
            }
        });
        ops.reverse();
        ops
    }
}

struct NormalizeOrderedListOrder;

impl NormalizePass for NormalizeOrderedListOrder {
    fn id(&self) -> &'static str {
        "list.normalize_order"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(&doc.children, &mut Vec::new(), &mut |el, path| {
            if el.kind != "ordered_list" {
                return;
            }
            let current = el.attr_u64("order");
            let order = current.unwrap_or(1).max(1);
            if current != Some(order) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("order", Value::from(order)),
                });
            }
        });
        ops
    }
}

struct InlineLeavesPlugin;

impl NotePlugin for InlineLeavesPlugin {
    fn id(&self) -> &'static str {
        "inline_leaves"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::leaf("image", NodeGroup::Inline)
                .attr("src", None)
                .attr("alt", Some(Value::Null))
                .attr("title", Some(Value::Null))
                .parse(ParseRule::with_attrs("img", |dom| {
                    let mut attrs = Attrs::new();
                    attrs.insert("src".to_string(), Value::from(dom.attr("src")?));
                    for name in ["alt", "title"] {
                        if let Some(value) = dom.attr(name) {
                            attrs.insert(name.to_string(), Value::from(value));
                        }
                    }
                    Some(attrs)
                }))
                .to_dom(|attrs| {
                    let mut dom = DomElement::new("img");
                    for name in ["src", "alt", "title"] {
                        if let Some(value) = attrs.get(name).and_then(Value::as_str) {
                            dom = dom.with_attr(name, value);
                        }
                    }
                    dom
                }),
            NodeSpec::leaf("hard_break", NodeGroup::Inline)
                .parse(ParseRule::tag("br"))
                .to_dom(|_| DomElement::new("br")),
        ]
    }
}

fn style_value(value: &str) -> Option<Option<String>> {
    let value = value.trim();
    (!value.is_empty()).then(|| Some(value.to_string()))
}

struct BasicMarksPlugin;

impl NotePlugin for BasicMarksPlugin {
    fn id(&self) -> &'static str {
        "marks.basic"
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![
            MarkSpec::new(MarkType::Bold, |_| DomElement::new("strong"))
                .parse_tag("strong", |_| Some(None))
                .parse_tag("b", |_| Some(None))
                .parse_style("font-weight", |value| {
                    let bold = value == "bold"
                        || value == "bolder"
                        || value.parse::<u32>().is_ok_and(|weight| weight >= 600);
                    bold.then_some(None)
                }),
            MarkSpec::new(MarkType::Italic, |_| DomElement::new("em"))
                .parse_tag("em", |_| Some(None))
                .parse_tag("i", |_| Some(None))
                .parse_style("font-style", |value| (value == "italic").then_some(None)),
            MarkSpec::new(MarkType::Underline, |_| DomElement::new("u"))
                .parse_tag("u", |_| Some(None))
                .parse_style("text-decoration", |value| {
                    value.contains("underline").then_some(None)
                }),
            MarkSpec::new(MarkType::Strikethrough, |_| DomElement::new("s"))
                .parse_tag("s", |_| Some(None))
                .parse_tag("del", |_| Some(None))
                .parse_tag("strike", |_| Some(None))
                .parse_style("text-decoration", |value| {
                    value.contains("line-through").then_some(None)
                }),
            MarkSpec::new(MarkType::Code, |_| DomElement::new("code"))
                .parse_tag("code", |_| Some(None)),
            MarkSpec::new(MarkType::Link, |href| {
                DomElement::new("a").with_attr("href", href.unwrap_or_default())
            })
            .non_inclusive()
            .parse_tag("a", |dom| dom.attr("href").map(|href| Some(href.to_string()))),
        ]
    }
}

struct TextStyleMarksPlugin;

impl NotePlugin for TextStyleMarksPlugin {
    fn id(&self) -> &'static str {
        "marks.text_style"
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![
            MarkSpec::new(MarkType::TextColor, |color| {
                DomElement::new("span").with_style("color", color.unwrap_or_default())
            })
            .parse_style("color", style_value),
            MarkSpec::new(MarkType::BackgroundColor, |color| {
                DomElement::new("span").with_style("background-color", color.unwrap_or_default())
            })
            .parse_style("background-color", style_value),
            MarkSpec::new(MarkType::FontSize, |size| {
                DomElement::new("span").with_style("font-size", size.unwrap_or_default())
            })
            .parse_style("font-size", style_value),
            MarkSpec::new(MarkType::FontFamily, |family| {
                DomElement::new("span").with_style("font-family", family.unwrap_or_default())
            })
            .parse_style("font-family", style_value),
        ]
    }
}

struct AutoformatPlugin;

impl NotePlugin for AutoformatPlugin {
    fn id(&self) -> &'static str {
        "autoformat"
    }

    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        vec![Box::new(AutoformatInputRules)]
    }
}
