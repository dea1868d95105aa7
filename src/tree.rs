//! Semantic tree structure for page-anchored paper indexes.
//!
//! A tree is rooted at a node with id `"root"`. Inner nodes group sections
//! and subsections; leaves are fact points that point back into the PDF
//! through [`Position`].

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Id of the root node.
pub const ROOT_ID: &str = "root";

/// Location of a node's source in the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed page number.
    pub page: usize,

    /// Short excerpt from that page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl Position {
    pub fn page(page: usize) -> Self {
        Self { page, quote: None }
    }

    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    /// Read a position from loosely-typed model output.
    ///
    /// Accepts integer or numeric-string pages; anything without a page
    /// of at least 1 yields `None`.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let page = match obj.get("page")? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        if page == 0 {
            return None;
        }
        let quote = obj
            .get("quote")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            page: page as usize,
            quote,
        })
    }
}

/// A node in the semantic tree.
///
/// Reading is lenient: numeric ids, numeric-string pages and a single
/// child object are accepted, and non-object entries in `children` are
/// dropped. Writing reproduces the shape that was read, so a well-formed
/// node serializes back to the same JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawNode")]
pub struct TreeNode {
    /// Identifier, unique within the tree.
    pub id: String,

    /// Short topic or section name.
    pub label: String,

    /// Summary text; usually absent on structural nodes.
    pub content: Option<String>,

    /// Source location; `None` on the root.
    pub position: Option<Position>,

    /// Ordered child nodes.
    pub children: Vec<TreeNode>,

    /// Fields the model emitted beyond the schema, kept verbatim.
    pub extra: Map<String, Value>,

    source: SourceShape,
}

/// How a parsed node was written, where the typed fields lose it.
#[derive(Debug, Clone, Default, PartialEq)]
struct SourceShape {
    /// `content` was an explicit `null`.
    null_content: bool,
    /// `position` as written when it yielded no [`Position`] (`null`, page 0, ...).
    raw_position: Option<Value>,
    /// The node had no `children` key.
    no_children_key: bool,
    /// Non-object entries dropped from `children`.
    dropped_children: usize,
}

/// Wire form of a node before coercion. `Some(Value::Null)` marks a key
/// that was present with a `null` value.
#[derive(Deserialize)]
struct RawNode {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    label: String,
    #[serde(default, deserialize_with = "present")]
    content: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    position: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    children: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => return Err(de::Error::custom(format!("expected string, got {}", other))),
    })
}

fn child_node(value: Value) -> Result<TreeNode, String> {
    TreeNode::deserialize(value).map_err(|e| e.to_string())
}

impl TryFrom<RawNode> for TreeNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let mut source = SourceShape::default();

        let content = match raw.content {
            None => None,
            Some(Value::Null) => {
                source.null_content = true;
                None
            }
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };

        let position = match raw.position {
            None => None,
            Some(value) => {
                let position = Position::from_value(&value);
                if position.is_none() {
                    source.raw_position = Some(value);
                }
                position
            }
        };

        let children = match raw.children {
            None => {
                source.no_children_key = true;
                Vec::new()
            }
            Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_object() {
                        children.push(child_node(item)?);
                    } else {
                        source.dropped_children += 1;
                    }
                }
                children
            }
            Some(Value::Object(obj)) => vec![child_node(Value::Object(obj))?],
            Some(other) => return Err(format!("expected children array, got {}", other)),
        };

        Ok(Self {
            id: raw.id,
            label: raw.label,
            content,
            position,
            children,
            extra: raw.extra,
            source,
        })
    }
}

impl Serialize for TreeNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("label", &self.label)?;
        match &self.content {
            Some(content) => map.serialize_entry("content", content)?,
            None if self.source.null_content => map.serialize_entry("content", &Value::Null)?,
            None => {}
        }
        match (&self.position, &self.source.raw_position) {
            (Some(position), _) => map.serialize_entry("position", position)?,
            (None, Some(raw)) => map.serialize_entry("position", raw)?,
            (None, None) => {}
        }
        if !self.children.is_empty() || !self.source.no_children_key {
            map.serialize_entry("children", &self.children)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl TreeNode {
    /// Create a new tree node.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            content: None,
            position: None,
            children: Vec::new(),
            extra: Map::new(),
            source: SourceShape::default(),
        }
    }

    /// Create a root node labelled with the paper title.
    pub fn root(title: impl Into<String>) -> Self {
        Self::new(ROOT_ID, title)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self.source.raw_position = None;
        self
    }

    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.add_child(child);
        self
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Recursively count all nodes in this subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|n| n.node_count()).sum::<usize>()
    }

    /// Depth of this subtree; a lone node has depth 1.
    pub fn max_depth(&self) -> usize {
        1 + self.children.iter().map(|n| n.max_depth()).max().unwrap_or(0)
    }

    /// Find all leaf nodes (nodes without children).
    pub fn leaves(&self) -> Vec<&TreeNode> {
        if self.children.is_empty() {
            vec![self]
        } else {
            self.children.iter().flat_map(|n| n.leaves()).collect()
        }
    }

    /// Find a node by id.
    pub fn find_by_id(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }

    /// Sorted set of pages referenced anywhere in this subtree.
    pub fn pages_referenced(&self) -> BTreeSet<usize> {
        let mut pages = BTreeSet::new();
        self.walk(&mut |node| {
            if let Some(pos) = &node.position {
                pages.insert(pos.page);
            }
        });
        pages
    }

    /// Visit every node in depth-first pre-order.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a TreeNode),
    {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Check the structural invariants of a tree rooted at `self`.
    ///
    /// `page_count`, when known, bounds the valid page numbers.
    pub fn validate(&self, page_count: Option<usize>) -> TreeReport {
        let mut report = TreeReport {
            root_has_position: self.position.is_some(),
            root_id_mismatch: self.id != ROOT_ID,
            ..Default::default()
        };
        let mut seen = HashSet::new();

        self.walk(&mut |node| {
            if node.id.is_empty() {
                report.missing_ids += 1;
            } else if !seen.insert(node.id.as_str()) {
                report.duplicate_ids.push(node.id.clone());
            }

            // The root is allowed to be a bare leaf only if the tree is empty.
            if node.is_leaf() && node.position.is_none() && !std::ptr::eq(node, self) {
                report.unpositioned_leaves.push(node.id.clone());
            }

            if let (Some(pos), Some(max)) = (&node.position, page_count) {
                if pos.page > max {
                    report.pages_out_of_range.push((node.id.clone(), pos.page));
                }
            }

            if node.source.dropped_children > 0 {
                report
                    .dropped_children
                    .push((node.id.clone(), node.source.dropped_children));
            }
        });

        report
    }

    /// Format the tree as a string for display.
    pub fn format_tree(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let page_str = self
            .position
            .as_ref()
            .map(|p| format!(" [p.{}]", p.page))
            .unwrap_or_default();

        let mut result = format!("{}{} ({}){}\n", prefix, self.label, self.id, page_str);

        for child in &self.children {
            result.push_str(&child.format_tree(indent + 1));
        }

        result
    }
}

/// Structural defects found in a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeReport {
    pub root_id_mismatch: bool,
    pub root_has_position: bool,
    pub missing_ids: usize,
    pub duplicate_ids: Vec<String>,
    pub unpositioned_leaves: Vec<String>,
    pub pages_out_of_range: Vec<(String, usize)>,
    /// Parent id and number of non-object `children` entries dropped on read.
    pub dropped_children: Vec<(String, usize)>,
}

impl TreeReport {
    pub fn is_clean(&self) -> bool {
        self.defects().is_empty()
    }

    /// Human-readable list of defects.
    pub fn defects(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.root_id_mismatch {
            out.push(format!("root id is not \"{}\"", ROOT_ID));
        }
        if self.root_has_position {
            out.push("root carries a position".to_string());
        }
        if self.missing_ids > 0 {
            out.push(format!("{} node(s) without an id", self.missing_ids));
        }
        for id in &self.duplicate_ids {
            out.push(format!("duplicate node id '{}'", id));
        }
        for id in &self.unpositioned_leaves {
            out.push(format!("leaf '{}' has no position.page", id));
        }
        for (id, page) in &self.pages_out_of_range {
            out.push(format!("node '{}' points at page {} beyond the document", id, page));
        }
        for (id, count) in &self.dropped_children {
            out.push(format!("node '{}' had {} non-object child entr(ies) dropped", id, count));
        }
        out
    }
}
