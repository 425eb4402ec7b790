//! Conversion between flat description text and the CMS block document.
//!
//! # Design
//! The CMS stores a todo description as an ordered list of blocks, each
//! holding inline nodes. Forms only ever edit a single string. `to_structured`
//! goes from the string to blocks, `to_flat_text` comes back. Both are pure,
//! allocate fresh output and never fail.
//!
//! Stored descriptions come back in more than one shape: a block list, a bare
//! block, or a plain string on legacy records. `RichText` enumerates those
//! shapes as a closed set so the reader dispatches on a tag instead of checking
//! properties at every step.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::{
    self, value::MapAccessDeserializer, DeserializeOwned, IgnoredAny, MapAccess, SeqAccess, Visitor,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Separator placed between paragraphs in flat text.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Inline node kind that carries literal text.
pub const TEXT_NODE: &str = "text";

/// Kind of a top-level block.
///
/// Only `Paragraph` is ever produced. Headings are accepted on read in both
/// the `"heading"` and `"heading-N"` spellings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    Paragraph,
    Heading { level: Option<u8> },
    #[default]
    Unknown,
    Other(String),
}

impl BlockKind {
    /// Whether text under a block of this kind is extracted when reading a
    /// block list.
    pub fn is_readable(&self) -> bool {
        match self {
            BlockKind::Paragraph | BlockKind::Heading { .. } => true,
            BlockKind::Other(name) => name.starts_with("heading"),
            BlockKind::Unknown => false,
        }
    }
}

impl From<String> for BlockKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "paragraph" => BlockKind::Paragraph,
            "heading" => BlockKind::Heading { level: None },
            "" => BlockKind::Unknown,
            _ => match name.strip_prefix("heading-").and_then(|n| n.parse::<u8>().ok()) {
                Some(level) => BlockKind::Heading { level: Some(level) },
                None => BlockKind::Other(name),
            },
        }
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Paragraph => "paragraph".to_string(),
            BlockKind::Heading { level: None } => "heading".to_string(),
            BlockKind::Heading { level: Some(level) } => format!("heading-{level}"),
            BlockKind::Unknown => String::new(),
            BlockKind::Other(name) => name,
        }
    }
}

/// Inline node inside a block.
///
/// A node of kind `text` is a leaf and carries `text`. Any other node may wrap
/// further nodes in `children` (bold, links, lists of marks). Attributes the
/// codec does not interpret, like `bold: true` or `url`, ride along in
/// `marks`.
///
/// Reading is lenient node by node. A child that is not an object becomes an
/// empty node, a numeric or boolean `text` is kept in its printed form, and a
/// `children` that is not a list is kept in `marks` and never descended.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InlineNode {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<InlineNode>>,
    #[serde(flatten)]
    pub marks: Map<String, Value>,
}

impl InlineNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: TEXT_NODE.to_string(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn wrapper(kind: impl Into<String>, children: Vec<InlineNode>) -> Self {
        Self {
            kind: kind.into(),
            children: Some(children),
            ..Self::default()
        }
    }
}

impl<'de> Deserialize<'de> for InlineNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(InlineNodeVisitor)
    }
}

struct InlineNodeVisitor;

impl<'de> Visitor<'de> for InlineNodeVisitor {
    type Value = InlineNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an inline node")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<InlineNode, A::Error> {
        let mut node = InlineNode::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                // A kind that is not a string is dropped; `type` always serializes.
                "type" => {
                    if let Value::String(kind) = map.next_value::<Value>()? {
                        node.kind = kind;
                    }
                }
                "text" => match map.next_value::<Value>()? {
                    Value::String(text) => node.text = Some(text),
                    scalar @ (Value::Number(_) | Value::Bool(_)) => {
                        node.text = Some(scalar.to_string())
                    }
                    other => {
                        node.marks.insert(key, other);
                    }
                },
                "children" => match map.next_value::<Children>()? {
                    Children::Nodes(nodes) => node.children = Some(nodes),
                    Children::Other(other) => {
                        node.marks.insert(key, other);
                    }
                },
                _ => {
                    let value = map.next_value::<Value>()?;
                    node.marks.insert(key, value);
                }
            }
        }
        Ok(node)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<InlineNode, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(InlineNode::default())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<InlineNode, E> {
        Ok(InlineNode::default())
    }
}

/// The `children` field of an inline node: a list to descend, or anything
/// else kept verbatim.
enum Children {
    Nodes(Vec<InlineNode>),
    Other(Value),
}

impl<'de> Deserialize<'de> for Children {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ChildrenVisitor)
    }
}

struct ChildrenVisitor;

impl<'de> Visitor<'de> for ChildrenVisitor {
    type Value = Children;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("inline children")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Children, A::Error> {
        let mut nodes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(node) = seq.next_element::<InlineNode>()? {
            nodes.push(node);
        }
        Ok(Children::Nodes(nodes))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Children, A::Error> {
        Value::deserialize(MapAccessDeserializer::new(map)).map(Children::Other)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Children, E> {
        Ok(Children::Other(Value::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Children, E> {
        Ok(Children::Other(Value::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Children, E> {
        Ok(Children::Other(Value::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Children, E> {
        Ok(Children::Other(Value::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Children, E> {
        Ok(Children::Other(Value::from(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Children, E> {
        Ok(Children::Other(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Children, E> {
        Ok(Children::Other(Value::Null))
    }
}

/// Top-level block of a structured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type", default)]
    pub kind: BlockKind,
    pub children: Vec<InlineNode>,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Block {
    /// A paragraph holding exactly one text leaf.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            children: vec![InlineNode::text(text)],
            attrs: Map::new(),
        }
    }

    /// Reads a block list element. Elements that do not have a block shape
    /// become an empty `Unknown` block so the rest of the list still reads.
    fn from_element(element: &Value) -> Self {
        read_unbounded(element).unwrap_or_else(|_| Self {
            kind: BlockKind::Unknown,
            children: Vec::new(),
            attrs: Map::new(),
        })
    }

    /// Concatenation of every reachable text leaf, depth first, left to
    /// right. Wrapper nodes are descended whatever their kind.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&InlineNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.kind == TEXT_NODE {
                if let Some(text) = &node.text {
                    out.push_str(text);
                }
            } else if let Some(children) = &node.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }
}

/// A description value as stored by the CMS.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RichText {
    /// The regular shape: an ordered list of blocks.
    Blocks(Vec<Block>),
    /// A single block not wrapped in a list.
    Block(Block),
    /// Legacy records that kept the description as a string.
    Plain(String),
    #[default]
    Absent,
    Unrecognized(Value),
}

impl From<Value> for RichText {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RichText::Absent,
            Value::String(text) => RichText::Plain(text),
            Value::Array(items) => {
                RichText::Blocks(items.iter().map(Block::from_element).collect())
            }
            Value::Object(fields) => {
                let value = Value::Object(fields);
                if !value.get("children").is_some_and(Value::is_array) {
                    return RichText::Unrecognized(value);
                }
                match read_unbounded(&value) {
                    Ok(block) => RichText::Block(block),
                    Err(_) => RichText::Unrecognized(value),
                }
            }
            other => RichText::Unrecognized(other),
        }
    }
}

impl RichText {
    /// Reads a stored description from JSON text, at any nesting depth.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        from_str_unbounded(json)
    }
}

/// Parses JSON text with serde_json's recursion limit off. The stack grows on
/// demand instead, so nesting depth is bounded by memory only.
pub(crate) fn from_str_unbounded<T: DeserializeOwned>(json: &str) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Reads a block out of an already parsed value, growing the stack on demand.
fn read_unbounded(value: &Value) -> serde_json::Result<Block> {
    Block::deserialize(serde_stacker::Deserializer::new(value))
}

impl From<Vec<Block>> for RichText {
    fn from(blocks: Vec<Block>) -> Self {
        RichText::Blocks(blocks)
    }
}

impl Serialize for RichText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RichText::Blocks(blocks) => blocks.serialize(serializer),
            RichText::Block(block) => block.serialize(serializer),
            RichText::Plain(text) => serializer.serialize_str(text),
            RichText::Absent => serializer.serialize_none(),
            RichText::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RichText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RichText::from)
    }
}

fn paragraph_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A run of 3+ newlines collapses into a single break.
    PATTERN.get_or_init(|| Regex::new(r"\n\n+").expect("paragraph break pattern is valid"))
}

/// Converts flat text into a block document.
///
/// Absent or empty input yields one paragraph with one empty text leaf, never
/// an empty list. Otherwise the text is split on blank lines and every
/// segment becomes a paragraph holding its trimmed content, including
/// segments that trim down to nothing.
pub fn to_structured(text: Option<&str>) -> Vec<Block> {
    let text = text.unwrap_or_default();
    if text.is_empty() {
        return vec![Block::paragraph(String::new())];
    }
    paragraph_break()
        .split(text)
        .map(|segment| Block::paragraph(segment.trim()))
        .collect()
}

/// Converts any stored description shape back into flat text.
pub fn to_flat_text(value: &RichText) -> String {
    match value {
        RichText::Absent => String::new(),
        RichText::Plain(text) => text.clone(),
        RichText::Blocks(blocks) => document_to_flat_text(blocks),
        RichText::Block(block) => block.plain_text(),
        RichText::Unrecognized(shape) => {
            tracing::warn!(%shape, "unhandled rich text format");
            String::new()
        }
    }
}

/// Flattens a block list. Blocks of a kind that is not readable contribute an
/// empty string but still take their place in the join.
pub fn document_to_flat_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            if block.kind.is_readable() {
                block.plain_text()
            } else {
                String::new()
            }
        })
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn trimmed_single_paragraph_round_trips(s in "[a-zA-Z0-9 .,\t\n]{1,60}") {
            let text = s.trim();
            prop_assume!(!text.is_empty() && !text.contains("\n\n"));
            let doc = to_structured(Some(text));
            prop_assert_eq!(doc.len(), 1);
            prop_assert_eq!(to_flat_text(&RichText::from(doc)), text);
        }

        #[test]
        fn one_block_per_break_separated_segment(s in "[a-z \n]{1,60}") {
            let doc = to_structured(Some(&s));
            prop_assert_eq!(doc.len(), paragraph_break().split(&s).count());
            prop_assert!(doc.iter().all(|b| b.kind == BlockKind::Paragraph));
        }

        #[test]
        fn flat_text_joins_trimmed_segments(
            segments in prop::collection::vec("[a-z ]{1,12}", 1..6),
            gaps in prop::collection::vec(2usize..5, 5),
        ) {
            let mut input = String::new();
            for (i, segment) in segments.iter().enumerate() {
                if i > 0 {
                    input.push_str(&"\n".repeat(gaps[i - 1]));
                }
                input.push_str(segment);
            }
            let expected = segments
                .iter()
                .map(|segment| segment.trim())
                .collect::<Vec<_>>()
                .join(PARAGRAPH_SEPARATOR);
            prop_assert_eq!(document_to_flat_text(&to_structured(Some(&input))), expected);
        }
    }
}
