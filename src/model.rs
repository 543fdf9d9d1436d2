use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

use crate::action::{ActionError, DiagramRef, UiAction, parse_action};

// ────────────────────────────────────────────────────────────────────────────
// BlockId
// ────────────────────────────────────────────────────────────────────────────

/// Identifier of a model block in the generated code, e.g. `model/Sub/Gain1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the identifier.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The identifier with `/` escaped, for use in menu paths and textual
    /// debugger commands where `/` is a separator.
    pub fn escaped(&self) -> String {
        self.0.replace('/', "\\/")
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for BlockId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Raw diagram JSON, as printed by the converter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(default)]
    diagrams: Vec<RawDiagram>,
}

#[derive(Debug, Deserialize)]
struct RawDiagram {
    name: String,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: IndexMap<String, Value>,
    #[serde(default)]
    children: Vec<RawItem>,
    /// Everything else (position, style, text, ...).
    #[serde(flatten)]
    attributes: IndexMap<String, Value>,
}

// ────────────────────────────────────────────────────────────────────────────
// Diagram collection
// ────────────────────────────────────────────────────────────────────────────

/// Whether an item stands for a model block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// Purely visual item (port, label, decoration, grouping box).
    Container,
    /// Item carrying the identifier of the block it renders.
    Block(BlockId),
}

/// A visual node of a diagram.
#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
    /// Action run on double-click, if the converter attached a valid one.
    pub on_double_click: Option<UiAction>,
    /// Free-form item data (`data` object of the JSON).
    pub data: IndexMap<String, Value>,
    /// Display attributes, kept as-is for the rendering widget.
    pub attributes: IndexMap<String, Value>,
    pub children: Vec<Item>,
}

impl Item {
    pub fn block_id(&self) -> Option<&BlockId> {
        match &self.kind {
            ItemKind::Block(id) => Some(id),
            ItemKind::Container => None,
        }
    }
}

/// A single named diagram (top-level system or one subsystem).
#[derive(Debug, Clone)]
pub struct Diagram {
    pub name: String,
    pub items: Vec<Item>,
}

/// Location of an item: diagram index and child indices from the top-level
/// item down. `path` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemRef {
    pub diagram: usize,
    pub path: Vec<usize>,
}

impl ItemRef {
    pub fn new(diagram: usize, path: Vec<usize>) -> Self {
        Self { diagram, path }
    }

    /// The top-level item containing this one (possibly itself).
    pub fn top_level(&self) -> ItemRef {
        ItemRef {
            diagram: self.diagram,
            path: self.path.iter().take(1).copied().collect(),
        }
    }

    /// The containing item, or `None` for a top-level item.
    pub fn parent(&self) -> Option<ItemRef> {
        if self.path.len() <= 1 {
            return None;
        }
        Some(ItemRef {
            diagram: self.diagram,
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }
}

/// An item action that could not be parsed while loading.
#[derive(Debug, Clone)]
pub struct RejectedAction {
    pub diagram: String,
    pub raw: String,
    pub error: ActionError,
}

/// All diagrams read from one model file.
#[derive(Debug, Clone, Default)]
pub struct DiagramCollection {
    diagrams: Vec<Diagram>,
}

impl DiagramCollection {
    pub fn new(diagrams: Vec<Diagram>) -> Self {
        Self { diagrams }
    }

    /// Parse converter output. Item actions are parsed here; any that cannot
    /// be parsed are returned separately and left off their item.
    pub fn from_json(text: &str) -> anyhow::Result<(Self, Vec<RejectedAction>)> {
        let raw: RawCollection = serde_json::from_str(text)?;
        let mut rejected = Vec::new();
        let diagrams = raw
            .diagrams
            .into_iter()
            .map(|d| {
                let items = d
                    .items
                    .into_iter()
                    .map(|i| convert_item(i, &d.name, &mut rejected))
                    .collect();
                Diagram {
                    name: d.name,
                    items,
                }
            })
            .collect();
        Ok((Self { diagrams }, rejected))
    }

    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }

    pub fn diagrams(&self) -> &[Diagram] {
        &self.diagrams
    }

    /// Index of the diagram shown when nothing else was requested.
    pub fn default_index(&self) -> Option<usize> {
        if self.diagrams.is_empty() { None } else { Some(0) }
    }

    pub fn diagram(&self, index: usize) -> Option<&Diagram> {
        self.diagrams.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.diagrams.iter().position(|d| d.name == name)
    }

    pub fn resolve(&self, target: &DiagramRef) -> Option<usize> {
        match target {
            DiagramRef::Name(name) => self.index_of(name),
            DiagramRef::Index(idx) => (*idx < self.diagrams.len()).then_some(*idx),
        }
    }

    pub fn item(&self, at: &ItemRef) -> Option<&Item> {
        let diagram = self.diagrams.get(at.diagram)?;
        let (first, rest) = at.path.split_first()?;
        let mut cur = diagram.items.get(*first)?;
        for idx in rest {
            cur = cur.children.get(*idx)?;
        }
        Some(cur)
    }

    /// First item (in diagram order, depth first) rendering block `id`.
    pub fn find_block(&self, id: &str) -> Option<ItemRef> {
        fn rec(items: &[Item], id: &str, path: &mut Vec<usize>) -> bool {
            for (idx, item) in items.iter().enumerate() {
                path.push(idx);
                if item.block_id().is_some_and(|b| b.as_str() == id) {
                    return true;
                }
                if rec(&item.children, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        for (d, diagram) in self.diagrams.iter().enumerate() {
            let mut path = Vec::new();
            if rec(&diagram.items, id, &mut path) {
                return Some(ItemRef::new(d, path));
            }
        }
        None
    }

    /// Walk from `at` up its containment chain and return the first block
    /// identifier found, starting with the item itself.
    pub fn owning_block(&self, at: &ItemRef) -> Option<&BlockId> {
        let mut cur = Some(at.clone());
        while let Some(r) = cur {
            if let Some(id) = self.item(&r).and_then(Item::block_id) {
                return Some(id);
            }
            cur = r.parent();
        }
        None
    }
}

fn convert_item(raw: RawItem, diagram: &str, rejected: &mut Vec<RejectedAction>) -> Item {
    let on_double_click = match raw.data.get("dblclick").and_then(Value::as_str) {
        Some(text) => match parse_action(text) {
            Ok(action) => Some(action),
            Err(error) => {
                rejected.push(RejectedAction {
                    diagram: diagram.to_string(),
                    raw: text.to_string(),
                    error,
                });
                None
            }
        },
        None => None,
    };
    let kind = match raw.id {
        Some(id) if !id.is_empty() => ItemKind::Block(BlockId::new(id)),
        _ => ItemKind::Container,
    };
    Item {
        kind,
        on_double_click,
        data: raw.data,
        attributes: raw.attributes,
        children: raw
            .children
            .into_iter()
            .map(|c| convert_item(c, diagram, rejected))
            .collect(),
    }
}
