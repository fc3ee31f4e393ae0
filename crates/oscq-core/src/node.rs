use crate::binding::{Binding, BindingKind};
use crate::value::{Value, ValueType};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::json;

/// OSCQuery `ACCESS` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Access {
    None = 0,
    Read = 1,
    Write = 2,
    ReadWrite = 3,
}

impl From<BindingKind> for Access {
    fn from(kind: BindingKind) -> Self {
        match kind {
            BindingKind::Get => Access::Read,
            BindingKind::Set | BindingKind::Invoke => Access::Write,
            BindingKind::GetSet => Access::ReadWrite,
        }
    }
}

/// Value description of a terminal node.
#[derive(Debug, Clone)]
pub struct Leaf {
    binding: Binding,
    /// Value read while building, used when a live read yields nothing.
    initial: Option<Value>,
}

impl Leaf {
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn initial(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    fn current_value(&self) -> Option<Value> {
        if !self.binding.kind().is_readable() {
            return None;
        }
        self.binding.get().or_else(|| self.initial.clone())
    }

    fn range_json(&self) -> Vec<serde_json::Value> {
        let ty = self.binding.value_type();
        if let ValueType::Enum(names) = ty {
            return vec![json!({ "VALS": &names[..] })];
        }
        match self.binding.range() {
            Some(range) if ty.is_numeric() => (0..ty.arity())
                .map(|_| json!({ "MIN": range.min, "MAX": range.max }))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One entry in the address tree. Built once, never mutated after publication.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    path: String,
    access: Access,
    children: Vec<Node>,
    leaf: Option<Leaf>,
}

impl Node {
    /// The unnamed root at `path`.
    pub fn root(path: impl Into<String>) -> Self {
        Self::container("", path)
    }

    pub fn container(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            access: Access::None,
            children: Vec::new(),
            leaf: None,
        }
    }

    pub fn leaf(name: impl Into<String>, binding: Binding, initial: Option<Value>) -> Self {
        Self {
            name: name.into(),
            path: binding.path().to_string(),
            access: Access::from(binding.kind()),
            children: Vec::new(),
            leaf: Some(Leaf { binding, initial }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn leaf_info(&self) -> Option<&Leaf> {
        self.leaf.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Resolves an absolute path relative to this node's own path.
    pub fn find(&self, path: &str) -> Option<&Node> {
        let rest = path.strip_prefix(self.path.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Depth-first visit of every node, this one included.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn leaf_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if node.is_leaf() {
                out.push(node.path());
            }
        });
        out
    }

    /// Adds a child unless a sibling already uses the name. Returns whether it was added.
    pub(crate) fn push_child(&mut self, child: Node) -> bool {
        if self.child(&child.name).is_some() {
            return false;
        }
        self.children.push(child);
        true
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ACCESS", &(self.access as u8))?;

        match &self.leaf {
            Some(leaf) => {
                map.serialize_entry("FULL_PATH", &self.path)?;
                map.serialize_entry("TYPE", leaf.binding.value_type().type_tag())?;
                if let Some(value) = leaf.current_value() {
                    map.serialize_entry("VALUE", &value.to_json())?;
                }
                let range = leaf.range_json();
                if !range.is_empty() {
                    map.serialize_entry("RANGE", &range)?;
                }
            }
            None => map.serialize_entry("CONTENTS", &Contents(&self.children))?,
        }

        map.end()
    }
}

/// Children keyed by name, in insertion order.
struct Contents<'a>(&'a [Node]);

impl Serialize for Contents<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for child in self.0 {
            map.serialize_entry(&child.name, child)?;
        }
        map.end()
    }
}
