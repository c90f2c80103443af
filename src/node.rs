//! Document tree model.
//!
//! A parsed document is a tree of [`Node`]s rooted at an [`ObjectNode`].
//! Interior nodes are [`ObjectNode`]s owning an ordered, uniquely-named set
//! of children; leaves are [`PrimitiveNode`]s holding one scalar key/value
//! pair. Nodes are owned by exactly one parent (tree, not graph).

use crate::error::{KeytreeError, Result};

/// A node in the document tree: either a scalar leaf or a composite object.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Primitive(PrimitiveNode),
    Object(ObjectNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Primitive(p) => &p.name,
            Node::Object(o) => &o.name,
        }
    }

    /// Comment lines attached to this node, in document order. Empty when no
    /// comments were ever attached.
    pub fn comments(&self) -> &[String] {
        match self {
            Node::Primitive(p) => p.comments(),
            Node::Object(o) => o.comments(),
        }
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        match self {
            Node::Primitive(p) => p.push_comment(comment),
            Node::Object(o) => o.push_comment(comment),
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveNode> {
        match self {
            Node::Primitive(p) => Some(p),
            Node::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Primitive(_) => None,
            Node::Object(o) => Some(o),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Node::Primitive(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Node::Primitive(_) => "primitive",
            Node::Object(_) => "object",
        }
    }
}

/// Leaf node: one scalar key/value pair.
///
/// The value is kept in its textual document form; interpretation is the
/// converters' concern. Equality is name AND value; comments do not
/// participate.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveNode {
    name: String,
    pub value: Option<String>,
    // Absent by default so comment-free documents allocate nothing.
    comments: Option<Vec<String>>,
}

impl PrimitiveNode {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        PrimitiveNode {
            name: name.into(),
            value,
            comments: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comments(&self) -> &[String] {
        self.comments.as_deref().unwrap_or(&[])
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.comments
            .get_or_insert_with(Vec::new)
            .push(comment.into());
    }
}

impl PartialEq for PrimitiveNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// Composite node owning an ordered mapping from child name to child node.
///
/// Child names are unique within one object. Iteration order equals
/// insertion order and determines serialization output order; equality
/// between two objects is order-independent and recursive.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    name: String,
    children: Vec<Node>,
    comments: Option<Vec<String>>,
}

impl ObjectNode {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectNode {
            name: name.into(),
            children: Vec::new(),
            comments: None,
        }
    }

    /// Create the unnamed root object for one read/write operation.
    pub fn create_root() -> Self {
        ObjectNode::new("")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comments(&self) -> &[String] {
        self.comments.as_deref().unwrap_or(&[])
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.comments
            .get_or_insert_with(Vec::new)
            .push(comment.into());
    }

    /// Attach a child. Fails with a structural error if a child with the
    /// same name already exists; the existing child is left untouched.
    pub fn add(&mut self, child: Node) -> Result<()> {
        if self.contains(child.name()) {
            return Err(KeytreeError::structure(format!(
                "duplicate child name '{}' under '{}'",
                child.name(),
                self.name
            )));
        }
        self.children.push(child);
        Ok(())
    }

    /// Attach a new primitive child and return a handle to it.
    pub fn add_primitive(
        &mut self,
        name: impl Into<String>,
        value: Option<String>,
    ) -> Result<&mut PrimitiveNode> {
        self.add(Node::Primitive(PrimitiveNode::new(name, value)))?;
        match self.children.last_mut() {
            Some(Node::Primitive(p)) => Ok(p),
            _ => unreachable!("just pushed a primitive child"),
        }
    }

    /// Attach a new empty object child and return a handle to it.
    pub fn add_object(&mut self, name: impl Into<String>) -> Result<&mut ObjectNode> {
        self.add(Node::Object(ObjectNode::new(name)))?;
        match self.children.last_mut() {
            Some(Node::Object(o)) => Ok(o),
            _ => unreachable!("just pushed an object child"),
        }
    }

    pub fn try_get_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name() == name)
    }

    pub fn try_get_child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name() == name)
    }

    /// Non-throwing typed lookup; a child of the wrong kind reads as absent.
    pub fn try_get_primitive(&self, name: &str) -> Option<&PrimitiveNode> {
        self.try_get_child(name).and_then(Node::as_primitive)
    }

    pub fn try_get_object(&self, name: &str) -> Option<&ObjectNode> {
        self.try_get_child(name).and_then(Node::as_object)
    }

    pub fn get_child(&self, name: &str) -> Result<&Node> {
        self.try_get_child(name).ok_or_else(|| {
            KeytreeError::lookup(format!("no child '{}' under '{}'", name, self.name))
        })
    }

    pub fn get_primitive(&self, name: &str) -> Result<&PrimitiveNode> {
        match self.get_child(name)? {
            Node::Primitive(p) => Ok(p),
            other => Err(KeytreeError::lookup(format!(
                "child '{}' under '{}' is a {}, expected a primitive",
                name,
                self.name,
                other.kind_name()
            ))),
        }
    }

    pub fn get_object(&self, name: &str) -> Result<&ObjectNode> {
        match self.get_child(name)? {
            Node::Object(o) => Ok(o),
            other => Err(KeytreeError::lookup(format!(
                "child '{}' under '{}' is a {}, expected an object",
                name,
                self.name,
                other.kind_name()
            ))),
        }
    }

    /// Detach and return the child with the given name, if present.
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let idx = self.children.iter().position(|c| c.name() == name)?;
        Some(self.children.remove(idx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name() == name)
    }

    /// Containment by name AND value equality, for primitive children.
    pub fn contains_value(&self, name: &str, value: Option<&str>) -> bool {
        self.try_get_primitive(name)
            .is_some_and(|p| p.value.as_deref() == value)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Recursive child count: children plus all transitive descendants.
    /// A flat document satisfies `child_count() == deep_child_count()`.
    pub fn deep_child_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                Node::Primitive(_) => 1,
                Node::Object(o) => 1 + o.deep_child_count(),
            })
            .sum()
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }
}

impl PartialEq for ObjectNode {
    /// Order-independent, recursive: two objects are equal iff their child
    /// mappings hold the same names with recursively equal nodes.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .all(|c| other.try_get_child(c.name()) == Some(c))
    }
}
