//! Type converters and the conversion dispatcher.
//!
//! A [`Converter`] translates one type category to/from tree nodes (or
//! primitive strings for atomic types). The [`Mapper`] holds the ordered
//! converter chain and exposes the recursive entry points converters call
//! for nested values.

use std::{any::Any, sync::Arc};

use crate::composer::Composer;
use crate::construct::{CachedProvider, ConstructionProvider};
use crate::error::{KeytreeError, Result};
use crate::node::{Node, ObjectNode};
use crate::text;
use crate::typeinfo::{downcast_value, Describe, TypeInfo, TypeKind, Value};

pub mod map;
pub mod object;
pub mod option;
pub mod primitive;
pub mod sequence;

pub use map::MapConverter;
pub use object::StructConverter;
pub use option::OptionalConverter;
pub use primitive::PrimitiveConverter;
pub use sequence::{ArrayConverter, ListConverter};

/// Translation strategy for one category of types.
///
/// `accepts` must be cheap and side-effect free; the dispatcher probes the
/// chain in order and the first accepting converter wins. The tree-form and
/// primitive-form methods are separate because the dispatcher decides per
/// type which shape a value occupies in the document.
pub trait Converter: Send + Sync {
    fn accepts(&self, ty: &TypeInfo) -> bool;

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value>;

    fn serialize(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
        out: &mut ObjectNode,
    ) -> Result<()>;

    fn deserialize_primitive(
        &self,
        _mapper: &Mapper,
        ty: &TypeInfo,
        _text: Option<&str>,
    ) -> Result<Value> {
        Err(KeytreeError::lookup(format!(
            "type '{}' has no primitive form",
            ty.name
        )))
    }

    fn serialize_primitive(
        &self,
        _mapper: &Mapper,
        ty: &TypeInfo,
        _value: &dyn Any,
    ) -> Result<Option<String>> {
        Err(KeytreeError::lookup(format!(
            "type '{}' has no primitive form",
            ty.name
        )))
    }
}

/// The conversion dispatcher.
///
/// Resolves, per runtime type, which converter applies and exposes the
/// primitive/object serialize-deserialize entry points converters re-enter
/// recursively. Stateless apart from the converters' shared caches; one
/// instance can serve any number of sequential conversions.
pub struct Mapper {
    converters: Vec<Arc<dyn Converter>>,
    object_provider: Arc<dyn ConstructionProvider>,
    default_primitive: Arc<TypeInfo>,
    default_object: Arc<TypeInfo>,
}

impl Default for Mapper {
    fn default() -> Self {
        Mapper::new()
    }
}

impl Mapper {
    pub fn new() -> Self {
        // Chain order is dispatch policy: first match wins, so the more
        // specific predicates come first (array ahead of list, both ahead
        // of map, struct last as the catch-all composite).
        Mapper {
            converters: vec![
                Arc::new(PrimitiveConverter),
                Arc::new(OptionalConverter),
                Arc::new(ArrayConverter),
                Arc::new(ListConverter),
                Arc::new(MapConverter),
                Arc::new(StructConverter::default()),
            ],
            object_provider: Arc::new(CachedProvider::new()),
            default_primitive: String::type_info(),
            default_object: String::type_info(),
        }
    }

    /// Swap the construction provider used for composite/collection types.
    pub fn with_provider(mut self, provider: Arc<dyn ConstructionProvider>) -> Self {
        self.object_provider = provider;
        self
    }

    /// Register a custom converter ahead of the built-in chain.
    pub fn prepend_converter(&mut self, converter: Arc<dyn Converter>) {
        self.converters.insert(0, converter);
    }

    pub fn object_provider(&self) -> &Arc<dyn ConstructionProvider> {
        &self.object_provider
    }

    /// Fallback key type for untyped map descriptors.
    pub fn default_primitive_type(&self) -> Arc<TypeInfo> {
        self.default_primitive.clone()
    }

    /// Fallback value type for untyped map descriptors.
    pub fn default_object_type(&self) -> Arc<TypeInfo> {
        self.default_object.clone()
    }

    fn converter_for(&self, ty: &TypeInfo) -> Result<&Arc<dyn Converter>> {
        self.converters
            .iter()
            .find(|c| c.accepts(ty))
            .ok_or_else(|| {
                KeytreeError::lookup(format!("no converter accepts type '{}'", ty.name))
            })
    }

    /// Whether the document represents this type as a single leaf value.
    pub fn is_primitive(&self, ty: &TypeInfo) -> bool {
        match &ty.kind {
            TypeKind::Primitive(_) | TypeKind::Enum(_) => true,
            TypeKind::Optional(opt) => self.is_primitive(&opt.inner.resolve()),
            _ => false,
        }
    }

    pub fn serialize_primitive(&self, ty: &TypeInfo, value: &dyn Any) -> Result<Option<String>> {
        self.converter_for(ty)?.serialize_primitive(self, ty, value)
    }

    pub fn deserialize_primitive(&self, ty: &TypeInfo, text: Option<&str>) -> Result<Value> {
        self.converter_for(ty)?.deserialize_primitive(self, ty, text)
    }

    pub fn serialize_object(
        &self,
        ty: &TypeInfo,
        value: &dyn Any,
        out: &mut ObjectNode,
    ) -> Result<()> {
        tracing::trace!(type_name = %ty.name, "serialize object");
        self.converter_for(ty)?.serialize(self, ty, value, out)
    }

    pub fn deserialize_object(&self, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        tracing::trace!(type_name = %ty.name, node = node.name(), "deserialize object");
        self.converter_for(ty)?.deserialize(self, ty, node)
    }

    /// Deserialize a tree child as primitive or object per its node kind.
    pub(crate) fn deserialize_node(&self, ty: &TypeInfo, node: &Node) -> Result<Value> {
        match node {
            Node::Primitive(p) => self.deserialize_primitive(ty, p.value.as_deref()),
            Node::Object(o) => self.deserialize_object(ty, o),
        }
    }

    /// Serialize a value as a new child of `parent`, leaf or nested object
    /// per the type's document shape.
    pub(crate) fn serialize_child(
        &self,
        parent: &mut ObjectNode,
        name: &str,
        ty: &TypeInfo,
        value: &dyn Any,
    ) -> Result<()> {
        if self.is_primitive(ty) {
            let text = self.serialize_primitive(ty, value)?;
            parent.add_primitive(name.to_string(), text)?;
            return Ok(());
        }
        // An absent tree-shaped optional emits no child at all; on the way
        // back in the missing key leaves the member at its default.
        if let TypeKind::Optional(opt) = &ty.kind {
            if (opt.unwrap)(value)?.is_none() {
                return Ok(());
            }
        }
        let mut child = ObjectNode::new(name);
        self.serialize_object(ty, value, &mut child)?;
        parent.add(Node::Object(child))?;
        Ok(())
    }

    /// Serialize a described value into a fresh root node.
    pub fn serialize<T: Describe>(&self, value: &T) -> Result<ObjectNode> {
        let info = T::type_info();
        let mut root = ObjectNode::create_root();
        self.serialize_object(&info, value, &mut root)?;
        Ok(root)
    }

    /// Materialize a described value from a tree.
    pub fn deserialize<T: Describe>(&self, node: &ObjectNode) -> Result<T> {
        let info = T::type_info();
        downcast_value(self.deserialize_object(&info, node)?, &info.name)
    }

    /// Serialize a value all the way to flat text through a composer.
    pub fn to_text<T: Describe>(&self, value: &T, composer: &dyn Composer) -> Result<String> {
        let root = self.serialize(value)?;
        let mut properties = Vec::new();
        composer.write(&root, &mut properties)?;
        Ok(text::render(&properties))
    }

    /// Materialize a value from flat text through a composer.
    pub fn from_text<T: Describe>(&self, input: &str, composer: &dyn Composer) -> Result<T> {
        let root = composer.read_tokens(&mut text::tokenize(input).into_iter())?;
        self.deserialize(&root)
    }
}
