//! Keyed-collection converter.
//!
//! Map keys are always primitive-encoded in the document (a child's name is
//! itself deserialized as the key type); values are leaves or nested
//! objects per their node kind. Untyped key/value descriptors fall back to
//! the dispatcher's configured default types.

use std::any::Any;

use crate::convert::{Converter, Mapper};
use crate::error::{KeytreeError, Result};
use crate::node::ObjectNode;
use crate::typeinfo::{MapInfo, TypeInfo, TypeKind, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct MapConverter;

fn map_info(ty: &TypeInfo) -> Result<&MapInfo> {
    match &ty.kind {
        TypeKind::Map(info) => Ok(info),
        _ => Err(KeytreeError::lookup(format!(
            "map converter cannot handle type '{}'",
            ty.name
        ))),
    }
}

impl Converter for MapConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::Map(_))
    }

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        let info = map_info(ty)?;
        let key_ty = info
            .key
            .as_ref()
            .map(|t| t.resolve())
            .unwrap_or_else(|| mapper.default_primitive_type());
        let value_ty = info
            .value
            .as_ref()
            .map(|t| t.resolve())
            .unwrap_or_else(|| mapper.default_object_type());

        let mut instance = mapper.object_provider().construct(ty, &[], vec![])?;
        for child in node.children() {
            let key = mapper.deserialize_primitive(&key_ty, Some(child.name()))?;
            let value = mapper.deserialize_node(&value_ty, child)?;
            // The map's own no-overwrite policy surfaces duplicates: two
            // distinct child names can collapse to one key (e.g. "1" and
            // "01" as integers).
            if !(info.insert)(instance.as_mut(), key, value)? {
                return Err(KeytreeError::structure(format!(
                    "duplicate key '{}' in map type '{}'",
                    child.name(),
                    ty.name
                )));
            }
        }
        Ok(instance)
    }

    fn serialize(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
        out: &mut ObjectNode,
    ) -> Result<()> {
        let info = map_info(ty)?;
        let key_ty = info
            .key
            .as_ref()
            .map(|t| t.resolve())
            .unwrap_or_else(|| mapper.default_primitive_type());
        let value_ty = info
            .value
            .as_ref()
            .map(|t| t.resolve())
            .unwrap_or_else(|| mapper.default_object_type());

        for (key, entry) in (info.entries)(value)? {
            let key_text = mapper
                .serialize_primitive(&key_ty, key.as_ref())?
                .ok_or_else(|| {
                    KeytreeError::structure(format!(
                        "map type '{}' produced an empty key",
                        ty.name
                    ))
                })?;
            mapper.serialize_child(out, &key_text, &value_ty, entry.as_ref())?;
        }
        Ok(())
    }
}
