//! Nullable-wrapper converter: `Option<T>` delegates fully to the
//! dispatcher for the unwrapped type.

use std::any::Any;

use crate::convert::{Converter, Mapper};
use crate::error::{KeytreeError, Result};
use crate::node::ObjectNode;
use crate::typeinfo::{OptionalInfo, TypeInfo, TypeKind, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalConverter;

fn optional(ty: &TypeInfo) -> Result<&OptionalInfo> {
    match &ty.kind {
        TypeKind::Optional(info) => Ok(info),
        _ => Err(KeytreeError::lookup(format!(
            "optional converter cannot handle type '{}'",
            ty.name
        ))),
    }
}

impl Converter for OptionalConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::Optional(_))
    }

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        let info = optional(ty)?;
        let inner = mapper.deserialize_object(&info.inner.resolve(), node)?;
        (info.wrap)(Some(inner))
    }

    fn serialize(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
        out: &mut ObjectNode,
    ) -> Result<()> {
        let info = optional(ty)?;
        match (info.unwrap)(value)? {
            // An absent value leaves the node empty
            None => Ok(()),
            Some(inner) => mapper.serialize_object(&info.inner.resolve(), inner.as_ref(), out),
        }
    }

    fn deserialize_primitive(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        text: Option<&str>,
    ) -> Result<Value> {
        let info = optional(ty)?;
        match text {
            None => (info.wrap)(None),
            Some(text) => {
                let inner = mapper.deserialize_primitive(&info.inner.resolve(), Some(text))?;
                (info.wrap)(Some(inner))
            }
        }
    }

    fn serialize_primitive(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
    ) -> Result<Option<String>> {
        let info = optional(ty)?;
        match (info.unwrap)(value)? {
            None => Ok(None),
            Some(inner) => mapper.serialize_primitive(&info.inner.resolve(), inner.as_ref()),
        }
    }
}
