//! Positional collection converters.
//!
//! Tree children of a sequence are keyed by stringified index. Indices need
//! not be contiguous: an in-bounds index overwrites its slot, an
//! out-of-bounds index pads the gap with default-constructed elements
//! before appending, so sparse documents materialize as dense sequences.

use std::any::Any;

use crate::convert::{Converter, Mapper};
use crate::error::{KeytreeError, Result};
use crate::node::{Node, ObjectNode};
use crate::typeinfo::{TypeInfo, TypeKind, Value};

fn parse_index(ty: &TypeInfo, child: &Node) -> Result<usize> {
    child
        .name()
        .parse::<usize>()
        .map_err(|_| {
            KeytreeError::structure(format!(
                "child '{}' of sequence type '{}' is not an index",
                child.name(),
                ty.name
            ))
        })
}

fn serialize_items(
    mapper: &Mapper,
    element_ty: &TypeInfo,
    items: Vec<Value>,
    out: &mut ObjectNode,
) -> Result<()> {
    for (index, item) in items.into_iter().enumerate() {
        mapper.serialize_child(out, &index.to_string(), element_ty, item.as_ref())?;
    }
    Ok(())
}

/// Converter for growable positional collections (`Vec<T>` shaped).
#[derive(Debug, Clone, Copy, Default)]
pub struct ListConverter;

impl Converter for ListConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::List(_))
    }

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        let TypeKind::List(info) = &ty.kind else {
            return Err(KeytreeError::lookup(format!(
                "list converter cannot handle type '{}'",
                ty.name
            )));
        };
        let element_ty = info.element.resolve();
        let mut instance = mapper.object_provider().construct(ty, &[], vec![])?;
        for child in node.children() {
            let index = parse_index(ty, child)?;
            let value = mapper.deserialize_node(&element_ty, child)?;
            let len = (info.len)(instance.as_ref())?;
            if index < len {
                (info.set)(instance.as_mut(), index, value)?;
            } else {
                // Gap below the target index materializes as defaults
                for _ in len..index {
                    (info.push)(instance.as_mut(), element_ty.default_value()?)?;
                }
                (info.push)(instance.as_mut(), value)?;
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
        let TypeKind::List(info) = &ty.kind else {
            return Err(KeytreeError::lookup(format!(
                "list converter cannot handle type '{}'",
                ty.name
            )));
        };
        serialize_items(mapper, &info.element.resolve(), (info.items)(value)?, out)
    }
}

/// Converter for fixed-size positional collections (`Box<[T]>` shaped).
/// Filled through an intermediate growable buffer sized to the highest
/// index plus one, then sealed into the array.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayConverter;

impl Converter for ArrayConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::Array(_))
    }

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        let TypeKind::Array(info) = &ty.kind else {
            return Err(KeytreeError::lookup(format!(
                "array converter cannot handle type '{}'",
                ty.name
            )));
        };
        let element_ty = info.element.resolve();
        let mut buffer: Vec<Value> = Vec::new();
        for child in node.children() {
            let index = parse_index(ty, child)?;
            let value = mapper.deserialize_node(&element_ty, child)?;
            if index < buffer.len() {
                buffer[index] = value;
            } else {
                for _ in buffer.len()..index {
                    buffer.push(element_ty.default_value()?);
                }
                buffer.push(value);
            }
        }
        (info.from_vec)(buffer)
    }

    fn serialize(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
        out: &mut ObjectNode,
    ) -> Result<()> {
        let TypeKind::Array(info) = &ty.kind else {
            return Err(KeytreeError::lookup(format!(
                "array converter cannot handle type '{}'",
                ty.name
            )));
        };
        serialize_items(mapper, &info.element.resolve(), (info.items)(value)?, out)
    }
}
