//! Composite-object converter.
//!
//! Maintains the per-type member-descriptor cache: serialized name,
//! declared (possibly overridden) type, accessor closures and attached
//! comments for every included member, built lazily on first encounter of
//! a type and evicted only through the explicit clear calls.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use itertools::Itertools;
use parking_lot::Mutex;

use crate::convert::{Converter, Mapper};
use crate::error::{KeytreeError, Result};
use crate::node::ObjectNode;
use crate::typeinfo::{TypeInfo, TypeKind, TypeRef, Value};

struct MemberDescriptor {
    name: String,
    ty: TypeRef,
    get: Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>,
    set: Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>,
    comments: Vec<String>,
}

struct MemberTable {
    /// Declaration order; serialization walks this.
    members: Vec<MemberDescriptor>,
    /// Case-insensitive lookup: lowercased serialized name to position.
    by_name: HashMap<String, usize>,
}

impl MemberTable {
    fn build(ty: &TypeInfo) -> Result<MemberTable> {
        let TypeKind::Struct(info) = &ty.kind else {
            return Err(KeytreeError::lookup(format!(
                "object converter cannot handle type '{}'",
                ty.name
            )));
        };
        let mut members = Vec::new();
        let mut by_name = HashMap::new();
        for field in info.fields.iter().filter(|f| f.include) {
            let key = field.name.to_lowercase();
            if by_name.contains_key(&key) {
                return Err(KeytreeError::structure(format!(
                    "member name '{}' is ambiguous on type '{}'",
                    field.name, ty.name
                )));
            }
            by_name.insert(key, members.len());
            members.push(MemberDescriptor {
                name: field.name.clone(),
                ty: field.ty.clone(),
                get: field.get.clone(),
                set: field.set.clone(),
                comments: field.comments.clone(),
            });
        }
        Ok(MemberTable { members, by_name })
    }

    fn find(&self, name: &str) -> Option<&MemberDescriptor> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|idx| &self.members[*idx])
    }
}

/// Converter for composite types described through [`StructBuilder`]
/// metadata.
///
/// [`StructBuilder`]: crate::typeinfo::StructBuilder
#[derive(Default)]
pub struct StructConverter {
    members: Mutex<HashMap<TypeId, Arc<MemberTable>>>,
}

impl StructConverter {
    pub fn new() -> Self {
        StructConverter::default()
    }

    fn table(&self, ty: &TypeInfo) -> Result<Arc<MemberTable>> {
        let mut cache = self.members.lock();
        if let Some(table) = cache.get(&ty.id) {
            return Ok(table.clone());
        }
        // A failed build is not cached; the next call retries from scratch.
        let table = Arc::new(MemberTable::build(ty)?);
        tracing::debug!(type_name = %ty.name, members = table.members.len(), "built member table");
        cache.insert(ty.id, table.clone());
        Ok(table)
    }

    pub fn clear_cache(&self) {
        self.members.lock().clear();
    }

    pub fn clear_cache_for(&self, ty: TypeId) {
        self.members.lock().remove(&ty);
    }
}

impl Converter for StructConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::Struct(_))
    }

    fn deserialize(&self, mapper: &Mapper, ty: &TypeInfo, node: &ObjectNode) -> Result<Value> {
        let table = self.table(ty)?;
        let mut instance = mapper.object_provider().construct(ty, &[], vec![])?;
        for child in node.children() {
            let member = table.find(child.name()).ok_or_else(|| {
                KeytreeError::lookup(format!(
                    "no member '{}' on type '{}' (members: {})",
                    child.name(),
                    ty.name,
                    table.members.iter().map(|m| m.name.as_str()).join(", ")
                ))
            })?;
            let value = mapper.deserialize_node(&member.ty.resolve(), child)?;
            (member.set)(instance.as_mut(), value)?;
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
        let table = self.table(ty)?;
        for member in &table.members {
            let member_value = (member.get)(value)?;
            mapper.serialize_child(out, &member.name, &member.ty.resolve(), member_value.as_ref())?;
            if !member.comments.is_empty() {
                if let Some(child) = out.try_get_child_mut(&member.name) {
                    for comment in &member.comments {
                        child.push_comment(comment);
                    }
                }
            }
        }
        Ok(())
    }
}
