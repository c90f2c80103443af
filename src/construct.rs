//! Construction providers.
//!
//! A provider turns `(type, argument types, argument values)` into a fresh
//! instance by resolving one of the type's declared constructors, or the
//! default-instance path for zero-argument construction. [`DirectProvider`]
//! re-resolves on every call; [`CachedProvider`] binds the resolved
//! constructor once per `(type, argument types)` and reuses it.

use std::{any::TypeId, collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::error::{KeytreeError, Result};
use crate::typeinfo::{TypeInfo, Value};

type BoundCtor = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// Strategy interface for dynamic instance creation.
///
/// All implementations behave identically; they differ only in whether the
/// constructor resolution is repeated or cached. Cache eviction never
/// affects in-flight calls (entries are `Arc`-shared).
pub trait ConstructionProvider: Send + Sync {
    fn construct(&self, ty: &TypeInfo, arg_types: &[TypeId], args: Vec<Value>) -> Result<Value>;

    /// Convenience overload inferring argument types from the runtime types
    /// of the supplied values.
    fn construct_inferred(&self, ty: &TypeInfo, args: Vec<Value>) -> Result<Value> {
        let arg_types: Vec<TypeId> = args.iter().map(|a| (**a).type_id()).collect();
        self.construct(ty, &arg_types, args)
    }

    fn clear_cache(&self) {}

    fn clear_cache_for(&self, _ty: TypeId) {}

    fn clear_cache_entry(&self, _ty: TypeId, _arg_types: &[TypeId]) {}
}

/// Resolve the constructor matching the argument-type list.
///
/// Zero-argument construction prefers an explicit niladic constructor and
/// falls back to the type's default-instance path. A failed resolution is
/// returned, never cached.
fn resolve(ty: &TypeInfo, arg_types: &[TypeId]) -> Result<BoundCtor> {
    if !ty.is_constructible() {
        return Err(KeytreeError::construction(
            &ty.name,
            "type is not constructible",
        ));
    }
    if let Some(ctor) = ty
        .constructors
        .iter()
        .find(|c| c.params.iter().map(|(id, _)| *id).eq(arg_types.iter().copied()))
    {
        return Ok(ctor.invoke.clone());
    }
    if arg_types.is_empty() {
        if let Some(default) = ty.default_fn.clone() {
            return Ok(Arc::new(move |_args| Ok(default())));
        }
    }
    Err(KeytreeError::construction(
        &ty.name,
        format!(
            "no constructor matching {} argument(s)",
            arg_types.len()
        ),
    ))
}

fn invoke(ty: &TypeInfo, ctor: &BoundCtor, arg_types: &[TypeId], args: Vec<Value>) -> Result<Value> {
    if args.len() != arg_types.len() {
        return Err(KeytreeError::construction(
            &ty.name,
            format!(
                "{} argument type(s) supplied for {} value(s)",
                arg_types.len(),
                args.len()
            ),
        ));
    }
    ctor(args).map_err(|cause| {
        KeytreeError::construction_caused(&ty.name, "constructor invocation failed", cause)
    })
}

/// Portable baseline: resolves the matching constructor on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProvider;

impl ConstructionProvider for DirectProvider {
    fn construct(&self, ty: &TypeInfo, arg_types: &[TypeId], args: Vec<Value>) -> Result<Value> {
        let ctor = resolve(ty, arg_types)?;
        invoke(ty, &ctor, arg_types, args)
    }
}

/// Caching strategy: resolution happens once per `(type, argument types)`
/// and the bound constructor is reused for subsequent calls.
///
/// The key compares argument-type lists elementwise, so two callers passing
/// separately-allocated but identical lists share one entry.
#[derive(Default)]
pub struct CachedProvider {
    cache: Mutex<HashMap<(TypeId, Vec<TypeId>), BoundCtor>>,
}

impl CachedProvider {
    pub fn new() -> Self {
        CachedProvider::default()
    }

    #[cfg(test)]
    fn cached_entry(&self, ty: TypeId, arg_types: &[TypeId]) -> Option<BoundCtor> {
        self.cache.lock().get(&(ty, arg_types.to_vec())).cloned()
    }
}

impl ConstructionProvider for CachedProvider {
    fn construct(&self, ty: &TypeInfo, arg_types: &[TypeId], args: Vec<Value>) -> Result<Value> {
        let key = (ty.id, arg_types.to_vec());
        let cached = self.cache.lock().get(&key).cloned();
        let ctor = match cached {
            Some(ctor) => ctor,
            None => {
                // Resolution runs outside the lock; concurrent misses for
                // the same key each resolve and the last insert wins.
                let ctor = resolve(ty, arg_types)?;
                tracing::debug!(type_name = %ty.name, args = arg_types.len(), "bound constructor");
                self.cache.lock().insert(key, ctor.clone());
                ctor
            }
        };
        invoke(ty, &ctor, arg_types, args)
    }

    fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn clear_cache_for(&self, ty: TypeId) {
        self.cache.lock().retain(|(id, _), _| *id != ty);
    }

    fn clear_cache_entry(&self, ty: TypeId, arg_types: &[TypeId]) {
        self.cache.lock().remove(&(ty, arg_types.to_vec()));
    }
}
