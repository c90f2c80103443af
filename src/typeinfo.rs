//! Runtime type descriptors.
//!
//! Rust has no ambient reflection, so the open-ended type universe the
//! engine dispatches over is modeled as data: every participating type is
//! described by a [`TypeInfo`] whose [`TypeKind`] tells the converters what
//! category it belongs to and, for container kinds, carries erased operation
//! closures over `dyn Any` so converters can manipulate concrete collections
//! without knowing element types statically.
//!
//! Descriptors are produced by the [`Describe`] trait (blanket impls for
//! scalars, `Option<T>`, `Vec<T>`, `Box<[T]>` and the std maps) or by the
//! [`StructBuilder`]/[`enum_type`] APIs, and memoized per `TypeId` in the
//! global [`TYPES`] registry. Nested types are referenced through lazy
//! [`TypeRef`] thunks so recursive shapes terminate.

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    fmt,
    hash::Hash,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{KeytreeError, Result};

/// A dynamically-typed value moving through the engine.
pub type Value = Box<dyn Any>;

/// Global descriptor registry: one memoized `Arc<TypeInfo>` per `TypeId`.
pub static TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::default);

/// Downcast an owned value, reporting the expected type on mismatch.
pub fn downcast_value<T: Any>(value: Value, expected: &str) -> Result<T> {
    match value.downcast::<T>() {
        Ok(boxed) => Ok(*boxed),
        Err(_) => Err(KeytreeError::construction(
            expected,
            "value has an unexpected runtime type",
        )),
    }
}

/// Downcast a borrowed value, reporting the expected type on mismatch.
pub fn downcast_ref<'a, T: Any>(value: &'a dyn Any, expected: &str) -> Result<&'a T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        KeytreeError::construction(expected, "value has an unexpected runtime type")
    })
}

fn downcast_mut<'a, T: Any>(value: &'a mut dyn Any, expected: &str) -> Result<&'a mut T> {
    value.downcast_mut::<T>().ok_or_else(|| {
        KeytreeError::construction(expected, "value has an unexpected runtime type")
    })
}

/// Lazy reference to another type's descriptor.
#[derive(Clone)]
pub struct TypeRef(Arc<dyn Fn() -> Arc<TypeInfo> + Send + Sync>);

impl TypeRef {
    pub fn of<T: Describe>() -> Self {
        TypeRef(Arc::new(T::type_info))
    }

    /// Reference a hand-built descriptor directly.
    pub fn from_info(info: Arc<TypeInfo>) -> Self {
        TypeRef(Arc::new(move || info.clone()))
    }

    pub fn resolve(&self) -> Arc<TypeInfo> {
        (self.0)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.resolve().name)
    }
}

/// The scalar kinds the primitive converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Str,
    DateTime,
    Uuid,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::Str => "String",
            PrimitiveKind::DateTime => "DateTime<Utc>",
            PrimitiveKind::Uuid => "Uuid",
        }
    }
}

/// Enum descriptor: conversion runs through the underlying integer
/// representation, never through member names.
pub struct EnumInfo {
    pub underlying: PrimitiveKind,
    pub to_repr: Arc<dyn Fn(&dyn Any) -> Result<i128> + Send + Sync>,
    pub from_repr: Arc<dyn Fn(i128) -> Option<Value> + Send + Sync>,
}

/// `Option<T>` descriptor.
pub struct OptionalInfo {
    pub inner: TypeRef,
    pub wrap: Arc<dyn Fn(Option<Value>) -> Result<Value> + Send + Sync>,
    /// Clone the inner value out, `None` for an absent one.
    pub unwrap: Arc<dyn Fn(&dyn Any) -> Result<Option<Value>> + Send + Sync>,
}

/// Growable positional collection descriptor (`Vec<T>` shaped).
pub struct ListInfo {
    pub element: TypeRef,
    pub len: Arc<dyn Fn(&dyn Any) -> Result<usize> + Send + Sync>,
    pub set: Arc<dyn Fn(&mut dyn Any, usize, Value) -> Result<()> + Send + Sync>,
    pub push: Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>,
    /// Clone elements out in positional order.
    pub items: Arc<dyn Fn(&dyn Any) -> Result<Vec<Value>> + Send + Sync>,
}

/// Fixed-size positional collection descriptor (`Box<[T]>` shaped). Filled
/// through an intermediate growable buffer and sealed once at the end.
pub struct ArrayInfo {
    pub element: TypeRef,
    pub from_vec: Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>,
    pub items: Arc<dyn Fn(&dyn Any) -> Result<Vec<Value>> + Send + Sync>,
}

/// Keyed collection descriptor. Key/value descriptors may be absent for
/// hand-built untyped maps; the dispatcher then falls back to its configured
/// default types.
pub struct MapInfo {
    pub key: Option<TypeRef>,
    pub value: Option<TypeRef>,
    /// Insert without overwrite: `Ok(false)` reports a duplicate key.
    pub insert: Arc<dyn Fn(&mut dyn Any, Value, Value) -> Result<bool> + Send + Sync>,
    /// Clone entries out in the map's own iteration order.
    pub entries: Arc<dyn Fn(&dyn Any) -> Result<Vec<(Value, Value)>> + Send + Sync>,
}

/// One declared member of a composite type, with the declarative metadata
/// the composite converter consumes (serialized name, type override baked
/// into the accessors, comments, inclusion flag).
pub struct FieldInfo {
    pub name: String,
    pub ty: TypeRef,
    pub get: Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>,
    pub set: Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>,
    pub comments: Vec<String>,
    pub include: bool,
}

/// Composite type descriptor.
pub struct StructInfo {
    pub fields: Vec<FieldInfo>,
}

/// Category of a described type, driving converter selection.
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum(EnumInfo),
    Optional(OptionalInfo),
    List(ListInfo),
    Array(ArrayInfo),
    Map(MapInfo),
    Struct(StructInfo),
}

impl TypeKind {
    pub fn category(&self) -> &'static str {
        match self {
            TypeKind::Primitive(_) => "primitive",
            TypeKind::Enum(_) => "enum",
            TypeKind::Optional(_) => "optional",
            TypeKind::List(_) => "list",
            TypeKind::Array(_) => "array",
            TypeKind::Map(_) => "map",
            TypeKind::Struct(_) => "struct",
        }
    }
}

/// One resolvable constructor of a described type.
pub struct CtorInfo {
    pub params: Vec<(TypeId, &'static str)>,
    pub invoke: Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>,
}

/// Runtime descriptor for one Rust type.
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
    pub default_fn: Option<Arc<dyn Fn() -> Value + Send + Sync>>,
    pub constructors: Vec<CtorInfo>,
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind.category())
            .finish()
    }
}

impl TypeInfo {
    /// A type is constructible if it has at least one constructor or a
    /// default-instance path. Trait objects and other shapes without either
    /// are rejected by the construction providers.
    pub fn is_constructible(&self) -> bool {
        self.default_fn.is_some() || !self.constructors.is_empty()
    }

    pub fn default_value(&self) -> Result<Value> {
        match &self.default_fn {
            Some(f) => Ok(f()),
            None => Err(KeytreeError::construction(
                &self.name,
                "type has no default instance",
            )),
        }
    }

    fn scalar<T: Any>(kind: PrimitiveKind, default: fn() -> T) -> TypeInfo {
        TypeInfo {
            id: TypeId::of::<T>(),
            name: kind.name().to_string(),
            kind: TypeKind::Primitive(kind),
            default_fn: Some(Arc::new(move || Box::new(default()))),
            constructors: Vec::new(),
        }
    }
}

/// Supplies the [`TypeInfo`] for a type. Implementations build the
/// descriptor; callers go through [`Describe::type_info`] which memoizes in
/// the [`TYPES`] registry.
pub trait Describe: Any {
    fn build_type_info() -> TypeInfo;

    fn type_info() -> Arc<TypeInfo>
    where
        Self: Sized,
    {
        TYPES.resolve::<Self>()
    }
}

/// Thread-safe descriptor registry, one entry per `TypeId`.
///
/// Follows the crate-wide locked-singleton pattern: a miss builds the
/// descriptor outside the lock, so two threads may build the same entry
/// concurrently; the first insert wins and both observe one allocation.
#[derive(Default)]
pub struct TypeRegistry(RwLock<HashMap<TypeId, Arc<TypeInfo>>>);

impl TypeRegistry {
    pub fn resolve<T: Describe>(&self) -> Arc<TypeInfo> {
        let id = TypeId::of::<T>();
        if let Some(info) = self.0.read().get(&id) {
            return info.clone();
        }
        let built = Arc::new(T::build_type_info());
        tracing::debug!(type_name = %built.name, "registered type descriptor");
        self.0.write().entry(id).or_insert(built).clone()
    }

    pub fn get(&self, id: TypeId) -> Option<Arc<TypeInfo>> {
        self.0.read().get(&id).cloned()
    }
}

macro_rules! describe_scalar {
    ($ty:ty, $kind:expr, $default:expr) => {
        impl Describe for $ty {
            fn build_type_info() -> TypeInfo {
                TypeInfo::scalar::<$ty>($kind, || $default)
            }
        }
    };
}

describe_scalar!(bool, PrimitiveKind::Bool, false);
describe_scalar!(char, PrimitiveKind::Char, '\0');
describe_scalar!(i8, PrimitiveKind::I8, 0);
describe_scalar!(i16, PrimitiveKind::I16, 0);
describe_scalar!(i32, PrimitiveKind::I32, 0);
describe_scalar!(i64, PrimitiveKind::I64, 0);
describe_scalar!(u8, PrimitiveKind::U8, 0);
describe_scalar!(u16, PrimitiveKind::U16, 0);
describe_scalar!(u32, PrimitiveKind::U32, 0);
describe_scalar!(u64, PrimitiveKind::U64, 0);
describe_scalar!(f32, PrimitiveKind::F32, 0.0);
describe_scalar!(f64, PrimitiveKind::F64, 0.0);
describe_scalar!(Decimal, PrimitiveKind::Decimal, Decimal::ZERO);
describe_scalar!(String, PrimitiveKind::Str, String::new());
describe_scalar!(Uuid, PrimitiveKind::Uuid, Uuid::nil());
describe_scalar!(
    DateTime<Utc>,
    PrimitiveKind::DateTime,
    DateTime::<Utc>::UNIX_EPOCH
);

impl<T: Describe + Clone> Describe for Option<T> {
    fn build_type_info() -> TypeInfo {
        let inner_name = T::type_info().name.clone();
        TypeInfo {
            id: TypeId::of::<Option<T>>(),
            name: format!("Option<{inner_name}>"),
            kind: TypeKind::Optional(OptionalInfo {
                inner: TypeRef::of::<T>(),
                wrap: Arc::new(move |opt| match opt {
                    Some(value) => {
                        let inner: T = downcast_value(value, std::any::type_name::<T>())?;
                        Ok(Box::new(Some(inner)))
                    }
                    None => Ok(Box::new(None::<T>)),
                }),
                unwrap: Arc::new(|any| {
                    let opt = downcast_ref::<Option<T>>(any, std::any::type_name::<Option<T>>())?;
                    Ok(opt.clone().map(|v| Box::new(v) as Value))
                }),
            }),
            default_fn: Some(Arc::new(|| Box::new(None::<T>))),
            constructors: Vec::new(),
        }
    }
}

impl<T: Describe + Clone> Describe for Vec<T> {
    fn build_type_info() -> TypeInfo {
        let inner_name = T::type_info().name.clone();
        let expected = std::any::type_name::<Vec<T>>();
        TypeInfo {
            id: TypeId::of::<Vec<T>>(),
            name: format!("Vec<{inner_name}>"),
            kind: TypeKind::List(ListInfo {
                element: TypeRef::of::<T>(),
                len: Arc::new(move |any| Ok(downcast_ref::<Vec<T>>(any, expected)?.len())),
                set: Arc::new(move |any, index, value| {
                    let list = downcast_mut::<Vec<T>>(any, expected)?;
                    let element: T = downcast_value(value, std::any::type_name::<T>())?;
                    match list.get_mut(index) {
                        Some(slot) => {
                            *slot = element;
                            Ok(())
                        }
                        None => Err(KeytreeError::construction(
                            expected,
                            format!("index {index} out of bounds"),
                        )),
                    }
                }),
                push: Arc::new(move |any, value| {
                    let list = downcast_mut::<Vec<T>>(any, expected)?;
                    list.push(downcast_value(value, std::any::type_name::<T>())?);
                    Ok(())
                }),
                items: Arc::new(move |any| {
                    let list = downcast_ref::<Vec<T>>(any, expected)?;
                    Ok(list.iter().map(|v| Box::new(v.clone()) as Value).collect())
                }),
            }),
            default_fn: Some(Arc::new(|| Box::new(Vec::<T>::new()))),
            constructors: vec![CtorInfo {
                params: Vec::new(),
                invoke: Arc::new(|_args| Ok(Box::new(Vec::<T>::new()))),
            }],
        }
    }
}

impl<T: Describe + Clone> Describe for Box<[T]> {
    fn build_type_info() -> TypeInfo {
        let inner_name = T::type_info().name.clone();
        let expected = std::any::type_name::<Box<[T]>>();
        TypeInfo {
            id: TypeId::of::<Box<[T]>>(),
            name: format!("Box<[{inner_name}]>"),
            kind: TypeKind::Array(ArrayInfo {
                element: TypeRef::of::<T>(),
                from_vec: Arc::new(|buffer| {
                    let elements = buffer
                        .into_iter()
                        .map(|v| downcast_value::<T>(v, std::any::type_name::<T>()))
                        .collect::<Result<Vec<T>>>()?;
                    Ok(Box::new(elements.into_boxed_slice()))
                }),
                items: Arc::new(move |any| {
                    let array = downcast_ref::<Box<[T]>>(any, expected)?;
                    Ok(array.iter().map(|v| Box::new(v.clone()) as Value).collect())
                }),
            }),
            default_fn: Some(Arc::new(|| Box::new(Vec::<T>::new().into_boxed_slice()))),
            constructors: Vec::new(),
        }
    }
}

macro_rules! describe_map {
    ($map:ident, $bound:path) => {
        impl<K, V> Describe for $map<K, V>
        where
            K: Describe + Clone + $bound,
            V: Describe + Clone,
        {
            fn build_type_info() -> TypeInfo {
                let key_name = K::type_info().name.clone();
                let value_name = V::type_info().name.clone();
                let expected = std::any::type_name::<$map<K, V>>();
                TypeInfo {
                    id: TypeId::of::<$map<K, V>>(),
                    name: format!("{}<{key_name}, {value_name}>", stringify!($map)),
                    kind: TypeKind::Map(MapInfo {
                        key: Some(TypeRef::of::<K>()),
                        value: Some(TypeRef::of::<V>()),
                        insert: Arc::new(move |any, key, value| {
                            let map = downcast_mut::<$map<K, V>>(any, expected)?;
                            let key: K = downcast_value(key, std::any::type_name::<K>())?;
                            let value: V = downcast_value(value, std::any::type_name::<V>())?;
                            // No-overwrite policy: a present key is reported,
                            // not replaced.
                            if map.contains_key(&key) {
                                return Ok(false);
                            }
                            map.insert(key, value);
                            Ok(true)
                        }),
                        entries: Arc::new(move |any| {
                            let map = downcast_ref::<$map<K, V>>(any, expected)?;
                            Ok(map
                                .iter()
                                .map(|(k, v)| {
                                    (Box::new(k.clone()) as Value, Box::new(v.clone()) as Value)
                                })
                                .collect())
                        }),
                    }),
                    default_fn: Some(Arc::new(|| Box::new($map::<K, V>::new()))),
                    constructors: Vec::new(),
                }
            }
        }
    };
}

describe_map!(HashMap, MapKeyHash);
describe_map!(BTreeMap, Ord);

/// Bound alias so the map macro can require `Eq + Hash` as one path.
pub trait MapKeyHash: Eq + Hash {}
impl<T: Eq + Hash> MapKeyHash for T {}

/// Describe an enum through its underlying integer representation. The
/// zero-representation member, when one exists, becomes the default
/// instance.
pub fn enum_type<T: Any + Clone + Send + Sync>(
    name: &str,
    underlying: PrimitiveKind,
    to_repr: fn(&T) -> i128,
    from_repr: fn(i128) -> Option<T>,
) -> TypeInfo {
    let expected = name.to_string();
    TypeInfo {
        id: TypeId::of::<T>(),
        name: name.to_string(),
        kind: TypeKind::Enum(EnumInfo {
            underlying,
            to_repr: Arc::new(move |any| Ok(to_repr(downcast_ref::<T>(any, &expected)?))),
            from_repr: Arc::new(move |repr| from_repr(repr).map(|v| Box::new(v) as Value)),
        }),
        default_fn: from_repr(0).map(|zero| {
            Arc::new(move || Box::new(zero.clone()) as Value)
                as Arc<dyn Fn() -> Value + Send + Sync>
        }),
        constructors: Vec::new(),
    }
}

/// Builder for composite type descriptors. Field metadata methods
/// (`comment`, `excluded`) apply to the most recently added field.
pub struct StructBuilder<T> {
    name: String,
    fields: Vec<FieldInfo>,
    constructors: Vec<CtorInfo>,
    default_fn: Option<Arc<dyn Fn() -> Value + Send + Sync>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any> StructBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        StructBuilder {
            name: name.into(),
            fields: Vec::new(),
            constructors: Vec::new(),
            default_fn: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Declare a readable/writable member serialized under `name`.
    pub fn field<F: Describe + Clone>(
        mut self,
        name: impl Into<String>,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Self {
        let expected = std::any::type_name::<T>();
        self.fields.push(FieldInfo {
            name: name.into(),
            ty: TypeRef::of::<F>(),
            get: Arc::new(move |any| Ok(Box::new(get(downcast_ref::<T>(any, expected)?)))),
            set: Arc::new(move |any, value| {
                let target = downcast_mut::<T>(any, expected)?;
                set(target, downcast_value(value, std::any::type_name::<F>())?);
                Ok(())
            }),
            comments: Vec::new(),
            include: true,
        });
        self
    }

    /// Declare a member stored as `F` but serialized as `U`, bridging with
    /// the given conversions (the serialized-as type override).
    pub fn field_as<F: Any, U: Describe + Clone>(
        mut self,
        name: impl Into<String>,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
        to: fn(&F) -> U,
        from: fn(U) -> F,
    ) -> Self {
        let expected = std::any::type_name::<T>();
        self.fields.push(FieldInfo {
            name: name.into(),
            ty: TypeRef::of::<U>(),
            get: Arc::new(move |any| {
                Ok(Box::new(to(&get(downcast_ref::<T>(any, expected)?))))
            }),
            set: Arc::new(move |any, value| {
                let target = downcast_mut::<T>(any, expected)?;
                set(target, from(downcast_value(value, std::any::type_name::<U>())?));
                Ok(())
            }),
            comments: Vec::new(),
            include: true,
        });
        self
    }

    /// Attach a comment line to the last declared field.
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.comments.push(text.into());
        }
        self
    }

    /// Exclude the last declared field from mapping.
    pub fn excluded(mut self) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.include = false;
        }
        self
    }

    pub fn with_default(mut self) -> Self
    where
        T: Default,
    {
        self.default_fn = Some(Arc::new(|| Box::new(T::default())));
        self
    }

    pub fn ctor0(mut self, f: fn() -> T) -> Self {
        self.constructors.push(CtorInfo {
            params: Vec::new(),
            invoke: Arc::new(move |_args| Ok(Box::new(f()))),
        });
        self
    }

    pub fn ctor1<A: Any>(mut self, f: fn(A) -> T) -> Self {
        self.constructors.push(CtorInfo {
            params: vec![(TypeId::of::<A>(), std::any::type_name::<A>())],
            invoke: Arc::new(move |mut args| {
                let a = downcast_value(args.remove(0), std::any::type_name::<A>())?;
                Ok(Box::new(f(a)))
            }),
        });
        self
    }

    pub fn ctor2<A: Any, B: Any>(mut self, f: fn(A, B) -> T) -> Self {
        self.constructors.push(CtorInfo {
            params: vec![
                (TypeId::of::<A>(), std::any::type_name::<A>()),
                (TypeId::of::<B>(), std::any::type_name::<B>()),
            ],
            invoke: Arc::new(move |mut args| {
                let b = downcast_value(args.remove(1), std::any::type_name::<B>())?;
                let a = downcast_value(args.remove(0), std::any::type_name::<A>())?;
                Ok(Box::new(f(a, b)))
            }),
        });
        self
    }

    pub fn ctor3<A: Any, B: Any, C: Any>(mut self, f: fn(A, B, C) -> T) -> Self {
        self.constructors.push(CtorInfo {
            params: vec![
                (TypeId::of::<A>(), std::any::type_name::<A>()),
                (TypeId::of::<B>(), std::any::type_name::<B>()),
                (TypeId::of::<C>(), std::any::type_name::<C>()),
            ],
            invoke: Arc::new(move |mut args| {
                let c = downcast_value(args.remove(2), std::any::type_name::<C>())?;
                let b = downcast_value(args.remove(1), std::any::type_name::<B>())?;
                let a = downcast_value(args.remove(0), std::any::type_name::<A>())?;
                Ok(Box::new(f(a, b, c)))
            }),
        });
        self
    }

    pub fn build(self) -> TypeInfo {
        TypeInfo {
            id: TypeId::of::<T>(),
            name: self.name,
            kind: TypeKind::Struct(StructInfo {
                fields: self.fields,
            }),
            default_fn: self.default_fn,
            constructors: self.constructors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Describe for Point {
        fn build_type_info() -> TypeInfo {
            StructBuilder::<Point>::new("Point")
                .field("x", |p: &Point| p.x, |p, v| p.x = v)
                .field("y", |p: &Point| p.y, |p, v| p.y = v)
                .with_default()
                .ctor2(|x: i32, y: i32| Point { x, y })
                .build()
        }
    }

    #[test]
    fn test_registry_memoizes() {
        let a = i32::type_info();
        let b = i32::type_info();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name, "i32");
    }

    #[test]
    fn test_struct_accessors_round_trip() {
        let info = Point::type_info();
        let TypeKind::Struct(s) = &info.kind else {
            panic!("expected struct kind");
        };

        let mut point: Value = Box::new(Point { x: 1, y: 2 });
        let x = (s.fields[0].get)(point.as_ref()).unwrap();
        assert_eq!(*x.downcast_ref::<i32>().unwrap(), 1);

        (s.fields[1].set)(point.as_mut(), Box::new(9i32)).unwrap();
        assert_eq!(point.downcast_ref::<Point>().unwrap().y, 9);
    }

    #[test]
    fn test_struct_accessor_type_mismatch() {
        let info = Point::type_info();
        let TypeKind::Struct(s) = &info.kind else {
            panic!("expected struct kind");
        };
        let mut point: Value = Box::new(Point::default());
        let err = (s.fields[0].set)(point.as_mut(), Box::new("nope".to_string())).unwrap_err();
        assert!(matches!(err, KeytreeError::Construction { .. }));
    }

    #[test]
    fn test_optional_wrap_unwrap() {
        let info = Option::<i32>::type_info();
        let TypeKind::Optional(opt) = &info.kind else {
            panic!("expected optional kind");
        };

        let wrapped = (opt.wrap)(Some(Box::new(5i32))).unwrap();
        let inner = (opt.unwrap)(wrapped.as_ref()).unwrap().unwrap();
        assert_eq!(*inner.downcast_ref::<i32>().unwrap(), 5);

        let none = (opt.wrap)(None).unwrap();
        assert!((opt.unwrap)(none.as_ref()).unwrap().is_none());
    }

    #[test]
    fn test_map_insert_reports_duplicate() {
        let info = BTreeMap::<String, i32>::type_info();
        let TypeKind::Map(map_info) = &info.kind else {
            panic!("expected map kind");
        };

        let mut map: Value = Box::new(BTreeMap::<String, i32>::new());
        let inserted =
            (map_info.insert)(map.as_mut(), Box::new("a".to_string()), Box::new(1i32)).unwrap();
        assert!(inserted);
        let inserted =
            (map_info.insert)(map.as_mut(), Box::new("a".to_string()), Box::new(2i32)).unwrap();
        assert!(!inserted);
        // First value survives
        assert_eq!(map.downcast_ref::<BTreeMap<String, i32>>().unwrap()["a"], 1);
    }

    #[test]
    fn test_array_from_vec() {
        let info = Box::<[u8]>::type_info();
        let TypeKind::Array(array) = &info.kind else {
            panic!("expected array kind");
        };
        let value = (array.from_vec)(vec![Box::new(1u8), Box::new(2u8)]).unwrap();
        let slice = value.downcast_ref::<Box<[u8]>>().unwrap();
        assert_eq!(&**slice, &[1, 2]);
    }

    #[test]
    fn test_field_as_bridges_serialized_type() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Timer {
            millis: u64,
        }
        impl Describe for Timer {
            fn build_type_info() -> TypeInfo {
                StructBuilder::<Timer>::new("Timer")
                    .field_as(
                        "millis",
                        |t: &Timer| t.millis,
                        |t, v| t.millis = v,
                        |v: &u64| v.to_string(),
                        |s: String| s.parse().unwrap_or(0),
                    )
                    .with_default()
                    .build()
            }
        }

        let info = Timer::type_info();
        let TypeKind::Struct(s) = &info.kind else {
            panic!("expected struct kind");
        };
        // The declared member type is the serialized form
        assert_eq!(s.fields[0].ty.resolve().name, "String");

        let mut timer: Value = Box::new(Timer { millis: 250 });
        let got = (s.fields[0].get)(timer.as_ref()).unwrap();
        assert_eq!(got.downcast_ref::<String>().unwrap(), "250");

        (s.fields[0].set)(timer.as_mut(), Box::new("1000".to_string())).unwrap();
        assert_eq!(timer.downcast_ref::<Timer>().unwrap().millis, 1000);
    }

    #[test]
    fn test_enum_descriptor() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Mode {
            Off,
            On,
        }
        let info = enum_type::<Mode>("Mode", PrimitiveKind::I32, |m| *m as i128, |i| match i {
            0 => Some(Mode::Off),
            1 => Some(Mode::On),
            _ => None,
        });

        let TypeKind::Enum(e) = &info.kind else {
            panic!("expected enum kind");
        };
        assert_eq!((e.to_repr)(&Mode::On).unwrap(), 1);
        assert!((e.from_repr)(7).is_none());
        assert!(info.default_fn.is_some());
    }
}
