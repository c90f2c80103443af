//! Primitive/system-type converter: the fixed scalar kinds plus enums
//! through their underlying integer representation.

use std::any::Any;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::convert::{Converter, Mapper};
use crate::error::{KeytreeError, Result};
use crate::node::ObjectNode;
use crate::typeinfo::{downcast_ref, PrimitiveKind, TypeInfo, TypeKind, Value};

/// RFC-1123 style timestamp, the only accepted date-time shape.
const DATE_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Integer grammar admitting an exponent part: `123`, `-4e2`, `1E6`.
/// The expanded value must stay integral and within `i128`.
fn parse_integer(text: &str) -> Option<i128> {
    match text.find(['e', 'E']) {
        None => text.parse().ok(),
        Some(pos) => {
            let base: i128 = text[..pos].parse().ok()?;
            let exponent = &text[pos + 1..];
            let exp: u32 = exponent.strip_prefix('+').unwrap_or(exponent).parse().ok()?;
            base.checked_mul(10i128.checked_pow(exp)?)
        }
    }
}

/// Strip one trailing `f`/`d`/`m` type suffix, case-insensitively.
fn strip_float_suffix(text: &str) -> &str {
    match text.chars().last() {
        Some(c) if "fFdDmM".contains(c) => &text[..text.len() - c.len_utf8()],
        _ => text,
    }
}

fn integer<T>(kind: PrimitiveKind, text: &str) -> Result<Value>
where
    T: TryFrom<i128> + Any,
{
    parse_integer(text)
        .and_then(|wide| T::try_from(wide).ok())
        .map(|v| Box::new(v) as Value)
        .ok_or_else(|| KeytreeError::parse(kind.name(), text))
}

fn parse_scalar(kind: PrimitiveKind, text: Option<&str>) -> Result<Value> {
    let text = match text {
        Some(t) => t,
        // Only strings tolerate an absent value
        None if kind == PrimitiveKind::Str => return Ok(Box::new(String::new())),
        None => return Err(KeytreeError::parse(kind.name(), "")),
    };
    match kind {
        PrimitiveKind::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Ok(Box::new(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(Box::new(false))
            } else {
                Err(KeytreeError::parse(kind.name(), text))
            }
        }
        PrimitiveKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Box::new(c)),
                _ => Err(KeytreeError::parse(kind.name(), text)),
            }
        }
        PrimitiveKind::I8 => integer::<i8>(kind, text),
        PrimitiveKind::I16 => integer::<i16>(kind, text),
        PrimitiveKind::I32 => integer::<i32>(kind, text),
        PrimitiveKind::I64 => integer::<i64>(kind, text),
        PrimitiveKind::U8 => integer::<u8>(kind, text),
        PrimitiveKind::U16 => integer::<u16>(kind, text),
        PrimitiveKind::U32 => integer::<u32>(kind, text),
        PrimitiveKind::U64 => integer::<u64>(kind, text),
        PrimitiveKind::F32 => strip_float_suffix(text)
            .parse::<f32>()
            .map(|v| Box::new(v) as Value)
            .map_err(|_| KeytreeError::parse(kind.name(), text)),
        PrimitiveKind::F64 => strip_float_suffix(text)
            .parse::<f64>()
            .map(|v| Box::new(v) as Value)
            .map_err(|_| KeytreeError::parse(kind.name(), text)),
        PrimitiveKind::Decimal => strip_float_suffix(text)
            .parse::<Decimal>()
            .map(|v| Box::new(v) as Value)
            .map_err(|_| KeytreeError::parse(kind.name(), text)),
        PrimitiveKind::Str => Ok(Box::new(text.to_string())),
        PrimitiveKind::DateTime => NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
            .map(|naive| Box::new(naive.and_utc()) as Value)
            .map_err(|_| KeytreeError::parse(kind.name(), text)),
        PrimitiveKind::Uuid => Uuid::parse_str(text)
            .map(|v| Box::new(v) as Value)
            .map_err(|_| KeytreeError::parse(kind.name(), text)),
    }
}

fn format_scalar(kind: PrimitiveKind, value: &dyn Any) -> Result<Option<String>> {
    let name = kind.name();
    let text = match kind {
        PrimitiveKind::Bool => downcast_ref::<bool>(value, name)?.to_string(),
        PrimitiveKind::Char => downcast_ref::<char>(value, name)?.to_string(),
        PrimitiveKind::I8 => downcast_ref::<i8>(value, name)?.to_string(),
        PrimitiveKind::I16 => downcast_ref::<i16>(value, name)?.to_string(),
        PrimitiveKind::I32 => downcast_ref::<i32>(value, name)?.to_string(),
        PrimitiveKind::I64 => downcast_ref::<i64>(value, name)?.to_string(),
        PrimitiveKind::U8 => downcast_ref::<u8>(value, name)?.to_string(),
        PrimitiveKind::U16 => downcast_ref::<u16>(value, name)?.to_string(),
        PrimitiveKind::U32 => downcast_ref::<u32>(value, name)?.to_string(),
        PrimitiveKind::U64 => downcast_ref::<u64>(value, name)?.to_string(),
        // No forced suffix on output
        PrimitiveKind::F32 => downcast_ref::<f32>(value, name)?.to_string(),
        PrimitiveKind::F64 => downcast_ref::<f64>(value, name)?.to_string(),
        PrimitiveKind::Decimal => downcast_ref::<Decimal>(value, name)?.to_string(),
        PrimitiveKind::Str => downcast_ref::<String>(value, name)?.clone(),
        PrimitiveKind::DateTime => downcast_ref::<DateTime<Utc>>(value, name)?
            .format(DATE_TIME_FORMAT)
            .to_string(),
        PrimitiveKind::Uuid => downcast_ref::<Uuid>(value, name)?.to_string(),
    };
    Ok(Some(text))
}

/// Converter for the fixed scalar kinds and enums. Enums convert through
/// their underlying integer representation, never through member names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveConverter;

impl Converter for PrimitiveConverter {
    fn accepts(&self, ty: &TypeInfo) -> bool {
        matches!(ty.kind, TypeKind::Primitive(_) | TypeKind::Enum(_))
    }

    fn deserialize(&self, _mapper: &Mapper, ty: &TypeInfo, _node: &ObjectNode) -> Result<Value> {
        Err(KeytreeError::structure(format!(
            "primitive type '{}' cannot occupy an object node",
            ty.name
        )))
    }

    fn serialize(
        &self,
        _mapper: &Mapper,
        ty: &TypeInfo,
        _value: &dyn Any,
        _out: &mut ObjectNode,
    ) -> Result<()> {
        Err(KeytreeError::structure(format!(
            "primitive type '{}' cannot occupy an object node",
            ty.name
        )))
    }

    fn deserialize_primitive(
        &self,
        _mapper: &Mapper,
        ty: &TypeInfo,
        text: Option<&str>,
    ) -> Result<Value> {
        match &ty.kind {
            TypeKind::Primitive(kind) => parse_scalar(*kind, text),
            TypeKind::Enum(info) => {
                let text = text.ok_or_else(|| KeytreeError::parse(&ty.name, ""))?;
                let repr = parse_integer(text)
                    .ok_or_else(|| KeytreeError::parse(&ty.name, text))?;
                (info.from_repr)(repr).ok_or_else(|| KeytreeError::parse(&ty.name, text))
            }
            _ => Err(KeytreeError::lookup(format!(
                "primitive converter cannot handle type '{}'",
                ty.name
            ))),
        }
    }

    fn serialize_primitive(
        &self,
        mapper: &Mapper,
        ty: &TypeInfo,
        value: &dyn Any,
    ) -> Result<Option<String>> {
        // A textual input for a non-string target is normalized by running
        // it through the deserializer first.
        if !matches!(ty.kind, TypeKind::Primitive(PrimitiveKind::Str)) {
            if let Some(text) = value.downcast_ref::<String>() {
                let normalized = self.deserialize_primitive(mapper, ty, Some(text))?;
                return self.serialize_primitive(mapper, ty, normalized.as_ref());
            }
        }
        match &ty.kind {
            TypeKind::Primitive(kind) => format_scalar(*kind, value),
            TypeKind::Enum(info) => Ok(Some((info.to_repr)(value)?.to_string())),
            _ => Err(KeytreeError::lookup(format!(
                "primitive converter cannot handle type '{}'",
                ty.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeinfo::{enum_type, Describe};
    use rstest::rstest;

    fn deserialize(ty: &TypeInfo, text: &str) -> Value {
        PrimitiveConverter
            .deserialize_primitive(&Mapper::new(), ty, Some(text))
            .unwrap()
    }

    #[rstest]
    #[case("0", 0)]
    #[case("-17", -17)]
    #[case("1e3", 1000)]
    #[case("2E2", 200)]
    #[case("-4e+2", -400)]
    fn test_integer_grammar(#[case] text: &str, #[case] expected: i32) {
        let value = deserialize(&i32::type_info(), text);
        assert_eq!(*value.downcast_ref::<i32>().unwrap(), expected);
    }

    #[rstest]
    #[case("1.5")]
    #[case("300")] // overflows u8 after widening
    #[case("1e")]
    #[case("ten")]
    fn test_integer_rejects(#[case] text: &str) {
        let result =
            PrimitiveConverter.deserialize_primitive(&Mapper::new(), &u8::type_info(), Some(text));
        assert!(result.is_err(), "'{text}' must not parse");
    }

    #[rstest]
    #[case("3.14f", 3.14f32)]
    #[case("3.14F", 3.14f32)]
    #[case("2.5", 2.5f32)]
    #[case("1d", 1.0f32)]
    fn test_float_suffix(#[case] text: &str, #[case] expected: f32) {
        let value = deserialize(&f32::type_info(), text);
        assert_eq!(*value.downcast_ref::<f32>().unwrap(), expected);
    }

    #[test]
    fn test_float_output_has_no_suffix() {
        let text = PrimitiveConverter
            .serialize_primitive(&Mapper::new(), &f64::type_info(), &2.5f64)
            .unwrap();
        assert_eq!(text.as_deref(), Some("2.5"));
    }

    #[test]
    fn test_decimal_m_suffix() {
        let value = deserialize(&Decimal::type_info(), "10.25m");
        assert_eq!(
            *value.downcast_ref::<Decimal>().unwrap(),
            "10.25".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_bool_case_insensitive() {
        assert!(*deserialize(&bool::type_info(), "True").downcast_ref::<bool>().unwrap());
        assert!(!*deserialize(&bool::type_info(), "FALSE").downcast_ref::<bool>().unwrap());
    }

    #[test]
    fn test_date_time_fixed_format() {
        let ty = DateTime::<Utc>::type_info();
        let text = "Thu, 10 Apr 2008 13:30:00 GMT";
        let value = deserialize(&ty, text);
        let rendered = PrimitiveConverter
            .serialize_primitive(&Mapper::new(), &ty, value.as_ref())
            .unwrap();
        assert_eq!(rendered.as_deref(), Some(text));

        let err = PrimitiveConverter
            .deserialize_primitive(&Mapper::new(), &ty, Some("2008-04-10T13:30:00Z"))
            .unwrap_err();
        assert!(matches!(err, KeytreeError::Parse { .. }));
    }

    #[test]
    fn test_uuid_round_trip() {
        let ty = Uuid::type_info();
        let text = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let value = deserialize(&ty, text);
        let rendered = PrimitiveConverter
            .serialize_primitive(&Mapper::new(), &ty, value.as_ref())
            .unwrap();
        assert_eq!(rendered.as_deref(), Some(text));
    }

    #[test]
    fn test_enum_parses_by_underlying_integer() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Level {
            Low,
            High,
        }
        let ty = enum_type::<Level>("Level", PrimitiveKind::I32, |l| *l as i128, |i| match i {
            0 => Some(Level::Low),
            1 => Some(Level::High),
            _ => None,
        });

        let value = deserialize(&ty, "1");
        assert_eq!(*value.downcast_ref::<Level>().unwrap(), Level::High);

        // Member names are not accepted
        let err = PrimitiveConverter
            .deserialize_primitive(&Mapper::new(), &ty, Some("High"))
            .unwrap_err();
        assert!(matches!(err, KeytreeError::Parse { .. }));

        let rendered = PrimitiveConverter
            .serialize_primitive(&Mapper::new(), &ty, &Level::High)
            .unwrap();
        assert_eq!(rendered.as_deref(), Some("1"));
    }

    #[test]
    fn test_textual_input_is_normalized() {
        let text = PrimitiveConverter
            .serialize_primitive(
                &Mapper::new(),
                &f32::type_info(),
                &"3.14f".to_string(),
            )
            .unwrap();
        assert_eq!(text.as_deref(), Some("3.14"));
    }

    #[test]
    fn test_absent_value() {
        let value = PrimitiveConverter
            .deserialize_primitive(&Mapper::new(), &String::type_info(), None)
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "");

        assert!(PrimitiveConverter
            .deserialize_primitive(&Mapper::new(), &i32::type_info(), None)
            .is_err());
    }
}
