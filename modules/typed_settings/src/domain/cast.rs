//! Declared field types and the cast strategies applied when a projection is filled
//!
//! Each supported primitive has one named strategy (`cast_array`, `cast_int`,
//! `cast_float`, `cast_bool`, `cast_string`), selected by the `TypeName` tag.

use crate::contract::CastError;
use serde_json::{Number, Value};
use std::fmt;

/// Primitive type tag of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Array,
    Int,
    Float,
    Bool,
    String,
    /// Any other declared type; casting to it always fails
    Other(&'static str),
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Array => write!(f, "array"),
            TypeName::Int => write!(f, "int"),
            TypeName::Float => write!(f, "float"),
            TypeName::Bool => write!(f, "bool"),
            TypeName::String => write!(f, "string"),
            TypeName::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A single named type, optionally nullable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub name: TypeName,
    pub nullable: bool,
}

impl NamedType {
    pub const fn new(name: TypeName) -> Self {
        Self {
            name,
            nullable: false,
        }
    }
}

/// Declared type of a projection field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDecl {
    /// No declared type: values pass through untouched
    Mixed,
    Named(NamedType),
    Union(Vec<NamedType>),
    Intersection(Vec<NamedType>),
}

impl TypeDecl {
    pub const fn array() -> Self {
        TypeDecl::Named(NamedType::new(TypeName::Array))
    }

    pub const fn int() -> Self {
        TypeDecl::Named(NamedType::new(TypeName::Int))
    }

    pub const fn float() -> Self {
        TypeDecl::Named(NamedType::new(TypeName::Float))
    }

    pub const fn bool() -> Self {
        TypeDecl::Named(NamedType::new(TypeName::Bool))
    }

    pub const fn string() -> Self {
        TypeDecl::Named(NamedType::new(TypeName::String))
    }

    pub const fn other(name: &'static str) -> Self {
        TypeDecl::Named(NamedType::new(TypeName::Other(name)))
    }

    /// Allow null on a named type. Unions and intersections are returned as is.
    pub fn nullable(self) -> Self {
        match self {
            TypeDecl::Named(named) => TypeDecl::Named(NamedType {
                nullable: true,
                ..named
            }),
            other => other,
        }
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |members: &[NamedType], sep: &str| {
            members
                .iter()
                .map(|member| member.name.to_string())
                .collect::<Vec<_>>()
                .join(sep)
        };
        match self {
            TypeDecl::Mixed => write!(f, "mixed"),
            TypeDecl::Named(named) if named.nullable => write!(f, "?{}", named.name),
            TypeDecl::Named(named) => write!(f, "{}", named.name),
            TypeDecl::Union(members) => write!(f, "{}", join(members, "|")),
            TypeDecl::Intersection(members) => write!(f, "{}", join(members, "&")),
        }
    }
}

/// Cast `value` to the declared type
pub fn cast(value: Value, decl: &TypeDecl) -> Result<Value, CastError> {
    let named = match decl {
        TypeDecl::Mixed => return Ok(value),
        TypeDecl::Intersection(_) => return Err(CastError::Intersection),
        TypeDecl::Union(members) => match members.as_slice() {
            [single] => single,
            _ => {
                return Err(CastError::Union {
                    members: members.len(),
                })
            }
        },
        TypeDecl::Named(named) => named,
    };

    if named.nullable && is_null_literal(&value) {
        return Ok(Value::Null);
    }

    match named.name {
        TypeName::Array => Ok(cast_array(value)),
        TypeName::Int => cast_int(value),
        TypeName::Float => cast_float(value),
        TypeName::Bool => cast_bool(value),
        TypeName::String => cast_string(value),
        TypeName::Other(type_name) => Err(CastError::Unsupported {
            type_name: type_name.to_string(),
        }),
    }
}

/// Whether `decl` admits null. Undeclared types do.
pub fn accepts_null(decl: &TypeDecl) -> bool {
    match decl {
        TypeDecl::Mixed => true,
        TypeDecl::Named(named) => named.nullable,
        TypeDecl::Union(members) => members.iter().any(|member| member.nullable),
        TypeDecl::Intersection(_) => false,
    }
}

/// Reject null on a type that does not admit it, otherwise `cast`
pub fn cast_assigned(value: Value, decl: &TypeDecl) -> Result<Value, CastError> {
    if value.is_null() && !accepts_null(decl) {
        return Err(CastError::NotNullable {
            type_name: decl.to_string(),
        });
    }
    cast(value, decl)
}

/// Null, whitespace-only strings and empty arrays or objects hold no value
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn is_null_literal(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "null",
        _ => false,
    }
}

fn coercion(value: &Value, target: &'static str) -> CastError {
    CastError::Coercion {
        value: value.to_string(),
        target,
    }
}

fn cast_array(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => value,
        Value::Null => Value::Array(Vec::new()),
        scalar => Value::Array(vec![scalar]),
    }
}

fn cast_int(value: Value) -> Result<Value, CastError> {
    match &value {
        Value::Null => Ok(Value::from(0)),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::Number(n) => {
            if n.is_i64() {
                return Ok(value);
            }
            n.as_f64()
                .and_then(truncate)
                .map(Value::from)
                .ok_or_else(|| coercion(&value, "int"))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate))
                .map(Value::from)
                .ok_or_else(|| coercion(&value, "int"))
        }
        Value::Array(_) | Value::Object(_) => Err(coercion(&value, "int")),
    }
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn cast_float(value: Value) -> Result<Value, CastError> {
    let float = match &value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Array(_) | Value::Object(_) => None,
    };

    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| coercion(&value, "float"))
}

fn cast_bool(value: Value) -> Result<Value, CastError> {
    match &value {
        Value::Null => Ok(Value::Bool(false)),
        Value::Bool(_) => Ok(value),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
            "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
            _ => Err(coercion(&value, "bool")),
        },
        Value::Array(items) => Ok(Value::Bool(!items.is_empty())),
        Value::Object(map) => Ok(Value::Bool(!map.is_empty())),
    }
}

fn cast_string(value: Value) -> Result<Value, CastError> {
    match value {
        Value::String(_) => Ok(value),
        Value::Null => Ok(Value::String(String::new())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(coercion(&value, "string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_values() {
        for blank in [json!(null), json!(""), json!("  "), json!([]), json!({})] {
            assert!(is_blank(&blank), "{blank} should be blank");
        }
        for filled in [json!(0), json!(false), json!("0"), json!([null])] {
            assert!(!is_blank(&filled), "{filled} should be filled");
        }
    }

    #[test]
    fn test_assigned_null_needs_nullable_type() {
        assert!(matches!(
            cast_assigned(Value::Null, &TypeDecl::int()),
            Err(CastError::NotNullable { type_name }) if type_name == "int"
        ));
        assert_eq!(
            cast_assigned(Value::Null, &TypeDecl::int().nullable()).unwrap(),
            Value::Null
        );
        assert_eq!(cast_assigned(Value::Null, &TypeDecl::Mixed).unwrap(), Value::Null);
        assert_eq!(cast_assigned(json!("7"), &TypeDecl::int()).unwrap(), json!(7));
    }

    #[test]
    fn test_mixed_passes_through() {
        let value = json!({"nested": [1, 2, 3]});
        assert_eq!(cast(value.clone(), &TypeDecl::Mixed).unwrap(), value);
    }

    #[test]
    fn test_intersection_is_rejected() {
        let decl = TypeDecl::Intersection(vec![
            NamedType::new(TypeName::Int),
            NamedType::new(TypeName::String),
        ]);

        assert_eq!(cast(json!(1), &decl), Err(CastError::Intersection));
    }

    #[test]
    fn test_union_with_single_member_is_accepted() {
        let decl = TypeDecl::Union(vec![NamedType::new(TypeName::Int)]);
        assert_eq!(cast(json!("42"), &decl).unwrap(), json!(42));
    }

    #[test]
    fn test_union_with_many_members_is_rejected() {
        let decl = TypeDecl::Union(vec![
            NamedType::new(TypeName::Int),
            NamedType::new(TypeName::Float),
        ]);

        assert_eq!(cast(json!(1), &decl), Err(CastError::Union { members: 2 }));
    }

    #[test]
    fn test_unsupported_type() {
        let err = cast(json!("x"), &TypeDecl::other("DateTime")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported type casting: DateTime");
    }

    #[test]
    fn test_nullable_null_literals() {
        let decl = TypeDecl::int().nullable();

        assert_eq!(cast(json!("null"), &decl).unwrap(), Value::Null);
        assert_eq!(cast(json!(""), &decl).unwrap(), Value::Null);
        assert_eq!(cast(Value::Null, &decl).unwrap(), Value::Null);
        assert_eq!(cast(json!("7"), &decl).unwrap(), json!(7));
    }

    #[test]
    fn test_non_nullable_empty_string() {
        assert_eq!(cast(json!(""), &TypeDecl::string()).unwrap(), json!(""));
        assert!(cast(json!(""), &TypeDecl::int()).is_err());
    }

    #[test]
    fn test_int_coercions() {
        assert_eq!(cast(json!(3), &TypeDecl::int()).unwrap(), json!(3));
        assert_eq!(cast(json!(3.9), &TypeDecl::int()).unwrap(), json!(3));
        assert_eq!(cast(json!(" 12 "), &TypeDecl::int()).unwrap(), json!(12));
        assert_eq!(cast(json!("4.5"), &TypeDecl::int()).unwrap(), json!(4));
        assert_eq!(cast(json!(true), &TypeDecl::int()).unwrap(), json!(1));
        assert!(cast(json!("three"), &TypeDecl::int()).is_err());
        assert!(cast(json!([1]), &TypeDecl::int()).is_err());
    }

    #[test]
    fn test_float_coercions() {
        assert_eq!(cast(json!(3), &TypeDecl::float()).unwrap(), json!(3.0));
        assert_eq!(cast(json!("2.5"), &TypeDecl::float()).unwrap(), json!(2.5));
        assert!(cast(json!("NaN"), &TypeDecl::float()).is_err());
    }

    #[test]
    fn test_bool_coercions() {
        assert_eq!(cast(json!("0"), &TypeDecl::bool()).unwrap(), json!(false));
        assert_eq!(cast(json!("yes"), &TypeDecl::bool()).unwrap(), json!(true));
        assert_eq!(cast(json!(0), &TypeDecl::bool()).unwrap(), json!(false));
        assert_eq!(cast(json!([]), &TypeDecl::bool()).unwrap(), json!(false));
        assert!(cast(json!("maybe"), &TypeDecl::bool()).is_err());
    }

    #[test]
    fn test_string_coercions() {
        assert_eq!(cast(json!(5), &TypeDecl::string()).unwrap(), json!("5"));
        assert_eq!(cast(json!(false), &TypeDecl::string()).unwrap(), json!("false"));
        assert!(cast(json!({"a": 1}), &TypeDecl::string()).is_err());
    }

    #[test]
    fn test_array_coercions() {
        assert_eq!(cast(json!("a"), &TypeDecl::array()).unwrap(), json!(["a"]));
        assert_eq!(cast(Value::Null, &TypeDecl::array()).unwrap(), json!([]));
        assert_eq!(
            cast(json!({"k": "v"}), &TypeDecl::array()).unwrap(),
            json!({"k": "v"})
        );
    }

    #[test]
    fn test_native_values_round_trip() {
        let samples = [
            (json!("dark"), TypeDecl::string()),
            (json!(-17), TypeDecl::int()),
            (json!(0.25), TypeDecl::float()),
            (json!(true), TypeDecl::bool()),
            (json!([1, "two", null]), TypeDecl::array()),
            (Value::Null, TypeDecl::string().nullable()),
        ];

        for (value, decl) in samples {
            assert_eq!(cast(value.clone(), &decl).unwrap(), value, "decl: {decl:?}");
        }
    }
}
