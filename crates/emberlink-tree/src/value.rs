use std::fmt;

use emberlink_ber::{EmberReader, EmberWriter, Scalar, Tag};
use serde::Serialize;

use crate::error::{Result, TreeError};

/// The value of a parameter, an invocation argument or a result item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Octets(Vec<u8>),
    /// Index into the parameter's enum map.
    Enum(i64),
    Null,
}

impl Value {
    pub(crate) fn from_scalar(scalar: Scalar) -> Result<Self> {
        Ok(match scalar {
            Scalar::Boolean(v) => Value::Boolean(v),
            Scalar::Integer(v) => Value::Integer(v),
            Scalar::Real(v) => Value::Real(v),
            Scalar::Utf8(v) => Value::String(v),
            Scalar::Octets(v) => Value::Octets(v),
            Scalar::Null => Value::Null,
            Scalar::RelativeOid(_) => {
                return Err(TreeError::UnexpectedValue("relative OID"));
            }
        })
    }

    pub(crate) fn read(reader: &EmberReader<'_>) -> Result<Self> {
        Value::from_scalar(reader.read_scalar()?)
    }

    pub(crate) fn write(&self, writer: &mut EmberWriter, outer: Tag) {
        match self {
            Value::Boolean(v) => writer.write_boolean(outer, *v),
            Value::Integer(v) | Value::Enum(v) => writer.write_integer(outer, *v),
            Value::Real(v) => writer.write_real(outer, *v),
            Value::String(v) => writer.write_utf8(outer, v),
            Value::Octets(v) => writer.write_octets(outer, v),
            Value::Null => writer.write_null(outer),
        }
    }

    /// The parameter type this value naturally belongs to.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Value::Boolean(_) => ParameterType::Boolean,
            Value::Integer(_) => ParameterType::Integer,
            Value::Real(_) => ParameterType::Real,
            Value::String(_) => ParameterType::String,
            Value::Octets(_) => ParameterType::Octets,
            Value::Enum(_) => ParameterType::Enum,
            Value::Null => ParameterType::Null,
        }
    }

    /// Parse a command-line style literal for the given type.
    pub fn parse(kind: ParameterType, text: &str) -> std::result::Result<Self, String> {
        match kind {
            ParameterType::Boolean => match text {
                "true" | "1" | "on" => Ok(Value::Boolean(true)),
                "false" | "0" | "off" => Ok(Value::Boolean(false)),
                other => Err(format!("not a boolean: {other}")),
            },
            ParameterType::Integer | ParameterType::Trigger => text
                .parse()
                .map(Value::Integer)
                .map_err(|err| format!("not an integer: {text} ({err})")),
            ParameterType::Enum => text
                .parse()
                .map(Value::Enum)
                .map_err(|err| format!("not an enum index: {text} ({err})")),
            ParameterType::Real => text
                .parse()
                .map(Value::Real)
                .map_err(|err| format!("not a real: {text} ({err})")),
            ParameterType::String => Ok(Value::String(text.to_string())),
            ParameterType::Octets => parse_hex(text).map(Value::Octets),
            ParameterType::Null => Ok(Value::Null),
        }
    }
}

fn parse_hex(text: &str) -> std::result::Result<Vec<u8>, String> {
    if text.len() % 2 != 0 {
        return Err(format!("odd number of hex digits: {text}"));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("not hex: {text}"))
        })
        .collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) | Value::Enum(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Octets(v) => {
                for octet in v {
                    write!(f, "{octet:02x}")?;
                }
                Ok(())
            }
            Value::Null => f.write_str("null"),
        }
    }
}

/// Glow `ParameterType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Null,
    Integer,
    Real,
    String,
    Boolean,
    Trigger,
    Enum,
    Octets,
}

impl ParameterType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => ParameterType::Null,
            1 => ParameterType::Integer,
            2 => ParameterType::Real,
            3 => ParameterType::String,
            4 => ParameterType::Boolean,
            5 => ParameterType::Trigger,
            6 => ParameterType::Enum,
            7 => ParameterType::Octets,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            ParameterType::Null => 0,
            ParameterType::Integer => 1,
            ParameterType::Real => 2,
            ParameterType::String => 3,
            ParameterType::Boolean => 4,
            ParameterType::Trigger => 5,
            ParameterType::Enum => 6,
            ParameterType::Octets => 7,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::Null => "null",
            ParameterType::Integer => "integer",
            ParameterType::Real => "real",
            ParameterType::String => "string",
            ParameterType::Boolean => "boolean",
            ParameterType::Trigger => "trigger",
            ParameterType::Enum => "enum",
            ParameterType::Octets => "octets",
        };
        f.write_str(name)
    }
}

/// Glow `ParameterAccess`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    None,
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Access::None,
            1 => Access::Read,
            2 => Access::Write,
            3 => Access::ReadWrite,
            _ => return None,
        })
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// One entry of a function's argument or result signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TupleItem {
    pub kind: ParameterType,
    pub name: Option<String>,
}

/// Glow `StreamDescription`: where a parameter's value sits inside a stream entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    pub format: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literals_per_type() {
        assert_eq!(
            Value::parse(ParameterType::Boolean, "on"),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            Value::parse(ParameterType::Integer, "-42"),
            Ok(Value::Integer(-42))
        );
        assert_eq!(Value::parse(ParameterType::Real, "2.5"), Ok(Value::Real(2.5)));
        assert_eq!(Value::parse(ParameterType::Enum, "3"), Ok(Value::Enum(3)));
        assert_eq!(
            Value::parse(ParameterType::Octets, "00ff10"),
            Ok(Value::Octets(vec![0x00, 0xFF, 0x10]))
        );
        assert!(Value::parse(ParameterType::Octets, "abc").is_err());
        assert!(Value::parse(ParameterType::Integer, "x").is_err());
    }

    #[test]
    fn parameter_type_codes_roundtrip() {
        for code in 0..8 {
            let kind = ParameterType::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(ParameterType::from_code(8).is_none());
    }

    #[test]
    fn value_serializes_tagged() {
        let json = serde_json::to_string(&Value::Integer(5)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":5}"#);
        assert_eq!(Value::String("a".into()).to_string(), "\"a\"");
    }

    #[test]
    fn access_writability() {
        assert!(Access::ReadWrite.is_writable());
        assert!(!Access::default().is_writable());
        assert_eq!(Access::from_code(2), Some(Access::Write));
    }
}
