use std::fmt;

/// A decoded primitive value of any universal type EmBER uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Utf8(String),
    Octets(Vec<u8>),
    Null,
    RelativeOid(Vec<u32>),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Boolean(_) => "boolean",
            Scalar::Integer(_) => "integer",
            Scalar::Real(_) => "real",
            Scalar::Utf8(_) => "string",
            Scalar::Octets(_) => "octets",
            Scalar::Null => "null",
            Scalar::RelativeOid(_) => "relative-oid",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Utf8(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(v) => write!(f, "{v}"),
            Scalar::Integer(v) => write!(f, "{v}"),
            Scalar::Real(v) => write!(f, "{v}"),
            Scalar::Utf8(v) => write!(f, "{v:?}"),
            Scalar::Octets(v) => {
                for octet in v {
                    write!(f, "{octet:02x}")?;
                }
                Ok(())
            }
            Scalar::Null => f.write_str("null"),
            Scalar::RelativeOid(v) => {
                let parts: Vec<String> = v.iter().map(u32::to_string).collect();
                f.write_str(&parts.join("."))
            }
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Real(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Utf8(value)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Scalar::Octets(value)
    }
}
