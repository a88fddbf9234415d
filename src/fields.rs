//! Encode put payloads into the field name/value string pairs sent to a server.
//!
//! A put either targets the `value` member of the PV with a single scalar, or
//! names the members to set explicitly. Member names may be dotted paths such as
//! `X.value`, to reach into group PVs; they are passed through unchanged.

use std::fmt;

use thiserror::Error;

use crate::value::{Number, Value};

/// Field targeted by a put that does not name one
pub const DEFAULT_FIELD: &str = "value";

/// A single value that can be written to a PV field
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

/// Data for a single put operation
#[derive(Clone, Debug, PartialEq)]
pub enum PutPayload {
    /// Write to the `value` field
    Scalar(Scalar),
    /// Write each named field, in order
    Fields(Vec<(String, Scalar)>),
}

/// One encoded field, as handed to the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPayloadError {
    #[error("No data was given to put")]
    Missing,
    #[error("A put must name at least one field")]
    Empty,
    #[error("Field '{0}' is not a scalar value")]
    NotScalar(String),
}

/// Turn a put payload into the ordered list of fields to write
pub fn encode(payload: Option<&PutPayload>) -> Result<Vec<Field>, InvalidPayloadError> {
    match payload {
        None => Err(InvalidPayloadError::Missing),
        Some(PutPayload::Fields(fields)) if fields.is_empty() => Err(InvalidPayloadError::Empty),
        Some(PutPayload::Fields(fields)) => Ok(fields
            .iter()
            .map(|(name, value)| Field::new(name.clone(), value))
            .collect()),
        Some(PutPayload::Scalar(value)) => Ok(vec![Field::new(DEFAULT_FIELD, value)]),
    }
}

impl Field {
    fn new(name: impl Into<String>, value: &Scalar) -> Self {
        Field {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    /// The textual form the server parses back into the field's own type.
    ///
    /// Floats use the shortest representation that reads back as the same
    /// number, so `10.0` is written as `10`. Non-finite floats use the same
    /// tokens the server itself writes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) if v.is_nan() => f.write_str("nan"),
            Scalar::Float(v) if v.is_infinite() => {
                f.write_str(if *v > 0.0 { "inf" } else { "-inf" })
            }
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::String(v) => f.write_str(v),
        }
    }
}

impl TryFrom<Value> for Scalar {
    type Error = InvalidPayloadError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => return Err(InvalidPayloadError::Missing),
            Value::Bool(v) => Scalar::Bool(v),
            Value::Number(Number::Int(v)) => Scalar::Int(v),
            Value::Number(Number::UInt(v)) => Scalar::UInt(v),
            Value::Number(Number::Float(v)) => Scalar::Float(v),
            Value::String(v) => Scalar::String(v),
            Value::Array(_) | Value::Object(_) => {
                return Err(InvalidPayloadError::NotScalar(DEFAULT_FIELD.to_string()));
            }
        })
    }
}

impl TryFrom<Value> for PutPayload {
    type Error = InvalidPayloadError;
    /// A structure becomes a put of each of its members, which must all be
    /// scalars. Anything else is put to the `value` field.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(members) => members
                .into_iter()
                .map(|(name, member)| match Scalar::try_from(member) {
                    Ok(scalar) => Ok((name, scalar)),
                    Err(_) => Err(InvalidPayloadError::NotScalar(name)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PutPayload::Fields),
            other => Scalar::try_from(other).map(PutPayload::Scalar),
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v as $target)
                }
            }
            impl From<$t> for PutPayload {
                fn from(v: $t) -> Self {
                    PutPayload::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_from!(
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

impl From<bool> for PutPayload {
    fn from(v: bool) -> Self {
        PutPayload::Scalar(v.into())
    }
}

impl From<&str> for PutPayload {
    fn from(v: &str) -> Self {
        PutPayload::Scalar(v.into())
    }
}

impl From<String> for PutPayload {
    fn from(v: String) -> Self {
        PutPayload::Scalar(v.into())
    }
}

impl From<Scalar> for PutPayload {
    fn from(v: Scalar) -> Self {
        PutPayload::Scalar(v)
    }
}

impl<K, V> FromIterator<(K, V)> for PutPayload
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PutPayload::Fields(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::decode;

    fn pairs(fields: Vec<Field>) -> Vec<(String, String)> {
        fields.into_iter().map(|f| (f.name, f.value)).collect()
    }

    #[test]
    fn scalar_targets_value_field() {
        for (payload, text) in [
            (PutPayload::from(10), "10"),
            (PutPayload::from(-3i64), "-3"),
            (PutPayload::from(true), "true"),
            (PutPayload::from(2.5), "2.5"),
            (PutPayload::from(10.0), "10"),
            (PutPayload::from("some text"), "some text"),
            (PutPayload::from(u64::MAX), "18446744073709551615"),
        ] {
            let fields = encode(Some(&payload)).unwrap();
            assert_eq!(pairs(fields), vec![("value".to_string(), text.to_string())]);
        }
    }

    #[test]
    fn mapping_keeps_order() {
        let payload: PutPayload = [("a", Scalar::from(1)), ("b", Scalar::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(
            pairs(encode(Some(&payload)).unwrap()),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x".to_string())
            ]
        );

        let payload: PutPayload = [("Y.value", 20), ("X.value", 10)].into_iter().collect();
        assert_eq!(
            pairs(encode(Some(&payload)).unwrap()),
            vec![
                ("Y.value".to_string(), "20".to_string()),
                ("X.value".to_string(), "10".to_string())
            ]
        );
    }

    #[test]
    fn missing_or_empty_payload_is_invalid() {
        assert_eq!(encode(None), Err(InvalidPayloadError::Missing));
        assert_eq!(
            encode(Some(&PutPayload::Fields(Vec::new()))),
            Err(InvalidPayloadError::Empty)
        );
    }

    #[test]
    fn non_finite_floats_use_server_tokens() {
        assert_eq!(Scalar::from(f64::NAN).to_string(), "nan");
        assert_eq!(Scalar::from(f64::INFINITY).to_string(), "inf");
        assert_eq!(Scalar::from(f64::NEG_INFINITY).to_string(), "-inf");
    }

    #[test]
    fn stringified_scalars_decode_back() {
        for scalar in [Scalar::from(42), Scalar::from(-0.125), Scalar::from(false)] {
            let decoded = decode(&scalar.to_string()).unwrap();
            assert_eq!(Scalar::try_from(decoded).unwrap(), scalar);
        }
    }

    #[test]
    fn payload_from_decoded_value() {
        let value = decode(r#"{"value": 50, "label": "on"}"#).unwrap();
        assert_eq!(
            PutPayload::try_from(value).unwrap(),
            PutPayload::Fields(vec![
                ("value".to_string(), Scalar::Int(50)),
                ("label".to_string(), Scalar::String("on".to_string())),
            ])
        );
        assert_eq!(
            PutPayload::try_from(Value::from(40)).unwrap(),
            PutPayload::Scalar(Scalar::Int(40))
        );
        assert_eq!(
            PutPayload::try_from(Value::Null),
            Err(InvalidPayloadError::Missing)
        );
        assert_eq!(
            PutPayload::try_from(decode(r#"{"alarm": {"severity": 1}}"#).unwrap()),
            Err(InvalidPayloadError::NotScalar("alarm".to_string()))
        );
    }
}
