use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serde helper encoding `Vec<u8>` as a standard base64 string.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Typed scalar bound to a named placeholder in the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BindValue {
    Null,
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    String(String),
    Bytes(#[serde(with = "b64")] Vec<u8>),
}

impl BindValue {
    pub fn bytes(raw: impl AsRef<[u8]>) -> Self { BindValue::Bytes(raw.as_ref().to_vec()) }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self { BindValue::Int64(v) }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self { BindValue::String(v.to_string()) }
}

pub type BindVariables = BTreeMap<String, BindValue>;

/// A result cell. The payload is the raw textual encoding; the variant records how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integral(#[serde(with = "b64")] Vec<u8>),
    Fractional(#[serde(with = "b64")] Vec<u8>),
    String(#[serde(with = "b64")] Vec<u8>),
}

impl Value {
    pub fn string(raw: impl AsRef<[u8]>) -> Self { Value::String(raw.as_ref().to_vec()) }

    pub fn raw(&self) -> &[u8] {
        match self {
            Value::Null => &[],
            Value::Integral(b) | Value::Fractional(b) | Value::String(b) => b,
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_base64_on_the_wire() {
        let v = Value::string("row1 value1");
        let text = serde_json::to_string(&v).unwrap();
        assert_eq!(text, r#"{"type":"string","value":"cm93MSB2YWx1ZTE="}"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back.raw(), b"row1 value1");
    }

    #[test]
    fn bind_null_has_no_content() {
        let text = serde_json::to_string(&BindValue::Null).unwrap();
        assert_eq!(text, r#"{"type":"null"}"#);
        let back: BindValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, BindValue::Null);
    }
}
