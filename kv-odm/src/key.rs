//! Store-assigned entity identity and its URL-safe string form.
//!
//! A key is serialized as a small protobuf record and then base64url
//! encoded without padding. Callers treat the encoded string as opaque; it
//! is what gets embedded in other entities' fields to stand in for a
//! foreign key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use prost::Message;

use crate::error::Error;
use crate::value::{FieldValue, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    Id(i64),
    Name(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    kind: String,
    id: KeyId,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct KeyReference {
    #[prost(string, tag = "1")]
    kind: ::prost::alloc::string::String,
    #[prost(int64, optional, tag = "2")]
    id: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "3")]
    name: ::core::option::Option<::prost::alloc::string::String>,
}

impl Key {
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Id(id),
        }
    }

    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Name(name.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn encode(&self) -> String {
        let reference = match &self.id {
            KeyId::Id(id) => KeyReference {
                kind: self.kind.clone(),
                id: Some(*id),
                name: None,
            },
            KeyId::Name(name) => KeyReference {
                kind: self.kind.clone(),
                id: None,
                name: Some(name.clone()),
            },
        };
        URL_SAFE_NO_PAD.encode(reference.encode_to_vec())
    }

    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| Error::InvalidKeyEncoding(format!("{}: {}", encoded, e)))?;
        let reference = KeyReference::decode(bytes.as_slice())
            .map_err(|e| Error::InvalidKeyEncoding(format!("{}: {}", encoded, e)))?;

        // Empty kinds and names are valid keys.
        let id = match (reference.id, reference.name) {
            (Some(id), None) => KeyId::Id(id),
            (None, Some(name)) => KeyId::Name(name),
            _ => {
                return Err(Error::InvalidKeyEncoding(format!(
                    "{}: expected exactly one of id or name",
                    encoded
                )));
            }
        };
        Ok(Self {
            kind: reference.kind,
            id,
        })
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl std::str::FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::decode(s)
    }
}

impl serde::Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> serde::Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Key::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

// References to other entities are stored as their encoded key string.
impl FieldValue for Key {
    fn to_value(&self) -> Value {
        Value::String(self.encode())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Key::decode(&s).map_err(|_| Value::String(s)),
            other => Err(other),
        }
    }
}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        Value::String(key.encode())
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Value::from(&key)
    }
}

/// Lookup argument accepted by `get_by_id_or_none`.
#[derive(Clone, Debug, PartialEq)]
pub enum IdOrKey {
    Id(i64),
    Encoded(String),
    Key(Key),
}

impl IdOrKey {
    /// Resolves to a key of `kind`. Decimal strings are raw ids, any other
    /// string must be an encoded key.
    pub fn into_key(self, kind: &str) -> Result<Key, Error> {
        match self {
            IdOrKey::Id(id) => Ok(Key::with_id(kind, id)),
            IdOrKey::Encoded(s) => match s.parse::<i64>() {
                Ok(id) => Ok(Key::with_id(kind, id)),
                Err(_) => Key::decode(&s),
            },
            IdOrKey::Key(key) => Ok(key),
        }
    }
}

impl From<i64> for IdOrKey {
    fn from(id: i64) -> Self {
        IdOrKey::Id(id)
    }
}

impl From<&str> for IdOrKey {
    fn from(s: &str) -> Self {
        IdOrKey::Encoded(s.to_string())
    }
}

impl From<String> for IdOrKey {
    fn from(s: String) -> Self {
        IdOrKey::Encoded(s)
    }
}

impl From<Key> for IdOrKey {
    fn from(key: Key) -> Self {
        IdOrKey::Key(key)
    }
}

impl From<&Key> for IdOrKey {
    fn from(key: &Key) -> Self {
        IdOrKey::Key(key.clone())
    }
}
