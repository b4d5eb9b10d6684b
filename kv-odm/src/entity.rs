//! The per-record side of the mapping: binding documents into typed
//! entities, class-level lookups and conversion to plain mappings.

use std::future::Future;

use log::debug;

use crate::{
    db::DB,
    error::Error,
    field::Field,
    filter::IntoFilters,
    key::{IdOrKey, Key},
    query::Select,
    value::{Document, FieldValue, Value},
};

/// Field selection for [`Entity::to_dict_with`].
///
/// `only` is applied first, then `exclude` is subtracted from what is left.
/// An empty list means no restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DictOptions {
    pub only: Vec<String>,
    pub exclude: Vec<String>,
}

impl DictOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }
}

/// A typed record stored as one document of kind [`Entity::KIND`].
///
/// Implemented by `#[derive(Entity)]`, which supplies the required items;
/// everything else is provided on top of them.
pub trait Entity: Sized + Send + Sync + 'static {
    const KIND: &'static str;

    /// Declared fields, in declaration order.
    fn fields() -> &'static [Field];

    fn key(&self) -> Option<&Key>;

    fn set_key(&mut self, key: Key);

    /// Current domain value of the field stored as `field_name`.
    fn value_of(&self, field_name: &str) -> Option<Value>;

    /// Builds the entity from domain values, one per declared field.
    fn from_values(key: Option<Key>, values: Document) -> Result<Self, Error>;

    fn field(field_name: &str) -> Option<&'static Field> {
        Self::fields().iter().find(|f| f.name() == field_name)
    }

    /// A keyless entity with every field at its default.
    fn blank() -> Result<Self, Error> {
        Self::from_values(None, Document::new())
    }

    /// Binds a raw document. Missing or null fields take their default;
    /// fields not declared on the entity are ignored.
    fn from_document(key: Option<Key>, mut document: Document) -> Result<Self, Error> {
        let mut values = Document::new();
        for field in Self::fields() {
            let value = match document.remove(field.name()) {
                Some(stored) if !stored.is_null() => field.loads(stored)?,
                _ => field.default(),
            };
            values.insert(field.name().to_string(), value);
        }
        if !document.is_empty() {
            debug!(
                "ignoring undeclared fields {:?} on {}",
                document.keys().collect::<Vec<_>>(),
                Self::KIND
            );
        }
        Self::from_values(key, values)
    }

    fn to_document(&self) -> Result<Document, Error> {
        let mut document = Document::new();
        for field in Self::fields() {
            let value = self
                .value_of(field.name())
                .ok_or_else(|| Error::UnknownField(field.name().to_string()))?;
            document.insert(field.name().to_string(), field.dumps(value)?);
        }
        Ok(document)
    }

    fn to_dict(&self) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
        self.to_dict_with(&DictOptions::default())
    }

    /// Plain mapping of field values. Timestamps are rendered as
    /// `YYYY-MM-DD HH:MM:SS`.
    fn to_dict_with(
        &self,
        options: &DictOptions,
    ) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
        for name in options.only.iter().chain(options.exclude.iter()) {
            if Self::field(name).is_none() {
                return Err(Error::UnknownField(name.clone()));
            }
        }

        let mut map = serde_json::Map::new();
        for field in Self::fields() {
            let name = field.name();
            if !options.only.is_empty() && !options.only.iter().any(|n| n == name) {
                continue;
            }
            if options.exclude.iter().any(|n| n == name) {
                continue;
            }
            let value = self
                .value_of(name)
                .ok_or_else(|| Error::UnknownField(name.to_string()))?;
            map.insert(name.to_string(), value.to_json());
        }
        Ok(map)
    }

    /// The entity's key in its URL-safe form, `None` until stored.
    fn key_or_id_string(&self) -> Option<String> {
        self.key().map(Key::encode)
    }

    /// The string other entities store to refer to this one.
    fn reference_key_or_id(&self) -> Option<String> {
        self.key().map(Key::encode)
    }

    fn select(db: &DB) -> Select<Self> {
        Select::new(db.clone())
    }

    fn get_all(
        db: &DB,
        filters: impl IntoFilters,
    ) -> impl Future<Output = Result<Vec<Self>, Error>> + Send {
        let query = Self::select(db).filter(filters);
        async move { query.execute().await }
    }

    fn get_one(
        db: &DB,
        filters: impl IntoFilters,
    ) -> impl Future<Output = Result<Option<Self>, Error>> + Send {
        let query = Self::select(db).filter(filters);
        async move { query.first().await }
    }

    fn get_by_key(db: &DB, key: &Key) -> impl Future<Output = Result<Option<Self>, Error>> + Send {
        let db = db.clone();
        let key = key.clone();
        async move { db.get::<Self>(&key).await }
    }

    /// Looks up by raw id or encoded key. A missing record is `Ok(None)`;
    /// a malformed key string is `InvalidKeyEncoding`.
    fn get_by_id_or_none(
        db: &DB,
        id: impl Into<IdOrKey>,
    ) -> impl Future<Output = Result<Option<Self>, Error>> + Send {
        let db = db.clone();
        let key = id.into().into_key(Self::KIND);
        async move {
            let key = key?;
            if key.kind() != Self::KIND {
                debug!("key of kind {} cannot name a {}", key.kind(), Self::KIND);
                return Ok(None);
            }
            db.get::<Self>(&key).await
        }
    }

    fn save<'a>(&'a mut self, db: &'a DB) -> impl Future<Output = Result<Key, Error>> + Send + 'a {
        db.put(self)
    }

    fn delete<'a>(&'a self, db: &'a DB) -> impl Future<Output = Result<(), Error>> + Send + 'a {
        async move {
            let key = self.key().ok_or(Error::MissingKey)?;
            db.delete(key).await
        }
    }
}

/// Takes one bound value out of `values` and converts it to the struct
/// field's Rust type. Used by derived `from_values`.
#[doc(hidden)]
pub fn bind_value<V: FieldValue>(values: &mut Document, field: &Field) -> Result<V, Error> {
    let value = values
        .remove(field.name())
        .unwrap_or_else(|| field.default());
    V::from_value(value).map_err(|rejected| Error::type_mismatch(field.name(), &rejected))
}
