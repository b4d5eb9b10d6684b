// Lets `#[derive(Entity)]` output resolve `::kv_odm` inside this crate too.
extern crate self as kv_odm;

mod config;
mod db;
mod entity;
mod error;
mod field;
mod filter;
mod key;
mod query;
pub mod store;
mod value;

pub use config::{Engine, StoreConfig};
pub use db::{DB, RawDocument, Store};
pub use entity::{DictOptions, Entity};
pub use error::Error;
pub use field::{DESCENDING, DefaultFactory, Field, FieldKind};
pub use filter::{Filter, IntoFilters, Operator};
pub use key::{IdOrKey, Key, KeyId};
pub use kv_odm_derive::Entity;
pub use query::Select;
pub use value::{Document, FieldValue, TIMESTAMP_FORMAT, Value};

// Registered by `#[derive(Entity)]`, one per entity type.
pub struct EntityMeta {
    pub kind: &'static str,
    pub field_names: fn() -> Vec<&'static str>,
}

impl std::fmt::Debug for EntityMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EntityMeta {{ kind: {}, fields: {:?} }}",
            self.kind,
            (self.field_names)()
        )
    }
}

inventory::collect!(EntityMeta);

/// Every entity kind registered in the binary, with its stored field names.
pub fn all_entities() -> std::collections::HashMap<&'static str, Vec<&'static str>> {
    inventory::iter::<EntityMeta>()
        .map(|meta| (meta.kind, (meta.field_names)()))
        .collect()
}

#[doc(hidden)]
pub mod __private {
    pub use crate::entity::bind_value;
    pub use inventory;
}
