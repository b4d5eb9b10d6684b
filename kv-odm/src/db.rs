use std::sync::Arc;

use futures::future::BoxFuture;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    Entity, all_entities,
    config::{Engine, StoreConfig},
    error::Error,
    filter::Filter,
    key::Key,
    query::Select,
    store::{MemoryStore, TikvStore},
    value::Document,
};

/// A document as returned by a store query, together with its key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub key: Key,
    pub fields: Document,
}

/// Contract every backing store fulfils.
///
/// Futures are boxed so a store can live behind `Arc<dyn Store>`; errors
/// from the underlying client are passed through as they are.
pub trait Store: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<(), Error>>;

    fn close(&self) -> BoxFuture<'_, Result<(), Error>>;

    /// Prepares storage for `kinds`. With `force`, existing documents of
    /// those kinds are dropped first.
    fn ensure_schema<'a>(
        &'a self,
        kinds: &'a [&'static str],
        force: bool,
    ) -> BoxFuture<'a, Result<(), Error>>;

    /// Writes a document. Without a key the store assigns one.
    fn put<'a>(
        &'a self,
        kind: &'a str,
        key: Option<&'a Key>,
        document: Document,
    ) -> BoxFuture<'a, Result<Key, Error>>;

    fn get<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<Option<Document>, Error>>;

    fn delete<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<(), Error>>;

    /// Every document of `kind` matching all of `filters`, in key order.
    fn query<'a>(
        &'a self,
        kind: &'a str,
        filters: &'a [Filter],
    ) -> BoxFuture<'a, Result<Vec<RawDocument>, Error>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn connect(&self) -> BoxFuture<'_, Result<(), Error>> {
        (**self).connect()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        (**self).close()
    }

    fn ensure_schema<'a>(
        &'a self,
        kinds: &'a [&'static str],
        force: bool,
    ) -> BoxFuture<'a, Result<(), Error>> {
        (**self).ensure_schema(kinds, force)
    }

    fn put<'a>(
        &'a self,
        kind: &'a str,
        key: Option<&'a Key>,
        document: Document,
    ) -> BoxFuture<'a, Result<Key, Error>> {
        (**self).put(kind, key, document)
    }

    fn get<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<Option<Document>, Error>> {
        (**self).get(key)
    }

    fn delete<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<(), Error>> {
        (**self).delete(key)
    }

    fn query<'a>(
        &'a self,
        kind: &'a str,
        filters: &'a [Filter],
    ) -> BoxFuture<'a, Result<Vec<RawDocument>, Error>> {
        (**self).query(kind, filters)
    }
}

/// Handle passed to every query and entity operation.
#[derive(Clone)]
pub struct DB {
    pub(crate) store: Arc<dyn Store>,
}

impl DB {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
        let db = match config.engine {
            Engine::Memory => DB::new(MemoryStore::new()),
            Engine::Tikv => DB::new(TikvStore::new(config).await?),
        };
        db.store.connect().await?;
        info!("connected to {} store", config.engine);
        Ok(db)
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.store.close().await
    }

    /// Runs schema preparation for every registered entity kind.
    pub async fn ensure_schema(&self, force: bool) -> Result<(), Error> {
        let mut kinds: Vec<&'static str> = all_entities().into_keys().collect();
        kinds.sort_unstable();
        info!("ensuring schema for {:?} (force: {})", kinds, force);
        self.store.ensure_schema(&kinds, force).await
    }

    pub fn select<T: Entity>(&self) -> Select<T> {
        Select::new(self.clone())
    }

    /// Inserts or updates `entity`, assigning its key on first write.
    pub async fn put<T: Entity>(&self, entity: &mut T) -> Result<Key, Error> {
        let document = entity.to_document()?;
        let existing = entity.key().cloned();
        let key = self.store.put(T::KIND, existing.as_ref(), document).await?;
        debug!("stored {} as {:?}", T::KIND, key);
        entity.set_key(key.clone());
        Ok(key)
    }

    pub async fn get<T: Entity>(&self, key: &Key) -> Result<Option<T>, Error> {
        debug!("fetching {:?}", key);
        match self.store.get(key).await? {
            Some(document) => T::from_document(Some(key.clone()), document).map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &Key) -> Result<(), Error> {
        debug!("deleting {:?}", key);
        self.store.delete(key).await
    }
}
