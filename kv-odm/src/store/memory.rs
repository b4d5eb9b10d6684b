use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use log::{debug, info};
use parking_lot::RwLock;

use crate::{
    db::{RawDocument, Store},
    error::Error,
    filter::Filter,
    key::Key,
    value::Document,
};

/// Process-local store. Ids are assigned from one counter shared by all
/// kinds, starting at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<Key, Document>>,
    last_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn matching(&self, kind: &str, filters: &[Filter]) -> Vec<RawDocument> {
        self.documents
            .read()
            .iter()
            .filter(|(key, _)| key.kind() == kind)
            .filter(|(_, fields)| filters.iter().all(|f| f.matches(fields)))
            .map(|(key, fields)| RawDocument {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect()
    }
}

impl Store for MemoryStore {
    fn connect(&self) -> BoxFuture<'_, Result<(), Error>> {
        debug!("memory store ready");
        future::ready(Ok(())).boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        future::ready(Ok(())).boxed()
    }

    fn ensure_schema<'a>(
        &'a self,
        kinds: &'a [&'static str],
        force: bool,
    ) -> BoxFuture<'a, Result<(), Error>> {
        if force {
            let mut documents = self.documents.write();
            let before = documents.len();
            documents.retain(|key, _| !kinds.iter().any(|k| *k == key.kind()));
            info!("dropped {} document(s)", before - documents.len());
        }
        future::ready(Ok(())).boxed()
    }

    fn put<'a>(
        &'a self,
        kind: &'a str,
        key: Option<&'a Key>,
        document: Document,
    ) -> BoxFuture<'a, Result<Key, Error>> {
        let key = match key {
            Some(key) => key.clone(),
            None => Key::with_id(kind, self.last_id.fetch_add(1, Ordering::SeqCst) + 1),
        };
        self.documents.write().insert(key.clone(), document);
        future::ready(Ok(key)).boxed()
    }

    fn get<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<Option<Document>, Error>> {
        let document = self.documents.read().get(key).cloned();
        future::ready(Ok(document)).boxed()
    }

    fn delete<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<(), Error>> {
        self.documents.write().remove(key);
        future::ready(Ok(())).boxed()
    }

    fn query<'a>(
        &'a self,
        kind: &'a str,
        filters: &'a [Filter],
    ) -> BoxFuture<'a, Result<Vec<RawDocument>, Error>> {
        future::ready(Ok(self.matching(kind, filters))).boxed()
    }
}
