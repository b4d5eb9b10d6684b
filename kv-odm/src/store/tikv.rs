use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use tikv_client::{Key as KvKey, Snapshot, Transaction, TransactionClient};

use crate::{
    config::StoreConfig,
    db::{RawDocument, Store},
    error::Error,
    filter::Filter,
    key::{Key, KeyId},
    value::Document,
};

const PAGE_SIZE: u32 = 128;
const DEFAULT_NAMESPACE: &str = "kv-odm";

// First key past every key that starts with `key`.
fn prefix_end(key: &KvKey) -> KvKey {
    let mut next_key = Into::<Vec<u8>>::into(key.clone());
    for i in (0..next_key.len()).rev() {
        if next_key[i] < 0xff {
            next_key[i] += 1;
            next_key.truncate(i + 1);
            return KvKey::from(next_key);
        }
    }
    KvKey::from(next_key)
}

// Smallest key strictly greater than `key`.
fn successor(key: &KvKey) -> KvKey {
    let mut next_key = Into::<Vec<u8>>::into(key.clone());
    next_key.push(0);
    KvKey::from(next_key)
}

// Offset so negative ids sort before positive ones.
fn encode_id(id: i64) -> String {
    let offset_value = (id as i128 + 9223372036854775808) as u128;
    format!("{:020}", offset_value)
}

/// Documents stored as JSON records in TiKV.
///
/// Layout under the configured namespace:
/// `<ns>/document/<kind>/i<id>` or `<ns>/document/<kind>/n<name>` for
/// documents, `<ns>/sequence/<kind>` for the last id handed out.
pub struct TikvStore {
    client: TransactionClient,
    namespace: String,
}

impl TikvStore {
    pub async fn new(config: &StoreConfig) -> Result<Self, Error> {
        if config.username.is_some() || config.password.is_some() {
            warn!("TiKV takes no credentials; DATABASE_USERNAME and DATABASE_PASSWORD are ignored");
        }
        let client = TransactionClient::new(config.endpoints())
            .await
            .map_err(Error::TikvError)?;
        Ok(Self {
            client,
            namespace: config
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        })
    }

    fn kind_prefix(&self, kind: &str) -> String {
        format!("{}/document/{}/", self.namespace, kind)
    }

    fn document_path(&self, key: &Key) -> String {
        let prefix = self.kind_prefix(key.kind());
        match key.id() {
            KeyId::Id(id) => format!("{}i{}", prefix, encode_id(*id)),
            KeyId::Name(name) => format!("{}n{}", prefix, name),
        }
    }

    fn sequence_path(&self, kind: &str) -> String {
        format!("{}/sequence/{}", self.namespace, kind)
    }

    async fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(self.client.snapshot(
            self.client
                .current_timestamp()
                .await
                .map_err(Error::TikvError)?,
            tikv_client::TransactionOptions::new_optimistic(),
        ))
    }

    async fn finish<T>(txn: &mut Transaction, result: Result<T, Error>) -> Result<T, Error> {
        match result {
            Ok(value) => {
                txn.commit().await.map_err(Error::TikvError)?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback().await.map_err(Error::TikvError)?;
                Err(e)
            }
        }
    }

    async fn allocate_id(&self, txn: &mut Transaction, kind: &str) -> Result<i64, Error> {
        let path = self.sequence_path(kind);
        let last = match txn.get(path.clone()).await.map_err(Error::TikvError)? {
            Some(data) => String::from_utf8(data)
                .map_err(|e| Error::Corrupted(format!("{}: {}", path, e)))?
                .parse::<i64>()
                .map_err(|e| Error::Corrupted(format!("{}: {}", path, e)))?,
            None => 0,
        };
        let next = last + 1;
        txn.put(path, next.to_string())
            .await
            .map_err(Error::TikvError)?;
        Ok(next)
    }

    async fn write_document(
        &self,
        txn: &mut Transaction,
        kind: &str,
        key: Option<&Key>,
        document: Document,
    ) -> Result<Key, Error> {
        let key = match key {
            Some(key) => key.clone(),
            None => Key::with_id(kind, self.allocate_id(txn, kind).await?),
        };
        let record = RawDocument {
            key: key.clone(),
            fields: document,
        };
        txn.put(self.document_path(&key), serde_json::to_vec(&record)?)
            .await
            .map_err(Error::TikvError)?;
        Ok(key)
    }

    async fn put_document(
        &self,
        kind: &str,
        key: Option<&Key>,
        document: Document,
    ) -> Result<Key, Error> {
        let mut txn = self
            .client
            .begin_optimistic()
            .await
            .map_err(Error::TikvError)?;
        let result = self.write_document(&mut txn, kind, key, document).await;
        Self::finish(&mut txn, result).await
    }

    async fn get_document(&self, key: &Key) -> Result<Option<Document>, Error> {
        let mut snapshot = self.snapshot().await?;
        let Some(data) = snapshot
            .get(self.document_path(key))
            .await
            .map_err(Error::TikvError)?
        else {
            return Ok(None);
        };
        let record: RawDocument = serde_json::from_slice(&data)?;
        Ok(Some(record.fields))
    }

    async fn delete_document(&self, key: &Key) -> Result<(), Error> {
        let mut txn = self
            .client
            .begin_optimistic()
            .await
            .map_err(Error::TikvError)?;
        let result = txn
            .delete(self.document_path(key))
            .await
            .map_err(Error::TikvError);
        Self::finish(&mut txn, result).await
    }

    async fn scan_kind(&self, kind: &str, filters: &[Filter]) -> Result<Vec<RawDocument>, Error> {
        let mut snapshot = self.snapshot().await?;
        let mut start_key: KvKey = self.kind_prefix(kind).into();
        let end_key = prefix_end(&start_key);
        let mut records = Vec::new();

        loop {
            let kvs = snapshot
                .scan(start_key.clone()..end_key.clone(), PAGE_SIZE)
                .await
                .map_err(Error::TikvError)?
                .collect::<Vec<_>>();

            let Some(last) = kvs.last() else {
                break;
            };
            start_key = successor(last.key());
            let len = kvs.len();

            for kv in kvs {
                let record: RawDocument = serde_json::from_slice(kv.value())?;
                if filters.iter().all(|f| f.matches(&record.fields)) {
                    records.push(record);
                }
            }

            if len < PAGE_SIZE as usize {
                break;
            }
        }
        Ok(records)
    }

    async fn delete_kind(&self, txn: &mut Transaction, kind: &str) -> Result<usize, Error> {
        let mut start_key: KvKey = self.kind_prefix(kind).into();
        let end_key = prefix_end(&start_key);
        let mut deleted = 0;

        loop {
            let keys = txn
                .scan_keys(start_key.clone()..end_key.clone(), PAGE_SIZE)
                .await
                .map_err(Error::TikvError)?
                .collect::<Vec<_>>();

            let Some(last) = keys.last() else {
                break;
            };
            start_key = successor(last);
            let len = keys.len();

            for key in keys {
                txn.delete(key).await.map_err(Error::TikvError)?;
                deleted += 1;
            }

            if len < PAGE_SIZE as usize {
                break;
            }
        }
        txn.delete(self.sequence_path(kind))
            .await
            .map_err(Error::TikvError)?;
        Ok(deleted)
    }

    async fn drop_kinds(&self, kinds: &[&'static str]) -> Result<(), Error> {
        let mut txn = self
            .client
            .begin_optimistic()
            .await
            .map_err(Error::TikvError)?;
        let mut result = Ok(0);
        for kind in kinds {
            result = match result {
                Ok(total) => self
                    .delete_kind(&mut txn, kind)
                    .await
                    .map(|deleted| total + deleted),
                Err(e) => Err(e),
            };
        }
        let deleted = Self::finish(&mut txn, result).await?;
        info!("dropped {} document(s) from {}", deleted, self.namespace);
        Ok(())
    }
}

impl Store for TikvStore {
    fn connect(&self) -> BoxFuture<'_, Result<(), Error>> {
        async move {
            info!("using TiKV namespace {}", self.namespace);
            Ok(())
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), Error>> {
        async move {
            debug!("closing TiKV store {}", self.namespace);
            Ok(())
        }
        .boxed()
    }

    fn ensure_schema<'a>(
        &'a self,
        kinds: &'a [&'static str],
        force: bool,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            if force {
                self.drop_kinds(kinds).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn put<'a>(
        &'a self,
        kind: &'a str,
        key: Option<&'a Key>,
        document: Document,
    ) -> BoxFuture<'a, Result<Key, Error>> {
        self.put_document(kind, key, document).boxed()
    }

    fn get<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<Option<Document>, Error>> {
        self.get_document(key).boxed()
    }

    fn delete<'a>(&'a self, key: &'a Key) -> BoxFuture<'a, Result<(), Error>> {
        self.delete_document(key).boxed()
    }

    fn query<'a>(
        &'a self,
        kind: &'a str,
        filters: &'a [Filter],
    ) -> BoxFuture<'a, Result<Vec<RawDocument>, Error>> {
        self.scan_kind(kind, filters).boxed()
    }
}
