//! Query builder.
//!
//! Filters are ANDed and sent to the store; ordering and limits are applied
//! here, on the materialized entities. Keeping sorts out of the store means
//! no composite index has to exist before a query can run.

use std::cmp::Ordering;
use std::marker::PhantomData;

use log::debug;

use crate::{
    Entity,
    db::DB,
    error::Error,
    field::DESCENDING,
    filter::{Filter, IntoFilters},
    value::Value,
};

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

pub struct Select<T> {
    db: DB,
    filters: Vec<Filter>,
    order: Vec<String>,
    comparator: Option<Comparator<T>>,
    limit: Option<usize>,
    _marker: PhantomData<T>,
}

impl<T> Select<T>
where
    T: Entity,
{
    pub fn new(db: DB) -> Self {
        Self {
            db,
            filters: Vec::new(),
            order: Vec::new(),
            comparator: None,
            limit: None,
            _marker: PhantomData,
        }
    }

    pub fn filter(mut self, filters: impl IntoFilters) -> Self {
        self.filters.extend(filters.into_filters());
        self
    }

    /// Sort keys as produced by `Field::asc` / `Field::desc`.
    pub fn order_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Replaces key ordering with a custom comparator.
    pub fn sort_by(mut self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    fn sort_keys(&self) -> Result<Vec<(&'static str, bool)>, Error> {
        self.order
            .iter()
            .map(|key| {
                let (name, descending) = match key.strip_prefix(DESCENDING) {
                    Some(name) => (name, true),
                    None => (key.as_str(), false),
                };
                T::field(name)
                    .map(|field| (field.name(), descending))
                    .ok_or_else(|| Error::UnknownField(name.to_string()))
            })
            .collect()
    }

    pub async fn execute(self) -> Result<Vec<T>, Error> {
        let sort_keys = self.sort_keys()?;
        let documents = self.db.store.query(T::KIND, &self.filters).await?;
        debug!(
            "{} query with {} filter(s) matched {} document(s)",
            T::KIND,
            self.filters.len(),
            documents.len()
        );

        let mut entities = documents
            .into_iter()
            .map(|raw| T::from_document(Some(raw.key), raw.fields))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(comparator) = &self.comparator {
            entities.sort_by(|a, b| comparator(a, b));
        } else if !sort_keys.is_empty() {
            entities = sort_by_keys(entities, &sort_keys);
        }
        if let Some(limit) = self.limit {
            entities.truncate(limit);
        }
        Ok(entities)
    }

    /// The first entity of the result, or `None` when nothing matched.
    pub async fn first(self) -> Result<Option<T>, Error> {
        Ok(self.execute().await?.into_iter().next())
    }
}

fn sort_by_keys<T: Entity>(entities: Vec<T>, keys: &[(&'static str, bool)]) -> Vec<T> {
    let mut keyed: Vec<(Vec<Value>, T)> = entities
        .into_iter()
        .map(|entity| {
            let values = keys
                .iter()
                .map(|(name, _)| entity.value_of(name).unwrap_or(Value::Null))
                .collect();
            (values, entity)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, (_, descending)) in keys.iter().enumerate() {
            let ordering = a[i].total_cmp(&b[i]);
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    keyed.into_iter().map(|(_, entity)| entity).collect()
}
