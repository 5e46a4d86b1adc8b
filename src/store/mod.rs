//! Document persistence.
//!
//! Entities are stored as JSON documents grouped in named collections. The
//! [`DocumentStore`] trait is the seam between controllers and the backing
//! engine; [`Repo`] is the typed view controllers actually use.

use std::{marker::PhantomData, sync::Arc};

use axum::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod filter;
pub mod memory;
pub mod postgres;

pub use filter::{Filter, FindOptions, Op, SortKey};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Name of a collection plus the fields that must be unique across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub unique: &'static [&'static str],
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value {value:?} for unique field {field}")]
    Duplicate { field: String, value: String },
    #[error("malformed document in {collection}: {source}")]
    Malformed {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("document store lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &Collection,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError>;

    async fn insert(&self, collection: &Collection, id: Uuid, doc: Value)
        -> Result<(), StoreError>;

    /// Merges `fields` into the stored document in a single write and returns
    /// the result. `None` when no document has that id.
    async fn update_fields(
        &self,
        collection: &Collection,
        id: Uuid,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_many(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError>;
}

/// An entity persisted as a JSON document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    /// Conditions applied to every read made through [`Repo`].
    fn default_filter() -> Filter {
        Filter::new()
    }
}

pub struct Repo<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repo<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repo<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn decode(doc: Value) -> Result<T, StoreError> {
        serde_json::from_value(doc).map_err(|source| StoreError::Malformed {
            collection: T::COLLECTION.name,
            source,
        })
    }

    fn encode(doc: &T) -> Result<Value, StoreError> {
        serde_json::to_value(doc).map_err(|source| StoreError::Malformed {
            collection: T::COLLECTION.name,
            source,
        })
    }

    pub async fn find(&self, mut options: FindOptions) -> Result<Vec<T>, StoreError> {
        options.filter = T::default_filter().and(options.filter);
        self.store
            .find(&T::COLLECTION, &options)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<T>, StoreError> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::filtered(filter)
        };
        Ok(self.find(options).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        match self.store.find_by_id(&T::COLLECTION, id).await? {
            Some(doc) if T::default_filter().matches(&doc) => Self::decode(doc).map(Some),
            _ => Ok(None),
        }
    }

    pub async fn insert(&self, doc: &T) -> Result<(), StoreError> {
        self.store
            .insert(&T::COLLECTION, doc.id(), Self::encode(doc)?)
            .await
    }

    pub async fn update_fields(
        &self,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Result<Option<T>, StoreError> {
        self.store
            .update_fields(&T::COLLECTION, id, &fields)
            .await?
            .map(Self::decode)
            .transpose()
    }

    /// Writes only the top-level fields where `after` differs from `before`,
    /// so fields another request changed meanwhile are left alone.
    pub async fn save_changes(&self, before: &T, after: &T) -> Result<Option<T>, StoreError> {
        let old = Self::encode(before)?;
        let changed: Map<String, Value> = match Self::encode(after)? {
            Value::Object(fields) => fields
                .into_iter()
                .filter(|(key, value)| old.get(key) != Some(value))
                .collect(),
            _ => Map::new(),
        };
        if changed.is_empty() {
            return self.find_by_id(after.id()).await;
        }
        self.update_fields(after.id(), changed).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store.delete(&T::COLLECTION, id).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<u64, StoreError> {
        self.store.delete_many(&T::COLLECTION, &filter).await
    }
}
