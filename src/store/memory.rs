use std::{collections::HashMap, sync::RwLock};

use axum::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    filter::{sort_documents, text_of, Filter, FindOptions},
    Collection, DocumentStore, StoreError,
};

type Entries = Vec<(Uuid, Value)>;

/// Process-local store. Documents keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Entries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(
    collection: &Collection,
    entries: &[(Uuid, Value)],
    id: Uuid,
    doc: &Value,
) -> Result<(), StoreError> {
    for field in collection.unique {
        let Some(value) = doc.get(*field).and_then(text_of) else {
            continue;
        };
        let taken = entries.iter().any(|(other_id, other)| {
            *other_id != id && other.get(*field).and_then(text_of).as_deref() == Some(value.as_str())
        });
        if taken {
            return Err(StoreError::Duplicate {
                field: field.to_string(),
                value,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &Collection,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let mut docs: Vec<Value> = guard
            .get(collection.name)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, doc)| options.filter.matches(doc))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default();
        drop(guard);

        sort_documents(&mut docs, &options.sort);
        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(collection.name).and_then(|entries| {
            entries
                .iter()
                .find(|(doc_id, _)| *doc_id == id)
                .map(|(_, doc)| doc.clone())
        }))
    }

    async fn insert(
        &self,
        collection: &Collection,
        id: Uuid,
        doc: Value,
    ) -> Result<(), StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let entries = guard.entry(collection.name).or_default();
        check_unique(collection, entries, id, &doc)?;
        entries.push((id, doc));
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &Collection,
        id: Uuid,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let Some(entries) = guard.get_mut(collection.name) else {
            return Ok(None);
        };
        let Some(pos) = entries.iter().position(|(doc_id, _)| *doc_id == id) else {
            return Ok(None);
        };
        let mut merged = entries[pos].1.clone();
        if let Value::Object(body) = &mut merged {
            body.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        check_unique(collection, entries, id, &merged)?;
        entries[pos].1 = merged.clone();
        Ok(Some(merged))
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let Some(entries) = guard.get_mut(collection.name) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|(doc_id, _)| *doc_id != id);
        Ok(entries.len() != before)
    }

    async fn delete_many(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let Some(entries) = guard.get_mut(collection.name) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|(_, doc)| !filter.matches(doc));
        Ok((before - entries.len()) as u64)
    }
}
