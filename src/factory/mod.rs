//! CRUD handlers shared by every resource.
//!
//! Each public handler is generic over a [`Resource`] and is mounted with a
//! turbofish, e.g. `get(factory::get_one::<Car>)`. The inner functions take a
//! [`Repo`] and a base [`Filter`] so controllers can reuse them with extra
//! scoping.

use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::AppError,
    response::{keyed, Envelope, Keyed},
    state::AppState,
    store::{Document, Filter, Repo},
};

pub mod query;

pub use query::{ListQuery, Projection};

/// An entity the factory can list, read, create, update and delete.
pub trait Resource: Document + Clone {
    const SINGULAR: &'static str;
    const PLURAL: &'static str;

    /// Client-facing shape.
    type Public: Serialize + Send;

    fn to_public(&self) -> Self::Public;

    /// Builds a new entity from a request body, validating every field.
    fn create(body: Value) -> Result<Self, AppError>;

    /// Applies a partial update, validating only the fields present.
    fn apply_update(&mut self, body: Value) -> Result<(), AppError>;

    /// Whether clients may filter, sort or project on `field`.
    fn is_queryable(_field: &str) -> bool {
        true
    }
}

pub type One<T> = Json<Envelope<Keyed<<T as Resource>::Public>>>;
pub type Many = Json<Envelope<Keyed<Vec<Value>>>>;

pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidId {
        field: "id",
        value: raw.to_string(),
    })
}

fn not_found<T: Resource>() -> AppError {
    AppError::not_found(format!("No {} found with that ID", T::SINGULAR))
}

fn public_value<T: Resource>(doc: &T, projection: Option<&Projection>) -> Result<Value, AppError> {
    let value =
        serde_json::to_value(doc.to_public()).map_err(|e| AppError::Internal(e.into()))?;
    Ok(match projection {
        Some(p) => p.apply(value),
        None => value,
    })
}

pub fn one<T: Resource>(doc: &T) -> Envelope<Keyed<T::Public>> {
    Envelope::success(keyed(T::SINGULAR, doc.to_public()))
}

pub async fn list<T: Resource>(
    repo: &Repo<T>,
    base: Filter,
    params: &HashMap<String, String>,
) -> Result<Envelope<Keyed<Vec<Value>>>, AppError> {
    let ListQuery {
        mut options,
        projection,
    } = ListQuery::parse(params, T::is_queryable)?;
    options.filter = base.and(options.filter);
    let docs = repo.find(options).await?;
    let items = docs
        .iter()
        .map(|doc| public_value(doc, projection.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Envelope::listing(items.len(), keyed(T::PLURAL, items)))
}

pub async fn fetch<T: Resource>(repo: &Repo<T>, id: Uuid) -> Result<T, AppError> {
    repo.find_by_id(id).await?.ok_or_else(not_found::<T>)
}

pub async fn insert<T: Resource>(repo: &Repo<T>, body: Value) -> Result<T, AppError> {
    let doc = T::create(body)?;
    repo.insert(&doc).await?;
    info!(collection = T::COLLECTION.name, id = %doc.id(), "document created");
    Ok(doc)
}

pub async fn update<T: Resource>(repo: &Repo<T>, id: Uuid, body: Value) -> Result<T, AppError> {
    let current = fetch(repo, id).await?;
    let mut doc = current.clone();
    doc.apply_update(body)?;
    let saved = repo
        .save_changes(&current, &doc)
        .await?
        .ok_or_else(not_found::<T>)?;
    info!(collection = T::COLLECTION.name, %id, "document updated");
    Ok(saved)
}

pub async fn remove<T: Resource>(repo: &Repo<T>, id: Uuid) -> Result<(), AppError> {
    // hidden documents are not deletable either
    fetch(repo, id).await?;
    if !repo.delete(id).await? {
        return Err(not_found::<T>());
    }
    info!(collection = T::COLLECTION.name, %id, "document deleted");
    Ok(())
}

#[instrument(skip_all, fields(collection = T::COLLECTION.name))]
pub async fn get_all<T: Resource>(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Many, AppError> {
    let Query(params) = query?;
    list(&state.repo::<T>(), Filter::new(), &params).await.map(Json)
}

#[instrument(skip(state), fields(collection = T::COLLECTION.name))]
pub async fn get_one<T: Resource>(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<One<T>, AppError> {
    let Path(id) = path?;
    let doc = fetch(&state.repo::<T>(), parse_id(&id)?).await?;
    Ok(Json(one(&doc)))
}

#[instrument(skip_all, fields(collection = T::COLLECTION.name))]
pub async fn create_one<T: Resource>(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, One<T>), AppError> {
    let Json(body) = payload?;
    let doc = insert(&state.repo::<T>(), body).await?;
    Ok((StatusCode::CREATED, Json(one(&doc))))
}

#[instrument(skip(state, payload), fields(collection = T::COLLECTION.name))]
pub async fn update_one<T: Resource>(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<One<T>, AppError> {
    let Path(id) = path?;
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let doc = update(&state.repo::<T>(), id, body).await?;
    Ok(Json(one(&doc)))
}

#[instrument(skip(state), fields(collection = T::COLLECTION.name))]
pub async fn delete_one<T: Resource>(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    remove(&state.repo::<T>(), parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::store::{Collection, MemoryStore};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        title: String,
        rank: i64,
    }

    impl Document for Note {
        const COLLECTION: Collection = Collection {
            name: "notes",
            unique: &["title"],
        };

        fn id(&self) -> Uuid {
            self.id
        }
    }

    impl Resource for Note {
        const SINGULAR: &'static str = "note";
        const PLURAL: &'static str = "notes";
        type Public = Note;

        fn to_public(&self) -> Note {
            self.clone()
        }

        fn create(body: Value) -> Result<Self, AppError> {
            let title = body["title"].as_str().unwrap_or_default().to_string();
            if title.is_empty() {
                return Err(AppError::Validation(vec!["title required".into()]));
            }
            Ok(Note {
                id: Uuid::new_v4(),
                title,
                rank: body["rank"].as_i64().unwrap_or_default(),
            })
        }

        fn apply_update(&mut self, body: Value) -> Result<(), AppError> {
            if let Some(rank) = body["rank"].as_i64() {
                self.rank = rank;
            }
            Ok(())
        }
    }

    fn repo() -> Repo<Note> {
        Repo::new(Arc::new(MemoryStore::new()))
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let err = parse_id("abc").unwrap_err();
        assert_eq!(err.to_string(), "Invalid id: abc");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_with_filters_sort_and_projection() {
        let repo = repo();
        for (title, rank) in [("a", 3), ("b", 1), ("c", 2)] {
            insert(&repo, json!({ "title": title, "rank": rank }))
                .await
                .unwrap();
        }
        let body = list(
            &repo,
            Filter::new(),
            &params(&[("rank[gte]", "2"), ("sort", "-rank"), ("fields", "title")]),
        )
        .await
        .unwrap();
        let body = serde_json::to_value(body).unwrap();
        assert_eq!(body["results"], 2);
        let notes = body["data"]["notes"].as_array().unwrap();
        assert_eq!(notes[0]["title"], "a");
        assert_eq!(notes[1]["title"], "c");
        assert!(notes[0].get("rank").is_none());
        assert!(notes[0].get("id").is_some());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_documents() {
        let repo = repo();
        let missing = Uuid::new_v4();
        let err = update(&repo, missing, json!({ "rank": 1 })).await.unwrap_err();
        assert_eq!(err.to_string(), "No note found with that ID");
        assert!(matches!(
            remove(&repo, missing).await,
            Err(AppError::NotFound(_))
        ));

        let note = insert(&repo, json!({ "title": "x" })).await.unwrap();
        let updated = update(&repo, note.id, json!({ "rank": 9 })).await.unwrap();
        assert_eq!(updated.rank, 9);
        assert_eq!(fetch(&repo, note.id).await.unwrap().rank, 9);
        remove(&repo, note.id).await.unwrap();
        assert!(fetch(&repo, note.id).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_unique_fields_become_client_errors() {
        let repo = repo();
        insert(&repo, json!({ "title": "same" })).await.unwrap();
        let err = insert(&repo, json!({ "title": "same" })).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate field value: \"same\" please use another value"
        );
    }
}
