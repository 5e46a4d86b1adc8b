use anyhow::Context;
use axum::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    filter::{text_of, Filter, FindOptions, Op},
    Collection, DocumentStore, StoreError,
};

/// Documents live in a single `documents` table keyed by `(collection, id)`
/// with the body in a `jsonb` column. Unique fields are expression indexes
/// named `documents_<collection>_<field>_key`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for c in filter.conditions() {
        qb.push(" AND ");
        match c.op {
            Op::Eq | Op::Ne => {
                qb.push("body ->> ")
                    .push_bind(c.field.clone())
                    .push(" ")
                    .push(c.op.sql())
                    .push(" ")
                    .push_bind(c.value.clone());
            }
            op => match c.numeric_value() {
                // CASE guarantees the cast only sees numbers
                Some(n) => {
                    qb.push("(CASE WHEN jsonb_typeof(body -> ")
                        .push_bind(c.field.clone())
                        .push(") = 'number' THEN (body ->> ")
                        .push_bind(c.field.clone())
                        .push(")::float8 END) ")
                        .push(op.sql())
                        .push(" ")
                        .push_bind(n);
                }
                None => {
                    qb.push("body ->> ")
                        .push_bind(c.field.clone())
                        .push(" ")
                        .push(op.sql())
                        .push(" ")
                        .push_bind(c.value.clone());
                }
            },
        }
    }
}

fn collection_scope<'a>(sql: &str, collection: &Collection) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(sql);
    qb.push(" WHERE collection = ").push_bind(collection.name);
    qb
}

fn map_write_error(collection: &Collection, doc: &Value, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let prefix = format!("documents_{}_", collection.name);
            let field = db_err
                .constraint()
                .and_then(|c| c.strip_prefix(prefix.as_str()))
                .and_then(|rest| rest.strip_suffix("_key"));
            if let Some(field) = field {
                let value = doc.get(field).and_then(text_of).unwrap_or_default();
                return StoreError::Duplicate {
                    field: field.to_string(),
                    value,
                };
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find(
        &self,
        collection: &Collection,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let mut qb = collection_scope("SELECT body FROM documents", collection);
        push_conditions(&mut qb, &options.filter);

        qb.push(" ORDER BY ");
        for key in &options.sort {
            qb.push("body -> ")
                .push_bind(key.field.clone())
                .push(if key.descending { " DESC, " } else { " ASC, " });
        }
        qb.push("created_at ASC");

        if let Some(limit) = options.limit {
            qb.push(" LIMIT ").push_bind(limit.min(i64::MAX as u64) as i64);
        }
        qb.push(" OFFSET ")
            .push_bind(options.skip.min(i64::MAX as u64) as i64);

        let rows: Vec<(Json<Value>,)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(body),)| body).collect())
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(body),)| body))
    }

    async fn insert(
        &self,
        collection: &Collection,
        id: Uuid,
        doc: Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection.name)
        .bind(id)
        .bind(Json(&doc))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, &doc, e))?;
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &Collection,
        id: Uuid,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let patch = Value::Object(fields.clone());
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            r#"
            UPDATE documents
            SET body = body || $3
            WHERE collection = $1 AND id = $2
            RETURNING body
            "#,
        )
        .bind(collection.name)
        .bind(id)
        .bind(Json(&patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, &patch, e))?;
        Ok(row.map(|(Json(body),)| body))
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut qb = collection_scope("DELETE FROM documents", collection);
        push_conditions(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
