//! Listing query convention shared by every `get_all` endpoint.
//!
//! ```text
//! ?governorate=Cairo            equality (text form)
//! ?seats[gte]=4&seats[lt]=8     comparisons: eq ne gt gte lt lte
//! ?sort=governorate,-number     ordering, `-` for descending
//! ?fields=number,letters        projection (`-field` to exclude)
//! ?page=2&limit=10              pagination
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::{
    error::AppError,
    store::{Filter, FindOptions, Op, SortKey},
};

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;

const RESERVED: [&str; 4] = ["page", "sort", "limit", "fields"];

fn check_field(field: &str, queryable: fn(&str) -> bool) -> Result<(), AppError> {
    lazy_static! {
        static ref FIELD_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    }
    if FIELD_RE.is_match(field) && queryable(field) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid query field: {field}")))
    }
}

/// `price[gte]` → `("price", Gte)`, `price` → `("price", Eq)`.
fn split_key(key: &str) -> Result<(&str, Op), AppError> {
    match key.strip_suffix(']').and_then(|k| k.split_once('[')) {
        Some((field, op)) => Op::from_query_name(op)
            .map(|op| (field, op))
            .ok_or_else(|| AppError::BadRequest(format!("Unsupported query operator: {op}"))),
        None => Ok((key, Op::Eq)),
    }
}

fn comma_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn positive(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::BadRequest(format!("{name} must be a positive integer")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn parse(raw: &str, queryable: fn(&str) -> bool) -> Result<Option<Projection>, AppError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for item in comma_list(raw) {
            match item.strip_prefix('-') {
                Some(field) => {
                    check_field(field, queryable)?;
                    exclude.push(field.to_string());
                }
                None => {
                    check_field(item, queryable)?;
                    include.push(item.to_string());
                }
            }
        }
        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(None),
            (false, true) => Ok(Some(Projection::Include(include))),
            (true, false) => Ok(Some(Projection::Exclude(exclude))),
            (false, false) => Err(AppError::BadRequest(
                "fields cannot mix inclusion and exclusion".into(),
            )),
        }
    }

    /// `id` survives every projection.
    pub fn apply(&self, doc: Value) -> Value {
        let Value::Object(map) = doc else {
            return doc;
        };
        let kept = map
            .into_iter()
            .filter(|(key, _)| match self {
                Projection::Include(fields) => key == "id" || fields.iter().any(|f| f == key),
                Projection::Exclude(fields) => key == "id" || !fields.iter().any(|f| f == key),
            })
            .collect();
        Value::Object(kept)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub options: FindOptions,
    pub projection: Option<Projection>,
}

impl ListQuery {
    pub fn parse(
        params: &HashMap<String, String>,
        queryable: fn(&str) -> bool,
    ) -> Result<Self, AppError> {
        let mut filter = Filter::new();
        // sorted so the generated store query is stable
        let mut keys: Vec<&String> = params
            .keys()
            .filter(|k| !RESERVED.contains(&k.as_str()))
            .collect();
        keys.sort();
        for key in keys {
            let (field, op) = split_key(key)?;
            check_field(field, queryable)?;
            filter = filter.with(field, op, params[key].clone());
        }

        let sort = match params.get("sort") {
            Some(raw) => comma_list(raw)
                .map(|item| {
                    let key = SortKey::parse(item);
                    check_field(&key.field, queryable).map(|_| key)
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let page = match params.get("page") {
            Some(raw) => positive("page", raw)?,
            None => 1,
        };
        let limit = match params.get("limit") {
            Some(raw) => positive("limit", raw)?.min(MAX_LIMIT),
            None => DEFAULT_LIMIT,
        };

        let projection = match params.get("fields") {
            Some(raw) => Projection::parse(raw, queryable)?,
            None => None,
        };

        Ok(Self {
            options: FindOptions {
                filter,
                sort,
                skip: (page - 1).saturating_mul(limit),
                limit: Some(limit),
            },
            projection,
        })
    }
}
