use std::collections::BTreeMap;

use serde::Serialize;

/// Single-key object such as `{"car": {...}}`.
pub type Keyed<T> = BTreeMap<&'static str, T>;

pub fn keyed<T>(key: &'static str, value: T) -> Keyed<T> {
    BTreeMap::from([(key, value)])
}

/// Uniform success body: `{status, results?, token?, data?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: Some(data),
        }
    }

    pub fn listing(results: usize, data: T) -> Self {
        Self {
            results: Some(results),
            ..Self::success(data)
        }
    }

    pub fn with_token(token: String, data: T) -> Self {
        Self {
            token: Some(token),
            ..Self::success(data)
        }
    }
}

impl Envelope<()> {
    pub fn empty() -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: None,
        }
    }
}
