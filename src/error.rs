use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{config::Environment, state::AppState, store::StoreError};

/// Every failure a request can end with. Variants other than `Internal` are
/// operational: their message is meant for the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid input data: {}", .0.join(". "))]
    Validation(Vec<String>),
    #[error("Invalid {field}: {value}")]
    InvalidId { field: &'static str, value: String },
    #[error("Duplicate field value: \"{value}\" please use another value")]
    Duplicate { field: String, value: String },
    #[error("{0}")]
    Unauthorized(String),
    #[error("Invalid token. Please login again!")]
    InvalidToken,
    #[error("Your token has expired! Please login again.")]
    ExpiredToken,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::InvalidId { .. }
            | AppError::Duplicate { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidToken | AppError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BadRequest",
            AppError::Validation(_) => "ValidationFailed",
            AppError::InvalidId { .. } => "InvalidId",
            AppError::Duplicate { .. } => "Duplicate",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::InvalidToken => "InvalidToken",
            AppError::ExpiredToken => "ExpiredToken",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Answer for any path and method pair no route handles.
    pub fn route_not_found(path: &str) -> Self {
        AppError::NotFound(format!("Can't find {path} on this server!"))
    }

    fn stack(&self) -> String {
        match self {
            AppError::Internal(e) => format!("{e:?}"),
            other => format!("{other:?}"),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, value } => AppError::Duplicate { field, value },
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Attached to error responses so [`normalize_errors`] can re-render them.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<AppError>);

/// Renders the body for the given mode.
pub fn render(err: &AppError, environment: Environment) -> Response {
    let status = err.status();
    let body = match environment {
        Environment::Development => json!({
            "status": "error",
            "message": err.to_string(),
            "error": {
                "kind": err.kind(),
                "statusCode": status.as_u16(),
                "isOperational": err.is_operational(),
            },
            "stack": err.stack(),
        }),
        Environment::Production if err.is_operational() => json!({
            "status": "error",
            "message": err.to_string(),
        }),
        Environment::Production => json!({
            "status": "error",
            "message": "Something went wrong!",
        }),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = Arc::new(self);
        let mut res = render(&err, Environment::Production);
        res.extensions_mut().insert(ErrorReport(err));
        res
    }
}

/// Terminal error handler: logs every failed request and switches to the
/// verbose body in development. A bare 405 from the router is answered like
/// an unknown route.
pub async fn normalize_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let res = next.run(req).await;

    let (err, rendered) = match res.extensions().get::<ErrorReport>().cloned() {
        Some(ErrorReport(err)) => (err, true),
        None if res.status() == StatusCode::METHOD_NOT_ALLOWED => {
            (Arc::new(AppError::route_not_found(uri.path())), false)
        }
        None => return res,
    };

    if err.is_operational() {
        warn!(%method, %uri, status = %err.status(), error = %err, "request failed");
    } else {
        error!(%method, %uri, error = ?err, "unhandled error");
    }

    let environment = state.config.environment;
    if rendered && environment.is_production() {
        return res;
    }
    let mut out = render(&err, environment);
    out.extensions_mut().insert(ErrorReport(err));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_of(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ExpiredToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        let internal = AppError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!internal.is_operational());
    }

    #[test]
    fn formats_messages() {
        let v = AppError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(v.to_string(), "Invalid input data: a. b");
        let d = AppError::Duplicate {
            field: "email".into(),
            value: "x@y.io".into(),
        };
        assert_eq!(
            d.to_string(),
            "Duplicate field value: \"x@y.io\" please use another value"
        );
        let id = AppError::InvalidId {
            field: "id",
            value: "abc".into(),
        };
        assert_eq!(id.to_string(), "Invalid id: abc");
    }

    #[test]
    fn duplicate_store_errors_stay_operational() {
        let err: AppError = StoreError::Duplicate {
            field: "email".into(),
            value: "a@b.io".into(),
        }
        .into();
        assert!(matches!(err, AppError::Duplicate { .. }));
        let err: AppError = StoreError::Poisoned.into();
        assert!(!err.is_operational());
    }

    #[tokio::test]
    async fn production_masks_unclassified_errors() {
        let err = AppError::Internal(anyhow::anyhow!("db password is hunter2"));
        let body = body_of(render(&err, Environment::Production)).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Something went wrong!");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn development_discloses_details() {
        let err = AppError::Internal(anyhow::anyhow!("db exploded"));
        let body = body_of(render(&err, Environment::Development)).await;
        assert_eq!(body["message"], "db exploded");
        assert_eq!(body["error"]["statusCode"], 500);
        assert_eq!(body["error"]["isOperational"], false);
        assert!(body["stack"].as_str().unwrap().contains("db exploded"));
    }

    #[tokio::test]
    async fn into_response_attaches_report() {
        let res = AppError::Forbidden("nope".into()).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(res.extensions().get::<ErrorReport>().is_some());
        let body = body_of(res).await;
        assert_eq!(body["message"], "nope");
    }
}
