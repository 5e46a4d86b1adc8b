use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};

use super::jwt::{JwtKeys, JWT_COOKIE};
use crate::{
    error::AppError,
    state::AppState,
    users::model::{Role, User},
};

const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";
const FORBIDDEN: &str = "You do not have permission to perform this action";

/// The authenticated user, attached to the request by [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN))
    }
}

/// `Authorization: Bearer <token>` first, then a non-empty `jwt` cookie.
pub fn bearer_or_cookie(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Authenticates the request and attaches [`CurrentUser`].
pub async fn protect(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_or_cookie(req.headers()) else {
        warn!(uri = %req.uri(), "missing token");
        return Err(AppError::unauthorized(NOT_LOGGED_IN));
    };

    let claims = JwtKeys::from_ref(&state).verify(&token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::from(e)
    })?;

    let Some(user) = state.repo::<User>().find_by_id(claims.sub).await? else {
        warn!(user_id = %claims.sub, "token subject not found");
        return Err(AppError::unauthorized(
            "The user belonging to this token does no longer exist.",
        ));
    };

    if user.changed_password_after(claims.issued_at()) {
        warn!(user_id = %user.id, "token predates password change");
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }

    debug!(user_id = %user.id, role = %user.role, "authenticated");
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Lets the request through only when the user attached by [`protect`] holds
/// one of `allowed`.
pub async fn restrict_to(
    allowed: &'static [Role],
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() else {
        return Err(AppError::unauthorized(NOT_LOGGED_IN));
    };
    if !allowed.contains(&user.role) {
        warn!(user_id = %user.id, role = %user.role, uri = %req.uri(), "role not allowed");
        return Err(AppError::Forbidden(FORBIDDEN.into()));
    }
    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    restrict_to(&[Role::Admin], req, next).await
}
