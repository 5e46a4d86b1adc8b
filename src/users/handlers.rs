use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::model::{touches_password, User, UserPatch, PASSWORD_ROUTE_MSG};
use crate::{
    auth::CurrentUser,
    error::AppError,
    factory::{self, One},
    state::AppState,
};

const GONE_MSG: &str = "The user belonging to this token does no longer exist.";

/// Fields a user may change on their own profile.
const SELF_EDITABLE: [&str; 3] = ["name", "email", "photo"];

fn self_editable(body: Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| SELF_EDITABLE.contains(&k.as_str()))
                .collect::<Map<_, _>>(),
        ),
        _ => Value::Object(Map::new()),
    }
}

#[instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<One<User>, AppError> {
    let user = factory::fetch(&state.repo::<User>(), user.id).await?;
    Ok(Json(factory::one(&user)))
}

#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<One<User>, AppError> {
    let Json(body) = payload?;
    if touches_password(&body) {
        warn!(user_id = %user.id, "password change attempted through update-me");
        return Err(AppError::BadRequest(PASSWORD_ROUTE_MSG.into()));
    }

    let patch: UserPatch = serde_json::from_value(self_editable(body))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let mut updated = user.clone();
    patch.apply(&mut updated)?;
    let saved = state
        .repo::<User>()
        .save_changes(&user, &updated)
        .await?
        .ok_or_else(|| AppError::unauthorized(GONE_MSG))?;
    info!(user_id = %saved.id, "profile updated");
    Ok(Json(factory::one(&saved)))
}

#[instrument(skip_all)]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    let fields = Map::from_iter([("active".to_string(), Value::Bool(false))]);
    if state.repo::<User>().update_fields(user.id, fields).await?.is_none() {
        return Err(AppError::unauthorized(GONE_MSG));
    }
    info!(user_id = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_fields_users_cannot_set() {
        let body = json!({ "name": "A", "role": "admin", "active": false, "photo": "p.png" });
        assert_eq!(self_editable(body), json!({ "name": "A", "photo": "p.png" }));
        assert_eq!(self_editable(json!([1, 2])), json!({}));
    }
}
