use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, UpdatePasswordRequest},
    jwt::{auth_cookie, logout_cookie, JwtKeys},
    middleware::CurrentUser,
    password::{verify_password, MIN_PASSWORD_LEN},
};
use crate::{
    error::AppError,
    response::{keyed, Envelope, Keyed},
    state::AppState,
    store::Filter,
    users::model::{NewUser, PublicUser, User},
};

pub type TokenResponse = (StatusCode, CookieJar, Json<Envelope<Keyed<PublicUser>>>);

/// Signs a token for `user`, returns it in the body and sets the `jwt` cookie.
pub fn send_token(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    status: StatusCode,
) -> Result<TokenResponse, AppError> {
    let token = JwtKeys::from_ref(state).issue(user.id)?;
    let jar = jar.add(auth_cookie(&token, &state.config.jwt));
    let body = Envelope::with_token(token, keyed("user", PublicUser::from(user)));
    Ok((status, jar, Json(body)))
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<TokenResponse, AppError> {
    let Json(mut new_user) = payload?;
    // self-registration never grants a role
    new_user.role = None;
    let user = new_user.into_user()?;
    state.repo::<User>().insert(&user).await?;
    info!(user_id = %user.id, email = %user.email, "user signed up");
    send_token(&state, jar, &user, StatusCode::CREATED)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<TokenResponse, AppError> {
    let Json(payload) = payload?;
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(AppError::BadRequest(
            "Please provide email and password!".into(),
        ));
    };
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide email and password!".into(),
        ));
    }

    let user = state
        .repo::<User>()
        .find_one(Filter::new().eq("email", email.as_str()))
        .await?;
    let verified = match &user {
        Some(u) => verify_password(&password, &u.password_hash)?,
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        warn!(email = %email, "login rejected");
        return Err(AppError::unauthorized("Incorrect email or password!"));
    };

    info!(user_id = %user.id, "user logged in");
    send_token(&state, jar, &user, StatusCode::OK)
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Envelope<()>>) {
    (
        jar.add(logout_cookie(&state.config.jwt)),
        Json(Envelope::empty()),
    )
}

#[instrument(skip_all)]
pub async fn update_my_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<TokenResponse, AppError> {
    let Json(payload) = payload?;

    let current = payload.password_current.unwrap_or_default();
    if !verify_password(&current, &user.password_hash)? {
        warn!(user_id = %user.id, "wrong current password");
        return Err(AppError::unauthorized("Your current password is wrong."));
    }

    let mut errors = Vec::new();
    let password = payload.password.unwrap_or_default();
    if password.is_empty() {
        errors.push("Please provide a password".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must have at least 8 characters".to_string());
    }
    match payload.password_confirm.as_deref() {
        None | Some("") => errors.push("Please confirm your password".to_string()),
        Some(confirm) if confirm != password => {
            errors.push("Passwords are not the same!".to_string())
        }
        Some(_) => {}
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut changed = user.clone();
    changed.set_password(&password)?;
    let Some(saved) = state.repo::<User>().save_changes(&user, &changed).await? else {
        return Err(AppError::unauthorized(
            "The user belonging to this token does no longer exist.",
        ));
    };
    info!(user_id = %saved.id, "password changed");
    send_token(&state, jar, &saved, StatusCode::OK)
}
