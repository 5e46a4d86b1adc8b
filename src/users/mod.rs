use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::{
    auth::{self, handlers as auth_handlers},
    factory,
    state::AppState,
};

pub mod handlers;
pub mod model;
pub mod seed;

pub use model::{PublicUser, Role, User};

/// Routes mounted under `/users`.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(auth_handlers::signup))
        .route("/login", post(auth_handlers::login))
        .route("/logout", get(auth_handlers::logout));

    let admin = Router::new()
        .route(
            "/",
            get(factory::get_all::<User>).post(factory::create_one::<User>),
        )
        .route(
            "/:id",
            get(factory::get_one::<User>)
                .patch(factory::update_one::<User>)
                .delete(factory::delete_one::<User>),
        )
        .route_layer(middleware::from_fn(auth::require_admin));

    let protected = Router::new()
        .route(
            "/update-my-password",
            patch(auth_handlers::update_my_password),
        )
        .route("/me", get(handlers::get_me))
        .route("/update-me", patch(handlers::update_me))
        .route("/delete-me", delete(handlers::delete_me))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, auth::protect));

    public.merge(protected)
}
