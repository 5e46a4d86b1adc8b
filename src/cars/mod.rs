use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use crate::{auth, factory, state::AppState};

pub mod handlers;
pub mod model;

pub use model::Car;

/// Routes mounted under `/cars`; every one of them is admin-only.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/search", get(handlers::search_cars))
        .route("/delete-all", delete(handlers::delete_all_cars))
        .route(
            "/",
            get(factory::get_all::<Car>).post(handlers::create_car),
        )
        .route(
            "/:id",
            get(factory::get_one::<Car>)
                .patch(handlers::update_car)
                .delete(factory::delete_one::<Car>),
        )
        .route_layer(middleware::from_fn(auth::require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth::protect))
}
