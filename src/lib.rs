pub mod app;
pub mod auth;
pub mod cars;
pub mod config;
pub mod error;
pub mod factory;
pub mod response;
pub mod state;
pub mod store;
pub mod users;
