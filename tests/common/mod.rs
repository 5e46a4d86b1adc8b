#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use carbook::{
    app::build_app,
    auth::JwtKeys,
    config::{AppConfig, Environment, JwtConfig},
    state::AppState,
    store::DocumentStore,
    users::{model::NewUser, Role, User},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "testpass123";

pub fn test_config(environment: Environment) -> AppConfig {
    AppConfig {
        environment,
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "carbook".into(),
            audience: "carbook-users".into(),
            ttl_minutes: 60,
            cookie_ttl_days: 90,
            cookie_secure: false,
        },
        cors_origins: vec!["http://localhost:3000".into()],
        seed_admin: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_environment(Environment::Production)
    }

    pub fn with_environment(environment: Environment) -> Self {
        let state = AppState::in_memory(test_config(environment));
        let router = build_app(state.clone());
        Self { state, router }
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        let state = AppState::from_parts(store, Arc::new(test_config(Environment::Production)));
        let router = build_app(state.clone());
        Self { state, router }
    }

    pub fn keys(&self) -> JwtKeys {
        JwtKeys::from_config(&self.state.config.jwt)
    }

    /// Stores a user directly and returns it with a fresh token.
    pub async fn create_user(&self, role: Role) -> (User, String) {
        let user = NewUser {
            name: Some("Test User".into()),
            email: Some(generate_unique_email()),
            password: Some(PASSWORD.into()),
            password_confirm: Some(PASSWORD.into()),
            photo: None,
            role: Some(role.as_str().into()),
        }
        .into_user()
        .unwrap();
        self.state.repo::<User>().insert(&user).await.unwrap();
        let token = self.keys().issue(user.id).unwrap();
        (user, token)
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }
}

pub fn generate_unique_email() -> String {
    format!("test-{}@test.com", Uuid::new_v4())
}
