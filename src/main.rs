use carbook::{app, state::AppState, users::seed::ensure_admin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "carbook=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    tracing::info!(environment = ?app_state.config.environment, "configuration loaded");

    if let Some(seed) = &app_state.config.seed_admin {
        ensure_admin(&app_state.repo(), seed).await?;
    }

    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
