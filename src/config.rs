use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("unknown APP_ENV {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    /// Lifetime of the `jwt` cookie, independent of the token TTL.
    pub cookie_ttl_days: i64,
    pub cookie_secure: bool,
}

/// Optional admin account created at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub seed_admin: Option<SeedAdmin>,
}

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5500",
    "http://127.0.0.1:5501",
    "http://localhost:3000",
    "http://localhost:5500",
    "http://localhost:5501",
];

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = match std::env::var("APP_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::Development,
        };
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "carbook".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "carbook-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 90),
            cookie_ttl_days: env_parse("JWT_COOKIE_EXPIRES_IN", 90),
            cookie_secure: env_parse("COOKIE_SECURE", environment.is_production()),
        };

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(v) => v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let seed_admin = match (
            std::env::var("SEED_ADMIN_EMAIL"),
            std::env::var("SEED_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(SeedAdmin {
                name: std::env::var("SEED_ADMIN_NAME").unwrap_or_else(|_| "Admin".into()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080),
            database_url,
            jwt,
            cors_origins,
            seed_admin,
        })
    }
}
