use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use cohort_core::AppError;
use tracing_subscriber::EnvFilter;

/// Environment-driven runtime configuration.
///
/// Loaded once in the composition root and injected explicitly; no
/// module-level mutable settings exist.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub auth_token_secret: String,
    pub auth_token_validity_seconds: i64,
    pub api_host: String,
    pub api_port: u16,
    pub dev_seed: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let auth_token_secret = required_env("AUTH_TOKEN_SECRET")?;
        if auth_token_secret.len() < 32 {
            return Err(AppError::Validation(
                "AUTH_TOKEN_SECRET must be at least 32 characters".to_owned(),
            ));
        }

        let auth_token_validity_seconds = env::var("AUTH_TOKEN_VALIDITY_SECONDS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(3600);

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let dev_seed = env::var("DEV_SEED")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            auth_token_secret,
            auth_token_validity_seconds,
            api_host,
            api_port,
            dev_seed,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
