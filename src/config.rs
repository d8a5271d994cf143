use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub reset_redirect_url: String,
    pub verify_redirect_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env_mode: String,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub persist: bool,
    pub jwt_secret: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub identity: Option<IdentityConfig>,
}

fn flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("1") || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if allowed_origins.is_empty() && env_mode == "production" {
            anyhow::bail!("ALLOWED_ORIGINS must be set in production");
        }

        let identity = match env::var("IDENTITY_PROVIDER_URL") {
            Ok(base_url) if !base_url.trim().is_empty() => Some(IdentityConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: env::var("IDENTITY_PROVIDER_KEY").context("IDENTITY_PROVIDER_KEY must be set with IDENTITY_PROVIDER_URL")?,
                reset_redirect_url: env::var("PASSWORD_RESET_REDIRECT_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/reset-password".to_string()),
                verify_redirect_url: env::var("EMAIL_VERIFY_REDIRECT_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/login".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            env_mode,
            bind_addr,
            data_dir: PathBuf::from(env::var("ISPONSOR_DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            persist: env::var("ISPONSOR_PERSIST").map(|v| flag(&v)).unwrap_or(true),
            jwt_secret,
            allowed_origins,
            rate_limit_per_second: env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1200),
            rate_limit_burst: env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2400),
            identity,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env_mode == "production"
    }

    /// In-memory defaults for tests and local tooling.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            env_mode: "development".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: PathBuf::from("data"),
            persist: false,
            jwt_secret: jwt_secret.to_string(),
            allowed_origins: Vec::new(),
            rate_limit_per_second: 1200,
            rate_limit_burst: 2400,
            identity: None,
        }
    }
}
