use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Clone)]
pub struct Config {
    pub db_uri: PathBuf,
    pub db_name: String,
    pub addr: SocketAddr,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("CAMPUX_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CAMPUX_JWT_SECRET is unset or still a placeholder");
        }

        let db_uri: PathBuf = get("CAMPUX_DB_URI").unwrap_or_else(|| "campux.db".into()).into();
        let db_name = get("CAMPUX_DB_NAME").unwrap_or_else(|| "campux".into());
        let host = get("CAMPUX_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("CAMPUX_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("CAMPUX_PORT is not a valid port")?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        Ok(Self { db_uri, db_name, addr, jwt_secret })
    }
}
