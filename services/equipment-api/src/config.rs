use anyhow::{bail, Context, Result};
use equipment_core::{FetchPolicy, DEFAULT_HISTORY_LIMIT, DEFAULT_KEEP};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,

    pub retention_keep: usize,
    pub history_limit: usize,
    pub demo_owner: String,
    pub fetch_policy: FetchPolicy,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = get("DATABASE_URL")?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let retention_keep = parse_or("RETENTION_KEEP", DEFAULT_KEEP)?;
        let history_limit = parse_or("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?;
        let demo_owner = std::env::var("DEMO_OWNER").unwrap_or_else(|_| "demo".to_string());
        let fetch_policy = match std::env::var("FETCH_POLICY") {
            Ok(v) => v.parse::<FetchPolicy>().map_err(anyhow::Error::msg)?,
            Err(_) => FetchPolicy::default(),
        };
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;

        // fail fast, fail loud
        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
            bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }
        if retention_keep == 0 {
            bail!("RETENTION_KEEP must be at least 1");
        }
        if history_limit == 0 {
            bail!("HISTORY_LIMIT must be at least 1");
        }
        if demo_owner.trim().is_empty() {
            bail!("DEMO_OWNER must not be blank");
        }

        Ok(Self {
            database_url,
            bind_addr,
            retention_keep,
            history_limit,
            demo_owner,
            fetch_policy,
            max_upload_bytes,
        })
    }

    /// Defaults for everything but the database, used by tests.
    #[cfg(test)]
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: "127.0.0.1:0".to_string(),
            retention_keep: DEFAULT_KEEP,
            history_limit: DEFAULT_HISTORY_LIMIT,
            demo_owner: "demo".to_string(),
            fetch_policy: FetchPolicy::default(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn parse_or(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        Err(_) => Ok(default),
    }
}
