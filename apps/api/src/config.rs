use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub activities_csv: String,
    pub sessions_dir: String,
    /// Seconds between feed ingests. 0 disables the background poller.
    pub feed_poll_secs: u64,
    pub feed_ai_categorize: bool,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub s3: Option<S3Config>,
    pub port: u16,
    pub rust_log: String,
}

/// Credentials for mirroring session documents to S3 / MinIO.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            activities_csv: env_or("ACTIVITIES_CSV", "data/activities.csv"),
            sessions_dir: env_or("SESSIONS_DIR", "data/sessions"),
            feed_poll_secs: parse_env("FEED_POLL_SECS", 14_400)?,
            feed_ai_categorize: parse_env("FEED_AI_CATEGORIZE", false)?,
            breaker_failure_threshold: parse_env("BREAKER_FAILURE_THRESHOLD", 5)?,
            breaker_cooldown_secs: parse_env("BREAKER_COOLDOWN_SECS", 30)?,
            s3: S3Config::from_env(),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

impl S3Config {
    /// The mirror is only enabled when a bucket and both keys are present.
    fn from_env() -> Option<Self> {
        let bucket = optional_env("S3_BUCKET")?;
        let access_key_id = optional_env("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = optional_env("AWS_SECRET_ACCESS_KEY")?;
        Some(S3Config {
            bucket,
            endpoint: optional_env("S3_ENDPOINT"),
            region: env_or("AWS_REGION", "us-east-1"),
            access_key_id,
            secret_access_key,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
