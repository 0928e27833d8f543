use crate::services::{bucket_registry::BucketConfig, repository::AccessLevel};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

const DEFAULT_BUCKETS: &str = "carousel=http://127.0.0.1:3000/public/carousel,\
                               products=http://127.0.0.1:3000/public/products";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub buckets: Vec<BucketConfig>,
    pub access_level: AccessLevel,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Media ingestion service")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides MEDIA_INGEST_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MEDIA_INGEST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Managed bucket as `id=public-base-url` or bare `id`; repeatable
    /// (overrides MEDIA_INGEST_BUCKETS)
    #[arg(long = "bucket")]
    pub buckets: Vec<String>,

    /// Repository privilege: `service` or `public` (overrides MEDIA_INGEST_ACCESS_LEVEL).
    /// Required; there is no default.
    #[arg(long)]
    pub access_level: Option<String>,

    /// Largest accepted upload in bytes (overrides MEDIA_INGEST_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `env`.
    pub fn from_sources(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = env("MEDIA_INGEST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_env(&env, "MEDIA_INGEST_PORT", 3000u16)?;
        let env_storage =
            env("MEDIA_INGEST_STORAGE_DIR").unwrap_or_else(|| "./data/objects".into());
        let env_db = env("MEDIA_INGEST_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/meta/media.db".into());
        let env_max_upload = parse_env(&env, "MEDIA_INGEST_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let db_max_connections = parse_env(&env, "MEDIA_INGEST_DB_MAX_CONNECTIONS", 5u32)?;
        let db_acquire_timeout = Duration::from_secs(parse_env(
            &env,
            "MEDIA_INGEST_DB_ACQUIRE_TIMEOUT_SECS",
            30u64,
        )?);

        let raw_buckets = if args.buckets.is_empty() {
            env("MEDIA_INGEST_BUCKETS")
                .unwrap_or_else(|| DEFAULT_BUCKETS.into())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            args.buckets
        };
        let buckets = raw_buckets.iter().map(|raw| BucketConfig::parse(raw)).collect();

        let access_level = args
            .access_level
            .or_else(|| env("MEDIA_INGEST_ACCESS_LEVEL"))
            .ok_or_else(|| {
                anyhow!("access level is required: pass --access-level or set MEDIA_INGEST_ACCESS_LEVEL")
            })?
            .parse::<AccessLevel>()
            .map_err(|msg| anyhow!(msg))
            .context("parsing access level")?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            buckets,
            access_level,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            db_max_connections,
            db_acquire_timeout,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn access_level_is_required() {
        let err = AppConfig::from_sources(Args::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("access level is required"));
    }

    #[test]
    fn defaults_and_env_values() {
        let cfg = AppConfig::from_sources(
            Args::default(),
            env_of(&[
                ("MEDIA_INGEST_ACCESS_LEVEL", "service"),
                ("MEDIA_INGEST_PORT", "8080"),
                ("MEDIA_INGEST_BUCKETS", "carousel=https://cdn.test/c, drafts"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.access_level, AccessLevel::Service);
        assert_eq!(cfg.buckets.len(), 2);
        assert_eq!(cfg.buckets[0].public_base_url.as_deref(), Some("https://cdn.test/c"));
        assert_eq!(cfg.buckets[1].public_base_url, None);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn cli_overrides_env() {
        let args = Args {
            port: Some(9000),
            access_level: Some("public".into()),
            buckets: vec!["products=https://cdn.test/p".into()],
            ..Default::default()
        };
        let cfg = AppConfig::from_sources(
            args,
            env_of(&[
                ("MEDIA_INGEST_ACCESS_LEVEL", "service"),
                ("MEDIA_INGEST_PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.access_level, AccessLevel::Public);
        assert_eq!(cfg.buckets.len(), 1);
        assert_eq!(cfg.buckets[0].id, "products");
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = AppConfig::from_sources(
            Args::default(),
            env_of(&[
                ("MEDIA_INGEST_ACCESS_LEVEL", "service"),
                ("MEDIA_INGEST_PORT", "eighty"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("MEDIA_INGEST_PORT"));
    }
}
