//! Process configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `rawcache.{yaml,toml,json}` in the working directory, if present
//! 3. the file given with `--config-file` / `RAWCACHE_CONFIG_FILE`
//! 4. legacy variables (`MINIO_ENDPOINT`, `TTL_DEFAULT`, `LISTEN_ADDR`, ...)
//!    kept for older deployments
//! 5. environment variables `RAWCACHE__<SECTION>__<KEY>`, e.g.
//!    `RAWCACHE__CACHE__TTL_DEFAULT=600`
//! 6. command line flags
//!
//! `RAW_CACHER_CONFIG` names the configuration file when `--config-file` is
//! not given.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File, Map, Source, Value, ValueKind};
use rawcache_storage::S3Settings;
use serde::Deserialize;

const DEFAULT_CONFIG_BASENAME: &str = "rawcache";
const ENV_PREFIX: &str = "RAWCACHE";
const LEGACY_CONFIG_VAR: &str = "RAW_CACHER_CONFIG";

/// Legacy variable names and the settings key each one sets.
const LEGACY_VARS: &[(&str, &str)] = &[
    ("MINIO_ENDPOINT", "storage.s3.endpoint"),
    ("MINIO_ACCESS_KEY", "storage.s3.access_key"),
    ("MINIO_SECRET_KEY", "storage.s3.secret_key"),
    ("MINIO_BUCKET", "storage.s3.bucket"),
    ("TTL_DEFAULT", "cache.ttl_default"),
    ("TTL_404", "cache.ttl_404"),
    ("SERVE_IF_PRESENT", "cache.serve_if_present"),
    ("LISTEN_ADDR", "server.listen_addr"),
];

/// Command line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "rawcache", version, about = "Path-routed HTTP caching proxy")]
pub struct CliArgs {
    /// Configuration file (YAML, TOML or JSON).
    #[arg(long, env = "RAWCACHE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Address to listen on, overrides `server.listen_addr`.
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Emit logs as JSON, overrides `log.json`.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Complete process settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    pub upstream: UpstreamSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
    /// Per-request deadline in seconds.
    pub request_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_timeout: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL of positive entries, in seconds.
    pub ttl_default: u64,
    /// TTL of negative (404) entries, in seconds.
    pub ttl_404: u64,
    /// Serve any stored object without checking freshness.
    pub serve_if_present: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_default: 3600,
            ttl_404: 60,
            serve_if_present: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Fs,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub s3: S3Settings,
    pub fs: FsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsSettings {
    pub root: PathBuf,
}

impl Default for FsSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./cache-data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Whole-request timeout, in seconds.
    pub timeout: u64,
    /// Connect timeout, in seconds.
    pub connect_timeout: u64,
    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            timeout: 60,
            connect_timeout: 10,
            pool_idle_timeout: 90,
            pool_max_idle_per_host: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub json: bool,
}

/// Loads settings from every source and validates them.
pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    load_with(cli, LegacyEnvironment::from_process())
}

fn load_with(cli: &CliArgs, legacy: LegacyEnvironment) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    } else if let Some(path) = legacy.config_file() {
        // Un fichero ausente no es un error.
        builder = builder.add_source(File::with_name(path).required(false));
    }

    builder = builder
        .add_source(legacy)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    settings.apply_cli(cli);
    settings.validate()?;
    Ok(settings)
}

/// Source for the variable names read by earlier deployments.
///
/// Empty values are ignored, as are TTLs that are not whole numbers.
/// `SERVE_IF_PRESENT` is true for `1` or `true` (any case). A listen address
/// given as `:port` binds every interface.
#[derive(Debug, Clone, Default)]
struct LegacyEnvironment {
    vars: HashMap<String, String>,
}

impl LegacyEnvironment {
    fn from_process() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .filter(|(_, value)| !value.is_empty())
                .collect(),
        }
    }

    fn config_file(&self) -> Option<&str> {
        self.vars.get(LEGACY_CONFIG_VAR).map(String::as_str)
    }
}

fn legacy_value(key: &str, raw: &str) -> Option<ValueKind> {
    match key {
        "cache.ttl_default" | "cache.ttl_404" => {
            raw.trim().parse::<u64>().ok().map(ValueKind::from)
        },
        "cache.serve_if_present" => Some(ValueKind::from(
            raw.eq_ignore_ascii_case("true") || raw == "1",
        )),
        "server.listen_addr" if raw.starts_with(':') => {
            Some(ValueKind::from(format!("0.0.0.0{raw}")))
        },
        _ => Some(ValueKind::from(raw)),
    }
}

impl Source for LegacyEnvironment {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
        let origin = "legacy environment".to_string();
        let mut values = Map::new();

        for (var, key) in LEGACY_VARS {
            let Some(kind) = self.vars.get(*var).and_then(|raw| legacy_value(key, raw)) else {
                continue;
            };
            values.insert((*key).to_string(), Value::new(Some(&origin), kind));
        }

        Ok(values)
    }
}

impl Settings {
    fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(addr) = cli.listen_addr.as_ref() {
            self.server.listen_addr = addr.clone();
        }
        if cli.log_json {
            self.log.json = true;
        }
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.server.request_timeout == 0 {
            return Err(ConfigError::invalid(
                "server.request_timeout",
                "must be greater than zero",
            ));
        }
        if self.cache.ttl_default == 0 {
            return Err(ConfigError::invalid(
                "cache.ttl_default",
                "must be greater than zero",
            ));
        }
        if self.cache.ttl_404 == 0 {
            return Err(ConfigError::invalid(
                "cache.ttl_404",
                "must be greater than zero",
            ));
        }
        if self.upstream.timeout == 0 {
            return Err(ConfigError::invalid(
                "upstream.timeout",
                "must be greater than zero",
            ));
        }

        if self.storage.backend == StorageBackend::S3 {
            let missing = self.storage.s3.missing_fields();
            if !missing.is_empty() {
                return Err(ConfigError::invalid(
                    "storage.s3",
                    format!("missing {}", missing.join(", ")),
                ));
            }
        }

        Ok(())
    }

    /// Returns the parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen_addr.parse().map_err(|e| {
            ConfigError::invalid(
                "server.listen_addr",
                format!("'{}': {}", self.server.listen_addr, e),
            )
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout)
    }
}
