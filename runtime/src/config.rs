//! Process configuration resolved from the environment.
//!
//! Every setting has a default; CLI flags may override the resolved values
//! after [`ServiceConfig::from_env`] returns.

use anyhow::{bail, Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_AXE_PATH: &str = "node_modules/axe-core/axe.min.js";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_ENGINE_LOAD_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_AUDIT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_CONCURRENT_AUDITS: usize = 4;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{other}' (expected pretty or json)"),
        }
    }
}

/// Time bounds for the pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub engine_load: Duration,
    pub audit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            engine_load: Duration::from_millis(DEFAULT_ENGINE_LOAD_TIMEOUT_MS),
            audit: Duration::from_millis(DEFAULT_AUDIT_TIMEOUT_MS),
        }
    }
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub axe_path: PathBuf,
    pub chromium_path: Option<PathBuf>,
    pub timeouts: Timeouts,
    pub max_concurrent_audits: usize,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            axe_path: PathBuf::from(DEFAULT_AXE_PATH),
            chromium_path: None,
            timeouts: Timeouts::default(),
            max_concurrent_audits: DEFAULT_MAX_CONCURRENT_AUDITS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServiceConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get("LITTERBOX_HOST") {
            cfg.host = v
                .trim()
                .parse()
                .with_context(|| format!("invalid LITTERBOX_HOST '{v}'"))?;
        }
        if let Some(v) = get("PORT") {
            cfg.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("AXE_CORE_PATH") {
            cfg.axe_path = PathBuf::from(v);
        }
        cfg.chromium_path = get("LITTERBOX_CHROMIUM_PATH").map(PathBuf::from);

        if let Some(v) = get("LITTERBOX_FETCH_TIMEOUT_MS") {
            cfg.timeouts.fetch = parse_millis("LITTERBOX_FETCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("LITTERBOX_ENGINE_LOAD_TIMEOUT_MS") {
            cfg.timeouts.engine_load = parse_millis("LITTERBOX_ENGINE_LOAD_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("LITTERBOX_AUDIT_TIMEOUT_MS") {
            cfg.timeouts.audit = parse_millis("LITTERBOX_AUDIT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("LITTERBOX_MAX_CONCURRENT_AUDITS") {
            cfg.max_concurrent_audits = parse_number("LITTERBOX_MAX_CONCURRENT_AUDITS", &v)?;
        }
        if let Some(v) = get("LITTERBOX_MAX_BODY_BYTES") {
            cfg.max_body_bytes = parse_number("LITTERBOX_MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = get("LITTERBOX_LOG_FORMAT") {
            cfg.log_format = v.parse()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would make every audit fail or hang.
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.fetch.is_zero()
            || self.timeouts.engine_load.is_zero()
            || self.timeouts.audit.is_zero()
        {
            bail!("timeouts must be greater than zero");
        }
        if self.max_concurrent_audits == 0 {
            bail!("LITTERBOX_MAX_CONCURRENT_AUDITS must be at least 1");
        }
        if self.max_body_bytes == 0 {
            bail!("LITTERBOX_MAX_BODY_BYTES must be at least 1");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid {key} '{value}'"))
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    parse_number::<u64>(key, value).map(Duration::from_millis)
}
