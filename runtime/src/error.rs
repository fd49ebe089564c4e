//! Error taxonomy for the audit pipeline and the JSON failure envelope.

use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Pipeline stage bounded by its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Environment,
    Audit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Environment => f.write_str("environment setup"),
            Stage::Audit => f.write_str("audit"),
        }
    }
}

/// Every way an audit can fail.
///
/// Only [`AuditError::MissingUrl`] is the caller's fault; everything else
/// is reported as a uniform server-side failure.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("URL is required")]
    MissingUrl,

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("failed to construct document environment: {0}")]
    Environment(String),

    /// The engine entry point never became callable.
    #[error("axe-core failed to load: {0}")]
    EngineLoad(String),

    /// The engine ran and reported an error through its callback.
    #[error("axe-core run failed: {0}")]
    EngineRun(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: Stage, after_ms: u64 },

    #[error("audit service is shutting down")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuditError {
    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::MissingUrl => "missing_url",
            AuditError::Fetch(_) => "fetch",
            AuditError::Environment(_) => "environment",
            AuditError::EngineLoad(_) => "engine_load",
            AuditError::EngineRun(_) => "engine_run",
            AuditError::Timeout { .. } => "timeout",
            AuditError::Unavailable => "unavailable",
            AuditError::Internal(_) => "internal",
        }
    }

    /// True when the request itself was invalid (HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, AuditError::MissingUrl)
    }
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Body returned for every failed audit.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEnvelope {
    pub id: String,
    pub error: &'static str,
    pub details: String,
}

impl FailureEnvelope {
    pub fn new(err: &AuditError) -> Self {
        Self {
            id: correlation_id(),
            error: "Audit failed",
            details: err.to_string(),
        }
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Correlation id for a failure: `<unix-millis>-<9 base36 chars>`.
pub fn correlation_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_shape() {
        let id = correlation_id();
        let (millis, suffix) = id.split_once('-').expect("id has a dash");
        assert!(!millis.is_empty());
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_correlation_ids_differ() {
        assert_ne!(correlation_id(), correlation_id());
    }

    #[test]
    fn test_engine_load_message_is_distinguishable() {
        let err = AuditError::EngineLoad("axe.run is not a function".into());
        assert!(err.to_string().contains("failed to load"));
        assert_eq!(err.kind(), "engine_load");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_timeout_message_names_stage() {
        let err = AuditError::Timeout {
            stage: Stage::Fetch,
            after_ms: 1500,
        };
        assert_eq!(err.to_string(), "fetch timed out after 1500ms");
    }

    #[test]
    fn test_envelope_carries_details() {
        let env = FailureEnvelope::new(&AuditError::Fetch("connection refused".into()));
        assert_eq!(env.error, "Audit failed");
        assert_eq!(env.details, "fetch failed: connection refused");
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("id").and_then(|v| v.as_str()).is_some());
    }
}
