//! Run configuration and the knowledge-base target registry
//!
//! Targets are a fixed set of names, one per language service plus the
//! secondary publisher. Credentials never live in source: each name resolves
//! its knowledge box id and API key from the environment
//! (`KBM_TARGET_<NAME>_KB`, `KBM_TARGET_<NAME>_API_KEY`).

use kbm_common::{KbmError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default API endpoint when `KBM_ENDPOINT` is not set
pub const DEFAULT_ENDPOINT: &str = "https://europe-1.nuclia.cloud/api/v1";

/// Default request timeout in seconds.
/// Can be overridden via KBM_API_TIMEOUT_SECS environment variable.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Every target name the tools accept
pub const TARGET_NAMES: &[&str] = &[
    "benarnews",
    "burmese",
    "cantonese",
    "english",
    "khmer",
    "korean",
    "lao",
    "mandarin",
    "tibetan",
    "uyghur",
    "vietnamese",
];

/// A resolved destination: knowledge box plus the key that may write to it
#[derive(Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub knowledge_box: String,
    pub api_key: String,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        knowledge_box: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            knowledge_box: knowledge_box.into(),
            api_key: api_key.into(),
        }
    }
}

// Keep the key out of debug logs
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("knowledge_box", &self.knowledge_box)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Credentials for a target; either half may be missing from the environment
#[derive(Debug, Clone, Default)]
struct Credentials {
    knowledge_box: Option<String>,
    api_key: Option<String>,
}

/// Fixed mapping from target name to its credentials
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    entries: BTreeMap<String, Credentials>,
}

impl TargetRegistry {
    fn env_key(name: &str, suffix: &str) -> String {
        format!("KBM_TARGET_{}_{}", name.to_uppercase(), suffix)
    }

    /// Build the registry, reading credentials for every known name
    pub fn from_env() -> Self {
        let entries = TARGET_NAMES
            .iter()
            .map(|name| {
                let credentials = Credentials {
                    knowledge_box: std::env::var(Self::env_key(name, "KB")).ok(),
                    api_key: std::env::var(Self::env_key(name, "API_KEY")).ok(),
                };
                (name.to_string(), credentials)
            })
            .collect();
        Self { entries }
    }

    /// Build a registry from already-resolved targets
    pub fn with_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let entries = targets
            .into_iter()
            .map(|t| {
                let credentials = Credentials {
                    knowledge_box: Some(t.knowledge_box),
                    api_key: Some(t.api_key),
                };
                (t.name, credentials)
            })
            .collect();
        Self { entries }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Resolve a target name; fails before any I/O on unknown names or
    /// missing credentials
    pub fn resolve(&self, name: &str) -> Result<Target> {
        let key = name.to_lowercase();
        let credentials = self
            .entries
            .get(&key)
            .ok_or_else(|| KbmError::unknown_target(name, self.names()))?;

        let knowledge_box = credentials.knowledge_box.clone().ok_or_else(|| {
            KbmError::config(format!(
                "no knowledge box configured for '{}'; set {}",
                key,
                Self::env_key(&key, "KB")
            ))
        })?;
        let api_key = credentials.api_key.clone().ok_or_else(|| {
            KbmError::config(format!(
                "no API key configured for '{}'; set {}",
                key,
                Self::env_key(&key, "API_KEY")
            ))
        })?;

        Ok(Target::new(key, knowledge_box, api_key))
    }
}

/// How the upload driver writes each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Create, falling back to an update when the slug exists
    #[default]
    Upsert,
    /// Create only; an existing slug is reported as a conflict
    CreateOnly,
    /// Update origin and thumbnail metadata of existing resources
    EditOrigin,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Upsert => write!(f, "upsert"),
            WriteMode::CreateOnly => write!(f, "create-only"),
            WriteMode::EditOrigin => write!(f, "edit-origin"),
        }
    }
}

/// Immutable settings for one driver run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: PathBuf,
    pub target: Target,
    pub resume_at: usize,
    pub max_uploads: Option<usize>,
    pub fake_it: bool,
    pub mode: WriteMode,
    /// Minimum spacing between remote calls
    pub min_interval: Option<Duration>,
}

impl RunConfig {
    /// Start building a run configuration
    pub fn builder(source: impl Into<PathBuf>, target: Target) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                source: source.into(),
                target,
                resume_at: 0,
                max_uploads: None,
                fake_it: false,
                mode: WriteMode::default(),
                min_interval: None,
            },
        }
    }
}

/// Builder for RunConfig
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn resume_at(mut self, resume_at: usize) -> Self {
        self.config.resume_at = resume_at;
        self
    }

    pub fn max_uploads(mut self, max: Option<usize>) -> Self {
        self.config.max_uploads = max;
        self
    }

    pub fn fake_it(mut self, fake_it: bool) -> Self {
        self.config.fake_it = fake_it;
        self
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn min_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.min_interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// Finish the configuration; `resume_at` and `max_uploads` are exclusive
    pub fn build(self) -> Result<RunConfig> {
        if self.config.resume_at > 0 && self.config.max_uploads.is_some() {
            return Err(KbmError::config(
                "combining --max and --resume-at is not supported",
            ));
        }
        Ok(self.config)
    }
}

/// Endpoint settings for the HTTP client
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Read `KBM_ENDPOINT` and `KBM_API_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("KBM_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let timeout_secs = std::env::var("KBM_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        Self::new(base_url, Duration::from_secs(timeout_secs))
    }
}
