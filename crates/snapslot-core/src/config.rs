//! Config - `snapslot.toml` の読み込み
//!
//! ```toml
//! [remote]
//! api_base = "https://photos.example.com/api"
//! request_timeout_secs = 20
//!
//! [identity]
//! event_id = "e1"
//! role = "guest"
//! identity_key = "k1"
//! nickname = "aya"
//!
//! [queue]
//! db_path = "snapslot-queue.db"
//!
//! [send]
//! interval_secs = 8
//!
//! [plan]
//! host_max_shots = 30
//! guest_max_shots = 20
//!
//! [log]
//! profile = "development"
//! ```
//!
//! identity 以外はすべて既定値があります。`SNAPSLOT_*` 環境変数はファイルの値より優先されます。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{EventId, PlanLimits, Role, UploadIdentity};
use crate::domain::plan::{DEFAULT_GUEST_MAX_SHOTS, DEFAULT_HOST_MAX_SHOTS};
use crate::observability::Profile;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} in {var}")]
    Env { var: &'static str, value: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapslotConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub send: SendConfig,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Supplied by whoever starts the session; no defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub event_id: String,

    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub identity_key: String,

    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "default_host_max_shots")]
    pub host_max_shots: u32,

    #[serde(default = "default_guest_max_shots")]
    pub guest_max_shots: u32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            host_max_shots: default_host_max_shots(),
            guest_max_shots: default_guest_max_shots(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub profile: Profile,
}

fn default_api_base() -> String {
    "http://localhost:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    20
}

fn default_db_path() -> PathBuf {
    PathBuf::from("snapslot-queue.db")
}

const fn default_interval_secs() -> u64 {
    8
}

const fn default_host_max_shots() -> u32 {
    DEFAULT_HOST_MAX_SHOTS
}

const fn default_guest_max_shots() -> u32 {
    DEFAULT_GUEST_MAX_SHOTS
}

impl SnapslotConfig {
    /// Read `path`, apply `SNAPSLOT_*` overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment, for running without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SNAPSLOT_API_BASE") {
            self.remote.api_base = v;
        }
        if let Some(v) = lookup("SNAPSLOT_REQUEST_TIMEOUT_SECS") {
            self.remote.request_timeout_secs = parse_var("SNAPSLOT_REQUEST_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("SNAPSLOT_EVENT_ID") {
            self.identity.event_id = v;
        }
        if let Some(v) = lookup("SNAPSLOT_ROLE") {
            self.identity.role = Some(parse_var("SNAPSLOT_ROLE", v)?);
        }
        if let Some(v) = lookup("SNAPSLOT_IDENTITY_KEY") {
            self.identity.identity_key = v;
        }
        if let Some(v) = lookup("SNAPSLOT_NICKNAME") {
            self.identity.nickname = v;
        }
        if let Some(v) = lookup("SNAPSLOT_DB_PATH") {
            self.queue.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SNAPSLOT_SEND_INTERVAL_SECS") {
            self.send.interval_secs = parse_var("SNAPSLOT_SEND_INTERVAL_SECS", v)?;
        }
        if let Some(v) = lookup("SNAPSLOT_HOST_MAX_SHOTS") {
            self.plan.host_max_shots = parse_var("SNAPSLOT_HOST_MAX_SHOTS", v)?;
        }
        if let Some(v) = lookup("SNAPSLOT_GUEST_MAX_SHOTS") {
            self.plan.guest_max_shots = parse_var("SNAPSLOT_GUEST_MAX_SHOTS", v)?;
        }
        if let Some(v) = lookup("SNAPSLOT_LOG_PROFILE") {
            self.log.profile = parse_var("SNAPSLOT_LOG_PROFILE", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.api_base.trim().is_empty() {
            return Err(ConfigError::Validation("remote.api_base is empty".to_string()));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.send.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "send.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The session identity; fails if any part is missing.
    pub fn upload_identity(&self) -> Result<UploadIdentity, ConfigError> {
        let identity = &self.identity;
        if identity.event_id.trim().is_empty() {
            return Err(ConfigError::Validation("identity.event_id is required".to_string()));
        }
        let role = identity
            .role
            .ok_or_else(|| ConfigError::Validation("identity.role is required".to_string()))?;
        if identity.identity_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity.identity_key is required".to_string(),
            ));
        }
        Ok(UploadIdentity::new(
            EventId::new(identity.event_id.clone()),
            role,
            identity.identity_key.clone(),
        ))
    }

    /// Nickname shown with uploads; falls back to the role name.
    pub fn nickname(&self) -> String {
        match (self.identity.nickname.trim(), self.identity.role) {
            ("", Some(role)) => role.as_str().to_string(),
            ("", None) => "guest".to_string(),
            (nickname, _) => nickname.to_string(),
        }
    }

    pub fn plan_limits(&self) -> PlanLimits {
        PlanLimits {
            host_max_shots: self.plan.host_max_shots,
            guest_max_shots: self.plan.guest_max_shots,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send.interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
[remote]
api_base = "https://photos.example.com/api"
request_timeout_secs = 5

[identity]
event_id = "e1"
role = "guest"
identity_key = "k1"
nickname = "aya"

[queue]
db_path = "/tmp/q.db"

[send]
interval_secs = 3

[plan]
host_max_shots = 40
guest_max_shots = 10

[log]
profile = "production"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = SnapslotConfig::from_toml("").unwrap();
        assert_eq!(config.send_interval(), Duration::from_secs(8));
        assert_eq!(config.plan_limits(), PlanLimits::default());
        assert_eq!(config.log.profile, Profile::Development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_file_round_trips_into_identity() {
        let config = SnapslotConfig::from_toml(FULL).unwrap();
        let identity = config.upload_identity().unwrap();

        assert_eq!(identity.event_id().as_str(), "e1");
        assert_eq!(identity.role(), Role::Guest);
        assert_eq!(identity.identity_key(), "k1");
        assert_eq!(config.nickname(), "aya");
        assert_eq!(config.plan.guest_max_shots, 10);
        assert_eq!(config.queue.db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(config.log.profile, Profile::Production);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = SnapslotConfig::from_toml(FULL).unwrap();
        config
            .apply_overrides(env(&[
                ("SNAPSLOT_ROLE", "host"),
                ("SNAPSLOT_IDENTITY_KEY", "h9"),
                ("SNAPSLOT_SEND_INTERVAL_SECS", "15"),
            ]))
            .unwrap();

        let identity = config.upload_identity().unwrap();
        assert_eq!(identity.role(), Role::Host);
        assert_eq!(identity.identity_key(), "h9");
        assert_eq!(config.send_interval(), Duration::from_secs(15));
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut config = SnapslotConfig::default();
        let err = config
            .apply_overrides(env(&[("SNAPSLOT_GUEST_MAX_SHOTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "SNAPSLOT_GUEST_MAX_SHOTS", .. }));
    }

    #[test]
    fn missing_identity_is_a_validation_error() {
        let config = SnapslotConfig::from_toml("[identity]\nevent_id = \"e1\"\n").unwrap();
        let err = config.upload_identity().unwrap_err();
        assert!(err.to_string().contains("identity.role"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SnapslotConfig::from_toml("[send]\ninterval_secs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapslot.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = SnapslotConfig::load(&path).unwrap();
        assert_eq!(config.remote.request_timeout_secs, 5);
    }
}
