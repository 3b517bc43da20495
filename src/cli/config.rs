//! Operator configuration file handling
//!
//! The config file is TOML and lives at
//! `<config dir>/consortium/consortium.toml` unless a path is given.
//!
//! It holds deployment settings only: where member credentials are, which
//! members this operator drives, polling budgets and logging. The
//! electorate itself is whatever the service records.

use consortium::governance::{GovernanceConfig, MemberId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default number of members driven by this operator
const DEFAULT_MEMBERS: u32 = 3;

/// Operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsortiumConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub consortium: MembersConfig,

    #[serde(default)]
    pub governance: GovernanceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where member and network certificates are read from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Directory holding `member{n}_cert.pem`, `member{n}_privk.pem`,
    /// `user{n}_cert.pem` and `networkcert.pem`
    pub dir: Option<PathBuf>,
}

/// Members this operator votes for, in voting order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersConfig {
    #[serde(default = "default_members")]
    pub members: Vec<MemberId>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_members() -> Vec<MemberId> {
    (1..=DEFAULT_MEMBERS).map(MemberId).collect()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for MembersConfig {
    fn default() -> Self {
        Self {
            members: default_members(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ConsortiumConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: ConsortiumConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Load `path` if given, else the default location if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(credentials_dir: &Path) -> String {
        format!(
            r#"# Consortium Operator Configuration
#
# Deployment settings for the governance client. Membership and node
# trust are decided by member votes and recorded by the service; nothing
# here can change them.

[credentials]
# Directory with member{{n}}_cert.pem, member{{n}}_privk.pem,
# user{{n}}_cert.pem and networkcert.pem
dir = "{credentials_dir}"

[consortium]
# Members this operator votes for, in voting order
members = [1, 2, 3]

[governance.commit]
# Global commit polling: interval and overall timeout in milliseconds
poll_interval_ms = 100
timeout_ms = 3000

# Ask the node to emit a signature before polling
request_signature = true

[governance.node_status]
# Node status polling: interval in milliseconds and attempt budget
poll_interval_ms = 1000
attempts = 10

[governance.voting]
# "stop_on_resolution" or "cast_full_quorum"
policy = "stop_on_resolution"

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"
"#,
            credentials_dir = credentials_dir.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        credentials_dir: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(credentials_dir);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("consortium")
        .join("consortium.toml")
}

/// Get the default credentials directory
pub fn default_credentials_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("consortium")
        .join("credentials")
}

#[cfg(test)]
mod tests {
    use super::*;
    use consortium::governance::VotingPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ConsortiumConfig::default();

        assert_eq!(config.credentials.dir, None);
        assert_eq!(
            config.consortium.members,
            vec![MemberId(1), MemberId(2), MemberId(3)]
        );
        assert_eq!(config.governance, GovernanceConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("consortium.toml");

        let mut config = ConsortiumConfig::default();
        config.credentials.dir = Some(PathBuf::from("/data/consortium/creds"));
        config.governance.voting.policy = VotingPolicy::CastFullQuorum;
        config.save(&config_path).unwrap();

        let loaded = ConsortiumConfig::load(&config_path).unwrap();
        assert_eq!(
            loaded.credentials.dir,
            Some(PathBuf::from("/data/consortium/creds"))
        );
        assert_eq!(loaded.governance.voting.policy, VotingPolicy::CastFullQuorum);
    }

    #[test]
    fn test_create_default_config_loads() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("consortium.toml");
        let creds = temp_dir.path().join("creds");

        ConsortiumConfig::create_default(&config_path, &creds).unwrap();

        let config = ConsortiumConfig::load(&config_path).unwrap();
        assert_eq!(config.credentials.dir, Some(creds));
        assert_eq!(config.governance, GovernanceConfig::default());
        assert_eq!(config.consortium.members.len(), 3);
    }

    #[test]
    fn test_generate_default_toml() {
        let toml = ConsortiumConfig::generate_default_toml(Path::new("/data/creds"));

        assert!(toml.contains("dir = \"/data/creds\""));
        assert!(toml.contains("member{n}_cert.pem"));
        assert!(toml.contains("policy = \"stop_on_resolution\""));
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("consortium.toml");

        let minimal_config = r#"
[governance.commit]
timeout_ms = 500
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = ConsortiumConfig::load(&config_path).unwrap();

        assert_eq!(config.governance.commit.timeout_ms, 500);
        assert_eq!(config.governance.commit.poll_interval_ms, 100);
        assert_eq!(config.governance.node_status.attempts, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_rejects_unknown_policy() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("consortium.toml");
        fs::write(&config_path, "[governance.voting]\npolicy = \"first_past_the_post\"\n").unwrap();

        assert!(ConsortiumConfig::load(&config_path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConsortiumConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("consortium/consortium.toml"));
    }
}
