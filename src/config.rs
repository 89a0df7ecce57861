use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Where the durable session lives
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// How much of each collection the dashboard shows. Unset fields fall
/// back to the defaults below.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub recent_contributions: Option<usize>,
    #[serde(default)]
    pub recent_announcements: Option<usize>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl DisplayConfig {
    pub fn recent_contributions(&self) -> usize {
        self.recent_contributions.unwrap_or(5)
    }

    pub fn recent_announcements(&self) -> usize {
        self.recent_announcements.unwrap_or(3)
    }

    pub fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or("R")
    }

    fn merge(&mut self, other: DisplayConfig) {
        if other.recent_contributions.is_some() {
            self.recent_contributions = other.recent_contributions;
        }
        if other.recent_announcements.is_some() {
            self.recent_announcements = other.recent_announcements;
        }
        if other.currency.is_some() {
            self.currency = other.currency;
        }
    }
}

/// Run log settings. Off unless enabled.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ActivityConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.stokvel/config.local.toml) > project (.stokvel/config.toml) > user (~/.stokvel/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stokvel").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".stokvel").join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Local overrides, should be gitignored
        let local_config = Path::new(".stokvel").join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority).
    /// Values override only when set in `other`.
    pub fn merge(&mut self, other: Config) {
        if other.api.base_url.is_some() {
            self.api.base_url = other.api.base_url;
        }
        if other.api.timeout_ms.is_some() {
            self.api.timeout_ms = other.api.timeout_ms;
        }
        if other.session.dir.is_some() {
            self.session.dir = other.session.dir;
        }
        self.display.merge(other.display);
        if other.activity.enabled.is_some() {
            self.activity.enabled = other.activity.enabled;
        }
        if other.activity.dir.is_some() {
            self.activity.dir = other.activity.dir;
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.api.base_url.as_deref()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.api.timeout_ms.unwrap_or_else(default_timeout_ms)
    }

    /// Session storage directory, `~/.stokvel` unless configured
    pub fn session_dir(&self) -> PathBuf {
        self.session.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".stokvel")
        })
    }

    pub fn activity_enabled(&self) -> bool {
        self.activity.enabled.unwrap_or(false)
    }

    /// Run log directory, `activity/` under the session dir unless configured
    pub fn activity_dir(&self) -> PathBuf {
        self.activity
            .dir
            .clone()
            .unwrap_or_else(|| self.session_dir().join("activity"))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match self.base_url() {
            None => errors.push(ValidationError {
                field: "api.base_url".to_string(),
                message: "Not set. Use --base-url, STOKVEL_API_URL, or [api] base_url"
                    .to_string(),
            }),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(ValidationError {
                    field: "api.base_url".to_string(),
                    message: format!("Must be an http(s) URL, got '{}'", url),
                })
            }
            Some(_) => {}
        }

        if self.api.timeout_ms == Some(0) {
            errors.push(ValidationError {
                field: "api.timeout_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.display.recent_contributions == Some(0) {
            errors.push(ValidationError {
                field: "display.recent_contributions".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        if self.display.recent_announcements == Some(0) {
            errors.push(ValidationError {
                field: "display.recent_announcements".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        if self
            .display
            .currency
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            errors.push(ValidationError {
                field: "display.currency".to_string(),
                message: "Must not be empty".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
