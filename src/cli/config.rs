use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::crawler::args::{DataArgs, RequestArgs};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CrawlerConfig {
    pub request: RequestArgs,
    pub data: DataArgs,
    pub modules: ModuleSettings,
    pub http: HttpSettings,
    pub monitor: MonitorSettings,
    pub output: OutputSettings,
}

/// How many stock module instances to register
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModuleSettings {
    pub downloaders: u32,
    pub analyzers: u32,
    pub pipelines: u32,

    /// Stop processing an item at its first failing processor
    pub fail_fast: bool,

    /// First serial number handed out for module IDs
    pub sn_start: u64,

    /// Last serial number before wrapping (0 means no limit)
    pub sn_max: u64,
}

/// HTTP client settings for the stock downloader
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub extra_headers: HashMap<String, String>,
}

/// Crawl monitoring settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Milliseconds between idle checks
    pub check_interval_ms: u64,

    /// Consecutive idle checks before the crawl is stopped
    pub max_idle_count: u32,

    /// Log the scheduler summary whenever it changes
    pub log_summary: bool,
}

/// Where extracted items go
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputSettings {
    pub items_file: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request: RequestArgs {
                accepted_domains: vec![],
                max_depth: 3,
            },
            data: DataArgs::default(),
            modules: ModuleSettings::default(),
            http: HttpSettings::default(),
            monitor: MonitorSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            downloaders: 1,
            analyzers: 1,
            pipelines: 1,
            fail_fast: false,
            sn_start: 1,
            sn_max: 0,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("crawl-scheduler/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            extra_headers: HashMap::new(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval_ms: 10,
            max_idle_count: 5,
            log_summary: true,
        }
    }
}

impl MonitorSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            items_file: PathBuf::from("items.jsonl"),
        }
    }
}

impl CrawlerConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "crawl-scheduler", "crawl-scheduler") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        // Create the sites directory if it doesn't exist
        path.push("sites");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        path.pop();
        path
    }

    /// Load the default configuration, writing it out on first use
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_dir().join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::config_dir().join("sites").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_path = Self::config_dir().join("default.yaml");
        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<()> {
        let profile_path = Self::config_dir().join("sites").join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let sites_dir = Self::config_dir().join("sites");

        if !sites_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(&sites_dir)
            .context(format!("Failed to read profiles from: {}", sites_dir.display()))?
        {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}
