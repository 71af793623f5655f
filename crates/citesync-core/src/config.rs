use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Source names understood by the resolver, in default priority order.
pub const KNOWN_SOURCES: [&str; 3] = ["crossref", "openalex", "semantic_scholar"];

/// Root application configuration, loaded from `~/.config/citesync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub library: LibraryConfig,
    pub matching: MatchingConfig,
    pub enrichment: EnrichmentConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub notes_dir: String,
    pub entries_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub title_fallback: bool,
    pub title_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    /// Entries scoring below this are sent through the source chain.
    pub min_completeness: f64,
    pub max_attempts_per_source: u32,
    pub backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub concurrency: usize,
    /// Source names in priority order.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar_api_key: Option<String>,
    pub cache_enabled: bool,
    pub cache_ttl_hours: u64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for LibraryConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("citesync");

        Self {
            notes_dir: home.join("notes").to_string_lossy().to_string(),
            entries_file: data_dir.join("entries.json").to_string_lossy().to_string(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_fallback: true,
            title_threshold: 0.9,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_completeness: 1.0,
            max_attempts_per_source: 2,
            backoff_ms: 500,
            request_timeout_secs: 20,
            concurrency: 4,
            sources: KNOWN_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            polite_email: None,
            semantic_scholar_api_key: None,
            cache_enabled: true,
            cache_ttl_hours: 7 * 24,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/citesync/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CITESYNC_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("citesync")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to the standard path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(email) = env_first(&["CITESYNC_POLITE_EMAIL", "POLITE_POOL_EMAIL"]) {
            self.sources.polite_email = Some(email);
        }
        if let Some(key) = env_first(&[
            "CITESYNC_SEMANTIC_SCHOLAR_API_KEY",
            "SEMANTIC_SCHOLAR_API_KEY",
        ]) {
            self.sources.semantic_scholar_api_key = Some(key);
        }
        if let Some(dir) = env_first(&["CITESYNC_NOTES_DIR"]) {
            self.library.notes_dir = dir;
        }
        if let Some(file) = env_first(&["CITESYNC_ENTRIES_FILE"]) {
            self.library.entries_file = file;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.title_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CoreError::ConfigError(format!(
                "matching.title_threshold must be within [0, 1], got {threshold}"
            )));
        }
        let min = self.enrichment.min_completeness;
        if !(0.0..=1.0).contains(&min) {
            return Err(CoreError::ConfigError(format!(
                "enrichment.min_completeness must be within [0, 1], got {min}"
            )));
        }
        if self.enrichment.sources.is_empty() {
            return Err(CoreError::ConfigError(
                "enrichment.sources must name at least one source".to_string(),
            ));
        }
        if let Some(unknown) = self
            .enrichment
            .sources
            .iter()
            .find(|name| !KNOWN_SOURCES.contains(&name.as_str()))
        {
            return Err(CoreError::ConfigError(format!(
                "unknown source '{unknown}', expected one of: {}",
                KNOWN_SOURCES.join(", ")
            )));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn notes_dir(&self) -> PathBuf {
        PathBuf::from(&self.library.notes_dir)
    }

    pub fn entries_path(&self) -> PathBuf {
        PathBuf::from(&self.library.entries_file)
    }

    /// Directory holding cached source responses.
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("citesync")
    }
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
