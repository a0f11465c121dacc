//! Configuration file parser for epg-sync.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which reproduces the reference deployment (upstream mirrors, `public/`
//! output, git handoff enabled). Unknown top-level keys are ignored with a
//! warning so typos surface in logs instead of silently using defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::feed::{RetryPolicy, Source, Tier};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("No sources configured")]
    NoSources,
}

/// Top-level application configuration.
///
/// All sections use `#[serde(default)]` so any subset of keys can be
/// specified; missing sections fall back to their defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub git: GitConfig,
}

/// Ranked feed sources. Both lists are priority-ordered; every primary
/// source is tried before any backup source. Duplicates are preserved.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub primary: Vec<String>,
    pub backup: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: vec![
                "https://raw.githubusercontent.com/sparkssssssssss/epg/main/pp.xml".to_string(),
                "https://raw.githubusercontent.com/sparkssssssssss/epg/main/pp.xml.gz".to_string(),
            ],
            backup: vec![
                "https://epg.112114.xyz/pp.xml".to_string(),
                "https://epg.112114.xyz/pp.xml.gz".to_string(),
            ],
        }
    }
}

/// Retry budget and timings for the fetch stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Additional attempts beyond the first, per source.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds; doubles per failure.
    pub retry_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Durable artifact layout. The three file names are the contract surface
/// consumed by external query services; change them in lockstep with those.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub xml: String,
    pub json: String,
    pub digest: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public"),
            xml: "epg.xml".to_string(),
            json: "epg.json".to_string(),
            digest: "epg.sha256".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn xml_path(&self) -> PathBuf {
        self.dir.join(&self.xml)
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(&self.json)
    }

    pub fn digest_path(&self) -> PathBuf {
        self.dir.join(&self.digest)
    }
}

/// Publication handoff to the version-control collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
    /// Working tree to stage, commit, and push from.
    pub dir: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    ///
    /// Source URLs are validated here so a typo fails the run at startup,
    /// not after a retry budget has been burned against a bad address.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["sources", "fetch", "output", "git"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.primary.len() + config.sources.backup.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let all = self.sources.primary.iter().chain(&self.sources.backup);
        let mut count = 0;
        for url in all {
            count += 1;
            let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidSource {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            match parsed.scheme() {
                "http" | "https" => {}
                scheme => {
                    return Err(ConfigError::InvalidSource {
                        url: url.clone(),
                        reason: format!("unsupported scheme '{scheme}' (only http/https)"),
                    })
                }
            }
        }
        if count == 0 {
            return Err(ConfigError::NoSources);
        }
        Ok(())
    }

    /// The full ranked source list: every primary source, in order, then
    /// every backup source, in order. No deduplication.
    pub fn sources(&self) -> Vec<Source> {
        self.sources
            .primary
            .iter()
            .map(|url| Source::new(url.clone(), Tier::Primary))
            .chain(
                self.sources
                    .backup
                    .iter()
                    .map(|url| Source::new(url.clone(), Tier::Backup)),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Encoding;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sources.primary.len(), 2);
        assert_eq!(config.sources.backup.len(), 2);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.retry_delay_ms, 2000);
        assert_eq!(config.output.dir, PathBuf::from("public"));
        assert_eq!(config.output.digest, "epg.sha256");
        assert!(config.git.enabled);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/epg_sync_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.fetch.max_retries, 3);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.xml, "epg.xml");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[fetch]\nmax_retries = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.retry_delay_ms, 2000); // default
        assert_eq!(config.sources.primary.len(), 2); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
[sources]
primary = ["https://mirror-a.example.com/guide.xml"]
backup = ["https://mirror-b.example.com/guide.xml.gz"]

[fetch]
max_retries = 1
retry_delay_ms = 100
timeout_secs = 5

[output]
dir = "out"
xml = "guide.xml"
json = "guide.json"
digest = "guide.sha256"

[git]
enabled = false
dir = "repo"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.sources.primary,
            vec!["https://mirror-a.example.com/guide.xml"]
        );
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.output.xml_path(), PathBuf::from("out/guide.xml"));
        assert!(!config.git.enabled);
        assert_eq!(config.git.dir, PathBuf::from("repo"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_source_scheme_rejected() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_scheme");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[sources]\nprimary = [\"file:///etc/passwd\"]\nbackup = []\n",
        )
        .unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::InvalidSource { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_sources_rejected() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_nosources");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[sources]\nprimary = []\nbackup = []\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::NoSources)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sources_ranked_primary_before_backup() {
        let config = Config::default();
        let sources = config.sources();
        assert_eq!(sources.len(), 4);
        assert_eq!(sources[0].tier, Tier::Primary);
        assert_eq!(sources[1].encoding, Encoding::Gzip);
        assert_eq!(sources[2].tier, Tier::Backup);
        assert!(sources[2].url.contains("112114"));
    }

    #[test]
    fn test_duplicate_sources_preserved() {
        let dir = std::env::temp_dir().join("epg_sync_config_test_dup");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[sources]\nprimary = [\"https://a.example.com/x.xml\", \"https://a.example.com/x.xml\"]\nbackup = []\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources().len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
