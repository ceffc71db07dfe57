use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_VERSION: u32 = 1;

const DEFAULT_CHART_URL: &str = "http://127.0.0.1:3000/chart/current";
const DEFAULT_DOCUMENTS_PATH: &str = "documents";
const DEFAULT_ARCHIVE_NAME: &str = "songs.redb";
const DEFAULT_PORT: u16 = 3080;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartWatchConfig {
    pub version: u32,
    pub chart_url: String,
    pub documents_path: String,
    /// Empty means `<documents_path>/songs.redb`.
    pub archive_path: String,
    pub port: u16,
    pub cleanup_on_refresh: bool,
}

impl Default for ChartWatchConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            chart_url: DEFAULT_CHART_URL.to_string(),
            documents_path: DEFAULT_DOCUMENTS_PATH.to_string(),
            archive_path: String::new(),
            port: DEFAULT_PORT,
            cleanup_on_refresh: false,
        }
    }
}

impl ChartWatchConfig {
    pub fn documents_dir(&self, config_path: &Path) -> PathBuf {
        resolve_path(config_path, self.documents_path.trim())
    }

    pub fn archive_file(&self, config_path: &Path) -> PathBuf {
        let value = self.archive_path.trim();
        if value.is_empty() {
            self.documents_dir(config_path).join(DEFAULT_ARCHIVE_NAME)
        } else {
            resolve_path(config_path, value)
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("CHARTWATCH_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ChartWatchConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ChartWatchConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.chart_url.trim().is_empty() {
            config.chart_url = DEFAULT_CHART_URL.to_string();
        }
        if config.documents_path.trim().is_empty() {
            config.documents_path = DEFAULT_DOCUMENTS_PATH.to_string();
        }
        if config.port == 0 {
            config.port = DEFAULT_PORT;
        }
        return Ok((config, false));
    }

    let config = ChartWatchConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

fn save_config(path: &Path, config: &ChartWatchConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, ChartWatchConfig, CONFIG_VERSION};
    use std::fs;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.yaml");

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.version, CONFIG_VERSION);

        let (reloaded, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(reloaded.chart_url, config.chart_url);
    }

    #[test]
    fn fills_blank_fields_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "chart_url: \"\"\ndocuments_path: media\nport: 0\n").unwrap();

        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.chart_url, ChartWatchConfig::default().chart_url);
        assert_eq!(config.port, ChartWatchConfig::default().port);
        assert_eq!(config.documents_dir(&path), dir.path().join("media"));
        assert_eq!(
            config.archive_file(&path),
            dir.path().join("media").join("songs.redb")
        );
    }

    #[test]
    fn explicit_archive_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = ChartWatchConfig {
            archive_path: "/var/lib/chartwatch/songs.redb".to_string(),
            ..ChartWatchConfig::default()
        };
        assert_eq!(
            config.archive_file(&path),
            std::path::PathBuf::from("/var/lib/chartwatch/songs.redb")
        );
    }
}
