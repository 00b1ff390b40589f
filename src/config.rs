use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    Default,
}

#[derive(Debug, Clone)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            csrf_token: None,
            session_cookie: None,
            timeout_secs: 10,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// `GRIMOIRE_*` environment variables win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("GRIMOIRE_SERVER") {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
        if let Ok(token) = env::var("GRIMOIRE_CSRF_TOKEN") {
            if !token.is_empty() {
                self.csrf_token = Some(token);
            }
        }
        if let Ok(cookie) = env::var("GRIMOIRE_COOKIE") {
            if !cookie.is_empty() {
                self.session_cookie = Some(cookie);
            }
        }
        if let Ok(path) = env::var("GRIMOIRE_LOG_FILE") {
            if !path.is_empty() {
                self.log_file = Some(PathBuf::from(path));
            }
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("grimoire.log")),
        }
    }
}

pub fn locate_config(explicit: Option<&Path>) -> Result<ConfigLocation> {
    if let Some(path) = explicit {
        return Ok(ConfigLocation {
            path: path.to_path_buf(),
            source: ConfigSource::Explicit,
        });
    }
    Ok(ConfigLocation {
        path: project_dirs()?.config_dir().join("config.yml"),
        source: ConfigSource::Default,
    })
}

pub fn load_config(location: &ConfigLocation) -> Result<Config> {
    if !location.path.exists() {
        if location.source == ConfigSource::Explicit {
            anyhow::bail!("config file not found: {}", location.path.display());
        }
        return Ok(Config::default());
    }
    let data = fs::read_to_string(&location.path)
        .with_context(|| format!("reading {:?}", location.path))?;
    let config: Config = serde_yaml::from_str(&data).context("parsing config file")?;
    Ok(config)
}

/// Writes the default config unless a file already exists.
pub fn init_config(location: &ConfigLocation) -> Result<bool> {
    if location.path.exists() {
        return Ok(false);
    }
    save_config(location, &Config::default())?;
    Ok(true)
}

pub fn save_config(location: &ConfigLocation, config: &Config) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    Ok(())
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "grimoire").context("locating config directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "server_url: http://journal.local\ntimeout_secs: 3\n").unwrap();
        let location = ConfigLocation {
            path,
            source: ConfigSource::Explicit,
        };
        let config = load_config(&location).unwrap();
        assert_eq!(config.server_url, "http://journal.local");
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.log_level, "info");
        assert!(config.csrf_token.is_none());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let location = ConfigLocation {
            path: dir.path().join("nope.yml"),
            source: ConfigSource::Explicit,
        };
        assert!(load_config(&location).is_err());
    }

    #[test]
    fn init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let location = ConfigLocation {
            path: dir.path().join("nested").join("config.yml"),
            source: ConfigSource::Explicit,
        };
        assert!(init_config(&location).unwrap());
        assert!(!init_config(&location).unwrap());
        assert_eq!(load_config(&location).unwrap(), Config::default());
    }
}
