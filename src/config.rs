use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PLACEHOLDER_PHOTO: &str =
    "https://www.stephanemillet.fr/public/img/big/Cam2jpg_620fc4006a745.jpg";

/// Client settings: file, then environment, then command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Realtime Database root, e.g. `https://my-app.firebaseio.com`.
    /// Without it the client runs against an in-memory store.
    pub database_url: Option<String>,
    /// Database secret or ID token appended as `?auth=`
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    /// JSON export used to seed the in-memory store
    pub seed_file: Option<PathBuf>,
    /// Photo assigned to listings created without one
    pub placeholder_photo: String,
    /// Attempts at a conditional read-modify-write before giving up
    pub write_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            auth_token: None,
            timeout_secs: 30,
            seed_file: None,
            placeholder_photo: DEFAULT_PLACEHOLDER_PHOTO.to_string(),
            write_retries: 3,
        }
    }
}

impl ClientConfig {
    /// Read a TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Invalid TOML in config file")
    }

    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    fn merge_with_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var("LOGEMENT_DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(token) = var("LOGEMENT_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Some(timeout) = var("LOGEMENT_TIMEOUT_SECS") {
            self.timeout_secs = timeout
                .parse()
                .context("Invalid timeout in LOGEMENT_TIMEOUT_SECS")?;
        }
        if let Some(seed) = var("LOGEMENT_SEED_FILE") {
            self.seed_file = Some(PathBuf::from(seed));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.write_retries == 0 {
            bail!("write_retries must be at least 1");
        }
        if let Some(url) = &self.database_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                bail!("database_url must be an http(s) URL, got {url}");
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.write_retries, 3);
        assert_eq!(config.placeholder_photo, DEFAULT_PLACEHOLDER_PHOTO);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logement.toml");
        std::fs::write(&path, "database_url = \"https://demo.firebaseio.com\"\ntimeout_secs = 5\n").unwrap();

        let config = ClientConfig::load_from_file(&path).unwrap();
        assert_eq!(config.database_url.as_deref(), Some("https://demo.firebaseio.com"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.write_retries, 3);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("LOGEMENT_DATABASE_URL", "http://localhost:9000"),
            ("LOGEMENT_TIMEOUT_SECS", "12"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig {
            database_url: Some("https://old.firebaseio.com".into()),
            ..Default::default()
        };
        config
            .merge_with_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ClientConfig::default();
        assert!(config
            .merge_with_vars(|key| (key == "LOGEMENT_TIMEOUT_SECS").then(|| "soon".to_string()))
            .is_err());

        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let config = ClientConfig {
            database_url: Some("ftp://x".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
