//! Server settings: defaults, optional TOML file, then environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

/// Settings file read when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "voice-canvas.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub figma_access_token: String,
    pub figma_file_key: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub host: String,
    pub port: u16,
    pub ws_port: u16,
    pub translation_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            figma_access_token: String::new(),
            figma_file_key: String::new(),
            gemini_api_key: String::new(),
            gemini_model: voice_canvas_gateway::gemini::DEFAULT_MODEL.into(),
            host: "0.0.0.0".into(),
            port: 3000,
            ws_port: 8080,
            translation_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Parse a settings file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML for these settings.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists.
    ///
    /// # Errors
    /// Returns error if an explicitly given file cannot be read, or any file
    /// cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        match fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    /// Override fields from environment variables.
    ///
    /// Numbers that do not parse keep their current value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FIGMA_ACCESS_TOKEN") {
            self.figma_access_token = v;
        }
        if let Some(v) = lookup("FIGMA_FILE_KEY") {
            self.figma_file_key = v;
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.gemini_api_key = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL").filter(|v| !v.is_empty()) {
            self.gemini_model = v;
        }
        if let Some(v) = lookup("HOST").filter(|v| !v.is_empty()) {
            self.host = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(port) = lookup("WS_PORT").and_then(|v| v.parse().ok()) {
            self.ws_port = port;
        }
        if let Some(secs) = lookup("TRANSLATION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.translation_timeout_secs = secs;
        }
    }

    /// Check that every credential is present.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] naming each empty credential.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("FIGMA_ACCESS_TOKEN", &self.figma_access_token),
            ("FIGMA_FILE_KEY", &self.figma_file_key),
            ("GEMINI_API_KEY", &self.gemini_api_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    #[must_use]
    pub const fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.translation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.http_addr(), "0.0.0.0:3000");
        assert_eq!(settings.ws_addr(), "0.0.0.0:8080");
        assert_eq!(settings.gemini_model, "gemini-2.0-flash-exp");
        assert_eq!(settings.translation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            ("FIGMA_ACCESS_TOKEN", "figd_token"),
            ("PORT", "4000"),
            ("WS_PORT", "not-a-port"),
            ("TRANSLATION_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(settings.figma_access_token, "figd_token");
        assert_eq!(settings.port, 4000);
        assert_eq!(settings.ws_port, 8080);
        assert_eq!(settings.translation_timeout_secs, 5);
    }

    #[test]
    fn test_toml_then_env() {
        let mut settings = Settings::from_toml(
            r#"
            figma_file_key = "abc123"
            ws_port = 9000
            host = "127.0.0.1"
            "#,
        )
        .unwrap();
        assert_eq!(settings.ws_addr(), "127.0.0.1:9000");
        assert_eq!(settings.port, 3000);

        settings.apply_env(env(&[("FIGMA_FILE_KEY", "xyz789")]));
        assert_eq!(settings.figma_file_key, "xyz789");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Settings::from_toml("port = \"three thousand\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/voice-canvas.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        settings.figma_file_key = "abc".into();
        assert_eq!(
            settings.validate().unwrap_err().to_string(),
            "Missing required configuration: FIGMA_ACCESS_TOKEN, GEMINI_API_KEY"
        );

        settings.apply_env(env(&[("FIGMA_ACCESS_TOKEN", "t"), ("GEMINI_API_KEY", "k")]));
        assert!(settings.validate().is_ok());
    }
}
