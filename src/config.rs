use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::SessionOptions;

/// Top-level settings loaded from config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Key into the shortcut file
    pub name: String,
    /// Path to the shortcut file (.json or .toml)
    pub shortcuts: PathBuf,
    /// Optional regex the target window title must match
    pub window_title: Option<String>,
    pub wait_time_secs: f64,
    pub poll_interval_ms: u64,
    pub restore_settle_ms: u64,
    /// Connect as soon as the worker starts instead of on the first action
    pub auto_connect: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Stremio".to_string(),
            shortcuts: PathBuf::from("app_shortcuts.json"),
            window_title: None,
            wait_time_secs: 5.0,
            poll_interval_ms: 1000,
            restore_settle_ms: 1000,
            auto_connect: false,
        }
    }
}

impl AppConfig {
    /// Build session options, compiling the title pattern
    pub fn session_options(&self) -> Result<SessionOptions> {
        let window_title = self
            .window_title
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .context("Invalid window_title regex")?;

        if !self.wait_time_secs.is_finite() || self.wait_time_secs < 0.0 {
            anyhow::bail!("wait_time_secs must be a non-negative number");
        }

        Ok(SessionOptions {
            wait_time: Duration::from_secs_f64(self.wait_time_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            restore_settle: Duration::from_millis(self.restore_settle_ms),
            window_title,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Append log output to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Load and parse the settings file
///
/// A missing file is not an error: every setting has a default.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let settings: Settings = toml::from_str(&contents).context("Failed to parse TOML settings")?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = load_settings(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:5000");
        assert_eq!(settings.app.name, "Stremio");
        assert!(!settings.app.auto_connect);
        assert!(settings.log.file.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[app]
name = "Player"
window_title = "Player.*"
poll_interval_ms = 250
"#
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(settings.app.name, "Player");
        assert_eq!(settings.app.shortcuts, PathBuf::from("app_shortcuts.json"));

        let opts = settings.app.session_options().unwrap();
        assert_eq!(opts.wait_time, Duration::from_secs(5));
        assert_eq!(opts.poll_interval, Duration::from_millis(250));
        assert!(opts.window_title.unwrap().is_match("Player - movie.mkv"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let app = AppConfig {
            window_title: Some("(".to_string()),
            ..AppConfig::default()
        };
        assert!(app.session_options().is_err());

        let app = AppConfig {
            wait_time_secs: -1.0,
            ..AppConfig::default()
        };
        assert!(app.session_options().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        assert!(load_settings(file.path()).is_err());
    }
}
