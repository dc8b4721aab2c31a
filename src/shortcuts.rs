//! Shortcut registry
//!
//! Maps an application name to its executable and the key sequence behind
//! each named action. Loaded once at start-up; callers own their copy.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::keys::KeySequence;

/// One managed application
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppShortcuts {
    pub app_path: PathBuf,
    #[serde(default)]
    pub shortcuts: BTreeMap<String, String>,
}

/// All configured applications, keyed by name
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ShortcutConfig {
    apps: BTreeMap<String, AppShortcuts>,
}

impl ShortcutConfig {
    /// Load a shortcut file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_json(&contents)
        }
        .map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        log::info!(
            "Loaded shortcuts for {} app(s) from {}",
            config.apps.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: ShortcutConfig =
            serde_json::from_str(contents).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ShortcutConfig =
            toml::from_str(contents).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Every key sequence must parse
    fn validate(&self) -> Result<()> {
        for (app, entry) in &self.apps {
            for (action, seq) in &entry.shortcuts {
                KeySequence::parse(seq).map_err(|e| {
                    Error::config(format!(
                        "bad key sequence for {}.{} ({:?}): {}",
                        app, action, seq, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn app(&self, name: &str) -> Result<&AppShortcuts> {
        self.apps
            .get(name)
            .ok_or_else(|| Error::config(format!("No configuration found for app '{}'", name)))
    }

    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }
}
