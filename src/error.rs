//! Error taxonomy for the application session
//!
//! OS backends speak `anyhow`; everything that crosses the session boundary is
//! folded into one of these variants so callers can tell a sensible retry from
//! a fatal condition.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type used by the registry and the session.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unparseable configuration. Fatal at session construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Could not attach to or launch the target process.
    #[error("process error for '{}': {reason}", path.display())]
    Process { path: PathBuf, reason: String },

    /// No window showed up before the deadline.
    #[error("no window found for '{app}' after {:.1}s", waited.as_secs_f64())]
    WindowTimeout { app: String, waited: Duration },

    /// The action has no mapped key sequence.
    #[error("no shortcut defined for action '{0}'")]
    UnknownAction(String),

    /// Key dispatch failed even after one reconnect-and-retry.
    #[error("failed to send action '{action}': {reason}")]
    ActionDispatch { action: String, reason: String },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn process(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Error::Process {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn dispatch(action: &str, err: &anyhow::Error) -> Self {
        Error::ActionDispatch {
            action: action.to_string(),
            reason: format!("{:#}", err),
        }
    }
}
