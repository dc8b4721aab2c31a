mod async_runtime;
mod automation;
mod config;
mod error;
mod keys;
mod server;
mod session;
mod shortcuts;
mod worker;

use anyhow::Context;
use clap::Parser;
use config::{LogConfig, load_settings};
use session::ApplicationSession;
use shortcuts::ShortcutConfig;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Web remote that sends keyboard shortcuts to a desktop application
#[derive(Debug, Parser)]
#[command(name = "shortcut-remote", version)]
struct Invocation {
    /// Settings file
    #[arg(default_value = "config.toml")]
    settings: PathBuf,

    /// Perform these actions once and exit instead of serving
    #[arg(long, num_args = 1.., value_name = "ACTION")]
    send: Option<Vec<String>>,
}

/// Relative shortcut paths are taken from the settings file's directory
fn resolve_beside(settings: &Path, path: &Path) -> PathBuf {
    match settings.parent() {
        Some(dir) if path.is_relative() && !dir.as_os_str().is_empty() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let invocation = Invocation::parse();
    let settings = load_settings(&invocation.settings)?;

    init_logging(&settings.log)?;

    log::info!("===========================================");
    log::info!("Starting shortcut remote for '{}'...", settings.app.name);
    log::info!("Settings: {}", invocation.settings.display());
    log::info!("===========================================");

    let shortcuts_path = resolve_beside(&invocation.settings, &settings.app.shortcuts);
    let shortcuts = ShortcutConfig::load(&shortcuts_path)?;
    log::debug!(
        "Shortcut file covers: {}",
        shortcuts.app_names().collect::<Vec<_>>().join(", ")
    );
    let options = settings.app.session_options()?;
    let automation = automation::platform();

    let mut session =
        ApplicationSession::new(&settings.app.name, &shortcuts, automation.clone(), options)?;
    log::info!(
        "Loaded {} action(s) from {}",
        session.actions().len(),
        shortcuts_path.display()
    );

    if let Some(actions) = invocation.send {
        return send_once(&mut session, &actions);
    }

    let app_name = session.app_name().to_string();
    let actions = session.actions();
    let fullscreen = session.fullscreen_flag();
    let (queue, worker) = worker::ActionWorker::spawn(session, settings.app.auto_connect)?;

    let state = Arc::new(server::AppState {
        queue,
        automation,
        fullscreen,
        app_name,
        actions,
    });

    async_runtime::init()?;
    let result = async_runtime::runtime()?.block_on(server::serve(&settings.server.bind_addr(), state));

    // The server dropped the last queue handle on its way out
    worker.join();
    result
}

/// Connect, perform each action in order, and stop at the first failure
fn send_once(session: &mut ApplicationSession, actions: &[String]) -> anyhow::Result<()> {
    session
        .connect()
        .with_context(|| format!("Failed to connect to '{}'", session.app_name()))?;
    for action in actions {
        session
            .perform(action)
            .with_context(|| format!("Action '{}' failed", action))?;
    }
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    use std::fs::OpenOptions;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info); // Default to Info level if RUST_LOG not set
    builder.parse_default_env();

    if let Some(path) = &config.file {
        let target = Box::new(
            OpenOptions::new()
                .create(true)
                .append(true) // Append across multiple runs
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    Ok(())
}
