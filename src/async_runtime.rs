//! Shared async runtime
//!
//! The HTTP server runs on this runtime. The action worker stays on its own
//! OS thread and only borrows the channel types from tokio.

use anyhow::Context;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RT: OnceLock<Runtime> = OnceLock::new();

/// Initialize the Tokio runtime (called from main)
pub fn init() -> anyhow::Result<()> {
    if TOKIO_RT.get().is_some() {
        return Ok(());
    }
    log::info!("Initializing shared tokio runtime");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("remote-http")
        .build()
        .context("Failed to create Tokio runtime")?;
    // A concurrent init may have won; its runtime is as good as ours
    let _ = TOKIO_RT.set(rt);
    Ok(())
}

/// Get the runtime
pub fn runtime() -> anyhow::Result<&'static Runtime> {
    TOKIO_RT
        .get()
        .context("Tokio runtime not initialized")
}
