//! Action worker
//!
//! One OS thread owns the [`ApplicationSession`] and performs submitted
//! batches strictly in order. HTTP handlers only hold an [`ActionQueue`] and
//! never wait for a result.

use anyhow::Context;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::session::{ActionOutcome, ApplicationSession};

/// Cloneable, fire-and-forget handle for submitting action batches
#[derive(Clone)]
pub struct ActionQueue {
    tx: UnboundedSender<Vec<String>>,
}

impl ActionQueue {
    /// Queue a batch; the worker performs its actions in order
    pub fn submit(&self, actions: Vec<String>) {
        if actions.is_empty() {
            return;
        }
        if self.tx.send(actions).is_err() {
            log::error!("Action worker has stopped; dropping batch");
        }
    }

    /// Queue whose batches land in the returned receiver instead of a worker
    #[cfg(test)]
    pub fn detached() -> (Self, UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

pub struct ActionWorker {
    handle: JoinHandle<()>,
}

impl ActionWorker {
    /// Move the session onto a dedicated thread
    ///
    /// With `auto_connect` the worker connects before serving the first
    /// batch. The thread exits once every [`ActionQueue`] clone is dropped.
    pub fn spawn(
        session: ApplicationSession,
        auto_connect: bool,
    ) -> anyhow::Result<(ActionQueue, ActionWorker)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name("action-worker".to_string())
            .spawn(move || run(session, auto_connect, rx))
            .context("Failed to spawn action worker thread")?;
        Ok((ActionQueue { tx }, ActionWorker { handle }))
    }

    /// Wait for the worker to drain its queue and exit
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("Action worker panicked");
        }
    }
}

fn run(mut session: ApplicationSession, auto_connect: bool, mut rx: UnboundedReceiver<Vec<String>>) {
    if auto_connect {
        match session.connect() {
            Ok(()) => log::info!("Connected to '{}' at startup", session.app_name()),
            Err(e) => log::error!("❌ Could not connect to '{}': {}", session.app_name(), e),
        }
    }

    while let Some(batch) = rx.blocking_recv() {
        for action in &batch {
            match session.perform(action) {
                Ok(ActionOutcome::Recovered) => {
                    log::info!("'{}' needed a window refresh", action);
                }
                Ok(_) => {}
                Err(e) => log::error!("❌ Action '{}' failed: {}", action, e),
            }
        }
    }

    log::info!("Action worker for '{}' stopped", session.app_name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::mock::MockAutomation;
    use crate::session::SessionOptions;
    use crate::shortcuts::ShortcutConfig;
    use std::sync::Arc;
    use std::time::Duration;

    const CONFIG: &str = r#"{
        "Player": {
            "app_path": "/Applications/Player.app",
            "shortcuts": { "play": "{SPACE}", "fullscreen": "f", "back": "{LEFT}" }
        }
    }"#;

    fn session(mock: &Arc<MockAutomation>) -> ApplicationSession {
        let config = ShortcutConfig::from_json(CONFIG).unwrap();
        let options = SessionOptions {
            wait_time: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            restore_settle: Duration::ZERO,
            window_title: None,
        };
        ApplicationSession::new("Player", &config, mock.clone(), options).unwrap()
    }

    #[test]
    fn test_batches_run_in_submission_order() {
        let mock = Arc::new(MockAutomation::new());
        let (queue, worker) = ActionWorker::spawn(session(&mock), false).unwrap();

        queue.submit(vec!["play".to_string(), "back".to_string()]);
        queue.submit(vec!["fullscreen".to_string()]);
        drop(queue);
        worker.join();

        assert_eq!(mock.sent_keys(), vec!["{SPACE}", "{LEFT}", "f"]);
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let mock = Arc::new(MockAutomation::new());
        mock.fail_next_sends(2);
        let (queue, worker) = ActionWorker::spawn(session(&mock), false).unwrap();

        queue.submit(vec!["nope".to_string(), "play".to_string(), "back".to_string()]);
        drop(queue);
        worker.join();

        // "play" fails twice and gives up; "back" still goes out
        assert_eq!(mock.sent_keys(), vec!["{SPACE}", "{SPACE}", "{LEFT}"]);
    }

    #[test]
    fn test_auto_connect_attaches_before_first_batch() {
        let mock = Arc::new(MockAutomation::new());
        let (queue, worker) = ActionWorker::spawn(session(&mock), true).unwrap();
        drop(queue);
        worker.join();

        assert_eq!(mock.count("attach"), 1);
        assert!(mock.sent_keys().is_empty());
    }

    #[test]
    fn test_empty_batch_is_not_queued() {
        let (queue, mut rx) = ActionQueue::detached();
        queue.submit(Vec::new());
        queue.submit(vec!["play".to_string()]);
        drop(queue);

        assert_eq!(rx.blocking_recv(), Some(vec!["play".to_string()]));
        assert_eq!(rx.blocking_recv(), None);
    }
}
