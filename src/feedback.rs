use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::Command;

/// Visual state of a command control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Default,
    Success,
    Error,
}

impl Variant {
    pub fn from_outcome(accepted: bool) -> Self {
        if accepted {
            Variant::Success
        } else {
            Variant::Error
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    variants: Mutex<HashMap<Command, Variant>>,
    version: AtomicU64,
}

/// Feedback variants of all controls, written by the UI and by revert timers.
///
/// Every [`Feedback::show`] schedules its own one-shot revert to
/// [`Variant::Default`]. Earlier reverts are never cancelled, so the last
/// timer to fire decides what stays on screen.
#[derive(Debug, Clone)]
pub struct Feedback {
    shared: Arc<Shared>,
    revert_after: Duration,
}

impl Feedback {
    pub fn new(revert_after: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            revert_after,
        }
    }

    pub fn variant(&self, command: Command) -> Variant {
        self.shared
            .variants
            .lock()
            .ok()
            .and_then(|variants| variants.get(&command).copied())
            .unwrap_or_default()
    }

    /// Bumped on every change; lets the UI tell whether it must redraw.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::SeqCst)
    }

    /// Shows `variant` on `command` now and schedules the revert.
    pub fn show(&self, command: Command, variant: Variant) -> JoinHandle<()> {
        self.set(command, variant);
        self.schedule_revert(command)
    }

    fn schedule_revert(&self, command: Command) -> JoinHandle<()> {
        let feedback = self.clone();
        let delay = self.revert_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Reverting {} feedback", command.label());
            feedback.set(command, Variant::Default);
        })
    }

    fn set(&self, command: Command, variant: Variant) {
        if let Ok(mut variants) = self.shared.variants.lock() {
            variants.insert(command, variant);
        }
        self.shared.version.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests;
