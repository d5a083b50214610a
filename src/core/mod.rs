//! Core module - broadcast scheduler and its control handle

mod handle;
mod scheduler;
mod wake;

pub use handle::SchedulerHandle;
pub use scheduler::Scheduler;
pub use wake::{WakeReason, WakeSignal};

use serde::{Deserialize, Serialize};

/// Which source the scheduler is broadcasting from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Polling the upstream feed
    Live,
    /// Replaying the simulation queue
    Simulating,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Simulating => "simulating",
        }
    }
}
