//! Wake signal that lets the control plane cut the live-mode wait short

use std::time::Duration;
use tokio::sync::Notify;

/// Why a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Signalled,
    TimedOut,
}

/// Single-permit signal. A wake raised while nobody waits is kept until
/// the next wait observes it, then cleared.
#[derive(Debug, Default)]
pub struct WakeSignal {
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }

    pub async fn wait_timeout(&self, timeout: Duration) -> WakeReason {
        match tokio::time::timeout(timeout, self.notify.notified()).await {
            Ok(()) => WakeReason::Signalled,
            Err(_) => WakeReason::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_times_out_without_wake() {
        let signal = WakeSignal::new();
        assert_eq!(signal.wait_timeout(Duration::from_millis(20)).await, WakeReason::TimedOut);
    }

    #[tokio::test]
    async fn test_wake_preempts_wait() {
        let signal = Arc::new(WakeSignal::new());
        let waker = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            waker.wake();
        });

        let started = Instant::now();
        assert_eq!(signal.wait_timeout(Duration::from_secs(60)).await, WakeReason::Signalled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_early_wake_is_kept_once() {
        let signal = WakeSignal::new();
        signal.wake();
        signal.wake();

        assert_eq!(signal.wait_timeout(Duration::from_secs(5)).await, WakeReason::Signalled);
        // Observed and cleared: the next wait runs to its timeout
        assert_eq!(signal.wait_timeout(Duration::from_millis(20)).await, WakeReason::TimedOut);
    }
}
