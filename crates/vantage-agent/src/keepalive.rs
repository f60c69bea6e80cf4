//! Heartbeat timer for the connected state.
//!
//! The timer is armed on transport open and disarmed the moment the
//! connection leaves the connected state. While disarmed, [`Keepalive::tick`]
//! pends forever, so it can sit in the worker's `select!` without a guard.
//!
//! This is a liveness signal *to the server* only; the worker does not watch
//! for the corresponding acknowledgments.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Interval that only ticks while armed.
pub(crate) struct Keepalive {
    period: Duration,
    timer: Option<Interval>,
}

impl Keepalive {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            timer: None,
        }
    }

    /// Start ticking. The first tick fires one full period from now.
    pub(crate) fn arm(&mut self) {
        let mut timer = time::interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    /// Stop ticking.
    pub(crate) fn disarm(&mut self) {
        self.timer = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Complete at the next tick, or never while disarmed.
    pub(crate) async fn tick(&mut self) {
        match &mut self.timer {
            Some(timer) => {
                let _ = timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_ticks_after_one_period() {
        let mut keepalive = Keepalive::new(Duration::from_secs(30));
        keepalive.arm();

        let started = Instant::now();
        keepalive.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_ticks_repeatedly() {
        let mut keepalive = Keepalive::new(Duration::from_secs(10));
        keepalive.arm();

        let started = Instant::now();
        keepalive.tick().await;
        keepalive.tick().await;
        keepalive.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_ticks() {
        let mut keepalive = Keepalive::new(Duration::from_millis(10));
        let outcome =
            time::timeout(Duration::from_secs(3600), keepalive.tick()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_restarts_the_period() {
        let mut keepalive = Keepalive::new(Duration::from_secs(30));
        keepalive.arm();
        time::sleep(Duration::from_secs(29)).await;

        // Re-arming (a fresh connection) pushes the next tick a full period out.
        keepalive.arm();
        let started = Instant::now();
        keepalive.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[test]
    fn arm_state_tracking() {
        let mut keepalive = Keepalive::new(Duration::from_secs(1));
        assert!(!keepalive.is_armed());
        // arm() needs a runtime for interval_at; covered in async tests.
        keepalive.disarm();
        assert!(!keepalive.is_armed());
    }

    #[tokio::test]
    async fn disarm_after_arm() {
        let mut keepalive = Keepalive::new(Duration::from_secs(1));
        keepalive.arm();
        assert!(keepalive.is_armed());
        keepalive.disarm();
        assert!(!keepalive.is_armed());
    }
}
