//! Injected timing capability
//!
//! The executor never calls `tokio::time` directly; it asks a `Scheduler`
//! for one-shot and recurring events with explicit cancellation handles.

use crate::state_machine::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cancels its timer when dropped
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub trait Scheduler: Send + Sync {
    /// Deliver `event` once after `delay`
    fn after(&self, delay: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle;

    /// Deliver `event` every `period`, first at `now + period`
    fn every(&self, period: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle;
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn after(&self, delay: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle {
        (**self).after(delay, events, event)
    }

    fn every(&self, period: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle {
        (**self).every(period, events, event)
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Scheduler backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = events.send(event).await;
                }
            }
        });
        TimerHandle::new(token)
    }

    fn every(&self, period: Duration, events: mpsc::Sender<Event>, event: Event) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if events.send(event.clone()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        TimerHandle::new(token)
    }
}
