//! Progress timer and the other deadline timers the core arms (spec §4.3
//! "Progress timer", §4.5 stage 5, §4.6 commit timer).
//!
//! Per the design notes (spec §9 "Event dispatch"), every timer fire is
//! just another [`Event`](crate::event::Event) pushed onto the single
//! inbound channel, not a separate `select!` branch. A timer is "rearmed"
//! by bumping a generation counter and spawning a fresh sleep; the stale
//! sleep notices its generation is outdated when it wakes and sends
//! nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::event::{Event, TickKind};

#[derive(Clone)]
pub struct DeadlineTimer {
    generation: Arc<AtomicU64>,
    kind: TickKind,
    sender: UnboundedSender<Event>,
}

impl DeadlineTimer {
    pub fn new(kind: TickKind, sender: UnboundedSender<Event>) -> Self {
        DeadlineTimer {
            generation: Arc::new(AtomicU64::new(0)),
            kind,
            sender,
        }
    }

    /// Arms (or rearms, superseding any prior deadline) this timer to fire
    /// `after` from now.
    pub fn arm(&self, after: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation_cell = self.generation.clone();
        let kind = self.kind;
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if generation_cell.load(Ordering::SeqCst) == generation {
                let _ = sender.send(Event::Tick(kind));
            }
        });
    }

    /// Disarms the timer: any in-flight sleep will see a stale generation
    /// and fire nothing.
    pub fn disarm(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rearming_supersedes_the_earlier_deadline() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let timer = DeadlineTimer::new(TickKind::Progress, tx);
        timer.arm(Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(50)).await;
        timer.arm(Duration::from_millis(100)); // rearm before the first fires
        tokio::time::advance(Duration::from_millis(150)).await;
        let mut fires = 0;
        while rx.try_recv().is_ok() {
            fires += 1;
        }
        assert_eq!(fires, 1, "only the latest arm should fire");
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_suppresses_the_pending_fire() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let timer = DeadlineTimer::new(TickKind::Commit, tx);
        timer.arm(Duration::from_millis(50));
        timer.disarm();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
