use crate::persistence::SlotPersistence;
use crate::slot_store::SlotStore;
use crate::types::{Slot, SlotStatus};
use chrono::{Local, NaiveDateTime, Timelike};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodic check that completes claimed slots whose scheduled minute has
/// arrived and hands one event per transition to the announcer.
///
/// Keeps no state of its own between ticks beyond the shared store.
pub struct CompletionScanner<P: SlotPersistence> {
    store: SlotStore<P>,
    completions: mpsc::Sender<Slot>,
    interval: Duration,
}

impl<P: SlotPersistence> CompletionScanner<P> {
    pub fn new(store: SlotStore<P>, completions: mpsc::Sender<Slot>, interval: Duration) -> Self {
        Self {
            store,
            completions,
            interval,
        }
    }

    /// Run forever, gated on the readiness signal: the first tick only
    /// happens once the announcer can actually deliver notifications. One
    /// failed tick never stops the next one.
    pub fn spawn(self, mut ready: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if ready.wait_for(|ready| *ready).await.is_err() {
                warn!("readiness channel closed before the scanner started");
                return;
            }
            info!("completion scanner started, interval {:?}", self.interval);

            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                for slot in self.tick(current_minute()) {
                    if self.completions.send(slot).await.is_err() {
                        warn!("completion channel closed, stopping the scanner");
                        return;
                    }
                }
            }
        })
    }

    /// One scan: complete every claimed slot scheduled for exactly `now`.
    /// The match is equality on the minute, so a minute that passes while
    /// no tick runs is never completed retroactively.
    pub fn tick(&self, now: NaiveDateTime) -> Vec<Slot> {
        let due: Vec<u32> = self
            .store
            .snapshot()
            .iter()
            .filter(|slot| slot.status == SlotStatus::Claimed && slot.scheduled_at == now)
            .map(|slot| slot.id)
            .collect();

        let mut completed = Vec::new();
        for id in due {
            // The slot may have been unclaimed between the snapshot and
            // this call; the store rejects the race and nothing fires.
            match self.store.mark_completed(id) {
                Ok(slot) => completed.push(slot),
                Err(err) => warn!(%err, "slot {id} matured but was not completed"),
            }
        }
        completed
    }
}

/// Wall-clock time truncated to the minute, in the pool's implicit local
/// time zone.
pub fn current_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
