use crate::error::SlotError;
use crate::persistence::SlotPersistence;
use crate::schedule::{self, ScheduleView};
use crate::types::{seed_pool, Holder, Slot, SlotStatus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

/// Authoritative owner of the slot pool.
///
/// Every mutation runs under one lock: the state change, the durable
/// mirror and the schedule publish cannot interleave with another
/// mutation. Readers get consistent clones of the pool.
#[derive(Debug, Clone)]
pub struct SlotStore<P: SlotPersistence> {
    slots: Arc<Mutex<Vec<Slot>>>,
    persistence: P,
    sender: Sender<ScheduleView>,
}

impl<P: SlotPersistence> SlotStore<P> {
    /// Build the store from persisted state, falling back to the seed pool
    /// when nothing was saved yet or loading fails.
    pub fn open(persistence: P) -> Self {
        let slots = match persistence.load() {
            Ok(Some(slots)) => {
                info!("restored {} slots from persistence", slots.len());
                slots
            }
            Ok(None) => {
                info!("no persisted state, seeding the default pool");
                seed_pool()
            }
            Err(err) => {
                error!(%err, "failed to load persisted slots, seeding the default pool");
                seed_pool()
            }
        };

        if let Err(anomaly) = verify_pool(&slots) {
            error!(%anomaly, "loaded state violates pool invariants, continuing with it as loaded");
        }

        let (sender, _) = watch::channel(schedule::project(&slots));
        Self {
            slots: Arc::new(Mutex::new(slots)),
            persistence,
            sender,
        }
    }

    /// All slots, in pool order.
    pub fn snapshot(&self) -> Vec<Slot> {
        self.slots.lock().unwrap().clone()
    }

    /// Available slots, in pool order.
    pub fn available(&self) -> Vec<Slot> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|slot| slot.status == SlotStatus::Available)
            .cloned()
            .collect()
    }

    /// The current schedule projection.
    pub fn schedule(&self) -> ScheduleView {
        self.sender.borrow().clone()
    }

    /// Stream of schedule projections, starting with the current one and
    /// yielding a new value after every mutation.
    pub fn schedule_stream(&self) -> WatchStream<ScheduleView> {
        WatchStream::new(self.sender.subscribe())
    }

    /// Bind an available slot to `holder`. The caller must already be
    /// authorized; the store itself never checks roles.
    pub fn claim(&self, id: u32, holder: Holder) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().unwrap();

        // The id is resolved first: an unknown slot is NotFound no matter
        // what the caller currently holds.
        let index = slots
            .iter()
            .position(|slot| slot.id == id)
            .ok_or_else(|| SlotError::NotFound(format!("slot {id} does not exist")))?;
        if slots[index].status != SlotStatus::Available {
            return Err(SlotError::InvalidState(format!("slot {id} is not available")));
        }

        if let Some(held) = slots.iter().find(|slot| {
            slot.status == SlotStatus::Claimed
                && slot.holder.as_ref().is_some_and(|h| h.id == holder.id)
        }) {
            return Err(SlotError::InvalidState(format!(
                "{} already holds slot {}",
                holder.display, held.id
            )));
        }

        let slot = &mut slots[index];
        slot.status = SlotStatus::Claimed;
        slot.holder = Some(holder);
        let updated = slot.clone();

        self.mirror(slots.as_slice())?;
        Ok(updated)
    }

    /// Release the single slot currently claimed by `holder_id`. Duplicate
    /// active claims can only come from corrupted persisted state; the
    /// first match by pool order wins and the anomaly is logged.
    pub fn unclaim(&self, holder_id: &str) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().unwrap();

        let matches: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.status == SlotStatus::Claimed
                    && slot.holder.as_ref().is_some_and(|h| h.id == holder_id)
            })
            .map(|(index, _)| index)
            .collect();

        if matches.len() > 1 {
            let anomaly = SlotError::IntegrityAnomaly(format!(
                "holder {holder_id} has {} active claims, releasing the first by pool order",
                matches.len()
            ));
            error!(%anomaly, "duplicate active claims in the pool");
        }

        let index = *matches
            .first()
            .ok_or_else(|| SlotError::NotFound(format!("no claimed slot held by {holder_id}")))?;
        let slot = &mut slots[index];
        slot.status = SlotStatus::Available;
        slot.holder = None;
        let updated = slot.clone();

        self.mirror(slots.as_slice())?;
        Ok(updated)
    }

    /// Transition a claimed slot to its terminal completed state. Used by
    /// the completion scanner only. A failed durable write is logged here
    /// rather than returned: the transition itself stands and the caller's
    /// announcement must still fire.
    pub fn mark_completed(&self, id: u32) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().unwrap();

        let slot = slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .ok_or_else(|| SlotError::NotFound(format!("slot {id} does not exist")))?;
        if slot.status != SlotStatus::Claimed {
            return Err(SlotError::InvalidState(format!("slot {id} is not claimed")));
        }

        slot.status = SlotStatus::Completed;
        let updated = slot.clone();

        if let Err(err) = self.mirror(slots.as_slice()) {
            warn!(%err, "completion applied in memory but not persisted");
        }
        Ok(updated)
    }

    /// Publish the new projection and mirror the pool to storage. Runs
    /// while the pool lock is held so saves cannot reorder. The in-memory
    /// state stays authoritative when the durable write fails; the next
    /// successful mutation re-saves everything.
    fn mirror(&self, slots: &[Slot]) -> Result<(), SlotError> {
        self.sender.send_replace(schedule::project(slots));
        self.persistence.save(slots)
    }
}

/// Invariant check for loaded state: unique ids, holder present iff the
/// slot is not available, at most one active claim per holder.
fn verify_pool(slots: &[Slot]) -> Result<(), SlotError> {
    let mut ids = HashSet::new();
    let mut active_holders = HashSet::new();

    for slot in slots {
        if !ids.insert(slot.id) {
            return Err(SlotError::IntegrityAnomaly(format!(
                "duplicate slot id {}",
                slot.id
            )));
        }
        match slot.status {
            SlotStatus::Available if slot.holder.is_some() => {
                return Err(SlotError::IntegrityAnomaly(format!(
                    "available slot {} has a holder",
                    slot.id
                )));
            }
            SlotStatus::Claimed | SlotStatus::Completed if slot.holder.is_none() => {
                return Err(SlotError::IntegrityAnomaly(format!(
                    "slot {} is {:?} but has no holder",
                    slot.id, slot.status
                )));
            }
            _ => {}
        }
        if slot.status == SlotStatus::Claimed {
            if let Some(holder) = &slot.holder {
                if !active_holders.insert(holder.id.clone()) {
                    return Err(SlotError::IntegrityAnomaly(format!(
                        "holder {} has multiple active claims",
                        holder.id
                    )));
                }
            }
        }
    }
    Ok(())
}
