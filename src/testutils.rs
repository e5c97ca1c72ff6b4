use crate::announcer::Announcer;
use crate::error::SlotError;
use crate::persistence::SlotPersistence;
use crate::schedule::ScheduleView;
use crate::types::{slot_time, Holder, Slot, SlotStatus};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub fn time(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, slot_time::PARSE_FORMAT).unwrap()
}

pub fn holder(name: &str) -> Holder {
    Holder {
        id: format!("{name}-id"),
        display: name.to_string(),
    }
}

pub fn claimed_slot(id: u32, time_str: &str, holder_name: &str) -> Slot {
    Slot {
        id,
        scheduled_at: time(time_str),
        status: SlotStatus::Claimed,
        holder: Some(holder(holder_name)),
    }
}

#[derive(Debug, Default)]
pub struct MockPersistenceInner {
    pub fail_saves: AtomicBool,
    pub fail_loads: AtomicBool,
    pub calls_to_save: AtomicU64,
    pub calls_to_load: AtomicU64,
    pub stored: Mutex<Option<Vec<Slot>>>,
}

/// In-memory persistence double with switchable failure modes and call
/// counters, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MockPersistence(pub Arc<MockPersistenceInner>);

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: Vec<Slot>) -> Self {
        let mock = Self::new();
        *mock.0.stored.lock().unwrap() = Some(slots);
        mock
    }
}

impl SlotPersistence for MockPersistence {
    fn save(&self, slots: &[Slot]) -> Result<(), SlotError> {
        self.0.calls_to_save.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_saves.load(Ordering::SeqCst) {
            return Err(SlotError::Persistence("mock save failure".to_string()));
        }
        *self.0.stored.lock().unwrap() = Some(slots.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<Slot>>, SlotError> {
        self.0.calls_to_load.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_loads.load(Ordering::SeqCst) {
            return Err(SlotError::Persistence("mock load failure".to_string()));
        }
        Ok(self.0.stored.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingAnnouncerInner {
    pub schedules: Mutex<Vec<ScheduleView>>,
    pub completions: Mutex<Vec<Slot>>,
}

/// Announcer double that records everything it is asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnnouncer(pub Arc<RecordingAnnouncerInner>);

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn ready(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish_schedule(&self, view: &ScheduleView) -> anyhow::Result<()> {
        self.0.schedules.lock().unwrap().push(view.clone());
        Ok(())
    }

    async fn announce_completion(&self, slot: &Slot) -> anyhow::Result<()> {
        self.0.completions.lock().unwrap().push(slot.clone());
        Ok(())
    }
}
