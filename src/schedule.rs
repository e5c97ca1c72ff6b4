use crate::types::{slot_time, Slot, SlotStatus};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One line of the shared schedule summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub holder: String,
    #[serde(with = "slot_time")]
    pub scheduled_at: NaiveDateTime,
}

/// Derived summary of all currently claimed slots. An empty pool projects
/// to the explicit `NoSessions` sentinel so the announcer always has
/// renderable content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScheduleView {
    NoSessions,
    Sessions(Vec<ScheduleEntry>),
}

/// Pure projection of the slot collection: one entry per claimed slot, in
/// pool order. Completed and available slots are not listed.
pub fn project(slots: &[Slot]) -> ScheduleView {
    let entries: Vec<ScheduleEntry> = slots
        .iter()
        .filter(|slot| slot.status == SlotStatus::Claimed)
        .map(|slot| ScheduleEntry {
            holder: slot
                .holder
                .as_ref()
                .map(|holder| holder.display.clone())
                .unwrap_or_default(),
            scheduled_at: slot.scheduled_at,
        })
        .collect();

    if entries.is_empty() {
        ScheduleView::NoSessions
    } else {
        ScheduleView::Sessions(entries)
    }
}

impl ScheduleView {
    /// The message body the announcer renders, without the channel ping.
    pub fn to_message_body(&self) -> String {
        match self {
            ScheduleView::NoSessions => {
                "**Upcoming Training Sessions**\nNo sessions scheduled.".to_string()
            }
            ScheduleView::Sessions(entries) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|entry| {
                        format!(
                            "**{}** — {}",
                            entry.holder,
                            entry.scheduled_at.format(slot_time::FORMAT)
                        )
                    })
                    .collect();
                format!("**Upcoming Training Sessions**\n{}", lines.join("\n"))
            }
        }
    }
}
