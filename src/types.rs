use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Claimed,
    Completed,
}

/// The user a slot is bound to: a stable identifier plus the display form
/// used in rendered messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub id: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: u32,
    #[serde(with = "slot_time")]
    pub scheduled_at: NaiveDateTime,
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<Holder>,
}

impl Slot {
    pub fn available(id: u32, scheduled_at: NaiveDateTime) -> Self {
        Self {
            id,
            scheduled_at,
            status: SlotStatus::Available,
            holder: None,
        }
    }
}

/// The fixed pool the store starts from when nothing was persisted yet:
/// six slots in two-hour steps, 12:00 PM through 10:00 PM.
pub fn seed_pool() -> Vec<Slot> {
    let day = NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
    (1..=6)
        .map(|id| {
            let hour = 10 + 2 * id;
            Slot::available(id, day.and_hms_opt(hour, 0, 0).unwrap())
        })
        .collect()
}

/// Minute-precision timestamps in the pool's single implicit time zone,
/// rendered the way the announcements show them (`2025-11-10 4:00 PM`).
pub(crate) mod slot_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %-I:%M %p";
    pub const PARSE_FORMAT: &str = "%Y-%m-%d %I:%M %p";

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, PARSE_FORMAT).map_err(serde::de::Error::custom)
    }
}
