use crate::error::SlotError;
use crate::types::Slot;
use std::path::PathBuf;

/// Durable mirror of the slot pool. The in-memory pool stays authoritative;
/// implementations only have to round-trip the full collection including
/// status and holder.
pub trait SlotPersistence: Clone + Send + Sync + 'static {
    fn save(&self, slots: &[Slot]) -> Result<(), SlotError>;
    /// `Ok(None)` means no prior state exists and the caller should seed.
    fn load(&self) -> Result<Option<Vec<Slot>>, SlotError>;
}

/// Stores the pool as one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SlotPersistence for JsonFileStore {
    fn save(&self, slots: &[Slot]) -> Result<(), SlotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    SlotError::Persistence(format!("cannot create state directory: {err}"))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(slots)
            .map_err(|err| SlotError::Persistence(format!("cannot serialize slots: {err}")))?;

        // Write-then-rename so a crash mid-write never leaves a truncated
        // file where the state used to be.
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| {
                SlotError::Persistence(format!("{} has no file name", self.path.display()))
            })?
            .to_os_string();
        let mut temp_name = file_name;
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        std::fs::write(&temp_path, json).map_err(|err| {
            SlotError::Persistence(format!("cannot write {}: {err}", temp_path.display()))
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|err| {
            SlotError::Persistence(format!("cannot replace {}: {err}", self.path.display()))
        })
    }

    fn load(&self) -> Result<Option<Vec<Slot>>, SlotError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SlotError::Persistence(format!(
                    "cannot read {}: {err}",
                    self.path.display()
                )))
            }
        };

        let slots = serde_json::from_slice(&bytes).map_err(|err| {
            SlotError::Persistence(format!("cannot parse {}: {err}", self.path.display()))
        })?;
        Ok(Some(slots))
    }
}
