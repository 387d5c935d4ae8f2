use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::state_dto::{ScheduleDto, StateDto};
use crate::domain::reservation::reservation_store::ReservationStore;
use crate::domain::schedule::slotted_schedule::SlottedSchedule;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Durable home of the reservation store and the schedule.
pub trait StatePersistence: Debug + Send + Sync {
    /// Replaces the stored state. A reader never observes a partially written state.
    fn save(&self, state: &StateDto) -> Result<()>;

    /// Returns `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<StateDto>>;
}

impl<T: StatePersistence + ?Sized> StatePersistence for std::sync::Arc<T> {
    fn save(&self, state: &StateDto) -> Result<()> {
        (**self).save(state)
    }

    fn load(&self) -> Result<Option<StateDto>> {
        (**self).load()
    }
}

pub fn to_state_dto(store: &ReservationStore, schedule: &SlottedSchedule) -> StateDto {
    StateDto {
        next_id: store.next_id(),
        reservations: store.list(),
        schedule: ScheduleDto { slice_width: schedule.slice_width(), slices: schedule.to_slices() },
    }
}

/// JSON file replaced through write-to-temp + rename.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self.path.file_name().map(|name| name.to_string_lossy().to_string()).unwrap_or_else(|| "state".to_string());
        self.path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }

    fn write_atomically(&self, content: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        result
    }
}

impl StatePersistence for FileStateStore {
    fn save(&self, state: &StateDto) -> Result<()> {
        let content = serde_json::to_vec_pretty(state).map_err(|e| Error::Persistence(e.to_string()))?;

        self.write_atomically(&content).map_err(|e| Error::Persistence(format!("failed to write {}: {}", self.path.display(), e)))?;

        log::debug!("Saved {} reservations and {} slices to {}.", state.reservations.len(), state.schedule.slices.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<StateDto>> {
        if !self.path.exists() {
            log::info!("No scheduler state at {}, starting empty.", self.path.display());
            return Ok(None);
        }

        let path = self.path.to_string_lossy();
        let state: StateDto = parse_json_file(&path)?;

        log::info!("Loaded {} reservations from {}.", state.reservations.len(), self.path.display());
        Ok(Some(state))
    }
}

/// Keeps the state in memory. Saves can be made to fail on demand to
/// exercise rollback paths.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<StateDto>>,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        MemoryStateStore::default()
    }

    pub fn with_state(state: StateDto) -> Self {
        MemoryStateStore { state: Mutex::new(Some(state)), fail_saves: AtomicBool::new(false) }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<StateDto> {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatePersistence for MemoryStateStore {
    fn save(&self, state: &StateDto) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Persistence("save rejected by memory state store".to_string()));
        }

        let mut stored = self.state.lock().map_err(|_| Error::StatePoisoned)?;
        *stored = Some(state.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<StateDto>> {
        let stored = self.state.lock().map_err(|_| Error::StatePoisoned)?;
        Ok(stored.clone())
    }
}
