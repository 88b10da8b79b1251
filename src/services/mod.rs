//! Composition root: the boards and the reminder feed share one store, one
//! clock and one event bus.

pub mod boards;
pub mod reminders;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::events::EventBus;
use crate::stages::PipelineKind;
use crate::store::{RecordStore, SqliteStore, StoreError};

pub use boards::{BoardService, NewItem};
pub use reminders::ReminderService;

pub struct Engine<S> {
    pub scouting: BoardService<S>,
    pub transfers: BoardService<S>,
    pub tasks: BoardService<S>,
    pub reminders: ReminderService<S>,
    bus: EventBus,
}

impl<S: RecordStore + Clone> Engine<S> {
    pub fn new(store: S, config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = EventBus::new(config.event_buffer_size);
        let board = |kind| {
            BoardService::new(kind, store.clone(), config, clock.clone(), bus.clone())
        };
        Ok(Self {
            scouting: board(PipelineKind::Scouting)?,
            transfers: board(PipelineKind::Transfer)?,
            tasks: board(PipelineKind::Task)?,
            reminders: ReminderService::new(store.clone(), config, clock.clone())?,
            bus,
        })
    }

    pub fn board(&self, kind: PipelineKind) -> &BoardService<S> {
        match kind {
            PipelineKind::Scouting => &self.scouting,
            PipelineKind::Transfer => &self.transfers,
            PipelineKind::Task => &self.tasks,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }
}

/// Open the SQLite store the config points at (or the default location).
pub fn open_store(config: &EngineConfig) -> Result<Arc<SqliteStore>, StoreError> {
    let store = match &config.database_path {
        Some(path) => SqliteStore::open_at(path)?,
        None => SqliteStore::open()?,
    };
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::events::BoardEvent;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn boards_share_one_bus() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "tasks",
            [json!({"id": "k1", "title": "Anruf", "priority": "mittel"})
                .as_object()
                .cloned()
                .unwrap()],
        );
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at("2024-01-10T08:00:00Z").unwrap());
        let engine = Engine::new(store.clone(), &EngineConfig::default(), clock).unwrap();
        let mut rx = engine.events().subscribe();

        let mut board = engine.board(PipelineKind::Task).load().unwrap();
        engine.tasks.toggle_completion(&mut board, "k1").unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            BoardEvent::CompletionToggled { completed: true, .. }
        ));
        assert!(engine.reminders.load_feed().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            timezone: "Nowhere/Land".to_string(),
            ..EngineConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at("2024-01-10T08:00:00Z").unwrap());
        assert!(Engine::new(Arc::new(MemoryStore::new()), &config, clock).is_err());
    }

    #[test]
    fn oversized_event_buffer_is_rejected() {
        let config = EngineConfig {
            event_buffer_size: usize::MAX,
            ..EngineConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at("2024-01-10T08:00:00Z").unwrap());
        assert!(Engine::new(Arc::new(MemoryStore::new()), &config, clock).is_err());
    }

    #[test]
    fn open_store_honours_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            database_path: Some(dir.path().join("nested").join("board.db")),
            ..EngineConfig::default()
        };
        let _store = open_store(&config).unwrap();
        assert!(dir.path().join("nested").join("board.db").exists());
    }
}
