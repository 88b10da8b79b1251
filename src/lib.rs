//! Scoutboard engine: stage-based boards for scouted players, transfer
//! interests and advisor tasks, with calendar-day follow-up urgency and a
//! merged reminder feed.

pub mod board;
pub mod clock;
pub mod collation;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod filter;
pub mod legacy;
mod migrations;
pub mod records;
pub mod reminders;
pub mod services;
pub mod stages;
pub mod store;
pub mod transition;
pub mod urgency;
pub mod util;

pub use board::{BoardProjection, BoardState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, load_config_or_default, BoardScope, EngineConfig};
pub use error::{EngineError, EngineErrorPayload};
pub use events::{BoardEvent, EventBus};
pub use records::PipelineItem;
pub use reminders::{ReminderFeed, ReminderKey};
pub use services::{BoardService, Engine, NewItem, ReminderService};
pub use stages::PipelineKind;
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use urgency::Urgency;

/// Install the `env_logger` backend for the `log` facade.
///
/// Defaults to `info`; `RUST_LOG` overrides. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
