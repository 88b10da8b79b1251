// Reminder service: stored reminder rows plus reminders derived from every
// pipeline's follow-up offsets, merged into one feed.

use std::sync::Arc;

use chrono_tz::Tz;
use serde_json::{json, Value};

use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::events::BoardEvent;
use crate::records::{self, PipelineItem, COMPLETED, COMPLETED_AT, REMINDERS_COLLECTION};
use crate::reminders::{self, FeedOptions, ReminderFeed, ReminderKey, ReminderView};
use crate::services::boards::decode_all;
use crate::stages::PipelineKind;
use crate::store::{Record, RecordFilter, RecordStore};

pub struct ReminderService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    tz: Tz,
    scope: Option<RecordFilter>,
    options: FeedOptions,
}

impl<S: RecordStore> ReminderService<S> {
    pub fn new(store: S, config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            clock,
            tz: config.tz()?,
            scope: config.owner_filter(),
            options: FeedOptions {
                include_completed: config.show_completed_reminders,
            },
        })
    }

    pub fn options(&self) -> FeedOptions {
        self.options
    }

    pub fn set_options(&mut self, options: FeedOptions) {
        self.options = options;
    }

    fn fetch(&self, collection: &str) -> Result<Vec<Record>, EngineError> {
        self.store
            .fetch_all(collection, self.scope.as_ref())
            .map_err(|e| EngineError::from_store(collection, "*", e))
    }

    pub fn load_feed(&self) -> Result<ReminderFeed, EngineError> {
        let direct: Vec<ReminderView> = self
            .fetch(REMINDERS_COLLECTION)?
            .iter()
            .filter_map(|row| {
                let view = ReminderView::from_record(row, self.tz);
                if view.is_none() {
                    log::warn!("Skipping reminder without id");
                }
                view
            })
            .collect();

        let mut sources: Vec<PipelineItem> = Vec::new();
        for kind in PipelineKind::ALL {
            let rows = self.fetch(records::contract(kind).collection)?;
            sources.extend(decode_all(kind, &rows));
        }

        let feed = reminders::project(
            &direct,
            &sources,
            self.clock.today(self.tz),
            self.tz,
            self.options,
        );
        log::debug!(
            "Reminder feed: {} due now, {} upcoming",
            feed.due_now.len(),
            feed.upcoming.len()
        );
        Ok(feed)
    }

    /// Flip a reminder's completion and return the new state.
    ///
    /// Stored reminders are persisted before the feed changes. Synthesized
    /// ones change in the feed only.
    pub fn toggle(&self, feed: &mut ReminderFeed, key: &ReminderKey) -> Result<bool, EngineError> {
        let not_found = |collection: &str, id: &str| EngineError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };

        match key {
            ReminderKey::Derived { kind, id } => feed
                .toggle_local(key)
                .ok_or_else(|| not_found(records::contract(*kind).collection, id)),
            ReminderKey::Stored { id } => {
                let current = feed
                    .find(key)
                    .map(|e| e.reminder.completed)
                    .ok_or_else(|| not_found(REMINDERS_COLLECTION, id))?;
                let completed = !current;

                let mut patch = Record::new();
                patch.insert(COMPLETED.to_string(), Value::Bool(completed));
                patch.insert(
                    COMPLETED_AT.to_string(),
                    if completed {
                        json!(self.clock.now().to_rfc3339())
                    } else {
                        Value::Null
                    },
                );
                self.store
                    .update(REMINDERS_COLLECTION, id, &patch)
                    .map_err(|e| EngineError::from_store(REMINDERS_COLLECTION, id, e))?;

                feed.set_completed(key, completed);
                Ok(completed)
            }
        }
    }
}

/// Whether a board change can alter the reminder feed.
pub fn affects_feed(event: &BoardEvent) -> bool {
    !matches!(
        event,
        BoardEvent::StageChanged { .. } | BoardEvent::RecordsMigrated { .. }
    )
}
