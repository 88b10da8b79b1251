// Board service: one pipeline board wired to the store, the legacy migrator
// and the event bus. Mutations persist first, then update the caller's
// BoardState, then publish.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::board::{BoardProjection, BoardState};
use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::enrichment::{self, AgentLookup, NoEnrichment, PROFILE_URL};
use crate::error::EngineError;
use crate::events::{BoardEvent, EventBus};
use crate::filter::BoardQuery;
use crate::legacy::{LegacyStatusMigrator, MigrationReport};
use crate::records::{self, PipelineItem, ARCHIVED, COMPLETED, CREATED_AT, OWNER_ID, UPDATED_AT};
use crate::stages::{self, PipelineKind};
use crate::store::{Record, RecordFilter, RecordStore};
use crate::transition::TransitionController;
use crate::urgency::NO_REMINDER;
use crate::util;

pub const MAX_TITLE_LEN: usize = 200;

/// Input for a new board item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    /// Starting stage; the pipeline's first stage when absent.
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub reminder_days: Option<u32>,
    /// Remaining kind-specific fields (position, league, notes...).
    #[serde(default)]
    pub fields: Record,
}

impl NewItem {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

pub struct BoardService<S> {
    kind: PipelineKind,
    controller: TransitionController<S>,
    migrator: LegacyStatusMigrator,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    lookup: Arc<dyn AgentLookup>,
    tz: Tz,
    scope: Option<RecordFilter>,
    owner_id: Option<String>,
}

impl<S: RecordStore> BoardService<S> {
    pub fn new(
        kind: PipelineKind,
        store: S,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
        bus: EventBus,
    ) -> Result<Self, ConfigError> {
        let migrator = LegacyStatusMigrator::new(kind, config.legacy_mapping(kind)).map_err(
            |e| ConfigError::InvalidLegacyMapping {
                kind,
                message: e.to_string(),
            },
        )?;
        Ok(Self {
            kind,
            controller: TransitionController::new(store, clock.clone()),
            migrator,
            clock,
            bus,
            lookup: Arc::new(NoEnrichment),
            tz: config.tz()?,
            scope: config.owner_filter(),
            owner_id: config.owner_id().map(str::to_string),
        })
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn AgentLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn store(&self) -> &S {
        self.controller.store()
    }

    fn collection(&self) -> &'static str {
        records::contract(self.kind).collection
    }

    /// Fetch, repair legacy stages, decode.
    pub fn load(&self) -> Result<BoardState, EngineError> {
        let (board, _) = self.load_with_report()?;
        Ok(board)
    }

    pub fn load_with_report(&self) -> Result<(BoardState, MigrationReport), EngineError> {
        let collection = self.collection();
        let mut rows = self
            .store()
            .fetch_all(collection, self.scope.as_ref())
            .map_err(|e| EngineError::from_store(collection, "*", e))?;

        let report = self.migrator.migrate(self.store(), &mut rows);
        if report.migrated > 0 {
            self.bus.publish(BoardEvent::RecordsMigrated {
                kind: self.kind,
                count: report.migrated,
            });
        }

        let items = decode_all(self.kind, &rows);
        log::debug!("Loaded {} {} items", items.len(), self.kind);
        Ok((BoardState::new(self.kind, items), report))
    }

    pub fn project(&self, board: &BoardState) -> BoardProjection {
        board.project(self.clock.today(self.tz), self.tz)
    }

    pub fn project_filtered(&self, board: &BoardState, query: &BoardQuery) -> BoardProjection {
        board.project_filtered(query, self.clock.today(self.tz), self.tz)
    }

    fn item(&self, board: &BoardState, id: &str) -> Result<PipelineItem, EngineError> {
        board
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                collection: self.collection().to_string(),
                id: id.to_string(),
            })
    }

    pub fn transition(
        &self,
        board: &mut BoardState,
        id: &str,
        target_stage: &str,
    ) -> Result<PipelineItem, EngineError> {
        let item = self.item(board, id)?;
        let updated = self.controller.transition(&item, target_stage)?;
        if updated.stage != item.stage {
            board.replace(updated.clone());
            self.bus.publish(BoardEvent::StageChanged {
                kind: self.kind,
                id: item.id.clone(),
                from: item.stage.clone(),
                to: updated.stage.clone(),
            });
        }
        Ok(updated)
    }

    pub fn toggle_completion(
        &self,
        board: &mut BoardState,
        id: &str,
    ) -> Result<PipelineItem, EngineError> {
        let item = self.item(board, id)?;
        let updated = self.controller.toggle_completion(&item)?;
        board.replace(updated.clone());
        self.bus.publish(BoardEvent::CompletionToggled {
            kind: self.kind,
            id: updated.id.clone(),
            completed: updated.completed,
        });
        Ok(updated)
    }

    pub fn set_urgency_offset(
        &self,
        board: &mut BoardState,
        id: &str,
        offset_days: Option<u32>,
    ) -> Result<PipelineItem, EngineError> {
        let offset_days = util::validate_reminder_days(offset_days, "reminder_days")?;
        let item = self.item(board, id)?;
        let updated = self.controller.set_urgency_offset(&item, offset_days)?;
        if updated.urgency_offset_days != item.urgency_offset_days {
            board.replace(updated.clone());
            self.bus.publish(BoardEvent::OffsetChanged {
                kind: self.kind,
                id: updated.id.clone(),
                offset_days: updated.urgency_offset_days,
            });
        }
        Ok(updated)
    }

    /// Edit non-pipeline fields. The title, when present, is validated.
    pub fn update_fields(
        &self,
        board: &mut BoardState,
        id: &str,
        mut patch: Record,
    ) -> Result<PipelineItem, EngineError> {
        let title_field = records::contract(self.kind).title_field;
        if let Some(title) = patch.get(title_field) {
            let title = util::validate_bounded_string(
                title.as_str().unwrap_or_default(),
                title_field,
                1,
                MAX_TITLE_LEN,
            )?;
            patch.insert(title_field.to_string(), Value::String(title));
        }
        let item = self.item(board, id)?;
        let updated = self.controller.update_fields(&item, patch)?;
        board.replace(updated.clone());
        Ok(updated)
    }

    pub fn delete(&self, board: &mut BoardState, id: &str) -> Result<(), EngineError> {
        let item = self.item(board, id)?;
        self.controller.delete(&item)?;
        board.remove(id);
        self.bus.publish(BoardEvent::ItemDeleted {
            kind: self.kind,
            id: id.to_string(),
        });
        Ok(())
    }

    pub fn create_item(
        &self,
        board: &mut BoardState,
        new: NewItem,
    ) -> Result<PipelineItem, EngineError> {
        let contract = records::contract(self.kind);
        let title = util::validate_bounded_string(&new.title, contract.title_field, 1, MAX_TITLE_LEN)?;
        let stage = match new.stage {
            Some(stage) if stages::is_valid_stage(self.kind, &stage) => stage,
            Some(stage) => {
                return Err(EngineError::InvalidStage {
                    kind: self.kind,
                    stage,
                })
            }
            None => stages::initial_stage(self.kind).id.to_string(),
        };
        let offset = util::validate_reminder_days(new.reminder_days, contract.offset_field)?;
        let now = json!(self.clock.now().to_rfc3339());

        let mut record = new.fields;
        record.insert(contract.title_field.to_string(), Value::String(title));
        record.insert(contract.stage_field.to_string(), Value::String(stage));
        record.insert(
            contract.offset_field.to_string(),
            offset.map_or(json!(NO_REMINDER), |d| json!(d)),
        );
        record.insert(CREATED_AT.to_string(), now.clone());
        record.insert(UPDATED_AT.to_string(), now);
        record.entry(COMPLETED.to_string()).or_insert(Value::Bool(false));
        record.entry(ARCHIVED.to_string()).or_insert(Value::Bool(false));
        if let Some(owner) = &self.owner_id {
            record.insert(OWNER_ID.to_string(), Value::String(owner.clone()));
        }

        let stored = self
            .store()
            .insert(contract.collection, record)
            .map_err(|e| EngineError::from_store(contract.collection, "new", e))?;
        let item = PipelineItem::from_record(self.kind, &stored)
            .ok_or_else(|| EngineError::validation("id", "store returned a record without id"))?;

        log::info!("{} {} created in '{}'", self.kind, item.id, item.stage);
        board.push(item.clone());
        self.bus.publish(BoardEvent::ItemCreated {
            kind: self.kind,
            id: item.id.clone(),
        });
        Ok(item)
    }

    /// Fill empty agent fields from the player's profile URL.
    ///
    /// Never fails: a missing URL, lookup error, or rejected write all leave
    /// the item as it was and return `None`.
    pub fn enrich(&self, board: &mut BoardState, id: &str) -> Option<PipelineItem> {
        if self.kind != PipelineKind::Scouting {
            return None;
        }
        let item = board.get(id)?.clone();
        let url = item.field_text(PROFILE_URL)?;
        let contact = enrichment::enrich_agent(self.lookup.as_ref(), &url)?;
        let patch = enrichment::agent_patch(&item, &contact)?;

        match self.controller.update_fields(&item, patch) {
            Ok(updated) => {
                log::info!("Agent details filled for {}", item.id);
                board.replace(updated.clone());
                Some(updated)
            }
            Err(e) => {
                log::warn!("Could not save agent details for {}: {}", item.id, e);
                None
            }
        }
    }
}

/// Decode rows, skipping those without an id.
pub(crate) fn decode_all(kind: PipelineKind, rows: &[Record]) -> Vec<PipelineItem> {
    rows.iter()
        .filter_map(|row| {
            let item = PipelineItem::from_record(kind, row);
            if item.is_none() {
                log::warn!("Skipping {} record without id", kind);
            }
            item
        })
        .collect()
}
