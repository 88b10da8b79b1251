//! Stage transitions and the other single-item mutations.
//!
//! Nothing is committed locally before the store accepts the write: on error
//! the caller still holds the untouched item. On success the returned item is
//! the new local state, so the board can swap it in without a re-fetch.
//!
//! Callers must keep at most one mutation in flight per item; the store has
//! no optimistic-locking check.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::records::{
    self, PipelineItem, COMPLETED, COMPLETED_AT, CREATED_AT, OWNER_ID, UPDATED_AT,
};
use crate::stages::{self, PipelineKind};
use crate::store::{Record, RecordStore};
use crate::urgency::NO_REMINDER;

pub struct TransitionController<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: RecordStore> TransitionController<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move an item to another stage.
    ///
    /// Dropping an item back onto its own column is a successful no-op with no
    /// store write.
    pub fn transition(
        &self,
        item: &PipelineItem,
        target_stage: &str,
    ) -> Result<PipelineItem, EngineError> {
        if !stages::is_valid_stage(item.kind, target_stage) {
            return Err(EngineError::InvalidStage {
                kind: item.kind,
                stage: target_stage.to_string(),
            });
        }
        if item.stage == target_stage {
            log::debug!("{} {} already in '{}', skipping write", item.kind, item.id, target_stage);
            return Ok(item.clone());
        }

        let contract = records::contract(item.kind);
        let mut patch = Record::new();
        patch.insert(
            contract.stage_field.to_string(),
            Value::String(target_stage.to_string()),
        );
        if item.kind == PipelineKind::Transfer {
            patch.insert(UPDATED_AT.to_string(), json!(self.clock.now().to_rfc3339()));
        }

        let updated = self.persist(item, patch)?;
        log::info!(
            "{} {} moved '{}' -> '{}'",
            item.kind,
            item.id,
            item.stage,
            target_stage
        );
        Ok(updated)
    }

    /// Flip `completed`. `completed_at` is stamped on false -> true and cleared
    /// on true -> false.
    pub fn toggle_completion(&self, item: &PipelineItem) -> Result<PipelineItem, EngineError> {
        let completed = !item.completed;
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
        self.persist(item, patch)
    }

    /// Change the reminder offset. A changed value re-anchors `created_at` to
    /// now so the target date counts from the edit, not the original creation.
    pub fn set_urgency_offset(
        &self,
        item: &PipelineItem,
        offset_days: Option<u32>,
    ) -> Result<PipelineItem, EngineError> {
        if item.urgency_offset_days == offset_days {
            return Ok(item.clone());
        }

        let contract = records::contract(item.kind);
        let mut patch = Record::new();
        patch.insert(
            contract.offset_field.to_string(),
            match offset_days {
                Some(days) => json!(days),
                None => json!(NO_REMINDER),
            },
        );
        patch.insert(CREATED_AT.to_string(), json!(self.clock.now().to_rfc3339()));
        self.persist(item, patch)
    }

    /// Write free-form field edits (position, club, notes...).
    ///
    /// Stage, offset, completion, identity, ownership and timestamps are
    /// rejected here. `archived` stays editable so items can be restored.
    pub fn update_fields(
        &self,
        item: &PipelineItem,
        patch: Record,
    ) -> Result<PipelineItem, EngineError> {
        let contract = records::contract(item.kind);
        let reserved = [
            records::ID,
            contract.stage_field,
            contract.offset_field,
            COMPLETED,
            COMPLETED_AT,
            CREATED_AT,
            UPDATED_AT,
            OWNER_ID,
        ];
        if let Some(field) = patch.keys().find(|k| reserved.contains(&k.as_str())) {
            return Err(EngineError::validation(
                field,
                "cannot be edited directly",
            ));
        }
        if patch.is_empty() {
            return Ok(item.clone());
        }
        self.persist(item, patch)
    }

    pub fn delete(&self, item: &PipelineItem) -> Result<(), EngineError> {
        let collection = item.collection();
        self.store
            .delete(collection, &item.id)
            .map_err(|e| EngineError::from_store(collection, &item.id, e))?;
        log::info!("{} {} deleted", item.kind, item.id);
        Ok(())
    }

    /// Write `patch`, then rebuild the item from its fields plus the patch.
    fn persist(&self, item: &PipelineItem, patch: Record) -> Result<PipelineItem, EngineError> {
        let collection = item.collection();
        self.store
            .update(collection, &item.id, &patch)
            .map_err(|e| EngineError::from_store(collection, &item.id, e))?;

        let mut fields = item.fields.clone();
        fields.insert(records::ID.to_string(), Value::String(item.id.clone()));
        for (key, value) in patch {
            fields.insert(key, value);
        }
        PipelineItem::from_record(item.kind, &fields)
            .ok_or_else(|| EngineError::validation("id", "record has no id"))
    }
}
