//! Board change notifications.
//!
//! The composition root creates one `EventBus` and hands clones to every
//! service and screen that needs to react to another board's changes (e.g. the
//! reminder feed refreshing after a transfer interest's follow-up changed).

use serde::Serialize;
use tokio::sync::broadcast;

use crate::stages::PipelineKind;

/// Default channel capacity; slow receivers past this see `Lagged`.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Largest accepted capacity. The channel preallocates every slot.
pub const MAX_EVENT_BUFFER: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoardEvent {
    #[serde(rename_all = "camelCase")]
    StageChanged {
        kind: PipelineKind,
        id: String,
        from: String,
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    CompletionToggled {
        kind: PipelineKind,
        id: String,
        completed: bool,
    },
    #[serde(rename_all = "camelCase")]
    OffsetChanged {
        kind: PipelineKind,
        id: String,
        offset_days: Option<u32>,
    },
    ItemCreated { kind: PipelineKind, id: String },
    ItemDeleted { kind: PipelineKind, id: String },
    RecordsMigrated { kind: PipelineKind, count: usize },
    /// Ask every listener to reload, e.g. when the app returns to the foreground.
    RefreshRequested,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BoardEvent>,
}

impl EventBus {
    /// Capacity is clamped to `1..=MAX_EVENT_BUFFER`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_BUFFER));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber. Returns how many received it;
    /// zero subscribers is not an error.
    pub fn publish(&self, event: BoardEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                log::debug!("No listeners for {:?}", event);
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}
