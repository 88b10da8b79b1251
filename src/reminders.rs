//! Reminder feed: stored reminder rows merged with reminders synthesized from
//! pipeline items that carry a follow-up offset.
//!
//! Synthesized reminders have no row of their own. Completing one only flips
//! the in-memory feed; the next full reload re-derives it from the source item
//! and the flag is gone. Whether such reminders should gain a backing row on
//! first completion is an open product decision.

use std::cmp::Ordering;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

use crate::collation;
use crate::records::{self, PipelineItem, COMPLETED};
use crate::stages::PipelineKind;
use crate::store::{record_id, Record};
use crate::urgency::{self, Urgency};

/// Where "jump to source" navigates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntityRef {
    pub kind: PipelineKind,
    pub id: String,
}

/// Identity of a reminder within a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum ReminderKey {
    /// A row in the `reminders` collection.
    Stored { id: String },
    /// Derived from a pipeline item's offset.
    Derived { kind: PipelineKind, id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderView {
    pub key: ReminderKey,
    pub title: String,
    pub target_date: Option<NaiveDate>,
    pub completed: bool,
    pub source: Option<SourceEntityRef>,
}

impl ReminderView {
    /// Decode a stored reminder row. `None` only when the row has no id.
    ///
    /// `source_kind` + `source_id` become a source ref when both are present
    /// and the kind is known.
    pub fn from_record(record: &Record, tz: Tz) -> Option<Self> {
        let id = record_id(record)?.to_string();
        let text = |field: &str| record.get(field).and_then(Value::as_str).map(str::trim);

        let source = match (text("source_kind"), text("source_id")) {
            (Some(kind), Some(source_id)) if !source_id.is_empty() => {
                kind.parse::<PipelineKind>().ok().map(|kind| SourceEntityRef {
                    kind,
                    id: source_id.to_string(),
                })
            }
            _ => None,
        };

        Some(Self {
            key: ReminderKey::Stored { id },
            title: text("title").unwrap_or_default().to_string(),
            target_date: text("due_date").and_then(|d| records::parse_calendar_date(d, tz)),
            completed: record.get(COMPLETED).map(records::bool_value).unwrap_or(false),
            source,
        })
    }

    /// Synthesize a reminder from an item. `None` when the item has no offset.
    pub fn from_item(item: &PipelineItem, tz: Tz) -> Option<Self> {
        item.urgency_offset_days?;
        Some(Self {
            key: ReminderKey::Derived {
                kind: item.kind,
                id: item.id.clone(),
            },
            title: item.title.clone(),
            target_date: item.target_date(tz),
            completed: item.completed,
            source: Some(SourceEntityRef {
                kind: item.kind,
                id: item.id.clone(),
            }),
        })
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self.key, ReminderKey::Derived { .. })
    }

    pub fn urgency(&self, today: NaiveDate) -> Option<Urgency> {
        self.target_date
            .map(|target| urgency::classify(urgency::days_until(target, today)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedOptions {
    pub include_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub reminder: ReminderView,
    pub urgency: Option<Urgency>,
}

/// Two display buckets, each most urgent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFeed {
    /// Overdue or due today.
    pub due_now: Vec<FeedEntry>,
    /// Due later, then undated reminders.
    pub upcoming: Vec<FeedEntry>,
}

impl ReminderFeed {
    pub fn len(&self) -> usize {
        self.due_now.len() + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.due_now.iter().chain(self.upcoming.iter())
    }

    pub fn find(&self, key: &ReminderKey) -> Option<&FeedEntry> {
        self.entries().find(|e| &e.reminder.key == key)
    }

    /// Flip completion on a synthesized reminder, in memory only.
    ///
    /// Returns the new state, or `None` if the key is not a synthesized
    /// reminder in this feed (stored reminders must go through the store).
    pub fn toggle_local(&mut self, key: &ReminderKey) -> Option<bool> {
        if !matches!(key, ReminderKey::Derived { .. }) {
            return None;
        }
        let entry = self
            .due_now
            .iter_mut()
            .chain(self.upcoming.iter_mut())
            .find(|e| &e.reminder.key == key)?;
        entry.reminder.completed = !entry.reminder.completed;
        log::debug!("Synthesized reminder {:?} completion is session-only", key);
        Some(entry.reminder.completed)
    }

    /// Replace a stored reminder after a successful write.
    pub fn set_completed(&mut self, key: &ReminderKey, completed: bool) -> bool {
        match self
            .due_now
            .iter_mut()
            .chain(self.upcoming.iter_mut())
            .find(|e| &e.reminder.key == key)
        {
            Some(entry) => {
                entry.reminder.completed = completed;
                true
            }
            None => false,
        }
    }
}

fn compare_entries(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    let key = |e: &FeedEntry| e.urgency.map(Urgency::days_until);
    match (key(a), key(b)) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| collation::compare(&a.reminder.title, &b.reminder.title))
}

/// Merge stored reminders with ones synthesized from `sources`.
///
/// Archived source items do not produce reminders. Completed reminders are
/// dropped unless `options.include_completed` is set.
pub fn project(
    direct: &[ReminderView],
    sources: &[PipelineItem],
    today: NaiveDate,
    tz: Tz,
    options: FeedOptions,
) -> ReminderFeed {
    let synthesized = sources
        .iter()
        .filter(|item| !item.archived)
        .filter_map(|item| ReminderView::from_item(item, tz));

    let mut feed = ReminderFeed::default();
    for reminder in direct.iter().cloned().chain(synthesized) {
        if reminder.completed && !options.include_completed {
            continue;
        }
        let urgency = reminder.urgency(today);
        let entry = FeedEntry { reminder, urgency };
        match urgency {
            Some(u) if u.is_due_now() => feed.due_now.push(entry),
            _ => feed.upcoming.push(entry),
        }
    }

    feed.due_now.sort_by(compare_entries);
    feed.upcoming.sort_by(compare_entries);
    feed
}
