//! Board projection: items bucketed per stage, most urgent first.
//!
//! Within a column the order is
//! 1. classified items by ascending days-until (most overdue first),
//! 2. items without an offset (or without an anchor) after all classified ones,
//! 3. ties broken by the collated display name.
//!
//! The sort is stable, so items equal on every key keep their input order and
//! an unchanged board does not reshuffle on re-render.

use std::cmp::Ordering;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::collation;
use crate::filter::BoardQuery;
use crate::records::PipelineItem;
use crate::stages::{self, PipelineKind, Stage};
use crate::urgency::Urgency;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub item: PipelineItem,
    pub urgency: Option<Urgency>,
    pub target_date: Option<NaiveDate>,
}

impl BoardEntry {
    pub fn new(item: PipelineItem, today: NaiveDate, tz: Tz) -> Self {
        let urgency = item.urgency(today, tz);
        let target_date = item.target_date(tz);
        Self {
            item,
            urgency,
            target_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub stage: Stage,
    pub entries: Vec<BoardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardProjection {
    pub kind: PipelineKind,
    /// One column per registered stage, in registry order. Empty columns included.
    pub columns: Vec<BoardColumn>,
    /// Items whose stage the registry does not know. Should be empty once
    /// legacy migration has run.
    pub unresolved: Vec<PipelineItem>,
}

impl BoardProjection {
    pub fn column(&self, stage_id: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.stage.id == stage_id)
    }

    /// Ids in one column, in display order.
    pub fn ids(&self, stage_id: &str) -> Vec<&str> {
        self.column(stage_id)
            .map(|c| c.entries.iter().map(|e| e.item.id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Order two entries for display. `None` urgency sorts last.
pub fn compare_entries(a: &BoardEntry, b: &BoardEntry) -> Ordering {
    let key = |e: &BoardEntry| e.urgency.map(Urgency::days_until);
    match (key(a), key(b)) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| collation::compare(&a.item.title, &b.item.title))
}

/// Bucket `items` of one pipeline into its columns.
///
/// Items of another kind are ignored; items with an unknown stage land in
/// `unresolved` instead of aborting the projection.
pub fn project(
    items: &[PipelineItem],
    kind: PipelineKind,
    today: NaiveDate,
    tz: Tz,
) -> BoardProjection {
    let mut columns: Vec<BoardColumn> = stages::stages_for(kind)
        .iter()
        .map(|stage| BoardColumn {
            stage: *stage,
            entries: Vec::new(),
        })
        .collect();
    let mut unresolved = Vec::new();

    for item in items.iter().filter(|i| i.kind == kind) {
        match columns.iter_mut().find(|c| c.stage.id == item.stage) {
            Some(column) => column
                .entries
                .push(BoardEntry::new(item.clone(), today, tz)),
            None => {
                log::warn!(
                    "{} item {} has unknown stage '{}'",
                    kind,
                    item.id,
                    item.stage
                );
                unresolved.push(item.clone());
            }
        }
    }

    for column in &mut columns {
        // `sort_by` is stable.
        column.entries.sort_by(compare_entries);
    }

    BoardProjection {
        kind,
        columns,
        unresolved,
    }
}

/// One board's working copy of its items.
///
/// Mutations that succeeded against the store are applied here directly so
/// the board reflects them without a re-fetch.
#[derive(Debug, Clone)]
pub struct BoardState {
    kind: PipelineKind,
    items: Vec<PipelineItem>,
}

impl BoardState {
    pub fn new(kind: PipelineKind, items: Vec<PipelineItem>) -> Self {
        Self { kind, items }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn items(&self) -> &[PipelineItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&PipelineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Swap in the new version of an item, keeping its position. Returns false
    /// when the item is not on this board.
    pub fn replace(&mut self, item: PipelineItem) -> bool {
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, item: PipelineItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, id: &str) -> Option<PipelineItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn filter(&self, query: &BoardQuery) -> Vec<&PipelineItem> {
        query.apply(&self.items)
    }

    /// Full board, archived items hidden.
    pub fn project(&self, today: NaiveDate, tz: Tz) -> BoardProjection {
        self.project_filtered(&BoardQuery::default(), today, tz)
    }

    pub fn project_filtered(&self, query: &BoardQuery, today: NaiveDate, tz: Tz) -> BoardProjection {
        let visible: Vec<PipelineItem> = query.apply(&self.items).into_iter().cloned().collect();
        project(&visible, self.kind, today, tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TZ: Tz = chrono_tz::Europe::Berlin;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn player(id: &str, name: &str, stage: &str, created: &str, offset: Option<i64>) -> PipelineItem {
        let record = json!({
            "id": id,
            "name": name,
            "status": stage,
            "created_at": created,
            "reminder_days": offset,
        });
        PipelineItem::from_record(PipelineKind::Scouting, record.as_object().unwrap()).unwrap()
    }

    #[test]
    fn equal_urgency_ties_break_by_name() {
        let items = vec![
            player("b", "Bauer", "gesichtet", "2024-01-01T09:00:00Z", Some(5)),
            player("a", "Adler", "gesichtet", "2024-01-01T09:00:00Z", Some(5)),
        ];
        let board = project(&items, PipelineKind::Scouting, today(), TZ);
        let column = board.column("gesichtet").unwrap();
        assert_eq!(column.entries[0].urgency, Some(Urgency::Overdue(4)));
        assert_eq!(board.ids("gesichtet"), vec!["a", "b"]);
    }

    #[test]
    fn most_urgent_first_unclassified_last() {
        let items = vec![
            player("none", "Anton", "gesichtet", "2024-01-01T09:00:00Z", None),
            player("soon", "Berta", "gesichtet", "2024-01-09T09:00:00Z", Some(3)),
            player("late", "Cäsar", "gesichtet", "2024-01-01T09:00:00Z", Some(2)),
            player("today", "Dora", "gesichtet", "2024-01-10T09:00:00Z", Some(0)),
            player("sentinel", "Emil", "gesichtet", "2024-01-01T09:00:00Z", Some(-1)),
        ];
        let board = project(&items, PipelineKind::Scouting, today(), TZ);
        assert_eq!(
            board.ids("gesichtet"),
            vec!["late", "today", "soon", "none", "sentinel"]
        );
    }

    #[test]
    fn identical_keys_keep_input_order() {
        let items = vec![
            player("first", "Müller", "in_kontakt", "2024-01-05T09:00:00Z", Some(1)),
            player("second", "Müller", "in_kontakt", "2024-01-05T09:00:00Z", Some(1)),
        ];
        for _ in 0..3 {
            let board = project(&items, PipelineKind::Scouting, today(), TZ);
            assert_eq!(board.ids("in_kontakt"), vec!["first", "second"]);
        }
    }

    #[test]
    fn buckets_follow_registry_and_keep_empty_columns() {
        let items = vec![
            player("p1", "Adler", "in_kontakt", "2024-01-05T09:00:00Z", None),
            player("p2", "Bauer", "gesichtet", "2024-01-05T09:00:00Z", None),
        ];
        let board = project(&items, PipelineKind::Scouting, today(), TZ);
        let order: Vec<&str> = board.columns.iter().map(|c| c.stage.id).collect();
        assert_eq!(order, vec!["gesichtet", "in_beobachtung", "in_kontakt"]);
        assert!(board.column("in_beobachtung").unwrap().entries.is_empty());
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn unknown_stage_goes_to_unresolved() {
        let items = vec![
            player("p1", "Adler", "zu_kontaktieren", "2024-01-05T09:00:00Z", None),
            player("p2", "Bauer", "gesichtet", "2024-01-05T09:00:00Z", None),
        ];
        let board = project(&items, PipelineKind::Scouting, today(), TZ);
        assert_eq!(board.len(), 1);
        assert_eq!(board.unresolved.len(), 1);
        assert_eq!(board.unresolved[0].id, "p1");
    }

    #[test]
    fn missing_anchor_is_unclassified_not_fatal() {
        let mut broken = player("x", "Adler", "gesichtet", "garbage", Some(3));
        broken.created_at = None;
        let ok = player("y", "Zeller", "gesichtet", "2024-01-09T09:00:00Z", Some(3));
        let board = project(&[broken, ok], PipelineKind::Scouting, today(), TZ);
        assert_eq!(board.ids("gesichtet"), vec!["y", "x"]);
        assert_eq!(board.column("gesichtet").unwrap().entries[1].urgency, None);
    }

    #[test]
    fn state_replace_and_remove() {
        let mut state = BoardState::new(
            PipelineKind::Scouting,
            vec![
                player("p1", "Adler", "gesichtet", "2024-01-05T09:00:00Z", None),
                player("p2", "Bauer", "gesichtet", "2024-01-05T09:00:00Z", None),
            ],
        );

        let mut moved = state.get("p1").unwrap().clone();
        moved.stage = "in_kontakt".to_string();
        assert!(state.replace(moved));
        let board = state.project(today(), TZ);
        assert_eq!(board.ids("in_kontakt"), vec!["p1"]);

        assert!(state.remove("p2").is_some());
        assert!(state.remove("p2").is_none());
        assert_eq!(state.project(today(), TZ).len(), 1);

        let stranger = player("zz", "Zeller", "gesichtet", "2024-01-05T09:00:00Z", None);
        assert!(!state.replace(stranger));
    }
}
