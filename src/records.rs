//! Typed view over untyped store records.
//!
//! Each pipeline kind has a fixed field contract. Decoding never fails on a
//! missing optional field: the item simply loses the derived value that field
//! would have fed (no `created_at` means no urgency classification).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

use crate::stages::PipelineKind;
use crate::store::{record_id, Record};
use crate::urgency::{self, Urgency};

pub const REMINDERS_COLLECTION: &str = "reminders";

/// Field names a pipeline kind reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldContract {
    pub collection: &'static str,
    pub stage_field: &'static str,
    pub title_field: &'static str,
    pub offset_field: &'static str,
}

pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const COMPLETED: &str = "completed";
pub const COMPLETED_AT: &str = "completed_at";
pub const ARCHIVED: &str = "archived";
pub const OWNER_ID: &str = "owner_id";

pub fn contract(kind: PipelineKind) -> FieldContract {
    match kind {
        PipelineKind::Scouting => FieldContract {
            collection: "scouted_players",
            stage_field: "status",
            title_field: "name",
            offset_field: "reminder_days",
        },
        PipelineKind::Transfer => FieldContract {
            collection: "transfer_interests",
            stage_field: "status",
            title_field: "club_name",
            offset_field: "reminder_days",
        },
        PipelineKind::Task => FieldContract {
            collection: "tasks",
            stage_field: "priority",
            title_field: "title",
            offset_field: "reminder_days",
        },
    }
}

/// A scouted player, transfer interest, or task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineItem {
    pub id: String,
    pub kind: PipelineKind,
    pub stage: String,
    /// Urgency anchor. Reset to "now" whenever the offset changes.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub urgency_offset_days: Option<u32>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived: bool,
    /// Display name or title; tie-break key within a column.
    pub title: String,
    pub owner_id: Option<String>,
    /// The full stored record, for facet filters and free-text search.
    #[serde(skip)]
    pub fields: Record,
}

impl PipelineItem {
    /// Decode a stored record. Returns `None` only when the record has no id.
    pub fn from_record(kind: PipelineKind, record: &Record) -> Option<Self> {
        let id = record_id(record)?.to_string();
        let c = contract(kind);

        Some(Self {
            id,
            kind,
            stage: str_field(record, c.stage_field).unwrap_or_default(),
            created_at: record.get(CREATED_AT).and_then(timestamp_value),
            updated_at: record.get(UPDATED_AT).and_then(timestamp_value),
            urgency_offset_days: urgency::parse_offset(
                record.get(c.offset_field).and_then(int_value),
            ),
            completed: record.get(COMPLETED).map(bool_value).unwrap_or(false),
            completed_at: record.get(COMPLETED_AT).and_then(timestamp_value),
            archived: record.get(ARCHIVED).map(bool_value).unwrap_or(false),
            title: str_field(record, c.title_field).unwrap_or_default(),
            owner_id: str_field(record, OWNER_ID),
            fields: record.clone(),
        })
    }

    pub fn collection(&self) -> &'static str {
        contract(self.kind).collection
    }

    pub fn target_date(&self, tz: Tz) -> Option<NaiveDate> {
        urgency::target_date(self.created_at?, self.urgency_offset_days?, tz)
    }

    /// Classification for display. `None` when the item has no offset or no anchor.
    pub fn urgency(&self, today: NaiveDate, tz: Tz) -> Option<Urgency> {
        urgency::urgency_of(self.created_at?, self.urgency_offset_days, today, tz)
    }

    /// A field rendered as text for facet matching. Arrays and objects are skipped.
    pub fn field_text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn str_field(record: &Record, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Integers, integral floats, and numeric strings all count.
pub(crate) fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "true" | "1"),
        _ => false,
    }
}

pub(crate) fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

/// Accepts RFC 3339, SQLite `datetime()` output, and bare `YYYY-MM-DD`.
///
/// Bare dates are pinned to 12:00 UTC so they stay on the same calendar day in
/// every zone within twelve hours of UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a stored `YYYY-MM-DD` (or timestamp) as a calendar date in `tz`.
pub fn parse_calendar_date(s: &str, tz: Tz) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Some(d);
    }
    parse_timestamp(s).map(|dt| dt.with_timezone(&tz).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn decodes_scouting_record() {
        let item = PipelineItem::from_record(
            PipelineKind::Scouting,
            &rec(json!({
                "id": "p1",
                "name": "Lukas Adler",
                "status": "in_beobachtung",
                "created_at": "2024-01-01T09:00:00Z",
                "reminder_days": 5,
                "position": "IV",
                "birth_year": 2006,
                "owner_id": "advisor-1"
            })),
        )
        .expect("decode");

        assert_eq!(item.stage, "in_beobachtung");
        assert_eq!(item.title, "Lukas Adler");
        assert_eq!(item.urgency_offset_days, Some(5));
        assert_eq!(item.owner_id.as_deref(), Some("advisor-1"));
        assert_eq!(item.field_text("birth_year").as_deref(), Some("2006"));
        assert_eq!(item.collection(), "scouted_players");
        assert_eq!(
            item.target_date(chrono_tz::Europe::Berlin),
            NaiveDate::from_ymd_opt(2024, 1, 6)
        );
    }

    #[test]
    fn tolerates_missing_fields() {
        let item = PipelineItem::from_record(PipelineKind::Task, &rec(json!({"id": "t1"})))
            .expect("decode");
        assert_eq!(item.stage, "");
        assert_eq!(item.created_at, None);
        assert_eq!(item.urgency_offset_days, None);
        assert!(!item.completed);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(item.urgency(today, chrono_tz::UTC), None);
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(PipelineItem::from_record(PipelineKind::Task, &rec(json!({"title": "x"}))).is_none());
    }

    #[test]
    fn offset_sentinel_and_string_forms() {
        let decode = |v: Value| {
            PipelineItem::from_record(
                PipelineKind::Transfer,
                &rec(json!({"id": "t", "reminder_days": v})),
            )
            .unwrap()
            .urgency_offset_days
        };
        assert_eq!(decode(json!(-1)), None);
        assert_eq!(decode(json!(null)), None);
        assert_eq!(decode(json!("7")), Some(7));
        assert_eq!(decode(json!(3.0)), Some(3));
        assert_eq!(decode(json!(2.5)), None);
        assert_eq!(decode(json!("soon")), None);
    }

    #[test]
    fn completed_accepts_ints() {
        let item = PipelineItem::from_record(
            PipelineKind::Task,
            &rec(json!({"id": "t", "completed": 1, "archived": "true"})),
        )
        .unwrap();
        assert!(item.completed);
        assert!(item.archived);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-01-01T09:00:00+01:00").is_some());
        assert!(parse_timestamp("2024-01-01 09:00:00").is_some());
        let bare = parse_timestamp("2024-01-01").unwrap();
        assert_eq!(
            bare.with_timezone(&chrono_tz::America::New_York).date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(parse_timestamp("01.01.2024").is_none());
    }

    #[test]
    fn calendar_date_from_timestamp_uses_zone() {
        let d = parse_calendar_date("2023-12-31T23:30:00Z", chrono_tz::Europe::Berlin);
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 1, 1));
        let d = parse_calendar_date("2024-02-29", chrono_tz::UTC);
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 29));
    }
}
