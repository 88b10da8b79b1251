//! Legacy stage vocabulary repairs.
//!
//! Early builds stored German status words that no longer exist on the boards
//! ("zu_kontaktieren", "archiviert", ...). Before every full fetch the board
//! service rewrites those to the current registry. Idempotent: once no record
//! carries a retired id, a run is a read-only scan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::records::{self, ARCHIVED};
use crate::stages::{self, PipelineKind};
use crate::store::{record_id, Record, RecordStore};

/// What a retired stage id turns into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRule {
    pub stage: String,
    /// Extra fields overwritten alongside the stage, e.g. `archived: true`.
    #[serde(flatten)]
    pub set: Record,
}

/// A mapping entry as written in config: a bare stage id or a full rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyTarget {
    Stage(String),
    Rule(LegacyRule),
}

/// Retired stage id -> replacement.
///
/// Deserializes from either `{"old": "new"}` or
/// `{"old": {"stage": "new", "archived": true}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, LegacyTarget>",
    into = "BTreeMap<String, LegacyRule>"
)]
pub struct LegacyMapping {
    rules: BTreeMap<String, LegacyRule>,
}

impl From<LegacyMapping> for BTreeMap<String, LegacyRule> {
    fn from(mapping: LegacyMapping) -> Self {
        mapping.rules
    }
}

impl From<BTreeMap<String, LegacyTarget>> for LegacyMapping {
    fn from(raw: BTreeMap<String, LegacyTarget>) -> Self {
        let rules = raw
            .into_iter()
            .map(|(from, target)| {
                let rule = match target {
                    LegacyTarget::Stage(stage) => LegacyRule {
                        stage,
                        set: Record::new(),
                    },
                    LegacyTarget::Rule(rule) => rule,
                };
                (from, rule)
            })
            .collect();
        Self { rules }
    }
}

impl LegacyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.rules.insert(
            from.to_string(),
            LegacyRule {
                stage: to.to_string(),
                set: Record::new(),
            },
        );
        self
    }

    pub fn rename_and_set(mut self, from: &str, to: &str, field: &str, value: Value) -> Self {
        let mut set = Record::new();
        set.insert(field.to_string(), value);
        self.rules.insert(
            from.to_string(),
            LegacyRule {
                stage: to.to_string(),
                set,
            },
        );
        self
    }

    pub fn rule(&self, retired: &str) -> Option<&LegacyRule> {
        self.rules.get(retired)
    }

    /// Built-in vocabulary retired by earlier releases.
    pub fn defaults(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::Scouting => Self::new()
                .rename("zu_kontaktieren", "in_beobachtung")
                .rename("kontaktiert", "in_kontakt")
                .rename("talentpool", "gesichtet")
                .rename_and_set("archiviert", "gesichtet", ARCHIVED, json!(true)),
            PipelineKind::Transfer => Self::new()
                .rename("offen", "interessiert")
                .rename("absage", "abgesagt")
                .rename_and_set("archiviert", "idee", ARCHIVED, json!(true)),
            PipelineKind::Task => Self::new()
                .rename("high", "hoch")
                .rename("medium", "mittel")
                .rename("low", "niedrig"),
        }
    }

    /// Every replacement must be a live stage, and no retired id may still be live.
    fn validate(&self, kind: PipelineKind) -> Result<(), EngineError> {
        for (from, rule) in &self.rules {
            if !stages::is_valid_stage(kind, &rule.stage) {
                return Err(EngineError::InvalidStage {
                    kind,
                    stage: rule.stage.clone(),
                });
            }
            if stages::is_valid_stage(kind, from) {
                return Err(EngineError::validation(
                    "legacy mapping",
                    format!("'{from}' is a current {kind} stage and cannot be retired"),
                ));
            }
        }
        Ok(())
    }
}

/// One record that needs rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRewrite {
    pub id: String,
    pub from: String,
    pub patch: Record,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct LegacyStatusMigrator {
    kind: PipelineKind,
    mapping: LegacyMapping,
}

impl LegacyStatusMigrator {
    pub fn new(kind: PipelineKind, mapping: LegacyMapping) -> Result<Self, EngineError> {
        mapping.validate(kind)?;
        Ok(Self { kind, mapping })
    }

    pub fn with_defaults(kind: PipelineKind) -> Self {
        Self {
            kind,
            mapping: LegacyMapping::defaults(kind),
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Records whose stage is retired, with the patch that repairs each.
    pub fn plan(&self, records: &[Record]) -> Vec<PlannedRewrite> {
        let stage_field = records::contract(self.kind).stage_field;
        records
            .iter()
            .filter_map(|record| {
                let id = record_id(record)?;
                let current = record.get(stage_field)?.as_str()?.trim();
                let rule = self.mapping.rule(current)?;

                let mut patch = rule.set.clone();
                patch.insert(stage_field.to_string(), Value::String(rule.stage.clone()));
                Some(PlannedRewrite {
                    id: id.to_string(),
                    from: current.to_string(),
                    patch,
                })
            })
            .collect()
    }

    /// Persist every planned rewrite, best-effort.
    ///
    /// `records` is patched in place for every match, including ones whose
    /// write failed, so the caller's view never shows a retired stage. Failed
    /// rows are retried naturally on the next fetch.
    pub fn migrate<S: RecordStore>(&self, store: &S, records: &mut [Record]) -> MigrationReport {
        let collection = records::contract(self.kind).collection;
        let planned = self.plan(records);
        let mut report = MigrationReport {
            scanned: records.len(),
            ..MigrationReport::default()
        };

        for rewrite in planned {
            match store.update(collection, &rewrite.id, &rewrite.patch) {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!(
                        "Legacy stage '{}' on {}/{} not migrated: {}",
                        rewrite.from,
                        collection,
                        rewrite.id,
                        e
                    );
                }
            }

            if let Some(record) = records
                .iter_mut()
                .find(|r| record_id(r) == Some(rewrite.id.as_str()))
            {
                for (key, value) in rewrite.patch {
                    record.insert(key, value);
                }
            }
        }

        if report.migrated > 0 || report.failed > 0 {
            log::info!(
                "Legacy {} stages: {} migrated, {} failed ({} scanned)",
                self.kind,
                report.migrated,
                report.failed,
                report.scanned
            );
        }
        report
    }
}
