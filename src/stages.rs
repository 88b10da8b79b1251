//! Fixed, ordered stage registries for the three pipelines.
//!
//! Registries are static configuration. Stage ids are the values persisted in
//! the record store, labels are what the board columns show.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which board a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Scouted players: talent pool, go candidates, active contact.
    Scouting,
    /// Club interest in a client: ideas, interested, declined.
    Transfer,
    /// Advisor tasks grouped by priority bucket.
    Task,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Scouting,
        PipelineKind::Transfer,
        PipelineKind::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::Scouting => "scouting",
            PipelineKind::Transfer => "transfer",
            PipelineKind::Task => "task",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scouting" => Ok(PipelineKind::Scouting),
            "transfer" => Ok(PipelineKind::Transfer),
            "task" | "tasks" => Ok(PipelineKind::Task),
            other => Err(format!("Unknown pipeline kind: {other}")),
        }
    }
}

/// One column of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: &'static str,
    pub label: &'static str,
    pub sort_weight: u8,
    pub color_hint: &'static str,
}

const SCOUTING_STAGES: &[Stage] = &[
    Stage {
        id: "gesichtet",
        label: "Talent-Pool",
        sort_weight: 0,
        color_hint: "#64748b",
    },
    Stage {
        id: "in_beobachtung",
        label: "Go-Kandidaten",
        sort_weight: 1,
        color_hint: "#f59e0b",
    },
    Stage {
        id: "in_kontakt",
        label: "Aktiver Kontakt",
        sort_weight: 2,
        color_hint: "#16a34a",
    },
];

const TRANSFER_STAGES: &[Stage] = &[
    Stage {
        id: "idee",
        label: "Ideen",
        sort_weight: 0,
        color_hint: "#6366f1",
    },
    Stage {
        id: "interessiert",
        label: "Offen / Interessiert",
        sort_weight: 1,
        color_hint: "#0ea5e9",
    },
    Stage {
        id: "abgesagt",
        label: "Abgesagt",
        sort_weight: 2,
        color_hint: "#dc2626",
    },
];

const TASK_BUCKETS: &[Stage] = &[
    Stage {
        id: "hoch",
        label: "Hoch",
        sort_weight: 0,
        color_hint: "#dc2626",
    },
    Stage {
        id: "mittel",
        label: "Mittel",
        sort_weight: 1,
        color_hint: "#f59e0b",
    },
    Stage {
        id: "niedrig",
        label: "Niedrig",
        sort_weight: 2,
        color_hint: "#16a34a",
    },
];

/// Ordered stages for a pipeline, lowest sort weight first.
pub fn stages_for(kind: PipelineKind) -> &'static [Stage] {
    match kind {
        PipelineKind::Scouting => SCOUTING_STAGES,
        PipelineKind::Transfer => TRANSFER_STAGES,
        PipelineKind::Task => TASK_BUCKETS,
    }
}

pub fn is_valid_stage(kind: PipelineKind, stage_id: &str) -> bool {
    stage(kind, stage_id).is_some()
}

pub fn stage(kind: PipelineKind, stage_id: &str) -> Option<&'static Stage> {
    stages_for(kind).iter().find(|s| s.id == stage_id)
}

/// Stage a freshly created item lands in.
pub fn initial_stage(kind: PipelineKind) -> &'static Stage {
    match kind {
        // New tasks default to the middle bucket, like an unprioritised P2.
        PipelineKind::Task => &TASK_BUCKETS[1],
        PipelineKind::Scouting => &SCOUTING_STAGES[0],
        PipelineKind::Transfer => &TRANSFER_STAGES[0],
    }
}
