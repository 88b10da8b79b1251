//! Optional agent lookup for scouted players.
//!
//! A player's profile page often names the agency representing them. The
//! lookup behind `AgentLookup` is best-effort: anything that goes wrong means
//! "no enrichment", never an error for the player record. Values the advisor
//! typed in always win over looked-up ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::records::PipelineItem;
use crate::store::Record;

pub const PROFILE_URL: &str = "profile_url";
pub const AGENT_NAME: &str = "agent_name";
pub const AGENT_AGENCY: &str = "agent_agency";
pub const AGENT_EMAIL: &str = "agent_email";
pub const AGENT_PHONE: &str = "agent_phone";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Profile page could not be parsed: {0}")]
    Parse(String),
}

pub trait AgentLookup: Send + Sync {
    fn lookup(&self, profile_url: &str) -> Result<Option<AgentContact>, EnrichmentError>;
}

/// The collaborator when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl AgentLookup for NoEnrichment {
    fn lookup(&self, _profile_url: &str) -> Result<Option<AgentContact>, EnrichmentError> {
        Ok(None)
    }
}

/// Only absolute http(s) URLs are handed to the lookup.
pub fn is_lookup_url(raw: &str) -> bool {
    url::Url::parse(raw.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Run the lookup, folding every failure into `None`.
pub fn enrich_agent(lookup: &dyn AgentLookup, profile_url: &str) -> Option<AgentContact> {
    if !is_lookup_url(profile_url) {
        return None;
    }
    match lookup.lookup(profile_url.trim()) {
        Ok(found) => found.filter(|c| !c.name.trim().is_empty()),
        Err(e) => {
            log::warn!("Agent lookup for {} unavailable: {}", profile_url, e);
            None
        }
    }
}

/// Fields to write onto the item: only ones that are currently empty.
/// `None` when there is nothing to fill.
pub fn agent_patch(item: &PipelineItem, contact: &AgentContact) -> Option<Record> {
    let candidates = [
        (AGENT_NAME, Some(contact.name.as_str())),
        (AGENT_AGENCY, contact.agency.as_deref()),
        (AGENT_EMAIL, contact.email.as_deref()),
        (AGENT_PHONE, contact.phone.as_deref()),
    ];

    let mut patch = Record::new();
    for (field, value) in candidates {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        let already_set = item
            .field_text(field)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !already_set {
            patch.insert(field.to_string(), Value::String(value.to_string()));
        }
    }

    (!patch.is_empty()).then_some(patch)
}
