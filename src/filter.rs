//! Free-text search plus multi-select facets over a flat item set.
//!
//! Facets are AND-combined across fields and OR-combined within one field's
//! selected values. Search is a case-insensitive substring match against any
//! of the kind's searchable fields.

use serde::{Deserialize, Serialize};

use crate::collation;
use crate::records::{contract, PipelineItem};
use crate::stages::PipelineKind;

/// Fields the search box looks at, besides the title.
pub fn searchable_fields(kind: PipelineKind) -> &'static [&'static str] {
    match kind {
        PipelineKind::Scouting => &["club", "position", "nationality", "notes", "agent_name"],
        PipelineKind::Transfer => &["player_name", "league", "contact_person", "notes"],
        PipelineKind::Task => &["description", "player_name"],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facet {
    pub field: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Facet {
    pub fn new(field: &str, values: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// A facet with nothing selected does not constrain anything.
    fn matches(&self, item: &PipelineItem) -> bool {
        if self.values.is_empty() {
            return true;
        }
        let Some(actual) = item.field_text(&self.field) else {
            return false;
        };
        let actual = actual.trim();
        self.values
            .iter()
            .any(|wanted| wanted.trim().eq_ignore_ascii_case(actual))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub facets: Vec<Facet>,
    #[serde(default)]
    pub include_archived: bool,
}

impl BoardQuery {
    pub fn search(text: &str) -> Self {
        Self {
            search: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn matches(&self, item: &PipelineItem) -> bool {
        if item.archived && !self.include_archived {
            return false;
        }
        if !self.facets.iter().all(|f| f.matches(item)) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => search_matches(item, needle),
        }
    }

    pub fn apply<'a>(&self, items: &'a [PipelineItem]) -> Vec<&'a PipelineItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }
}

fn search_matches(item: &PipelineItem, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let folded_needle = collation::fold(&needle);
    let hit = |haystack: &str| {
        let lower = haystack.to_lowercase();
        lower.contains(&needle) || collation::fold(&lower).contains(&folded_needle)
    };

    let title_field = contract(item.kind).title_field;
    std::iter::once(title_field)
        .chain(searchable_fields(item.kind).iter().copied())
        .filter_map(|field| item.field_text(field))
        .any(|text| hit(&text))
}
