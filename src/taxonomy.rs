//! Manual activity-type taxonomy (`EVENTO, TIPO_ACTIVIDAD`) and the
//! categorization stop that guards the canonical dataset.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::dataset;
use crate::error::{PipelineError, Result};
use crate::models::{EventRecord, TaxonomyEntry, DEFAULT_ACTIVITY};
use crate::text;

#[derive(Debug, Default, Clone)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
    index: HashMap<String, usize>,
}

impl Taxonomy {
    pub fn new(entries: Vec<TaxonomyEntry>) -> Self {
        let mut taxonomy = Taxonomy::default();
        for entry in entries {
            taxonomy.insert(entry);
        }
        taxonomy
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(dataset::read_rows_if_exists(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        dataset::write_rows(path, &self.entries)
    }

    /// Later entries for the same event replace earlier ones.
    fn insert(&mut self, entry: TaxonomyEntry) {
        let key = text::match_form(&entry.event);
        match self.index.get(&key) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn contains(&self, event_name: &str) -> bool {
        self.index.contains_key(&text::match_form(event_name))
    }

    /// Activity for an event name, ignoring blank and default entries.
    pub fn activity_for(&self, event_name: &str) -> Option<&str> {
        self.index
            .get(&text::match_form(event_name))
            .map(|&position| self.entries[position].activity.trim())
            .filter(|activity| !activity.is_empty() && *activity != DEFAULT_ACTIVITY)
    }

    /// Adds a default entry for every event name not listed yet.
    pub fn register_missing(&mut self, events: &[EventRecord]) -> usize {
        let mut added = 0;
        for event in events {
            if !self.contains(&event.name) {
                self.insert(TaxonomyEntry {
                    event: event.name.clone(),
                    activity: DEFAULT_ACTIVITY.to_string(),
                });
                added += 1;
            }
        }
        added
    }
}

#[derive(Debug, Serialize)]
struct PendingCategory<'a> {
    #[serde(rename = "NOMBRE_EVENTO")]
    name: &'a str,
    #[serde(rename = "FECHA_EVENTO")]
    date: chrono::NaiveDate,
    #[serde(rename = "COMUNIDAD")]
    community: &'a str,
}

/// Makes sure every event name has a taxonomy entry, then stops the run if
/// any event is still uncategorized. The pending events are written to
/// `pending_path` for the operator.
pub fn enforce_categorized(
    events: &[EventRecord],
    taxonomy_path: &Path,
    pending_path: &Path,
) -> Result<()> {
    let mut taxonomy = Taxonomy::load(taxonomy_path)?;
    let added = taxonomy.register_missing(events);
    if added > 0 || !taxonomy_path.exists() {
        taxonomy.save(taxonomy_path)?;
        info!(added, path = %taxonomy_path.display(), "taxonomy entries created");
    }

    let pending: Vec<PendingCategory<'_>> = events
        .iter()
        .filter(|event| !event.is_categorized())
        .map(|event| PendingCategory {
            name: &event.name,
            date: event.date,
            community: event.community.as_str(),
        })
        .collect();

    if pending.is_empty() {
        if pending_path.exists() {
            std::fs::remove_file(pending_path)
                .map_err(|err| PipelineError::io(pending_path, err))?;
        }
        info!("all events categorized");
        return Ok(());
    }

    dataset::write_rows(pending_path, &pending)?;
    warn!(
        count = pending.len(),
        taxonomy = %taxonomy_path.display(),
        "events without activity type"
    );
    Err(PipelineError::UncategorizedEvents {
        count: pending.len(),
        taxonomy: taxonomy_path.to_path_buf(),
        pending: pending_path.to_path_buf(),
    })
}
