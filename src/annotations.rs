//! Operator-entered event attributes and their merge onto the aggregated
//! table.
//!
//! Three sources feed the manual columns of an event, by precedence: the
//! annotation side file, the taxonomy (activity only) and the previous
//! canonical dataset. A validation recorded anywhere is kept: the merge
//! only ever adds validations. Previous rows carrying manual data stay in the
//! dataset even when no export produced them this run.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::dataset;
use crate::error::Result;
use crate::models::{EventRecord, ManualAnnotation};
use crate::taxonomy::Taxonomy;

pub fn load_annotations(path: &Path) -> Result<Vec<ManualAnnotation>> {
    dataset::read_rows_if_exists(path)
}

pub fn save_annotations(path: &Path, annotations: &[ManualAnnotation]) -> Result<()> {
    let mut sorted = annotations.to_vec();
    sorted.sort_by(|a, b| (a.date, &a.name).cmp(&(b.date, &b.name)));
    dataset::write_rows(path, &sorted)
}

/// Replaces the annotation with the same event key, or appends it.
/// Returns `true` when an existing entry was updated.
pub fn upsert(annotations: &mut Vec<ManualAnnotation>, update: ManualAnnotation) -> bool {
    let key = update.key();
    match annotations.iter_mut().find(|existing| existing.key() == key) {
        Some(existing) => {
            *existing = update;
            true
        }
        None => {
            annotations.push(update);
            false
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub annotated: usize,
    pub carried_from_previous: usize,
    pub validations_preserved: usize,
    /// Previous rows kept although no export produced them this run.
    pub retained_without_export: usize,
}

fn has_manual_data(event: &EventRecord) -> bool {
    event.cost_validated || event.unit_cost != 0.0 || event.collaboration || event.is_categorized()
}

pub fn merge_manual_fields(
    events: &mut Vec<EventRecord>,
    annotations: &[ManualAnnotation],
    previous: &[EventRecord],
    taxonomy: &Taxonomy,
) -> MergeStats {
    // last annotation for a key wins, first previous row wins
    let by_key: HashMap<String, &ManualAnnotation> =
        annotations.iter().map(|a| (a.key(), a)).collect();
    let mut prior_by_key: HashMap<String, &EventRecord> = HashMap::new();
    for event in previous {
        prior_by_key.entry(event.key()).or_insert(event);
    }

    let mut stats = MergeStats::default();

    let fresh: HashSet<String> = events.iter().map(EventRecord::key).collect();
    let mut retained = HashSet::new();
    for prior in prior_by_key.values() {
        let key = prior.key();
        if !fresh.contains(&key) && has_manual_data(prior) {
            debug!(event = %key, "keeping event with no export this run");
            events.push((*prior).clone());
            retained.insert(key);
        }
    }
    stats.retained_without_export = retained.len();

    for event in events.iter_mut() {
        let key = event.key();
        let prior = prior_by_key.get(&key).copied();
        let annotation = by_key.get(&key).copied();

        if let Some(prior) = prior.filter(|_| !retained.contains(&key)) {
            event.unit_cost = prior.unit_cost;
            event.cost_validated = prior.cost_validated;
            event.collaboration = prior.collaboration;
            stats.carried_from_previous += 1;
        }

        if let Some(annotation) = annotation {
            if let Some(cost) = annotation.unit_cost {
                if annotation.validated || !event.cost_validated {
                    event.unit_cost = cost;
                } else {
                    debug!(event = %key, "keeping previously validated cost");
                }
            }
            if event.cost_validated && !annotation.validated {
                stats.validations_preserved += 1;
            }
            event.cost_validated |= annotation.validated;
            if let Some(collaboration) = annotation.collaboration {
                event.collaboration = collaboration;
            }
            stats.annotated += 1;
        }

        event.activity = resolve_activity(event, annotation, prior, taxonomy);
        event.refresh_estimates();
    }

    info!(
        annotated = stats.annotated,
        carried = stats.carried_from_previous,
        preserved = stats.validations_preserved,
        retained = stats.retained_without_export,
        "manual fields merged"
    );
    stats
}

fn resolve_activity(
    event: &EventRecord,
    annotation: Option<&ManualAnnotation>,
    prior: Option<&EventRecord>,
    taxonomy: &Taxonomy,
) -> String {
    let from_annotation = annotation
        .and_then(|a| a.activity.as_deref())
        .map(str::trim)
        .filter(|activity| !activity.is_empty() && *activity != crate::models::DEFAULT_ACTIVITY);
    let from_prior = prior
        .filter(|p| p.is_categorized())
        .map(|p| p.activity.as_str());

    from_annotation
        .or_else(|| taxonomy.activity_for(&event.name))
        .or(from_prior)
        .unwrap_or(crate::models::DEFAULT_ACTIVITY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_events;
    use crate::models::{AttendanceStatus, Community, RawAttendanceRecord, TaxonomyEntry};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn premium() -> Vec<EventRecord> {
        let records: Vec<RawAttendanceRecord> = (0..10)
            .map(|_| RawAttendanceRecord {
                attendee: "ANA".to_string(),
                paid: true,
                status: AttendanceStatus::Attended,
                attended: true,
                price: 12.0,
                source_file: "sisterhood-premium-05-de-marc-del-2024-aa11bb.csv".to_string(),
                event_name: "Sisterhood Premium".to_string(),
                event_date: date(),
                community: Community::new("GIRONA"),
            })
            .collect();
        aggregate_events(&records)
    }

    fn annotation(cost: Option<f64>, validated: bool, activity: Option<&str>) -> ManualAnnotation {
        ManualAnnotation {
            name: "sisterhood premium".to_string(),
            date: date(),
            unit_cost: cost,
            validated,
            collaboration: Some(true),
            activity: activity.map(str::to_string),
        }
    }

    #[test]
    fn annotation_fields_are_applied_by_normalized_key() {
        let mut events = premium();
        let stats = merge_manual_fields(
            &mut events,
            &[annotation(Some(4.5), true, Some("running"))],
            &[],
            &Taxonomy::default(),
        );

        let event = &events[0];
        assert_eq!(stats.annotated, 1);
        assert_eq!(event.unit_cost, 4.5);
        assert!(event.cost_validated);
        assert!(event.collaboration);
        assert_eq!(event.activity, "running");
        assert_eq!(event.estimated_cost, 45.0);
        assert_eq!(event.estimated_profit, 75.0);
    }

    #[test]
    fn unannotated_event_keeps_neutral_defaults() {
        let mut events = premium();
        merge_manual_fields(&mut events, &[], &[], &Taxonomy::default());
        assert_eq!(events[0].unit_cost, 0.0);
        assert!(!events[0].cost_validated);
        assert_eq!(events[0].activity, "otro");
    }

    #[test]
    fn previous_validation_is_never_downgraded() {
        let mut previous = premium();
        previous[0].unit_cost = 5.0;
        previous[0].cost_validated = true;
        previous[0].activity = "brunch".to_string();
        // numbers recomputed from new raw data
        previous[0].registered = 99;

        let mut events = premium();
        let stats = merge_manual_fields(
            &mut events,
            &[annotation(Some(1.0), false, None)],
            &previous,
            &Taxonomy::default(),
        );

        let event = &events[0];
        assert!(event.cost_validated);
        assert_eq!(event.unit_cost, 5.0);
        assert_eq!(event.registered, 10);
        assert_eq!(event.activity, "brunch");
        assert_eq!(stats.validations_preserved, 1);
    }

    #[test]
    fn validated_event_survives_a_run_without_its_export() {
        let mut previous = premium();
        previous[0].unit_cost = 3.0;
        previous[0].cost_validated = true;
        previous[0].activity = "running".to_string();
        previous[0].refresh_estimates();

        let mut events = Vec::new();
        let stats = merge_manual_fields(&mut events, &[], &previous, &Taxonomy::default());

        assert_eq!(stats.retained_without_export, 1);
        assert_eq!(stats.carried_from_previous, 0);
        assert_eq!(events, previous);
    }

    #[test]
    fn previous_rows_without_manual_data_are_dropped_with_their_export() {
        let previous = premium();
        let mut events = Vec::new();
        let stats = merge_manual_fields(&mut events, &[], &previous, &Taxonomy::default());
        assert_eq!(stats.retained_without_export, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn blank_collaboration_keeps_the_stored_value() {
        let mut previous = premium();
        previous[0].collaboration = true;

        let mut blank = annotation(Some(4.0), true, None);
        blank.collaboration = None;
        let mut events = premium();
        merge_manual_fields(&mut events, &[blank], &previous, &Taxonomy::default());
        assert!(events[0].collaboration);
        assert_eq!(events[0].unit_cost, 4.0);

        let mut cleared = annotation(None, false, None);
        cleared.collaboration = Some(false);
        let mut events = premium();
        merge_manual_fields(&mut events, &[cleared], &previous, &Taxonomy::default());
        assert!(!events[0].collaboration);
    }

    #[test]
    fn blank_manual_cells_in_side_file_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anotaciones_manuales.csv");
        std::fs::write(
            &path,
            "NOMBRE_EVENTO,FECHA_EVENTO,COSTE_UNITARIO,COSTE_UNITARIO_VALIDADO,COLABORACION,TIPO_ACTIVIDAD\n\
             Sisterhood Premium,2024-03-05,4,true,,\n",
        )
        .unwrap();
        let loaded = load_annotations(&path).unwrap();
        assert_eq!(loaded[0].collaboration, None);
        assert_eq!(loaded[0].activity, None);
        assert!(loaded[0].validated);
    }

    #[test]
    fn validated_annotation_updates_a_validated_cost() {
        let mut previous = premium();
        previous[0].unit_cost = 5.0;
        previous[0].cost_validated = true;

        let mut events = premium();
        merge_manual_fields(
            &mut events,
            &[annotation(Some(6.0), true, None)],
            &previous,
            &Taxonomy::default(),
        );
        assert_eq!(events[0].unit_cost, 6.0);
        assert!(events[0].cost_validated);
    }

    #[test]
    fn taxonomy_fills_activity_when_annotation_has_none() {
        let taxonomy = Taxonomy::new(vec![TaxonomyEntry {
            event: "Sisterhood Premium".to_string(),
            activity: "running".to_string(),
        }]);
        let mut events = premium();
        merge_manual_fields(&mut events, &[annotation(None, false, Some("otro"))], &[], &taxonomy);
        assert_eq!(events[0].activity, "running");
    }

    #[test]
    fn upsert_updates_in_place_by_key() {
        let mut annotations = vec![annotation(Some(1.0), false, None)];
        let mut update = annotation(Some(3.0), true, Some("yoga"));
        update.name = "Sisterhood PREMIUM".to_string();

        assert!(upsert(&mut annotations, update));
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].unit_cost, Some(3.0));

        let mut other = annotation(None, false, None);
        other.date = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        assert!(!upsert(&mut annotations, other));
        assert_eq!(annotations.len(), 2);
    }

    #[test]
    fn annotations_round_trip_through_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anotaciones_manuales.csv");
        assert!(load_annotations(&path).unwrap().is_empty());

        let annotations = vec![annotation(Some(2.5), true, Some("running")), {
            let mut empty = annotation(None, false, None);
            empty.date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            empty
        }];
        save_annotations(&path, &annotations).unwrap();
        let loaded = load_annotations(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].unit_cost, None);
        assert_eq!(loaded[0].activity, None);
        assert_eq!(loaded[1].unit_cost, Some(2.5));
        assert!(loaded[1].validated);
    }
}
