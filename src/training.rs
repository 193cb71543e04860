//! Gate in front of model training: a pay event may only be used once its
//! unit cost is validated and its activity type is known.

use crate::error::PipelineError;
use crate::models::{Community, EventRecord};

fn in_scope(event: &EventRecord, community: Option<&Community>) -> bool {
    event.is_paid() && community.map_or(true, |c| &event.community == c)
}

fn blocking_reason(event: &EventRecord) -> Option<&'static str> {
    match (event.cost_validated, event.is_categorized()) {
        (true, true) => None,
        (false, true) => Some("unit cost not validated"),
        (true, false) => Some("activity type missing"),
        (false, false) => Some("unit cost not validated, activity type missing"),
    }
}

/// Pay events a model may be trained on, or the list of events that block
/// training.
pub fn training_rows<'a>(
    events: &'a [EventRecord],
    community: Option<&Community>,
) -> Result<Vec<&'a EventRecord>, PipelineError> {
    let scoped: Vec<&EventRecord> = events.iter().filter(|e| in_scope(e, community)).collect();

    let blocked: Vec<String> = scoped
        .iter()
        .filter_map(|event| {
            blocking_reason(event)
                .map(|reason| format!("{} {} [{}]: {}", event.name, event.date, event.community, reason))
        })
        .collect();

    if blocked.is_empty() {
        Ok(scoped)
    } else {
        Err(PipelineError::TrainingPrecondition { events: blocked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_events;
    use crate::models::{AttendanceStatus, RawAttendanceRecord};
    use chrono::NaiveDate;

    fn event(name: &str, community: &str, price: f64) -> EventRecord {
        let record = RawAttendanceRecord {
            attendee: "ANA".to_string(),
            paid: price > 0.0,
            status: AttendanceStatus::Attended,
            attended: true,
            price,
            source_file: format!("{name}.csv"),
            event_name: name.to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            community: Community::new(community),
        };
        aggregate_events(&[record]).remove(0)
    }

    #[test]
    fn unvalidated_pay_event_blocks_training() {
        let mut ready = event("Runbrunch", "GIRONA", 15.0);
        ready.cost_validated = true;
        ready.activity = "brunch".to_string();
        let pending = event("Trail", "GIRONA", 10.0);

        let err = training_rows(&[ready, pending], None).unwrap_err();
        match err {
            PipelineError::TrainingPrecondition { events } => {
                assert_eq!(events.len(), 1);
                assert!(events[0].starts_with("Trail 2025-03-09 [GIRONA]"));
                assert!(events[0].contains("unit cost not validated, activity type missing"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn free_events_and_other_communities_are_ignored() {
        let mut ready = event("Runbrunch", "GIRONA", 15.0);
        ready.cost_validated = true;
        ready.activity = "brunch".to_string();
        let free = event("Los Jueves", "GIRONA", 0.0);
        let elsewhere = event("Trail", "ELCHE", 10.0);
        let events = vec![ready, free, elsewhere];

        let rows = training_rows(&events, Some(&Community::new("girona"))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Runbrunch");
    }
}
