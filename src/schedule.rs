use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::models::{Community, EventRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSuggestion {
    #[serde(rename = "FECHA_SUGERIDA")]
    pub date: NaiveDate,
    #[serde(rename = "COMUNIDAD")]
    pub community: Community,
}

/// First Sunday at least `days_between` days after the community's last pay
/// event.
pub fn suggest_next_date(
    events: &[EventRecord],
    community: &Community,
    days_between: i64,
) -> Option<DateSuggestion> {
    let last = events
        .iter()
        .filter(|e| &e.community == community && e.is_paid())
        .map(|e| e.date)
        .max()?;

    let mut date = last + Duration::days(days_between);
    while date.weekday() != Weekday::Sun {
        date += Duration::days(1);
    }

    Some(DateSuggestion {
        date,
        community: community.clone(),
    })
}
