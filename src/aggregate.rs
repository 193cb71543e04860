use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::models::{
    AttendanceStatus, Community, EventRecord, EventType, RawAttendanceRecord, Season,
    DEFAULT_ACTIVITY,
};

#[derive(Default)]
struct Tally {
    registered: u32,
    paid: u32,
    attended: u32,
    pending: u32,
    revenue: f64,
}

/// One row per (event name, date, community), ordered by date, community
/// and name. Manual fields start at their neutral defaults.
pub fn aggregate_events(records: &[RawAttendanceRecord]) -> Vec<EventRecord> {
    let mut groups: BTreeMap<(NaiveDate, Community, String), Tally> = BTreeMap::new();

    for record in records {
        let tally = groups
            .entry((
                record.event_date,
                record.community.clone(),
                record.event_name.clone(),
            ))
            .or_default();
        tally.registered += 1;
        tally.paid += u32::from(record.paid);
        tally.attended += u32::from(record.attended);
        tally.pending += u32::from(record.status == AttendanceStatus::Pending);
        tally.revenue += record.price;
    }

    groups
        .into_iter()
        .map(|((date, community, name), tally)| build_event(name, date, community, tally))
        .collect()
}

fn build_event(name: String, date: NaiveDate, community: Community, tally: Tally) -> EventRecord {
    let average_price = if tally.paid > 0 {
        tally.revenue / tally.paid as f64
    } else {
        0.0
    };
    let event_type = if average_price > 0.0 {
        EventType::Paid
    } else {
        EventType::Free
    };

    let mut event = EventRecord {
        name,
        date,
        community,
        registered: tally.registered,
        paid: tally.paid,
        attended: tally.attended,
        pending: tally.pending,
        revenue: tally.revenue,
        average_price,
        event_type,
        day_of_month: date.day(),
        weekday: date.format("%A").to_string(),
        weekday_num: date.weekday().num_days_from_monday(),
        iso_week: date.iso_week().week(),
        week_of_month: week_of_month(date),
        month: date.month(),
        year: date.year(),
        season: Season::from_month(date.month()),
        unit_cost: 0.0,
        cost_validated: false,
        collaboration: false,
        activity: DEFAULT_ACTIVITY.to_string(),
        estimated_cost: 0.0,
        estimated_profit: 0.0,
    };
    event.refresh_estimates();
    event
}

pub fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        name: &str,
        date: NaiveDate,
        paid: bool,
        price: f64,
        status: AttendanceStatus,
    ) -> RawAttendanceRecord {
        RawAttendanceRecord {
            attendee: "ANA".to_string(),
            paid,
            status,
            attended: status == AttendanceStatus::Attended,
            price,
            source_file: format!("{name}.csv"),
            event_name: name.to_string(),
            event_date: date,
            community: Community::new("GIRONA"),
        }
    }

    #[test]
    fn paid_event_scenario() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut records: Vec<RawAttendanceRecord> = (0..20)
            .map(|_| record("Sisterhood Premium", date, true, 12.0, AttendanceStatus::Attended))
            .collect();
        records.push(record("Sisterhood Premium", date, false, 0.0, AttendanceStatus::Absent));
        records.push(record("Sisterhood Premium", date, false, 0.0, AttendanceStatus::Attended));

        let events = aggregate_events(&records);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.registered, 22);
        assert_eq!(event.paid, 20);
        assert_eq!(event.attended, 21);
        assert_eq!(event.revenue, 240.0);
        assert_eq!(event.average_price, 12.0);
        assert_eq!(event.event_type, EventType::Paid);
        assert_eq!(event.weekday, "Tuesday");
        assert_eq!(event.weekday_num, 1);
        assert_eq!(event.iso_week, 10);
        assert_eq!(event.week_of_month, 1);
        assert_eq!(event.season, Season::Spring);
        assert_eq!(event.activity, "otro");
        assert!(!event.cost_validated);
    }

    #[test]
    fn free_event_when_nobody_paid() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
        let events = aggregate_events(&[
            record("Runbreakfast", date, false, 0.0, AttendanceStatus::Attended),
            record("Runbreakfast", date, false, 0.0, AttendanceStatus::Pending),
        ]);
        assert_eq!(events[0].event_type, EventType::Free);
        assert_eq!(events[0].average_price, 0.0);
        assert_eq!(events[0].pending, 1);
    }

    #[test]
    fn groups_by_name_date_and_community_and_orders_by_date() {
        let early = NaiveDate::from_ymd_opt(2024, 12, 22).unwrap();
        let late = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let mut elche = record("Los Jueves", late, false, 0.0, AttendanceStatus::Attended);
        elche.community = Community::new("ELCHE");
        let events = aggregate_events(&[
            record("Los Jueves", late, false, 0.0, AttendanceStatus::Attended),
            elche,
            record("Pre Xmas Runbrunch", early, true, 15.0, AttendanceStatus::Attended),
        ]);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].name, "Pre Xmas Runbrunch");
        assert_eq!(events[1].community.as_str(), "ELCHE");
        assert_eq!(events[2].community.as_str(), "GIRONA");
        for event in &events {
            assert!(event.attended <= event.registered);
            assert!(event.revenue >= 0.0);
        }
    }

    #[test]
    fn week_within_month() {
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()), 1);
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()), 2);
        assert_eq!(week_of_month(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()), 5);
    }
}
