//! Typed attendance records from untyped export rows.
//!
//! Pending attendance has no ground truth. It is resolved with a seeded draw
//! so reruns are reproducible, and each event keeps its pending count so a
//! consumer can treat those rows as missing instead.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::{AttendanceConfig, IngestConfig};
use crate::ingest::{SourceFile, SourceRow};
use crate::models::{AttendanceStatus, RawAttendanceRecord};
use crate::text;

#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<RawAttendanceRecord>,
    pub admin_rows_dropped: usize,
    pub imputed: usize,
}

pub fn parse_paid(raw: Option<&str>) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    let value = text::match_form(raw);
    value.contains("true") || value.contains("si") || value.contains('1')
}

pub fn parse_attendance(raw: Option<&str>) -> AttendanceStatus {
    match raw.map(text::match_form).as_deref() {
        Some("attended") => AttendanceStatus::Attended,
        Some("absent") => AttendanceStatus::Absent,
        _ => AttendanceStatus::Pending,
    }
}

/// Invalid or negative amounts count as zero.
pub fn parse_price(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned = raw.replace(',', ".").replace('"', "");
    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        Ok(value) => {
            debug!(value, "discarding negative or non-finite price");
            0.0
        }
        Err(_) => 0.0,
    }
}

pub fn attendee_name(raw: &str) -> String {
    text::match_form(raw).to_uppercase()
}

pub fn normalize(
    files: &[SourceFile],
    ingest: &IngestConfig,
    attendance: &AttendanceConfig,
) -> NormalizeOutcome {
    let admins: Vec<String> = ingest
        .admin_accounts
        .iter()
        .map(|name| attendee_name(name))
        .collect();
    let mut rng = StdRng::seed_from_u64(attendance.seed);
    let mut outcome = NormalizeOutcome::default();

    for file in files {
        for row in &file.rows {
            let attendee = attendee_name(&row.name);
            if admins.contains(&attendee) {
                outcome.admin_rows_dropped += 1;
                continue;
            }

            let status = parse_attendance(row.attendance_status.as_deref());
            let attended = match status {
                AttendanceStatus::Attended => true,
                AttendanceStatus::Absent => false,
                AttendanceStatus::Pending if attendance.impute_pending => {
                    outcome.imputed += 1;
                    rng.random_bool(attendance.attended_probability)
                }
                AttendanceStatus::Pending => false,
            };

            outcome
                .records
                .push(to_record(file, row, attendee, status, attended));
        }
    }

    info!(
        records = outcome.records.len(),
        admin_rows_dropped = outcome.admin_rows_dropped,
        imputed = outcome.imputed,
        "normalization finished"
    );
    outcome
}

fn to_record(
    file: &SourceFile,
    row: &SourceRow,
    attendee: String,
    status: AttendanceStatus,
    attended: bool,
) -> RawAttendanceRecord {
    RawAttendanceRecord {
        attendee,
        paid: parse_paid(row.has_paid.as_deref()),
        status,
        attended,
        price: parse_price(row.price_paid.as_deref()),
        source_file: file.file_name.clone(),
        event_name: file.event_name.clone(),
        event_date: file.event_date,
        community: file.community.clone(),
    }
}
