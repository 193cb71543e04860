use std::fmt::Write;

use crate::pipeline::RunSummary;

pub fn build_run_report(summary: &RunSummary) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Pipeline Validation Report");
    let _ = writeln!(
        output,
        "Run {} started {}",
        summary.run_id,
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Files");
    let _ = writeln!(output, "- Found: {}", summary.files_discovered);
    let _ = writeln!(output, "- Processed: {}", summary.files_processed.len());
    let _ = writeln!(output, "- Excluded: {}", summary.files_skipped.len());
    let _ = writeln!(output, "- Malformed rows skipped: {}", summary.malformed_rows);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Excluded Files");
    if summary.files_skipped.is_empty() {
        let _ = writeln!(output, "All files were read correctly.");
    } else {
        for skipped in &summary.files_skipped {
            let _ = writeln!(output, "- {}: {}", skipped.file_name, skipped.reason);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Records");
    let _ = writeln!(output, "- Admin rows dropped: {}", summary.admin_rows_dropped);
    let _ = writeln!(
        output,
        "- Pending attendance imputed (seeded draw): {}",
        summary.imputed_attendance
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Events");
    let _ = writeln!(output, "- Written: {}", summary.events_written);
    let _ = writeln!(output, "- Pay events: {}", summary.pay_events);
    let _ = writeln!(
        output,
        "- Manual annotations applied: {} (carried from previous run: {}, validations preserved: {})",
        summary.annotated_events, summary.carried_from_previous, summary.validations_preserved
    );
    let _ = writeln!(
        output,
        "- Kept from previous run without an export: {}",
        summary.retained_without_export
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pay Events Without Validated Cost");
    if summary.unvalidated_pay_events.is_empty() {
        let _ = writeln!(output, "Every pay event has a validated unit cost.");
    } else {
        for event in &summary.unvalidated_pay_events {
            let _ = writeln!(output, "- {event}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SkippedFile;
    use chrono::Utc;
    use uuid::Uuid;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            files_discovered: 3,
            files_processed: vec!["a.csv".to_string(), "b.csv".to_string()],
            files_skipped: vec![SkippedFile {
                file_name: "export-sin-fecha.csv".to_string(),
                reason: "no date".to_string(),
            }],
            malformed_rows: 1,
            admin_rows_dropped: 2,
            imputed_attendance: 4,
            events_written: 2,
            pay_events: 1,
            unvalidated_pay_events: vec!["Sisterhood Premium (2024-03-05)".to_string()],
            annotated_events: 0,
            carried_from_previous: 1,
            validations_preserved: 0,
            retained_without_export: 1,
        }
    }

    #[test]
    fn lists_exclusions_and_unvalidated_events() {
        let report = build_run_report(&summary());
        assert!(report.contains("- Found: 3"));
        assert!(report.contains("- export-sin-fecha.csv: no date"));
        assert!(report.contains("- Sisterhood Premium (2024-03-05)"));
        assert!(report.contains("- Pending attendance imputed (seeded draw): 4"));
        assert!(report.contains("- Kept from previous run without an export: 1"));
    }

    #[test]
    fn clean_run_says_so() {
        let mut clean = summary();
        clean.files_skipped.clear();
        clean.unvalidated_pay_events.clear();
        let report = build_run_report(&clean);
        assert!(report.contains("All files were read correctly."));
        assert!(report.contains("Every pay event has a validated unit cost."));
    }
}
