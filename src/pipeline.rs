use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::aggregate;
use crate::annotations;
use crate::config::PipelineConfig;
use crate::dataset;
use crate::error::{PipelineError, Result};
use crate::ingest::{self, SkippedFile};
use crate::normalize;
use crate::report;
use crate::taxonomy::{self, Taxonomy};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub files_discovered: usize,
    pub files_processed: Vec<String>,
    pub files_skipped: Vec<SkippedFile>,
    pub malformed_rows: usize,
    pub admin_rows_dropped: usize,
    pub imputed_attendance: usize,
    pub events_written: usize,
    pub pay_events: usize,
    /// Pay events that may not feed a model until their cost is validated.
    pub unvalidated_pay_events: Vec<String>,
    pub annotated_events: usize,
    pub carried_from_previous: usize,
    pub validations_preserved: usize,
    pub retained_without_export: usize,
}

/// Ingest, normalize, aggregate, merge and write the canonical dataset,
/// then apply the categorization stop. The dataset and report are written
/// before the stop so the operator can inspect them.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let span = info_span!("pipeline", %run_id);
    let _guard = span.enter();

    let paths = &config.paths;
    info!(root = %paths.raw_root.display(), "pipeline started");

    let ingested = ingest::ingest_root(&paths.raw_root, &config.ingest)?;
    let normalized = normalize::normalize(&ingested.files, &config.ingest, &config.attendance);
    let mut events = aggregate::aggregate_events(&normalized.records);

    let manual = annotations::load_annotations(&paths.annotations)?;
    let previous = dataset::read_previous_dataset(&paths.dataset)?;
    let taxonomy = Taxonomy::load(&paths.taxonomy)?;
    let merge = annotations::merge_manual_fields(&mut events, &manual, &previous, &taxonomy);

    dataset::write_dataset(&paths.dataset, &events)?;

    let summary = RunSummary {
        run_id,
        started_at,
        files_discovered: ingested.discovered,
        files_processed: ingested.files.iter().map(|f| f.file_name.clone()).collect(),
        files_skipped: ingested.skipped.clone(),
        malformed_rows: ingested.malformed_rows(),
        admin_rows_dropped: normalized.admin_rows_dropped,
        imputed_attendance: normalized.imputed,
        events_written: events.len(),
        pay_events: events.iter().filter(|e| e.is_paid()).count(),
        unvalidated_pay_events: events
            .iter()
            .filter(|e| e.is_paid() && !e.cost_validated)
            .map(|e| format!("{} ({})", e.name, e.date))
            .collect(),
        annotated_events: merge.annotated,
        carried_from_previous: merge.carried_from_previous,
        validations_preserved: merge.validations_preserved,
        retained_without_export: merge.retained_without_export,
    };

    write_reports(config, &summary)?;
    taxonomy::enforce_categorized(&events, &paths.taxonomy, &paths.uncategorized)?;

    info!(events = summary.events_written, "pipeline finished");
    Ok(summary)
}

fn write_reports(config: &PipelineConfig, summary: &RunSummary) -> Result<()> {
    let markdown = report::build_run_report(summary);
    write_file(&config.paths.report, markdown.as_bytes())?;

    let json = serde_json::to_vec_pretty(summary)
        .map_err(|err| PipelineError::io(&config.paths.report_json, err.into()))?;
    write_file(&config.paths.report_json, &json)
}

fn write_file(path: &std::path::Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }
    std::fs::write(path, content).map_err(|err| PipelineError::io(path, err))
}
