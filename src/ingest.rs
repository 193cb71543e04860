//! Reads every platform export under `<raw_root>/<COMMUNITY>/` with a
//! forgiving CSV reader. A file that cannot be used is skipped and recorded,
//! never fatal on its own.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{PipelineError, Result};
use crate::filename;
use crate::models::Community;

const NAME_COLUMNS: &[&str] = &["name", "nombre", "full_name", "asistente"];
const PAID_COLUMNS: &[&str] = &["has_paid", "pagado", "pago"];
const PRICE_COLUMNS: &[&str] = &["price_paid", "precio", "precio_pagado"];
const STATUS_COLUMNS: &[&str] = &["attendance_status", "asistencia", "estado"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One attendee row as exported, still untyped.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub name: String,
    pub has_paid: Option<String>,
    pub price_paid: Option<String>,
    pub attendance_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub community: Community,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub rows: Vec<SourceRow>,
    pub malformed_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub discovered: usize,
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

impl IngestOutcome {
    pub fn malformed_rows(&self) -> usize {
        self.files.iter().map(|file| file.malformed_rows).sum()
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("not UTF-8 text")]
    Encoding,
    #[error("empty export")]
    Empty,
    #[error("no recognised column in header {0:?}")]
    NoKnownColumns(Vec<String>),
    #[error("malformed header: {0}")]
    Header(#[from] csv::Error),
}

struct ParsedExport {
    rows: Vec<SourceRow>,
    malformed_rows: usize,
}

pub fn ingest_root(root: &Path, config: &IngestConfig) -> Result<IngestOutcome> {
    if !root.is_dir() {
        return Err(PipelineError::NoUsableFiles(root.to_path_buf()));
    }

    let mut outcome = IngestOutcome::default();

    for entry in WalkDir::new(root).min_depth(2).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable directory entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_csv(entry.path()) {
            continue;
        }
        outcome.discovered += 1;

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let folder = community_folder(root, path);

        match load_file(path, &file_name, &folder, config) {
            Ok(file) => {
                debug!(
                    file = %file.file_name,
                    community = %file.community,
                    rows = file.rows.len(),
                    "export loaded"
                );
                outcome.files.push(file);
            }
            Err(reason) => {
                warn!(file = %file_name, "skipping export: {reason}");
                outcome.skipped.push(SkippedFile { file_name, reason });
            }
        }
    }

    info!(
        discovered = outcome.discovered,
        loaded = outcome.files.len(),
        skipped = outcome.skipped.len(),
        "ingestion finished"
    );

    if outcome.files.is_empty() {
        return Err(PipelineError::NoUsableFiles(root.to_path_buf()));
    }
    Ok(outcome)
}

fn load_file(
    path: &Path,
    file_name: &str,
    folder: &str,
    config: &IngestConfig,
) -> std::result::Result<SourceFile, String> {
    let parsed_name = filename::parse_file_name(file_name).map_err(|err| err.to_string())?;
    let export = read_export(path).map_err(|err| err.to_string())?;

    Ok(SourceFile {
        file_name: file_name.to_string(),
        community: resolve_community(folder, file_name, config),
        event_name: parsed_name.event_name,
        event_date: parsed_name.event_date,
        rows: export.rows,
        malformed_rows: export.malformed_rows,
    })
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn community_folder(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Exact file override, then keyword rule, then the containing folder.
pub fn resolve_community(folder: &str, file_name: &str, config: &IngestConfig) -> Community {
    if let Some(community) = config.file_overrides.get(file_name) {
        return Community::new(community);
    }

    let lower = file_name.to_lowercase();
    for (keyword, community) in &config.keyword_overrides {
        if lower.contains(keyword.as_str()) {
            if !folder.eq_ignore_ascii_case(community) {
                debug!(file = %file_name, from = %folder, to = %community, "community reassigned");
            }
            return Community::new(community);
        }
    }

    Community::new(folder)
}

fn read_export(path: &Path) -> std::result::Result<ParsedExport, ExportError> {
    let bytes = std::fs::read(path)?;
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    let text = std::str::from_utf8(bytes).map_err(|_| ExportError::Encoding)?;
    parse_export(text)
}

fn parse_export(text: &str) -> std::result::Result<ParsedExport, ExportError> {
    let repaired = repair_quoting(text);
    let header_line = repaired
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(ExportError::Empty)?;
    let delimiter = sniff_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(repaired.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let find = |aliases: &[&str]| headers.iter().position(|h| aliases.contains(&h.as_str()));
    let name_idx = find(NAME_COLUMNS);
    let paid_idx = find(PAID_COLUMNS);
    let price_idx = find(PRICE_COLUMNS);
    let status_idx = find(STATUS_COLUMNS);

    if name_idx.is_none() && paid_idx.is_none() && price_idx.is_none() && status_idx.is_none() {
        return Err(ExportError::NoKnownColumns(headers));
    }

    let mut rows = Vec::new();
    let mut malformed_rows = 0usize;

    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                debug!(line = line + 2, "unparseable row: {err}");
                malformed_rows += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            debug!(
                line = line + 2,
                fields = record.len(),
                expected = headers.len(),
                "row with wrong field count"
            );
            malformed_rows += 1;
            continue;
        }

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|value| value.trim_matches('"').trim().to_string())
        };
        rows.push(SourceRow {
            name: field(name_idx).unwrap_or_default(),
            has_paid: field(paid_idx),
            price_paid: field(price_idx),
            attendance_status: field(status_idx),
        });
    }

    Ok(ParsedExport {
        rows,
        malformed_rows,
    })
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace('"', "")
        .trim()
        .to_lowercase()
}

fn sniff_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if commas > semicolons {
        b','
    } else {
        b';'
    }
}

/// Some exports wrap each whole line in quotes and double the quotes inside.
/// Such lines are unwrapped; properly quoted fields are left alone.
fn repair_quoting(text: &str) -> String {
    let mut repaired = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_end_matches('\r');
        let wrapped = trimmed.len() >= 2
            && trimmed.starts_with('"')
            && trimmed.ends_with('"')
            && !trimmed[1..trimmed.len() - 1].replace("\"\"", "").contains('"');
        if wrapped {
            repaired.push_str(&trimmed[1..trimmed.len() - 1].replace("\"\"", "\""));
        } else {
            repaired.push_str(trimmed);
        }
        repaired.push('\n');
    }
    repaired
}
