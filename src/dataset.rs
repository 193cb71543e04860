//! The canonical event table and the small CSV side files around it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::EventRecord;

pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| PipelineError::csv(path, err))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(|err| PipelineError::csv(path, err))
}

/// Like [`read_rows`], but a missing file is an empty table.
pub fn read_rows_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        read_rows(path)
    } else {
        Ok(Vec::new())
    }
}

/// Writes through a sibling temporary file so readers never see a half
/// written table.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }

    let tmp = temporary_path(path);
    {
        let mut writer =
            csv::Writer::from_path(&tmp).map_err(|err| PipelineError::csv(&tmp, err))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|err| PipelineError::csv(&tmp, err))?;
        }
        writer.flush().map_err(|err| PipelineError::io(&tmp, err))?;
    }
    fs::rename(&tmp, path).map_err(|err| PipelineError::io(path, err))
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_dataset(path: &Path, events: &[EventRecord]) -> Result<()> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| {
        (a.date, &a.community, &a.name).cmp(&(b.date, &b.community, &b.name))
    });
    write_rows(path, &sorted)?;
    info!(events = sorted.len(), path = %path.display(), "canonical dataset written");
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Vec<EventRecord>> {
    read_rows(path)
}

/// Previous run's table, used to carry manual fields forward.
pub fn read_previous_dataset(path: &Path) -> Result<Vec<EventRecord>> {
    read_rows_if_exists(path)
}
