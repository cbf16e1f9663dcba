// src/report.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    config::RunConfig,
    error::{PrepError, Result},
    process::TableOutcome,
};

pub const REPORT_FILE: &str = "prepare_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    pub total_rows: Option<usize>,
    pub kept_rows: Option<usize>,
    pub row_groups: Option<usize>,
    pub bytes: Option<u64>,
    pub verified: bool,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

impl TableReport {
    fn from_result(table: &str, res: &Result<TableOutcome>) -> Self {
        match res {
            Ok(o) => Self {
                table: table.to_string(),
                status: TableStatus::Ok,
                total_rows: Some(o.sample.map_or(o.write.rows, |s| s.total_rows)),
                kept_rows: Some(o.write.rows),
                row_groups: Some(o.write.row_groups),
                bytes: Some(o.write.total_bytes()),
                verified: o.verified,
                elapsed_ms: Some(o.elapsed.as_millis() as u64),
                error: None,
            },
            Err(e) => Self {
                table: table.to_string(),
                status: TableStatus::Failed,
                total_rows: None,
                kept_rows: None,
                row_groups: None,
                bytes: None,
                verified: false,
                elapsed_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Summary of one run, written next to the outputs as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub scale_factor: u32,
    pub sample_percentage: f64,
    pub generated: bool,
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn new(
        config: &RunConfig,
        started: DateTime<Utc>,
        outcomes: &[(&'static str, Result<TableOutcome>)],
    ) -> Self {
        Self {
            started,
            finished: Utc::now(),
            scale_factor: config.directive.scale_factor,
            sample_percentage: config.directive.sample_percentage,
            generated: !config.directive.skip_generation,
            tables: outcomes
                .iter()
                .map(|(name, res)| TableReport::from_result(name, res))
                .collect(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Atomically write the report as pretty JSON to `dir/prepare_report.json`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE);
        let mut tmp = tempfile::Builder::new()
            .prefix(".prepare_report.")
            .tempfile_in(dir)
            .map_err(|e| PrepError::io(format!("creating report in {}", dir.display()), e))?;

        serde_json::to_writer_pretty(tmp.as_file_mut(), self)
            .map_err(|e| PrepError::io("serializing report", e.into()))?;
        tmp.write_all(b"\n")
            .map_err(|e| PrepError::io("writing report", e))?;

        tmp.persist(&path)
            .map_err(|e| PrepError::io(format!("renaming report to {}", path.display()), e.error))?;
        Ok(path)
    }
}
