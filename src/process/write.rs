// src/process/write.rs

use arrow::{csv::WriterBuilder, ipc::writer::FileWriter, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::output_path,
    error::{OutputFormat, PrepError, Result},
    process::load::LazyTable,
};

/// Rows per Parquet row group. Fixed so every table scans at the same granularity.
pub const ROW_GROUP_SIZE: usize = 2048;

pub const CSV_DATE_FORMAT: &str = "%Y-%m-%d";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub rows: usize,
    pub row_groups: usize,
    pub parquet_bytes: u64,
    pub csv_bytes: u64,
    pub ipc_bytes: Option<u64>,
}

impl WriteStats {
    pub fn total_bytes(&self) -> u64 {
        self.parquet_bytes + self.csv_bytes + self.ipc_bytes.unwrap_or(0)
    }
}

pub fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_dictionary_enabled(true)
        .set_max_row_group_size(ROW_GROUP_SIZE)
        .build()
}

pub fn expected_row_groups(rows: usize) -> usize {
    rows.div_ceil(ROW_GROUP_SIZE)
}

/// Materialize `table` and write it to `dir` as Parquet, CSV and optionally IPC.
///
/// Returns the materialized batch so callers can verify the files against it.
pub fn write_outputs(table: &LazyTable, dir: &Path, ipc: bool) -> Result<(RecordBatch, WriteStats)> {
    let start = Instant::now();
    let batch = table.materialize()?;
    debug!(table = table.name(), rows = batch.num_rows(), elapsed = ?start.elapsed(), "materialized");
    let stats = write_batch(table.name(), &batch, dir, ipc)?;
    Ok((batch, stats))
}

/// Every format is staged to a temporary file first; nothing is renamed into
/// place until all of them were written successfully.
#[instrument(level = "debug", skip(batch, dir), fields(rows = batch.num_rows()))]
pub fn write_batch(table: &str, batch: &RecordBatch, dir: &Path, ipc: bool) -> Result<WriteStats> {
    fs::create_dir_all(dir)
        .map_err(|e| PrepError::write(table, OutputFormat::Parquet, e))?;

    let mut staged = vec![
        stage(table, dir, OutputFormat::Parquet, |f| write_parquet(batch, f))?,
        stage(table, dir, OutputFormat::Csv, |f| write_csv(batch, f))?,
    ];
    if ipc {
        staged.push(stage(table, dir, OutputFormat::Ipc, |f| write_ipc(batch, f))?);
    }

    let mut stats = WriteStats {
        rows: batch.num_rows(),
        row_groups: expected_row_groups(batch.num_rows()),
        ..Default::default()
    };
    for (format, tmp) in staged {
        let path = output_path(dir, table, format);
        let bytes = persist(table, format, tmp, &path)?;
        match format {
            OutputFormat::Parquet => stats.parquet_bytes = bytes,
            OutputFormat::Csv => stats.csv_bytes = bytes,
            OutputFormat::Ipc => stats.ipc_bytes = Some(bytes),
        }
    }

    info!(
        table,
        rows = stats.rows,
        row_groups = stats.row_groups,
        bytes = stats.total_bytes(),
        "wrote outputs"
    );
    Ok(stats)
}

/// Delete whatever outputs `table` has in `dir`, returning the removed paths.
pub fn remove_outputs(table: &str, dir: &Path) -> Vec<PathBuf> {
    [OutputFormat::Parquet, OutputFormat::Csv, OutputFormat::Ipc]
        .into_iter()
        .map(|format| output_path(dir, table, format))
        .filter(|path| match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), "could not remove output: {}", e);
                false
            }
        })
        .collect()
}

fn stage<F>(
    table: &str,
    dir: &Path,
    format: OutputFormat,
    write: F,
) -> Result<(OutputFormat, NamedTempFile)>
where
    F: FnOnce(&mut File) -> std::result::Result<(), BoxError>,
{
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.{}.", table, format.extension()))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PrepError::write(table, format, e))?;

    write(tmp.as_file_mut()).map_err(|source| PrepError::Write {
        table: table.to_string(),
        format,
        source,
    })?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PrepError::write(table, format, e))?;
    Ok((format, tmp))
}

fn persist(table: &str, format: OutputFormat, tmp: NamedTempFile, path: &Path) -> Result<u64> {
    let file = tmp
        .persist(path)
        .map_err(|e| PrepError::write(table, format, e.error))?;
    let len = file
        .metadata()
        .map_err(|e| PrepError::write(table, format, e))?
        .len();
    debug!(path = %path.display(), bytes = len, "published");
    Ok(len)
}

fn write_parquet(batch: &RecordBatch, file: &mut File) -> std::result::Result<(), BoxError> {
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn write_csv(batch: &RecordBatch, file: &mut File) -> std::result::Result<(), BoxError> {
    // header is emitted on the first write, even for an empty batch
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(b',')
        .with_date_format(CSV_DATE_FORMAT.to_string())
        .build(BufWriter::new(file));
    writer.write(batch)?;
    writer.into_inner().flush()?;
    Ok(())
}

fn write_ipc(batch: &RecordBatch, file: &mut File) -> std::result::Result<(), BoxError> {
    let mut writer = FileWriter::try_new(BufWriter::new(file), &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    writer.into_inner()?.flush()?;
    Ok(())
}
