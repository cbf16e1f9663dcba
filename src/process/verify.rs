// src/process/verify.rs

use arrow::{
    compute::concat_batches,
    csv::ReaderBuilder,
    datatypes::SchemaRef,
    ipc::reader::FileReader as IpcFileReader,
    record_batch::{RecordBatch, RecordBatchReader},
};
use parquet::{
    arrow::arrow_reader::ParquetRecordBatchReaderBuilder,
    file::reader::{FileReader, SerializedFileReader},
};
use std::{fs::File, path::Path};
use tracing::{debug, instrument};

use crate::{
    config::output_path,
    error::{OutputFormat, PrepError, Result},
    process::write::ROW_GROUP_SIZE,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Row count of every row group in a Parquet file, in file order.
pub fn row_group_sizes(path: &Path) -> Result<Vec<usize>> {
    let file =
        File::open(path).map_err(|e| PrepError::io(format!("opening {}", path.display()), e))?;
    let reader = SerializedFileReader::new(file).map_err(|e| {
        PrepError::io(
            format!("reading {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    let meta = reader.metadata();
    Ok((0..meta.num_row_groups())
        .map(|i| meta.row_group(i).num_rows() as usize)
        .collect())
}

pub fn read_parquet(path: &Path) -> std::result::Result<RecordBatch, BoxError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?
        .with_batch_size(ROW_GROUP_SIZE)
        .build()?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

pub fn read_csv(path: &Path, schema: SchemaRef) -> std::result::Result<RecordBatch, BoxError> {
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(File::open(path)?)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

pub fn read_ipc(path: &Path) -> std::result::Result<RecordBatch, BoxError> {
    let reader = IpcFileReader::try_new(File::open(path)?, None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// First difference between two batches, if any. Schema metadata is ignored.
pub fn describe_difference(expected: &RecordBatch, actual: &RecordBatch) -> Option<String> {
    let (es, ac) = (expected.schema(), actual.schema());
    if es.fields().len() != ac.fields().len() {
        return Some(format!(
            "{} columns, expected {}",
            ac.fields().len(),
            es.fields().len()
        ));
    }
    for (e, a) in es.fields().iter().zip(ac.fields().iter()) {
        if e.name() != a.name() || e.data_type() != a.data_type() {
            return Some(format!(
                "column {}: {} does not match {}: {}",
                a.name(),
                a.data_type(),
                e.name(),
                e.data_type()
            ));
        }
    }
    if expected.num_rows() != actual.num_rows() {
        return Some(format!(
            "{} rows, expected {}",
            actual.num_rows(),
            expected.num_rows()
        ));
    }
    for (i, field) in es.fields().iter().enumerate() {
        if expected.column(i).to_data() != actual.column(i).to_data() {
            return Some(format!("values differ in column {}", field.name()));
        }
    }
    None
}

/// Check that every row group but the last holds exactly [`ROW_GROUP_SIZE`] rows.
pub fn check_row_groups(sizes: &[usize], rows: usize) -> Option<String> {
    let total: usize = sizes.iter().sum();
    if total != rows {
        return Some(format!("row groups hold {} rows, expected {}", total, rows));
    }
    if let Some((last, full)) = sizes.split_last() {
        if let Some(bad) = full.iter().position(|&n| n != ROW_GROUP_SIZE) {
            return Some(format!(
                "row group {} has {} rows, expected {}",
                bad, full[bad], ROW_GROUP_SIZE
            ));
        }
        if *last == 0 || *last > ROW_GROUP_SIZE {
            return Some(format!("last row group has {} rows", last));
        }
    }
    None
}

/// Read back every output for `table` in `dir` and compare it with `expected`.
#[instrument(level = "debug", skip(dir, expected), fields(rows = expected.num_rows()))]
pub fn verify_outputs(table: &str, dir: &Path, expected: &RecordBatch, ipc: bool) -> Result<()> {
    let mismatch = |format: OutputFormat, detail: String| PrepError::Verify {
        table: table.to_string(),
        format,
        detail,
    };

    let parquet_path = output_path(dir, table, OutputFormat::Parquet);
    let sizes = row_group_sizes(&parquet_path)?;
    if let Some(detail) = check_row_groups(&sizes, expected.num_rows()) {
        return Err(mismatch(OutputFormat::Parquet, detail));
    }

    let mut formats = vec![OutputFormat::Parquet, OutputFormat::Csv];
    if ipc {
        formats.push(OutputFormat::Ipc);
    }
    for format in formats {
        let path = output_path(dir, table, format);
        let actual = match format {
            OutputFormat::Parquet => read_parquet(&path),
            OutputFormat::Csv => read_csv(&path, expected.schema()),
            OutputFormat::Ipc => read_ipc(&path),
        }
        .map_err(|e| mismatch(format, format!("reading back failed: {}", e)))?;

        if let Some(detail) = describe_difference(expected, &actual) {
            return Err(mismatch(format, detail));
        }
        debug!(table, %format, rows = actual.num_rows(), "verified");
    }
    Ok(())
}
