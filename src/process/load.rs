// src/process/load.rs

use arrow::{
    array::{Array, AsArray},
    compute::concat_batches,
    csv::{Reader, ReaderBuilder},
    datatypes::{DataType, Field, FieldRef, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, instrument};

use crate::{
    catalog::TableSpec,
    error::{PrepError, Result},
    process::infer::SchemaInference,
};

pub const DELIMITER: u8 = b'|';

/// Leading records inspected to pick column types.
pub const INFER_ROWS: usize = 100;

/// Rows per batch yielded by [`TableScan`].
pub const SCAN_BATCH_ROWS: usize = 8_192;

/// Every record ends with a delimiter, which the reader sees as one more
/// (always empty) field.
const TRAILING_FIELD: &str = "__trailing";

/// A raw `.tbl` file described against its catalog entry.
///
/// Opening only reads the first [`INFER_ROWS`] records. Data is read when
/// the caller asks for it through [`LazyTable::row_count`],
/// [`LazyTable::scan`] or [`LazyTable::materialize`].
#[derive(Debug, Clone)]
pub struct LazyTable {
    spec: TableSpec,
    path: PathBuf,
    schema: SchemaRef,
    limit: Option<usize>,
}

impl LazyTable {
    #[instrument(level = "debug", skip(spec, path), fields(table = spec.name))]
    pub fn open(spec: &TableSpec, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // first pass reads everything as text, types are decided afterwards
        let text_schema = Arc::new(Schema::new(
            spec.columns
                .iter()
                .map(|c| Field::new(*c, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let mut inference = SchemaInference::new(spec.columns.len());
        let mut sampled = 0;
        for batch in TableScan::new(spec, &path, &text_schema, Some(INFER_ROWS))? {
            let batch = batch?;
            let columns: Vec<_> = batch.columns().iter().map(|c| c.as_string::<i32>()).collect();
            for row in 0..batch.num_rows() {
                inference.observe(
                    columns
                        .iter()
                        .map(|c| if c.is_null(row) { "" } else { c.value(row) }),
                );
            }
            sampled += batch.num_rows();
        }

        let schema = Arc::new(inference.finish(spec.columns));
        debug!(sampled, ?schema, "described raw table");

        Ok(Self {
            spec: *spec,
            path,
            schema,
            limit: None,
        })
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn limit_rows(&self) -> Option<usize> {
        self.limit
    }

    /// Keep only the first `n` records. Never reads the file.
    pub fn limit(&self, n: usize) -> Self {
        let limit = Some(self.limit.map_or(n, |cur| cur.min(n)));
        Self {
            limit,
            ..self.clone()
        }
    }

    /// Number of records this description yields.
    ///
    /// Decodes every selected record, so a malformed line anywhere in range
    /// fails the count.
    pub fn row_count(&self) -> Result<usize> {
        self.scan()?
            .try_fold(0, |count, batch| batch.map(|b| count + b.num_rows()))
    }

    pub fn scan(&self) -> Result<TableScan> {
        TableScan::new(&self.spec, &self.path, &self.schema, self.limit)
    }

    /// Read every selected record into a single batch.
    pub fn materialize(&self) -> Result<RecordBatch> {
        let batches = self.scan()?.collect::<Result<Vec<_>>>()?;
        concat_batches(&self.schema, &batches).map_err(|source| PrepError::Arrow {
            table: self.spec.name.to_string(),
            source,
        })
    }
}

/// Streaming reader over a raw file, yielding typed batches of at most
/// [`SCAN_BATCH_ROWS`] rows.
pub struct TableScan {
    spec: TableSpec,
    path: PathBuf,
    reader: Reader<File>,
    projection: Vec<usize>,
    records: usize,
    done: bool,
}

impl TableScan {
    fn new(spec: &TableSpec, path: &Path, schema: &SchemaRef, limit: Option<usize>) -> Result<Self> {
        let file = open_raw(spec, path)?;
        let read_schema = make_read_schema(schema);
        let projection: Vec<usize> = (0..schema.fields().len()).collect();

        let mut builder = ReaderBuilder::new(read_schema)
            .with_header(false)
            .with_delimiter(DELIMITER)
            .with_batch_size(SCAN_BATCH_ROWS);
        if let Some(n) = limit {
            builder = builder.with_bounds(0, n);
        }
        let reader = builder
            .build(file)
            .map_err(|e| decode_error(spec, path, e))?;

        Ok(Self {
            spec: *spec,
            path: path.to_path_buf(),
            reader,
            projection,
            records: 0,
            done: false,
        })
    }

    /// Reject records whose trailing field is not empty, then drop that field.
    fn finish_batch(&mut self, batch: RecordBatch) -> Result<RecordBatch> {
        let trailing = batch.column(self.projection.len());
        if let Some(row) = (0..trailing.len()).find(|&i| trailing.is_valid(i)) {
            return Err(PrepError::SchemaMismatch {
                table: self.spec.name.to_string(),
                path: self.path.clone(),
                line: self.records + row + 1,
                expected: self.spec.columns.len(),
                found: self.spec.columns.len() + 1,
            });
        }
        self.records += batch.num_rows();
        batch
            .project(&self.projection)
            .map_err(|source| PrepError::Arrow {
                table: self.spec.name.to_string(),
                source,
            })
    }
}

impl Iterator for TableScan {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = match self.reader.next()? {
            Ok(batch) => self.finish_batch(batch),
            Err(e) => Err(decode_error(&self.spec, &self.path, e)),
        };
        if res.is_err() {
            self.done = true;
        }
        Some(res)
    }
}

/// Table columns followed by the empty field the trailing delimiter leaves.
fn make_read_schema(base: &Schema) -> SchemaRef {
    let mut fields: Vec<FieldRef> = Vec::with_capacity(base.fields().len() + 1);
    fields.extend(base.fields().iter().cloned());
    fields.push(Arc::new(Field::new(TRAILING_FIELD, DataType::Utf8, true)));
    Arc::new(Schema::new(fields))
}

fn open_raw(spec: &TableSpec, path: &Path) -> Result<File> {
    match File::open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PrepError::MissingInput {
            table: spec.name.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) => Err(PrepError::io(format!("opening {}", path.display()), e)),
    }
}

/// Map a CSV reader failure onto the table-level error taxonomy.
///
/// Field counts in the reader's message include the trailing field, the
/// reported counts do not. Line numbers are 1-based record numbers.
fn decode_error(spec: &TableSpec, path: &Path, err: ArrowError) -> PrepError {
    if matches!(err, ArrowError::IoError(..) | ArrowError::ExternalError(_)) {
        return PrepError::io(format!("reading {}", path.display()), io::Error::other(err));
    }
    match &err {
        ArrowError::CsvError(msg) => {
            if let Some((line, found)) = field_count_error(msg) {
                return PrepError::SchemaMismatch {
                    table: spec.name.to_string(),
                    path: path.to_path_buf(),
                    line,
                    expected: spec.columns.len(),
                    found: found.saturating_sub(1),
                };
            }
        }
        ArrowError::ParseError(msg) => {
            if let Some((value, expected, column, line)) = value_parse_error(msg) {
                return PrepError::Parse {
                    table: spec.name.to_string(),
                    line: line + 1,
                    column: spec
                        .columns
                        .get(column)
                        .map_or_else(|| column.to_string(), |c| c.to_string()),
                    value,
                    expected,
                };
            }
        }
        _ => {}
    }
    PrepError::Arrow {
        table: spec.name.to_string(),
        source: err,
    }
}

/// `incorrect number of fields for line L, expected E got [more than ]F`
fn field_count_error(msg: &str) -> Option<(usize, usize)> {
    let rest = msg.strip_prefix("incorrect number of fields for line ")?;
    let (line, rest) = rest.split_once(", expected ")?;
    let (_, found) = rest.split_once(" got ")?;
    let found = found.trim_start_matches("more than ");
    Some((line.parse().ok()?, found.parse().ok()?))
}

/// `Error while parsing value 'V' as type 'T' for column C at line L. ...`,
/// with `L` counted from zero.
fn value_parse_error(msg: &str) -> Option<(String, String, usize, usize)> {
    let rest = msg.strip_prefix("Error while parsing value '")?;
    let (value, rest) = rest.split_once("' as type '")?;
    let (ty, rest) = rest.split_once("' for column ")?;
    let (column, rest) = rest.split_once(" at line ")?;
    let line = rest.split('.').next()?;
    Some((
        value.to_string(),
        ty.to_string(),
        column.parse().ok()?,
        line.parse().ok()?,
    ))
}
