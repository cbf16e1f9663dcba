use anyhow::{bail, Context, Result};
use clap::Parser;
use parquet::file::{
    metadata::RowGroupMetaData,
    reader::{FileReader, SerializedFileReader},
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tblprep::process::{
    verify::{check_row_groups, row_group_sizes},
    write::ROW_GROUP_SIZE,
};

/// Print schema and row-group layout of prepared Parquet tables.
#[derive(Parser, Debug)]
#[command(name = "inspect_output")]
struct Args {
    /// Parquet files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Also print per-column chunk details
    #[arg(long)]
    columns: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut bad = 0;
    for path in &args.files {
        if !inspect(path, args.columns)? {
            bad += 1;
        }
    }
    if bad > 0 {
        bail!("{} of {} files have an unexpected row-group layout", bad, args.files.len());
    }
    Ok(())
}

/// Returns false when the row-group layout is off.
fn inspect(path: &Path, columns: bool) -> Result<bool> {
    let reader = SerializedFileReader::new(
        File::open(path).with_context(|| format!("opening {}", path.display()))?,
    )
    .with_context(|| format!("reading footer of {}", path.display()))?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();
    let rows = file_meta.num_rows() as usize;

    println!("=== {} ===", path.display());
    println!("Created by:     {}", file_meta.created_by().unwrap_or("<unknown>"));
    println!("Total rows:     {}", rows);
    println!("Row groups:     {}", meta.num_row_groups());
    println!("Size on disk:   {} bytes", std::fs::metadata(path)?.len());

    println!("--- Columns ---");
    for col in file_meta.schema_descr().columns() {
        let logical = col
            .logical_type()
            .map_or("<none>".to_string(), |lt| format!("{:?}", lt));
        println!(
            "- {:<20} | {:<10} | {}",
            col.name(),
            format!("{:?}", col.physical_type()),
            logical
        );
    }

    if columns {
        for i in 0..meta.num_row_groups() {
            print_row_group(i, meta.row_group(i));
        }
    }

    let sizes = row_group_sizes(path)?;
    println!("Row group sizes: {:?}", sizes);
    match check_row_groups(&sizes, rows) {
        None => {
            println!("Layout OK ({} rows per group)\n", ROW_GROUP_SIZE);
            Ok(true)
        }
        Some(detail) => {
            println!("Layout MISMATCH: {}\n", detail);
            Ok(false)
        }
    }
}

fn print_row_group(idx: usize, rg: &RowGroupMetaData) {
    println!("--- Row Group {} ---", idx);
    println!("  Rows:              {}", rg.num_rows());
    println!("  Uncompressed size: {} bytes", rg.total_byte_size());
    for col in rg.columns() {
        println!(
            "  {:<20} {:?} compressed={} uncompressed={}",
            col.column_path().string(),
            col.compression(),
            col.compressed_size(),
            col.uncompressed_size()
        );
    }
}
