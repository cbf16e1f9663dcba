// src/process/mod.rs

pub mod infer;
pub mod load;
pub mod sample;
pub mod verify;
pub mod write;

use chrono::Utc;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::{
    catalog::{is_sampled, select_tables, TableSpec},
    config::RunConfig,
    error::Result,
    generate::{Generator, ProcessRunner},
    report::RunReport,
};
use load::LazyTable;
use sample::SampleStats;
use write::WriteStats;

/// What happened to one table that made it all the way through.
#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table: &'static str,
    pub sample: Option<SampleStats>,
    pub write: WriteStats,
    pub verified: bool,
    pub elapsed: Duration,
}

/// Load, optionally sample, write and optionally verify a single table.
///
/// On failure, outputs left by an earlier run for this table are removed.
#[instrument(level = "info", skip(spec, config), fields(table = spec.name))]
pub fn process_table(spec: &TableSpec, config: &RunConfig) -> Result<TableOutcome> {
    let res = prepare_table(spec, config);
    if res.is_err() {
        for path in write::remove_outputs(spec.name, &config.base_dir) {
            warn!(path = %path.display(), "removed stale output");
        }
    }
    res
}

fn prepare_table(spec: &TableSpec, config: &RunConfig) -> Result<TableOutcome> {
    let start = Instant::now();
    info!("processing table");

    let loaded = LazyTable::open(spec, config.raw_path(spec.name))?;

    let percentage = config.directive.sample_percentage;
    let (table, sample) = if is_sampled(spec.name) {
        sample::sample(&loaded, percentage)?
    } else {
        (loaded, None)
    };

    let (batch, write) = write::write_outputs(&table, &config.base_dir, config.write_ipc)?;

    if config.verify {
        verify::verify_outputs(spec.name, &config.base_dir, &batch, config.write_ipc)?;
    }

    let elapsed = start.elapsed();
    info!(rows = write.rows, elapsed = ?elapsed, "table done");
    Ok(TableOutcome {
        table: spec.name,
        sample,
        write,
        verified: config.verify,
        elapsed,
    })
}

/// Process every table independently. Results come back in the order of `specs`.
pub fn run_tables(
    specs: &[&'static TableSpec],
    config: &RunConfig,
) -> Vec<(&'static str, Result<TableOutcome>)> {
    let run_one = |spec: &&'static TableSpec| {
        let res = process_table(spec, config);
        if let Err(e) = &res {
            error!(table = spec.name, "table failed: {}", e);
        }
        (spec.name, res)
    };

    if config.jobs <= 1 {
        return specs.iter().map(run_one).collect();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
    {
        Ok(pool) => pool.install(|| specs.par_iter().map(run_one).collect()),
        Err(e) => {
            warn!("could not start {} workers ({}), running sequentially", config.jobs, e);
            specs.iter().map(run_one).collect()
        }
    }
}

/// Full run: resolve tables, regenerate raw data unless skipped, then
/// process every table.
///
/// Catalog and generation errors abort before any table is touched. Table
/// failures are collected into the returned report.
pub fn run_pipeline<R: ProcessRunner>(
    config: &RunConfig,
    generator: &Generator<R>,
) -> Result<RunReport> {
    config.validate()?;
    let started = Utc::now();
    let specs = select_tables(&config.tables)?;

    if config.directive.skip_generation {
        info!(dir = %config.base_dir.display(), "skipping generation, using existing raw files");
    } else {
        generator.generate(config.directive.scale_factor, &config.base_dir)?;
    }

    let outcomes = run_tables(&specs, config);
    let report = RunReport::new(config, started, &outcomes);

    if config.write_report {
        if let Err(e) = report.write_json(&config.base_dir) {
            error!("could not write run report: {}", e);
        }
    }
    Ok(report)
}
