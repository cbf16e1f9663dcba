use anyhow::{Context, Result};
use clap::Parser;
use std::process::exit;
use tblprep::{config::Args, generate::Generator, process::run_pipeline, report::RunReport};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve configuration ────────────────────────────────────
    let config = Args::parse()
        .into_config()
        .context("invalid command line")?;
    info!(
        base_dir = %config.base_dir.display(),
        scale_factor = config.directive.scale_factor,
        percentage = config.directive.sample_percentage,
        skip_generation = config.directive.skip_generation,
        jobs = config.jobs,
        "startup"
    );

    // ─── 3) generate + process ───────────────────────────────────────
    let generator = Generator::system(&config.generator_dir);
    let report = run_pipeline(&config, &generator).context("preparation aborted")?;

    print_summary(&report);
    if report.has_failures() {
        exit(1);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    for t in &report.tables {
        match (&t.error, t.kept_rows) {
            (Some(e), _) => error!(table = %t.table, "failed: {}", e),
            (None, Some(kept)) => info!(
                table = %t.table,
                kept,
                total = t.total_rows.unwrap_or(kept),
                row_groups = t.row_groups.unwrap_or(0),
                "ok"
            ),
            (None, None) => {}
        }
    }
    let failed = report.failures().count();
    info!(
        tables = report.tables.len(),
        failed,
        elapsed = ?(report.finished - report.started).to_std().unwrap_or_default(),
        "run finished"
    );
}
