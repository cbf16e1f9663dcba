// src/config.rs

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::{OutputFormat, PrepError, Result};

/// Sizing knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDirective {
    pub scale_factor: u32,
    /// Fraction of rows kept for sampled tables, in (0, 1].
    pub sample_percentage: f64,
    pub skip_generation: bool,
}

impl Default for ScaleDirective {
    fn default() -> Self {
        Self {
            scale_factor: 1,
            sample_percentage: 1.0,
            skip_generation: false,
        }
    }
}

/// Everything the pipeline needs, resolved once at startup and shared
/// read-only by every table.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_dir: PathBuf,
    pub generator_dir: PathBuf,
    pub directive: ScaleDirective,
    /// Empty means the whole catalog.
    pub tables: Vec<String>,
    pub jobs: usize,
    pub write_ipc: bool,
    pub verify: bool,
    pub write_report: bool,
}

impl RunConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            generator_dir: PathBuf::from("dbgen"),
            directive: ScaleDirective::default(),
            tables: Vec::new(),
            jobs: 1,
            write_ipc: false,
            verify: false,
            write_report: true,
        }
    }

    pub fn raw_path(&self, table: &str) -> PathBuf {
        self.base_dir.join(format!("{}.tbl", table))
    }

    pub fn output_path(&self, table: &str, format: OutputFormat) -> PathBuf {
        output_path(&self.base_dir, table, format)
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.directive.sample_percentage;
        if !(p > 0.0 && p <= 1.0) {
            return Err(PrepError::Config(format!(
                "percentage must be in (0, 1], got {}",
                p
            )));
        }
        if self.directive.scale_factor == 0 {
            return Err(PrepError::Config("scale factor must be positive".into()));
        }
        if self.jobs == 0 {
            return Err(PrepError::Config("jobs must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn output_path(dir: &Path, table: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", table, format.extension()))
}

#[derive(Parser, Debug)]
#[command(name = "tblprep")]
#[command(about = "Prepare dbgen tables as Parquet and CSV benchmark inputs")]
pub struct Args {
    /// Fraction of rows to keep for lineitem, orders, part and partsupp
    #[arg(long, default_value_t = 1.0)]
    pub percentage: f64,

    /// dbgen scale factor
    #[arg(short, long, default_value_t = 1)]
    pub scale_factor: u32,

    /// Skip dbgen and use the .tbl files already in the base directory
    #[arg(long, alias = "skip-generation")]
    pub skip_dbgen: bool,

    /// Directory holding the raw .tbl files and the produced outputs
    #[arg(long, env = "DATASET_BASE_DIR", default_value = "data/tables")]
    pub base_dir: PathBuf,

    /// dbgen source directory (built with make)
    #[arg(long, env = "DBGEN_DIR", default_value = "dbgen")]
    pub dbgen_dir: PathBuf,

    /// Only process these tables (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Number of tables processed concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Also write Arrow IPC (.feather) files
    #[arg(long)]
    pub ipc: bool,

    /// Read every output back and compare it with what was written
    #[arg(long)]
    pub verify: bool,

    /// Do not write prepare_report.json
    #[arg(long)]
    pub no_report: bool,
}

impl Args {
    pub fn into_config(self) -> Result<RunConfig> {
        let config = RunConfig {
            base_dir: self.base_dir,
            generator_dir: self.dbgen_dir,
            directive: ScaleDirective {
                scale_factor: self.scale_factor,
                sample_percentage: self.percentage,
                skip_generation: self.skip_dbgen,
            },
            tables: self
                .tables
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            jobs: self.jobs,
            write_ipc: self.ipc,
            verify: self.verify,
            write_report: !self.no_report,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunConfig> {
        let mut argv = vec!["tblprep"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&["--base-dir", "/data"]).unwrap();
        assert_eq!(cfg.directive, ScaleDirective::default());
        assert_eq!(cfg.base_dir, PathBuf::from("/data"));
        assert_eq!(cfg.jobs, 1);
        assert!(cfg.tables.is_empty());
        assert!(cfg.write_report);
        assert!(!cfg.write_ipc);
    }

    #[test]
    fn test_flags() {
        let cfg = parse(&[
            "--base-dir",
            "/data",
            "--percentage",
            "0.1",
            "-s",
            "10",
            "--skip-generation",
            "--tables",
            "orders, lineitem",
            "--no-report",
        ])
        .unwrap();
        assert_eq!(cfg.directive.sample_percentage, 0.1);
        assert_eq!(cfg.directive.scale_factor, 10);
        assert!(cfg.directive.skip_generation);
        assert_eq!(cfg.tables, vec!["orders", "lineitem"]);
        assert!(!cfg.write_report);
    }

    #[test]
    fn test_rejects_bad_percentage() {
        for p in ["0", "1.5", "NaN"] {
            let err = parse(&["--base-dir", "/data", "--percentage", p]).unwrap_err();
            assert!(matches!(err, PrepError::Config(_)), "{} accepted", p);
        }
    }

    #[test]
    fn test_rejects_zero_scale_and_jobs() {
        assert!(parse(&["--base-dir", "/d", "-s", "0"]).is_err());
        assert!(parse(&["--base-dir", "/d", "--jobs", "0"]).is_err());
    }

    #[test]
    fn test_paths() {
        let cfg = RunConfig::new("/data");
        assert_eq!(cfg.raw_path("orders"), PathBuf::from("/data/orders.tbl"));
        assert_eq!(
            cfg.output_path("orders", OutputFormat::Parquet),
            PathBuf::from("/data/orders.parquet")
        );
        assert_eq!(
            cfg.output_path("orders", OutputFormat::Ipc),
            PathBuf::from("/data/orders.feather")
        );
    }
}
