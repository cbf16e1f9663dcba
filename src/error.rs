// src/error.rs

use std::{fmt, io, path::PathBuf};

pub type Result<T> = std::result::Result<T, PrepError>;

/// Which on-disk representation a write or verify step was producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    Csv,
    Ipc,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Ipc => "feather",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// The external generator could not be built or did not exit cleanly.
    #[error("generator {step} failed (exit code {code:?}):\n{output}")]
    Generation {
        step: String,
        code: Option<i32>,
        output: String,
    },

    #[error("table {table}: raw input {} not found", path.display())]
    MissingInput { table: String, path: PathBuf },

    /// Field count (after dropping the trailing delimiter artifact) differs
    /// from the catalog's column count.
    #[error(
        "table {table}: {}:{line} has {found} fields, catalog declares {expected}",
        path.display()
    )]
    SchemaMismatch {
        table: String,
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("table {table}: line {line}, column {column}: cannot parse '{value}' as {expected}")]
    Parse {
        table: String,
        line: usize,
        column: String,
        value: String,
        expected: String,
    },

    #[error("table {table}: {source}")]
    Arrow {
        table: String,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("table {table}: writing {format} output failed: {source}")]
    Write {
        table: String,
        format: OutputFormat,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("table {table}: {format} output does not match: {detail}")]
    Verify {
        table: String,
        format: OutputFormat,
        detail: String,
    },
}

impl PrepError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PrepError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn write<E>(table: &str, format: OutputFormat, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PrepError::Write {
            table: table.to_string(),
            format,
            source: source.into(),
        }
    }

    /// Run-level failures abort everything; the rest only cost one table.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PrepError::Config(_) | PrepError::UnknownTable(_) | PrepError::Generation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        assert!(PrepError::UnknownTable("nope".into()).is_fatal());
        assert!(PrepError::Config("bad".into()).is_fatal());
        assert!(PrepError::Generation {
            step: "build".into(),
            code: Some(2),
            output: String::new(),
        }
        .is_fatal());

        let missing = PrepError::MissingInput {
            table: "orders".into(),
            path: PathBuf::from("/tmp/orders.tbl"),
        };
        assert!(!missing.is_fatal());
        assert!(!PrepError::write("orders", OutputFormat::Csv, "disk full").is_fatal());
    }

    #[test]
    fn test_messages_name_the_table() {
        let err = PrepError::SchemaMismatch {
            table: "nation".into(),
            path: PathBuf::from("nation.tbl"),
            line: 3,
            expected: 4,
            found: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("nation"));
        assert!(msg.contains("nation.tbl:3"));
        assert!(msg.contains("has 5 fields"));
    }
}
