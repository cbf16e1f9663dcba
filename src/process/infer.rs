// src/process/infer.rs

use arrow::datatypes::{DataType, Field, Schema};
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` field into days since the Unix epoch.
pub fn parse_date32(s: &str) -> Option<i32> {
    // cheap shape check before handing off to chrono
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT).ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

fn looks_numeric(s: &str) -> bool {
    // keeps words like "inf" or "NaN" out of float columns
    s.bytes()
        .all(|c| c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E'))
        && s.bytes().any(|c| c.is_ascii_digit())
        && s.parse::<f64>().is_ok()
}

/// Narrowest type a single non-empty value fits.
pub fn infer_value_type(s: &str) -> DataType {
    if parse_date32(s).is_some() {
        DataType::Date32
    } else if s.parse::<i64>().is_ok() {
        DataType::Int64
    } else if looks_numeric(s) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

/// Widen `a` so that it also holds values of type `b`.
fn merge(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (x, y) if x == y => x.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

/// Accumulates per-column types over a sample of raw records.
#[derive(Debug)]
pub struct SchemaInference {
    types: Vec<Option<DataType>>,
}

impl SchemaInference {
    pub fn new(columns: usize) -> Self {
        Self {
            types: vec![None; columns],
        }
    }

    pub fn observe<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for (slot, value) in self.types.iter_mut().zip(fields) {
            if value.is_empty() {
                continue;
            }
            let ty = infer_value_type(value);
            *slot = Some(match slot.take() {
                Some(prev) => merge(&prev, &ty),
                None => ty,
            });
        }
    }

    /// Columns that only ever held empty values stay text.
    pub fn finish(self, names: &[&str]) -> Schema {
        let fields: Vec<Field> = names
            .iter()
            .zip(self.types)
            .map(|(name, ty)| Field::new(*name, ty.unwrap_or(DataType::Utf8), true))
            .collect();
        Schema::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(infer_value_type("1996-03-13"), DataType::Date32);
        assert_eq!(infer_value_type("155190"), DataType::Int64);
        assert_eq!(infer_value_type("-12"), DataType::Int64);
        assert_eq!(infer_value_type("21168.23"), DataType::Float64);
        assert_eq!(infer_value_type("25-989-741-2988"), DataType::Utf8);
        assert_eq!(infer_value_type("DELIVER IN PERSON"), DataType::Utf8);
        assert_eq!(infer_value_type("inf"), DataType::Utf8);
        assert_eq!(infer_value_type("NaN"), DataType::Utf8);
        assert_eq!(infer_value_type("1996-13-40"), DataType::Utf8);
    }

    #[test]
    fn test_date32_epoch_offsets() {
        assert_eq!(parse_date32("1970-01-01"), Some(0));
        assert_eq!(parse_date32("1970-01-02"), Some(1));
        assert_eq!(parse_date32("1969-12-31"), Some(-1));
        assert_eq!(parse_date32("1996/03/13"), None);
    }

    #[test]
    fn test_inference_widens_across_rows() {
        let mut inf = SchemaInference::new(4);
        inf.observe(["1", "17", "x", ""]);
        inf.observe(["2", "17.5", "1998-01-01", ""]);
        let schema = inf.finish(&["a", "b", "c", "d"]);

        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
    }

    #[test]
    fn test_empty_values_do_not_demote() {
        let mut inf = SchemaInference::new(1);
        inf.observe([""]);
        inf.observe(["1994-05-02"]);
        inf.observe([""]);
        let schema = inf.finish(&["shipdate"]);
        assert_eq!(schema.field(0).data_type(), &DataType::Date32);
    }
}
