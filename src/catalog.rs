// src/catalog.rs

use crate::error::{PrepError, Result};

/// A single table as produced by dbgen: its name and ordered column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSpec {
    pub fn raw_file_name(&self) -> String {
        format!("{}.tbl", self.name)
    }
}

pub const CATALOG: [TableSpec; 8] = [
    TableSpec {
        name: "customer",
        columns: &[
            "c_custkey",
            "c_name",
            "c_address",
            "c_nationkey",
            "c_phone",
            "c_acctbal",
            "c_mktsegment",
            "c_comment",
        ],
    },
    TableSpec {
        name: "lineitem",
        columns: &[
            "l_orderkey",
            "l_partkey",
            "l_suppkey",
            "l_linenumber",
            "l_quantity",
            "l_extendedprice",
            "l_discount",
            "l_tax",
            "l_returnflag",
            "l_linestatus",
            "l_shipdate",
            "l_commitdate",
            "l_receiptdate",
            "l_shipinstruct",
            "l_shipmode",
            "comments",
        ],
    },
    TableSpec {
        name: "nation",
        columns: &["n_nationkey", "n_name", "n_regionkey", "n_comment"],
    },
    TableSpec {
        name: "orders",
        columns: &[
            "o_orderkey",
            "o_custkey",
            "o_orderstatus",
            "o_totalprice",
            "o_orderdate",
            "o_orderpriority",
            "o_clerk",
            "o_shippriority",
            "o_comment",
        ],
    },
    TableSpec {
        name: "part",
        columns: &[
            "p_partkey",
            "p_name",
            "p_mfgr",
            "p_brand",
            "p_type",
            "p_size",
            "p_container",
            "p_retailprice",
            "p_comment",
        ],
    },
    TableSpec {
        name: "partsupp",
        columns: &[
            "ps_partkey",
            "ps_suppkey",
            "ps_availqty",
            "ps_supplycost",
            "ps_comment",
        ],
    },
    TableSpec {
        name: "region",
        columns: &["r_regionkey", "r_name", "r_comment"],
    },
    TableSpec {
        name: "supplier",
        columns: &[
            "s_suppkey",
            "s_name",
            "s_address",
            "s_nationkey",
            "s_phone",
            "s_acctbal",
            "s_comment",
        ],
    },
];

/// Tables large enough that truncating them shortens benchmark runs.
pub const SAMPLED_TABLES: [&str; 4] = ["lineitem", "orders", "part", "partsupp"];

pub fn table_spec(name: &str) -> Result<&'static TableSpec> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| PrepError::UnknownTable(name.to_string()))
}

pub fn columns_for(name: &str) -> Result<&'static [&'static str]> {
    table_spec(name).map(|t| t.columns)
}

pub fn table_names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|t| t.name)
}

pub fn is_sampled(name: &str) -> bool {
    SAMPLED_TABLES.contains(&name)
}

/// Resolve a user-supplied table filter against the catalog.
///
/// An empty filter selects every table. The result is always in catalog
/// order, without duplicates, regardless of the order of `filter`.
pub fn select_tables(filter: &[String]) -> Result<Vec<&'static TableSpec>> {
    if filter.is_empty() {
        return Ok(CATALOG.iter().collect());
    }
    for name in filter {
        table_spec(name)?;
    }
    Ok(CATALOG
        .iter()
        .filter(|t| filter.iter().any(|f| f == t.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_columns_for_known_table() {
        let cols = columns_for("region").unwrap();
        assert_eq!(cols, &["r_regionkey", "r_name", "r_comment"]);
        assert_eq!(columns_for("lineitem").unwrap().len(), 16);
    }

    #[test]
    fn test_unknown_table() {
        match columns_for("lineitems") {
            Err(PrepError::UnknownTable(name)) => assert_eq!(name, "lineitems"),
            other => panic!("expected UnknownTable, got {:?}", other),
        }
    }

    #[test]
    fn test_column_names_unique_per_table() {
        for spec in &CATALOG {
            let set: HashSet<_> = spec.columns.iter().collect();
            assert_eq!(set.len(), spec.columns.len(), "duplicate in {}", spec.name);
        }
        let names: HashSet<_> = table_names().collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_sampled_tables_are_in_catalog() {
        for name in SAMPLED_TABLES {
            assert!(table_spec(name).is_ok());
        }
        assert!(is_sampled("orders"));
        assert!(!is_sampled("nation"));
    }

    #[test]
    fn test_select_tables_keeps_catalog_order() {
        let picked = select_tables(&["supplier".to_string(), "nation".to_string()]).unwrap();
        let names: Vec<_> = picked.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["nation", "supplier"]);

        assert_eq!(select_tables(&[]).unwrap().len(), 8);
        assert!(select_tables(&["nation".into(), "bogus".into()]).is_err());
    }
}
