//! Positional list fields in HNAP responses.
//!
//! Channel tables arrive as one string: records separated by `|+|`,
//! fields within a record separated by `^`. Field names are not on the
//! wire, so callers supply the order.

use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::hnap::constants::{FIELD_SEPARATOR, RECORD_SEPARATOR};

/// Split a delimited list into records of raw fields.
///
/// Empty records (e.g. from a trailing `|+|`) are dropped; empty fields
/// inside a record are kept so positions stay stable.
pub fn split_records(raw: &str) -> Vec<Vec<String>> {
    raw.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            record
                .split(FIELD_SEPARATOR)
                .map(|field| field.trim().to_string())
                .collect()
        })
        .collect()
}

/// Name the fields of one record by position.
///
/// A record shorter than `order` is malformed. Extra trailing fields are
/// ignored, since firmware appends columns over time.
pub fn zip_fields(record: &[String], order: &[&str]) -> Result<BTreeMap<String, String>> {
    if record.len() < order.len() {
        return Err(AppError::protocol(format!(
            "record has {} fields, expected at least {}",
            record.len(),
            order.len()
        )));
    }
    Ok(order
        .iter()
        .zip(record)
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect())
}

/// Split and name every record in a delimited list.
pub fn parse_table(raw: &str, order: &[&str]) -> Result<Vec<BTreeMap<String, String>>> {
    split_records(raw)
        .iter()
        .map(|record| zip_fields(record, order))
        .collect()
}
