//! Content extractor contract and selection.
//!
//! Extractors turn raw fetched bodies into flat records. Which one runs is
//! decided per poll: the explicitly configured extractor, else the last one
//! that worked for this target, else the first that claims the body. The
//! choice is returned to the caller instead of being cached globally.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::hnap::HnapBatchResponse;
use crate::hnap::constants::{FIELD_SEPARATOR, RECORD_SEPARATOR, RESPONSE_SUFFIX};
use crate::hnap::delimited;
use crate::models::{PollData, RawBody};

/// One structured row (e.g. a channel) keyed by column name.
pub type Record = BTreeMap<String, String>;

/// Output of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Records {
    pub extractor: String,
    pub rows: Vec<Record>,
}

/// Pluggable body-to-records transformer.
pub trait ContentExtractor: Send + Sync {
    /// Stable name, used to persist the selection.
    fn name(&self) -> &'static str;

    fn can_handle(&self, body: &RawBody) -> bool;

    fn extract(&self, body: &RawBody) -> Result<Vec<Record>>;
}

/// Per-target extractor choice, stored with the target record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorSelection {
    /// Chosen by the user; always wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit: Option<String>,

    /// Extractor that produced records on the last successful poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful: Option<String>,
}

impl ExtractorSelection {
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            explicit: Some(name.into()),
            last_successful: None,
        }
    }

    fn succeeded_with(&self, name: &str) -> Self {
        Self {
            explicit: self.explicit.clone(),
            last_successful: Some(name.to_string()),
        }
    }
}

/// Known-order names for common HNAP channel tables.
const DOWNSTREAM_ORDER: &[&str] = &[
    "channel",
    "lock_status",
    "modulation",
    "channel_id",
    "frequency",
    "power",
    "snr",
    "corrected",
    "uncorrected",
];
const UPSTREAM_ORDER: &[&str] = &[
    "channel",
    "lock_status",
    "channel_type",
    "channel_id",
    "symbol_rate",
    "frequency",
    "power",
];

fn field_order(field: &str) -> Option<&'static [&'static str]> {
    if field.ends_with("DownstreamChannel") {
        Some(DOWNSTREAM_ORDER)
    } else if field.ends_with("UpstreamChannel") {
        Some(UPSTREAM_ORDER)
    } else {
        None
    }
}

/// Rows of every HTML table that has a header row and at least one data row.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTableExtractor;

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ContentExtractor for HtmlTableExtractor {
    fn name(&self) -> &'static str {
        "html_table"
    }

    fn can_handle(&self, body: &RawBody) -> bool {
        body.body.to_ascii_lowercase().contains("<table")
    }

    fn extract(&self, body: &RawBody) -> Result<Vec<Record>> {
        let document = Html::parse_document(&body.body);
        let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
            Selector::parse("table"),
            Selector::parse("tr"),
            Selector::parse("th, td"),
        ) else {
            return Err(AppError::extraction(self.name(), "invalid selector"));
        };

        let mut rows = Vec::new();
        for table in document.select(&table_sel) {
            let mut table_rows = table.select(&row_sel);
            let Some(header) = table_rows.next() else {
                continue;
            };
            let columns: Vec<String> = header.select(&cell_sel).map(cell_text).collect();
            if columns.iter().all(String::is_empty) {
                continue;
            }

            for row in table_rows {
                let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
                if cells.is_empty() || cells.iter().all(String::is_empty) {
                    continue;
                }
                let record: Record = columns
                    .iter()
                    .zip(cells)
                    .filter(|(column, _)| !column.is_empty())
                    .map(|(column, value)| (column.clone(), value))
                    .collect();
                rows.push(record);
            }
        }

        if rows.is_empty() {
            return Err(AppError::extraction(
                self.name(),
                format!("no table rows in {}", body.resource),
            ));
        }
        Ok(rows)
    }
}

/// Delimited list fields from an HNAP batch response.
#[derive(Debug, Clone, Copy, Default)]
pub struct HnapListExtractor;

impl ContentExtractor for HnapListExtractor {
    fn name(&self) -> &'static str {
        "hnap_list"
    }

    fn can_handle(&self, body: &RawBody) -> bool {
        let trimmed = body.body.trim_start();
        trimmed.starts_with('{') && trimmed.contains(RESPONSE_SUFFIX)
    }

    fn extract(&self, body: &RawBody) -> Result<Vec<Record>> {
        let response = HnapBatchResponse::parse(&body.body)
            .map_err(|e| AppError::extraction(self.name(), e))?;

        let mut rows = Vec::new();
        let mut stack: Vec<(&str, &Value)> = vec![("", response.as_value())];
        while let Some((action, value)) = stack.pop() {
            let Some(object) = value.as_object() else {
                continue;
            };
            for (key, value) in object {
                if let Some(action) = key.strip_suffix(RESPONSE_SUFFIX) {
                    stack.push((action, value));
                    continue;
                }
                let Some(raw) = value.as_str() else {
                    continue;
                };
                if !raw.contains(RECORD_SEPARATOR) && !raw.contains(FIELD_SEPARATOR) {
                    continue;
                }
                for record in delimited::split_records(raw) {
                    let mut row: Record = match field_order(key) {
                        Some(order) => delimited::zip_fields(&record, order)
                            .map_err(|e| AppError::extraction(self.name(), e))?,
                        None => record
                            .iter()
                            .enumerate()
                            .map(|(i, value)| (format!("field_{i}"), value.clone()))
                            .collect(),
                    };
                    row.insert("action".into(), action.to_string());
                    row.insert("table".into(), key.clone());
                    rows.push(row);
                }
            }
        }

        if rows.is_empty() {
            return Err(AppError::extraction(self.name(), "no delimited list fields"));
        }
        Ok(rows)
    }
}

/// Registered extractors in registration order.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn ContentExtractor>>,
}

impl ExtractorSet {
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    pub fn register(mut self, extractor: impl ContentExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn ContentExtractor> {
        self.extractors
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    /// Explicit choice, then last successful (if it still claims the body),
    /// then the first extractor that claims it.
    pub fn select(
        &self,
        body: &RawBody,
        selection: &ExtractorSelection,
    ) -> Result<&dyn ContentExtractor> {
        if let Some(name) = &selection.explicit {
            return self.get(name).ok_or_else(|| {
                AppError::extraction(name.as_str(), "explicitly selected extractor is not registered")
            });
        }
        if let Some(cached) = selection.last_successful.as_deref().and_then(|n| self.get(n)) {
            if cached.can_handle(body) {
                return Ok(cached);
            }
        }
        self.extractors
            .iter()
            .find(|e| e.can_handle(body))
            .map(|e| e.as_ref())
            .ok_or_else(|| {
                AppError::extraction("selector", format!("no extractor handles {}", body.resource))
            })
    }

    /// Extract every body of a poll with the extractor chosen for the
    /// first one. Returns the records and the updated selection.
    pub fn run(
        &self,
        data: &PollData,
        selection: &ExtractorSelection,
    ) -> Result<(Records, ExtractorSelection)> {
        let primary = data
            .primary()
            .ok_or_else(|| AppError::extraction("selector", "poll returned no bodies"))?;
        let extractor = self.select(primary, selection)?;

        let mut rows = Vec::new();
        for body in &data.bodies {
            rows.extend(extractor.extract(body)?);
        }
        log::debug!("Extractor '{}' produced {} records", extractor.name(), rows.len());

        Ok((
            Records {
                extractor: extractor.name().to_string(),
                rows,
            },
            selection.succeeded_with(extractor.name()),
        ))
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::empty()
            .register(HnapListExtractor)
            .register(HtmlTableExtractor)
    }
}
