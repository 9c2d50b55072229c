use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A QC review of one batch of a site's netCDF files.
///
/// The per-question answers are keyed by field name (`timing_present`,
/// `timing_when0s`, `timing_cmts`, ...). Dates are kept as `YYYY-MM-DD`
/// strings so drafts can hold whatever the reviewer has typed so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    pub id: Option<i64>,
    pub reviewer: String,
    pub site: String,
    pub netcdf_files: String,
    pub is_draft: bool,
    pub answers: BTreeMap<String, String>,
    pub modification_time: Option<DateTime<Utc>>,
}

impl QcReport {
    /// Returns a non-blank answer for `field`, if any.
    pub fn answer(&self, field: &str) -> Option<&str> {
        self.answers
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Filters accepted by the QC report list page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcReportFilter {
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub modified_after: Option<String>,
    #[serde(default)]
    pub modified_before: Option<String>,
}
