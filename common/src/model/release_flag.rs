use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const KEY_DATE_FMT: &str = "%Y%m%d";

/// A recorded data-quality issue for a site and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFlag {
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The flags file: `<site>_<n>_<start>_<end>` to flag.
pub type ReleaseFlagFile = BTreeMap<String, ReleaseFlag>;

/// The flag definitions file, `{"definitions": {name: value}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinitions {
    pub definitions: BTreeMap<String, i64>,
}

impl FlagDefinitions {
    pub fn name_for(&self, value: i64) -> Option<&str> {
        self.definitions
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(k, _)| k.as_str())
    }
}

/// Parsed form of a flag key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagKey {
    pub site_id: String,
    pub number: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FlagKey {
    /// Parses `<site>_<n>_<YYYYMMDD>_<YYYYMMDD>`; the number may be zero padded.
    pub fn parse(key: &str) -> Option<FlagKey> {
        let mut parts = key.split('_');
        let site_id = parts.next()?;
        let number = parts.next()?.parse().ok()?;
        let start = NaiveDate::parse_from_str(parts.next()?, KEY_DATE_FMT).ok()?;
        let end = NaiveDate::parse_from_str(parts.next()?, KEY_DATE_FMT).ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(FlagKey {
            site_id: site_id.to_string(),
            number,
            start,
            end,
        })
    }

    pub fn to_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.site_id,
            self.number,
            self.start.format(KEY_DATE_FMT),
            self.end.format(KEY_DATE_FMT)
        )
    }
}

/// Finds the key in `flags` belonging to flag number `number` of `site_id`.
pub fn find_flag_key<'a>(flags: &'a ReleaseFlagFile, site_id: &str, number: u32) -> Option<&'a str> {
    flags
        .keys()
        .find(|k| {
            FlagKey::parse(k).is_some_and(|parsed| parsed.site_id == site_id && parsed.number == number)
        })
        .map(String::as_str)
}

/// One past the highest flag number currently used by `site_id`.
pub fn next_flag_number(flags: &ReleaseFlagFile, site_id: &str) -> u32 {
    flags
        .keys()
        .filter_map(|k| FlagKey::parse(k))
        .filter(|k| k.site_id == site_id)
        .map(|k| k.number)
        .max()
        .unwrap_or(0)
        + 1
}
