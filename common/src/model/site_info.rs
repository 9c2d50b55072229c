use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The fields every site carries in the site info file, in file order.
pub const STANDARD_FIELDS: [&str; 8] = [
    "long_name",
    "release_lag",
    "location",
    "contact",
    "site_reference",
    "data_doi",
    "data_reference",
    "data_revision",
];

/// Fields a site's own team may edit. Staff may edit all of `STANDARD_FIELDS`.
pub const SITE_EDITABLE_FIELDS: [&str; 5] = [
    "release_lag",
    "location",
    "contact",
    "site_reference",
    "data_reference",
];

/// One site's entry in the site info JSON file.
///
/// Values are stored as strings in the file (including `release_lag`), and
/// any keys beyond the standard ones are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default)]
    pub long_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub release_lag: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub site_reference: String,
    #[serde(default)]
    pub data_doi: String,
    #[serde(default)]
    pub data_reference: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub data_revision: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The whole site info file: site id to site info, kept sorted by id.
pub type SiteInfoFile = BTreeMap<String, SiteInfo>;

impl SiteInfo {
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "long_name" => Some(&self.long_name),
            "release_lag" => Some(&self.release_lag),
            "location" => Some(&self.location),
            "contact" => Some(&self.contact),
            "site_reference" => Some(&self.site_reference),
            "data_doi" => Some(&self.data_doi),
            "data_reference" => Some(&self.data_reference),
            "data_revision" => Some(&self.data_revision),
            _ => None,
        }
    }

    /// Sets a standard field; returns `false` for unknown field names.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "long_name" => &mut self.long_name,
            "release_lag" => &mut self.release_lag,
            "location" => &mut self.location,
            "contact" => &mut self.contact,
            "site_reference" => &mut self.site_reference,
            "data_doi" => &mut self.data_doi,
            "data_reference" => &mut self.data_reference,
            "data_revision" => &mut self.data_revision,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Name of the DOI metadata file kept for this site in the metadata directory.
    pub fn metadata_file_name(&self, site_id: &str) -> String {
        format!("{}_{}.json", site_id, self.long_name)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_release_lag_and_extra_keys_survive() {
        let raw = r#"{"pa": {"long_name": "parkfalls", "release_lag": 120, "short_location": "Park Falls, WI"}}"#;
        let file: SiteInfoFile = serde_json::from_str(raw).unwrap();
        let pa = &file["pa"];
        assert_eq!(pa.release_lag, "120");
        assert_eq!(pa.extra["short_location"], "Park Falls, WI");

        let back = serde_json::to_value(&file).unwrap();
        assert_eq!(back["pa"]["short_location"], "Park Falls, WI");
        assert_eq!(back["pa"]["release_lag"], "120");
    }

    #[test]
    fn metadata_file_uses_long_name() {
        let info = SiteInfo {
            long_name: "lamont".into(),
            ..Default::default()
        };
        assert_eq!(info.metadata_file_name("oc"), "oc_lamont.json");
    }
}
