//! DataCite-style citation metadata kept per site in the metadata directory.
//!
//! Only the parts the portal edits are typed. Everything else in a metadata
//! file (titles, publisher, subjects, ...) rides along in the `extra` maps so
//! a round trip through the portal never drops keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameIdentifier {
    pub name_identifier: String,
    #[serde(default)]
    pub name_identifier_scheme: String,
    #[serde(default, rename = "schemeURI", skip_serializing_if = "Option::is_none")]
    pub scheme_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation_identifier_scheme: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    #[serde(default)]
    pub creator_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_identifiers: Vec<NameIdentifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliation: Vec<Affiliation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    #[serde(default)]
    pub contributor_name: String,
    #[serde(default)]
    pub contributor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_identifiers: Vec<NameIdentifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliation: Vec<Affiliation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedIdentifier {
    #[serde(default)]
    pub related_identifier: String,
    #[serde(default)]
    pub related_identifier_type: String,
    #[serde(default)]
    pub relation_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingReference {
    #[serde(default)]
    pub funder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funder_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funder_identifier_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocationPoint {
    pub point_latitude: f64,
    pub point_longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    #[serde(default)]
    pub geo_location_place: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location_point: Option<GeoLocationPoint>,
}

/// A site's DOI metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoiMetadata {
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default)]
    pub related_identifiers: Vec<RelatedIdentifier>,
    #[serde(default, alias = "FundingReference")]
    pub funding_references: Vec<FundingReference>,
    #[serde(default, rename = "GeoLocation", alias = "geoLocations")]
    pub geo_location: Vec<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "__last_modified__", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DoiMetadata {
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
            && self.contributors.is_empty()
            && self.related_identifiers.is_empty()
            && self.funding_references.is_empty()
            && self.geo_location.is_empty()
            && self.doi.is_none()
            && self.extra.is_empty()
    }
}

/// Contributor types that name an organisation rather than a person.
pub const NON_PERSON_CONTRIBUTOR_TYPES: [&str; 4] = [
    "HostingInstitution",
    "RegistrationAgency",
    "RegistrationAuthority",
    "ResearchGroup",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_key_names_are_accepted() {
        let raw = r#"{
            "geoLocations": [{"geoLocationPlace": "Lamont, OK"}],
            "FundingReference": [{"funderName": "NASA"}],
            "titles": [{"title": "TCCON data from Lamont"}]
        }"#;
        let meta: DoiMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.geo_location[0].geo_location_place, "Lamont, OK");
        assert_eq!(meta.funding_references[0].funder_name, "NASA");
        assert!(meta.extra.contains_key("titles"));

        let out = serde_json::to_value(&meta).unwrap();
        assert!(out.get("GeoLocation").is_some());
        assert!(out.get("fundingReferences").is_some());
    }
}
