//! Forms for a site's DataCite metadata: the site location form and one
//! formset each for creators, contributors, related identifiers and
//! funding references.
//!
//! A formset posts its rows as `<prefix>-<i>-<field>` plus
//! `<prefix>-TOTAL_FORMS`; rows that are entirely blank or ticked
//! `<prefix>-<i>-DELETE` are dropped.

use crate::forms::{FieldErrors, FormData};
use crate::html;
use std::collections::BTreeMap;
use std::fmt::Write;
use tccon_common::model::doi::{
    Affiliation, Contributor, Creator, DoiMetadata, FundingReference, GeoLocation, GeoLocationPoint,
    NameIdentifier, RelatedIdentifier, NON_PERSON_CONTRIBUTOR_TYPES,
};

pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub choices: Option<&'static [&'static str]>,
}

const fn text(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec { name, label, choices: None }
}

const fn choice(name: &'static str, label: &'static str, choices: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, label, choices: Some(choices) }
}

pub struct FormsetSpec {
    pub prefix: &'static str,
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

/// One formset row: field name to submitted value.
pub type Row = BTreeMap<String, String>;

const CONTRIBUTOR_TYPES: &[&str] = &[
    "ContactPerson", "DataCollector", "DataCurator", "DataManager", "Distributor", "Editor",
    "HostingInstitution", "Producer", "ProjectLeader", "ProjectManager", "ProjectMember",
    "RegistrationAgency", "RegistrationAuthority", "RelatedPerson", "Researcher", "ResearchGroup",
    "RightsHolder", "Sponsor", "Supervisor", "WorkPackageLeader", "Other",
];

const IDENTIFIER_TYPES: &[&str] = &[
    "DOI", "URL", "ARK", "arXiv", "bibcode", "Handle", "ISBN", "ISSN", "PURL", "URN",
];

const RELATION_TYPES: &[&str] = &[
    "IsCitedBy", "Cites", "IsSupplementTo", "IsSupplementedBy", "IsContinuedBy", "Continues",
    "IsDescribedBy", "Describes", "HasMetadata", "IsMetadataFor", "HasVersion", "IsVersionOf",
    "IsNewVersionOf", "IsPreviousVersionOf", "IsPartOf", "HasPart", "IsReferencedBy", "References",
    "IsDocumentedBy", "Documents", "IsCompiledBy", "Compiles", "IsDerivedFrom", "IsSourceOf",
    "IsRequiredBy", "Requires", "IsObsoletedBy", "Obsoletes",
];

const FUNDER_ID_TYPES: &[&str] = &["", "Crossref Funder ID", "ROR", "GRID", "ISNI", "Other"];

pub const CREATORS: FormsetSpec = FormsetSpec {
    prefix: "creators",
    title: "Creators",
    fields: &[
        text("family_name", "Family name"),
        text("given_name", "Given name"),
        text("organization", "Organization name"),
        text("orcid", "ORCID"),
        text("affiliation", "Affiliation(s)"),
        text("affiliation_ror", "Affiliation ROR ID(s)"),
    ],
};

pub const CONTRIBUTORS: FormsetSpec = FormsetSpec {
    prefix: "contributors",
    title: "Contributors",
    fields: &[
        choice("contributor_type", "Contributor type", CONTRIBUTOR_TYPES),
        text("family_name", "Family name"),
        text("given_name", "Given name"),
        text("organization", "Organization name"),
        text("orcid", "ORCID"),
        text("affiliation", "Affiliation(s)"),
        text("affiliation_ror", "Affiliation ROR ID(s)"),
    ],
};

pub const RELATED_IDS: FormsetSpec = FormsetSpec {
    prefix: "related_ids",
    title: "Related identifiers",
    fields: &[
        text("related_identifier", "Identifier"),
        choice("related_identifier_type", "Identifier type", IDENTIFIER_TYPES),
        choice("relation_type", "Relation type", RELATION_TYPES),
    ],
};

pub const FUNDING: FormsetSpec = FormsetSpec {
    prefix: "funding",
    title: "Funding references",
    fields: &[
        text("funder_name", "Funder name"),
        text("funder_identifier", "Funder identifier"),
        choice("funder_identifier_type", "Funder identifier type", FUNDER_ID_TYPES),
        text("award_number", "Award number"),
        text("award_title", "Award title"),
    ],
};

fn field_key(prefix: &str, index: usize, field: &str) -> String {
    format!("{}-{}-{}", prefix, index, field)
}

/// Rows of one formset from a post, with blank and deleted rows removed.
pub fn rows_from_post(spec: &FormsetSpec, data: &FormData) -> Vec<Row> {
    let mut rows = Vec::new();
    for i in 0..data.total_forms(spec.prefix) {
        if !data.get(&field_key(spec.prefix, i, "DELETE")).is_empty() {
            continue;
        }
        let row: Row = spec
            .fields
            .iter()
            .map(|f| (f.name.to_string(), data.trimmed(&field_key(spec.prefix, i, f.name)).to_string()))
            .collect();
        if row.values().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }
    rows
}

fn value<'a>(row: &'a Row, field: &str) -> &'a str {
    row.get(field).map(String::as_str).unwrap_or("")
}

fn opt(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// ---------- people and organisations ----------

fn orcid_of(ids: &[NameIdentifier]) -> String {
    ids.iter()
        .find(|id| id.name_identifier_scheme.eq_ignore_ascii_case("ORCID"))
        .map(|id| id.name_identifier.clone())
        .unwrap_or_default()
}

fn orcid_identifier(orcid: &str) -> Vec<NameIdentifier> {
    if orcid.is_empty() {
        return Vec::new();
    }
    vec![NameIdentifier {
        name_identifier: orcid.to_string(),
        name_identifier_scheme: "ORCID".to_string(),
        scheme_uri: Some("https://orcid.org".to_string()),
    }]
}

fn affiliation_cells(affiliations: &[Affiliation]) -> (String, String) {
    let names = affiliations.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
    let rors = affiliations
        .iter()
        .map(|a| a.affiliation_identifier.as_deref().unwrap_or(""))
        .collect::<Vec<_>>();
    let rors = rors.join("; ");
    (names.join("; "), rors.trim_end_matches([';', ' ']).to_string())
}

/// Affiliation names and ROR ids are semicolon separated and matched by
/// position.
fn affiliations_from(names: &str, rors: &str) -> Vec<Affiliation> {
    let rors: Vec<&str> = rors.split(';').map(str::trim).collect();
    names
        .split(';')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .enumerate()
        .map(|(i, name)| {
            let ror = rors.get(i).copied().unwrap_or("");
            Affiliation {
                name: name.to_string(),
                affiliation_identifier: opt(ror),
                affiliation_identifier_scheme: opt(ror).map(|_| "ROR".to_string()),
            }
        })
        .collect()
}

fn person_cells(
    row: &mut Row,
    full_name: &str,
    given: &Option<String>,
    family: &Option<String>,
    ids: &[NameIdentifier],
    affiliations: &[Affiliation],
) {
    match (family, given) {
        (Some(f), Some(g)) => {
            row.insert("family_name".into(), f.clone());
            row.insert("given_name".into(), g.clone());
        }
        _ => {
            row.insert("organization".into(), full_name.to_string());
        }
    }
    row.insert("orcid".into(), orcid_of(ids));
    let (names, rors) = affiliation_cells(affiliations);
    row.insert("affiliation".into(), names);
    row.insert("affiliation_ror".into(), rors);
}

/// Checks the name columns of a creator or contributor row.
fn validate_name(row: &Row, key: &str, person_allowed: bool, errors: &mut FieldErrors) {
    let family = value(row, "family_name");
    let given = value(row, "given_name");
    let org = value(row, "organization");
    let has_person = !family.is_empty() || !given.is_empty();

    if has_person && !person_allowed {
        errors.add(key, "This contributor type must be an organization; give only an organization name.");
    } else if has_person && !org.is_empty() {
        errors.add(key, "Give either a person's name or an organization name, not both.");
    } else if has_person && (family.is_empty() || given.is_empty()) {
        errors.add(key, "A person needs both a family name and a given name.");
    } else if !has_person && org.is_empty() {
        errors.add(key, "Give a family and given name, or an organization name.");
    }
}

/// `(full name, given, family)` for the name columns of a row.
fn names_from(row: &Row) -> (String, Option<String>, Option<String>) {
    let family = value(row, "family_name");
    let given = value(row, "given_name");
    if !family.is_empty() && !given.is_empty() {
        (format!("{}, {}", family, given), opt(given), opt(family))
    } else {
        (value(row, "organization").to_string(), None, None)
    }
}

fn blank_row(spec: &FormsetSpec) -> Row {
    spec.fields
        .iter()
        .map(|f| (f.name.to_string(), String::new()))
        .collect()
}

pub fn creator_rows(creators: &[Creator]) -> Vec<Row> {
    creators
        .iter()
        .map(|c| {
            let mut row = blank_row(&CREATORS);
            person_cells(&mut row, &c.creator_name, &c.given_name, &c.family_name, &c.name_identifiers, &c.affiliation);
            row
        })
        .collect()
}

pub fn contributor_rows(contributors: &[Contributor]) -> Vec<Row> {
    contributors
        .iter()
        .map(|c| {
            let mut row = blank_row(&CONTRIBUTORS);
            row.insert("contributor_type".into(), c.contributor_type.clone());
            person_cells(&mut row, &c.contributor_name, &c.given_name, &c.family_name, &c.name_identifiers, &c.affiliation);
            row
        })
        .collect()
}

pub fn related_rows(related: &[RelatedIdentifier]) -> Vec<Row> {
    related
        .iter()
        .map(|r| {
            Row::from([
                ("related_identifier".to_string(), r.related_identifier.clone()),
                ("related_identifier_type".to_string(), r.related_identifier_type.clone()),
                ("relation_type".to_string(), r.relation_type.clone()),
            ])
        })
        .collect()
}

pub fn funding_rows(funding: &[FundingReference]) -> Vec<Row> {
    funding
        .iter()
        .map(|f| {
            Row::from([
                ("funder_name".to_string(), f.funder_name.clone()),
                ("funder_identifier".to_string(), f.funder_identifier.clone().unwrap_or_default()),
                ("funder_identifier_type".to_string(), f.funder_identifier_type.clone().unwrap_or_default()),
                ("award_number".to_string(), f.award_number.clone().unwrap_or_default()),
                ("award_title".to_string(), f.award_title.clone().unwrap_or_default()),
            ])
        })
        .collect()
}

fn validate_choices(spec: &FormsetSpec, row: &Row, index: usize, errors: &mut FieldErrors) {
    for field in spec.fields {
        if let Some(choices) = field.choices {
            let v = value(row, field.name);
            if !v.is_empty() && !choices.contains(&v) {
                errors.add(
                    &field_key(spec.prefix, index, field.name),
                    format!("Select a valid choice. {} is not one of the available choices.", v),
                );
            }
        }
    }
}

fn required(spec: &FormsetSpec, row: &Row, index: usize, field: &str, errors: &mut FieldErrors) {
    if value(row, field).is_empty() {
        errors.add(&field_key(spec.prefix, index, field), "This field is required.");
    }
}

fn row_key(spec: &FormsetSpec, index: usize) -> String {
    format!("{}-{}", spec.prefix, index)
}

// ---------- site location ----------

/// Values of the site location form, kept as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteLocation {
    pub place: String,
    pub latitude: String,
    pub longitude: String,
}

impl SiteLocation {
    fn from_metadata(meta: &DoiMetadata) -> Self {
        match meta.geo_location.first() {
            Some(geo) => SiteLocation {
                place: geo.geo_location_place.clone(),
                latitude: geo
                    .geo_location_point
                    .as_ref()
                    .map(|p| p.point_latitude.to_string())
                    .unwrap_or_default(),
                longitude: geo
                    .geo_location_point
                    .as_ref()
                    .map(|p| p.point_longitude.to_string())
                    .unwrap_or_default(),
            },
            None => SiteLocation::default(),
        }
    }

    fn validate(&self, errors: &mut FieldErrors) -> Option<GeoLocationPoint> {
        if self.latitude.is_empty() && self.longitude.is_empty() {
            return None;
        }
        let lat = parse_coordinate(&self.latitude, 90.0, "site-latitude", errors);
        let lon = parse_coordinate(&self.longitude, 180.0, "site-longitude", errors);
        Some(GeoLocationPoint {
            point_latitude: lat?,
            point_longitude: lon?,
        })
    }
}

fn parse_coordinate(raw: &str, limit: f64, key: &str, errors: &mut FieldErrors) -> Option<f64> {
    if raw.is_empty() {
        errors.add(key, "Give both latitude and longitude, or neither.");
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Some(v),
        Ok(_) => {
            errors.add(key, format!("Must be between -{} and {}.", limit, limit));
            None
        }
        Err(_) => {
            errors.add(key, "Enter a number.");
            None
        }
    }
}

// ---------- all DOI forms together ----------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoiForms {
    pub location: SiteLocation,
    pub creators: Vec<Row>,
    pub contributors: Vec<Row>,
    pub related_ids: Vec<Row>,
    pub funding: Vec<Row>,
}

impl DoiForms {
    pub fn from_metadata(meta: &DoiMetadata) -> Self {
        DoiForms {
            location: SiteLocation::from_metadata(meta),
            creators: creator_rows(&meta.creators),
            contributors: contributor_rows(&meta.contributors),
            related_ids: related_rows(&meta.related_identifiers),
            funding: funding_rows(&meta.funding_references),
        }
    }

    pub fn from_post(data: &FormData) -> Self {
        DoiForms {
            location: SiteLocation {
                place: data.trimmed("site-place").to_string(),
                latitude: data.trimmed("site-latitude").to_string(),
                longitude: data.trimmed("site-longitude").to_string(),
            },
            creators: rows_from_post(&CREATORS, data),
            contributors: rows_from_post(&CONTRIBUTORS, data),
            related_ids: rows_from_post(&RELATED_IDS, data),
            funding: rows_from_post(&FUNDING, data),
        }
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        self.location.validate(&mut errors);

        for (i, row) in self.creators.iter().enumerate() {
            validate_name(row, &row_key(&CREATORS, i), true, &mut errors);
        }
        for (i, row) in self.contributors.iter().enumerate() {
            required(&CONTRIBUTORS, row, i, "contributor_type", &mut errors);
            validate_choices(&CONTRIBUTORS, row, i, &mut errors);
            let person_allowed = !NON_PERSON_CONTRIBUTOR_TYPES.contains(&value(row, "contributor_type"));
            validate_name(row, &row_key(&CONTRIBUTORS, i), person_allowed, &mut errors);
        }
        for (i, row) in self.related_ids.iter().enumerate() {
            for field in ["related_identifier", "related_identifier_type", "relation_type"] {
                required(&RELATED_IDS, row, i, field, &mut errors);
            }
            validate_choices(&RELATED_IDS, row, i, &mut errors);
        }
        for (i, row) in self.funding.iter().enumerate() {
            required(&FUNDING, row, i, "funder_name", &mut errors);
            validate_choices(&FUNDING, row, i, &mut errors);
        }
        errors
    }

    /// Replaces the edited sections of `meta`; everything else it holds is
    /// kept. Call only after [`DoiForms::validate`] came back empty.
    pub fn apply(&self, meta: &mut DoiMetadata, data_doi: &str, data_revision: &str) {
        let mut scratch = FieldErrors::default();
        let point = self.location.validate(&mut scratch);
        meta.geo_location = if self.location.place.is_empty() && point.is_none() {
            Vec::new()
        } else {
            vec![GeoLocation {
                geo_location_place: self.location.place.clone(),
                geo_location_point: point,
            }]
        };

        meta.creators = self
            .creators
            .iter()
            .map(|row| {
                let (creator_name, given_name, family_name) = names_from(row);
                Creator {
                    creator_name,
                    given_name,
                    family_name,
                    name_identifiers: orcid_identifier(value(row, "orcid")),
                    affiliation: affiliations_from(value(row, "affiliation"), value(row, "affiliation_ror")),
                    ..Default::default()
                }
            })
            .collect();

        meta.contributors = self
            .contributors
            .iter()
            .map(|row| {
                let (contributor_name, given_name, family_name) = names_from(row);
                Contributor {
                    contributor_name,
                    contributor_type: value(row, "contributor_type").to_string(),
                    given_name,
                    family_name,
                    name_identifiers: orcid_identifier(value(row, "orcid")),
                    affiliation: affiliations_from(value(row, "affiliation"), value(row, "affiliation_ror")),
                    ..Default::default()
                }
            })
            .collect();

        meta.related_identifiers = self
            .related_ids
            .iter()
            .map(|row| RelatedIdentifier {
                related_identifier: value(row, "related_identifier").to_string(),
                related_identifier_type: value(row, "related_identifier_type").to_string(),
                relation_type: value(row, "relation_type").to_string(),
                ..Default::default()
            })
            .collect();

        meta.funding_references = self
            .funding
            .iter()
            .map(|row| FundingReference {
                funder_name: value(row, "funder_name").to_string(),
                funder_identifier: opt(value(row, "funder_identifier")),
                funder_identifier_type: opt(value(row, "funder_identifier_type")),
                award_number: opt(value(row, "award_number")),
                award_title: opt(value(row, "award_title")),
                ..Default::default()
            })
            .collect();

        meta.doi = opt(data_doi);
        meta.version = opt(data_revision);
    }

    pub fn render(&self, errors: &FieldErrors) -> String {
        let mut out = String::from("<fieldset><legend>Site location</legend>\n");
        out.push_str(&html::text_input("site-place", "Place", &self.location.place, errors));
        out.push_str(&html::text_input("site-latitude", "Latitude", &self.location.latitude, errors));
        out.push_str(&html::text_input("site-longitude", "Longitude", &self.location.longitude, errors));
        out.push_str("</fieldset>\n");
        out.push_str(&render_formset(&CREATORS, &self.creators, errors));
        out.push_str(&render_formset(&CONTRIBUTORS, &self.contributors, errors));
        out.push_str(&render_formset(&RELATED_IDS, &self.related_ids, errors));
        out.push_str(&render_formset(&FUNDING, &self.funding, errors));
        out
    }
}

fn cell(spec: &FormsetSpec, index: &str, field: &FieldSpec, current: &str, errors: &FieldErrors) -> String {
    let name = format!("{}-{}-{}", spec.prefix, index, field.name);
    let input = match field.choices {
        Some(choices) => {
            let mut s = format!("<select name=\"{}\">", html::escape(&name));
            if !choices.contains(&"") {
                s.push_str("<option value=\"\">-</option>");
            }
            for c in choices {
                let sel = if *c == current { " selected" } else { "" };
                let _ = write!(s, "<option value=\"{0}\"{1}>{0}</option>", html::escape(c), sel);
            }
            s.push_str("</select>");
            s
        }
        None => format!(
            "<input type=\"text\" name=\"{}\" value=\"{}\">",
            html::escape(&name),
            html::escape(current)
        ),
    };
    format!("<td>{}{}</td>", input, html::field_errors(errors, &name))
}

fn formset_row(spec: &FormsetSpec, index: &str, row: Option<&Row>, errors: &FieldErrors) -> String {
    let mut out = String::from("<tr class=\"formset-row\">");
    for field in spec.fields {
        let current = row.map(|r| value(r, field.name)).unwrap_or("");
        out.push_str(&cell(spec, index, field, current, errors));
    }
    let _ = write!(
        out,
        "<td><input type=\"checkbox\" name=\"{}-{}-DELETE\">{}</td></tr>\n",
        spec.prefix,
        index,
        html::field_errors(errors, &format!("{}-{}", spec.prefix, index))
    );
    out
}

/// A formset table with the given rows plus one blank row, and a template
/// row that `formset.js` clones for "Add another".
pub fn render_formset(spec: &FormsetSpec, rows: &[Row], errors: &FieldErrors) -> String {
    let total = rows.len() + 1;
    let mut out = format!(
        "<fieldset class=\"formset\" data-prefix=\"{p}\"><legend>{t}</legend>\n\
         <input type=\"hidden\" name=\"{p}-TOTAL_FORMS\" value=\"{n}\">\n<table>\n<thead><tr>",
        p = spec.prefix,
        t = html::escape(spec.title),
        n = total
    );
    for field in spec.fields {
        let _ = write!(out, "<th>{}</th>", html::escape(field.label));
    }
    out.push_str("<th>Delete</th></tr></thead>\n<tbody>\n");
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&formset_row(spec, &i.to_string(), Some(row), errors));
    }
    out.push_str(&formset_row(spec, &rows.len().to_string(), None, errors));
    out.push_str("</tbody>\n</table>\n<template class=\"empty-form\">");
    out.push_str(&formset_row(spec, "__prefix__", None, &FieldErrors::default()));
    out.push_str("</template>\n<button type=\"button\" class=\"add-form\">Add another</button>\n</fieldset>\n");
    out
}

/// Read-only tables of the DOI metadata for the site view page.
pub fn metadata_tables(meta: &DoiMetadata) -> String {
    let forms = DoiForms::from_metadata(meta);
    let mut out = String::new();

    out.push_str("<h3>Site location</h3>\n");
    if forms.location == SiteLocation::default() {
        out.push_str("<p>None given</p>\n");
    } else {
        out.push_str(&html::table(
            &["Place", "Latitude", "Longitude"],
            &[vec![
                forms.location.place.clone(),
                forms.location.latitude.clone(),
                forms.location.longitude.clone(),
            ]],
        ));
    }

    for (spec, rows) in [
        (&CREATORS, &forms.creators),
        (&CONTRIBUTORS, &forms.contributors),
        (&RELATED_IDS, &forms.related_ids),
        (&FUNDING, &forms.funding),
    ] {
        let _ = writeln!(out, "<h3>{}</h3>", html::escape(spec.title));
        if rows.is_empty() {
            out.push_str("<p>None given</p>\n");
            continue;
        }
        let headers: Vec<&str> = spec.fields.iter().map(|f| f.label).collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|r| spec.fields.iter().map(|f| value(r, f.name).to_string()).collect())
            .collect();
        out.push_str(&html::table(&headers, &cells));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_and_deleted_rows_are_skipped() {
        let data = post(&[
            ("creators-TOTAL_FORMS", "3"),
            ("creators-0-family_name", "Wennberg"),
            ("creators-0-given_name", "Paul"),
            ("creators-1-organization", "Caltech"),
            ("creators-1-DELETE", "on"),
            ("creators-2-family_name", ""),
        ]);
        let rows = rows_from_post(&CREATORS, &data);
        assert_eq!(rows.len(), 1);
        assert_eq!(value(&rows[0], "family_name"), "Wennberg");
    }

    #[test]
    fn creators_need_a_full_name_or_organization() {
        let data = post(&[
            ("creators-TOTAL_FORMS", "3"),
            ("creators-0-family_name", "Wennberg"),
            ("creators-1-organization", "Caltech"),
            ("creators-2-family_name", "Roehl"),
            ("creators-2-given_name", "Coleen"),
        ]);
        let errors = DoiForms::from_post(&data).validate();
        assert!(errors.has("creators-0"));
        assert!(!errors.has("creators-1"));
        assert!(!errors.has("creators-2"));
    }

    #[test]
    fn organisational_contributor_types_reject_people() {
        let data = post(&[
            ("contributors-TOTAL_FORMS", "2"),
            ("contributors-0-contributor_type", "HostingInstitution"),
            ("contributors-0-family_name", "Doe"),
            ("contributors-0-given_name", "Jane"),
            ("contributors-1-contributor_type", "Nonsense"),
            ("contributors-1-organization", "CaltechDATA"),
        ]);
        let errors = DoiForms::from_post(&data).validate();
        assert!(errors.has("contributors-0"));
        assert!(errors.has("contributors-1-contributor_type"));
    }

    #[test]
    fn related_and_funding_required_fields() {
        let data = post(&[
            ("related_ids-TOTAL_FORMS", "1"),
            ("related_ids-0-related_identifier", "10.1/x"),
            ("funding-TOTAL_FORMS", "1"),
            ("funding-0-award_number", "NNX1"),
        ]);
        let errors = DoiForms::from_post(&data).validate();
        assert!(errors.has("related_ids-0-relation_type"));
        assert!(errors.has("related_ids-0-related_identifier_type"));
        assert!(errors.has("funding-0-funder_name"));
    }

    #[test]
    fn coordinates_are_range_checked() {
        let data = post(&[("site-latitude", "91"), ("site-longitude", "east")]);
        let errors = DoiForms::from_post(&data).validate();
        assert!(errors.has("site-latitude"));
        assert!(errors.has("site-longitude"));

        let data = post(&[("site-latitude", "45.9")]);
        assert!(DoiForms::from_post(&data).validate().has("site-longitude"));
    }

    #[test]
    fn apply_keeps_unedited_metadata() {
        let mut meta: DoiMetadata = serde_json::from_value(serde_json::json!({
            "titles": [{"title": "TCCON data from Park Falls"}],
            "creators": [{"creatorName": "Old, Entry"}]
        }))
        .unwrap();
        let data = post(&[
            ("site-place", "Park Falls, WI"),
            ("site-latitude", "45.945"),
            ("site-longitude", "-90.273"),
            ("creators-TOTAL_FORMS", "1"),
            ("creators-0-family_name", "Wennberg"),
            ("creators-0-given_name", "Paul O."),
            ("creators-0-orcid", "0000-0002-6126-3854"),
            ("creators-0-affiliation", "Caltech; JPL"),
            ("creators-0-affiliation_ror", "https://ror.org/05dxps055"),
        ]);
        let forms = DoiForms::from_post(&data);
        assert!(forms.validate().is_empty());
        forms.apply(&mut meta, "10.14291/tccon.pa", "R1");

        assert!(meta.extra.contains_key("titles"));
        assert_eq!(meta.creators.len(), 1);
        let c = &meta.creators[0];
        assert_eq!(c.creator_name, "Wennberg, Paul O.");
        assert_eq!(c.name_identifiers[0].name_identifier_scheme, "ORCID");
        assert_eq!(c.affiliation.len(), 2);
        assert_eq!(c.affiliation[0].affiliation_identifier_scheme.as_deref(), Some("ROR"));
        assert!(c.affiliation[1].affiliation_identifier.is_none());
        assert_eq!(meta.geo_location[0].geo_location_point.as_ref().unwrap().point_latitude, 45.945);
        assert_eq!(meta.version.as_deref(), Some("R1"));

        // What was saved renders back into the same rows.
        let again = DoiForms::from_metadata(&meta);
        assert_eq!(again.creators, forms.creators);
    }

    #[test]
    fn formset_has_template_and_count() {
        let html = render_formset(&FUNDING, &funding_rows(&[]), &FieldErrors::default());
        assert!(html.contains("name=\"funding-TOTAL_FORMS\" value=\"1\""));
        assert!(html.contains("funding-__prefix__-funder_name"));
    }
}
