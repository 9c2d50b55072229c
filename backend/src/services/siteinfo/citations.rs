//! BibTeX entries and a LaTeX summary table built from each site's
//! `data_reference` citation.

use regex::Regex;
use std::sync::LazyLock;
use tccon_common::model::site_info::{SiteInfo, SiteInfoFile};
use thiserror::Error;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<authors>.+)\. (?P<year>\d{4}). (?P<title>.+) ((http|https)://)?(doi\.org/)?(?P<doi>10\..+)$",
    )
    .expect("valid regex")
});

#[derive(Debug, Error, PartialEq)]
pub enum CitationError {
    #[error("citation is not of the form \"Authors. Year. Title doi\"")]
    Format,
    #[error("author \"{0}\" has no given name after it")]
    DanglingAuthor(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataCitation {
    pub authors: Vec<String>,
    pub year: String,
    pub title: String,
    pub doi: String,
}

impl DataCitation {
    pub fn to_bibtex(&self, key: &str) -> String {
        format!(
            "@misc{{{key},\n    author = {{{authors}}},\n    title = {{{title}}},\n    year = {{{year}}},\n    doi = {{{doi}}}\n}}",
            key = key,
            authors = self.authors.join(" and "),
            title = self.title,
            year = self.year,
            doi = self.doi
        )
    }
}

/// Splits a comma separated author list. An entry with a single word is
/// taken as the family name of a `Last, First` pair and joined with the
/// entry after it; longer entries are used as they are.
pub fn parse_authors(authors: &str) -> Result<Vec<String>, CitationError> {
    let parts: Vec<&str> = authors.split(',').map(str::trim).collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < parts.len() {
        let author = parts[i];
        if author.split_whitespace().count() > 1 {
            out.push(author.to_string());
            i += 1;
        } else {
            let given = parts
                .get(i + 1)
                .ok_or_else(|| CitationError::DanglingAuthor(author.to_string()))?;
            out.push(format!("{} {}", given, author));
            i += 2;
        }
    }
    Ok(out)
}

pub fn parse_data_citation(citation: &str) -> Result<DataCitation, CitationError> {
    let caps = CITATION_RE.captures(citation).ok_or(CitationError::Format)?;
    Ok(DataCitation {
        authors: parse_authors(&caps["authors"])?,
        year: caps["year"].to_string(),
        title: caps["title"].to_string(),
        doi: caps["doi"].to_string(),
    })
}

/// An empty `long_name` counts as missing, since [`SiteInfo`] reads an absent
/// key as an empty string.
pub fn bibtex_key(site_id: &str, info: &SiteInfo) -> String {
    if info.long_name.is_empty() {
        format!("{}_tccon_data", site_id)
    } else {
        format!("{}_data", info.long_name)
    }
}

/// `None` or `"all"` selects every site; otherwise a comma separated list.
fn selected<'a>(all: &'a SiteInfoFile, sites: Option<&str>) -> Vec<(&'a String, &'a SiteInfo)> {
    let wanted: Option<Vec<&str>> = match sites.map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(list) => Some(list.split(',').map(str::trim).collect()),
    };
    all.iter()
        .filter(|(id, _)| wanted.as_ref().is_none_or(|w| w.contains(&id.as_str())))
        .collect()
}

pub fn bibtex_entries(all: &SiteInfoFile, sites: Option<&str>) -> String {
    selected(all, sites)
        .into_iter()
        .map(|(site_id, info)| {
            if info.data_reference.is_empty() {
                return format!(
                    "% Site with id \"{}\" has not provided a data reference. Please ask them to do so!",
                    site_id
                );
            }
            match parse_data_citation(&info.data_reference) {
                Ok(citation) => citation.to_bibtex(&bibtex_key(site_id, info)),
                Err(e) => {
                    log::debug!("Cannot parse data reference of {}: {}", site_id, e);
                    format!("% Sorry, was not able to produce a citation for site \"{}\"", site_id)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn bibtex_table(all: &SiteInfoFile, sites: Option<&str>, citation_cmd: &str) -> String {
    let mut rows = vec!["Site ID & Site Name & Location & Data Citation".to_string()];
    for (site_id, info) in selected(all, sites) {
        let or_undefined = |s: &str| if s.is_empty() { "(undefined)".to_string() } else { s.to_string() };
        rows.push(format!(
            "{} & {} & {} & \\{}{{{}}}",
            site_id,
            or_undefined(&info.long_name),
            or_undefined(&info.location),
            citation_cmd,
            bibtex_key(site_id, info)
        ));
    }
    rows.join(" \\\\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITATION: &str = "Wennberg, P. O., Roehl, C. M., Wunch, D., Toon, G. C., Blavier, J.-F. L. 2014. \
        TCCON data from Park Falls (US), Release GGG2014.R1. CaltechDATA. \
        https://doi.org/10.14291/tccon.ggg2014.parkfalls01.r1";

    #[test]
    fn last_first_pairs_are_joined() {
        assert_eq!(
            parse_authors("Wennberg, P. O., Roehl, C. M.").unwrap(),
            vec!["P. O. Wennberg", "C. M. Roehl"]
        );
        assert_eq!(
            parse_authors("Paul Wennberg, Roehl, C.").unwrap(),
            vec!["Paul Wennberg", "C. Roehl"]
        );
        assert_eq!(
            parse_authors("Wennberg, P., Roehl"),
            Err(CitationError::DanglingAuthor("Roehl".into()))
        );
    }

    #[test]
    fn full_citation() {
        let c = parse_data_citation(CITATION).unwrap();
        assert_eq!(c.year, "2014");
        assert_eq!(c.doi, "10.14291/tccon.ggg2014.parkfalls01.r1");
        assert_eq!(c.authors.len(), 5);
        assert_eq!(c.authors[4], "J.-F. L Blavier");
        assert!(c.title.starts_with("TCCON data from Park Falls"));

        let bib = c.to_bibtex("parkfalls_data");
        assert!(bib.starts_with("@misc{parkfalls_data,\n    author = {P. O. Wennberg and "));
        assert!(bib.ends_with("doi = {10.14291/tccon.ggg2014.parkfalls01.r1}\n}"));
    }

    #[test]
    fn malformed_citation() {
        assert_eq!(parse_data_citation("just some text"), Err(CitationError::Format));
    }

    #[test]
    fn entries_and_table_for_selected_sites() {
        let mut all = SiteInfoFile::new();
        all.insert(
            "pa".into(),
            SiteInfo {
                long_name: "parkfalls".into(),
                location: "Park Falls, WI".into(),
                data_reference: CITATION.into(),
                ..Default::default()
            },
        );
        all.insert("xx".into(), SiteInfo::default());
        all.insert(
            "yy".into(),
            SiteInfo {
                data_reference: "garbled".into(),
                ..Default::default()
            },
        );

        let entries = bibtex_entries(&all, Some("pa,xx"));
        assert!(entries.contains("@misc{parkfalls_data,"));
        assert!(entries.contains("% Site with id \"xx\" has not provided a data reference"));
        assert!(!entries.contains("yy"));

        let everything = bibtex_entries(&all, None);
        assert!(everything.contains("was not able to produce a citation for site \"yy\""));

        let table = bibtex_table(&all, Some("pa,xx"), "citet");
        assert_eq!(
            table,
            "Site ID & Site Name & Location & Data Citation \\\\\n\
             pa & parkfalls & Park Falls, WI & \\citet{parkfalls_data} \\\\\n\
             xx & (undefined) & (undefined) & \\citet{xx_tccon_data}"
        );
    }

    #[test]
    fn empty_names_fall_back_like_missing_ones() {
        let all: SiteInfoFile = serde_json::from_str(
            r#"{"ae": {"long_name": "", "location": ""}, "bu": {"location": "Burgos, PH"}}"#,
        )
        .unwrap();
        assert_eq!(bibtex_key("ae", &all["ae"]), "ae_tccon_data");
        assert_eq!(bibtex_key("bu", &all["bu"]), "bu_tccon_data");

        let table = bibtex_table(&all, None, "cite");
        assert!(table.contains("ae & (undefined) & (undefined) & \\cite{ae_tccon_data}"));
        assert!(table.contains("bu & (undefined) & Burgos, PH & \\cite{bu_tccon_data}"));
    }
}
