//! The fixed table of TCCON site ids and their display names.
//!
//! Several ids share a name (the JPL and Lauder instruments), so lookups by
//! name must be prepared to find more than one site.

/// Two-letter site id to site name, in the order sites are offered in forms.
pub const SITE_ID_TO_NAME: &[(&str, &str)] = &[
    ("ae", "Ascension Island"),
    ("an", "Anmyeondo"),
    ("bi", "Bialystok"),
    ("br", "Bremen"),
    ("bu", "Burgos"),
    ("ci", "Caltech/Pasadena"),
    ("db", "Darwin"),
    ("df", "Dryden"),
    ("et", "East Trout Lake"),
    ("eu", "Eureka"),
    ("fc", "Four Corners"),
    ("gm", "Garmisch"),
    ("ht", "Arrival Heights"),
    ("hw", "Harwell"),
    ("if", "Indianapolis"),
    ("iz", "Izana"),
    ("jc", "JPL"),
    ("jf", "JPL"),
    ("js", "Saga"),
    ("jx", "JPL"),
    ("ka", "Karlsruhe"),
    ("lh", "Lauder"),
    ("ll", "Lauder"),
    ("lr", "Lauder"),
    ("ma", "Manaus"),
    ("ni", "Nicosia"),
    ("ny", "Ny-Alesund"),
    ("oc", "Lamont"),
    ("or", "Orleans"),
    ("pa", "Park Falls"),
    ("pr", "Paris"),
    ("ra", "Reunion Island"),
    ("rj", "Rikubetsu"),
    ("so", "Sodankyla"),
    ("tk", "Tsukuba"),
    ("we", "Jena"),
    ("wg", "Wollongong"),
    ("xh", "Xianghe"),
    ("yk", "Yekaterinburg"),
    ("zs", "Zugspitze"),
];

/// How the label of a site choice is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteLabel {
    Name,
    NameAndId,
    Id,
}

/// Returns the display name for a site id, if the id is known.
pub fn site_name(site_id: &str) -> Option<&'static str> {
    SITE_ID_TO_NAME
        .iter()
        .find(|(id, _)| *id == site_id)
        .map(|(_, name)| *name)
}

pub fn is_known_site(site_id: &str) -> bool {
    site_name(site_id).is_some()
}

/// Builds `(value, label)` pairs for a site `<select>`.
///
/// With `include_blank` the list starts with `("", "-")` so that a filter
/// form can express "any site".
pub fn sites_as_choices(label: SiteLabel, include_blank: bool) -> Vec<(String, String)> {
    let mut choices: Vec<(String, String)> = SITE_ID_TO_NAME
        .iter()
        .map(|(id, name)| {
            let text = match label {
                SiteLabel::Name => name.to_string(),
                SiteLabel::NameAndId => format!("{} ({})", name, id),
                SiteLabel::Id => id.to_string(),
            };
            (id.to_string(), text)
        })
        .collect();

    if include_blank {
        choices.insert(0, (String::new(), "-".to_string()));
    }
    choices
}
