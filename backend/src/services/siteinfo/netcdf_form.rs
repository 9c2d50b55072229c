//! The "netCDF" form: the standard site info fields that end up in the
//! global attributes of each site's data files.

use crate::forms::{FieldErrors, FormData};
use crate::html;
use regex::Regex;
use std::sync::LazyLock;
use tccon_common::model::site_info::{SiteInfo, SITE_EDITABLE_FIELDS, STANDARD_FIELDS};

static CONTACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+<.+@.+>(\s*;.+<.+@.+>)*\s*$").expect("valid regex"));

const CONTACT_FORMAT: &str =
    "Must have format \"Name <email>\" (no quotes) or \"Name1 <email1>; Name2 <email2>\"";

pub fn is_valid_contact(contact: &str) -> bool {
    CONTACT_RE.is_match(contact)
}

/// Splits a contact field into its `Name <email>` entries. Returns `None`
/// if the field does not have the contact format.
pub fn split_contacts(contact: &str) -> Option<Vec<String>> {
    if !is_valid_contact(contact) {
        return None;
    }
    Some(
        contact
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Fields this user may change. The rest are shown read-only.
pub fn editable_fields(staff: bool) -> &'static [&'static str] {
    if staff {
        &STANDARD_FIELDS
    } else {
        &SITE_EDITABLE_FIELDS
    }
}

pub fn fixed_fields(staff: bool) -> Vec<&'static str> {
    let editable = editable_fields(staff);
    STANDARD_FIELDS
        .iter()
        .copied()
        .filter(|f| !editable.contains(f))
        .collect()
}

/// `data_doi` becomes `Data DOI`.
pub fn pretty_name(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    capitalized
        .split(' ')
        .map(|w| if w.eq_ignore_ascii_case("doi") { "DOI" } else { w })
        .collect::<Vec<_>>()
        .join(" ")
}

fn help_text(field: &str) -> &'static str {
    match field {
        "release_lag" => "Number of days to withhold data",
        "location" => "Where the TCCON site is located (e.g. institution, city, state/province, country)",
        "contact" => "Point of contact for the TCCON site. Must be formatted \"Name <email>\". \
                      Separate multiple contacts with a semicolon.",
        "site_reference" => "Citation to use for the TCCON site itself. Optional",
        "data_reference" => "Citation to use for the data from this TCCON site. Optional",
        _ => "",
    }
}

fn max_len(field: &str) -> Option<usize> {
    match field {
        "long_name" => Some(32),
        "location" | "contact" => Some(256),
        "data_revision" => Some(8),
        _ => None,
    }
}

fn optional(field: &str) -> bool {
    matches!(field, "site_reference" | "data_reference")
}

/// Builds the submitted site info: editable fields from the post, fixed
/// fields from `current`. Returns the errors next to the value so an
/// invalid form can be shown again with what the user typed.
pub fn from_post(
    data: &FormData,
    current: &SiteInfo,
    staff: bool,
    max_release_lag: u32,
) -> (SiteInfo, FieldErrors) {
    let mut info = current.clone();
    let mut errors = FieldErrors::default();

    for field in editable_fields(staff) {
        let value = data.trimmed(field).to_string();
        if value.is_empty() && !optional(field) {
            errors.add(field, "This field is required.");
        }
        if let Some(max) = max_len(field) {
            if value.chars().count() > max {
                errors.add(
                    field,
                    format!("Ensure this value has at most {} characters.", max),
                );
            }
        }
        info.set(field, value);
    }

    if !errors.has("release_lag") {
        match info.release_lag.parse::<u32>() {
            Ok(lag) if lag > max_release_lag => errors.add(
                "release_lag",
                format!("Release lag cannot be greater than {} days", max_release_lag),
            ),
            Ok(_) => {}
            Err(_) => errors.add("release_lag", "Enter a whole number of days."),
        }
    }
    if !errors.has("contact") && !is_valid_contact(&info.contact) {
        errors.add("contact", CONTACT_FORMAT);
    }
    if staff && !errors.has("data_doi") && !info.data_doi.starts_with("10.") {
        errors.add("data_doi", "A DOI must start with \"10.\"");
    }

    (info, errors)
}

pub fn render(info: &SiteInfo, staff: bool, errors: &FieldErrors) -> String {
    let mut out = String::from("<fieldset><legend>netCDF metadata</legend>\n");
    for field in fixed_fields(staff) {
        out.push_str(&format!(
            "<p><strong>{}</strong>: {}</p>\n",
            html::escape(&pretty_name(field)),
            html::escape(info.get(field).unwrap_or(""))
        ));
    }
    for field in editable_fields(staff) {
        let value = info.get(field).unwrap_or("");
        let label = pretty_name(field);
        if field.ends_with("_reference") {
            out.push_str(&html::textarea(field, &label, value, errors));
        } else {
            out.push_str(&html::text_input(field, &label, value, errors));
        }
        let help = help_text(field);
        if !help.is_empty() {
            out.push_str(&format!("<p class=\"help\">{}</p>\n", html::escape(help)));
        }
    }
    out.push_str("</fieldset>\n");
    out
}
