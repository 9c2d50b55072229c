//! Building a QC report from a posted form, validating it for submission,
//! and rendering the edit form.

use super::questions::{self, DateKind, Question, N_DATE_SLOTS, REQUIRED_DATES, SECTIONS};
use crate::forms::{FieldErrors, FormData};
use crate::html;
use chrono::NaiveDate;
use std::fmt::Write;
use tccon_common::model::qc::QcReport;
use tccon_common::sites::{is_known_site, sites_as_choices, SiteLabel};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const REVIEWER_MAX_LEN: usize = 128;

/// What the submit button asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Draft,
    Submit,
}

impl SaveAction {
    pub fn from_post(data: &FormData) -> Option<SaveAction> {
        match data.trimmed("action") {
            "draft" => Some(SaveAction::Draft),
            "submit" => Some(SaveAction::Submit),
            _ => None,
        }
    }
}

pub fn parse_qc_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

/// The report as posted. Blank answers are left out.
pub fn report_from_post(data: &FormData, id: Option<i64>) -> QcReport {
    let answers = questions::answer_fields()
        .into_iter()
        .filter_map(|field| {
            let value = data.trimmed(&field);
            (!value.is_empty()).then(|| (field.clone(), value.to_string()))
        })
        .collect();
    QcReport {
        id,
        reviewer: data.trimmed("reviewer").to_string(),
        site: data.trimmed("site").to_string(),
        netcdf_files: data.trimmed("netcdf_files").to_string(),
        is_draft: true,
        answers,
        modification_time: None,
    }
}

/// Parses the answer in `field` as a date, recording an error if it is
/// present but unreadable.
fn checked_date(report: &QcReport, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let raw = report.answer(field)?;
    let date = parse_qc_date(raw);
    if date.is_none() {
        errors.add(field, "Enter a valid date.");
    }
    date
}

/// Checks one question's date slots and returns how many dates were given.
fn validate_dates(report: &QcReport, question: &Question, errors: &mut FieldErrors) -> usize {
    let mut given = 0;
    for i in 0..N_DATE_SLOTS {
        match question.date_fields(i) {
            None => return 0,
            Some((field, None)) => {
                if checked_date(report, &field, errors).is_some() {
                    given += 1;
                }
            }
            Some((start_field, Some(end_field))) => {
                let start = checked_date(report, &start_field, errors);
                let end = checked_date(report, &end_field, errors);
                let start_given = report.answer(&start_field).is_some();
                let end_given = report.answer(&end_field).is_some();
                if start_given != end_given {
                    errors.add(&start_field, "Must provide a start and end date");
                }
                match (start, end) {
                    (Some(s), Some(e)) if e < s => errors.add(&start_field, "Start date must be before end date"),
                    (Some(_), Some(_)) => given += 1,
                    _ => {}
                }
            }
        }
    }
    given
}

/// Validation applied on submit. Drafts skip it.
pub fn validate(report: &QcReport) -> FieldErrors {
    let mut errors = FieldErrors::default();

    if report.reviewer.is_empty() {
        errors.add("reviewer", "This field is required.");
    } else if report.reviewer.chars().count() > REVIEWER_MAX_LEN {
        errors.add(
            "reviewer",
            format!("Ensure this value has at most {} characters.", REVIEWER_MAX_LEN),
        );
    }
    if !is_known_site(&report.site) {
        errors.add("site", "Select a valid site.");
    }
    if report.netcdf_files.trim().is_empty() {
        errors.add("netcdf_files", "Must list at least one netCDF file");
    }

    let mut dates_given = Vec::new();
    for question in questions::questions() {
        for mc in question.mcs {
            match report.answer(mc.field) {
                None => errors.add(mc.field, "This field is required."),
                Some(code) if mc.label_for(code).is_none() => {
                    errors.add(mc.field, format!("Select a valid choice. {} is not one of the available choices.", code))
                }
                Some(_) => {}
            }
        }
        if question.dates != DateKind::None {
            dates_given.push((question.prefix, validate_dates(report, question, &mut errors)));
        }
    }

    for (mc_field, prefix) in REQUIRED_DATES {
        if report.answer(mc_field) == Some("n") {
            continue;
        }
        let given = dates_given
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        if given > 0 {
            continue;
        }
        let (Some(question), Some(mc)) = (questions::question(prefix), questions::multiple_choice(mc_field)) else {
            continue;
        };
        let descr = if question.dates == DateKind::Paired { "date range" } else { "date" };
        if let Some((first, _)) = question.date_fields(0) {
            errors.add(
                &first,
                format!("If \"{}\" is not \"No\", at least one {} is required", mc.label, descr),
            );
        }
    }
    errors
}

/// Rewrites every readable date answer as `YYYY-MM-DD`.
pub fn normalize_dates(report: &mut QcReport) {
    for question in questions::questions() {
        for i in 0..N_DATE_SLOTS {
            let Some((start, end)) = question.date_fields(i) else { break };
            for field in std::iter::once(start).chain(end) {
                if let Some(date) = report.answer(&field).and_then(parse_qc_date) {
                    report.answers.insert(field, date.format("%Y-%m-%d").to_string());
                }
            }
        }
    }
}

fn render_question(report: &QcReport, question: &Question, errors: &FieldErrors, out: &mut String) {
    out.push_str("<div class=\"question\">\n");
    if !question.title.is_empty() {
        let _ = writeln!(out, "<h3>{}</h3>", html::escape(question.title));
    }
    if !question.message.is_empty() {
        let _ = writeln!(out, "<p class=\"help\">{}</p>", html::escape(question.message));
    }
    for mc in question.mcs {
        out.push_str(&html::radios(
            mc.field,
            mc.label,
            mc.choices,
            report.answer(mc.field).unwrap_or(""),
            errors,
        ));
    }
    if question.dates != DateKind::None {
        out.push_str("<table class=\"dates\">\n");
        for i in 0..N_DATE_SLOTS {
            let Some((start, end)) = question.date_fields(i) else { break };
            out.push_str("<tr>");
            for field in std::iter::once(start).chain(end) {
                let _ = write!(
                    out,
                    "<td><input type=\"date\" name=\"{n}\" value=\"{v}\">{e}</td>",
                    n = html::escape(&field),
                    v = html::escape(report.answer(&field).unwrap_or("")),
                    e = html::field_errors(errors, &field)
                );
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n");
    }
    let cmts = question.comments_field();
    out.push_str(&html::textarea(
        &cmts,
        question.comments_label,
        report.answer(&cmts).unwrap_or(""),
        errors,
    ));
    out.push_str("</div>\n");
}

/// The whole edit form, posting to `action_url`.
pub fn render(report: &QcReport, errors: &FieldErrors, action_url: &str) -> String {
    let mut out = String::new();
    if !errors.is_empty() {
        out.push_str("<p class=\"error\">The report could not be submitted; please correct the errors below.</p>\n");
    }
    let _ = writeln!(out, "<form method=\"post\" action=\"{}\">", html::escape(action_url));
    out.push_str("<h2>Preface</h2>\n");
    out.push_str(&html::text_input("reviewer", "Reviewer", &report.reviewer, errors));
    out.push_str(&html::select(
        "site",
        "Site",
        &sites_as_choices(SiteLabel::NameAndId, true),
        &report.site,
        errors,
    ));
    out.push_str(&html::textarea("netcdf_files", "NetCDF files", &report.netcdf_files, errors));

    for section in SECTIONS {
        let _ = writeln!(out, "<h2>{}</h2>", html::escape(section.name));
        let _ = writeln!(out, "<p class=\"intro\">{}</p>", html::escape(section.intro));
        for question in section.questions {
            render_question(report, question, errors, &mut out);
        }
    }
    out.push_str(
        "<p><button type=\"submit\" name=\"action\" value=\"draft\">Save draft</button> \
         <button type=\"submit\" name=\"action\" value=\"submit\">Submit</button></p>\n</form>\n",
    );
    out
}
