use super::form::{self, SaveAction};
use super::{pdf, store};
use crate::auth::{self, CurrentUser, DenyReason};
use crate::db::users;
use crate::error::{PortalError, Result};
use crate::forms::{FieldErrors, FormData};
use crate::html;
use crate::services::run_blocking;
use crate::state::AppState;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write;
use tccon_common::model::qc::{QcReport, QcReportFilter};
use tccon_common::model::reviewers::User;
use tccon_common::requests::ReviewerAssignmentForm;
use tccon_common::sites::{is_known_site, site_name, sites_as_choices, SiteLabel};

const WHAT: &str = "QC reports";

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(flatten)]
    filter: QcReportFilter,
    msg: Option<String>,
    id: Option<String>,
}

fn not_logged_in(user: &CurrentUser) -> HttpResponse {
    auth::redirect_for_lack_of_permission(user, "all", WHAT, DenyReason::Permission)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Turns the filter form into a query. Unreadable dates are reported and
/// otherwise ignored.
fn report_query(filter: &QcReportFilter) -> (store::ReportQuery, Vec<String>) {
    let mut problems = Vec::new();
    let mut date = |field: &str, raw: &Option<String>| {
        let raw = non_blank(raw)?;
        let parsed = form::parse_qc_date(&raw);
        if parsed.is_none() {
            problems.push(format!("Ignored {} \"{}\": not a date", field, raw));
        }
        parsed
    };
    let modified_after = date("modified_after", &filter.modified_after);
    let modified_before = date("modified_before", &filter.modified_before);
    let query = store::ReportQuery {
        reviewer: non_blank(&filter.reviewer),
        site: non_blank(&filter.site),
        modified_after,
        modified_before,
    };
    (query, problems)
}

fn list_message(query: &ListQuery) -> String {
    let id = query.id.as_deref().unwrap_or("?");
    match query.msg.as_deref() {
        Some("draft") => format!("Saved draft of report {}", id),
        Some("submitted") => format!("Submitted report {}", id),
        Some("deleted") => format!("Deleted report {}", id),
        Some("deletefailed") => format!("Could not delete report {}: it does not exist", id),
        _ => String::new(),
    }
}

fn filter_form(filter: &QcReportFilter) -> String {
    let none = FieldErrors::default();
    let mut out = String::from("<form method=\"get\" action=\"/qcform/\" class=\"filters\">\n");
    out.push_str(&html::text_input("reviewer", "Reviewer", filter.reviewer.as_deref().unwrap_or(""), &none));
    out.push_str(&html::select(
        "site",
        "Site",
        &sites_as_choices(SiteLabel::NameAndId, true),
        filter.site.as_deref().unwrap_or(""),
        &none,
    ));
    out.push_str(&html::date_input(
        "modified_after",
        "Modified on or after",
        filter.modified_after.as_deref().unwrap_or(""),
        &none,
    ));
    out.push_str(&html::date_input(
        "modified_before",
        "Modified on or before",
        filter.modified_before.as_deref().unwrap_or(""),
        &none,
    ));
    out.push_str("<p><input type=\"submit\" value=\"Filter\"></p>\n</form>\n");
    out
}

fn report_row(report: &QcReport) -> String {
    let id = report.id.unwrap_or_default();
    format!(
        "<tr><td>{id}</td><td>{site}</td><td>{reviewer}</td><td>{state}</td><td>{time}</td>\
         <td><a href=\"/qcform/edit/{id}/\">edit</a> <a href=\"/qcform/makepdf/{id}/\">pdf</a> \
         <form method=\"post\" action=\"/qcform/delete/{id}/\" class=\"inline\">\
         <input type=\"submit\" value=\"delete\"></form></td></tr>\n",
        id = id,
        site = html::escape(site_name(&report.site).unwrap_or(&report.site)),
        reviewer = html::escape(&report.reviewer),
        state = if report.is_draft { "Draft" } else { "Submitted" },
        time = report
            .modification_time
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default(),
    )
}

pub async fn list(state: web::Data<AppState>, user: CurrentUser, query: web::Query<ListQuery>) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(not_logged_in(&user));
    }
    let (report_query, problems) = report_query(&query.filter);
    let db = state.db.clone();
    let reports = run_blocking(move || store::list(&db.connect()?, &report_query)).await?;

    let mut body = html::message(&list_message(&query));
    for p in &problems {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", html::escape(p));
    }
    body.push_str(&filter_form(&query.filter));
    body.push_str("<p><a href=\"/qcform/edit/\">Start a new QC report</a></p>\n");
    if reports.is_empty() {
        body.push_str("<p>No QC reports match.</p>\n");
    } else {
        body.push_str(
            "<table>\n<thead><tr><th>ID</th><th>Site</th><th>Reviewer</th><th>State</th>\
             <th>Modified</th><th></th></tr></thead>\n<tbody>\n",
        );
        for report in &reports {
            body.push_str(&report_row(report));
        }
        body.push_str("</tbody>\n</table>\n");
    }
    Ok(html::ok(html::page("QC reports", user.username(), &body)))
}

fn edit_url(id: Option<i64>) -> String {
    match id {
        Some(id) => format!("/qcform/edit/{}/", id),
        None => "/qcform/edit/".to_string(),
    }
}

fn edit_page(report: &QcReport, errors: &FieldErrors, user: &CurrentUser) -> HttpResponse {
    let title = match report.id {
        Some(id) => format!("QC report {}", id),
        None => "New QC report".to_string(),
    };
    let body = form::render(report, errors, &edit_url(report.id));
    html::ok(html::page(&title, user.username(), &body))
}

async fn load_report(state: &web::Data<AppState>, id: i64) -> Result<QcReport> {
    let db = state.db.clone();
    run_blocking(move || store::get(&db.connect()?, id))
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("No QC report with id {}", id)))
}

pub async fn new_report(user: CurrentUser) -> HttpResponse {
    let Some(auth_user) = user.get() else {
        return not_logged_in(&user);
    };
    let report = QcReport {
        reviewer: auth_user.user.display_name(),
        is_draft: true,
        ..Default::default()
    };
    edit_page(&report, &FieldErrors::default(), &user)
}

pub async fn edit_report(state: web::Data<AppState>, user: CurrentUser, path: web::Path<i64>) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(not_logged_in(&user));
    }
    let report = load_report(&state, path.into_inner()).await?;
    Ok(edit_page(&report, &FieldErrors::default(), &user))
}

async fn save_report(
    state: web::Data<AppState>,
    user: CurrentUser,
    id: Option<i64>,
    form: HashMap<String, String>,
) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(not_logged_in(&user));
    }
    let data = FormData::new(form);
    let action = SaveAction::from_post(&data)
        .ok_or_else(|| PortalError::BadRequest("action must be \"draft\" or \"submit\"".into()))?;
    let mut report = form::report_from_post(&data, id);

    if action == SaveAction::Submit {
        let errors = form::validate(&report);
        if !errors.is_empty() {
            return Ok(edit_page(&report, &errors, &user));
        }
    }
    report.is_draft = action == SaveAction::Draft;
    form::normalize_dates(&mut report);

    let db = state.db.clone();
    let id = run_blocking(move || store::save(&db.connect()?, &mut report)).await?;
    log::info!(
        "{} saved QC report {} ({:?})",
        user.username().unwrap_or("?"),
        id,
        action
    );
    let msg = match action {
        SaveAction::Draft => "draft",
        SaveAction::Submit => "submitted",
    };
    Ok(html::redirect(&format!("/qcform/?msg={}&id={}", msg, id)))
}

pub async fn create_report(
    state: web::Data<AppState>,
    user: CurrentUser,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse> {
    save_report(state, user, None, form.into_inner()).await
}

pub async fn update_report(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<i64>,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse> {
    save_report(state, user, Some(path.into_inner()), form.into_inner()).await
}

pub async fn delete_get(user: CurrentUser) -> HttpResponse {
    auth::redirect_for_lack_of_permission(&user, "all", WHAT, DenyReason::GetNotAllowed)
}

pub async fn delete_post(state: web::Data<AppState>, user: CurrentUser, path: web::Path<i64>) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(not_logged_in(&user));
    }
    let id = path.into_inner();
    let db = state.db.clone();
    let deleted = run_blocking(move || store::delete(&db.connect()?, id)).await?;
    if deleted {
        log::info!("{} deleted QC report {}", user.username().unwrap_or("?"), id);
    }
    let msg = if deleted { "deleted" } else { "deletefailed" };
    Ok(html::redirect(&format!("/qcform/?msg={}&id={}", msg, id)))
}

pub async fn make_pdf(state: web::Data<AppState>, user: CurrentUser, path: web::Path<i64>) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(not_logged_in(&user));
    }
    let report = load_report(&state, path.into_inner()).await?;
    let file_name = pdf::pdf_file_name(&report);
    let config = state.config.pdf.clone();
    let bytes = run_blocking(move || pdf::render_pdf(&report, &config)).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(file_name)],
        })
        .body(bytes))
}

fn user_choices(users: &[User]) -> Vec<(String, String)> {
    let mut choices = vec![(String::new(), "-".to_string())];
    choices.extend(users.iter().map(|u| (u.username.clone(), u.display_name())));
    choices
}

fn reviewers_page(
    site: &str,
    users: &[User],
    current: (&str, &str, &str),
    errors: &FieldErrors,
    message: &str,
    user: &CurrentUser,
) -> HttpResponse {
    let choices = user_choices(users);
    let mut body = html::message(message);
    body.push_str(&html::field_errors(errors, crate::forms::NON_FIELD));
    let _ = writeln!(body, "<form method=\"post\" action=\"/qcform/reviewers/{}/\">", html::escape(site));
    body.push_str(&html::select("editor", "Editor", &choices, current.0, errors));
    body.push_str(&html::select("reviewer1", "Reviewer 1", &choices, current.1, errors));
    body.push_str(&html::select("reviewer2", "Reviewer 2", &choices, current.2, errors));
    body.push_str("<p><input type=\"submit\" value=\"Save\"></p>\n</form>\n");
    let title = format!("Reviewers for {} ({})", site_name(site).unwrap_or(site), site);
    html::ok(html::page(&title, user.username(), &body))
}

fn check_reviewer_access(user: &CurrentUser, site: &str) -> Result<Option<HttpResponse>> {
    if !user.is_staff() {
        return Ok(Some(auth::redirect_for_lack_of_permission(
            user,
            site,
            "reviewer assignments",
            DenyReason::Permission,
        )));
    }
    if !is_known_site(site) {
        return Err(PortalError::NotFound(format!("Unknown site \"{}\"", site)));
    }
    Ok(None)
}

#[derive(Deserialize, Default)]
pub struct SavedQuery {
    msg: Option<String>,
}

pub async fn reviewers_get(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
    query: web::Query<SavedQuery>,
) -> Result<HttpResponse> {
    let site = path.into_inner();
    if let Some(redirect) = check_reviewer_access(&user, &site)? {
        return Ok(redirect);
    }
    let db = state.db.clone();
    let s = site.clone();
    let (all_users, current) = run_blocking(move || {
        let conn = db.connect()?;
        Ok((users::list_users(&conn)?, store::get_reviewers(&conn, &s)?))
    })
    .await?;

    let names = current
        .as_ref()
        .map(|r| (r.editor.username.as_str(), r.reviewer1.username.as_str(), r.reviewer2.username.as_str()))
        .unwrap_or(("", "", ""));
    let message = match query.msg.as_deref() {
        Some("saved") => "Reviewer assignments saved",
        _ => "",
    };
    Ok(reviewers_page(&site, &all_users, names, &FieldErrors::default(), message, &user))
}

/// Field errors for an assignment, checked against the known users.
fn validate_assignment(form: &ReviewerAssignmentForm, known: &[User]) -> FieldErrors {
    let mut errors = FieldErrors::default();
    for (field, value) in [
        ("editor", &form.editor),
        ("reviewer1", &form.reviewer1),
        ("reviewer2", &form.reviewer2),
    ] {
        if value.is_empty() {
            errors.add(field, "This field is required.");
        } else if !known.iter().any(|u| &u.username == value) {
            errors.add(field, "Select a valid user.");
        }
    }
    if errors.is_empty()
        && (form.editor == form.reviewer1 || form.editor == form.reviewer2 || form.reviewer1 == form.reviewer2)
    {
        errors.add(crate::forms::NON_FIELD, "duplicate reviewer assignments");
    }
    errors
}

pub async fn reviewers_post(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
    form: web::Form<ReviewerAssignmentForm>,
) -> Result<HttpResponse> {
    let site = path.into_inner();
    if let Some(redirect) = check_reviewer_access(&user, &site)? {
        return Ok(redirect);
    }
    let form = form.into_inner();
    let db = state.db.clone();
    let s = site.clone();
    let outcome = run_blocking(move || {
        let conn = db.connect()?;
        let known = users::list_users(&conn)?;
        let errors = validate_assignment(&form, &known);
        if !errors.is_empty() {
            return Ok(Err((known, form, errors)));
        }
        store::set_reviewers(&conn, &s, &form.editor, &form.reviewer1, &form.reviewer2)?;
        Ok(Ok(()))
    })
    .await?;

    match outcome {
        Ok(()) => Ok(html::redirect(&format!("/qcform/reviewers/{}/?msg=saved", html::url_encode(&site)))),
        Err((known, form, errors)) => Ok(reviewers_page(
            &site,
            &known,
            (form.editor.as_str(), form.reviewer1.as_str(), form.reviewer2.as_str()),
            &errors,
            "",
            &user,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            username: name.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            is_staff: false,
        }
    }

    #[test]
    fn bad_filter_dates_are_reported() {
        let filter = QcReportFilter {
            reviewer: Some("  ".into()),
            site: Some("pa".into()),
            modified_after: Some("2021/03/04".into()),
            modified_before: Some("yesterday".into()),
        };
        let (query, problems) = report_query(&filter);
        assert_eq!(query.reviewer, None);
        assert_eq!(query.site.as_deref(), Some("pa"));
        assert_eq!(query.modified_after.unwrap().to_string(), "2021-03-04");
        assert_eq!(query.modified_before, None);
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn assignment_needs_three_distinct_known_users() {
        let known = vec![user("a"), user("b"), user("c")];
        let form = |e: &str, r1: &str, r2: &str| ReviewerAssignmentForm {
            editor: e.into(),
            reviewer1: r1.into(),
            reviewer2: r2.into(),
        };
        assert!(validate_assignment(&form("a", "b", "c"), &known).is_empty());
        let errors = validate_assignment(&form("a", "a", "c"), &known);
        assert_eq!(errors.get(crate::forms::NON_FIELD).unwrap()[0], "duplicate reviewer assignments");
        let errors = validate_assignment(&form("a", "", "z"), &known);
        assert!(errors.has("reviewer1"));
        assert!(errors.has("reviewer2"));
    }
}
