use super::doi_forms::{self, DoiForms};
use super::{citations, netcdf_form, store};
use crate::auth::{self, CurrentUser, DenyReason};
use crate::error::Result;
use crate::forms::{FieldErrors, FormData};
use crate::html;
use crate::services::run_blocking;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt::Write;
use tccon_common::model::doi::DoiMetadata;
use tccon_common::model::site_info::{SiteInfo, STANDARD_FIELDS};
use tccon_common::requests::{CitationQuery, MessageQuery, MissingPermissionQuery};

const WHAT: &str = "site information";

fn site_links(sites: &[(String, SiteInfo)], editable: bool) -> String {
    if sites.is_empty() {
        return "<p>None</p>\n".to_string();
    }
    let mut out = String::from("<ul>\n");
    for (id, info) in sites {
        let edit = if editable {
            format!(" <a href=\"/siteinfo/edit/{}\">edit</a>", html::escape(id))
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "<li><a href=\"/siteinfo/view/{id}\">{id}</a>: {name}{edit} <a href=\"/siteinfo/flags/{id}\">release flags</a></li>",
            id = html::escape(id),
            name = html::escape(&info.long_name),
            edit = edit
        );
    }
    out.push_str("</ul>\n");
    out
}

pub async fn list(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    let st = state.clone();
    let all = run_blocking(move || store::read_all(&st.locks, &st.config.files.site_info_file)).await?;

    let editable = auth::sites_can_edit(&user);
    let (can_edit, cannot_edit): (Vec<_>, Vec<_>) = all.into_iter().partition(|(id, _)| editable.contains(id));

    let mut body = String::new();
    if user.is_authenticated() {
        body.push_str("<h2>Sites you can edit</h2>\n");
        body.push_str(&site_links(&can_edit, true));
        body.push_str("<h2>Other sites</h2>\n");
    }
    body.push_str(&site_links(&cannot_edit, false));
    body.push_str(
        "<p>Citations: <a href=\"/siteinfo/bibtex/entries\">BibTeX entries</a> \
         <a href=\"/siteinfo/bibtex/table\">LaTeX table</a></p>\n",
    );
    Ok(html::ok(html::page("TCCON site information", user.username(), &body)))
}

fn view_message(query: &MessageQuery) -> &'static str {
    match query.msg.as_deref() {
        Some("success") => "Metadata updated successfully!",
        _ => "",
    }
}

pub async fn view(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
    query: web::Query<MessageQuery>,
) -> Result<HttpResponse> {
    let site_id = path.into_inner();
    let st = state.clone();
    let id = site_id.clone();
    let (info, meta) = run_blocking(move || {
        let files = &st.config.files;
        let info = store::read_site(&st.locks, &files.site_info_file, &id)?;
        let meta: DoiMetadata =
            st.locks
                .read_metadata_file(&files.metadata_dir, &info.metadata_file_name(&id), true)?;
        Ok((info, meta))
    })
    .await?;

    let mut body = html::message(view_message(&query));
    let rows: Vec<Vec<String>> = STANDARD_FIELDS
        .iter()
        .map(|f| vec![netcdf_form::pretty_name(f), info.get(f).unwrap_or("").to_string()])
        .collect();
    body.push_str("<h2>netCDF metadata</h2>\n");
    body.push_str(&html::table(&["Field", "Value"], &rows));
    body.push_str("<h2>DOI metadata</h2>\n");
    body.push_str(&doi_forms::metadata_tables(&meta));
    if let Some(stamp) = &meta.last_modified {
        let _ = writeln!(body, "<p>Last modified {}</p>", html::escape(stamp));
    }
    if auth::can_edit_site(&user, &site_id) {
        let _ = writeln!(
            body,
            "<p><a href=\"/siteinfo/edit/{}\">Edit this site</a></p>",
            html::escape(&site_id)
        );
    }
    let _ = writeln!(
        body,
        "<p><a href=\"/siteinfo/flags/{}\">Release flags</a></p>",
        html::escape(&site_id)
    );
    Ok(html::ok(html::page(
        &format!("{} ({})", info.long_name, site_id),
        user.username(),
        &body,
    )))
}

fn edit_page(
    site_id: &str,
    info: &SiteInfo,
    forms: &DoiForms,
    staff: bool,
    errors: &FieldErrors,
    username: Option<&str>,
) -> HttpResponse {
    let mut body = String::new();
    if !errors.is_empty() {
        body.push_str("<p class=\"error\">Please correct the errors below.</p>\n");
    }
    let _ = writeln!(
        body,
        "<form method=\"post\" action=\"/siteinfo/edit/{}\">",
        html::escape(site_id)
    );
    body.push_str(&netcdf_form::render(info, staff, errors));
    body.push_str(&forms.render(errors));
    body.push_str("<p><input type=\"submit\" value=\"Save\"></p>\n</form>\n");
    html::ok(html::page(&format!("Edit {} ({})", info.long_name, site_id), username, &body))
}

pub async fn edit_get(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let site_id = path.into_inner();
    if !auth::can_edit_site(&user, &site_id) {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, WHAT, DenyReason::Permission));
    }
    let st = state.clone();
    let id = site_id.clone();
    let (info, meta) = run_blocking(move || {
        let files = &st.config.files;
        let info = store::read_site(&st.locks, &files.site_info_file, &id)?;
        let meta: DoiMetadata =
            st.locks
                .read_metadata_file(&files.metadata_dir, &info.metadata_file_name(&id), true)?;
        Ok((info, meta))
    })
    .await?;

    let forms = DoiForms::from_metadata(&meta);
    Ok(edit_page(
        &site_id,
        &info,
        &forms,
        auth::can_edit_all_site_info(&user),
        &FieldErrors::default(),
        user.username(),
    ))
}

/// Stamp written into the metadata file on every save.
fn last_modified_stamp(username: &str) -> String {
    format!("{} by {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"), username)
}

pub async fn edit_post(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse> {
    let site_id = path.into_inner();
    let Some(username) = user.username().map(str::to_string) else {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, WHAT, DenyReason::Permission));
    };
    if !auth::can_edit_site(&user, &site_id) {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, WHAT, DenyReason::Permission));
    }
    let staff = auth::can_edit_all_site_info(&user);
    let data = FormData::new(form.into_inner());
    let max_release_lag = state.runtime_settings().max_release_lag;

    let st = state.clone();
    let id = site_id.clone();
    let outcome = run_blocking(move || {
        let files = &st.config.files;
        let current = store::read_site(&st.locks, &files.site_info_file, &id)?;
        let (info, mut errors) = netcdf_form::from_post(&data, &current, staff, max_release_lag);
        let forms = DoiForms::from_post(&data);
        errors.merge(forms.validate());
        if !errors.is_empty() {
            return Ok(Err((info, forms, errors)));
        }

        let saved = st.locks.update_json_file(&files.site_info_file, files.n_backups, |all, handle| {
            store::apply_update(all, handle, &id, &info, &username)
        })?;

        let mut meta: DoiMetadata =
            st.locks
                .read_metadata_file(&files.metadata_dir, &current.metadata_file_name(&id), true)?;
        forms.apply(&mut meta, &saved.data_doi, &saved.data_revision);
        meta.last_modified = Some(last_modified_stamp(&username));
        st.locks.update_metadata_repo(
            &files.metadata_dir,
            &saved.metadata_file_name(&id),
            &meta,
            &username,
            &st.config.git,
        )?;
        log::info!("{} updated site information for {}", username, id);
        Ok(Ok(()))
    })
    .await?;

    match outcome {
        Ok(()) => Ok(html::redirect(&format!(
            "/siteinfo/view/{}?msg=success",
            html::url_encode(&site_id)
        ))),
        Err((info, forms, errors)) => Ok(edit_page(&site_id, &info, &forms, staff, &errors, user.username())),
    }
}

pub async fn missing_permission(user: CurrentUser, query: web::Query<MissingPermissionQuery>) -> HttpResponse {
    let message = auth::missing_permission_message(
        query.msg.as_deref().unwrap_or(""),
        query.site.as_deref().unwrap_or("?"),
        query.what.as_deref().unwrap_or("this"),
    );
    let body = format!(
        "<p class=\"error\">{}</p>\n<p><a href=\"/siteinfo/\">Back to the site list</a></p>\n",
        html::escape(&message)
    );
    html::ok(html::page("Missing permission", user.username(), &body))
}

fn plain_text(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(body)
}

pub async fn bibtex_entries(state: web::Data<AppState>, query: web::Query<CitationQuery>) -> Result<HttpResponse> {
    let st = state.clone();
    let all = run_blocking(move || store::read_all(&st.locks, &st.config.files.site_info_file)).await?;
    Ok(plain_text(citations::bibtex_entries(&all, query.sites.as_deref())))
}

pub async fn bibtex_table(state: web::Data<AppState>, query: web::Query<CitationQuery>) -> Result<HttpResponse> {
    let st = state.clone();
    let all = run_blocking(move || store::read_all(&st.locks, &st.config.files.site_info_file)).await?;
    let cmd = query.cmd.as_deref().unwrap_or("citet");
    Ok(plain_text(citations::bibtex_table(&all, query.sites.as_deref(), cmd)))
}
