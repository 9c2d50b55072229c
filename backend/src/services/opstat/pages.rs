use super::store;
use crate::auth::CurrentUser;
use crate::error::{PortalError, Result};
use crate::html;
use crate::services::run_blocking;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use tccon_common::model::status::{OperationalStatus, SiteStatus};
use tccon_common::requests::{StatusIndexQuery, StatusUpdateForm};

const MISSING_STATUS: &str = "You must choose an option for the \"Operational?\" query";

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

/// Banner text for the `?status=` values the index understands.
fn index_message(query: &StatusIndexQuery) -> String {
    match query.status.as_deref() {
        Some("goodupdate") => format!(
            "{} successfully updated",
            query.site.as_deref().unwrap_or("")
        ),
        Some("needlogin") => "You must log in to update a site status".to_string(),
        _ => String::new(),
    }
}

fn status_table(sites: &[SiteStatus], logged_in: bool) -> String {
    let mut out = String::from(
        "<table>\n<thead><tr><th>Site</th><th>Operational?</th><th>Description</th>\
         <th>Updated by</th><th>Date</th><th></th></tr></thead>\n<tbody>\n",
    );
    for s in sites {
        let update_link = if logged_in {
            format!(
                " <a href=\"/opstat/submitupdate/{id}\">update</a>",
                id = html::escape(&s.site_id)
            )
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "<tr class=\"status-{code}\"><td>{name} ({id})</td><td>{status}</td><td>{descr}</td>\
             <td>{user}</td><td>{date}</td><td><a href=\"/opstat/history/{id}\">history</a>{update}</td></tr>",
            code = s.status.code(),
            name = html::escape(&s.site_name),
            id = html::escape(&s.site_id),
            status = s.status.label(),
            descr = html::escape(s.description.as_deref().unwrap_or("")),
            user = html::escape(s.username.as_deref().unwrap_or("")),
            date = format_date(s.date),
            update = update_link,
        );
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

pub async fn index(
    state: web::Data<AppState>,
    user: CurrentUser,
    query: web::Query<StatusIndexQuery>,
) -> Result<HttpResponse> {
    let db = state.db.clone();
    let sites = run_blocking(move || store::list(&db.connect()?)).await?;

    let body = format!(
        "{}<p>Current as of {}. <a href=\"/opstat/all_history\">All history</a> | \
         <a href=\"/opstat/car\">Plain text</a> | <a href=\"/opstat/api_docs\">API</a></p>\n{}",
        html::message(&index_message(&query)),
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        status_table(&sites, user.is_authenticated())
    );
    Ok(html::ok(html::page("TCCON site status", user.username(), &body)))
}

/// Plain text line for one site, as consumed by the CAR scripts.
pub fn car_line(s: &SiteStatus) -> String {
    format!(
        "{name}::{status}::{descr} [{user} {date}]",
        name = s.site_name,
        status = s.status.code(),
        descr = s.description.as_deref().unwrap_or(""),
        user = s.username.as_deref().unwrap_or(""),
        date = s.date.map(|d| d.format("%Y%m%d").to_string()).unwrap_or_default(),
    )
}

pub async fn car(state: web::Data<AppState>) -> Result<HttpResponse> {
    let db = state.db.clone();
    let sites = run_blocking(move || store::list(&db.connect()?)).await?;
    let body = sites.iter().map(car_line).collect::<Vec<_>>().join("\n");
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(body))
}

fn update_form(site: &SiteStatus, error: Option<&str>, username: Option<&str>) -> HttpResponse {
    let choices: Vec<(&str, &str)> = OperationalStatus::ALL
        .iter()
        .map(|s| (s.code(), s.label()))
        .collect();
    let error_html = error
        .map(|e| format!("<p class=\"error\">{}</p>", html::escape(e)))
        .unwrap_or_default();
    let body = format!(
        "{error}<form method=\"post\" action=\"/opstat/update/{id}\">\n{radios}\
         <p><label for=\"id_description\">Description</label><br>\
         <input type=\"text\" id=\"id_description\" name=\"description\" maxlength=\"150\" size=\"80\"></p>\n\
         <p><input type=\"submit\" value=\"Update\"></p>\n</form>\n",
        error = error_html,
        id = html::escape(&site.site_id),
        radios = html::radios("status", "Operational?", &choices, "", &Default::default()),
    );
    html::ok(html::page(
        &format!("Update status for {}", site.site_name),
        username,
        &body,
    ))
}

async fn load_site(state: &AppState, site_id: String) -> Result<SiteStatus> {
    let db = state.db.clone();
    run_blocking(move || {
        store::get(&db.connect()?, &site_id)?
            .ok_or_else(|| PortalError::NotFound(format!("No site with ID \"{}\"", site_id)))
    })
    .await
}

pub async fn submit_update(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    if !user.is_authenticated() {
        return Ok(html::redirect("/opstat/?status=needlogin"));
    }
    let site = load_site(&state, path.into_inner()).await?;
    Ok(update_form(&site, None, user.username()))
}

pub async fn update(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
    form: web::Form<StatusUpdateForm>,
) -> Result<HttpResponse> {
    let Some(username) = user.username().map(str::to_string) else {
        return Ok(html::redirect("/opstat/?status=needlogin"));
    };
    let site = load_site(&state, path.into_inner()).await?;

    let form = form.into_inner();
    let Some(status) = form.status.as_deref().and_then(OperationalStatus::from_code) else {
        return Ok(update_form(&site, Some(MISSING_STATUS), Some(&username)));
    };

    let db = state.db.clone();
    let site_id = site.site_id.clone();
    let description = form.description;
    let outcome = run_blocking(move || {
        let mut conn = db.connect()?;
        store::update_status(&mut conn, &site_id, status, &description, &username)
    })
    .await;

    match outcome {
        Ok(_) => Ok(html::redirect(&format!(
            "/opstat/?status=goodupdate&site={}",
            html::url_encode(&site.site_name)
        ))),
        Err(e @ PortalError::Database(_)) => {
            log::warn!("Status update for {} failed: {}", site.site_id, e);
            let body = format!(
                "<p class=\"error\">Updating the status for site {} failed. The error was:</p>\n\
                 <pre>{}</pre>\n<p><a href=\"/opstat/submitupdate/{}\">Try again</a></p>\n",
                html::escape(&site.site_id),
                html::escape(&e.last_line()),
                html::escape(&site.site_id)
            );
            Ok(html::ok(html::page("Update failed", user.username(), &body)))
        }
        Err(e) => Err(e),
    }
}

pub async fn history(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let site = load_site(&state, path.into_inner()).await?;
    let db = state.db.clone();
    let site_id = site.site_id.clone();
    let rows = run_blocking(move || store::history(&db.connect()?, &site_id)).await?;

    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|h| {
            vec![
                format_date(h.date),
                h.username.unwrap_or_default(),
                h.status.label().to_string(),
                h.description.unwrap_or_default(),
            ]
        })
        .collect();
    let body = html::table(&["Date", "User", "Operational?", "Description"], &rows);
    Ok(html::ok(html::page(
        &format!("Status history for {}", site.site_name),
        user.username(),
        &body,
    )))
}

pub async fn all_history(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    let db = state.db.clone();
    let rows = run_blocking(move || store::all_history(&db.connect()?)).await?;
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|h| {
            vec![
                h.site_id,
                format_date(h.date),
                h.username.unwrap_or_default(),
                h.status.label().to_string(),
                h.description.unwrap_or_default(),
            ]
        })
        .collect();
    let body = html::table(&["Site", "Date", "User", "Operational?", "Description"], &rows);
    Ok(html::ok(html::page("Status history for all sites", user.username(), &body)))
}

const API_DOCS: &str = r#"<p>All endpoints are read only and return JSON.</p>
<dl>
<dt><code>/opstat/api/getstatusall/byid</code></dt>
<dd>Every site, keyed by two-letter site ID.</dd>
<dt><code>/opstat/api/getstatusall/byname</code></dt>
<dd>Every site, keyed by site name. Fails if two sites share a name.</dd>
<dt><code>/opstat/api/getstatus/byid/{site_id}</code></dt>
<dd>One site, keyed by its ID.</dd>
<dt><code>/opstat/api/getstatus/byname/{name}</code></dt>
<dd>One site, keyed by its name. Fails if the name matches more than one site.</dd>
</dl>
<p>Each site is an object with the keys:</p>
<ul>
<li><code>id</code>: two-letter site ID</li>
<li><code>name</code>: site name</li>
<li><code>status</code>: one of <code>yes</code>, <code>no</code>, <code>retired</code></li>
<li><code>descr</code>: description entered with the last update, may be null</li>
<li><code>user</code>: who made the last update, may be null</li>
<li><code>date</code>: RFC 3339 time of the last update, may be null</li>
<li><code>display_descr</code>: the description, or "No description given"</li>
</ul>
<p>Errors (unknown or ambiguous site) return HTTP 406 with a body of the form
<code>{"error": "message"}</code>.</p>
"#;

pub async fn api_docs(user: CurrentUser) -> HttpResponse {
    html::ok(html::page("Site status API", user.username(), API_DOCS))
}
