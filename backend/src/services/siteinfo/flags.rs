//! Release flags: date ranges of a site's data withheld from or annotated
//! in public releases. Anyone may view them; only staff may edit.

use super::store;
use crate::auth::{self, CurrentUser, DenyReason};
use crate::error::{PortalError, Result};
use crate::forms::{FieldErrors, FormData};
use crate::html;
use crate::locks::{backup_file_rolling, read_json, write_json, FileLocks};
use crate::services::run_blocking;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use futures_util::StreamExt;
use std::fmt::Write;
use std::path::Path;
use tccon_common::model::release_flag::{
    find_flag_key, next_flag_number, FlagDefinitions, FlagKey, ReleaseFlag, ReleaseFlagFile,
};
use tccon_common::requests::MessageQuery;

const DATE_FMT: &str = "%Y-%m-%d";
const MAX_PLOT_BYTES: usize = 10 * 1024 * 1024;
const PLOT_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "svg"];

fn flags_url(site_id: &str, msg: &str, flag: &str) -> String {
    format!(
        "/siteinfo/flags/{}?msg={}&flag={}",
        html::url_encode(site_id),
        msg,
        html::url_encode(flag)
    )
}

fn view_message(query: &MessageQuery, site_id: &str) -> String {
    let flag = query.flag.as_deref().unwrap_or("??");
    match query.msg.as_deref() {
        None | Some("") => String::new(),
        Some("edited") => format!("Updated flag number {} for site {}", flag, site_id),
        Some("deleted") => format!("Deleted flag number {} for site {}", flag, site_id),
        Some("deletefailed") => format!("Failed to delete {} for site {}", flag, site_id),
        Some(_) => "??".to_string(),
    }
}

/// A site's flags as `(key, flag)`, sorted by flag number. Flags without a
/// stored name get the name from the definitions file.
pub fn site_flags(all: &ReleaseFlagFile, defs: &FlagDefinitions, site_id: &str) -> Vec<(FlagKey, ReleaseFlag)> {
    let mut flags: Vec<(FlagKey, ReleaseFlag)> = all
        .iter()
        .filter_map(|(key, flag)| {
            let parsed = FlagKey::parse(key)?;
            (parsed.site_id == site_id).then(|| {
                let mut flag = flag.clone();
                if flag.name.is_none() {
                    flag.name = defs.name_for(flag.value).map(str::to_string);
                }
                (parsed, flag)
            })
        })
        .collect();
    flags.sort_by_key(|(key, _)| key.number);
    flags
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
    let (long_name, flags) = run_blocking(move || {
        let files = &st.config.files;
        let long_name = store::read_all(&st.locks, &files.site_info_file)?
            .get(&id)
            .map(|i| i.long_name.clone())
            .unwrap_or_else(|| "?".to_string());
        let all = store::read_flags(&st.locks, &files.release_flags_file)?;
        let defs = store::read_flag_definitions(&st.locks, &files.release_flags_def_file)?;
        Ok((long_name, site_flags(&all, &defs, &id)))
    })
    .await?;

    let staff = auth::can_edit_flags(&user);
    let mut body = html::message(&view_message(&query, &site_id));
    if flags.is_empty() {
        body.push_str("<p>No release flags defined for this site.</p>\n");
    } else {
        body.push_str(
            "<table>\n<thead><tr><th>Number</th><th>Start</th><th>End</th><th>Flag</th>\
             <th>Comment</th><th>Plot</th><th></th></tr></thead>\n<tbody>\n",
        );
        for (key, flag) in &flags {
            let plot = match &flag.plot {
                Some(p) => format!(
                    "<a href=\"{}{}\">plot</a>",
                    html::escape(&state.config.files.flag_plot_url),
                    html::escape(p)
                ),
                None => String::new(),
            };
            let actions = if staff {
                format!(
                    "<a href=\"/siteinfo/editflags/{s}/{n}\">edit</a> \
                     <form method=\"post\" action=\"/siteinfo/deleteflags/{s}/{n}\" class=\"inline\">\
                     <input type=\"submit\" value=\"delete\"></form>",
                    s = html::escape(&site_id),
                    n = key.number
                )
            } else {
                String::new()
            };
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{} ({})</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                key.number,
                key.start.format(DATE_FMT),
                key.end.format(DATE_FMT),
                html::escape(flag.name.as_deref().unwrap_or("?")),
                flag.value,
                html::escape(&flag.comment),
                plot,
                actions
            );
        }
        body.push_str("</tbody>\n</table>\n");
    }
    if staff {
        let _ = writeln!(
            body,
            "<p><a href=\"/siteinfo/editflags/{}/new\">Add a new flag</a></p>",
            html::escape(&site_id)
        );
    }
    let contact = state.runtime_settings().contact;
    let _ = writeln!(
        body,
        "<p>Contact {} to request changes to release flags.</p>",
        html::escape(&contact)
    );

    Ok(html::ok(html::page(
        &format!("Release flags for {} ({})", long_name, site_id),
        user.username(),
        &body,
    )))
}

/// Which flag an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget {
    New,
    Number(u32),
}

impl FlagTarget {
    pub fn parse(flag_id: &str) -> Option<FlagTarget> {
        if flag_id == "new" {
            Some(FlagTarget::New)
        } else {
            flag_id.parse().ok().map(FlagTarget::Number)
        }
    }

    fn label(self) -> String {
        match self {
            FlagTarget::New => "new".to_string(),
            FlagTarget::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct PlotUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A validated flag edit.
#[derive(Debug)]
pub struct FlagEdit {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub value: i64,
    pub comment: String,
    pub clear_plot: bool,
}

fn parse_date(data: &FormData, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let raw = data.trimmed(field);
    if raw.is_empty() {
        errors.add(field, "This field is required.");
        return None;
    }
    match NaiveDate::parse_from_str(raw, DATE_FMT) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(field, "Enter a valid date (YYYY-MM-DD).");
            None
        }
    }
}

pub fn validate_edit(
    data: &FormData,
    upload: Option<&PlotUpload>,
    defs: &FlagDefinitions,
) -> std::result::Result<FlagEdit, FieldErrors> {
    let mut errors = FieldErrors::default();
    let start = parse_date(data, "start", &mut errors);
    let end = parse_date(data, "end", &mut errors);
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            errors.add("end", "End date must not be before the start date.");
        }
    }

    let value = match data.trimmed("value").parse::<i64>() {
        Ok(v) if defs.definitions.is_empty() || defs.name_for(v).is_some() => Some(v),
        Ok(v) => {
            errors.add("value", format!("{} is not a defined flag value.", v));
            None
        }
        Err(_) => {
            errors.add("value", "Choose a flag value.");
            None
        }
    };

    if let Some(upload) = upload {
        let ext = Path::new(&upload.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !PLOT_EXTENSIONS.contains(&ext.as_str()) {
            errors.add("plot", format!("Plots must be one of: {}", PLOT_EXTENSIONS.join(", ")));
        }
    }

    match (start, end, value) {
        (Some(start), Some(end), Some(value)) if errors.is_empty() => Ok(FlagEdit {
            start,
            end,
            value,
            comment: data.trimmed("comment").to_string(),
            clear_plot: !data.get("plot_clear").is_empty(),
        }),
        _ => Err(errors),
    }
}

/// Keeps the final path component and only filename-safe characters.
fn safe_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("plot");
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

fn read_flags_in_lock(flags_file: &Path) -> Result<ReleaseFlagFile> {
    if flags_file.exists() {
        read_json(flags_file)
    } else {
        Ok(ReleaseFlagFile::new())
    }
}

fn write_flags_in_lock(flags_file: &Path, flags: &ReleaseFlagFile, n_backups: usize) -> Result<()> {
    if flags_file.exists() {
        backup_file_rolling(flags_file, n_backups)?;
    }
    write_json(flags_file, flags)
}

/// Name of a staged upload in the plot directory. Hidden from directory
/// listings and never referenced by a flag.
fn staged_name(name: &str) -> String {
    format!(".{}.upload", name)
}

/// Removes a plot no flag refers to any more. Failures are only logged,
/// the flag file is already written.
fn remove_plot(plot_dir: &Path, name: &str) {
    let path = plot_dir.join(name);
    match std::fs::remove_file(&path) {
        Ok(()) => log::info!("Removed plot {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove plot {}: {}", path.display(), e),
    }
}

/// Stores `edit` under one lock on the flags file and returns the flag
/// number used. Any existing key for that number is replaced.
///
/// An uploaded plot is staged under a temporary name and only moved into
/// place once the flags file is written. The plot it replaces, or the one
/// cleared by `clear_plot`, is then removed.
#[allow(clippy::too_many_arguments)]
pub fn save_flag(
    locks: &FileLocks,
    flags_file: &Path,
    plot_dir: &Path,
    n_backups: usize,
    site_id: &str,
    target: FlagTarget,
    edit: &FlagEdit,
    defs: &FlagDefinitions,
    upload: Option<PlotUpload>,
) -> Result<u32> {
    locks.execute(flags_file, |_| {
        let mut flags = read_flags_in_lock(flags_file)?;
        let number = match target {
            FlagTarget::New => next_flag_number(&flags, site_id),
            FlagTarget::Number(n) => n,
        };
        let previous = find_flag_key(&flags, site_id, number)
            .map(str::to_string)
            .and_then(|k| flags.remove(&k));
        let old_plot = previous.as_ref().and_then(|p| p.plot.clone());

        let staged = match &upload {
            Some(upload) => {
                let name = format!("{}_{}_{}", site_id, number, safe_file_name(&upload.filename));
                let tmp = plot_dir.join(staged_name(&name));
                std::fs::write(&tmp, &upload.bytes).map_err(|e| PortalError::io(&tmp, e))?;
                Some((name, tmp))
            }
            None => None,
        };
        let plot = match &staged {
            Some((name, _)) => Some(name.clone()),
            None if edit.clear_plot => None,
            None => old_plot.clone(),
        };

        let key = FlagKey {
            site_id: site_id.to_string(),
            number,
            start: edit.start,
            end: edit.end,
        };
        flags.insert(
            key.to_key(),
            ReleaseFlag {
                value: edit.value,
                name: defs.name_for(edit.value).map(str::to_string),
                comment: edit.comment.clone(),
                plot: plot.clone(),
                extra: previous.map(|p| p.extra).unwrap_or_default(),
            },
        );
        if let Err(e) = write_flags_in_lock(flags_file, &flags, n_backups) {
            if let Some((_, tmp)) = &staged {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e);
        }

        if let Some((name, tmp)) = staged {
            let dest = plot_dir.join(&name);
            std::fs::rename(&tmp, &dest).map_err(|e| PortalError::io(&dest, e))?;
        }
        if let Some(old) = old_plot.filter(|old| plot.as_ref() != Some(old)) {
            remove_plot(plot_dir, &old);
        }
        log::info!("Saved release flag {} for {}", key.to_key(), site_id);
        Ok(number)
    })
}

/// Removes flag `number` of `site_id` and its plot. Returns false if there
/// was no such flag, in which case nothing is touched.
pub fn delete_flag(
    locks: &FileLocks,
    flags_file: &Path,
    plot_dir: &Path,
    n_backups: usize,
    site_id: &str,
    number: u32,
) -> Result<bool> {
    locks.execute(flags_file, |_| {
        let mut flags = read_flags_in_lock(flags_file)?;
        let Some(key) = find_flag_key(&flags, site_id, number).map(str::to_string) else {
            return Ok(false);
        };
        let removed = flags.remove(&key);
        write_flags_in_lock(flags_file, &flags, n_backups)?;
        if let Some(plot) = removed.and_then(|f| f.plot) {
            remove_plot(plot_dir, &plot);
        }
        log::info!("Deleted release flag {}", key);
        Ok(true)
    })
}

fn edit_form(
    site_id: &str,
    long_name: &str,
    target: FlagTarget,
    data: &FormData,
    defs: &FlagDefinitions,
    has_plot: bool,
    errors: &FieldErrors,
) -> String {
    let mut choices: Vec<(String, String)> = defs
        .definitions
        .iter()
        .map(|(name, value)| (value.to_string(), format!("{} ({})", name, value)))
        .collect();
    choices.sort_by_key(|(v, _)| v.parse::<i64>().unwrap_or(i64::MAX));
    choices.insert(0, (String::new(), "-".to_string()));

    let mut out = format!(
        "{}<form method=\"post\" enctype=\"multipart/form-data\" action=\"/siteinfo/editflags/{}/{}\">\n",
        html::field_errors(errors, crate::forms::NON_FIELD),
        html::escape(site_id),
        target.label()
    );
    out.push_str(&html::date_input("start", "Start date", data.trimmed("start"), errors));
    out.push_str(&html::date_input("end", "End date", data.trimmed("end"), errors));
    out.push_str(&html::select("value", "Flag", &choices, data.trimmed("value"), errors));
    out.push_str(&html::textarea("comment", "Comment", data.get("comment"), errors));
    let _ = write!(
        out,
        "<p><label for=\"id_plot\">Plot</label> <input type=\"file\" id=\"id_plot\" name=\"plot\">{}</p>\n",
        html::field_errors(errors, "plot")
    );
    if has_plot {
        out.push_str("<p><label><input type=\"checkbox\" name=\"plot_clear\"> Remove the current plot</label></p>\n");
    }
    out.push_str("<p><input type=\"submit\" value=\"Save\"></p>\n</form>\n");
    let _ = write!(
        out,
        "<p><a href=\"/siteinfo/flags/{}\">Back to the flags for {}</a></p>\n",
        html::escape(site_id),
        html::escape(long_name)
    );
    out
}

fn edit_title(site_id: &str, target: FlagTarget) -> String {
    match target {
        FlagTarget::New => format!("New release flag for {}", site_id),
        FlagTarget::Number(n) => format!("Edit release flag {} for {}", n, site_id),
    }
}

pub async fn edit_get(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (site_id, flag_id) = path.into_inner();
    if !auth::can_edit_flags(&user) {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, "release flags", DenyReason::Permission));
    }
    let target = FlagTarget::parse(&flag_id).ok_or_else(|| PortalError::NotFound("Invalid flag ID".into()))?;

    let st = state.clone();
    let id = site_id.clone();
    let (long_name, defs, current) = run_blocking(move || {
        let files = &st.config.files;
        let info = store::read_site(&st.locks, &files.site_info_file, &id)?;
        let defs = store::read_flag_definitions(&st.locks, &files.release_flags_def_file)?;
        let current = match target {
            FlagTarget::New => None,
            FlagTarget::Number(n) => {
                let flags = store::read_flags(&st.locks, &files.release_flags_file)?;
                let key = find_flag_key(&flags, &id, n).ok_or_else(|| {
                    PortalError::NotFound(format!("Unable to find flag for site \"{}\" flag number \"{}\"", id, n))
                })?;
                let parsed = FlagKey::parse(key);
                flags.get(key).cloned().zip(parsed)
            }
        };
        Ok((info.long_name, defs, current))
    })
    .await?;

    let mut data = FormData::default();
    let has_plot = current.as_ref().is_some_and(|(f, _)| f.plot.is_some());
    if let Some((flag, key)) = current {
        data = [
            ("start".to_string(), key.start.format(DATE_FMT).to_string()),
            ("end".to_string(), key.end.format(DATE_FMT).to_string()),
            ("value".to_string(), flag.value.to_string()),
            ("comment".to_string(), flag.comment),
        ]
        .into_iter()
        .collect();
    }
    let body = edit_form(&site_id, &long_name, target, &data, &defs, has_plot, &FieldErrors::default());
    Ok(html::ok(html::page(&edit_title(&site_id, target), user.username(), &body)))
}

/// Collects the text fields and the optional `plot` file of a multipart
/// body.
async fn read_multipart(mut payload: Multipart) -> Result<(FormData, Option<PlotUpload>)> {
    let mut fields = Vec::new();
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| PortalError::BadRequest(e.to_string()))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()))
            .unwrap_or_default();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()));

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| PortalError::BadRequest(e.to_string()))?;
            if bytes.len() + chunk.len() > MAX_PLOT_BYTES {
                return Err(PortalError::BadRequest("Uploaded file is too large".into()));
            }
            bytes.extend_from_slice(&chunk);
        }

        match (name.as_str(), filename) {
            ("plot", Some(filename)) if !filename.is_empty() && !bytes.is_empty() => {
                upload = Some(PlotUpload { filename, bytes });
            }
            ("plot", _) => {}
            _ => fields.push((name, String::from_utf8_lossy(&bytes).into_owned())),
        }
    }
    Ok((fields.into_iter().collect(), upload))
}

pub async fn edit_post(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<(String, String)>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let (site_id, flag_id) = path.into_inner();
    if !auth::can_edit_flags(&user) {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, "release flags", DenyReason::Permission));
    }
    let target = FlagTarget::parse(&flag_id).ok_or_else(|| PortalError::NotFound("Invalid flag ID".into()))?;
    let (data, upload) = read_multipart(payload).await?;

    let st = state.clone();
    let id = site_id.clone();
    let outcome = run_blocking(move || {
        let files = &st.config.files;
        let info = store::read_site(&st.locks, &files.site_info_file, &id)?;
        let defs = store::read_flag_definitions(&st.locks, &files.release_flags_def_file)?;
        match validate_edit(&data, upload.as_ref(), &defs) {
            Ok(edit) => {
                let number = save_flag(
                    &st.locks,
                    &files.release_flags_file,
                    &files.flag_plot_dir,
                    files.n_backups,
                    &id,
                    target,
                    &edit,
                    &defs,
                    upload,
                )?;
                Ok(Ok(number))
            }
            Err(errors) => {
                let has_plot = match target {
                    FlagTarget::New => false,
                    FlagTarget::Number(n) => {
                        let flags = store::read_flags(&st.locks, &files.release_flags_file)?;
                        find_flag_key(&flags, &id, n)
                            .and_then(|key| flags.get(key))
                            .is_some_and(|f| f.plot.is_some())
                    }
                };
                Ok(Err((info.long_name, defs, data, has_plot, errors)))
            }
        }
    })
    .await?;

    match outcome {
        Ok(number) => Ok(html::redirect(&flags_url(&site_id, "edited", &number.to_string()))),
        Err((long_name, defs, data, has_plot, errors)) => {
            let body = edit_form(&site_id, &long_name, target, &data, &defs, has_plot, &errors);
            Ok(html::ok(html::page(&edit_title(&site_id, target), user.username(), &body)))
        }
    }
}

pub async fn delete_get(user: CurrentUser, path: web::Path<(String, String)>) -> HttpResponse {
    let (site_id, _) = path.into_inner();
    auth::redirect_for_lack_of_permission(&user, &site_id, "release flags", DenyReason::GetNotAllowed)
}

pub async fn delete_post(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (site_id, flag_id) = path.into_inner();
    if !auth::can_edit_flags(&user) {
        return Ok(auth::redirect_for_lack_of_permission(&user, &site_id, "release flags", DenyReason::Permission));
    }
    let Ok(number) = flag_id.parse::<u32>() else {
        return Ok(html::redirect(&flags_url(&site_id, "deletefailed", &flag_id)));
    };

    let st = state.clone();
    let id = site_id.clone();
    let deleted = run_blocking(move || {
        let files = &st.config.files;
        delete_flag(
            &st.locks,
            &files.release_flags_file,
            &files.flag_plot_dir,
            files.n_backups,
            &id,
            number,
        )
    })
    .await?;

    let msg = if deleted { "deleted" } else { "deletefailed" };
    Ok(html::redirect(&flags_url(&site_id, msg, &flag_id)))
}
