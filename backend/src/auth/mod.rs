//! Request identity and site permissions.
//!
//! The portal sits behind a reverse proxy that authenticates users and
//! passes the username in a header (`auth.user_header`). That name is
//! looked up in the `users` table; an absent header or an unknown user makes
//! the request anonymous.

use crate::db::users;
use crate::error::PortalError;
use crate::html;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::LocalBoxFuture;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tccon_common::model::reviewers::User;

static SITE_PERMISSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^opstat\.([a-z]{2})_status$").expect("valid regex"));

/// A logged-in user and the permissions granted to them.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user: User,
    pub permissions: BTreeSet<String>,
}

impl AuthUser {
    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_staff
    }

    /// Staff implicitly hold every permission.
    pub fn has_perm(&self, permission: &str) -> bool {
        self.is_staff() || self.permissions.contains(permission)
    }
}

/// Extractor for the user behind a request, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthUser>);

impl CurrentUser {
    pub fn get(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(AuthUser::username)
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_staff)
    }
}

impl FromRequest for CurrentUser {
    type Error = PortalError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let username = state.as_ref().and_then(|s| {
            req.headers()
                .get(s.config.auth.user_header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

        Box::pin(async move {
            let (Some(state), Some(username)) = (state, username) else {
                return Ok(CurrentUser(None));
            };
            let user = web::block(move || load_user(&state, &username)).await??;
            Ok(CurrentUser(user))
        })
    }
}

fn load_user(state: &AppState, username: &str) -> crate::error::Result<Option<AuthUser>> {
    let conn = state.db.connect()?;
    match users::get_user(&conn, username)? {
        Some(user) => {
            let permissions = users::permissions(&conn, username)?;
            Ok(Some(AuthUser { user, permissions }))
        }
        None => {
            log::warn!("Request from unknown user {}, treating as anonymous", username);
            Ok(None)
        }
    }
}

/// Which sites a user may edit metadata for.
#[derive(Debug, Clone, PartialEq)]
pub enum EditableSites {
    All,
    Only(BTreeSet<String>),
}

impl EditableSites {
    pub fn contains(&self, site_id: &str) -> bool {
        match self {
            EditableSites::All => true,
            EditableSites::Only(sites) => sites.contains(site_id),
        }
    }
}

pub fn sites_can_edit(user: &CurrentUser) -> EditableSites {
    match user.get() {
        Some(u) if u.is_staff() => EditableSites::All,
        Some(u) => EditableSites::Only(
            u.permissions
                .iter()
                .filter_map(|p| SITE_PERMISSION.captures(p))
                .map(|c| c[1].to_string())
                .collect(),
        ),
        None => EditableSites::Only(BTreeSet::new()),
    }
}

pub fn can_edit_site(user: &CurrentUser, site_id: &str) -> bool {
    user.get()
        .is_some_and(|u| u.has_perm(&format!("opstat.{}_status", site_id)))
}

/// Staff-only fields of the site metadata form.
pub fn can_edit_all_site_info(user: &CurrentUser) -> bool {
    user.is_staff()
}

pub fn can_edit_flags(user: &CurrentUser) -> bool {
    user.is_staff()
}

/// Why a request was turned away, as passed to the missing-permission page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Pick `lackperm` or `notloggedin` from the user.
    Permission,
    GetNotAllowed,
}

pub fn missing_permission_url(user: &CurrentUser, site_id: &str, what: &str, why: DenyReason) -> String {
    let reason = match why {
        DenyReason::Permission if user.is_authenticated() => "lackperm",
        DenyReason::Permission => "notloggedin",
        DenyReason::GetNotAllowed => "getnotallowed",
    };
    format!(
        "/siteinfo/missingperm?msg={}&site={}&what={}",
        reason,
        html::url_encode(site_id),
        html::url_encode(what)
    )
}

pub fn redirect_for_lack_of_permission(
    user: &CurrentUser,
    site_id: &str,
    what: &str,
    why: DenyReason,
) -> HttpResponse {
    html::redirect(&missing_permission_url(user, site_id, what, why))
}

/// Text shown on the missing-permission page for a reason code.
pub fn missing_permission_message(reason: &str, site_id: &str, what: &str) -> String {
    match reason {
        "lackperm" => format!(
            "You do not have permissions to edit {} for site {}.",
            what, site_id
        ),
        "notloggedin" => format!("You need to be logged in to edit {}.", what),
        "getnotallowed" => format!(
            "You tried to directly visit a URL only used to update {} - this does nothing. \
             You must use the correct form on this website.",
            what
        ),
        _ => format!("You are not allowed to edit {} for site {}.", what, site_id),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn user(username: &str, is_staff: bool, perms: &[&str]) -> CurrentUser {
        CurrentUser(Some(AuthUser {
            user: User {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                is_staff,
            },
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::user;
    use super::*;
    use crate::config::PortalConfig;
    use crate::db::testing::temp_db;
    use actix_web::test::TestRequest;

    #[test]
    fn staff_can_edit_everything() {
        let staff = user("admin", true, &[]);
        assert_eq!(sites_can_edit(&staff), EditableSites::All);
        assert!(can_edit_site(&staff, "pa"));
        assert!(can_edit_flags(&staff));
    }

    #[test]
    fn site_permissions_select_sites() {
        let pi = user("pi", false, &["opstat.pa_status", "opstat.oc_status", "qcform.view"]);
        let EditableSites::Only(sites) = sites_can_edit(&pi) else {
            panic!("non-staff user must get an explicit site list");
        };
        assert_eq!(sites.into_iter().collect::<Vec<_>>(), vec!["oc", "pa"]);
        assert!(can_edit_site(&pi, "pa"));
        assert!(!can_edit_site(&pi, "ci"));
        assert!(!can_edit_all_site_info(&pi));
        assert!(!can_edit_site(&CurrentUser(None), "pa"));
    }

    #[test]
    fn deny_url_depends_on_login() {
        let anon = CurrentUser(None);
        assert_eq!(
            missing_permission_url(&anon, "pa", "public metadata", DenyReason::Permission),
            "/siteinfo/missingperm?msg=notloggedin&site=pa&what=public%20metadata"
        );
        let pi = user("pi", false, &[]);
        assert!(missing_permission_url(&pi, "pa", "x", DenyReason::Permission).contains("msg=lackperm"));
        assert!(
            missing_permission_url(&pi, "pa", "x", DenyReason::GetNotAllowed).contains("msg=getnotallowed")
        );
    }

    #[test]
    fn unknown_reason_gets_generic_message() {
        assert_eq!(
            missing_permission_message("missingperm", "pa", "release flags"),
            "You are not allowed to edit release flags for site pa."
        );
        assert!(missing_permission_message("notloggedin", "pa", "that").starts_with("You need to be logged in"));
    }

    #[actix_web::test]
    async fn extractor_reads_proxy_header() {
        let (_dir, db) = temp_db();
        {
            let conn = db.connect().unwrap();
            users::upsert_user(
                &conn,
                &User {
                    username: "alice".into(),
                    first_name: "Alice".into(),
                    last_name: "A".into(),
                    email: String::new(),
                    is_staff: false,
                },
            )
            .unwrap();
            users::grant_permission(&conn, "alice", "opstat.pa_status").unwrap();
        }
        let state = web::Data::new(AppState::new(PortalConfig::default(), db));

        let req = TestRequest::default()
            .app_data(state.clone())
            .insert_header(("X-Remote-User", "alice"))
            .to_http_request();
        let current = CurrentUser::extract(&req).await.unwrap();
        assert_eq!(current.username(), Some("alice"));
        assert!(can_edit_site(&current, "pa"));

        let req = TestRequest::default()
            .app_data(state.clone())
            .insert_header(("X-Remote-User", "mallory"))
            .to_http_request();
        assert!(!CurrentUser::extract(&req).await.unwrap().is_authenticated());

        let req = TestRequest::default().app_data(state).to_http_request();
        assert!(!CurrentUser::extract(&req).await.unwrap().is_authenticated());
    }
}
