//! Read-only JSON status API.
//!
//! Success bodies map a site id or name to a [`StatusApiEntry`]. Lookups that
//! find nothing, or more than one site, answer 406 with `{"error": ...}`.

use super::store;
use crate::error::Result;
use crate::services::run_blocking;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use std::collections::BTreeMap;
use tccon_common::model::status::{SiteStatus, StatusApiEntry, StatusApiError};

fn api_error(message: String) -> HttpResponse {
    HttpResponse::NotAcceptable().json(StatusApiError { error: message })
}

fn entries_by_id(sites: &[SiteStatus]) -> BTreeMap<String, StatusApiEntry> {
    sites
        .iter()
        .map(|s| (s.site_id.clone(), StatusApiEntry::from(s)))
        .collect()
}

/// Keyed by name; a name shared by two sites is an error.
fn entries_by_name(sites: &[SiteStatus]) -> std::result::Result<BTreeMap<String, StatusApiEntry>, String> {
    let mut out = BTreeMap::new();
    for s in sites {
        if let Some(previous) = out.insert(s.site_name.clone(), StatusApiEntry::from(s)) {
            return Err(format!(
                "Multiple sites share the name \"{}\" ({} and {}), use the byid endpoint instead",
                s.site_name, previous.id, s.site_id
            ));
        }
    }
    Ok(out)
}

fn single_by_name(name: &str, matches: &[SiteStatus]) -> std::result::Result<BTreeMap<String, StatusApiEntry>, String> {
    match matches {
        [] => Err(format!("No site named \"{}\"", name)),
        [site] => Ok(BTreeMap::from([(site.site_name.clone(), StatusApiEntry::from(site))])),
        many => Err(format!(
            "Site name \"{}\" is ambiguous, it matches {}",
            name,
            many.iter()
                .map(|s| s.site_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

pub async fn all_by_id(state: web::Data<AppState>) -> Result<HttpResponse> {
    let db = state.db.clone();
    let sites = run_blocking(move || store::list(&db.connect()?)).await?;
    Ok(HttpResponse::Ok().json(entries_by_id(&sites)))
}

pub async fn all_by_name(state: web::Data<AppState>) -> Result<HttpResponse> {
    let db = state.db.clone();
    let sites = run_blocking(move || store::list(&db.connect()?)).await?;
    Ok(match entries_by_name(&sites) {
        Ok(map) => HttpResponse::Ok().json(map),
        Err(message) => api_error(message),
    })
}

pub async fn one_by_id(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let site_id = path.into_inner();
    let db = state.db.clone();
    let lookup = site_id.clone();
    let site = run_blocking(move || store::get(&db.connect()?, &lookup)).await?;
    Ok(match site {
        Some(site) => HttpResponse::Ok().json(entries_by_id(std::slice::from_ref(&site))),
        None => api_error(format!("No site with ID \"{}\"", site_id)),
    })
}

pub async fn one_by_name(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let name = path.into_inner();
    let db = state.db.clone();
    let lookup = name.clone();
    let matches = run_blocking(move || store::find_by_name(&db.connect()?, &lookup)).await?;
    Ok(match single_by_name(&name, &matches) {
        Ok(map) => HttpResponse::Ok().json(map),
        Err(message) => api_error(message),
    })
}

#[cfg(test)]
mod tests {
    use crate::services::opstat::{configure_routes, store};
    use crate::state::testing::test_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;
    use tccon_common::model::status::OperationalStatus;

    #[actix_web::test]
    async fn by_id_and_errors() {
        let (_dir, state) = test_state();
        {
            let mut conn = state.db.connect().unwrap();
            store::add_site(&conn, "pa", "Park Falls", OperationalStatus::Yes).unwrap();
            store::add_site(&conn, "jc", "JPL", OperationalStatus::Retired).unwrap();
            store::add_site(&conn, "jf", "JPL", OperationalStatus::Retired).unwrap();
            store::update_status(&mut conn, "pa", OperationalStatus::No, "", "alice").unwrap();
        }
        let app = test::init_service(App::new().app_data(state.clone()).service(configure_routes())).await;

        let req = test::TestRequest::get().uri("/opstat/api/getstatus/byid/pa").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pa"]["status"], "no");
        assert_eq!(body["pa"]["user"], "alice");
        assert_eq!(body["pa"]["display_descr"], "No description given");
        assert!(body["pa"]["date"].as_str().is_some());

        let req = test::TestRequest::get().uri("/opstat/api/getstatus/byid/zz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("zz"));

        let req = test::TestRequest::get().uri("/opstat/api/getstatus/byname/JPL").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("ambiguous"));

        let req = test::TestRequest::get().uri("/opstat/api/getstatus/byname/Park%20Falls").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["Park Falls"]["id"], "pa");

        let req = test::TestRequest::get().uri("/opstat/api/getstatusall/byname").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

        let req = test::TestRequest::get().uri("/opstat/api/getstatusall/byid").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_object().unwrap().len(), 3);
        assert_eq!(body["jc"]["status"], "retired");
    }

    #[actix_web::test]
    async fn update_requires_login_and_a_choice() {
        let (_dir, state) = test_state();
        {
            let conn = state.db.connect().unwrap();
            store::add_site(&conn, "oc", "Lamont", OperationalStatus::Yes).unwrap();
            crate::db::users::upsert_user(
                &conn,
                &tccon_common::model::reviewers::User {
                    username: "bob".into(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: String::new(),
                    is_staff: false,
                },
            )
            .unwrap();
        }
        let app = test::init_service(App::new().app_data(state.clone()).service(configure_routes())).await;

        let req = test::TestRequest::get().uri("/opstat/submitupdate/oc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get("Location").unwrap().to_str().unwrap(), "/opstat/?status=needlogin");

        let req = test::TestRequest::post()
            .uri("/opstat/update/oc")
            .insert_header(("X-Remote-User", "bob"))
            .set_form([("description", "no choice")])
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("You must choose an option"));

        let req = test::TestRequest::post()
            .uri("/opstat/update/oc")
            .insert_header(("X-Remote-User", "bob"))
            .set_form([("status", "r"), ("description", "decommissioned")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get("Location").unwrap().to_str().unwrap(), "/opstat/?status=goodupdate&site=Lamont");

        let req = test::TestRequest::get().uri("/opstat/car").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).starts_with("Lamont::r::decommissioned [bob "));

        let req = test::TestRequest::get().uri("/opstat/history/xx").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
