//! # Site Operational Status
//!
//! Pages for viewing and reporting whether each TCCON site is running, the
//! plain-text feed consumed by the CAR tooling, and a small read-only JSON
//! API.
//!
//! ## Registered routes (under `/opstat`)
//!
//! * `GET /`: status table, with a banner driven by `?status=`.
//! * `GET /car`: one `name::status::descr [user YYYYMMDD]` line per site.
//! * `GET /submitupdate/{site_id}`, `POST /update/{site_id}`: report a new status.
//!   The update writes the status row and a history row in one transaction.
//! * `GET /history/{site_id}`, `GET /all_history`: past reports, newest first.
//! * `GET /api_docs` and `GET /api/...`: see [`api`].

mod api;
mod pages;
pub mod store;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const BASE_PATH: &str = "/opstat";

pub fn configure_routes() -> Scope {
    scope(BASE_PATH)
        .route("/", get().to(pages::index))
        .route("", get().to(pages::index))
        .route("/car", get().to(pages::car))
        .route("/submitupdate/{site_id}", get().to(pages::submit_update))
        .route("/update/{site_id}", post().to(pages::update))
        .route("/history/{site_id}", get().to(pages::history))
        .route("/all_history", get().to(pages::all_history))
        .route("/api_docs", get().to(pages::api_docs))
        .route("/api/getstatusall/byid", get().to(api::all_by_id))
        .route("/api/getstatusall/byname", get().to(api::all_by_name))
        .route("/api/getstatus/byid/{site_id}", get().to(api::one_by_id))
        .route("/api/getstatus/byname/{name}", get().to(api::one_by_name))
}
