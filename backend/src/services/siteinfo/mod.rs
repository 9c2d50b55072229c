//! # Site Metadata
//!
//! Viewing and editing the per-site information that goes into the netCDF
//! files and the DataCite DOI metadata, the per-site release flags, and
//! BibTeX citations built from the data references.
//!
//! ## Registered routes (under `/siteinfo`)
//!
//! * `GET /`: sites the user can edit, then the rest.
//! * `GET /view/{site_id}`: site info and DOI metadata tables.
//! * `GET|POST /edit/{site_id}`: the netCDF form plus the DOI forms. A
//!   successful save rewrites the site info file (with a rolling backup and
//!   an audit row) and commits the DOI metadata file to its Git repository.
//! * `GET /flags/{site_id}`: release flags.
//! * `GET|POST /editflags/{site_id}/{flag_id}`: staff only, `new` adds a flag.
//! * `POST /deleteflags/{site_id}/{flag_id}`: staff only.
//! * `GET /bibtex/entries`, `GET /bibtex/table`: plain-text citations.
//! * `GET /missingperm`: explains why an edit was refused.

pub mod citations;
pub mod doi_forms;
mod flags;
pub mod netcdf_form;
mod pages;
pub mod store;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const BASE_PATH: &str = "/siteinfo";

pub fn configure_routes() -> Scope {
    scope(BASE_PATH)
        .route("/", get().to(pages::list))
        .route("", get().to(pages::list))
        .route("/view/{site_id}", get().to(pages::view))
        .route("/edit/{site_id}", get().to(pages::edit_get))
        .route("/edit/{site_id}", post().to(pages::edit_post))
        .route("/flags/{site_id}", get().to(flags::view))
        .route("/editflags/{site_id}/{flag_id}", get().to(flags::edit_get))
        .route("/editflags/{site_id}/{flag_id}", post().to(flags::edit_post))
        .route("/deleteflags/{site_id}/{flag_id}", get().to(flags::delete_get))
        .route("/deleteflags/{site_id}/{flag_id}", post().to(flags::delete_post))
        .route("/bibtex/entries", get().to(pages::bibtex_entries))
        .route("/bibtex/table", get().to(pages::bibtex_table))
        .route("/missingperm", get().to(pages::missing_permission))
}
