pub mod opstat;
pub mod qcform;
pub mod siteinfo;
pub mod static_files;

use crate::config::FeaturesConfig;
use crate::error::Result;
use crate::html;
use actix_web::web::{self, get, ServiceConfig};
use actix_web::HttpResponse;

/// Runs `f` on the blocking thread pool and flattens the two error layers.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await?
}

/// Registers the enabled feature scopes, the static assets and the root
/// redirect.
pub fn configure(cfg: &mut ServiceConfig, features: &FeaturesConfig) {
    if features.site_status {
        cfg.service(opstat::configure_routes());
    }
    if features.site_metadata {
        cfg.service(siteinfo::configure_routes())
            .service(qcform::configure_routes());
    }
    cfg.service(static_files::configure_routes());

    if features.site_status {
        cfg.route("/", get().to(|| async { html::redirect("/opstat/") }));
    } else if features.site_metadata {
        cfg.route("/", get().to(|| async { html::redirect("/siteinfo/") }));
    } else {
        cfg.route("/", get().to(|| async { HttpResponse::NotFound().finish() }));
    }
}
