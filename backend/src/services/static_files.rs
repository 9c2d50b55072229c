//! Stylesheet and scripts compiled into the binary.

use actix_web::web::{get, scope, Path};
use actix_web::{HttpResponse, Scope};
use include_dir::{include_dir, Dir};
use mime_guess::from_path;

static STATIC_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/static");

const BASE_PATH: &str = "/static";

pub fn configure_routes() -> Scope {
    scope(BASE_PATH).route("/{file:.*}", get().to(serve_embedded))
}

async fn serve_embedded(file: Path<String>) -> HttpResponse {
    let file_path = file.into_inner();
    match STATIC_DIR.get_file(&file_path) {
        Some(file) => {
            let mime = from_path(&file_path).first_or_octet_stream();
            HttpResponse::Ok()
                .content_type(mime.as_ref())
                .insert_header(("Cache-Control", "public, max-age=3600"))
                .body(file.contents().to_vec())
        }
        None => {
            log::debug!("No embedded asset named {}", file_path);
            HttpResponse::NotFound().body("Not Found")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn serves_embedded_assets_with_mime_type() {
        let app = test::init_service(App::new().service(configure_routes())).await;

        let req = test::TestRequest::get().uri("/static/portal.css").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/css"));

        let req = test::TestRequest::get().uri("/static/formset.js").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("__prefix__"));
    }

    #[actix_web::test]
    async fn unknown_asset_is_not_found() {
        let app = test::init_service(App::new().service(configure_routes())).await;
        let req = test::TestRequest::get().uri("/static/missing.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
