//! # QC Review Workflow
//!
//! Reviewers fill in a fixed questionnaire about a batch of a site's netCDF
//! files. Reports can be saved as drafts at any point; submitting validates
//! them. Submitted reports are exported as PDF for the site PI.
//!
//! ## Registered routes (under `/qcform`, trailing slashes optional)
//!
//! * `GET /`: report list, filtered by `reviewer`, `site`,
//!   `modified_after` and `modified_before`.
//! * `GET|POST /edit`, `GET|POST /edit/{id}`: new or existing report. The
//!   posted `action` is `draft` or `submit`.
//! * `POST /delete/{id}`
//! * `GET /makepdf/{id}`: `application/pdf`.
//! * `GET|POST /reviewers/{site}`: staff only, editor and reviewer assignment.

mod form;
mod pages;
mod pdf;
pub mod questions;
pub mod store;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const BASE_PATH: &str = "/qcform";

pub fn configure_routes() -> Scope {
    scope(BASE_PATH)
        .route("/", get().to(pages::list))
        .route("", get().to(pages::list))
        .route("/edit", get().to(pages::new_report))
        .route("/edit", post().to(pages::create_report))
        .route("/edit/{id}", get().to(pages::edit_report))
        .route("/edit/{id}", post().to(pages::update_report))
        .route("/delete/{id}", get().to(pages::delete_get))
        .route("/delete/{id}", post().to(pages::delete_post))
        .route("/makepdf/{id}", get().to(pages::make_pdf))
        .route("/reviewers/{site}", get().to(pages::reviewers_get))
        .route("/reviewers/{site}", post().to(pages::reviewers_post))
}

#[cfg(test)]
mod tests {
    use super::form::testing::clean_post;
    use super::{configure_routes, store};
    use crate::db::testing::add_user;
    use crate::state::testing::test_state;
    use actix_web::http::StatusCode;
    use actix_web::middleware::NormalizePath;
    use actix_web::{test, App};

    fn location(resp: &actix_web::dev::ServiceResponse) -> String {
        resp.headers().get("Location").unwrap().to_str().unwrap().to_string()
    }

    fn with(mut pairs: Vec<(String, String)>, field: &str, value: &str) -> Vec<(String, String)> {
        pairs.retain(|(k, _)| k != field);
        pairs.push((field.to_string(), value.to_string()));
        pairs
    }

    #[actix_web::test]
    async fn draft_submit_and_delete() {
        let (_dir, state) = test_state();
        add_user(&state.db, "josh", false, &[]);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(NormalizePath::trim())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/qcform/edit/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(location(&resp).contains("msg=notloggedin"));

        // A draft with only a site saves without validation.
        let req = test::TestRequest::post()
            .uri("/qcform/edit/")
            .insert_header(("X-Remote-User", "josh"))
            .set_form(vec![("site", "pa"), ("action", "draft")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let loc = location(&resp);
        assert!(loc.starts_with("/qcform/?msg=draft&id="), "{loc}");
        let id: i64 = loc.rsplit('=').next().unwrap().parse().unwrap();

        // Submitting with an issue but no dates re-renders with the error.
        let pairs = with(clean_post(), "action", "submit");
        let bad = with(pairs.clone(), "pres_err_present", "u");
        let req = test::TestRequest::post()
            .uri(&format!("/qcform/edit/{id}/"))
            .insert_header(("X-Remote-User", "josh"))
            .set_form(bad)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("at least one date range is required"));
        {
            let conn = state.db.connect().unwrap();
            assert!(store::get(&conn, id).unwrap().unwrap().is_draft);
        }

        let req = test::TestRequest::post()
            .uri(&format!("/qcform/edit/{id}/"))
            .insert_header(("X-Remote-User", "josh"))
            .set_form(pairs)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), format!("/qcform/?msg=submitted&id={id}"));
        {
            let conn = state.db.connect().unwrap();
            let stored = store::get(&conn, id).unwrap().unwrap();
            assert!(!stored.is_draft);
            assert_eq!(stored.reviewer, "Josh L");
        }

        let req = test::TestRequest::get()
            .uri("/qcform/?site=pa&reviewer=josh")
            .insert_header(("X-Remote-User", "josh"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains(&format!("/qcform/makepdf/{id}/")));
        assert!(body.contains("Submitted"));

        let req = test::TestRequest::get()
            .uri("/qcform/makepdf/9999/")
            .insert_header(("X-Remote-User", "josh"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri(&format!("/qcform/delete/{id}/"))
            .insert_header(("X-Remote-User", "josh"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), format!("/qcform/?msg=deleted&id={id}"));
        let conn = state.db.connect().unwrap();
        assert!(store::get(&conn, id).unwrap().is_none());
    }

    #[actix_web::test]
    async fn unknown_action_is_rejected() {
        let (_dir, state) = test_state();
        add_user(&state.db, "josh", false, &[]);
        let app = test::init_service(App::new().app_data(state.clone()).service(configure_routes())).await;
        let req = test::TestRequest::post()
            .uri("/qcform/edit")
            .insert_header(("X-Remote-User", "josh"))
            .set_form(vec![("site", "pa"), ("action", "publish")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn reviewer_assignment_is_staff_only() {
        let (_dir, state) = test_state();
        add_user(&state.db, "admin", true, &[]);
        for name in ["ed", "r1", "r2"] {
            add_user(&state.db, name, false, &[]);
        }
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(NormalizePath::trim())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/qcform/reviewers/pa/")
            .insert_header(("X-Remote-User", "ed"))
            .set_form(vec![("editor", "ed"), ("reviewer1", "r1"), ("reviewer2", "r2")])
            .to_request();
        assert!(location(&test::call_service(&app, req).await).contains("msg=lackperm"));

        let req = test::TestRequest::post()
            .uri("/qcform/reviewers/pa/")
            .insert_header(("X-Remote-User", "admin"))
            .set_form(vec![("editor", "ed"), ("reviewer1", "r1"), ("reviewer2", "r1")])
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("duplicate reviewer assignments"));

        let req = test::TestRequest::post()
            .uri("/qcform/reviewers/pa/")
            .insert_header(("X-Remote-User", "admin"))
            .set_form(vec![("editor", "ed"), ("reviewer1", "r1"), ("reviewer2", "r2")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/qcform/reviewers/pa/?msg=saved");

        let req = test::TestRequest::get()
            .uri("/qcform/reviewers/pa/?msg=saved")
            .insert_header(("X-Remote-User", "admin"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("Reviewer assignments saved"));
        assert!(body.contains("<option value=\"r2\" selected>"));

        let req = test::TestRequest::get()
            .uri("/qcform/reviewers/zz/")
            .insert_header(("X-Remote-User", "admin"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
