// SPDX-License-Identifier: Apache-2.0
use actix_web::test::{call_service, init_service, read_body, TestRequest};
use actix_web::{http::{header, StatusCode}, web};
use std::fs;
use std::path::Path;
use tokengate::auth::SessionGate;
use tokengate::config::{FallbackPolicy, NumericSetting};
use tokengate::fallback::{content_type_for, resolve_static_path, Fallback, LOGIN_PAGE};
use tokengate::proxy::Upstream;
use tokengate::server::gateway_app;
use tokengate::token::Token;

fn static_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("login.html"), "<html>login</html>").unwrap();
    fs::write(dir.path().join("data.json"), r#"{"ok":true}"#).unwrap();
    fs::write(dir.path().join("notes.xyz"), "plain words").unwrap();
    fs::create_dir(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets").join("site.css"), "body{}").unwrap();
    dir
}

macro_rules! static_gateway {
    ($folder:expr) => {
        init_service(gateway_app(
            SessionGate::new(Token::new("s3cret"), true, NumericSetting::Integer(60)),
            // Port 9 (discard) is never reached: every request here is denied
            Upstream::new("127.0.0.1", 9),
            web::Data::new(Fallback::new(FallbackPolicy::StaticFallback, $folder)),
        ))
        .await
    };
}

#[actix_web::test]
async fn test_existing_json_file_is_served() {
    let folder = static_folder();
    let app = static_gateway!(folder.path());

    let req = TestRequest::get().uri("/data.json").to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
    let body = read_body(resp).await;
    assert_eq!(body, r#"{"ok":true}"#);
}

#[actix_web::test]
async fn test_nested_file_and_unknown_extension() {
    let folder = static_folder();
    let app = static_gateway!(folder.path());

    let req = TestRequest::get().uri("/assets/site.css").to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/css");

    let req = TestRequest::get().uri("/notes.xyz").to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
}

#[actix_web::test]
async fn test_missing_file_redirects_to_login() {
    let folder = static_folder();
    let app = static_gateway!(folder.path());

    let req = TestRequest::get().uri("/nothing/here.html").to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), LOGIN_PAGE);
}

#[actix_web::test]
async fn test_directory_redirects_to_login() {
    let folder = static_folder();
    let app = static_gateway!(folder.path());

    for uri in ["/", "/assets", "/assets/"] {
        let req = TestRequest::get().uri(uri).to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY, "uri {uri}");
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), LOGIN_PAGE);
    }
}

#[actix_web::test]
async fn test_login_page_is_reachable_while_denied() {
    let folder = static_folder();
    let app = static_gateway!(folder.path());

    let req = TestRequest::get().uri("/login.html").to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/html");
}

#[actix_web::test]
async fn test_unreadable_file_is_500() {
    let folder = static_folder();
    // Opening a self-referencing symlink fails with ELOOP, which is neither
    // a missing file nor a directory
    std::os::unix::fs::symlink("loop", folder.path().join("loop")).unwrap();
    let app = static_gateway!(folder.path());

    let req = TestRequest::get().uri("/loop").to_request();
    let resp = call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::LOCATION).is_none());
    let body = read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.starts_with("Error getting the file:"), "body {body}");

    // Other files are still served afterwards
    let req = TestRequest::get().uri("/data.json").to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn test_parent_segments_are_refused() {
    let folder = Path::new("/srv/static");

    assert_eq!(resolve_static_path(folder, "/../etc/passwd"), None);
    assert_eq!(resolve_static_path(folder, "/a/../../b"), None);
    assert_eq!(
        resolve_static_path(folder, "/a/./b.txt"),
        Some(Path::new("/srv/static/a/b.txt").to_path_buf())
    );
    assert_eq!(resolve_static_path(folder, "/"), Some(folder.to_path_buf()));
}

#[test]
fn test_content_type_table() {
    assert_eq!(content_type_for(Path::new("x.ico")).as_ref(), "image/x-icon");
    assert_eq!(content_type_for(Path::new("x.js")).as_ref(), "text/javascript");
    assert_eq!(content_type_for(Path::new("x.svg")).as_ref(), "image/svg+xml");
    assert_eq!(content_type_for(Path::new("x.doc")).as_ref(), "application/msword");
    assert_eq!(content_type_for(Path::new("Makefile")).as_ref(), "text/plain");
}
