// SPDX-License-Identifier: Apache-2.0
use actix_files::NamedFile;
use actix_web::{http::header, HttpRequest, HttpResponse};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::config::{Configuration, FallbackPolicy};
use crate::error::StaticFileError;

/// Where unresolvable static requests are sent
pub const LOGIN_PAGE: &str = "/login.html";

const LOGIN_FORM: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Authentication required</title>
</head>
<body>
    <form method="get">
        <label for="token">Token</label>
        <input type="password" id="token" name="token" autofocus>
        <input type="submit" value="Access">
    </form>
</body>
</html>
"#;

/// Response strategy for denied requests.
#[derive(Debug, Clone)]
pub struct Fallback {
    policy: FallbackPolicy,
    static_folder: PathBuf,
}

impl Fallback {
    pub fn new(policy: FallbackPolicy, static_folder: impl Into<PathBuf>) -> Self {
        Self { policy, static_folder: static_folder.into() }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.fallback, config.static_folder.clone())
    }

    pub async fn respond(&self, req: &HttpRequest) -> Result<HttpResponse, StaticFileError> {
        match self.policy {
            FallbackPolicy::StaticFallback => serve_static(&self.static_folder, req).await,
            FallbackPolicy::LoginForm => Ok(login_form()),
            FallbackPolicy::Reject => Ok(unauthorized()),
        }
    }
}

pub fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .body("Unauthorized")
}

pub fn login_form() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::CONTENT_TYPE, "text/html"))
        .body(LOGIN_FORM)
}

fn redirect_to_login() -> HttpResponse {
    HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, LOGIN_PAGE))
        .finish()
}

/// Serve the file under `folder` matching the request path. Missing files and
/// directories redirect to the login page.
#[instrument(skip(req), fields(path = %req.path()))]
async fn serve_static(folder: &Path, req: &HttpRequest) -> Result<HttpResponse, StaticFileError> {
    let Some(path) = resolve_static_path(folder, req.path()) else {
        warn!("Rejected static path outside the folder");
        return Ok(redirect_to_login());
    };

    let file = match NamedFile::open_async(&path).await {
        Ok(file) => file,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            debug!(file = %path.display(), "No such static file");
            return Ok(redirect_to_login());
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to open static file");
            return Err(StaticFileError::Read(e));
        }
    };

    if file.metadata().is_dir() {
        return Ok(redirect_to_login());
    }

    Ok(file
        .set_content_type(content_type_for(&path))
        .prefer_utf8(false)
        .disable_content_disposition()
        .into_response(req))
}

/// Join the request path onto `folder`, refusing `..` segments.
pub fn resolve_static_path(folder: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = folder.to_path_buf();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') => return None,
            s => resolved.push(s),
        }
    }
    Some(resolved)
}

pub fn content_type_for(path: &Path) -> mime::Mime {
    let essence = match path.extension().and_then(|e| e.to_str()) {
        Some("ico") => "image/x-icon",
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        _ => "text/plain",
    };
    essence.parse().unwrap_or(mime::TEXT_PLAIN)
}
