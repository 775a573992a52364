// SPDX-License-Identifier: Apache-2.0
use actix_web::{web, Error, HttpMessage, HttpRequest, HttpResponse};
use tracing::debug;

use crate::auth::AuthDecision;
use crate::fallback::{unauthorized, Fallback};
use crate::proxy::Upstream;

/// Default service: forward what the gate allowed, hand the rest to the fallback.
pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    upstream: web::Data<Upstream>,
    fallback: web::Data<Fallback>,
) -> Result<HttpResponse, Error> {
    // Without a recorded decision the gate never ran; treat it as a denial
    let decision = req
        .extensions()
        .get::<AuthDecision>()
        .copied()
        .unwrap_or(AuthDecision::Deny);
    let upgrade = req.head().upgrade();

    match (decision, upgrade) {
        (AuthDecision::Allow, true) => upstream.forward_websocket(req, payload).await,
        (AuthDecision::Allow, false) => Ok(upstream.forward_http(req, payload).await?),
        (AuthDecision::Deny, true) => {
            debug!("Refusing unauthenticated upgrade");
            Ok(unauthorized())
        }
        (AuthDecision::Deny, false) => Ok(fallback.respond(&req).await?),
    }
}
