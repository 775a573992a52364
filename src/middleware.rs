// SPDX-License-Identifier: Apache-2.0
use actix_web::{dev::{Service, ServiceRequest, ServiceResponse, Transform}, Error, HttpMessage};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::task::{Context, Poll};
use tracing::{info, warn, debug, instrument};
use std::rc::Rc;

use crate::auth::{AuthDecision, SessionGate, TOKEN_COOKIE};

/// Runs the [`SessionGate`] on every request, leaves the decision in the
/// request extensions and attaches the issued cookie to the response.
pub struct SessionGateMiddleware {
    gate: Rc<SessionGate>,
}

impl SessionGateMiddleware {
    pub fn new(gate: SessionGate) -> Self {
        SessionGateMiddleware { gate: Rc::new(gate) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGateMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionGateService {
            service: Rc::new(service),
            gate: Rc::clone(&self.gate),
        })
    }
}

pub struct SessionGateService<S> {
    service: Rc<S>,
    gate: Rc<SessionGate>,
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    #[instrument(name = "gate_middleware", skip(self, req), fields(path = %req.path(), method = %req.method()))]
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let upgrade = req.head().upgrade();

        let stored_token = req.cookie(TOKEN_COOKIE).map(|c| c.value().to_owned());
        let outcome = self.gate.evaluate(stored_token.as_deref(), req.query_string());
        req.extensions_mut().insert(outcome.decision);

        match outcome.decision {
            AuthDecision::Allow => debug!(upgrade, "Request allowed"),
            AuthDecision::Deny => info!(upgrade, "Request denied, applying fallback"),
        }

        // A protocol switch has no ordinary response to carry a cookie
        let cookie = if upgrade { None } else { outcome.cookie };

        Box::pin(async move {
            let mut res = service.call(req).await?;
            if let Some(cookie) = cookie {
                if let Err(e) = res.response_mut().add_cookie(&cookie) {
                    warn!(error = %e, "Failed to attach session cookie");
                }
            }
            Ok(res)
        })
    }
}
