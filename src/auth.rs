// SPDX-License-Identifier: Apache-2.0
use actix_web::cookie::{time::Duration, Cookie};
use actix_web::web;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::{Configuration, NumericSetting};
use crate::token::Token;

/// Name of the cookie that remembers the token
pub const TOKEN_COOKIE: &str = "token";

/// Per-request verdict of the gate, stored in the request extensions for the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
}

/// The decision plus the cookie to attach to the response, if any.
#[derive(Debug)]
pub struct GateOutcome {
    pub decision: AuthDecision,
    pub cookie: Option<Cookie<'static>>,
}

impl GateOutcome {
    fn allow(cookie: Option<Cookie<'static>>) -> Self {
        Self { decision: AuthDecision::Allow, cookie }
    }

    fn deny() -> Self {
        Self { decision: AuthDecision::Deny, cookie: None }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionGate {
    token: Token,
    use_cookies: bool,
    session_timeout: NumericSetting,
}

impl SessionGate {
    pub fn new(token: Token, use_cookies: bool, session_timeout: NumericSetting) -> Self {
        Self { token, use_cookies, session_timeout }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.token.clone(), config.use_cookies, config.session_timeout.clone())
    }

    /// Decide whether a request may pass.
    ///
    /// `stored_token` is the value of the `token` cookie, `query` the raw
    /// query string. A matching cookie or `?token=` both allow, and with
    /// cookies enabled either way yields a freshly issued cookie.
    #[instrument(name = "session_gate", skip_all, fields(has_cookie = stored_token.is_some()))]
    pub fn evaluate(&self, stored_token: Option<&str>, query: &str) -> GateOutcome {
        if self.token.is_disabled() {
            return GateOutcome::allow(None);
        }

        if self.use_cookies && stored_token.is_some_and(|t| self.token.matches(t)) {
            debug!("Token cookie accepted");
            return GateOutcome::allow(Some(self.session_cookie()));
        }

        match query_token(query) {
            Some(candidate) if self.token.matches(&candidate) => {
                debug!("Query token accepted");
                GateOutcome::allow(self.use_cookies.then(|| self.session_cookie()))
            }
            _ => GateOutcome::deny(),
        }
    }

    /// `token=<secret>`, with `Max-Age` only when the session timeout is positive.
    pub fn session_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build(TOKEN_COOKIE, self.token.as_str().to_owned())
            .path("/")
            .http_only(true);
        if let Some(seconds) = self.session_timeout.positive() {
            builder = builder.max_age(Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX)));
        }
        builder.finish()
    }
}

fn query_token(query: &str) -> Option<String> {
    web::Query::<TokenQuery>::from_query(query)
        .ok()
        .and_then(|q| q.into_inner().token)
}
