// SPDX-License-Identifier: Apache-2.0
use actix_web::cookie::time::Duration;
use tokengate::auth::{AuthDecision, SessionGate, TOKEN_COOKIE};
use tokengate::config::NumericSetting;
use tokengate::token::Token;

fn gate(token: &str, use_cookies: bool, timeout: NumericSetting) -> SessionGate {
    SessionGate::new(Token::new(token), use_cookies, timeout)
}

#[test]
fn test_query_token_allows() {
    let gate = gate("s3cret", true, NumericSetting::Integer(60));

    for query in ["token=s3cret", "a=1&token=s3cret", "token=s3cret&b=2"] {
        let outcome = gate.evaluate(None, query);
        assert_eq!(outcome.decision, AuthDecision::Allow, "query {query}");
    }
}

#[test]
fn test_wrong_or_missing_token_denies() {
    let gate = gate("s3cret", true, NumericSetting::Integer(60));

    for query in ["", "token=nope", "token=", "token=s3cre", "tok=s3cret", "token=s3cret&token=s3cret"] {
        let outcome = gate.evaluate(None, query);
        assert_eq!(outcome.decision, AuthDecision::Deny, "query {query}");
        assert!(outcome.cookie.is_none());
    }

    let outcome = gate.evaluate(Some("stale"), "token=nope");
    assert_eq!(outcome.decision, AuthDecision::Deny);
}

#[test]
fn test_url_encoded_query_token() {
    let gate = gate("a b&c", false, NumericSetting::Disabled);
    assert_eq!(gate.evaluate(None, "token=a%20b%26c").decision, AuthDecision::Allow);
}

#[test]
fn test_empty_token_disables_auth() {
    let gate = gate("", true, NumericSetting::Integer(60));

    for (cookie, query) in [(None, ""), (Some("x"), "token=y"), (None, "token=")] {
        let outcome = gate.evaluate(cookie, query);
        assert_eq!(outcome.decision, AuthDecision::Allow);
        assert!(outcome.cookie.is_none(), "no cookie work when auth is disabled");
    }
}

#[test]
fn test_query_token_issues_cookie() {
    let gate = gate("s3cret", true, NumericSetting::Integer(60));

    let cookie = gate.evaluate(None, "token=s3cret").cookie.expect("cookie issued");
    assert_eq!(cookie.name(), TOKEN_COOKIE);
    assert_eq!(cookie.value(), "s3cret");
    assert_eq!(cookie.max_age(), Some(Duration::seconds(60)));
    assert_eq!(cookie.path(), Some("/"));
}

#[test]
fn test_issued_cookie_round_trip() {
    let gate = gate("s3cret", true, NumericSetting::Integer(60));

    let cookie = gate.evaluate(None, "token=s3cret").cookie.expect("cookie issued");
    let outcome = gate.evaluate(Some(cookie.value()), "");

    assert_eq!(outcome.decision, AuthDecision::Allow);
    // The cookie is re-issued to restart the expiry window
    let refreshed = outcome.cookie.expect("cookie refreshed");
    assert_eq!(refreshed.max_age(), Some(Duration::seconds(60)));
}

#[test]
fn test_no_max_age_without_positive_timeout() {
    for timeout in [
        NumericSetting::Integer(0),
        NumericSetting::Disabled,
        NumericSetting::Raw("later".into()),
    ] {
        let gate = gate("s3cret", true, timeout);
        let cookie = gate.evaluate(None, "token=s3cret").cookie.expect("cookie issued");
        assert_eq!(cookie.max_age(), None);
    }
}

#[test]
fn test_cookies_disabled_only_query_counts() {
    let gate = gate("s3cret", false, NumericSetting::Integer(60));

    // A correct cookie is ignored
    let outcome = gate.evaluate(Some("s3cret"), "");
    assert_eq!(outcome.decision, AuthDecision::Deny);

    // The query token works on every request, without a cookie being set
    for _ in 0..3 {
        let outcome = gate.evaluate(None, "token=s3cret");
        assert_eq!(outcome.decision, AuthDecision::Allow);
        assert!(outcome.cookie.is_none());
    }
}

#[test]
fn test_token_resolution() {
    assert_eq!(Token::resolve(Some("given".into())).as_str(), "given");
    assert!(Token::resolve(Some(String::new())).is_disabled());

    let generated = Token::resolve(None);
    assert_eq!(generated.as_str().len(), 32);
    assert!(generated.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(generated, Token::generate());
}

#[test]
fn test_token_debug_is_redacted() {
    let token = Token::new("s3cret");
    assert!(!format!("{:?}", token).contains("s3cret"));
    assert!(token.matches("s3cret"));
    assert!(!token.matches("s3cret "));
}

#[test]
fn test_token_comparison() {
    let token = Token::new("s3cret");

    assert!(token.matches("s3cret"));
    assert!(!token.matches("s3creT"));
    assert!(!token.matches("s3cre"));
    assert!(!token.matches("s3crets"));
    assert!(!token.matches(""));
    assert!(Token::new("").matches(""));
}
