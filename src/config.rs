// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::token::Token;

/// Environment variable names recognised by the resolver
pub const SECURE_ENV: &str = "secure";
pub const TOKEN_ENV: &str = "token";
pub const KEY_ENV: &str = "key";
pub const CERT_ENV: &str = "cert";
pub const USE_COOKIES_ENV: &str = "usecookies";
pub const SESSION_TIMEOUT_ENV: &str = "sessiontimeout";
pub const STATIC_SERVER_ENV: &str = "staticserver";
pub const STATIC_FOLDER_ENV: &str = "staticfolder";
pub const FALLBACK_ENV: &str = "fallback";
pub const ADDRESS_ENV: &str = "address";
pub const PORT_ENV: &str = "port";
pub const SERVER_ENV: &str = "server";
pub const TARGET_ENV: &str = "target";

pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: &str = "10000";
pub const DEFAULT_TARGET_HOST: &str = "localhost";
pub const DEFAULT_TARGET_PORT: &str = "3000";
const DEFAULT_SESSION_TIMEOUT: &str = "60";
const DEFAULT_KEY_FILE: &str = "./server.key";
const DEFAULT_CERT_FILE: &str = "./server.crt";
const DEFAULT_STATIC_FOLDER: &str = "./static";

/// Outcome of normalizing a numeric setting.
///
/// A value whose leading characters form a non-negative integer becomes
/// `Integer`, a negative integer becomes `Disabled`, and anything that does
/// not start with digits is kept verbatim as `Raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericSetting {
    Integer(u64),
    Raw(String),
    Disabled,
}

impl NumericSetting {
    pub fn normalize(value: &str) -> Self {
        match parse_leading_integer(value) {
            None => NumericSetting::Raw(value.to_string()),
            Some(n) if n < 0 => NumericSetting::Disabled,
            Some(n) => NumericSetting::Integer(n.unsigned_abs()),
        }
    }

    /// The value when it is an integer greater than zero.
    pub fn positive(&self) -> Option<u64> {
        match self {
            NumericSetting::Integer(n) if *n > 0 => Some(*n),
            NumericSetting::Integer(_) | NumericSetting::Raw(_) | NumericSetting::Disabled => None,
        }
    }

    /// Interpret the setting as a TCP port.
    pub fn to_port(&self, field: &'static str) -> Result<u16, ConfigError> {
        match self {
            NumericSetting::Integer(n) => u16::try_from(*n).map_err(|_| ConfigError::InvalidPort {
                field,
                value: n.to_string(),
            }),
            NumericSetting::Raw(raw) => Err(ConfigError::InvalidPort { field, value: raw.clone() }),
            NumericSetting::Disabled => Err(ConfigError::InvalidPort { field, value: "false".into() }),
        }
    }
}

impl fmt::Display for NumericSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericSetting::Integer(n) => write!(f, "{}", n),
            NumericSetting::Raw(raw) => f.write_str(raw),
            NumericSetting::Disabled => f.write_str("false"),
        }
    }
}

// Leading whitespace, an optional sign, then at least one digit. Trailing
// garbage after the digits is ignored.
fn parse_leading_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// A `host:port` pair with defaults applied to the empty parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: NumericSetting,
}

impl HostPort {
    pub fn parse(spec: &str, default_host: &str, default_port: &str) -> Self {
        let mut parts = spec.split(':');
        let host = parts.next().filter(|h| !h.is_empty()).unwrap_or(default_host);
        let port = parts.next().filter(|p| !p.is_empty()).unwrap_or(default_port);
        Self {
            host: host.to_string(),
            port: NumericSetting::normalize(port),
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What to do with a request the gate denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Serve a file from the static folder, redirecting to `/login.html` when
    /// nothing matches.
    StaticFallback,
    /// 401 with an inline form to resubmit the token.
    LoginForm,
    /// 401 with a plain `Unauthorized` body.
    Reject,
}

impl FallbackPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "static" => Some(FallbackPolicy::StaticFallback),
            "login" => Some(FallbackPolicy::LoginForm),
            "reject" => Some(FallbackPolicy::Reject),
            _ => None,
        }
    }
}

/// Gateway configuration, resolved once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub listen: HostPort,
    pub upstream: HostPort,
    pub use_tls: bool,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub token: Token,
    pub use_cookies: bool,
    pub session_timeout: NumericSetting,
    pub fallback: FallbackPolicy,
    pub static_folder: PathBuf,
}

impl Configuration {
    /// Resolve from the process environment and the given positional arguments.
    pub fn from_env(args: &[String]) -> Result<Self, ConfigError> {
        Self::resolve(|name| std::env::var(name).ok(), args)
    }

    /// Resolve from defaults, then `lookup`, then positional arguments.
    ///
    /// No arguments keeps the environment. One argument replaces the upstream
    /// target. Two arguments replace the listen address and the target, in
    /// that order. Any other count is a usage error.
    #[instrument(skip(lookup))]
    pub fn resolve<F>(lookup: F, args: &[String]) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (listen_arg, target_arg) = match args {
            [] => (None, None),
            [target] => (None, Some(target.as_str())),
            [listen, target] => (Some(listen.as_str()), Some(target.as_str())),
            _ => return Err(ConfigError::Usage { given: args.len() }),
        };

        // An empty value counts as unset
        let setting = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let flag = |name: &str, default: bool| {
            setting(name).map_or(default, |v| v == "true" || v == "1")
        };

        let listen_spec = match listen_arg {
            Some(arg) => arg.to_string(),
            None => setting(SERVER_ENV).unwrap_or_else(|| {
                format!(
                    "{}:{}",
                    setting(ADDRESS_ENV).as_deref().unwrap_or(DEFAULT_LISTEN_HOST),
                    setting(PORT_ENV).as_deref().unwrap_or(DEFAULT_LISTEN_PORT),
                )
            }),
        };
        let target_spec = match target_arg {
            Some(arg) => arg.to_string(),
            None => setting(TARGET_ENV).unwrap_or_else(|| format!("{}:{}", DEFAULT_TARGET_HOST, DEFAULT_TARGET_PORT)),
        };

        let static_server = flag(STATIC_SERVER_ENV, true);
        let fallback = setting(FALLBACK_ENV)
            .and_then(|name| FallbackPolicy::from_name(&name))
            .unwrap_or(if static_server {
                FallbackPolicy::StaticFallback
            } else {
                FallbackPolicy::Reject
            });

        let config = Self {
            listen: HostPort::parse(&listen_spec, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT),
            upstream: HostPort::parse(&target_spec, DEFAULT_TARGET_HOST, DEFAULT_TARGET_PORT),
            use_tls: flag(SECURE_ENV, false),
            key_path: setting(KEY_ENV).unwrap_or_else(|| DEFAULT_KEY_FILE.into()).into(),
            cert_path: setting(CERT_ENV).unwrap_or_else(|| DEFAULT_CERT_FILE.into()).into(),
            // An explicitly empty token is meaningful, so no empty filtering here
            token: Token::resolve(lookup(TOKEN_ENV)),
            use_cookies: flag(USE_COOKIES_ENV, true),
            session_timeout: NumericSetting::normalize(
                setting(SESSION_TIMEOUT_ENV).as_deref().unwrap_or(DEFAULT_SESSION_TIMEOUT),
            ),
            fallback,
            static_folder: setting(STATIC_FOLDER_ENV).unwrap_or_else(|| DEFAULT_STATIC_FOLDER.into()).into(),
        };

        debug!(
            listen = %config.listen,
            upstream = %config.upstream,
            use_tls = config.use_tls,
            use_cookies = config.use_cookies,
            session_timeout = %config.session_timeout,
            fallback = ?config.fallback,
            auth_disabled = config.token.is_disabled(),
            "Configuration resolved"
        );

        Ok(config)
    }

    pub fn listen_port(&self) -> Result<u16, ConfigError> {
        self.listen.port.to_port("listen")
    }

    pub fn upstream_port(&self) -> Result<u16, ConfigError> {
        self.upstream.port.to_port("target")
    }

    pub fn static_fallback_enabled(&self) -> bool {
        self.fallback == FallbackPolicy::StaticFallback
    }
}
