// SPDX-License-Identifier: Apache-2.0
use std::env;
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry,
};

/// Selects the JSON formatter when set to `json`
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

fn env_filter(default_filter: String) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env::var("RUST_LOG").unwrap_or(default_filter)))
}

/// Install the Bunyan (JSON) subscriber, writing to `sink`.
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing<Sink>(name: &str, sink: Sink) -> Result<(), tracing::subscriber::SetGlobalDefaultError>
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    // Skip setting LogTracer if it's already been set
    let _ = LogTracer::init();

    let formatting_layer = BunyanFormattingLayer::new(name.into(), sink);

    let subscriber = Registry::default()
        .with(env_filter(format!("{}=info,actix_web=info", name)))
        .with(JsonStorageLayer)
        .with(formatting_layer);

    set_global_default(subscriber)?;
    tracing::info!("Tracing initialized with Bunyan formatter");
    Ok(())
}

/// Install a readable console subscriber for interactive use.
pub fn init_console_tracing() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let _ = LogTracer::init();

    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(env_filter("tokengate=info,actix_web=info".into()))
        .finish();

    set_global_default(subscriber)?;
    tracing::info!("Console tracing initialized");
    Ok(())
}

/// Pick the subscriber according to `LOG_FORMAT`.
pub fn init_from_env(name: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    match env::var(LOG_FORMAT_ENV) {
        Ok(format) if format.eq_ignore_ascii_case("json") => init_tracing(name, std::io::stdout),
        _ => init_console_tracing(),
    }
}
