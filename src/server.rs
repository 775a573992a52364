// SPDX-License-Identifier: Apache-2.0
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web, App, HttpServer,
};
use std::net::SocketAddr;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::auth::SessionGate;
use crate::config::Configuration;
use crate::dispatch::dispatch;
use crate::error::ConfigError;
use crate::fallback::Fallback;
use crate::middleware::SessionGateMiddleware;
use crate::proxy::Upstream;
use crate::tls;

/// The gateway application: gate middleware in front of the dispatch router.
pub fn gateway_app(
    gate: SessionGate,
    upstream: Upstream,
    fallback: web::Data<Fallback>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(upstream))
        .app_data(fallback)
        .wrap(SessionGateMiddleware::new(gate))
        .wrap(TracingLogger::default())
        .default_service(web::to(dispatch))
}

/// Bind the listener (with TLS when configured) and serve until shutdown.
pub async fn run(config: Configuration) -> Result<(), ConfigError> {
    let listen_port = config.listen_port()?;
    let upstream_port = config.upstream_port()?;
    let listen_host = config.listen.host.clone();
    let upstream_host = config.upstream.host.clone();

    let gate = SessionGate::from_config(&config);
    let fallback = web::Data::new(Fallback::from_config(&config));

    let server = HttpServer::new(move || {
        gateway_app(gate.clone(), Upstream::new(&upstream_host, upstream_port), fallback.clone())
    });

    let server = if config.use_tls {
        let acceptor = tls::load_acceptor(&config.key_path, &config.cert_path)?;
        server.bind_openssl((listen_host.as_str(), listen_port), acceptor)?
    } else {
        server.bind((listen_host.as_str(), listen_port))?
    };

    announce(&config, &server.addrs());
    server.run().await?;
    Ok(())
}

fn announce(config: &Configuration, addrs: &[SocketAddr]) {
    let scheme = if config.use_tls { "https" } else { "http" };

    println!("redirecting to {}", config.upstream);
    for addr in addrs {
        println!("access url: {}://{}:{}?token={}", scheme, addr.ip(), addr.port(), config.token);
    }
    println!("token: {}", config.token);
    println!("use cookies: {}", config.use_cookies);
    if let Some(expiry) = config.session_timeout.positive() {
        println!("expiration: {}", expiry);
    }

    info!(
        upstream = %config.upstream,
        listen = ?addrs,
        tls = config.use_tls,
        use_cookies = config.use_cookies,
        fallback = ?config.fallback,
        "Gateway listening"
    );
}
