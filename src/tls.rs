// SPDX-License-Identifier: Apache-2.0
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use std::path::Path;
use tracing::{info, instrument};

use crate::error::ConfigError;

/// Build the TLS acceptor from a PEM private key and certificate chain.
#[instrument(skip_all, fields(key = %key_path.display(), cert = %cert_path.display()))]
pub fn load_acceptor(key_path: &Path, cert_path: &Path) -> Result<SslAcceptorBuilder, ConfigError> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder.set_private_key_file(key_path, SslFiletype::PEM)?;
    builder.set_certificate_chain_file(cert_path)?;
    builder.check_private_key()?;
    info!("TLS material loaded");
    Ok(builder)
}
