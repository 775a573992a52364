// SPDX-License-Identifier: Apache-2.0
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use tokengate::config::Configuration;
use tokengate::error::ConfigError;
use tokengate::{logging, server};

/// Token-gated reverse proxy for an HTTP/WebSocket service
#[derive(Parser, Debug)]
#[command(name = "tokengate", version, about)]
struct Cli {
    /// `<target>` alone, or `<listen> <target>`, each as host:port
    #[arg(value_name = "ADDR")]
    addresses: Vec<String>,
}

#[actix_web::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    if let Err(e) = logging::init_from_env("tokengate") {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    let cli = Cli::parse();

    let config = match Configuration::from_env(&cli.addresses) {
        Ok(config) => config,
        Err(e @ ConfigError::Usage { .. }) => {
            eprintln!("{}", e);
            return ExitCode::from(255);
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tokengate stopped with an error");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
