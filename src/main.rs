//! `wss-echo`: TLS-terminated HTTP server echoing WebSocket messages on `/wss`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::builder::BoolishValueParser;
use clap::Parser;

use wss_echo::config::{load_config, validate_config, ConfigError, EchoConfig};
use wss_echo::lifecycle::{shutdown_on_ctrl_c, Shutdown};
use wss_echo::net::{Listener, TrustConfiguration};
use wss_echo::observability::logging;
use wss_echo::HttpServer;

#[derive(Parser)]
#[command(name = "wss-echo")]
#[command(about = "TLS WebSocket echo server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(long)]
    bind: Option<String>,

    /// Server certificate (PEM)
    #[arg(long, env = "CERT_FILE")]
    cert_file: Option<String>,

    /// Server private key (PEM)
    #[arg(long, env = "KEY_FILE")]
    key_file: Option<String>,

    /// Authorities trusted to sign client certificates (PEM)
    #[arg(long)]
    ca_file: Option<String>,

    /// Accept clients without checking their certificate
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    skip_peer_validation: Option<bool>,
}

impl Cli {
    fn into_config(self) -> Result<EchoConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => EchoConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(cert) = self.cert_file {
            config.tls.cert_path = cert;
        }
        if let Some(key) = self.key_file {
            config.tls.key_path = key;
        }
        if self.ca_file.is_some() {
            config.tls.ca_path = self.ca_file;
        }
        if let Some(skip) = self.skip_peer_validation {
            config.tls.skip_peer_validation = skip;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.observability.log_level);

    tracing::info!("wss-echo v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        cert_path = %config.tls.cert_path,
        skip_peer_validation = config.tls.skip_peer_validation,
        "Configuration loaded"
    );

    // Certificates first: never listen with unusable credentials.
    let trust = TrustConfiguration::for_server(&config.tls)?;
    let server = HttpServer::new(&config, &trust)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown_on_ctrl_c(&shutdown).await }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
