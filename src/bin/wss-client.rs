//! `wss-client`: connects to a `wss-echo` server and sends timestamps.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Parser;

use wss_echo::client::{self, TimestampSession};
use wss_echo::config::{load_config, validate_config, ConfigError, EchoConfig};
use wss_echo::net::TrustConfiguration;
use wss_echo::observability::logging;

#[derive(Parser)]
#[command(name = "wss-client")]
#[command(about = "WebSocket client sending periodic timestamps over TLS", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server URL (wss:// or https://)
    #[arg(long, env = "SERVER_ADDRESS")]
    server_address: Option<String>,

    /// Trusted certificate authority (PEM)
    #[arg(long, env = "CERT_FILE")]
    ca_file: Option<String>,

    /// Client certificate presented to the server (PEM)
    #[arg(long, requires = "key_file")]
    cert_file: Option<String>,

    /// Client private key (PEM)
    #[arg(long, requires = "cert_file")]
    key_file: Option<String>,

    /// Accept any server certificate
    #[arg(
        long,
        env = "IGNORE_CERTIFICATE_ISSUES",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    skip_peer_validation: Option<bool>,

    /// Milliseconds between timestamp messages
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<EchoConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => EchoConfig::default(),
        };

        let client = &mut config.client;
        if let Some(address) = self.server_address {
            client.server_address = address;
        }
        if self.ca_file.is_some() {
            client.ca_path = self.ca_file;
        }
        if self.cert_file.is_some() {
            client.cert_path = self.cert_file;
            client.key_path = self.key_file;
        }
        if let Some(skip) = self.skip_peer_validation {
            client.skip_peer_validation = skip;
        }
        if let Some(interval) = self.interval_ms {
            client.interval_ms = interval;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.observability.log_level);

    tracing::info!(
        server_address = %config.client.server_address,
        interval_ms = config.client.interval_ms,
        skip_peer_validation = config.client.skip_peer_validation,
        "wss-client starting"
    );

    let trust = TrustConfiguration::for_client(&config.client)?;
    let session = TimestampSession::new(Duration::from_millis(config.client.interval_ms));

    tokio::select! {
        result = client::run(&config.client, &trust, session) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl+C received"),
    }

    tracing::info!("Session ended");
    Ok(())
}
