//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Load certificate chains, private keys and trust stores from PEM files
//! - Build the server `ServerConfig` (optionally requiring client certificates)
//! - Build the client `ClientConfig` (custom roots or no verification at all)
//! - Classify handshake failures caused by untrusted peers

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{ring, CryptoProvider},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    server::WebPkiClientVerifier,
    ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme,
};

use crate::config::{ClientConfig as ClientSettings, TlsConfig};

/// Errors raised while loading certificates or building TLS configs.
///
/// These are fatal at startup: the server must not listen with unusable
/// credentials.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("A server certificate and key are required")]
    MissingIdentity,

    #[error("Peer validation is enabled but no trusted authorities are configured")]
    EmptyTrustStore,

    #[error("Invalid trusted authority: {0}")]
    TrustAnchor(rustls::Error),

    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("Failed to build client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}

/// A certificate chain and the private key that signs for it.
#[derive(Debug)]
pub struct Identity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl Identity {
    /// Load an identity from PEM-encoded certificate and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, CertificateError> {
        Ok(Self {
            cert_chain: load_certs(cert_path)?,
            key: load_private_key(key_path)?,
        })
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

/// Credentials and trust settings loaded once at startup.
///
/// Read-only after construction; shared by reference (or `Arc`) between all
/// connections.
#[derive(Debug, Clone)]
pub struct TrustConfiguration {
    /// Our own certificate chain and key. Required for servers.
    pub identity: Option<Identity>,
    /// Authorities accepted as issuers of the peer certificate.
    pub trusted_authorities: Vec<CertificateDer<'static>>,
    /// Accept peers without verifying their certificate chain.
    pub skip_peer_validation: bool,
}

impl TrustConfiguration {
    /// Load the server side trust configuration.
    pub fn for_server(config: &TlsConfig) -> Result<Self, CertificateError> {
        let identity = Identity::from_pem_files(
            Path::new(&config.cert_path),
            Path::new(&config.key_path),
        )?;
        let trusted_authorities = match &config.ca_path {
            Some(path) => load_certs(Path::new(path))?,
            None => Vec::new(),
        };

        Ok(Self {
            identity: Some(identity),
            trusted_authorities,
            skip_peer_validation: config.skip_peer_validation,
        })
    }

    /// Load the client side trust configuration.
    ///
    /// The CA file is only read when peer validation is enabled.
    pub fn for_client(config: &ClientSettings) -> Result<Self, CertificateError> {
        let identity = match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => {
                Some(Identity::from_pem_files(Path::new(cert), Path::new(key))?)
            }
            _ => None,
        };
        let trusted_authorities = match (&config.ca_path, config.skip_peer_validation) {
            (Some(path), false) => load_certs(Path::new(path))?,
            _ => Vec::new(),
        };

        Ok(Self {
            identity,
            trusted_authorities,
            skip_peer_validation: config.skip_peer_validation,
        })
    }

    fn root_store(&self) -> Result<RootCertStore, CertificateError> {
        if self.trusted_authorities.is_empty() {
            return Err(CertificateError::EmptyTrustStore);
        }
        let mut roots = RootCertStore::empty();
        for cert in &self.trusted_authorities {
            roots
                .add(cert.clone())
                .map_err(CertificateError::TrustAnchor)?;
        }
        Ok(roots)
    }

    /// Build the rustls server config.
    ///
    /// When peer validation is enabled every client must present a
    /// certificate issued by one of the trusted authorities.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, CertificateError> {
        let identity = self
            .identity
            .clone()
            .ok_or(CertificateError::MissingIdentity)?;
        let provider = crypto_provider();

        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let builder = if self.skip_peer_validation {
            builder.with_no_client_auth()
        } else {
            let verifier =
                WebPkiClientVerifier::builder_with_provider(Arc::new(self.root_store()?), provider)
                    .build()?;
            builder.with_client_cert_verifier(verifier)
        };

        let mut config = builder.with_single_cert(identity.cert_chain, identity.key)?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Arc::new(config))
    }

    /// Build the rustls client config.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, CertificateError> {
        let provider = crypto_provider();
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let builder = if self.skip_peer_validation {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureVerifier(provider)))
        } else {
            builder.with_root_certificates(self.root_store()?)
        };

        let config = match self.identity.clone() {
            Some(identity) => builder.with_client_auth_cert(identity.cert_chain, identity.key)?,
            None => builder.with_no_client_auth(),
        };
        Ok(Arc::new(config))
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Load every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CertificateError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(CertificateError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Load the first private key (PKCS#8, PKCS#1 or SEC1) from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, CertificateError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| CertificateError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CertificateError::NoPrivateKey(path.to_path_buf()))
}

fn open(path: &Path) -> Result<BufReader<File>, CertificateError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CertificateError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Returns the rustls error behind a failed handshake when the failure was
/// caused by the peer's certificate.
pub fn peer_validation_failure(err: &std::io::Error) -> Option<&rustls::Error> {
    let tls_error = err.get_ref()?.downcast_ref::<rustls::Error>()?;
    match tls_error {
        rustls::Error::InvalidCertificate(_)
        | rustls::Error::NoCertificatesPresented
        | rustls::Error::AlertReceived(rustls::AlertDescription::BadCertificate)
        | rustls::Error::AlertReceived(rustls::AlertDescription::CertificateUnknown)
        | rustls::Error::AlertReceived(rustls::AlertDescription::UnknownCA)
        | rustls::Error::AlertReceived(rustls::AlertDescription::CertificateRequired) => {
            Some(tls_error)
        }
        _ => None,
    }
}

/// Server certificate verifier that accepts anything.
///
/// Signatures are still checked so the handshake itself stays sound.
#[derive(Debug)]
struct InsecureVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn server_settings(skip_peer_validation: bool) -> TlsConfig {
        TlsConfig {
            cert_path: fixture("server.pem"),
            key_path: fixture("server.key"),
            ca_path: Some(fixture("ca.pem")),
            skip_peer_validation,
        }
    }

    #[test]
    fn loads_server_identity() {
        let trust = TrustConfiguration::for_server(&server_settings(true)).unwrap();
        assert_eq!(trust.identity.as_ref().unwrap().cert_chain.len(), 1);
        assert_eq!(trust.trusted_authorities.len(), 1);
        assert!(trust.server_config().is_ok());
    }

    #[test]
    fn mutual_tls_server_config_builds() {
        let trust = TrustConfiguration::for_server(&server_settings(false)).unwrap();
        assert!(trust.server_config().is_ok());
    }

    #[test]
    fn missing_key_file_is_certificate_error() {
        let mut settings = server_settings(true);
        settings.key_path = fixture("missing.key");
        let err = TrustConfiguration::for_server(&settings).unwrap_err();
        assert!(matches!(err, CertificateError::Read { .. }));
    }

    #[test]
    fn certificate_file_without_key_is_rejected() {
        let err = load_private_key(Path::new(&fixture("ca.pem"))).unwrap_err();
        assert!(matches!(err, CertificateError::NoPrivateKey(_)));
    }

    #[test]
    fn validation_without_trust_store_fails() {
        let trust = TrustConfiguration {
            identity: None,
            trusted_authorities: Vec::new(),
            skip_peer_validation: false,
        };
        assert!(matches!(
            trust.client_config(),
            Err(CertificateError::EmptyTrustStore)
        ));
    }

    #[test]
    fn skipped_validation_ignores_ca_file() {
        let settings = ClientSettings {
            ca_path: Some(fixture("does-not-exist.pem")),
            ..ClientSettings::default()
        };
        let trust = TrustConfiguration::for_client(&settings).unwrap();
        assert!(trust.trusted_authorities.is_empty());
        assert!(trust.client_config().is_ok());
    }

    #[test]
    fn classifies_certificate_failures() {
        let untrusted = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        );
        assert!(peer_validation_failure(&untrusted).is_some());

        let rejected_by_server = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(rustls::AlertDescription::CertificateUnknown),
        );
        assert!(peer_validation_failure(&rejected_by_server).is_some());

        let other = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::General("unexpected message".into()),
        );
        assert!(peer_validation_failure(&other).is_none());
        assert!(peer_validation_failure(&std::io::Error::other("reset")).is_none());
    }
}
