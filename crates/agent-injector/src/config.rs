//! Injector process configuration
//!
//! Flags with environment fallbacks for the webhook server. The secret name is
//! the only required value; it names the pre-existing secret holding
//! `contrast_security.yaml`.

use clap::{Parser, ValueEnum};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable output
    Text,
}

/// Agent injector webhook server
#[derive(Debug, Clone, Parser)]
#[command(name = "agent-injector")]
#[command(about = "Mutating admission webhook that injects the Contrast agent into pods")]
#[command(version)]
pub struct InjectorConfig {
    /// Webhook server port
    #[arg(long, env = "INJECTOR_PORT", default_value_t = 8443)]
    pub port: u16,

    /// File containing the x509 certificate
    #[arg(
        long,
        env = "INJECTOR_TLS_CERT_FILE",
        default_value = "/etc/webhook/certs/cert.pem"
    )]
    pub tls_cert_file: PathBuf,

    /// File containing the x509 private key for the certificate
    #[arg(
        long,
        env = "INJECTOR_TLS_KEY_FILE",
        default_value = "/etc/webhook/certs/key.pem"
    )]
    pub tls_key_file: PathBuf,

    /// Kubernetes secret containing the contrast_security.yaml file
    #[arg(long, env = "INJECTOR_SECRET_NAME")]
    pub secret_name: String,

    /// Log output format
    #[arg(long, env = "INJECTOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl InjectorConfig {
    /// Validate that configuration has required fields
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.secret_name.trim().is_empty() {
            return Err(anyhow::anyhow!("--secret-name required"));
        }
        Ok(())
    }

    /// Address the HTTPS listener binds to
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config =
            InjectorConfig::try_parse_from(["agent-injector", "--secret-name", "contrast-config"])
                .unwrap();

        assert_eq!(config.port, 8443);
        assert_eq!(config.tls_cert_file, PathBuf::from("/etc/webhook/certs/cert.pem"));
        assert_eq!(config.tls_key_file, PathBuf::from("/etc/webhook/certs/key.pem"));
        assert_eq!(config.secret_name, "contrast-config");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8443");
    }

    #[test]
    fn test_flag_overrides() {
        let config = InjectorConfig::try_parse_from([
            "agent-injector",
            "--port",
            "9443",
            "--tls-cert-file",
            "/tmp/cert.pem",
            "--tls-key-file",
            "/tmp/key.pem",
            "--secret-name",
            "s",
            "--log-format",
            "text",
        ])
        .unwrap();

        assert_eq!(config.port, 9443);
        assert_eq!(config.tls_key_file, PathBuf::from("/tmp/key.pem"));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_blank_secret_name_is_rejected() {
        let config =
            InjectorConfig::try_parse_from(["agent-injector", "--secret-name", "  "]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--secret-name"));
    }
}
