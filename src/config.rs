use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::fs;

use crate::dsig::{self, Credentials};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Verify the service's TLS certificate
    pub verify_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub passphrase: SecretString,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Credentials(#[from] dsig::Error),
}

impl CredentialsConfig {
    /// Read the DER-encoded certificate and key files and build the
    /// credential set.
    pub async fn load(&self) -> Result<Credentials, CredentialsError> {
        let cer_der = fs::read(&self.certificate_path).await?;
        let key_der = fs::read(&self.key_path).await?;
        Ok(Credentials::from_der(
            &cer_der,
            &key_der,
            self.passphrase.expose_secret(),
        )?)
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("service.timeout_secs", 15)?
            .set_default("service.verify_tls", true)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format APP_SERVICE__TIMEOUT_SECS
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::load().expect("Failed to load config");

        assert_eq!(config.service.timeout_secs, 15);
        assert!(config.service.verify_tls);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_env_config() {
        let mut env_vars = HashMap::new();
        env_vars.insert("service.timeout_secs".to_string(), "60".to_string());
        env_vars.insert("service.verify_tls".to_string(), "false".to_string());
        env_vars.insert(
            "credentials.certificate_path".to_string(),
            "/secrets/identity.cer".to_string(),
        );
        env_vars.insert(
            "credentials.key_path".to_string(),
            "/secrets/identity.key".to_string(),
        );
        env_vars.insert("credentials.passphrase".to_string(), "s3cret".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.service.timeout_secs, 60);
        assert!(!config.service.verify_tls);
        let credentials = config.credentials.unwrap();
        assert_eq!(
            credentials.certificate_path,
            PathBuf::from("/secrets/identity.cer")
        );
        assert_eq!(credentials.passphrase.expose_secret(), "s3cret");
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        // We just override the timeout
        env_vars.insert("service.timeout_secs".to_string(), "30".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.service.timeout_secs, 30);
        // The other values should use default
        assert!(config.service.verify_tls);
        assert!(config.credentials.is_none());
    }
}
