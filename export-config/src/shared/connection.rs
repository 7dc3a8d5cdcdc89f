use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use std::sync::LazyLock;

use crate::Config;
use crate::shared::ValidationError;

/// Session settings applied to every source connection.
///
/// The exporter only reads, so the options pin the character set and time zone to keep
/// the rendered JSON stable across servers.
pub static EXPORT_SOURCE_OPTIONS: LazyLock<SourceSessionOptions> =
    LazyLock::new(|| SourceSessionOptions {
        charset: "utf8mb4".to_string(),
        collation: "utf8mb4_unicode_ci".to_string(),
        timezone: "+00:00".to_string(),
    });

#[derive(Debug, Clone)]
pub struct SourceSessionOptions {
    pub charset: String,
    pub collation: String,
    pub timezone: String,
}

/// Connection settings for the MySQL source database.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
    /// Upper bound on pooled connections, which also bounds concurrent table loads.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl SourceConnectionConfig {
    /// Default size of the source connection pool.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()?;

        if self.max_connections == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.max_connections".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Config for SourceConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_max_connections() -> u32 {
    SourceConnectionConfig::DEFAULT_MAX_CONNECTIONS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub tls: TlsConfig,
    pub max_connections: u32,
}

impl From<SourceConnectionConfig> for SourceConnectionConfigWithoutSecrets {
    fn from(value: SourceConnectionConfig) -> Self {
        SourceConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            name: value.name,
            username: value.username,
            tls: value.tls,
            max_connections: value.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.trim().is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

pub trait IntoConnectOptions<Output> {
    fn without_db(&self, options: Option<&SourceSessionOptions>) -> Output;
    fn with_db(&self, options: Option<&SourceSessionOptions>) -> Output;
}

impl IntoConnectOptions<MySqlConnectOptions> for SourceConnectionConfig {
    fn without_db(&self, options: Option<&SourceSessionOptions>) -> MySqlConnectOptions {
        let ssl_mode = if self.tls.enabled {
            MySqlSslMode::VerifyIdentity
        } else {
            MySqlSslMode::Preferred
        };
        let mut connect_options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            connect_options =
                connect_options.ssl_ca_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(opts) = options {
            connect_options = connect_options
                .charset(&opts.charset)
                .collation(&opts.collation)
                .timezone(Some(opts.timezone.clone()));
        }

        connect_options
    }

    fn with_db(&self, options: Option<&SourceSessionOptions>) -> MySqlConnectOptions {
        let connect_options: MySqlConnectOptions = self.without_db(options);
        connect_options.database(&self.name)
    }
}
