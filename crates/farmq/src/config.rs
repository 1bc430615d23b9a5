//! Immutable endpoint configuration.
//!
//! Validated once at construction; there are no setters.

use std::fmt;

pub const DEFAULT_PORT: u16 = 50286;
pub const DEFAULT_AUTHKEY: &str = "farmq";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("authkey must not be empty")]
    EmptyAuthkey,
}

/// Endpoint settings shared by one server and its clients.
///
/// The authkey is a shared secret checked during the connection handshake.
/// Port `0` asks the server to bind an ephemeral port; clients must then be
/// pointed at [`crate::Server::local_addr`].
#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    authkey: String,
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        authkey: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        let authkey = authkey.into();

        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if authkey.is_empty() {
            return Err(ConfigError::EmptyAuthkey);
        }

        Ok(Self {
            host,
            port,
            authkey,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn authkey(&self) -> &str {
        &self.authkey
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            authkey: DEFAULT_AUTHKEY.to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep the shared secret out of logs.
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authkey", &"<redacted>")
            .finish()
    }
}
