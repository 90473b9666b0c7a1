//! Declarative configuration for the protocol listener endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// TCP endpoint the daemon binds its register server to.
///
/// The register protocol is framed for TCP peers, so unlike general daemon
/// sockets there is no Unix-domain variant.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BindEndpoint {
    /// Host name or address to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
}

impl BindEndpoint {
    /// Builds an endpoint from host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BindEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for BindEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`BindEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// The input was not a valid URL.
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}
