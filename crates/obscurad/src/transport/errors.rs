//! Error types for socket listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}
