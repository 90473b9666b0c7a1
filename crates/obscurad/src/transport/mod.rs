//! Socket transport for the register protocol.
//!
//! The transport binds the configured TCP endpoint, accepts connections on
//! a background thread, and serves register transactions per connection
//! through the command gateway. Framing lives in [`codec`]; register
//! semantics stay behind the gateway.

pub(crate) mod codec;
mod errors;
mod handler;
mod listener;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ProtocolConnectionHandler};
pub(crate) use self::listener::SocketListener;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
