//! Per-connection transaction loop for the register protocol.

use std::io::Write;
use std::net::TcpStream;

use tracing::{debug, warn};

use obscura_registers::WriteOutcome;

use crate::dispatch::CommandGateway;

use super::LISTENER_TARGET;
use super::codec::{self, DecodedRequest, ExceptionCode, Request, Response};

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Connection handler serving register transactions through the gateway.
///
/// Connections are persistent: the handler answers transactions until the
/// peer disconnects or the framing breaks. Well-framed but invalid requests
/// answer with an exception and keep the connection open.
pub struct ProtocolConnectionHandler {
    gateway: CommandGateway,
}

impl ProtocolConnectionHandler {
    /// Builds a handler over the command gateway.
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    fn serve(&self, mut stream: TcpStream) {
        loop {
            let (header, pdu) = match codec::read_frame(&mut stream) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(target: LISTENER_TARGET, "client disconnected");
                    return;
                }
                Err(error) => {
                    warn!(target: LISTENER_TARGET, error = %error, "dropping connection");
                    return;
                }
            };

            let (function, response) = match codec::parse_request(&pdu) {
                DecodedRequest::Valid(request) => {
                    let function = request.function();
                    (function, self.process(request))
                }
                DecodedRequest::Invalid {
                    function,
                    exception,
                } => (function, Response::Exception { code: exception }),
            };

            let bytes = codec::encode_response(header, function, &response);
            if let Err(error) = stream.write_all(&bytes).and_then(|()| stream.flush()) {
                warn!(target: LISTENER_TARGET, error = %error, "failed to write response");
                return;
            }
        }
    }

    fn process(&self, request: Request) -> Response {
        match request {
            Request::ReadHolding { address, count } => {
                match self.gateway.read(address, count) {
                    Ok(values) => Response::ReadHolding { values },
                    Err(_) => Response::Exception {
                        code: ExceptionCode::IllegalDataAddress,
                    },
                }
            }
            Request::WriteSingle { address, value } => self
                .write_registers(address, &[value])
                .unwrap_or(Response::WriteSingle { address, value }),
            Request::WriteMultiple { address, values } => {
                let count = values.len() as u16;
                self.write_registers(address, &values)
                    .unwrap_or(Response::WriteMultiple { address, count })
            }
        }
    }

    /// Applies a write through the gateway; `None` means the write was
    /// accepted and the caller should echo the request.
    fn write_registers(&self, address: u16, values: &[u16]) -> Option<Response> {
        match self.gateway.write(address, values) {
            Ok(WriteOutcome::Accepted) => None,
            Ok(WriteOutcome::Acknowledged) => Some(Response::Exception {
                code: ExceptionCode::Acknowledge,
            }),
            Ok(WriteOutcome::IllegalValue) => Some(Response::Exception {
                code: ExceptionCode::IllegalDataValue,
            }),
            Ok(WriteOutcome::DeviceBusy) => Some(Response::Exception {
                code: ExceptionCode::DeviceBusy,
            }),
            Err(_) => Some(Response::Exception {
                code: ExceptionCode::IllegalDataAddress,
            }),
        }
    }
}

impl ConnectionHandler for ProtocolConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        self.serve(stream);
    }
}
