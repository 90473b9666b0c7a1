//! TCP listener for the register protocol.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use obscura_config::BindEndpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the configured endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: BindEndpoint,
    listener: TcpListener,
}

impl SocketListener {
    /// Resolves and binds the endpoint.
    pub(crate) fn bind(endpoint: &BindEndpoint) -> Result<Self, ListenerError> {
        let mut addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                host: endpoint.host.clone(),
                port: endpoint.port,
                source,
            })?;
        let addr = addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| ListenerError::ResolveEmpty {
                host: endpoint.host.clone(),
                port: endpoint.port,
            })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Starts the accept loop on a background thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => Ok(()),
                Err(_) => Err(ListenerError::ThreadPanic),
            }
        } else {
            Ok(())
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "register server listening"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                let handler = Arc::clone(&handler);
                thread::spawn(move || handler.handle(stream));
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

fn accept_connection(listener: &TcpListener) -> Result<Option<TcpStream>, io::Error> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}
