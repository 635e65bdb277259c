//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and feeds each HTTP/1.1 request to a shared
//! [`Router`]. Every connection gets its own task; within it, dispatch is a
//! plain synchronous call. Persistent connections (keep-alive) are supported.
//!
//! Shutdown is graceful: once the shutdown future resolves the listener is
//! closed, idle connections are dropped, in-flight requests are answered with
//! `Connection: close`, and the server waits up to its shutdown timeout for
//! the remaining connection tasks before aborting them.

use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// How long shutdown waits for open connections by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The HTTP server that drives a [`Router`].
///
/// Usually reached through [`Engine::listen`](crate::Engine::listen); use it
/// directly when the bound address is needed before serving (tests, port 0).
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rapidroute::{Engine, Method, server::Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut app = Engine::new();
///     app.handle(Method::Get, "/", |ctx| ctx.send("Hello!"))?;
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(Arc::new(app.into_router())).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Sets how long [`run_until`](Self::run_until) waits for open
    /// connections after shutdown before aborting them.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections and dispatches their requests to `router` forever.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run(self, router: Arc<Router>) -> Result<(), ServerError> {
        self.run_until(router, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but shuts down gracefully once `shutdown` resolves.
    ///
    /// New connections are refused from then on. Requests already being
    /// processed are answered (with `Connection: close`) and their
    /// connections closed; idle keep-alive connections are closed at once.
    /// Connections still open after the shutdown timeout are aborted.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run_until<S>(self, router: Arc<Router>, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let Self {
            listener,
            local_addr,
            shutdown_timeout,
        } = self;
        info!(address = %local_addr, "listening");
        tokio::pin!(shutdown);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        error!(error = %e, "connection task failed");
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    debug!(peer = %peer_addr, "connection accepted");
                    let router = Arc::clone(&router);
                    let stop = stop_rx.clone();

                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, router, stop).await {
                            warn!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                    });
                }
            }
        }

        drop(listener);
        info!(
            address = %local_addr,
            open_connections = connections.len(),
            "shutting down"
        );
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                timeout = ?shutdown_timeout,
                "shutdown timeout elapsed, aborting connections"
            );
            connections.shutdown().await;
        }
        Ok(())
    }
}

/// Resolves when the process receives Ctrl-C or, on Unix, `SIGTERM`.
///
/// Pass to [`Engine::listen_with_shutdown`](crate::Engine::listen_with_shutdown).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}

/// Runs the router for one request, turning a handler panic into a `500`.
fn dispatch(router: &Router, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.path().to_owned();

    panic::catch_unwind(AssertUnwindSafe(|| router.dispatch(request))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        error!(%method, %path, panic = %reason, "handler panicked");
        Response::new(StatusCode::InternalServerError).body("Internal Server Error")
    })
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection, signals
/// `Connection: close`, or `stop` reports that the server is shutting down.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
    mut stop: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        if *stop.borrow() && buf.is_empty() {
            debug!(peer = %peer_addr, "closing idle connection for shutdown");
            break;
        }

        let bytes_read = tokio::select! {
            read = stream.read_buf(&mut buf) => read?,
            changed = stop.changed(), if buf.is_empty() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large — sending 413");
            return reject_too_large(&mut stream).await;
        }

        // Several requests may already sit in the buffer when the client pipelines.
        loop {
            let (mut request, body_offset) = match Request::parse(&buf) {
                Ok(pair) => pair,
                Err(RequestError::Incomplete) => break,
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                    let response = Response::new(StatusCode::BadRequest)
                        .body(format!("Bad Request: {e}"))
                        .keep_alive(false);
                    stream.write_all(&response.into_bytes()).await?;
                    return Ok(());
                }
            };

            let content_length = request.content_length().unwrap_or(0);
            let Some(total_needed) = body_offset
                .checked_add(content_length)
                .filter(|&total| total <= MAX_REQUEST_SIZE)
            else {
                warn!(
                    peer = %peer_addr,
                    content_length,
                    "declared body too large — sending 413"
                );
                return reject_too_large(&mut stream).await;
            };
            if buf.len() < total_needed {
                break;
            }
            request.truncate_body(content_length);

            let wants_keep_alive = request.is_keep_alive();
            let mut response = dispatch(&router, request);
            // Shutdown may have started while the handler ran.
            let keep_alive = wants_keep_alive && !*stop.borrow();
            response.set_keep_alive(keep_alive);
            stream.write_all(&response.into_bytes()).await?;
            stream.flush().await?;

            let _ = buf.split_to(total_needed);

            if !keep_alive {
                debug!(peer = %peer_addr, "Connection: close — shutting down");
                return Ok(());
            }
            if buf.is_empty() {
                break;
            }
        }
    }

    Ok(())
}

async fn reject_too_large(stream: &mut TcpStream) -> Result<(), std::io::Error> {
    let response = Response::new(StatusCode::PayloadTooLarge)
        .body("Request entity too large")
        .keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
