//! Endpoint binding and the accept loop.
//!
//! Each endpoint runs its own accept loop. On shutdown the listener is dropped
//! (releasing the port), open connections are asked to finish their in-flight
//! request, and whatever is still open after the drain timeout is aborted.

use super::handler::{handle_request, ServiceContext};
use crate::config::{Endpoint, Scheme};
use crate::error::ServerError;
use crate::proxy::network::bind_endpoint;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A listening socket together with the endpoint it actually serves.
pub struct BoundEndpoint {
    pub endpoint: Endpoint,
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

/// Bind `endpoint`. Port 0 (or a taken port with `dynamic_fallback`) resolves
/// to the ephemeral port the OS assigned.
pub async fn bind(
    endpoint: &Endpoint,
    dynamic_fallback: bool,
    tls: Option<TlsAcceptor>,
) -> Result<BoundEndpoint, ServerError> {
    let addr = resolve(endpoint).await?;
    let listener = bind_endpoint(addr, dynamic_fallback)?;
    let local = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let bound = Endpoint::new(endpoint.scheme, endpoint.host.clone(), local.port());
    info!("Listening on {} ({})", bound, local);
    Ok(BoundEndpoint {
        endpoint: bound,
        listener,
        tls,
    })
}

async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, ServerError> {
    let invalid = || ServerError::InvalidEndpoint(endpoint.to_string());
    let mut addrs = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|_| invalid())?;
    addrs.next().ok_or_else(invalid)
}

/// Accept connections until `cancel` fires, then drain for up to `drain_timeout`.
pub async fn accept_loop(
    bound: BoundEndpoint,
    ctx: Arc<ServiceContext>,
    cancel: CancellationToken,
    drain_timeout: Duration,
) {
    let BoundEndpoint {
        endpoint,
        listener,
        tls,
    } = bound;
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote,
                        endpoint.scheme,
                        tls.clone(),
                        Arc::clone(&ctx),
                        cancel.clone(),
                    ));
                }
                Err(e) => error!("Accept error on {}: {}", endpoint, e),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = cancel.cancelled() => break,
        }
    }

    drop(listener);
    info!("Stopped listening on {}", endpoint);

    let drained = tokio::time::timeout(drain_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "{} connection(s) on {} still open after {:?}, closing",
            connections.len(),
            endpoint,
            drain_timeout
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    scheme: Scheme,
    tls: Option<TlsAcceptor>,
    ctx: Arc<ServiceContext>,
    cancel: CancellationToken,
) {
    match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                drive(TokioIo::new(tls_stream), remote, scheme, ctx, cancel).await
            }
            Err(err) => debug!("TLS handshake failed from {}: {}", remote, err),
        },
        None => drive(TokioIo::new(stream), remote, scheme, ctx, cancel).await,
    }
}

async fn drive<I>(
    io: I,
    remote: SocketAddr,
    scheme: Scheme,
    ctx: Arc<ServiceContext>,
    cancel: CancellationToken,
) where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let ctx = Arc::clone(&ctx);
        async move { handle_request(req, ctx, remote, scheme).await }
    });
    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(err) = result {
        debug!("Connection from {} closed: {}", remote, err);
    }
}
