//! Listener and accept loop
//!
//! The server owns the listening socket and the content cache. Each accepted
//! connection is handled on its own task; the accept loop never waits for one.
//! On shutdown the loop stops accepting and closes the listener, waits up to
//! the drain timeout for in-flight handlers, detaches whatever is left, and
//! releases the cache.

use crate::cache::{ContentCache, SharedCache};
use crate::config::Config;
use crate::connection::handle_connection;
use crate::loader::{FileLoader, FsLoader};
use crate::router::Router;
use crate::shutdown::ShutdownToken;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct Server<L = FsLoader> {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<Router<L>>,
    cache: SharedCache,
    read_buffer: usize,
    drain_timeout: Duration,
}

impl Server<FsLoader> {
    /// Bind the configured address and serve files from disk.
    pub fn bind(config: &Config) -> anyhow::Result<Self> {
        Self::bind_with(config, FsLoader)
    }
}

impl<L: FileLoader> Server<L> {
    /// Bind the configured address, reading files through `loader`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn bind_with(config: &Config, loader: L) -> anyhow::Result<Self> {
        let addr = config.socket_addr()?;
        let listener = create_listener(addr, config.backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;
        let local_addr = listener.local_addr()?;

        let cache = ContentCache::shared();
        let router = Router::new(config.documents(), Arc::clone(&cache), loader);

        Ok(Self {
            listener,
            local_addr,
            router: Arc::new(router),
            cache,
            read_buffer: config.read_buffer,
            drain_timeout: config.drain_timeout(),
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: ShutdownToken) {
        info!("listening on http://{}", self.local_addr);
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        warn!("connection task failed: {e}");
                    }
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "connection accepted");
                        handlers.spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&self.router),
                            self.read_buffer,
                        ));
                    }
                    Err(e) => warn!("failed to accept connection: {e}"),
                },
            }
        }

        drop(self.listener);
        info!("shutting down, listener closed");
        drain(&mut handlers, self.drain_timeout).await;

        drop(self.router);
        log_cache_summary(&self.cache);
    }
}

/// TCP listener with `SO_REUSEADDR` and an explicit backlog.
fn create_listener(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

async fn drain(handlers: &mut JoinSet<()>, timeout: Duration) {
    if handlers.is_empty() {
        return;
    }
    info!(in_flight = handlers.len(), "waiting for in-flight connections");

    let finished = tokio::time::timeout(timeout, async {
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                warn!("connection task failed: {e}");
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!(
            detached = handlers.len(),
            "drain timeout elapsed, leaving connections running"
        );
        handlers.detach_all();
    }
}

fn log_cache_summary(cache: &SharedCache) {
    let cache = cache.lock();
    for (key, size) in cache.summary() {
        debug!(key = %key, bytes = size, "cached");
    }
    info!(
        entries = cache.len(),
        bytes = cache.total_bytes(),
        "releasing content cache"
    );
}
