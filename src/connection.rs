//! Per-connection handling
//!
//! One request per connection: read once, parse, route, send header and body,
//! close. The connection is released whichever step fails.

use crate::loader::FileLoader;
use crate::request::Request;
use crate::response::Response;
use crate::router::{route_blocking, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Default size of the single read that receives the request.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Serve one request on `stream`.
///
/// `read_buffer` bounds the single read; anything the peer sends beyond it is
/// ignored.
pub async fn handle_connection<S, L>(
    mut stream: S,
    peer: SocketAddr,
    router: Arc<Router<L>>,
    read_buffer: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    L: FileLoader,
{
    let mut buffer = vec![0u8; read_buffer.max(1)];
    let received = match stream.read(&mut buffer).await {
        Ok(0) => {
            warn!(%peer, "peer closed before sending a request");
            return;
        }
        Ok(n) => n,
        Err(e) => {
            warn!(%peer, "failed to read request: {e}");
            return;
        }
    };

    let request = Request::parse(&buffer[..received]);
    drop(buffer);
    debug!(
        %peer,
        method = %request.method,
        path = %request.path,
        range = ?request.range,
        cached = request.is_cache_eligible(),
        "request"
    );

    let response = route_blocking(router, request).await;
    send_response(&mut stream, peer, &response).await;

    if let Err(e) = stream.shutdown().await {
        debug!(%peer, "shutdown failed: {e}");
    }
}

// Write failures are logged and otherwise ignored; the connection closes
// either way.
async fn send_response<S>(stream: &mut S, peer: SocketAddr, response: &Response)
where
    S: AsyncWrite + Unpin,
{
    let header = response.header();
    if let Err(e) = stream.write_all(&header).await {
        warn!(%peer, "failed to send header: {e}");
        return;
    }
    if let Err(e) = stream.write_all(response.body.as_bytes()).await {
        warn!(%peer, "failed to send body: {e}");
        return;
    }
    debug!(
        %peer,
        status = response.status.code(),
        bytes = response.body.len(),
        "response sent"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::loader::FsLoader;
    use crate::router::Documents;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::duplex;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn router(dir: &TempDir) -> Arc<Router> {
        fs::write(dir.path().join("default.html"), "home").unwrap();
        fs::write(dir.path().join("index.html"), "index").unwrap();
        fs::write(dir.path().join("404.html"), "nope").unwrap();
        fs::write(dir.path().join("hello.txt"), "Hello").unwrap();
        let docs = Documents::under(dir.path(), "default.html", "index.html", "404.html");
        Arc::new(Router::new(docs, ContentCache::shared(), FsLoader))
    }

    async fn exchange(router: Arc<Router>, request: &[u8]) -> Vec<u8> {
        let (mut client, server) = duplex(64 * 1024);
        let handler = tokio::spawn(handle_connection(server, peer(), router, READ_BUFFER_SIZE));

        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        handler.await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_full_file() {
        let dir = TempDir::new().unwrap();
        let response = exchange(router(&dir), b"GET /hello.txt HTTP/1.1\r\n\r\n").await;
        assert_eq!(
            response,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 5\r\nConnection: close\r\n\r\nHello"
        );
    }

    #[tokio::test]
    async fn serves_range() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let response = exchange(
            Arc::clone(&router),
            b"GET /hello.txt HTTP/1.1\r\nRange: bytes=0-3\r\n\r\n",
        )
        .await;

        let text = String::from_utf8(response).unwrap();
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nHell"));
        assert!(router.cache().lock().is_empty());
    }

    #[tokio::test]
    async fn closed_peer_gets_no_response() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir);
        let (client, server) = duplex(1024);
        drop(client);

        handle_connection(server, peer(), Arc::clone(&router), READ_BUFFER_SIZE).await;
        assert!(router.cache().lock().is_empty());
    }

    #[tokio::test]
    async fn garbage_request_gets_not_found_page() {
        let dir = TempDir::new().unwrap();
        let response = exchange(router(&dir), b"\x00\x01\x02").await;
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with("\r\n\r\nnope"));
    }
}
