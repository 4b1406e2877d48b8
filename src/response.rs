//! Response building
//!
//! Every response has the same shape: status line, fixed content type, exact
//! length, `Connection: close`.

use std::sync::Arc;

pub const CONTENT_TYPE: &str = "text/html";

/// Body sent with a 500 when a file disappears between the existence check
/// and the read.
pub const INTERNAL_ERROR_BODY: &[u8] = b"<h1>500 Internal Server Error</h1>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InternalServerError,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

/// Header block for a body of `body_length` bytes, blank line included.
pub fn build_header(body_length: usize, status: Status) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {CONTENT_TYPE}\r\nContent-Length: {body_length}\r\nConnection: close\r\n\r\n",
        status.code(),
        status.reason(),
    )
    .into_bytes()
}

/// Who owns the bytes being sent.
#[derive(Debug, Clone)]
pub enum Body {
    /// Shared with the content cache.
    Cached(Arc<[u8]>),
    /// Read for this request only (ranged reads); freed after sending.
    Owned(Vec<u8>),
    Static(&'static [u8]),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Cached(bytes) => &bytes[..],
            Self::Owned(bytes) => &bytes[..],
            Self::Static(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub body: Body,
}

impl Response {
    pub fn new(status: Status, body: Body) -> Self {
        Self { status, body }
    }

    pub fn internal_error() -> Self {
        Self::new(
            Status::InternalServerError,
            Body::Static(INTERNAL_ERROR_BODY),
        )
    }

    /// Header whose Content-Length matches this body.
    pub fn header(&self) -> Vec<u8> {
        build_header(self.body.len(), self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_header_shape() {
        let header = build_header(42, Status::Ok);
        assert_eq!(
            header,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 42\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn not_found_header_shape() {
        let header = String::from_utf8(build_header(0, Status::NotFound)).unwrap();
        assert!(header.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(header.contains("Content-Length: 0\r\n"));
        assert!(header.ends_with("\r\n\r\n"));
    }

    #[test]
    fn internal_error_header_shape() {
        let header = String::from_utf8(build_header(3, Status::InternalServerError)).unwrap();
        assert!(header.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(header.contains("Content-Length: 3\r\n"));
    }

    #[test]
    fn response_header_tracks_body_length() {
        let response = Response::new(Status::Ok, Body::Owned(b"Hell".to_vec()));
        let header = String::from_utf8(response.header()).unwrap();
        assert!(header.contains("Content-Length: 4\r\n"));

        let error = Response::internal_error();
        let header = String::from_utf8(error.header()).unwrap();
        assert!(header.contains(&format!("Content-Length: {}\r\n", INTERNAL_ERROR_BODY.len())));
    }
}
