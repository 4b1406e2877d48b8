//! Request parsing
//!
//! Only the request line and a `Range` header are read. Parsing never fails:
//! anything unexpected leaves the affected field empty or absent, and the
//! router turns an empty target into the not-found document.

/// Longest method token kept; longer ones parse as empty.
pub const MAX_METHOD_LEN: usize = 15;
/// Longest request target kept; longer ones parse as empty.
pub const MAX_TARGET_LEN: usize = 255;

/// Inclusive byte span from a `Range: bytes=start-end` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// `None` reads to the end of the file.
    pub end: Option<u64>,
}

impl ByteRange {
    pub const fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Number of bytes the span covers, `None` when open-ended.
    /// An end before the start covers nothing; a span wider than `u64`
    /// saturates, which reads to the end of any file.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| {
            end.checked_sub(self.start)
                .map_or(0, |last| last.saturating_add(1))
        })
    }

    /// Parse a header value like `bytes=0-99` or `bytes=100-`.
    ///
    /// Values without the `bytes=` unit are ignored. Inside a `bytes=` value an
    /// unreadable start falls back to 0 and an unreadable end to end-of-file.
    pub fn parse(value: &str) -> Option<Self> {
        let span = value.trim().strip_prefix("bytes=")?;
        let (start, end) = span.split_once('-').unwrap_or((span, ""));
        Some(Self {
            start: leading_number(start).unwrap_or(0),
            end: leading_number(end),
        })
    }
}

fn leading_number(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    s[..digits].parse().ok()
}

/// The parts of a request the router cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub range: Option<ByteRange>,
}

impl Request {
    /// Parse the bytes received from one read of the connection.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));

        let (method, path) = lines
            .next()
            .map(parse_request_line)
            .unwrap_or_default();

        let range = lines
            .filter_map(|line| header_value(line, "range"))
            .find_map(ByteRange::parse);

        Self {
            method,
            path,
            range,
        }
    }

    /// Requests without a byte range are served from the cache.
    pub fn is_cache_eligible(&self) -> bool {
        self.range.is_none()
    }
}

fn parse_request_line(line: &str) -> (String, String) {
    let mut parts = line.split_ascii_whitespace();
    let method = bounded(parts.next(), MAX_METHOD_LEN);
    let path = bounded(parts.next(), MAX_TARGET_LEN);
    (method, path)
}

fn bounded(token: Option<&str>, max: usize) -> String {
    match token {
        Some(t) if t.len() <= max => t.to_string(),
        _ => String::new(),
    }
}

// Case-insensitive `Name: value` match without allocating.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
}
