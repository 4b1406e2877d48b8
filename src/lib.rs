pub mod cache;
pub mod config;
pub mod connection;
pub mod loader;
pub mod logging;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod shutdown;

pub use cache::{ContentCache, SharedCache};
pub use config::Config;
pub use loader::{FileLoader, FsLoader, LoadError};
pub use request::{ByteRange, Request};
pub use response::{build_header, Body, Response, Status};
pub use router::{Documents, Router};
pub use server::Server;
pub use shutdown::ShutdownToken;

/// Normalize a request target into an absolute, `..`-free URL path.
///
/// Query strings and fragments are dropped, empty and `.` segments are
/// skipped, and `..` pops the previous segment without ever climbing above
/// the root. The result always starts with `/`.
pub fn sanitize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.split('#').next().unwrap_or(path);

    let mut stack = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            segment => stack.push(segment),
        }
    }

    if stack.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(sanitize_path("/a.html?x=1"), "/a.html");
        assert_eq!(sanitize_path("/a.html#top"), "/a.html");
        assert_eq!(sanitize_path("/a.html?x=1#top"), "/a.html");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(sanitize_path("/./css//main.css"), "/css/main.css");
        assert_eq!(sanitize_path("/css/../js/app.js"), "/js/app.js");
    }

    #[test]
    fn never_climbs_above_root() {
        assert_eq!(sanitize_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(sanitize_path("../secret"), "/secret");
        assert_eq!(sanitize_path("/.."), "/");
    }

    #[test]
    fn relative_input_becomes_absolute() {
        assert_eq!(sanitize_path("docs/readme.txt"), "/docs/readme.txt");
        assert_eq!(sanitize_path(""), "/");
    }
}
