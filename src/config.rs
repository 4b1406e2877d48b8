//! Server configuration
//!
//! Every setting can come from a command-line flag or an environment variable;
//! the defaults reproduce the classic layout of a `./UI` directory served on
//! `127.0.0.1:8080`.
//!
//! ```bash
//! uiserve --root ./site --port 9000 --log-csv log.csv
//! UISERVE_PORT=9000 UISERVE_ROOT=./site uiserve
//! ```

use crate::connection::READ_BUFFER_SIZE;
use crate::router::Documents;
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "uiserve")]
#[command(about = "Static file server with an in-memory content cache")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1", env = "UISERVE_HOST")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value = "8080", env = "UISERVE_PORT")]
    pub port: u16,

    /// Listen backlog
    #[arg(long, default_value = "16", env = "UISERVE_BACKLOG")]
    pub backlog: u32,

    /// Document root
    #[arg(long, default_value = "./UI", env = "UISERVE_ROOT")]
    pub root: PathBuf,

    /// Document served for `/`, relative to the root
    #[arg(long, default_value = "default.html", env = "UISERVE_DEFAULT_DOCUMENT")]
    pub default_document: String,

    /// Document served for `/index.html`, relative to the root
    #[arg(long, default_value = "index.html", env = "UISERVE_INDEX_DOCUMENT")]
    pub index_document: String,

    /// Document served with every 404, relative to the root
    #[arg(long, default_value = "404.html", env = "UISERVE_NOT_FOUND_DOCUMENT")]
    pub not_found_document: String,

    /// Size in bytes of the single read that receives a request
    #[arg(long, default_value_t = READ_BUFFER_SIZE, env = "UISERVE_READ_BUFFER")]
    pub read_buffer: usize,

    /// How long shutdown waits for in-flight connections, in milliseconds
    #[arg(long, default_value = "5000", env = "UISERVE_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    /// Log filter, e.g. `info` or `uiserve=debug`
    #[arg(long, default_value = "info", env = "UISERVE_LOG")]
    pub log_level: String,

    /// Also write plain log lines to this file
    #[arg(long, env = "UISERVE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Write one CSV row per log event to this file
    #[arg(long, env = "UISERVE_LOG_CSV")]
    pub log_csv: Option<PathBuf>,

    /// Write a running count of log events to this file
    #[arg(long, env = "UISERVE_LOG_STATISTICS")]
    pub log_statistics: Option<PathBuf>,
}

impl Config {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn documents(&self) -> Documents {
        Documents::under(
            &self.root,
            &self.default_document,
            &self.index_document,
            &self.not_found_document,
        )
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
