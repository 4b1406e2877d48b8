//! Logging setup
//!
//! All events go through `tracing`. [`init`] installs one subscriber with:
//! - a console layer filtered by `--log-level`;
//! - an optional plain-text file layer (`--log-file`);
//! - an optional CSV layer, one row per event (`--log-csv`);
//! - a statistics layer counting events, optionally appending the running
//!   count to a file (`--log-statistics`).

use crate::config::Config;
use anyhow::Context as _;
use chrono::Local;
use parking_lot::Mutex;
use std::fmt::{self, Write as _};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

/// Install the global subscriber. Returns the live event counter.
pub fn init(config: &Config) -> anyhow::Result<EventCount> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter {:?}", config.log_level))?;

    let console = tfmt::layer().with_target(false);

    let file = config
        .log_file
        .as_deref()
        .map(open_log_file)
        .transpose()?
        .map(|f| {
            tfmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(std::sync::Mutex::new(f))
        });

    let csv = config
        .log_csv
        .as_deref()
        .map(open_log_file)
        .transpose()?
        .map(CsvLayer::new);

    let statistics = StatisticsLayer::new(
        config
            .log_statistics
            .as_deref()
            .map(open_log_file)
            .transpose()?,
    );
    let count = statistics.count();

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .with(csv)
        .with(statistics)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(count)
}

/// Open `path` for appending, creating parent directories as needed.
fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Collects an event's message and any extra fields.
#[derive(Default)]
struct EventText {
    message: String,
    fields: String,
}

impl EventText {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

/// Writes `timestamp,LEVEL,file,line,message` for every event.
pub struct CsvLayer<W> {
    writer: Mutex<W>,
}

impl<W: Write> CsvLayer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for CsvLayer<W>
where
    S: Subscriber,
    W: Write + Send + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut text = EventText::default();
        event.record(&mut text);

        let row = format!(
            "{},{},{},{},{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            meta.level(),
            csv_field(meta.file().unwrap_or("-")),
            meta.line().unwrap_or(0),
            csv_field(&text.finish()),
        );

        let mut writer = self.writer.lock();
        let _ = writer.write_all(row.as_bytes()).and_then(|()| writer.flush());
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Shared count of events seen by a [`StatisticsLayer`].
#[derive(Debug, Clone, Default)]
pub struct EventCount(Arc<AtomicU64>);

impl EventCount {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Counts events; with a writer, appends each running total followed by a
/// space.
pub struct StatisticsLayer<W = File> {
    count: EventCount,
    writer: Option<Mutex<W>>,
}

impl<W: Write> StatisticsLayer<W> {
    pub fn new(writer: Option<W>) -> Self {
        Self {
            count: EventCount::default(),
            writer: writer.map(Mutex::new),
        }
    }

    pub fn count(&self) -> EventCount {
        self.count.clone()
    }
}

impl<S, W> Layer<S> for StatisticsLayer<W>
where
    S: Subscriber,
    W: Write + Send + 'static,
{
    fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
        let n = self.count.increment();
        if let Some(writer) = &self.writer {
            let mut writer = writer.lock();
            let _ = write!(writer, "{n} ").and_then(|()| writer.flush());
        }
    }
}

/// In-memory writer shared between a layer and the test reading it back.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuf {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};
    use tracing_subscriber::registry;

    #[test]
    fn csv_rows_have_level_location_and_message() {
        let buf = SharedBuf::default();
        let subscriber = registry().with(CsvLayer::new(buf.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!("client connected");
            warn!(peer = "127.0.0.1:5000", "read failed");
        });

        let out = buf.contents();
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 2);

        let first: Vec<&str> = rows[0].split(',').collect();
        assert_eq!(first.len(), 5);
        assert_eq!(first[1], "INFO");
        assert!(first[2].ends_with("logging.rs"));
        assert!(first[3].parse::<u32>().unwrap() > 0);
        assert_eq!(first[4], "client connected");

        assert!(rows[1].contains(",WARN,"));
        assert!(rows[1].ends_with("read failed peer=127.0.0.1:5000"));
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\", ok"), "\"say \"\"hi\"\", ok\"");
    }

    #[test]
    fn statistics_counts_every_event() {
        let buf = SharedBuf::default();
        let layer = StatisticsLayer::new(Some(buf.clone()));
        let count = layer.count();
        let subscriber = registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..3 {
                info!(i, "tick");
            }
        });

        assert_eq!(count.get(), 3);
        assert_eq!(buf.contents(), "1 2 3 ");
    }

    #[test]
    fn statistics_without_writer_still_counts() {
        let layer: StatisticsLayer = StatisticsLayer::new(None);
        let count = layer.count();

        tracing::subscriber::with_default(registry().with(layer), || {
            warn!("one");
            warn!("two");
        });

        assert_eq!(count.get(), 2);
    }
}
