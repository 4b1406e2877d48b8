use clap::Parser;
use tracing::{error, info, warn};
use uiserve::shutdown::{cancel_on_signal, ShutdownToken};
use uiserve::{logging, Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let events = logging::init(&config)?;
    let pid = std::process::id();

    info!(pid, "started server process");
    if !config.root.is_dir() {
        warn!(
            "document root {} is not a directory",
            config.root.display()
        );
    }

    let server = match Server::bind(&config) {
        Ok(server) => server,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };

    let shutdown = ShutdownToken::new();
    cancel_on_signal(shutdown.clone());

    info!(
        "serving {} on http://{} (press Ctrl+C to quit)",
        config.root.display(),
        server.local_addr()
    );
    server.run(shutdown).await;

    info!(pid, events = events.get(), "finished server process");
    Ok(())
}
