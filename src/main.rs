use std::time::Duration;

use clap::Parser;
use piste_watch::render::render_frame;
use piste_watch::{
    BoutStateStore, ClientConfig, ClientError, ConnectionManager, ConnectionStatus, ReconnectPolicy,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "piste-watch", version, about = "Watch a simulated fencing bout live")]
struct Cli {
    /// Full WebSocket URL of the simulator (overrides --host/--port)
    #[arg(long, env = "PISTE_WATCH_URL")]
    url: Option<String>,

    #[arg(long, env = "PISTE_WATCH_HOST", default_value = piste_watch::config::DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "PISTE_WATCH_PORT", default_value_t = piste_watch::config::DEFAULT_PORT)]
    port: u16,

    /// Seconds allowed for the handshake
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Reconnect this many seconds after a drop (default: stay disconnected)
    #[arg(long)]
    reconnect_secs: Option<u64>,
}

impl Cli {
    fn config(&self) -> Result<ClientConfig, ClientError> {
        let config = match &self.url {
            Some(url) => ClientConfig::from_url(url)?,
            None => ClientConfig::from_host_port(&self.host, self.port)?,
        };
        let reconnect = match self.reconnect_secs {
            Some(secs) => ReconnectPolicy::After(Duration::from_secs(secs)),
            None => ReconnectPolicy::Never,
        };
        Ok(config
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_reconnect(reconnect))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_tracing();
    let cli = Cli::parse();
    let mut manager = ConnectionManager::new(cli.config()?, BoutStateStore::new());
    let store = manager.store().clone();
    let retrying = manager.config().reconnect != ReconnectPolicy::Never;
    info!(
        endpoint = %manager.config().endpoint,
        timeout = ?manager.config().connect_timeout,
        retrying,
        "watching bout"
    );

    let mut updates = store.subscribe();
    let mut status = manager.status_watch();

    manager.start();
    println!("{}", render_frame(&store.snapshot(), manager.status()));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!("{}", render_frame(&snapshot, manager.status()));
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("{}", render_frame(&store.snapshot(), current));
                if current == ConnectionStatus::Disconnected && !retrying {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    manager.stop().await;
    if manager.frames_rejected() > 0 {
        warn!(rejected = manager.frames_rejected(), "some frames were dropped");
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("piste_watch=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
