//! Walkers: a posync server, and clients that walk in circles.
//!
//! ```text
//! walkers server --port 5701 --tick-rate 20
//! walkers client --server ws://127.0.0.1:5701 --name Alice
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use posync::prelude::*;
use rand::Rng;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the position server.
    Server {
        /// JSON file with server settings; flags override it.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Interface to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Position broadcasts per second (0 disables)
        #[arg(short, long)]
        tick_rate: Option<u32>,
        /// Maximum simultaneous connections
        #[arg(short, long)]
        max_connections: Option<usize>,
    },
    /// Join a server and walk in a circle.
    Client {
        /// Server URL
        #[arg(short, long, default_value = "ws://127.0.0.1:5701")]
        server: String,
        /// Display name
        #[arg(short, long, default_value = "walker")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    posync::init_tracing("info");

    match Args::parse().command {
        Command::Server {
            config,
            host,
            port,
            tick_rate,
            max_connections,
        } => {
            let mut cfg = match config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                cfg.host = host;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            if let Some(hz) = tick_rate {
                cfg.tick_rate_hz = hz;
            }
            if let Some(max) = max_connections {
                cfg.max_connections = max;
            }
            serve(cfg).await
        }
        Command::Client { server, name } => walk(ClientConfig { url: server, name }).await,
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = PosyncServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr(), "walkers server ready");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

/// Logs what the mirror does instead of drawing it.
struct LogPresentation;

impl Presentation for LogPresentation {
    fn peer_added(&mut self, id: ConnectionId, name: &str) {
        tracing::info!(%id, name, "walker appeared");
    }

    fn peer_renamed(&mut self, id: ConnectionId, name: &str) {
        tracing::info!(%id, name, "walker renamed");
    }

    fn peer_removed(&mut self, id: ConnectionId) {
        tracing::info!(%id, "walker left");
    }

    fn peer_position_updated(&mut self, id: ConnectionId, position: Vec3) {
        tracing::debug!(%id, %position, "walker moved");
    }

    fn local_identity_assigned(&mut self, id: ConnectionId) {
        tracing::info!(%id, "we are");
    }
}

/// Radius of the walked circle, in world units.
const RADIUS: f32 = 5.0;
/// Radians per second.
const ANGULAR_SPEED: f32 = 0.8;
const STEP: Duration = Duration::from_millis(50);

async fn walk(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = PosyncClient::connect(&config, LogPresentation).await?;

    let mut rng = rand::rng();
    let center = Vec3::new(rng.random_range(-20.0..20.0), 0.0, rng.random_range(-20.0..20.0));
    let mut angle: f32 = rng.random_range(0.0..std::f32::consts::TAU);
    let mut steps = tokio::time::interval(STEP);

    loop {
        tokio::select! {
            open = client.next() => if !open {
                tracing::info!("server closed the connection");
                return Ok(());
            },
            _ = steps.tick() => {
                angle = (angle + ANGULAR_SPEED * STEP.as_secs_f32()) % std::f32::consts::TAU;
                client.set_local_position(Vec3::new(
                    center.x + RADIUS * angle.cos(),
                    center.y,
                    center.z + RADIUS * angle.sin(),
                ));
            }
            _ = tokio::signal::ctrl_c() => {
                client.disconnect()?;
                tracing::info!(peers = client.session().peers().count(), "leaving");
                return Ok(());
            }
        }
    }
}
