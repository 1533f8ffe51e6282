// crates/dragnet-cli/src/main.rs
//
// The dragnet binary: one subcommand per pipeline topology. All commands
// run against the NullNetwork backend (see nullnet.rs); real deployments
// link their own `Network` implementation and wire it the same way.

mod nullnet;

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dragnet_core::detect::BoxParams;
use dragnet_pipeline::display::{DetectionLog, Render};
use dragnet_pipeline::{run_client, run_edge, run_local, run_server};

use nullnet::NullNetwork;

#[derive(Parser)]
#[command(name = "dragnet", about = "Batched object-detection pipeline fabric")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect over local images: loader -> batcher -> detector.
    Detect {
        /// Image paths, processed in order.
        images: Vec<PathBuf>,
        #[arg(long, default_value_t = 416)]
        size: u32,
        #[arg(long, default_value_t = 1)]
        batch: usize,
        #[arg(long, default_value_t = 0.5)]
        thresh: f32,
        /// Report detections on the log (the display stage).
        #[arg(long)]
        display: bool,
    },
    /// Stream letterboxed frames to a server, paced to a target FPS.
    Client {
        images: Vec<PathBuf>,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 7777)]
        port: u16,
        #[arg(long, default_value_t = 416)]
        size: u32,
        /// Target frames per second; 0 sends as fast as the queue allows.
        #[arg(long, default_value_t = 0.0)]
        fps: f64,
    },
    /// Serve a fixed number of camera clients and batch their frames.
    Server {
        #[arg(long, default_value_t = 7777)]
        port: u16,
        /// Number of clients this run expects; also the accept-pool size.
        #[arg(long, default_value_t = 1)]
        clients: usize,
        #[arg(long, default_value_t = 416)]
        size: u32,
        #[arg(long, default_value_t = 1)]
        batch: usize,
        #[arg(long, default_value_t = 0.5)]
        thresh: f32,
        /// Split mode: clients send edge features after each frame.
        #[arg(long)]
        partial: bool,
        #[arg(long)]
        display: bool,
    },
    /// Edge node of the split pipeline: preprocess locally, forward both
    /// payloads to the server.
    Edge {
        images: Vec<PathBuf>,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 7777)]
        port: u16,
        #[arg(long, default_value_t = 416)]
        size: u32,
    },
}

fn renderer(display: bool, thresh: f32) -> Option<Box<dyn Render>> {
    display.then(|| Box::new(DetectionLog { thresh, names: Vec::new() }) as Box<dyn Render>)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Detect { images, size, batch, thresh, display } => {
            let mut net = NullNetwork::new(size, batch);
            let params = BoxParams { thresh, ..BoxParams::default() };
            run_local(images, &mut net, params, renderer(display, thresh))?;
        }
        Command::Client { images, host, port, size, fps } => {
            run_client(images, (size, size), &host, port, fps)?;
        }
        Command::Server { port, clients, size, batch, thresh, partial, display } => {
            let listener = TcpListener::bind(("0.0.0.0", port))
                .with_context(|| format!("binding port {port}"))?;
            let mut net = NullNetwork::new(size, batch);
            let params = BoxParams { thresh, ..BoxParams::default() };
            run_server(
                listener,
                &mut net,
                clients,
                (size, size),
                partial,
                params,
                renderer(display, thresh),
            )?;
        }
        Command::Edge { images, host, port, size } => {
            let net = Box::new(NullNetwork::new(size, 1));
            run_edge(images, net, &host, port)?;
        }
    }
    Ok(())
}
