// crates/dragnet-pipeline/src/topology.rs
//
// The three deployable pipeline shapes, wired from the stage primitives:
//
//   local:   loader -> queue -> driver -> (optional queue -> printer)
//   client:  loader -> queue -> pacing sender -> socket
//   server:  accept pool -> shared queue -> driver -> (optional printer)
//   edge:    loader -> queue -> partial detector -> queue -> forwarder
//
// Queues are Arc-shared and outlive every stage. Stage threads hand their
// Result back through the join handle; a topology joins everything before
// surfacing the first failure, so no error path can strand a peer on a
// queue that will never see its end marker.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use dragnet_core::detect::{BoxParams, Network};
use dragnet_core::image::{Item, LoadedFrame, PreprocessedFrame};
use dragnet_core::BoundedQueue;

use crate::client;
use crate::display::{spawn_printer, Render};
use crate::driver::{run_driver, DriverReport};
use crate::edge;
use crate::loader::spawn_loader;
use crate::server::{spawn_accept_pool, SessionConfig};
use crate::wire;

/// Queue capacity for the disk and socket pipelines.
const QUEUE_CAPACITY: usize = 64;
/// Queue capacity for the edge partial pipeline.
const EDGE_QUEUE_CAPACITY: usize = 32;

fn join_stage<T>(handle: JoinHandle<Result<T>>, stage: &str) -> Result<T> {
    match handle.join() {
        Ok(result) => result.with_context(|| format!("{stage} stage failed")),
        Err(_) => Err(anyhow!("{stage} thread panicked")),
    }
}

/// Local detection: disk loader feeding the full network on this machine.
pub fn run_local(
    paths: Vec<PathBuf>,
    net: &mut dyn Network,
    params: BoxParams,
    renderer: Option<Box<dyn Render>>,
) -> Result<DriverReport> {
    let shape = net.input_shape();
    let images = paths.len();
    let start = Instant::now();

    let queue = Arc::new(BoundedQueue::new(QUEUE_CAPACITY));
    let loader = spawn_loader(paths, (shape.height, shape.width), Arc::clone(&queue));

    let (out, printer) = match renderer {
        Some(renderer) => {
            let out = Arc::new(BoundedQueue::new(QUEUE_CAPACITY));
            let printer = spawn_printer(Arc::clone(&out), renderer);
            (Some(out), Some(printer))
        }
        None => (None, None),
    };

    let report = run_driver(&queue, net, params, 1, out.as_deref());

    join_stage(loader, "loader")?;
    if let Some(printer) = printer {
        printer.join().map_err(|_| anyhow!("printer thread panicked"))?;
    }

    info!(
        images,
        secs = start.elapsed().as_secs_f64(),
        fps = images as f64 / start.elapsed().as_secs_f64(),
        "local detection finished"
    );
    Ok(report)
}

/// Camera client: stream letterboxed frames to a remote server at `fps`.
pub fn run_client(
    paths: Vec<PathBuf>,
    target: (u32, u32),
    host: &str,
    port: u16,
    fps: f64,
) -> Result<()> {
    wire::ignore_sigpipe();

    let mut stream = client::connect(host, port)?;

    let queue = Arc::new(BoundedQueue::new(QUEUE_CAPACITY));
    let loader = spawn_loader(paths, target, Arc::clone(&queue));

    let send_result = client::run_sender(&queue, &mut stream, fps);
    let load_result = join_stage(loader, "loader");
    send_result?;
    load_result
}

/// Inference server: `expected_clients` workers share `listener`, the driver
/// drains their queue until every session has ended.
///
/// `partial` selects split mode: sessions then carry edge features after
/// each frame, sized by the network's input volume, and `frame` gives the
/// camera frame dimensions (in normal mode frames are the network input and
/// `frame` must match its shape).
pub fn run_server(
    listener: TcpListener,
    net: &mut dyn Network,
    expected_clients: usize,
    frame: (u32, u32),
    partial: bool,
    params: BoxParams,
    renderer: Option<Box<dyn Render>>,
) -> Result<DriverReport> {
    wire::ignore_sigpipe();

    let cfg = SessionConfig {
        frame_h: frame.0,
        frame_w: frame.1,
        prep_floats: if partial { net.input_shape().volume() } else { 0 },
    };

    let queue = Arc::new(BoundedQueue::new(QUEUE_CAPACITY));
    let workers = spawn_accept_pool(Arc::new(listener), expected_clients, cfg, &queue);
    info!(workers = expected_clients, "awaiting connections");

    let (out, printer) = match renderer {
        Some(renderer) => {
            let out = Arc::new(BoundedQueue::new(QUEUE_CAPACITY));
            let printer = spawn_printer(Arc::clone(&out), renderer);
            (Some(out), Some(printer))
        }
        None => (None, None),
    };

    let report = run_driver(&queue, net, params, expected_clients, out.as_deref());

    // A failed session already pushed its end marker; it only costs that
    // client's remaining frames, never the run.
    for (tid, worker) in workers.into_iter().enumerate() {
        if let Err(e) = join_stage(worker, "session") {
            warn!(client = tid, error = %e, "session failed");
        }
    }
    if let Some(printer) = printer {
        printer.join().map_err(|_| anyhow!("printer thread panicked"))?;
    }
    Ok(report)
}

/// Edge node of the split pipeline: load, run the edge layers, forward
/// `frame || features` records to the server.
pub fn run_edge(
    paths: Vec<PathBuf>,
    net: Box<dyn Network>,
    host: &str,
    port: u16,
) -> Result<()> {
    wire::ignore_sigpipe();

    let shape = net.input_shape();
    let images = paths.len();
    let start = Instant::now();

    let mut stream = client::connect(host, port)?;

    let loaded: Arc<BoundedQueue<Item<LoadedFrame>>> =
        Arc::new(BoundedQueue::new(EDGE_QUEUE_CAPACITY));
    let preprocessed: Arc<BoundedQueue<Item<PreprocessedFrame>>> =
        Arc::new(BoundedQueue::new(EDGE_QUEUE_CAPACITY));

    let loader = spawn_loader(paths, (shape.height, shape.width), Arc::clone(&loaded));
    let partial = edge::spawn_partial_detector(loaded, Arc::clone(&preprocessed), net);

    let forward_result = edge::run_forwarder(&preprocessed, &mut stream);
    let load_result = join_stage(loader, "loader");
    let partial_result = join_stage(partial, "partial detector");
    forward_result?;
    partial_result?;
    load_result?;

    info!(
        images,
        secs = start.elapsed().as_secs_f64(),
        fps = images as f64 / start.elapsed().as_secs_f64(),
        "edge preprocessing finished"
    );
    Ok(())
}
