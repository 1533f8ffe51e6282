// crates/dragnet-pipeline/src/server.rs
//
// Accept pool and per-client session reader.
//
// N workers share one listening socket; a mutex serialises accept so each
// incoming connection binds to exactly one worker with no thundering herd.
// Each worker serves one client for the lifetime of the run: pipeline
// termination counts exactly N end markers, so workers must not re-accept.
//
// A worker always pushes its `Item::End`, whatever happens to the session:
// clean EOF, a mid-record disconnect, even a failed accept. Errors travel
// out through the join handle; the driver is never left waiting on a
// sentinel that cannot arrive.

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use dragnet_core::image::{ClientFrame, Image, Item, CHANNELS};
use dragnet_core::BoundedQueue;

use crate::wire;

/// Per-session wire parameters, agreed with the clients out of band.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub frame_h: u32,
    pub frame_w: u32,
    /// Floats of edge features following each frame; 0 in normal mode.
    pub prep_floats: usize,
}

impl SessionConfig {
    pub fn frame_floats(&self) -> usize {
        (self.frame_h * self.frame_w * CHANNELS) as usize
    }
}

/// Spawn `workers` accept-pool threads against `listener`. Worker `i` is
/// client id `i`; each serves one session and exits.
pub fn spawn_accept_pool(
    listener: Arc<TcpListener>,
    workers: usize,
    cfg: SessionConfig,
    queue: &Arc<BoundedQueue<Item<ClientFrame>>>,
) -> Vec<JoinHandle<Result<()>>> {
    let accept_lock = Arc::new(Mutex::new(()));

    (0..workers)
        .map(|tid| {
            let listener = Arc::clone(&listener);
            let accept_lock = Arc::clone(&accept_lock);
            let queue = Arc::clone(queue);
            thread::spawn(move || serve_client(tid, &listener, &accept_lock, cfg, &queue))
        })
        .collect()
}

fn serve_client(
    tid: usize,
    listener: &TcpListener,
    accept_lock: &Mutex<()>,
    cfg: SessionConfig,
    queue: &BoundedQueue<Item<ClientFrame>>,
) -> Result<()> {
    let accepted = {
        let _guard = accept_lock.lock().unwrap();
        listener.accept()
    };
    let mut stream = match accepted {
        Ok((stream, peer)) => {
            info!(client = tid, %peer, "accepted");
            stream
        }
        Err(e) => {
            // Still count this worker towards termination.
            queue.push(Item::End { source: tid });
            return Err(e).context("accepting client");
        }
    };

    if let Err(e) = wire::set_keepalive(&stream) {
        warn!(client = tid, error = %e, "could not enable keepalive");
    }

    let result = read_session(tid, &mut stream, cfg, queue);
    queue.push(Item::End { source: tid });
    result
}

/// Read `frame || features` records until the client half-closes.
fn read_session(
    tid: usize,
    stream: &mut TcpStream,
    cfg: SessionConfig,
    queue: &BoundedQueue<Item<ClientFrame>>,
) -> Result<()> {
    let frame_floats = cfg.frame_floats();
    let mut image_id = 0u64;

    loop {
        let data = match wire::read_f32_record(stream, frame_floats) {
            Ok(None) => break, // clean close at the record boundary
            Ok(Some(data)) => data,
            Err(e) => return Err(e).with_context(|| format!("client {tid}: reading frame")),
        };

        let features = if cfg.prep_floats > 0 {
            match wire::read_f32_record(stream, cfg.prep_floats) {
                Ok(Some(features)) => Some(features),
                Ok(None) => {
                    return Err(anyhow!("client {tid}: stream ended between frame and features"))
                }
                Err(e) => return Err(e).with_context(|| format!("client {tid}: reading features")),
            }
        } else {
            None
        };

        image_id += 1;
        queue.push(Item::Frame(ClientFrame {
            client_id: tid,
            image_id,
            frame: Image::from_data(cfg.frame_w, cfg.frame_h, CHANNELS, data),
            features,
        }));
    }

    debug!(client = tid, frames = image_id, "session closed");
    Ok(())
}
