// crates/dragnet-pipeline/src/client.rs
//
// Network client stage: drains a loader queue and streams each letterboxed
// frame to the server as one wire record, optionally paced to a target FPS.
//
// Pacing is a plain sleep between frames; there is no catch-up when a send
// runs long and no bursting. The server learns the stream is over from the
// half-close after the loader's end marker.

use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use dragnet_core::image::{Item, LoadedFrame};
use dragnet_core::BoundedQueue;

use crate::wire;

/// Resolve `host:port` and connect to the first address that accepts.
pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}:{port}"))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                info!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e).with_context(|| format!("connecting to {host}:{port}")),
        None => bail!("{host}:{port} resolved to no addresses"),
    }
}

/// Send every frame from `queue` over `stream`, then half-close the write
/// side. `fps <= 0` disables pacing.
///
/// On a send failure the queue is still drained to its end marker before
/// the error is returned, so an upstream loader blocked on a full queue
/// always gets to finish.
pub fn run_sender(
    queue: &BoundedQueue<Item<LoadedFrame>>,
    stream: &mut TcpStream,
    fps: f64,
) -> Result<()> {
    let pause = (fps > 0.0).then(|| Duration::from_micros((1e6 / fps) as u64));
    let mut scratch = Vec::new();
    let mut sent = 0u64;

    loop {
        match queue.pop() {
            Item::End { .. } => break,
            Item::Frame(frame) => {
                if let Err(e) = wire::write_f32_record(stream, &frame.resized.data, &mut scratch)
                {
                    drain_to_end(queue);
                    return Err(e).context("sending frame");
                }
                sent += 1;
                debug!(frame = sent, bytes = frame.resized.volume() * 4, "sent");
                if let Some(pause) = pause {
                    thread::sleep(pause);
                }
            }
        }
    }

    stream
        .shutdown(Shutdown::Write)
        .context("closing write side")?;
    info!(frames = sent, "stream finished");
    Ok(())
}

/// Discard queued frames until the producer's end marker arrives.
pub(crate) fn drain_to_end<T>(queue: &BoundedQueue<Item<T>>) {
    while !queue.pop().is_end() {}
}
