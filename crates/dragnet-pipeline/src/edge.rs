// crates/dragnet-pipeline/src/edge.rs
//
// Split-node pipeline: the edge device runs the first layers of the network
// and ships `frame || features` records to the server, which runs the rest.
//
// Two stages. The partial detector is the only owner of the edge network
// handle; it turns loaded frames into preprocessed ones. The forwarder owns
// the socket and keeps the write-all discipline of the normal client.

use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{debug, info};

use dragnet_core::detect::Network;
use dragnet_core::image::{Item, LoadedFrame, PreprocessedFrame};
use dragnet_core::BoundedQueue;

use crate::wire;

/// Spawn the partial-detector thread: run the edge layers over each loaded
/// frame and queue the feature tensor for forwarding.
pub fn spawn_partial_detector(
    input: Arc<BoundedQueue<Item<LoadedFrame>>>,
    out: Arc<BoundedQueue<Item<PreprocessedFrame>>>,
    mut net: Box<dyn Network>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        loop {
            match input.pop() {
                Item::End { source } => {
                    out.push(Item::End { source });
                    break;
                }
                Item::Frame(frame) => {
                    net.predict(&frame.resized.data);
                    let features = net.output().to_vec();
                    debug!(floats = features.len(), "preprocessed");
                    out.push(Item::Frame(PreprocessedFrame { frame: frame.resized, features }));
                }
            }
        }
        Ok(())
    })
}

/// Forward preprocessed frames over `stream` until the end marker, then
/// half-close so the server sees a clean EOF at a record boundary.
///
/// Like the normal client, a send failure drains the queue to its end
/// marker first so the stages upstream can finish.
pub fn run_forwarder(
    queue: &BoundedQueue<Item<PreprocessedFrame>>,
    stream: &mut TcpStream,
) -> Result<()> {
    let mut scratch = Vec::new();
    let mut sent = 0u64;

    loop {
        match queue.pop() {
            Item::End { .. } => break,
            Item::Frame(prep) => {
                let written = wire::write_f32_record(stream, &prep.frame.data, &mut scratch)
                    .and_then(|()| wire::write_f32_record(stream, &prep.features, &mut scratch));
                if let Err(e) = written {
                    crate::client::drain_to_end(queue);
                    return Err(e).context("sending record");
                }
                sent += 1;
            }
        }
    }

    stream
        .shutdown(Shutdown::Write)
        .context("closing write side")?;
    info!(frames = sent, "edge stream finished");
    Ok(())
}
