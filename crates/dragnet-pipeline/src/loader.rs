// crates/dragnet-pipeline/src/loader.rs
//
// Disk loader stage: walks an ordered path list, decodes and letterboxes
// each image, and feeds the result queue. Runs on its own thread so decode
// overlaps whatever is downstream (detector, network sender).
//
// The end marker is unconditional. Even when a decode fails the stage pushes
// its `Item::End` before surfacing the error through the join handle, so a
// consumer blocked on the queue always wakes up and terminates.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::debug;

use dragnet_core::image::{Item, LoadedFrame};
use dragnet_core::letterbox::letterbox;
use dragnet_core::BoundedQueue;

use crate::codec;

/// Spawn the loader thread. `target` is the detector input `(height, width)`
/// each frame is letterboxed to.
pub fn spawn_loader(
    paths: Vec<PathBuf>,
    target: (u32, u32),
    queue: Arc<BoundedQueue<Item<LoadedFrame>>>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        let result = load_all(&paths, target, &queue);
        queue.push(Item::End { source: 0 });
        result
    })
}

fn load_all(
    paths: &[PathBuf],
    (target_h, target_w): (u32, u32),
    queue: &BoundedQueue<Item<LoadedFrame>>,
) -> Result<()> {
    for path in paths {
        let original = codec::load_image(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let resized = letterbox(&original, target_h, target_w);
        debug!(path = %path.display(), w = original.width, h = original.height, "loaded");
        queue.push(Item::Frame(LoadedFrame { original, resized }));
    }
    Ok(())
}
