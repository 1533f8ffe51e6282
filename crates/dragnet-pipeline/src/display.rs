// crates/dragnet-pipeline/src/display.rs
//
// Post-processing stage: optional downstream consumer of processed frames.
// Rendering itself (box drawing, windows) is an external concern behind the
// `Render` trait; the stage only owns the drain loop and teardown order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use dragnet_core::detect::Detection;
use dragnet_core::image::{Image, Item, ProcessedFrame};
use dragnet_core::BoundedQueue;

/// Sink for annotated frames. Dropped when the stream ends, so renderer
/// teardown (closing windows, flushing files) belongs in `Drop`.
pub trait Render: Send {
    fn draw(&mut self, frame: &Image, detections: &[Detection]);
}

/// A renderer that reports detections through the log instead of a window.
/// `names` maps class indices to labels; unknown indices print the index.
pub struct DetectionLog {
    pub thresh: f32,
    pub names:  Vec<String>,
}

impl Render for DetectionLog {
    fn draw(&mut self, frame: &Image, detections: &[Detection]) {
        for det in detections {
            if let Some(class) = det.best_class(self.thresh) {
                let label = self
                    .names
                    .get(class)
                    .map(String::as_str)
                    .unwrap_or("?");
                info!(
                    w = frame.width,
                    h = frame.height,
                    class,
                    label,
                    objectness = det.objectness,
                    "detection"
                );
            }
        }
    }
}

/// Spawn the printer thread: drain `queue` through `renderer` until the end
/// marker arrives.
pub fn spawn_printer(
    queue: Arc<BoundedQueue<Item<ProcessedFrame>>>,
    mut renderer: Box<dyn Render>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match queue.pop() {
                Item::End { .. } => break,
                Item::Frame(frame) => renderer.draw(&frame.image, &frame.detections),
            }
        }
        // renderer drops here: teardown after the last frame, not before.
    })
}
