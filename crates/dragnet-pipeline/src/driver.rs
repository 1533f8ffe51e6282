// crates/dragnet-pipeline/src/driver.rs
//
// Batch assembler / detector driver: the sole consumer of a pipeline's
// input queue and the only stage that touches the network handle.
//
// Per iteration it fills the preallocated batch tensor slot by slot,
// runs `predict` once, then extracts and routes per-slot boxes. End
// markers can arrive interleaved with frames from any producer; the fill
// loop counts them without consuming a slot, and the driver is done once
// every expected producer has ended.
//
// A batch cut short by the final end marker still runs: only the occupied
// slots are extracted, so no trailing frames are orphaned.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use dragnet_core::detect::{BoxParams, Network};
use dragnet_core::image::{ClientFrame, Image, Item, LoadedFrame, ProcessedFrame};
use dragnet_core::BoundedQueue;

/// A frame type the driver can place into a batch slot.
pub trait BatchInput: Send + 'static {
    /// The floats copied into this slot of the batch tensor. Length must
    /// equal the network's per-slot input volume.
    fn tensor(&self) -> &[f32];

    /// The image downstream annotates; its dimensions scale the boxes.
    fn into_image(self) -> Image;
}

impl BatchInput for LoadedFrame {
    fn tensor(&self) -> &[f32] {
        &self.resized.data
    }

    fn into_image(self) -> Image {
        self.original
    }
}

impl BatchInput for ClientFrame {
    /// Split-mode clients ship edge features; those feed the batch instead
    /// of the pixels.
    fn tensor(&self) -> &[f32] {
        match &self.features {
            Some(features) => features,
            None => &self.frame.data,
        }
    }

    fn into_image(self) -> Image {
        self.frame
    }
}

/// End-of-run accounting, logged and returned to the topology.
#[derive(Debug, Default)]
pub struct DriverReport {
    pub frames:  usize,
    pub batches: usize,
    pub elapsed: Duration,
}

/// Drive the detector until `expected_ends` producers have finished.
///
/// When `out` is present every processed frame is forwarded there and one
/// `Item::End` follows the last; otherwise results are logged and dropped.
pub fn run_driver<T: BatchInput>(
    input: &BoundedQueue<Item<T>>,
    net: &mut dyn Network,
    params: BoxParams,
    expected_ends: usize,
    out: Option<&BoundedQueue<Item<ProcessedFrame>>>,
) -> DriverReport {
    let batch_size = net.batch_size();
    let stride = net.input_shape().volume();

    let mut batch_tensor = vec![0f32; batch_size * stride];
    let mut slots: Vec<Option<T>> = (0..batch_size).map(|_| None).collect();

    let mut ends_seen = 0usize;
    let mut done = false;
    let mut report = DriverReport::default();
    let mut started: Option<Instant> = None;

    while !done {
        // Fill. An end marker does not consume a slot: other producers may
        // still deliver, so the slot index only advances on a frame.
        let mut filled = 0;
        while filled < batch_size {
            match input.pop() {
                Item::End { source } => {
                    ends_seen += 1;
                    debug!(source, ends_seen, expected_ends, "producer finished");
                    if ends_seen == expected_ends {
                        done = true;
                        break;
                    }
                }
                Item::Frame(frame) => {
                    debug_assert_eq!(frame.tensor().len(), stride);
                    if batch_size > 1 {
                        batch_tensor[filled * stride..(filled + 1) * stride]
                            .copy_from_slice(frame.tensor());
                    }
                    slots[filled] = Some(frame);
                    filled += 1;
                }
            }
        }

        if filled == 0 {
            break; // done, nothing pending
        }

        let batch_start = Instant::now();
        started.get_or_insert(batch_start);

        // Predict. With a batch of one the frame's own buffer is the batch
        // tensor; no copy was made above.
        if batch_size == 1 {
            net.predict(slots[0].as_ref().unwrap().tensor());
        } else {
            net.predict(&batch_tensor);
        }

        // Extract and route the occupied slots.
        for b in 0..filled {
            let frame = slots[b].take().unwrap();
            let image = frame.into_image();
            let mut detections =
                net.boxes(b, image.width, image.height, params.thresh, params.hier_thresh);
            if params.nms > 0.0 {
                net.nms_sort(&mut detections, params.nms);
            }
            match out {
                Some(queue) => queue.push(Item::Frame(ProcessedFrame { image, detections })),
                None => debug!(slot = b, boxes = detections.len(), "frame processed"),
            }
        }

        report.frames += filled;
        report.batches += 1;
        debug!(
            batch = report.batches,
            frames = filled,
            bps = 1.0 / batch_start.elapsed().as_secs_f64(),
            "batch complete"
        );
    }

    if let Some(start) = started {
        report.elapsed = start.elapsed();
    }
    info!(
        frames = report.frames,
        batches = report.batches,
        secs = report.elapsed.as_secs_f64(),
        "detector drained"
    );

    if let Some(queue) = out {
        queue.push(Item::End { source: 0 });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubNetwork;
    use std::sync::Arc;
    use std::thread;

    fn frame(fill: f32, volume: usize) -> LoadedFrame {
        let side = (volume / 3) as u32; // tests use 1xN strips, channels=3
        LoadedFrame {
            original: Image::new(side, 1, 3),
            resized:  Image::from_data(side, 1, 3, vec![fill; volume]),
        }
    }

    #[test]
    fn single_frame_single_batch() {
        // S1: one 1x1x3 frame, batch of one, exactly one predict call fed
        // with the frame's own tensor (the no-copy path).
        let mut net = StubNetwork::new(1, 1, 3, 1);
        let queue = BoundedQueue::new(4);
        queue.push(Item::Frame(frame(0.7, 3)));
        queue.push(Item::End { source: 0 });

        let report = run_driver(&queue, &mut net, BoxParams::default(), 1, None);

        assert_eq!(report.frames, 1);
        assert_eq!(report.batches, 1);
        let calls = net.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![0.7; 3]);
    }

    #[test]
    fn pointer_swap_path_matches_copy_path() {
        // The batch-of-1 fast path must feed predict the same floats the
        // copy path would have staged.
        let input = frame(0.3, 3);
        let staged = input.tensor().to_vec();

        let mut net = StubNetwork::new(1, 1, 3, 1);
        let queue = BoundedQueue::new(4);
        queue.push(Item::Frame(input));
        queue.push(Item::End { source: 0 });
        run_driver(&queue, &mut net, BoxParams::default(), 1, None);

        assert_eq!(net.calls.lock().unwrap()[0], staged);
    }

    #[test]
    fn ten_frames_batch_four_runs_the_partial_batch() {
        // S2: 10 frames at batch size 4 -> predict on 4, 4, then 2. The
        // final partial batch runs instead of orphaning its frames.
        let mut net = StubNetwork::new(1, 1, 3, 4);
        let queue = Arc::new(BoundedQueue::new(64));
        for n in 0..10 {
            queue.push(Item::Frame(frame(n as f32, 3)));
        }
        queue.push(Item::End { source: 0 });

        let report = run_driver(&queue, &mut net, BoxParams::default(), 1, None);

        assert_eq!(report.frames, 10);
        assert_eq!(report.batches, 3);
        assert_eq!(*net.slots_per_batch.lock().unwrap(), vec![4, 4, 2]);
    }

    #[test]
    fn interleaved_ends_do_not_cost_slots() {
        // Two producers: ends arriving between frames are skipped without
        // losing slot accounting, and the driver exits only on the last one.
        let mut net = StubNetwork::new(1, 1, 3, 2);
        let queue = Arc::new(BoundedQueue::new(16));
        queue.push(Item::Frame(frame(1.0, 3)));
        queue.push(Item::End { source: 0 });
        queue.push(Item::Frame(frame(2.0, 3)));
        queue.push(Item::Frame(frame(3.0, 3)));
        queue.push(Item::End { source: 1 });

        let report = run_driver(&queue, &mut net, BoxParams::default(), 2, None);

        assert_eq!(report.frames, 3);
        assert_eq!(*net.slots_per_batch.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn multi_producer_consumes_everything() {
        // Property 5: N producers, k_i frames each; the driver consumes all
        // frames and stops after the N-th end.
        let queue = Arc::new(BoundedQueue::new(8));
        let counts = [5usize, 3, 7];
        let producers: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(p, &k)| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for n in 0..k {
                        queue.push(Item::Frame(frame(n as f32, 3)));
                    }
                    queue.push(Item::End { source: p });
                })
            })
            .collect();

        let mut net = StubNetwork::new(1, 1, 3, 4);
        let report = run_driver(&queue, &mut net, BoxParams::default(), 3, None);
        for handle in producers {
            handle.join().unwrap();
        }

        assert_eq!(report.frames, 15);
    }

    #[test]
    fn forwards_results_then_end() {
        let mut net = StubNetwork::new(1, 1, 3, 2);
        let queue = BoundedQueue::new(8);
        for n in 0..3 {
            queue.push(Item::Frame(frame(n as f32, 3)));
        }
        queue.push(Item::End { source: 0 });

        let out = BoundedQueue::new(8);
        run_driver(&queue, &mut net, BoxParams::default(), 1, Some(&out));

        for _ in 0..3 {
            match out.pop() {
                Item::Frame(processed) => assert_eq!(processed.detections.len(), 1),
                Item::End { .. } => panic!("end arrived early"),
            }
        }
        assert!(out.pop().is_end());
    }
}
