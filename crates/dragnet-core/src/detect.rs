// crates/dragnet-core/src/detect.rs
//
// The seam between the pipeline fabric and the detector backend.
//
// The fabric never looks inside a network: it preallocates the batch tensor,
// calls `predict`, and asks for per-slot boxes. Everything behind those
// calls (layer math, NMS internals, weight loading) belongs to the backend.
//
// A `Network` handle is NOT thread-safe. Exactly one stage may own it: the
// batch driver in the local and server topologies, the partial detector in
// the edge topology. Every other stage treats it as opaque.

/// Detector input dimensions, per batch slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputShape {
    pub height:   u32,
    pub width:    u32,
    pub channels: u32,
}

impl InputShape {
    /// Floats per batch slot.
    pub fn volume(&self) -> usize {
        (self.height * self.width * self.channels) as usize
    }
}

/// Axis-aligned bounding box in the coordinate space of the frame it was
/// detected in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// One candidate detection: box, per-class probabilities, objectness.
/// Produced and consumed by the backend; the fabric only routes it.
#[derive(Clone, Debug)]
pub struct Detection {
    pub bbox:       BBox,
    pub objectness: f32,
    pub prob:       Vec<f32>,
}

impl Detection {
    /// Index of the most probable class, if any probability clears `thresh`.
    pub fn best_class(&self, thresh: f32) -> Option<usize> {
        self.prob
            .iter()
            .enumerate()
            .filter(|(_, &p)| p > thresh)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

/// Detection thresholds handed down from the command line.
#[derive(Clone, Copy, Debug)]
pub struct BoxParams {
    pub thresh:      f32,
    pub hier_thresh: f32,
    pub nms:         f32,
}

impl Default for BoxParams {
    fn default() -> Self {
        Self { thresh: 0.5, hier_thresh: 0.5, nms: 0.45 }
    }
}

/// A loaded detector backend.
///
/// `predict` is synchronous and is the pipeline's only serialization point:
/// no I/O overlaps GPU work in this design. `boxes` and `nms_sort` are valid
/// for the batch most recently passed to `predict`.
pub trait Network: Send {
    /// Input dimensions of one batch slot. For a split-mode server tail this
    /// is the shape of the edge feature tensor, not of a camera frame.
    fn input_shape(&self) -> InputShape;

    /// Number of slots per `predict` call.
    fn batch_size(&self) -> usize;

    /// Number of classes in the probability vectors.
    fn classes(&self) -> usize;

    /// Run the network on `batch_size * input_shape().volume()` floats
    /// (or a single slot's worth when the driver takes the batch-of-1 path).
    fn predict(&mut self, input: &[f32]);

    /// Boxes for batch slot `slot`, scaled to a `frame_w` x `frame_h` frame.
    fn boxes(
        &mut self,
        slot: usize,
        frame_w: u32,
        frame_h: u32,
        thresh: f32,
        hier_thresh: f32,
    ) -> Vec<Detection>;

    /// Non-max suppression over `dets` at overlap threshold `nms`.
    fn nms_sort(&mut self, dets: &mut Vec<Detection>, nms: f32);

    /// Activations of the final layer after the last `predict`. This is the
    /// tensor the edge node forwards in split mode.
    fn output(&self) -> &[f32];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_counts_floats_per_slot() {
        let shape = InputShape { height: 416, width: 416, channels: 3 };
        assert_eq!(shape.volume(), 416 * 416 * 3);
    }

    #[test]
    fn best_class_respects_threshold() {
        let det = Detection {
            bbox:       BBox { x: 0.0, y: 0.0, w: 1.0, h: 1.0 },
            objectness: 0.9,
            prob:       vec![0.1, 0.7, 0.3],
        };
        assert_eq!(det.best_class(0.5), Some(1));
        assert_eq!(det.best_class(0.8), None);
    }
}
