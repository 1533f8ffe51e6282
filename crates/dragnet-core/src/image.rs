// crates/dragnet-core/src/image.rs
//
// Types that flow across the queues between pipeline stages.
// Ownership of the pixel buffers transfers with the value on push; whichever
// stage holds a frame is the one responsible for it.

use crate::detect::Detection;

/// Number of color channels every real frame carries.
pub const CHANNELS: u32 = 3;

/// A raw image: planar f32 pixels, channel-major planes of `height * width`.
///
/// Pixel `(c, y, x)` lives at `data[c * h * w + y * w + x]`. Values are
/// normalized to `[0, 1]`.
#[derive(Clone)]
pub struct Image {
    pub width:    u32,
    pub height:   u32,
    pub channels: u32,
    pub data:     Vec<f32>,
}

impl Image {
    /// Zero-filled image of the given dimensions.
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        let len = (width * height * channels) as usize;
        Self { width, height, channels, data: vec![0.0; len] }
    }

    /// Wrap an existing pixel buffer. `data.len()` must equal `w * h * c`.
    pub fn from_data(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height * channels) as usize);
        Self { width, height, channels, data }
    }

    /// Total number of floats in the buffer.
    pub fn volume(&self) -> usize {
        self.data.len()
    }

    pub fn at(&self, c: u32, y: u32, x: u32) -> f32 {
        self.data[((c * self.height + y) * self.width + x) as usize]
    }

    pub fn set(&mut self, c: u32, y: u32, x: u32, v: f32) {
        self.data[((c * self.height + y) * self.width + x) as usize] = v;
    }
}

/// One element of a stage queue: either a frame or a producer's end-of-stream
/// marker. `source` identifies the producer (server worker id; 0 for the
/// single-producer stages), so a shared queue can count how many of its
/// producers have finished.
pub enum Item<T> {
    Frame(T),
    End { source: usize },
}

impl<T> Item<T> {
    pub fn is_end(&self) -> bool {
        matches!(self, Item::End { .. })
    }
}

/// Output of the disk loader: the original image plus its letterboxed resize
/// at the detector's input dimensions.
pub struct LoadedFrame {
    pub original: Image,
    pub resized:  Image,
}

/// Output of the edge partial detector: the letterboxed input frame and the
/// activations of the last edge-side layer, ready to forward to the server.
pub struct PreprocessedFrame {
    pub frame:    Image,
    pub features: Vec<f32>,
}

/// One frame as received by a server worker from its client.
///
/// `image_id` starts at 1 and increments per frame delivered on that
/// connection; end-of-stream is signalled out of band by
/// `Item::End { source: client_id }`, never by a magic id.
pub struct ClientFrame {
    pub client_id: usize,
    pub image_id:  u64,
    pub frame:     Image,
    /// Present when the client runs the split pipeline and ships the edge
    /// layers' output alongside the frame.
    pub features:  Option<Vec<f32>>,
}

/// A frame that has been through the detector, ready for rendering.
pub struct ProcessedFrame {
    pub image:      Image,
    pub detections: Vec<Detection>,
}
