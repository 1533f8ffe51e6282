// crates/dragnet-pipeline/src/testutil.rs
//
// Test-only helpers shared across stage tests: a scripted detector backend
// that records what the driver feeds it, and a tiny PNG writer for loader
// tests that need real files on disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dragnet_core::detect::{BBox, Detection, InputShape, Network};

/// Records every `predict` input and how many slots were extracted per
/// batch; `output()` echoes the last input so split-mode tests can assert
/// the forwarded features byte for byte.
pub struct StubNetwork {
    shape:   InputShape,
    batch:   usize,
    classes: usize,
    last:    Vec<f32>,
    pub calls:           Arc<Mutex<Vec<Vec<f32>>>>,
    pub slots_per_batch: Arc<Mutex<Vec<usize>>>,
}

impl StubNetwork {
    pub fn new(height: u32, width: u32, channels: u32, batch: usize) -> Self {
        Self {
            shape:   InputShape { height, width, channels },
            batch,
            classes: 2,
            last:    Vec::new(),
            calls:           Arc::new(Mutex::new(Vec::new())),
            slots_per_batch: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Network for StubNetwork {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn batch_size(&self) -> usize {
        self.batch
    }

    fn classes(&self) -> usize {
        self.classes
    }

    fn predict(&mut self, input: &[f32]) {
        self.last = input.to_vec();
        self.calls.lock().unwrap().push(input.to_vec());
        self.slots_per_batch.lock().unwrap().push(0);
    }

    fn boxes(
        &mut self,
        slot: usize,
        frame_w: u32,
        frame_h: u32,
        _thresh: f32,
        _hier_thresh: f32,
    ) -> Vec<Detection> {
        *self.slots_per_batch.lock().unwrap().last_mut().unwrap() += 1;
        vec![Detection {
            bbox:       BBox { x: slot as f32, y: 0.0, w: frame_w as f32, h: frame_h as f32 },
            objectness: 0.9,
            prob:       vec![0.8; self.classes],
        }]
    }

    fn nms_sort(&mut self, dets: &mut Vec<Detection>, _nms: f32) {
        dets.sort_by(|a, b| b.objectness.total_cmp(&a.objectness));
    }

    fn output(&self) -> &[f32] {
        &self.last
    }
}

/// Write an 8-bit RGB PNG and return its path. `rgb` is interleaved,
/// `3 * w * h` bytes.
pub fn write_png(dir: &Path, name: &str, w: u32, h: u32, rgb: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder
        .write_header()
        .unwrap()
        .write_image_data(rgb)
        .unwrap();
    path
}
