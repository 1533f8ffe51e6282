// crates/dragnet-cli/src/nullnet.rs
//
// A detector backend that detects nothing. It exists so the fabric can be
// exercised end to end (queues, sockets, batching, termination) without
// linking a real model; a deployment swaps this for an implementation of
// `dragnet_core::Network` over its inference runtime.

use dragnet_core::detect::{Detection, InputShape, Network};

pub struct NullNetwork {
    shape:  InputShape,
    batch:  usize,
    output: Vec<f32>,
}

impl NullNetwork {
    pub fn new(size: u32, batch: usize) -> Self {
        let shape = InputShape { height: size, width: size, channels: 3 };
        Self { shape, batch, output: vec![0.0; shape.volume()] }
    }
}

impl Network for NullNetwork {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn batch_size(&self) -> usize {
        self.batch
    }

    fn classes(&self) -> usize {
        0
    }

    fn predict(&mut self, _input: &[f32]) {}

    fn boxes(
        &mut self,
        _slot: usize,
        _frame_w: u32,
        _frame_h: u32,
        _thresh: f32,
        _hier_thresh: f32,
    ) -> Vec<Detection> {
        Vec::new()
    }

    fn nms_sort(&mut self, _dets: &mut Vec<Detection>, _nms: f32) {}

    fn output(&self) -> &[f32] {
        &self.output
    }
}
