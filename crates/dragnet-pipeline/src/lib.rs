// crates/dragnet-pipeline/src/lib.rs
//
// The concurrent staging, batching, and dispatch fabric: every stage that
// sits between image producers (disk loaders, network clients) and the
// detector, and between the detector and the result consumers.
//
// Stages are plain OS threads joined by `dragnet_core::BoundedQueue`s.
// Termination is cooperative: each producer pushes one `Item::End` when its
// stream runs dry, and consumers count ends instead of being cancelled.

pub mod client;
pub mod codec;
pub mod display;
pub mod driver;
pub mod edge;
pub mod loader;
pub mod server;
pub mod topology;
pub mod wire;

pub use driver::{run_driver, BatchInput, DriverReport};
pub use topology::{run_client, run_edge, run_local, run_server};

#[cfg(test)]
pub(crate) mod testutil;
