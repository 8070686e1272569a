//! Road segmentation command line tools
//!
//! This crate wires the `roadseg` library into two binaries.
//!
//! ## Available Binaries
//!
//! - `train`: Train the patch classifier (or restore it) and write predictions
//!   for the training and test images
//! - `predict`: Segment single images or directories with a saved checkpoint
//!
//! ## Usage
//!
//! ```bash
//! # Train with the default configuration
//! cargo run --release --bin train -- --data-dir training --test-dir test_set_images
//!
//! # Reuse the saved checkpoint instead of training
//! cargo run --release --bin train -- --config run.json --restore
//!
//! # Segment a directory of images
//! cargo run --release --bin predict -- checkpoints/model.mpk images/ --output outputs/
//! ```
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

pub mod backend;
pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

// Re-export commonly used items
pub use backend::{
    create_device, get_backend_name, SelectedBackend, SelectedDevice, TrainingBackend,
};
pub use config::RunConfig;

/// Installs the global `tracing` subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
