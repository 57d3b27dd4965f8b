//! Parallel synthesis of text chunks.
//!
//! Chunks are handed to the synthesizer through a bounded pool of tokio
//! tasks and reassembled in their original order before anything downstream
//! sees them.

pub mod control;
pub mod scheduler;

pub use control::{CancelHandle, Interrupt, RunControl};
pub use scheduler::{synthesize_chunks, SynthesisProgress};
