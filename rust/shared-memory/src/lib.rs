//! Overlay Link - Shared Memory Module
//!
//! Cross-process transport: a single-producer/single-consumer ring buffer in a
//! named shared segment, a named wake-up signal, and the consumer worker that
//! drains the ring into the Command Store.

pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod framing;
pub mod platform;
pub mod producer;
pub mod region;
pub mod ring;
pub mod signal;

pub use client::*;
pub use config::*;
pub use consumer::{drain_pending, ConsumerState, DrainReport};
pub use error::*;
pub use framing::*;
pub use producer::*;
pub use region::*;
pub use ring::*;
pub use signal::*;

/// Re-export platform-specific implementations
pub use platform::*;
