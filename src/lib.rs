//! Overlay Link
//!
//! Streams world updates and transient draw commands from a producer process
//! to an overlay renderer through a shared-memory ring buffer.
//!
//! The renderer side starts an [`OverlayClient`], polls
//! [`OverlayClient::draw_commands`] once per frame and reads the camera pose
//! from its [`CameraSink`]. The producer side writes packets with an
//! [`OverlayProducer`].

pub mod loopback;

pub use overlay_link_core as protocol;
pub use overlay_link_shared_memory as transport;

pub use overlay_link_core::prelude::*;
pub use overlay_link_core::{MetricsSnapshot, TransportMetrics};
pub use overlay_link_shared_memory::{
    ConsumerState, LocalSignal, NamedSignal, OverlayClient, OverlayProducer, RingBuffer, SharedMemoryError, Signal,
    TransportConfig,
};
