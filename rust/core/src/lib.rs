//! Overlay Link - Core Module
//!
//! Platform-independent half of the overlay link: the packet model and its
//! binary codec, the time-expiring command store, and the dispatcher that
//! applies decoded packets to the store and the renderer's camera.

pub mod camera;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod store;

pub use camera::*;
pub use dispatch::*;
pub use error::*;
pub use metrics::*;
pub use packet::*;
pub use store::*;

/// Re-export common types
pub mod prelude {
    pub use crate::{
        camera::{CameraPose, CameraSink, SharedCamera},
        dispatch::PacketDispatcher,
        error::{DecodeError, DecodeResult},
        packet::{Color, DrawCommand, Packet, PacketHeader, PacketKind, Shape, Vec3, ViewAngles, WorldUpdate},
        store::CommandStore,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
