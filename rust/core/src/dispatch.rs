//! Applies decoded packets to the command store and camera

use crate::camera::{CameraPose, CameraSink};
use crate::metrics::TransportMetrics;
use crate::packet::{Packet, WorldUpdate};
use crate::store::CommandStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consumer-side packet handler.
///
/// Owns the last observed producer clock; packets must be fed in ring order.
pub struct PacketDispatcher {
    store: Arc<CommandStore>,
    camera: Arc<dyn CameraSink>,
    metrics: Arc<TransportMetrics>,
    last_time: f32,
}

impl PacketDispatcher {
    pub fn new(
        store: Arc<CommandStore>,
        camera: Arc<dyn CameraSink>,
        metrics: Arc<TransportMetrics>,
    ) -> Self {
        Self {
            store,
            camera,
            metrics,
            last_time: 0.0,
        }
    }

    /// Latest `curtime` seen in a world update
    pub fn last_time(&self) -> f32 {
        self.last_time
    }

    pub fn store(&self) -> &Arc<CommandStore> {
        &self.store
    }

    pub fn dispatch(&mut self, packet: Packet) {
        match packet {
            Packet::WorldUpdate(update) => self.apply_world_update(&update),
            Packet::DrawCommand(command) => {
                if self.store.insert(command).is_some() {
                    self.metrics.record_eviction();
                }
            }
            Packet::ClearAllDrawings => {
                let removed = self.store.clear();
                debug!("Cleared {} draw commands", removed);
            }
        }
        self.metrics.record_dispatch();
    }

    fn apply_world_update(&mut self, update: &WorldUpdate) {
        // NaN would defeat every later regression check
        if !update.curtime.is_finite() {
            warn!("Ignoring world update with non-finite clock {}", update.curtime);
            return;
        }
        if update.curtime < self.last_time {
            // Producer restarted: nothing drawn under the old clock is valid.
            let removed = self.store.clear();
            self.metrics.record_clock_regression();
            info!(
                "Producer clock went from {} to {}, flushed {} draw commands",
                self.last_time, update.curtime, removed
            );
        }
        self.last_time = update.curtime;

        let expired = self.store.expire(self.last_time);
        if expired > 0 {
            debug!("Expired {} draw commands at {}", expired, self.last_time);
        }

        self.camera.update_pose(CameraPose::from_world_update(update));
    }
}
