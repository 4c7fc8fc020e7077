//! Producer side of the ring

use crate::{NamedSignal, Result, RingBuffer, SharedMemoryError, SharedMemoryRegion, Signal, TransportConfig};
use overlay_link_core::{MetricsSnapshot, Packet, TransportMetrics};
use std::sync::Arc;
use tracing::{debug, trace};

/// Writes framed packets and wakes the consumer.
///
/// Never blocks: a frame that does not fit is dropped and counted.
pub struct OverlayProducer {
    ring: Arc<RingBuffer>,
    signal: Arc<dyn Signal>,
    metrics: Arc<TransportMetrics>,
}

impl OverlayProducer {
    /// Create (or attach to) the named segment and signal
    pub fn create(config: &TransportConfig) -> Result<Self> {
        config.validate()?;

        let signal = NamedSignal::create(config.signal_name.as_str())?;
        let region = SharedMemoryRegion::open_or_create(
            config.segment_name.as_str(),
            RingBuffer::required_size(config.buffer_capacity),
        )?;
        debug!(
            "Producer {} segment {}",
            if region.is_creator() { "created" } else { "attached to" },
            region.name()
        );
        let ring = RingBuffer::from_region(region, config.buffer_capacity)?;

        Ok(Self::from_parts(Arc::new(ring), Arc::new(signal), Arc::new(TransportMetrics::new())))
    }

    /// Build on an existing ring; unread bytes left by an earlier producer are abandoned.
    ///
    /// Resetting `head` to `tail` assumes the consumer is not mid-drain. A
    /// consumer that stores its `tail` after this reset moves it past `head`
    /// and reads stale bytes as a near-full ring. A restarting producer must
    /// attach while the consumer is idle, for instance by waiting one consumer
    /// wait timeout after the previous producer's last send.
    pub fn from_parts(ring: Arc<RingBuffer>, signal: Arc<dyn Signal>, metrics: Arc<TransportMetrics>) -> Self {
        ring.store_head(ring.load_tail());
        Self { ring, signal, metrics }
    }

    /// Encode and publish one packet
    pub fn send(&self, packet: &Packet) -> Result<()> {
        self.send_frame(&packet.encode())
    }

    /// Publish raw frame bytes as one unit
    pub fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let capacity = self.ring.capacity();
        if frame.len() > capacity - 1 {
            self.metrics.record_producer_drop();
            return Err(SharedMemoryError::PacketTooLarge {
                size: frame.len(),
                capacity,
            });
        }

        let available = self.ring.writable();
        if frame.len() > available {
            self.metrics.record_producer_drop();
            trace!("Ring full, dropping {} byte frame", frame.len());
            return Err(SharedMemoryError::BufferFull {
                needed: frame.len(),
                available,
            });
        }

        let head = self.ring.load_head();
        self.ring.write_at(head, frame)?;
        self.ring.store_head(head + frame.len());
        self.signal.notify()
    }

    /// Bytes written but not yet consumed
    pub fn pending(&self) -> usize {
        self.ring.readable()
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for OverlayProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayProducer").field("ring", &self.ring).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalSignal;
    use overlay_link_core::{PacketHeader, WorldUpdate};
    use std::time::Duration;

    fn producer(capacity: usize) -> (OverlayProducer, Arc<LocalSignal>) {
        let signal = Arc::new(LocalSignal::new());
        let producer = OverlayProducer::from_parts(
            Arc::new(RingBuffer::new(capacity).unwrap()),
            signal.clone(),
            Arc::new(TransportMetrics::new()),
        );
        (producer, signal)
    }

    #[test]
    fn test_send_publishes_and_signals() {
        let (producer, signal) = producer(64);
        producer.send(&Packet::ClearAllDrawings).unwrap();

        assert_eq!(producer.pending(), PacketHeader::SIZE);
        assert!(signal.wait_timeout(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_full_ring_drops_frame() {
        let (producer, _) = producer(64);
        let frame = Packet::WorldUpdate(WorldUpdate::default()).encode();

        // 33-byte frames: one fits in the 63 usable bytes, a second does not
        producer.send_frame(&frame).unwrap();
        assert!(matches!(
            producer.send_frame(&frame),
            Err(SharedMemoryError::BufferFull { needed: 33, available: 30 })
        ));
        assert_eq!(producer.pending(), 33);
        assert_eq!(producer.metrics().producer_drops, 1);
    }

    #[test]
    fn test_frame_larger_than_ring_is_rejected() {
        let (producer, _) = producer(16);
        assert!(matches!(
            producer.send_frame(&[0u8; 16]),
            Err(SharedMemoryError::PacketTooLarge { size: 16, capacity: 16 })
        ));
        assert!(producer.send_frame(&[0u8; 15]).is_ok());
    }

    #[test]
    fn test_attach_abandons_unread_bytes() {
        let ring = Arc::new(RingBuffer::new(64).unwrap());
        ring.store_head(40);
        ring.store_tail(12);

        let producer = OverlayProducer::from_parts(ring, Arc::new(LocalSignal::new()), Arc::new(TransportMetrics::new()));
        assert_eq!(producer.pending(), 0);
        assert_eq!(producer.ring().load_head(), 12);
    }

    #[test]
    fn test_reattach_after_idle_consumer_resumes_cleanly() {
        use overlay_link_core::{CommandStore, PacketDispatcher, SharedCamera};

        let ring = Arc::new(RingBuffer::new(64).unwrap());
        let metrics = Arc::new(TransportMetrics::new());
        let store = Arc::new(CommandStore::new(8));
        let mut dispatcher = PacketDispatcher::new(Arc::clone(&store), Arc::new(SharedCamera::new()), Arc::clone(&metrics));

        // First producer leaves a frame the consumer never reads
        let first = OverlayProducer::from_parts(Arc::clone(&ring), Arc::new(LocalSignal::new()), Arc::clone(&metrics));
        first.send(&Packet::WorldUpdate(WorldUpdate::default())).unwrap();
        drop(first);

        // Consumer is idle between drains while the replacement attaches
        let second = OverlayProducer::from_parts(Arc::clone(&ring), Arc::new(LocalSignal::new()), Arc::clone(&metrics));
        assert_eq!(second.pending(), 0);
        second.send(&Packet::ClearAllDrawings).unwrap();

        let report = crate::drain_pending(&ring, &mut dispatcher, &metrics);
        assert_eq!(report, crate::DrainReport { dispatched: 1, dropped: 0, flushed: false });
        assert_eq!(ring.load_tail(), ring.load_head());
        assert_eq!(ring.readable(), 0);
    }
}
