//! Consumer side of the ring: drain, decode, dispatch

use crate::framing::{decode_header, decode_payload, ensure_published};
use crate::{RingBuffer, Signal};
use overlay_link_core::{PacketDispatcher, PacketHeader, TransportMetrics};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Consumer worker state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting for the signal or the next timeout
    Idle = 0,
    /// Processing frames between `tail` and `head`
    Draining = 1,
    /// No worker is running
    Stopped = 2,
}

/// Atomically shared [`ConsumerState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConsumerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConsumerState {
        match self.0.load(Ordering::Acquire) {
            0 => ConsumerState::Idle,
            1 => ConsumerState::Draining,
            _ => ConsumerState::Stopped,
        }
    }

    pub fn set(&self, state: ConsumerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub dispatched: usize,
    pub dropped: usize,
    /// The unread region was discarded after a framing error
    pub flushed: bool,
}

/// Process every frame between `tail` and `head`.
///
/// `head` is re-read after each frame so data appended while draining is
/// picked up in the same pass. A framing error discards everything pending
/// (`tail = head`); a payload error drops one frame and skips its declared size.
pub fn drain_pending(ring: &RingBuffer, dispatcher: &mut PacketDispatcher, metrics: &TransportMetrics) -> DrainReport {
    let mut report = DrainReport::default();
    let mut tail = ring.load_tail();

    loop {
        let head = ring.load_head();
        if tail == head {
            break;
        }
        let available = head.wrapping_sub(tail) & ring.mask();

        let header = match decode_header(ring, tail).and_then(|h| ensure_published(&h, available).map(|_| h)) {
            Ok(header) => header,
            Err(err) => {
                warn!("{}; discarding {} pending bytes", err, available);
                ring.store_tail(head);
                metrics.record_flush();
                metrics.record_consumed(available);
                report.flushed = true;
                break;
            }
        };

        let data_start = (tail + PacketHeader::SIZE) & ring.mask();
        match decode_payload(ring, data_start, &header) {
            Ok(packet) => {
                debug!("Dispatching {:?} packet at offset {}", packet.kind(), tail);
                dispatcher.dispatch(packet);
                report.dispatched += 1;
            }
            Err(err) => {
                warn!("Dropping packet at offset {}: {}", tail, err);
                metrics.record_drop();
                report.dropped += 1;
            }
        }

        tail = (tail + header.frame_len()) & ring.mask();
        ring.store_tail(tail);
        metrics.record_consumed(header.frame_len());
    }

    report
}

/// Everything the worker thread owns
pub(crate) struct ConsumerLoop {
    pub ring: Arc<RingBuffer>,
    pub signal: Arc<dyn Signal>,
    pub dispatcher: PacketDispatcher,
    pub metrics: Arc<TransportMetrics>,
    pub state: Arc<StateCell>,
    /// Owner's liveness flag
    pub running: Arc<AtomicBool>,
    /// Set by `stop()`
    pub stop: Arc<AtomicBool>,
    pub wait_timeout: Duration,
}

impl ConsumerLoop {
    fn is_live(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.stop.load(Ordering::Acquire)
    }

    pub fn run(mut self) {
        info!("Consumer worker started (capacity {} bytes)", self.ring.capacity());

        while self.is_live() {
            self.state.set(ConsumerState::Idle);

            if let Err(e) = self.signal.wait_timeout(self.wait_timeout) {
                warn!("Signal wait failed: {}", e);
                std::thread::sleep(self.wait_timeout);
            }

            // Drain after a timeout too, so a lost wake-up costs one timeout
            if !self.is_live() {
                break;
            }
            if self.ring.load_tail() != self.ring.load_head() {
                self.state.set(ConsumerState::Draining);
                let report = drain_pending(&self.ring, &mut self.dispatcher, &self.metrics);
                debug!(
                    "Drained {} packets ({} dropped, flushed: {})",
                    report.dispatched, report.dropped, report.flushed
                );
            }
        }

        self.state.set(ConsumerState::Stopped);
        info!("Consumer worker stopped");
    }
}
