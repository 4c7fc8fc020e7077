//! Consumer-facing client: connects to the producer and owns the worker thread

use crate::consumer::{ConsumerLoop, ConsumerState, StateCell};
use crate::{NamedSignal, Result, RingBuffer, SharedMemoryError, SharedMemoryRegion, Signal, TransportConfig};
use overlay_link_core::{CameraSink, CommandStore, DrawCommand, MetricsSnapshot, PacketDispatcher, TransportMetrics};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, instrument, warn};

/// Name of the consumer thread
pub const WORKER_THREAD_NAME: &str = "overlay-consumer";

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    ring: Arc<RingBuffer>,
    signal: Arc<dyn Signal>,
}

/// Overlay client.
///
/// Owns the Command Store; the render loop polls it once per frame with
/// [`draw_commands`](Self::draw_commands) while a background thread fills it.
pub struct OverlayClient {
    config: TransportConfig,
    store: Arc<CommandStore>,
    metrics: Arc<TransportMetrics>,
    state: Arc<StateCell>,
    worker: Option<Worker>,
}

impl OverlayClient {
    pub fn new(config: TransportConfig) -> Self {
        let store = Arc::new(CommandStore::new(config.max_draw_commands));
        Self {
            config,
            store,
            metrics: Arc::new(TransportMetrics::new()),
            state: Arc::new(StateCell::new(ConsumerState::Stopped)),
            worker: None,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Connect to the producer's signal and segment, then start the worker.
    ///
    /// Fails without side effects if either object is missing.
    #[instrument(skip(self, running, camera), fields(segment = %self.config.segment_name))]
    pub fn start(&mut self, running: Arc<AtomicBool>, camera: Arc<dyn CameraSink>) -> Result<()> {
        if self.worker.is_some() {
            return Err(SharedMemoryError::AlreadyRunning);
        }
        self.config.validate()?;

        let signal = NamedSignal::open(self.config.signal_name.as_str())?;
        let region = SharedMemoryRegion::open(self.config.segment_name.as_str())?;
        let ring = RingBuffer::from_region(region, self.config.buffer_capacity)?;
        info!("Connected to shared segment ({} byte ring)", ring.capacity());

        self.start_with(Arc::new(ring), Arc::new(signal), running, camera)
    }

    /// Start the worker on an already opened ring and signal
    pub fn start_with(
        &mut self,
        ring: Arc<RingBuffer>,
        signal: Arc<dyn Signal>,
        running: Arc<AtomicBool>,
        camera: Arc<dyn CameraSink>,
    ) -> Result<()> {
        if self.worker.is_some() {
            return Err(SharedMemoryError::AlreadyRunning);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker_loop = ConsumerLoop {
            ring: Arc::clone(&ring),
            signal: Arc::clone(&signal),
            dispatcher: PacketDispatcher::new(Arc::clone(&self.store), camera, Arc::clone(&self.metrics)),
            metrics: Arc::clone(&self.metrics),
            state: Arc::clone(&self.state),
            running,
            stop: Arc::clone(&stop),
            wait_timeout: self.config.wait_timeout(),
        };

        self.state.set(ConsumerState::Idle);
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop.run())
            .map_err(|e| {
                self.state.set(ConsumerState::Stopped);
                SharedMemoryError::Io(e)
            })?;

        self.worker = Some(Worker {
            stop,
            handle,
            ring,
            signal,
        });
        Ok(())
    }

    /// Stop the worker and release the segment.
    ///
    /// Order: raise the stop flag, wake the wait, join, unmap, close the signal.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.stop.store(true, Ordering::Release);
        if let Err(e) = worker.signal.notify() {
            warn!("Failed to wake consumer worker: {}", e);
        }
        if worker.handle.join().is_err() {
            warn!("Consumer worker panicked");
        }
        self.state.set(ConsumerState::Stopped);

        drop(worker.ring);
        drop(worker.signal);
        info!("Overlay client stopped");
    }

    /// Whether a worker has been started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Copy of every command currently held
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        self.store.snapshot()
    }

    pub fn state(&self) -> ConsumerState {
        self.state.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for OverlayClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for OverlayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayClient")
            .field("config", &self.config)
            .field("state", &self.state.get())
            .field("commands", &self.store.len())
            .finish()
    }
}
