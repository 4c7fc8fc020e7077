//! In-process loopback: a synthetic producer feeding a client
//!
//! Exercises the real shared segment and named signal end to end. The
//! producer ticks at a fixed frame rate on a tokio interval; the render side
//! polls the Command Store on the same cadence.

use anyhow::{Context, Result};
use overlay_link_core::{Color, DrawCommand, MetricsSnapshot, Packet, SharedCamera, Shape, Vec3, ViewAngles, WorldUpdate};
use overlay_link_shared_memory::{OverlayClient, OverlayProducer, PlatformUtils, SharedMemoryError, TransportConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Loopback run settings
#[derive(Debug, Clone)]
pub struct LoopbackOptions {
    /// Stop after this long even without Ctrl-C
    pub run_for: Duration,
    pub frame_interval: Duration,
    pub buffer_capacity: usize,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            run_for: Duration::from_secs(10),
            frame_interval: Duration::from_millis(16),
            buffer_capacity: 256 * 1024,
        }
    }
}

/// What the render side saw
#[derive(Debug, Clone)]
pub struct LoopbackSummary {
    pub frames: u64,
    /// Largest snapshot polled in one frame
    pub peak_commands: usize,
    pub metrics: MetricsSnapshot,
    pub producer_drops: u64,
}

/// Synthetic scene: an orbiting camera, a spinning circle and short-lived labels
fn scene_packets(frame: u64, curtime: f32) -> Vec<Packet> {
    let angle = curtime * 0.5;
    let mut packets = vec![Packet::WorldUpdate(WorldUpdate {
        view_angles: ViewAngles {
            pitch: 15.0,
            yaw: angle.to_degrees() % 360.0,
            roll: 0.0,
        },
        origin: Vec3::new(angle.cos() * 200.0, angle.sin() * 200.0, 64.0),
        curtime,
    })];

    packets.push(Packet::DrawCommand(DrawCommand::new(
        Color::rgba(0, 200, 255, 255),
        0.0,
        Shape::Circle {
            center: Vec3::default(),
            x_axis: Vec3::new(angle.cos(), angle.sin(), 0.0),
            y_axis: Vec3::new(-angle.sin(), angle.cos(), 0.0),
            radius: 48.0,
        },
    )));

    if frame % 10 == 0 {
        packets.push(Packet::DrawCommand(DrawCommand::new(
            Color::rgba(255, 255, 0, 255),
            curtime + 0.5,
            Shape::text(Vec3::new(10.0, 10.0 + (frame % 300) as f32, 0.0), true, &format!("frame {}", frame)),
        )));
    }

    if frame % 600 == 599 {
        packets.push(Packet::ClearAllDrawings);
    }
    packets
}

/// Run producer and client until Ctrl-C or `options.run_for` elapses
pub async fn run(options: LoopbackOptions) -> Result<LoopbackSummary> {
    let config = TransportConfig {
        segment_name: PlatformUtils::generate_region_name("ovl_demo"),
        signal_name: PlatformUtils::generate_region_name("ovl_demo_ev"),
        buffer_capacity: options.buffer_capacity,
        ..TransportConfig::default()
    };

    let producer = OverlayProducer::create(&config).context("Failed to create producer side")?;
    let camera = Arc::new(SharedCamera::new());
    let running = Arc::new(AtomicBool::new(true));
    let mut client = OverlayClient::new(config);
    client
        .start(Arc::clone(&running), camera.clone())
        .context("Failed to start overlay client")?;
    info!("Loopback running for {:?}", options.run_for);

    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.frame_interval);
    let deadline = tokio::time::sleep(options.run_for);
    tokio::pin!(deadline);

    let mut frames = 0u64;
    let mut peak_commands = 0usize;
    let mut last_report = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                let curtime = started.elapsed().as_secs_f32();
                for packet in scene_packets(frames, curtime) {
                    match producer.send(&packet) {
                        Ok(()) => {}
                        Err(SharedMemoryError::BufferFull { .. }) => debug!("Ring full, frame {} packet dropped", frames),
                        Err(e) => warn!("Producer error: {}", e),
                    }
                }

                // Render-side poll
                let commands = client.draw_commands();
                peak_commands = peak_commands.max(commands.len());
                frames += 1;

                if last_report.elapsed() >= Duration::from_secs(1) {
                    last_report = Instant::now();
                    let pose = camera.pose();
                    info!(
                        "t={:.1}s commands={} camera={:?} state={:?}",
                        curtime,
                        commands.len(),
                        pose.map(|p| p.position),
                        client.state()
                    );
                }
            }
        }
    }

    running.store(false, Ordering::Release);
    client.stop();

    Ok(LoopbackSummary {
        frames,
        peak_commands,
        metrics: client.metrics(),
        producer_drops: producer.metrics().producer_drops,
    })
}
