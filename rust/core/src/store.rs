//! Bounded, time-expiring store of decoded draw commands

use crate::packet::DrawCommand;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default number of commands kept before the oldest is evicted
pub const DEFAULT_MAX_DRAW_COMMANDS: usize = 20_000;

/// Thread-safe FIFO of draw commands.
///
/// Every operation takes the lock for its own duration only; readers get a
/// full copy through [`CommandStore::snapshot`] and never hold a reference
/// into the store.
#[derive(Debug)]
pub struct CommandStore {
    entries: Mutex<VecDeque<DrawCommand>>,
    capacity: usize,
}

impl CommandStore {
    /// Create a store holding at most `capacity` commands (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Append a command, evicting the oldest one first when full.
    ///
    /// Returns the evicted command, if any.
    pub fn insert(&self, command: DrawCommand) -> Option<DrawCommand> {
        let mut entries = self.entries.lock();
        let evicted = if entries.len() >= self.capacity {
            entries.pop_front()
        } else {
            None
        };
        entries.push_back(command);
        evicted
    }

    /// Remove every command that has expired at `curtime`.
    ///
    /// A command with `draw_end_time <= 0` lives for one tick: it survives
    /// while `curtime` is still zero and goes once the clock has moved past it.
    /// Returns the number of removed commands.
    pub fn expire(&self, curtime: f32) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|command| !is_expired(command.draw_end_time, curtime));
        before - entries.len()
    }

    /// Drop every command, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Copy of the current contents in insertion order
    pub fn snapshot(&self) -> Vec<DrawCommand> {
        self.entries.lock().iter().cloned().collect()
    }
}

impl Default for CommandStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DRAW_COMMANDS)
    }
}

fn is_expired(draw_end_time: f32, curtime: f32) -> bool {
    if draw_end_time <= 0.0 {
        curtime > 0.0
    } else {
        curtime > draw_end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Color, Shape, Vec3};

    fn command(draw_end_time: f32, radius: f32) -> DrawCommand {
        DrawCommand::new(
            Color::rgba(0, 255, 0, 255),
            draw_end_time,
            Shape::Sphere {
                center: Vec3::default(),
                radius,
            },
        )
    }

    fn radii(store: &CommandStore) -> Vec<f32> {
        store
            .snapshot()
            .into_iter()
            .map(|c| match c.shape {
                Shape::Sphere { radius, .. } => radius,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = CommandStore::new(3);
        for i in 0..3 {
            assert!(store.insert(command(10.0, i as f32)).is_none());
        }
        let evicted = store.insert(command(10.0, 3.0)).unwrap();

        assert_eq!(evicted, command(10.0, 0.0));
        assert_eq!(store.len(), 3);
        assert_eq!(radii(&store), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_expiry_is_strict() {
        let store = CommandStore::new(16);
        store.insert(command(5.0, 1.0));
        store.insert(command(6.0, 2.0));

        assert_eq!(store.expire(5.0), 0);
        assert_eq!(store.expire(5.5), 1);
        assert_eq!(radii(&store), vec![2.0]);
    }

    #[test]
    fn test_zero_duration_lives_one_tick() {
        let store = CommandStore::new(16);
        store.insert(command(0.0, 1.0));
        store.insert(command(-1.0, 2.0));

        assert_eq!(store.expire(0.0), 0);
        assert_eq!(store.len(), 2);

        assert_eq!(store.expire(0.016), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_then_snapshot_is_empty() {
        let store = CommandStore::new(4);
        store.insert(command(1.0, 1.0));
        store.insert(command(2.0, 2.0));

        assert_eq!(store.clear(), 2);
        assert!(store.snapshot().is_empty());
        assert_eq!(store.clear(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = CommandStore::new(0);
        assert_eq!(store.capacity(), 1);
        store.insert(command(1.0, 1.0));
        store.insert(command(1.0, 2.0));
        assert_eq!(radii(&store), vec![2.0]);
    }
}
