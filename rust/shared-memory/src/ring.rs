//! Single-producer/single-consumer byte ring
//!
//! Segment layout:
//! 0-63:    head cursor (producer writes, consumer reads)
//! 64-127:  tail cursor (consumer writes, producer reads)
//! 128+:    `capacity` data bytes
//!
//! Cursors are stored already masked, so `head == tail` means empty and the
//! producer keeps one byte free to preserve that.

use crate::{Result, SharedMemoryError, SharedMemoryRegion};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Size of the cursor block at the start of the segment
pub const RING_HEADER_SIZE: usize = std::mem::size_of::<RingHeader>();

/// Smallest ring that still fits a packet header
pub const MIN_RING_CAPACITY: usize = 8;

/// A cursor alone on its cache line
#[repr(C, align(64))]
pub struct CursorSlot {
    value: AtomicU64,
}

/// Shared cursor block
#[repr(C)]
pub struct RingHeader {
    /// Next byte the producer will write
    pub head: CursorSlot,
    /// Next byte the consumer will read
    pub tail: CursorSlot,
}

#[repr(C, align(64))]
#[derive(Clone, Copy)]
struct CacheLine([u8; 64]);

enum Backing {
    Heap(NonNull<[CacheLine]>),
    /// Held only to keep the mapping alive
    Shared { _region: SharedMemoryRegion },
}

impl Drop for Backing {
    fn drop(&mut self) {
        if let Backing::Heap(lines) = self {
            // Leaked from a `Box` in `RingBuffer::new`
            unsafe { drop(Box::from_raw(lines.as_ptr())) };
        }
    }
}

/// Ring buffer over a heap allocation or a shared segment.
///
/// Payload bytes are only reached through [`read_at`](Self::read_at) and
/// [`write_at`](Self::write_at); only the cursors are typed.
pub struct RingBuffer {
    header: NonNull<RingHeader>,
    data: NonNull<u8>,
    capacity: usize,
    mask: usize,
    backing: Backing,
}

// Safety: the cursors are atomics with a single writer each and the data bytes
// are only copied through raw pointers whose ranges the cursors hand over.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Segment size needed for a ring of `capacity` data bytes
    pub const fn required_size(capacity: usize) -> usize {
        RING_HEADER_SIZE + capacity
    }

    /// In-process ring, zeroed
    pub fn new(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;

        let lines = Self::required_size(capacity).div_ceil(std::mem::size_of::<CacheLine>());
        let boxed: Box<[CacheLine]> = vec![CacheLine([0; 64]); lines].into_boxed_slice();
        let lines = NonNull::from(Box::leak(boxed));
        let base = lines.cast::<u8>();

        Ok(unsafe { Self::from_base(base, capacity, Backing::Heap(lines)) })
    }

    /// Ring laid over a mapped segment
    pub fn from_region(region: SharedMemoryRegion, capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;

        let required = Self::required_size(capacity);
        if region.size() < required {
            return Err(SharedMemoryError::InvalidSize {
                size: region.size(),
                min: required,
                max: usize::MAX,
            });
        }

        let base = NonNull::new(region.as_ptr())
            .ok_or_else(|| SharedMemoryError::MappingFailed("region has no mapping".to_string()))?;

        Ok(unsafe { Self::from_base(base, capacity, Backing::Shared { _region: region }) })
    }

    /// # Safety
    /// `base` must be 64-byte aligned, valid for `required_size(capacity)`
    /// bytes and kept alive by `backing`.
    unsafe fn from_base(base: NonNull<u8>, capacity: usize, backing: Backing) -> Self {
        Self {
            header: base.cast::<RingHeader>(),
            data: NonNull::new_unchecked(base.as_ptr().add(RING_HEADER_SIZE)),
            capacity,
            mask: capacity - 1,
            backing,
        }
    }

    fn cursors(&self) -> &RingHeader {
        unsafe { self.header.as_ref() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mask(&self) -> usize {
        self.mask
    }

    /// Whether the ring lives in a cross-process segment
    pub fn is_shared(&self) -> bool {
        matches!(self.backing, Backing::Shared { .. })
    }

    pub fn load_head(&self) -> usize {
        self.cursors().head.value.load(Ordering::Acquire) as usize & self.mask
    }

    pub fn load_tail(&self) -> usize {
        self.cursors().tail.value.load(Ordering::Acquire) as usize & self.mask
    }

    /// Publish the producer cursor; bytes written before this become visible
    pub fn store_head(&self, head: usize) {
        self.cursors().head.value.store((head & self.mask) as u64, Ordering::Release);
    }

    /// Release consumed bytes back to the producer
    pub fn store_tail(&self, tail: usize) {
        self.cursors().tail.value.store((tail & self.mask) as u64, Ordering::Release);
    }

    /// Bytes published but not yet consumed
    pub fn readable(&self) -> usize {
        self.load_head().wrapping_sub(self.load_tail()) & self.mask
    }

    /// Bytes the producer may still write
    pub fn writable(&self) -> usize {
        self.capacity - 1 - self.readable()
    }

    /// Copy `dst.len()` bytes starting at `offset`, splitting at the physical end
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check_len(dst.len())?;

        let offset = offset & self.mask;
        let first = dst.len().min(self.capacity - offset);
        unsafe {
            std::ptr::copy_nonoverlapping(self.data.as_ptr().add(offset), dst.as_mut_ptr(), first);
            std::ptr::copy_nonoverlapping(
                self.data.as_ptr(),
                dst.as_mut_ptr().add(first),
                dst.len() - first,
            );
        }
        Ok(())
    }

    /// Copy `src` into the ring starting at `offset`, splitting at the physical end
    pub fn write_at(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_len(src.len())?;

        let offset = offset & self.mask;
        let first = src.len().min(self.capacity - offset);
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.data.as_ptr().add(offset), first);
            std::ptr::copy_nonoverlapping(
                src.as_ptr().add(first),
                self.data.as_ptr(),
                src.len() - first,
            );
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.capacity {
            return Err(SharedMemoryError::PacketTooLarge {
                size: len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("head", &self.load_head())
            .field("tail", &self.load_tail())
            .field("shared", &self.is_shared())
            .finish()
    }
}

fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity < MIN_RING_CAPACITY || !capacity.is_power_of_two() {
        return Err(SharedMemoryError::InvalidCapacity(capacity));
    }
    Ok(())
}
