//! Fixed-size frame buffer pool

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// One captured JPEG, on loan from a [`FrameBufferPool`]
///
/// Frames cannot be cloned; handing one back through
/// [`FrameBufferPool::release`] consumes it.
#[derive(Debug)]
pub struct Frame {
    pool: u64,
    slot: usize,
    sequence: u64,
    data: Vec<u8>,
}

impl Frame {
    /// Compressed image payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Capture counter assigned by the pool, starting at 0
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Pool slot the buffer belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Fixed set of reusable frame buffers
///
/// Mirrors a camera driver with `fb_count` DMA buffers: a frame occupies a
/// slot until it is released, and once every slot is out no new frame can
/// be captured.
#[derive(Debug)]
pub struct FrameBufferPool {
    id: u64,
    slots: Vec<Option<Vec<u8>>>,
    next_sequence: u64,
}

impl FrameBufferPool {
    pub fn new(count: usize) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            slots: (0..count).map(|_| Some(Vec::new())).collect(),
            next_sequence: 0,
        }
    }

    /// Total number of buffers
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Buffers not currently lent out
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Takes a free buffer and lets `fill` write a frame into it
    ///
    /// The buffer is cleared first; its allocation is kept from earlier
    /// frames. If `fill` returns `false` the buffer goes straight back and no
    /// frame is produced. Returns `None` when every buffer is lent out.
    pub fn fill<F>(&mut self, fill: F) -> Option<Frame>
    where
        F: FnOnce(&mut Vec<u8>) -> bool,
    {
        let slot = self.slots.iter().position(Option::is_some)?;
        let mut data = self.slots[slot].take()?;
        data.clear();

        if !fill(&mut data) {
            self.slots[slot] = Some(data);
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Some(Frame {
            pool: self.id,
            slot,
            sequence,
            data,
        })
    }

    /// Returns a frame's buffer to its slot
    pub fn release(&mut self, frame: Frame) {
        match self.slots.get_mut(frame.slot) {
            Some(slot) if frame.pool == self.id && slot.is_none() => *slot = Some(frame.data),
            _ => warn!(
                slot = frame.slot,
                sequence = frame.sequence,
                "Released frame does not belong to this pool"
            ),
        }
    }
}
