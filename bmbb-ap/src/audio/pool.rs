//! Fixed pool of PCM blocks
//!
//! All audio buffers are allocated once, when the streamer is configured.
//! Blocks cycle through three states:
//!
//! - **free**: available to [`BlockPool::acquire`]
//! - **held**: filled by the streamer, identified by a [`BlockHandle`]
//! - **in flight**: handed to the device by [`BlockPool::submit`]
//!
//! When no block is free, `acquire` recycles the oldest in-flight block.
//! With N blocks a block is therefore reused only after N - 1 later blocks
//! were submitted; the device's blocking writes guarantee it has retired by
//! then.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use tracing::debug;

/// Smallest usable pool: two pre-fill blocks plus two in steady state
pub const MIN_BLOCKS: usize = 4;

/// Exclusive reference to one block in the pool
#[derive(Debug, PartialEq, Eq)]
pub struct BlockHandle {
    index: usize,
}

impl BlockHandle {
    /// Position of the block within the pool
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Bounded pool of equally sized byte blocks
pub struct BlockPool {
    blocks: Vec<Box<[u8]>>,
    /// Valid bytes per block
    lengths: Vec<usize>,
    free: VecDeque<usize>,
    in_flight: VecDeque<usize>,
    block_size: usize,
}

impl BlockPool {
    /// Allocate `count` blocks of `block_size` bytes.
    ///
    /// # Errors
    /// - `ConfigFailed` if `count` is below [`MIN_BLOCKS`] or `block_size` is zero
    pub fn new(count: usize, block_size: usize) -> Result<Self> {
        if count < MIN_BLOCKS {
            return Err(Error::ConfigFailed(format!(
                "block pool needs at least {} blocks, got {}",
                MIN_BLOCKS, count
            )));
        }
        if block_size == 0 {
            return Err(Error::ConfigFailed("block size must be non-zero".to_string()));
        }

        debug!("Allocating {} audio blocks of {} bytes", count, block_size);

        Ok(Self {
            blocks: (0..count)
                .map(|_| vec![0u8; block_size].into_boxed_slice())
                .collect(),
            lengths: vec![0; count],
            free: (0..count).collect(),
            in_flight: VecDeque::with_capacity(count),
            block_size,
        })
    }

    /// Take the next block, recycling the oldest in-flight block if none is free
    ///
    /// # Errors
    /// - `Internal` if every block is currently held (handles were leaked)
    pub fn acquire(&mut self) -> Result<BlockHandle> {
        let index = self
            .free
            .pop_front()
            .or_else(|| self.in_flight.pop_front())
            .ok_or_else(|| {
                Error::Internal(format!("all {} audio blocks are held", self.blocks.len()))
            })?;
        self.lengths[index] = 0;
        Ok(BlockHandle { index })
    }

    /// Whole writable block
    pub fn buffer_mut(&mut self, handle: &BlockHandle) -> &mut [u8] {
        &mut self.blocks[handle.index]
    }

    /// Record how many bytes of the block hold valid data
    pub fn set_len(&mut self, handle: &BlockHandle, len: usize) {
        self.lengths[handle.index] = len.min(self.block_size);
    }

    /// Valid data of a held block
    pub fn filled(&self, handle: &BlockHandle) -> &[u8] {
        &self.blocks[handle.index][..self.lengths[handle.index]]
    }

    /// Hand a written block to the device
    pub fn submit(&mut self, handle: BlockHandle) {
        self.in_flight.push_back(handle.index);
    }

    /// Return a block that was never written
    pub fn release(&mut self, handle: BlockHandle) {
        self.lengths[handle.index] = 0;
        self.free.push_back(handle.index);
    }

    /// Mark every in-flight block retired (device stopped)
    pub fn retire_all(&mut self) {
        while let Some(index) = self.in_flight.pop_front() {
            self.lengths[index] = 0;
            self.free.push_back(index);
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
