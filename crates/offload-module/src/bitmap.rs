//! Slot occupancy bitmap
//!
//! One bit per slot, packed into atomic 64-bit blocks. Writers hold the
//! pool mutex; the atomics let stats and assertions read occupancy without
//! taking it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of bits per block
const BITS_PER_BLOCK: usize = 64;

pub struct OccupancyBitmap {
    /// Bitmap blocks (each u64 holds 64 occupancy bits)
    blocks: Box<[AtomicU64]>,

    /// Number of valid bits
    len: usize,
}

impl OccupancyBitmap {
    /// Create an all-free bitmap for `len` slots
    pub fn new(len: usize) -> Self {
        let num_blocks = (len + BITS_PER_BLOCK - 1) / BITS_PER_BLOCK;
        let blocks: Vec<AtomicU64> = (0..num_blocks).map(|_| AtomicU64::new(0)).collect();
        Self {
            blocks: blocks.into_boxed_slice(),
            len,
        }
    }

    #[inline]
    fn locate(idx: usize) -> (usize, u64) {
        (idx / BITS_PER_BLOCK, 1u64 << (idx % BITS_PER_BLOCK))
    }

    /// Mark a slot occupied. Returns `false` if it already was.
    #[inline]
    pub fn set(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (block, mask) = Self::locate(idx);
        self.blocks[block].fetch_or(mask, Ordering::AcqRel) & mask == 0
    }

    /// Mark a slot free. Returns `false` if it already was.
    #[inline]
    pub fn clear(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (block, mask) = Self::locate(idx);
        self.blocks[block].fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }

    /// Check if a slot is occupied
    #[inline]
    pub fn is_set(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (block, mask) = Self::locate(idx);
        self.blocks[block].load(Ordering::Acquire) & mask != 0
    }

    /// First free slot at or after `start`, wrapping around once.
    pub fn find_free_from(&self, start: usize) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let start = start % self.len;
        let num_blocks = self.blocks.len();
        let first_block = start / BITS_PER_BLOCK;

        // Visit the starting block twice: once masked to bits >= start,
        // once at the end masked to bits < start.
        for i in 0..=num_blocks {
            let block_idx = (first_block + i) % num_blocks;
            let mut free = !self.blocks[block_idx].load(Ordering::Acquire);
            if i == 0 {
                free &= !0u64 << (start % BITS_PER_BLOCK);
            } else if i == num_blocks {
                free &= (1u64 << (start % BITS_PER_BLOCK)).wrapping_sub(1);
            }
            while free != 0 {
                let bit = free.trailing_zeros() as usize;
                let idx = block_idx * BITS_PER_BLOCK + bit;
                if idx < self.len {
                    return Some(idx);
                }
                free &= free - 1;
            }
        }
        None
    }

    /// Count occupied slots
    pub fn count_set(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
