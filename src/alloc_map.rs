//! The Allocation Map (§2, §3): an address-ordered collection of currently
//! allocated blocks, each carrying its payload buffer.
//!
//! As with [`crate::block_index::BlockIndex`], a `BTreeMap<u64, AllocatedBlock>`
//! keyed by address gives address ordering, uniqueness, and O(log n)
//! exact-address lookup for free, replacing the original's linked-list walk
//! in `remove_from_list` (`main.c`).

use std::collections::BTreeMap;

use crate::block::AllocatedBlock;
use crate::error::AllocError;

/// One contiguous `(block_address, payload_offset, length)` segment a
/// `READ`/`WRITE` touches within a single allocated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
  pub block_address: u64,
  pub offset: usize,
  pub length: usize,
}

/// Address-ordered map of live allocations.
#[derive(Debug, Clone, Default)]
pub struct AllocationMap {
  blocks: BTreeMap<u64, AllocatedBlock>,
}

impl AllocationMap {
  pub fn new() -> Self {
    Self { blocks: BTreeMap::new() }
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Total bytes across every allocated block; used to cross-check the
  /// eager `allocated_bytes` counter (§8 invariant 5).
  pub fn total_bytes(&self) -> u64 {
    self.blocks.values().map(|b| b.size).sum()
  }

  pub fn insert(
    &mut self,
    block: AllocatedBlock,
  ) {
    self.blocks.insert(block.address, block);
  }

  /// Removes and returns the block whose base address is exactly `address`
  /// (§4.5 step 1-2).
  pub fn remove(
    &mut self,
    address: u64,
  ) -> Option<AllocatedBlock> {
    self.blocks.remove(&address)
  }

  /// Blocks in address order, for `DUMP_MEMORY` (§6).
  pub fn blocks(&self) -> impl Iterator<Item = &AllocatedBlock> {
    self.blocks.values()
  }

  /// Validates that `[address, address + len)` is fully covered by
  /// contiguous allocated blocks with no gap (§4.7 coverage rule), returning
  /// the ordered segments to touch without mutating anything. Both `READ`
  /// and `WRITE` run this pass before doing anything observable, so a
  /// faulting request never has partial effect.
  pub fn collect_segments(
    &self,
    address: u64,
    len: u64,
  ) -> Result<Vec<Segment>, AllocError> {
    if len == 0 {
      return Ok(Vec::new());
    }

    let end = address + len;
    let mut segments = Vec::new();
    let mut cursor = address;

    // First candidate: the block covering `address` if one does, else the
    // first block starting after it (§4.7 coverage rule).
    let mut candidate = self
      .blocks
      .range(..=cursor)
      .next_back()
      .map(|(_, b)| b)
      .filter(|b| b.end() > cursor)
      .or_else(|| self.blocks.range((cursor + 1)..).next().map(|(_, b)| b));

    loop {
      let block = candidate.ok_or(AllocError::SegmentationFault)?;
      if block.address != cursor {
        return Err(AllocError::SegmentationFault);
      }

      let available = block.end() - cursor;
      let take = available.min(end - cursor);
      if take == 0 {
        return Err(AllocError::SegmentationFault);
      }

      segments.push(Segment {
        block_address: block.address,
        offset: (cursor - block.address) as usize,
        length: take as usize,
      });

      cursor += take;
      if cursor >= end {
        break;
      }

      candidate = self.blocks.get(&cursor);
    }

    Ok(segments)
  }

  /// Emits the bytes of `[address, address + len)` via `collect_segments`,
  /// returning them as one buffer for the caller's output sink (§4.7 Read).
  pub fn read(
    &self,
    address: u64,
    len: u64,
  ) -> Result<Vec<u8>, AllocError> {
    let segments = self.collect_segments(address, len)?;
    let mut out = Vec::with_capacity(len as usize);
    for seg in segments {
      let block = &self.blocks[&seg.block_address];
      out.extend_from_slice(&block.payload[seg.offset..seg.offset + seg.length]);
    }
    Ok(out)
  }

  /// Copies `data` into `[address, address + len)`, where `len` has already
  /// been truncated to `data.len()` by the caller (§4.7 Write). Validates
  /// full coverage before mutating any payload, so a faulting write leaves
  /// every block untouched.
  pub fn write(
    &mut self,
    address: u64,
    len: u64,
    data: &[u8],
  ) -> Result<(), AllocError> {
    let segments = self.collect_segments(address, len)?;
    let mut written = 0usize;
    for seg in segments {
      let block = self.blocks.get_mut(&seg.block_address).expect("segment references a live block");
      block.payload[seg.offset..seg.offset + seg.length].copy_from_slice(&data[written..written + seg.length]);
      written += seg.length;
    }
    Ok(())
  }
}
