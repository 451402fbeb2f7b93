//! The Heap (§2, §3): a dynamic, size-ordered collection of
//! [`BlockIndex`](crate::block_index::BlockIndex) values, plus the
//! [`AllocationMap`] and the eager counters `DUMP_MEMORY` reports.
//!
//! This is the 40% of the core the spec calls out: `malloc`/`free` drive
//! blocks between the free classes and the allocation map, and the
//! coalescer (§4.6) merges sibling fragments back together on free.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::alloc_map::AllocationMap;
use crate::block::{AllocatedBlock, FreeBlock};
use crate::block_index::BlockIndex;
use crate::config::{FreeMode, HeapConfig};
use crate::dump::{AllocatedLine, DumpReport, FreeClassLine};
use crate::error::AllocError;
use crate::origin;

/// The eager counters `DUMP_MEMORY` reports (§3 "Derived counters").
/// Conceptually part of the `Heap` entity, not process-global — a process
/// may own several independent `Heap`s without any counter sharing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
  pub allocated_bytes: u64,
  pub free_bytes: u64,
  pub free_blocks: u64,
  pub allocated_blocks: u64,
  pub malloc_calls: u64,
  pub free_calls: u64,
  pub fragmentation_events: u64,
}

/// The segregated free-list heap: `N` initial size classes, grown and
/// shrunk by fragmentation and coalescing, plus the allocation map that
/// backs `READ`/`WRITE`.
#[derive(Debug, Clone)]
pub struct Heap {
  config: HeapConfig,
  classes: BTreeMap<u64, BlockIndex>,
  allocations: AllocationMap,
  counters: Counters,
}

impl Heap {
  /// `INIT_HEAP` (§4.1): populates `class_count` classes of sizes
  /// `8, 16, 32, ..., 8 * 2^(class_count - 1)`, each holding
  /// `bytes_per_class / class_size` blocks laid out contiguously in that
  /// class's stripe.
  pub fn new(config: HeapConfig) -> Self {
    let mut classes = BTreeMap::new();
    let mut free_blocks = 0u64;

    for i in 0..config.class_count {
      let class_size = 8u64 << i;
      let stripe_start = config.base_address + i * config.bytes_per_class;
      let count = config.bytes_per_class / class_size;
      let addresses = (0..count).map(|k| stripe_start + k * class_size);
      classes.insert(class_size, BlockIndex::with_addresses(class_size, addresses));
      free_blocks += count;
    }

    let total = config.total_bytes();
    debug!(
      "INIT_HEAP base=0x{:x} classes={} bytes_per_class={} free_blocks={}",
      config.base_address, config.class_count, config.bytes_per_class, free_blocks
    );

    Self {
      config,
      classes,
      allocations: AllocationMap::new(),
      counters: Counters { free_bytes: total, free_blocks, ..Default::default() },
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn counters(&self) -> &Counters {
    &self.counters
  }

  /// `MALLOC n` (§4.2): carve `n` bytes from the smallest sufficient class.
  pub fn malloc(
    &mut self,
    n: u64,
  ) -> Result<u64, AllocError> {
    let class_size = match self.classes.range(n..).next().map(|(&size, _)| size) {
      Some(size) => size,
      None => {
        warn!("MALLOC {n}: out of memory");
        return Err(AllocError::OutOfMemory);
      }
    };

    let index = self.classes.get_mut(&class_size).expect("class_size came from this map");
    let parent = index.remove_head().expect("non-empty class per Heap invariant");
    if index.is_empty() {
      self.classes.remove(&class_size);
    }

    let allocated = AllocatedBlock::new(parent.address, n);
    self.allocations.insert(allocated);

    self.counters.allocated_bytes += n;
    self.counters.free_bytes -= n;
    self.counters.allocated_blocks += 1;
    self.counters.malloc_calls += 1;
    self.counters.free_blocks -= 1;

    if parent.size > n {
      let residual = FreeBlock::new(parent.address + n, parent.size - n);
      self.insert_free_block(residual);
      self.counters.fragmentation_events += 1;
      debug!("MALLOC {n} -> 0x{:x} (fragmented class {class_size}, residual {})", parent.address, residual.size);
    } else {
      debug!("MALLOC {n} -> 0x{:x} (exact class {class_size})", parent.address);
    }

    Ok(parent.address)
  }

  /// `FREE a` (§4.5): release the allocated block based at `a`, optionally
  /// coalescing with adjacent siblings before returning it to the heap.
  pub fn free(
    &mut self,
    address: u64,
  ) -> Result<(), AllocError> {
    let block = match self.allocations.remove(address) {
      Some(block) => block,
      None => {
        warn!("FREE 0x{address:x}: invalid free");
        return Err(AllocError::InvalidFree);
      }
    };

    self.counters.free_calls += 1;
    self.counters.allocated_blocks -= 1;
    self.counters.free_bytes += block.size;
    self.counters.allocated_bytes -= block.size;

    let mut freed = FreeBlock::new(block.address, block.size);
    if self.config.free_mode == FreeMode::Coalescing {
      freed = self.coalesce(freed);
    }

    debug!("FREE 0x{address:x} -> returning 0x{:x} size {}", freed.address, freed.size);
    self.insert_free_block(freed);
    Ok(())
  }

  /// §4.3 General Free-Block Insertion: insert into the matching class, or
  /// splice a brand-new class into the heap.
  fn insert_free_block(
    &mut self,
    block: FreeBlock,
  ) {
    self
      .classes
      .entry(block.size)
      .and_modify(|idx| idx.insert(block.address))
      .or_insert_with(|| BlockIndex::new(block.size, block.address));
    self.counters.free_blocks += 1;
  }

  /// §4.6 Coalescing: merge `block` with its left and right siblings, if
  /// any, in a single left-then-right sweep over a snapshot of the heap's
  /// current `(class_size, address)` pairs. At most one candidate can
  /// satisfy each direction at any instant since free blocks never overlap.
  fn coalesce(
    &mut self,
    mut block: FreeBlock,
  ) -> FreeBlock {
    let base = self.config.base_address;
    let stride = self.config.bytes_per_class;

    for candidate in self.snapshot_free_addresses() {
      if !origin::are_siblings(block.address, candidate.address, base, stride) {
        continue;
      }
      if candidate.end() == block.address {
        self.remove_free_block(candidate);
        block.address = candidate.address;
        block.size += candidate.size;
        self.counters.free_blocks -= 1;
      }
    }

    for candidate in self.snapshot_free_addresses() {
      if !origin::are_siblings(block.address, candidate.address, base, stride) {
        continue;
      }
      if block.end() == candidate.address {
        self.remove_free_block(candidate);
        block.size += candidate.size;
        self.counters.free_blocks -= 1;
      }
    }

    block
  }

  /// A snapshot of every free block currently in the heap, for the
  /// coalescer to iterate over while it mutates the live structure.
  fn snapshot_free_addresses(&self) -> Vec<FreeBlock> {
    self
      .classes
      .values()
      .flat_map(|idx| idx.addresses().map(move |addr| FreeBlock::new(addr, idx.class_size())))
      .collect()
  }

  /// Removes a specific free block the coalescer already knows exists,
  /// dropping the owning class if it becomes empty.
  fn remove_free_block(
    &mut self,
    block: FreeBlock,
  ) {
    if let Some(idx) = self.classes.get_mut(&block.size) {
      idx.remove(block.address);
      if idx.is_empty() {
        self.classes.remove(&block.size);
      }
    }
  }

  /// `READ a n` (§4.7): dry-run validates coverage, then returns the bytes.
  pub fn read(
    &self,
    address: u64,
    n: u64,
  ) -> Result<Vec<u8>, AllocError> {
    self.allocations.read(address, n).inspect_err(|_| {
      warn!("READ 0x{address:x} len {n}: segmentation fault");
    })
  }

  /// `WRITE a data n` (§4.7): `n` is truncated to `data.len()` by the
  /// caller before reaching here; validates full coverage before mutating
  /// any payload.
  pub fn write(
    &mut self,
    address: u64,
    data: &[u8],
  ) -> Result<(), AllocError> {
    let len = data.len() as u64;
    self.allocations.write(address, len, data).inspect_err(|_| {
      warn!("WRITE 0x{address:x} len {len}: segmentation fault");
    })
  }

  /// §4.10: a structured snapshot of counters + heap + allocation map,
  /// rendered by `DumpReport`'s `Display` into the exact `DUMP_MEMORY` text.
  pub fn dump(&self) -> DumpReport {
    let free_classes = self
      .classes
      .values()
      .map(|idx| FreeClassLine { class_size: idx.class_size(), addresses: idx.addresses().collect() })
      .collect();

    let allocated = self.allocations.blocks().map(|b| AllocatedLine { address: b.address, size: b.size }).collect();

    DumpReport {
      total_bytes: self.config.total_bytes(),
      allocated_bytes: self.counters.allocated_bytes,
      free_bytes: self.counters.free_bytes,
      free_blocks: self.counters.free_blocks,
      allocated_blocks: self.counters.allocated_blocks,
      malloc_calls: self.counters.malloc_calls,
      fragmentation_events: self.counters.fragmentation_events,
      free_calls: self.counters.free_calls,
      free_classes,
      allocated,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn heap(free_mode: FreeMode) -> Heap {
    Heap::new(HeapConfig::new(0x1000, 4, 128, free_mode))
  }

  #[test]
  fn init_populates_expected_classes_and_counts() {
    let h = heap(FreeMode::Coalescing);
    assert_eq!(h.classes.len(), 4);
    assert_eq!(h.classes[&8].len(), 16);
    assert_eq!(h.classes[&16].len(), 8);
    assert_eq!(h.classes[&32].len(), 4);
    assert_eq!(h.classes[&64].len(), 2);
    assert_eq!(h.counters.free_blocks, 30);
    assert_eq!(h.counters.free_bytes, 512);
  }

  #[test]
  fn scenario_1_malloc_exact_class() {
    let mut h = heap(FreeMode::Coalescing);
    let addr = h.malloc(8).unwrap();
    assert_eq!(addr, 0x1000);
    assert_eq!(h.counters.free_blocks, 29);
    assert_eq!(h.classes[&8].len(), 15);
  }

  #[test]
  fn scenario_2_malloc_with_fragmentation() {
    let mut h = heap(FreeMode::Coalescing);
    let addr = h.malloc(5).unwrap();
    assert_eq!(addr, 0x1000);
    assert_eq!(h.counters.fragmentation_events, 1);
    assert!(h.classes.contains_key(&3));
    assert_eq!(h.classes[&3].head(), Some(0x1003));
  }

  #[test]
  fn scenario_3_coalescing_restores_class_8() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(5).unwrap();
    h.free(0x1000).unwrap();
    assert_eq!(h.counters.fragmentation_events, 1);
    assert!(!h.classes.contains_key(&3));
    assert_eq!(h.classes[&8].len(), 16);
    assert_eq!(h.counters.free_blocks, 30);
  }

  #[test]
  fn scenario_4_no_merge_when_sibling_is_allocated() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(5).unwrap();
    h.malloc(3).unwrap();
    h.free(0x1000).unwrap();
    assert!(h.classes.contains_key(&5));
    assert_eq!(h.classes[&8].len(), 15);
  }

  #[test]
  fn scenario_5_same_class_blocks_are_not_siblings() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(64).unwrap();
    h.malloc(64).unwrap();
    h.free(0x1180).unwrap();
    h.free(0x11C0).unwrap();
    assert_eq!(h.classes[&64].len(), 2);
    let addrs: Vec<u64> = h.classes[&64].addresses().collect();
    assert_eq!(addrs, vec![0x1180, 0x11C0]);
  }

  #[test]
  fn scenario_6_write_then_read() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(8).unwrap();
    h.write(0x1000, b"hello").unwrap();
    assert_eq!(h.read(0x1000, 5).unwrap(), b"hello");
  }

  #[test]
  fn malloc_exceeding_largest_class_is_out_of_memory_and_state_unchanged() {
    let mut h = heap(FreeMode::Coalescing);
    let before = h.counters;
    assert_eq!(h.malloc(65), Err(AllocError::OutOfMemory));
    assert_eq!(h.counters.malloc_calls, before.malloc_calls);
    assert_eq!(h.counters.free_blocks, before.free_blocks);
  }

  #[test]
  fn malloc_exactly_the_largest_class_consumes_it_without_fragmenting() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(64).unwrap();
    h.malloc(64).unwrap();
    assert!(!h.classes.contains_key(&64));
    assert_eq!(h.counters.fragmentation_events, 0);
  }

  #[test]
  fn free_unallocated_address_is_invalid() {
    let mut h = heap(FreeMode::Coalescing);
    assert_eq!(h.free(0x9999), Err(AllocError::InvalidFree));
  }

  #[test]
  fn free_inside_but_not_at_block_base_is_invalid() {
    let mut h = heap(FreeMode::Coalescing);
    h.malloc(8).unwrap();
    assert_eq!(h.free(0x1004), Err(AllocError::InvalidFree));
  }

  #[test]
  fn naive_mode_never_coalesces_and_leaves_a_residual_fragment() {
    let mut h = heap(FreeMode::Naive);
    h.malloc(5).unwrap();
    h.free(0x1000).unwrap();
    assert!(h.classes.contains_key(&5));
    assert!(h.classes.contains_key(&3));
    assert_eq!(h.counters.fragmentation_events, 1);
  }

  #[test]
  fn three_siblings_only_adjacent_pair_merges() {
    // Split the 8-byte parent at 0x1000 into three 2-byte pieces A, B, C
    // (addresses 0x1000, 0x1002, 0x1004) plus a trailing free residual F at
    // 0x1006. Freeing the middle piece B first must NOT reach across the
    // still-allocated C to reunite with F; only the later free of A (B's
    // other, now-free neighbor) may merge.
    let mut h = heap(FreeMode::Coalescing);
    assert_eq!(h.malloc(2).unwrap(), 0x1000); // A; residual 6B at 0x1002
    assert_eq!(h.malloc(2).unwrap(), 0x1002); // B; residual 4B at 0x1004
    assert_eq!(h.malloc(2).unwrap(), 0x1004); // C; residual 2B (F) at 0x1006
    assert_eq!(h.counters.fragmentation_events, 3);

    h.free(0x1002).unwrap(); // B: no free neighbor on either side yet
    assert_eq!(h.classes[&2].len(), 2); // B (0x1002) and F (0x1006), unmerged
    let addrs: Vec<u64> = h.classes[&2].addresses().collect();
    assert_eq!(addrs, vec![0x1002, 0x1006]);

    h.free(0x1000).unwrap(); // A: merges left-adjacent B into a 4-byte block
    assert!(h.classes.contains_key(&4));
    assert_eq!(h.classes[&4].head(), Some(0x1000));
    // F (0x1006) is still separated from the reunited block by allocated C.
    assert_eq!(h.classes[&2].len(), 1);
    assert_eq!(h.classes[&2].head(), Some(0x1006));

    h.free(0x1004).unwrap(); // C: now bridges the 4-byte block and F
    assert!(!h.classes.contains_key(&2));
    assert!(!h.classes.contains_key(&4));
    assert_eq!(h.classes[&8].len(), 16); // fully reunited original parent
  }

  #[test]
  fn physically_adjacent_non_siblings_do_not_merge() {
    // 0x1078 is the last 8-byte slot of stripe 0; 0x1080 is the first
    // 16-byte slot of stripe 1. They are physically adjacent but have
    // different origins, so freeing 0x1078 must not merge into class 16.
    let mut h = heap(FreeMode::Coalescing);
    for _ in 0..16 {
      h.malloc(8).unwrap();
    }
    assert!(!h.classes.contains_key(&8));

    h.free(0x1078).unwrap();
    assert_eq!(h.classes[&8].len(), 1);
    assert_eq!(h.classes[&8].head(), Some(0x1078));
    assert_eq!(h.classes[&16].len(), 8);
  }
}
