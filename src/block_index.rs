//! A Block Index (§2, §3): the collection of free blocks sharing one
//! `class_size`, ordered ascending by address with no duplicates.
//!
//! The original keeps this as a doubly-linked list per size class (§9,
//! `list`/`node` in `list.h`); a `BTreeSet<u64>` of addresses gives the same
//! address-ordering and no-duplicates invariants directly from the
//! container, with O(log n) insert/remove/head-peek instead of an O(n) walk.

use std::collections::BTreeSet;

use crate::block::FreeBlock;

/// All free blocks of one `class_size`, address-ordered.
#[derive(Debug, Clone)]
pub struct BlockIndex {
  class_size: u64,
  addresses: BTreeSet<u64>,
}

impl BlockIndex {
  /// Builds an index for `class_size` seeded with one block.
  pub fn new(
    class_size: u64,
    first_address: u64,
  ) -> Self {
    let mut addresses = BTreeSet::new();
    addresses.insert(first_address);
    Self { class_size, addresses }
  }

  /// Builds an index for `class_size` seeded with many blocks at once, as
  /// `INIT_HEAP` does for each of the `N` initial classes (§4.1).
  pub fn with_addresses<I: IntoIterator<Item = u64>>(
    class_size: u64,
    addresses: I,
  ) -> Self {
    Self { class_size, addresses: addresses.into_iter().collect() }
  }

  pub fn class_size(&self) -> u64 {
    self.class_size
  }

  pub fn len(&self) -> usize {
    self.addresses.len()
  }

  pub fn is_empty(&self) -> bool {
    self.addresses.is_empty()
  }

  /// Inserts a free block's address in order. The caller guarantees
  /// `block.size == self.class_size`.
  pub fn insert(
    &mut self,
    address: u64,
  ) {
    debug_assert!(!self.addresses.contains(&address), "duplicate free address in one class");
    self.addresses.insert(address);
  }

  /// The lowest address currently held, i.e. the next block `MALLOC` would
  /// hand out from this class (§4.2 step 2).
  pub fn head(&self) -> Option<u64> {
    self.addresses.iter().next().copied()
  }

  /// Removes and returns the head block (lowest address).
  pub fn remove_head(&mut self) -> Option<FreeBlock> {
    let address = self.head()?;
    self.addresses.remove(&address);
    Some(FreeBlock::new(address, self.class_size))
  }

  /// Removes a specific address if present, returning whether it was found.
  pub fn remove(
    &mut self,
    address: u64,
  ) -> bool {
    self.addresses.remove(&address)
  }

  /// Addresses in ascending order, for `DUMP_MEMORY` (§6).
  pub fn addresses(&self) -> impl Iterator<Item = u64> + '_ {
    self.addresses.iter().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn head_is_the_lowest_address() {
    let idx = BlockIndex::with_addresses(8, [0x1010, 0x1000, 0x1008]);
    assert_eq!(idx.head(), Some(0x1000));
  }

  #[test]
  fn remove_head_shrinks_and_returns_the_block() {
    let mut idx = BlockIndex::with_addresses(8, [0x1000, 0x1008]);
    let block = idx.remove_head().unwrap();
    assert_eq!(block, FreeBlock::new(0x1000, 8));
    assert_eq!(idx.len(), 1);
    assert_eq!(idx.head(), Some(0x1008));
  }

  #[test]
  fn remove_head_on_empty_index_returns_none() {
    let mut idx = BlockIndex::with_addresses(8, []);
    assert!(idx.remove_head().is_none());
  }

  #[test]
  fn insert_keeps_addresses_ordered_and_unique() {
    let mut idx = BlockIndex::with_addresses(8, [0x1000]);
    idx.insert(0x1010);
    idx.insert(0x1008);
    let addrs: Vec<u64> = idx.addresses().collect();
    assert_eq!(addrs, vec![0x1000, 0x1008, 0x1010]);
  }

  #[test]
  fn remove_specific_address() {
    let mut idx = BlockIndex::with_addresses(8, [0x1000, 0x1008, 0x1010]);
    assert!(idx.remove(0x1008));
    assert!(!idx.remove(0x1008));
    assert_eq!(idx.len(), 2);
  }
}
