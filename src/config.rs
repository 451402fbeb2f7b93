//! Immutable heap configuration established by `INIT_HEAP` (§3, §4.1).

/// Whether `FREE` runs the coalescer (§4.6) on the freed block.
///
/// The `Naive` variant matches `type_of_free == 0` in the original; the
/// fragmentation counter stays monotonic under `Naive` since coalescing
/// is the only thing that ever reunites a fragment with its sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeMode {
  /// `FREE` never merges adjacent siblings.
  Naive,
  /// `FREE` runs the coalescer before returning the block to the heap.
  Coalescing,
}

impl FreeMode {
  /// Maps the wire-level `{0, 1}` encoding from `INIT_HEAP` (§6).
  pub fn from_flag(flag: u8) -> Self {
    if flag == 0 { FreeMode::Naive } else { FreeMode::Coalescing }
  }
}

/// The four parameters fixed at `INIT_HEAP` time and never mutated after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// First address of the simulated heap.
  pub base_address: u64,
  /// Number of initial size classes, `N`.
  pub class_count: u64,
  /// Bytes assigned to each class's stripe, `B`.
  pub bytes_per_class: u64,
  /// Coalescing policy for `FREE`.
  pub free_mode: FreeMode,
}

impl HeapConfig {
  pub fn new(
    base_address: u64,
    class_count: u64,
    bytes_per_class: u64,
    free_mode: FreeMode,
  ) -> Self {
    Self { base_address, class_count, bytes_per_class, free_mode }
  }

  /// Total bytes under management: `N * B`.
  pub fn total_bytes(&self) -> u64 {
    self.class_count * self.bytes_per_class
  }
}
