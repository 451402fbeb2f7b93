//! The closed set of reportable fault kinds.
//!
//! `§7` of the spec is explicit that these three are exhaustive: there is no
//! catch-all variant, and every fallible operation on [`crate::Heap`] returns
//! one of these (never panics on a reachable path).

/// A fault raised by the core while servicing a request.
///
/// `OutOfMemory` and `InvalidFree` are recoverable: the heap's state is
/// unchanged and the caller may continue issuing requests. `SegmentationFault`
/// is fatal in the abstract contract — the driver is expected to dump and
/// terminate after reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  /// `MALLOC` found no class whose `class_size` satisfies the request.
  #[error("Out of memory")]
  OutOfMemory,

  /// `FREE` was given an address with no matching entry in the allocation map.
  #[error("Invalid free")]
  InvalidFree,

  /// `READ`/`WRITE` addressed a range not fully covered by allocated blocks.
  #[error("Segmentation fault (core dumped)")]
  SegmentationFault,
}

impl AllocError {
  /// Whether this fault terminates the driver loop (only `SegmentationFault`
  /// does; see §7).
  pub fn is_fatal(self) -> bool {
    matches!(self, AllocError::SegmentationFault)
  }
}
