//! The origin function (§4.4): a pure computation, no state, used by the
//! coalescer to test whether two free fragments descend from the same
//! initial block.

/// Home-class index: which `bytes_per_class`-byte stripe `address` falls in.
///
/// `origin(a) = (a - base_address) / bytes_per_class`.
pub fn origin(
  address: u64,
  base_address: u64,
  bytes_per_class: u64,
) -> u64 {
  (address - base_address) / bytes_per_class
}

/// Parent-block index within the home-class stripe.
///
/// `offset(a) = ((a - base_address) mod bytes_per_class) >> (3 + origin(a))`.
pub fn offset(
  address: u64,
  base_address: u64,
  bytes_per_class: u64,
) -> u64 {
  let home = origin(address, base_address, bytes_per_class);
  ((address - base_address) % bytes_per_class) >> (3 + home)
}

/// Two free blocks are siblings iff they share both `origin` and `offset`.
pub fn are_siblings(
  a: u64,
  b: u64,
  base_address: u64,
  bytes_per_class: u64,
) -> bool {
  origin(a, base_address, bytes_per_class) == origin(b, base_address, bytes_per_class)
    && offset(a, base_address, bytes_per_class) == offset(b, base_address, bytes_per_class)
}

#[cfg(test)]
mod tests {
  use super::*;

  const BASE: u64 = 0x1000;
  const B: u64 = 128;

  #[test]
  fn origin_identifies_the_stripe() {
    // class 0 (size 8) spans [0x1000, 0x1080); class 1 (size 16) spans [0x1080, 0x1100).
    assert_eq!(origin(0x1000, BASE, B), 0);
    assert_eq!(origin(0x107F, BASE, B), 0);
    assert_eq!(origin(0x1080, BASE, B), 1);
    assert_eq!(origin(0x11C0, BASE, B), 3);
  }

  #[test]
  fn offset_identifies_the_parent_block_within_a_stripe() {
    // class 0, size-8 blocks: offsets 0x1000, 0x1008, 0x1010, ...
    assert_eq!(offset(0x1000, BASE, B), 0);
    assert_eq!(offset(0x1008, BASE, B), 1);
    assert_eq!(offset(0x1018, BASE, B), 3);
  }

  #[test]
  fn siblings_share_origin_and_offset() {
    // 0x1000 and 0x1003 both descend from the size-8 block at 0x1000.
    assert!(are_siblings(0x1000, 0x1003, BASE, B));
    // 0x1000 and 0x1008 are distinct size-8 parents.
    assert!(!are_siblings(0x1000, 0x1008, BASE, B));
    // Different stripes never match even at the same relative offset.
    assert!(!are_siblings(0x1000, 0x1080, BASE, B));
  }
}
