//! # sfl-heap-sim — a segregated free-list heap simulator
//!
//! This crate models a fixed-size virtual heap and services
//! `MALLOC`/`FREE`/`READ`/`WRITE` requests against simulated addresses. It is
//! a teaching-grade allocator: addresses are plain integers, not real
//! pointers, and nothing here touches process memory.
//!
//! ## Design
//!
//! The heap starts with `N` size classes (8, 16, 32, ... bytes) each holding
//! a fixed run of same-sized blocks. `MALLOC` always takes the smallest
//! class that satisfies the request, splitting off a residual fragment when
//! the class is larger than needed. `FREE` returns a block to the heap and,
//! in [`FreeMode::Coalescing`], attempts to reunite it with any adjacent
//! fragment descended from the same original parent block — see
//! [`origin`] for how "descended from the same parent" is decided from the
//! address alone.
//!
//! ```text
//!   Heap (BTreeMap<class_size, BlockIndex>)
//!   ┌───────────────────────────────────────────────────────────┐
//!   │  8: [0x1000, 0x1008, 0x1010, ...]                          │
//!   │ 16: [0x1080, 0x1090, ...]                                  │
//!   │ 32: [0x1100, ...]                                          │
//!   │ 64: [0x1180, 0x11c0]                                       │
//!   └───────────────────────────────────────────────────────────┘
//!                       │ MALLOC n (smallest sufficient class)
//!                       ▼
//!   AllocationMap (BTreeMap<address, AllocatedBlock>)
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ 0x1000 -> { size: n, payload: [0u8; n] }                   │
//!   └───────────────────────────────────────────────────────────┘
//!                       │ FREE a (maybe coalesce, then reinsert)
//!                       ▼
//!                back into the Heap
//! ```
//!
//! ## Crate structure
//!
//! ```text
//!   sfl_heap_sim
//!   ├── block        - FreeBlock / AllocatedBlock value types
//!   ├── block_index   - one size class's free addresses
//!   ├── alloc_map     - the allocation map backing READ/WRITE
//!   ├── origin        - the sibling/origin test used by coalescing
//!   ├── config        - HeapConfig / FreeMode, fixed at INIT_HEAP
//!   ├── error         - AllocError, the three reportable fault kinds
//!   ├── dump          - DumpReport, the DUMP_MEMORY snapshot + formatter
//!   └── heap          - Heap, the public entry point tying it together
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use sfl_heap_sim::{FreeMode, Heap, HeapConfig};
//!
//! let mut heap = Heap::new(HeapConfig::new(0x1000, 4, 128, FreeMode::Coalescing));
//!
//! let addr = heap.malloc(8).unwrap();
//! heap.write(addr, b"hi").unwrap();
//! assert_eq!(heap.read(addr, 2).unwrap(), b"hi");
//! heap.free(addr).unwrap();
//! ```

pub mod alloc_map;
pub mod block;
pub mod block_index;
pub mod config;
pub mod dump;
pub mod error;
pub mod heap;
pub mod origin;

pub use config::{FreeMode, HeapConfig};
pub use dump::{AllocatedLine, DumpReport, FreeClassLine};
pub use error::AllocError;
pub use heap::{Counters, Heap};
