//! `DUMP_MEMORY`'s structured snapshot and its `Display` rendering (§4.10,
//! §6). Separating the snapshot from the text keeps `Heap` testable on plain
//! counts without coupling it to a particular output sink.

use std::fmt;

/// One size class's worth of free-block addresses, in the order
/// `DUMP_MEMORY` prints them.
#[derive(Debug, Clone)]
pub struct FreeClassLine {
  pub class_size: u64,
  pub addresses: Vec<u64>,
}

/// One allocated block's worth of dump data.
#[derive(Debug, Clone, Copy)]
pub struct AllocatedLine {
  pub address: u64,
  pub size: u64,
}

/// A point-in-time snapshot of the heap's counters and contents, formatted
/// by `Display` into the exact `DUMP_MEMORY` text of §6.
#[derive(Debug, Clone)]
pub struct DumpReport {
  pub total_bytes: u64,
  pub allocated_bytes: u64,
  pub free_bytes: u64,
  pub free_blocks: u64,
  pub allocated_blocks: u64,
  pub malloc_calls: u64,
  pub fragmentation_events: u64,
  pub free_calls: u64,
  pub free_classes: Vec<FreeClassLine>,
  pub allocated: Vec<AllocatedLine>,
}

impl fmt::Display for DumpReport {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "+++++DUMP+++++")?;
    writeln!(f, "Total memory: {} bytes", self.total_bytes)?;
    writeln!(f, "Total allocated memory: {} bytes", self.allocated_bytes)?;
    writeln!(f, "Total free memory: {} bytes", self.free_bytes)?;
    writeln!(f, "Free blocks: {}", self.free_blocks)?;
    writeln!(f, "Number of allocated blocks: {}", self.allocated_blocks)?;
    writeln!(f, "Number of malloc calls: {}", self.malloc_calls)?;
    writeln!(f, "Number of fragmentations: {}", self.fragmentation_events)?;
    writeln!(f, "Number of free calls: {}", self.free_calls)?;

    for class in &self.free_classes {
      write!(f, "Blocks with {} bytes - {} free block(s) :", class.class_size, class.addresses.len())?;
      for addr in &class.addresses {
        write!(f, " 0x{addr:x}")?;
      }
      writeln!(f)?;
    }

    write!(f, "Allocated blocks :")?;
    for block in &self.allocated {
      write!(f, " (0x{:x} - {})", block.address, block.size)?;
    }
    writeln!(f)?;

    write!(f, "-----DUMP-----")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_empty_report() {
    let report = DumpReport {
      total_bytes: 512,
      allocated_bytes: 0,
      free_bytes: 512,
      free_blocks: 0,
      allocated_blocks: 0,
      malloc_calls: 0,
      fragmentation_events: 0,
      free_calls: 0,
      free_classes: vec![],
      allocated: vec![],
    };
    let text = report.to_string();
    assert!(text.starts_with("+++++DUMP+++++\n"));
    assert!(text.ends_with("-----DUMP-----"));
    assert!(text.contains("Allocated blocks :"));
  }

  #[test]
  fn renders_free_classes_and_allocations() {
    let report = DumpReport {
      total_bytes: 32,
      allocated_bytes: 8,
      free_bytes: 24,
      free_blocks: 3,
      allocated_blocks: 1,
      malloc_calls: 1,
      fragmentation_events: 0,
      free_calls: 0,
      free_classes: vec![FreeClassLine { class_size: 8, addresses: vec![0x1008, 0x1010] }],
      allocated: vec![AllocatedLine { address: 0x1000, size: 8 }],
    };
    let text = report.to_string();
    assert!(text.contains("Blocks with 8 bytes - 2 free block(s) : 0x1008 0x1010"));
    assert!(text.contains("Allocated blocks : (0x1000 - 8)"));
  }
}
