//! The REPL driver (§4.11, §6): a thin front door over [`sfl_heap_sim::Heap`].
//!
//! Tokenizes one request per line (from stdin, or `--input FILE` for
//! scripted test runs), dispatches to the core, and prints the fault/report
//! text specified in §6. Unrecognised commands are silently ignored (§7);
//! every accepted request and fault is also traced through `log` so
//! `RUST_LOG=debug` gives an operator a full run trace.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use clap::Parser;
use log::{debug, error, warn};
use sfl_heap_sim::{AllocError, FreeMode, Heap, HeapConfig};

/// Command-line flags for the segregated free-list heap simulator.
#[derive(Debug, Parser)]
#[command(name = "sfl-heap-sim", about = "Segregated free-list heap simulator")]
struct Cli {
  /// Read requests from this file instead of stdin.
  #[arg(short, long)]
  input: Option<String>,
}

fn main() {
  env_logger::init();
  let cli = Cli::parse();

  let reader: Box<dyn BufRead> = match cli.input {
    Some(path) => match File::open(&path) {
      Ok(file) => Box::new(BufReader::new(file)),
      Err(e) => {
        eprintln!("cannot open {path}: {e}");
        std::process::exit(1);
      }
    },
    None => Box::new(BufReader::new(io::stdin())),
  };

  run(reader);
}

fn run(reader: Box<dyn BufRead>) {
  let mut heap: Option<Heap> = None;

  for line in reader.lines() {
    let line = match line {
      Ok(line) => line,
      Err(e) => {
        warn!("failed to read a request line: {e}");
        break;
      }
    };
    let line = line.trim();
    if line.is_empty() {
      continue;
    }

    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else { continue };

    match command {
      "INIT_HEAP" => {
        if let Some(config) = parse_init_heap(tokens) {
          debug!("INIT_HEAP {config:?}");
          heap = Some(Heap::new(config));
        } else {
          warn!("malformed INIT_HEAP request: {line}");
        }
      }
      "MALLOC" => {
        let Some(h) = heap.as_mut() else { continue };
        let Some(n) = tokens.next().and_then(|t| t.parse::<u64>().ok()) else {
          warn!("malformed MALLOC request: {line}");
          continue;
        };
        match h.malloc(n) {
          Ok(addr) => debug!("MALLOC {n} -> 0x{addr:x}"),
          Err(e) => println!("{e}"),
        }
      }
      "FREE" => {
        let Some(h) = heap.as_mut() else { continue };
        let Some(addr) = tokens.next().and_then(parse_hex) else {
          warn!("malformed FREE request: {line}");
          continue;
        };
        match h.free(addr) {
          Ok(()) => debug!("FREE 0x{addr:x}"),
          Err(e) => println!("{e}"),
        }
      }
      "READ" => {
        let Some(h) = heap.as_ref() else { continue };
        let Some(addr) = tokens.next().and_then(parse_hex) else {
          warn!("malformed READ request: {line}");
          continue;
        };
        let Some(n) = tokens.next().and_then(|t| t.parse::<u64>().ok()) else {
          warn!("malformed READ request: {line}");
          continue;
        };
        match h.read(addr, n) {
          Ok(bytes) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let _ = out.write_all(&bytes);
            let _ = out.write_all(b"\n");
          }
          Err(e) => {
            if report_fault(h, e) {
              return;
            }
          }
        }
      }
      "WRITE" => {
        let Some(h) = heap.as_mut() else { continue };
        let Some((addr, data, n)) = parse_write(line) else {
          warn!("malformed WRITE request: {line}");
          continue;
        };
        let n = n.min(data.len());
        match h.write(addr, &data.as_bytes()[..n]) {
          Ok(()) => debug!("WRITE 0x{addr:x} len {n}"),
          Err(e) => {
            if report_fault(h, e) {
              return;
            }
          }
        }
      }
      "DUMP_MEMORY" => {
        if let Some(h) = heap.as_ref() {
          println!("{}", h.dump());
        }
      }
      "DESTROY_HEAP" => {
        debug!("DESTROY_HEAP");
        return;
      }
      other => {
        debug!("ignoring unrecognised command: {other}");
      }
    }
  }
}

/// Reports a `READ`/`WRITE` fault (§7), dumping and returning `true` when
/// `AllocError::is_fatal` says to terminate the driver loop — the only place
/// the fatal/recoverable distinction is decided, rather than duplicating it
/// per command.
fn report_fault(
  heap: &Heap,
  error: AllocError,
) -> bool {
  error!("{error}");
  println!("{error}");
  if error.is_fatal() {
    println!("{}", heap.dump());
    true
  } else {
    false
  }
}

/// `INIT_HEAP base_address N B free_mode` (§6).
fn parse_init_heap<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<HeapConfig> {
  let base_address = tokens.next().and_then(parse_hex)?;
  let class_count = tokens.next()?.parse::<u64>().ok()?;
  let bytes_per_class = tokens.next()?.parse::<u64>().ok()?;
  let flag = tokens.next()?.parse::<u8>().ok()?;
  Some(HeapConfig::new(base_address, class_count, bytes_per_class, FreeMode::from_flag(flag)))
}

/// `WRITE address "literal" n`, split on the `"` delimiters the way the
/// original tokenizes with `strtok(input, "\"")`.
fn parse_write(line: &str) -> Option<(u64, String, usize)> {
  let mut parts = line.splitn(3, '"');
  let head = parts.next()?;
  let data = parts.next()?.to_string();
  let tail = parts.next()?;

  let addr = head.split_whitespace().nth(1).and_then(parse_hex)?;
  let n = tail.trim().parse::<usize>().ok()?;
  Some((addr, data, n))
}

/// Parses a `0x`-prefixed hex address token.
fn parse_hex(token: &str) -> Option<u64> {
  u64::from_str_radix(token.trim_start_matches("0x").trim_start_matches("0X"), 16).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_init_heap_tokens() {
    let config = parse_init_heap("0x1000 4 128 1".split_whitespace()).unwrap();
    assert_eq!(config.base_address, 0x1000);
    assert_eq!(config.class_count, 4);
    assert_eq!(config.bytes_per_class, 128);
    assert_eq!(config.free_mode, FreeMode::Coalescing);
  }

  #[test]
  fn parses_write_line() {
    let (addr, data, n) = parse_write("WRITE 0x1000 \"hello\" 5").unwrap();
    assert_eq!(addr, 0x1000);
    assert_eq!(data, "hello");
    assert_eq!(n, 5);
  }

  #[test]
  fn parse_hex_accepts_0x_prefix() {
    assert_eq!(parse_hex("0x1A"), Some(0x1A));
    assert_eq!(parse_hex("1A"), Some(0x1A));
  }
}
