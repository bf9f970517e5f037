use std::io;

use crate::console::Console;

/// Number of addressable words; every `u16` is a valid address
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register, bit 15 set when `KBDR` holds a fresh key
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register
pub const KBDR: u16 = 0xFE02;

const KEY_READY: u16 = 1 << 15;

/// The flat 64K-word address space of the machine.
///
/// Reading [`KBSR`] samples the keyboard, so reads take the console along.
pub struct Memory {
  cells: Vec<u16>,
}

impl Memory {
  /// Create a zeroed address space
  pub fn new() -> Self {
    Self {
      cells: vec![0; MEMORY_SIZE],
    }
  }

  /// Read a word, polling the keyboard first when `address` is [`KBSR`]
  pub fn read<C>(&mut self, address: u16, console: &mut C) -> io::Result<u16>
  where
    C: Console + ?Sized,
  {
    if address == KBSR {
      match console.poll_key()? {
        Some(key) => {
          self.cells[KBSR as usize] = KEY_READY;
          self.cells[KBDR as usize] = key;
        }
        None => self.cells[KBSR as usize] = 0,
      }
    }
    Ok(self.peek(address))
  }

  /// Read a word without any device side effect
  #[inline]
  pub fn peek(&self, address: u16) -> u16 {
    self.cells[address as usize]
  }

  #[inline]
  pub fn write(&mut self, address: u16, value: u16) {
    self.cells[address as usize] = value;
  }
}

impl Default for Memory {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for Memory {
  // 64K words is no use in a debug dump, show the populated cells only
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let populated = self.cells.iter().filter(|&&cell| cell != 0).count();
    f.debug_struct("Memory")
      .field("populated", &populated)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::console::BufferConsole;

  #[test]
  fn new_is_zeroed() {
    let memory = Memory::new();
    assert!(memory.cells.iter().all(|&cell| cell == 0));
    assert_eq!(memory.cells.len(), MEMORY_SIZE);
  }

  #[test]
  fn write_then_read_extremes() {
    let mut memory = Memory::new();
    let mut console = BufferConsole::default();
    memory.write(0x0000, 0xBEEF);
    memory.write(0xFFFF, 0x1234);
    assert_eq!(memory.read(0x0000, &mut console).unwrap(), 0xBEEF);
    assert_eq!(memory.read(0xFFFF, &mut console).unwrap(), 0x1234);
  }

  #[test]
  fn kbsr_with_pending_key() {
    let mut memory = Memory::new();
    let mut console = BufferConsole::with_input("q");
    assert_eq!(memory.read(KBSR, &mut console).unwrap(), 0x8000);
    assert_eq!(memory.peek(KBDR), b'q' as u16);
    // the key was consumed
    assert_eq!(memory.read(KBSR, &mut console).unwrap(), 0);
    assert_eq!(memory.peek(KBDR), b'q' as u16);
  }

  #[test]
  fn kbsr_without_key_clears_status() {
    let mut memory = Memory::new();
    let mut console = BufferConsole::default();
    memory.write(KBSR, 0x8000);
    assert_eq!(memory.read(KBSR, &mut console).unwrap(), 0);
  }

  #[test]
  fn kbdr_read_has_no_side_effect() {
    let mut memory = Memory::new();
    let mut console = BufferConsole::with_input("x");
    assert_eq!(memory.read(KBDR, &mut console).unwrap(), 0);
    assert_eq!(console.pending(), 1);
  }
}
