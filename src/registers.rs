/// Index of the program counter in the register file
pub const PC: usize = 8;

/// Index of the condition flag register
pub const COND: usize = 9;

/// Register conventionally holding subroutine return addresses
pub const RETURN_ADDRESS: usize = 7;

const COUNT: usize = 10;

/// One-hot condition codes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
  Pos = 1 << 0,
  Zro = 1 << 1,
  Neg = 1 << 2,
}

impl Flag {
  /// The flag describing `value` read as two's complement
  pub fn of(value: u16) -> Self {
    if value == 0 {
      Self::Zro
    } else if value >> 15 == 1 {
      Self::Neg
    } else {
      Self::Pos
    }
  }
}

/// `r0`..`r7`, the program counter and the condition flags, all 16 bits wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
  slots: [u16; COUNT],
}

impl Registers {
  pub fn new() -> Self {
    Self { slots: [0; COUNT] }
  }

  /// Read register `index`, where 8 is [`PC`] and 9 is [`COND`].
  ///
  /// # Panics
  ///
  /// If `index` is not below 10. Decoded register fields are 3 bits wide, so
  /// instruction operands can never trip this.
  #[inline]
  pub fn get(&self, index: usize) -> u16 {
    self.slots[index]
  }

  #[inline]
  pub fn set(&mut self, index: usize, value: u16) {
    self.slots[index] = value;
  }

  #[inline]
  pub fn pc(&self) -> u16 {
    self.slots[PC]
  }

  #[inline]
  pub fn set_pc(&mut self, value: u16) {
    self.slots[PC] = value;
  }

  /// The current condition flags as a raw one-hot mask
  #[inline]
  pub fn cond(&self) -> u16 {
    self.slots[COND]
  }

  pub fn set_cond(&mut self, flag: Flag) {
    self.slots[COND] = flag as u16;
  }

  /// Recompute the condition flags from the value held in `index`
  pub fn update_flags(&mut self, index: usize) {
    self.set_cond(Flag::of(self.slots[index]));
  }
}

impl Default for Registers {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use proptest::prelude::*;

  #[test]
  fn new_is_zeroed() {
    let registers = Registers::new();
    for index in 0..COUNT {
      assert_eq!(registers.get(index), 0);
    }
  }

  #[test]
  fn pc_and_cond_are_indexed() {
    let mut registers = Registers::new();
    registers.set_pc(0x3000);
    registers.set_cond(Flag::Neg);
    assert_eq!(registers.get(PC), 0x3000);
    assert_eq!(registers.get(COND), 0b100);
  }

  #[test]
  fn update_flags_boundaries() {
    let mut registers = Registers::new();
    for (value, flag) in [
      (0x0000, Flag::Zro),
      (0x0001, Flag::Pos),
      (0x7FFF, Flag::Pos),
      (0x8000, Flag::Neg),
      (0xFFFF, Flag::Neg),
    ] {
      registers.set(3, value);
      registers.update_flags(3);
      assert_eq!(registers.cond(), flag as u16, "value {value:#06x}");
    }
  }

  proptest! {
    #[test]
    fn exactly_one_flag(value in any::<u16>()) {
      let mut registers = Registers::new();
      registers.set(0, value);
      registers.update_flags(0);
      let cond = registers.cond();
      prop_assert_eq!(cond.count_ones(), 1);
      let expected = match value {
        0 => Flag::Zro,
        v if (v as i16) < 0 => Flag::Neg,
        _ => Flag::Pos,
      };
      prop_assert_eq!(cond, expected as u16);
    }
  }
}
