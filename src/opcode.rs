/// The operation selected by bits 15..12 of an instruction word.
///
/// Every 4-bit value names a variant, so decoding never fails here; the two
/// reserved opcodes are rejected by the execution engine instead.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
  /// Conditional branch on the condition codes.
  ///
  /// | Operation | Semantics/RTL                          | Assembly           |
  /// |-----------|----------------------------------------|--------------------|
  /// | Branch    | `if (nzp & cond) : pc ← pc + sext(o9)` | `br[n][z][p] label` |
  Branch = 0x0,

  /// | Operation     | Semantics/RTL                  | Assembly             |
  /// |---------------|--------------------------------|----------------------|
  /// | Add Register  | `r[d] ← r[s1] + r[s2]`         | `add rd, rs1, rs2`   |
  /// | Add Immediate | `r[d] ← r[s1] + sext(imm5)`    | `add rd, rs1, #imm5` |
  ///
  /// Bit 5 selects the immediate form. Sets condition codes.
  Add = 0x1,

  /// | Operation | Semantics/RTL             | Assembly       |
  /// |-----------|---------------------------|----------------|
  /// | Load      | `r[d] ← m[pc + sext(o9)]` | `ld rd, label` |
  Load = 0x2,

  /// | Operation | Semantics/RTL             | Assembly       |
  /// |-----------|---------------------------|----------------|
  /// | Store     | `m[pc + sext(o9)] ← r[s]` | `st rs, label` |
  Store = 0x3,

  /// Jumps to a subroutine, saving the return address in `r7`.
  ///
  /// | Operation          | Semantics/RTL                    | Assembly     |
  /// |--------------------|----------------------------------|--------------|
  /// | Jump Subroutine    | `r7 ← pc; pc ← pc + sext(o11)`   | `jsr label`  |
  /// | Jump Subroutine Reg| `r7 ← pc; pc ← r[b]`             | `jsrr rb`    |
  JumpSubroutine = 0x4,

  /// Same addressing as [`Opcode::Add`], but a bitwise AND.
  And = 0x5,

  /// | Operation        | Semantics/RTL               | Assembly            |
  /// |------------------|-----------------------------|---------------------|
  /// | Load Base+Offset | `r[d] ← m[r[b] + sext(o6)]` | `ldr rd, rb, #o6`   |
  LoadBaseOff = 0x6,

  /// | Operation         | Semantics/RTL               | Assembly          |
  /// |-------------------|-----------------------------|-------------------|
  /// | Store Base+Offset | `m[r[b] + sext(o6)] ← r[s]` | `str rs, rb, #o6` |
  StoreBaseOff = 0x7,

  /// Return from interrupt. There is no privileged mode, so this is always a
  /// fault.
  ReturnFromInterrupt = 0x8,

  /// | Operation   | Semantics/RTL     | Assembly     |
  /// |-------------|-------------------|--------------|
  /// | Logical NOT | `r[d] ← ~r[s]`    | `not rd, rs` |
  Not = 0x9,

  /// | Operation     | Semantics/RTL                 | Assembly        |
  /// |---------------|-------------------------------|-----------------|
  /// | Load Indirect | `r[d] ← m[m[pc + sext(o9)]]`  | `ldi rd, label` |
  LoadIndirect = 0xA,

  /// | Operation      | Semantics/RTL                | Assembly        |
  /// |----------------|------------------------------|-----------------|
  /// | Store Indirect | `m[m[pc + sext(o9)]] ← r[s]` | `sti rs, label` |
  StoreIndirect = 0xB,

  /// | Operation | Semantics/RTL | Assembly  |
  /// |-----------|---------------|-----------|
  /// | Jump      | `pc ← r[b]`   | `jmp rb`  |
  /// | Return    | `pc ← r7`     | `ret`     |
  Jump = 0xC,

  /// Reserved, always a fault.
  Reserved = 0xD,

  /// | Operation             | Semantics/RTL          | Assembly        |
  /// |-----------------------|------------------------|-----------------|
  /// | Load Effective Address| `r[d] ← pc + sext(o9)` | `lea rd, label` |
  LoadEffectiveAddress = 0xE,

  /// Calls one of the [`TrapCode`] services.
  Trap = 0xF,
}

impl Opcode {
  /// Decode the opcode field of a full instruction word
  pub fn of(instruction: u16) -> Self {
    Self::from((instruction >> 12) as u8)
  }
}

impl From<u8> for Opcode {
  fn from(maybe_nibble: u8) -> Self {
    match maybe_nibble & 0x0F {
      0x0 => Self::Branch,
      0x1 => Self::Add,
      0x2 => Self::Load,
      0x3 => Self::Store,
      0x4 => Self::JumpSubroutine,
      0x5 => Self::And,
      0x6 => Self::LoadBaseOff,
      0x7 => Self::StoreBaseOff,
      0x8 => Self::ReturnFromInterrupt,
      0x9 => Self::Not,
      0xA => Self::LoadIndirect,
      0xB => Self::StoreIndirect,
      0xC => Self::Jump,
      0xD => Self::Reserved,
      0xE => Self::LoadEffectiveAddress,
      0xF => Self::Trap,
      _ => unreachable!(),
    }
  }
}

/// OS-like services reachable through the `trap` instruction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCode {
  /// Read one character into `r0`, no echo.
  GetChar = 0x20,
  /// Write the low byte of `r0`.
  Out = 0x21,
  /// Write the zero-terminated string of one character per word at `m[r0]`.
  PutString = 0x22,
  /// Read one character into `r0`, echoing it.
  In = 0x23,
  /// Write the zero-terminated string of two characters per word at `m[r0]`.
  PutPackedString = 0x24,
  /// Stop the machine.
  Halt = 0x25,
}

impl TryFrom<u8> for TrapCode {
  /// The unrecognised vector is handed back
  type Error = u8;

  fn try_from(vector: u8) -> Result<Self, Self::Error> {
    match vector {
      0x20 => Ok(Self::GetChar),
      0x21 => Ok(Self::Out),
      0x22 => Ok(Self::PutString),
      0x23 => Ok(Self::In),
      0x24 => Ok(Self::PutPackedString),
      0x25 => Ok(Self::Halt),
      other => Err(other),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opcode_from_top_nibble() {
    assert_eq!(Opcode::of(0x1042), Opcode::Add);
    assert_eq!(Opcode::of(0xF025), Opcode::Trap);
    assert_eq!(Opcode::of(0x8000), Opcode::ReturnFromInterrupt);
    assert_eq!(Opcode::of(0xD123), Opcode::Reserved);
    assert_eq!(Opcode::of(0x0E05), Opcode::Branch);
  }

  #[test]
  fn every_nibble_decodes() {
    for nibble in 0..16u8 {
      assert_eq!(Opcode::from(nibble) as u8, nibble);
    }
  }

  #[test]
  fn trap_vectors() {
    assert_eq!(TrapCode::try_from(0x20), Ok(TrapCode::GetChar));
    assert_eq!(TrapCode::try_from(0x25), Ok(TrapCode::Halt));
    assert_eq!(TrapCode::try_from(0x26), Err(0x26));
    assert_eq!(TrapCode::try_from(0x00), Err(0x00));
  }
}
