use std::io;

use crate::console::Console;
use crate::image::Image;
use crate::memory::Memory;
use crate::opcode::{Opcode, TrapCode};
use crate::registers::{Flag, Registers, RETURN_ADDRESS};

/// Where programs conventionally start executing
pub const PC_START: u16 = 0x3000;

/// The register receiving trap results
const R0: usize = 0;

/// Lifecycle of a [`Vm`]. `Halted` and `Faulted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  /// Images may be loaded, nothing runs yet
  Loading,
  Running,
  Halted,
  Faulted,
}

/// A virtual machine for the LC-3 architecture.
///
/// Owns the whole machine state, memory plus register file. The host console
/// is lent to it for every step, so the machine itself holds no I/O.
#[derive(Debug)]
pub struct Vm {
  memory: Memory,
  registers: Registers,
  state: State,
}

impl Vm {
  /// Create a new, zeroed virtual machine waiting for images
  pub fn new() -> Self {
    Self {
      memory: Memory::new(),
      registers: Registers::new(),
      state: State::Loading,
    }
  }

  /// Copy `image` into memory, returning how many words were placed
  pub fn load(&mut self, image: &Image) -> usize {
    let placed = image.load_into(&mut self.memory);
    log::debug!("loaded {} words at {:#06x}", placed, image.origin());
    placed
  }

  /// Point the program counter at `entry` and start running
  pub fn boot(&mut self, entry: u16) {
    self.registers.set_pc(entry);
    // a zeroed COND would hold no flag at all
    self.registers.set_cond(Flag::Zro);
    self.state = State::Running;
    log::debug!("booting at {:#06x}", entry);
  }

  /// Fetch, advance and execute a single instruction
  pub fn step<C>(&mut self, console: &mut C) -> Result<(), Error>
  where
    C: Console + ?Sized,
  {
    match self.state {
      State::Running => {}
      State::Loading => return Err(Error::NotBooted),
      State::Halted | State::Faulted => return Err(Error::MachineHalted),
    }
    let result = self.fetch_and_execute(console);
    if let Err(err) = &result {
      log::error!("machine faulted: {}", err);
      self.state = State::Faulted;
    }
    result
  }

  /// Step until the machine halts or faults
  pub fn run<C>(&mut self, console: &mut C) -> Result<(), Error>
  where
    C: Console + ?Sized,
  {
    if self.state == State::Loading {
      return Err(Error::NotBooted);
    }
    while self.state == State::Running {
      self.step(&mut *console)?;
    }
    Ok(())
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn is_running(&self) -> bool {
    self.state == State::Running
  }

  pub fn registers(&self) -> &Registers {
    &self.registers
  }

  pub fn registers_mut(&mut self) -> &mut Registers {
    &mut self.registers
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn memory_mut(&mut self) -> &mut Memory {
    &mut self.memory
  }

  fn fetch_and_execute<C>(&mut self, console: &mut C) -> Result<(), Error>
  where
    C: Console + ?Sized,
  {
    let pc = self.registers.pc();
    let instruction = self.memory.read(pc, &mut *console)?;
    self.registers.set_pc(pc.wrapping_add(1));
    #[cfg(feature = "trace_execution")]
    log::trace!(
      "{:#06x}: {:#06x} {:?}",
      pc,
      instruction,
      Opcode::of(instruction)
    );
    let mut task = Task::new(self, console, instruction);
    task.run()
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

/// An error that stopped the machine
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("invalid opcode {opcode:?} in instruction {instruction:#06x} at {pc:#06x}")]
  InvalidOpcode {
    opcode: Opcode,
    instruction: u16,
    pc: u16,
  },

  #[error("invalid trap vector {vector:#04x} at {pc:#06x}")]
  InvalidTrap { vector: u8, pc: u16 },

  #[error("machine is halted")]
  MachineHalted,

  #[error("machine has not been booted")]
  NotBooted,

  #[error("console failure")]
  Io(#[from] io::Error),
}

/// Widen the low `bit_count` bits of `value`, read as two's complement, to 16
/// bits. An empty field extends to 0.
pub fn sign_extend(value: u16, bit_count: u32) -> u16 {
  if bit_count == 0 {
    return 0;
  }
  if bit_count >= 16 {
    return value;
  }
  let field = value & (u16::MAX >> (16 - bit_count));
  if (field >> (bit_count - 1)) & 1 != 0 {
    field | (u16::MAX << bit_count)
  } else {
    field
  }
}

/// One instruction being executed against the machine
struct Task<'vm, 'console, C: ?Sized> {
  vm: &'vm mut Vm,
  console: &'console mut C,
  instruction: u16,
}

impl<'vm, 'console, C> Task<'vm, 'console, C>
where
  C: Console + ?Sized,
{
  fn new(vm: &'vm mut Vm, console: &'console mut C, instruction: u16) -> Self {
    Self {
      vm,
      console,
      instruction,
    }
  }

  /// The 3-bit register field whose lowest bit sits at `shift`
  #[inline]
  fn register(&self, shift: u16) -> usize {
    ((self.instruction >> shift) & 0x7) as usize
  }

  // bits 11..9: DR, SR (stores), or the nzp mask
  #[inline]
  fn high_register(&self) -> usize {
    self.register(9)
  }

  // bits 8..6: SR1, SR or BaseR
  #[inline]
  fn base_register(&self) -> usize {
    self.register(6)
  }

  #[inline]
  fn bit(&self, index: u16) -> bool {
    (self.instruction >> index) & 1 == 1
  }

  #[inline]
  fn offset(&self, bit_count: u32) -> u16 {
    sign_extend(self.instruction, bit_count)
  }

  #[inline]
  fn pc_relative(&self) -> u16 {
    self.vm.registers.pc().wrapping_add(self.offset(9))
  }

  #[inline]
  fn base_relative(&self) -> u16 {
    let base = self.vm.registers.get(self.base_register());
    base.wrapping_add(self.offset(6))
  }

  /// Address of the instruction being executed, for error reports
  #[inline]
  fn origin(&self) -> u16 {
    self.vm.registers.pc().wrapping_sub(1)
  }

  fn read(&mut self, address: u16) -> io::Result<u16> {
    self.vm.memory.read(address, &mut *self.console)
  }

  fn define(&mut self, register: usize, value: u16) {
    self.vm.registers.set(register, value);
    self.vm.registers.update_flags(register);
  }

  fn run(&mut self) -> Result<(), Error> {
    let op = Opcode::of(self.instruction);
    match op {
      Opcode::Branch => branch(self),
      Opcode::Add => add(self),
      Opcode::Load => load(self)?,
      Opcode::Store => store(self),
      Opcode::JumpSubroutine => jump_subroutine(self),
      Opcode::And => and(self),
      Opcode::LoadBaseOff => load_base_off(self)?,
      Opcode::StoreBaseOff => store_base_off(self),
      Opcode::Not => not(self),
      Opcode::LoadIndirect => load_indirect(self)?,
      Opcode::StoreIndirect => store_indirect(self)?,
      Opcode::Jump => jump(self),
      Opcode::LoadEffectiveAddress => load_effective_address(self),
      Opcode::Trap => trap(self)?,
      Opcode::ReturnFromInterrupt | Opcode::Reserved => {
        return Err(Error::InvalidOpcode {
          opcode: op,
          instruction: self.instruction,
          pc: self.origin(),
        })
      }
    }
    Ok(())
  }

  /// The second ALU operand: `sext(imm5)` when bit 5 is set, else `r[s2]`
  fn alu_operand(&self) -> u16 {
    if self.bit(5) {
      self.offset(5)
    } else {
      self.vm.registers.get(self.register(0))
    }
  }
}

// if (nzp & cond) : pc ← pc + sext(o9)
fn branch<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let nzp = task.high_register() as u16;
  if nzp & task.vm.registers.cond() != 0 {
    let target = task.pc_relative();
    task.vm.registers.set_pc(target);
  }
}

// r[d] ← r[s1] + (r[s2] | sext(imm5))
fn add<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let s1 = task.vm.registers.get(task.base_register());
  let value = s1.wrapping_add(task.alu_operand());
  task.define(d, value);
}

// r[d] ← r[s1] & (r[s2] | sext(imm5))
fn and<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let s1 = task.vm.registers.get(task.base_register());
  let value = s1 & task.alu_operand();
  task.define(d, value);
}

// r[d] ← ~r[s]
fn not<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let value = !task.vm.registers.get(task.base_register());
  task.define(d, value);
}

// pc ← r[b]
fn jump<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let target = task.vm.registers.get(task.base_register());
  task.vm.registers.set_pc(target);
}

// r7 ← pc; pc ← pc + sext(o11) | r[b]
fn jump_subroutine<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let pc = task.vm.registers.pc();
  // r7 is written first, so `jsrr r7` lands on its own return address
  task.vm.registers.set(RETURN_ADDRESS, pc);
  let target = if task.bit(11) {
    pc.wrapping_add(task.offset(11))
  } else {
    task.vm.registers.get(task.base_register())
  };
  task.vm.registers.set_pc(target);
}

// r[d] ← m[pc + sext(o9)]
fn load<C>(task: &mut Task<'_, '_, C>) -> io::Result<()>
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let value = task.read(task.pc_relative())?;
  task.define(d, value);
  Ok(())
}

// r[d] ← m[m[pc + sext(o9)]]
fn load_indirect<C>(task: &mut Task<'_, '_, C>) -> io::Result<()>
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let pointer = task.read(task.pc_relative())?;
  let value = task.read(pointer)?;
  task.define(d, value);
  Ok(())
}

// r[d] ← m[r[b] + sext(o6)]
fn load_base_off<C>(task: &mut Task<'_, '_, C>) -> io::Result<()>
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let value = task.read(task.base_relative())?;
  task.define(d, value);
  Ok(())
}

// r[d] ← pc + sext(o9)
fn load_effective_address<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let d = task.high_register();
  let address = task.pc_relative();
  task.define(d, address);
}

// m[pc + sext(o9)] ← r[s]
fn store<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let value = task.vm.registers.get(task.high_register());
  let target = task.pc_relative();
  task.vm.memory.write(target, value);
}

// m[m[pc + sext(o9)]] ← r[s]
fn store_indirect<C>(task: &mut Task<'_, '_, C>) -> io::Result<()>
where
  C: Console + ?Sized,
{
  let value = task.vm.registers.get(task.high_register());
  let target = task.read(task.pc_relative())?;
  task.vm.memory.write(target, value);
  Ok(())
}

// m[r[b] + sext(o6)] ← r[s]
fn store_base_off<C>(task: &mut Task<'_, '_, C>)
where
  C: Console + ?Sized,
{
  let value = task.vm.registers.get(task.high_register());
  let target = task.base_relative();
  task.vm.memory.write(target, value);
}

fn trap<C>(task: &mut Task<'_, '_, C>) -> Result<(), Error>
where
  C: Console + ?Sized,
{
  let vector = (task.instruction & 0xFF) as u8;
  let code = TrapCode::try_from(vector).map_err(|vector| Error::InvalidTrap {
    vector,
    pc: task.origin(),
  })?;
  match code {
    TrapCode::GetChar => {
      // the key code is stored as the host reports it, not narrowed to ASCII
      let key = task.console.read_key()?;
      task.vm.registers.set(R0, key);
    }
    TrapCode::Out => {
      let byte = task.vm.registers.get(R0) as u8;
      task.console.write_byte(byte)?;
      task.console.flush()?;
    }
    TrapCode::PutString => {
      let mut address = task.vm.registers.get(R0);
      loop {
        let word = task.read(address)?;
        if word == 0 {
          break;
        }
        task.console.write_byte(word as u8)?;
        address = address.wrapping_add(1);
      }
      task.console.flush()?;
    }
    TrapCode::In => {
      let key = task.console.read_key()?;
      task.console.write_byte(key as u8)?;
      task.console.flush()?;
      task.vm.registers.set(R0, key);
    }
    TrapCode::PutPackedString => {
      let mut address = task.vm.registers.get(R0);
      'words: loop {
        let word = task.read(address)?;
        for byte in word.to_le_bytes() {
          if byte == 0 {
            break 'words;
          }
          task.console.write_byte(byte)?;
        }
        address = address.wrapping_add(1);
      }
      task.console.flush()?;
    }
    TrapCode::Halt => {
      task.console.write_bytes(b"HALT\n")?;
      task.console.flush()?;
      task.vm.state = State::Halted;
      log::debug!("halted at {:#06x}", task.origin());
    }
  }
  Ok(())
}
