//! Bare-bones implementation of the LC-3 educational architecture
//!
//! <https://www.jmeiners.com/lc3-vm/supplies/lc3-isa.pdf>
//!
//! Memory, registers and the instruction set live here; the host terminal is
//! reached only through [`console::Console`].

pub mod console;
pub mod image;
pub mod memory;
pub mod opcode;
pub mod registers;
pub mod vm;
