use emulator::console::BufferConsole;
use emulator::image::Image;
use emulator::memory::KBSR;
use emulator::vm::{Error, State, Vm, PC_START};

/// Serialise words the way image files store them
fn image_bytes(origin: u16, words: &[u16]) -> Vec<u8> {
  std::iter::once(origin)
    .chain(words.iter().copied())
    .flat_map(u16::to_be_bytes)
    .collect()
}

fn boot(images: &[Vec<u8>]) -> Vm {
  let mut vm = Vm::new();
  for bytes in images {
    let image = Image::from_bytes(bytes).unwrap();
    vm.load(&image);
  }
  vm.boot(PC_START);
  vm
}

#[test]
fn hello_world() {
  #[rustfmt::skip]
  let program = [
    0xE002, // lea r0, #2
    0xF022, // puts
    0xF025, // halt
    0x0048, 0x0065, 0x006C, 0x006C, 0x006F, 0x000A, 0x0000, // "Hello\n"
  ];
  let mut vm = boot(&[image_bytes(PC_START, &program)]);
  let mut console = BufferConsole::default();
  vm.run(&mut console).unwrap();
  assert_eq!(vm.state(), State::Halted);
  assert_eq!(console.output_lossy(), "Hello\nHALT\n");
}

#[test]
fn countdown_loop() {
  #[rustfmt::skip]
  let program = [
    0x5260, // and r1, r1, #0
    0x1265, // add r1, r1, #5
    0x54A0, // and r2, r2, #0
    0x14A3, // add r2, r2, #3     ; loop:
    0x127F, // add r1, r1, #-1
    0x03FD, // brp loop
    0xF025, // halt
  ];
  let mut vm = boot(&[image_bytes(PC_START, &program)]);
  vm.run(&mut BufferConsole::default()).unwrap();
  assert_eq!(vm.registers().get(1), 0);
  assert_eq!(vm.registers().get(2), 15);
}

#[test]
fn subroutine_call_and_return() {
  #[rustfmt::skip]
  let program = [
    0x2005, // ld r0, #5          ; '!'
    0x4802, // jsr #2
    0xF021, // out
    0xF025, // halt
    0x1021, // add r0, r0, #1     ; bump: '!' -> '"'
    0xC1C0, // ret
    0x0021,
  ];
  let mut vm = boot(&[image_bytes(PC_START, &program)]);
  let mut console = BufferConsole::default();
  vm.run(&mut console).unwrap();
  assert_eq!(console.output(), b"\"HALT\n");
  assert_eq!(vm.registers().get(7), PC_START + 2);
}

#[test]
fn echo_through_traps() {
  #[rustfmt::skip]
  let program = [
    0xF023, // in
    0x1021, // add r0, r0, #1
    0xF021, // out
    0xF020, // getc
    0xF021, // out
    0xF025, // halt
  ];
  let mut vm = boot(&[image_bytes(PC_START, &program)]);
  let mut console = BufferConsole::with_input("ax");
  vm.run(&mut console).unwrap();
  assert_eq!(console.output(), b"abxHALT\n");
}

#[test]
fn polls_keyboard_until_ready() {
  #[rustfmt::skip]
  let program = [
    0xA003, // ldi r0, #3        ; poll: KBSR
    0x07FE, // brzp poll
    0xA002, // ldi r0, #2        ; KBDR
    0xF025, // halt
    KBSR,
    0xFE02,
  ];
  let mut vm = boot(&[image_bytes(PC_START, &program)]);
  // nothing typed for the first three polls
  let mut console = BufferConsole::with_input("q").with_idle_polls(3);
  let mut steps = 0;
  while vm.is_running() {
    vm.step(&mut console).unwrap();
    steps += 1;
  }
  assert_eq!(vm.registers().get(0), b'q' as u16);
  // three idle ldi/brzp rounds, then ldi, brzp, ldi, halt
  assert_eq!(steps, 3 * 2 + 4);
}

#[test]
fn later_images_overwrite_earlier() {
  let first = image_bytes(PC_START, &[0x1021, 0x1021, 0xF025]);
  // replace the second increment with a halt
  let second = image_bytes(PC_START + 1, &[0xF025]);
  let mut vm = boot(&[first, second]);
  vm.run(&mut BufferConsole::default()).unwrap();
  assert_eq!(vm.registers().get(0), 1);
}

#[test]
fn faults_surface_to_the_caller() {
  let mut vm = boot(&[image_bytes(PC_START, &[0xF0FF])]);
  let err = vm.run(&mut BufferConsole::default()).unwrap_err();
  assert!(matches!(err, Error::InvalidTrap { vector: 0xFF, .. }));
  assert_eq!(vm.state(), State::Faulted);
}

#[test]
fn embedder_can_poke_state_between_steps() {
  // st r1, #1 ; halt ; (data)
  let mut vm = boot(&[image_bytes(PC_START, &[0x3201, 0xF025])]);
  vm.registers_mut().set(1, 0xCAFE);
  vm.memory_mut().write(0x3003, 0xFFFF);
  let mut console = BufferConsole::default();
  vm.step(&mut console).unwrap();
  assert_eq!(vm.memory().peek(0x3002), 0xCAFE);
  assert_eq!(vm.memory().peek(0x3003), 0xFFFF);
  assert!(vm.is_running());
  vm.step(&mut console).unwrap();
  assert!(!vm.is_running());
}
