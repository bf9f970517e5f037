//! The host side of the machine's character I/O.
//!
//! The execution engine only ever talks to a [`Console`]; where the bytes
//! actually come from is up to the implementation.

use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// Keyboard and display capabilities the machine needs from its host
pub trait Console {
  /// Take the next pending key without blocking, if there is one
  fn poll_key(&mut self) -> io::Result<Option<u16>>;

  /// Block until a key is pressed, without echoing it
  fn read_key(&mut self) -> io::Result<u16>;

  fn write_byte(&mut self, byte: u8) -> io::Result<()>;

  fn flush(&mut self) -> io::Result<()>;

  fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
    for &byte in bytes {
      self.write_byte(byte)?;
    }
    Ok(())
  }
}

/// A console fed from a queue of key codes, capturing everything written
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
  input: VecDeque<u16>,
  output: Vec<u8>,
  flushes: usize,
  idle_polls: usize,
}

impl BufferConsole {
  /// Queue the bytes of `keys` as input
  pub fn with_input(keys: &str) -> Self {
    Self {
      input: keys.bytes().map(u16::from).collect(),
      ..Self::default()
    }
  }

  /// Make the next `polls` keyboard polls report no key, as if the user has
  /// not typed yet
  pub fn with_idle_polls(mut self, polls: usize) -> Self {
    self.idle_polls = polls;
    self
  }

  pub fn push_key(&mut self, key: u16) {
    self.input.push_back(key);
  }

  /// Keys not yet consumed
  pub fn pending(&self) -> usize {
    self.input.len()
  }

  pub fn output(&self) -> &[u8] {
    &self.output
  }

  pub fn output_lossy(&self) -> String {
    String::from_utf8_lossy(&self.output).into_owned()
  }

  /// How many times the machine asked for output to be flushed
  pub fn flushes(&self) -> usize {
    self.flushes
  }
}

impl Console for BufferConsole {
  fn poll_key(&mut self) -> io::Result<Option<u16>> {
    if self.idle_polls > 0 {
      self.idle_polls -= 1;
      return Ok(None);
    }
    Ok(self.input.pop_front())
  }

  fn read_key(&mut self) -> io::Result<u16> {
    self.input.pop_front().ok_or_else(|| {
      io::Error::new(io::ErrorKind::UnexpectedEof, "no more scripted input")
    })
  }

  fn write_byte(&mut self, byte: u8) -> io::Result<()> {
    self.output.push(byte);
    Ok(())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.flushes += 1;
    Ok(())
  }
}

/// The process's own terminal, switched to raw mode while this value lives.
pub struct TerminalConsole {
  out: Stdout,
}

impl TerminalConsole {
  /// Put the terminal in raw mode. It is restored when the console is dropped.
  pub fn enter() -> io::Result<Self> {
    terminal::enable_raw_mode()?;
    log::debug!("terminal switched to raw mode");
    Ok(Self { out: io::stdout() })
  }
}

impl Drop for TerminalConsole {
  fn drop(&mut self) {
    let _ = self.out.flush();
    let _ = terminal::disable_raw_mode();
  }
}

impl Console for TerminalConsole {
  fn poll_key(&mut self) -> io::Result<Option<u16>> {
    while event::poll(Duration::ZERO)? {
      if let Event::Key(key) = event::read()? {
        if let Some(code) = key_code(key)? {
          return Ok(Some(code));
        }
      }
    }
    Ok(None)
  }

  fn read_key(&mut self) -> io::Result<u16> {
    loop {
      if let Event::Key(key) = event::read()? {
        if let Some(code) = key_code(key)? {
          return Ok(code);
        }
      }
    }
  }

  fn write_byte(&mut self, byte: u8) -> io::Result<()> {
    // raw mode turns off output post-processing
    if byte == b'\n' {
      return self.out.write_all(b"\r\n");
    }
    let mut encoded = [0; 2];
    let text = char::from(byte).encode_utf8(&mut encoded);
    self.out.write_all(text.as_bytes())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.out.flush()
  }
}

/// Translate a terminal key event into the code a program sees.
///
/// Characters keep their full code point truncated to 16 bits; nothing masks
/// them down to 8 bits. Keys without a character read as 0. Ctrl+C is an
/// interrupt, since raw mode swallows the signal.
fn key_code(key: KeyEvent) -> io::Result<Option<u16>> {
  if key.kind != KeyEventKind::Press {
    return Ok(None);
  }
  let code = match key.code {
    KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
      if c.eq_ignore_ascii_case(&'c') {
        return Err(io::Error::new(
          io::ErrorKind::Interrupted,
          "interrupted by operator",
        ));
      }
      if c.is_ascii_alphabetic() {
        c.to_ascii_lowercase() as u16 & 0x1F
      } else {
        c as u32 as u16
      }
    }
    KeyCode::Char(c) => c as u32 as u16,
    KeyCode::Enter => 0x0D,
    KeyCode::Tab => 0x09,
    KeyCode::Backspace => 0x08,
    KeyCode::Esc => 0x1B,
    _ => 0,
  };
  Ok(Some(code))
}
