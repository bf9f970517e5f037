use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::memory::Memory;

/// A program image: an origin followed by the words placed from there on.
///
/// On disk every word is big-endian and the first word is the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
  origin: u16,
  words: Vec<u16>,
}

/// Why an image could not be read
#[derive(thiserror::Error, Debug)]
pub enum ImageError {
  #[error("could not open `{}`", path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("could not read image")]
  Read(#[from] io::Error),

  #[error("image is too short to hold an origin")]
  MissingOrigin,

  #[error("image ends in the middle of a word ({len} bytes)")]
  Truncated { len: usize },
}

impl Image {
  pub fn new(origin: u16, words: Vec<u16>) -> Self {
    Self { origin, words }
  }

  /// Parse big-endian image bytes
  pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
    if bytes.len() % 2 != 0 {
      return Err(ImageError::Truncated { len: bytes.len() });
    }
    let mut words = bytes
      .chunks_exact(2)
      .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    let origin = words.next().ok_or(ImageError::MissingOrigin)?;
    Ok(Self {
      origin,
      words: words.collect(),
    })
  }

  pub fn from_reader<R>(mut reader: R) -> Result<Self, ImageError>
  where
    R: Read,
  {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Self::from_bytes(&bytes)
  }

  /// Read the image file at `path`
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ImageError::Open {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_reader(file)
  }

  pub fn origin(&self) -> u16 {
    self.origin
  }

  pub fn words(&self) -> &[u16] {
    &self.words
  }

  /// Copy the image into `memory` starting at its origin, returning how many
  /// words were placed. Words past 0xFFFF are dropped.
  pub fn load_into(&self, memory: &mut Memory) -> usize {
    let room = 0x1_0000 - self.origin as usize;
    let placed = self.words.len().min(room);
    if placed < self.words.len() {
      log::warn!(
        "image at {:#06x} overruns memory, dropping {} words",
        self.origin,
        self.words.len() - placed
      );
    }
    for (offset, &word) in self.words[..placed].iter().enumerate() {
      memory.write(self.origin.wrapping_add(offset as u16), word);
    }
    placed
  }
}
