//! Raw PNG chunk reading and writing.

use alloc::vec::Vec;

use crate::{
  bits::{chunk_crc, read_u32_be},
  error::{ConcatError, ConcatResult},
};

/// One raw, CRC-checked chunk as found in a PNG byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'b> {
  pub chunk_ty: [u8; 4],
  pub data: &'b [u8],
  pub declared_crc: u32,
}
impl<'b> RawChunk<'b> {
  /// Recomputes the CRC over `chunk_ty` + `data` and compares it to the
  /// value the chunk declared.
  #[must_use]
  pub fn crc_is_valid(&self) -> bool {
    chunk_crc(self.chunk_ty, self.data) == self.declared_crc
  }
}

/// Iterates the raw chunks of a PNG byte stream, skipping the 8-byte
/// signature. Never panics: a clean end of input ends the iteration with
/// `None`, but running out of bytes partway through a chunk yields one
/// `Err(ConcatError::TruncatedChunk)` and then ends the iteration.
#[derive(Debug, Clone)]
pub struct RawChunkIter<'b> {
  bytes: &'b [u8],
  done: bool,
}
impl<'b> RawChunkIter<'b> {
  /// Builds the iterator. `bytes` should start with the 8-byte PNG
  /// signature; if it's shorter than 8 bytes the iterator will simply be
  /// empty.
  #[must_use]
  pub fn new(bytes: &'b [u8]) -> Self {
    Self { bytes: bytes.get(8..).unwrap_or(&[]), done: false }
  }
}
impl<'b> Iterator for RawChunkIter<'b> {
  type Item = ConcatResult<RawChunk<'b>>;
  fn next(&mut self) -> Option<Self::Item> {
    if self.done || self.bytes.is_empty() {
      return None;
    }
    macro_rules! field {
      ($expr:expr) => {
        match $expr {
          Some(v) => v,
          None => {
            self.done = true;
            return Some(Err(ConcatError::TruncatedChunk));
          }
        }
      };
    }
    let len = field!(read_u32_be(self.bytes)) as usize;
    let chunk_ty: [u8; 4] = field!(self.bytes.get(4..8).and_then(|s| s.try_into().ok()));
    let data = field!(self.bytes.get(8..8 + len));
    let crc_bytes = field!(self.bytes.get(8 + len..12 + len));
    let declared_crc = field!(read_u32_be(crc_bytes));
    self.bytes = &self.bytes[12 + len..];
    Some(Ok(RawChunk { chunk_ty, data, declared_crc }))
  }
}

/// Serializes PNG chunks into an output buffer, computing CRCs as it goes.
///
/// Pairs with [`crate::deflate::Compressor`]: each call to
/// [`ChunkWriter::write_idat`] wraps one batch of compressed bytes in its own
/// `IDAT` chunk, so the whole image is never buffered as a single giant
/// chunk.
#[derive(Debug, Default)]
pub struct ChunkWriter {
  pub out: Vec<u8>,
}
impl ChunkWriter {
  #[must_use]
  pub fn new() -> Self {
    Self { out: Vec::new() }
  }

  pub fn write_signature(&mut self) {
    self.out.extend_from_slice(&crate::bits::PNG_SIGNATURE);
  }

  pub fn write_chunk(&mut self, chunk_ty: [u8; 4], data: &[u8]) {
    self.out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    self.out.extend_from_slice(&chunk_ty);
    self.out.extend_from_slice(data);
    self.out.extend_from_slice(&chunk_crc(chunk_ty, data).to_be_bytes());
  }

  pub fn write_ihdr(
    &mut self, width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8,
  ) {
    let mut data = [0_u8; 13];
    data[0..4].copy_from_slice(&width.to_be_bytes());
    data[4..8].copy_from_slice(&height.to_be_bytes());
    data[8] = bit_depth;
    data[9] = color_type;
    data[10] = 0; // compression method: deflate
    data[11] = 0; // filter method: adaptive
    data[12] = interlace;
    self.write_chunk(*b"IHDR", &data);
  }

  pub fn write_idat(&mut self, compressed: &[u8]) {
    self.write_chunk(*b"IDAT", compressed);
  }

  pub fn write_iend(&mut self) {
    self.write_chunk(*b"IEND", &[]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_a_hand_built_ihdr() {
    let mut w = ChunkWriter::new();
    w.write_signature();
    w.write_ihdr(4, 2, 8, 6, 0);
    w.write_iend();

    assert!(crate::bits::has_png_signature(&w.out));
    let mut it = RawChunkIter::new(&w.out);
    let ihdr = it.next().unwrap().unwrap();
    assert_eq!(&ihdr.chunk_ty, b"IHDR");
    assert!(ihdr.crc_is_valid());
    assert_eq!(read_u32_be(ihdr.data).unwrap(), 4);

    let iend = it.next().unwrap().unwrap();
    assert_eq!(&iend.chunk_ty, b"IEND");
    assert!(iend.data.is_empty());
    assert!(it.next().is_none());
  }

  #[test]
  fn truncated_stream_never_panics() {
    for cut in 0..20 {
      let mut bytes = Vec::from(crate::bits::PNG_SIGNATURE);
      bytes.extend_from_slice(&20_u32.to_be_bytes());
      bytes.extend_from_slice(b"IHDR");
      bytes.extend_from_slice(&[0_u8; 13]);
      bytes.truncate(8 + cut);
      for _ in RawChunkIter::new(&bytes) {
        // must not panic regardless of how truncated the input is
      }
    }
  }

  #[test]
  fn truncation_is_reported_distinctly_from_a_clean_end() {
    let mut bytes = Vec::from(crate::bits::PNG_SIGNATURE);
    bytes.extend_from_slice(&20_u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&[0_u8; 10]); // 20 declared, only 10 present
    let mut it = RawChunkIter::new(&bytes);
    assert_eq!(it.next().unwrap().unwrap_err(), ConcatError::TruncatedChunk);
    assert!(it.next().is_none());
  }
}
