//! Zlib-wrapped deflate compression and decompression for IDAT data.
//!
//! Decompression is pull-based and streams across as many IDAT chunks as the
//! data spans. Compression is push-based: callers feed it raw filtered
//! scanline bytes as they become available and periodically pull out
//! whatever compressed bytes are ready, so the whole image never needs to be
//! buffered uncompressed.

use alloc::vec::Vec;

use miniz_oxide::{
  deflate::core::{CompressorOxide, TDEFLFlush, TDEFLStatus},
  inflate::{
    core::{
      decompress,
      inflate_flags::{
        TINFL_FLAG_HAS_MORE_INPUT, TINFL_FLAG_IGNORE_ADLER32, TINFL_FLAG_PARSE_ZLIB_HEADER,
        TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF,
      },
      DecompressorOxide,
    },
    TINFLStatus,
  },
};

use crate::error::{ConcatError, ConcatResult};

/// Decompresses a zlib stream spread across one or more IDAT chunk payloads
/// into `out`, which must already be sized to hold the whole decompressed
/// result.
///
/// This doesn't give you unfiltered pixels, just the filtered bytes; see
/// [`crate::filtering`] for the next step.
pub fn decompress_idat_to_temp_storage<'inp>(
  out: &mut [u8], it: impl Iterator<Item = &'inp [u8]>,
) -> ConcatResult<usize> {
  let mut it = it.peekable();
  let r = &mut DecompressorOxide::new();
  let mut out_pos = 0;
  let mut zlib_header = true;
  while let Some(in_buf) = it.next() {
    let has_more = it.peek().is_some();
    let flags = if zlib_header { TINFL_FLAG_PARSE_ZLIB_HEADER } else { 0 }
      | TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF
      | TINFL_FLAG_IGNORE_ADLER32
      | if has_more { TINFL_FLAG_HAS_MORE_INPUT } else { 0 };
    let (status, _input_read, bytes_written) = decompress(r, in_buf, out, out_pos, flags);
    zlib_header = false;
    out_pos += bytes_written;
    match status {
      TINFLStatus::Done | TINFLStatus::Adler32Mismatch => return Ok(out_pos),
      TINFLStatus::FailedCannotMakeProgress | TINFLStatus::NeedsMoreInput => {
        if !has_more {
          return Err(ConcatError::TruncatedStream);
        }
        continue;
      }
      TINFLStatus::BadParam | TINFLStatus::Failed => return Err(ConcatError::DecompressionError),
      // the decompressed data didn't fit in `out`, i.e. it's longer than
      // the caller expected from the image's declared dimensions.
      TINFLStatus::HasMoreOutput => return Err(ConcatError::ExtraBytes),
    }
  }
  Ok(out_pos)
}

/// A streaming zlib compressor for pushing filtered scanline bytes into
/// `IDAT` chunk payloads as they're produced.
pub struct Compressor {
  oxide: CompressorOxide,
}
impl Compressor {
  #[must_use]
  pub fn new(level: u8) -> Self {
    let flags = miniz_oxide::deflate::core::create_comp_flags_from_zip_params(
      i32::from(level),
      1, // zlib wrapper (window_bits = 1 means "wrap", per miniz_oxide's convention)
      0,
    );
    Self { oxide: CompressorOxide::new(flags) }
  }

  /// Feeds more raw (filtered) bytes in and returns any compressed bytes
  /// that became ready. Call [`Self::finish`] once all input has been fed.
  pub fn push(&mut self, input: &[u8]) -> ConcatResult<Vec<u8>> {
    self.compress(input, TDEFLFlush::None)
  }

  /// Forces all buffered input out as compressed bytes right now (a zlib
  /// sync flush), at the cost of a slightly worse compression ratio.
  pub fn flush(&mut self) -> ConcatResult<Vec<u8>> {
    self.compress(&[], TDEFLFlush::Sync)
  }

  /// Finishes the stream, flushing and finalizing the zlib trailer.
  pub fn finish(mut self) -> ConcatResult<Vec<u8>> {
    self.compress(&[], TDEFLFlush::Finish)
  }

  fn compress(&mut self, input: &[u8], flush: TDEFLFlush) -> ConcatResult<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() / 2 + 32);
    let mut in_pos = 0;
    loop {
      let mut chunk = [0_u8; 32 * 1024];
      let (status, bytes_in, bytes_out) = miniz_oxide::deflate::core::compress(
        &mut self.oxide,
        &input[in_pos..],
        &mut chunk,
        flush,
      );
      out.extend_from_slice(&chunk[..bytes_out]);
      in_pos += bytes_in;
      match status {
        TDEFLStatus::Okay if in_pos >= input.len() && bytes_out == 0 => break,
        TDEFLStatus::Okay => continue,
        TDEFLStatus::Done => break,
        TDEFLStatus::BadParam | TDEFLStatus::PutBufFailed => {
          return Err(ConcatError::CompressionError)
        }
      }
    }
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compress_then_decompress_round_trips() {
    let raw = b"the quick brown fox jumps over the lazy dog".repeat(20);
    let mut compressor = Compressor::new(6);
    let mut compressed = compressor.push(&raw).unwrap();
    compressed.extend(compressor.finish().unwrap());

    let mut out = alloc::vec![0_u8; raw.len()];
    let n = decompress_idat_to_temp_storage(&mut out, core::iter::once(&compressed[..])).unwrap();
    assert_eq!(n, raw.len());
    assert_eq!(&out[..], &raw[..]);
  }

  #[test]
  fn decompress_truncated_input_errors_not_panics() {
    let mut out = [0_u8; 16];
    let err = decompress_idat_to_temp_storage(&mut out, core::iter::once(&[0x78_u8][..]));
    assert!(err.is_err());
  }

  #[test]
  fn decompress_reports_extra_bytes_when_output_overruns() {
    let raw = b"the quick brown fox jumps over the lazy dog".repeat(20);
    let mut compressor = Compressor::new(6);
    let mut compressed = compressor.push(&raw).unwrap();
    compressed.extend(compressor.finish().unwrap());

    let mut out = alloc::vec![0_u8; raw.len() / 2];
    let err = decompress_idat_to_temp_storage(&mut out, core::iter::once(&compressed[..]));
    assert_eq!(err.unwrap_err(), ConcatError::ExtraBytes);
  }
}
