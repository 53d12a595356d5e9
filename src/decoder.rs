//! Decoder plug-in interface, and the bundled PNG decoder.
//!
//! PNG is the one format this crate decodes itself, one scanline at a time.
//! [`probe_format`] identifies a source's format from its magic bytes, and
//! [`open_registered_decoder`] is the dispatch point: the "registry" is just
//! that one match statement, rather than a process-wide singleton. JPEG and
//! HEIC are recognized formats but have no decoder plugged in here:
//! [`JpegDecoder`]/[`HeicDecoder`] are interface-only, so probing either one
//! yields [`ConcatError::DecoderUnavailable`]; anything implementing
//! [`ImageDecoder`] could be wired into that dispatch without touching
//! [`crate::concat`].

use alloc::vec::Vec;

use crate::{
  adam7, bits,
  chunk::RawChunkIter,
  deflate::decompress_idat_to_temp_storage,
  error::{ConcatError, ConcatResult},
  filtering::reconstruct_row,
  pixel_formats::{RGB8, RGBA8},
};

/// The pixel format a PNG's `IHDR` declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngColorType {
  Y = 0,
  RGB = 2,
  Index = 3,
  YA = 4,
  RGBA = 6,
}
impl PngColorType {
  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> usize {
    match self {
      Self::Y => 1,
      Self::RGB => 3,
      Self::Index => 1,
      Self::YA => 2,
      Self::RGBA => 4,
    }
  }
}
impl TryFrom<u8> for PngColorType {
  type Error = ConcatError;
  #[inline]
  fn try_from(value: u8) -> ConcatResult<Self> {
    Ok(match value {
      0 => PngColorType::Y,
      2 => PngColorType::RGB,
      3 => PngColorType::Index,
      4 => PngColorType::YA,
      6 => PngColorType::RGBA,
      _ => return Err(ConcatError::MissingIHDR),
    })
  }
}

/// The decoded `IHDR` of a PNG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngHeader {
  pub width: u32,
  pub height: u32,
  pub bit_depth: u8,
  pub color_type: PngColorType,
  pub is_interlaced: bool,
}
impl PngHeader {
  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(&self) -> usize {
    self.bit_depth as usize * self.color_type.channel_count()
  }

  #[inline]
  #[must_use]
  pub const fn bytes_per_filterline(&self, width: u32) -> usize {
    1 + ((self.bits_per_pixel() * (width as usize)) + 7) / 8
  }

  fn try_from_ihdr_data(data: &[u8]) -> ConcatResult<Self> {
    if data.len() != 13 {
      return Err(ConcatError::MissingIHDR);
    }
    let width = bits::read_u32_be(&data[0..4]).ok_or(ConcatError::MissingIHDR)?;
    let height = bits::read_u32_be(&data[4..8]).ok_or(ConcatError::MissingIHDR)?;
    if width == 0 || height == 0 {
      return Err(ConcatError::WidthOrHeightZero);
    }
    let bit_depth = data[8];
    let color_type = PngColorType::try_from(data[9])?;
    let legal_depth = match color_type {
      PngColorType::Y => [1, 2, 4, 8, 16].contains(&bit_depth),
      PngColorType::Index => [1, 2, 4, 8].contains(&bit_depth),
      PngColorType::RGB | PngColorType::YA | PngColorType::RGBA => [8, 16].contains(&bit_depth),
    };
    if !legal_depth || data[10] != 0 || data[11] != 0 || data[12] > 1 {
      return Err(ConcatError::MissingIHDR);
    }
    Ok(Self { width, height, bit_depth, color_type, is_interlaced: data[12] == 1 })
  }
}

/// Per-strip read contract a decoder plug-in implements.
///
/// Modeled so a pull-based decoder (PNG, which streams truly one row at a
/// time) and a decode-then-slice decoder (JPEG/HEIC, which must decode the
/// whole frame before the first row is available) look the same to
/// [`crate::concat`].
pub trait ImageDecoder {
  /// Width, height, and whether the source carries an alpha channel.
  fn header(&self) -> (u32, u32, bool);

  /// The largest number of rows [`Self::next_rows`] may hand back at once.
  fn preferred_strip_height(&self) -> u32 {
    1
  }

  /// Writes the next up-to-`dst.len() / width` rows of RGBA8 pixels into
  /// `dst`, returning how many full rows were written. Returns `0` once the
  /// image is exhausted.
  fn next_rows(&mut self, dst: &mut [RGBA8]) -> ConcatResult<u32>;
}

/// A streaming PNG decoder: holds a decompression scratch buffer sized for
/// one pass at a time and unfilters + normalizes rows to RGBA8 as it goes.
pub struct PngDecoder<'b> {
  header: PngHeader,
  plte: Option<&'b [RGB8]>,
  trns: Trns,
  /// For `PngColorType::Index`: the `tRNS` chunk's raw bytes, which for
  /// palette images already *are* one alpha value per palette index, in
  /// index order. Indices past the end of this slice are fully opaque, per
  /// the PNG spec.
  index_alpha: Option<&'b [u8]>,
  decompressed: Vec<u8>,
  cursor: usize,
  row_in_pass: u32,
  pass: usize,
  prev_row: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
enum Trns {
  #[default]
  None,
  Y(u16),
  Rgb(u16, u16, u16),
}

impl<'b> PngDecoder<'b> {
  /// Parses chunks out of `png_bytes`, decompresses the whole IDAT stream up
  /// front (the only part of PNG decode this crate can't do truly
  /// incrementally, since deflate itself isn't seekable), and prepares to
  /// unfilter rows on demand.
  pub fn new(png_bytes: &'b [u8]) -> ConcatResult<Self> {
    if !bits::has_png_signature(png_bytes) {
      return Err(ConcatError::CorruptSignature);
    }
    let mut header = None;
    let mut plte: Option<&[u8]> = None;
    let mut trns_raw: Option<&[u8]> = None;
    let mut idat_slices: Vec<&[u8]> = Vec::new();
    for raw in RawChunkIter::new(png_bytes) {
      let raw = raw?;
      if !raw.crc_is_valid() {
        return Err(ConcatError::ChunkCrcMismatch);
      }
      match &raw.chunk_ty {
        b"IHDR" => header = Some(PngHeader::try_from_ihdr_data(raw.data)?),
        b"PLTE" => plte = Some(raw.data),
        b"tRNS" => trns_raw = Some(raw.data),
        b"IDAT" => idat_slices.push(raw.data),
        b"IEND" => break,
        _ => (),
      }
    }
    let header = header.ok_or(ConcatError::MissingIHDR)?;
    if idat_slices.is_empty() {
      return Err(ConcatError::MissingIDAT);
    }
    let plte: Option<&[RGB8]> = match plte {
      Some(data) if data.len() % 3 == 0 => Some(bytemuck::cast_slice(data)),
      Some(_) => return Err(ConcatError::MissingIHDR),
      None => None,
    };
    let trns = match (header.color_type, trns_raw) {
      (PngColorType::Y, Some(&[y0, y1])) => Trns::Y(u16::from_be_bytes([y0, y1])),
      (PngColorType::RGB, Some(&[r0, r1, g0, g1, b0, b1])) => Trns::Rgb(
        u16::from_be_bytes([r0, r1]),
        u16::from_be_bytes([g0, g1]),
        u16::from_be_bytes([b0, b1]),
      ),
      _ => Trns::None,
    };
    let index_alpha = match header.color_type {
      PngColorType::Index => trns_raw,
      _ => None,
    };

    let byte_len = zlib_output_len(&header);
    let mut decompressed = alloc::vec![0_u8; byte_len];
    let written =
      decompress_idat_to_temp_storage(&mut decompressed, idat_slices.into_iter())?;
    decompressed.truncate(written);

    Ok(Self {
      header,
      plte,
      trns,
      index_alpha,
      decompressed,
      cursor: 0,
      row_in_pass: 0,
      pass: if header.is_interlaced { 1 } else { 0 },
      prev_row: Vec::new(),
    })
  }

  #[must_use]
  pub fn header_info(&self) -> PngHeader {
    self.header
  }

  /// The Adam7 pass (0 if non-interlaced) and within-pass row index that the
  /// most recent [`ImageDecoder::next_rows`] call produced. Callers doing
  /// their own placement of interlaced pixels use this with
  /// [`adam7::interlaced_pos_to_full_pos`].
  #[must_use]
  pub fn last_row_location(&self) -> (usize, u32) {
    (self.pass, self.row_in_pass.saturating_sub(1))
  }
}

fn zlib_output_len(header: &PngHeader) -> usize {
  if header.is_interlaced {
    adam7::reduced_image_dimensions(header.width, header.height)[1..]
      .iter()
      .map(|&(w, h)| header.bytes_per_filterline(w) * h as usize)
      .sum()
  } else {
    header.bytes_per_filterline(header.width) * header.height as usize
  }
}

impl<'b> ImageDecoder for PngDecoder<'b> {
  fn header(&self) -> (u32, u32, bool) {
    let has_alpha = matches!(self.header.color_type, PngColorType::RGBA | PngColorType::YA)
      || !matches!(self.trns, Trns::None)
      || self.index_alpha.is_some();
    (self.header.width, self.header.height, has_alpha)
  }

  fn next_rows(&mut self, dst: &mut [RGBA8]) -> ConcatResult<u32> {
    let width = self.header.width as usize;
    if dst.len() < width {
      return Ok(0);
    }
    loop {
      let pass = self.pass;
      let dims = if self.header.is_interlaced {
        adam7::reduced_image_dimensions(self.header.width, self.header.height)
      } else {
        [(self.header.width, self.header.height); 8]
      };
      let (pass_w, pass_h) = dims[if self.header.is_interlaced { pass } else { 0 }];
      if pass_w == 0 || pass_h == 0 || self.row_in_pass >= pass_h {
        if !self.header.is_interlaced || pass >= 7 {
          return Ok(0);
        }
        self.pass += 1;
        self.row_in_pass = 0;
        self.prev_row.clear();
        continue;
      }

      let line_len = self.header.bytes_per_filterline(pass_w);
      if self.cursor + line_len > self.decompressed.len() {
        return Err(ConcatError::Adam7Truncated);
      }
      let line = &mut self.decompressed[self.cursor..self.cursor + line_len];
      self.cursor += line_len;
      let filter_ty = line[0];
      if filter_ty > 4 {
        return Err(ConcatError::InvalidFilterType);
      }
      let bpp = (self.header.bits_per_pixel() / 8).max(1);
      let prev = if self.prev_row.is_empty() { None } else { Some(&self.prev_row[..]) };
      reconstruct_row(filter_ty, bpp, &mut line[1..], prev);

      for (x, px) in dst.iter_mut().take(pass_w as usize).enumerate() {
        *px = self.sample_pixel(&line[1..], x);
        if self.header.is_interlaced {
          // caller must map (x, row_in_pass, pass) back to full image
          // coordinates via adam7::interlaced_pos_to_full_pos; we hand back
          // one reduced-pass row at a time so that mapping can happen at the
          // call site.
        }
      }
      self.prev_row.clear();
      self.prev_row.extend_from_slice(&line[1..]);
      self.row_in_pass += 1;
      return Ok(1);
    }
  }
}

impl<'b> PngDecoder<'b> {
  fn sample_pixel(&self, row: &[u8], x: usize) -> RGBA8 {
    use bitfrob::{u8_bit_split_1x8_rev, u8_bit_split_2x4_rev, u8_bit_split_4x2_rev};
    let bd = self.header.bit_depth;
    // RGB/RGBA/YA are only ever 8 or 16 bits deep; at 16 bits each channel is
    // two bytes and only the high byte survives normalization to RGBA8.
    let bytes_per_channel = (bd as usize / 8).max(1);
    let channel = |n: usize| row[(x * self.header.color_type.channel_count() + n) * bytes_per_channel];
    match self.header.color_type {
      PngColorType::RGBA => {
        RGBA8 { r: channel(0), g: channel(1), b: channel(2), a: channel(3) }
      }
      PngColorType::RGB => {
        let (r, g, b) = (channel(0), channel(1), channel(2));
        let hi = |v: u16| (v >> (bd - 8)) as u8;
        let a = match self.trns {
          Trns::Rgb(tr, tg, tb) if hi(tr) == r && hi(tg) == g && hi(tb) == b => 0,
          _ => 255,
        };
        RGBA8 { r, g, b, a }
      }
      PngColorType::YA => {
        let y = channel(0);
        RGBA8 { r: y, g: y, b: y, a: channel(1) }
      }
      PngColorType::Y => {
        let y = match bd {
          8 | 16 => row[x * (bd as usize / 8)],
          4 => {
            let byte = row[x / 2];
            let [hi, lo] = u8_bit_split_4x2_rev(byte);
            (if x % 2 == 0 { hi } else { lo }) * 17
          }
          2 => {
            let byte = row[x / 4];
            let parts = u8_bit_split_2x4_rev(byte);
            parts[x % 4] * 85
          }
          1 => {
            let byte = row[x / 8];
            let parts = u8_bit_split_1x8_rev(byte);
            parts[x % 8] * 255
          }
          _ => 0,
        };
        let a = match self.trns {
          Trns::Y(ty) if (if bd == 16 { (ty >> 8) as u8 } else { ty as u8 }) == y => 0,
          _ => 255,
        };
        RGBA8 { r: y, g: y, b: y, a }
      }
      PngColorType::Index => {
        let idx = match bd {
          8 => row[x],
          4 => {
            let byte = row[x / 2];
            let [hi, lo] = u8_bit_split_4x2_rev(byte);
            if x % 2 == 0 { hi } else { lo }
          }
          2 => {
            let byte = row[x / 4];
            u8_bit_split_2x4_rev(byte)[x % 4]
          }
          1 => {
            let byte = row[x / 8];
            u8_bit_split_1x8_rev(byte)[x % 8]
          }
          _ => 0,
        };
        let rgb = self.plte.and_then(|p| p.get(idx as usize)).copied().unwrap_or_default();
        let a = self.index_alpha.and_then(|alphas| alphas.get(idx as usize)).copied().unwrap_or(255);
        RGBA8 { r: rgb.r, g: rgb.g, b: rgb.b, a }
      }
    }
  }
}

/// Interface-only decoder for JPEG inputs. A concrete JPEG bitstream decoder
/// is out of scope for this crate; this exists so the layout/compositing
/// pipeline can be written against a single [`ImageDecoder`] abstraction and
/// a real implementation can be plugged in later without touching
/// [`crate::concat`].
#[cfg(feature = "alloc")]
pub trait JpegDecoder: ImageDecoder {}

/// Interface-only decoder for HEIC inputs, same rationale as
/// [`JpegDecoder`].
#[cfg(feature = "alloc")]
pub trait HeicDecoder: ImageDecoder {}

/// Recognized input formats, probed from the first few bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
  Png,
  Jpeg,
  Heic,
}

/// ISO-BMFF "brand" codes (the 4 bytes right after `ftyp`) that identify a
/// HEIC/HEIF family file rather than some other `ftyp`-boxed container (MP4,
/// AVIF, ...).
const HEIC_BRANDS: [&[u8; 4]; 10] =
  [b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs", b"mif1", b"msf1"];

/// Identifies a source format from its magic bytes.
#[must_use]
pub fn probe_format(bytes: &[u8]) -> Option<SourceFormat> {
  if bits::has_png_signature(bytes) {
    Some(SourceFormat::Png)
  } else if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
    Some(SourceFormat::Jpeg)
  } else if bytes.len() >= 12
    && &bytes[4..8] == b"ftyp"
    && HEIC_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
  {
    Some(SourceFormat::Heic)
  } else {
    None
  }
}

/// Looks up and constructs the decoder registered for `bytes`'s probed
/// format. PNG is the only format with a decoder bundled in this crate;
/// JPEG and HEIC are recognized but have no concrete [`ImageDecoder`]
/// plugged in, so they report [`ConcatError::DecoderUnavailable`] rather
/// than being silently fed through the PNG decoder.
pub fn open_registered_decoder(bytes: &[u8]) -> ConcatResult<PngDecoder<'_>> {
  match probe_format(bytes) {
    Some(SourceFormat::Png) => PngDecoder::new(bytes),
    Some(SourceFormat::Jpeg | SourceFormat::Heic) => Err(ConcatError::DecoderUnavailable),
    None => Err(ConcatError::UnsupportedFormat),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn probe_recognizes_png_signature() {
    assert_eq!(probe_format(&bits::PNG_SIGNATURE), Some(SourceFormat::Png));
  }

  #[test]
  fn probe_recognizes_jpeg_soi() {
    assert_eq!(probe_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(SourceFormat::Jpeg));
  }

  #[test]
  fn probe_rejects_garbage() {
    assert_eq!(probe_format(b"not an image"), None);
  }

  #[test]
  fn probe_recognizes_heic_brand() {
    let mut bytes = alloc::vec![0_u8; 16];
    bytes[4..8].copy_from_slice(b"ftyp");
    bytes[8..12].copy_from_slice(b"heic");
    assert_eq!(probe_format(&bytes), Some(SourceFormat::Heic));
  }

  #[test]
  fn probe_rejects_ftyp_with_unrecognized_brand() {
    let mut bytes = alloc::vec![0_u8; 16];
    bytes[4..8].copy_from_slice(b"ftyp");
    bytes[8..12].copy_from_slice(b"M4A "); // audio, not HEIC
    assert_eq!(probe_format(&bytes), None);
  }

  #[test]
  fn new_decoder_rejects_missing_signature() {
    assert_eq!(PngDecoder::new(b"not a png").unwrap_err(), ConcatError::CorruptSignature);
  }

  #[test]
  fn registered_decoder_rejects_recognized_but_unplugged_formats() {
    assert_eq!(
      open_registered_decoder(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap_err(),
      ConcatError::DecoderUnavailable
    );
  }

  #[test]
  fn registered_decoder_rejects_unrecognized_formats() {
    assert_eq!(open_registered_decoder(b"not an image").unwrap_err(), ConcatError::UnsupportedFormat);
  }
}
