//! CRC32, big-endian integer helpers, and the PNG file signature.

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
  let mut out = [0; 256];
  let mut n = 0;
  while n < 256 {
    let mut c = n as u32;
    let mut k = 0;
    while k < 8 {
      if (c & 1) != 0 {
        c = 0xEDB8_8320_u32 ^ (c >> 1);
      } else {
        c >>= 1;
      }
      k += 1;
    }
    out[n] = c;
    n += 1;
  }
  out
}

fn update_crc(mut crc: u32, iter: impl Iterator<Item = u8>) -> u32 {
  for byte in iter {
    let i = (crc ^ u32::from(byte)) as u8 as usize;
    crc = CRC_TABLE[i] ^ (crc >> 8);
  }
  crc
}

/// CRC32 of a byte iterator, using PNG's initial/final XOR convention.
#[inline]
#[must_use]
pub fn png_crc(iter: impl Iterator<Item = u8>) -> u32 {
  update_crc(u32::MAX, iter) ^ u32::MAX
}

/// CRC32 over a chunk's type bytes followed by its data, the value stored
/// after every chunk.
#[must_use]
pub fn chunk_crc(chunk_ty: [u8; 4], data: &[u8]) -> u32 {
  png_crc(chunk_ty.into_iter().chain(data.iter().copied()))
}

/// The first eight bytes of every PNG datastream.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// True if `bytes` begins with [`PNG_SIGNATURE`].
#[inline]
#[must_use]
pub fn has_png_signature(bytes: &[u8]) -> bool {
  bytes.len() >= 8 && bytes[..8] == PNG_SIGNATURE
}

#[inline]
#[must_use]
pub fn read_u32_be(bytes: &[u8]) -> Option<u32> {
  Some(u32::from_be_bytes(bytes.get(0..4)?.try_into().ok()?))
}

#[inline]
#[must_use]
pub fn read_u16_be(bytes: &[u8]) -> Option<u16> {
  Some(u16::from_be_bytes(bytes.get(0..2)?.try_into().ok()?))
}

#[cfg(feature = "alloc")]
#[inline]
pub fn write_u32_be(out: &mut alloc::vec::Vec<u8>, v: u32) {
  out.extend_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn crc_matches_known_png_iend() {
    // the CRC of an IEND chunk (empty data) is a well known constant
    assert_eq!(chunk_crc(*b"IEND", &[]), 0xAE42_6082);
  }

  #[test]
  fn signature_check() {
    assert!(has_png_signature(&PNG_SIGNATURE));
    assert!(!has_png_signature(b"not a png"));
    assert!(!has_png_signature(&PNG_SIGNATURE[..4]));
  }
}
