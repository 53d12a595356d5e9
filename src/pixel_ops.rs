//! Row-level pixel operations: background fill and source-over compositing.

use crate::pixel_formats::RGBA8;

/// Fills every pixel of `row` with `color`.
pub fn fill_row(row: &mut [RGBA8], color: RGBA8) {
  row.fill(color);
}

/// Composites `src` over `dst` in place using the standard straight-alpha
/// source-over formula:
///
/// ```text
/// a_o = a_s + a_d * (1 - a_s)
/// rgb_o = (rgb_s * a_s + rgb_d * a_d * (1 - a_s)) / a_o
/// ```
///
/// `src` and `dst` must be the same length; extra `src` pixels beyond
/// `dst`'s length are ignored.
pub fn composite_over(dst: &mut [RGBA8], src: &[RGBA8]) {
  for (d, s) in dst.iter_mut().zip(src.iter()) {
    *d = composite_pixel(*s, *d);
  }
}

#[inline]
#[must_use]
pub fn composite_pixel(src: RGBA8, dst: RGBA8) -> RGBA8 {
  if src.a == 255 {
    return src;
  }
  if src.a == 0 {
    return dst;
  }
  let a_s = src.a as u32;
  let a_d = dst.a as u32;
  let inv_a_s = 255 - a_s;
  let a_o = a_s + (a_d * inv_a_s) / 255;
  if a_o == 0 {
    return RGBA8 { r: 0, g: 0, b: 0, a: 0 };
  }
  let mix = |s: u8, d: u8| -> u8 {
    let numerator = (s as u32) * a_s + (d as u32) * a_d * inv_a_s / 255;
    (numerator / a_o) as u8
  };
  RGBA8 { r: mix(src.r, dst.r), g: mix(src.g, dst.g), b: mix(src.b, dst.b), a: a_o as u8 }
}

/// Copies a rectangular region of `src_row` (starting at `src_x`, `len`
/// pixels wide) into `dst_row` at `dst_x`, clipping to both rows' bounds.
pub fn blit_row(dst_row: &mut [RGBA8], dst_x: usize, src_row: &[RGBA8], src_x: usize, len: usize) {
  let len = len.min(dst_row.len().saturating_sub(dst_x)).min(src_row.len().saturating_sub(src_x));
  if len == 0 {
    return;
  }
  dst_row[dst_x..dst_x + len].copy_from_slice(&src_row[src_x..src_x + len]);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opaque_source_replaces_destination() {
    let src = RGBA8 { r: 1, g: 2, b: 3, a: 255 };
    let dst = RGBA8 { r: 9, g: 9, b: 9, a: 9 };
    assert_eq!(composite_pixel(src, dst), src);
  }

  #[test]
  fn fully_transparent_source_keeps_destination() {
    let src = RGBA8 { r: 1, g: 2, b: 3, a: 0 };
    let dst = RGBA8 { r: 9, g: 9, b: 9, a: 200 };
    assert_eq!(composite_pixel(src, dst), dst);
  }

  #[test]
  fn half_alpha_over_opaque_black_darkens_toward_source() {
    let src = RGBA8 { r: 255, g: 255, b: 255, a: 128 };
    let dst = RGBA8 { r: 0, g: 0, b: 0, a: 255 };
    let out = composite_pixel(src, dst);
    assert_eq!(out.a, 255);
    assert!(out.r > 100 && out.r < 180, "got {}", out.r);
  }

  #[test]
  fn blit_clips_to_shorter_row() {
    let src = [RGBA8::opaque(1, 1, 1); 4];
    let mut dst = [RGBA8::opaque(0, 0, 0); 3];
    blit_row(&mut dst, 1, &src, 0, 10);
    assert_eq!(dst[0], RGBA8::opaque(0, 0, 0));
    assert_eq!(dst[1], RGBA8::opaque(1, 1, 1));
    assert_eq!(dst[2], RGBA8::opaque(1, 1, 1));
  }
}
