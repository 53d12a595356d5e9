//! From the PNG spec:
//!
//! > Filters are applied to **bytes**, not to pixels, regardless of the bit
//! > depth or color type of the image.
//!
//! This module does the reconstruction one filter-type at a time
//! ([`reconstruct_sub`] etc.), and also offers a row-driven path
//! ([`reconstruct_row`] / [`filter_row_buf`]) that a streaming decoder or
//! encoder can call one scanline at a time without holding the whole image
//! in memory.

/// Reconstruct Filter Type 1
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`:
///   * Bit Depth <8: the byte before this byte
///   * Bit Depth >=8: the corresponding byte from the pixel to the left of this
///     pixel (or skip reconstruction if this is the leftmost pixel)
pub const fn reconstruct_sub(fx: u8, ra: u8) -> u8 {
  fx.wrapping_add(ra)
}

/// Reconstruct Filter Type 2
///
/// * `fx` filtered X
/// * `rb` reconstructed `b`: The byte corresponding to this byte within the
///   previous scanline.
pub const fn reconstruct_up(fx: u8, rb: u8) -> u8 {
  fx.wrapping_add(rb)
}

/// Reconstruct Filter Type 3
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`:
///   * Bit Depth <8: the byte before this byte
///   * Bit Depth >=8: the corresponding byte from the pixel to the left of this
///     pixel (or skip reconstruction if this is the leftmost pixel)
/// * `rb` reconstructed `b`: The byte corresponding to this byte within the
///   previous scanline.
pub const fn reconstruct_average(fx: u8, ra: u8, rb: u8) -> u8 {
  fx.wrapping_add(ra.wrapping_add(rb).wrapping_div(2))
}

/// Reconstruct Filter Type 4
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`:
///   * Bit Depth <8: the byte before this byte
///   * Bit Depth >=8: the corresponding byte from the pixel to the left of this
///     pixel (or skip reconstruction if this is the leftmost pixel)
/// * `rb` reconstructed `b`: The byte corresponding to this byte within the
///   previous scanline.
/// * `rc` reconstructed `c`:
pub const fn reconstruct_paeth(fx: u8, ra: u8, rb: u8, rc: u8) -> u8 {
  fx.wrapping_add(paeth_predictor(ra, rb, rc))
}

/// The Paeth filter function computes a simple linear function of the three
/// neighboring pixels (left `a`, above `b`, upper left `c`).
///
/// The output is the "predictor" of the neighboring pixel closest to the
/// computed value.
///
/// If any neighboring pixel isn't present because this is the top or left edge
/// of the image just substitute 0 in that postition.
const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  // Note(Lokathor): PNG spec says "The calculations within the PaethPredictor
  // function shall be performed exactly, without overflow.", so we use i32 math
  // here, which is wide enough to never give us trouble no matter what the u8
  // input values are.
  let a = a as i32;
  let b = b as i32;
  let c = c as i32;
  let p = a.wrapping_add(b).wrapping_sub(c);
  let pa = p.wrapping_sub(a).wrapping_abs();
  let pb = p.wrapping_sub(b).wrapping_abs();
  let pc = p.wrapping_sub(c).wrapping_abs();
  if pa <= pb && pa <= pc {
    a as u8
  } else if pb <= pc {
    b as u8
  } else {
    c as u8
  }
}

/// Reconstructs one filtered scanline in place.
///
/// `bpp` is the number of bytes per pixel (use `1` for sub-byte pixel
/// formats, same convention PNG itself uses). `prev` is the already
/// reconstructed previous scanline, or `None` for the first row of an
/// image (or of an interlaced pass).
pub fn reconstruct_row(filter_ty: u8, bpp: usize, cur: &mut [u8], prev: Option<&[u8]>) {
  let prev = prev.unwrap_or(&[]);
  match filter_ty {
    0 => (),
    1 => {
      for i in bpp..cur.len() {
        let a = cur[i - bpp];
        cur[i] = reconstruct_sub(cur[i], a);
      }
    }
    2 => {
      for (i, x) in cur.iter_mut().enumerate() {
        let b = prev.get(i).copied().unwrap_or(0);
        *x = reconstruct_up(*x, b);
      }
    }
    3 => {
      for i in 0..cur.len() {
        let a = if i >= bpp { cur[i - bpp] } else { 0 };
        let b = prev.get(i).copied().unwrap_or(0);
        cur[i] = reconstruct_average(cur[i], a, b);
      }
    }
    4 => {
      for i in 0..cur.len() {
        let a = if i >= bpp { cur[i - bpp] } else { 0 };
        let b = prev.get(i).copied().unwrap_or(0);
        let c = if i >= bpp { prev.get(i - bpp).copied().unwrap_or(0) } else { 0 };
        cur[i] = reconstruct_paeth(cur[i], a, b, c);
      }
    }
    _ => (),
  }
}

/// Filters one raw scanline, choosing among the five filter types by
/// minimum sum-of-absolute-deviations. Returns the chosen filter type and
/// fills `out` (which must be the same length as `cur`) with the filtered
/// bytes.
pub fn filter_row_buf(bpp: usize, cur: &[u8], prev: Option<&[u8]>, out: &mut [u8]) -> u8 {
  let prev = prev.unwrap_or(&[]);
  debug_assert_eq!(out.len(), cur.len());

  let sub = |i: usize| -> u8 {
    let a = if i >= bpp { cur[i - bpp] } else { 0 };
    cur[i].wrapping_sub(a)
  };
  let up = |i: usize| -> u8 {
    let b = prev.get(i).copied().unwrap_or(0);
    cur[i].wrapping_sub(b)
  };
  let average = |i: usize| -> u8 {
    let a = if i >= bpp { cur[i - bpp] } else { 0 };
    let b = prev.get(i).copied().unwrap_or(0);
    cur[i].wrapping_sub(((a as u32 + b as u32) / 2) as u8)
  };
  let paeth = |i: usize| -> u8 {
    let a = if i >= bpp { cur[i - bpp] } else { 0 };
    let b = prev.get(i).copied().unwrap_or(0);
    let c = if i >= bpp { prev.get(i - bpp).copied().unwrap_or(0) } else { 0 };
    cur[i].wrapping_sub(paeth_predictor(a, b, c))
  };
  let mut best_ty = 0_u8;
  let mut best_sum = u64::MAX;
  let funcs: [(u8, &dyn Fn(usize) -> u8); 5] =
    [(0, &|i: usize| cur[i]), (1, &sub), (2, &up), (3, &average), (4, &paeth)];
  for (ty, f) in funcs {
    let mut sum = 0_u64;
    for i in 0..cur.len() {
      let v = f(i);
      sum += (v as i8).unsigned_abs() as u64;
    }
    if sum < best_sum {
      best_sum = sum;
      best_ty = ty;
    }
  }
  for (i, o) in out.iter_mut().enumerate() {
    *o = match best_ty {
      0 => cur[i],
      1 => sub(i),
      2 => up(i),
      3 => average(i),
      4 => paeth(i),
      _ => unreachable!(),
    };
  }
  best_ty
}
