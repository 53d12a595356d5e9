//! Adam7 interlacing geometry.
//!
//! PS: Interlacing is terrible, don't interlace your images.

/// Computes the width/height of the base image (index 0) and each of the
/// seven Adam7 reduced images (indexes 1 through 7) for a full image of the
/// given size.
#[inline]
#[must_use]
pub const fn reduced_image_dimensions(full_width: u32, full_height: u32) -> [(u32, u32); 8] {
  // ```
  // 1 6 4 6 2 6 4 6
  // 7 7 7 7 7 7 7 7
  // 5 6 5 6 5 6 5 6
  // 7 7 7 7 7 7 7 7
  // 3 6 4 6 3 6 4 6
  // 7 7 7 7 7 7 7 7
  // 5 6 5 6 5 6 5 6
  // 7 7 7 7 7 7 7 7
  // ```
  let full_patterns_wide = full_width / 8;
  let full_patterns_high = full_height / 8;
  //
  let partial_pattern_width = full_width % 8;
  let partial_pattern_height = full_height % 8;
  //
  let zero = (full_width, full_height);
  //
  let first = (
    full_patterns_wide + (partial_pattern_width + 7) / 8,
    full_patterns_high + (partial_pattern_height + 7) / 8,
  );
  let second = (
    full_patterns_wide + (partial_pattern_width + 3) / 8,
    full_patterns_high + (partial_pattern_height + 7) / 8,
  );
  let third = (
    full_patterns_wide * 2 + ((partial_pattern_width + 3) / 4),
    full_patterns_high + ((partial_pattern_height + 3) / 8),
  );
  let fourth = (
    full_patterns_wide * 2 + (partial_pattern_width + 1) / 4,
    full_patterns_high * 2 + (partial_pattern_height + 3) / 4,
  );
  let fifth = (
    full_patterns_wide * 4 + ((partial_pattern_width + 1) / 2),
    full_patterns_high * 2 + (partial_pattern_height + 1) / 4,
  );
  let sixth = (
    full_patterns_wide * 4 + partial_pattern_width / 2,
    full_patterns_high * 4 + ((partial_pattern_height + 1) / 2),
  );
  let seventh = (
    full_patterns_wide * 8 + partial_pattern_width,
    full_patterns_high * 4 + (partial_pattern_height / 2),
  );
  //
  [zero, first, second, third, fourth, fifth, sixth, seventh]
}

/// Converts a reduced image location into the full image location.
///
/// For consistency with [`reduced_image_dimensions`], an `image_level` of 0
/// just echoes the input back.
///
/// ## Panics
/// If `image_level` exceeds 7.
#[inline]
#[must_use]
pub const fn interlaced_pos_to_full_pos(
  image_level: usize, reduced_x: u32, reduced_y: u32,
) -> (u32, u32) {
  // ```
  // 1 6 4 6 2 6 4 6
  // 7 7 7 7 7 7 7 7
  // 5 6 5 6 5 6 5 6
  // 7 7 7 7 7 7 7 7
  // 3 6 4 6 3 6 4 6
  // 7 7 7 7 7 7 7 7
  // 5 6 5 6 5 6 5 6
  // 7 7 7 7 7 7 7 7
  // ```
  #[allow(clippy::identity_op)]
  match image_level {
    0 /* full image */ => (reduced_x, reduced_y),
    1 => (reduced_x * 8, reduced_y * 8),
    2 => (reduced_x * 8 + 4, reduced_y * 8),
    3 => (reduced_x * 4, reduced_y * 8 + 4),
    4 => (reduced_x * 4 + 2, reduced_y * 4),
    5 => (reduced_x * 2, reduced_y * 4 + 2),
    6 => (reduced_x * 2 + 1, reduced_y * 2),
    7 => (reduced_x, reduced_y * 2 + 1),
    _ => panic!("reduced image level must be 1 through 7"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_case_is_full_image() {
    assert_eq!(reduced_image_dimensions(0, 0), [(0, 0); 8]);
    assert_eq!(
      reduced_image_dimensions(8, 8),
      [(8, 8), (1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
    );
  }

  #[test]
  fn pass_one_is_one_pixel_per_pattern() {
    for w in 1..=8 {
      assert_eq!(reduced_image_dimensions(w, 0)[1].0, 1, "failed w:{w}");
    }
  }

  #[test]
  fn level_zero_round_trips() {
    assert_eq!(interlaced_pos_to_full_pos(0, 5, 9), (5, 9));
  }

  #[test]
  fn every_base_pixel_is_covered_by_exactly_one_pass() {
    let (w, h) = (16, 16);
    let dims = reduced_image_dimensions(w, h);
    let mut covered = alloc::vec![false; (w * h) as usize];
    for level in 1..=7 {
      let (rw, rh) = dims[level];
      for ry in 0..rh {
        for rx in 0..rw {
          let (x, y) = interlaced_pos_to_full_pos(level, rx, ry);
          let idx = (y * w + x) as usize;
          assert!(!covered[idx], "pixel ({x},{y}) covered twice");
          covered[idx] = true;
        }
      }
    }
    assert!(covered.iter().all(|&c| c), "every pixel must be covered");
  }
}
