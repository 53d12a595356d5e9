//! Arranges source images into either a grid or an explicitly positioned
//! canvas.

use alloc::vec::Vec;

use crate::error::{ConcatError, ConcatResult};

/// One source image's size, as reported by its decoder's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDims {
  pub width: u32,
  pub height: u32,
}

/// How a grid's cells should be sized and wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStrategy {
  FixedColumns(u32),
  FixedRows(u32),
  /// Wrap to a new row once accumulated row width would exceed this many
  /// pixels.
  PixelBudget(u32),
  /// Lay every input out in a single row.
  SingleRow,
}

/// A planned rectangle for one input image within the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedRect {
  pub input_index: usize,
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
  pub z: i32,
}

/// An explicit rectangle request for positioned-mode layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionedInput {
  pub x: u32,
  pub y: u32,
  pub z: i32,
}

/// A resolved layout: canvas size plus every input's placement, already
/// sorted back-to-front by z-order (lowest z first) so [`crate::concat`]
/// can paint them in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
  pub canvas_width: u32,
  pub canvas_height: u32,
  pub placements: Vec<PlacedRect>,
  /// Count of inputs the plan had to drop (pixel-budget mode only, when a
  /// single input is wider than the budget). See `SPEC_FULL.md` §8.
  pub dropped: usize,
}

/// Builds a grid layout. Rows/columns are sized to the max width/height of
/// the cells they contain (no single global cell size), matching
/// `SPEC_FULL.md`'s variable per-row/per-column sizing requirement.
pub fn plan_grid(inputs: &[InputDims], strategy: GridStrategy) -> ConcatResult<LayoutPlan> {
  if inputs.is_empty() {
    return Err(ConcatError::EmptyInputs);
  }

  let mut rows: Vec<Vec<usize>> = Vec::new();
  let mut dropped = 0;
  match strategy {
    GridStrategy::FixedColumns(cols) => {
      if cols == 0 {
        return Err(ConcatError::InvalidLayout);
      }
      for chunk in inputs.iter().enumerate().collect::<Vec<_>>().chunks(cols as usize) {
        rows.push(chunk.iter().map(|(i, _)| *i).collect());
      }
    }
    GridStrategy::FixedRows(row_count) => {
      if row_count == 0 {
        return Err(ConcatError::InvalidLayout);
      }
      let per_row = (inputs.len() as u32).div_ceil(row_count).max(1) as usize;
      for chunk in inputs.iter().enumerate().collect::<Vec<_>>().chunks(per_row) {
        rows.push(chunk.iter().map(|(i, _)| *i).collect());
      }
    }
    GridStrategy::PixelBudget(budget) => {
      if budget == 0 {
        return Err(ConcatError::InvalidLayout);
      }
      let mut current = Vec::new();
      let mut current_width = 0_u32;
      for (i, dims) in inputs.iter().enumerate() {
        if dims.width > budget {
          // a single input can never fit; drop it rather than stall forever
          crate::trace!("dropping oversized input {i} from pixel-budget layout");
          dropped += 1;
          continue;
        }
        if current_width + dims.width > budget && !current.is_empty() {
          rows.push(core::mem::take(&mut current));
          current_width = 0;
        }
        current.push(i);
        current_width += dims.width;
      }
      if !current.is_empty() {
        rows.push(current);
      }
    }
    GridStrategy::SingleRow => rows.push((0..inputs.len()).collect()),
  }

  let mut placements = Vec::new();
  let mut y = 0_u32;
  let mut canvas_width = 0_u32;
  for row in &rows {
    let mut x = 0_u32;
    let mut row_height = 0_u32;
    for &i in row {
      let dims = inputs[i];
      placements.push(PlacedRect {
        input_index: i,
        x,
        y,
        width: dims.width,
        height: dims.height,
        z: 0,
      });
      x += dims.width;
      row_height = row_height.max(dims.height);
    }
    canvas_width = canvas_width.max(x);
    y += row_height;
  }

  if canvas_width == 0 || y == 0 {
    return Err(ConcatError::EmptyInputs);
  }

  Ok(LayoutPlan { canvas_width, canvas_height: y, placements, dropped })
}

/// Builds a positioned layout: every input supplies its own rectangle and
/// z-order; the canvas is sized to the union of all rectangles.
pub fn plan_positioned(
  inputs: &[InputDims], positions: &[PositionedInput],
) -> ConcatResult<LayoutPlan> {
  if inputs.is_empty() {
    return Err(ConcatError::EmptyInputs);
  }
  if inputs.len() != positions.len() {
    return Err(ConcatError::InvalidLayout);
  }
  let mut placements: Vec<PlacedRect> = inputs
    .iter()
    .zip(positions.iter())
    .enumerate()
    .map(|(i, (dims, pos))| PlacedRect {
      input_index: i,
      x: pos.x,
      y: pos.y,
      width: dims.width,
      height: dims.height,
      z: pos.z,
    })
    .collect();
  placements.sort_by_key(|p| p.z);

  let canvas_width = placements.iter().map(|p| p.x + p.width).max().unwrap_or(0);
  let canvas_height = placements.iter().map(|p| p.y + p.height).max().unwrap_or(0);
  if canvas_width == 0 || canvas_height == 0 {
    return Err(ConcatError::InvalidLayout);
  }

  Ok(LayoutPlan { canvas_width, canvas_height, placements, dropped: 0 })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dims(pairs: &[(u32, u32)]) -> Vec<InputDims> {
    pairs.iter().map(|&(width, height)| InputDims { width, height }).collect()
  }

  #[test]
  fn fixed_columns_wraps_every_n() {
    let plan = plan_grid(&dims(&[(10, 10); 5]), GridStrategy::FixedColumns(2)).unwrap();
    assert_eq!(plan.canvas_width, 20);
    assert_eq!(plan.canvas_height, 30);
    assert_eq!(plan.placements.len(), 5);
  }

  #[test]
  fn row_height_follows_the_tallest_cell_in_the_row() {
    let plan =
      plan_grid(&dims(&[(10, 5), (10, 40)]), GridStrategy::FixedColumns(2)).unwrap();
    assert_eq!(plan.canvas_height, 40);
  }

  #[test]
  fn pixel_budget_drops_oversized_inputs_and_reports_it() {
    let plan =
      plan_grid(&dims(&[(5, 5), (100, 5), (5, 5)]), GridStrategy::PixelBudget(10)).unwrap();
    assert_eq!(plan.dropped, 1);
    assert_eq!(plan.placements.len(), 2);
  }

  #[test]
  fn zero_columns_is_an_invalid_layout() {
    assert_eq!(
      plan_grid(&dims(&[(1, 1)]), GridStrategy::FixedColumns(0)).unwrap_err(),
      ConcatError::InvalidLayout
    );
  }

  #[test]
  fn positioned_mode_sizes_canvas_to_the_union_and_sorts_by_z() {
    let inputs = dims(&[(10, 10), (10, 10)]);
    let positions =
      [PositionedInput { x: 0, y: 0, z: 5 }, PositionedInput { x: 5, y: 5, z: 1 }];
    let plan = plan_positioned(&inputs, &positions).unwrap();
    assert_eq!(plan.canvas_width, 15);
    assert_eq!(plan.canvas_height, 15);
    assert_eq!(plan.placements[0].z, 1);
    assert_eq!(plan.placements[1].z, 5);
  }
}
