//! The streaming concatenator: the row-driven engine that turns a
//! [`crate::layout::LayoutPlan`] plus a set of source images into one output
//! PNG (or, via [`crate::jpeg_sink`], JPEG).
//!
//! Output is produced one scanline at a time. For each output row, only the
//! decoders whose placement currently overlaps that row are open; a
//! decoder's working set is released (by simply dropping it) the instant its
//! last row has been consumed, so memory use stays bounded regardless of how
//! many total source images are being composed.

use alloc::{boxed::Box, vec::Vec};

use crate::{
  chunk::ChunkWriter,
  color::BackgroundColor,
  decoder::{open_registered_decoder, PngDecoder},
  deflate::Compressor,
  error::{ConcatError, ConcatResult},
  filtering::filter_row_buf,
  layout::{LayoutPlan, PlacedRect},
  pixel_formats::RGBA8,
  pixel_ops::{blit_row, composite_over, fill_row},
};

#[cfg(feature = "jpeg_output")]
use crate::jpeg_sink::{JpegConcatError, JpegSink};

/// A source of RGBA8 rows for one placed image, in top-to-bottom order.
///
/// Two implementations exist: [`StreamingRowSource`] pulls rows one at a
/// time straight from a [`PngDecoder`] (non-interlaced PNGs only, since
/// Adam7 passes don't arrive in raster order). [`BufferedRowSource`] decodes
/// the whole image up front and indexes into it; used for interlaced PNGs
/// and stands in for whatever a JPEG/HEIC plug-in eventually provides,
/// since both can only ever decode-then-slice.
trait RowSource {
  fn next_row(&mut self) -> ConcatResult<&[RGBA8]>;
}

struct StreamingRowSource<'b> {
  decoder: PngDecoder<'b>,
  row_buf: Vec<RGBA8>,
}
impl<'b> RowSource for StreamingRowSource<'b> {
  fn next_row(&mut self) -> ConcatResult<&[RGBA8]> {
    let produced = self.decoder.next_rows(&mut self.row_buf)?;
    if produced == 0 {
      return Err(ConcatError::Adam7Truncated);
    }
    Ok(&self.row_buf)
  }
}

struct BufferedRowSource {
  width: u32,
  pixels: Vec<RGBA8>,
  next_row: u32,
}
impl RowSource for BufferedRowSource {
  fn next_row(&mut self) -> ConcatResult<&[RGBA8]> {
    let w = self.width as usize;
    let start = self.next_row as usize * w;
    let end = start + w;
    if end > self.pixels.len() {
      return Err(ConcatError::Adam7Truncated);
    }
    self.next_row += 1;
    Ok(&self.pixels[start..end])
  }
}

/// Fully decodes a PNG into an RGBA8 buffer. This is the only option for
/// interlaced source images, since Adam7 passes must all be gathered before
/// the first full top-to-bottom row is known.
fn decode_full(bytes: &[u8]) -> ConcatResult<(u32, u32, Vec<RGBA8>)> {
  let mut decoder = open_registered_decoder(bytes)?;
  let (width, height, _) = decoder.header();
  let mut pixels = alloc::vec![RGBA8::default(); width as usize * height as usize];
  let mut row_buf = alloc::vec![RGBA8::default(); width as usize];
  loop {
    let produced = decoder.next_rows(&mut row_buf)?;
    if produced == 0 {
      break;
    }
    let (pass, row_in_pass) = decoder.last_row_location();
    let header = decoder.header_info();
    if header.is_interlaced {
      let dims = crate::adam7::reduced_image_dimensions(width, height);
      let (pass_w, _) = dims[pass];
      for rx in 0..pass_w {
        let (fx, fy) = crate::adam7::interlaced_pos_to_full_pos(pass, rx, row_in_pass);
        pixels[(fy * width + fx) as usize] = row_buf[rx as usize];
      }
    } else {
      let start = row_in_pass as usize * width as usize;
      pixels[start..start + width as usize].copy_from_slice(&row_buf[..width as usize]);
    }
  }
  Ok((width, height, pixels))
}

fn open_source<'b>(bytes: &'b [u8], rect: &PlacedRect) -> ConcatResult<Box<dyn RowSource + 'b>> {
  let peek = open_registered_decoder(bytes)?;
  if peek.header_info().is_interlaced {
    let (width, _height, pixels) = decode_full(bytes)?;
    Ok(Box::new(BufferedRowSource { width, pixels, next_row: 0 }))
  } else {
    let row_buf = alloc::vec![RGBA8::default(); rect.width as usize];
    Ok(Box::new(StreamingRowSource { decoder: peek, row_buf }))
  }
}

/// Drives the per-row activation/compositing/completion bookkeeping shared
/// by the PNG and JPEG output engines: opens each placement's decoder the
/// first row it's needed, composites every active placement's row into the
/// output buffer, and reports completions through `on_progress` as soon as
/// a placement's last row has been consumed (not one row later, and not
/// once per output row).
struct RowCompositor<'src, 'p> {
  plan: &'p LayoutPlan,
  background: RGBA8,
  alpha_blend: bool,
  active: Vec<Option<(PlacedRect, Box<dyn RowSource + 'src>)>>,
  completed: usize,
}
impl<'src, 'p> RowCompositor<'src, 'p> {
  fn new(plan: &'p LayoutPlan, background: RGBA8, alpha_blend: bool) -> Self {
    Self {
      plan,
      background,
      alpha_blend,
      active: (0..plan.placements.len()).map(|_| None).collect(),
      completed: 0,
    }
  }

  fn advance_row(
    &mut self, y: u32, sources: &[&'src [u8]], out_row: &mut [RGBA8],
    mut on_progress: impl FnMut(usize, usize),
  ) -> ConcatResult<()> {
    fill_row(out_row, self.background);
    let total = self.plan.placements.len();

    for (slot, placement) in self.active.iter_mut().zip(self.plan.placements.iter()) {
      let in_range = y >= placement.y && y < placement.y + placement.height;
      if in_range && slot.is_none() {
        let bytes = *sources.get(placement.input_index).ok_or(ConcatError::EmptyInputs)?;
        let source = open_source(bytes, placement)?;
        *slot = Some((*placement, source));
      }
      if !in_range && slot.take().is_some() {
        self.completed += 1;
        on_progress(self.completed, total);
      }
    }

    for slot in self.active.iter_mut() {
      if let Some((placement, source)) = slot {
        let row = source.next_row()?;
        let len = row.len().min(placement.width as usize);
        let x0 = placement.x as usize;
        if self.alpha_blend {
          composite_over(&mut out_row[x0..x0 + len], &row[..len]);
        } else {
          blit_row(out_row, x0, row, 0, len);
        }
      }
    }
    Ok(())
  }

  /// Reports completion for any placement still active after the last
  /// output row — a placement whose bottom edge lands exactly on the
  /// canvas's bottom edge never hits the "no longer in range" branch in
  /// [`Self::advance_row`], since there's no row past the canvas to trigger
  /// it.
  fn finish(&mut self, mut on_progress: impl FnMut(usize, usize)) {
    let total = self.plan.placements.len();
    for slot in self.active.iter_mut() {
      if slot.take().is_some() {
        self.completed += 1;
        on_progress(self.completed, total);
      }
    }
  }
}

/// Composes `sources` (indexed the same way as `plan.placements`'
/// `input_index`) into a single PNG byte stream, emitting output through
/// `emit` one compressed chunk at a time.
///
/// `alpha_blend` selects source-over alpha compositing where placements
/// overlap, versus a straight copy (last placement drawn wins, no blending)
/// when it's off. `idat_batch_bytes` controls how large each emitted `IDAT`
/// chunk is allowed to grow before being flushed (64 KiB is a reasonable
/// default, matching common PNG encoders). `on_progress` is called once per
/// source image, as soon as its last row has been consumed.
pub fn concat_streaming_push<'src, E>(
  sources: &[&'src [u8]], plan: &LayoutPlan, background: BackgroundColor, alpha_blend: bool,
  idat_batch_bytes: usize, mut emit: E, mut on_progress: impl FnMut(usize, usize),
) -> ConcatResult<()>
where
  E: FnMut(&[u8]) -> ConcatResult<()>,
{
  if plan.placements.is_empty() {
    return Err(ConcatError::EmptyInputs);
  }
  let bg = background.resolve();
  let width = plan.canvas_width;
  let height = plan.canvas_height;

  let mut writer = ChunkWriter::new();
  writer.write_signature();
  writer.write_ihdr(width, height, 8, 6, 0);
  emit(&writer.out)?;
  writer.out.clear();

  let mut compressor = Compressor::new(6);
  let mut compositor = RowCompositor::new(plan, bg, alpha_blend);

  let mut out_row = alloc::vec![RGBA8::default(); width as usize];
  let mut prev_filtered: Option<Vec<u8>> = None;
  let mut pending_idat = Vec::new();

  for y in 0..height {
    compositor.advance_row(y, sources, &mut out_row, &mut on_progress)?;

    let mut raw_bytes = alloc::vec![0_u8; out_row.len() * 4];
    for (px, chunk) in out_row.iter().zip(raw_bytes.chunks_exact_mut(4)) {
      chunk.copy_from_slice(&[px.r, px.g, px.b, px.a]);
    }

    let mut filtered = alloc::vec![0_u8; raw_bytes.len()];
    let filter_ty = filter_row_buf(4, &raw_bytes, prev_filtered.as_deref(), &mut filtered);

    let mut line = alloc::vec![filter_ty];
    line.extend_from_slice(&filtered);
    pending_idat.extend(compressor.push(&line)?);
    prev_filtered = Some(raw_bytes);

    if pending_idat.len() >= idat_batch_bytes {
      writer.write_idat(&pending_idat);
      emit(&writer.out)?;
      writer.out.clear();
      pending_idat.clear();
    }
  }
  compositor.finish(&mut on_progress);

  pending_idat.extend(compressor.finish()?);
  if !pending_idat.is_empty() {
    writer.write_idat(&pending_idat);
    emit(&writer.out)?;
    writer.out.clear();
  }
  writer.write_iend();
  emit(&writer.out)?;

  Ok(())
}

/// Buffer-collector convenience wrapper over [`concat_streaming_push`]:
/// returns the whole output PNG as a single `Vec<u8>`.
pub fn concat_to_vec<'src>(
  sources: &[&'src [u8]], plan: &LayoutPlan, background: BackgroundColor, alpha_blend: bool,
  mut on_progress: impl FnMut(usize, usize),
) -> ConcatResult<Vec<u8>> {
  let mut out = Vec::new();
  concat_streaming_push(
    sources,
    plan,
    background,
    alpha_blend,
    64 * 1024,
    |bytes| {
      out.extend_from_slice(bytes);
      Ok(())
    },
    &mut on_progress,
  )?;
  Ok(out)
}

/// Composes `sources` into JPEG, handing `sink` 8-row strips of fully
/// composited RGBA8 pixels as they're produced. JPEG has no alpha channel,
/// so the background is pre-composited into every pixel and the alpha
/// channel is simply dropped before handing rows to `sink`, rather than
/// carried through like the PNG path does.
#[cfg(feature = "jpeg_output")]
pub fn concat_jpeg_rows<'src, S: JpegSink>(
  sources: &[&'src [u8]], plan: &LayoutPlan, background: BackgroundColor, alpha_blend: bool,
  mut sink: S, mut on_progress: impl FnMut(usize, usize),
) -> Result<(), JpegConcatError<S::Error>> {
  if plan.placements.is_empty() {
    return Err(JpegConcatError::Concat(ConcatError::EmptyInputs));
  }
  const STRIP_ROWS: usize = 8;

  let bg = background.resolve();
  let width = plan.canvas_width;
  let height = plan.canvas_height;
  sink.begin(width, height).map_err(JpegConcatError::Sink)?;

  let mut compositor = RowCompositor::new(plan, bg, alpha_blend);
  let mut out_row = alloc::vec![RGBA8::default(); width as usize];
  let mut strip: Vec<RGBA8> = Vec::with_capacity(width as usize * STRIP_ROWS);

  for y in 0..height {
    compositor
      .advance_row(y, sources, &mut out_row, &mut on_progress)
      .map_err(JpegConcatError::Concat)?;
    strip.extend_from_slice(&out_row);
    if strip.len() >= width as usize * STRIP_ROWS {
      sink.write_rows(&strip).map_err(JpegConcatError::Sink)?;
      strip.clear();
    }
  }
  if !strip.is_empty() {
    sink.write_rows(&strip).map_err(JpegConcatError::Sink)?;
  }
  compositor.finish(&mut on_progress);

  sink.finish().map_err(JpegConcatError::Sink)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::{plan_grid, plan_positioned, GridStrategy, InputDims, PositionedInput};

  fn tiny_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut w = ChunkWriter::new();
    w.write_signature();
    w.write_ihdr(width, height, 8, 6, 0);
    let mut compressor = Compressor::new(6);
    let mut idat = Vec::new();
    for _ in 0..height {
      let mut line = alloc::vec![0_u8];
      for _ in 0..width {
        line.extend_from_slice(&rgba);
      }
      idat.extend(compressor.push(&line).unwrap());
    }
    idat.extend(compressor.finish().unwrap());
    w.write_idat(&idat);
    w.write_iend();
    w.out
  }

  #[test]
  fn composes_two_tiny_pngs_side_by_side() {
    let a = tiny_png(2, 2, [255, 0, 0, 255]);
    let b = tiny_png(2, 2, [0, 255, 0, 255]);
    let dims = [InputDims { width: 2, height: 2 }, InputDims { width: 2, height: 2 }];
    let plan = plan_grid(&dims, GridStrategy::FixedColumns(2)).unwrap();
    let sources: [&[u8]; 2] = [&a, &b];
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    assert!(crate::bits::has_png_signature(&out));

    // round-trip through our own decoder to check pixel placement
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (4, 2));
    assert_eq!(pixels[0], RGBA8::opaque(255, 0, 0));
    assert_eq!(pixels[2], RGBA8::opaque(0, 255, 0));
  }

  // Scenario 1: a four-color 2x2 grid of solid tiles lands each tile in its
  // own quadrant with no blending between them.
  #[test]
  fn scenario_four_color_grid() {
    let tiles = [
      tiny_png(100, 100, [255, 0, 0, 255]),
      tiny_png(100, 100, [0, 255, 0, 255]),
      tiny_png(100, 100, [0, 0, 255, 255]),
      tiny_png(100, 100, [255, 255, 0, 255]),
    ];
    let dims = [InputDims { width: 100, height: 100 }; 4];
    let plan = plan_grid(&dims, GridStrategy::FixedColumns(2)).unwrap();
    let sources: Vec<&[u8]> = tiles.iter().map(|v| v.as_slice()).collect();
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (200, 200));
    assert_eq!(pixels[0], RGBA8::opaque(255, 0, 0)); // (0,0)
    assert_eq!(pixels[100], RGBA8::opaque(0, 255, 0)); // (100,0)
    assert_eq!(pixels[200 * 100], RGBA8::opaque(0, 0, 255)); // (0,100)
    assert_eq!(pixels[200 * 100 + 100], RGBA8::opaque(255, 255, 0)); // (100,100)
  }

  // Scenario 2: two tiles with `rows:2` stack vertically instead of side by
  // side.
  #[test]
  fn scenario_fixed_rows_stacks_vertically() {
    let top = tiny_png(10, 10, [255, 0, 0, 255]);
    let bottom = tiny_png(10, 10, [0, 255, 0, 255]);
    let dims = [InputDims { width: 10, height: 10 }; 2];
    let plan = plan_grid(&dims, GridStrategy::FixedRows(2)).unwrap();
    let sources: [&[u8]; 2] = [&top, &bottom];
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (10, 20));
    assert_eq!(pixels[0], RGBA8::opaque(255, 0, 0));
    assert_eq!(pixels[10 * 15], RGBA8::opaque(0, 255, 0));
  }

  // Scenario 3: three 30-wide tiles with a pixel budget of 70 wrap after the
  // second one (30+30=60 fits, +30 more would be 90).
  #[test]
  fn scenario_pixel_budget_wraps() {
    let tiles =
      [tiny_png(30, 10, [255, 0, 0, 255]), tiny_png(30, 10, [0, 255, 0, 255]), tiny_png(30, 10, [0, 0, 255, 255])];
    let dims = [InputDims { width: 30, height: 10 }; 3];
    let plan = plan_grid(&dims, GridStrategy::PixelBudget(70)).unwrap();
    assert_eq!((plan.canvas_width, plan.canvas_height), (60, 20));
    let sources: Vec<&[u8]> = tiles.iter().map(|v| v.as_slice()).collect();
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (60, 20));
    assert_eq!(pixels[0], RGBA8::opaque(255, 0, 0));
    assert_eq!(pixels[30], RGBA8::opaque(0, 255, 0));
    assert_eq!(pixels[60 * 15], RGBA8::opaque(0, 0, 255));
  }

  // Scenario 4: two positioned, semi-transparent tiles blended with
  // alpha_blend on. The later-drawn (equal z, higher input index) tile
  // composites as `src`, so its color dominates the overlap.
  #[test]
  fn scenario_positioned_alpha_blend_composite() {
    let under = tiny_png(100, 100, [0, 0, 255, 128]);
    let over = tiny_png(100, 100, [255, 0, 0, 128]);
    let dims = [InputDims { width: 100, height: 100 }; 2];
    let positions =
      [PositionedInput { x: 0, y: 0, z: 0 }, PositionedInput { x: 50, y: 50, z: 0 }];
    let plan = plan_positioned(&dims, &positions).unwrap();
    let sources: [&[u8]; 2] = [&under, &over];
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (150, 150));
    let overlap = pixels[(75 * 150 + 75) as usize];
    assert!((165..=175).contains(&overlap.r), "r={}", overlap.r);
    assert_eq!(overlap.g, 0);
    assert!((80..=90).contains(&overlap.b), "b={}", overlap.b);
    assert!((188..=195).contains(&overlap.a), "a={}", overlap.a);
  }

  // Scenario 4b: the same layout with alpha_blend off degrades to a plain
  // overwrite — the later tile replaces the earlier one outright.
  #[test]
  fn scenario_positioned_blend_off_is_a_plain_overwrite() {
    let under = tiny_png(100, 100, [0, 0, 255, 128]);
    let over = tiny_png(100, 100, [255, 0, 0, 128]);
    let dims = [InputDims { width: 100, height: 100 }; 2];
    let positions =
      [PositionedInput { x: 0, y: 0, z: 0 }, PositionedInput { x: 50, y: 50, z: 0 }];
    let plan = plan_positioned(&dims, &positions).unwrap();
    let sources: [&[u8]; 2] = [&under, &over];
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, false, |_, _| {}).unwrap();
    let (_, _, pixels) = decode_full(&out).unwrap();
    let overlap = pixels[(75 * 150 + 75) as usize];
    assert_eq!(overlap, RGBA8 { r: 255, g: 0, b: 0, a: 128 });
  }

  // Scenario 5: a 5x5 tile next to a 20x20 tile (columns:2) leaves the area
  // below the small tile, within its own cell (the row height follows the
  // tallest cell), transparent.
  #[test]
  fn scenario_small_tile_leaves_transparent_padding() {
    let small = tiny_png(5, 5, [255, 0, 0, 255]);
    let big = tiny_png(20, 20, [0, 255, 0, 255]);
    let dims = [InputDims { width: 5, height: 5 }, InputDims { width: 20, height: 20 }];
    let plan = plan_grid(&dims, GridStrategy::FixedColumns(2)).unwrap();
    let sources: [&[u8]; 2] = [&small, &big];
    let out = concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |_, _| {}).unwrap();
    let (w, h, pixels) = decode_full(&out).unwrap();
    assert_eq!((w, h), (25, 20));
    assert_eq!(pixels[0], RGBA8::opaque(255, 0, 0));
    assert_eq!(pixels[10 * 25], RGBA8 { r: 0, g: 0, b: 0, a: 0 });
  }

  #[test]
  fn progress_fires_once_per_completed_image_in_completion_order() {
    let a = tiny_png(10, 10, [255, 0, 0, 255]);
    let b = tiny_png(10, 10, [0, 255, 0, 255]);
    let dims = [InputDims { width: 10, height: 10 }; 2];
    let plan = plan_grid(&dims, GridStrategy::FixedColumns(2)).unwrap();
    let sources: [&[u8]; 2] = [&a, &b];
    let mut calls = Vec::new();
    concat_to_vec(&sources, &plan, BackgroundColor::Transparent, true, |done, total| {
      calls.push((done, total));
    })
    .unwrap();
    assert_eq!(calls, alloc::vec![(1, 2), (2, 2)]);
  }
}
