//! Thin, high-level entry points over [`crate::concat`].

use alloc::vec::Vec;

use crate::{
  color::BackgroundColor,
  concat::{concat_streaming_push, concat_to_vec},
  decoder::open_registered_decoder,
  error::{ConcatError, ConcatResult},
  layout::{plan_grid, plan_positioned, GridStrategy, InputDims, LayoutPlan, PositionedInput},
};

#[cfg(feature = "jpeg_output")]
use crate::jpeg_sink::{JpegConcatError, JpegSink};

/// Grid or positioned layout request, mirroring [`crate::layout`]'s two
/// planning strategies. Mixing the two (e.g. supplying both `strategy` and
/// `positions`) is rejected with [`crate::error::ConcatError::MixedLayoutModes`].
#[derive(Debug, Clone)]
pub enum LayoutRequest {
  Grid(GridStrategy),
  Positioned(Vec<PositionedInput>),
}

/// How a streaming composition should weigh speed/memory against one
/// another. `pngrid`'s row-driven engine is already bounded-memory on every
/// path, so unlike a dual-path encoder this doesn't pick between two
/// different algorithms — it's accepted and traced for compatibility with
/// callers migrating from one, but doesn't change output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizeMode {
  #[default]
  Auto,
  Memory,
  Speed,
}

/// Output container format for a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
  Png,
  /// `quality` is JPEG's usual 0-100 knob; see [`crate::jpeg_sink::JpegSink`]
  /// for how it reaches the actual encoder.
  Jpeg { quality: u8 },
}
impl Default for OutputFormat {
  fn default() -> Self {
    Self::Png
  }
}

/// Configuration for one call to [`concat`]/[`concat_streaming`]/
/// [`concat_to_stream`].
#[derive(Debug, Clone)]
pub struct ConcatRequest {
  pub layout: LayoutRequest,
  pub background: BackgroundColor,
  /// How large each emitted `IDAT` chunk is allowed to grow before being
  /// flushed, when streaming. Ignored by the buffer-collector [`concat`]
  /// and by JPEG output.
  pub idat_batch_bytes: usize,
  /// Whether overlapping placements are alpha-blended (`composite_over`) or
  /// just overwritten (last-drawn wins, no blending at all). `None` picks
  /// the default for the layout mode: on for positioned layouts (where
  /// overlap is the point), off for grid layouts (whose cells never
  /// overlap, so blending would only needlessly darken anti-aliased edges
  /// against a transparent background).
  pub enable_alpha_blending: Option<bool>,
  pub output_format: OutputFormat,
  pub optimize: OptimizeMode,
  /// A soft cap, in mebibytes, advisory only: `pngrid`'s engine already
  /// bounds its own working set to a handful of open decoders regardless of
  /// this value.
  pub max_memory_mb: u32,
}
impl Default for ConcatRequest {
  fn default() -> Self {
    Self {
      layout: LayoutRequest::Grid(GridStrategy::SingleRow),
      background: BackgroundColor::Transparent,
      idat_batch_bytes: 64 * 1024,
      enable_alpha_blending: None,
      output_format: OutputFormat::Png,
      optimize: OptimizeMode::Auto,
      max_memory_mb: 256,
    }
  }
}
impl ConcatRequest {
  fn resolved_alpha_blending(&self) -> bool {
    self.enable_alpha_blending.unwrap_or(match &self.layout {
      LayoutRequest::Positioned(_) => true,
      LayoutRequest::Grid(_) => false,
    })
  }
}

fn plan_for(dims: &[InputDims], request: &ConcatRequest) -> ConcatResult<LayoutPlan> {
  match &request.layout {
    LayoutRequest::Grid(strategy) => plan_grid(dims, *strategy),
    LayoutRequest::Positioned(positions) => plan_positioned(dims, positions),
  }
}

fn header_dims(bytes: &[u8]) -> ConcatResult<InputDims> {
  let decoder = open_registered_decoder(bytes)?;
  let (width, height, _) = decoder.header();
  Ok(InputDims { width, height })
}

/// Composes `sources` (complete image byte buffers) into one output image,
/// returned as a single in-memory buffer. Only [`OutputFormat::Png`] is
/// supported here — JPEG output needs a caller-supplied
/// [`crate::jpeg_sink::JpegSink`], so use [`concat_jpeg`] instead.
pub fn concat(
  sources: &[&[u8]], request: &ConcatRequest, on_progress: impl FnMut(usize, usize),
) -> ConcatResult<Vec<u8>> {
  if !matches!(request.output_format, OutputFormat::Png) {
    return Err(ConcatError::DecoderUnavailable);
  }
  let dims: Vec<InputDims> =
    sources.iter().map(|b| header_dims(b)).collect::<ConcatResult<_>>()?;
  let plan = plan_for(&dims, request)?;
  concat_to_vec(sources, &plan, request.background, request.resolved_alpha_blending(), on_progress)
}

/// A pull iterator over the compressed chunks of a composed PNG: each call
/// to `.next()` hands back one more ready-to-emit slice.
///
/// Unlike [`concat_to_stream`], nothing is pushed to a caller-supplied sink
/// as it's produced; the engine instead runs to completion once, up front,
/// and this just iterates its output. There's no stable way to suspend a
/// plain function mid-loop and resume it later without `async`/generators,
/// so the honest "pull" shape this crate can offer without either is an
/// iterator over already-produced chunks rather than one that drives the
/// compositor lazily, chunk by chunk.
pub type ConcatChunks = alloc::vec::IntoIter<ConcatResult<Vec<u8>>>;

/// Composes `sources` into one output PNG and returns a [`ConcatChunks`]
/// iterator over its encoded chunks. See [`ConcatChunks`] for how this
/// differs from [`concat_to_stream`].
pub fn concat_streaming(
  sources: &[&[u8]], request: &ConcatRequest, mut on_progress: impl FnMut(usize, usize),
) -> ConcatResult<ConcatChunks> {
  if !matches!(request.output_format, OutputFormat::Png) {
    return Err(ConcatError::DecoderUnavailable);
  }
  let dims: Vec<InputDims> =
    sources.iter().map(|b| header_dims(b)).collect::<ConcatResult<_>>()?;
  let plan = plan_for(&dims, request)?;
  let mut chunks = Vec::new();
  concat_streaming_push(
    sources,
    &plan,
    request.background,
    request.resolved_alpha_blending(),
    request.idat_batch_bytes,
    |bytes| {
      chunks.push(Ok(bytes.to_vec()));
      Ok(())
    },
    &mut on_progress,
  )?;
  Ok(chunks.into_iter())
}

/// Composes `sources` into a PNG, pushing each produced chunk of bytes to
/// `sink` as soon as it's ready instead of buffering the whole output.
pub fn concat_to_stream<'src>(
  sources: &[&'src [u8]], request: &ConcatRequest, mut sink: impl FnMut(&[u8]) -> ConcatResult<()>,
  mut on_progress: impl FnMut(usize, usize),
) -> ConcatResult<()> {
  if !matches!(request.output_format, OutputFormat::Png) {
    return Err(ConcatError::DecoderUnavailable);
  }
  let dims: Vec<InputDims> =
    sources.iter().map(|b| header_dims(b)).collect::<ConcatResult<_>>()?;
  let plan = plan_for(&dims, request)?;
  concat_streaming_push(
    sources,
    &plan,
    request.background,
    request.resolved_alpha_blending(),
    request.idat_batch_bytes,
    &mut sink,
    &mut on_progress,
  )
}

/// Composes `sources` as JPEG, handing composited row strips to `sink` as
/// they're produced. `request.output_format` must be [`OutputFormat::Jpeg`].
#[cfg(feature = "jpeg_output")]
pub fn concat_jpeg<'src, S: JpegSink>(
  sources: &[&'src [u8]], request: &ConcatRequest, sink: S, on_progress: impl FnMut(usize, usize),
) -> Result<(), JpegConcatError<S::Error>> {
  if !matches!(request.output_format, OutputFormat::Jpeg { .. }) {
    return Err(JpegConcatError::Concat(ConcatError::InvalidLayout));
  }
  let dims: Vec<InputDims> = sources
    .iter()
    .map(|b| header_dims(b))
    .collect::<ConcatResult<_>>()
    .map_err(JpegConcatError::Concat)?;
  let plan = plan_for(&dims, request).map_err(JpegConcatError::Concat)?;
  crate::concat::concat_jpeg_rows(
    sources,
    &plan,
    request.background,
    request.resolved_alpha_blending(),
    sink,
    on_progress,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alpha_blending_default_follows_layout_mode() {
    let grid = ConcatRequest { layout: LayoutRequest::Grid(GridStrategy::SingleRow), ..Default::default() };
    assert!(!grid.resolved_alpha_blending());

    let positioned = ConcatRequest {
      layout: LayoutRequest::Positioned(Vec::new()),
      ..Default::default()
    };
    assert!(positioned.resolved_alpha_blending());

    let forced_on =
      ConcatRequest { enable_alpha_blending: Some(true), ..Default::default() };
    assert!(forced_on.resolved_alpha_blending());
  }

  #[test]
  fn concat_rejects_jpeg_output_format() {
    let request = ConcatRequest { output_format: OutputFormat::Jpeg { quality: 80 }, ..Default::default() };
    assert_eq!(concat(&[], &request, |_, _| {}).unwrap_err(), ConcatError::DecoderUnavailable);
  }
}
