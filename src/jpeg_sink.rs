//! Interface for JPEG output. No JPEG encoder is bundled with this crate;
//! `pngrid` only defines the shape a caller-supplied encoder must have so
//! [`crate::concat`] can target it without knowing the encoder's internals.

use crate::{error::ConcatError, pixel_formats::RGBA8};

/// Accepts composited RGBA8 strips and encodes them as JPEG.
///
/// Implementations should composite the alpha channel against whatever
/// background they were constructed with themselves, or rely on
/// [`crate::concat`] having already done so (see `DESIGN.md`'s Open
/// Question decision: `pngrid` always pre-composites the background before
/// handing rows to a `JpegSink`, since JPEG has no alpha channel at all).
pub trait JpegSink {
  type Error;

  /// 0-100, JPEG's usual quality knob.
  fn quality(&self) -> u8;

  /// Called once with the final image dimensions before any rows arrive.
  fn begin(&mut self, width: u32, height: u32) -> Result<(), Self::Error>;

  /// Receives `rows.len() / width` consecutive rows of pixels, top to
  /// bottom.
  fn write_rows(&mut self, rows: &[RGBA8]) -> Result<(), Self::Error>;

  /// Flushes and finalizes the encoded JPEG stream.
  fn finish(self) -> Result<(), Self::Error>;
}

/// Either half of a JPEG composition can fail: [`crate::concat`]'s own
/// layout/decode/compositing step, or the caller-supplied [`JpegSink`].
#[derive(Debug)]
pub enum JpegConcatError<E> {
  Concat(ConcatError),
  Sink(E),
}
