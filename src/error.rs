//! Errors produced while planning a layout or composing an output image.

/// An error from the `pngrid` crate.
///
/// Most variants name exactly which stage of the pipeline failed. Use
/// [`ConcatError::is_fatal`] to tell the one genuinely recoverable case
/// (a deflate stream ending in a way that still yielded usable output) from
/// every other variant, which all abort the whole composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConcatError {
  /// No source images were given.
  EmptyInputs,
  /// The requested layout is self-contradictory (e.g. zero columns).
  InvalidLayout,
  /// A request mixed grid-mode and positioned-mode fields.
  MixedLayoutModes,
  /// Two source images report pixel formats that can't be composited
  /// together without a conversion this crate doesn't perform.
  IncompatibleImageFormats,
  /// The input's magic bytes didn't match any registered decoder.
  UnsupportedFormat,
  /// The PNG signature bytes didn't match.
  CorruptSignature,
  /// A chunk's declared length ran past the end of the input.
  TruncatedChunk,
  /// A chunk's CRC didn't match its declared value.
  ChunkCrcMismatch,
  /// No `IHDR` chunk was found, or it wasn't first.
  MissingIHDR,
  /// No `IDAT` chunks were found.
  MissingIDAT,
  /// An Adam7 pass ended before producing all of its pixels.
  Adam7Truncated,
  /// A scanline's filter-type byte wasn't 0-4.
  InvalidFilterType,
  /// A `#RRGGBB`-style color string had invalid hex digits or length.
  InvalidHex,
  /// A color string or array didn't parse as a color at all.
  InvalidColor,
  /// The deflate compressor reported a hard failure.
  CompressionError,
  /// The deflate decompressor reported a hard failure.
  DecompressionError,
  /// The compressed stream ended before producing the expected number of
  /// bytes.
  TruncatedStream,
  /// There was more input left over after decoding should have finished.
  ExtraBytes,
  /// No decoder plug-in is registered for this format (e.g. a JPEG/HEIC
  /// feature wasn't enabled).
  DecoderUnavailable,
  /// An I/O adapter supplied by the caller returned an error.
  IOError,
  /// A streaming handle was polled again after it already finished.
  UsedAfterFinish,
  /// The caller dropped the output stream before composition finished.
  Cancelled,
  /// The declared width and/or height of an image is 0.
  WidthOrHeightZero,
  /// The composed image's dimensions exceed what this crate will attempt.
  DimensionsTooLarge,
}
impl ConcatError {
  /// True for the handful of statuses that still represent a complete,
  /// usable decode even though they're not a clean success code.
  #[must_use]
  pub fn is_fatal(self) -> bool {
    !matches!(self, ConcatError::ExtraBytes)
  }
}

/// Shorthand for `Result<T, ConcatError>`.
pub type ConcatResult<T> = Result<T, ConcatError>;
