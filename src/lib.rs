#![cfg_attr(not(feature = "trace"), no_std)]
#![forbid(unsafe_code)]

//! Composes many raster images into a single PNG (or, via a caller-supplied
//! [`jpeg_sink::JpegSink`], JPEG) using a bounded amount of working memory
//! regardless of how many total pixels are involved.
//!
//! See [`facade::concat`] for the simplest entry point,
//! [`facade::concat_streaming`] for a pull iterator over the output, and
//! [`facade::concat_to_stream`] for a push-to-sink streaming one.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "trace")]
extern crate std;

/// Logs a trace message when the `trace` feature is enabled; a no-op
/// otherwise. Every argument is evaluated either way, so don't put anything
/// expensive directly in the argument list without gating it yourself.
#[macro_export]
macro_rules! trace {
  ($($arg:tt)*) => {
    #[cfg(feature = "trace")] {
      ::std::print!("{file}:{line}> ", file = file!(), line = line!());
      ::std::println!($($arg)*);
    }
  }
}

pub mod bits;
#[cfg(feature = "alloc")]
pub mod chunk;
pub mod filtering;
pub mod adam7;
#[cfg(feature = "miniz_oxide")]
pub mod deflate;
pub mod pixel_formats;
#[cfg(feature = "alloc")]
pub mod decoder;
#[cfg(feature = "alloc")]
pub mod pixel_ops;
#[cfg(feature = "alloc")]
pub mod color;
#[cfg(feature = "alloc")]
pub mod layout;
#[cfg(all(feature = "alloc", feature = "miniz_oxide"))]
pub mod concat;
#[cfg(feature = "jpeg_output")]
pub mod jpeg_sink;
pub mod error;
#[cfg(all(feature = "alloc", feature = "miniz_oxide"))]
pub mod facade;

#[cfg(all(feature = "alloc", feature = "miniz_oxide"))]
pub use facade::{
  concat, concat_streaming, concat_to_stream, ConcatChunks, ConcatRequest, LayoutRequest,
  OptimizeMode, OutputFormat,
};
#[cfg(all(feature = "alloc", feature = "miniz_oxide", feature = "jpeg_output"))]
pub use facade::concat_jpeg;
pub use error::{ConcatError, ConcatResult};
