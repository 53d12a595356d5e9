//! Background color parsing.

use crate::{
  error::{ConcatError, ConcatResult},
  pixel_formats::RGBA8,
};

/// A background color, as given by a caller, before it's resolved to a
/// concrete [`RGBA8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundColor {
  Transparent,
  Rgba(RGBA8),
}
impl Default for BackgroundColor {
  fn default() -> Self {
    Self::Transparent
  }
}
impl BackgroundColor {
  #[must_use]
  pub fn resolve(self) -> RGBA8 {
    match self {
      BackgroundColor::Transparent => RGBA8 { r: 0, g: 0, b: 0, a: 0 },
      BackgroundColor::Rgba(c) => c,
    }
  }

  /// Parses `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`, or a handful of named
  /// colors.
  pub fn parse(s: &str) -> ConcatResult<Self> {
    if s.eq_ignore_ascii_case("transparent") {
      return Ok(Self::Transparent);
    }
    if let Some(named) = named_color(s) {
      return Ok(Self::Rgba(named));
    }
    let hex = s.strip_prefix('#').ok_or(ConcatError::InvalidColor)?;
    let digit = |c: u8| -> ConcatResult<u8> {
      match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ConcatError::InvalidHex),
      }
    };
    let bytes = hex.as_bytes();
    let pair = |i: usize| -> ConcatResult<u8> { Ok(digit(bytes[i])? << 4 | digit(bytes[i + 1])?) };
    let nibble_pair = |i: usize| -> ConcatResult<u8> {
      let d = digit(bytes[i])?;
      Ok(d << 4 | d)
    };
    match bytes.len() {
      3 => Ok(Self::Rgba(RGBA8 {
        r: nibble_pair(0)?,
        g: nibble_pair(1)?,
        b: nibble_pair(2)?,
        a: 255,
      })),
      4 => Ok(Self::Rgba(RGBA8 {
        r: nibble_pair(0)?,
        g: nibble_pair(1)?,
        b: nibble_pair(2)?,
        a: nibble_pair(3)?,
      })),
      6 => Ok(Self::Rgba(RGBA8 { r: pair(0)?, g: pair(2)?, b: pair(4)?, a: 255 })),
      8 => Ok(Self::Rgba(RGBA8 { r: pair(0)?, g: pair(2)?, b: pair(4)?, a: pair(6)? })),
      _ => Err(ConcatError::InvalidHex),
    }
  }
}

fn named_color(s: &str) -> Option<RGBA8> {
  Some(match s {
    "black" => RGBA8::opaque(0, 0, 0),
    "white" => RGBA8::opaque(255, 255, 255),
    "red" => RGBA8::opaque(255, 0, 0),
    "green" => RGBA8::opaque(0, 128, 0),
    "blue" => RGBA8::opaque(0, 0, 255),
    "yellow" => RGBA8::opaque(255, 255, 0),
    "cyan" => RGBA8::opaque(0, 255, 255),
    "magenta" => RGBA8::opaque(255, 0, 255),
    "gray" | "grey" => RGBA8::opaque(128, 128, 128),
    _ => return None,
  })
}
