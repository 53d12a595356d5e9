use pngrid::chunk::RawChunkIter;

#[test]
fn raw_chunk_iter_never_panics_on_garbage() {
  // even totally random data should never panic the iterator
  for _ in 0..50 {
    let v = super::rand_bytes(1024);
    for _ in RawChunkIter::new(&v) {
      //
    }
  }
}

#[test]
fn png_decoder_never_panics_on_garbage() {
  // random bytes almost never form a valid signature, so fatten the odds by
  // prefixing the real one some of the time
  for i in 0..50 {
    let mut v = if i % 2 == 0 { pngrid::bits::PNG_SIGNATURE.to_vec() } else { Vec::new() };
    v.extend(super::rand_bytes(512));
    let _ = pngrid::decoder::PngDecoder::new(&v);
  }
}

#[test]
fn decoder_rejects_truncated_real_png() {
  // a well-formed header followed by nothing should error, not panic
  let mut v = pngrid::bits::PNG_SIGNATURE.to_vec();
  v.extend_from_slice(b"garbage");
  assert!(pngrid::decoder::PngDecoder::new(&v).is_err());
}
