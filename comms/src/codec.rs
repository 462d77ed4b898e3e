use std::io;

/// A message that can be written into a frame.
pub trait Encode<'a> {
    /// Writes the owned part of `self` into `buf`.
    ///
    /// # Returns
    /// An optional borrowed tail that is written right after `buf` without copying.
    fn encode(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}

/// A message that can be read back from a frame, possibly borrowing from it.
pub trait Decode<'a>: Sized {
    fn decode(frame: &'a [u8]) -> io::Result<Self>;
}
