use std::io;

/// A character source: the sole external collaborator the state machine
/// pulls bytes from (C1).
///
/// Implementations make no guarantee about how many bytes are delivered on
/// a non-final call, not even that it is as many as are actually
/// available; the tokenizer must be (and is) correct for any legal fill
/// pattern, including one byte at a time.
pub trait CharSource {
    /// Attempt to read up to `destination.len()` bytes, returning the
    /// number of bytes actually written to the front of `destination`.
    /// Returns `Ok(0)` if and only if the source is exhausted.
    fn read(&mut self, destination: &mut [u8]) -> io::Result<usize>;
}

/// Adapts any [`std::io::Read`] into a [`CharSource`].
///
/// This is the typical way to drive the tokenizer from a file, socket or
/// any other byte stream; the tokenizer performs its own buffering, so
/// callers should not additionally wrap `inner` in `io::BufReader`.
#[derive(Debug)]
pub struct IoCharSource<R> {
    inner: R,
}

impl<R: io::Read> IoCharSource<R> {
    /// Wrap `inner` as a character source.
    pub fn new(inner: R) -> IoCharSource<R> {
        IoCharSource { inner }
    }

    /// Consume the adapter, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> CharSource for IoCharSource<R> {
    fn read(&mut self, destination: &mut [u8]) -> io::Result<usize> {
        self.inner.read(destination)
    }
}

/// A [`CharSource`] over an in-memory byte slice, delivering the whole
/// remaining slice (or however much fits) on every call.
///
/// Mostly useful for tests; production callers will usually reach for
/// [`IoCharSource`] instead.
#[derive(Debug)]
pub struct SliceSource<'a> {
    remaining: &'a [u8],
}

impl<'a> SliceSource<'a> {
    /// Create a source that yields the bytes of `data`.
    pub fn new(data: &'a [u8]) -> SliceSource<'a> {
        SliceSource { remaining: data }
    }
}

impl<'a> CharSource for SliceSource<'a> {
    fn read(&mut self, destination: &mut [u8]) -> io::Result<usize> {
        let n = destination.len().min(self.remaining.len());
        destination[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        Ok(n)
    }
}

/// A [`CharSource`] that hands out at most `chunk` bytes per call,
/// regardless of how much `destination` or the underlying data can hold.
///
/// Used in tests to exercise "correctness for any legal fill pattern"
/// (see spec §4.1 / §8): a parser must produce identical records whether
/// fed a megabyte at a time or one byte at a time.
#[derive(Debug)]
pub struct ChunkedSource<'a> {
    remaining: &'a [u8],
    chunk: usize,
}

impl<'a> ChunkedSource<'a> {
    /// Create a source that yields at most `chunk` bytes of `data` per
    /// `read` call. `chunk` is clamped to at least 1.
    pub fn new(data: &'a [u8], chunk: usize) -> ChunkedSource<'a> {
        ChunkedSource { remaining: data, chunk: chunk.max(1) }
    }
}

impl<'a> CharSource for ChunkedSource<'a> {
    fn read(&mut self, destination: &mut [u8]) -> io::Result<usize> {
        let n = destination.len().min(self.remaining.len()).min(self.chunk);
        destination[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        Ok(n)
    }
}
