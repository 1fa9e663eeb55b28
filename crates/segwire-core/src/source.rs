use std::io::{self, Read};

/// A blocking byte source with a minimum-read contract.
///
/// Unlike [`io::Read`], one call may be required to produce several bytes:
/// `read` must fill at least `min_bytes` of `buf` (or fail), and may
/// opportunistically fill more, up to `buf.len()`. This lets a reader grab
/// everything the source already has buffered in a single call.
pub trait ByteSource {
    /// Read at least `min_bytes` into `buf`, returning the number of bytes
    /// actually read (`min_bytes ..= buf.len()`).
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the source ends before
    /// `min_bytes` were produced.
    fn read(&mut self, buf: &mut [u8], min_bytes: usize) -> io::Result<usize>;

    /// Discard exactly `n` bytes.
    fn skip(&mut self, n: u64) -> io::Result<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8], min_bytes: usize) -> io::Result<usize> {
        (**self).read(buf, min_bytes)
    }

    fn skip(&mut self, n: u64) -> io::Result<()> {
        (**self).skip(n)
    }
}

fn exhausted() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "byte source exhausted")
}

/// Reads from the front of the slice, like [`io::Read`] for `&[u8]` but
/// greedy: every call hands out as much as fits in `buf`.
impl ByteSource for &[u8] {
    fn read(&mut self, buf: &mut [u8], min_bytes: usize) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        if n < min_bytes {
            return Err(exhausted());
        }
        buf[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> io::Result<()> {
        match usize::try_from(n) {
            Ok(n) if n <= self.len() => {
                *self = &self[n..];
                Ok(())
            }
            _ => Err(exhausted()),
        }
    }
}

/// Adapter implementing [`ByteSource`] on top of any [`io::Read`].
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8], min_bytes: usize) -> io::Result<usize> {
        let mut total = 0;
        while total < min_bytes {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => return Err(exhausted()),
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn skip(&mut self, n: u64) -> io::Result<()> {
        let copied = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        if copied < n {
            return Err(exhausted());
        }
        Ok(())
    }
}
