use std::io::{self, IoSlice, Write};

/// A byte sink accepting a gather list as one logical write.
///
/// [`write_message`](crate::write_message) hands the segment table and every
/// segment to the sink in a single call so that record-oriented sinks (a
/// datagram socket, a length-delimited log) can emit the message as one
/// record instead of reassembling fragments.
pub trait ByteSink {
    /// Write all pieces, in order, completely.
    fn write_all_vectored(&mut self, pieces: &[IoSlice<'_>]) -> io::Result<()>;
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_all_vectored(&mut self, pieces: &[IoSlice<'_>]) -> io::Result<()> {
        (**self).write_all_vectored(pieces)
    }
}

impl ByteSink for Vec<u8> {
    fn write_all_vectored(&mut self, pieces: &[IoSlice<'_>]) -> io::Result<()> {
        for piece in pieces {
            self.extend_from_slice(piece);
        }
        Ok(())
    }
}

/// Adapter implementing [`ByteSink`] on top of any [`io::Write`].
///
/// Issues one `write_vectored` call and only falls back to piecewise
/// completion when the OS accepted a short count.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        WriteSink { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn write_all_vectored(&mut self, pieces: &[IoSlice<'_>]) -> io::Result<()> {
        let total: usize = pieces.iter().map(|p| p.len()).sum();
        let written = match self.inner.write_vectored(pieces) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
            Err(e) => return Err(e),
        };
        if written == total {
            return Ok(());
        }

        // Short write: finish the remainder piece by piece.
        let mut to_discard = written;
        for piece in pieces {
            if to_discard >= piece.len() {
                to_discard -= piece.len();
                continue;
            }
            self.inner.write_all(&piece[to_discard..])?;
            to_discard = 0;
        }
        Ok(())
    }
}
