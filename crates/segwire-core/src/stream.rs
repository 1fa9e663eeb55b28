use std::io;
use std::ops::Range;

use smallvec::{smallvec, SmallVec};

use crate::error::{FrameError, Result};
use crate::limits::MAX_SEGMENTS;
use crate::options::ReaderOptions;
use crate::source::ByteSource;
use crate::word::{get_u32_le, words_as_bytes_mut, Word};

/// Word buffer backing a [`StreamReader`]: caller-supplied scratch when it
/// is big enough, an owned allocation otherwise.
enum Space<'s> {
    Owned(Box<[Word]>),
    Scratch(&'s mut [Word]),
}

impl Space<'_> {
    fn words(&self) -> &[Word] {
        match self {
            Space::Owned(words) => words,
            Space::Scratch(words) => words,
        }
    }

    fn words_mut(&mut self) -> &mut [Word] {
        match self {
            Space::Owned(words) => words,
            Space::Scratch(words) => words,
        }
    }
}

/// Reader that unframes one message from a byte stream.
///
/// The segment table is read and validated eagerly; for multi-segment
/// messages only segment 0 is read up front and the tail segments are
/// materialized lazily by [`get_segment`](Self::get_segment). Dropping the
/// reader skips whatever part of the payload was never read, leaving the
/// source positioned at the start of the next message.
///
/// Lazy reads advance a single cursor, so handing segments to several
/// threads requires external serialization; `get_segment` takes `&mut self`
/// accordingly.
pub struct StreamReader<'s, S: ByteSource> {
    source: S,
    space: Space<'s>,
    /// Word ranges into `space`; index 0 is segment 0.
    segments: Vec<Range<usize>>,
    /// Bytes of payload read so far, while a lazy tail remains.
    read_pos: Option<usize>,
    total_bytes: usize,
    options: ReaderOptions,
}

impl<S: ByteSource> StreamReader<'static, S> {
    /// Read the segment table from `source` and buffer segment 0.
    pub fn new(source: S, options: ReaderOptions) -> Result<Self> {
        Self::build(source, options, None)
    }
}

impl<'s, S: ByteSource> StreamReader<'s, S> {
    /// Like [`new`](StreamReader::new), but reuses `scratch` for the payload
    /// when it is at least the message's total word count; otherwise an
    /// owned buffer is allocated as usual.
    pub fn new_with_scratch(
        source: S,
        options: ReaderOptions,
        scratch: &'s mut [Word],
    ) -> Result<Self> {
        Self::build(source, options, Some(scratch))
    }

    fn build(mut source: S, options: ReaderOptions, scratch: Option<&'s mut [Word]>) -> Result<Self> {
        let mut head = [0u8; 8];
        source
            .read(&mut head, 8)
            .map_err(|e| truncated_on_eof(e, "segment table"))?;

        let segment_count = get_u32_le(&head, 0).wrapping_add(1);
        let segment0_size = if segment_count == 0 {
            0
        } else {
            get_u32_le(&head, 1)
        };

        if segment_count >= MAX_SEGMENTS {
            return Err(FrameError::TooManySegments {
                count: segment_count,
                limit: MAX_SEGMENTS,
            });
        }

        // Remaining table entries: sizes of segments 1.., plus the padding
        // slot when the count is even. Rounding the count down to even gives
        // exactly that.
        let extra_entries = (segment_count & !1) as usize;
        let mut size_bytes: SmallVec<[u8; 256]> = smallvec![0; extra_entries * 4];
        let mut total_words = u64::from(segment0_size);
        if segment_count > 1 {
            let min = size_bytes.len();
            source
                .read(&mut size_bytes, min)
                .map_err(|e| truncated_on_eof(e, "segment table"))?;
            for i in 0..(segment_count - 1) as usize {
                total_words += u64::from(get_u32_le(&size_bytes, i));
            }
        }

        // Checked before any payload allocation so a malicious header cannot
        // make us reserve gigabytes.
        if total_words > options.traversal_limit_in_words {
            return Err(FrameError::TooLarge {
                total_words,
                limit: options.traversal_limit_in_words,
            });
        }
        let total_words_usize = usize::try_from(total_words).map_err(|_| FrameError::TooLarge {
            total_words,
            limit: options.traversal_limit_in_words,
        })?;

        let mut space = match scratch {
            Some(scratch) if scratch.len() >= total_words_usize => Space::Scratch(scratch),
            _ => Space::Owned(vec![Word::ZERO; total_words_usize].into_boxed_slice()),
        };

        let mut segments = Vec::with_capacity(segment_count.max(1) as usize);
        let mut offset = segment0_size as usize;
        segments.push(0..offset);
        for i in 0..segment_count.saturating_sub(1) as usize {
            let size = get_u32_le(&size_bytes, i) as usize;
            segments.push(offset..offset + size);
            offset += size;
        }

        let total_bytes = total_words_usize * Word::BYTES;
        let read_pos = if segment_count > 1 {
            // Segment 0 now, the rest on demand. The source may hand us more
            // than the minimum, so track how far it actually got.
            let segment0_bytes = segment0_size as usize * Word::BYTES;
            let buf = &mut words_as_bytes_mut(space.words_mut())[..total_bytes];
            let n = source
                .read(buf, segment0_bytes)
                .map_err(|e| truncated_on_eof(e, "first segment"))?;
            Some(n)
        } else {
            if total_bytes > 0 {
                let buf = &mut words_as_bytes_mut(space.words_mut())[..total_bytes];
                source
                    .read(buf, total_bytes)
                    .map_err(|e| truncated_on_eof(e, "first segment"))?;
            }
            None
        };

        Ok(StreamReader {
            source,
            space,
            segments,
            read_pos,
            total_bytes,
            options,
        })
    }

    /// The segment with the given id, or the empty view past the last one.
    ///
    /// Reads any not-yet-buffered payload up to the end of the requested
    /// segment first; a source failure or early end of stream surfaces here.
    pub fn get_segment(&mut self, id: u32) -> Result<&[Word]> {
        let Some(range) = self.segments.get(id as usize).cloned() else {
            return Ok(&[]);
        };

        if let Some(pos) = self.read_pos {
            let segment_end = range.end * Word::BYTES;
            if pos < segment_end {
                let bytes = words_as_bytes_mut(self.space.words_mut());
                let n = self
                    .source
                    .read(&mut bytes[pos..self.total_bytes], segment_end - pos)
                    .map_err(|e| truncated_on_eof(e, "segment data"))?;
                self.read_pos = Some(pos + n);
            }
        }

        Ok(&self.space.words()[range])
    }

    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Skip whatever part of the payload was never lazily read, leaving the
    /// source positioned at the start of the next message.
    ///
    /// Dropping the reader does the same, but swallows skip failures; call
    /// this when you need the error.
    pub fn finish(mut self) -> io::Result<()> {
        self.drain()
    }

    fn drain(&mut self) -> io::Result<()> {
        if let Some(pos) = self.read_pos.take() {
            if pos < self.total_bytes {
                self.source.skip((self.total_bytes - pos) as u64)?;
            }
        }
        Ok(())
    }
}

impl<S: ByteSource> Drop for StreamReader<'_, S> {
    fn drop(&mut self) {
        // Best effort: a failure here must not unwind out of drop.
        if let Err(error) = self.drain() {
            tracing::warn!(%error, "failed to skip unread message payload");
        }
    }
}

fn truncated_on_eof(error: io::Error, context: &'static str) -> FrameError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::Truncated(context)
    } else {
        FrameError::Io(error)
    }
}
