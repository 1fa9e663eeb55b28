use std::io::IoSlice;

use smallvec::{smallvec, SmallVec};

use crate::error::{FrameError, Result};
use crate::sink::ByteSink;
use crate::word::{put_u32_le, table_words, words_as_bytes, Word};

/// Serialized size of the framed message: table words plus payload words.
///
/// Fails with [`FrameError::EmptyMessage`] for a zero-segment list; a valid
/// message carries at least one segment.
pub fn serialized_size_in_words(segments: &[&[Word]]) -> Result<usize> {
    if segments.is_empty() {
        return Err(FrameError::EmptyMessage);
    }
    let mut total = table_words(segments.len() as u32);
    for segment in segments {
        total += segment.len();
    }
    Ok(total)
}

/// Frame `segments` and emit them to `sink` as one gathered write.
///
/// The segment table is built in a stack buffer (spilling to the heap only
/// past 62 segments) and handed to the sink together with every segment in
/// a single [`ByteSink::write_all_vectored`] call.
pub fn write_message<S: ByteSink>(sink: &mut S, segments: &[&[Word]]) -> Result<()> {
    if segments.is_empty() {
        return Err(FrameError::EmptyMessage);
    }
    let segment_count = segments.len() as u32;

    // Table entries rounded up to a whole number of words; the rounding slot
    // doubles as the zero padding entry for even counts.
    let entries = (segments.len() + 2) & !1;
    let mut table: SmallVec<[u8; 256]> = smallvec![0; entries * 4];

    // Count minus one makes the first word of a single-segment message all
    // zeros, which helps generic compressors downstream.
    put_u32_le(&mut table, 0, segment_count - 1);
    for (i, segment) in segments.iter().enumerate() {
        put_u32_le(&mut table, i + 1, segment.len() as u32);
    }

    let mut pieces: SmallVec<[IoSlice<'_>; 32]> = SmallVec::with_capacity(segments.len() + 1);
    pieces.push(IoSlice::new(&table));
    for segment in segments {
        pieces.push(IoSlice::new(words_as_bytes(segment)));
    }

    sink.write_all_vectored(&pieces)?;
    Ok(())
}
