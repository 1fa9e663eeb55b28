use crate::error::{FrameError, Result};
use crate::options::ReaderOptions;
use crate::word::{get_u32_le, put_u32_le, table_words, words_as_bytes, words_as_bytes_mut, Word};
use crate::write::serialized_size_in_words;

/// Reader over a message that is already fully buffered as words.
///
/// Parses the segment table once at construction and hands out borrowed,
/// zero-copy segment views afterwards. Empty input is treated as an empty
/// message rather than an error.
pub struct FlatReader<'a> {
    segments: Vec<&'a [Word]>,
    words_consumed: usize,
    options: ReaderOptions,
}

impl<'a> FlatReader<'a> {
    /// Parse the segment table at the start of `words`.
    ///
    /// Fails with [`FrameError::Truncated`] if the buffer ends inside the
    /// table or inside a declared segment; no reader exists in that case, so
    /// partially-parsed segments are never observable.
    pub fn new(words: &'a [Word], options: ReaderOptions) -> Result<Self> {
        if words.is_empty() {
            return Ok(FlatReader {
                segments: Vec::new(),
                words_consumed: 0,
                options,
            });
        }

        let bytes = words_as_bytes(words);
        let segment_count = get_u32_le(bytes, 0).wrapping_add(1);
        let table = table_words(segment_count);

        if words.len() < table {
            return Err(FrameError::Truncated("segment table"));
        }

        if segment_count == 0 {
            return Ok(FlatReader {
                segments: Vec::new(),
                words_consumed: table,
                options,
            });
        }

        let mut segments = Vec::with_capacity(segment_count as usize);
        let mut offset = table;
        for i in 0..segment_count as usize {
            let size = get_u32_le(bytes, i + 1) as usize;
            let context = if i == 0 { "first segment" } else { "segment data" };
            let end = offset
                .checked_add(size)
                .ok_or(FrameError::Truncated(context))?;
            if words.len() < end {
                return Err(FrameError::Truncated(context));
            }
            segments.push(&words[offset..end]);
            offset = end;
        }

        Ok(FlatReader {
            segments,
            words_consumed: offset,
            options,
        })
    }

    /// The segment with the given id, or the empty view past the last one.
    ///
    /// The empty view is a sentinel, not an error: consumers iterating
    /// segments stop at the first empty result.
    pub fn get_segment(&self, id: u32) -> &'a [Word] {
        self.segments.get(id as usize).copied().unwrap_or(&[])
    }

    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    /// One past the last word this message occupies in the input.
    ///
    /// When several messages are concatenated in one buffer, the next
    /// message starts here.
    pub fn words_consumed(&self) -> usize {
        self.words_consumed
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }
}

/// Frame `segments` into a single owned word buffer.
///
/// The result round-trips through [`FlatReader`]. Fails with
/// [`FrameError::EmptyMessage`] for a zero-segment list.
pub fn message_to_words(segments: &[&[Word]]) -> Result<Vec<Word>> {
    let total = serialized_size_in_words(segments)?;
    let segment_count = segments.len() as u32;

    let mut words = vec![Word::ZERO; total];
    {
        let bytes = words_as_bytes_mut(&mut words);
        put_u32_le(bytes, 0, segment_count - 1);
        for (i, segment) in segments.iter().enumerate() {
            put_u32_le(bytes, i + 1, segment.len() as u32);
        }
        // For even counts the padding entry is already zero.
    }

    let mut offset = table_words(segment_count);
    for segment in segments {
        words[offset..offset + segment.len()].copy_from_slice(segment);
        offset += segment.len();
    }
    debug_assert_eq!(offset, total);

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_from_bytes(bytes: &[u8]) -> Vec<Word> {
        assert_eq!(bytes.len() % Word::BYTES, 0);
        bytes
            .chunks_exact(Word::BYTES)
            .map(|c| Word::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    }

    #[test]
    fn single_segment_message() {
        let input = words_from_bytes(&[
            0x00, 0x00, 0x00, 0x00, // segment count - 1
            0x01, 0x00, 0x00, 0x00, // segment 0 size
            0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
        ]);
        let reader = FlatReader::new(&input, ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 1);
        assert_eq!(reader.get_segment(0), &[Word::from_le_bytes([0xaa; 8])]);
        assert_eq!(reader.get_segment(1), &[]);
        assert_eq!(reader.words_consumed(), 2);
    }

    #[test]
    fn two_segment_message() {
        let mut bytes = vec![
            0x01, 0x00, 0x00, 0x00, // segment count - 1
            0x02, 0x00, 0x00, 0x00, // segment 0: 2 words
            0x03, 0x00, 0x00, 0x00, // segment 1: 3 words
            0x00, 0x00, 0x00, 0x00, // padding
        ];
        bytes.extend_from_slice(&[0x11; 16]);
        bytes.extend_from_slice(&[0x22; 24]);

        let input = words_from_bytes(&bytes);
        let reader = FlatReader::new(&input, ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 2);
        assert_eq!(reader.get_segment(0).len(), 2);
        assert_eq!(reader.get_segment(1).len(), 3);
        assert_eq!(reader.get_segment(0)[0].to_le_bytes(), [0x11; 8]);
        assert_eq!(reader.get_segment(1)[2].to_le_bytes(), [0x22; 8]);
        assert_eq!(reader.words_consumed(), input.len());
    }

    #[test]
    fn empty_input_is_empty_message() {
        let reader = FlatReader::new(&[], ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 0);
        assert_eq!(reader.get_segment(0), &[]);
        assert_eq!(reader.words_consumed(), 0);
    }

    #[test]
    fn wrapped_zero_segment_count_consumes_only_table() {
        // First entry 0xffffffff makes the count wrap to zero.
        let input = words_from_bytes(&[0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
        let reader = FlatReader::new(&input, ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 0);
        assert_eq!(reader.get_segment(0), &[]);
        assert_eq!(reader.words_consumed(), 1);
    }

    #[test]
    fn truncated_table_is_an_error() {
        // Declares 4 segments (table = 3 words) but only 1 word is present.
        let input = words_from_bytes(&[0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            FlatReader::new(&input, ReaderOptions::default()),
            Err(FrameError::Truncated("segment table"))
        ));
    }

    #[test]
    fn truncated_segment_is_an_error() {
        // One segment of 2 words, but only 1 word of payload.
        let input = words_from_bytes(&[
            0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, //
            0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
        ]);
        assert!(matches!(
            FlatReader::new(&input, ReaderOptions::default()),
            Err(FrameError::Truncated("first segment"))
        ));
    }

    #[test]
    fn message_to_words_layout() {
        let w = |b: u8| Word::from_le_bytes([b; 8]);
        let seg_a = [w(0x01), w(0x02)];
        let seg_b = [w(0x03)];
        let words = message_to_words(&[&seg_a, &seg_b]).unwrap();

        let bytes = words_as_bytes(&words);
        assert_eq!(
            &bytes[..16],
            &[
                0x01, 0x00, 0x00, 0x00, // segment count - 1
                0x02, 0x00, 0x00, 0x00, // segment 0 size
                0x01, 0x00, 0x00, 0x00, // segment 1 size
                0x00, 0x00, 0x00, 0x00, // padding
            ]
        );
        assert_eq!(&words[2..], &[w(0x01), w(0x02), w(0x03)]);
    }

    #[test]
    fn flat_roundtrip() {
        let w = |b: u8| Word::from_le_bytes([b; 8]);
        let seg_a = [w(0xaa), w(0xbb)];
        let seg_b: [Word; 0] = [];
        let seg_c = [w(0xcc)];
        let segments: [&[Word]; 3] = [&seg_a, &seg_b, &seg_c];

        let words = message_to_words(&segments).unwrap();
        let reader = FlatReader::new(&words, ReaderOptions::default()).unwrap();
        assert_eq!(reader.segment_count(), 3);
        for (id, segment) in segments.iter().enumerate() {
            assert_eq!(reader.get_segment(id as u32), *segment);
        }
        assert_eq!(reader.words_consumed(), words.len());
    }
}
