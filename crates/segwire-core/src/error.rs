use std::io;

/// Errors produced while framing or unframing a message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Input ended before the segment table or a declared segment completed.
    #[error("message ends prematurely in {0}")]
    Truncated(&'static str),

    /// Header declared more segments than [`MAX_SEGMENTS`](crate::MAX_SEGMENTS).
    #[error("message has too many segments: {count} (limit {limit})")]
    TooManySegments { count: u32, limit: u32 },

    /// Declared total word count exceeds the reader's traversal limit.
    #[error("message too large: {total_words} words (limit {limit}); raise ReaderOptions::traversal_limit_in_words on the receiving end if this message is legitimate")]
    TooLarge { total_words: u64, limit: u64 },

    /// Tried to serialize a message with zero segments.
    #[error("tried to serialize a message with no segments")]
    EmptyMessage,

    /// An underlying source or sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = FrameError> = std::result::Result<T, E>;
