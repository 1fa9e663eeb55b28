/// Maximum number of segments a [`StreamReader`](crate::StreamReader)
/// accepts in one message.
///
/// A malicious header could otherwise declare billions of segments and make
/// the receiver allocate a huge segment table before any payload arrives.
/// Callers that legitimately need more segments must split the message.
pub const MAX_SEGMENTS: u32 = 512;

/// Default [`ReaderOptions::traversal_limit_in_words`](crate::ReaderOptions):
/// 8 Mi words, i.e. 64 MiB of payload.
pub const DEFAULT_TRAVERSAL_LIMIT_WORDS: u64 = 8 * 1024 * 1024;

/// Default [`ReaderOptions::nesting_limit`](crate::ReaderOptions).
pub const DEFAULT_NESTING_LIMIT: i32 = 64;
