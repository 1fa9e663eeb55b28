use crate::limits::{DEFAULT_NESTING_LIMIT, DEFAULT_TRAVERSAL_LIMIT_WORDS};

/// Limits applied while reading a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Maximum total message size in words.
    ///
    /// A reader rejects any message whose declared segment sizes sum to more
    /// than this, before allocating payload space. The limit exists to bound
    /// the damage of a malicious or corrupt header; raise it when handling
    /// legitimately large messages.
    pub traversal_limit_in_words: u64,

    /// Maximum nesting depth allowed when traversing message contents.
    ///
    /// Framing itself has no nesting; the value is carried here so the
    /// traversal layer sitting on top of the segment views can enforce it.
    pub nesting_limit: i32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            traversal_limit_in_words: DEFAULT_TRAVERSAL_LIMIT_WORDS,
            nesting_limit: DEFAULT_NESTING_LIMIT,
        }
    }
}
