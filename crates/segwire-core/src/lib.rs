#![doc = include_str!("../README.md")]
#![forbid(unsafe_op_in_unsafe_fn)]

mod error;
mod flat;
mod limits;
mod options;
mod sink;
mod source;
mod stream;
mod word;
mod write;

pub use error::*;
pub use flat::*;
pub use limits::*;
pub use options::*;
pub use sink::*;
pub use source::*;
pub use stream::*;
pub use word::*;
pub use write::*;
