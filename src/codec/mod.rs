//! # Stream (de)serializer boundary.
//!
//! The core never interprets process bytes itself; it pumps them through
//! injected codecs:
//! - [`Decode`]: turns one process output stream into a lazy record
//!   sequence (infinite, non-restartable, tied to one stream lifetime);
//! - [`Encode`]: writes a batch of inputs to the process stdin.
//!
//! Line-based reference implementations ([`LineDecoder`],
//! [`ParseLineDecoder`], [`LineEncoder`]) cover the common
//! newline-delimited case and the test suites.

mod decode;
mod encode;
mod line;

pub use decode::{ByteReader, Decode};
pub use encode::Encode;
pub use line::{LineDecoder, LineEncoder, ParseLineDecoder};
