//! # Newline-delimited reference codecs.
//!
//! - [`LineDecoder`]: yields raw lines as `String`s; never produces a
//!   malformed record.
//! - [`ParseLineDecoder<T>`]: parses each line with `FromStr`; a line
//!   that fails to parse yields `CodecError::Malformed` and the stream
//!   continues with the next line.
//! - [`LineEncoder`]: writes each input via `Display`, one per line,
//!   then flushes.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::CodecError;

use super::decode::{ByteReader, Decode};
use super::encode::Encode;

/// Strips a trailing `\n` (and a preceding `\r`, if any) in place.
fn trim_newline(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Reads one line; `Ok(None)` at EOF.
async fn next_line(reader: &mut BufReader<ByteReader>) -> Result<Option<String>, CodecError> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None),
        Ok(_) => {
            trim_newline(&mut line);
            Ok(Some(line))
        }
        Err(e) => Err(CodecError::Io(e)),
    }
}

/// Decoder yielding raw lines as `String`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineDecoder;

impl Decode for LineDecoder {
    type Item = String;

    fn records(&self, reader: ByteReader) -> BoxStream<'static, Result<String, CodecError>> {
        // State is None after an io error, which ends the stream.
        stream::unfold(Some(BufReader::new(reader)), |state| async move {
            let mut r = state?;
            match next_line(&mut r).await {
                Ok(None) => None,
                Ok(Some(line)) => Some((Ok(line), Some(r))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}

/// Decoder parsing each line into `T` via [`FromStr`].
///
/// A line that fails to parse yields a per-record `Malformed` error; the
/// stream keeps going, so one bad record never blocks the ones behind it.
#[derive(Debug)]
pub struct ParseLineDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParseLineDecoder<T> {
    /// Creates a new parsing decoder.
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for ParseLineDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Decode for ParseLineDecoder<T>
where
    T: FromStr + Send + 'static,
    T::Err: fmt::Display,
{
    type Item = T;

    fn records(&self, reader: ByteReader) -> BoxStream<'static, Result<T, CodecError>> {
        stream::unfold(Some(BufReader::new(reader)), |state| async move {
            let mut r = state?;
            match next_line(&mut r).await {
                Ok(None) => None,
                Ok(Some(line)) => {
                    let item = line.parse::<T>().map_err(|e| CodecError::Malformed {
                        reason: format!("{line:?}: {e}"),
                    });
                    // Parse failures keep the reader; only io errors end it.
                    Some((item, Some(r)))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}

/// Encoder writing each input via `Display`, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineEncoder;

#[async_trait]
impl<T> Encode<T> for LineEncoder
where
    T: fmt::Display + Send + Sync + 'static,
{
    async fn write_batch(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        batch: &[T],
    ) -> Result<(), CodecError> {
        for item in batch {
            writer.write_all(item.to_string().as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }
}
