//! Server-Sent Events (SSE) decoding for streaming responses.
//!
//! Both HTTP providers stream `data:` lines.  This module turns a raw byte
//! stream into a stream of `data` payloads, one per line, leaving JSON
//! decoding to the caller.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};

/// Process a stream of bytes into a stream of SSE `data` payloads.
///
/// Bytes are buffered until a full line is available so that multi-byte
/// UTF-8 sequences split across chunks decode correctly.  Lines other than
/// `data:` lines (comments, `event:` lines, blank separators) are skipped.
pub(crate) fn data_payloads<S>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (byte_stream, buffer, false),
        move |(mut stream, mut buffer, mut exhausted)| async move {
            loop {
                // First check if we have a complete line in the buffer
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match extract_data(&line) {
                        Ok(Some(data)) => return Some((Ok(data), (stream, buffer, exhausted))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (stream, buffer, exhausted))),
                    }
                }

                if exhausted {
                    // A final line without a trailing newline
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buffer);
                    match extract_data(&line) {
                        Ok(Some(data)) => return Some((Ok(data), (stream, buffer, exhausted))),
                        Ok(None) => return None,
                        Err(e) => return Some((Err(e), (stream, buffer, exhausted))),
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (stream, buffer, exhausted))),
                    None => exhausted = true,
                }
            }
        },
    )
}

/// Extract the payload of a single SSE line, if it is a `data:` line.
fn extract_data(line: &[u8]) -> Result<Option<String>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e))))?;
    let line = line.trim_end_matches(['\r', '\n']);
    Ok(line
        .strip_prefix("data:")
        .map(|data| data.trim_start().to_string()))
}
