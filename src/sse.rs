//! Line framing for server-sent event bodies.
//!
//! HTTP chunks do not respect line boundaries, and a multi-byte UTF-8 character may straddle two
//! chunks.  [`lines`] buffers raw bytes and only decodes complete lines.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::Error;
use crate::error::Result;
use crate::observability::STREAM_BYTES;

/// Split a chunked byte stream into text lines.
///
/// Line terminators (`\n` or `\r\n`) are removed.  A final line without a terminator is yielded
/// when the body ends.  Errors from the byte stream end the line stream after being yielded.
pub fn lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<Error>,
{
    let buffer: Vec<u8> = Vec::new();
    stream::unfold(
        Some((byte_stream, buffer)),
        |state| async move {
            let (mut byte_stream, mut buffer) = state?;
            loop {
                // First check if we have a complete line in the buffer
                if let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let rest = buffer.split_off(newline + 1);
                    let line = std::mem::replace(&mut buffer, rest);
                    let item = decode(line);
                    return Some((item, Some((byte_stream, buffer))));
                }

                // Read more data
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(err)) => return Some((Err(err.into()), None)),
                    None => {
                        // End of stream
                        if buffer.is_empty() {
                            return None;
                        }
                        let line = std::mem::take(&mut buffer);
                        return Some((decode(line), None));
                    }
                }
            }
        },
    )
}

// Invalid UTF-8 damages one line, not the stream; it is replaced rather than raised.
fn decode(mut line: Vec<u8>) -> Result<String> {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(line) => Ok(line),
        Err(err) => {
            tracing::warn!(error = %err.utf8_error(), "invalid UTF-8 in stream line");
            Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
        }
    }
}
