//! Decoding of `data:` frames from an OpenAI-compatible chat-completion stream.
//!
//! Each meaningful line of the response body is either `data: <json>` or the literal
//! `data: [DONE]`.  [`decode_line`] classifies a single line; [`decode_frames`] lifts that over a
//! stream of lines and ends the stream at the sentinel.
//!
//! Decoding is per frame: a line that is not valid JSON becomes a [`Frame::Malformed`] value and
//! the stream carries on with the next line.  JSON that parses but lacks `choices` or `delta` is
//! an ordinary [`StreamEvent`] with no text.

use std::fmt;

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::Usage;
use crate::error::Result;
use crate::observability::{STREAM_FRAMES, STREAM_LINES};

/// Prefix carried by every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks a clean end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/////////////////////////////////////////// Events //////////////////////////////////////////

/// The two text channels a reasoning model streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Intermediate thinking, shown apart from the answer.
    Reasoning,
    /// The final answer.
    Answer,
}

/// One decoded payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    /// `choices[0].delta.reasoning_content`, when it is a string.
    pub reasoning: Option<String>,
    /// `choices[0].delta.content`, when it is a string.
    pub content: Option<String>,
    /// `choices[0].finish_reason`, when the endpoint reports one.
    pub finish_reason: Option<String>,
    /// Top-level `usage`, when present and well formed.
    pub usage: Option<Usage>,
}

impl StreamEvent {
    /// An event carrying only reasoning text.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Self::default()
        }
    }

    /// An event carrying only answer text.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// The text fragments of this event in the order they must be applied: reasoning first.
    pub fn fragments(&self) -> impl Iterator<Item = (Channel, &str)> {
        self.reasoning
            .as_deref()
            .map(|text| (Channel::Reasoning, text))
            .into_iter()
            .chain(self.content.as_deref().map(|text| (Channel::Answer, text)))
    }

    /// True when the event contributes no text.
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_none() && self.content.is_none()
    }
}

/// A payload line that is not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedFrame {
    /// The payload as received, prefix removed.
    pub raw: String,
    /// Why it failed to parse.
    pub error: String,
}

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed frame ({}): {}", self.error, self.raw)
    }
}

/// The classification of one non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A payload that parsed.
    Event(StreamEvent),
    /// A payload that did not parse.
    Malformed(MalformedFrame),
    /// The `[DONE]` sentinel.  Always the last item of [`decode_frames`].
    Done,
}

/////////////////////////////////////////// Lines ///////////////////////////////////////////

/// Classify a single line of the response body.
///
/// Returns `None` for lines that carry nothing: blank lines and SSE comments (`: keep-alive`).
pub fn decode_line(line: &str) -> Option<Frame> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = strip_data_prefix(line);
    if payload.trim() == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    Some(match decode_payload(payload) {
        Ok(event) => Frame::Event(event),
        Err(malformed) => Frame::Malformed(malformed),
    })
}

/// Parse the JSON payload of one frame.
///
/// Missing or oddly typed `choices`, `delta`, or fragment fields yield an empty event rather
/// than an error.
pub fn decode_payload(payload: &str) -> std::result::Result<StreamEvent, MalformedFrame> {
    let value: Value = serde_json::from_str(payload).map_err(|err| MalformedFrame {
        raw: payload.to_string(),
        error: err.to_string(),
    })?;
    let choice = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first());
    let delta = choice.and_then(|choice| choice.get("delta"));
    let fragment = |key: &str| {
        delta
            .and_then(|delta| delta.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Ok(StreamEvent {
        reasoning: fragment("reasoning_content"),
        content: fragment("content"),
        finish_reason: choice
            .and_then(|choice| choice.get("finish_reason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        usage: value
            .get("usage")
            .filter(|usage| usage.is_object())
            .and_then(|usage| serde_json::from_value(usage.clone()).ok()),
    })
}

fn strip_data_prefix(line: &str) -> &str {
    line.strip_prefix(DATA_PREFIX)
        .or_else(|| line.strip_prefix("data:"))
        .unwrap_or(line)
}

/////////////////////////////////////////// Stream //////////////////////////////////////////

/// Decode a stream of raw lines into a stream of frames.
///
/// The output ends right after [`Frame::Done`], when the input is exhausted, or right after the
/// first `Err` from the input.  Errors from the input are transport failures and are passed
/// through untouched; malformed frames are yielded as values for the accumulator to report.
pub fn decode_frames<S>(lines: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    STREAM_LINES.click();
                    let Some(frame) = decode_line(&line) else {
                        continue;
                    };
                    STREAM_FRAMES.click();
                    if matches!(frame, Frame::Done) {
                        return Some((Ok(frame), None));
                    }
                    return Some((Ok(frame), Some(lines)));
                }
                Some(Err(err)) => return Some((Err(err), None)),
                None => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   "), None);
        assert_eq!(decode_line("\r"), None);
        assert_eq!(decode_line(": keep-alive"), None);
    }

    #[test]
    fn done_sentinel() {
        assert_eq!(decode_line("data: [DONE]"), Some(Frame::Done));
        assert_eq!(decode_line("data: [DONE]\r"), Some(Frame::Done));
        assert_eq!(decode_line("[DONE]"), Some(Frame::Done));
    }

    #[test]
    fn reasoning_fragment() {
        let frame = decode_line(r#"data: {"choices":[{"delta":{"reasoning_content":"think"}}]}"#);
        assert_eq!(frame, Some(Frame::Event(StreamEvent::reasoning("think"))));
    }

    #[test]
    fn content_fragment_without_space_after_prefix() {
        let frame = decode_line(r#"data:{"choices":[{"delta":{"content":"hi"}}]}"#);
        assert_eq!(frame, Some(Frame::Event(StreamEvent::content("hi"))));
    }

    #[test]
    fn both_fragments_reasoning_first() {
        let event = decode_payload(
            r#"{"choices":[{"delta":{"content":"answer","reasoning_content":"thought"}}]}"#,
        )
        .unwrap();
        let fragments: Vec<_> = event.fragments().collect();
        assert_eq!(
            fragments,
            vec![(Channel::Reasoning, "thought"), (Channel::Answer, "answer")]
        );
    }

    #[test]
    fn null_fragments_are_absent() {
        let event = decode_payload(
            r#"{"choices":[{"delta":{"content":null,"reasoning_content":null,"role":"assistant"}}]}"#,
        )
        .unwrap();
        assert!(event.is_empty());
    }

    #[test]
    fn unexpected_shapes_are_empty_events() {
        for payload in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":null}"#,
            r#"{"choices":[{"index":0}]}"#,
            r#"{"choices":[{"delta":"text"}]}"#,
            r#"{"choices":[{"delta":{"content":42}}]}"#,
            r#"[1, 2, 3]"#,
            r#"17"#,
        ] {
            let event = decode_payload(payload).unwrap();
            assert!(event.is_empty(), "{payload} should carry no text");
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        let frame = decode_line(r#"data: {"choices":[{"delta":{"content":"hi"#).unwrap();
        match frame {
            Frame::Malformed(malformed) => {
                assert_eq!(malformed.raw, r#"{"choices":[{"delta":{"content":"hi"#);
                assert!(!malformed.error.is_empty());
            }
            other => panic!("expected a malformed frame, got {other:?}"),
        }
    }

    #[test]
    fn only_the_leading_prefix_is_removed() {
        let event =
            decode_payload(r#"{"choices":[{"delta":{"content":"data: not a prefix"}}]}"#).unwrap();
        assert_eq!(event.content.as_deref(), Some("data: not a prefix"));
        let frame =
            decode_line(r#"data: {"choices":[{"delta":{"content":"data: inner"}}]}"#).unwrap();
        assert_eq!(frame, Frame::Event(StreamEvent::content("data: inner")));
    }

    #[test]
    fn finish_reason_and_usage() {
        let event = decode_payload(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":9,"completion_tokens":3,"total_tokens":12}}"#,
        )
        .unwrap();
        assert_eq!(event.finish_reason.as_deref(), Some("stop"));
        assert_eq!(event.usage, Some(Usage::new(9, 3)));
        assert!(event.is_empty());
    }

    #[test]
    fn usage_with_wrong_types_is_ignored() {
        let event = decode_payload(r#"{"choices":[],"usage":{"prompt_tokens":"many"}}"#).unwrap();
        assert_eq!(event.usage, None);
    }

    fn lines(items: Vec<Result<&str>>) -> impl Stream<Item = Result<String>> + Unpin {
        stream::iter(
            items
                .into_iter()
                .map(|item| item.map(str::to_string))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn stream_stops_at_done() {
        let frames: Vec<_> = decode_frames(lines(vec![
            Ok(r#"data: {"choices":[{"delta":{"content":"a"}}]}"#),
            Ok(""),
            Ok("data: [DONE]"),
            Ok(r#"data: {"choices":[{"delta":{"content":"never"}}]}"#),
        ]))
        .collect()
        .await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            &frames[0],
            Ok(Frame::Event(event)) if event.content.as_deref() == Some("a")
        ));
        assert!(matches!(frames[1], Ok(Frame::Done)));
    }

    #[tokio::test]
    async fn stream_continues_past_malformed_frames() {
        let frames: Vec<_> = decode_frames(lines(vec![
            Ok("data: {oops"),
            Ok(r#"data: {"choices":[{"delta":{"content":"b"}}]}"#),
        ]))
        .collect()
        .await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Ok(Frame::Malformed(_))));
        assert!(matches!(frames[1], Ok(Frame::Event(_))));
    }

    #[tokio::test]
    async fn stream_ends_after_transport_error() {
        let frames: Vec<_> = decode_frames(lines(vec![
            Ok(r#"data: {"choices":[{"delta":{"content":"a"}}]}"#),
            Err(Error::transport("connection reset", None)),
            Ok(r#"data: {"choices":[{"delta":{"content":"b"}}]}"#),
        ]))
        .collect()
        .await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[1], Err(err) if err.is_transport()));
    }

    #[tokio::test]
    async fn stream_without_sentinel_ends_with_input() {
        let frames: Vec<_> = decode_frames(lines(vec![Ok(
            r#"data: {"choices":[{"delta":{"content":"a"}}]}"#,
        )]))
        .collect()
        .await;
        assert_eq!(frames.len(), 1);
    }
}
