//! Accumulates decoded frames into reasoning and answer text while driving a [`Renderer`].
//!
//! Section headers are governed by [`SectionState`]: leaving `Idle` is the only way to emit the
//! first header, and `AnswerOpen { reasoning_seen: false }` is the only state from which a late
//! reasoning header can still be emitted.  Both headers therefore fire at most once.

use std::time::Instant;

use futures::{Stream, StreamExt};

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::frame::{Channel, Frame, MalformedFrame, StreamEvent, decode_line};
use crate::observability::{
    STREAM_DURATION, STREAM_FIRST_FRAGMENT, STREAM_FRAMES, STREAM_INTERRUPTED, STREAM_LINES,
    STREAM_MALFORMED_FRAMES, STREAM_TRANSPORT_FAILURES,
};
use crate::{Renderer, Usage};

/// Which section headers have been emitted for the current response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// No text yet.
    Idle,
    /// Reasoning text has started; no answer text yet.
    ReasoningOpen,
    /// Answer text has started.
    AnswerOpen {
        /// Whether the reasoning header has been emitted.
        reasoning_seen: bool,
    },
    /// The stream ended.
    Closed,
}

/// How a response stream ended.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The `[DONE]` sentinel arrived.
    Done,
    /// The body ended without a sentinel.
    EndOfStream,
    /// The user cancelled while waiting for the next line.
    Interrupted,
    /// The body failed mid-stream.
    TransportFailure(Error),
}

impl Completion {
    /// True for the two normal endings.
    pub fn is_clean(&self) -> bool {
        matches!(self, Completion::Done | Completion::EndOfStream)
    }
}

/// The final text of one response together with how it ended.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Concatenation of every reasoning fragment.
    pub reasoning: String,
    /// Concatenation of every answer fragment.
    pub answer: String,
    /// How the stream ended.
    pub completion: Completion,
    /// Frames skipped because they did not parse.
    pub decode_errors: usize,
    /// The last `usage` object seen, if any.
    pub usage: Option<Usage>,
    /// The last `finish_reason` seen, if any.
    pub finish_reason: Option<String>,
}

impl StreamOutcome {
    /// Returns the outcome for clean completions and the failure otherwise.
    pub fn into_result(self) -> Result<StreamOutcome> {
        match &self.completion {
            Completion::Done | Completion::EndOfStream => Ok(self),
            Completion::Interrupted => Err(Error::interrupted("response stream cancelled")),
            Completion::TransportFailure(err) => Err(err.clone()),
        }
    }
}

/// Mutable state for one in-flight response.
#[derive(Debug)]
pub struct StreamAccumulator {
    reasoning: String,
    answer: String,
    state: SectionState,
    decode_errors: usize,
    usage: Option<Usage>,
    finish_reason: Option<String>,
    started: Instant,
    first_fragment: bool,
}

impl StreamAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self {
            reasoning: String::new(),
            answer: String::new(),
            state: SectionState::Idle,
            decode_errors: 0,
            usage: None,
            finish_reason: None,
            started: Instant::now(),
            first_fragment: false,
        }
    }

    /// The current section state.
    pub fn state(&self) -> SectionState {
        self.state
    }

    /// Reasoning text accumulated so far.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Answer text accumulated so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Number of frames skipped so far.
    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }

    /// Apply one decoded event: every fragment in order, reasoning first.
    pub fn apply(&mut self, event: &StreamEvent, renderer: &mut dyn Renderer) {
        for (channel, text) in event.fragments() {
            self.push(channel, text, renderer);
        }
        if event.usage.is_some() {
            self.usage = event.usage;
        }
        if event.finish_reason.is_some() {
            self.finish_reason.clone_from(&event.finish_reason);
        }
    }

    /// Append one fragment to its channel, emitting the channel header first if needed.
    ///
    /// Empty fragments are ignored.  Fragments arriving after the stream closed are ignored.
    pub fn push(&mut self, channel: Channel, text: &str, renderer: &mut dyn Renderer) {
        if text.is_empty() || self.state == SectionState::Closed {
            return;
        }
        if !self.first_fragment {
            self.first_fragment = true;
            STREAM_FIRST_FRAGMENT.add(self.started.elapsed().as_secs_f64());
        }
        match channel {
            Channel::Reasoning => {
                self.state = match self.state {
                    SectionState::Idle => {
                        renderer.on_reasoning_start();
                        SectionState::ReasoningOpen
                    }
                    SectionState::AnswerOpen {
                        reasoning_seen: false,
                    } => {
                        renderer.on_reasoning_start();
                        SectionState::AnswerOpen {
                            reasoning_seen: true,
                        }
                    }
                    other => other,
                };
                self.reasoning.push_str(text);
                renderer.on_reasoning_chunk(text);
            }
            Channel::Answer => {
                self.state = match self.state {
                    SectionState::Idle => {
                        renderer.on_answer_start();
                        SectionState::AnswerOpen {
                            reasoning_seen: false,
                        }
                    }
                    SectionState::ReasoningOpen => {
                        renderer.on_answer_start();
                        SectionState::AnswerOpen {
                            reasoning_seen: true,
                        }
                    }
                    other => other,
                };
                self.answer.push_str(text);
                renderer.on_answer_chunk(text);
            }
        }
    }

    /// Report a frame that did not parse.  Accumulation continues.
    pub fn malformed(&mut self, frame: &MalformedFrame, renderer: &mut dyn Renderer) {
        self.decode_errors += 1;
        STREAM_MALFORMED_FRAMES.click();
        tracing::debug!(raw = %frame.raw, error = %frame.error, "skipping malformed frame");
        renderer.on_decode_error(&frame.raw, &frame.error);
    }

    /// Close the stream and hand back the accumulated text.
    ///
    /// `on_section_end` fires if any text was produced.
    pub fn finish(
        mut self,
        completion: Completion,
        renderer: &mut dyn Renderer,
    ) -> StreamOutcome {
        if !matches!(self.state, SectionState::Idle | SectionState::Closed) {
            renderer.on_section_end();
        }
        self.state = SectionState::Closed;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
        match &completion {
            Completion::Interrupted => STREAM_INTERRUPTED.click(),
            Completion::TransportFailure(err) => {
                STREAM_TRANSPORT_FAILURES.click();
                tracing::warn!(error = %err, "response stream failed");
            }
            Completion::Done | Completion::EndOfStream => {}
        }
        StreamOutcome {
            reasoning: self.reasoning,
            answer: self.answer,
            completion,
            decode_errors: self.decode_errors,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain a frame stream into a [`StreamOutcome`].
///
/// Each wait for the next frame races against `cancel`.  The returned outcome always carries
/// whatever text arrived, whichever way the stream ended.
///
/// ```
/// # use futures::stream;
/// # use thinkstream::{Cancellation, CapturingRenderer, Completion, accumulate, decode_frames};
/// # tokio_test::block_on(async {
/// let lines: Vec<thinkstream::Result<String>> = vec![
///     Ok(r#"data: {"choices":[{"delta":{"reasoning_content":"think"}}]}"#.to_string()),
///     Ok(r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#.to_string()),
///     Ok("data: [DONE]".to_string()),
/// ];
/// let mut renderer = CapturingRenderer::new();
/// let outcome = accumulate(
///     decode_frames(stream::iter(lines)),
///     &mut renderer,
///     &Cancellation::new(),
/// )
/// .await;
/// assert_eq!((outcome.reasoning.as_str(), outcome.answer.as_str()), ("think", "hi"));
/// assert!(matches!(outcome.completion, Completion::Done));
/// # });
/// ```
pub async fn accumulate<S>(
    frames: S,
    renderer: &mut dyn Renderer,
    cancel: &Cancellation,
) -> StreamOutcome
where
    S: Stream<Item = Result<Frame>>,
{
    futures::pin_mut!(frames);
    let mut acc = StreamAccumulator::new();
    let completion = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Completion::Interrupted,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(Frame::Event(event))) => acc.apply(&event, renderer),
            Some(Ok(Frame::Malformed(frame))) => acc.malformed(&frame, renderer),
            Some(Ok(Frame::Done)) => break Completion::Done,
            Some(Err(err)) => break Completion::TransportFailure(err),
            None => break Completion::EndOfStream,
        }
    };
    acc.finish(completion, renderer)
}

/// Decode and accumulate an already captured body, one line at a time.
pub fn accumulate_lines<'a, I>(lines: I, renderer: &mut dyn Renderer) -> StreamOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut acc = StreamAccumulator::new();
    for line in lines {
        STREAM_LINES.click();
        let Some(frame) = decode_line(line) else {
            continue;
        };
        STREAM_FRAMES.click();
        match frame {
            Frame::Event(event) => acc.apply(&event, renderer),
            Frame::Malformed(frame) => acc.malformed(&frame, renderer),
            Frame::Done => return acc.finish(Completion::Done, renderer),
        }
    }
    acc.finish(Completion::EndOfStream, renderer)
}
