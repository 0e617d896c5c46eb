//! Output rendering for streamed responses.
//!
//! The accumulator drives a [`Renderer`] with one callback per section header and per text
//! fragment, in arrival order.  [`PlainTextRenderer`] writes to the terminal;
//! [`CapturingRenderer`] records the callbacks for programmatic consumers.

use std::io::{self, Stdout, Write};

/// ANSI escape code for dim text (used for reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for bold text (used for section headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for yellow text (used for decode warnings).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering streamed output.
///
/// Header callbacks fire at most once per response and always before the first chunk of their
/// channel.  Chunk callbacks fire once per fragment.
pub trait Renderer: Send {
    /// The first reasoning fragment of the response is about to be printed.
    fn on_reasoning_start(&mut self);

    /// Print a chunk of reasoning text.
    fn on_reasoning_chunk(&mut self, text: &str);

    /// The first answer fragment of the response is about to be printed.
    fn on_answer_start(&mut self);

    /// Print a chunk of answer text.
    fn on_answer_chunk(&mut self, text: &str);

    /// The response produced text and has ended.
    fn on_section_end(&mut self);

    /// A frame could not be decoded and was skipped.
    fn on_decode_error(&mut self, raw: &str, error: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    Reasoning,
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    show_reasoning: bool,
    style: Style,
    printed_reasoning: bool,
    at_line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled and reasoning shown.
    pub fn new() -> Self {
        Self::with_options(true, true)
    }

    /// Creates a new PlainTextRenderer with specified color and reasoning settings.
    pub fn with_options(use_color: bool, show_reasoning: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            show_reasoning,
            style: Style::Plain,
            printed_reasoning: false,
            at_line_start: true,
        }
    }

    /// Show or hide reasoning text for subsequent responses.
    pub fn set_show_reasoning(&mut self, show: bool) {
        self.show_reasoning = show;
    }

    /// Returns true if reasoning text is printed.
    pub fn shows_reasoning(&self) -> bool {
        self.show_reasoning
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.stdout.write_all(text.as_bytes());
        let _ = self.stdout.flush();
        self.at_line_start = text.ends_with('\n');
    }

    fn enter_reasoning_style(&mut self) {
        if self.use_color && self.style != Style::Reasoning {
            self.write(&format!("{ANSI_DIM}{ANSI_ITALIC}"));
            self.style = Style::Reasoning;
        }
    }

    fn reset_style(&mut self) {
        if self.style != Style::Plain {
            if self.use_color {
                self.write(ANSI_RESET);
            }
            self.style = Style::Plain;
        }
    }

    fn header(&mut self, label: &str) {
        self.reset_style();
        if !self.at_line_start {
            self.write("\n");
        }
        if self.use_color {
            self.write(&format!("{ANSI_BOLD}{label}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("[{label}]\n"));
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn on_reasoning_start(&mut self) {
        if self.show_reasoning {
            self.header("reasoning");
        }
    }

    fn on_reasoning_chunk(&mut self, text: &str) {
        if !self.show_reasoning {
            return;
        }
        self.enter_reasoning_style();
        self.write(text);
        self.printed_reasoning = true;
    }

    fn on_answer_start(&mut self) {
        if self.printed_reasoning {
            self.reset_style();
            self.write("\n");
        }
        self.header("answer");
    }

    fn on_answer_chunk(&mut self, text: &str) {
        self.reset_style();
        self.write(text);
    }

    fn on_section_end(&mut self) {
        self.reset_style();
        if !self.at_line_start {
            self.write("\n");
        }
        self.printed_reasoning = false;
    }

    fn on_decode_error(&mut self, raw: &str, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_YELLOW}[skipped malformed frame: {error}]{ANSI_RESET} {raw}");
        } else {
            eprintln!("[skipped malformed frame: {error}] {raw}");
        }
    }

    fn print_error(&mut self, error: &str) {
        self.reset_style();
        eprintln!("\nError: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.reset_style();
        println!("{info}");
        self.at_line_start = true;
    }

    fn print_interrupted(&mut self) {
        self.reset_style();
        self.write("\n[interrupted]\n");
    }
}

/// One recorded [`Renderer`] callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// `on_reasoning_start`
    ReasoningStart,
    /// `on_reasoning_chunk`
    ReasoningChunk(String),
    /// `on_answer_start`
    AnswerStart,
    /// `on_answer_chunk`
    AnswerChunk(String),
    /// `on_section_end`
    SectionEnd,
    /// `on_decode_error`
    DecodeError {
        /// The offending payload.
        raw: String,
        /// The parse error.
        error: String,
    },
    /// `print_error`
    Error(String),
    /// `print_info`
    Info(String),
    /// `print_interrupted`
    Interrupted,
}

/// A renderer that records every callback instead of printing.
#[derive(Debug, Clone, Default)]
pub struct CapturingRenderer {
    /// Callbacks in the order they were made.
    pub events: Vec<RenderEvent>,
}

impl CapturingRenderer {
    /// Creates an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded callbacks equal to `event`.
    pub fn count(&self, event: &RenderEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    /// Number of recorded decode errors.
    pub fn decode_errors(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, RenderEvent::DecodeError { .. }))
            .count()
    }

    /// Concatenation of the recorded reasoning chunks.
    pub fn reasoning_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::ReasoningChunk(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenation of the recorded answer chunks.
    pub fn answer_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::AnswerChunk(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for CapturingRenderer {
    fn on_reasoning_start(&mut self) {
        self.events.push(RenderEvent::ReasoningStart);
    }

    fn on_reasoning_chunk(&mut self, text: &str) {
        self.events.push(RenderEvent::ReasoningChunk(text.to_string()));
    }

    fn on_answer_start(&mut self) {
        self.events.push(RenderEvent::AnswerStart);
    }

    fn on_answer_chunk(&mut self, text: &str) {
        self.events.push(RenderEvent::AnswerChunk(text.to_string()));
    }

    fn on_section_end(&mut self) {
        self.events.push(RenderEvent::SectionEnd);
    }

    fn on_decode_error(&mut self, raw: &str, error: &str) {
        self.events.push(RenderEvent::DecodeError {
            raw: raw.to_string(),
            error: error.to_string(),
        });
    }

    fn print_error(&mut self, error: &str) {
        self.events.push(RenderEvent::Error(error.to_string()));
    }

    fn print_info(&mut self, info: &str) {
        self.events.push(RenderEvent::Info(info.to_string()));
    }

    fn print_interrupted(&mut self) {
        self.events.push(RenderEvent::Interrupted);
    }
}
