// Public modules
pub mod accumulator;
pub mod cancel;
pub mod client;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod frame;
pub mod render;
pub mod session;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use accumulator::{
    Completion, SectionState, StreamAccumulator, StreamOutcome, accumulate, accumulate_lines,
};
pub use cancel::Cancellation;
pub use client::{ChatClient, LineStream, Transport};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use frame::{Channel, Frame, MalformedFrame, StreamEvent, decode_frames, decode_line};
pub use observability::register_biometrics;
pub use render::{CapturingRenderer, PlainTextRenderer, RenderEvent, Renderer};
pub use session::{ChatSession, SessionStats};
pub use types::*;
