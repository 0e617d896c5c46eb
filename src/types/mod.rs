// Public modules
pub mod chat_request;
pub mod message;
pub mod usage;

// Re-exports
pub use chat_request::{ChatRequest, GenerationParams, ResponseFormat};
pub use message::{Message, Role};
pub use usage::Usage;
