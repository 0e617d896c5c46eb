//! Configuration for the chat application.
//!
//! Values come from three layers, lowest precedence first: built-in defaults, an optional YAML
//! file (`--config`), and command-line flags parsed with `arrrg`.

use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::types::GenerationParams;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B";

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional programming assistant. You help \
     write and improve code and explain your answers in plain language.";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Command-line arguments for the thinkstream-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML file to load configuration from.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: deepseek-ai/DeepSeek-R1-0528-Qwen3-8B)", "MODEL")]
    pub model: Option<String>,

    /// System prompt fixed at the start of the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arrrg(optional, "API base URL (default: https://api.siliconflow.cn/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max answer tokens per response (default: 512)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Top-k sampling limit.
    #[arrrg(optional, "Top-k sampling limit (default: 50)", "K")]
    pub top_k: Option<u32>,

    /// Hide reasoning text while streaming.
    #[arrrg(flag, "Do not print reasoning text")]
    pub hide_reasoning: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// Deserializable from YAML; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Bearer token.  `None` defers to the `THINKSTREAM_API_KEY` environment variable.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// The model to use for generating responses.
    pub model: String,

    /// System prompt placed at index 0 of every conversation.
    pub system_prompt: String,

    /// Sampling and length controls.
    pub generation: GenerationParams,

    /// Whether reasoning text is printed.
    pub show_reasoning: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Connect timeout in seconds.
    pub timeout_secs: u64,

    /// Keep interrupted or failed answers in the history.
    pub commit_partial: bool,

    /// Text sent as the start of the assistant's reply; the model continues from it.
    pub assistant_prefill: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            generation: GenerationParams::default(),
            show_reasoning: true,
            use_color: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            commit_partial: false,
            assistant_prefill: None,
        }
    }

    /// Loads a configuration from a YAML file.  Missing fields take their defaults.
    ///
    /// A file that cannot be read or parsed is an [`Error::Config`] naming the path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::config(
                format!("cannot read {}: {err}", path.display()),
                Some(Box::new(err)),
            )
        })?;
        Self::from_yaml(&content).map_err(|err| {
            Error::config(
                format!("invalid config {}: {err}", path.display()),
                Some(Box::new(err)),
            )
        })
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Builds a configuration from command-line arguments, loading `--config` if given.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let base = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::new(),
        };
        let config = base.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields with the flags that were given.
    pub fn apply_args(mut self, args: ChatArgs) -> Self {
        if let Some(model) = args.model {
            self.model = model;
        }
        if let Some(system) = args.system {
            self.system_prompt = system;
        }
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if let Some(max_tokens) = args.max_tokens {
            self.generation.max_tokens = max_tokens;
        }
        if let Some(top_k) = args.top_k {
            self.generation.top_k = Some(top_k);
        }
        if args.hide_reasoning {
            self.show_reasoning = false;
        }
        if args.no_color {
            self.use_color = false;
        }
        self
    }

    /// Checks values the endpoint would reject or that cannot be used locally.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(Error::validation(
                "max_tokens must be positive",
                Some("max_tokens".to_string()),
            ));
        }
        check_range("temperature", self.generation.temperature, 0.0, 2.0)?;
        check_range("top_p", self.generation.top_p, 0.0, 1.0)?;
        check_range("min_p", self.generation.min_p, 0.0, 1.0)?;
        check_range("frequency_penalty", self.generation.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.generation.presence_penalty, -2.0, 2.0)?;
        Ok(())
    }

    /// The connect timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the generation parameters.
    pub fn with_generation(mut self, generation: GenerationParams) -> Self {
        self.generation = generation;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets whether reasoning text is printed.
    pub fn with_show_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = show;
        self
    }

    /// Sets whether interrupted or failed answers are kept in the history.
    pub fn with_commit_partial(mut self, commit: bool) -> Self {
        self.commit_partial = commit;
        self
    }

    /// Sets the assistant prefill sent after each user message.
    pub fn with_assistant_prefill(mut self, prefill: impl Into<String>) -> Self {
        self.assistant_prefill = Some(prefill.into());
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(name: &str, value: Option<f32>, min: f32, max: f32) -> Result<()> {
    match value {
        Some(v) if !(v.is_finite() && v >= min && v <= max) => Err(Error::validation(
            format!("{name} must be between {min} and {max}, got {v}"),
            Some(name.to_string()),
        )),
        _ => Ok(()),
    }
}
