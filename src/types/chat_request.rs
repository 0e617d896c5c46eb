use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Output format hint sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseFormat {
    /// Format name; the endpoint understands `text` and `json_object`.
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// Plain text output.
    pub fn text() -> Self {
        Self {
            format_type: "text".to_string(),
        }
    }
}

/// Sampling and length controls forwarded verbatim to the endpoint.
///
/// The decoder never looks at these; they only shape the outgoing body.  Defaults match what the
/// SiliconFlow reasoning models are tuned for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationParams {
    /// Maximum number of answer tokens.
    pub max_tokens: u32,

    /// Maximum number of reasoning tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// Minimum probability relative to the most likely token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling mass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Penalty applied to tokens in proportion to how often they already appeared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Penalty applied once to any token that already appeared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Number of completions.
    pub n: u32,

    /// Stop sequences.
    pub stop: Vec<String>,

    /// Output format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl GenerationParams {
    /// Parameters that leave every optional knob at the endpoint's default.
    pub fn minimal(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            thinking_budget: None,
            min_p: None,
            temperature: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            n: 1,
            stop: Vec::new(),
            response_format: None,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            thinking_budget: Some(4096),
            min_p: Some(0.05),
            temperature: Some(0.7),
            top_p: Some(0.7),
            top_k: Some(50),
            frequency_penalty: Some(0.5),
            presence_penalty: None,
            n: 1,
            stop: Vec::new(),
            response_format: Some(ResponseFormat::text()),
        }
    }
}

/// Body of a streaming `POST /chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Model identifier, e.g. `deepseek-ai/DeepSeek-R1-0528-Qwen3-8B`.
    pub model: String,

    /// The conversation so far, system message first.
    pub messages: Vec<Message>,

    /// Always true; the decoder only understands streamed responses.
    pub stream: bool,

    /// Generation controls, flattened into the top-level object.
    #[serde(flatten)]
    pub generation: GenerationParams,
}

impl ChatRequest {
    /// Create a streaming request.
    pub fn new(
        model: impl Into<String>,
        messages: Vec<Message>,
        generation: GenerationParams,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn default_request_body() {
        let request = ChatRequest::new(
            "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B",
            vec![
                Message::system("You are a professional legal assistant"),
                Message::user("When was the civil code promulgated?"),
            ],
            GenerationParams::default(),
        );
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B",
                "messages": [
                    {"role": "system", "content": "You are a professional legal assistant"},
                    {"role": "user", "content": "When was the civil code promulgated?"}
                ],
                "stream": true,
                "max_tokens": 512,
                "thinking_budget": 4096,
                "min_p": 0.05f32,
                "temperature": 0.7f32,
                "top_p": 0.7f32,
                "top_k": 50,
                "frequency_penalty": 0.5f32,
                "n": 1,
                "stop": [],
                "response_format": {"type": "text"}
            })
        );
    }

    #[test]
    fn minimal_request_omits_unset_knobs() {
        let request =
            ChatRequest::new("m", vec![Message::user("hi")], GenerationParams::minimal(64));
        let value = to_value(&request).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["max_tokens"], json!(64));
        assert!(!object.contains_key("temperature"));
        assert!(!object.contains_key("thinking_budget"));
        assert!(!object.contains_key("response_format"));
    }

    #[test]
    fn generation_params_fill_defaults_from_partial_yaml() {
        let params: GenerationParams =
            serde_yaml::from_str("max_tokens: 1024\ntemperature: 0.2\n").unwrap();
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.temperature, Some(0.2));
        assert_eq!(params.top_k, Some(50));
    }
}
