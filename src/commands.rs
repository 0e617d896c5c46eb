//! Slash commands understood by the interactive chat loop.
//!
//! Input starting with `/` controls the session and is never sent to the endpoint.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Reset the conversation to the system message.
    Clear,

    /// Change the model.
    Model(String),

    /// Set the maximum answer tokens per response.
    MaxTokens(u32),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Leave temperature to the endpoint's default.
    ClearTemperature,

    /// Set the top-p value.
    TopP(f32),

    /// Leave top-p to the endpoint's default.
    ClearTopP,

    /// Set the top-k value.
    TopK(u32),

    /// Leave top-k to the endpoint's default.
    ClearTopK,

    /// Add a stop sequence.
    AddStopSequence(String),

    /// Remove every stop sequence.
    ClearStopSequences,

    /// Print the stop sequences.
    ListStopSequences,

    /// Start every reply with this text.
    Prefill(String),

    /// Stop prefilling replies.
    ClearPrefill,

    /// Show or hide reasoning text.
    Reasoning(bool),

    /// Print session statistics.
    Stats,

    /// Print the active configuration.
    ShowConfig,

    /// Print the command summary.
    Help,

    /// Leave the chat.
    Quit,

    /// The input looked like a command but could not be parsed.
    Invalid(String),
}

/// Parse a line of user input.
///
/// Returns `None` when the input is an ordinary message.
///
/// ```
/// # use thinkstream::commands::{parse_command, ChatCommand};
/// assert_eq!(parse_command("/reasoning off"), Some(ChatCommand::Reasoning(false)));
/// assert!(parse_command("how do I reverse a list?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let rest = input.trim().strip_prefix('/')?;

    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, Some(argument.trim())),
        None => (rest, None),
    };
    let command = command.to_lowercase();
    let argument = argument.filter(|arg| !arg.is_empty());

    let parsed = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "max_tokens" => match argument.map(str::parse::<u32>) {
            Some(Ok(n)) if n > 0 => ChatCommand::MaxTokens(n),
            Some(_) => ChatCommand::Invalid("/max_tokens expects a positive integer".to_string()),
            None => ChatCommand::Invalid("/max_tokens requires a value".to_string()),
        },
        "temperature" => parse_float(
            "/temperature",
            argument,
            0.0,
            2.0,
            ChatCommand::Temperature,
            ChatCommand::ClearTemperature,
        ),
        "top_p" => parse_float(
            "/top_p",
            argument,
            0.0,
            1.0,
            ChatCommand::TopP,
            ChatCommand::ClearTopP,
        ),
        "top_k" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearTopK,
            Some(arg) => match arg.parse::<u32>() {
                Ok(k) => ChatCommand::TopK(k),
                Err(_) => ChatCommand::Invalid("/top_k expects an integer".to_string()),
            },
            None => ChatCommand::Invalid("/top_k requires a value".to_string()),
        },
        "stop" => parse_stop(argument),
        "prefill" => match argument {
            Some(text) => ChatCommand::Prefill(text.to_string()),
            None => ChatCommand::ClearPrefill,
        },
        "reasoning" => match argument.and_then(parse_on_off) {
            Some(show) => ChatCommand::Reasoning(show),
            None => ChatCommand::Invalid("/reasoning expects 'on' or 'off'".to_string()),
        },
        "stats" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command} (try /help)")),
    };
    Some(parsed)
}

fn parse_float(
    name: &str,
    argument: Option<&str>,
    min: f32,
    max: f32,
    set: fn(f32) -> ChatCommand,
    clear: ChatCommand,
) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid(format!("{name} requires a value"));
    };
    if arg.eq_ignore_ascii_case("clear") {
        return clear;
    }
    match arg.parse::<f32>() {
        Ok(v) if v.is_finite() && (min..=max).contains(&v) => set(v),
        _ => ChatCommand::Invalid(format!("{name} expects a value between {min} and {max}")),
    }
}

fn parse_stop(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid(
            "/stop expects 'add <sequence>', 'clear', or 'list'".to_string(),
        );
    };
    let (action, sequence) = match arg.split_once(char::is_whitespace) {
        Some((action, sequence)) => (action, sequence.trim()),
        None => (arg, ""),
    };
    match action.to_lowercase().as_str() {
        "add" if sequence.is_empty() => {
            ChatCommand::Invalid("/stop add requires a sequence".to_string())
        }
        "add" => ChatCommand::AddStopSequence(sequence.to_string()),
        "clear" => ChatCommand::ClearStopSequences,
        "list" => ChatCommand::ListStopSequences,
        other => ChatCommand::Invalid(format!("Unknown /stop action '{other}'")),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "show" | "true" | "yes" => Some(true),
        "off" | "hide" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Summary of the commands, printed by `/help`.
pub fn help_text() -> &'static str {
    r#"Commands:
  /clear                 Start over (the system prompt is kept)
  /model <name>          Switch model
  /max_tokens <n>        Set maximum answer tokens
  /temperature <v>       Set temperature 0.0-2.0 ('clear' for the endpoint default)
  /top_p <v>             Set top-p 0.0-1.0 ('clear' for the endpoint default)
  /top_k <n>             Set top-k ('clear' for the endpoint default)
  /stop add <seq>        Add a stop sequence
  /stop clear            Remove all stop sequences
  /stop list             List stop sequences
  /prefill [text]        Start each reply with text (no text turns it off)
  /reasoning on|off      Show or hide reasoning text
  /stats                 Show session statistics
  /config                Show the active configuration
  /help                  Show this help
  /quit                  Leave (also /exit, /q, Ctrl+D)

Ctrl+C while a response is streaming stops that response."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("a / b"), None);
    }

    #[test]
    fn quit_aliases() {
        for input in ["/quit", "/exit", "/q", "  /QUIT  "] {
            assert_eq!(parse_command(input), Some(ChatCommand::Quit), "{input}");
        }
    }

    #[test]
    fn model() {
        assert_eq!(
            parse_command("/model   Qwen/QwQ-32B  "),
            Some(ChatCommand::Model("Qwen/QwQ-32B".to_string()))
        );
        assert!(matches!(parse_command("/model"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn max_tokens() {
        assert_eq!(parse_command("/max_tokens 1024"), Some(ChatCommand::MaxTokens(1024)));
        assert!(matches!(parse_command("/max_tokens 0"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/max_tokens lots"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn sampling_values() {
        assert_eq!(parse_command("/temperature 1.3"), Some(ChatCommand::Temperature(1.3)));
        assert_eq!(parse_command("/temperature clear"), Some(ChatCommand::ClearTemperature));
        assert!(matches!(
            parse_command("/temperature 2.5"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("between 0 and 2")
        ));
        assert_eq!(parse_command("/top_p 0.9"), Some(ChatCommand::TopP(0.9)));
        assert_eq!(parse_command("/top_p CLEAR"), Some(ChatCommand::ClearTopP));
        assert!(matches!(parse_command("/top_p NaN"), Some(ChatCommand::Invalid(_))));
        assert_eq!(parse_command("/top_k 40"), Some(ChatCommand::TopK(40)));
        assert_eq!(parse_command("/top_k clear"), Some(ChatCommand::ClearTopK));
        assert!(matches!(parse_command("/top_k -1"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn stop_sequences() {
        assert_eq!(
            parse_command("/stop add ### END"),
            Some(ChatCommand::AddStopSequence("### END".to_string()))
        );
        assert_eq!(parse_command("/stop clear"), Some(ChatCommand::ClearStopSequences));
        assert_eq!(parse_command("/stop list"), Some(ChatCommand::ListStopSequences));
        assert!(matches!(parse_command("/stop add"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/stop"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/stop drop"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn prefill() {
        assert_eq!(
            parse_command("/prefill   ```python"),
            Some(ChatCommand::Prefill("```python".to_string()))
        );
        assert_eq!(parse_command("/prefill"), Some(ChatCommand::ClearPrefill));
        assert_eq!(parse_command("/prefill   "), Some(ChatCommand::ClearPrefill));
    }

    #[test]
    fn reasoning_toggle() {
        assert_eq!(parse_command("/reasoning on"), Some(ChatCommand::Reasoning(true)));
        assert_eq!(parse_command("/reasoning hide"), Some(ChatCommand::Reasoning(false)));
        assert!(matches!(
            parse_command("/reasoning maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("'on' or 'off'")
        ));
    }

    #[test]
    fn informational_commands() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            parse_command("/system be brief"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("/system")
        ));
    }

    #[test]
    fn help_mentions_every_command() {
        let help = help_text();
        for name in [
            "/clear", "/model", "/max_tokens", "/temperature", "/top_p", "/top_k", "/stop",
            "/prefill", "/reasoning", "/stats", "/config", "/help", "/quit",
        ] {
            assert!(help.contains(name), "{name}");
        }
    }
}
