//! Interactive chat with reasoning-capable models over OpenAI-compatible endpoints.
//!
//! Reasoning text streams first (dimmed), followed by the answer.
//!
//! # Usage
//!
//! ```bash
//! export THINKSTREAM_API_KEY=sk-...
//!
//! # Default endpoint and model
//! thinkstream-chat
//!
//! # Another model, reasoning hidden
//! thinkstream-chat --model Qwen/QwQ-32B --hide-reasoning
//!
//! # Settings from a YAML file; flags still win
//! thinkstream-chat --config chat.yaml --max-tokens 2048
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=thinkstream=debug` to see skipped frames.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use thinkstream::{
    Cancellation, ChatArgs, ChatClient, ChatCommand, ChatConfig, ChatSession, Completion,
    PlainTextRenderer, Renderer, help_text, parse_command,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let (args, _) = ChatArgs::from_command_line_relaxed("thinkstream-chat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;

    let client = ChatClient::with_options(
        config.api_key.clone(),
        Some(config.base_url.as_str()),
        Some(config.timeout()),
    )?;
    let mut renderer = PlainTextRenderer::with_options(config.use_color, config.show_reasoning);
    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    // rustyline owns Ctrl+C at the prompt; this handler only sees it while a response streams.
    let cancel = Cancellation::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.cancel())?;

    println!("thinkstream chat (model: {})", session.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        if let Some(command) = parse_command(line) {
            if !run_command(command, &mut session, &mut renderer) {
                println!("Goodbye!");
                break;
            }
            continue;
        }

        cancel.reset();
        match session.send_streaming(line, &mut renderer, &cancel).await {
            Ok(outcome) => match &outcome.completion {
                Completion::Interrupted => renderer.print_interrupted(),
                Completion::TransportFailure(err) => {
                    renderer.print_error(&format!("Response failed: {err}"));
                }
                Completion::Done | Completion::EndOfStream => {
                    if outcome.reasoning.is_empty() && outcome.answer.is_empty() {
                        renderer.print_info("(empty response)");
                    }
                }
            },
            Err(err) if err.is_interrupted() => renderer.print_interrupted(),
            Err(err) => renderer.print_error(&err.to_string()),
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Apply a slash command.  Returns false when the chat should end.
fn run_command(
    command: ChatCommand,
    session: &mut ChatSession<ChatClient>,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match command {
        ChatCommand::Quit => return false,
        ChatCommand::Clear => {
            session.clear();
            renderer.print_info("Conversation cleared.");
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::Model(model) => {
            renderer.print_info(&format!("Model changed to: {model}"));
            session.set_model(model);
        }
        ChatCommand::MaxTokens(value) => {
            session.set_max_tokens(value);
            renderer.print_info(&format!("max_tokens set to {value}"));
        }
        ChatCommand::Temperature(value) => {
            session.set_temperature(Some(value));
            renderer.print_info(&format!("temperature set to {value:.2}"));
        }
        ChatCommand::ClearTemperature => {
            session.set_temperature(None);
            renderer.print_info("temperature reset to endpoint default");
        }
        ChatCommand::TopP(value) => {
            session.set_top_p(Some(value));
            renderer.print_info(&format!("top_p set to {value:.2}"));
        }
        ChatCommand::ClearTopP => {
            session.set_top_p(None);
            renderer.print_info("top_p reset to endpoint default");
        }
        ChatCommand::TopK(value) => {
            session.set_top_k(Some(value));
            renderer.print_info(&format!("top_k set to {value}"));
        }
        ChatCommand::ClearTopK => {
            session.set_top_k(None);
            renderer.print_info("top_k reset to endpoint default");
        }
        ChatCommand::AddStopSequence(sequence) => {
            renderer.print_info(&format!("Added stop sequence: {sequence}"));
            session.add_stop_sequence(sequence);
        }
        ChatCommand::ClearStopSequences => {
            session.clear_stop_sequences();
            renderer.print_info("Stop sequences cleared.");
        }
        ChatCommand::ListStopSequences => print_stop_sequences(session.stop_sequences()),
        ChatCommand::Prefill(text) => {
            renderer.print_info(&format!("Replies will start with: {text}"));
            session.set_assistant_prefill(Some(text));
        }
        ChatCommand::ClearPrefill => {
            session.set_assistant_prefill(None);
            renderer.print_info("Prefill cleared.");
        }
        ChatCommand::Reasoning(show) => {
            session.set_show_reasoning(show);
            renderer.set_show_reasoning(show);
            if show {
                renderer.print_info("Reasoning output shown.");
            } else {
                renderer.print_info("Reasoning output hidden.");
            }
        }
        ChatCommand::Stats => print_stats(session),
        ChatCommand::ShowConfig => print_config(session.config()),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn print_stats(session: &ChatSession<ChatClient>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!(
        "      Messages: {} ({} exchanges)",
        stats.message_count, stats.exchanges
    );
    println!(
        "      Requests: {} ({} failed or interrupted)",
        stats.requests, stats.failed_requests
    );
    println!("      Skipped frames: {}", stats.decode_errors);
    println!(
        "      Total tokens: {} prompt / {} completion",
        stats.total_prompt_tokens, stats.total_completion_tokens
    );
    if let Some(usage) = stats.last_usage {
        println!(
            "      Last response: {} prompt / {} completion",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
}

fn print_config(config: &ChatConfig) {
    let generation = &config.generation;
    println!("    Current Configuration:");
    println!("      Endpoint: {}", config.base_url);
    println!("      Model: {}", config.model);
    println!("      System prompt: {}", config.system_prompt);
    println!("      Max tokens: {}", generation.max_tokens);
    println!("      Thinking budget: {}", describe(generation.thinking_budget));
    println!("      Temperature: {}", describe(generation.temperature));
    println!("      Top-p: {}", describe(generation.top_p));
    println!("      Top-k: {}", describe(generation.top_k));
    println!("      Min-p: {}", describe(generation.min_p));
    println!(
        "      Frequency penalty: {}",
        describe(generation.frequency_penalty)
    );
    println!(
        "      Prefill: {}",
        config.assistant_prefill.as_deref().unwrap_or("(none)")
    );
    println!(
        "      Reasoning output: {}",
        if config.show_reasoning { "shown" } else { "hidden" }
    );
    print_stop_sequences(&generation.stop);
}

fn print_stop_sequences(stop_sequences: &[String]) {
    if stop_sequences.is_empty() {
        println!("      Stop sequences: (none)");
    } else {
        println!("      Stop sequences:");
        for seq in stop_sequences {
            println!("        - {seq}");
        }
    }
}

fn describe<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
