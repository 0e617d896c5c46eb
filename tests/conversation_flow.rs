//! End-to-end conversation tests against scripted transports.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};

use thinkstream::{
    Cancellation, CapturingRenderer, ChatConfig, ChatRequest, ChatSession, Completion, Error,
    LineStream, Message, RenderEvent, Result, Role, Transport,
};

/// Replays one canned response body per request and records what was sent.
#[derive(Clone, Default)]
struct ScriptedTransport {
    bodies: Arc<Mutex<VecDeque<Vec<Result<String>>>>>,
    sent: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedTransport {
    fn reply(self, lines: &[&str]) -> Self {
        let body = lines.iter().map(|line| Ok(line.to_string())).collect();
        self.bodies.lock().unwrap().push_back(body);
        self
    }

    fn reply_then_fail(self, lines: &[&str], err: Error) -> Self {
        let mut body: Vec<Result<String>> = lines.iter().map(|line| Ok(line.to_string())).collect();
        body.push(Err(err));
        self.bodies.lock().unwrap().push_back(body);
        self
    }

    fn sent(&self) -> Vec<ChatRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &ChatRequest) -> Result<LineStream> {
        self.sent.lock().unwrap().push(request.clone());
        let body = self
            .bodies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::connection("no scripted response left", None))?;
        Ok(stream::iter(body).boxed())
    }
}

fn reasoning(text: &str) -> String {
    format!(
        r#"data: {{"choices":[{{"index":0,"delta":{{"reasoning_content":"{text}","content":null}}}}]}}"#
    )
}

fn content(text: &str) -> String {
    format!(
        r#"data: {{"choices":[{{"index":0,"delta":{{"reasoning_content":null,"content":"{text}"}}}}]}}"#
    )
}

fn config() -> ChatConfig {
    ChatConfig::new()
        .with_api_key("sk-test")
        .with_system_prompt("You are a professional programming assistant")
}

#[tokio::test]
async fn think_then_answer() {
    let transport = ScriptedTransport::default().reply(&[
        &reasoning("think"),
        &content("hi"),
        "data: [DONE]",
    ]);
    let mut session = ChatSession::new(transport.clone(), config());
    let mut renderer = CapturingRenderer::new();

    let outcome = session
        .send_streaming("hello", &mut renderer, &Cancellation::new())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!((outcome.reasoning.as_str(), outcome.answer.as_str()), ("think", "hi"));
    assert_eq!(outcome.decode_errors, 0);
    assert_eq!(
        renderer.events,
        vec![
            RenderEvent::ReasoningStart,
            RenderEvent::ReasoningChunk("think".to_string()),
            RenderEvent::AnswerStart,
            RenderEvent::AnswerChunk("hi".to_string()),
            RenderEvent::SectionEnd,
        ]
    );
    let history = session.conversation().snapshot();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2], Message::assistant("hi"));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let body = serde_json::to_value(&sent[0]).unwrap();
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hello");
}

#[tokio::test]
async fn malformed_frame_between_valid_frames_changes_nothing() {
    let clean = [content("Hel"), content("lo"), "data: [DONE]".to_string()];
    let dirty = [
        content("Hel"),
        "data: {\"choices\": [".to_string(),
        content("lo"),
        "data: [DONE]".to_string(),
    ];
    fn as_refs(lines: &[String]) -> Vec<&str> {
        lines.iter().map(String::as_str).collect::<Vec<_>>()
    }
    let transport = ScriptedTransport::default()
        .reply(&as_refs(&clean))
        .reply(&as_refs(&dirty));
    let mut session = ChatSession::new(transport, config());
    let cancel = Cancellation::new();

    let mut first = CapturingRenderer::new();
    let a = session.send_streaming("q", &mut first, &cancel).await.unwrap();
    let mut second = CapturingRenderer::new();
    let b = session.send_streaming("q", &mut second, &cancel).await.unwrap();

    assert_eq!(a.answer, b.answer);
    assert_eq!(a.reasoning, b.reasoning);
    assert_eq!(b.decode_errors, 1);
    assert_eq!(second.decode_errors(), 1);
    assert_eq!(session.stats().decode_errors, 1);
    assert_eq!(session.conversation().exchanges(), 2);
}

#[tokio::test]
async fn history_grows_across_turns() {
    let transport = ScriptedTransport::default()
        .reply(&[&content("Paris"), "data: [DONE]"])
        .reply(&[&reasoning("recall"), &content("About 2.1 million"), "data: [DONE]"]);
    let mut session = ChatSession::new(transport.clone(), config());
    let cancel = Cancellation::new();
    let mut renderer = CapturingRenderer::new();

    session
        .send_streaming("Capital of France?", &mut renderer, &cancel)
        .await
        .unwrap();
    session
        .send_streaming("Population?", &mut renderer, &cancel)
        .await
        .unwrap();

    let sent = transport.sent();
    let second: Vec<(Role, &str)> = sent[1]
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        second,
        vec![
            (Role::System, "You are a professional programming assistant"),
            (Role::User, "Capital of France?"),
            (Role::Assistant, "Paris"),
            (Role::User, "Population?"),
        ]
    );
    // Reasoning is displayed but never sent back.
    assert_eq!(session.conversation().snapshot()[4], Message::assistant("About 2.1 million"));
}

#[tokio::test]
async fn transport_failure_keeps_partial_text_but_not_history() {
    let transport = ScriptedTransport::default().reply_then_fail(
        &[&reasoning("hmm"), &content("The answer is")],
        Error::transport("connection reset by peer", None),
    );
    let mut session = ChatSession::new(transport, config());
    let mut renderer = CapturingRenderer::new();

    let outcome = session
        .send_streaming("question", &mut renderer, &Cancellation::new())
        .await
        .unwrap();

    assert!(matches!(outcome.completion, Completion::TransportFailure(_)));
    assert_eq!(outcome.reasoning, "hmm");
    assert_eq!(outcome.answer, "The answer is");
    assert_eq!(renderer.count(&RenderEvent::SectionEnd), 1);
    assert!(outcome.into_result().unwrap_err().is_transport());
    assert_eq!(session.conversation().len(), 1);
    assert_eq!(session.stats().failed_requests, 1);
}

#[tokio::test]
async fn body_without_sentinel_still_commits() {
    let transport = ScriptedTransport::default().reply(&[&content("done anyway"), ""]);
    let mut session = ChatSession::new(transport, config());
    let outcome = session
        .send_streaming("q", &mut CapturingRenderer::new(), &Cancellation::new())
        .await
        .unwrap();
    assert!(matches!(outcome.completion, Completion::EndOfStream));
    assert_eq!(session.conversation().exchanges(), 1);
}

#[tokio::test]
async fn sentinel_only_produces_nothing() {
    let transport = ScriptedTransport::default().reply(&["data: [DONE]"]);
    let mut session = ChatSession::new(transport, config());
    let mut renderer = CapturingRenderer::new();
    let outcome = session
        .send_streaming("q", &mut renderer, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!((outcome.reasoning.as_str(), outcome.answer.as_str()), ("", ""));
    assert!(renderer.events.is_empty());
}

#[tokio::test]
async fn usage_is_totalled_across_turns() {
    let with_usage = |p: u64, c: u64| {
        format!(
            r#"data: {{"choices":[{{"delta":{{"content":""}},"finish_reason":"stop"}}],"usage":{{"prompt_tokens":{p},"completion_tokens":{c},"total_tokens":{}}}}}"#,
            p + c
        )
    };
    let transport = ScriptedTransport::default()
        .reply(&[&content("a"), &with_usage(10, 5), "data: [DONE]"])
        .reply(&[&content("b"), &with_usage(20, 7), "data: [DONE]"]);
    let mut session = ChatSession::new(transport, config());
    let cancel = Cancellation::new();
    let first = session
        .send_streaming("1", &mut CapturingRenderer::new(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.finish_reason.as_deref(), Some("stop"));
    session
        .send_streaming("2", &mut CapturingRenderer::new(), &cancel)
        .await
        .unwrap();

    let stats = session.stats();
    assert_eq!(stats.total_prompt_tokens, 30);
    assert_eq!(stats.total_completion_tokens, 12);
    assert_eq!(stats.last_usage.map(|u| u.total_tokens), Some(27));
    assert_eq!(stats.requests, 2);
}
