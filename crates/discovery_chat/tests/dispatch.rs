//! End-to-end dispatch behavior against a scripted provider.

use std::sync::Arc;

use discovery_chat::mock::{FailureMode, MockProvider};
use discovery_chat::{
    fallback_reply, AgentRegistry, ChatError, ChatService, Conversation, RoutingDispatcher,
    StaticPromptLoader,
};
use discovery_config::ConfigLoader;
use futures::StreamExt;

const CONFIG: &str = r#"
agents:
  facilitator:
    persona: prompts/facilitator.md
    document: prompts/discovery_cards.md
  design_thinking_expert:
    persona: prompts/expert.md
    documents:
      - prompts/doc1.md
      - prompts/doc2.md
  multi_agent:
    persona: prompts/multi_agent.md
    condition: |
      Decide who should answer the last message.
      Reply with exactly one word: facilitator or design_thinking_expert.

      Conversation:
      {input}
    agents:
      - condition: facilitator
        agent: facilitator
      - condition: design_thinking_expert
        agent: design_thinking_expert
  ping:
    persona: prompts/multi_agent.md
    condition: "ping or done? {input}"
    agents:
      - condition: pong
        agent: pong
      - condition: done
        agent: facilitator
  pong:
    persona: prompts/multi_agent.md
    condition: "pong or done? {input}"
    agents:
      - condition: ping
        agent: ping
      - condition: done
        agent: facilitator
"#;

fn loader() -> StaticPromptLoader {
    StaticPromptLoader::new()
        .with("prompts/facilitator.md", "You are the workshop facilitator.")
        .with("prompts/discovery_cards.md", "CARD DECK")
        .with("prompts/expert.md", "You are a design thinking expert.")
        .with("prompts/doc1.md", "DOC ONE")
        .with("prompts/doc2.md", "DOC TWO")
        .with("prompts/multi_agent.md", "You route questions.")
}

fn service(provider: &MockProvider) -> ChatService {
    let catalog = Arc::new(ConfigLoader::load_str(CONFIG).unwrap());
    let registry = AgentRegistry::build(catalog, &loader(), None).unwrap();
    ChatService::new(Arc::new(registry), Arc::new(provider.clone()))
}

fn conversation() -> Conversation {
    Conversation::new()
        .with_user("We want to brainstorm use cases.")
        .with_assistant("Great, let's pick some cards.")
        .with_user("Which card comes first?")
}

#[tokio::test]
async fn test_classifier_label_selects_target_persona() {
    let provider = MockProvider::new()
        .add_response("facilitator")
        .with_reply("Start with the Goals card.");
    let service = service(&provider);

    let reply = service.handle("multi_agent", &conversation()).await.unwrap();
    assert_eq!(reply.plan().leaf, "facilitator");
    assert_eq!(reply.collect_text().await.unwrap(), "Start with the Goals card.");

    let streamed = provider.get_method_calls("stream");
    assert_eq!(streamed.len(), 1);
    let system = streamed[0].system.as_deref().unwrap();
    assert!(system.starts_with("You are the workshop facilitator."));
    assert!(system.contains("<documents>CARD DECK</documents>"));
    assert_eq!(streamed[0].messages, conversation().messages());
}

#[tokio::test]
async fn test_unrecognized_label_never_delegates() {
    let provider = MockProvider::new().add_response("unknown_label");
    let service = service(&provider);

    let err = service.handle("multi_agent", &conversation()).await.unwrap_err();
    match &err {
        ChatError::RoutingAmbiguous { agent, output, labels } => {
            assert_eq!(agent, "multi_agent");
            assert_eq!(output, "unknown_label");
            assert_eq!(labels, &vec!["facilitator", "design_thinking_expert"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(provider.stream_calls(), 0);
}

#[tokio::test]
async fn test_same_conversation_resolves_to_same_leaf() {
    let provider = MockProvider::new().add_response("design_thinking_expert");
    let service = service(&provider);

    let first = service.resolve("multi_agent", &conversation()).await.unwrap();
    let second = service.resolve("multi_agent", &conversation()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.leaf, "design_thinking_expert");

    let requests = provider.get_method_calls("complete");
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_routing_cycle_is_bounded() {
    let provider = MockProvider::new().with_responses(["pong", "ping"]);
    let service = service(&provider);

    let err = service.handle("ping", &conversation()).await.unwrap_err();
    match err {
        ChatError::RoutingDepthExceeded { agent, max_hops, path } => {
            assert_eq!(agent, "ping");
            assert_eq!(max_hops, 5);
            assert_eq!(path, vec!["ping", "pong", "ping", "pong", "ping", "pong"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(provider.complete_calls(), 5);
    assert_eq!(provider.stream_calls(), 0);
}

#[tokio::test]
async fn test_cycle_with_exit_resolves_within_bound() {
    let provider = MockProvider::new().with_responses(["pong", "done"]);
    let service = service(&provider).with_dispatcher(RoutingDispatcher::new(2));

    let plan = service.resolve("ping", &conversation()).await.unwrap();
    assert_eq!(plan.path(), vec!["ping", "pong", "facilitator"]);
}

#[tokio::test]
async fn test_multi_document_prompt_keeps_declaration_order() {
    let provider = MockProvider::new();
    let service = service(&provider);
    let prompt = service
        .registry()
        .persona("design_thinking_expert")
        .unwrap()
        .system_prompt()
        .to_string();

    let one = prompt.find("<documents>DOC ONE</documents>").unwrap();
    let two = prompt.find("<documents>DOC TWO</documents>").unwrap();
    assert!(one < two);
}

#[tokio::test]
async fn test_failing_completion_uses_fallback_when_enabled() {
    let provider = MockProvider::new().simulate_failure(FailureMode::Stream, 503);
    let service = service(&provider).with_fallback(true);
    let conversation = Conversation::new().with_user("hello");

    let reply = service.handle("facilitator", &conversation).await.unwrap();
    assert_eq!(
        reply.collect_text().await.unwrap(),
        fallback_reply(conversation.messages())
    );
}

#[tokio::test]
async fn test_failing_completion_propagates_when_disabled() {
    let provider = MockProvider::new().simulate_failure(FailureMode::Stream, 503);
    let service = service(&provider).with_fallback(false);

    let err = service
        .handle("facilitator", &Conversation::new().with_user("hello"))
        .await
        .unwrap_err();
    assert!(err.is_completion_failure());
    assert!(err.is_retryable());
    assert!(!err.is_ambiguous());
}

#[tokio::test]
async fn test_stream_failing_before_text_uses_fallback() {
    let provider = MockProvider::new()
        .with_reply("never sent")
        .interrupt_stream_after(0);
    let service = service(&provider).with_fallback(true);
    let conversation = Conversation::new().with_user("hello");

    let reply = service.handle("facilitator", &conversation).await.unwrap();
    assert_eq!(
        reply.collect_text().await.unwrap(),
        fallback_reply(conversation.messages())
    );
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test]
async fn test_stream_failing_before_text_propagates_when_disabled() {
    let provider = MockProvider::new()
        .with_reply("never sent")
        .interrupt_stream_after(0);
    let service = service(&provider).with_fallback(false);

    let reply = service
        .handle("facilitator", &Conversation::new().with_user("hello"))
        .await
        .unwrap();
    assert!(reply.collect_text().await.is_err());
}

#[tokio::test]
async fn test_stream_failing_after_text_is_not_replaced() {
    let provider = MockProvider::new()
        .with_reply("partial answer here")
        .interrupt_stream_after(1);
    let service = service(&provider).with_fallback(true);

    let mut reply = service
        .handle("facilitator", &Conversation::new().with_user("hello"))
        .await
        .unwrap();
    assert_eq!(reply.next().await.unwrap().unwrap(), "partial");
    assert!(reply.next().await.unwrap().is_err());
}

#[tokio::test]
async fn test_abandoned_reply_releases_stream() {
    let provider = MockProvider::new()
        .add_response("facilitator")
        .with_reply("one two three four");
    let service = service(&provider);

    let mut reply = service.handle("multi_agent", &conversation()).await.unwrap();
    assert_eq!(provider.open_streams(), 1);
    assert_eq!(reply.next().await.unwrap().unwrap(), "one");

    drop(reply);
    assert_eq!(provider.open_streams(), 0);
}

#[tokio::test]
async fn test_classification_failure_opens_no_stream() {
    let provider = MockProvider::new().simulate_failure(FailureMode::Complete, 429);
    let service = service(&provider);

    let err = service.handle("multi_agent", &conversation()).await.unwrap_err();
    assert!(matches!(err, ChatError::ClassificationFailure { .. }));
    assert!(err.is_retryable());
    assert_eq!(provider.open_streams(), 0);
    assert_eq!(provider.stream_calls(), 0);
}
