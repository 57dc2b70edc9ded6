use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use toolchat::openai::call::{ChatLogEvent, ChatStatus, ConversationState, ToolStatus};
use toolchat::openai::tools::{sample_registry, ToolDefinition, ToolParametersBuilder, ToolRegistry};
use toolchat::openai::{ChatClient, Message, Role};
use toolchat::testing::{
    reasoning_chunk, text_chunk, text_response, tool_call_chunk, tool_call_response, MockTransport, RecordingSink,
    Scripted,
};
use toolchat::{ChatError, ChatOptions};
mod common;

#[ctor::ctor]
fn _init() { common::init(); }

const ADD_2_2: &str = r#"{"operation":"add","num1":2,"num2":2}"#;

fn client(transport: &Arc<MockTransport>, registry: ToolRegistry) -> ChatClient {
    ChatClient::new(transport.clone(), Arc::new(registry), "test-model")
}

fn sleeper(name: &'static str, delay_ms: u64) -> ToolDefinition {
    ToolDefinition::new(
        name,
        "sleeps, then returns its own name",
        ToolParametersBuilder::new_object().build(),
        Arc::new(move |_: &Value| {
            std::thread::sleep(Duration::from_millis(delay_ms));
            Ok(json!(format!("{name} done")))
        }),
    )
}

#[tokio::test]
async fn text_only_turn_makes_exactly_one_request() {
    let transport = Arc::new(MockTransport::with_script([Scripted::Complete(text_response("hello there"))]));
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let answer = client(&transport, registry)
        .chat(vec![Message::user("hi")], &tools, &ChatOptions::default())
        .await
        .unwrap();

    assert_eq!(answer.final_answer, "hello there");
    assert_eq!(answer.status, ChatStatus::Completed);
    assert_eq!(answer.iterations, 1);
    assert_eq!(answer.tool_rounds, 0);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.requests()[0].tool_names(), vec!["get_random_number", "get_current_time", "calculate"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_plus_two_scenario() {
    let transport = Arc::new(MockTransport::with_script([
        Scripted::Complete(tool_call_response(&[("call_1", "calculate", ADD_2_2)])),
        Scripted::Complete(text_response("2 + 2 = 4")),
    ]));
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let mut state = ConversationState::new(vec![Message::user("what is 2+2?")], ChatOptions::default());

    let answer = client(&transport, registry).run(&mut state, &tools).await.unwrap();

    assert!(answer.final_answer.contains('4'));
    assert_eq!(state.history.len(), 4);
    let roles: Vec<Role> = state.history.as_slice().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    let tool_msg = &state.history.as_slice()[2];
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_msg.text(), "4");

    // second request carries the full history
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[1].tool_calls[0].name, "calculate");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_tool_is_reported_back_and_conversation_continues() {
    let transport = Arc::new(MockTransport::with_script([
        Scripted::Complete(tool_call_response(&[("c1", "teleport", "{}")])),
        Scripted::Complete(text_response("sorry, I cannot teleport")),
    ]));
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let answer = client(&transport, registry)
        .chat(vec![Message::user("beam me up")], &tools, &ChatOptions::default())
        .await
        .unwrap();

    assert_eq!(answer.status, ChatStatus::Completed);
    assert_eq!(answer.steps.len(), 1);
    assert_eq!(answer.steps[0].status, ToolStatus::UnknownTool);
    let tool_msg = &transport.requests()[1].messages[2];
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.text(), r#"{"error":"unknown tool: teleport"}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn always_calling_model_stops_at_iteration_limit() {
    let transport = Arc::new(MockTransport::repeating(tool_call_response(&[("c", "get_current_time", "")])));
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let mut events = Vec::new();
    let answer = client(&transport, registry)
        .chat_with_logger(
            vec![Message::user("loop forever")],
            &tools,
            &ChatOptions::default().with_max_iterations(2),
            |ev| events.push(ev.clone()),
        )
        .await
        .unwrap();

    assert_eq!(answer.status, ChatStatus::IterationLimitExceeded { max_iterations: 2 });
    assert!(answer.is_iteration_limit_exceeded());
    assert_eq!(answer.tool_rounds, 2);
    assert_eq!(answer.steps.len(), 2);
    assert_eq!(transport.request_count(), 3);
    assert!(matches!(events.last(), Some(ChatLogEvent::IterationLimitExceeded { max_iterations: 2 })));
    let dispatched = events.iter().filter(|e| matches!(e, ChatLogEvent::ToolResult { .. })).count();
    assert_eq!(dispatched, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_results_are_appended_in_request_order() {
    let transport = Arc::new(MockTransport::with_script([
        Scripted::Complete(tool_call_response(&[("id_a", "slow_a", "{}"), ("id_b", "fast_b", "{}")])),
        Scripted::Complete(text_response("both done")),
    ]));
    let registry = ToolRegistry::new().with_tool(sleeper("slow_a", 200)).with_tool(sleeper("fast_b", 0));
    let tools = registry.get_all_tools();
    let mut state = ConversationState::new(vec![Message::user("run both")], ChatOptions::default());

    client(&transport, registry)
        .with_parallel_tool_calls(true)
        .run(&mut state, &tools)
        .await
        .unwrap();

    let tool_ids: Vec<&str> = state
        .history
        .as_slice()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, vec!["id_a", "id_b"]);
    assert_eq!(state.history.as_slice()[2].text(), "slow_a done");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_turns_reach_the_sink_and_the_history() {
    let transport = Arc::new(MockTransport::with_script([
        Scripted::Stream(vec![
            Ok(reasoning_chunk("need the calculator")),
            Ok(tool_call_chunk(0, Some("call_"), Some("calc"), None)),
            Ok(tool_call_chunk(0, Some("7"), Some("ulate"), Some("{\"operation\":\"add\","))),
            Ok(tool_call_chunk(0, None, None, Some("\"num1\":2,\"num2\":2}"))),
        ]),
        Scripted::Stream(vec![Ok(text_chunk("The answer ")), Ok(text_chunk("is 4."))]),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let mut state = ConversationState::new(vec![Message::user("2+2?")], ChatOptions::default().with_stream(true));

    let answer = client(&transport, registry)
        .with_sink(sink.clone())
        .run(&mut state, &tools)
        .await
        .unwrap();

    assert_eq!(answer.final_answer, "The answer is 4.");
    assert_eq!(sink.content(), vec!["The answer ", "is 4."]);
    assert_eq!(sink.reasoning(), vec!["need the calculator"]);
    assert_eq!(sink.stream_ends(), 2);
    assert!(transport.requests().iter().all(|r| r.stream));

    let call = &state.history.as_slice()[1].tool_calls[0];
    assert_eq!(call.id, "call_7");
    assert_eq!(call.name, "calculate");
    assert_eq!(state.history.as_slice()[2].text(), "4");
}

#[tokio::test]
async fn transport_error_aborts_the_call() {
    let transport = Arc::new(MockTransport::with_script([Scripted::Error(ChatError::transport("connection refused"))]));
    let err = client(&transport, sample_registry())
        .chat(vec![Message::user("hi")], &[], &ChatOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Transport { .. }));
}

#[tokio::test]
async fn malformed_response_aborts_the_call() {
    let empty = serde_json::from_value(json!({"choices": []})).unwrap();
    let transport = Arc::new(MockTransport::with_script([Scripted::Complete(empty)]));
    let err = client(&transport, sample_registry())
        .chat(vec![Message::user("hi")], &[], &ChatOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_malformed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tool_errors_never_abort() {
    let transport = Arc::new(MockTransport::with_script([
        Scripted::Complete(tool_call_response(&[
            ("c1", "calculate", r#"{"operation":"divide","num1":1,"num2":0}"#),
            ("c2", "calculate", "not json"),
        ])),
        Scripted::Complete(text_response("cannot divide by zero")),
    ]));
    let registry = sample_registry();
    let tools = registry.get_all_tools();
    let answer = client(&transport, registry)
        .chat(vec![Message::user("1/0")], &tools, &ChatOptions::default())
        .await
        .unwrap();
    let statuses: Vec<ToolStatus> = answer.steps.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![ToolStatus::ExecutionFailed, ToolStatus::InvalidArguments]);
    assert_eq!(answer.status, ChatStatus::Completed);
}
