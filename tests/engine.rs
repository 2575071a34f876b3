//! End-to-end engine behavior: traversal, routing, merges, cancellation,
//! pause, failure propagation, and agent tool calls.
mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use serde_json::json;

use iosans::error::EngineError;
use iosans::runtime::state::NodeStatus;

#[tokio::test]
async fn linear_flow_runs_end_to_end() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "C", "type": "codeExecutor",
             "data": {"code": "return inputs.timestamp and 'ok' or 'no'"}},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "C"},
            {"id": "e2", "source": "C", "target": "O"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    for id in ["T", "C", "O"] {
        assert_eq!(state.node_record(id).unwrap().status, NodeStatus::Success);
    }
    let trigger_output = state.node_output("T").unwrap();
    assert_eq!(trigger_output["triggered"], json!(true));
    assert!(trigger_output["timestamp"].is_string());
    assert_eq!(state.node_output("C").unwrap(), json!("ok"));
    assert_eq!(state.node_output("O").unwrap(), json!("ok"));

    // Every edge of a successful source carries a snapshot.
    assert_eq!(state.edge_snapshot("e1").unwrap().data, trigger_output);
    assert_eq!(state.edge_snapshot("e2").unwrap().data, json!("ok"));
}

#[tokio::test]
async fn ifelse_routes_one_branch_and_starves_the_other() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "C", "type": "codeExecutor", "data": {"code": "return {value = 42}"}},
            {"id": "I", "type": "ifElse",
             "data": {"field": "value", "operator": "greaterThan", "value": 10}},
            {"id": "A", "type": "codeExecutor", "data": {"code": "return 'a'"}},
            {"id": "B", "type": "codeExecutor", "data": {"code": "return 'b'"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "C"},
            {"id": "e2", "source": "C", "target": "I"},
            {"id": "e3", "source": "I", "target": "A", "sourceHandle": "I-true"},
            {"id": "e4", "source": "I", "target": "B", "sourceHandle": "I-false"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    assert_eq!(state.node_record("A").unwrap().status, NodeStatus::Success);
    assert_eq!(state.node_record("B").unwrap().status, NodeStatus::Pending);
}

#[tokio::test]
async fn merge_waits_for_all_branches_and_fires_once() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "DX", "type": "delay", "data": {"delay": 100}},
            {"id": "X", "type": "codeExecutor", "data": {"code": "return {a = 1}"}},
            {"id": "DY", "type": "delay", "data": {"delay": 250}},
            {"id": "Y", "type": "codeExecutor", "data": {"code": "return {b = 2}"}},
            {"id": "M", "type": "merge", "data": {"mergeStrategy": "object"}},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "DX"},
            {"id": "e2", "source": "DX", "target": "X"},
            {"id": "e3", "source": "T", "target": "DY"},
            {"id": "e4", "source": "DY", "target": "Y"},
            {"id": "e5", "source": "X", "target": "M"},
            {"id": "e6", "source": "Y", "target": "M"},
            {"id": "e7", "source": "M", "target": "O"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    assert_eq!(
        state.node_output("M").unwrap(),
        json!({"X": {"a": 1}, "Y": {"b": 2}})
    );
    assert_eq!(state.node_output("O").unwrap(), state.node_output("M").unwrap());

    // The merge executed exactly once.
    let merge_runs = state
        .snapshot()
        .log
        .iter()
        .filter(|entry| {
            entry.node_id.as_deref() == Some("M") && entry.message.contains("Executing merge")
        })
        .count();
    assert_eq!(merge_runs, 1);
}

#[tokio::test]
async fn merge_first_takes_the_fast_branch() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "X", "type": "codeExecutor", "data": {"code": "return {a = 1}"}},
            {"id": "DY", "type": "delay", "data": {"delay": 300}},
            {"id": "Y", "type": "codeExecutor", "data": {"code": "return {b = 2}"}},
            {"id": "M", "type": "merge", "data": {"mergeStrategy": "first"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "X"},
            {"id": "e2", "source": "T", "target": "DY"},
            {"id": "e3", "source": "DY", "target": "Y"},
            {"id": "e4", "source": "X", "target": "M"},
            {"id": "e5", "source": "Y", "target": "M"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    assert_eq!(state.node_output("M").unwrap(), json!({"a": 1}));
    assert_eq!(state.node_record("Y").unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn cancellation_tears_down_in_flight_nodes_promptly() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "D", "type": "delay", "data": {"delay": 5000}},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "D"},
            {"id": "e2", "source": "D", "target": "O"}
        ]
    }));

    let engine = engine().await;
    let handle = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(Arc::new(workflow)).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let abort_at = Instant::now();
    engine.abort();
    let result = handle.await.unwrap();
    assert!(abort_at.elapsed() < Duration::from_millis(200));
    assert!(matches!(result, Err(EngineError::Cancelled)));

    let state = engine.state();
    let delay = state.node_record("D").unwrap();
    assert_eq!(delay.status, NodeStatus::Error);
    assert_eq!(delay.error.as_deref(), Some("Execution aborted"));
    assert_eq!(state.node_record("O").unwrap().status, NodeStatus::Pending);
    assert!(!state.is_running());

    let elapsed = state.run_end().unwrap() - state.run_start().unwrap();
    assert!(elapsed < chrono::Duration::milliseconds(500));
}

#[tokio::test]
async fn agent_calls_python_tool_through_reentry() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "A", "type": "aiAgent",
             "data": {"prompt": "Double 21 then give the final answer."}},
            {"id": "py-1", "type": "python", "data": {"code": "return inputs['x'] * 2"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "A"},
            {"id": "e2", "source": "py-1", "target": "A", "targetHandle": "resource-tools"}
        ]
    }));

    let llm = MockLlm::new(vec![
        "Thought: I must call python.\nAction: python_py_1\nAction Input: {\"x\":21}\n",
        "Thought: Got 42.\nFinal Answer: 42",
    ]);
    let engine = engine_with(|services| {
        services.llm = Some(llm);
        services.python = Some(Arc::new(DoublingPython));
    })
    .await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    let output = state.node_output("A").unwrap();
    assert_eq!(output["response"], json!("42"));

    let trace = output["trace"].as_array().unwrap();
    assert_eq!(trace.len(), 4);
    let kinds: Vec<&str> = trace
        .iter()
        .map(|step| step["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["thought", "action", "observation", "answer"]);
    assert_eq!(trace[2]["content"], json!("42.0"));

    // Tool re-entry never touches the run's status map.
    assert_eq!(
        state.node_record("py-1").unwrap().status,
        NodeStatus::Pending
    );
    // But it does land in the log stream as actions.
    assert!(state
        .snapshot()
        .log
        .iter()
        .any(|entry| entry.node_id.as_deref() == Some("py-1")
            && entry.message.starts_with("Tool call")));
}

#[tokio::test]
async fn agent_iteration_limit_yields_synthetic_answer() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "A", "type": "aiAgent", "data": {"maxIterations": 2}},
            {"id": "py-1", "type": "python", "data": {"code": "return inputs"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "A"},
            {"id": "e2", "source": "py-1", "target": "A", "targetHandle": "resource-tools"}
        ]
    }));

    let llm = MockLlm::repeating(
        "Thought: still working.\nAction: python_py_1\nAction Input: {\"x\": 1}\n",
    );
    let engine = engine_with(|services| {
        services.llm = Some(llm);
        services.python = Some(Arc::new(DoublingPython));
    })
    .await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    // MaxIterations does not fail the agent node.
    assert_eq!(state.node_record("A").unwrap().status, NodeStatus::Success);
    let output = state.node_output("A").unwrap();
    assert!(output["response"]
        .as_str()
        .unwrap()
        .contains("still working"));
    assert!(state
        .snapshot()
        .log
        .iter()
        .any(|entry| entry.message.contains("MaxIterations")));
}

#[tokio::test]
async fn switch_routes_by_case_handle() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "C", "type": "codeExecutor", "data": {"code": "return {color = 'red'}"}},
            {"id": "S", "type": "switch",
             "data": {"switchKey": "color", "cases": ["red", "blue"]}},
            {"id": "R", "type": "codeExecutor", "data": {"code": "return 'red path'"}},
            {"id": "B", "type": "codeExecutor", "data": {"code": "return 'blue path'"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "C"},
            {"id": "e2", "source": "C", "target": "S"},
            {"id": "e3", "source": "S", "target": "R", "sourceHandle": "S-case-red"},
            {"id": "e4", "source": "S", "target": "B", "sourceHandle": "S-case-blue"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    assert_eq!(state.node_record("R").unwrap().status, NodeStatus::Success);
    assert_eq!(state.node_record("B").unwrap().status, NodeStatus::Pending);
}

#[tokio::test]
async fn diamond_waits_for_both_parents() {
    // T feeds C directly and through A; C must start only after A finished.
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "A", "type": "codeExecutor", "data": {"code": "return {from_a = true}"}},
            {"id": "C", "type": "codeExecutor", "data": {"code": "return inputs"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "A"},
            {"id": "e2", "source": "T", "target": "C"},
            {"id": "e3", "source": "A", "target": "C"}
        ]
    }));

    let engine = engine().await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let output = engine.state().node_output("C").unwrap();
    let map = output.as_object().unwrap();
    assert!(map.contains_key("T"));
    assert_eq!(map["A"], json!({"from_a": true}));
}

#[tokio::test]
async fn node_failure_fails_the_run_fast() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "C", "type": "codeExecutor", "data": {"code": "error('boom')"}},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "C"},
            {"id": "e2", "source": "C", "target": "O"}
        ]
    }));

    let engine = engine().await;
    let result = engine.run(Arc::new(workflow)).await;
    assert!(matches!(result, Err(EngineError::ExternalError(_))));

    let state = engine.state();
    assert_eq!(state.node_record("C").unwrap().status, NodeStatus::Error);
    assert_eq!(state.node_record("O").unwrap().status, NodeStatus::Pending);
    assert!(state.run_end().is_some());
}

#[tokio::test]
async fn validator_failure_marks_node_without_executing() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "C", "type": "codeExecutor", "data": {}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "C"}
        ]
    }));

    let engine = engine().await;
    let result = engine.run(Arc::new(workflow)).await;
    assert!(matches!(result, Err(EngineError::ValidationFailed(_))));

    let record = engine.state().node_record("C").unwrap();
    assert_eq!(record.status, NodeStatus::Error);
    assert!(record.error.as_deref().unwrap().contains("code"));
    assert!(record.output.is_none());
}

#[tokio::test]
async fn pause_holds_nodes_at_the_boundary() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "O"}
        ]
    }));

    let engine = engine().await;
    engine.pause();
    let handle = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(Arc::new(workflow)).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    let state = engine.state();
    assert!(state.is_running());
    assert_eq!(state.node_record("T").unwrap().status, NodeStatus::Pending);

    engine.resume();
    handle.await.unwrap().unwrap();
    assert_eq!(state.node_record("O").unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn empty_workflow_is_rejected() {
    let engine = engine().await;
    let result = engine.run(Arc::new(wf(json!({"nodes": [], "edges": []})))).await;
    assert!(matches!(result, Err(EngineError::NoEntry)));
}

#[tokio::test]
async fn tts_and_image_nodes_store_artifacts() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "S", "type": "textToSpeech", "data": {"text": "hello there"}},
            {"id": "G", "type": "imageGeneration", "data": {"prompt": "a lighthouse"}},
            {"id": "O", "type": "output"},
            {"id": "M", "type": "merge", "data": {"mergeStrategy": "object"}}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "S"},
            {"id": "e2", "source": "T", "target": "G"},
            {"id": "e3", "source": "S", "target": "M"},
            {"id": "e4", "source": "G", "target": "M"},
            {"id": "e5", "source": "M", "target": "O"}
        ]
    }));

    let engine = engine_with(|services| {
        services.speech = Some(Arc::new(MockSpeech));
        services.image = Some(Arc::new(MockImage));
    })
    .await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let state = engine.state();
    let speech = state.node_output("S").unwrap();
    assert_eq!(speech["type"], json!("audio/wav"));
    let image = state.node_output("G").unwrap();
    assert_eq!(image["type"], json!("image/png"));
}

#[tokio::test]
async fn llm_node_returns_response_and_model() {
    let workflow = wf(json!({
        "nodes": [
            {"id": "T", "type": "manualTrigger"},
            {"id": "L", "type": "llm", "data": {"modelId": "mock"}},
            {"id": "O", "type": "output"}
        ],
        "edges": [
            {"id": "e1", "source": "T", "target": "L"},
            {"id": "e2", "source": "L", "target": "O"}
        ]
    }));

    let engine = engine_with(|services| {
        services.llm = Some(MockLlm::new(vec!["hello from the model"]));
    })
    .await;
    engine.run(Arc::new(workflow)).await.unwrap();

    let output = engine.state().node_output("L").unwrap();
    assert_eq!(output["response"], json!("hello from the model"));
    assert_eq!(output["model"], json!("mock"));
}
