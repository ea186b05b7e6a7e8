use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chainrun_core::config::RunnerConfig;
use chainrun_core::traits::{ExecutionStore, RunStore, UserStore, WorkflowStore};
use chainrun_core::types::{Execution, ExecutionId, ExecutionStatus, WorkflowDraft, ERROR_KEY};
use chainrun_engine::{ExecutionEngine, ExecutionService, RunQueue};
use chainrun_store::SqliteStore;
use chainrun_test_utils::{fixtures, StubGenerator};

async fn settle(store: &SqliteStore, id: ExecutionId) -> Execution {
    for _ in 0..300 {
        let execution = store
            .load_execution(id)
            .await
            .expect("load")
            .expect("execution exists");
        if execution.status.is_terminal() {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {id} never finished");
}

fn service(store: &SqliteStore, stub: StubGenerator, cancel: &CancellationToken) -> ExecutionService {
    let engine = Arc::new(ExecutionEngine::new(Arc::new(stub), Duration::from_secs(5)));
    let (queue, _) = RunQueue::start(
        engine,
        Arc::new(store.clone()),
        &RunnerConfig::default(),
        cancel.clone(),
    );
    let shared: Arc<dyn RunStore> = Arc::new(store.clone());
    ExecutionService::new(shared, queue)
}

#[tokio::test]
async fn test_editor_json_runs_end_to_end_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(&dir.path().join("runs.db")).expect("open db");
    let cancel = CancellationToken::new();
    let svc = service(&store, StubGenerator::new().respond("hello", "HI"), &cancel);

    let draft: WorkflowDraft = serde_json::from_value(serde_json::json!({
        "name": "from the editor",
        "nodes": [
            {"id": "c", "type": "textOutput", "data": {"label": "Result"}, "position": {"x": 400, "y": 0}},
            {"id": "a", "type": "textInput", "data": {"text": "hello"}, "position": {"x": 0, "y": 0}},
            {"id": "b", "type": "geminiPrompt", "data": {}, "position": {"x": 200, "y": 0}}
        ],
        "edges": [
            {"id": "e1", "source": "a", "target": "b"},
            {"id": "e2", "source": "b", "target": "c"}
        ]
    }))
    .expect("draft parses");

    let user = store.create_user("e2e@example.com".into()).await.unwrap();
    let wf = store.create_workflow(user.id, draft).await.unwrap();
    let triggered = svc.trigger(wf.id, user.id).await.unwrap();

    let done = settle(&store, triggered.execution_id).await;
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(
        serde_json::Value::Object(done.results),
        serde_json::json!({"a": "hello", "b": "HI", "c": "HI"})
    );
    cancel.cancel();
}

#[tokio::test]
async fn test_generator_error_overwrites_results() {
    let store = SqliteStore::in_memory().unwrap();
    let cancel = CancellationToken::new();
    let svc = service(&store, StubGenerator::new().fail_with("model overloaded"), &cancel);

    let user = store.create_user("fail@example.com".into()).await.unwrap();
    let wf = store.create_workflow(user.id, fixtures::hello_chain()).await.unwrap();
    let triggered = svc.trigger(wf.id, user.id).await.unwrap();

    let done = settle(&store, triggered.execution_id).await;
    assert_eq!(done.status, ExecutionStatus::Failed);
    assert_eq!(done.results.len(), 1);
    assert!(done.results.get("a").is_none());
    assert!(done.error_message().unwrap().contains("model overloaded"));
    assert!(done.results[ERROR_KEY].is_string());
    cancel.cancel();
}

#[tokio::test]
async fn test_cycle_without_start_fails_fast() {
    let store = SqliteStore::in_memory().unwrap();
    let cancel = CancellationToken::new();
    let stub = StubGenerator::new();
    let svc = service(&store, stub, &cancel);

    let draft: WorkflowDraft = serde_json::from_value(serde_json::json!({
        "name": "loop",
        "nodes": [
            {"id": "a", "type": "text_input", "data": {"text": "hello"}},
            {"id": "b", "type": "gemini_prompt"}
        ],
        "edges": [
            {"source": "a", "target": "b"},
            {"source": "b", "target": "a"}
        ]
    }))
    .unwrap();

    let user = store.create_user("loop@example.com".into()).await.unwrap();
    let wf = store.create_workflow(user.id, draft).await.unwrap();
    let triggered = svc.trigger(wf.id, user.id).await.unwrap();

    let done = settle(&store, triggered.execution_id).await;
    assert_eq!(done.status, ExecutionStatus::Failed);
    assert!(done.error_message().unwrap().contains("starting point"));
    cancel.cancel();
}

#[tokio::test]
async fn test_runs_of_one_workflow_are_independent() {
    let store = SqliteStore::in_memory().unwrap();
    let cancel = CancellationToken::new();
    let svc = service(&store, StubGenerator::new(), &cancel);

    let user = store.create_user("twice@example.com".into()).await.unwrap();
    let wf = store.create_workflow(user.id, fixtures::hello_chain()).await.unwrap();
    let first = svc.trigger(wf.id, user.id).await.unwrap().execution_id;
    let second = svc.trigger(wf.id, user.id).await.unwrap().execution_id;
    assert_ne!(first, second);

    let one = settle(&store, first).await;
    let two = settle(&store, second).await;
    assert_eq!(one.results, two.results);
    assert_eq!(one.results["b"], "HELLO");

    let listed = svc.list(wf.id, user.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second);
    cancel.cancel();
}

#[tokio::test]
async fn test_foreign_owner_sees_not_found() {
    let store = SqliteStore::in_memory().unwrap();
    let cancel = CancellationToken::new();
    let svc = service(&store, StubGenerator::new(), &cancel);

    let owner = store.create_user("owner@example.com".into()).await.unwrap();
    let intruder = store.create_user("intruder@example.com".into()).await.unwrap();
    let wf = store.create_workflow(owner.id, fixtures::hello_chain()).await.unwrap();
    let triggered = svc.trigger(wf.id, owner.id).await.unwrap();

    let foreign = svc.get(triggered.execution_id, intruder.id).await.unwrap_err();
    let absent = svc.get(ExecutionId(9_999), intruder.id).await.unwrap_err();
    assert!(foreign.is_not_found());
    assert!(absent.is_not_found());

    assert!(store.get_workflow(wf.id, intruder.id).await.unwrap().is_none());
    cancel.cancel();
}

#[tokio::test]
async fn test_echo_provider_from_config() {
    let config = fixtures::test_config();
    let generator = chainrun_llm::create_generator(&config.generation).expect("echo provider");
    let engine = ExecutionEngine::from_config(generator, &config.generation);

    let store = SqliteStore::in_memory().unwrap();
    let user = store.create_user("echo@example.com".into()).await.unwrap();
    let wf = store.create_workflow(user.id, fixtures::hello_chain()).await.unwrap();
    let ex = store.create_execution(wf.id).await.unwrap();

    engine.run(&store, wf.id, ex.id).await;

    let done = store.load_execution(ex.id).await.unwrap().unwrap();
    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.results["c"], "hello");
    assert_eq!(config.gateway.api_keys[0].key, "ck_test");
}
