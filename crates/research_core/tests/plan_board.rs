use pretty_assertions::assert_eq;
use research_core::{
    reduce_plan_board, Event, EventKind, PlanBoard, TaskStatus, TaskUpdateKind,
    PLANNING_TASK_ID,
};
use serde_json::{json, Value};

fn plan(tasks: Value) -> Event {
    Event::new(EventKind::PlanUpdate, tasks)
}

fn task_update(task_id: &str, payload: Value) -> Event {
    Event::new(EventKind::TaskUpdate, payload).with_task(task_id)
}

fn two_task_plan() -> Event {
    plan(json!({
        "tasks": [
            { "id": "T1", "title": "Fundamentals", "description": "Read filings", "status": "pending", "agentType": "analyst" },
            { "id": "T2", "title": "Sentiment", "status": "pending", "agent_type": "news" }
        ]
    }))
}

#[test]
fn same_task_thoughts_merge_and_other_tasks_never_join() {
    let events = vec![
        two_task_plan(),
        task_update("T1", json!({ "kind": "thought", "content": "A" })),
        task_update("T1", json!({ "kind": "thought", "content": "B" })),
        task_update("T2", json!({ "kind": "thought", "content": "C" })),
        task_update("T1", json!({ "kind": "thought", "content": "D" })),
    ];

    let board = reduce_plan_board(&events);
    let items: Vec<(Option<&str>, &str)> = board
        .stream()
        .iter()
        .map(|item| (item.task_id.as_deref(), item.content.as_str()))
        .collect();

    assert_eq!(
        items,
        vec![(Some("T1"), "AB"), (Some("T2"), "C"), (Some("T1"), "D")]
    );
}

#[test]
fn different_kind_starts_new_item() {
    let events = vec![
        task_update("T1", json!({ "kind": "thought", "content": "plan" })),
        task_update("T1", json!({ "kind": "tool_call", "tool": "quote", "args": { "symbol": "MSFT" } })),
        task_update("T1", json!({ "kind": "tool_result", "content": "412.3" })),
        task_update("T1", json!({ "kind": "thought", "content": "ok" })),
    ];

    let board = reduce_plan_board(&events);
    let kinds: Vec<TaskUpdateKind> = board.stream().iter().map(|item| item.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TaskUpdateKind::Thought,
            TaskUpdateKind::ToolCall,
            TaskUpdateKind::ToolResult,
            TaskUpdateKind::Thought,
        ]
    );
    assert_eq!(board.stream()[1].content, r#"quote {"symbol":"MSFT"}"#);
}

#[test]
fn plan_update_replaces_snapshot() {
    let events = vec![
        two_task_plan(),
        plan(json!([{ "id": "T3", "title": "Valuation" }])),
    ];

    let board = reduce_plan_board(&events);
    let ids: Vec<&str> = board.tasks().iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["T3"]);
    assert_eq!(board.tasks()[0].status, TaskStatus::Pending);
}

#[test]
fn task_fields_are_normalised() {
    let board = reduce_plan_board(&[two_task_plan()]);
    let t1 = board.task("T1").expect("T1");
    assert_eq!(t1.title, "Fundamentals");
    assert_eq!(t1.description, "Read filings");
    assert_eq!(t1.agent_type, "analyst");
    assert_eq!(board.task("T2").map(|task| task.agent_type.as_str()), Some("news"));
}

#[test]
fn task_status_never_regresses() {
    let mut board = PlanBoard::new();
    let events = vec![
        two_task_plan(),
        task_update("T1", json!({ "kind": "output", "content": "Revenue up 12%", "status": "completed" })),
        task_update("T1", json!({ "kind": "thought", "content": "again", "status": "in_progress" })),
        plan(json!({ "tasks": [
            { "id": "T1", "title": "Fundamentals", "status": "pending" },
            { "id": "T2", "title": "Sentiment", "status": "failed" }
        ] })),
        task_update("T2", json!({ "kind": "output", "content": "late", "status": "completed" })),
    ];

    let mut observed: Vec<Vec<TaskStatus>> = vec![Vec::new(), Vec::new()];
    for (seq, event) in events.iter().enumerate() {
        board.apply(seq, event);
        for (slot, id) in ["T1", "T2"].iter().enumerate() {
            if let Some(task) = board.task(id) {
                observed[slot].push(task.status);
            }
        }
    }

    for statuses in &observed {
        for pair in statuses.windows(2) {
            assert!(pair[0].rank() <= pair[1].rank(), "regressed: {statuses:?}");
            if pair[0].is_terminal() {
                assert_eq!(pair[0], pair[1]);
            }
        }
    }
    assert_eq!(board.task("T1").map(|task| task.status), Some(TaskStatus::Completed));
    assert_eq!(
        board.task("T1").and_then(|task| task.result.clone()).as_deref(),
        Some("Revenue up 12%")
    );
    assert_eq!(board.task("T2").map(|task| task.status), Some(TaskStatus::Failed));
}

#[test]
fn task_dropped_from_a_plan_keeps_its_status_when_it_returns() {
    let board = reduce_plan_board(&[
        plan(json!([{ "id": "T1", "title": "Fundamentals", "status": "completed", "result": "solid" }])),
        plan(json!([{ "id": "T2", "title": "Sentiment" }])),
        plan(json!([
            { "id": "T1", "title": "Fundamentals", "status": "pending" },
            { "id": "T2", "title": "Sentiment" }
        ])),
    ]);
    assert_eq!(board.task("T1").map(|task| task.status), Some(TaskStatus::Completed));
    assert_eq!(
        board.task("T1").and_then(|task| task.result.as_deref()),
        Some("solid")
    );
    assert_eq!(board.task("T2").map(|task| task.status), Some(TaskStatus::Pending));
}

#[test]
fn activity_moves_pending_task_in_progress() {
    let board = reduce_plan_board(&[
        two_task_plan(),
        task_update("T2", json!({ "kind": "thought", "content": "scanning headlines" })),
    ]);
    assert_eq!(board.task("T2").map(|task| task.status), Some(TaskStatus::InProgress));
    assert_eq!(board.task("T1").map(|task| task.status), Some(TaskStatus::Pending));
}

#[test]
fn focus_filters_stream() {
    let events = vec![
        Event::new(EventKind::TaskUpdate, json!({ "kind": "thought", "content": "splitting work" })),
        task_update(PLANNING_TASK_ID, json!({ "kind": "output", "content": "2 tasks" })),
        task_update("T1", json!({ "kind": "thought", "content": "A" })),
        Event::new(EventKind::TaskUpdate, json!({ "taskId": "T2", "kind": "thought", "content": "B" })),
    ];
    let board = reduce_plan_board(&events);

    let focused = |focus: Option<&str>| -> Vec<String> {
        board
            .stream()
            .iter()
            .filter(|item| item.matches_focus(focus))
            .map(|item| item.content.clone())
            .collect()
    };
    assert_eq!(focused(None), vec!["splitting work", "2 tasks"]);

    let t2 = focused(Some("T2"));
    assert_eq!(t2, vec!["B"]);
}

#[test]
fn unrelated_events_are_ignored_by_the_board() {
    let board = reduce_plan_board(&[
        Event::new(EventKind::Thought, json!("global")),
        Event::new(EventKind::Log, json!("log line")),
    ]);
    assert!(board.tasks().is_empty());
    assert!(board.stream().is_empty());
}
