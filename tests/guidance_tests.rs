use chrono::{Duration, Utc};
use tempfile::TempDir;

use taskwarden::audit::{validate_claim, ClaimValidation};
use taskwarden::guidance::{Guidance, GuidanceEngine};
use taskwarden::store::{JsonStore, TaskDocument, TaskRepository};
use taskwarden::task::{Task, TaskCategory, TaskStatus, DEFAULT_HISTORY_CAP};

#[tokio::test]
async fn guidance_claims_then_continues_across_invocations() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path().join("warden.json"));
    let engine = GuidanceEngine::default();
    let now = Utc::now();

    let mut doc = TaskDocument::default();
    doc.tasks.push(Task::new("only task"));
    store.save(&doc).await.unwrap();

    // First invocation claims.
    let mut doc = store.load().await.unwrap();
    let decision = engine.decide(&doc, "agent-1", now);
    assert!(matches!(decision, Guidance::StartNewTask { .. }));
    engine.apply(&mut doc, "agent-1", &decision, now);
    store.save(&doc).await.unwrap();

    // Second invocation continues the same task.
    let mut doc = store.load().await.unwrap();
    let decision = engine.decide(&doc, "agent-1", now);
    match &decision {
        Guidance::ContinueTask { title, .. } => assert_eq!(title, "only task"),
        other => panic!("expected ContinueTask, got {:?}", other),
    }
    engine.apply(&mut doc, "agent-1", &decision, now);
    store.save(&doc).await.unwrap();

    let reloaded = store.load().await.unwrap();
    assert_eq!(reloaded.counters.execution_count, 2);
}

#[tokio::test]
async fn two_agents_hold_tasks_concurrently() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path().join("warden.json"));
    let engine = GuidanceEngine::default();
    let now = Utc::now();

    let mut doc = TaskDocument::default();
    doc.tasks.push(Task::new("first"));
    doc.tasks.push(Task::new("second"));
    store.save(&doc).await.unwrap();

    let mut doc = store.load().await.unwrap();
    for agent in ["agent-1", "agent-2"] {
        let decision = engine.decide(&doc, agent, now);
        assert!(matches!(decision, Guidance::StartNewTask { .. }));
        engine.apply(&mut doc, agent, &decision, now);
    }
    store.save(&doc).await.unwrap();

    let reloaded = store.load().await.unwrap();
    let holders: Vec<_> = reloaded
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .filter_map(|t| t.assigned_agent.clone())
        .collect();
    assert_eq!(holders.len(), 2);
    assert!(holders.contains(&"agent-1".to_string()));
    assert!(holders.contains(&"agent-2".to_string()));
}

#[tokio::test]
async fn repeated_polling_escalates_to_intervention() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path().join("warden.json"));
    let engine = GuidanceEngine::default();
    let now = Utc::now();

    let mut doc = TaskDocument::default();
    let mut task = Task::new("spinning");
    // Claimed long enough ago that the claim record has left the window.
    task.claim("agent-1", now - Duration::hours(2), DEFAULT_HISTORY_CAP);
    doc.tasks.push(task);
    store.save(&doc).await.unwrap();

    let mut interventions = 0;
    for i in 0..3 {
        let mut doc = store.load().await.unwrap();
        let decision = engine.decide(&doc, "agent-1", now + Duration::minutes(i));
        match &decision {
            Guidance::ContinueTask { .. } => assert!(i < 2, "poll {} should continue", i),
            Guidance::StuckTaskIntervention { guidance, .. } => {
                interventions += 1;
                assert!(guidance.contains("update-status"));
            }
            other => panic!("unexpected guidance {:?}", other),
        }
        engine.apply(&mut doc, "agent-1", &decision, now + Duration::minutes(i));
        store.save(&doc).await.unwrap();
    }
    assert_eq!(interventions, 1);
}

#[tokio::test]
async fn audit_task_routes_to_independent_reviewer() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path().join("warden.json"));
    let engine = GuidanceEngine::default();
    let now = Utc::now();

    let mut doc = TaskDocument::default();
    doc.tasks.push(
        Task::new("audit agent-1's parser")
            .with_category(TaskCategory::Audit)
            .with_original_implementer("agent-1"),
    );
    store.save(&doc).await.unwrap();

    let doc = store.load().await.unwrap();

    // The implementer gets nothing; an independent reviewer is offered the
    // audit.
    assert_eq!(
        engine.decide(&doc, "agent-1", now),
        Guidance::NoTasksAvailable
    );
    assert!(matches!(
        engine.decide(&doc, "agent-2", now),
        Guidance::StartNewTask { .. }
    ));

    // Direct validation mirrors the routing decision.
    let task = &doc.tasks[0];
    assert!(!validate_claim(task, "agent-1", false).is_allowed());
    assert_eq!(
        validate_claim(task, "agent-1", true),
        ClaimValidation::AllowedWithOverride
    );
    assert!(validate_claim(task, "agent-2", false).is_allowed());
}

#[tokio::test]
async fn dependencies_unlock_when_prerequisite_completes() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::new(dir.path().join("warden.json"));
    let engine = GuidanceEngine::default();
    let now = Utc::now();

    let mut doc = TaskDocument::default();
    let prereq = Task::new("prerequisite");
    let prereq_id = prereq.id.clone();
    doc.tasks.push(prereq);
    doc.tasks
        .push(Task::new("dependent").with_dependencies(vec![prereq_id.clone()]));
    store.save(&doc).await.unwrap();

    // Claim and finish the prerequisite.
    let mut doc = store.load().await.unwrap();
    let decision = engine.decide(&doc, "agent-1", now);
    match &decision {
        Guidance::StartNewTask { title, .. } => assert_eq!(title, "prerequisite"),
        other => panic!("expected the prerequisite first, got {:?}", other),
    }
    engine.apply(&mut doc, "agent-1", &decision, now);
    let task = doc.task_mut(&prereq_id).unwrap();
    task.status = TaskStatus::Completed;
    store.save(&doc).await.unwrap();

    // The dependent task is now offered.
    let doc = store.load().await.unwrap();
    match engine.decide(&doc, "agent-1", now) {
        Guidance::StartNewTask { title, .. } => assert_eq!(title, "dependent"),
        other => panic!("expected dependent task, got {:?}", other),
    }
}
