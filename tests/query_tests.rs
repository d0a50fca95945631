//! Hook and session behaviour through the public API, against the in-memory backend.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskdeck::cache::{QueryKey, QueryScope};
use taskdeck::events::{CrudAction, EntityType};
use taskdeck::queries::QueryError;
use taskdeck::remote::{Collection, MemoryBackend, Operation, RemoteError};
use taskdeck::schema::{
    revalidate, AppRole, CreateTaskInput, CreateUserInput, PasswordChangeInput, Schema, Task,
    TaskPriority, TaskStatus, AVATAR_BASE_URL,
};
use taskdeck::toast::Toast;
use taskdeck::{AppContext, Config, LogFormat};
use tokio::sync::broadcast;

// ============================================================================
// Helpers
// ============================================================================

fn config() -> Config {
    Config {
        remote_url: "http://localhost:54321".to_string(),
        anon_key: "anon".to_string(),
        profile_timeout_ms: 5000,
        redirect_to: None,
        cache_max_capacity: 64,
        cache_ttl_secs: 300,
        log_format: LogFormat::Text,
    }
}

fn context() -> (AppContext, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    (AppContext::with_backend(config(), backend.clone()), backend)
}

fn drain(rx: &mut broadcast::Receiver<Toast>) -> Vec<Toast> {
    let mut toasts = Vec::new();
    while let Ok(toast) = rx.try_recv() {
        toasts.push(toast);
    }
    toasts
}

fn new_task(title: &str) -> CreateTaskInput {
    CreateTaskInput {
        title: title.to_string(),
        description: Some("Write the onboarding guide".to_string()),
        status: TaskStatus::Todo,
        priority: TaskPriority::High,
        assignee_id: None,
        due_date: Some("2025-03-01".to_string()),
        labels: Some(vec!["docs".to_string()]),
    }
}

// ============================================================================
// Schema properties
// ============================================================================

#[test]
fn test_valid_create_task_is_preserved() {
    let input = new_task("Docs");
    assert_eq!(revalidate(&input).unwrap(), input);
}

#[test]
fn test_empty_title_rejected_at_title() {
    let errors = CreateTaskInput::validate(&json!({
        "title": "",
        "status": "todo",
        "priority": "low"
    }))
    .unwrap_err();
    assert_eq!(errors.messages_for("title"), vec!["Title is required"]);
}

#[test]
fn test_password_mismatch_reported_at_confirm_password() {
    let errors = PasswordChangeInput::validate(&json!({
        "currentPassword": "old-secret",
        "newPassword": "new-secret",
        "confirmPassword": "other-secret"
    }))
    .unwrap_err();
    assert!(errors.has_field("confirmPassword"));
    assert!(!errors.has_field("newPassword"));
}

#[test]
fn test_task_response_with_bad_status_rejected() {
    let errors = Task::validate(&json!({
        "id": "8f1c2d40-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
        "title": "x",
        "status": "blocked",
        "priority": "low"
    }))
    .unwrap_err();
    assert!(errors.has_field("status"));
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_empty_title_never_reaches_backend() {
    let (ctx, backend) = context();
    let mut toasts = ctx.toasts.subscribe();
    let mut input = new_task("x");
    input.title.clear();

    let err = ctx.queries.create_task(&input, None).await.unwrap_err();
    assert!(err.validation_errors().unwrap().has_field("title"));
    assert_eq!(backend.calls(Collection::Tasks, Operation::Insert), 0);
    let shown = drain(&mut toasts);
    assert_eq!(shown.len(), 1);
    assert!(shown[0].is_destructive());
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_and_toasts() {
    let (ctx, backend) = context();
    let mut toasts = ctx.toasts.subscribe();
    ctx.queries.list_tasks().await.unwrap();
    let before = ctx.queries.cache().invalidations(QueryScope::Tasks);
    backend
        .fail_on(
            Collection::Tasks,
            Operation::Insert,
            RemoteError::new("connection reset").with_status(503),
        )
        .await;

    let err = ctx.queries.create_task(&new_task("Docs"), None).await.unwrap_err();
    assert!(matches!(err, QueryError::Remote(_)));
    assert_eq!(ctx.queries.cache().invalidations(QueryScope::Tasks), before);
    assert!(ctx.queries.cache().contains(&QueryKey::all(QueryScope::Tasks)).await);
    let shown = drain(&mut toasts);
    assert_eq!(shown, vec![Toast::error("Error", "Failed to create task")]);
}

#[tokio::test]
async fn test_successful_mutation_refreshes_list() {
    let (ctx, _backend) = context();
    let mut events = ctx.events.subscribe();
    assert!(ctx.queries.list_tasks().await.unwrap().is_empty());

    let created = ctx.queries.create_task(&new_task("Docs"), None).await.unwrap();
    let listed = ctx.queries.list_tasks().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);

    let event = events.try_recv().unwrap();
    assert_eq!(event.entity_type, EntityType::Task);
    assert_eq!(event.action, CrudAction::Created);
    assert_eq!(event.entity_id, created.id.to_string());
}

#[tokio::test]
async fn test_lists_are_newest_first() {
    let (ctx, _backend) = context();
    for title in ["first", "second", "third"] {
        ctx.queries.create_task(&new_task(title), None).await.unwrap();
    }
    let titles: Vec<String> = ctx
        .queries
        .list_tasks()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_malformed_response_is_a_shape_error() {
    let (ctx, backend) = context();
    let mut toasts = ctx.toasts.subscribe();
    backend
        .override_response(
            Collection::Tasks,
            Operation::Insert,
            json!({ "id": "not-a-uuid", "title": "Docs", "status": "todo", "priority": "high" }),
        )
        .await;

    let err = ctx.queries.create_task(&new_task("Docs"), None).await.unwrap_err();
    match err {
        QueryError::ResponseShape(errors) => assert!(errors.has_field("id")),
        other => panic!("expected a shape error, got {:?}", other),
    }
    assert!(drain(&mut toasts)[0].is_destructive());
}

#[tokio::test]
async fn test_create_user_scenario() {
    let (ctx, backend) = context();
    let mut toasts = ctx.toasts.subscribe();
    ctx.queries.list_profiles().await.unwrap();

    let input = CreateUserInput {
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        email: "ann@x.com".to_string(),
        role: AppRole::Developer,
    };
    let profile = ctx.queries.create_user(&input, None).await.unwrap();

    let rows = backend.rows(Collection::Profiles).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["first_name"], "Ann");
    assert_eq!(rows[0]["last_name"], "Lee");
    assert_eq!(rows[0]["role"], "developer");
    assert_eq!(
        rows[0]["avatar_url"],
        format!("{}?seed=ann@x.com", AVATAR_BASE_URL)
    );
    assert_eq!(rows[0]["id"], profile.id.to_string());

    assert_eq!(
        drain(&mut toasts),
        vec![Toast::success("Success", "User created successfully")]
    );
    assert!(!ctx.queries.cache().contains(&QueryKey::all(QueryScope::Profiles)).await);
}

// ============================================================================
// Session
// ============================================================================

async fn seeded_account(backend: &MemoryBackend) {
    let user = backend
        .add_account("ada@x.com", "secret1", json!({ "first_name": "Ada" }))
        .await;
    backend
        .seed(
            Collection::Profiles,
            json!({
                "id": user.id.to_string(),
                "first_name": "Ada",
                "last_name": "Lovelace",
                "avatar_url": null,
                "role": "admin",
                "updated_at": null
            }),
        )
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_during_profile_fetch_settles_at_once() {
    let (ctx, backend) = context();
    seeded_account(&backend).await;
    backend
        .set_latency(Collection::Profiles, Duration::from_secs(3))
        .await;
    let session = ctx.start_session().await;

    session.sign_in("ada@x.com", "secret1").await.unwrap();
    assert!(session.loading());

    session.sign_out().await;
    let snapshot = session.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.user.is_none());

    // The abandoned fetch finishing later changes nothing
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = session.snapshot();
    assert!(snapshot.user.is_none());
    assert!(snapshot.profile.is_none());
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_profile_ceiling_clears_loading_with_no_profile() {
    let (ctx, backend) = context();
    seeded_account(&backend).await;
    backend
        .set_latency(Collection::Profiles, Duration::from_secs(60))
        .await;
    let session = ctx.start_session().await;

    session.sign_in("ada@x.com", "secret1").await.unwrap();
    let snapshot = session.wait_until_loaded().await;
    assert!(!snapshot.loading);
    assert!(snapshot.is_signed_in());
    assert!(snapshot.profile.is_none());
    assert_eq!(snapshot.display_name().as_deref(), Some("Ada"));
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_session_sign_out_clears_query_cache() {
    let (ctx, backend) = context();
    seeded_account(&backend).await;
    let session = ctx.start_session().await;
    session.sign_in("ada@x.com", "secret1").await.unwrap();
    session.wait_until_loaded().await;
    ctx.queries.list_tasks().await.unwrap();

    session.sign_out().await;
    assert!(!ctx.queries.cache().contains(&QueryKey::all(QueryScope::Tasks)).await);
    session.shutdown().await;
}
