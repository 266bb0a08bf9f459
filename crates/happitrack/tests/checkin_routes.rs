use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use happitrack::history::{
    LogEntry, LogStore, MemoryHistoryStore, NewUser, Role, SqliteHistoryStore, StoreError, User,
    UserDirectory, UserId,
};
use happitrack::mood::{Score, TipBucket};
use happitrack::notify::{MemoryOutbox, NotifyError, SummaryEmail, SummaryNotifier};
use happitrack::router::USER_ID_HEADER;
use happitrack::{mood_router, MoodService};

struct Harness {
    router: Router,
    user: User,
    admin: User,
    outbox: MemoryOutbox,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryHistoryStore::new());
    let outbox = MemoryOutbox::with_sender("coach@happitrack.test");
    let user = store
        .create_user(NewUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        })
        .await
        .expect("user created");
    let admin = store
        .create_user(NewUser {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        })
        .await
        .expect("admin created");

    let service = Arc::new(MoodService::new(store, Arc::new(outbox.clone())));
    Harness {
        router: mood_router(service),
        user,
        admin,
        outbox,
    }
}

fn check_in(body: &str, caller: Option<&User>) -> Request<Body> {
    let mut builder = Request::post("/api/v1/checkins")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(user) = caller {
        builder = builder.header(USER_ID_HEADER, user.id.to_string());
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_as(uri: &str, caller: &User) -> Request<Body> {
    Request::get(uri)
        .header(USER_ID_HEADER, caller.id.to_string())
        .body(Body::empty())
        .expect("request")
}

async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

async fn read_json(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json payload")
}

/// Directory that works but whose log table rejects every write.
struct ReadOnlyLog {
    inner: MemoryHistoryStore,
}

#[async_trait]
impl LogStore for ReadOnlyLog {
    async fn append(&self, _user_id: UserId, _score: Score) -> Result<LogEntry, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }

    async fn list(&self, user_id: UserId) -> Result<Vec<LogEntry>, StoreError> {
        self.inner.list(user_id).await
    }
}

#[async_trait]
impl UserDirectory for ReadOnlyLog {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.create_user(user).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.find_user(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_username(username).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.list_users().await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        self.inner.delete_user(id).await
    }
}

/// Relay that is configured but refuses every message.
#[derive(Default)]
struct RefusingRelay {
    attempts: AtomicUsize,
}

impl SummaryNotifier for RefusingRelay {
    fn sender(&self) -> Option<&str> {
        Some("coach@happitrack.test")
    }

    fn send(&self, _email: SummaryEmail) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Transport("connection refused".to_string()))
    }
}

async fn ada(store: &impl UserDirectory) -> User {
    store
        .create_user(NewUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        })
        .await
        .expect("user created")
}

const PERFECT_DAY: &str = "sleep=10&exercise=5&connections=5&gratitude=5&overall=10";

#[tokio::test]
async fn anonymous_check_in_scores_without_logging() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(check_in(&format!("{PERFECT_DAY}&log=on"), None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["score"], 100.0);
    assert_eq!(payload["logged"], false);
    let tip = payload["tip"].as_str().expect("tip string");
    assert!(TipBucket::High.tips().iter().any(|candidate| *candidate == tip));
}

#[tokio::test]
async fn garbage_answers_score_zero() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(check_in("sleep=lots&exercise=&overall=abc", None))
        .await
        .expect("route executes");

    let payload = read_json(response).await;
    assert_eq!(payload["score"], 0.0);
    let tip = payload["tip"].as_str().expect("tip string");
    assert!(TipBucket::Low.tips().iter().any(|candidate| *candidate == tip));
}

#[tokio::test]
async fn logged_check_ins_show_up_in_history_and_export() {
    let h = harness().await;

    for body in [
        "sleep=6&exercise=3&connections=3&gratitude=3&overall=6&log=on",
        "sleep=8&exercise=4&connections=4&gratitude=4&overall=8&log=on",
        "sleep=8&exercise=4&connections=4&gratitude=4&overall=8",
    ] {
        let response = h
            .router
            .clone()
            .oneshot(check_in(body, Some(&h.user)))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let history = h
        .router
        .clone()
        .oneshot(get_as("/api/v1/history", &h.user))
        .await
        .expect("route executes");
    assert_eq!(history.status(), StatusCode::OK);
    let payload = read_json(history).await;
    let scores: Vec<f64> = payload["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|entry| entry["score"].as_f64().expect("score"))
        .collect();
    assert_eq!(scores, vec![60.0, 80.0]);
    assert_eq!(payload["summary"]["average"], 70.0);
    assert_eq!(payload["summary"]["count"], 2);

    let export = h
        .router
        .oneshot(get_as("/api/v1/history/export", &h.user))
        .await
        .expect("route executes");
    assert_eq!(export.status(), StatusCode::OK);
    assert_eq!(
        export.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let csv = String::from_utf8(read_body(export).await).expect("utf8");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Date,Score");
    assert!(lines[1].ends_with(",60.0"));
    assert!(lines[2].ends_with(",80.0"));
}

#[tokio::test]
async fn history_requires_identity() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(
            Request::get("/api/v1/history")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = h
        .router
        .oneshot(
            Request::get("/api/v1/history")
                .header(USER_ID_HEADER, "not-a-number")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_caller_is_rejected() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(
            Request::post("/api/v1/checkins")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(USER_ID_HEADER, "9999")
                .body(Body::from(PERFECT_DAY))
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_export_is_header_only() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(get_as("/api/v1/history/export", &h.user))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"Date,Score\n");
}

#[tokio::test]
async fn summary_request_is_accepted_and_delivered() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(
            Request::post("/api/v1/history/summary")
                .header(USER_ID_HEADER, h.user.id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(read_json(response).await["queued"], true);

    for _ in 0..50 {
        if !h.outbox.sent().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "ada@example.com");
    assert_eq!(sent[0].body, "Your avg score: 0.0. Keep shining!");
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let h = harness().await;

    let response = h
        .router
        .oneshot(
            Request::delete(format!("/api/v1/admin/users/{}", h.admin.id))
                .header(USER_ID_HEADER, h.user.id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_provision_and_remove_users() {
    let h = harness().await;

    let created = h
        .router
        .clone()
        .oneshot(
            Request::post("/api/v1/admin/users")
                .header(USER_ID_HEADER, h.admin.id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"username":"grace","email":"grace@example.com"}"#,
                ))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = read_json(created).await;
    assert_eq!(payload["role"], "user");
    let new_id = payload["id"].as_i64().expect("id");

    let removed = h
        .router
        .clone()
        .oneshot(
            Request::delete(format!("/api/v1/admin/users/{new_id}"))
                .header(USER_ID_HEADER, h.admin.id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);

    let missing = h
        .router
        .oneshot(
            Request::delete(format!("/api/v1/admin/users/{new_id}"))
                .header(USER_ID_HEADER, h.admin.id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sqlite_backed_router_logs_check_ins() {
    let store = Arc::new(SqliteHistoryStore::in_memory().await.expect("sqlite opens"));
    let user = store
        .create_user(NewUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        })
        .await
        .expect("user created");
    let router = mood_router(Arc::new(MoodService::new(
        store,
        Arc::new(MemoryOutbox::disabled()),
    )));

    let response = router
        .clone()
        .oneshot(check_in(&format!("{PERFECT_DAY}&log=true"), Some(&user)))
        .await
        .expect("route executes");
    assert_eq!(read_json(response).await["logged"], true);

    let history = router
        .oneshot(get_as("/api/v1/history", &user))
        .await
        .expect("route executes");
    let payload = read_json(history).await;
    assert_eq!(payload["entries"][0]["score"], 100.0);
    assert_eq!(payload["summary"]["average"], 100.0);
}

#[tokio::test]
async fn failed_log_write_returns_500_with_error_body() {
    let store = Arc::new(ReadOnlyLog {
        inner: MemoryHistoryStore::new(),
    });
    let user = ada(store.as_ref()).await;
    let router = mood_router(Arc::new(MoodService::new(
        store,
        Arc::new(MemoryOutbox::disabled()),
    )));

    let response = router
        .oneshot(check_in(&format!("{PERFECT_DAY}&log=on"), Some(&user)))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json(response).await;
    let message = payload["error"].as_str().expect("error string");
    assert!(message.contains("database is locked"));
}

#[tokio::test]
async fn failed_summary_delivery_is_still_accepted() {
    let store = Arc::new(MemoryHistoryStore::new());
    let user = ada(store.as_ref()).await;
    let relay = Arc::new(RefusingRelay::default());
    let service = Arc::new(MoodService::new(store, Arc::clone(&relay)));
    let router = mood_router(Arc::clone(&service));

    let response = router
        .oneshot(
            Request::post("/api/v1/history/summary")
                .header(USER_ID_HEADER, user.id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(read_json(response).await["queued"], true);

    for _ in 0..50 {
        if relay.attempts.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(relay.attempts.load(Ordering::SeqCst), 1);

    let handle = service
        .send_summary(&user)
        .await
        .expect("queued")
        .expect("mail enabled");
    handle.await.expect("delivery task does not panic");
    assert_eq!(relay.attempts.load(Ordering::SeqCst), 2);
}
