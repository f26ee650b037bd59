use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use austin_api::app::{build_app, services::AppServices};
use austin_core::{Page, PageRequest, TodoId};
use austin_infra::{AppConfig, InMemoryStore, LoadMode, MemberLinks, StoreResult, TodoRepository};
use austin_todos::Todo;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppServices::in_memory(&AppConfig::default())).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        // Same router as prod, ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_user(&self, email: &str) -> i64 {
        let res = self
            .client
            .post(self.url("/api/one-grid-users"))
            .json(&json!({ "email": email, "group": "USER" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    async fn create_todo(&self, task: &str, users: &[i64]) -> Value {
        let users: Vec<Value> = users.iter().map(|id| json!({ "id": id })).collect();
        let res = self
            .client
            .post(self.url("/api/todos"))
            .json(&json!({ "task": task, "scheduledTime": "09:00", "users": users }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Todo repository that counts hydrated reads before delegating.
struct CountingTodos {
    inner: Arc<InMemoryStore>,
    hydrated: Arc<AtomicUsize>,
}

impl CountingTodos {
    fn note(&self, mode: LoadMode) {
        if mode == LoadMode::Hydrated {
            self.hydrated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl TodoRepository for CountingTodos {
    async fn save(&self, todo: Todo, links: MemberLinks) -> StoreResult<Todo> {
        self.inner.save(todo, links).await
    }

    async fn exists_by_id(&self, id: TodoId) -> StoreResult<bool> {
        TodoRepository::exists_by_id(&*self.inner, id).await
    }

    async fn delete_by_id(&self, id: TodoId) -> StoreResult<bool> {
        TodoRepository::delete_by_id(&*self.inner, id).await
    }

    async fn find_by_id(&self, id: TodoId, mode: LoadMode) -> StoreResult<Option<Todo>> {
        self.note(mode);
        TodoRepository::find_by_id(&*self.inner, id, mode).await
    }

    async fn find_all(&self, mode: LoadMode) -> StoreResult<Vec<Todo>> {
        self.note(mode);
        TodoRepository::find_all(&*self.inner, mode).await
    }

    async fn find_page(&self, request: PageRequest, mode: LoadMode) -> StoreResult<Page<Todo>> {
        self.note(mode);
        self.inner.find_page(request, mode).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.inner.count().await
    }
}

fn user_ids(todo: &Value) -> Vec<i64> {
    todo["users"]
        .as_array()
        .map(|users| users.iter().filter_map(|u| u["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_todo_returns_location_alert_and_users() {
    let srv = TestServer::spawn().await;
    let u1 = srv.create_user("a@example.com").await;
    let u2 = srv.create_user("b@example.com").await;

    let res = srv
        .client
        .post(srv.url("/api/todos"))
        .header("X-Actor-Id", "7")
        .json(&json!({
            "task": "AAAAAAAAAA",
            "scheduledTime": "AAAAAAAAAA",
            "users": [{ "id": u2 }, { "id": u1 }, { "id": u2 }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let location = res.headers()["location"].to_str().unwrap().to_string();
    assert_eq!(res.headers()["x-austinapp-alert"], "austinApp.austinTodo.created");
    let body: Value = res.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();

    assert_eq!(location, format!("/api/todos/{id}"));
    assert_eq!(body["task"], "AAAAAAAAAA");
    assert_eq!(body["createdBy"], 7);
    assert!(body["createdDate"].is_string());
    assert_eq!(user_ids(&body), vec![u1, u2]);
}

#[tokio::test]
async fn create_todo_with_existing_id_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/api/todos"))
        .json(&json!({ "id": 1, "task": "t", "scheduledTime": "09:00" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "idexists");

    let res = srv.client.get(srv.url("/api/todos")).send().await.unwrap();
    let all: Value = res.json().await.unwrap();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn required_fields_are_checked() {
    let srv = TestServer::spawn().await;

    for body in [
        json!({ "task": "", "scheduledTime": "09:00" }),
        json!({ "task": "t", "scheduledTime": " " }),
    ] {
        let res = srv.client.post(srv.url("/api/todos")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
    }
}

#[tokio::test]
async fn unknown_user_reference_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/api/todos"))
        .json(&json!({ "task": "t", "scheduledTime": "09:00", "users": [{ "id": 404 }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_reference");
}

#[tokio::test]
async fn list_hydrates_only_with_eagerload() {
    let srv = TestServer::spawn().await;
    let u = srv.create_user("a@example.com").await;
    srv.create_todo("first", &[u]).await;
    srv.create_todo("second", &[]).await;

    let bare: Value = srv
        .client
        .get(srv.url("/api/todos?eagerload=false"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bare = bare.as_array().unwrap();
    assert_eq!(bare.len(), 2);
    assert!(bare.iter().all(|t| user_ids(t).is_empty()));

    let eager: Value = srv
        .client
        .get(srv.url("/api/todos?eagerload=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let eager = eager.as_array().unwrap();
    assert_eq!(eager[0]["task"], "first");
    assert_eq!(user_ids(&eager[0]), vec![u]);
    assert!(user_ids(&eager[1]).is_empty());
}

#[tokio::test]
async fn paged_list_keeps_order_and_reports_total() {
    let srv = TestServer::spawn().await;
    let u = srv.create_user("a@example.com").await;
    for i in 0..5 {
        srv.create_todo(&format!("task {i}"), &[u]).await;
    }

    let res = srv
        .client
        .get(srv.url("/api/todos?eagerload=true&page=1&size=2"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-total-count"], "5");
    let page: Value = res.json().await.unwrap();
    let page = page.as_array().unwrap();
    let tasks: Vec<_> = page.iter().map(|t| t["task"].as_str().unwrap()).collect();
    assert_eq!(tasks, vec!["task 2", "task 3"]);
    assert!(page.iter().all(|t| user_ids(t) == vec![u]));
}

#[tokio::test]
async fn get_todo_returns_each_user_once() {
    let srv = TestServer::spawn().await;
    let u1 = srv.create_user("a@example.com").await;
    let u2 = srv.create_user("b@example.com").await;
    let created = srv.create_todo("t", &[u1, u2, u1]).await;
    let id = created["id"].as_i64().unwrap();

    for _ in 0..2 {
        let res = srv.client.get(srv.url(&format!("/api/todos/{id}"))).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(user_ids(&body), vec![u1, u2]);
        assert!(body["users"][0].get("todos").is_none());
    }
}

#[tokio::test]
async fn get_missing_todo_is_404() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/api/todos/9999")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.client.get(srv.url("/api/todos/not-a-number")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn put_checks_ids_in_order() {
    let srv = TestServer::spawn().await;
    let created = srv.create_todo("t", &[]).await;
    let id = created["id"].as_i64().unwrap();

    let cases = [
        (format!("/api/todos/{id}"), json!({ "task": "x", "scheduledTime": "y" }), "idnull"),
        (format!("/api/todos/{id}"), json!({ "id": id + 1, "task": "x", "scheduledTime": "y" }), "idinvalid"),
        ("/api/todos/9999".to_string(), json!({ "id": 9999, "task": "x", "scheduledTime": "y" }), "idnotfound"),
    ];
    for (path, body, code) in cases {
        let res = srv.client.put(srv.url(&path)).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{code}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], code);
    }
}

#[tokio::test]
async fn put_replaces_fields_and_users() {
    let srv = TestServer::spawn().await;
    let u1 = srv.create_user("a@example.com").await;
    let u2 = srv.create_user("b@example.com").await;
    let created = srv.create_todo("AAAAAAAAAA", &[u1]).await;
    let id = created["id"].as_i64().unwrap();

    let res = srv
        .client
        .put(srv.url(&format!("/api/todos/{id}")))
        .header("X-Actor-Id", "3")
        .json(&json!({ "id": id, "task": "BBBBBBBBBB", "scheduledTime": "BBBBBBBBBB", "users": [{ "id": u2 }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-austinapp-alert"], "austinApp.austinTodo.updated");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["task"], "BBBBBBBBBB");
    assert_eq!(body["lastModifiedBy"], 3);
    assert_eq!(body["createdDate"], created["createdDate"]);
    assert_eq!(user_ids(&body), vec![u2]);
}

#[tokio::test]
async fn patch_merges_present_fields_only() {
    let srv = TestServer::spawn().await;
    let u = srv.create_user("a@example.com").await;
    let created = srv.create_todo("AAAAAAAAAA", &[u]).await;
    let id = created["id"].as_i64().unwrap();

    let res = srv
        .client
        .patch(srv.url(&format!("/api/todos/{id}")))
        .header("content-type", "application/merge-patch+json")
        .body(json!({ "id": id, "task": "BBBBBBBBBB", "scheduledTime": null }).to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["task"], "BBBBBBBBBB");
    assert_eq!(body["scheduledTime"], "09:00");
    assert!(user_ids(&body).is_empty());

    let stored: Value = srv
        .client
        .get(srv.url(&format!("/api/todos/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["task"], "BBBBBBBBBB");
    assert_eq!(user_ids(&stored), vec![u]);

    let res = srv
        .client
        .patch(srv.url(&format!("/api/todos/{id}")))
        .json(&json!({ "id": id, "users": [] }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(user_ids(&body).is_empty());
}

#[tokio::test]
async fn patch_of_missing_todo_is_idnotfound() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .patch(srv.url("/api/todos/77"))
        .json(&json!({ "id": 77, "task": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "idnotfound");
}

#[tokio::test]
async fn deleting_one_todo_leaves_shared_users_on_the_other() {
    let srv = TestServer::spawn().await;
    let shared = srv.create_user("shared@example.com").await;
    let first = srv.create_todo("first", &[shared]).await;
    let second = srv.create_todo("second", &[shared]).await;

    let res = srv
        .client
        .delete(srv.url(&format!("/api/todos/{}", first["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = srv
        .client
        .get(srv.url(&format!("/api/todos/{}", first["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let remaining: Value = srv
        .client
        .get(srv.url(&format!("/api/todos/{}", second["id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user_ids(&remaining), vec![shared]);
}

#[tokio::test]
async fn member_lifecycle() {
    let srv = TestServer::spawn().await;
    let id = srv.create_user("AAAAAAAAAA").await;

    let res = srv
        .client
        .patch(srv.url(&format!("/api/one-grid-users/{id}")))
        .json(&json!({ "id": id, "group": "ADMIN" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["email"], "AAAAAAAAAA");
    assert_eq!(body["group"], "ADMIN");

    let todo = srv.create_todo("t", &[id]).await;

    let res = srv
        .client
        .delete(srv.url(&format!("/api/one-grid-users/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let hydrated: Value = srv
        .client
        .get(srv.url(&format!("/api/todos/{}", todo["id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(user_ids(&hydrated).is_empty());
}

#[tokio::test]
async fn authorities_are_listed_and_created_by_name() {
    let srv = TestServer::spawn().await;

    let all: Value = srv.client.get(srv.url("/api/authorities")).send().await.unwrap().json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);

    let res = srv
        .client
        .post(srv.url("/api/authorities"))
        .json(&json!({ "name": "ROLE_AUDITOR" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv
        .client
        .post(srv.url("/api/authorities"))
        .json(&json!({ "name": "ROLE_AUDITOR" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.client.get(srv.url("/api/authorities/ROLE_AUDITOR")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/api/authorities/ROLE_MISSING")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_actor_header_is_rejected() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(srv.url("/api/todos"))
        .header("X-Actor-Id", "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn todo_writes_do_not_hydrate() {
    let store = Arc::new(InMemoryStore::new());
    let hydrated = Arc::new(AtomicUsize::new(0));
    let mut services = AppServices::with_store(store.clone(), &AppConfig::default());
    services.todos = Arc::new(CountingTodos { inner: store, hydrated: hydrated.clone() });
    let srv = TestServer::spawn_with(services).await;

    let u = srv.create_user("a@example.com").await;
    let created = srv.create_todo("AAAAAAAAAA", &[u]).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(user_ids(&created), vec![u]);

    let res = srv
        .client
        .put(srv.url(&format!("/api/todos/{id}")))
        .json(&json!({ "id": id, "task": "BBBBBBBBBB", "scheduledTime": "09:00", "users": [{ "id": u }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(user_ids(&body), vec![u]);

    for patch in [json!({ "id": id, "task": "CCCCCCCCCC" }), json!({ "id": id, "users": [] })] {
        let res = srv
            .client
            .patch(srv.url(&format!("/api/todos/{id}")))
            .json(&patch)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = srv.client.delete(srv.url(&format!("/api/todos/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(hydrated.load(Ordering::SeqCst), 0);

    let res = srv.client.get(srv.url(&format!("/api/todos/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(hydrated.load(Ordering::SeqCst), 1);
}
