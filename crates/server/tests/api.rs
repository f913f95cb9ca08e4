//! Integration tests for the HTTP API
//!
//! Every test drives the full router (middleware included). Stores are the
//! in-memory backend or one that always fails; the payment processor is a
//! stub gateway or a local axum server standing in for the real API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use http_body_util::BodyExt;
use lifedrops::{
    Collection, DeleteResult, Document, DocumentStore, Filter, FindOptions, InMemoryBackend,
    InsertOneResult, StoreError, StoreResult, Update, UpdateResult,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use server::config::PaymentConfig;
use server::{build_router, PaymentGateway, ServerConfig, ServerResult, ServerState, StripeGateway};
use tower::ServiceExt;

/// Payment gateway that answers every intent with a predictable secret.
struct FixedGateway;

#[async_trait]
impl PaymentGateway for FixedGateway {
    async fn create_payment_intent(&self, amount: u64) -> ServerResult<String> {
        Ok(format!("pi_{amount}_secret"))
    }
}

/// Store whose every call fails, as if the database were unreachable.
struct UnreachableStore;

fn refused<T>() -> StoreResult<T> {
    Err(StoreError::backend("connection refused"))
}

#[async_trait]
impl DocumentStore for UnreachableStore {
    async fn find(&self, _: Collection, _: &Filter, _: &FindOptions) -> StoreResult<Vec<Document>> {
        refused()
    }
    async fn find_one(&self, _: Collection, _: &Filter) -> StoreResult<Option<Document>> {
        refused()
    }
    async fn insert_one(&self, _: Collection, _: Document) -> StoreResult<InsertOneResult> {
        refused()
    }
    async fn insert_if_absent(
        &self,
        _: Collection,
        _: &Filter,
        _: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        refused()
    }
    async fn update_one(
        &self,
        _: Collection,
        _: &Filter,
        _: &Update,
        _: bool,
    ) -> StoreResult<UpdateResult> {
        refused()
    }
    async fn delete_one(&self, _: Collection, _: &Filter) -> StoreResult<DeleteResult> {
        refused()
    }
    async fn count(&self, _: Collection, _: &Filter) -> StoreResult<u64> {
        refused()
    }
    async fn ping(&self) -> StoreResult<()> {
        refused()
    }
}

/// What the local payment processor received for one intent.
#[derive(Debug)]
struct ReceivedIntent {
    path: String,
    authorization: Option<String>,
    form: HashMap<String, String>,
}

#[derive(Clone)]
struct ProcessorStub {
    received: Arc<Mutex<Vec<ReceivedIntent>>>,
    status: StatusCode,
    reply: Value,
}

async fn payment_intents(
    State(stub): State<ProcessorStub>,
    headers: HeaderMap,
    request_uri: axum::http::Uri,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, axum::Json<Value>) {
    stub.received.lock().unwrap().push(ReceivedIntent {
        path: request_uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        form,
    });
    (stub.status, axum::Json(stub.reply.clone()))
}

/// Serve a payment processor on a local port that answers every intent with
/// `status` and `reply`. Returns a gateway pointed at it and the request log.
async fn spawn_processor(
    status: StatusCode,
    reply: Value,
) -> (StripeGateway, Arc<Mutex<Vec<ReceivedIntent>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let stub = ProcessorStub {
        received: received.clone(),
        status,
        reply,
    };
    let app = Router::new()
        .route("/v1/payment_intents", post(payment_intents))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = PaymentConfig {
        secret_key: Some("sk_test_lifedrops".to_string()),
        api_base: format!("http://{addr}/"),
        currency: "usd".to_string(),
    };
    let gateway = StripeGateway::new(&config, Duration::from_secs(5)).unwrap();
    (gateway, received)
}

struct TestApp {
    state: Arc<ServerState>,
    router: Router,
}

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.auth.access_token_secret = "test-secret".to_string();
    config.metrics_enabled = false;
    config
}

impl TestApp {
    fn new() -> Self {
        Self::with_parts(Arc::new(InMemoryBackend::new()), Arc::new(FixedGateway))
    }

    fn with_parts(store: Arc<dyn DocumentStore>, payments: Arc<dyn PaymentGateway>) -> Self {
        Self::from_state(ServerState::with_parts(test_config(), store, payments))
    }

    fn from_state(state: ServerState) -> Self {
        let state = Arc::new(state);
        let router = build_router(state.clone());
        Self { state, router }
    }

    fn token(&self, email: &str) -> String {
        self.state.tokens.issue(email).expect("token")
    }

    /// Insert a user directly, bypassing registration defaults. Returns its id.
    async fn seed_user(&self, email: &str, role: &str, status: &str) -> String {
        let user = document(json!({
            "email": email,
            "name": email.split('@').next().unwrap_or_default(),
            "role": role,
            "status": status,
        }));
        self.state
            .store
            .insert_one(Collection::Users, user)
            .await
            .expect("seed user")
            .inserted_id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }
}

fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[tokio::test]
async fn test_landing_text() {
    let app = TestApp::new();
    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Life Drops : A Blood Donation Platform"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get("/no/such/route", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["code"].is_string());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_issue_token_round_trip() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::POST, "/jwt", None, Some(json!({ "email": "a@x.io" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    assert_eq!(app.state.tokens.verify(token).unwrap().email, "a@x.io");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get("/users/role/a@x.io", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Unauthorized Access!");

    let (status, _) = app.get("/users/role/a@x.io", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_user_and_duplicate() {
    let app = TestApp::new();
    let user = json!({ "email": "donor@x.io", "name": "Donor", "role": "admin" });

    let (status, body) = app
        .send(Method::POST, "/users", None, Some(user.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["insertedId"].is_string());

    let (status, body) = app.send(Method::POST, "/users", None, Some(user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["insertedId"], Value::Null);
    assert_eq!(body["message"], "user already exists");

    // Self-declared roles are ignored at registration.
    let token = app.token("donor@x.io");
    let (_, body) = app.get("/users/role/donor@x.io", Some(&token)).await;
    assert_eq!(body["role"], "donor");
}

#[tokio::test]
async fn test_profile_is_only_editable_by_owner() {
    let app = TestApp::new();
    app.seed_user("a@x.io", "donor", "active").await;
    let token = app.token("a@x.io");
    let other = app.token("b@x.io");

    let (status, body) = app
        .send(
            Method::PUT,
            "/users/a@x.io",
            Some(&other),
            Some(json!({ "district": "Dhaka" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Forbidden Access!");

    let (status, body) = app
        .send(
            Method::PUT,
            "/users/a@x.io",
            Some(&token),
            Some(json!({ "district": "Dhaka", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 1);

    let (_, profile) = app.get("/users/a@x.io", Some(&token)).await;
    assert_eq!(profile["district"], "Dhaka");
    assert_eq!(profile["role"], "donor");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();
    app.seed_user("donor@x.io", "donor", "active").await;
    app.seed_user("admin@x.io", "admin", "active").await;

    let (status, _) = app.get("/users", Some(&app.token("donor@x.io"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unregistered callers have no role at all.
    let (status, _) = app.get("/users", Some(&app.token("ghost@x.io"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.token("admin@x.io");
    let (status, body) = app.get("/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get("/users/admin/admin@x.io", Some(&admin)).await;
    assert_eq!(body["admin"], true);
}

#[tokio::test]
async fn test_admin_changes_role_and_status() {
    let app = TestApp::new();
    let id = app.seed_user("donor@x.io", "donor", "active").await;
    app.seed_user("admin@x.io", "admin", "active").await;
    let admin = app.token("admin@x.io");

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/users/{id}/role"),
            Some(&admin),
            Some(json!({ "role": "volunteer" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 1);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/users/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "blocked" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, blocked) = app.get("/users?status=blocked", Some(&admin)).await;
    let blocked = blocked.as_array().unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0]["role"], "volunteer");
}

#[tokio::test]
async fn test_invalid_object_id_is_bad_request() {
    let app = TestApp::new();
    let token = app.token("a@x.io");
    let (status, _) = app.get("/donationRequest/not-an-id", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_donation_request_listing_and_count() {
    let app = TestApp::new();
    app.seed_user("a@x.io", "donor", "active").await;
    app.seed_user("b@x.io", "donor", "active").await;
    let a = app.token("a@x.io");
    let b = app.token("b@x.io");

    for (token, district) in [(&a, "Dhaka"), (&a, "Sylhet"), (&b, "Khulna")] {
        let (status, _) = app
            .send(
                Method::POST,
                "/donationRequest",
                Some(token),
                Some(json!({ "recipientName": "R", "district": district })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, all) = app.get("/donationRequest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, mine) = app.get("/donationRequest?requesterEmail=a@x.io", None).await;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r["status"] == "pending"));

    let (_, recent) = app
        .get("/donationRequest?requesterEmail=a@x.io&limit=1", None)
        .await;
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["district"], "Sylhet");

    let (_, count) = app.get("/donationRequestCount?status=pending", None).await;
    assert_eq!(count["count"], 3);

    let (_, page) = app.get("/donationRequest?page=1&size=2", None).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blocked_user_cannot_create_request() {
    let app = TestApp::new();
    app.seed_user("blocked@x.io", "donor", "blocked").await;
    let token = app.token("blocked@x.io");

    let (status, _) = app
        .send(
            Method::POST,
            "/donationRequest",
            Some(&token),
            Some(json!({ "recipientName": "R" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, count) = app.get("/donationRequestCount", None).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn test_donation_request_status_workflow() {
    let app = TestApp::new();
    app.seed_user("a@x.io", "donor", "active").await;
    let token = app.token("a@x.io");

    let (_, created) = app
        .send(
            Method::POST,
            "/donationRequest",
            Some(&token),
            Some(json!({ "recipientName": "R" })),
        )
        .await;
    let id = created["insertedId"].as_str().unwrap().to_string();
    let status_uri = format!("/donationRequest/{id}/status");

    let (status, _) = app
        .send(
            Method::PATCH,
            &status_uri,
            Some(&token),
            Some(json!({ "status": "inprogress" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::PATCH,
            &status_uri,
            Some(&token),
            Some(json!({
                "status": "inprogress",
                "donorName": "Rafi",
                "donorEmail": "rafi@x.io",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 1);

    let (_, request) = app.get(&format!("/donationRequest/{id}"), Some(&token)).await;
    assert_eq!(request["status"], "inprogress");
    assert_eq!(request["donorEmail"], "rafi@x.io");

    let (status, _) = app
        .send(
            Method::PATCH,
            &status_uri,
            Some(&token),
            Some(json!({ "status": "finished" })),
        )
        .await;
    assert!(status.is_client_error());

    let (status, body) = app
        .send(Method::DELETE, &format!("/donationRequest/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 1);

    let (status, body) = app.get(&format!("/donationRequest/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_blog_lifecycle() {
    let app = TestApp::new();
    app.seed_user("vol@x.io", "volunteer", "active").await;
    app.seed_user("admin@x.io", "admin", "active").await;
    app.seed_user("donor@x.io", "donor", "active").await;
    let volunteer = app.token("vol@x.io");
    let admin = app.token("admin@x.io");

    let blog = json!({ "title": "Why donate", "content": "<p>Because.</p>", "status": "published" });
    let (status, _) = app
        .send(Method::POST, "/blogs", Some(&app.token("donor@x.io")), Some(blog.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .send(Method::POST, "/blogs", Some(&volunteer), Some(blog))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["insertedId"].as_str().unwrap().to_string();

    let (_, drafts) = app.get("/blogs?status=draft", None).await;
    assert_eq!(drafts.as_array().unwrap().len(), 1);

    // Volunteers draft; only admins publish.
    let status_uri = format!("/blogs/{id}/status");
    let (status, _) = app
        .send(
            Method::PATCH,
            &status_uri,
            Some(&volunteer),
            Some(json!({ "status": "published" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::PATCH,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "published" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, published) = app.get("/blogs?status=published", None).await;
    assert_eq!(published.as_array().unwrap().len(), 1);
    let (_, blog) = app.get(&format!("/blogs/{id}"), None).await;
    assert_eq!(blog["title"], "Why donate");

    let (status, body) = app
        .send(Method::DELETE, &format!("/blogs/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 1);
}

#[tokio::test]
async fn test_blog_requires_title() {
    let app = TestApp::new();
    app.seed_user("admin@x.io", "admin", "active").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/blogs",
            Some(&app.token("admin@x.io")),
            Some(json!({ "content": "untitled" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_intent() {
    let app = TestApp::new();
    let token = app.token("a@x.io");

    let (status, _) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            None,
            Some(json!({ "price": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            Some(&token),
            Some(json!({ "price": 12.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_1250_secret");

    let (status, _) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            Some(&token),
            Some(json!({ "price": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_funds_and_admin_stats() {
    let app = TestApp::new();
    app.seed_user("a@x.io", "donor", "active").await;
    app.seed_user("b@x.io", "donor", "blocked").await;
    app.seed_user("vol@x.io", "volunteer", "active").await;
    let donor = app.token("a@x.io");

    for amount in [10.0, 2.5] {
        let (status, _) = app
            .send(
                Method::POST,
                "/funds",
                Some(&donor),
                Some(json!({ "amount": amount, "transactionId": "tx" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    app.send(
        Method::POST,
        "/donationRequest",
        Some(&donor),
        Some(json!({ "recipientName": "R" })),
    )
    .await;

    let (_, funds) = app.get("/funds", Some(&donor)).await;
    let funds = funds.as_array().unwrap();
    assert_eq!(funds.len(), 2);
    assert!(funds.iter().all(|f| f["email"] == "a@x.io"));

    let (status, _) = app.get("/admin-stats", Some(&donor)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = app.get("/admin-stats", Some(&app.token("vol@x.io"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"], 2);
    assert_eq!(stats["donationRequests"], 1);
    assert_eq!(stats["totalFunds"], 12.5);
}

#[tokio::test]
async fn test_donor_search_excludes_blocked_and_staff() {
    let app = TestApp::new();
    let donors = [
        ("a@x.io", "donor", "active", "A+"),
        ("b@x.io", "donor", "blocked", "A+"),
        ("c@x.io", "volunteer", "active", "A+"),
        ("d@x.io", "donor", "active", "O-"),
    ];
    for (email, role, status, group) in donors {
        let user = document(json!({
            "email": email,
            "role": role,
            "status": status,
            "bloodGroup": group,
            "district": "Dhaka",
        }));
        app.state.store.insert_one(Collection::Users, user).await.unwrap();
    }

    let (status, found) = app.get("/donors?bloodGroup=A%2B&district=Dhaka", None).await;
    assert_eq!(status, StatusCode::OK);
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["email"], "a@x.io");
}

#[tokio::test]
async fn test_malformed_input_uses_error_envelope() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/jwt", None, Some(json!({ "nope": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("email"));

    let (status, body) = app.get("/donationRequest?page=x&size=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_counts_beyond_i64_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .get("/donationRequest?limit=18446744073709551615", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = app
        .get("/donationRequest?page=0&size=9223372036854775808", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/donationRequest?page=9223372036854775807&size=2", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_listing_reports_fixed_message() {
    let app = TestApp::with_parts(Arc::new(UnreachableStore), Arc::new(FixedGateway));
    let (status, body) = app.get("/donationRequest?status=pending", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "Failed to fetch submissions");
}

#[tokio::test]
async fn test_readiness_follows_store_ping() {
    let app = TestApp::new();
    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["database"], "ready");

    let down = TestApp::with_parts(Arc::new(UnreachableStore), Arc::new(FixedGateway));
    let (status, body) = down.get("/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    let (status, _) = app.get("/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let state = ServerState::with_parts(
        test_config(),
        Arc::new(InMemoryBackend::new()),
        Arc::new(FixedGateway),
    )
    .with_metrics(handle);
    let app = TestApp::from_state(state);
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_users_read_as_null() {
    let app = TestApp::new();
    let token = app.token("ghost@x.io");

    let (status, body) = app.get("/users/ghost@x.io", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = app.get("/users/role/ghost@x.io", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], Value::Null);
}

#[tokio::test]
async fn test_uppercase_ids_find_stored_documents() {
    let app = TestApp::new();
    app.seed_user("admin@x.io", "admin", "active").await;
    let (_, created) = app
        .send(
            Method::POST,
            "/blogs",
            Some(&app.token("admin@x.io")),
            Some(json!({ "title": "Case" })),
        )
        .await;
    let id = created["insertedId"].as_str().unwrap().to_ascii_uppercase();

    let (status, blog) = app.get(&format!("/blogs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blog["title"], "Case");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_insert_once() {
    let app = TestApp::new();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "email": "same@x.io" }).to_string()))
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            body["insertedId"].is_string()
        }));
    }
    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    let users = app.state.store.count(Collection::Users, &Filter::new()).await.unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn test_processor_receives_form_encoded_intent() {
    let (gateway, received) = spawn_processor(
        StatusCode::OK,
        json!({ "id": "pi_1", "client_secret": "pi_1_secret_abc" }),
    )
    .await;
    let app = TestApp::with_parts(Arc::new(InMemoryBackend::new()), Arc::new(gateway));

    let (status, body) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            Some(&app.token("a@x.io")),
            Some(json!({ "price": 25.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_1_secret_abc");

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let intent = &received[0];
    assert_eq!(intent.path, "/v1/payment_intents");
    assert_eq!(intent.authorization.as_deref(), Some("Bearer sk_test_lifedrops"));
    assert_eq!(intent.form["amount"], "2550");
    assert_eq!(intent.form["currency"], "usd");
    assert_eq!(intent.form["payment_method_types[]"], "card");
}

#[tokio::test]
async fn test_processor_rejection_is_bad_gateway() {
    let (gateway, _) = spawn_processor(
        StatusCode::PAYMENT_REQUIRED,
        json!({ "error": { "message": "card declined" } }),
    )
    .await;
    let app = TestApp::with_parts(Arc::new(InMemoryBackend::new()), Arc::new(gateway));

    let (status, body) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            Some(&app.token("a@x.io")),
            Some(json!({ "price": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "PAYMENT_GATEWAY_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().contains("card declined"));
}

#[tokio::test]
async fn test_unconfigured_processor_is_unavailable() {
    let gateway = StripeGateway::new(&PaymentConfig::default(), Duration::from_secs(5)).unwrap();
    assert!(!gateway.is_configured());
    let app = TestApp::with_parts(Arc::new(InMemoryBackend::new()), Arc::new(gateway));

    let (status, body) = app
        .send(
            Method::POST,
            "/create-payment-intent",
            Some(&app.token("a@x.io")),
            Some(json!({ "price": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}
