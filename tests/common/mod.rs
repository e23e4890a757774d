//! In-process stand-in for Supabase (GoTrue + PostgREST) and request helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;
use uuid::Uuid;

use ideas_api::config::{Config, Environment, LogFormat};
use ideas_api::{build_router, AppState};

pub const ANON_KEY: &str = "anon-key";
pub const SERVICE_ROLE_KEY: &str = "service-role-key";
pub const AGENT_DOMAIN: &str = "code45.internal";

// ============================================================================
// Fake Supabase state
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub metadata: Value,
    pub created_at: String,
}

impl FakeUser {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "user_metadata": self.metadata,
            "created_at": self.created_at,
        })
    }

    /// The human user whose rows this account may touch. Agent-users act
    /// for the user encoded in their email.
    fn principal(&self) -> Uuid {
        self.email
            .strip_prefix("agent_")
            .and_then(|rest| rest.split('@').next())
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or(self.id)
    }
}

#[derive(Debug, Default)]
pub struct FakeDb {
    pub users: Vec<FakeUser>,
    pub access_tokens: HashMap<String, Uuid>,
    pub refresh_tokens: HashMap<String, Uuid>,
    pub tables: HashMap<String, Vec<Value>>,
    pub next_id: i64,
    pub signed_out: Vec<Uuid>,
    pub profile_touches: Vec<Uuid>,
    pub refresh_grants: usize,
}

impl FakeDb {
    fn user(&self, id: Uuid) -> Option<&FakeUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn issue_session(&mut self, user_id: Uuid) -> Value {
        let access = format!("at-{}", Uuid::new_v4());
        let refresh = format!("rt-{}", Uuid::new_v4());
        self.access_tokens.insert(access.clone(), user_id);
        self.refresh_tokens.insert(refresh.clone(), user_id);
        let user = self.user(user_id).map(FakeUser::to_json).unwrap_or(Value::Null);
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer",
            "expires_in": 3600,
            "user": user,
        })
    }

    fn table(&mut self, name: &str) -> &mut Vec<Value> {
        self.tables.entry(name.to_string()).or_default()
    }
}

/// Handle on a running fake Supabase
#[derive(Clone)]
pub struct FakeSupabase {
    pub url: String,
    pub db: Arc<Mutex<FakeDb>>,
}

impl FakeSupabase {
    pub async fn start() -> Self {
        let db = Arc::new(Mutex::new(FakeDb::default()));
        let app = Router::new()
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/user", get(user))
            .route("/auth/v1/logout", post(logout))
            .route(
                "/rest/v1/:table",
                get(rest_select)
                    .post(rest_insert)
                    .patch(rest_update)
                    .delete(rest_delete),
            )
            .with_state(db.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            db,
        }
    }

    /// Register an account directly, bypassing the API (no agent-user)
    pub fn add_user(&self, email: &str, password: &str, metadata: Value) -> Uuid {
        let id = Uuid::new_v4();
        self.db.lock().unwrap().users.push(FakeUser {
            id,
            email: email.to_string(),
            password: password.to_string(),
            metadata,
            created_at: Utc::now().to_rfc3339(),
        });
        id
    }

    pub fn user_by_email(&self, email: &str) -> Option<FakeUser> {
        self.db
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    /// Invalidate every access token, as if they had all expired
    pub fn expire_access_tokens(&self) {
        self.db.lock().unwrap().access_tokens.clear();
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.db.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn signed_out(&self) -> Vec<Uuid> {
        self.db.lock().unwrap().signed_out.clone()
    }

    pub fn profile_touches(&self) -> Vec<Uuid> {
        self.db.lock().unwrap().profile_touches.clone()
    }

    /// Refresh-token grants received, successful or not
    pub fn refresh_grants(&self) -> usize {
        self.db.lock().unwrap().refresh_grants
    }
}

type Db = Arc<Mutex<FakeDb>>;

fn gotrue_error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

// ============================================================================
// GoTrue
// ============================================================================

async fn signup(State(db): State<Db>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    let mut db = db.lock().unwrap();

    if db.users.iter().any(|u| u.email == email) {
        return gotrue_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "code": 422, "msg": "User already registered" }),
        );
    }

    let id = Uuid::new_v4();
    db.users.push(FakeUser {
        id,
        email,
        password,
        metadata: json!({}),
        created_at: Utc::now().to_rfc3339(),
    });
    Json(db.issue_session(id)).into_response()
}

async fn token(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut db = db.lock().unwrap();
    match params.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let found = db
                .users
                .iter()
                .find(|u| u.email == email && u.password == password)
                .map(|u| u.id);
            match found {
                Some(id) => Json(db.issue_session(id)).into_response(),
                None => gotrue_error(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" }),
                ),
            }
        }
        Some("refresh_token") => {
            let refresh = body["refresh_token"].as_str().unwrap_or_default();
            db.refresh_grants += 1;
            // Refresh tokens are single use
            match db.refresh_tokens.remove(refresh) {
                Some(id) => Json(db.issue_session(id)).into_response(),
                None => gotrue_error(
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "invalid_grant",
                        "error_description": "Invalid Refresh Token: Refresh Token Not Found"
                    }),
                ),
            }
        }
        _ => gotrue_error(StatusCode::BAD_REQUEST, json!({ "msg": "unsupported grant_type" })),
    }
}

async fn user(State(db): State<Db>, headers: HeaderMap) -> Response {
    let db = db.lock().unwrap();
    let found = bearer(&headers)
        .and_then(|t| db.access_tokens.get(&t).copied())
        .and_then(|id| db.user(id).cloned());
    match found {
        Some(user) => Json(user.to_json()).into_response(),
        None => gotrue_error(
            StatusCode::UNAUTHORIZED,
            json!({ "code": 401, "msg": "invalid JWT: unable to parse or verify signature" }),
        ),
    }
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Response {
    let mut db = db.lock().unwrap();
    let Some(token) = bearer(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match db.access_tokens.remove(&token) {
        Some(id) => {
            db.refresh_tokens.retain(|_, owner| *owner != id);
            db.signed_out.push(id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => gotrue_error(StatusCode::UNAUTHORIZED, json!({ "msg": "invalid JWT" })),
    }
}

// ============================================================================
// PostgREST
// ============================================================================

enum Caller {
    Service,
    User(Uuid),
}

fn caller(db: &FakeDb, headers: &HeaderMap) -> Option<Caller> {
    let token = bearer(headers)?;
    if token == SERVICE_ROLE_KEY {
        return Some(Caller::Service);
    }
    let id = db.access_tokens.get(&token).copied()?;
    Some(Caller::User(db.user(id)?.principal()))
}

fn unauthorized_jwt() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": "PGRST301", "message": "JWT expired" })),
    )
        .into_response()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_filters(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expr)| {
        let actual = row.get(column).map(value_text).unwrap_or_default();
        if let Some(expected) = expr.strip_prefix("eq.") {
            actual == expected
        } else if let Some(pattern) = expr.strip_prefix("ilike.") {
            actual
                .to_lowercase()
                .contains(&pattern.trim_matches('*').to_lowercase())
        } else {
            true
        }
    })
}

fn is_visible(row: &Value, who: &Caller) -> bool {
    match who {
        Caller::Service => true,
        Caller::User(id) => row.get("user_id").map(value_text) == Some(id.to_string()),
    }
}

fn split_params(params: Vec<(String, String)>) -> (Vec<(String, String)>, Option<usize>) {
    let mut limit = None;
    let filters = params
        .into_iter()
        .filter(|(k, v)| {
            if k == "limit" {
                limit = v.parse().ok();
            }
            !matches!(k.as_str(), "select" | "order" | "limit")
        })
        .collect();
    (filters, limit)
}

fn wants_object(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("vnd.pgrst.object"))
        .unwrap_or(false)
}

fn view(db: &FakeDb, table: &str, who: &Caller) -> Option<Vec<Value>> {
    let ideas: Vec<&Value> = db
        .tables
        .get("ideas")
        .map(|rows| rows.iter().filter(|r| is_visible(r, who)).collect())
        .unwrap_or_default();

    let mut counts: Vec<(String, i64)> = Vec::new();
    let mut bump = |key: String| match counts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, n)) => *n += 1,
        None => counts.push((key, 1)),
    };

    match table {
        "items_by_date" => {
            for idea in &ideas {
                bump(value_text(&idea["created_at"]).chars().take(10).collect());
            }
            Some(counts.into_iter().map(|(date, count)| json!({ "date": date, "count": count })).collect())
        }
        "items_by_status" => {
            for idea in &ideas {
                bump(value_text(&idea["status"]));
            }
            Some(counts.into_iter().map(|(status, count)| json!({ "status": status, "count": count })).collect())
        }
        "tags_usage" => {
            for idea in &ideas {
                for tag in idea["tags"].as_array().into_iter().flatten() {
                    bump(value_text(tag));
                }
            }
            Some(
                counts
                    .into_iter()
                    .map(|(label, usage_count)| json!({ "label": label, "usage_count": usage_count }))
                    .collect(),
            )
        }
        _ => None,
    }
}

async fn rest_select(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let db = db.lock().unwrap();
    let Some(who) = caller(&db, &headers) else {
        return unauthorized_jwt();
    };

    if let Some(rows) = view(&db, &table, &who) {
        return Json(rows).into_response();
    }

    let (filters, limit) = split_params(params);
    let mut rows: Vec<Value> = db
        .tables
        .get(&table)
        .map(|rows| {
            rows.iter()
                .filter(|r| is_visible(r, &who) && matches_filters(r, &filters))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    // Newest first
    rows.reverse();
    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    if wants_object(&headers) {
        return match rows.len() {
            1 => Json(rows.remove(0)).into_response(),
            _ => (
                StatusCode::NOT_ACCEPTABLE,
                Json(json!({ "code": "PGRST116", "message": "JSON object requested, multiple (or no) rows returned" })),
            )
                .into_response(),
        };
    }
    Json(rows).into_response()
}

async fn rest_insert(
    State(db): State<Db>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = db.lock().unwrap();
    let Some(who) = caller(&db, &headers) else {
        return unauthorized_jwt();
    };
    let Value::Object(mut row) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Caller::User(id) = who {
        match table.as_str() {
            "idea_tags" => {
                row.insert("user_id".into(), json!(id));
            }
            _ => {
                if row.get("user_id").map(value_text) != Some(id.to_string()) {
                    return (
                        StatusCode::FORBIDDEN,
                        Json(json!({ "code": "42501", "message": "new row violates row-level security policy" })),
                    )
                        .into_response();
                }
            }
        }
    }

    let duplicate = match table.as_str() {
        "tags" => db.table("tags").iter().any(|t| t["name"] == row["name"] && t["user_id"] == row["user_id"]),
        "idea_tags" => db
            .table("idea_tags")
            .iter()
            .any(|t| t["idea_id"] == row["idea_id"] && t["tag_id"] == row["tag_id"]),
        _ => false,
    };
    if duplicate {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "code": "23505", "message": "duplicate key value violates unique constraint" })),
        )
            .into_response();
    }

    let now = Utc::now().to_rfc3339();
    if table == "ideas" {
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("updated_at".into(), json!(now));
    } else {
        db.next_id += 1;
        row.insert("id".into(), json!(db.next_id));
    }
    row.insert("created_at".into(), json!(now));

    let row = Value::Object(row);
    db.table(&table).push(row.clone());
    (StatusCode::CREATED, Json(vec![row])).into_response()
}

async fn rest_update(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = db.lock().unwrap();
    let Some(who) = caller(&db, &headers) else {
        return unauthorized_jwt();
    };
    let (filters, _) = split_params(params);
    let patch: Map<String, Value> = body.as_object().cloned().unwrap_or_default();

    if table == "user_profiles" {
        if let Some(id) = filters
            .iter()
            .find(|(k, _)| k == "id")
            .and_then(|(_, v)| v.strip_prefix("eq."))
            .and_then(|v| Uuid::parse_str(v).ok())
        {
            db.profile_touches.push(id);
        }
    }

    let mut updated = Vec::new();
    for row in db.table(&table).iter_mut() {
        if is_visible(row, &who) && matches_filters(row, &filters) {
            if let Value::Object(fields) = row {
                for (k, v) in &patch {
                    fields.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
    }
    Json(updated).into_response()
}

async fn rest_delete(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let mut db = db.lock().unwrap();
    let Some(who) = caller(&db, &headers) else {
        return unauthorized_jwt();
    };
    let (filters, _) = split_params(params);

    let rows = db.table(&table);
    let (deleted, kept): (Vec<Value>, Vec<Value>) = rows
        .drain(..)
        .partition(|row| is_visible(row, &who) && matches_filters(row, &filters));
    *rows = kept;
    Json(deleted).into_response()
}

// ============================================================================
// Application under test
// ============================================================================

pub fn test_config(supabase_url: &str) -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "debug".to_string(),
        log_format: LogFormat::Pretty,
        environment: Environment::Local,
        supabase_url: supabase_url.to_string(),
        supabase_anon_key: ANON_KEY.to_string(),
        supabase_service_role_key: SERVICE_ROLE_KEY.to_string(),
        supabase_jwt_secret: None,
        supabase_timeout: Duration::from_secs(2),
        supabase_retry_attempts: 2,
        supabase_retry_backoff: Duration::from_millis(1),
        encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
        agent_email_domain: AGENT_DOMAIN.to_string(),
        refresh_cooldown: Duration::from_secs(5),
        auth_rate_limit_per_sec: 1000,
        client_origin: "http://localhost:5173".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub supabase: FakeSupabase,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let supabase = FakeSupabase::start().await;
        let router = build_router(AppState::new(test_config(&supabase.url)).unwrap());
        Self { router, supabase }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::from_response(response).await
    }

    /// Sign up through the API and return the session cookies
    pub async fn signup(&self, email: &str, password: &str) -> Cookies {
        let response = self
            .send(json_request(
                "POST",
                "/api/v1/auth/signup",
                json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "signup failed: {}", response.body);
        response.cookies()
    }

    pub async fn login(&self, email: &str, password: &str) -> Cookies {
        let response = self
            .send(json_request(
                "POST",
                "/api/v1/auth/login",
                json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.cookies()
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Self { status, headers, body }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect()
    }

    pub fn cookies(&self) -> Cookies {
        let mut cookies = Cookies::default();
        for raw in self.set_cookies() {
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                match name.trim() {
                    "access_token" => cookies.access = Some(value.to_string()),
                    "refresh_token" => cookies.refresh = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        cookies
    }

    /// Asserts the standard error body and returns its `code`
    pub fn error_code(&self) -> String {
        let error = &self.body["error"];
        assert!(error.is_object(), "not a standard error body: {}", self.body);
        assert!(error["details"].is_object());
        assert_eq!(
            error["request_id"].as_str(),
            self.header("x-request-id"),
            "request_id must match the response header"
        );
        error["code"].as_str().unwrap_or_default().to_string()
    }

    pub fn error_message(&self) -> String {
        self.body["error"]["message"].as_str().unwrap_or_default().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl Cookies {
    pub fn header(&self) -> String {
        let mut parts = Vec::new();
        if let Some(access) = &self.access {
            parts.push(format!("access_token={}", access));
        }
        if let Some(refresh) = &self.refresh {
            parts.push(format!("refresh_token={}", refresh));
        }
        parts.join("; ")
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, cookies: &Cookies, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies.header());
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
