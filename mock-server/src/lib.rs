//! In-memory stand-in for the headless CMS the todo client talks to.
//!
//! Implements the slice of the CMS REST surface the client uses: local
//! sign-up and sign-in, and a per-user `todos` collection with `{"data": ...}`
//! envelopes, bearer-token auth and field validation that answers in the
//! CMS error format.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const PRIORITIES: [&str; 3] = ["Low", "Medium", "High"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub document_id: String,
    pub title: String,
    pub description: Value,
    pub is_completed: bool,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub document_id: String,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    pub blocked: bool,
}

/// Fields accepted on create and update. Everything is optional at the
/// parsing stage so missing fields surface as validation errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoFields {
    pub title: Option<String>,
    pub description: Option<Value>,
    pub is_completed: Option<bool>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataBody {
    pub data: TodoFields,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub identifier: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub sort: Option<String>,
}

struct Account {
    user: User,
    password: String,
}

struct OwnedTodo {
    owner: u64,
    todo: Todo,
}

#[derive(Default)]
pub struct Store {
    accounts: Vec<Account>,
    tokens: HashMap<String, u64>,
    todos: Vec<OwnedTodo>,
    next_user_id: u64,
    next_todo_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

/// Error response in the CMS format:
/// `{"data": null, "error": {"status", "name", "message", "details"}}`.
#[derive(Debug)]
pub struct CmsError {
    status: StatusCode,
    name: &'static str,
    message: String,
    details: Value,
}

impl CmsError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            name: "UnauthorizedError",
            message: "Missing or invalid credentials".to_string(),
            details: json!({}),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            name: "NotFoundError",
            message: "Not Found".to_string(),
            details: json!({}),
        }
    }

    fn invalid(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            name: "ValidationError",
            message: message.to_string(),
            details: json!({}),
        }
    }

    fn application(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            name: "ApplicationError",
            message: message.to_string(),
            details: json!({}),
        }
    }

    fn fields(errors: Vec<(Vec<Value>, String)>) -> Self {
        let message = if errors.len() == 1 {
            errors[0].1.clone()
        } else {
            format!("{} errors occurred", errors.len())
        };
        let errors: Vec<Value> = errors
            .into_iter()
            .map(|(path, message)| json!({"path": path, "message": message, "name": "ValidationError"}))
            .collect();
        Self {
            status: StatusCode::BAD_REQUEST,
            name: "ValidationError",
            message,
            details: json!({ "errors": errors }),
        }
    }
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let body = json!({
            "data": null,
            "error": {
                "status": self.status.as_u16(),
                "name": self.name,
                "message": self.message,
                "details": self.details,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/auth/local", post(login))
        .route("/auth/local/register", post(register))
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{document_id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn issue_token(store: &mut Store, user_id: u64) -> String {
    let token = Uuid::new_v4().simple().to_string();
    store.tokens.insert(token.clone(), user_id);
    token
}

fn authenticate(store: &Store, headers: &HeaderMap) -> Result<u64, CmsError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(CmsError::unauthorized)?;
    store
        .tokens
        .get(token.trim())
        .copied()
        .ok_or_else(CmsError::unauthorized)
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Block documents need at least one child per block.
fn description_errors(description: &Value) -> Vec<(Vec<Value>, String)> {
    let blocks = match description {
        Value::Null => return Vec::new(),
        Value::Array(blocks) => blocks,
        _ => {
            return vec![(
                vec![json!("description")],
                "description must be an array of blocks".to_string(),
            )]
        }
    };
    let mut errors = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        if !block.get("type").is_some_and(Value::is_string) {
            errors.push((
                vec![json!("description"), json!(index), json!("type")],
                "block type must be defined".to_string(),
            ));
        }
        let has_children = block
            .get("children")
            .and_then(Value::as_array)
            .is_some_and(|children| !children.is_empty());
        if !has_children {
            errors.push((
                vec![json!("description"), json!(index), json!("children")],
                "children must be a non-empty array".to_string(),
            ));
        }
    }
    errors
}

fn validate(fields: &TodoFields, creating: bool) -> Result<Option<NaiveDate>, CmsError> {
    let mut errors = Vec::new();
    if (creating || fields.title.is_some()) && blank(&fields.title) {
        errors.push((vec![json!("title")], "title must be defined.".to_string()));
    }
    if let Some(description) = &fields.description {
        errors.extend(description_errors(description));
    }
    if let Some(priority) = &fields.priority {
        if !PRIORITIES.contains(&priority.as_str()) {
            errors.push((
                vec![json!("priority")],
                format!("priority must be one of the following values: {}", PRIORITIES.join(", ")),
            ));
        }
    }
    let mut due_date = None;
    if let Some(raw) = &fields.due_date {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => due_date = Some(date),
            Err(_) => errors.push((vec![json!("dueDate")], "dueDate must be a valid date".to_string())),
        }
    }
    if errors.is_empty() {
        Ok(due_date)
    } else {
        tracing::debug!(count = errors.len(), "rejecting todo payload");
        Err(CmsError::fields(errors))
    }
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterBody>,
) -> Result<Json<Value>, CmsError> {
    let mut missing = Vec::new();
    for (name, value) in [
        ("username", &input.username),
        ("email", &input.email),
        ("password", &input.password),
    ] {
        if blank(value) {
            missing.push((vec![json!(name)], format!("{name} is a required field")));
        }
    }
    if !missing.is_empty() {
        return Err(CmsError::fields(missing));
    }
    let (username, email, password) = (
        input.username.unwrap_or_default(),
        input.email.unwrap_or_default().to_lowercase(),
        input.password.unwrap_or_default(),
    );

    let mut store = db.write().await;
    let taken = store
        .accounts
        .iter()
        .any(|a| a.user.username == username || a.user.email == email);
    if taken {
        return Err(CmsError::application("Email or Username are already taken"));
    }
    store.next_user_id += 1;
    let user = User {
        id: store.next_user_id,
        document_id: new_document_id(),
        username,
        email,
        confirmed: true,
        blocked: false,
    };
    store.accounts.push(Account {
        user: user.clone(),
        password,
    });
    let jwt = issue_token(&mut store, user.id);
    tracing::info!(user_id = user.id, "user registered");
    Ok(Json(json!({ "jwt": jwt, "user": user })))
}

async fn login(State(db): State<Db>, Json(input): Json<LoginBody>) -> Result<Json<Value>, CmsError> {
    let identifier = input.identifier.unwrap_or_default();
    let password = input.password.unwrap_or_default();
    let mut store = db.write().await;
    let user = store
        .accounts
        .iter()
        .find(|a| {
            (a.user.username == identifier || a.user.email == identifier.to_lowercase())
                && a.password == password
        })
        .map(|a| a.user.clone())
        .ok_or_else(|| CmsError::invalid("Invalid identifier or password"))?;
    let jwt = issue_token(&mut store, user.id);
    tracing::info!(user_id = user.id, "user signed in");
    Ok(Json(json!({ "jwt": jwt, "user": user })))
}

async fn list_todos(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, CmsError> {
    let store = db.read().await;
    let owner = authenticate(&store, &headers)?;
    let mut todos: Vec<Todo> = store
        .todos
        .iter()
        .filter(|t| t.owner == owner)
        .map(|t| t.todo.clone())
        .collect();
    match params.sort.as_deref() {
        Some("createdAt:desc") => todos.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
        Some("createdAt:asc") => todos.sort_by_key(|t| (t.created_at, t.id)),
        _ => todos.sort_by_key(|t| t.id),
    }
    let total = todos.len();
    Ok(Json(json!({
        "data": todos,
        "meta": {
            "pagination": {
                "page": 1,
                "pageSize": 25,
                "pageCount": if total == 0 { 0 } else { 1 },
                "total": total,
            }
        }
    })))
}

async fn create_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<DataBody>,
) -> Result<(StatusCode, Json<Value>), CmsError> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    let fields = input.data;
    let due_date = validate(&fields, true)?;

    store.next_todo_id += 1;
    let now = Utc::now();
    let todo = Todo {
        id: store.next_todo_id,
        document_id: new_document_id(),
        title: fields.title.unwrap_or_default(),
        description: fields.description.unwrap_or(Value::Null),
        is_completed: fields.is_completed.unwrap_or(false),
        priority: fields.priority,
        due_date,
        created_at: now,
        updated_at: now,
        published_at: now,
    };
    store.todos.push(OwnedTodo {
        owner,
        todo: todo.clone(),
    });
    tracing::info!(document_id = %todo.document_id, owner, "todo created");
    Ok((StatusCode::CREATED, Json(json!({ "data": todo }))))
}

async fn get_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, CmsError> {
    let store = db.read().await;
    let owner = authenticate(&store, &headers)?;
    let todo = store
        .todos
        .iter()
        .find(|t| t.owner == owner && t.todo.document_id == document_id)
        .ok_or_else(CmsError::not_found)?;
    Ok(Json(json!({ "data": todo.todo })))
}

async fn update_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Json(input): Json<DataBody>,
) -> Result<Json<Value>, CmsError> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    let fields = input.data;
    let due_date = validate(&fields, false)?;

    let todo = store
        .todos
        .iter_mut()
        .find(|t| t.owner == owner && t.todo.document_id == document_id)
        .map(|t| &mut t.todo)
        .ok_or_else(CmsError::not_found)?;
    if let Some(title) = fields.title {
        todo.title = title;
    }
    if let Some(description) = fields.description {
        todo.description = description;
    }
    if let Some(is_completed) = fields.is_completed {
        todo.is_completed = is_completed;
    }
    if fields.priority.is_some() {
        todo.priority = fields.priority;
    }
    if due_date.is_some() {
        todo.due_date = due_date;
    }
    todo.updated_at = Utc::now();
    tracing::info!(%document_id, "todo updated");
    Ok(Json(json!({ "data": todo })))
}

async fn delete_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<StatusCode, CmsError> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    let before = store.todos.len();
    store
        .todos
        .retain(|t| !(t.owner == owner && t.todo.document_id == document_id));
    if store.todos.len() == before {
        return Err(CmsError::not_found());
    }
    tracing::info!(%document_id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
