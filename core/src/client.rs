//! Stateless HTTP request builder and response parser for the CMS todo API.
//!
//! # Design
//! `TodoClient` holds the API root, the timeout the host should apply and an
//! optional bearer token. It carries no mutable state between calls: signing
//! in produces a new client via `with_token`. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`. The caller executes the actual HTTP round-trip,
//! keeping the core deterministic and free of I/O dependencies.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ClientConfig, DEFAULT_TIMEOUT};
use crate::error::{ApiError, FieldError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::richtext;
use crate::types::{
    AuthResponse, DataEnvelope, DeleteOutcome, LoginRequest, RegisterRequest, Todo, TodoDraft,
    TodoListBody,
};

/// Query string sent with list requests: newest first, relations populated.
pub const LIST_QUERY: &str = "sort=createdAt:desc&populate=*";

/// Synchronous, stateless client for the CMS todo API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
    timeout: Duration,
    token: Option<String>,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout,
            ..Self::new(&config.base_url)
        }
    }

    /// A copy of this client that signs requests with `jwt`.
    pub fn with_token(&self, jwt: impl Into<String>) -> Self {
        Self {
            token: Some(jwt.into()),
            ..self.clone()
        }
    }

    /// A copy of this client without credentials.
    pub fn without_token(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    // ---------------------------------------------------------------------
    // Todos
    // ---------------------------------------------------------------------

    pub fn build_list_todos(&self) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/todos?{LIST_QUERY}"), None)
    }

    pub fn build_get_todo(&self, document_id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/todos/{document_id}"), None)
    }

    /// Build a create request. The draft's flat description is converted to
    /// the block document the CMS stores.
    pub fn build_create_todo(&self, draft: &TodoDraft) -> Result<HttpRequest, ApiError> {
        let body = to_json(&DataEnvelope {
            data: draft.to_payload(),
        })?;
        tracing::debug!(title = %draft.title, "building create todo request");
        Ok(self.request(HttpMethod::Post, "/todos", Some(body)))
    }

    pub fn build_update_todo(
        &self,
        document_id: &str,
        draft: &TodoDraft,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(&DataEnvelope {
            data: draft.to_payload(),
        })?;
        tracing::debug!(document_id, "building update todo request");
        Ok(self.request(HttpMethod::Put, &format!("/todos/{document_id}"), Some(body)))
    }

    pub fn build_delete_todo(&self, document_id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/todos/{document_id}"), None)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response)?;
        from_json::<TodoListBody>(&response.body).map(TodoListBody::into_todos)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response)?;
        from_json::<DataEnvelope<Todo>>(&response.body).map(|envelope| envelope.data)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response)?;
        from_json::<DataEnvelope<Todo>>(&response.body).map(|envelope| envelope.data)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response)?;
        from_json::<DataEnvelope<Todo>>(&response.body).map(|envelope| envelope.data)
    }

    /// A 404 on delete is not an error: the item is gone either way.
    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<DeleteOutcome, ApiError> {
        match check_status(&response) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(ApiError::NotFound) => Ok(DeleteOutcome::AlreadyGone),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Auth
    // ---------------------------------------------------------------------

    /// Build a login request. Credentials are never combined with a stale
    /// bearer token.
    pub fn build_login(&self, identifier: &str, password: &str) -> Result<HttpRequest, ApiError> {
        let body = to_json(&LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        })?;
        tracing::debug!(identifier, "building login request");
        Ok(self
            .without_token()
            .request(HttpMethod::Post, "/auth/local", Some(body)))
    }

    pub fn build_register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(&RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        Ok(self
            .without_token()
            .request(HttpMethod::Post, "/auth/local/register", Some(body)))
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        check_status(&response)?;
        from_json(&response.body)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        check_status(&response)?;
        from_json(&response.body)
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = &self.token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body,
            timeout: self.timeout,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

/// Descriptions can nest inline wrappers arbitrarily deep, so bodies are read
/// without a nesting limit.
fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    richtext::from_str_unbounded(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Error body returned by the CMS on any failure.
#[derive(Debug, Deserialize)]
struct CmsErrorBody {
    error: CmsError,
}

#[derive(Debug, Deserialize)]
struct CmsError {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<CmsErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct CmsErrorDetails {
    #[serde(default)]
    errors: Vec<CmsFieldError>,
}

#[derive(Debug, Deserialize)]
struct CmsFieldError {
    #[serde(default)]
    path: FieldPath,
    #[serde(default)]
    message: String,
}

/// The validator reports paths as a list of segments; some plugins send a
/// single dotted string instead.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum FieldPath {
    Segments(Vec<Value>),
    Single(String),
    #[default]
    Missing,
}

impl FieldPath {
    fn into_segments(self) -> Vec<String> {
        match self {
            FieldPath::Segments(segments) => segments
                .into_iter()
                .map(|segment| match segment {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            FieldPath::Single(path) => vec![path],
            FieldPath::Missing => Vec::new(),
        }
    }
}

/// Message from a CMS error body. Falls back to a top-level `message`, then
/// to the raw body, then to a generic line naming the status.
fn error_message(status: u16, body: &str, parsed: Option<&CmsError>) -> String {
    if let Some(message) = parsed.and_then(|e| e.message.clone()) {
        return message;
    }
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = fields.get("message") {
            return message.clone();
        }
    }
    if body.trim().is_empty() {
        format!("Server error ({status})")
    } else {
        body.to_string()
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let status = response.status;
    let parsed = serde_json::from_str::<CmsErrorBody>(&response.body)
        .ok()
        .map(|body| body.error);
    let message = error_message(status, &response.body, parsed.as_ref());

    match status {
        401 => {
            tracing::warn!(status, %message, "request unauthorized, session should be cleared");
            return Err(ApiError::Unauthorized(message));
        }
        403 => {
            tracing::warn!(status, %message, "access denied");
            return Err(ApiError::Forbidden(message));
        }
        404 => {
            tracing::debug!(status, "resource not found");
            return Err(ApiError::NotFound);
        }
        429 => {
            tracing::warn!(status, "rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
        _ => {}
    }

    let (name, field_errors) = match parsed {
        Some(error) => (
            error.name,
            error.details.map(|d| d.errors).unwrap_or_default(),
        ),
        None => (None, Vec::new()),
    };
    if !field_errors.is_empty() {
        let errors: Vec<FieldError> = field_errors
            .into_iter()
            .map(|e| FieldError {
                path: e.path.into_segments(),
                message: e.message,
            })
            .collect();
        tracing::error!(status, count = errors.len(), "request failed validation");
        return Err(ApiError::Validation(errors));
    }

    tracing::error!(status, %message, "request failed");
    Err(ApiError::HttpError {
        status,
        name: name.unwrap_or_else(|| "HttpError".to_string()),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{priority_rank, Priority, TodoStatus};

    const DOC: &str = "h1b7kq3z0a9c2m4p6r8t0v2x";

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:1337/api")
    }

    fn todo_json(title: &str, completed: bool) -> String {
        format!(
            r#"{{"data":{{"id":1,"documentId":"{DOC}","title":"{title}","isCompleted":{completed},
            "description":[{{"type":"paragraph","children":[{{"type":"text","text":"details"}}]}}]}}}}"#
        )
    }

    #[test]
    fn build_list_todos_produces_correct_request() {
        let req = client().build_list_todos();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.path,
            "http://localhost:1337/api/todos?sort=createdAt:desc&populate=*"
        );
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn build_get_todo_produces_correct_request() {
        let req = client().build_get_todo(DOC);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, format!("http://localhost:1337/api/todos/{DOC}"));
        assert!(req.body.is_none());
    }

    #[test]
    fn token_is_attached_as_bearer() {
        let req = client().with_token("jwt-123").build_get_todo(DOC);
        assert_eq!(req.header("Authorization"), Some("Bearer jwt-123"));
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn build_create_todo_wraps_payload_in_data() {
        let draft = TodoDraft {
            title: "Buy milk".to_string(),
            description: "Two litres\n\nSemi-skimmed".to_string(),
            status: TodoStatus::Pending,
            priority: Some(Priority::Medium),
            due_date: None,
        };
        let req = client().with_token("t").build_create_todo(&draft).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:1337/api/todos");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("authorization"), Some("Bearer t"));

        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["data"]["title"], "Buy milk");
        assert_eq!(body["data"]["isCompleted"], false);
        assert_eq!(body["data"]["priority"], "Medium");
        assert_eq!(body["data"]["description"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["description"][1]["children"][0]["text"], "Semi-skimmed");
    }

    #[test]
    fn build_update_todo_maps_completed_status() {
        let draft = TodoDraft {
            status: TodoStatus::Completed,
            ..TodoDraft::new("Done")
        };
        let req = client().build_update_todo(DOC, &draft).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, format!("http://localhost:1337/api/todos/{DOC}"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["data"]["isCompleted"], true);
        assert!(body["data"].get("dueDate").is_none());
    }

    #[test]
    fn build_delete_todo_produces_correct_request() {
        let req = client().build_delete_todo(DOC);
        assert_eq!(req.method, HttpMethod::Delete);
        assert!(req.body.is_none());
    }

    #[test]
    fn login_never_sends_existing_token() {
        let req = client()
            .with_token("stale")
            .build_login("ana@example.com", "secret")
            .unwrap();
        assert_eq!(req.path, "http://localhost:1337/api/auth/local");
        assert!(req.header("authorization").is_none());
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["identifier"], "ana@example.com");
        assert_eq!(body["password"], "secret");
    }

    #[test]
    fn build_register_produces_correct_request() {
        let req = client().build_register("ana", "ana@example.com", "S3cret!pw").unwrap();
        assert_eq!(req.path, "http://localhost:1337/api/auth/local/register");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["username"], "ana");
        assert_eq!(body["email"], "ana@example.com");
    }

    #[test]
    fn parse_list_todos_accepts_envelope() {
        let body = format!(
            r#"{{"data":[{}],"meta":{{"pagination":{{"page":1,"pageSize":25,"pageCount":1,"total":1}}}}}}"#,
            r#"{"id":1,"documentId":"a","title":"Test","isCompleted":false}"#
        );
        let todos = client().parse_list_todos(HttpResponse::new(200, body)).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "Test");
    }

    #[test]
    fn parse_list_todos_accepts_bare_array() {
        let body = r#"[{"id":1,"documentId":"a","title":"Bare","isCompleted":true}]"#;
        let todos = client().parse_list_todos(HttpResponse::new(200, body)).unwrap();
        assert!(todos[0].is_completed);
    }

    #[test]
    fn parse_list_todos_reads_deeply_nested_descriptions() {
        let mut inline = r#"{"type":"text","text":"deep"}"#.to_string();
        for _ in 0..200 {
            inline = format!(r#"{{"type":"bold","children":[{inline}]}}"#);
        }
        let body = format!(
            r#"{{"data":[
            {{"id":1,"documentId":"a","title":"Healthy","isCompleted":false}},
            {{"id":2,"documentId":"b","title":"Deep","isCompleted":false,
              "description":[{{"type":"paragraph","children":[{inline}]}}]}}]}}"#
        );
        let todos = client().parse_list_todos(HttpResponse::new(200, body)).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].title, "Healthy");
        assert_eq!(todos[1].plain_description(), "deep");
    }

    #[test]
    fn parse_list_todos_tolerates_unknown_priority() {
        let body = r#"{"data":[
            {"id":1,"documentId":"a","title":"Odd","isCompleted":false,"priority":"Urgent"},
            {"id":2,"documentId":"b","title":"Known","isCompleted":false,"priority":"High"}]}"#;
        let todos = client().parse_list_todos(HttpResponse::new(200, body)).unwrap();
        assert_eq!(todos[0].priority, None);
        assert_eq!(priority_rank(todos[0].priority), 0);
        assert_eq!(todos[1].priority, Some(Priority::High));
    }

    #[test]
    fn parse_list_todos_keeps_text_around_bad_inline_nodes() {
        let body = r#"[{"id":1,"documentId":"a","title":"Mixed","isCompleted":false,
            "description":[{"type":"paragraph","children":[
                {"type":"text","text":"keep"},5,{"type":"link","children":"oops"},{"type":"text","text":7}]}]}]"#;
        let todos = client().parse_list_todos(HttpResponse::new(200, body)).unwrap();
        assert_eq!(todos[0].plain_description(), "keep7");
    }

    #[test]
    fn trailing_data_after_body_is_rejected() {
        let err = client()
            .parse_get_todo(HttpResponse::new(200, format!("{} x", todo_json("T", false))))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_get_todo_unwraps_data() {
        let todo = client()
            .parse_get_todo(HttpResponse::new(200, todo_json("Test", false)))
            .unwrap();
        assert_eq!(todo.document_id, DOC);
        assert_eq!(todo.plain_description(), "details");
    }

    #[test]
    fn parse_get_todo_not_found() {
        let err = client().parse_get_todo(HttpResponse::new(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_create_todo_accepts_any_2xx() {
        for status in [200, 201] {
            let todo = client()
                .parse_create_todo(HttpResponse::new(status, todo_json("New", false)))
                .unwrap();
            assert_eq!(todo.title, "New");
        }
    }

    #[test]
    fn parse_update_todo_success() {
        let todo = client()
            .parse_update_todo(HttpResponse::new(200, todo_json("Updated", true)))
            .unwrap();
        assert_eq!(todo.title, "Updated");
        assert!(todo.is_completed);
    }

    #[test]
    fn parse_delete_todo_outcomes() {
        let c = client();
        assert_eq!(
            c.parse_delete_todo(HttpResponse::new(204, "")).unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            c.parse_delete_todo(HttpResponse::new(404, "")).unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert!(c.parse_delete_todo(HttpResponse::new(500, "boom")).is_err());
    }

    #[test]
    fn validation_details_become_field_errors() {
        let body = r#"{"data":null,"error":{"status":400,"name":"ValidationError","message":"2 errors occurred",
            "details":{"errors":[
                {"path":["title"],"message":"title must be defined.","name":"ValidationError"},
                {"path":["description",0,"children"],"message":"must not be empty","name":"ValidationError"}
            ]}}}"#;
        let err = client().parse_create_todo(HttpResponse::new(400, body)).unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].path, vec!["title"]);
                assert_eq!(errors[1].path, vec!["description", "0", "children"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn cms_error_without_details_keeps_name_and_message() {
        let body = r#"{"data":null,"error":{"status":400,"name":"ValidationError","message":"Invalid identifier or password","details":{}}}"#;
        let err = client().parse_login(HttpResponse::new(400, body)).unwrap_err();
        match err {
            ApiError::HttpError { status, name, message } => {
                assert_eq!(status, 400);
                assert_eq!(name, "ValidationError");
                assert_eq!(message, "Invalid identifier or password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_classification() {
        let c = client();
        let unauthorized = r#"{"data":null,"error":{"status":401,"name":"UnauthorizedError","message":"Missing or invalid credentials"}}"#;
        let err = c.parse_list_todos(HttpResponse::new(401, unauthorized)).unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "unauthorized: Missing or invalid credentials");

        let err = c.parse_list_todos(HttpResponse::new(403, "")).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Server error (403)"));

        let err = c.parse_list_todos(HttpResponse::new(429, "")).unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));

        let err = c.parse_list_todos(HttpResponse::new(502, "bad gateway")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 502, ref message, .. } if message == "bad gateway"));
    }

    #[test]
    fn parse_login_success() {
        let body = r#"{"jwt":"abc.def.ghi","user":{"id":3,"username":"ana","email":"ana@example.com","confirmed":true,"blocked":false}}"#;
        let auth = client().parse_login(HttpResponse::new(200, body)).unwrap();
        assert_eq!(auth.jwt, "abc.def.ghi");
        assert_eq!(auth.user.username, "ana");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:1337/api/");
        assert_eq!(client.base_url(), "http://localhost:1337/api");
        let req = client.build_delete_todo("x");
        assert_eq!(req.path, "http://localhost:1337/api/todos/x");
    }

    #[test]
    fn from_config_carries_timeout() {
        let config = ClientConfig {
            base_url: "http://cms.local/api".to_string(),
            timeout: Duration::from_secs(3),
        };
        let req = TodoClient::from_config(&config).build_list_todos();
        assert_eq!(req.timeout, Duration::from_secs(3));
        assert!(req.path.starts_with("http://cms.local/api/todos"));
    }

    #[test]
    fn parse_list_todos_bad_json() {
        let err = client()
            .parse_list_todos(HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
