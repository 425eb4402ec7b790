//! C-ABI wrapper around `cms-todo-core`.
//!
//! # Overview
//! Exposes the todo and sign-in API through `extern "C"` functions so any
//! language with a C FFI can build and parse HTTP requests/responses without
//! linking to serde directly. Drafts go in as JSON and parsed records come
//! back as JSON.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-operation `build_*` / `parse_*` mirrors the core API 1:1.
//! - A single `FfiResult` envelope conveys success payloads and errors
//!   uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `cms_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use cms_todo::{richtext, ApiError, DeleteOutcome, HttpResponse, RichText, TodoClient, TodoDraft};

use types::*;

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new `TodoClient` bound to `base_url`, the API root such as
/// `http://localhost:1337/api`. `token` may be null for a signed-out client.
///
/// Returns null if `base_url` is null or if an internal panic occurs.
/// The caller must free the returned pointer with `cms_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn cms_client_new(
    base_url: *const c_char,
    token: *const c_char,
) -> *mut FfiCmsClient {
    catch_unwind(|| {
        let Some(url) = c_str(base_url) else {
            return std::ptr::null_mut();
        };
        let client = TodoClient::new(url);
        let client = match c_str(token) {
            Some(jwt) if !jwt.is_empty() => client.with_token(jwt),
            _ => client,
        };
        Box::into_raw(Box::new(FfiCmsClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `TodoClient` created by `cms_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_client_free(client: *mut FfiCmsClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Rich text
// ---------------------------------------------------------------------------

/// Convert flat text to a block document, returned as a JSON array.
/// Null `text` is treated as absent and yields one empty paragraph.
///
/// The caller must free the returned string with `cms_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn cms_richtext_to_structured(text: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let blocks = richtext::to_structured(c_str(text));
        match serde_json::to_string(&blocks) {
            Ok(json) => into_c_string(json),
            Err(e) => {
                tracing::error!(error = %e, "could not encode block document");
                into_c_string("[]".to_string())
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Flatten a stored description, given as JSON, to plain text. Null input
/// and input that is not valid JSON both yield an empty string.
///
/// The caller must free the returned string with `cms_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn cms_richtext_to_plain(json: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let description = match c_str(json).map(RichText::from_json) {
            Some(Ok(description)) => description,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "description is not valid JSON");
                RichText::Absent
            }
            None => RichText::Absent,
        };
        into_c_string(richtext::to_flat_text(&description))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Run `build` against the client behind `client`. Null client, a failed
/// build or a panic all give null.
fn build_with(
    client: *const FfiCmsClient,
    build: impl FnOnce(&TodoClient) -> Option<cms_todo::HttpRequest>,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match build(&client.inner) {
            Some(req) => FfiHttpRequest::from_core(req),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Decode a draft such as `{"title": "...", "description": "...",
/// "status": "in-progress", "priority": "High", "dueDate": "2026-10-20"}`.
fn draft_from_json(json: *const c_char) -> Option<TodoDraft> {
    match serde_json::from_str(c_str(json)?) {
        Ok(draft) => Some(draft),
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed todo draft");
            None
        }
    }
}

fn log_build_error(operation: &str, err: ApiError) {
    tracing::error!(operation, error = %err, "could not build request");
}

/// Build an HTTP request for listing the signed-in user's todos.
///
/// Returns null if `client` is null.
/// The caller must free the returned pointer with `cms_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_list_todos(client: *const FfiCmsClient) -> *mut FfiHttpRequest {
    build_with(client, |c| Some(c.build_list_todos()))
}

/// Build an HTTP request for fetching a single todo by document id.
///
/// Returns null if `client` or `document_id` is null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_get_todo(
    client: *const FfiCmsClient,
    document_id: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| Some(c.build_get_todo(c_str(document_id)?)))
}

/// Build an HTTP request for creating a todo from a JSON draft.
///
/// Returns null if an argument is null or `draft_json` is not a valid draft.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_create_todo(
    client: *const FfiCmsClient,
    draft_json: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let draft = draft_from_json(draft_json)?;
        c.build_create_todo(&draft)
            .map_err(|e| log_build_error("create", e))
            .ok()
    })
}

/// Build an HTTP request that replaces a todo's fields with a JSON draft.
///
/// Returns null if an argument is null or `draft_json` is not a valid draft.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_update_todo(
    client: *const FfiCmsClient,
    document_id: *const c_char,
    draft_json: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let document_id = c_str(document_id)?;
        let draft = draft_from_json(draft_json)?;
        c.build_update_todo(document_id, &draft)
            .map_err(|e| log_build_error("update", e))
            .ok()
    })
}

/// Build an HTTP request for deleting a todo by document id.
///
/// Returns null if `client` or `document_id` is null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_delete_todo(
    client: *const FfiCmsClient,
    document_id: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| Some(c.build_delete_todo(c_str(document_id)?)))
}

/// Build a sign-in request. `identifier` is an email or a username.
///
/// Returns null if any argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_login(
    client: *const FfiCmsClient,
    identifier: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        c.build_login(c_str(identifier)?, c_str(password)?)
            .map_err(|e| log_build_error("login", e))
            .ok()
    })
}

/// Build a sign-up request.
///
/// Returns null if any argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_build_register(
    client: *const FfiCmsClient,
    username: *const c_char,
    email: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        c.build_register(c_str(username)?, c_str(email)?, c_str(password)?)
            .map_err(|e| log_build_error("register", e))
            .ok()
    })
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body reads
/// as empty.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    HttpResponse::new(resp.status, c_str(resp.body).unwrap_or_default())
}

/// Check both pointers, run `parse` and wrap its outcome in an `FfiResult`.
fn parse_with<T>(
    operation: &str,
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
    parse: impl FnOnce(&TodoClient, HttpResponse) -> Result<T, ApiError>,
    encode: impl FnOnce(&T) -> serde_json::Result<String>,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match parse(&client.inner, ffi_response_to_core(resp)) {
            Ok(value) => FfiResult::ok_json(encode(&value)),
            Err(e) => FfiResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiResult::panic(&format!("panic in {operation}")))
}

/// Parse an HTTP response from a list-todos request.
///
/// On success `data_json` is a JSON array of todo records.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_list_todos(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_list_todos",
        client,
        response,
        TodoClient::parse_list_todos,
        |todos| serde_json::to_string(todos),
    )
}

/// Parse an HTTP response from a get-todo request.
///
/// On success `data_json` is a single todo record.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_get_todo(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_get_todo",
        client,
        response,
        TodoClient::parse_get_todo,
        |todo| serde_json::to_string(todo),
    )
}

/// Parse an HTTP response from a create-todo request.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_create_todo(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_create_todo",
        client,
        response,
        TodoClient::parse_create_todo,
        |todo| serde_json::to_string(todo),
    )
}

/// Parse an HTTP response from an update-todo request.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_update_todo(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_update_todo",
        client,
        response,
        TodoClient::parse_update_todo,
        |todo| serde_json::to_string(todo),
    )
}

/// Parse an HTTP response from a delete-todo request.
///
/// On success `data_json` is `"deleted"`, or `"already-gone"` when the
/// server answered 404.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_delete_todo(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_delete_todo",
        client,
        response,
        TodoClient::parse_delete_todo,
        |outcome| {
            serde_json::to_string(match outcome {
                DeleteOutcome::Deleted => "deleted",
                DeleteOutcome::AlreadyGone => "already-gone",
            })
        },
    )
}

/// Parse an HTTP response from a sign-in request.
///
/// On success `data_json` is `{"jwt": "...", "user": {...}}`.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_login(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_login",
        client,
        response,
        TodoClient::parse_login,
        |auth| serde_json::to_string(auth),
    )
}

/// Parse an HTTP response from a sign-up request.
#[unsafe(no_mangle)]
pub extern "C" fn cms_parse_register(
    client: *const FfiCmsClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    parse_with(
        "cms_parse_register",
        client,
        response,
        TodoClient::parse_register,
        |auth| serde_json::to_string(auth),
    )
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `cms_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        cms_free_string(req.path);
        cms_free_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                cms_free_string(h.key);
                cms_free_string(h.value);
            }
        }
    });
}

/// Free an `FfiResult` returned by any `cms_parse_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        cms_free_string(result.error_message);
        cms_free_string(result.data_json);
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cms_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
