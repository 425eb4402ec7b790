//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Requests keep the core shape in C-compatible form: `*mut c_char` instead
//! of `String`, a raw header array instead of `Vec`. Parsed payloads cross
//! as JSON text in `FfiResult::data_json`, so the C side needs one free
//! function per allocation kind no matter how the records evolve.

use std::ffi::CString;
use std::os::raw::c_char;

use cms_todo::{ApiError, HttpMethod, HttpRequest, TodoClient};

/// Opaque handle to a `TodoClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiCmsClient {
    pub(crate) inner: TodoClient,
}

/// Copy `s` into a C string owned by the caller. Interior NUL bytes cannot be
/// represented and are dropped.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `cms_build_*` functions. The C caller executes the request,
/// giving up after `timeout_ms`, and passes the response back through
/// `cms_parse_*`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
    pub timeout_ms: u64,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let path = into_c_string(req.path);
        let body = match req.body {
            Some(b) => into_c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            // Boxed slice so capacity equals length when freed.
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: into_c_string(k),
                    value: into_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        let ffi_req = Box::new(FfiHttpRequest {
            method: req.method.into(),
            path,
            headers,
            headers_len,
            body,
            timeout_ms: u64::try_from(req.timeout.as_millis()).unwrap_or(u64::MAX),
        });
        Box::into_raw(ffi_req)
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing an HTTP request,
/// then passes a pointer to a `cms_parse_*` function. The FFI layer reads
/// but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NotFound = 1,
    Unauthorized = 2,
    Forbidden = 3,
    RateLimited = 4,
    Validation = 5,
    Http = 6,
    Deserialization = 7,
    Serialization = 8,
    Panic = 9,
    NullArg = 10,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data_json`
/// holds the parsed payload as JSON.
/// On failure `error_code` describes the category and `error_message` is a
/// human-readable C string. `data_json` is null, except for `Validation`
/// where it lists the rejected fields as `[{"path": [...], "message": ...}]`.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_json: *mut c_char,
}

impl FfiResult {
    fn boxed(
        error_code: FfiErrorCode,
        error_message: Option<String>,
        http_status: u16,
        data_json: Option<String>,
    ) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: error_message.map_or(std::ptr::null_mut(), into_c_string),
            http_status,
            data_json: data_json.map_or(std::ptr::null_mut(), into_c_string),
        }))
    }

    /// Build a success result from an already encoded payload.
    pub(crate) fn ok_json(encoded: serde_json::Result<String>) -> *mut Self {
        match encoded {
            Ok(json) => Self::boxed(FfiErrorCode::Ok, None, 0, Some(json)),
            Err(e) => Self::from_error(ApiError::SerializationError(e.to_string())),
        }
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let http_status = err.status().unwrap_or(0);
        let message = err.to_string();
        let (error_code, data_json) = match err {
            ApiError::NotFound => (FfiErrorCode::NotFound, None),
            ApiError::Unauthorized(_) => (FfiErrorCode::Unauthorized, None),
            ApiError::Forbidden(_) => (FfiErrorCode::Forbidden, None),
            ApiError::RateLimited => (FfiErrorCode::RateLimited, None),
            ApiError::Validation(errors) => {
                (FfiErrorCode::Validation, serde_json::to_string(&errors).ok())
            }
            ApiError::HttpError { .. } => (FfiErrorCode::Http, None),
            ApiError::DeserializationError(_) => (FfiErrorCode::Deserialization, None),
            ApiError::SerializationError(_) => (FfiErrorCode::Serialization, None),
        };
        Self::boxed(error_code, Some(message), http_status, data_json)
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::NullArg,
            Some(format!("null argument: {name}")),
            0,
            None,
        )
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, Some(msg.to_string()), 0, None)
    }
}
