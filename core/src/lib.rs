//! Synchronous client core for a todo list kept in a headless CMS.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The caller executes the
//! actual HTTP round-trip, making the core fully deterministic and testable.
//!
//! Todo descriptions are edited as flat text but stored by the CMS as a
//! block document; `richtext` converts between the two.
//!
//! # Design
//! - `TodoClient` is stateless. Signing in yields a new client carrying the
//!   bearer token.
//! - Each operation is split into `build_*` (produces request) and `parse_*`
//!   (consumes response), so the I/O boundary is explicit.
//! - Session storage, list filtering and form checks are plain functions over
//!   host-supplied data.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod forms;
pub mod http;
pub mod listing;
pub mod richtext;
pub mod session;
pub mod types;

pub use client::TodoClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, FieldError};
pub use forms::{FormError, LoginForm, RegistrationForm};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use listing::{BoardView, Counts, FilterMode, TodoBoard};
pub use richtext::{to_flat_text, to_structured, Block, BlockKind, InlineNode, RichText};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use types::{
    AuthResponse, DeleteOutcome, Priority, Todo, TodoDraft, TodoPayload, TodoStatus, User,
};
