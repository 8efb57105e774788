//! Resumable chunked-file-upload receiver.
//!
//! Module layout mirrors the teacher's crate root: domain types, an error type with its
//! own `IntoResponse`, configuration, the infrastructure adapters, one coordinator that
//! owns them, transport (`api`), and cross-cutting `middleware`.

pub mod api;
pub mod app_state;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod middleware;
