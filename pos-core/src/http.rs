//! Thin re-export surface over axum so application crates depend on
//! `pos_core::http` rather than reaching for `axum` directly.

pub use axum::extract::{ConnectInfo, Path, Query, State};
pub use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
pub use axum::response::{IntoResponse, Redirect, Response};
pub use axum::routing::{delete, get, patch, post, put};
pub use axum::{serve, Json, Router};
pub use bytes::Bytes;

pub mod envelope;
