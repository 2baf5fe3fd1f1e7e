//! The uniform response envelope every `/api/v1/*` endpoint returns:
//! `{ success, data, error, meta, timestamp }`. Errors go through
//! `AppError`'s own `IntoResponse`; this module covers the success side and
//! pagination metadata.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<()>,
    pub meta: Option<Meta>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Clone)]
pub struct Meta {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub total: Option<u64>,
    pub request_id: Option<String>,
}

impl Meta {
    pub fn pagination(page: u64, page_size: u64, total: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            total: Some(total),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Wraps a success payload in the standard envelope at `200 OK`.
pub fn ok<T: Serialize>(data: T) -> Ok<T> {
    Ok { data, meta: None, status: StatusCode::OK }
}

/// Wraps a success payload with an explicit status code (e.g. `201 Created`).
pub fn with_status<T: Serialize>(status: StatusCode, data: T) -> Ok<T> {
    Ok { data, meta: None, status }
}

pub struct Ok<T: Serialize> {
    data: T,
    meta: Option<Meta>,
    status: StatusCode,
}

impl<T: Serialize> Ok<T> {
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T: Serialize> IntoResponse for Ok<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            data: Some(self.data),
            error: None,
            meta: self.meta,
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_meta_carries_all_fields() {
        let meta = Meta::pagination(2, 20, 57).with_request_id("req-1");
        assert_eq!(meta.page, Some(2));
        assert_eq!(meta.total, Some(57));
        assert_eq!(meta.request_id.as_deref(), Some("req-1"));
    }
}
