//! Convenience type aliases for handler return types.

use crate::error::AppError;
use crate::http::Json;

pub type ApiResult<T> = Result<T, AppError>;
pub type JsonResult<T> = Result<Json<T>, AppError>;
