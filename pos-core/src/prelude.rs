//! `use pos_core::prelude::*;` — the common set of imports for application
//! and service crates.

pub use crate::config::{ConfigError, ConfigLoader};
pub use crate::error::AppError;
pub use crate::guards::{Guard, GuardContext, Identity, NoIdentity, PathParams, PreAuthGuard, PreAuthGuardContext, RolesGuard};
pub use crate::health::{HealthIndicator, HealthState, HealthStatus};
pub use crate::request_id::RequestId;
pub use crate::types::{ApiResult, JsonResult};
