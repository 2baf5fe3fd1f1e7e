//! Menu reads. The cache decides hit/miss/bypass; this handler's only job is
//! to surface that decision to the client via `X-Cache` so a degraded read
//! (served stale because the database couldn't be reached) is visible
//! without being a hard error.

use pos_core::http::{HeaderValue, IntoResponse, Path, State};
use pos_core::AppError;
use pos_menu::CacheStatus;

use crate::auth::Authenticated;
use crate::routes::restaurants::require_same_tenant;
use crate::state::AppState;

pub async fn get_menu(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
    Authenticated(ctx): Authenticated,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;

    let (menu, cache_status) = state.menu.get_menu(&restaurant_id).await?;
    let mut response = pos_core::http::envelope::ok((*menu).clone()).into_response();
    if cache_status == CacheStatus::Bypass {
        response
            .headers_mut()
            .insert("x-cache", HeaderValue::from_static("bypass"));
    }
    Ok(response)
}
