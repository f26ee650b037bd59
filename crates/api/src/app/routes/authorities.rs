use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::debug;

use austin_todos::Authority;

use crate::app::dto::AuthorityRequest;
use crate::app::errors::ApiError;
use crate::app::routes::common::{AUTHORITY_ENTITY, alert_headers};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_authorities).post(create_authority))
        .route("/:name", get(get_authority).delete(delete_authority))
}

/// POST /api/authorities
pub async fn create_authority(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<AuthorityRequest>,
) -> Result<Response, ApiError> {
    debug!(name = %body.name, "REST request to save Authority");
    let authority = Authority::new(body.name)?;
    if services.authorities.find_by_name(&authority.name).await?.is_some() {
        return Err(ApiError::id_exists("authority"));
    }
    let saved = services.authorities.save(authority).await?;
    let headers = alert_headers(&services.app_name, AUTHORITY_ENTITY, "created", &saved.name);
    Ok((StatusCode::CREATED, headers, Json(saved)).into_response())
}

/// GET /api/authorities
pub async fn list_authorities(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Authority>>, ApiError> {
    debug!("REST request to get all Authorities");
    Ok(Json(services.authorities.find_all().await?))
}

/// GET /api/authorities/:name
pub async fn get_authority(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> Result<Json<Authority>, ApiError> {
    debug!(%name, "REST request to get Authority");
    services
        .authorities
        .find_by_name(&name)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("authority"))
}

/// DELETE /api/authorities/:name
pub async fn delete_authority(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    debug!(%name, "REST request to delete Authority");
    services.authorities.delete_by_name(&name).await?;
    let headers = alert_headers(&services.app_name, AUTHORITY_ENTITY, "deleted", &name);
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}
