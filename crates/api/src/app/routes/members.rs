use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use austin_core::DomainError;
use austin_infra::StoreError;
use austin_todos::OneGridUser;

use crate::app::dto::{self, MemberPatchRequest, MemberRequest};
use crate::app::errors::ApiError;
use crate::app::routes::common::{MEMBER_ENTITY, alert_headers, location};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_member).get(list_members))
        .route(
            "/:id",
            get(get_member)
                .put(update_member)
                .patch(partial_update_member)
                .delete(delete_member),
        )
}

/// POST /api/one-grid-users
pub async fn create_member(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<MemberRequest>,
) -> Result<Response, ApiError> {
    debug!(email = %body.email, "REST request to save OneGridUser");
    if body.id.is_some() {
        return Err(ApiError::id_exists("oneGridUser"));
    }
    let user = OneGridUser::from(body);
    user.validate()?;

    let saved = services.members.save(user).await?;
    let id = saved.id.map(|id| id.to_string()).unwrap_or_default();
    let mut headers = alert_headers(&services.app_name, MEMBER_ENTITY, "created", &id);
    if let Ok(value) = HeaderValue::from_str(&location("/api/one-grid-users", &id)) {
        headers.insert(header::LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(saved)).into_response())
}

/// PUT /api/one-grid-users/:id
pub async fn update_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    Json(body): Json<MemberRequest>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to update OneGridUser");
    let id = dto::parse_member_id(&raw_id)?;
    let Some(body_id) = body.id else {
        return Err(ApiError::id_null());
    };
    if body_id != id {
        return Err(ApiError::id_invalid());
    }
    if !services.members.exists_by_id(id).await? {
        return Err(ApiError::id_not_found());
    }

    let user = OneGridUser::from(body);
    user.validate()?;
    let saved = services.members.save(user).await?;
    let headers = alert_headers(&services.app_name, MEMBER_ENTITY, "updated", &id.to_string());
    Ok((StatusCode::OK, headers, Json(saved)).into_response())
}

/// PATCH /api/one-grid-users/:id
pub async fn partial_update_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    Json(body): Json<MemberPatchRequest>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to partial update OneGridUser");
    let id = dto::parse_member_id(&raw_id)?;
    let Some(body_id) = body.id else {
        return Err(ApiError::id_null());
    };
    if body_id != id {
        return Err(ApiError::id_invalid());
    }
    if !services.members.exists_by_id(id).await? {
        return Err(ApiError::id_not_found());
    }
    let Some(mut user) = services.members.find_by_id(id).await? else {
        return Err(ApiError::NotFound("oneGridUser"));
    };

    body.patch.apply_to(&mut user);
    user.validate()?;
    let saved = match services.members.save(user).await {
        Ok(saved) => saved,
        Err(StoreError::Domain(DomainError::NotFound)) => return Err(ApiError::NotFound("oneGridUser")),
        Err(e) => return Err(e.into()),
    };
    let headers = alert_headers(&services.app_name, MEMBER_ENTITY, "updated", &id.to_string());
    Ok((StatusCode::OK, headers, Json(saved)).into_response())
}

/// GET /api/one-grid-users
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<OneGridUser>>, ApiError> {
    debug!("REST request to get all OneGridUsers");
    Ok(Json(services.members.find_all().await?))
}

/// GET /api/one-grid-users/:id
pub async fn get_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> Result<Json<OneGridUser>, ApiError> {
    debug!(id = %raw_id, "REST request to get OneGridUser");
    let id = dto::parse_member_id(&raw_id)?;
    services
        .members
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("oneGridUser"))
}

/// DELETE /api/one-grid-users/:id
pub async fn delete_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to delete OneGridUser");
    let id = dto::parse_member_id(&raw_id)?;
    services.members.delete_by_id(id).await?;
    let headers = alert_headers(&services.app_name, MEMBER_ENTITY, "deleted", &id.to_string());
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}
