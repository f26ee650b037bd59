//! `/api/todos`: the only resource whose reads hydrate a collection.
//!
//! `GET /api/todos/{id}` always returns the todo with its users; the list
//! endpoint does so only with `eagerload=true`. Write endpoints never hydrate:
//! they echo the users resolved from the request body.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use austin_core::{Auditable, DomainError};
use austin_infra::{LoadMode, MemberLinks, StoreError};
use austin_todos::TodoPatch;

use crate::app::dto::{self, TodoListQuery, TodoPatchRequest, TodoRequest};
use crate::app::errors::ApiError;
use crate::app::routes::common::{TODO_ENTITY, alert_headers, assign_members, location, save_todo};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_todo).get(list_todos))
        .route(
            "/:id",
            get(get_todo)
                .put(update_todo)
                .patch(partial_update_todo)
                .delete(delete_todo),
        )
}

/// POST /api/todos
pub async fn create_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<TodoRequest>,
) -> Result<Response, ApiError> {
    debug!(task = %body.task, actor = ?actor.actor(), "REST request to save Todo");
    if body.id.is_some() {
        return Err(ApiError::id_exists("todo"));
    }

    let (mut todo, member_ids) = body.into_parts();
    todo.validate()?;
    assign_members(&services, &mut todo, &member_ids).await?;
    todo.stamp_created(actor.stamp());

    let saved = save_todo(&services, todo, MemberLinks::Replace).await?;
    let id = saved.id.map(|id| id.to_string()).unwrap_or_default();

    let mut headers = alert_headers(&services.app_name, TODO_ENTITY, "created", &id);
    if let Ok(value) = HeaderValue::from_str(&location("/api/todos", &id)) {
        headers.insert(header::LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(saved)).into_response())
}

/// PUT /api/todos/:id
pub async fn update_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(raw_id): Path<String>,
    Json(body): Json<TodoRequest>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to update Todo");
    let id = dto::parse_todo_id(&raw_id)?;
    let Some(body_id) = body.id else {
        return Err(ApiError::id_null());
    };
    if body_id != id {
        return Err(ApiError::id_invalid());
    }
    let Some(existing) = services.todos.find_by_id(id, LoadMode::Bare).await? else {
        return Err(ApiError::id_not_found());
    };

    let (mut todo, member_ids) = body.into_parts();
    todo.validate()?;
    if todo.created_date.is_none() {
        todo.created_date = existing.created_date;
    }
    if todo.created_by.is_none() {
        todo.created_by = existing.created_by;
    }
    assign_members(&services, &mut todo, &member_ids).await?;
    todo.stamp_modified(actor.stamp());

    let saved = save_todo(&services, todo, MemberLinks::Replace).await?;
    let headers = alert_headers(&services.app_name, TODO_ENTITY, "updated", &id.to_string());
    Ok((StatusCode::OK, headers, Json(saved)).into_response())
}

/// PATCH /api/todos/:id (`application/json` or `application/merge-patch+json`)
///
/// Only fields present and non-null in the body are written; `users`, when
/// present, replaces the whole assignment set and is echoed back. Without
/// `users` the response carries the todo's scalar fields only.
pub async fn partial_update_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(raw_id): Path<String>,
    Json(body): Json<TodoPatchRequest>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to partial update Todo");
    let id = dto::parse_todo_id(&raw_id)?;
    let Some(body_id) = body.id else {
        return Err(ApiError::id_null());
    };
    if body_id != id {
        return Err(ApiError::id_invalid());
    }
    if !services.todos.exists_by_id(id).await? {
        return Err(ApiError::id_not_found());
    }
    let Some(mut todo) = services.todos.find_by_id(id, LoadMode::Bare).await? else {
        return Err(ApiError::NotFound("todo"));
    };

    let patch = TodoPatch::from(body);
    patch.apply_to(&mut todo);
    todo.validate()?;
    let links = match &patch.users {
        Some(member_ids) => {
            assign_members(&services, &mut todo, member_ids).await?;
            MemberLinks::Replace
        }
        None => MemberLinks::Keep,
    };
    todo.stamp_modified(actor.stamp());

    let saved = match save_todo(&services, todo, links).await {
        Ok(saved) => saved,
        Err(StoreError::Domain(DomainError::NotFound)) => return Err(ApiError::NotFound("todo")),
        Err(e) => return Err(e.into()),
    };
    let headers = alert_headers(&services.app_name, TODO_ENTITY, "updated", &id.to_string());
    Ok((StatusCode::OK, headers, Json(saved)).into_response())
}

/// GET /api/todos?eagerload=true&page=0&size=20
///
/// Without `page`/`size` the whole table is returned. Paged responses carry
/// the total row count in `X-Total-Count`.
pub async fn list_todos(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<TodoListQuery>,
) -> Result<Response, ApiError> {
    debug!(eagerload = query.eagerload, page = ?query.page, size = ?query.size, "REST request to get all Todos");
    let mode = LoadMode::from_eager(query.eagerload);

    match query.page_request(services.paging.default_size, services.paging.max_size)? {
        None => Ok(Json(services.todos.find_all(mode).await?).into_response()),
        Some(request) => {
            let page = services.todos.find_page(request, mode).await?;
            let total = page.total_elements().to_string();
            let mut headers = axum::http::HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&total) {
                headers.insert(TOTAL_COUNT_HEADER, value);
            }
            Ok((headers, Json(page.into_content())).into_response())
        }
    }
}

/// GET /api/todos/:id
pub async fn get_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> Result<Json<austin_todos::Todo>, ApiError> {
    debug!(id = %raw_id, "REST request to get Todo");
    let id = dto::parse_todo_id(&raw_id)?;
    services
        .todos
        .find_one_with_eager_relationships(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("todo"))
}

/// DELETE /api/todos/:id
pub async fn delete_todo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    debug!(id = %raw_id, "REST request to delete Todo");
    let id = dto::parse_todo_id(&raw_id)?;
    let removed = services.todos.delete_by_id(id).await?;
    debug!(todo_id = %id, removed, "todo deleted");
    let headers = alert_headers(&services.app_name, TODO_ENTITY, "deleted", &id.to_string());
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}
