use std::fmt::Display;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use austin_core::MemberId;
use austin_infra::{MemberLinks, StoreResult};
use austin_todos::Todo;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// Entity names used in alert headers.
pub const TODO_ENTITY: &str = "austinTodo";
pub const MEMBER_ENTITY: &str = "austinOneGridUser";
pub const AUTHORITY_ENTITY: &str = "authority";

/// `X-<app>-alert` / `X-<app>-params` headers announcing a successful write,
/// e.g. `austinApp.austinTodo.created` with the entity id as parameter.
pub fn alert_headers(app_name: &str, entity: &str, action: &str, param: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let alert = format!("{app_name}.{entity}.{action}");
    let names = (
        HeaderName::try_from(format!("x-{}-alert", app_name.to_ascii_lowercase())),
        HeaderName::try_from(format!("x-{}-params", app_name.to_ascii_lowercase())),
    );
    if let (Ok(alert_name), Ok(params_name)) = names {
        if let Ok(value) = HeaderValue::from_str(&alert) {
            headers.insert(alert_name, value);
        }
        if let Ok(value) = HeaderValue::from_str(param) {
            headers.insert(params_name, value);
        }
    }
    headers
}

/// Look up the referenced users and assign them to `todo` on both sides.
pub async fn assign_members(
    services: &AppServices,
    todo: &mut Todo,
    member_ids: &[MemberId],
) -> Result<(), ApiError> {
    let members = services.resolve_members(member_ids).await?;
    todo.users.clear();
    for mut member in members {
        todo.add_user(&mut member)?;
    }
    Ok(())
}

/// Save `todo` without reading it back. With `MemberLinks::Replace` the
/// returned todo carries the users the request resolved; with `Keep` it is bare.
pub async fn save_todo(services: &AppServices, todo: Todo, links: MemberLinks) -> StoreResult<Todo> {
    let users = match links {
        MemberLinks::Replace => todo.users.clone(),
        MemberLinks::Keep => Vec::new(),
    };
    let mut saved = services.todos.save(todo, links).await?;
    saved.users = users;
    Ok(saved)
}

pub fn location(path: &str, id: impl Display) -> String {
    format!("{path}/{id}")
}
