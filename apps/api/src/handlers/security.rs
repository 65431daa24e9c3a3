use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use cohort_application::{AuditLogQuery, CreateRoleInput};
use cohort_core::{AppError, RoleId, UserId};
use cohort_domain::{ActorContext, Permission};
use uuid::Uuid;

use crate::dto::{
    AssignRoleRequest, AuditLogEntryResponse, AuditLogQueryParams, CreateRoleRequest,
    RevokeRoleRequest, RoleAssignmentResponse, RoleResponse, SetRoleActivationRequest,
    UpdateRolePermissionsRequest,
};
use crate::error::ApiResult;
use crate::middleware::request_meta;
use crate::state::AppState;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_admin_service
        .list_roles(&actor)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let permissions = parse_permissions(&payload.permissions)?;
    let meta = request_meta(&headers);

    let role = state
        .role_admin_service
        .create_role(
            &actor,
            CreateRoleInput {
                name: payload.name,
                display_name: payload.display_name,
                description: payload.description,
                permissions,
            },
            &meta,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(role_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRolePermissionsRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let role_id = parse_role_id(role_id.as_str())?;
    let permissions = parse_permissions(&payload.permissions)?;
    let meta = request_meta(&headers);

    let role = state
        .role_admin_service
        .update_role_permissions(&actor, role_id, permissions, &meta)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn set_role_activation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(role_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SetRoleActivationRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let role_id = parse_role_id(role_id.as_str())?;
    let meta = request_meta(&headers);

    let role = state
        .role_admin_service
        .set_role_active(&actor, role_id, payload.is_active, &meta)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn list_role_assignments_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let assignments = state
        .role_admin_service
        .list_assignments(&actor)
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    headers: HeaderMap,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user_id(payload.user_id.as_str())?;
    let role_id = parse_role_id(payload.role_id.as_str())?;
    let meta = request_meta(&headers);

    state
        .role_admin_service
        .assign_role(&actor, user_id, role_id, &meta)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    headers: HeaderMap,
    Json(payload): Json<RevokeRoleRequest>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user_id(payload.user_id.as_str())?;
    let role_id = parse_role_id(payload.role_id.as_str())?;
    let meta = request_meta(&headers);

    state
        .role_admin_service
        .revoke_role(&actor, user_id, role_id, &meta)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let entries = state
        .role_admin_service
        .list_audit_log(
            &actor,
            AuditLogQuery {
                limit: params.limit.unwrap_or(50),
                offset: params.offset.unwrap_or(0),
                action: params.action,
                actor_id: params.actor_id,
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

fn parse_permissions(values: &[String]) -> Result<BTreeSet<Permission>, AppError> {
    values
        .iter()
        .map(|value| Permission::from_transport(value.as_str()))
        .collect()
}

fn parse_role_id(value: &str) -> Result<RoleId, AppError> {
    Uuid::parse_str(value)
        .map(RoleId::from_uuid)
        .map_err(|error| AppError::Validation(format!("invalid role id: {error}")))
}

fn parse_user_id(value: &str) -> Result<UserId, AppError> {
    Uuid::parse_str(value)
        .map(UserId::from_uuid)
        .map_err(|error| AppError::Validation(format!("invalid user id: {error}")))
}
