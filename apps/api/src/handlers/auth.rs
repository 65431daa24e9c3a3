use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use cohort_application::RegisterUserInput;
use cohort_core::{AppError, RoleId};
use cohort_domain::ActorContext;
use uuid::Uuid;

use crate::dto::{
    ActiveRoleResponse, ActorResponse, LoginRequest, RegisterRequest, SessionResponse,
    SwitchRoleRequest, UserResponse,
};
use crate::error::ApiResult;
use crate::middleware::request_meta;
use crate::state::AppState;

pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let meta = request_meta(&headers);

    let session = state
        .user_service
        .login(payload.email.as_str(), payload.password.as_str(), &meta)
        .await?;

    Ok(Json(SessionResponse::from(session)))
}

pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let meta = request_meta(&headers);

    let user = state
        .user_service
        .register(
            RegisterUserInput {
                email: payload.email,
                display_name: payload.display_name,
                password: payload.password,
            },
            &meta,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn me_handler(
    Extension(actor): Extension<ActorContext>,
) -> ApiResult<Json<ActorResponse>> {
    Ok(Json(ActorResponse::from(actor)))
}

pub async fn switch_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    headers: HeaderMap,
    Json(payload): Json<SwitchRoleRequest>,
) -> ApiResult<Json<ActiveRoleResponse>> {
    let role_id = Uuid::parse_str(payload.role_id.as_str())
        .map(RoleId::from_uuid)
        .map_err(|error| AppError::Validation(format!("invalid role id: {error}")))?;

    let meta = request_meta(&headers);

    let active_role = state
        .user_service
        .switch_active_role(&actor, role_id, &meta)
        .await?;

    Ok(Json(ActiveRoleResponse::from(active_role)))
}
