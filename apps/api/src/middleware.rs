use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use cohort_application::{AuditEntry, RequestMeta};
use cohort_core::AppError;
use cohort_domain::{ActorContext, AuditAction, AuditOutcome, Permission};

use crate::error::ApiResult;
use crate::state::AppState;

/// Authentication gate: verifies the bearer credential, loads the live
/// identity and attaches the resolved actor context.
///
/// The permission scope comes from the stored active role, not the token
/// claim, so role switches apply without token reissue. Any failure
/// rejects the request before handlers run; nothing is attached partially.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())?;
    let claims = state.token_verifier.verify(token)?;

    let actor = state
        .access_service
        .resolve_actor(claims.user_id)
        .await
        .map_err(|error| match error {
            AppError::NotFound(_) => {
                AppError::Unauthorized("credential subject no longer exists".to_owned())
            }
            other => other,
        })?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Declarative permission requirement attached to a route group.
#[derive(Debug, Clone)]
pub struct RequiredPermissions {
    mode: RequirementMode,
    permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequirementMode {
    Any,
    All,
}

impl RequiredPermissions {
    /// Requires one specific permission.
    #[must_use]
    pub fn single(permission: Permission) -> Self {
        Self {
            mode: RequirementMode::All,
            permissions: vec![permission],
        }
    }

    /// Requires at least one of the listed permissions.
    #[must_use]
    pub fn any(permissions: Vec<Permission>) -> Self {
        Self {
            mode: RequirementMode::Any,
            permissions,
        }
    }

    /// Requires every listed permission.
    #[must_use]
    pub fn all(permissions: Vec<Permission>) -> Self {
        Self {
            mode: RequirementMode::All,
            permissions,
        }
    }

    fn satisfied_by(&self, actor: &ActorContext) -> bool {
        match self.mode {
            RequirementMode::Any => actor.has_any_permission(&self.permissions),
            RequirementMode::All => actor.has_all_permissions(&self.permissions),
        }
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self
            .permissions
            .iter()
            .map(Permission::as_str)
            .collect();
        match self.mode {
            RequirementMode::Any => format!("any of [{}]", names.join(", ")),
            RequirementMode::All => format!("all of [{}]", names.join(", ")),
        }
    }
}

/// Declarative role-membership requirement attached to a route group.
///
/// Checks held, enabled roles; the role does not have to be the one
/// currently worn.
#[derive(Debug, Clone)]
pub struct RequiredRole(pub String);

/// Guard middleware enforcing a [`RequiredPermissions`] extension.
pub async fn require_permissions(
    axum::Extension(required): axum::Extension<RequiredPermissions>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let Some(actor) = request.extensions().get::<ActorContext>() else {
        // A guard without an authenticated actor is a wiring bug; deny.
        return Err(AppError::Unauthorized("authentication required".to_owned()).into());
    };

    if !required.satisfied_by(actor) {
        return Err(AppError::Forbidden(format!(
            "missing required permissions: {}",
            required.describe()
        ))
        .into());
    }

    Ok(next.run(request).await)
}

/// Guard middleware enforcing a [`RequiredRole`] extension.
pub async fn require_role(
    axum::Extension(required): axum::Extension<RequiredRole>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let Some(actor) = request.extensions().get::<ActorContext>() else {
        return Err(AppError::Unauthorized("authentication required".to_owned()).into());
    };

    if !actor.has_role(required.0.as_str()) {
        return Err(AppError::Forbidden(format!(
            "missing required role '{}'",
            required.0
        ))
        .into());
    }

    Ok(next.run(request).await)
}

/// Action tag for the generic per-route audit wrapper.
#[derive(Debug, Clone)]
pub struct AuditTag {
    /// Action recorded for requests through the wrapped route.
    pub action: AuditAction,
    /// Resource type recorded with the entry.
    pub resource_type: &'static str,
}

/// Best-effort audit wrapper recording the final response status along
/// with request metadata and the resolved actor. Routes opt in by
/// attaching an [`AuditTag`] extension; a failed write never fails the
/// request.
pub async fn route_audit(
    State(state): State<AppState>,
    axum::Extension(tag): axum::Extension<AuditTag>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(ToOwned::to_owned);
    let meta = request_meta(request.headers());
    let actor = request.extensions().get::<ActorContext>().cloned();

    let response = next.run(request).await;

    let status = response.status();
    let outcome = if status.is_success() {
        AuditOutcome::Success
    } else if status.is_server_error() {
        AuditOutcome::Error
    } else {
        AuditOutcome::Failure
    };

    state
        .audit_recorder
        .record(AuditEntry {
            actor_id: actor.as_ref().map(ActorContext::user_id),
            actor_active_role_id: actor
                .as_ref()
                .and_then(|actor| actor.active_role())
                .map(|role| role.role_id),
            action: tag.action,
            resource_type: tag.resource_type.to_owned(),
            resource_id: None,
            details: Some(serde_json::json!({
                "method": method,
                "path": path,
                "query": query,
                "status": status.as_u16(),
            })),
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
            outcome,
            error_message: None,
        })
        .await;

    response
}

/// Extracts audit provenance from request headers.
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    RequestMeta {
        ip_address,
        user_agent,
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid authorization header".to_owned()))?;

    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a bearer credential".to_owned()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use cohort_core::UserId;
    use cohort_domain::{ActorContext, Permission};
    use tower::ServiceExt;

    use super::{
        RequiredPermissions, RequiredRole, bearer_token, request_meta, require_permissions,
        require_role,
    };

    fn actor(permissions: BTreeSet<Permission>) -> ActorContext {
        ActorContext::new(UserId::new(), "Test", None, Vec::new(), None, permissions)
    }

    #[test]
    fn bearer_token_parses_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).ok(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_and_malformed_authorization_headers_are_rejected() {
        let headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn required_permissions_any_and_all_modes() {
        let actor = actor(BTreeSet::from([Permission::BrowseCourses]));

        assert!(
            RequiredPermissions::any(vec![Permission::BrowseCourses, Permission::ManageUsers])
                .satisfied_by(&actor)
        );
        assert!(
            !RequiredPermissions::all(vec![Permission::BrowseCourses, Permission::ManageUsers])
                .satisfied_by(&actor)
        );
        assert!(!RequiredPermissions::any(Vec::new()).satisfied_by(&actor));
        assert!(RequiredPermissions::all(Vec::new()).satisfied_by(&actor));
    }

    #[test]
    fn request_meta_reads_forwarded_ip_and_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("cohort-test"));

        let meta = request_meta(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("cohort-test"));
    }

    fn guarded_router(required: RequiredPermissions) -> Router {
        Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(from_fn(require_permissions))
            .layer(axum::Extension(required))
    }

    async fn send(router: Router) -> StatusCode {
        let Ok(request) = Request::builder().uri("/guarded").body(Body::empty()) else {
            panic!("request construction failed");
        };
        match router.oneshot(request).await {
            Ok(response) => response.status(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tokio::test]
    async fn guard_without_resolved_actor_denies_as_unauthenticated() {
        let router = guarded_router(RequiredPermissions::single(Permission::ManageRoles));
        assert_eq!(send(router).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn guard_denies_missing_permission_as_forbidden() {
        let router = guarded_router(RequiredPermissions::single(Permission::ManageRoles))
            .layer(axum::Extension(actor(BTreeSet::from([
                Permission::BrowseCourses,
            ]))));
        assert_eq!(send(router).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn guard_allows_granted_permission() {
        let router = guarded_router(RequiredPermissions::single(Permission::ManageRoles))
            .layer(axum::Extension(actor(BTreeSet::from([
                Permission::ManageRoles,
            ]))));
        assert_eq!(send(router).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn role_guard_checks_membership_not_the_worn_role() {
        let member = ActorContext::new(
            UserId::new(),
            "Test",
            None,
            vec!["learner".to_owned()],
            None,
            BTreeSet::new(),
        );

        let allowing = Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(from_fn(require_role))
            .layer(axum::Extension(RequiredRole("learner".to_owned())))
            .layer(axum::Extension(member.clone()));
        assert_eq!(send(allowing).await, StatusCode::OK);

        let denying = Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(from_fn(require_role))
            .layer(axum::Extension(RequiredRole("administrator".to_owned())))
            .layer(axum::Extension(member));
        assert_eq!(send(denying).await, StatusCode::FORBIDDEN);
    }
}
