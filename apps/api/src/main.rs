//! Cohort API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use cohort_application::{AccessService, AuditRecorder, RoleAdminService, UserService};
use cohort_core::AppError;
use cohort_domain::{AuditAction, Permission};
use cohort_infrastructure::{
    Argon2PasswordHasher, JwtTokenService, PostgresAccessRepository, PostgresAuditLogRepository,
    PostgresAuditRepository, PostgresRoleAdminRepository, PostgresUserRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::middleware::{AuditTag, RequiredPermissions};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    if config.dev_seed {
        dev_seed::run(pool.clone()).await?;
    }

    let access_repository = Arc::new(PostgresAccessRepository::new(pool.clone()));
    let user_repository = Arc::new(PostgresUserRepository::new(pool.clone()));
    let role_admin_repository = Arc::new(PostgresRoleAdminRepository::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let audit_log_repository = Arc::new(PostgresAuditLogRepository::new(pool.clone()));

    let audit_recorder = AuditRecorder::new(audit_repository);
    let access_service = AccessService::new(access_repository.clone(), user_repository.clone());
    let role_admin_service = RoleAdminService::new(
        role_admin_repository,
        audit_log_repository,
        audit_recorder.clone(),
    );

    let token_service = Arc::new(JwtTokenService::new(
        config.auth_token_secret.as_str(),
        config.auth_token_validity_seconds,
    ));
    let password_hasher = Arc::new(Argon2PasswordHasher::new());
    let user_service = UserService::new(
        user_repository,
        access_repository,
        password_hasher,
        token_service.clone(),
        audit_recorder.clone(),
    );

    let app_state = AppState {
        access_service,
        role_admin_service,
        user_service,
        audit_recorder,
        token_verifier: token_service,
        pool,
    };

    // Role administration requires the elevated manage permission.
    let role_admin_routes = Router::new()
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}/permissions",
            put(handlers::security::update_role_permissions_handler),
        )
        .route(
            "/api/security/roles/{role_id}/activation",
            put(handlers::security::set_role_activation_handler),
        )
        .route(
            "/api/security/role-assignments",
            get(handlers::security::list_role_assignments_handler)
                .post(handlers::security::assign_role_handler),
        )
        .route(
            "/api/security/role-unassignments",
            post(handlers::security::revoke_role_handler),
        )
        .route_layer(from_fn(middleware::require_permissions))
        .layer(axum::Extension(RequiredPermissions::single(
            Permission::ManageRoles,
        )));

    // Reading the audit trail is itself a sensitive, audited action.
    let audit_routes = Router::new()
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route_layer(from_fn(middleware::require_permissions))
        .layer(axum::Extension(RequiredPermissions::single(
            Permission::ViewAuditLog,
        )))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::route_audit,
        ))
        .layer(axum::Extension(AuditTag {
            action: AuditAction::RouteAccessed,
            resource_type: "audit_log",
        }));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me_handler))
        .route("/auth/switch-role", post(handlers::auth::switch_role_handler))
        .merge(role_admin_routes)
        .merge(audit_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/login", post(handlers::auth::login_handler))
        .route("/auth/register", post(handlers::auth::register_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let address = config.socket_address()?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "cohort-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
