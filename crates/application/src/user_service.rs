use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohort_core::{AppError, AppResult, NonEmptyString, RoleId, UserId};
use cohort_domain::{
    ActiveRole, ActorContext, AuditAction, AuditOutcome, EmailAddress, User, validate_password,
};

use crate::{
    AccessRepository, AuditEntry, AuditRecorder, PasswordHasher, RequestMeta, TokenIssuer,
};

/// Repository port for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by id.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>>;

    /// Finds a user by login email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Persists a new user. Duplicate emails conflict.
    async fn create_user(&self, user: User) -> AppResult<User>;

    /// Sets the user's active role if the user currently holds an enabled
    /// assignment to it. Returns whether the update applied.
    async fn set_active_role_if_held(&self, user_id: UserId, role_id: RoleId)
    -> AppResult<bool>;
}

/// Input payload for account registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUserInput {
    /// Login email.
    pub email: String,
    /// Presentation name.
    pub display_name: String,
    /// Plaintext password, validated and hashed before storage.
    pub password: String,
}

/// Issued bearer session returned to authenticating clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Encoded bearer token.
    pub token: String,
    /// Token scheme, always `Bearer`.
    pub token_type: String,
    /// Validity window in seconds.
    pub expires_in_seconds: i64,
    /// Authenticated user id.
    pub user_id: UserId,
    /// Active role after the login transition, if any.
    pub active_role_id: Option<RoleId>,
}

/// Application service for authentication and the active-role workflow.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    access_repository: Arc<dyn AccessRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_issuer: Arc<dyn TokenIssuer>,
    audit: AuditRecorder,
}

impl UserService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        access_repository: Arc<dyn AccessRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_issuer: Arc<dyn TokenIssuer>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            user_repository,
            access_repository,
            password_hasher,
            token_issuer,
            audit,
        }
    }

    /// Authenticates a user with email and password and issues a bearer
    /// token.
    ///
    /// Fails with a generic message for any failure (unknown email, wrong
    /// password) to prevent account enumeration. A successful login runs
    /// the first-login active-role transition.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> AppResult<AuthSession> {
        let user = self.user_repository.find_by_email(email).await?;

        let Some(user) = user else {
            // OWASP: always hash to prevent timing attacks even when user not found.
            let _ = self.password_hasher.hash_password(password);
            self.record_login(None, None, AuditOutcome::Failure, Some("unknown email"), meta)
                .await;
            return Err(AppError::Unauthorized(
                "invalid email or password".to_owned(),
            ));
        };

        let password_valid = self
            .password_hasher
            .verify_password(password, &user.password_hash)?;

        if !password_valid {
            self.record_login(
                Some(user.id),
                user.active_role_id,
                AuditOutcome::Failure,
                Some("invalid password"),
                meta,
            )
            .await;
            return Err(AppError::Unauthorized(
                "invalid email or password".to_owned(),
            ));
        }

        let active_role_id = self.ensure_active_role(&user).await?;
        let issued = self.token_issuer.issue(user.id, active_role_id)?;

        self.record_login(Some(user.id), active_role_id, AuditOutcome::Success, None, meta)
            .await;

        Ok(AuthSession {
            token: issued.token,
            token_type: "Bearer".to_owned(),
            expires_in_seconds: issued.expires_in_seconds,
            user_id: user.id,
            active_role_id,
        })
    }

    /// First-login transition of the active-role state machine.
    ///
    /// Selects the earliest enabled assignment (by grant time, then role
    /// name) when no active role is set. Safe to repeat: once a role is
    /// selected this is a no-op, and a user with no assignments stays
    /// without an active role.
    pub async fn ensure_active_role(&self, user: &User) -> AppResult<Option<RoleId>> {
        if let Some(active_role_id) = user.active_role_id {
            return Ok(Some(active_role_id));
        }

        let mut assigned = self.access_repository.list_assigned_roles(user.id).await?;
        assigned.retain(|assigned| assigned.role.is_active);
        assigned.sort_by(|left, right| {
            left.assigned_at
                .cmp(&right.assigned_at)
                .then_with(|| left.role.name.cmp(&right.role.name))
        });

        let Some(first) = assigned.first() else {
            return Ok(None);
        };

        let updated = self
            .user_repository
            .set_active_role_if_held(user.id, first.role.id)
            .await?;

        if updated {
            return Ok(Some(first.role.id));
        }

        // Lost a race against a concurrent revoke; trust the stored value.
        let current = self.user_repository.find_by_id(user.id).await?;
        Ok(current.and_then(|user| user.active_role_id))
    }

    /// Registers a new account with no role assignments.
    pub async fn register(&self, input: RegisterUserInput, meta: &RequestMeta) -> AppResult<User> {
        let email = EmailAddress::new(input.email)?;
        let display_name = NonEmptyString::new(input.display_name.trim())?;
        validate_password(&input.password)?;

        let password_hash = self.password_hasher.hash_password(&input.password)?;

        let user = self
            .user_repository
            .create_user(User {
                id: UserId::new(),
                email,
                display_name: display_name.into(),
                password_hash,
                active_role_id: None,
                created_at: Utc::now(),
            })
            .await?;

        self.audit
            .record(AuditEntry {
                actor_id: Some(user.id),
                actor_active_role_id: None,
                action: AuditAction::UserRegistered,
                resource_type: "user".to_owned(),
                resource_id: Some(user.id.to_string()),
                details: None,
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                outcome: AuditOutcome::Success,
                error_message: None,
            })
            .await;

        Ok(user)
    }

    /// Switches the caller's active role to another held, enabled role.
    ///
    /// A switch to a role the user does not hold, or to a disabled role,
    /// is rejected without mutation; the rejection is audited alongside
    /// successful switches.
    pub async fn switch_active_role(
        &self,
        actor: &ActorContext,
        target_role_id: RoleId,
        meta: &RequestMeta,
    ) -> AppResult<ActiveRole> {
        let previous_role_id = actor.active_role().map(|role| role.role_id);
        let result = self.switch_active_role_inner(actor, target_role_id).await;

        let outcome = match result.as_ref() {
            Ok(_) => AuditOutcome::Success,
            Err(AppError::Internal(_)) => AuditOutcome::Error,
            Err(_) => AuditOutcome::Failure,
        };

        self.audit
            .record(AuditEntry {
                actor_id: Some(actor.user_id()),
                actor_active_role_id: previous_role_id,
                action: AuditAction::ActiveRoleSwitched,
                resource_type: "user_active_role".to_owned(),
                resource_id: Some(actor.user_id().to_string()),
                details: Some(serde_json::json!({
                    "previous_role_id": previous_role_id.map(|role_id| role_id.to_string()),
                    "new_role_id": target_role_id.to_string(),
                })),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                outcome,
                error_message: result.as_ref().err().map(ToString::to_string),
            })
            .await;

        result
    }

    async fn switch_active_role_inner(
        &self,
        actor: &ActorContext,
        target_role_id: RoleId,
    ) -> AppResult<ActiveRole> {
        let assigned = self
            .access_repository
            .list_assigned_roles(actor.user_id())
            .await?;

        let Some(held) = assigned
            .iter()
            .find(|assigned| assigned.role.id == target_role_id && assigned.role.is_active)
        else {
            return Err(AppError::Forbidden(format!(
                "user '{}' does not hold an enabled role '{target_role_id}'",
                actor.user_id()
            )));
        };

        let updated = self
            .user_repository
            .set_active_role_if_held(actor.user_id(), target_role_id)
            .await?;

        if !updated {
            return Err(AppError::Forbidden(format!(
                "user '{}' no longer holds role '{target_role_id}'",
                actor.user_id()
            )));
        }

        Ok(ActiveRole {
            role_id: held.role.id,
            name: held.role.name.clone(),
            display_name: held.role.display_name.clone(),
        })
    }

    async fn record_login(
        &self,
        actor_id: Option<UserId>,
        active_role_id: Option<RoleId>,
        outcome: AuditOutcome,
        error_message: Option<&str>,
        meta: &RequestMeta,
    ) {
        self.audit
            .record(AuditEntry {
                actor_id,
                actor_active_role_id: active_role_id,
                action: AuditAction::UserLoggedIn,
                resource_type: "user_session".to_owned(),
                resource_id: actor_id.map(|user_id| user_id.to_string()),
                details: None,
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                outcome,
                error_message: error_message.map(ToOwned::to_owned),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use cohort_core::{AppError, AppResult, RoleId, UserId};
    use cohort_domain::{
        ActorContext, AuditOutcome, EmailAddress, Permission, Role, RoleAssignment, User,
    };
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::{
        AccessRepository, AccessService, AssignedRole, AuditEntry, AuditLogEntry, AuditLogQuery,
        AuditLogRepository, AuditRecorder, AuditRepository, CreateRoleInput, IssuedToken,
        NewAssignment, NewRole, PasswordHasher, RoleAdminRepository, RoleAdminService,
        RoleAssignmentView, TokenIssuer,
    };

    use super::{AuthSession, RegisterUserInput, UserRepository, UserService};

    /// Shared in-memory store implementing every persistence port.
    #[derive(Default)]
    struct InMemoryStore {
        users: Mutex<Vec<User>>,
        roles: Mutex<Vec<Role>>,
        assignments: Mutex<Vec<RoleAssignment>>,
        audit_entries: Mutex<Vec<AuditEntry>>,
    }

    impl InMemoryStore {
        async fn insert_user(&self, user: User) {
            self.users.lock().await.push(user);
        }

        async fn insert_role(&self, role: Role) {
            self.roles.lock().await.push(role);
        }

        async fn insert_assignment(&self, user_id: UserId, role_id: RoleId, assigned_at: chrono::DateTime<Utc>) {
            self.assignments.lock().await.push(RoleAssignment {
                id: Uuid::new_v4(),
                user_id,
                role_id,
                assigned_by: None,
                assigned_at,
            });
        }

        async fn stored_active_role(&self, user_id: UserId) -> Option<RoleId> {
            self.users
                .lock()
                .await
                .iter()
                .find(|user| user.id == user_id)
                .and_then(|user| user.active_role_id)
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryStore {
        async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .await
                .iter()
                .find(|user| user.id == user_id)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .await
                .iter()
                .find(|user| user.email.as_str() == email)
                .cloned())
        }

        async fn create_user(&self, user: User) -> AppResult<User> {
            let mut users = self.users.lock().await;
            if users
                .iter()
                .any(|existing| existing.email.as_str() == user.email.as_str())
            {
                return Err(AppError::Conflict(format!(
                    "email '{}' is already registered",
                    user.email.as_str()
                )));
            }
            users.push(user.clone());
            Ok(user)
        }

        async fn set_active_role_if_held(
            &self,
            user_id: UserId,
            role_id: RoleId,
        ) -> AppResult<bool> {
            let held = self
                .assignments
                .lock()
                .await
                .iter()
                .any(|assignment| {
                    assignment.user_id == user_id && assignment.role_id == role_id
                });
            let enabled = self
                .roles
                .lock()
                .await
                .iter()
                .any(|role| role.id == role_id && role.is_active);
            if !held || !enabled {
                return Ok(false);
            }

            let mut users = self.users.lock().await;
            let Some(user) = users.iter_mut().find(|user| user.id == user_id) else {
                return Ok(false);
            };
            user.active_role_id = Some(role_id);
            Ok(true)
        }
    }

    #[async_trait]
    impl AccessRepository for InMemoryStore {
        async fn list_assigned_roles(&self, user_id: UserId) -> AppResult<Vec<AssignedRole>> {
            let assignments = self.assignments.lock().await;
            let roles = self.roles.lock().await;
            Ok(assignments
                .iter()
                .filter(|assignment| assignment.user_id == user_id)
                .filter_map(|assignment| {
                    roles
                        .iter()
                        .find(|role| role.id == assignment.role_id)
                        .map(|role| AssignedRole {
                            role: role.clone(),
                            assigned_at: assignment.assigned_at,
                        })
                })
                .collect())
        }
    }

    #[async_trait]
    impl RoleAdminRepository for InMemoryStore {
        async fn list_roles(&self) -> AppResult<Vec<Role>> {
            Ok(self.roles.lock().await.clone())
        }

        async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
            Ok(self
                .roles
                .lock()
                .await
                .iter()
                .find(|role| role.id == role_id)
                .cloned())
        }

        async fn create_role(&self, new_role: NewRole) -> AppResult<Role> {
            let mut roles = self.roles.lock().await;
            if roles.iter().any(|role| role.name == new_role.name) {
                return Err(AppError::Conflict(format!(
                    "role '{}' already exists",
                    new_role.name
                )));
            }
            let role = Role {
                id: RoleId::new(),
                name: new_role.name,
                display_name: new_role.display_name,
                description: new_role.description,
                permissions: new_role.permissions,
                is_active: true,
                created_at: Utc::now(),
            };
            roles.push(role.clone());
            Ok(role)
        }

        async fn update_role_permissions(
            &self,
            role_id: RoleId,
            permissions: BTreeSet<Permission>,
        ) -> AppResult<Role> {
            let mut roles = self.roles.lock().await;
            let role = roles
                .iter_mut()
                .find(|role| role.id == role_id)
                .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
            role.permissions = permissions;
            Ok(role.clone())
        }

        async fn set_role_active(&self, role_id: RoleId, is_active: bool) -> AppResult<Role> {
            let mut roles = self.roles.lock().await;
            let role = roles
                .iter_mut()
                .find(|role| role.id == role_id)
                .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
            role.is_active = is_active;
            Ok(role.clone())
        }

        async fn create_assignment(
            &self,
            assignment: NewAssignment,
        ) -> AppResult<RoleAssignment> {
            let mut assignments = self.assignments.lock().await;
            if assignments.iter().any(|existing| {
                existing.user_id == assignment.user_id && existing.role_id == assignment.role_id
            }) {
                return Err(AppError::Conflict(format!(
                    "user '{}' already holds role '{}'",
                    assignment.user_id, assignment.role_id
                )));
            }
            let created = RoleAssignment {
                id: Uuid::new_v4(),
                user_id: assignment.user_id,
                role_id: assignment.role_id,
                assigned_by: assignment.assigned_by,
                assigned_at: Utc::now(),
            };
            assignments.push(created.clone());
            Ok(created)
        }

        async fn delete_assignment(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
            let mut assignments = self.assignments.lock().await;
            let before = assignments.len();
            assignments.retain(|existing| {
                !(existing.user_id == user_id && existing.role_id == role_id)
            });
            if assignments.len() == before {
                return Err(AppError::NotFound(format!(
                    "assignment '{user_id}:{role_id}' was not found"
                )));
            }
            drop(assignments);

            // Clearing the worn role mirrors the storage transaction.
            let mut users = self.users.lock().await;
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id)
                && user.active_role_id == Some(role_id)
            {
                user.active_role_id = None;
            }
            Ok(())
        }

        async fn list_assignments(&self) -> AppResult<Vec<RoleAssignmentView>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl AuditRepository for InMemoryStore {
        async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
            self.audit_entries.lock().await.push(entry);
            Ok(())
        }
    }

    struct EmptyAuditLogRepository;

    #[async_trait]
    impl AuditLogRepository for EmptyAuditLogRepository {
        async fn list_recent_entries(
            &self,
            _query: AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(Vec::new())
        }
    }

    struct PlainTextHasher;

    impl PasswordHasher for PlainTextHasher {
        fn hash_password(&self, password: &str) -> AppResult<String> {
            Ok(format!("plain:{password}"))
        }

        fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("plain:{password}"))
        }
    }

    struct StaticTokenIssuer;

    impl TokenIssuer for StaticTokenIssuer {
        fn issue(
            &self,
            user_id: UserId,
            _active_role_id: Option<RoleId>,
        ) -> AppResult<IssuedToken> {
            Ok(IssuedToken {
                token: format!("token-{user_id}"),
                expires_in_seconds: 3600,
            })
        }
    }

    fn user_record(email: &str, password: &str) -> User {
        User {
            id: UserId::new(),
            email: EmailAddress::new(email).unwrap_or_else(|_| panic!("test email")),
            display_name: "Test User".to_owned(),
            password_hash: format!("plain:{password}"),
            active_role_id: None,
            created_at: Utc::now(),
        }
    }

    fn role_record(name: &str, permissions: BTreeSet<Permission>, is_active: bool) -> Role {
        Role {
            id: RoleId::new(),
            name: name.to_owned(),
            display_name: name.to_owned(),
            description: None,
            permissions,
            is_active,
            created_at: Utc::now(),
        }
    }

    fn user_service(store: &Arc<InMemoryStore>) -> UserService {
        UserService::new(
            store.clone(),
            store.clone(),
            Arc::new(PlainTextHasher),
            Arc::new(StaticTokenIssuer),
            AuditRecorder::new(store.clone()),
        )
    }

    fn access_service(store: &Arc<InMemoryStore>) -> AccessService {
        AccessService::new(store.clone(), store.clone())
    }

    fn role_admin_service(store: &Arc<InMemoryStore>) -> RoleAdminService {
        RoleAdminService::new(
            store.clone(),
            Arc::new(EmptyAuditLogRepository),
            AuditRecorder::new(store.clone()),
        )
    }

    fn admin_actor() -> ActorContext {
        ActorContext::new(
            UserId::new(),
            "Admin",
            None,
            vec!["administrator".to_owned()],
            None,
            BTreeSet::from([Permission::ManageRoles]),
        )
    }

    async fn login(service: &UserService, email: &str, password: &str) -> AppResult<AuthSession> {
        service
            .login(email, password, &crate::RequestMeta::default())
            .await
    }

    #[tokio::test]
    async fn login_with_unknown_email_fails_generically() {
        let store = Arc::new(InMemoryStore::default());
        let service = user_service(&store);

        let result = login(&service, "missing@example.com", "any-password-here").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let entries = store.audit_entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AuditOutcome::Failure);
        assert_eq!(entries[0].actor_id, None);
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails_generically() {
        let store = Arc::new(InMemoryStore::default());
        store
            .insert_user(user_record("avery@example.com", "correct-horse"))
            .await;
        let service = user_service(&store);

        let result = login(&service, "avery@example.com", "wrong-password").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn first_login_selects_earliest_enabled_assignment() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let older = role_record("learner", BTreeSet::from([Permission::BrowseCourses]), true);
        let older_id = older.id;
        let newer = role_record("creator", BTreeSet::from([Permission::CreateCourse]), true);
        let newer_id = newer.id;
        store.insert_role(older).await;
        store.insert_role(newer).await;
        let base = Utc::now();
        store
            .insert_assignment(user_id, newer_id, base + Duration::minutes(5))
            .await;
        store.insert_assignment(user_id, older_id, base).await;

        let service = user_service(&store);
        let session = login(&service, "avery@example.com", "correct-horse").await;
        assert_eq!(
            session.ok().and_then(|session| session.active_role_id),
            Some(older_id)
        );
        assert_eq!(store.stored_active_role(user_id).await, Some(older_id));

        // Repeating the transition keeps the selection.
        let second = login(&service, "avery@example.com", "correct-horse").await;
        assert_eq!(
            second.ok().and_then(|session| session.active_role_id),
            Some(older_id)
        );
    }

    #[tokio::test]
    async fn first_login_without_assignments_keeps_active_role_null() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let service = user_service(&store);
        let session = login(&service, "avery@example.com", "correct-horse").await;
        assert!(session.is_ok());
        assert_eq!(
            session.ok().and_then(|session| session.active_role_id),
            None
        );
        assert_eq!(store.stored_active_role(user_id).await, None);
    }

    #[tokio::test]
    async fn first_login_skips_disabled_assignments() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let disabled = role_record("legacy", BTreeSet::new(), false);
        let disabled_id = disabled.id;
        let enabled = role_record("learner", BTreeSet::new(), true);
        let enabled_id = enabled.id;
        store.insert_role(disabled).await;
        store.insert_role(enabled).await;
        let base = Utc::now();
        store.insert_assignment(user_id, disabled_id, base).await;
        store
            .insert_assignment(user_id, enabled_id, base + Duration::minutes(1))
            .await;

        let service = user_service(&store);
        let session = login(&service, "avery@example.com", "correct-horse").await;
        assert_eq!(
            session.ok().and_then(|session| session.active_role_id),
            Some(enabled_id)
        );
    }

    #[tokio::test]
    async fn switch_to_unheld_role_is_rejected_without_mutation() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let held = role_record("learner", BTreeSet::new(), true);
        let held_id = held.id;
        store.insert_role(held).await;
        store.insert_assignment(user_id, held_id, Utc::now()).await;
        let applied = store.set_active_role_if_held(user_id, held_id).await;
        assert_eq!(applied.unwrap_or(false), true);

        let service = user_service(&store);
        let access = access_service(&store);
        let actor = access.resolve_actor(user_id).await;
        let Ok(actor) = actor else {
            panic!("actor resolution failed");
        };

        let result = service
            .switch_active_role(&actor, RoleId::new(), &crate::RequestMeta::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(store.stored_active_role(user_id).await, Some(held_id));

        let entries = store.audit_entries.lock().await;
        let switch_entries: Vec<_> = entries
            .iter()
            .filter(|entry| entry.action.as_str() == "active_role.switched")
            .collect();
        assert_eq!(switch_entries.len(), 1);
        assert_eq!(switch_entries[0].outcome, AuditOutcome::Failure);
    }

    #[tokio::test]
    async fn switch_to_disabled_role_is_rejected() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let held = role_record("learner", BTreeSet::new(), true);
        let held_id = held.id;
        let disabled = role_record("legacy", BTreeSet::new(), false);
        let disabled_id = disabled.id;
        store.insert_role(held).await;
        store.insert_role(disabled).await;
        store.insert_assignment(user_id, held_id, Utc::now()).await;
        store
            .insert_assignment(user_id, disabled_id, Utc::now())
            .await;

        let service = user_service(&store);
        let access = access_service(&store);
        let Ok(actor) = access.resolve_actor(user_id).await else {
            panic!("actor resolution failed");
        };

        let result = service
            .switch_active_role(&actor, disabled_id, &crate::RequestMeta::default())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn successful_switch_updates_store_and_audits_both_roles() {
        let store = Arc::new(InMemoryStore::default());
        let user = user_record("avery@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let learner = role_record("learner", BTreeSet::new(), true);
        let learner_id = learner.id;
        let creator = role_record("creator", BTreeSet::new(), true);
        let creator_id = creator.id;
        store.insert_role(learner).await;
        store.insert_role(creator).await;
        store.insert_assignment(user_id, learner_id, Utc::now()).await;
        store.insert_assignment(user_id, creator_id, Utc::now()).await;
        let applied = store.set_active_role_if_held(user_id, learner_id).await;
        assert_eq!(applied.unwrap_or(false), true);

        let service = user_service(&store);
        let access = access_service(&store);
        let Ok(actor) = access.resolve_actor(user_id).await else {
            panic!("actor resolution failed");
        };

        let switched = service
            .switch_active_role(&actor, creator_id, &crate::RequestMeta::default())
            .await;
        assert_eq!(switched.ok().map(|role| role.role_id), Some(creator_id));
        assert_eq!(store.stored_active_role(user_id).await, Some(creator_id));

        let entries = store.audit_entries.lock().await;
        let Some(entry) = entries
            .iter()
            .find(|entry| entry.action.as_str() == "active_role.switched")
        else {
            panic!("switch audit entry missing");
        };
        assert_eq!(entry.outcome, AuditOutcome::Success);
        let details = entry.details.clone().unwrap_or_default();
        assert_eq!(
            details.get("previous_role_id").and_then(|value| value.as_str()),
            Some(learner_id.to_string()).as_deref()
        );
        assert_eq!(
            details.get("new_role_id").and_then(|value| value.as_str()),
            Some(creator_id.to_string()).as_deref()
        );
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let store = Arc::new(InMemoryStore::default());
        store
            .insert_user(user_record("avery@example.com", "correct-horse"))
            .await;
        let service = user_service(&store);

        let result = service
            .register(
                RegisterUserInput {
                    email: "avery@example.com".to_owned(),
                    display_name: "Avery".to_owned(),
                    password: "another-passphrase".to_owned(),
                },
                &crate::RequestMeta::default(),
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn end_to_end_grant_resolve_switch_scenario() {
        let store = Arc::new(InMemoryStore::default());
        let users = user_service(&store);
        let access = access_service(&store);
        let roles = role_admin_service(&store);
        let admin = admin_actor();
        let meta = crate::RequestMeta::default();

        // U starts with no roles; first login selects nothing.
        let user = user_record("u@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;
        let session = login(&users, "u@example.com", "correct-horse").await;
        assert_eq!(session.ok().and_then(|session| session.active_role_id), None);

        // Admin grants "learner".
        let learner = roles
            .create_role(
                &admin,
                CreateRoleInput {
                    name: "learner".to_owned(),
                    display_name: "Learner".to_owned(),
                    description: None,
                    permissions: BTreeSet::from([Permission::BrowseCourses]),
                },
                &meta,
            )
            .await;
        let Ok(learner) = learner else {
            panic!("learner role creation failed");
        };
        let granted = roles.assign_role(&admin, user_id, learner.id, &meta).await;
        assert!(granted.is_ok());

        assert_eq!(
            access
                .has_permission(user_id, Permission::BrowseCourses, None)
                .await
                .unwrap_or(false),
            true
        );
        assert_eq!(
            access
                .has_permission(user_id, Permission::ManageUsers, None)
                .await
                .unwrap_or(true),
            false
        );

        // Admin grants "content_creator"; unscoped union covers both.
        let creator = roles
            .create_role(
                &admin,
                CreateRoleInput {
                    name: "content_creator".to_owned(),
                    display_name: "Content Creator".to_owned(),
                    description: None,
                    permissions: BTreeSet::from([Permission::CreateCourse]),
                },
                &meta,
            )
            .await;
        let Ok(creator) = creator else {
            panic!("creator role creation failed");
        };
        let granted = roles.assign_role(&admin, user_id, creator.id, &meta).await;
        assert!(granted.is_ok());

        let union = access.permissions_for(user_id, None).await;
        assert_eq!(
            union.unwrap_or_default(),
            BTreeSet::from([Permission::BrowseCourses, Permission::CreateCourse])
        );

        // U switches the active role to "content_creator".
        let Ok(actor) = access.resolve_actor(user_id).await else {
            panic!("actor resolution failed");
        };
        let switched = users.switch_active_role(&actor, creator.id, &meta).await;
        assert!(switched.is_ok());

        // Active-role scope excludes learner grants; unscoped still unions.
        assert_eq!(
            access
                .has_permission(user_id, Permission::BrowseCourses, Some(creator.id))
                .await
                .unwrap_or(true),
            false
        );
        assert_eq!(
            access
                .has_permission(user_id, Permission::BrowseCourses, None)
                .await
                .unwrap_or(false),
            true
        );

        // The resolved actor context reflects the switch.
        let Ok(actor) = access.resolve_actor(user_id).await else {
            panic!("actor resolution failed");
        };
        assert_eq!(
            actor.active_role().map(|role| role.role_id),
            Some(creator.id)
        );
        assert!(actor.has_permission(Permission::CreateCourse));
        assert!(!actor.has_permission(Permission::BrowseCourses));
    }

    #[tokio::test]
    async fn revoking_the_worn_role_clears_the_active_pointer() {
        let store = Arc::new(InMemoryStore::default());
        let users = user_service(&store);
        let access = access_service(&store);
        let roles = role_admin_service(&store);
        let admin = admin_actor();
        let meta = crate::RequestMeta::default();

        let user = user_record("u@example.com", "correct-horse");
        let user_id = user.id;
        store.insert_user(user).await;

        let learner = role_record("learner", BTreeSet::from([Permission::BrowseCourses]), true);
        let learner_id = learner.id;
        store.insert_role(learner).await;
        store.insert_assignment(user_id, learner_id, Utc::now()).await;
        let session = login(&users, "u@example.com", "correct-horse").await;
        assert_eq!(
            session.ok().and_then(|session| session.active_role_id),
            Some(learner_id)
        );

        let revoked = roles.revoke_role(&admin, user_id, learner_id, &meta).await;
        assert!(revoked.is_ok());
        assert_eq!(store.stored_active_role(user_id).await, None);

        let Ok(actor) = access.resolve_actor(user_id).await else {
            panic!("actor resolution failed");
        };
        assert!(actor.active_role().is_none());
        assert!(!actor.has_permission(Permission::BrowseCourses));
    }
}
