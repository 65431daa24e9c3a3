use cohort_core::{AppResult, RoleId, UserId};

/// Port for password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using Argon2id.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    /// Must run in constant time regardless of validity.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// A signed bearer credential handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Encoded bearer token.
    pub token: String,
    /// Validity window in seconds.
    pub expires_in_seconds: i64,
}

/// Claims extracted from a verified bearer credential.
///
/// The active role claim is informational only; permission resolution
/// always reads the live stored active role so switches apply without
/// token reissue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Active role at issue time.
    pub active_role_id: Option<RoleId>,
}

/// Port for issuing bearer credentials.
pub trait TokenIssuer: Send + Sync {
    /// Issues a signed token embedding the user id and active role claim.
    fn issue(&self, user_id: UserId, active_role_id: Option<RoleId>) -> AppResult<IssuedToken>;
}

/// Port for verifying bearer credentials.
pub trait TokenVerifier: Send + Sync {
    /// Verifies signature and expiry and returns the embedded claims.
    fn verify(&self, token: &str) -> AppResult<TokenClaims>;
}
