//! Signed bearer token issuance and verification.

use chrono::{Duration, Utc};
use cohort_application::{IssuedToken, TokenClaims, TokenIssuer, TokenVerifier};
use cohort_core::{AppError, AppResult, RoleId, UserId};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire format of the signed claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject user id.
    sub: String,
    /// Active role at issue time. Informational only: resolution always
    /// reads the stored active role.
    active_role: Option<String>,
    /// Issued-at timestamp.
    iat: i64,
    /// Expiry timestamp.
    exp: i64,
}

/// HS256 bearer token service for the authentication gate.
#[derive(Clone)]
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity_seconds: i64,
}

impl JwtTokenService {
    /// Creates a token service from a shared secret.
    #[must_use]
    pub fn new(secret: &str, validity_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validity_seconds,
        }
    }
}

impl TokenIssuer for JwtTokenService {
    fn issue(&self, user_id: UserId, active_role_id: Option<RoleId>) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.validity_seconds);

        let claims = Claims {
            sub: user_id.to_string(),
            active_role: active_role_id.map(|role_id| role_id.to_string()),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|error| AppError::Internal(format!("failed to encode token: {error}")))?;

        Ok(IssuedToken {
            token,
            expires_in_seconds: self.validity_seconds,
        })
    }
}

impl TokenVerifier for JwtTokenService {
    fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AppError::Unauthorized("invalid or expired token".to_owned()))?;

        let user_id = Uuid::parse_str(data.claims.sub.as_str())
            .map(UserId::from_uuid)
            .map_err(|_| AppError::Unauthorized("invalid token subject".to_owned()))?;

        let active_role_id = data
            .claims
            .active_role
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::Unauthorized("invalid token role claim".to_owned()))?
            .map(RoleId::from_uuid);

        Ok(TokenClaims {
            user_id,
            active_role_id,
        })
    }
}
