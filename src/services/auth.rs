//! Authorization gate: turns a bearer credential into a caller identity
//!
//! Credentials are issued by the identity provider; this service only
//! verifies them.

use std::collections::HashMap;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{
        id::UserId,
        user::{Identity, Role},
    },
};

#[cfg_attr(test, mockall::automock)]
pub trait AuthorizationGate: Send + Sync {
    /// Resolve a credential, failing with `InvalidCredential` if it cannot be trusted
    fn resolve(&self, credential: &str) -> AppResult<Identity>;
}

/// JWT claims as issued by the identity provider.
///
/// Older tokens carry `id` / `rol` instead of `sub` / `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "id")]
    pub sub: String,
    #[serde(alias = "rol")]
    pub role: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    fn into_identity(self) -> AppResult<Identity> {
        let user_id: i64 = self
            .sub
            .parse()
            .map_err(|_| AppError::InvalidCredential(format!("subject {:?} is not a user id", self.sub)))?;
        let role: Role = self.role.parse().map_err(AppError::InvalidCredential)?;
        Ok(Identity::new(UserId(user_id), role))
    }
}

/// HS256 bearer-token verification
#[derive(Clone)]
pub struct JwtGate {
    key: DecodingKey,
    validation: Validation,
}

impl JwtGate {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl AuthorizationGate for JwtGate {
    fn resolve(&self, credential: &str) -> AppResult<Identity> {
        let data = decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| AppError::InvalidCredential(e.to_string()))?;
        data.claims.into_identity()
    }
}

/// Fixed token table, for tests and local runs without an identity provider
#[derive(Clone, Default)]
pub struct StaticGate {
    tokens: HashMap<String, Identity>,
}

impl StaticGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, identity: Identity) -> Self {
        self.tokens.insert(token.to_string(), identity);
        self
    }
}

impl AuthorizationGate for StaticGate {
    fn resolve(&self, credential: &str) -> AppResult<Identity> {
        self.tokens
            .get(credential)
            .copied()
            .ok_or_else(|| AppError::InvalidCredential("unknown token".to_string()))
    }
}
