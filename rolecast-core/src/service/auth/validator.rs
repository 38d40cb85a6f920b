//! Credential extraction and validation for the handshake
//!
//! Peers hand the credential over in one of three places: an
//! `Authorization` header (with or without the `Bearer` scheme), a path
//! segment, or a `token` query parameter (browser WebSocket clients cannot
//! set headers).

use super::{Claims, TokenVerifier};
use crate::{models::UserId, Error, Result};
use std::sync::Arc;

/// Validates credentials through a [`TokenVerifier`]
#[derive(Clone)]
pub struct JwtValidator {
    verifier: Arc<dyn TokenVerifier>,
}

impl JwtValidator {
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Extract bearer token from Authorization header value
    ///
    /// Supports both "Bearer <token>" and "bearer <token>" formats.
    pub fn extract_bearer_token(auth_value: &str) -> Result<String> {
        let auth_value = auth_value.trim();
        let token = auth_value
            .strip_prefix("Bearer ")
            .or_else(|| auth_value.strip_prefix("bearer "))
            .ok_or_else(|| {
                Error::Authentication(
                    "Authorization header must start with 'Bearer '".to_string(),
                )
            })?;

        Ok(token.trim().to_string())
    }

    /// Extract the token from an Authorization header value
    ///
    /// Accepts `Bearer <token>` as well as a bare token, which is what the
    /// REST clients send.
    pub fn extract_header_token(auth_value: &str) -> Result<String> {
        let auth_value = auth_value.trim();
        let token = auth_value
            .strip_prefix("Bearer ")
            .or_else(|| auth_value.strip_prefix("bearer "))
            .unwrap_or(auth_value)
            .trim();

        if token.is_empty() {
            return Err(Error::Authentication("Missing token".to_string()));
        }
        Ok(token.to_string())
    }

    /// Validate a raw token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Authentication("Missing token".to_string()));
        }
        self.verifier.verify(token)
    }

    /// Validate a raw token and return the identity it carries
    pub fn validate_and_extract_user_id(&self, token: &str) -> Result<UserId> {
        let claims = self.validate_token(token)?;
        if claims.sub.is_empty() {
            return Err(Error::Authentication("Token has no subject".to_string()));
        }
        Ok(claims.user_id())
    }

    /// Validate an Authorization header value and return the identity
    pub fn validate_http_extract_user_id(&self, auth_header: &str) -> Result<UserId> {
        let token = Self::extract_header_token(auth_header)?;
        self.validate_and_extract_user_id(&token)
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish()
    }
}
