use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::TokenVerifier;
use crate::{config::JwtConfig, models::UserId, Error, Result};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (tokens minted by the REST login carry it as `userId`)
    #[serde(alias = "userId")]
    pub sub: String,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }
}

/// JWT service for signing and verifying HS256 tokens against a shared secret
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
    leeway_seconds: u64,
    token_ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &self.algorithm)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service from the configured secret
    pub fn new(config: &JwtConfig) -> Result<Self> {
        if config.secret.trim().is_empty() {
            return Err(Error::InvalidInput("JWT secret must not be empty".to_string()));
        }
        let ttl_hours = i64::try_from(config.token_ttl_hours)
            .map_err(|_| Error::InvalidInput("JWT token TTL out of range".to_string()))?;

        let secret = config.secret.as_bytes();
        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            algorithm: Algorithm::HS256,
            leeway_seconds: config.leeway_seconds,
            token_ttl: Duration::hours(ttl_hours),
        })
    }

    /// Sign a token for `user_id` valid for the configured TTL
    pub fn sign_token(&self, user_id: &UserId) -> Result<String> {
        self.sign_token_expiring_at(user_id, Utc::now() + self.token_ttl)
    }

    /// Sign a token with an explicit expiry instant
    pub fn sign_token_expiring_at(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };

        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = self.leeway_seconds;

        let token_data: TokenData<Claims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Authentication("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    Error::Authentication("Invalid token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    Error::Authentication("Invalid token signature".to_string())
                }
                _ => Error::Authentication(format!("Token verification failed: {e}")),
            })?;

        Ok(token_data.claims)
    }
}

impl TokenVerifier for JwtService {
    fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_token(token)
    }
}
