//! JWT access/refresh token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::models::{auth::TokenPairResponse, users::CurrentUser},
    config::Config,
    errors::Error,
    types::UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId,           // Subject (account ID)
    pub email: String,         // Account email
    pub is_staff: bool,        // Staff flag at issue time
    pub token_type: TokenType, // Access or refresh
    pub jti: Uuid,             // Token ID
    pub iat: i64,              // Issued at
    pub exp: i64,              // Expiration time
}

impl TokenClaims {
    pub fn new(user: &CurrentUser, token_type: TokenType, config: &Config) -> Self {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => config.auth.security.jwt_expiry,
            TokenType::Refresh => config.auth.security.refresh_expiry,
        };
        let exp = now + lifetime;

        Self {
            sub: user.id,
            email: user.email.clone(),
            is_staff: user.is_staff,
            token_type,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config
        .secret_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::Internal {
            operation: "JWT tokens: secret_key is required".to_string(),
        })
}

/// Sign a single token for a user
pub fn create_token(user: &CurrentUser, token_type: TokenType, config: &Config) -> Result<String, Error> {
    let claims = TokenClaims::new(user, token_type, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Issue the access/refresh pair returned by login and registration
pub fn create_token_pair(user: &CurrentUser, config: &Config) -> Result<TokenPairResponse, Error> {
    Ok(TokenPairResponse {
        access: create_token(user, TokenType::Access, config)?,
        refresh: create_token(user, TokenType::Refresh, config)?,
    })
}

/// Verify and decode a token, requiring it to be of the expected type
pub fn verify_token(token: &str, expected: TokenType, config: &Config) -> Result<TokenClaims, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated {
            message: Some("Given token not valid for any token type".to_string()),
        },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    if token_data.claims.token_type != expected {
        return Err(Error::Unauthenticated {
            message: Some("Token has wrong type".to_string()),
        });
    }

    Ok(token_data.claims)
}
