//! Credential issuing and verification.
//!
//! Callers only see [`CredentialVerifier`]: a presented credential either
//! yields its [`Claims`] or is rejected. [`TokenAuthority`] backs it with
//! HS256 JSON Web Tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookshelf_kernel::settings::AuthSettings;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Failed to generate token")]
    TokenGenerationFailed,
}

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub sub: String,
    pub name: String,
    pub level: String,
}

/// Claims carried by an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub level: String,
    pub iss: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
}

/// Verify a presented credential, pass or reject.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> AuthResult<Claims>;
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl: Duration,
    pub issuer: String,
}

impl TokenConfig {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.token_secret.clone(),
            ttl: Duration::seconds(settings.token_ttl_secs),
            issuer: settings.issuer.clone(),
        }
    }
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenAuthority {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenAuthority {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            ttl: config.ttl,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(TokenConfig::from_settings(settings))
    }

    pub fn issue(&self, subject: Subject) -> AuthResult<IssuedToken> {
        self.issue_at(subject, Utc::now())
    }

    fn issue_at(&self, subject: Subject, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let exp = (now + self.ttl).timestamp();
        let claims = Claims {
            sub: subject.sub,
            name: subject.name,
            level: subject.level,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| {
                tracing::error!(error = %err, "token signing failed");
                AuthError::TokenGenerationFailed
            })?;

        tracing::debug!(sub = %claims.sub, exp, "token issued");
        Ok(IssuedToken {
            token,
            token_type: "bearer",
            expires_at: exp,
        })
    }
}

impl CredentialVerifier for TokenAuthority {
    fn verify(&self, credential: &str) -> AuthResult<Claims> {
        let token = bearer_token(credential);
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })
    }
}

/// Strip an optional `Bearer ` scheme from an `Authorization` header value.
pub fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    if header.eq_ignore_ascii_case("bearer") {
        return "";
    }
    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => header,
    }
}
