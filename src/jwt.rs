//! Signed token encoding and verification.
//!
//! Access and refresh tokens are signed with two independent secrets, so a
//! token of one kind never verifies as the other and a leaked secret only
//! compromises one kind.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::{User, UserRole};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity data embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user id)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Contact identifier (email, or phone when no email is on file)
    pub contact: String,
    pub role: UserRole,
}

impl IdentityClaims {
    /// Build claims from the current state of a user record.
    pub fn from_user(user: &User) -> Self {
        let contact = user
            .email
            .clone()
            .or_else(|| user.phone.clone())
            .unwrap_or_default();
        Self {
            sub: user.id.clone(),
            name: user.name.clone(),
            contact,
            role: user.role,
        }
    }
}

/// Wire shape of an access token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub name: String,
    pub contact: String,
    pub role: UserRole,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

impl AccessClaims {
    pub fn identity(&self) -> IdentityClaims {
        IdentityClaims {
            sub: self.sub.clone(),
            name: self.name.clone(),
            contact: self.contact.clone(),
            role: self.role,
        }
    }
}

/// Wire shape of a refresh token payload. Carries only the subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Random id so two tokens issued in the same second never collide
    pub jti: String,
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Errors raised while producing a token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("signing secret is empty")]
    MissingSecret,
    #[error("access and refresh tokens must use different secrets")]
    SharedSecret,
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("system time error")]
    TimeError,
}

/// Reasons a token string fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
            _ => VerificationError::Malformed,
        }
    }
}

/// HMAC codec bound to a single secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Sign an arbitrary claims payload. The payload must carry its own `exp`.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, CodecError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(CodecError::Encoding)
    }

    /// Verify signature and expiry, then decode into the expected shape.
    /// A payload that does not match `C` is reported as `Malformed`.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, VerificationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<C>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub claims: AccessClaims,
    /// Lifetime in seconds, used as the cookie Max-Age
    pub duration: u64,
}

/// A freshly signed refresh token.
#[derive(Debug, Clone)]
pub struct SignedRefreshToken {
    pub token: String,
    pub jti: String,
    pub issued_at: u64,
    pub expires_at: u64,
    /// Lifetime in seconds, used as the cookie Max-Age
    pub duration: u64,
}

/// Both codecs plus the configured lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    access: TokenCodec,
    refresh: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtConfig {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, CodecError> {
        if !access_secret.is_empty() && access_secret == refresh_secret {
            return Err(CodecError::SharedSecret);
        }
        Ok(Self {
            access: TokenCodec::new(access_secret)?,
            refresh: TokenCodec::new(refresh_secret)?,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a short-lived access token carrying the full identity.
    pub fn sign_access_token(
        &self,
        identity: &IdentityClaims,
    ) -> Result<SignedAccessToken, CodecError> {
        let now = unix_now()?;
        let duration = self.access_ttl.as_secs();

        let claims = AccessClaims {
            sub: identity.sub.clone(),
            name: identity.name.clone(),
            contact: identity.contact.clone(),
            role: identity.role,
            token_type: TokenType::Access,
            iat: now,
            exp: now + duration,
        };
        let token = self.access.sign(&claims)?;

        Ok(SignedAccessToken {
            token,
            claims,
            duration,
        })
    }

    /// Sign a long-lived refresh token carrying only the subject id.
    pub fn sign_refresh_token(&self, user_id: &str) -> Result<SignedRefreshToken, CodecError> {
        let now = unix_now()?;
        let duration = self.refresh_ttl.as_secs();
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = RefreshClaims {
            jti: jti.clone(),
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + duration,
        };
        let token = self.refresh.sign(&claims)?;

        Ok(SignedRefreshToken {
            token,
            jti,
            issued_at: now,
            expires_at: now + duration,
            duration,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, VerificationError> {
        let claims: AccessClaims = self.access.verify(token)?;
        if claims.token_type != TokenType::Access {
            return Err(VerificationError::Malformed);
        }
        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, VerificationError> {
        let claims: RefreshClaims = self.refresh.verify(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(VerificationError::Malformed);
        }
        Ok(claims)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, CodecError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| CodecError::TimeError)
}
