use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{AuthClaims, Session, User};
use crate::storage::{RecordReader, Storage, StoreError, WriteScope};

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_task(password: String, cost: u32) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;
    Ok(hashed)
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_task(password: String, hash: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
    Ok(matches)
}

pub fn create_jwt(claims: &AuthClaims, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
}

pub fn validate_jwt(token: &str, secret: &[u8]) -> Result<AuthClaims, jsonwebtoken::errors::Error> {
    let token_data = decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

/// Accepts both `Bearer <token>` and a bare token.
pub fn bearer_token(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    /// Record id of the session row backing the token.
    pub session_id: u64,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

/// Record a new session for `user` and sign a token pointing at it.
pub fn open_session(storage: &Storage, user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(config.session_ttl_secs);
    let session = storage.insert(Session {
        id: 0,
        sid: Uuid::new_v4().to_string(),
        user_id: user.id,
        created_at: now,
        expires_at,
    })?;

    let claims = AuthClaims {
        sub: user.id.to_string(),
        sid: session.sid,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };
    Ok(create_jwt(&claims, config.jwt_secret.as_bytes())?)
}

/// Resolve a token to its user. Every failure is the same `Unauthorized`.
pub fn authenticate(storage: &Storage, token: &str, secret: &[u8]) -> Result<AuthContext, AppError> {
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    let claims = match validate_jwt(token, secret) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(%err, "rejected token");
            if matches!(err.kind(), ErrorKind::ExpiredSignature) {
                drop_expired_session(storage, token, secret)?;
            }
            return Err(AppError::Unauthorized);
        }
    };

    let session = storage
        .find_by_key::<Session>(&claims.sid)?
        .ok_or(AppError::Unauthorized)?;
    if session.user_id.to_string() != claims.sub {
        return Err(AppError::Unauthorized);
    }
    if session.expires_at <= Utc::now() {
        storage.delete::<Session>(session.id)?;
        return Err(AppError::Unauthorized);
    }

    let user = storage
        .get::<User>(session.user_id)?
        .ok_or(AppError::Unauthorized)?;
    Ok(AuthContext {
        user,
        session_id: session.id,
    })
}

/// Remove the session behind a correctly signed but expired token.
fn drop_expired_session(storage: &Storage, token: &str, secret: &[u8]) -> Result<(), StoreError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    let Ok(data) = decode::<AuthClaims>(token, &DecodingKey::from_secret(secret), &validation) else {
        return Ok(());
    };
    if let Some(session) = storage.find_by_key::<Session>(&data.claims.sid)? {
        storage.delete::<Session>(session.id)?;
        debug!(session_id = session.id, "expired session removed");
    }
    Ok(())
}

/// Delete every session of `user_id`; returns how many were revoked.
pub fn revoke_user_sessions(scope: &WriteScope<'_>, user_id: u64) -> Result<usize, StoreError> {
    let sessions = scope.list::<Session>()?;
    let mut revoked = 0;
    for session in sessions.into_iter().filter(|s| s.user_id == user_id) {
        scope.delete::<Session>(session.id)?;
        revoked += 1;
    }
    Ok(revoked)
}

pub fn purge_expired_sessions(storage: &Storage) -> Result<usize, StoreError> {
    let scope = storage.write();
    let now = Utc::now();
    let expired: Vec<u64> = scope
        .list::<Session>()?
        .into_iter()
        .filter(|session| session.expires_at <= now)
        .map(|session| session.id)
        .collect();
    for id in &expired {
        scope.delete::<Session>(*id)?;
    }
    Ok(expired.len())
}
