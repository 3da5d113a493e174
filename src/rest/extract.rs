//! Request extractors that reject with [`AppError`] instead of axum's
//! plain-text rejections.

use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// JSON body. Any rejection becomes a generic 400; the detail is only logged.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(%rejection, "request body rejected");
                Err(AppError::Validation("Missing or malformed fields".to_string()))
            }
        }
    }
}

/// Numeric `:id` path segment.
pub struct RecordId(pub u64);

#[async_trait]
impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Validation("Invalid record id".to_string()))?;
        raw.parse()
            .map(Self)
            .map_err(|_| AppError::Validation("Invalid record id".to_string()))
    }
}
