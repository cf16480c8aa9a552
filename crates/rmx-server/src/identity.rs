//! Participant resolution.
//!
//! Authentication happens outside this crate. By the time a `WebSocket`
//! request reaches the jam endpoint, an upstream layer has already vouched for
//! the caller; a [`ParticipantResolver`] only turns what that layer left on the
//! request into a [`Participant`].

use async_trait::async_trait;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jam::Participant;

/// Header carrying the authenticated user ID.
pub const USER_ID_HEADER: &str = "x-rmx-user-id";
/// Header carrying the user's display name.
pub const USER_NAME_HEADER: &str = "x-rmx-user-name";

/// Resolves the participant behind an incoming request.
#[async_trait]
pub trait ParticipantResolver: Send + Sync + 'static {
    /// Identify the caller, or refuse the request.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Participant, ApiError>;
}

/// Reads identity headers set by a trusted upstream proxy.
///
/// Missing headers fall back to a generated ID and the name `"anonymous"`.
#[derive(Clone, Debug, Default)]
pub struct HeaderParticipantResolver;

#[async_trait]
impl ParticipantResolver for HeaderParticipantResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Participant, ApiError> {
        let id = header_str(headers, USER_ID_HEADER)
            .map_or_else(|| Uuid::now_v7().to_string(), str::to_string);
        let name = header_str(headers, USER_NAME_HEADER)
            .unwrap_or("anonymous")
            .to_string();
        Ok(Participant { id, name })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
