use crate::error::ForumError;
use crate::models::Caller;
use crate::services::users;
use crate::web::error::AppError;
use crate::web::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The caller of a request; a guest when no bearer token is sent. An
/// unknown token is rejected rather than downgraded to a guest.
pub struct OptionalCaller(pub Caller);

impl FromRequestParts<Arc<AppState>> for OptionalCaller {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let state = state.clone();
        let bearer = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string());
        Box::pin(async move {
            let Some(token) = bearer else {
                return Ok(OptionalCaller(Caller::GUEST));
            };
            let uid = users::uid_for_token(&state.db, &token)?
                .ok_or(ForumError::Unauthenticated)?;
            Ok(OptionalCaller(Caller::new(uid)))
        })
    }
}

/// A caller that must be signed in.
pub struct SignedIn(pub Caller);

impl FromRequestParts<Arc<AppState>> for SignedIn {
    type Rejection = AppError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let OptionalCaller(caller) = OptionalCaller::from_request_parts(parts, state).await?;
            if caller.is_guest() {
                return Err(ForumError::Unauthenticated.into());
            }
            Ok(SignedIn(caller))
        })
    }
}
