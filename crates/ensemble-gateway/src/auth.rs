//! Bearer-key guard for the `/v1` routes.
//!
//! Clients authenticate the way OpenAI clients do: `Authorization: Bearer <key>`.
//! Rejections use the same error envelope as every other API failure, plus a
//! `WWW-Authenticate: Bearer` challenge.

use crate::api::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Keys accepted by the API. An empty set leaves the API open.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    /// Blank entries are ignored.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// True when no key is configured and the API is open.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of accepted keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check the request's bearer token.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.is_empty() {
            return Ok(());
        }
        match bearer_token(headers) {
            Some(token) if self.keys.contains(token) => Ok(()),
            Some(_) => Err(unauthorized("Incorrect API key provided")),
            None => Err(unauthorized(
                "Missing API key; send it as 'Authorization: Bearer <key>'",
            )),
        }
    }
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "authentication_error", message)
}

/// Token of an `Authorization: Bearer <token>` header. The scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without an accepted bearer key.
pub async fn require_api_key(
    State(keys): State<Arc<ApiKeys>>,
    request: Request,
    next: Next,
) -> Response {
    match keys.authorize(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            warn!(path = %request.uri().path(), "Rejected unauthenticated request");
            let mut response = err.into_response();
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            response
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&with_auth("Bearer sk-1")), Some("sk-1"));
        assert_eq!(bearer_token(&with_auth("bearer  sk-1 ")), Some("sk-1"));
        assert_eq!(bearer_token(&with_auth("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_blank_keys_leave_api_open() {
        let keys = ApiKeys::new(vec![String::new(), "  ".to_string()]);
        assert!(keys.is_empty());
        assert!(keys.authorize(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_authorize() {
        let keys = ApiKeys::new(vec!["sk-1".to_string()]);
        assert_eq!(keys.len(), 1);
        assert!(keys.authorize(&with_auth("Bearer sk-1")).is_ok());

        let wrong = keys.authorize(&with_auth("Bearer sk-2")).unwrap_err();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body()["error"]["type"], "authentication_error");

        let missing = keys.authorize(&HeaderMap::new()).unwrap_err();
        assert!(missing.body()["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Bearer"));
    }
}
