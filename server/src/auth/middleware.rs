//! Authentication middleware.
//!
//! Identity is issued by an external provider; requests carry the user id
//! as a bearer token. When `AUTH_SECRET` is configured the token must be
//! `<user id>:<secret>`. Without it the server runs in development mode and
//! also accepts requests without an `Authorization` header.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use tote_engine::UserId;

use crate::error::AppError;
use crate::AppState;

/// Authenticated caller extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The caller's user id; `None` for anonymous development requests
    pub user_id: Option<UserId>,
}

impl AuthUser {
    /// Check that the caller may touch documents owned by `owner`.
    pub fn authorize(&self, owner: &str) -> Result<(), AppError> {
        match &self.user_id {
            Some(user_id) if user_id == owner => Ok(()),
            Some(user_id) => {
                tracing::warn!(caller = %user_id, owner = %owner, "Rejected access to another user's document");
                Err(AppError::Forbidden(format!("{user_id} may not access {owner}")))
            }
            None => Ok(()),
        }
    }
}

/// Resolve the caller from an `Authorization` header value.
pub fn identify(
    header: Option<&str>,
    secret: Option<&str>,
) -> Result<AuthUser, (StatusCode, &'static str)> {
    let Some(header) = header else {
        return match secret {
            None => Ok(AuthUser { user_id: None }),
            Some(_) => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        };
    };

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid authorization header format",
        ));
    };
    let token = token.trim();
    if token.is_empty() {
        return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
    }

    let user_id = match secret {
        Some(secret) => match token.rsplit_once(':') {
            Some((user_id, presented)) if presented == secret && !user_id.is_empty() => user_id,
            _ => return Err((StatusCode::UNAUTHORIZED, "Invalid bearer token")),
        },
        None => token,
    };

    Ok(AuthUser {
        user_id: Some(user_id.to_string()),
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        identify(header, state.config.auth_secret.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_mode() {
        assert_eq!(identify(None, None).unwrap().user_id, None);
        assert_eq!(
            identify(Some("Bearer u1"), None).unwrap().user_id.as_deref(),
            Some("u1")
        );
    }

    #[test]
    fn test_secret_required() {
        let secret = Some("s3cret");
        assert_eq!(
            identify(None, secret).unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identify(Some("Bearer u1"), secret).unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identify(Some("Bearer u1:wrong"), secret).unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identify(Some("Bearer :s3cret"), secret).unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identify(Some("Bearer u1:s3cret"), secret)
                .unwrap()
                .user_id
                .as_deref(),
            Some("u1")
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert!(identify(Some("Basic dTE6cA=="), None).is_err());
        assert!(identify(Some("Bearer "), None).is_err());
        assert!(identify(Some("Bearer    "), None).is_err());
    }

    #[test]
    fn test_ownership() {
        let caller = AuthUser {
            user_id: Some("u1".to_string()),
        };
        assert!(caller.authorize("u1").is_ok());
        assert!(matches!(
            caller.authorize("u2"),
            Err(AppError::Forbidden(_))
        ));

        let anonymous = AuthUser { user_id: None };
        assert!(anonymous.authorize("u2").is_ok());
    }
}
