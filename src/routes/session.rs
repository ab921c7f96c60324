// Session module
// Caller identity taken from the upstream session headers

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderName},
};
use log::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Requester, Role},
};

/// Caller id, set by the upstream session layer.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
/// Caller role, set by the upstream session layer.
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

fn header_value<'a>(parts: &'a Parts, name: &HeaderName) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, &USER_ID_HEADER)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| {
                debug!("Request without a valid {USER_ID_HEADER} header");
                AppError::Unauthorized
            })?;

        let role = header_value(parts, &USER_ROLE_HEADER)
            .and_then(|raw| raw.parse::<Role>().ok())
            .ok_or_else(|| {
                debug!("Request without a valid {USER_ROLE_HEADER} header");
                AppError::Unauthorized
            })?;

        Ok(Requester::new(user_id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Requester, AppError> {
        let (mut parts, _) = request.into_parts();
        Requester::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_requester_from_headers() {
        let user_id = Uuid::new_v4();
        let request = Request::builder()
            .header(USER_ID_HEADER, user_id.to_string())
            .header(USER_ROLE_HEADER, "Lecturer")
            .body(())
            .unwrap();

        let requester = extract(request).await.unwrap();
        assert_eq!(requester, Requester::new(user_id, Role::Lecturer));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_headers_are_unauthorized() {
        let no_headers = Request::builder().body(()).unwrap();
        assert!(matches!(extract(no_headers).await, Err(AppError::Unauthorized)));

        let bad_id = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .header(USER_ROLE_HEADER, "lecturer")
            .body(())
            .unwrap();
        assert!(matches!(extract(bad_id).await, Err(AppError::Unauthorized)));

        let bad_role = Request::builder()
            .header(USER_ID_HEADER, Uuid::new_v4().to_string())
            .header(USER_ROLE_HEADER, "guest")
            .body(())
            .unwrap();
        assert!(matches!(extract(bad_role).await, Err(AppError::Unauthorized)));
    }
}
