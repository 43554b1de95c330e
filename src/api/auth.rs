use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use base64::Engine;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::User;

/// The user behind the request's HTTP Basic credentials.
///
/// Rejects with 401 when the header is missing, malformed or the password
/// does not match.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let (username, password) = basic_credentials(&parts.headers)?;

        match state.db.authenticate(&username, &password).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(e) => {
                tracing::debug!(username = %username, "Rejected credentials");
                Err(e)
            }
        }
    }
}

/// Decode `Authorization: Basic <base64(user:pass)>`
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String)> {
    let unauthorized = |msg: &str| AppError::Authentication(msg.to_string());

    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Authorization header is not valid UTF-8"))?;

    let encoded = value
        .strip_prefix("Basic ")
        .ok_or_else(|| unauthorized("Only Basic authentication is supported"))?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| unauthorized("Invalid base64 in credentials"))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| unauthorized("Credentials are not valid UTF-8"))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| unauthorized("Credentials must be username:password"))?;

    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("john:pa:ss");
        let (user, pass) = basic_credentials(&headers(&format!("Basic {}", encoded))).unwrap();
        assert_eq!(user, "john");
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn test_rejects_bad_headers() {
        assert!(basic_credentials(&HeaderMap::new()).is_err());
        assert!(basic_credentials(&headers("Bearer abc")).is_err());
        assert!(basic_credentials(&headers("Basic !!!")).is_err());

        let no_colon = base64::engine::general_purpose::STANDARD.encode("john");
        let err = basic_credentials(&headers(&format!("Basic {}", no_colon))).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }
}
