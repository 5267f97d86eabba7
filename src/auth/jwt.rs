use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

/// Why a request's bearer token was not accepted.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BearerError {
    #[error("Missing Authorization header")]
    Missing,

    #[error("Invalid Authorization header encoding")]
    Encoding,

    #[error("Authorization header must start with Bearer")]
    NotBearer,

    #[error("Invalid or expired token")]
    Invalid(String),

    #[error("Access token required")]
    NotAccess,
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

/// Identity a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub employee_id: Option<u64>,
}

fn issue(
    subject: &TokenSubject,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.username.clone(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: subject.employee_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(subject: &TokenSubject, secret: &str, ttl: usize) -> Result<String, Error> {
    issue(subject, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(subject, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

/// Decodes the `Authorization: Bearer` token of a request, of either type.
pub fn bearer_claims(headers: &HeaderMap, secret: &str) -> Result<Claims, BearerError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::Encoding)?;
    let token = value.strip_prefix("Bearer ").ok_or(BearerError::NotBearer)?;
    verify_token(token, secret).map_err(BearerError::Invalid)
}

/// Like [`bearer_claims`], but refresh tokens are refused.
pub fn access_claims(headers: &HeaderMap, secret: &str) -> Result<Claims, BearerError> {
    let claims = bearer_claims(headers, secret)?;
    if claims.token_type != TokenType::Access {
        return Err(BearerError::NotAccess);
    }
    Ok(claims)
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub.clone(),
            role: claims.role,
            employee_id: claims.employee_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 3,
            username: "maria".into(),
            role: 3,
            employee_id: Some(7),
        }
    }

    #[test]
    fn access_token_carries_employee_id() {
        let token = generate_access_token(&subject(), "secret", 60).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.employee_id, Some(7));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = generate_refresh_token(&subject(), "secret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    fn headers(value: &str) -> HeaderMap {
        TestRequest::default()
            .insert_header(("Authorization", value))
            .to_http_request()
            .headers()
            .clone()
    }

    #[test]
    fn bearer_claims_accepts_both_token_types() {
        let access = generate_access_token(&subject(), "secret", 60).unwrap();
        let (refresh, _) = generate_refresh_token(&subject(), "secret", 60).unwrap();

        let claims = bearer_claims(&headers(&format!("Bearer {access}")), "secret").unwrap();
        assert_eq!(claims.token_type, TokenType::Access);
        let claims = bearer_claims(&headers(&format!("Bearer {refresh}")), "secret").unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn access_claims_refuses_refresh_tokens() {
        let (refresh, _) = generate_refresh_token(&subject(), "secret", 60).unwrap();
        let err = access_claims(&headers(&format!("Bearer {refresh}")), "secret").unwrap_err();
        assert_eq!(err, BearerError::NotAccess);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert_eq!(
            bearer_claims(&HeaderMap::new(), "secret").unwrap_err(),
            BearerError::Missing
        );
        let token = generate_access_token(&subject(), "secret", 60).unwrap();
        assert_eq!(
            bearer_claims(&headers(&token), "secret").unwrap_err(),
            BearerError::NotBearer
        );
        assert!(matches!(
            bearer_claims(&headers("Bearer nonsense"), "secret"),
            Err(BearerError::Invalid(_))
        ));
    }
}
