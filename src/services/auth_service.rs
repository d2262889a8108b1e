use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{User, ROLE_ADMIN};
use crate::utils::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id (hex ObjectId)
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
    pub typ: TokenType,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid access token".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }
}

fn secret_for(config: &Config, typ: TokenType) -> &str {
    match typ {
        TokenType::Access => &config.access_token_secret,
        TokenType::Refresh => &config.refresh_token_secret,
    }
}

fn sign(config: &Config, claims: &Claims) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret_for(config, claims.typ).as_bytes()),
    )
    .map_err(|e| {
        log::error!("❌ Failed to sign {:?} token: {}", claims.typ, e);
        AppError::Internal("Something went wrong while generating tokens".to_string())
    })
}

fn claims_for(config: &Config, user: &User, typ: TokenType) -> Claims {
    let now = Utc::now();
    let exp = match typ {
        TokenType::Access => now + Duration::minutes(config.access_token_ttl_minutes),
        TokenType::Refresh => now + Duration::days(config.refresh_token_ttl_days),
    };

    // Refresh tokens only identify the account
    let (email, username, roles) = match typ {
        TokenType::Access => (user.email.clone(), user.username.clone(), user.roles.clone()),
        TokenType::Refresh => (String::new(), String::new(), Vec::new()),
    };

    Claims {
        sub: user.id.to_hex(),
        email,
        username,
        roles,
        typ,
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
    }
}

pub fn generate_access_token(config: &Config, user: &User) -> Result<String, AppError> {
    sign(config, &claims_for(config, user, TokenType::Access))
}

pub fn generate_refresh_token(config: &Config, user: &User) -> Result<String, AppError> {
    sign(config, &claims_for(config, user, TokenType::Refresh))
}

/// Verifies signature, expiry, audience, issuer and token type.
pub fn verify_token(config: &Config, token: &str, expected: TokenType) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);
    validation.set_issuer(&[config.jwt_issuer.as_str()]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret_for(config, expected).as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        log::debug!("Token rejected: {}", e);
        AppError::Unauthorized(match expected {
            TokenType::Access => "Invalid access token".to_string(),
            TokenType::Refresh => "Invalid refresh token".to_string(),
        })
    })?;

    if claims.typ != expected {
        return Err(AppError::Unauthorized("Wrong token type".to_string()));
    }

    Ok(claims)
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await?
        .map_err(|e| {
            log::error!("❌ Password hashing failed: {}", e);
            AppError::Internal("Password hashing failed".to_string())
        })
}

pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await?
        .map_err(|e| {
            log::error!("❌ Password verification error: {}", e);
            AppError::Internal("Password verification failed".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, ROLE_USER};

    fn user(roles: &[&str]) -> User {
        User::new(NewUser {
            username: "asha".into(),
            email: "asha@example.com".into(),
            full_name: "Asha Rao".into(),
            roll_number: "BTECH/10001/21".into(),
            password_hash: String::new(),
            id_card: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            is_verified: true,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = Config::default();
        let admin = user(&[ROLE_USER, ROLE_ADMIN]);

        let token = generate_access_token(&config, &admin).unwrap();
        let claims = verify_token(&config, &token, TokenType::Access).unwrap();

        assert_eq!(claims.user_id().unwrap(), admin.id);
        assert_eq!(claims.email, "asha@example.com");
        assert!(claims.is_admin());
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let config = Config::default();
        let student = user(&[ROLE_USER]);

        let refresh = generate_refresh_token(&config, &student).unwrap();
        assert!(verify_token(&config, &refresh, TokenType::Access).is_err());

        let claims = verify_token(&config, &refresh, TokenType::Refresh).unwrap();
        assert_eq!(claims.sub, student.id.to_hex());
        assert!(claims.roles.is_empty());

        // Same secret for both kinds still fails on the type claim
        let shared = Config {
            refresh_token_secret: config.access_token_secret.clone(),
            ..Config::default()
        };
        let refresh = generate_refresh_token(&shared, &student).unwrap();
        let err = verify_token(&shared, &refresh, TokenType::Access).unwrap_err();
        assert!(err.to_string().contains("Wrong token type"));
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let config = Config::default();
        let student = user(&[ROLE_USER]);

        let mut claims = claims_for(&config, &student, TokenType::Access);
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp() as usize;
        let expired = sign(&config, &claims).unwrap();
        assert!(verify_token(&config, &expired, TokenType::Access).is_err());

        let other = Config {
            access_token_secret: "another-secret".into(),
            ..Config::default()
        };
        let foreign = generate_access_token(&other, &student).unwrap();
        assert!(verify_token(&config, &foreign, TokenType::Access).is_err());

        let wrong_audience = Config {
            jwt_audience: "someone-else".into(),
            ..Config::default()
        };
        let token = generate_access_token(&wrong_audience, &student).unwrap();
        assert!(verify_token(&config, &token, TokenType::Access).is_err());
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let hashed = hash_password("s3cret-pass".into(), 4).await.unwrap();
        assert_ne!(hashed, "s3cret-pass");
        assert!(verify_password("s3cret-pass".into(), hashed.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hashed).await.unwrap());
    }
}
