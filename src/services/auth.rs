use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::Claims;

/// Session token verification for the external identity provider
pub struct AuthService;

impl AuthService {
    /// Validate a bearer session token and return its claims.
    ///
    /// An RS256 public key, when configured, is the only accepted key.
    /// Otherwise the current HS256 secret and any previous ones are tried in order.
    pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Claims> {
        if let Some(pem) = &config.session_public_key {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AppError::Internal(format!("Invalid session public key: {}", e)))?;
            let validation = Self::validation(Algorithm::RS256, config);
            let token_data = decode::<Claims>(token, &key, &validation)?;
            return Ok(token_data.claims);
        }

        if config.session_secret.is_empty() {
            tracing::error!("No session secret or public key configured, rejecting all tokens");
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        let validation = Self::validation(Algorithm::HS256, config);
        let keys = std::iter::once(config.session_secret.as_str())
            .chain(config.previous_session_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid token".to_string()))
    }

    fn validation(algorithm: Algorithm, config: &AuthConfig) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}
