use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User model, keyed by the identity provider's subject id
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub auth_subject: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Profile fields pushed by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSync {
    pub auth_subject: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Current authenticated caller (extracted from the session token)
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub auth_subject: String,
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}
