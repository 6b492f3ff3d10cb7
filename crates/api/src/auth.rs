use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "hr_session";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub roles: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum UserRole {
    Admin,
    Hr,
    Manager,
    Employee,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Hr => "HR",
            UserRole::Manager => "MANAGER",
            UserRole::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(UserRole::Admin),
            "HR" => Some(UserRole::Hr),
            "MANAGER" => Some(UserRole::Manager),
            "EMPLOYEE" => Some(UserRole::Employee),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            UserRole::Admin => 4,
            UserRole::Hr => 3,
            UserRole::Manager => 2,
            UserRole::Employee => 1,
        }
    }
}

/// Authenticated caller. `employee_id`/`position_id` come from the employee
/// record linked to the login, when there is one.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub roles: Vec<UserRole>,
    pub employee_id: Option<Uuid>,
    pub position_id: Option<Uuid>,
}

impl CurrentUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.iter().any(|r| r.level() >= role.level())
    }

    pub fn highest_role(&self) -> Option<UserRole> {
        self.roles.iter().copied().max_by_key(|r| r.level())
    }
}

pub fn issue_token(
    user_id: Uuid,
    roles: &[UserRole],
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.session_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: user_id,
        roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
}

pub fn decode_token(
    token: &str,
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<SessionClaims> {
    jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &Validation::default())
        .map(|data| data.claims)
}

/// Unknown role names in a token are dropped rather than rejected.
pub fn roles_from_claims(claims: &SessionClaims) -> Vec<UserRole> {
    claims
        .roles
        .iter()
        .filter_map(|r| UserRole::parse(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            session_ttl_minutes: 5,
        }
    }

    #[test]
    fn token_round_trip_keeps_roles() {
        let user = Uuid::new_v4();
        let token = issue_token(user, &[UserRole::Hr, UserRole::Employee], &config()).unwrap();
        let claims = decode_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(roles_from_claims(&claims), vec![UserRole::Hr, UserRole::Employee]);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), &[UserRole::Admin], &config()).unwrap();
        let other = AuthConfig {
            jwt_secret: "another".into(),
            session_ttl_minutes: 5,
        };
        assert!(decode_token(&token, &other).is_err());
    }

    #[test]
    fn higher_roles_include_lower_ones() {
        let user = CurrentUser {
            user_id: Uuid::new_v4(),
            roles: vec![UserRole::Hr],
            employee_id: None,
            position_id: None,
        };
        assert!(user.has_role(UserRole::Manager));
        assert!(user.has_role(UserRole::Employee));
        assert!(!user.has_role(UserRole::Admin));
        assert_eq!(user.highest_role(), Some(UserRole::Hr));
    }
}
