//! Identity types for the domain layer.
//!
//! These types describe who is signed in and with which session. They carry
//! no provider-specific data, so any identity provider can populate them via
//! the `IdentityProvider` port.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Identity record of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The unique user identifier from the identity provider.
    pub id: UserId,

    /// User's email address.
    pub email: String,
}

impl AuthUser {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Token/expiry record issued by the identity provider.
///
/// Tokens are kept as secrets so that `Debug` output and logs never contain
/// them.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Timestamp,
    pub user: AuthUser,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Timestamp,
        user: AuthUser,
    ) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            expires_at,
            user,
        }
    }

    /// Returns the user id this session was issued for.
    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    /// Returns true if the session has expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }

    /// Returns true if both sessions carry the same access token and expiry.
    pub fn same_token_as(&self, other: &Session) -> bool {
        self.expires_at == other.expires_at
            && self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(trimmed.to_string()))
            }
            _ => Err(ValidationError::invalid_format(
                "email",
                "expected a single @ between name and domain",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

/// Email/password pair, validated before any remote call is made.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: EmailAddress,
    pub password: SecretString,
}

impl Credentials {
    /// Credentials for signing in: email must parse, password must be present.
    pub fn for_sign_in(email: &str, password: &str) -> Result<Self, ValidationError> {
        let email = EmailAddress::parse(email)?;
        if password.is_empty() {
            return Err(ValidationError::empty_field("password"));
        }
        Ok(Self {
            email,
            password: SecretString::new(password.to_string()),
        })
    }

    /// Credentials for account creation: additionally enforces a minimum
    /// password length.
    pub fn for_sign_up(
        email: &str,
        password: &str,
        min_password_length: usize,
    ) -> Result<Self, ValidationError> {
        let credentials = Self::for_sign_in(email, password)?;
        let length = password.chars().count();
        if length < min_password_length {
            return Err(ValidationError::too_short(
                "password",
                min_password_length,
                length,
            ));
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> AuthUser {
        AuthUser::new(UserId::new("user-123").unwrap(), "a@x.com")
    }

    #[test]
    fn session_debug_does_not_leak_tokens() {
        let session = Session::new(
            "access-secret",
            "refresh-secret",
            Timestamp::from_unix_secs(1_700_000_000),
            test_user(),
        );
        let debug = format!("{:?}", session);
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let expires = Timestamp::from_unix_secs(1_700_000_000);
        let session = Session::new("a", "r", expires, test_user());

        assert!(!session.is_expired_at(expires.plus_secs(-1)));
        assert!(session.is_expired_at(expires));
    }

    #[test]
    fn email_requires_single_at_sign() {
        assert!(EmailAddress::parse("a@x.com").is_ok());
        assert!(EmailAddress::parse("  a@x.com ").is_ok());
        assert!(EmailAddress::parse("").is_err());
        assert!(EmailAddress::parse("ax.com").is_err());
        assert!(EmailAddress::parse("@x.com").is_err());
        assert!(EmailAddress::parse("a@b@x.com").is_err());
    }

    #[test]
    fn sign_in_credentials_require_password() {
        assert!(matches!(
            Credentials::for_sign_in("a@x.com", ""),
            Err(ValidationError::EmptyField { .. })
        ));
        assert!(Credentials::for_sign_in("a@x.com", "pw").is_ok());
    }

    #[test]
    fn sign_up_credentials_enforce_minimum_length() {
        assert!(matches!(
            Credentials::for_sign_up("a@x.com", "short", 8),
            Err(ValidationError::TooShort { min: 8, actual: 5, .. })
        ));
        assert!(Credentials::for_sign_up("a@x.com", "long-enough", 8).is_ok());
    }
}
