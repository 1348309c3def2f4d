use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use profe_core::model::{ProfileSeed, UserId};

use crate::error::AuthError;

/// A signed-in account as reported by the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<Url>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Identity fields used to create the user's profile.
    #[must_use]
    pub fn profile_seed(&self) -> ProfileSeed {
        ProfileSeed {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

impl fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthUser")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("photo_url", &self.photo_url.as_ref().map(Url::as_str))
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Credential obtained from a federated provider (e.g. Google sign-in).
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    /// Provider id as understood by the identity service, e.g. `google.com`.
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl FederatedCredential {
    #[must_use]
    pub fn google(id_token: impl Into<String>) -> Self {
        Self {
            provider_id: "google.com".into(),
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

/// Identity service boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password account, setting its display name when given.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateAccount`, `AuthError::WeakPassword` or a
    /// provider/transport error.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError>;

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` or a provider/transport error.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a rejected credential or a
    /// provider/transport error.
    async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthUser, AuthError>;

    /// Exchange the user's refresh token for fresh tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` when the refresh token is no longer
    /// valid, or a provider/transport error.
    async fn refresh(&self, user: &AuthUser) -> Result<AuthUser, AuthError>;
}

pub(crate) fn require_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(())
}
