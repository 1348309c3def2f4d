use std::sync::Arc;

use tokio::sync::watch;

use profe_core::model::UserProfile;

use super::provider::{AuthUser, FederatedCredential, IdentityProvider};
use crate::error::{AuthError, StoreError};
use crate::progress::ProgressService;

/// What caused the latest identity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    Initial,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Identity state published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<AuthUser>,
    pub change: AuthChange,
}

/// The signed-in identity, shared by everything that needs to know who the
/// user is.
///
/// State only changes after the provider and the profile store both succeed.
#[derive(Clone)]
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    progress: Arc<ProgressService>,
    state: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthSession {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, progress: Arc<ProgressService>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot {
            user: None,
            change: AuthChange::Initial,
        });
        Self {
            provider,
            progress,
            state: Arc::new(state),
        }
    }

    /// Receive every identity change from now on. The current snapshot is
    /// available immediately through `borrow()`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    /// Cached profile of the signed-in user.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        let uid = self.state.borrow().user.as_ref()?.uid.clone();
        self.progress.cached(&uid)
    }

    fn publish(&self, user: Option<AuthUser>, change: AuthChange) {
        self.state.send_replace(AuthSnapshot { user, change });
    }

    /// Create an account and its profile, then sign in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` from the provider, or `AuthError::Store` if the profile
    /// cannot be created. Nothing is published on failure.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let user = self.provider.sign_up(email, password, display_name).await?;
        self.progress
            .create_profile_if_absent(&user.uid, user.profile_seed())
            .await?;
        tracing::info!(uid = %user.uid, "signed up");
        self.publish(Some(user.clone()), AuthChange::SignedIn);
        Ok(user)
    }

    /// Sign in with email and password and load the user's profile.
    ///
    /// A user without a stored profile gets one built from the identity fields.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` from the provider or the profile store. Nothing is
    /// published on failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self.provider.sign_in(email, password).await?;
        match self.progress.load_profile(&user.uid).await {
            Ok(_) => {}
            Err(StoreError::ProfileNotFound(_)) => {
                self.progress
                    .create_profile_if_absent(&user.uid, user.profile_seed())
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(uid = %user.uid, "signed in");
        self.publish(Some(user.clone()), AuthChange::SignedIn);
        Ok(user)
    }

    /// Sign in through a federated provider, creating the profile on first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` from the provider or the profile store. Nothing is
    /// published on failure.
    pub async fn sign_in_with_federated_provider(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthUser, AuthError> {
        let user = self.provider.sign_in_federated(credential).await?;
        self.progress
            .create_profile_if_absent(&user.uid, user.profile_seed())
            .await?;
        tracing::info!(uid = %user.uid, provider = %credential.provider_id, "signed in");
        self.publish(Some(user.clone()), AuthChange::SignedIn);
        Ok(user)
    }

    /// Forget the signed-in user. No-op when nobody is signed in.
    pub fn sign_out(&self) {
        let Some(user) = self.current_user() else {
            return;
        };
        self.progress.evict(&user.uid);
        tracing::info!(uid = %user.uid, "signed out");
        self.publish(None, AuthChange::SignedOut);
    }

    /// Refresh the signed-in user's tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn`, `AuthError::SessionExpired` or a provider
    /// error. The current user is left unchanged on failure.
    ///
    /// The refreshed user is only published if the same user is still signed in
    /// when the provider answers. Otherwise the result is discarded and
    /// `AuthError::NotSignedIn` is returned.
    pub async fn refresh_token(&self) -> Result<AuthUser, AuthError> {
        let current = self.current_user().ok_or(AuthError::NotSignedIn)?;
        let refreshed = self.provider.refresh(&current).await?;
        let published = self.state.send_if_modified(|snapshot| {
            let same_user = snapshot
                .user
                .as_ref()
                .is_some_and(|user| user.uid == current.uid);
            if same_user {
                snapshot.user = Some(refreshed.clone());
                snapshot.change = AuthChange::TokenRefreshed;
            }
            same_user
        });
        if !published {
            tracing::debug!(uid = %current.uid, "discarding refresh for a session that ended");
            return Err(AuthError::NotSignedIn);
        }
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::identity::InMemoryIdentity;
    use profe_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    /// Holds every refresh until the test releases it.
    #[derive(Default)]
    struct HeldRefresh {
        inner: InMemoryIdentity,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl IdentityProvider for HeldRefresh {
        async fn sign_up(
            &self,
            email: &str,
            password: &str,
            display_name: Option<&str>,
        ) -> Result<AuthUser, AuthError> {
            self.inner.sign_up(email, password, display_name).await
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
            self.inner.sign_in(email, password).await
        }

        async fn sign_in_federated(
            &self,
            credential: &FederatedCredential,
        ) -> Result<AuthUser, AuthError> {
            self.inner.sign_in_federated(credential).await
        }

        async fn refresh(&self, user: &AuthUser) -> Result<AuthUser, AuthError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.refresh(user).await
        }
    }

    fn session() -> (AuthSession, Arc<InMemoryIdentity>) {
        let repo = Arc::new(InMemoryRepository::new());
        let progress = Arc::new(ProgressService::new(fixed_clock(), repo.clone(), repo));
        let identity = Arc::new(InMemoryIdentity::new());
        (AuthSession::new(identity.clone(), progress), identity)
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_publishes() {
        let (auth, _) = session();
        let mut rx = auth.subscribe();
        assert_eq!(rx.borrow().change, AuthChange::Initial);

        let user = auth
            .sign_up("ana@example.com", "secreto", Some("Ana"))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.change, AuthChange::SignedIn);
        assert_eq!(snapshot.user.as_ref().map(|u| &u.uid), Some(&user.uid));

        let profile = auth.profile().unwrap();
        assert_eq!(profile.display_name(), Some("Ana"));
        assert_eq!(profile.level(), None);
    }

    #[tokio::test]
    async fn failed_sign_in_publishes_nothing() {
        let (auth, identity) = session();
        identity.sign_up("ana@example.com", "secreto", None).await.unwrap();
        let rx = auth.subscribe();

        assert!(matches!(
            auth.sign_in("ana@example.com", "incorrecto").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(!rx.has_changed().unwrap());
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn sign_in_creates_missing_profile() {
        let (auth, identity) = session();
        identity.sign_up("ana@example.com", "secreto", None).await.unwrap();

        let user = auth.sign_in("ana@example.com", "secreto").await.unwrap();
        assert_eq!(auth.current_user().map(|u| u.uid), Some(user.uid));
        let profile = auth.profile().unwrap();
        assert_eq!(profile.email(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn sign_out_clears_user_once() {
        let (auth, _) = session();
        auth.sign_up("ana@example.com", "secreto", None).await.unwrap();
        let mut rx = auth.subscribe();

        auth.sign_out();
        assert_eq!(rx.borrow_and_update().change, AuthChange::SignedOut);
        assert!(auth.current_user().is_none());
        assert!(auth.profile().is_none());

        auth.sign_out();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn refresh_requires_a_live_session() {
        let (auth, identity) = session();
        assert!(matches!(auth.refresh_token().await, Err(AuthError::NotSignedIn)));

        let user = auth.sign_up("ana@example.com", "secreto", None).await.unwrap();
        let refreshed = auth.refresh_token().await.unwrap();
        assert_ne!(refreshed.refresh_token, user.refresh_token);
        assert_eq!(auth.subscribe().borrow().change, AuthChange::TokenRefreshed);

        identity.revoke("ana@example.com");
        assert!(matches!(auth.refresh_token().await, Err(AuthError::SessionExpired)));
        assert_eq!(auth.current_user(), Some(refreshed));
    }

    #[tokio::test]
    async fn refresh_finishing_after_sign_out_is_discarded() {
        let repo = Arc::new(InMemoryRepository::new());
        let progress = Arc::new(ProgressService::new(fixed_clock(), repo.clone(), repo));
        let provider = Arc::new(HeldRefresh::default());
        let auth = AuthSession::new(provider.clone(), progress);
        auth.sign_up("ana@example.com", "secreto", None).await.unwrap();

        let pending = tokio::spawn({
            let auth = auth.clone();
            async move { auth.refresh_token().await }
        });
        provider.entered.notified().await;
        auth.sign_out();
        let mut rx = auth.subscribe();
        provider.release.notify_one();

        assert!(matches!(pending.await.unwrap(), Err(AuthError::NotSignedIn)));
        assert!(auth.current_user().is_none());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().change, AuthChange::SignedOut);
    }
}
