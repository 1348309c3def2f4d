use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use profe_core::model::UserId;

use super::provider::{AuthUser, FederatedCredential, IdentityProvider, require_credentials};
use crate::error::AuthError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: UserId,
    email: String,
    password: Option<String>,
    display_name: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    next_id: u64,
}

impl State {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn issue(&mut self, key: &str) -> Result<AuthUser, AuthError> {
        let id_token = self.next("id");
        let refresh_token = self.next("refresh");
        let account = self
            .accounts
            .get_mut(key)
            .ok_or(AuthError::InvalidCredentials)?;
        account.refresh_token = Some(refresh_token.clone());
        Ok(AuthUser {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            display_name: account.display_name.clone(),
            photo_url: None,
            id_token,
            refresh_token,
            expires_at: None,
        })
    }
}

/// Identity provider that keeps accounts in memory.
///
/// Federated sign-in treats the credential's id token as the account email.
#[derive(Clone, Default)]
pub struct InMemoryIdentity {
    state: Arc<Mutex<State>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> AuthError {
    AuthError::Provider(e.to_string())
}

impl InMemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate the account's refresh token, as if the session expired.
    pub fn revoke(&self, email: &str) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(account) = state.accounts.get_mut(&email.trim().to_lowercase()) {
                account.refresh_token = None;
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        require_credentials(email, password)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(format!(
                "password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let key = email.trim().to_lowercase();
        let mut state = self.state.lock().map_err(poisoned)?;
        if state.accounts.contains_key(&key) {
            return Err(AuthError::DuplicateAccount);
        }
        let uid = UserId::new(state.next("uid"))?;
        state.accounts.insert(
            key.clone(),
            Account {
                uid,
                email: email.trim().to_owned(),
                password: Some(password.to_owned()),
                display_name: display_name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned),
                refresh_token: None,
            },
        );
        state.issue(&key)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        require_credentials(email, password)?;
        let key = email.trim().to_lowercase();
        let mut state = self.state.lock().map_err(poisoned)?;
        let valid = state
            .accounts
            .get(&key)
            .is_some_and(|account| account.password.as_deref() == Some(password));
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }
        state.issue(&key)
    }

    async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthUser, AuthError> {
        let email = credential
            .id_token
            .as_deref()
            .map(str::trim)
            .filter(|t| t.contains('@'))
            .ok_or(AuthError::InvalidCredentials)?;
        let key = email.to_lowercase();

        let mut state = self.state.lock().map_err(poisoned)?;
        if !state.accounts.contains_key(&key) {
            let uid = UserId::new(state.next("uid"))?;
            state.accounts.insert(
                key.clone(),
                Account {
                    uid,
                    email: email.to_owned(),
                    password: None,
                    display_name: None,
                    refresh_token: None,
                },
            );
        }
        state.issue(&key)
    }

    async fn refresh(&self, user: &AuthUser) -> Result<AuthUser, AuthError> {
        let mut state = self.state.lock().map_err(poisoned)?;
        let key = state
            .accounts
            .iter()
            .find(|(_, account)| account.refresh_token.as_deref() == Some(user.refresh_token.as_str()))
            .map(|(key, _)| key.clone())
            .ok_or(AuthError::SessionExpired)?;
        state.issue(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let identity = InMemoryIdentity::new();
        let created = identity
            .sign_up("Ana@Example.com", "secreto", Some("Ana"))
            .await
            .unwrap();
        assert_eq!(created.display_name.as_deref(), Some("Ana"));

        let signed_in = identity.sign_in("ana@example.com", "secreto").await.unwrap();
        assert_eq!(signed_in.uid, created.uid);
        assert_ne!(signed_in.id_token, created.id_token);
    }

    #[tokio::test]
    async fn rejects_duplicates_weak_passwords_and_bad_credentials() {
        let identity = InMemoryIdentity::new();
        identity.sign_up("ana@example.com", "secreto", None).await.unwrap();

        assert!(matches!(
            identity.sign_up("ana@example.com", "secreto", None).await,
            Err(AuthError::DuplicateAccount)
        ));
        assert!(matches!(
            identity.sign_up("leo@example.com", "123", None).await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            identity.sign_in("ana@example.com", "otro").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            identity.sign_in("nadie@example.com", "secreto").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_fails_after_revoke() {
        let identity = InMemoryIdentity::new();
        let user = identity.sign_up("ana@example.com", "secreto", None).await.unwrap();

        let refreshed = identity.refresh(&user).await.unwrap();
        assert_ne!(refreshed.refresh_token, user.refresh_token);
        assert!(matches!(identity.refresh(&user).await, Err(AuthError::SessionExpired)));

        identity.revoke("ana@example.com");
        assert!(matches!(
            identity.refresh(&refreshed).await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn federated_sign_in_reuses_account() {
        let identity = InMemoryIdentity::new();
        let first = identity
            .sign_in_federated(&FederatedCredential::google("ana@example.com"))
            .await
            .unwrap();
        let second = identity
            .sign_in_federated(&FederatedCredential::google("ana@example.com"))
            .await
            .unwrap();
        assert_eq!(first.uid, second.uid);
        assert!(matches!(
            identity
                .sign_in_federated(&FederatedCredential::google("garbage"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
