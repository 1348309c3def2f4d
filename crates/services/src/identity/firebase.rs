use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use profe_core::model::UserId;

use super::provider::{AuthUser, FederatedCredential, IdentityProvider, require_credentials};
use crate::Clock;
use crate::config::FirebaseConfig;
use crate::error::AuthError;

/// Identity provider backed by the Firebase Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseIdentity {
    client: Client,
    config: Option<FirebaseConfig>,
    clock: Clock,
}

impl FirebaseIdentity {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(FirebaseConfig::from_env(), Clock::default())
    }

    #[must_use]
    pub fn new(config: Option<FirebaseConfig>, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            config,
            clock,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn post<B, R>(&self, base: Base, path: &str, body: &B) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let config = self.config.as_ref().ok_or(AuthError::Disabled)?;
        let base_url = match base {
            Base::Identity => &config.identity_base_url,
            Base::Token => &config.token_base_url,
        };
        let url = format!(
            "{}/{path}?key={}",
            base_url.trim_end_matches('/'),
            config.api_key
        );

        // The key rides in the query string, so no error may carry the url.
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|envelope| envelope.error.message)
                .ok();
            tracing::debug!(path, %status, code = message.as_deref().unwrap_or("-"), "identity request rejected");
            return Err(match message {
                Some(message) => map_error_code(&message),
                None => AuthError::HttpStatus(status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Http(e.without_url()))
    }

    fn expiry(&self, expires_in: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
        let secs: i64 = expires_in?.trim().parse().ok()?;
        Some(self.clock.now() + Duration::seconds(secs))
    }

    fn user_from(&self, reply: AccountReply) -> Result<AuthUser, AuthError> {
        Ok(AuthUser {
            uid: UserId::new(reply.local_id)?,
            email: reply.email.filter(|e| !e.is_empty()),
            display_name: reply.display_name.filter(|n| !n.is_empty()),
            photo_url: reply
                .photo_url
                .or(reply.profile_picture)
                .and_then(|raw| Url::parse(&raw).ok()),
            expires_at: self.expiry(reply.expires_in.as_deref()),
            id_token: reply.id_token,
            refresh_token: reply.refresh_token,
        })
    }
}

#[derive(Clone, Copy)]
enum Base {
    Identity,
    Token,
}

/// Translate an Identity Toolkit error code into an `AuthError`.
///
/// Codes look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be ...`.
fn map_error_code(message: &str) -> AuthError {
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    match code {
        "EMAIL_EXISTS" => AuthError::DuplicateAccount,
        "EMAIL_NOT_FOUND"
        | "INVALID_PASSWORD"
        | "INVALID_LOGIN_CREDENTIALS"
        | "INVALID_EMAIL"
        | "INVALID_IDP_RESPONSE"
        | "USER_DISABLED" => AuthError::InvalidCredentials,
        "WEAK_PASSWORD" => AuthError::WeakPassword(if detail.is_empty() {
            code.to_owned()
        } else {
            detail.to_owned()
        }),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => {
            AuthError::SessionExpired
        }
        _ => AuthError::Provider(message.trim().to_owned()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        require_credentials(email, password)?;
        let reply: AccountReply = self
            .post(
                Base::Identity,
                "accounts:signUp",
                &PasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        let mut user = self.user_from(reply)?;

        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            let updated: UpdateReply = self
                .post(
                    Base::Identity,
                    "accounts:update",
                    &UpdateRequest {
                        id_token: &user.id_token,
                        display_name: name,
                        return_secure_token: true,
                    },
                )
                .await?;
            user.display_name = updated.display_name.or_else(|| Some(name.to_owned()));
            if let Some(token) = updated.id_token {
                user.id_token = token;
            }
            if let Some(token) = updated.refresh_token {
                user.refresh_token = token;
            }
        }

        tracing::info!(uid = %user.uid, "account created");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        require_credentials(email, password)?;
        let reply: AccountReply = self
            .post(
                Base::Identity,
                "accounts:signInWithPassword",
                &PasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.user_from(reply)
    }

    async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthUser, AuthError> {
        if credential.id_token.is_none() && credential.access_token.is_none() {
            return Err(AuthError::InvalidCredentials);
        }

        let post_body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("providerId", &credential.provider_id);
            if let Some(token) = &credential.id_token {
                form.append_pair("id_token", token);
            }
            if let Some(token) = &credential.access_token {
                form.append_pair("access_token", token);
            }
            form.finish()
        };

        let reply: AccountReply = self
            .post(
                Base::Identity,
                "accounts:signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: "http://localhost",
                    return_idp_credential: true,
                    return_secure_token: true,
                },
            )
            .await?;
        self.user_from(reply)
    }

    async fn refresh(&self, user: &AuthUser) -> Result<AuthUser, AuthError> {
        let reply: TokenReply = self
            .post(
                Base::Token,
                "token",
                &TokenRequest {
                    grant_type: "refresh_token",
                    refresh_token: &user.refresh_token,
                },
            )
            .await?;

        if reply.user_id != user.uid.as_str() {
            return Err(AuthError::Provider("refreshed token belongs to another user".into()));
        }

        Ok(AuthUser {
            expires_at: self.expiry(reply.expires_in.as_deref()),
            id_token: reply.id_token,
            refresh_token: reply.refresh_token,
            ..user.clone()
        })
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountReply {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    profile_picture: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateReply {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use profe_core::time::{fixed_clock, fixed_now};

    #[tokio::test]
    async fn transport_errors_do_not_reveal_the_api_key() {
        let config = FirebaseConfig {
            api_key: "clave-secreta".into(),
            identity_base_url: "http://127.0.0.1:1".into(),
            token_base_url: "http://127.0.0.1:1".into(),
        };
        let identity = FirebaseIdentity::new(Some(config), fixed_clock());

        let err = identity
            .sign_in("ana@example.com", "secreto")
            .await
            .unwrap_err();
        let AuthError::Http(ref source) = err else {
            panic!("expected a transport error, got {err:?}");
        };
        assert!(source.url().is_none());
        assert!(!err.to_string().contains("clave-secreta"));
        assert!(!format!("{err:?}").contains("clave-secreta"));
    }

    #[test]
    fn error_codes_map_to_auth_errors() {
        assert!(matches!(map_error_code("EMAIL_EXISTS"), AuthError::DuplicateAccount));
        assert!(matches!(
            map_error_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(map_error_code("EMAIL_NOT_FOUND"), AuthError::InvalidCredentials));
        assert!(matches!(
            map_error_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword(ref detail) if detail == "Password should be at least 6 characters"
        ));
        assert!(matches!(map_error_code("TOKEN_EXPIRED"), AuthError::SessionExpired));
        assert!(matches!(
            map_error_code("QUOTA_EXCEEDED"),
            AuthError::Provider(ref m) if m == "QUOTA_EXCEEDED"
        ));
    }

    #[test]
    fn account_reply_builds_user_with_expiry() {
        let identity = FirebaseIdentity::new(None, fixed_clock());
        let reply: AccountReply = serde_json::from_str(
            r#"{
                "localId": "abc123",
                "email": "ana@example.com",
                "displayName": "",
                "photoUrl": "https://example.com/ana.png",
                "idToken": "id",
                "refreshToken": "refresh",
                "expiresIn": "3600"
            }"#,
        )
        .unwrap();

        let user = identity.user_from(reply).unwrap();
        assert_eq!(user.uid.as_str(), "abc123");
        assert_eq!(user.display_name, None);
        assert_eq!(user.photo_url.unwrap().as_str(), "https://example.com/ana.png");
        assert_eq!(user.expires_at, Some(fixed_now() + Duration::hours(1)));
    }

    #[test]
    fn token_reply_uses_snake_case_fields() {
        let reply: TokenReply = serde_json::from_str(
            r#"{"id_token":"i","refresh_token":"r","user_id":"u","expires_in":"3600","token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(reply.user_id, "u");
    }

    #[tokio::test]
    async fn disabled_provider_refuses_requests() {
        let identity = FirebaseIdentity::new(None, fixed_clock());
        assert!(!identity.enabled());
        assert!(matches!(
            identity.sign_in("ana@example.com", "secreto").await,
            Err(AuthError::Disabled)
        ));
        assert!(matches!(
            identity.sign_in("", "secreto").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
