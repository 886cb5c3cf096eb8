use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::mail::{Mailer, MailTemplate};
use crate::models::{NewUser, PublicUser, User};
use crate::session::{new_token, ResetTokenStore, SessionStore, RESET_TOKEN_TTL};
use crate::store::{UserInsert, UserStore};
use crate::utils::error::AppError;
use crate::utils::password::{hash_password, verify_password};
use crate::utils::validation::{is_valid_email, is_valid_password, FieldError, PASSWORD_RULES};

const MIN_USERNAME_LEN: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub token: String,
    pub new_password: String,
}

/// `{error}` or `{user, token}`. The token is the new session's bearer token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    fn field_error(field: &str, message: impl Into<String>) -> Self {
        Self {
            error: Some(FieldError::new(field, message)),
            user: None,
            token: None,
        }
    }

    fn signed_in(user: &User, token: String) -> Self {
        Self {
            error: None,
            user: Some(PublicUser::for_viewer(user, Some(user.id))),
            token: Some(token),
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        mailer: Arc<dyn Mailer>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            sessions,
            reset_tokens,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn me(&self, auth: &AuthContext) -> Result<Option<PublicUser>, AppError> {
        let Some(user_id) = auth.user_id else {
            return Ok(None);
        };
        let user = self.users.find_user_by_id(user_id).await?;
        Ok(user.map(|u| PublicUser::for_viewer(&u, Some(user_id))))
    }

    pub async fn register(&self, input: RegisterInput) -> Result<UserResponse, AppError> {
        let username = input.username.trim().to_lowercase();
        let email = input.email.trim().to_string();

        if username.chars().count() < MIN_USERNAME_LEN {
            return Ok(UserResponse::field_error(
                "username",
                "length must be greater than 4",
            ));
        }
        if !is_valid_password(&input.password) {
            return Ok(UserResponse::field_error("password", PASSWORD_RULES));
        }
        if !is_valid_email(&email) {
            return Ok(UserResponse::field_error("email", "please provide a valid email"));
        }

        if self.users.find_user_by_username(&username).await?.is_some() {
            return Ok(UserResponse::field_error("username", "user already exists"));
        }
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Ok(UserResponse::field_error("email", "email already has an account"));
        }

        let password_hash = hash_password(&input.password).await?;
        let user = match self
            .users
            .insert_user(NewUser {
                username,
                email,
                password_hash,
            })
            .await?
        {
            UserInsert::Created(user) => user,
            UserInsert::UsernameTaken => {
                return Ok(UserResponse::field_error("username", "user already exists"));
            }
            UserInsert::EmailTaken => {
                return Ok(UserResponse::field_error("email", "email already has an account"));
            }
        };

        let token = self.sessions.create_session(user.id).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(UserResponse::signed_in(&user, token))
    }

    pub async fn login(&self, input: LoginInput) -> Result<UserResponse, AppError> {
        let username = input.username.trim().to_lowercase();

        let Some(user) = self.users.find_user_by_username(&username).await? else {
            return Ok(UserResponse::field_error("username", "user doesn't exist"));
        };
        if !verify_password(&input.password, &user.password).await? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Ok(UserResponse::field_error("password", "incorrect password"));
        }

        let token = self.sessions.create_session(user.id).await?;
        Ok(UserResponse::signed_in(&user, token))
    }

    /// `false` when the session store failed; the error is logged.
    pub async fn logout(&self, auth: &AuthContext) -> bool {
        let Some(token) = auth.token.as_deref() else {
            return true;
        };
        match self.sessions.destroy_session(token).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to destroy session");
                false
            }
        }
    }

    /// Always `true`, whether or not an account uses `email`.
    pub async fn forgot_password(&self, email: &str) -> Result<bool, AppError> {
        let Some(user) = self.users.find_user_by_email(email.trim()).await? else {
            return Ok(true);
        };

        let token = new_token();
        self.reset_tokens
            .store_reset_token(&token, user.id, RESET_TOKEN_TTL)
            .await?;

        let template = MailTemplate::ForgotPassword {
            link: format!("{}/change-password?token={}", self.frontend_url, token),
        };
        if let Err(e) = self
            .mailer
            .send_template(&user.email, "Reset password", template)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send password reset mail");
        }

        Ok(true)
    }

    pub async fn change_password(&self, input: ChangePasswordInput) -> Result<UserResponse, AppError> {
        if !is_valid_password(&input.new_password) {
            return Ok(UserResponse::field_error("newPassword", PASSWORD_RULES));
        }

        let Some(user_id) = self.reset_tokens.take_reset_token(&input.token).await? else {
            return Ok(UserResponse::field_error("token", "token expired"));
        };
        let Some(user) = self.users.find_user_by_id(user_id).await? else {
            return Ok(UserResponse::field_error("token", "user no longer exists"));
        };

        let password_hash = hash_password(&input.new_password).await?;
        self.users.update_password(user.id, &password_hash).await?;

        let token = self.sessions.create_session(user.id).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(UserResponse::signed_in(&user, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::RecordingMailer;
    use crate::session::MemorySessionStore;
    use crate::store::MemoryStore;

    struct Fixture {
        sessions: Arc<MemorySessionStore>,
        mailer: Arc<RecordingMailer>,
        service: UserService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::default());
        let mailer = Arc::new(RecordingMailer::new());
        let service = UserService::new(
            store,
            sessions.clone(),
            sessions.clone(),
            mailer.clone(),
            "http://localhost:3000",
        );
        Fixture {
            sessions,
            mailer,
            service,
        }
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.into(),
            password: "secret123".into(),
            email: email.into(),
        }
    }

    fn error_of(response: UserResponse) -> FieldError {
        response.error.expect("expected a field error")
    }

    #[tokio::test]
    async fn register_opens_a_session() {
        let f = fixture();
        let res = f
            .service
            .register(register_input("JaneDoe", "jane@example.com"))
            .await
            .unwrap();

        let user = res.user.unwrap();
        assert_eq!(user.username, "janedoe");
        assert_eq!(user.email, "jane@example.com");

        let token = res.token.unwrap();
        assert_eq!(
            f.sessions.resolve_session(&token).await.unwrap(),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn register_field_errors() {
        let f = fixture();

        let short = f.service.register(register_input("jane", "jane@example.com")).await.unwrap();
        assert_eq!(
            error_of(short),
            FieldError::new("username", "length must be greater than 4")
        );

        let mut weak = register_input("janedoe", "jane@example.com");
        weak.password = "password".into();
        assert_eq!(error_of(f.service.register(weak).await.unwrap()).field, "password");

        let bad_email = f.service.register(register_input("janedoe", "jane")).await.unwrap();
        assert_eq!(
            error_of(bad_email),
            FieldError::new("email", "please provide a valid email")
        );

        f.service
            .register(register_input("janedoe", "jane@example.com"))
            .await
            .unwrap();

        let taken = f
            .service
            .register(register_input("JANEDOE", "other@example.com"))
            .await
            .unwrap();
        assert_eq!(error_of(taken), FieldError::new("username", "user already exists"));

        let email_taken = f
            .service
            .register(register_input("johndoe", "jane@example.com"))
            .await
            .unwrap();
        assert_eq!(
            error_of(email_taken),
            FieldError::new("email", "email already has an account")
        );
    }

    #[tokio::test]
    async fn login_checks_username_then_password() {
        let f = fixture();
        f.service
            .register(register_input("janedoe", "jane@example.com"))
            .await
            .unwrap();

        let unknown = f
            .service
            .login(LoginInput {
                username: "nobody".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();
        assert_eq!(error_of(unknown), FieldError::new("username", "user doesn't exist"));

        let wrong = f
            .service
            .login(LoginInput {
                username: "janedoe".into(),
                password: "secret124".into(),
            })
            .await
            .unwrap();
        assert_eq!(error_of(wrong), FieldError::new("password", "incorrect password"));

        let ok = f
            .service
            .login(LoginInput {
                username: "JaneDoe".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();
        assert!(ok.token.is_some());
    }

    #[tokio::test]
    async fn me_and_logout() {
        let f = fixture();
        let res = f
            .service
            .register(register_input("janedoe", "jane@example.com"))
            .await
            .unwrap();
        let token = res.token.unwrap();
        let user_id = res.user.unwrap().id;

        let auth = AuthContext {
            user_id: Some(user_id),
            token: Some(token.clone()),
        };
        assert_eq!(f.service.me(&auth).await.unwrap().unwrap().id, user_id);
        assert!(f.service.me(&AuthContext::anonymous()).await.unwrap().is_none());

        assert!(f.service.logout(&auth).await);
        assert_eq!(f.sessions.resolve_session(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn forgot_password_does_not_reveal_accounts() {
        let f = fixture();
        assert!(f.service.forgot_password("ghost@example.com").await.unwrap());
        assert!(f.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn reset_flow_is_single_use() {
        let f = fixture();
        f.service
            .register(register_input("janedoe", "jane@example.com"))
            .await
            .unwrap();

        assert!(f.service.forgot_password("jane@example.com").await.unwrap());
        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Reset password");
        let MailTemplate::ForgotPassword { link } = &sent[0].template else {
            panic!("wrong template");
        };
        let token = link
            .split("token=")
            .nth(1)
            .expect("link carries a token")
            .to_string();

        let weak = f
            .service
            .change_password(ChangePasswordInput {
                token: token.clone(),
                new_password: "short".into(),
            })
            .await
            .unwrap();
        assert_eq!(error_of(weak).field, "newPassword");

        let changed = f
            .service
            .change_password(ChangePasswordInput {
                token: token.clone(),
                new_password: "newsecret456".into(),
            })
            .await
            .unwrap();
        assert!(changed.user.is_some());

        let login = f
            .service
            .login(LoginInput {
                username: "janedoe".into(),
                password: "newsecret456".into(),
            })
            .await
            .unwrap();
        assert!(login.error.is_none());

        let reused = f
            .service
            .change_password(ChangePasswordInput {
                token,
                new_password: "another789".into(),
            })
            .await
            .unwrap();
        assert_eq!(error_of(reused), FieldError::new("token", "token expired"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_changes_redeem_a_token_once() {
        let f = fixture();
        let user_id = f
            .service
            .register(register_input("janedoe", "jane@example.com"))
            .await
            .unwrap()
            .user
            .unwrap()
            .id;
        f.sessions
            .store_reset_token("tok", user_id, RESET_TOKEN_TTL)
            .await
            .unwrap();

        let first_input = ChangePasswordInput {
            token: "tok".into(),
            new_password: "first111".into(),
        };
        let second_input = ChangePasswordInput {
            token: "tok".into(),
            new_password: "second222".into(),
        };
        let (first, second) = tokio::join!(
            f.service.change_password(first_input),
            f.service.change_password(second_input)
        );

        let redeemed = [first.unwrap(), second.unwrap()]
            .into_iter()
            .filter(|res| res.user.is_some())
            .count();
        assert_eq!(redeemed, 1);
    }
}
