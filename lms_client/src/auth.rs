//! Login, registration, logout and password flows.
//!
//! Token issuance goes through anonymous requests; only the resulting pair
//! is handed to the session manager.

use crate::{
    claims::{self, Claims, CredentialPair, UserId},
    errors::{ClientError, ClientResult},
    pipeline::{ApiClient, error_for_status},
};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Token obtain endpoint
pub const LOGIN_PATH: &str = "user/token/";
/// Account creation endpoint
pub const REGISTER_PATH: &str = "user/register/";
/// Password reset by email link
pub const PASSWORD_RESET_PATH: &str = "user/password-reset/";
/// Password reset confirmation with the emailed OTP
pub const PASSWORD_RESET_CONFIRM_PATH: &str = "user/password-change/";
/// Password change for a logged-in user
pub const CHANGE_PASSWORD_PATH: &str = "user/change-password/";

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub otp: String,
    pub uuidb64: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChangePasswordRequest<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// Message envelope returned by the password endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Logged-in user as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub user_id: Option<UserId>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl From<Claims> for UserData {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            full_name: claims.full_name,
            email: claims.email,
            username: claims.username,
        }
    }
}

impl ApiClient {
    /// Obtain a token pair for `email`/`password` and store it
    ///
    /// # Errors
    ///
    /// * `ClientError::Status` - Credentials rejected by the backend
    /// * `ClientError::Decode` - Issued access token could not be decoded
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserData> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send_anonymous(self.request(Method::POST, LOGIN_PATH)?.json(&request))
            .await?;
        let pair: CredentialPair = error_for_status(response).await?.json().await?;

        let claims = claims::decode(&pair.access_token)?;
        self.session().set_tokens(&pair)?;
        tracing::info!(user_id = claims.user_id, "Logged in");

        Ok(claims.into())
    }

    /// Create an account, then log in with it
    ///
    /// # Errors
    ///
    /// * `ClientError::PasswordMismatch` - `password` and `password2` differ
    /// * `ClientError::Status` - Registration rejected by the backend
    pub async fn register(&self, request: RegisterRequest) -> ClientResult<UserData> {
        if request.password != request.password2 {
            return Err(ClientError::PasswordMismatch);
        }

        let response = self
            .send_anonymous(self.request(Method::POST, REGISTER_PATH)?.json(&request))
            .await?;
        error_for_status(response).await?;
        tracing::info!(email = %request.email, "Registered");

        self.login(&request.email, &request.password).await
    }

    /// Forget the stored session
    pub fn logout(&self) -> ClientResult<()> {
        self.session().clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// User decoded from the stored access token, if any
    pub fn current_user(&self) -> Option<UserData> {
        self.session().user().map(UserData::from)
    }

    /// Ask the backend to email a password reset link
    pub async fn request_password_reset(&self, email: &str) -> ClientResult<serde_json::Value> {
        let path = format!("{PASSWORD_RESET_PATH}{email}/");
        let response = self
            .send_anonymous(self.request(Method::GET, &path)?)
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// Set a new password using the OTP from the reset link
    pub async fn confirm_password_reset(
        &self,
        confirm: &PasswordResetConfirm,
    ) -> ClientResult<MessageResponse> {
        let response = self
            .send_anonymous(
                self.request(Method::POST, PASSWORD_RESET_CONFIRM_PATH)?
                    .json(confirm),
            )
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// Change the logged-in user's password
    ///
    /// # Errors
    ///
    /// * `ClientError::NotAuthenticated` - No session is stored
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> ClientResult<MessageResponse> {
        if self.session().tokens().is_empty() {
            return Err(ClientError::NotAuthenticated);
        }
        self.post_json(
            CHANGE_PASSWORD_PATH,
            &ChangePasswordRequest {
                old_password,
                new_password,
            },
        )
        .await
    }
}
