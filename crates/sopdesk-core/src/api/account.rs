//! Account endpoints: login, logout, current user, signup, activation and
//! password reset.
//!
//! All of these go through `ApiClient::send`, so they get the same bearer
//! and refresh handling as any other call.

use serde_json::json;
use tracing::{info, warn};

use crate::models::{LoginResponse, SignupRequest, User};

use super::{ApiClient, ApiError, ApiRequest, Result};

const LOGIN_PATH: &str = "/auth/jwt/create/";
const LOGOUT_PATH: &str = "/auth/logout/";
const CURRENT_USER_PATH: &str = "/auth/users/me/";
const USERS_PATH: &str = "/auth/users/";
const ACTIVATION_PATH: &str = "/auth/users/activation/";
const RESET_PASSWORD_PATH: &str = "/auth/users/reset_password/";
const RESET_PASSWORD_CONFIRM_PATH: &str = "/auth/users/reset_password_confirm/";

impl ApiClient {
    /// Exchange email and password for tokens and store the access token.
    /// The refresh cookie the backend sets is kept in the client's jar.
    ///
    /// Rejected credentials come back as `ApiError::Unauthorized` without a
    /// refresh attempt, and the stored token is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = ApiRequest::post(LOGIN_PATH)
            .with_json(&json!({ "email": email, "password": password }))?;
        let login: LoginResponse = self.send_without_refresh(request).await?.json()?;

        self.set_credential(&login.access_token)?;
        info!(email = email, "Logged in");
        Ok(login)
    }

    /// Log out on the server and drop the local token.
    ///
    /// The token is cleared even when the server call fails; that failure is
    /// only logged.
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::post(LOGOUT_PATH).with_json(&json!({}))?;
        if let Err(e) = self.send(request).await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.clear_credential()
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get_json(CURRENT_USER_PATH).await
    }

    /// Fetch the current user, or `None` without sending anything when no
    /// token is stored
    pub async fn load_user(&self) -> Result<Option<User>> {
        if !self.has_credential()? {
            return Ok(None);
        }
        self.current_user().await.map(Some)
    }

    /// Whether the backend accepts the current credentials
    pub async fn check_authenticated(&self) -> bool {
        match self.current_user().await {
            Ok(_) => true,
            Err(e) => {
                info!(error = %e, "Not authenticated");
                false
            }
        }
    }

    pub async fn signup(&self, signup: &SignupRequest) -> Result<User> {
        check_retyped("password", &signup.password, &signup.re_password)?;
        self.post_json(USERS_PATH, signup).await
    }

    /// Activate an account with the uid and token from the activation email
    pub async fn activate(&self, uid: &str, token: &str) -> Result<()> {
        let request = ApiRequest::post(ACTIVATION_PATH)
            .with_json(&json!({ "uid": uid, "token": token }))?;
        self.send(request).await?;
        Ok(())
    }

    /// Ask the backend to email a password reset link
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let request =
            ApiRequest::post(RESET_PASSWORD_PATH).with_json(&json!({ "email": email }))?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn reset_password_confirm(
        &self,
        uid: &str,
        token: &str,
        new_password: &str,
        re_new_password: &str,
    ) -> Result<()> {
        check_retyped("new password", new_password, re_new_password)?;
        let request = ApiRequest::post(RESET_PASSWORD_CONFIRM_PATH).with_json(&json!({
            "uid": uid,
            "token": token,
            "new_password": new_password,
            "re_new_password": re_new_password,
        }))?;
        self.send(request).await?;
        Ok(())
    }
}

fn check_retyped(field: &str, value: &str, retyped: &str) -> Result<()> {
    if value != retyped {
        return Err(ApiError::Validation(format!("The {} fields do not match", field)));
    }
    Ok(())
}
