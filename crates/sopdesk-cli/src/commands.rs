//! Command handlers. Each one builds an `ApiClient` from the saved config
//! and turns library errors into messages a person can act on.
//!
//! The backend's session cookies are restored into the client before a
//! command runs and saved again afterwards, so the refresh endpoint works
//! across separate invocations.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use sopdesk_core::auth::CredentialStore;
use sopdesk_core::models::SignupRequest;
use sopdesk_core::{
    ApiClient, ApiError, ApiRequest, Config, CredentialBackend, KeyringCredentialStore,
    SessionCookies, SessionFile,
};
use tracing::{debug, warn};

use crate::cli::Command;

/// Environment variable that supplies the password non-interactively
const PASSWORD_ENV: &str = "SOPDESK_PASSWORD";

pub async fn run(command: Command) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let client = build_client(&config)?;
    let cookies = SessionCookies::new(config.cache_dir()?);

    match cookies.load() {
        Ok(Some(saved)) => client.restore_session_cookies(&saved),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable session cookies"),
    }

    let result = execute(command, &client, &mut config).await;

    // A refresh or logout may have rotated or expired the cookies even when
    // the command itself failed
    let saved = save_cookies(&cookies, &client);
    result?;
    saved
}

fn save_cookies(cookies: &SessionCookies, client: &ApiClient) -> Result<()> {
    match client.session_cookies() {
        Some(current) => cookies.save(&current),
        None => cookies.clear(),
    }
}

async fn execute(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = read_password("Password: ")?;

            let login = client
                .login(&email, &password)
                .await
                .map_err(explain_login)?;
            config.last_email = Some(email.clone());
            config.save().context("Failed to save config")?;

            match login.user {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None => println!("Logged in as {}", email),
            }
        }
        Command::Logout => {
            client.logout().await.map_err(explain)?;
            println!("Logged out");
        }
        Command::Whoami => match client.load_user().await.map_err(explain)? {
            Some(user) => {
                println!("{} <{}>", user.display_name(), user.email);
                if !user.teams.is_empty() {
                    let teams: Vec<String> = user.teams.iter().map(|t| t.to_string()).collect();
                    println!("Teams: {}", teams.join(", "));
                }
                if config.credential_backend == CredentialBackend::File {
                    if let Some(session) = SessionFile::new(config.cache_dir()?).load_data()? {
                        println!("Token saved {}", session.age_display());
                    }
                }
            }
            None => println!("Not logged in. Run `sopdesk login`."),
        },
        Command::Refresh => {
            client.refresh().await.map_err(explain)?;
            println!("Token refreshed");
        }
        Command::Request { method, path, data } => {
            let request = build_request(&method, &path, data.as_deref())?;
            let response = client.send(request).await.map_err(explain)?;
            debug!(status = %response.status, "Request completed");
            print_body(&response.body);
        }
        Command::Signup { name, email } => {
            let password = read_password("Password: ")?;
            let re_password = read_password("Repeat password: ")?;
            let signup = SignupRequest {
                name,
                email,
                password,
                re_password,
            };
            let user = client.signup(&signup).await.map_err(explain)?;
            println!(
                "Account created for {}. Check your email to activate it.",
                user.email
            );
        }
        Command::Activate { uid, token } => {
            client.activate(&uid, &token).await.map_err(explain)?;
            println!("Account activated");
        }
        Command::ResetPassword { email } => {
            client.reset_password(&email).await.map_err(explain)?;
            println!("If {} has an account, a reset link is on its way", email);
        }
        Command::ResetPasswordConfirm { uid, token } => {
            let new_password = read_password("New password: ")?;
            let re_new_password = read_password("Repeat new password: ")?;
            client
                .reset_password_confirm(&uid, &token, &new_password, &re_new_password)
                .await
                .map_err(explain)?;
            println!("Password changed");
        }
    }

    Ok(())
}

fn build_client(config: &Config) -> Result<ApiClient> {
    let client_config = config.client_config()?;
    let store = credential_store(config)?;
    ApiClient::new(client_config, store).context("Failed to create API client")
}

fn credential_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.credential_backend {
        CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
        CredentialBackend::File => Arc::new(SessionFile::new(config.cache_dir()?)),
    };
    Ok(store)
}

fn build_request(method: &str, path: &str, data: Option<&str>) -> Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let request = ApiRequest::new(method, path);

    match data {
        Some(data) => {
            let body: serde_json::Value =
                serde_json::from_str(data).context("--data is not valid JSON")?;
            Ok(request.with_json(&body)?)
        }
        None => Ok(request),
    }
}

/// Pretty-print JSON bodies, pass anything else through as text
fn print_body(body: &[u8]) {
    if body.is_empty() {
        return;
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", String::from_utf8_lossy(body)),
        },
        Err(_) => println!("{}", String::from_utf8_lossy(body)),
    }
}

/// Attach a next step to errors that mean the session is gone
fn explain(err: ApiError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::Error::new(err).context("Session expired or not logged in. Run `sopdesk login`")
    } else {
        anyhow::Error::new(err)
    }
}

/// Login failures: a 401 here means the email or password was rejected
fn explain_login(err: ApiError) -> anyhow::Error {
    if matches!(err, ApiError::Unauthorized { .. }) {
        anyhow::Error::new(err).context("Invalid email or password")
    } else {
        explain(err)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("No input given");
    }
    Ok(value)
}

fn read_password(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(label).context("Failed to read password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_build_request_parses_method_and_body() {
        let request = build_request("patch", "/api/tasks/4/", Some(r#"{"status": "done"}"#)).unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.path, "/api/tasks/4/");
        assert_eq!(request.body.unwrap()["status"], "done");
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        assert!(build_request("GET", "/api/teams/", Some("{oops")).is_err());
        assert!(build_request("GE T", "/api/teams/", None).is_err());
    }

    #[test]
    fn test_explain_adds_login_hint_for_auth_errors() {
        let err = explain(ApiError::from_status(StatusCode::UNAUTHORIZED, ""));
        assert!(err.to_string().contains("sopdesk login"));

        let err = explain(ApiError::from_status(StatusCode::NOT_FOUND, "gone"));
        assert!(!err.to_string().contains("sopdesk login"));
    }

    #[test]
    fn test_explain_login_reports_rejected_credentials() {
        let err = explain_login(ApiError::from_status(StatusCode::UNAUTHORIZED, ""));
        assert_eq!(err.to_string(), "Invalid email or password");

        let err = explain_login(ApiError::from_status(StatusCode::BAD_REQUEST, "missing"));
        assert!(!err.to_string().contains("Invalid email or password"));
    }

    #[test]
    fn test_save_cookies_follows_the_jar() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = SessionCookies::new(dir.path());
        let client = ApiClient::new(
            sopdesk_core::ClientConfig::new("http://localhost:8000").unwrap(),
            Arc::new(sopdesk_core::MemoryCredentialStore::new()),
        )
        .unwrap();

        client.restore_session_cookies("refresh_token=r1");
        save_cookies(&cookies, &client).unwrap();
        assert_eq!(cookies.load().unwrap().as_deref(), Some("refresh_token=r1"));

        let empty = ApiClient::new(
            sopdesk_core::ClientConfig::new("http://localhost:8000").unwrap(),
            Arc::new(sopdesk_core::MemoryCredentialStore::new()),
        )
        .unwrap();
        save_cookies(&cookies, &empty).unwrap();
        assert_eq!(cookies.load().unwrap(), None);
    }
}
