use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sopdesk", version, about = "Command line client for the sopdesk service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with email and password and store the access token
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,
    },
    /// Log out on the server and forget the stored token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Trade the session cookie for a new access token
    Refresh,
    /// Send an authenticated request and print the response body
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path relative to the API URL, e.g. /api/teams/
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Create a new account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Activate an account with the uid and token from the activation email
    Activate { uid: String, token: String },
    /// Email a password reset link
    ResetPassword { email: String },
    /// Set a new password with the uid and token from the reset email
    ResetPasswordConfirm { uid: String, token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_request_command() {
        let cli = Cli::parse_from([
            "sopdesk", "request", "post", "/api/tasks/", "--data", r#"{"description":"x"}"#,
        ]);
        match cli.command {
            Command::Request { method, path, data } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/api/tasks/");
                assert!(data.is_some());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_reset_password_confirm() {
        let cli = Cli::parse_from(["sopdesk", "reset-password-confirm", "MQ", "tok"]);
        assert!(matches!(
            cli.command,
            Command::ResetPasswordConfirm { ref uid, ref token } if uid == "MQ" && token == "tok"
        ));
    }
}
