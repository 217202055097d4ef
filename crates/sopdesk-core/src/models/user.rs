use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// IDs of the teams the user belongs to
    #[serde(default)]
    pub teams: Vec<i64>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Body returned by `POST /auth/jwt/create/`.
///
/// The backend returns the tokens twice, as `access`/`refresh` and as
/// `access_token`/`refresh_token`; the `_token` spelling wins when both
/// are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLoginResponse")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

#[derive(Deserialize)]
struct RawLoginResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

impl TryFrom<RawLoginResponse> for LoginResponse {
    type Error = String;

    fn try_from(raw: RawLoginResponse) -> Result<Self, Self::Error> {
        let access_token = raw
            .access_token
            .or(raw.access)
            .ok_or_else(|| "login response has no access token".to_string())?;
        Ok(Self {
            access_token,
            refresh_token: raw.refresh_token.or(raw.refresh),
            user: raw.user,
        })
    }
}

/// Body returned by `POST /auth/jwt/refresh/`
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub re_password: String,
}
