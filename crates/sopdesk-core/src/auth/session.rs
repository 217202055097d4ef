use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CredentialStore;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access: String,
    pub saved_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(access: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            saved_at: Utc::now(),
        }
    }

    /// How long ago the token was written, for display
    pub fn age_display(&self) -> String {
        let minutes = (Utc::now() - self.saved_at).num_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Access token persisted as JSON in the cache directory
pub struct SessionFile {
    cache_dir: PathBuf,
}

impl SessionFile {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    /// Load the full session record, if one was saved
    pub fn load_data(&self) -> Result<Option<SessionData>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn save_data(&self, data: &SessionData) -> Result<()> {
        let contents = serde_json::to_string_pretty(data)?;
        write_private(&self.path(), &contents).context("Failed to write session file")
    }
}

/// Write `contents` to `path`, readable by the owner only.
///
/// New files are created with mode 0600; an existing file is narrowed to
/// 0600 before it is overwritten.
#[cfg(unix)]
fn write_private(path: &Path, contents: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

impl CredentialStore for SessionFile {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.load_data()?.map(|d| d.access))
    }

    fn store(&self, token: &str) -> Result<()> {
        self.save_data(&SessionData::new(token))
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Session cookies file name in cache directory
const COOKIES_FILE: &str = "cookies.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CookieData {
    cookies: String,
    saved_at: DateTime<Utc>,
}

/// The backend's session cookies, kept between runs of a short-lived process.
///
/// The refresh endpoint trades these cookies for a new access token, so a
/// process that starts after login needs them restored into its client.
/// Stored as the `Cookie` header value the client would send.
pub struct SessionCookies {
    cache_dir: PathBuf,
}

impl SessionCookies {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(COOKIES_FILE)
    }

    pub fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read cookies file")?;
        let data: CookieData =
            serde_json::from_str(&contents).context("Failed to parse cookies file")?;
        Ok(Some(data.cookies))
    }

    pub fn save(&self, cookies: &str) -> Result<()> {
        let data = CookieData {
            cookies: cookies.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        write_private(&self.path(), &contents).context("Failed to write cookies file")
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove cookies file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path().join("cache"));

        assert_eq!(session.load().unwrap(), None);

        session.store("abc").unwrap();
        assert_eq!(session.load().unwrap().as_deref(), Some("abc"));

        session.store("xyz").unwrap();
        assert_eq!(session.load().unwrap().as_deref(), Some("xyz"));

        session.clear().unwrap();
        assert_eq!(session.load().unwrap(), None);
        assert!(!session.path().exists());

        session.clear().unwrap();
    }

    #[test]
    fn test_session_file_never_expires_locally() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path());

        let old = SessionData {
            access: "old-token".to_string(),
            saved_at: Utc::now() - Duration::days(30),
        };
        session.save_data(&old).unwrap();

        assert_eq!(session.load().unwrap().as_deref(), Some("old-token"));
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path());
        std::fs::write(session.path(), "{not json").unwrap();

        assert!(session.load().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path());
        session.store("abc").unwrap();

        let mode = std::fs::metadata(session.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_session_file_is_narrowed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let session = SessionFile::new(dir.path());
        std::fs::write(session.path(), "{}").unwrap();
        std::fs::set_permissions(session.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        session.store("abc").unwrap();

        let mode = std::fs::metadata(session.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(session.load().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_session_cookies_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = SessionCookies::new(dir.path().join("cache"));

        assert_eq!(cookies.load().unwrap(), None);

        cookies.save("refresh_token=r1; access_token=a1").unwrap();
        assert_eq!(
            cookies.load().unwrap().as_deref(),
            Some("refresh_token=r1; access_token=a1")
        );

        cookies.clear().unwrap();
        assert_eq!(cookies.load().unwrap(), None);
        cookies.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_cookies_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cookies = SessionCookies::new(dir.path());
        cookies.save("refresh_token=r1").unwrap();

        let mode = std::fs::metadata(cookies.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_age_display() {
        let mut data = SessionData::new("t");
        assert_eq!(data.age_display(), "just now");

        data.saved_at = Utc::now() - Duration::minutes(5);
        assert_eq!(data.age_display(), "5m ago");

        data.saved_at = Utc::now() - Duration::hours(3);
        assert_eq!(data.age_display(), "3h ago");

        data.saved_at = Utc::now() - Duration::days(2);
        assert_eq!(data.age_display(), "2d ago");
    }
}
