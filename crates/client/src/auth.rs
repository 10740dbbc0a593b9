//! Token storage for the comparison backend.
//!
//! Credentials live at ~/.config/veriroute/auth.json (0600 on Unix) so the
//! CLI and any future desktop frontend share one login.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// Bearer token for the backend API.
    pub token: String,
    /// API base URL, e.g. "https://api.veriroute.example".
    pub api_base: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthCredentials {
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            email: None,
        }
    }
}

/// Path of the credentials file, if a config directory exists.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("veriroute/auth.json"))
}

/// Load saved credentials. None when absent or unreadable.
pub fn load_auth() -> Option<AuthCredentials> {
    let path = auth_file_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Persist credentials, creating the parent directory as needed.
pub fn save_auth(creds: &AuthCredentials) -> Result<(), String> {
    let path = auth_file_path().ok_or("could not determine config directory")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {e}"))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("failed to serialize credentials: {e}"))?;
    std::fs::write(&path, &contents).map_err(|e| format!("failed to write auth file: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| format!("failed to set auth file permissions: {e}"))?;
    }

    Ok(())
}

/// Remove saved credentials if present.
pub fn delete_auth() -> Result<(), String> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path).map_err(|e| format!("failed to delete auth file: {e}"))?;
    }
    Ok(())
}
