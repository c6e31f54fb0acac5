//! Client configuration and stored login session.
//!
//! Lives under `~/.config/thesisai/session.json`. The base URL can be
//! overridden per invocation with the `THESISAI_API_URL` environment
//! variable.

use crate::types::User;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoredSession {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub user: Option<User>,
}

impl StoredSession {
    /// Effective base URL: environment override, then stored value,
    /// then the default.
    pub fn api_url(&self) -> String {
        std::env::var("THESISAI_API_URL")
            .ok()
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }
}

/// Get the path to the session file
pub fn session_path() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home.join(".config").join("thesisai");
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("session.json"))
}

pub fn load_session() -> Result<StoredSession> {
    load_session_from(&session_path()?)
}

pub fn store_session(session: &StoredSession) -> Result<()> {
    store_session_to(&session_path()?, session)
}

fn load_session_from(path: &PathBuf) -> Result<StoredSession> {
    if !path.exists() {
        return Ok(StoredSession::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn store_session_to(path: &PathBuf, session: &StoredSession) -> Result<()> {
    let content = serde_json::to_string_pretty(session)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = StoredSession {
            api_url: Some("http://example.test".to_string()),
            access_token: Some("tok".to_string()),
            user: Some(User {
                id: "u1".to_string(),
                username: "alice".to_string(),
                email: "alice@example.test".to_string(),
                full_name: "Alice".to_string(),
                role: Role::Student,
                disabled: false,
                supervisor_id: None,
                assigned_students: Vec::new(),
            }),
        };

        store_session_to(&path, &session).unwrap();
        let loaded = load_session_from(&path).unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("tok"));
        assert_eq!(loaded.user.unwrap().username, "alice");
    }

    #[test]
    fn missing_file_yields_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_session_from(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.access_token.is_none());
    }
}
