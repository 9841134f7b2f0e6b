//! Credentials configuration.
//!
//! Loaded once at startup into an explicit [`Config`] that is passed to
//! whatever needs it. The file is YAML, keyed by service name:
//!
//! ```yaml
//! services:
//!   therapyappointment:
//!     username: someone
//!     password: hunter2
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::PortalError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub services: BTreeMap<String, Credentials>,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of logs and error output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load the credentials file. Missing file or malformed structure is a
    /// fatal startup condition.
    pub fn load(path: &Path) -> Result<Self, PortalError> {
        let content = fs::read_to_string(path).map_err(|e| {
            PortalError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            PortalError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn credentials(&self, service: &str) -> Result<&Credentials, PortalError> {
        self.services.get(service).ok_or_else(|| {
            PortalError::Config(format!("no credentials configured for service {service:?}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_service_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.yml");
        fs::write(
            &path,
            "services:\n  therapyappointment:\n    username: alice\n    password: s3cret\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let creds = config.credentials("therapyappointment").unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "s3cret");
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("info.yml"));
        assert!(matches!(result, Err(PortalError::Config(_))));
    }

    #[test]
    fn malformed_yaml_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.yml");
        fs::write(&path, "services: [not, a, mapping").unwrap();
        assert!(matches!(Config::load(&path), Err(PortalError::Config(_))));
    }

    #[test]
    fn unknown_service_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.yml");
        fs::write(
            &path,
            "services:\n  other:\n    username: a\n    password: b\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(matches!(
            config.credentials("therapyappointment"),
            Err(PortalError::Config(_))
        ));
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials {
            username: "alice".to_string(),
            password: "s3cret".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }
}
