//! Local dashboard session
//!
//! Logging in compares the password with the configured one and stores the
//! configured session token in a file under the data directory. A session
//! is valid only while the stored token equals the expected token.

use crate::Result;
use clinick_core::config::AuthConfig;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed session token
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    auth: AuthConfig,
}

impl SessionStore {
    /// Session stored at `path`, validated against `auth`
    pub fn new(path: impl Into<PathBuf>, auth: AuthConfig) -> Self {
        Self {
            path: path.into(),
            auth,
        }
    }

    /// Session file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store the session token if `password` matches
    ///
    /// # Errors
    ///
    /// Returns an authentication error on a wrong password and an I/O error
    /// if the token cannot be written.
    pub fn login(&self, password: &str) -> Result<()> {
        if password != self.auth.password {
            warn!("Login rejected");
            return Err(clinick_core::Error::Authentication("Wrong password".to_string()).into());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &self.auth.session_token)?;

        info!(path = %self.path.display(), "Logged in");
        Ok(())
    }

    /// Remove the stored token; succeeds when already logged out
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn logout(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored token, if any
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session; treating as logged out");
                None
            }
        }
    }

    /// Stored token when it is the expected one
    #[must_use]
    pub fn valid_token(&self) -> Option<String> {
        let token = self.token()?;
        if token == self.auth.session_token {
            Some(token)
        } else {
            debug!("Stored session token does not match");
            None
        }
    }

    /// Whether a valid session exists
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.valid_token().is_some()
    }
}
