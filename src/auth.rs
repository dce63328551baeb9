//! Local user directory standing in for a real account service
//!
//! Credentials are kept in plain text, the same as the browser store this
//! replaces. The chat core only ever asks [`Credentials::is_authorized`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email already exists. Try logging in.")]
    AlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait Credentials {
    fn is_authorized(&self) -> bool;
    fn register(&mut self, email: &str, password: &str) -> Result<(), AuthError>;
    /// Check a login and, on success, mark the session authorized.
    fn validate(&mut self, email: &str, password: &str) -> Result<(), AuthError>;
    fn logout(&mut self) -> Result<(), AuthError>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct UserRecord {
    email: String,
    password: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct DirectoryFile {
    users: Vec<UserRecord>,
    current_user: Option<String>,
}

/// JSON-file backed user list
#[derive(Debug)]
pub struct UserDirectory {
    path: PathBuf,
    data: DirectoryFile,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

impl UserDirectory {
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let data = if path.exists() {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else {
            DirectoryFile::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn current_user(&self) -> Option<&str> {
        self.data.current_user.as_deref()
    }

    fn save(&self) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }
}

impl Credentials for UserDirectory {
    fn is_authorized(&self) -> bool {
        self.data.current_user.is_some()
    }

    fn register(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if self.data.users.iter().any(|u| u.email == email) {
            return Err(AuthError::AlreadyExists);
        }

        self.data.users.push(UserRecord {
            email: email.to_string(),
            password: password.to_string(),
        });
        self.save()?;
        info!(%email, "Registered user");
        Ok(())
    }

    fn validate(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = email.trim();
        let known = self
            .data
            .users
            .iter()
            .any(|u| u.email == email && u.password == password);
        if !known {
            return Err(AuthError::InvalidCredentials);
        }

        self.data.current_user = Some(email.to_string());
        self.save()
    }

    fn logout(&mut self) -> Result<(), AuthError> {
        self.data.current_user = None;
        self.save()
    }
}

/// Registration as the signup form does it: confirmation must match first.
pub fn signup(
    credentials: &mut dyn Credentials,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), AuthError> {
    if password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }
    credentials.register(email, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> (tempfile::TempDir, UserDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDirectory::open(&dir.path().join("users.json")).unwrap();
        (dir, users)
    }

    #[test]
    fn test_register_then_login() {
        let (_dir, mut users) = directory();
        users.register("ana@example.com", "s3cret").unwrap();
        assert!(!users.is_authorized());

        users.validate("ana@example.com", "s3cret").unwrap();
        assert!(users.is_authorized());
        assert_eq!(users.current_user(), Some("ana@example.com"));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (_dir, mut users) = directory();
        users.register("ana@example.com", "a").unwrap();
        let err = users.register("ana@example.com", "b").unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
        assert_eq!(err.to_string(), "Email already exists. Try logging in.");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let (_dir, mut users) = directory();
        users.register("ana@example.com", "right").unwrap();
        let err = users.validate("ana@example.com", "wrong").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!users.is_authorized());
    }

    #[test]
    fn test_signup_password_mismatch() {
        let (_dir, mut users) = directory();
        let err = signup(&mut users, "ana@example.com", "one", "two").unwrap_err();
        assert!(matches!(err, AuthError::PasswordMismatch));
        assert!(users.validate("ana@example.com", "one").is_err());
    }

    #[test]
    fn test_invalid_email() {
        let (_dir, mut users) = directory();
        assert!(matches!(users.register("not-an-email", "x"), Err(AuthError::InvalidEmail)));
        assert!(is_valid_email("a.b@c.org"));
        assert!(!is_valid_email("a b@c.org"));
    }

    #[test]
    fn test_session_persists_and_logout_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        {
            let mut users = UserDirectory::open(&path).unwrap();
            users.register("ana@example.com", "pw").unwrap();
            users.validate("ana@example.com", "pw").unwrap();
        }

        let mut reopened = UserDirectory::open(&path).unwrap();
        assert!(reopened.is_authorized());
        reopened.logout().unwrap();
        assert!(!UserDirectory::open(&path).unwrap().is_authorized());
    }
}
