//! Shared utilities for the testsmith codebase

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// A string wrapper that masks its contents in Debug/Display output.
/// Prevents accidental logging of API keys.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Intentionally access the raw secret value (for headers)
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty keys and the literal "none" mean no credential is sent.
    pub fn is_unset(&self) -> bool {
        self.0.is_empty() || self.0.eq_ignore_ascii_case("none")
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for SecretString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Read a whole input: the named file, or stdin when no path (or `-`) is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_hides_in_debug() {
        let secret = SecretString::new("sk-secret-key-123".to_string());
        let debug = format!("{:?}", secret);
        assert_eq!(debug, "***");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_secret_string_hides_in_display() {
        let secret = SecretString::new("sk-secret-key-123".to_string());
        assert_eq!(format!("{}", secret), "***");
    }

    #[test]
    fn test_secret_string_expose_returns_value() {
        let secret: SecretString = "my-api-key".to_string().into();
        assert_eq!(secret.expose(), "my-api-key");
        assert!(secret == "my-api-key");
    }

    #[test]
    fn test_secret_string_is_unset() {
        assert!(SecretString::new(String::new()).is_unset());
        assert!(SecretString::new("NONE".to_string()).is_unset());
        assert!(!SecretString::new("sk-1".to_string()).is_unset());
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.md");
        fs::write(&path, "hello").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "hello");

        let err = read_input(Some(&dir.path().join("missing.md"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
