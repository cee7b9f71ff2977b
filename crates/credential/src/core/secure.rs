use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Credential value that zeros memory on drop
///
/// Holds certificate material or a password. `Debug` never prints the value
/// and equality is constant-time.
#[derive(Clone)]
pub struct SecureString(SecretString);

impl SecureString {
    /// Create new secure string
    pub fn new(s: impl Into<String>) -> Self {
        Self(SecretString::from(s.into()))
    }

    /// Expose the secret (use with caution)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns `true` if the value is empty
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Constant-time equality check
    pub fn eq_ct(&self, other: &Self) -> bool {
        let a = self.0.expose_secret().as_bytes();
        let b = other.0.expose_secret().as_bytes();
        a.ct_eq(b).into()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.eq_ct(other)
    }
}

impl Eq for SecureString {}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let s = SecureString::new("hunter2");
        assert_eq!(format!("{s:?}"), "SecureString[REDACTED]");
        assert_eq!(s.expose(), "hunter2");
    }

    #[test]
    fn test_constant_time_equality() {
        let a = SecureString::new("value");
        assert!(a.eq_ct(&SecureString::from("value")));
        assert!(!a.eq_ct(&SecureString::from("other")));
        assert!(!a.eq_ct(&SecureString::from("valu")));
        assert_eq!(a, SecureString::from("value".to_string()));
    }

    #[test]
    fn test_is_empty() {
        assert!(SecureString::new("").is_empty());
        assert!(!SecureString::new("x").is_empty());
    }
}
