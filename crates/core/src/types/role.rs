//! Role string issued by the API at login.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The role string the API returns alongside a login token.
///
/// The API does not publish a closed set of roles, so the raw string is kept
/// and only the administrative marker is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Marker that grants administrative affordances.
    pub const ADMIN_MARKER: &'static str = "admin";

    /// Wrap a role string.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// Whether the role contains the admin marker (case-insensitive).
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.to_lowercase().contains(Self::ADMIN_MARKER)
    }

    /// The raw role string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_detection_is_case_insensitive_substring() {
        assert!(Role::new("Admin").is_admin());
        assert!(Role::new("SuperADMIN").is_admin());
        assert!(Role::new("store-admin-readonly").is_admin());
    }

    #[test]
    fn test_non_admin_roles() {
        assert!(!Role::new("Customer").is_admin());
        assert!(!Role::new("").is_admin());
        assert!(!Role::default().is_admin());
    }
}
