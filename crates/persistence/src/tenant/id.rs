//! Tenant identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The reserved default tenant identifier.
///
/// In single-tenant deployments this is the only tenant. In multi-tenant
/// deployments it owns the shared schema (the `db/shared` migration subset)
/// while every other tenant receives the tenant schema.
pub const DEFAULT_TENANT: &str = "default";

/// An opaque tenant identifier.
///
/// A tenant is a partition key only; it has no persisted record of its own.
///
/// # Examples
///
/// ```
/// use strata_persistence::tenant::TenantId;
///
/// let tenant = TenantId::new("acme");
/// assert_eq!(tenant.as_str(), "acme");
/// assert!(!tenant.is_default());
/// assert!(TenantId::default_tenant().is_default());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the reserved default tenant ID.
    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the reserved default tenant.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }

    /// Returns a variant of the id that is safe to embed in file names.
    ///
    /// ASCII letters, digits, `_` and `-` are kept. Every other character is
    /// written as `%XX` per UTF-8 byte, so distinct ids never share a name.
    pub fn sanitized(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                out.push(c);
            } else {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
        out
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::default_tenant()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TenantId::new(s))
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_creation() {
        let tenant = TenantId::new("my-tenant");
        assert_eq!(tenant.as_str(), "my-tenant");
        assert_eq!(tenant.to_string(), "my-tenant");
    }

    #[test]
    fn test_default_tenant() {
        let tenant = TenantId::default();
        assert!(tenant.is_default());
        assert_eq!(tenant.as_str(), DEFAULT_TENANT);
    }

    #[test]
    fn test_sanitized() {
        assert_eq!(TenantId::new("acme/research").sanitized(), "acme%2Fresearch");
        assert_eq!(TenantId::new("beta-2").sanitized(), "beta-2");
        assert_eq!(TenantId::new("caf\u{e9}").sanitized(), "caf%C3%A9");
    }

    #[test]
    fn test_sanitized_keeps_ids_apart() {
        let ids = ["a.b", "a_b", "a/b", "a%2Eb", "a b"];
        let names: std::collections::HashSet<String> =
            ids.iter().map(|id| TenantId::new(*id).sanitized()).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_serde_transparent() {
        let tenant = TenantId::new("acme");
        let json = serde_json::to_string(&tenant).unwrap();
        assert_eq!(json, "\"acme\"");
        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tenant);
    }
}
