use std::fmt;

use serde::{Deserialize, Serialize};

/// Charging-station device id as used by the topology file (e.g. `"609529"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-device token the vendor API keys its detail endpoint on (`suid`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(pub String);

impl Credential {
    /// Stored value meaning "no credential known for this device yet".
    pub const UNRESOLVED: &'static str = "0";

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn unresolved() -> Self {
        Self(Self::UNRESOLVED.to_string())
    }

    pub fn is_resolved(&self) -> bool {
        let t = self.0.trim();
        !t.is_empty() && t != Self::UNRESOLVED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One charging port as reported by the vendor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortStatus {
    pub port_index: i64,
    pub charging: bool,
    pub energy: f64,
    pub power: f64,
    /// Hours the port has been active, when the vendor reports it.
    pub elapsed_hours: Option<f64>,
}

/// Campus or area selector. `All` is a distinct variant, never a magic string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Named(String),
}

impl Scope {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            Some(s) if !s.is_empty() => Self::Named(s.to_string()),
            _ => Self::All,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(n) => n == name,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(n) => Some(n),
        }
    }
}

/// Cache key for one `query` invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub campus: Scope,
    pub area: Scope,
}

impl QueryKey {
    pub fn new(campus: Scope, area: Scope) -> Self {
        Self { campus, area }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_and_blank_credentials_are_unresolved() {
        assert!(!Credential::unresolved().is_resolved());
        assert!(!Credential::new("  ").is_resolved());
        assert!(Credential::new("abc123").is_resolved());
    }

    #[test]
    fn scope_all_does_not_collide_with_literal_name() {
        let literal = QueryKey::new(Scope::Named("all".to_string()), Scope::All);
        let wildcard = QueryKey::new(Scope::All, Scope::All);
        assert_ne!(literal, wildcard);
        assert_eq!(Scope::from_arg(None), Scope::All);
        assert_eq!(Scope::from_arg(Some(" ")), Scope::All);
        assert_eq!(Scope::from_arg(Some("南湖")), Scope::Named("南湖".to_string()));
    }
}
