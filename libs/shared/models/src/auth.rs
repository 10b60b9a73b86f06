use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// Authenticated roles. Checked once at the handler boundary; downstream
/// services receive the resolved enum, never a raw role string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Unknown or absent role claims resolve to the least-privileged role.
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim.map(|r| r.to_ascii_lowercase()).as_deref() {
            Some("admin") => Role::Admin,
            Some("doctor") => Role::Doctor,
            _ => Role::Patient,
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Doctor | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}
