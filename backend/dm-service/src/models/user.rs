use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A user's single active public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserKey {
    pub user_id: Uuid,
    /// SPKI PEM, RSA >= 2048 bits
    pub public_key_pem: String,
    /// hex SHA-256 of the SPKI DER
    pub fingerprint: String,
    pub registered_at: DateTime<Utc>,
}

/// Who may open a direct conversation with a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmPermission {
    #[default]
    Anyone,
    Followers,
    Mutuals,
    Nobody,
}

impl DmPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmPermission::Anyone => "anyone",
            DmPermission::Followers => "followers",
            DmPermission::Mutuals => "mutuals",
            DmPermission::Nobody => "nobody",
        }
    }
}

impl fmt::Display for DmPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DmPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anyone" => Ok(DmPermission::Anyone),
            "followers" => Ok(DmPermission::Followers),
            "mutuals" => Ok(DmPermission::Mutuals),
            "nobody" => Ok(DmPermission::Nobody),
            other => Err(format!(
                "invalid dm_permission: {other}. Must be one of: anyone, followers, mutuals, nobody"
            )),
        }
    }
}
