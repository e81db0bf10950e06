//! Identity - 誰の枠（slot）に書き込むか
//!
//! `UploadIdentity` はセッション中不変で、外部から渡されます。
//! slot 命名キーと送信時の認証情報の両方を兼ねます。
//! コアの各操作には明示的に引数として渡し、共有状態から暗黙に読むことはしません。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 参加者の役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Guest => "guest",
        }
    }

    /// multipart フォームで識別キーを載せるフィールド名
    pub fn key_field(&self) -> &'static str {
        match self {
            Role::Host => "hostKey",
            Role::Guest => "guestKey",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Role::Host),
            "guest" => Ok(Role::Guest),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The (event, role, key) triple a device uploads as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIdentity {
    event_id: EventId,
    role: Role,
    identity_key: String,
}

impl UploadIdentity {
    pub fn new(event_id: EventId, role: Role, identity_key: impl Into<String>) -> Self {
        Self {
            event_id,
            role,
            identity_key: identity_key.into(),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }
}
