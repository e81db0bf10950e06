//! Listing - リモートストアとの契約（wire 形式）
//!
//! `list.php` と `upload.php` のレスポンス形状を定義します。
//! リモートの実装はこのリポジトリの範囲外で、ここでは「契約」としてのみ扱います。

use serde::{Deserialize, Serialize};

/// Per-role capacity reported by the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCaps {
    pub host: u32,
    pub guest: u32,
}

/// One entry of the event-wide listing (all identities mixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePhoto {
    pub id: String,
    /// Unix millis; missing values read as 0.
    #[serde(default)]
    pub created_at: i64,
}

impl RemotePhoto {
    pub fn new(id: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }
}

/// Response of `list(eventId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListing {
    pub ok: bool,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub role_caps: Option<RoleCaps>,
    #[serde(default)]
    pub photos: Vec<RemotePhoto>,
}

/// Response of `upload(...)`. `ok == false` is a rejection even with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub ok: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UploadAck {
    pub fn accepted(url: Option<String>) -> Self {
        Self {
            ok: true,
            url,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_tolerates_missing_optional_fields() {
        let listing: EventListing = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(listing.ok);
        assert!(listing.role_caps.is_none());
        assert!(listing.photos.is_empty());
    }

    #[test]
    fn listing_reads_wire_names() {
        let raw = r#"{
            "ok": true,
            "eventId": "e1",
            "eventName": "wedding",
            "roleCaps": {"host": 30, "guest": 2},
            "photos": [{"id": "guest-k1-slot-1.jpg", "createdAt": 1700000000000}, {"id": "x"}]
        }"#;
        let listing: EventListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.event_name.as_deref(), Some("wedding"));
        assert_eq!(listing.role_caps, Some(RoleCaps { host: 30, guest: 2 }));
        assert_eq!(listing.photos[0].created_at, 1_700_000_000_000);
        assert_eq!(listing.photos[1].created_at, 0);
    }

    #[test]
    fn upload_ack_requires_ok_field() {
        assert!(serde_json::from_str::<UploadAck>(r#"{"url":"x"}"#).is_err());
        let ack: UploadAck = serde_json::from_str(r#"{"ok":false,"error":"quota"}"#).unwrap();
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("quota"));
    }
}
