//! HttpPhotoStore - 本番用のリモート写真ストアクライアント
//!
//! - `GET  {api_base}/list.php?eventId=...` → EventListing
//! - `POST {api_base}/upload.php` (multipart) → UploadAck
//!
//! レスポンスが来ただけでは成功としません。ステータスが 2xx で、
//! かつ本文が `{"ok": true, ...}` の JSON であるときだけ Ok を返します。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::domain::{DEFAULT_MIME_TYPE, EventId, EventListing, TransportError, UploadAck};
use crate::ports::{RemotePhotoStore, UploadRequest};

pub struct HttpPhotoStore {
    client: reqwest::Client,
    api_base: String,
}

impl HttpPhotoStore {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::NetworkUnavailable(format!("client setup: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.api_base, name)
    }
}

/// Map a reqwest failure onto the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() || err.is_body() {
        TransportError::MalformedResponse(err.to_string())
    } else if let Some(status) = err.status() {
        TransportError::ServerRejected(format!("status {status}"))
    } else {
        TransportError::NetworkUnavailable(err.to_string())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Validate a listing response. Split out from I/O so it can be tested directly.
pub(crate) fn parse_listing(status: u16, body: &str) -> Result<EventListing, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::ServerRejected(format!(
            "list status {status}: {}",
            truncate(body)
        )));
    }
    let listing: EventListing = serde_json::from_str(body)
        .map_err(|e| TransportError::MalformedResponse(format!("list body: {e}")))?;
    if !listing.ok {
        return Err(TransportError::ServerRejected("list returned ok=false".to_string()));
    }
    Ok(listing)
}

pub(crate) fn parse_upload_ack(status: u16, body: &str) -> Result<UploadAck, TransportError> {
    let ack = serde_json::from_str::<UploadAck>(body);
    if !(200..300).contains(&status) {
        let reason = match ack {
            Ok(UploadAck {
                error: Some(error), ..
            }) => error,
            _ => truncate(body).to_string(),
        };
        return Err(TransportError::ServerRejected(format!(
            "upload status {status}: {reason}"
        )));
    }
    let ack = ack.map_err(|e| TransportError::MalformedResponse(format!("upload body: {e}")))?;
    if !ack.ok {
        return Err(TransportError::ServerRejected(
            ack.error.unwrap_or_else(|| "upload returned ok=false".to_string()),
        ));
    }
    Ok(ack)
}

fn file_part(request: &UploadRequest<'_>) -> Result<Part, TransportError> {
    let part = || Part::bytes(request.image_bytes.to_vec()).file_name(request.file_name.clone());
    part()
        .mime_str(request.mime_type)
        .or_else(|_| part().mime_str(DEFAULT_MIME_TYPE))
        .map_err(|e| TransportError::ServerRejected(format!("invalid mime type: {e}")))
}

#[async_trait]
impl RemotePhotoStore for HttpPhotoStore {
    async fn list(&self, event_id: &EventId) -> Result<EventListing, TransportError> {
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        let response = self
            .client
            .get(self.endpoint("list.php"))
            .query(&[("eventId", event_id.as_str()), ("v", cache_buster.as_str())])
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        parse_listing(status, &body)
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadAck, TransportError> {
        let identity = request.identity;
        let form = Form::new()
            .text("eventId", identity.event_id().to_string())
            .text("id", request.key.to_string())
            .text("role", identity.role().as_str())
            .text(identity.role().key_field(), identity.identity_key().to_string())
            .text("slot", request.key.slot().to_string())
            .text("nickname", request.owner_nickname.to_string())
            .text("createdAt", request.created_at_ms.to_string())
            .part("file", file_part(&request)?);

        let response = self
            .client
            .post(self.endpoint("upload.php"))
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        parse_upload_ack(status, &body)
    }
}
