//! Signed webhook delivery.
//!
//! Every link event is pushed to the remote listener as a single HTTP POST,
//! authenticated with an HMAC-SHA256 signature over the exact body bytes.
//! Delivery is fire-and-forget: failures are logged and never retried, and
//! nothing here can abort the login flow.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

/// Path appended to the configured webhook base URL.
const WEBHOOK_PATH: &str = "/api/bot-webhook";

/// Per-request timeout for webhook deliveries.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

/// Status values the remote listener understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    /// A pairing code or QR artwork is ready to scan.
    QrReady,
    /// The channel linked successfully; the gateway is configuring.
    Configuring,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::QrReady => "qr_ready",
            WebhookStatus::Configuring => "configuring",
        }
    }
}

/// Wire payload. Optional fields are omitted, not sent as null.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    instance_id: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_base64: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

/// Build a webhook client with the delivery timeout applied.
pub fn webhook_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Serialize the payload for `status`. The returned string is the exact
/// byte sequence that gets signed and sent.
fn serialize_payload(
    instance_id: &str,
    status: WebhookStatus,
    qr_base64: Option<&str>,
    phone: Option<&str>,
) -> String {
    let payload = WebhookPayload {
        instance_id,
        status: status.as_str(),
        qr_base64: qr_base64.filter(|s| !s.is_empty()),
        phone: phone.filter(|s| !s.is_empty()),
    };
    serde_json::to_string(&payload).expect("webhook payload serializes")
}

/// HMAC-SHA256 over `body` keyed with `secret`, as the wire header value.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA-256 accepts keys of any size");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(digest))
}

/// Send one webhook. Logs the remote status or the transport error; never
/// returns either to the caller.
///
/// An empty `base_url` disables delivery entirely; that is the configured
/// "no listener" state, not an error.
pub async fn send_webhook(
    client: &reqwest::Client,
    base_url: &str,
    instance_id: &str,
    secret: &str,
    status: WebhookStatus,
    qr_base64: Option<&str>,
    phone: Option<&str>,
) {
    if base_url.is_empty() {
        tracing::debug!(status = status.as_str(), "webhook delivery disabled, skipping");
        return;
    }

    let body = serialize_payload(instance_id, status, qr_base64, phone);
    let signature = sign_body(secret, body.as_bytes());
    let url = format!("{}{}", base_url.trim_end_matches('/'), WEBHOOK_PATH);

    // The signature covers these exact bytes; the body must be sent as-is,
    // never re-serialized.
    match client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", signature)
        .body(body)
        .send()
        .await
    {
        Ok(response) => {
            tracing::info!(
                status = status.as_str(),
                http_status = response.status().as_u16(),
                "webhook delivered"
            );
        }
        Err(e) => {
            tracing::warn!(status = status.as_str(), error = %e, "webhook delivery failed");
        }
    }
}
