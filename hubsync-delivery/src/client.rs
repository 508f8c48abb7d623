//! Signed webhook client.
//!
//! One call to [`Deliver::send`] is exactly one HTTP exchange: no retries,
//! no timeouts beyond the transport defaults. Retrying is the
//! reconciliation loop's job, through the store.

use hubsync_core::{Channel, WebhookConfig};

use crate::signature::{sign, SIGNATURE_HEADER};

/// Raw result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered, with any status code.
    Responded {
        status: u16,
        content_type: Option<String>,
        body: String,
    },
    /// No usable response (connection refused, DNS, TLS, truncated body…).
    TransportFailure { reason: String },
}

/// Sends one signed payload to a channel.
pub trait Deliver {
    fn send(&self, channel: Channel, body: &[u8]) -> DeliveryOutcome;
}

/// [`Deliver`] over HTTP with an `x-hub-signature-256` header.
#[derive(Debug, Clone)]
pub struct SignedDeliveryClient {
    agent: ureq::Agent,
    base_url: String,
    secret: String,
}

impl SignedDeliveryClient {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.base_url.clone(), config.secret.clone())
    }

    /// `<base_url>/<channel segment>`
    pub fn endpoint(&self, channel: Channel) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            channel.path_segment()
        )
    }
}

impl Deliver for SignedDeliveryClient {
    fn send(&self, channel: Channel, body: &[u8]) -> DeliveryOutcome {
        let url = self.endpoint(channel);
        let signature = match sign(body, &self.secret) {
            Ok(signature) => signature,
            Err(err) => {
                return DeliveryOutcome::TransportFailure {
                    reason: format!("cannot sign payload: {err}"),
                }
            }
        };
        tracing::info!(url = %url, bytes = body.len(), "posting payload");

        let result = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set(SIGNATURE_HEADER, &signature)
            .send_bytes(body);

        match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => read_response(response),
            Err(ureq::Error::Transport(err)) => {
                tracing::warn!(url = %url, error = %err, "transport failure");
                DeliveryOutcome::TransportFailure {
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn read_response(response: ureq::Response) -> DeliveryOutcome {
    let status = response.status();
    let content_type = response.header("content-type").map(str::to_owned);
    match response.into_string() {
        Ok(body) => DeliveryOutcome::Responded {
            status,
            content_type,
            body,
        },
        Err(err) => DeliveryOutcome::TransportFailure {
            reason: format!("failed to read response body: {err}"),
        },
    }
}
