//! Response interpretation.
//!
//! [`interpret`] maps `(status, content type, body)` onto an [`Outcome`]. It
//! is total: every input, including bodies that are not JSON at all, lands
//! on exactly one variant.
//!
//! | reply                         | outcome                         |
//! |-------------------------------|---------------------------------|
//! | content type not JSON         | `ServerError("Server Error")`   |
//! | 200                           | `Accepted`                      |
//! | 400 / 401                     | `ClientError`                   |
//! | 500, `status == "error"`      | `ServerError`                   |
//! | 500, `failed_ingestions: [..]`| `PartialIngestion`              |
//! | anything else                 | `Unknown`                       |

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use hubsync_core::ChangeDescriptor;

use crate::client::DeliveryOutcome;

const SERVER_ERROR: &str = "Server Error";
const UNKNOWN_ERROR: &str = "Unknown Error occurred";

// ---------------------------------------------------------------------------
// Run result (the document handed to later CI stages)
// ---------------------------------------------------------------------------

/// `"NA"` or the explicit list of descriptors the endpoint did not ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailedIngestions {
    /// Nothing specific is known; assume the whole batch failed.
    #[default]
    NotAvailable,
    Items(Vec<ChangeDescriptor>),
}

impl FailedIngestions {
    pub const NA: &'static str = "NA";

    pub fn items(&self) -> Option<&[ChangeDescriptor]> {
        match self {
            FailedIngestions::NotAvailable => None,
            FailedIngestions::Items(items) => Some(items),
        }
    }
}

impl Serialize for FailedIngestions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FailedIngestions::NotAvailable => serializer.serialize_str(Self::NA),
            FailedIngestions::Items(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FailedIngestions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<ChangeDescriptor>),
            // Any string ("NA", "", …) carries no item information.
            Text(#[allow(dead_code)] String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(items) => FailedIngestions::Items(items),
            Raw::Text(_) => FailedIngestions::NotAvailable,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    /// Delivery was skipped (no webhook configured).
    Invalid,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Invalid => write!(f, "invalid"),
        }
    }
}

/// Summary of a delivery run: `{"status", "message", "failed_ingestions"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_ingestions: Option<FailedIngestions>,
}

impl RunResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            message: message.into(),
            failed_ingestions: Some(FailedIngestions::NotAvailable),
        }
    }

    pub fn error(message: impl Into<String>, failed: FailedIngestions) -> Self {
        Self {
            status: RunStatus::Error,
            message: message.into(),
            failed_ingestions: Some(failed),
        }
    }

    /// `{"status": "invalid"}`
    pub fn invalid() -> Self {
        Self {
            status: RunStatus::Invalid,
            message: String::new(),
            failed_ingestions: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Explicitly listed failures, `None` for "NA" or a missing field.
    pub fn failed_items(&self) -> Option<&[ChangeDescriptor]> {
        self.failed_ingestions.as_ref().and_then(FailedIngestions::items)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Interpreted result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted { message: String },
    /// Only the listed descriptors failed; the rest were ingested.
    PartialIngestion {
        message: String,
        failed: Vec<ChangeDescriptor>,
    },
    /// Ingestion outcome unknown (500 with error status, or a non-JSON reply).
    ServerError { message: String },
    /// 400 or 401: payload or signature must be fixed before a retry helps.
    ClientError { status: u16, message: String },
    TransportFailure { message: String },
    Unknown { status: u16 },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::PartialIngestion { .. } => "partial_ingestion",
            Outcome::ServerError { .. } => "server_error",
            Outcome::ClientError { .. } => "client_error",
            Outcome::TransportFailure { .. } => "transport_failure",
            Outcome::Unknown { .. } => "unknown",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Accepted { message }
            | Outcome::PartialIngestion { message, .. }
            | Outcome::ServerError { message }
            | Outcome::ClientError { message, .. }
            | Outcome::TransportFailure { message } => message,
            Outcome::Unknown { .. } => UNKNOWN_ERROR,
        }
    }

    /// The run result a single exchange stands for on its own.
    pub fn to_result(&self) -> RunResult {
        match self {
            Outcome::Accepted { message } => RunResult::success(message.clone()),
            Outcome::PartialIngestion { message, failed } => {
                RunResult::error(message.clone(), FailedIngestions::Items(failed.clone()))
            }
            other => RunResult::error(other.message(), FailedIngestions::NotAvailable),
        }
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ReplyBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    failed_ingestions: Option<FailedIngestions>,
}

impl ReplyBody {
    fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_owned())
    }
}

/// Closed set of reply shapes the interpreter distinguishes.
enum Reply {
    NotJson,
    Ok(ReplyBody),
    BadRequest(ReplyBody),
    Unauthorized(ReplyBody),
    Internal(ReplyBody),
    Other(u16),
}

impl Reply {
    fn classify(status: u16, content_type: Option<&str>, body: &str) -> Self {
        if !is_json(content_type) {
            return Reply::NotJson;
        }
        if !matches!(status, 200 | 400 | 401 | 500) {
            return Reply::Other(status);
        }
        let Ok(parsed) = serde_json::from_str::<ReplyBody>(body) else {
            return Reply::NotJson;
        };
        match status {
            200 => Reply::Ok(parsed),
            400 => Reply::BadRequest(parsed),
            401 => Reply::Unauthorized(parsed),
            _ => Reply::Internal(parsed),
        }
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Map one HTTP reply onto an [`Outcome`].
pub fn interpret(status: u16, content_type: Option<&str>, body: &str) -> Outcome {
    match Reply::classify(status, content_type, body) {
        Reply::NotJson => Outcome::ServerError {
            message: SERVER_ERROR.to_owned(),
        },
        Reply::Ok(reply) => Outcome::Accepted {
            message: reply.message_or("Import completed"),
        },
        Reply::BadRequest(reply) => Outcome::ClientError {
            status,
            message: reply.message_or("Invalid input"),
        },
        Reply::Unauthorized(reply) => Outcome::ClientError {
            status,
            message: reply.message_or("Signature authentication failed"),
        },
        Reply::Internal(reply) => {
            let message = reply.message_or("Internal Server Error");
            let listed = match (&reply.status, reply.failed_ingestions) {
                (Some(s), _) if s == "error" => None,
                (_, Some(FailedIngestions::Items(items))) => Some(items),
                _ => None,
            };
            match listed {
                Some(failed) => Outcome::PartialIngestion { message, failed },
                None => Outcome::ServerError { message },
            }
        }
        Reply::Other(status) => Outcome::Unknown { status },
    }
}

/// [`interpret`] lifted over a raw [`DeliveryOutcome`].
pub fn interpret_outcome(outcome: DeliveryOutcome) -> Outcome {
    match outcome {
        DeliveryOutcome::Responded {
            status,
            content_type,
            body,
        } => interpret(status, content_type.as_deref(), &body),
        DeliveryOutcome::TransportFailure { reason } => Outcome::TransportFailure { message: reason },
    }
}
