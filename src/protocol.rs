//! Cross-context message protocol.
//!
//! Messages are JSON objects tagged by `action`. The protocol is not
//! versioned: sender and receiver are always the same build.

use crate::model::{CycleId, RateLimitInfo, RateLimitStatus, ScanMode, ScanResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    Ping,
    ShowProgress {
        url: String,
        #[serde(default)]
        mode: ScanMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cycle: Option<CycleId>,
    },
    ShowResult {
        url: String,
        result: ScanResult,
        #[serde(default)]
        mode: ScanMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cycle: Option<CycleId>,
    },
    ShowError {
        #[serde(alias = "error")]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cycle: Option<CycleId>,
    },
    GetRateLimit,
    UpdateRateLimit {
        info: RateLimitInfo,
    },
    /// Any action this build does not know. Receivers ignore it.
    #[serde(other)]
    Unknown,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::Ping => "ping",
            Message::ShowProgress { .. } => "showProgress",
            Message::ShowResult { .. } => "showResult",
            Message::ShowError { .. } => "showError",
            Message::GetRateLimit => "getRateLimit",
            Message::UpdateRateLimit { .. } => "updateRateLimit",
            Message::Unknown => "unknown",
        }
    }

    pub fn cycle(&self) -> Option<CycleId> {
        match self {
            Message::ShowProgress { cycle, .. }
            | Message::ShowResult { cycle, .. }
            | Message::ShowError { cycle, .. } => *cycle,
            _ => None,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Answer to a [`Message`], tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    Ready,
    Done,
    Ignored,
    /// The instruction belongs to a cycle older than the one on screen.
    Stale,
    Failed {
        error: String,
    },
    RateLimit(RateLimitStatus),
}

impl Reply {
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Reply::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failed { .. })
    }
}
