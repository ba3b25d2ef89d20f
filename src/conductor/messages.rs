use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// Lifecycle of a bridged message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Completed,
    Error,
    Timeout,
}

impl MessageStatus {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            MessageStatus::Completed | MessageStatus::Error | MessageStatus::Timeout
        )
    }
}

/// One line of a conductor's message history (JSON Lines).
///
/// Request and response are correlated by `timestamp`, stamped when the
/// entry is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub timestamp: String,
    pub platform: String,
    pub direction: MessageDirection,
    pub sender: String,
    pub recipient: String,
    pub profile: String,
    pub conductor: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Where a bridged message is going
#[derive(Debug, Clone, Default)]
pub struct MessageRoute {
    pub platform: String,
    pub sender: String,
    pub recipient: String,
    pub profile: String,
    pub conductor: String,
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl MessageLogEntry {
    fn new(route: MessageRoute, direction: MessageDirection, message: &str) -> Self {
        Self {
            timestamp: now_timestamp(),
            platform: route.platform,
            direction,
            sender: route.sender,
            recipient: route.recipient,
            profile: route.profile,
            conductor: route.conductor,
            message: message.to_string(),
            response: None,
            response_time_ms: None,
            status: MessageStatus::Pending,
            message_id: None,
            thread_id: None,
            metadata: None,
        }
    }

    /// A message arriving from the chat platform, pending a response
    pub fn incoming(route: MessageRoute, message: &str) -> Self {
        Self::new(route, MessageDirection::Incoming, message)
    }

    /// A message the conductor pushes out on its own (heartbeat reports etc.)
    pub fn outgoing(route: MessageRoute, message: &str) -> Self {
        Self::new(route, MessageDirection::Outgoing, message)
    }

    pub fn with_ids(mut self, message_id: Option<String>, thread_id: Option<String>) -> Self {
        self.message_id = message_id;
        self.thread_id = thread_id;
        self
    }

    pub fn correlation_key(&self) -> &str {
        &self.timestamp
    }

    pub fn mark_sent(&mut self) {
        if !self.status.is_final() {
            self.status = MessageStatus::Sent;
        }
    }

    pub fn complete(&mut self, response: &str, response_time_ms: u64) {
        self.response = Some(response.to_string());
        self.response_time_ms = Some(response_time_ms);
        self.status = MessageStatus::Completed;
    }

    pub fn fail(&mut self, reason: &str) {
        self.response = Some(reason.to_string());
        self.status = MessageStatus::Error;
    }

    pub fn time_out(&mut self) {
        if !self.status.is_final() {
            self.status = MessageStatus::Timeout;
        }
    }

    /// Serialize as a single JSON Lines record, newline included
    pub fn to_json_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
