//! Device session ports
//!
//! The interpreter never opens a transport itself. A provider hands out one
//! session per run; the session executes one command at a time.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a target device (hostname, inventory key, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a device returned for one command
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub raw_output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn new(raw_output: impl Into<String>) -> Self {
        Self {
            raw_output: raw_output.into(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }
}

/// Transport-level failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Session is closed")]
    Closed,

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

impl DeviceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// An open, stateful channel to one device.
///
/// Implementations must not run two commands concurrently; `&mut self`
/// enforces this for callers.
#[async_trait]
pub trait DeviceSession: Send + std::fmt::Debug {
    fn device_id(&self) -> &DeviceId;

    /// Send one command and wait for its output
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput, DeviceError>;

    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Opens sessions to devices.
///
/// Providers are responsible for keeping at most one open session per device.
#[async_trait]
pub trait DeviceSessionProvider: Send + Sync + std::fmt::Debug {
    async fn open(&self, device_id: &DeviceId) -> Result<Box<dyn DeviceSession>, DeviceError>;
}
