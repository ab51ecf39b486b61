//! Device sessions that replay recorded responses
//!
//! Used for dry runs and tests. A script maps exact command text to one or
//! more responses; when a command has several, they are returned in order and
//! the last one repeats.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{CommandOutput, DeviceError, DeviceId, DeviceSession, DeviceSessionProvider};

/// One recorded device response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResponse {
    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Transport error to raise instead of returning output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Simulated round-trip latency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl ReplayResponse {
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ReplayEntry {
    Many(Vec<ReplayResponse>),
    One(ReplayResponse),
}

impl From<ReplayEntry> for VecDeque<ReplayResponse> {
    fn from(entry: ReplayEntry) -> Self {
        match entry {
            ReplayEntry::One(response) => VecDeque::from([response]),
            ReplayEntry::Many(responses) => responses.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReplayScriptFile {
    #[serde(default)]
    default: Option<ReplayResponse>,

    #[serde(default)]
    responses: HashMap<String, ReplayEntry>,
}

/// Recorded responses keyed by exact command text
#[derive(Debug, Clone, Default)]
pub struct ReplayScript {
    responses: HashMap<String, VecDeque<ReplayResponse>>,
    default: Option<ReplayResponse>,
}

impl ReplayScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a script from JSON:
    /// `{"default": {...}, "responses": {"show version": {...} | [{...}, ...]}}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: ReplayScriptFile = serde_json::from_str(json)?;
        Ok(Self {
            responses: file
                .responses
                .into_iter()
                .map(|(command, entry)| (command, entry.into()))
                .collect(),
            default: file.default,
        })
    }

    /// Queue a response for a command
    pub fn on(mut self, command: impl Into<String>, response: ReplayResponse) -> Self {
        self.responses
            .entry(command.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Response for commands without a recording
    pub fn with_default(mut self, response: ReplayResponse) -> Self {
        self.default = Some(response);
        self
    }

    fn next_response(&mut self, command: &str) -> Option<ReplayResponse> {
        match self.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => self.default.clone(),
        }
    }
}

/// A command observed by a replay session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub device_id: DeviceId,
    pub command: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Provider handing out replay sessions.
///
/// Each device gets its own copy of the script. Opening a second session to a
/// device that already has one fails with `DeviceError::Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct ReplaySessionProvider {
    script: ReplayScript,
    device_scripts: HashMap<DeviceId, ReplayScript>,
    unreachable: HashSet<DeviceId>,
    open_sessions: Arc<Mutex<HashSet<DeviceId>>>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl ReplaySessionProvider {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Use a dedicated script for one device
    pub fn with_device_script(mut self, device_id: impl Into<DeviceId>, script: ReplayScript) -> Self {
        self.device_scripts.insert(device_id.into(), script);
        self
    }

    /// Make `open` fail for a device
    pub fn with_unreachable(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.unreachable.insert(device_id.into());
        self
    }

    /// Every command sent through any session, in order
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.transcript).clone()
    }

    /// Commands sent to one device, in order
    pub fn commands_sent(&self, device_id: &DeviceId) -> Vec<String> {
        lock(&self.transcript)
            .iter()
            .filter(|entry| &entry.device_id == device_id)
            .map(|entry| entry.command.clone())
            .collect()
    }

    pub fn is_open(&self, device_id: &DeviceId) -> bool {
        lock(&self.open_sessions).contains(device_id)
    }
}

#[async_trait]
impl DeviceSessionProvider for ReplaySessionProvider {
    async fn open(&self, device_id: &DeviceId) -> Result<Box<dyn DeviceSession>, DeviceError> {
        if self.unreachable.contains(device_id) {
            return Err(DeviceError::unavailable(format!(
                "{} did not answer",
                device_id
            )));
        }

        if !lock(&self.open_sessions).insert(device_id.clone()) {
            return Err(DeviceError::unavailable(format!(
                "a session to {} is already open",
                device_id
            )));
        }

        debug!(device_id = %device_id, "Opened replay session");

        let script = self
            .device_scripts
            .get(device_id)
            .unwrap_or(&self.script)
            .clone();

        Ok(Box::new(ReplaySession {
            device_id: device_id.clone(),
            script,
            open_sessions: Arc::clone(&self.open_sessions),
            transcript: Arc::clone(&self.transcript),
            closed: false,
        }))
    }
}

/// Session returned by [`ReplaySessionProvider`]
#[derive(Debug)]
pub struct ReplaySession {
    device_id: DeviceId,
    script: ReplayScript,
    open_sessions: Arc<Mutex<HashSet<DeviceId>>>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
    closed: bool,
}

impl ReplaySession {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.open_sessions).remove(&self.device_id);
        }
    }
}

#[async_trait]
impl DeviceSession for ReplaySession {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    async fn run(&mut self, command: &str, _timeout: Duration) -> Result<CommandOutput, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }

        lock(&self.transcript).push(TranscriptEntry {
            device_id: self.device_id.clone(),
            command: command.to_string(),
        });

        let response = self.script.next_response(command).ok_or_else(|| {
            DeviceError::transport(format!("no recorded response for '{}'", command))
        })?;

        if let Some(delay_ms) = response.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if let Some(error) = response.error {
            return Err(DeviceError::transport(error));
        }

        Ok(CommandOutput {
            raw_output: response.output,
            exit_code: response.exit_code,
        })
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.release();
        debug!(device_id = %self.device_id, "Closed replay session");
        Ok(())
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_replays_in_order_and_repeats_last() {
        let script = ReplayScript::new()
            .on("show int status", ReplayResponse::output("down"))
            .on("show int status", ReplayResponse::output("up"));
        let provider = ReplaySessionProvider::new(script);

        let mut session = provider.open(&DeviceId::new("sw-01")).await.unwrap();
        assert_eq!(session.run("show int status", TIMEOUT).await.unwrap().raw_output, "down");
        assert_eq!(session.run("show int status", TIMEOUT).await.unwrap().raw_output, "up");
        assert_eq!(session.run("show int status", TIMEOUT).await.unwrap().raw_output, "up");
    }

    #[tokio::test]
    async fn test_unknown_command_uses_default() {
        let provider = ReplaySessionProvider::new(
            ReplayScript::new().with_default(ReplayResponse::output("").with_exit_code(0)),
        );

        let mut session = provider.open(&DeviceId::new("sw-01")).await.unwrap();
        let output = session.run("configure terminal", TIMEOUT).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_unknown_command_without_default_fails() {
        let provider = ReplaySessionProvider::new(ReplayScript::new());

        let mut session = provider.open(&DeviceId::new("sw-01")).await.unwrap();
        let err = session.run("show clock", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, DeviceError::Transport(_)));
    }

    #[tokio::test]
    async fn test_recorded_error() {
        let provider = ReplaySessionProvider::new(
            ReplayScript::new().on("reload", ReplayResponse::error("connection reset")),
        );

        let mut session = provider.open(&DeviceId::new("sw-01")).await.unwrap();
        let err = session.run("reload", TIMEOUT).await.unwrap_err();
        assert_eq!(err, DeviceError::transport("connection reset"));
    }

    #[tokio::test]
    async fn test_one_session_per_device() {
        let provider = ReplaySessionProvider::new(ReplayScript::new());
        let device = DeviceId::new("sw-01");

        let mut session = provider.open(&device).await.unwrap();
        assert!(provider.is_open(&device));
        assert!(matches!(
            provider.open(&device).await,
            Err(DeviceError::Unavailable(_))
        ));

        // Other devices are independent
        assert!(provider.open(&DeviceId::new("sw-02")).await.is_ok());

        session.close().await.unwrap();
        assert!(!provider.is_open(&device));
        assert!(provider.open(&device).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_commands() {
        let provider = ReplaySessionProvider::new(ReplayScript::new());

        let mut session = provider.open(&DeviceId::new("sw-01")).await.unwrap();
        session.close().await.unwrap();
        assert_eq!(
            session.run("show version", TIMEOUT).await.unwrap_err(),
            DeviceError::Closed
        );
    }

    #[tokio::test]
    async fn test_unreachable_device() {
        let provider = ReplaySessionProvider::new(ReplayScript::new()).with_unreachable("sw-09");
        assert!(provider.open(&DeviceId::new("sw-09")).await.is_err());
    }

    #[tokio::test]
    async fn test_transcript_records_commands() {
        let provider = ReplaySessionProvider::new(
            ReplayScript::new().with_default(ReplayResponse::output("ok")),
        );
        let device = DeviceId::new("sw-01");

        let mut session = provider.open(&device).await.unwrap();
        session.run("show version", TIMEOUT).await.unwrap();
        session.run("show clock", TIMEOUT).await.unwrap();

        assert_eq!(provider.commands_sent(&device), vec!["show version", "show clock"]);
        assert_eq!(provider.transcript().len(), 2);
    }

    #[test]
    fn test_script_from_json() {
        let mut script = ReplayScript::from_json(
            r#"{
                "default": {"output": ""},
                "responses": {
                    "show version": {"output": "Cisco IOS Software", "exit_code": 0},
                    "show int status": [{"output": "down"}, {"output": "up"}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            script.next_response("show version").unwrap().output,
            "Cisco IOS Software"
        );
        assert_eq!(script.next_response("show int status").unwrap().output, "down");
        assert_eq!(script.next_response("show int status").unwrap().output, "up");
        assert_eq!(script.next_response("other").unwrap().output, "");
    }
}
