// src/notify/mod.rs
pub mod log;
pub mod telegram;

use std::sync::Mutex;
use thiserror::Error;

use crate::format::MessageChunk;

pub use log::LogNotifier;
pub use telegram::TelegramNotifier;

/// Why a chunk was not delivered. Any variant means "not delivered".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Credentials or destination missing
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    /// The remote end answered with a non-success status
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Delivery channel. `target` is the destination (chat id, channel name).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, target: &str, chunk: &MessageChunk) -> Result<(), DeliveryError>;
}

// --- Test helper ---
/// Records every chunk; fails every call from `fail_from` (0-based) on.
pub struct MockNotifier {
    pub sent: Mutex<Vec<(String, MessageChunk)>>,
    fail_from: Option<usize>,
    calls: Mutex<usize>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail_from: None,
            calls: Mutex::new(0),
        }
    }

    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::new()
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(_, c)| c.text.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, target: &str, chunk: &MessageChunk) -> Result<(), DeliveryError> {
        let n = {
            let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
            *calls += 1;
            *calls - 1
        };
        if self.fail_from.is_some_and(|f| n >= f) {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "mock failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((target.to_string(), chunk.clone()));
        Ok(())
    }
}
