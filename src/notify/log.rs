// src/notify/log.rs
use super::{DeliveryError, Notifier};
use crate::format::MessageChunk;

/// Dry-run channel: every chunk goes to the log and counts as delivered.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, target: &str, chunk: &MessageChunk) -> Result<(), DeliveryError> {
        tracing::info!(
            target: "notify",
            to = target,
            lines = chunk.line_indices.len(),
            chars = chunk.char_len(),
            "dry run message:\n{}",
            chunk.text
        );
        Ok(())
    }
}
