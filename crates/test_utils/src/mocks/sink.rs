// Path: crates/test_utils/src/mocks/sink.rs
use async_trait::async_trait;
use fleet_api::sink::RegistrySink;
use fleet_types::app::AppMessage;
use fleet_types::error::RegistryError;
use parking_lot::Mutex;

/// Records every message handed to the registry.
#[derive(Debug, Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<AppMessage>>,
}

impl RecordingSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes of applied messages, in order.
    pub fn applied_hashes(&self) -> Vec<String> {
        self.applied.lock().iter().map(|m| m.hash.clone()).collect()
    }
}

#[async_trait]
impl RegistrySink for RecordingSink {
    async fn apply_live(&self, message: &AppMessage) -> Result<(), RegistryError> {
        self.applied.lock().push(message.clone());
        Ok(())
    }
}
